//! Render request types.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::geo::Coordinate;
use crate::navigation::NavigationStatus;
use crate::position::Position;
use crate::route::Route;

/// Which screen layout is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScreenType {
    /// Map with the recorded/active track.
    #[default]
    Track,
    /// Turn-by-turn navigation screen.
    TurnByTurn,
}

impl ScreenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScreenType::Track => "track",
            ScreenType::TurnByTurn => "turn_by_turn",
        }
    }
}

impl fmt::Display for ScreenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ScreenType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "track" => Ok(ScreenType::Track),
            "turn_by_turn" | "turn-by-turn" => Ok(ScreenType::TurnByTurn),
            other => Err(format!("unknown screen type '{}'", other)),
        }
    }
}

/// Values from the route data caches shown in the map overlay.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OverlayValues {
    /// Speed limit in km/h.
    pub speed_limit_kmh: Option<u16>,
    /// Road surface description.
    pub road_surface: Option<String>,
    /// Nearest place name.
    pub location_name: Option<String>,
    /// Elevation in metres.
    pub elevation_m: Option<f64>,
}

/// Everything a renderer needs for one frame, snapshotted from device state.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Map centre. `None` when there is no position and no route yet.
    pub center: Option<Coordinate>,
    /// Current position, drawn as a marker.
    pub position: Option<Position>,
    /// Map zoom level.
    pub zoom: u8,
    /// Map rotation in degrees clockwise (heading-up when non-zero).
    pub rotation_deg: f64,
    /// Active screen layout.
    pub screen: ScreenType,
    /// Active route polyline.
    pub route: Option<Arc<Route>>,
    /// Navigation snapshot while drive navigation is running.
    pub navigation: Option<NavigationStatus>,
    /// Cache-derived overlay values.
    pub overlay: OverlayValues,
    /// Frame the whole route instead of following the position.
    pub overview: bool,
}

impl RenderRequest {
    /// An empty map request.
    pub fn new(width: u32, height: u32, zoom: u8) -> Self {
        Self {
            width,
            height,
            center: None,
            position: None,
            zoom,
            rotation_deg: 0.0,
            screen: ScreenType::Track,
            route: None,
            navigation: None,
            overlay: OverlayValues::default(),
            overview: false,
        }
    }
}
