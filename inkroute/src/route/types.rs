//! Route data model.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geo::{polyline_length_m, Coordinate};

/// Route validation errors.
#[derive(Debug, Error, PartialEq)]
pub enum RouteError {
    /// The route has no waypoints.
    #[error("route has no waypoints")]
    NoWaypoints,

    /// The geometry needs at least two points.
    #[error("route geometry has {0} point(s), need at least 2")]
    GeometryTooShort(usize),

    /// A coordinate is out of range.
    #[error("invalid coordinate ({lat}, {lon})")]
    InvalidCoordinate { lat: f64, lon: f64 },

    /// The route id is empty.
    #[error("route id is empty")]
    EmptyId,
}

/// Classified maneuver at a waypoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Maneuver {
    /// Route start.
    Depart,
    /// Continue straight.
    #[default]
    Straight,
    /// Slight left.
    SlightLeft,
    /// Left turn.
    Left,
    /// Sharp left.
    SharpLeft,
    /// Slight right.
    SlightRight,
    /// Right turn.
    Right,
    /// Sharp right.
    SharpRight,
    /// U-turn.
    UTurn,
    /// Enter or leave a roundabout.
    Roundabout,
    /// Merge onto a road.
    Merge,
    /// Take a ramp or exit.
    Ramp,
    /// Destination.
    Arrive,
}

impl Maneuver {
    /// Short label used on the turn screen.
    pub fn as_str(&self) -> &'static str {
        match self {
            Maneuver::Depart => "depart",
            Maneuver::Straight => "straight",
            Maneuver::SlightLeft => "slight left",
            Maneuver::Left => "left",
            Maneuver::SharpLeft => "sharp left",
            Maneuver::SlightRight => "slight right",
            Maneuver::Right => "right",
            Maneuver::SharpRight => "sharp right",
            Maneuver::UTurn => "u-turn",
            Maneuver::Roundabout => "roundabout",
            Maneuver::Merge => "merge",
            Maneuver::Ramp => "ramp",
            Maneuver::Arrive => "arrive",
        }
    }
}

/// A routed maneuver point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    /// Where the maneuver happens.
    pub coordinate: Coordinate,
    /// Human-readable instruction.
    pub instruction: String,
    /// Maneuver kind.
    #[serde(default)]
    pub maneuver: Maneuver,
    /// Distance from the previous waypoint in metres.
    #[serde(default)]
    pub distance_from_previous_m: f64,
    /// Street name after the maneuver.
    #[serde(default)]
    pub street_name: Option<String>,
    /// Bearing after the maneuver in degrees.
    #[serde(default)]
    pub bearing_after: Option<f64>,
}

impl Waypoint {
    /// Create a waypoint with an instruction and maneuver.
    pub fn new(coordinate: Coordinate, instruction: impl Into<String>, maneuver: Maneuver) -> Self {
        Self {
            coordinate,
            instruction: instruction.into(),
            maneuver,
            distance_from_previous_m: 0.0,
            street_name: None,
            bearing_after: None,
        }
    }

    /// Set the street name.
    pub fn with_street(mut self, street: impl Into<String>) -> Self {
        self.street_name = Some(street.into());
        self
    }
}

/// A calculated route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    /// Stable identifier, used as the key for route caches.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Ordered maneuver points, starting with the departure.
    pub waypoints: Vec<Waypoint>,
    /// Full polyline.
    pub geometry: Vec<Coordinate>,
    /// Total distance in metres.
    pub total_distance_m: f64,
    /// Estimated driving time in seconds.
    pub estimated_time_secs: f64,
}

impl Route {
    /// Build a route, filling `distance_from_previous_m` and the totals from
    /// the geometry. `speed_mps` is used for the time estimate.
    pub fn from_parts(
        id: impl Into<String>,
        mut waypoints: Vec<Waypoint>,
        geometry: Vec<Coordinate>,
        speed_mps: f64,
    ) -> Self {
        for i in 1..waypoints.len() {
            let prev = waypoints[i - 1].coordinate;
            waypoints[i].distance_from_previous_m = prev.distance_to(&waypoints[i].coordinate);
        }
        let total_distance_m = polyline_length_m(&geometry);
        let estimated_time_secs = if speed_mps > 0.0 {
            total_distance_m / speed_mps
        } else {
            0.0
        };

        Self {
            id: id.into(),
            name: None,
            waypoints,
            geometry,
            total_distance_m,
            estimated_time_secs,
        }
    }

    /// Set the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Check the structural invariants the navigator relies on.
    pub fn validate(&self) -> Result<(), RouteError> {
        if self.id.trim().is_empty() {
            return Err(RouteError::EmptyId);
        }
        if self.waypoints.is_empty() {
            return Err(RouteError::NoWaypoints);
        }
        if self.geometry.len() < 2 {
            return Err(RouteError::GeometryTooShort(self.geometry.len()));
        }
        let coords = self
            .geometry
            .iter()
            .chain(self.waypoints.iter().map(|w| &w.coordinate));
        for c in coords {
            if !c.is_valid() {
                return Err(RouteError::InvalidCoordinate {
                    lat: c.lat,
                    lon: c.lon,
                });
            }
        }
        Ok(())
    }

    /// Estimated driving time.
    pub fn estimated_time(&self) -> Duration {
        Duration::from_secs_f64(self.estimated_time_secs.max(0.0))
    }

    /// The final waypoint.
    pub fn destination(&self) -> Option<&Waypoint> {
        self.waypoints.last()
    }

    /// Name for display, falling back to the id.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    /// Bounding box of the geometry as (south-west, north-east).
    pub fn bounds(&self) -> Option<(Coordinate, Coordinate)> {
        let first = self.geometry.first()?;
        let mut sw = *first;
        let mut ne = *first;
        for c in &self.geometry {
            sw.lat = sw.lat.min(c.lat);
            sw.lon = sw.lon.min(c.lon);
            ne.lat = ne.lat.max(c.lat);
            ne.lon = ne.lon.max(c.lon);
        }
        Some((sw, ne))
    }
}
