//! Device state and the snapshots the orchestrator hands out.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::ConfigFile;
use crate::display::ScreenType;
use crate::navigation::NavigationStatus;
use crate::position::{GpsStatus, Position};
use crate::route::Route;
use crate::service::ServiceKind;

/// Device-wide state owned by the orchestrator.
///
/// Mutated only through orchestrator methods and navigation display-mode
/// decisions, always under a lock that is never held across an `.await`.
#[derive(Debug, Clone)]
pub struct DeviceState {
    pub active_route: Option<Arc<Route>>,
    pub active_route_path: Option<PathBuf>,
    pub zoom: u8,
    pub min_zoom: u8,
    pub max_zoom: u8,
    pub auto_center: bool,
    pub rotate_with_bearing: bool,
    pub active_screen: ScreenType,
    pub auto_update_enabled: bool,
    pub auto_update_interval: Duration,
    pub width: u32,
    pub height: u32,
    pub web_socket_clients: usize,
    pub last_position: Option<Position>,
    pub gps_status: GpsStatus,
}

impl DeviceState {
    /// State derived from a configuration file. No route is loaded yet.
    pub fn from_config(config: &ConfigFile) -> Self {
        let display = &config.display;
        Self {
            active_route: None,
            active_route_path: None,
            zoom: display.clamp_zoom(i32::from(display.zoom)),
            min_zoom: display.min_zoom,
            max_zoom: display.max_zoom,
            auto_center: display.auto_center,
            rotate_with_bearing: display.rotate_with_bearing,
            active_screen: display.screen,
            auto_update_enabled: config.auto_update.enabled,
            auto_update_interval: config.auto_update.interval(),
            width: display.width,
            height: display.height,
            web_socket_clients: 0,
            last_position: None,
            gps_status: GpsStatus::no_fix(),
        }
    }

    /// Re-read persisted fields after a config reload, keeping runtime ones.
    pub(crate) fn apply_config(&mut self, config: &ConfigFile) {
        let fresh = Self::from_config(config);
        self.zoom = fresh.zoom;
        self.min_zoom = fresh.min_zoom;
        self.max_zoom = fresh.max_zoom;
        self.auto_center = fresh.auto_center;
        self.rotate_with_bearing = fresh.rotate_with_bearing;
        self.active_screen = fresh.active_screen;
        self.auto_update_enabled = fresh.auto_update_enabled;
        self.auto_update_interval = fresh.auto_update_interval;
        self.width = fresh.width;
        self.height = fresh.height;
    }

    /// Clamp a zoom level into the configured range.
    pub fn clamp_zoom(&self, zoom: i32) -> u8 {
        zoom.clamp(i32::from(self.min_zoom), i32::from(self.max_zoom)) as u8
    }
}

/// Payload of `on_display_update`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayRefresh {
    /// Pipeline runs performed by this request, follow-ups included.
    pub runs: u32,
    /// Frames pushed since start-up.
    pub total_frames: u64,
    pub screen: ScreenType,
    pub at: DateTime<Utc>,
}

/// Payload of `on_error`.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorEvent {
    /// Orchestrator operation that was running.
    pub operation: &'static str,
    pub service: ServiceKind,
    pub message: String,
}

/// Serialisable snapshot for the serving layer.
#[derive(Debug, Clone, Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub initialized: bool,
    pub gps: GpsStatus,
    pub is_mock_gps: bool,
    pub position: Option<Position>,
    pub zoom: u8,
    pub auto_center: bool,
    pub rotate_with_bearing: bool,
    pub active_screen: ScreenType,
    pub auto_update_enabled: bool,
    pub auto_update_running: bool,
    pub auto_update_interval_secs: u64,
    pub display_busy: bool,
    pub frames_rendered: u64,
    pub failed_renders: u64,
    pub last_display_update: Option<DateTime<Utc>>,
    pub active_route_id: Option<String>,
    pub active_route_name: Option<String>,
    pub active_route_path: Option<PathBuf>,
    pub navigation: Option<NavigationStatus>,
    pub prefetch_running: bool,
    pub web_socket_clients: usize,
}
