//! Default values for every configuration setting.

use std::path::PathBuf;

use super::settings::*;
use crate::display::ScreenType;
use crate::navigation::{
    DEFAULT_ARRIVAL_THRESHOLD_M, DEFAULT_OFF_ROAD_THRESHOLD_M, DEFAULT_TURN_SCREEN_DISTANCE_M,
    DEFAULT_WAYPOINT_REACHED_M,
};

// =============================================================================
// Display
// =============================================================================

/// Default map zoom.
pub const DEFAULT_ZOOM: u8 = 15;

/// Default lowest selectable zoom.
pub const DEFAULT_MIN_ZOOM: u8 = 8;

/// Default highest selectable zoom.
pub const DEFAULT_MAX_ZOOM: u8 = 18;

/// Default panel width (7.5" e-paper).
pub const DEFAULT_DISPLAY_WIDTH: u32 = 800;

/// Default panel height (7.5" e-paper).
pub const DEFAULT_DISPLAY_HEIGHT: u32 = 480;

// =============================================================================
// Auto-update
// =============================================================================

/// Default refresh interval. E-paper refreshes are slow and visible, so
/// this is deliberately long.
pub const DEFAULT_AUTO_UPDATE_INTERVAL_SECS: u64 = 30;

/// Shortest accepted refresh interval.
pub const MIN_AUTO_UPDATE_INTERVAL_SECS: u64 = 1;

// =============================================================================
// GPS debounce
// =============================================================================

pub const DEFAULT_DEBOUNCE_MIN_INTERVAL_MS: u64 = 1_000;
pub const DEFAULT_DEBOUNCE_MIN_DISTANCE_M: f64 = 10.0;
pub const DEFAULT_DEBOUNCE_MAX_SILENCE_SECS: u64 = 30;

// =============================================================================
// Prefetch
// =============================================================================

pub use crate::prefetch::{DEFAULT_CHUNK_LENGTH_M, DEFAULT_IDLE_DELAY_FACTOR};

pub const DEFAULT_PREFETCH_ENABLED: bool = true;
pub const DEFAULT_REQUEST_DELAY_MS: u64 = crate::prefetch::DEFAULT_REQUEST_DELAY.as_millis() as u64;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = crate::prefetch::DEFAULT_REQUEST_TIMEOUT.as_secs();

/// Default route cache directory (`~/.cache/inkroute/routes` on Linux).
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("inkroute")
        .join("routes")
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            display: DisplaySettings {
                zoom: DEFAULT_ZOOM,
                min_zoom: DEFAULT_MIN_ZOOM,
                max_zoom: DEFAULT_MAX_ZOOM,
                auto_center: true,
                rotate_with_bearing: false,
                screen: ScreenType::Track,
                width: DEFAULT_DISPLAY_WIDTH,
                height: DEFAULT_DISPLAY_HEIGHT,
            },
            auto_update: AutoUpdateSettings {
                enabled: false,
                interval_secs: DEFAULT_AUTO_UPDATE_INTERVAL_SECS,
            },
            gpx: GpxSettings { active: None },
            gps: GpsSettings {
                debounce_min_interval_ms: DEFAULT_DEBOUNCE_MIN_INTERVAL_MS,
                debounce_min_distance_m: DEFAULT_DEBOUNCE_MIN_DISTANCE_M,
                debounce_max_silence_secs: DEFAULT_DEBOUNCE_MAX_SILENCE_SECS,
            },
            navigation: NavigationSettings {
                off_road_threshold_m: DEFAULT_OFF_ROAD_THRESHOLD_M,
                rejoin_threshold_m: DEFAULT_OFF_ROAD_THRESHOLD_M,
                waypoint_reached_m: DEFAULT_WAYPOINT_REACHED_M,
                arrival_threshold_m: DEFAULT_ARRIVAL_THRESHOLD_M,
                turn_screen_distance_m: DEFAULT_TURN_SCREEN_DISTANCE_M,
            },
            prefetch: PrefetchSettings {
                enabled: DEFAULT_PREFETCH_ENABLED,
                cache_dir: default_cache_dir(),
                chunk_length_m: DEFAULT_CHUNK_LENGTH_M,
                request_delay_ms: DEFAULT_REQUEST_DELAY_MS,
                request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
                idle_delay_factor: DEFAULT_IDLE_DELAY_FACTOR,
                speed_limit_url: None,
                poi_url: None,
                elevation_url: None,
                road_surface_url: None,
                location_url: None,
            },
        }
    }
}
