//! Typed settings, one struct per INI section.

use std::path::PathBuf;
use std::time::Duration;

use crate::cache::CacheKind;
use crate::display::ScreenType;
use crate::navigation::NavigationConfig;
use crate::position::DebounceConfig;
use crate::prefetch::PrefetchJobConfig;

/// The whole configuration file.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
    pub display: DisplaySettings,
    pub auto_update: AutoUpdateSettings,
    pub gpx: GpxSettings,
    pub gps: GpsSettings,
    pub navigation: NavigationSettings,
    pub prefetch: PrefetchSettings,
}

/// `[display]`
#[derive(Debug, Clone, PartialEq)]
pub struct DisplaySettings {
    pub zoom: u8,
    pub min_zoom: u8,
    pub max_zoom: u8,
    pub auto_center: bool,
    pub rotate_with_bearing: bool,
    pub screen: ScreenType,
    pub width: u32,
    pub height: u32,
}

impl DisplaySettings {
    /// Clamp a zoom level into the configured range.
    pub fn clamp_zoom(&self, zoom: i32) -> u8 {
        zoom.clamp(i32::from(self.min_zoom), i32::from(self.max_zoom)) as u8
    }
}

/// `[auto_update]`
#[derive(Debug, Clone, PartialEq)]
pub struct AutoUpdateSettings {
    pub enabled: bool,
    pub interval_secs: u64,
}

impl AutoUpdateSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// `[gpx]`
#[derive(Debug, Clone, PartialEq)]
pub struct GpxSettings {
    /// Route file to restore at start-up.
    pub active: Option<PathBuf>,
}

/// `[gps]`
#[derive(Debug, Clone, PartialEq)]
pub struct GpsSettings {
    pub debounce_min_interval_ms: u64,
    pub debounce_min_distance_m: f64,
    pub debounce_max_silence_secs: u64,
}

impl GpsSettings {
    pub fn debounce_config(&self) -> DebounceConfig {
        DebounceConfig {
            min_interval: Duration::from_millis(self.debounce_min_interval_ms),
            min_distance_m: self.debounce_min_distance_m,
            max_silence: Duration::from_secs(self.debounce_max_silence_secs),
        }
    }
}

/// `[navigation]`
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationSettings {
    pub off_road_threshold_m: f64,
    pub rejoin_threshold_m: f64,
    pub waypoint_reached_m: f64,
    pub arrival_threshold_m: f64,
    pub turn_screen_distance_m: f64,
}

impl NavigationSettings {
    pub fn navigation_config(&self) -> NavigationConfig {
        NavigationConfig {
            off_road_threshold_m: self.off_road_threshold_m,
            rejoin_threshold_m: self.rejoin_threshold_m,
            waypoint_reached_m: self.waypoint_reached_m,
            arrival_threshold_m: self.arrival_threshold_m,
            turn_screen_distance_m: self.turn_screen_distance_m,
            ..NavigationConfig::default()
        }
    }
}

/// `[prefetch]`
#[derive(Debug, Clone, PartialEq)]
pub struct PrefetchSettings {
    pub enabled: bool,
    pub cache_dir: PathBuf,
    pub chunk_length_m: f64,
    pub request_delay_ms: u64,
    pub request_timeout_secs: u64,
    pub idle_delay_factor: f64,
    pub speed_limit_url: Option<String>,
    pub poi_url: Option<String>,
    pub elevation_url: Option<String>,
    pub road_surface_url: Option<String>,
    pub location_url: Option<String>,
}

impl PrefetchSettings {
    pub fn job_config(&self) -> PrefetchJobConfig {
        PrefetchJobConfig {
            chunk_length_m: self.chunk_length_m,
            request_delay: Duration::from_millis(self.request_delay_ms),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            idle_delay_factor: self.idle_delay_factor,
        }
    }

    /// Configured endpoint for a cache kind.
    pub fn endpoint(&self, kind: CacheKind) -> Option<&str> {
        match kind {
            CacheKind::SpeedLimit => self.speed_limit_url.as_deref(),
            CacheKind::Poi => self.poi_url.as_deref(),
            CacheKind::Elevation => self.elevation_url.as_deref(),
            CacheKind::RoadSurface => self.road_surface_url.as_deref(),
            CacheKind::Location => self.location_url.as_deref(),
        }
    }
}
