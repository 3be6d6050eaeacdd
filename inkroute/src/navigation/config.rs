//! Navigation thresholds.

/// Perpendicular distance from the route that counts as off-road.
pub const DEFAULT_OFF_ROAD_THRESHOLD_M: f64 = 500.0;

/// Distance at which a waypoint counts as reached.
pub const DEFAULT_WAYPOINT_REACHED_M: f64 = 30.0;

/// Distance to the final waypoint at which the trip counts as arrived.
pub const DEFAULT_ARRIVAL_THRESHOLD_M: f64 = 50.0;

/// Distance to the next turn below which the turn screen is shown.
pub const DEFAULT_TURN_SCREEN_DISTANCE_M: f64 = 500.0;

/// Segments searched ahead of the last matched segment for along-track
/// progress.
pub const DEFAULT_PROGRESS_WINDOW_SEGMENTS: usize = 64;

/// Thresholds for the drive navigator.
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationConfig {
    /// Distance from the polyline that enters `OffRoad`.
    pub off_road_threshold_m: f64,
    /// Distance from the polyline below which `OffRoad` returns to
    /// `Navigating`. Equal to `off_road_threshold_m` by default.
    pub rejoin_threshold_m: f64,
    /// Distance at which a waypoint counts as reached.
    pub waypoint_reached_m: f64,
    /// Distance to the final waypoint that counts as arrival.
    pub arrival_threshold_m: f64,
    /// Distance to the next turn below which the turn screen is shown.
    pub turn_screen_distance_m: f64,
    /// Segments searched ahead of the last matched segment.
    pub progress_window_segments: usize,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            off_road_threshold_m: DEFAULT_OFF_ROAD_THRESHOLD_M,
            rejoin_threshold_m: DEFAULT_OFF_ROAD_THRESHOLD_M,
            waypoint_reached_m: DEFAULT_WAYPOINT_REACHED_M,
            arrival_threshold_m: DEFAULT_ARRIVAL_THRESHOLD_M,
            turn_screen_distance_m: DEFAULT_TURN_SCREEN_DISTANCE_M,
            progress_window_segments: DEFAULT_PROGRESS_WINDOW_SEGMENTS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_thresholds() {
        let config = NavigationConfig::default();
        assert_eq!(config.off_road_threshold_m, 500.0);
        assert_eq!(config.rejoin_threshold_m, config.off_road_threshold_m);
        assert_eq!(config.waypoint_reached_m, 30.0);
        assert_eq!(config.arrival_threshold_m, 50.0);
        assert_eq!(config.turn_screen_distance_m, 500.0);
    }
}
