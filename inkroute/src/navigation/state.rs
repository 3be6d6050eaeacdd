//! Navigation status types.

use std::fmt;

use serde::Serialize;

use crate::route::Maneuver;

/// Navigation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigationState {
    /// No route is being followed.
    Idle,
    /// Following the route.
    Navigating,
    /// Too far from the route polyline.
    OffRoad,
    /// Reached the destination.
    Arrived,
    /// Stopped by the user.
    Cancelled,
}

impl NavigationState {
    /// Short name for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            NavigationState::Idle => "idle",
            NavigationState::Navigating => "navigating",
            NavigationState::OffRoad => "off_road",
            NavigationState::Arrived => "arrived",
            NavigationState::Cancelled => "cancelled",
        }
    }

    /// Whether positions are still being evaluated.
    pub fn is_active(&self) -> bool {
        matches!(self, NavigationState::Navigating | NavigationState::OffRoad)
    }
}

impl fmt::Display for NavigationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What the display should show while navigating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    /// Large maneuver arrow for an imminent turn.
    TurnScreen,
    /// Map with a navigation overlay.
    MapWithOverlay,
    /// Arrow pointing back to the route.
    OffRoadArrow,
    /// Arrival screen.
    Arrived,
}

impl DisplayMode {
    /// Short name for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            DisplayMode::TurnScreen => "turn_screen",
            DisplayMode::MapWithOverlay => "map_with_overlay",
            DisplayMode::OffRoadArrow => "off_road_arrow",
            DisplayMode::Arrived => "arrived",
        }
    }
}

impl fmt::Display for DisplayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Derive the display mode from the state and distance to the next turn.
pub fn derive_display_mode(
    state: NavigationState,
    distance_to_turn_m: f64,
    turn_screen_distance_m: f64,
) -> DisplayMode {
    match state {
        NavigationState::Navigating if distance_to_turn_m < turn_screen_distance_m => {
            DisplayMode::TurnScreen
        }
        NavigationState::OffRoad => DisplayMode::OffRoadArrow,
        NavigationState::Arrived => DisplayMode::Arrived,
        NavigationState::Navigating | NavigationState::Idle | NavigationState::Cancelled => {
            DisplayMode::MapWithOverlay
        }
    }
}

/// Direction and distance back to the route while off-road.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OffRoadGuidance {
    /// Bearing to the nearest point on the route in degrees.
    pub bearing_deg: f64,
    /// Distance to the nearest point on the route in metres.
    pub distance_m: f64,
}

/// Snapshot of navigation progress.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NavigationStatus {
    /// Route being followed.
    pub route_id: String,
    /// Current state.
    pub state: NavigationState,
    /// Current display mode.
    pub display_mode: DisplayMode,
    /// Index of the upcoming waypoint.
    pub current_waypoint_index: usize,
    /// Number of waypoints on the route.
    pub waypoint_count: usize,
    /// Instruction for the upcoming waypoint.
    pub next_instruction: Option<String>,
    /// Maneuver at the upcoming waypoint.
    pub next_maneuver: Option<Maneuver>,
    /// Street after the upcoming maneuver.
    pub next_street: Option<String>,
    /// Distance to the upcoming waypoint in metres.
    pub distance_to_next_turn_m: f64,
    /// Distance left along the route in metres.
    pub distance_remaining_m: f64,
    /// Estimated time left in seconds.
    pub time_remaining_secs: f64,
    /// Progress along the route, 0-100.
    pub progress_percent: f64,
    /// Guidance back to the route while off-road.
    pub off_road: Option<OffRoadGuidance>,
}

/// Kind of a navigation event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "waypoint")]
pub enum NavigationEventKind {
    /// Ordinary status snapshot (emitted on every evaluation).
    Status,
    /// Distance to the upcoming waypoint dropped under the turn-screen
    /// threshold for the first time.
    TurnApproaching(usize),
    /// The given waypoint was reached.
    WaypointReached(usize),
    /// The position left the route corridor.
    OffRoad,
    /// The destination was reached.
    Arrived,
}

/// A navigation event with the status snapshot taken when it fired.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NavigationUpdate {
    /// What happened.
    pub kind: NavigationEventKind,
    /// Status at that moment.
    pub status: NavigationStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_mode_derivation() {
        use NavigationState::*;

        assert_eq!(derive_display_mode(Navigating, 100.0, 500.0), DisplayMode::TurnScreen);
        assert_eq!(derive_display_mode(Navigating, 500.0, 500.0), DisplayMode::MapWithOverlay);
        assert_eq!(derive_display_mode(OffRoad, 10.0, 500.0), DisplayMode::OffRoadArrow);
        assert_eq!(derive_display_mode(Arrived, 0.0, 500.0), DisplayMode::Arrived);
        assert_eq!(derive_display_mode(Idle, 0.0, 500.0), DisplayMode::MapWithOverlay);
    }

    #[test]
    fn test_state_is_active() {
        assert!(NavigationState::Navigating.is_active());
        assert!(NavigationState::OffRoad.is_active());
        assert!(!NavigationState::Arrived.is_active());
        assert!(!NavigationState::Cancelled.is_active());
        assert!(!NavigationState::Idle.is_active());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(NavigationState::OffRoad.to_string(), "off_road");
        assert_eq!(DisplayMode::TurnScreen.to_string(), "turn_screen");
    }
}
