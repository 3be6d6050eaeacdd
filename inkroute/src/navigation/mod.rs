//! Turn-by-turn drive navigation.
//!
//! [`DriveNavigator`] reconciles live positions against a precomputed
//! [`Route`](crate::route::Route) and emits [`NavigationUpdate`]s that the
//! orchestrator fans out and turns into display decisions.
//!
//! # State Machine
//!
//! ```text
//! Idle --start--> Navigating --[>= off-road threshold]--> OffRoad
//! OffRoad --[< rejoin threshold]--> Navigating
//! Navigating --[final waypoint within arrival threshold]--> Arrived
//! Navigating | OffRoad --stop--> Cancelled (then reset to Idle)
//! ```
//!
//! `Arrived` is terminal for a route instance; a new instance is created by
//! the next start.

mod config;
mod machine;
mod state;

pub use config::{
    NavigationConfig, DEFAULT_ARRIVAL_THRESHOLD_M, DEFAULT_OFF_ROAD_THRESHOLD_M,
    DEFAULT_TURN_SCREEN_DISTANCE_M, DEFAULT_WAYPOINT_REACHED_M,
};
pub use machine::DriveNavigator;
pub use state::{
    derive_display_mode, DisplayMode, NavigationEventKind, NavigationState, NavigationStatus,
    NavigationUpdate, OffRoadGuidance,
};
