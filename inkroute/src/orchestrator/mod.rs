//! Central coordinator for the tracker.
//!
//! [`Orchestrator`] owns device-wide state and is the only entry point the
//! serving layer talks to. It coordinates:
//!
//! - **GPS** - a single bridge task consumes the position stream, debounces
//!   it and feeds the navigator
//! - **Display** - every refresh goes through one single-flight
//!   [`DisplayPipeline`](crate::display::DisplayPipeline)
//! - **Auto-update** - a periodic scheduler awaiting each refresh
//! - **Drive navigation** - a [`DriveNavigator`](crate::navigation::DriveNavigator)
//!   per started route
//! - **Prefetch** - background cache jobs launched on route activation
//! - **Events** - one registry per event kind, with panic isolation
//!
//! # Startup Sequence
//!
//! 1. Config reload
//! 2. GPS tracking, display wake, renderer preparation (required)
//! 3. Optional services such as WiFi onboarding (failures logged)
//! 4. GPS bridge task
//! 5. Restore active route and auto-update from config
//!
//! `dispose()` undoes this in reverse order.

mod builder;
mod channels;
mod error;
mod facade;
mod tasks;
mod types;

pub use builder::OrchestratorBuilder;
pub use error::{DependencySource, OrchestratorError};
pub use facade::Orchestrator;
pub use types::{DeviceState, DisplayRefresh, ErrorEvent, SystemStatus};

pub use crate::display::{DisplayUpdate, ScreenType};
pub use crate::service::OptionalService;
