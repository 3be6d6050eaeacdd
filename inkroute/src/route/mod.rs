//! Routes and the route-loading collaborator.
//!
//! A [`Route`] is produced once per route calculation (or GPX load) and is
//! shared as `Arc<Route>` by the orchestrator, the navigator and the prefetch
//! coordinator. It is never mutated after creation.

mod source;
mod types;

pub use source::{JsonRouteSource, RouteSource};
pub use types::{Maneuver, Route, RouteError, Waypoint};
