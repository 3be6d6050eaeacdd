//! Position stream types, the GPS collaborator contract and the debouncer.
//!
//! # Components
//!
//! - [`Position`], [`GpsStatus`], [`GpsEvent`] - data produced by the GPS
//! - [`PositionSource`] - the collaborator contract consumed by the orchestrator
//! - [`MockPositionSource`] - in-process source used by tests and the CLI simulator
//! - [`PositionDebouncer`] - rate/distance filter in front of display decisions

mod debounce;
mod mock;
mod source;
mod types;

pub use debounce::{DebounceConfig, PositionDebouncer};
pub use mock::MockPositionSource;
pub use source::PositionSource;
pub use types::{FixQuality, GpsEvent, GpsStatus, Position};
