//! GPS collaborator contract.

use tokio::sync::broadcast;

use super::types::{GpsEvent, GpsStatus, Position};
use crate::service::{BoxFuture, ServiceError};

/// A source of position readings (serial GPS driver, simulator, ...).
///
/// Pull access via [`current_position`](Self::current_position), push access
/// via [`subscribe`](Self::subscribe). Events on one receiver arrive in the
/// order the source produced them.
pub trait PositionSource: Send + Sync {
    /// Most recent reading, if the receiver has produced one.
    fn current_position(&self) -> Option<Position>;

    /// Current receiver status.
    fn status(&self) -> GpsStatus;

    /// Subscribe to position and status events.
    fn subscribe(&self) -> broadcast::Receiver<GpsEvent>;

    /// Start producing readings.
    fn start_tracking(&self) -> BoxFuture<'_, Result<(), ServiceError>>;

    /// Stop producing readings.
    fn stop_tracking(&self) -> BoxFuture<'_, Result<(), ServiceError>>;

    /// Whether this source is a simulator rather than real hardware.
    fn is_mock(&self) -> bool {
        false
    }
}
