//! In-process position source for tests and simulation.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::debug;

use super::source::PositionSource;
use super::types::{FixQuality, GpsEvent, GpsStatus, Position};
use crate::service::{BoxFuture, ServiceError};

/// Broadcast channel capacity for mock events.
const CHANNEL_CAPACITY: usize = 256;

/// Position source fed programmatically.
///
/// Readings pushed while tracking is stopped are dropped, like a real
/// receiver that has been powered down.
pub struct MockPositionSource {
    sender: broadcast::Sender<GpsEvent>,
    latest: Mutex<Option<Position>>,
    status: Mutex<GpsStatus>,
    tracking: AtomicBool,
    fail_start: AtomicBool,
}

impl Default for MockPositionSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPositionSource {
    /// Create a source with no fix.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            sender,
            latest: Mutex::new(None),
            status: Mutex::new(GpsStatus::no_fix()),
            tracking: AtomicBool::new(false),
            fail_start: AtomicBool::new(false),
        }
    }

    /// Make the next `start_tracking` calls fail (for testing startup errors).
    pub fn fail_on_start(&self, fail: bool) {
        self.fail_start.store(fail, Ordering::SeqCst);
    }

    /// Whether `start_tracking` has been called without a matching stop.
    pub fn is_tracking(&self) -> bool {
        self.tracking.load(Ordering::SeqCst)
    }

    /// Publish a reading. The first reading upgrades the status to a 3D fix.
    pub fn push(&self, position: Position) {
        if !self.is_tracking() {
            debug!("Mock GPS not tracking, dropping position");
            return;
        }

        *self.latest.lock() = Some(position);

        let became_fixed = {
            let mut status = self.status.lock();
            if status.has_fix() {
                false
            } else {
                *status = GpsStatus {
                    fix: FixQuality::Fix3d,
                    satellites: 8,
                };
                true
            }
        };
        if became_fixed {
            let _ = self.sender.send(GpsEvent::Status(self.status()));
        }

        // No receivers is fine; the orchestrator may not be wired yet.
        let _ = self.sender.send(GpsEvent::Position(position));
    }

    /// Publish a status change.
    pub fn set_status(&self, status: GpsStatus) {
        *self.status.lock() = status;
        let _ = self.sender.send(GpsEvent::Status(status));
    }
}

impl PositionSource for MockPositionSource {
    fn current_position(&self) -> Option<Position> {
        *self.latest.lock()
    }

    fn status(&self) -> GpsStatus {
        *self.status.lock()
    }

    fn subscribe(&self) -> broadcast::Receiver<GpsEvent> {
        self.sender.subscribe()
    }

    fn start_tracking(&self) -> BoxFuture<'_, Result<(), ServiceError>> {
        Box::pin(async move {
            if self.fail_start.load(Ordering::SeqCst) {
                return Err(ServiceError::Unavailable("mock GPS start failure".into()));
            }
            self.tracking.store(true, Ordering::SeqCst);
            Ok(())
        })
    }

    fn stop_tracking(&self) -> BoxFuture<'_, Result<(), ServiceError>> {
        Box::pin(async move {
            self.tracking.store(false, Ordering::SeqCst);
            Ok(())
        })
    }

    fn is_mock(&self) -> bool {
        true
    }
}
