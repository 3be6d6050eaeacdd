//! Background tasks: the GPS bridge and the auto-update scheduler.
//!
//! Both hold only a weak reference to the orchestrator so a dropped
//! orchestrator ends them even without `dispose()`.

use std::sync::Weak;
use std::time::Duration;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::facade::Inner;
use crate::position::GpsEvent;

/// Forward GPS events to the orchestrator in arrival order.
///
/// A single task consumes the broadcast channel, so positions are never
/// processed concurrently.
pub(super) fn spawn_gps_bridge(
    inner: Weak<Inner>,
    mut events: broadcast::Receiver<GpsEvent>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    debug!("GPS bridge cancelled");
                    break;
                }

                result = events.recv() => {
                    match result {
                        Ok(event) => {
                            let Some(inner) = inner.upgrade() else {
                                debug!("Orchestrator dropped, stopping GPS bridge");
                                break;
                            };
                            inner.handle_gps_event(event);
                        }
                        Err(RecvError::Closed) => {
                            debug!("GPS event channel closed");
                            break;
                        }
                        Err(RecvError::Lagged(n)) => {
                            warn!(skipped = n, "GPS bridge lagged, readings dropped");
                        }
                    }
                }
            }
        }
    })
}

/// Refresh the display every `interval` until cancelled.
///
/// The first refresh happens immediately. Each tick awaits the display
/// update, so ticks never overlap; a slow refresh delays the next tick.
pub(super) fn spawn_auto_update(
    inner: Weak<Inner>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    debug!("Auto-update scheduler stopped");
                    break;
                }

                _ = ticker.tick() => {}
            }

            let Some(inner) = inner.upgrade() else {
                break;
            };
            match inner.update_display("auto_update").await {
                Ok(outcome) => trace!(?outcome, "Auto-update tick"),
                // Already reported through on_error.
                Err(e) => debug!(error = %e, "Auto-update tick failed"),
            }
        }
    })
}
