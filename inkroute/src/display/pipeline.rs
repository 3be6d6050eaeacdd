//! Single-flight display updates.
//!
//! At most one render-and-push runs at a time. A request arriving while a
//! run is in flight arms a single pending slot; any number of such requests
//! collapse into one follow-up run, performed by the caller that owns the
//! in-flight run once it finishes. The state lives in one atomic so arming
//! the slot and finishing a run cannot race into a lost wakeup.
//!
//! ```text
//! IDLE --request--> RUNNING --request--> RUNNING_PENDING
//!   ^                  |                      |
//!   +----run done------+   run done: re-run --+--> RUNNING
//! ```

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, error};

use super::traits::{EpaperDisplay, MapRenderer};
use super::types::RenderRequest;
use crate::service::ServiceError;

const IDLE: u8 = 0;
const RUNNING: u8 = 1;
const RUNNING_PENDING: u8 = 2;

/// Errors raised inside the display pipeline.
#[derive(Debug, Error)]
pub enum DisplayError {
    /// The renderer failed.
    #[error("render failed: {0}")]
    Render(#[source] ServiceError),

    /// The panel rejected the frame.
    #[error("display push failed: {0}")]
    Push(#[source] ServiceError),

    /// A frame buffer had the wrong size.
    #[error("invalid bitmap: {0}")]
    InvalidBitmap(String),

    /// PNG encoding failed.
    #[error("PNG encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

/// Outcome of a display update request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayUpdate {
    /// This caller ran the pipeline, `runs` times including follow-ups.
    Rendered { runs: u32 },
    /// A run was in flight; the request was folded into its follow-up.
    Coalesced,
}

/// Resets the state to idle if a run is abandoned mid-way (panic or drop).
struct BusyGuard<'a> {
    state: &'a AtomicU8,
    armed: bool,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.state.store(IDLE, Ordering::Release);
        }
    }
}

/// Render-and-push pipeline shared by every display trigger.
pub struct DisplayPipeline {
    state: AtomicU8,
    renderer: Arc<dyn MapRenderer>,
    display: Arc<dyn EpaperDisplay>,
    completed_runs: AtomicU64,
    failed_runs: AtomicU64,
    last_frame_at: Mutex<Option<DateTime<Utc>>>,
}

impl DisplayPipeline {
    pub fn new(renderer: Arc<dyn MapRenderer>, display: Arc<dyn EpaperDisplay>) -> Self {
        Self {
            state: AtomicU8::new(IDLE),
            renderer,
            display,
            completed_runs: AtomicU64::new(0),
            failed_runs: AtomicU64::new(0),
            last_frame_at: Mutex::new(None),
        }
    }

    /// Whether a run is in flight.
    pub fn is_busy(&self) -> bool {
        self.state.load(Ordering::Acquire) != IDLE
    }

    /// Whether a follow-up run is armed.
    pub fn has_pending(&self) -> bool {
        self.state.load(Ordering::Acquire) == RUNNING_PENDING
    }

    /// Successful runs since creation.
    pub fn completed_runs(&self) -> u64 {
        self.completed_runs.load(Ordering::Relaxed)
    }

    /// Failed runs since creation.
    pub fn failed_runs(&self) -> u64 {
        self.failed_runs.load(Ordering::Relaxed)
    }

    /// When the last frame reached the panel.
    pub fn last_frame_at(&self) -> Option<DateTime<Utc>> {
        *self.last_frame_at.lock()
    }

    pub fn renderer(&self) -> &Arc<dyn MapRenderer> {
        &self.renderer
    }

    pub fn display(&self) -> &Arc<dyn EpaperDisplay> {
        &self.display
    }

    /// Request a display update.
    ///
    /// `snapshot` is called at the start of every run so a follow-up sees
    /// the newest state. Every failed run is passed to `on_failure`; the
    /// result reflects the last run this caller performed. The busy state is
    /// released on every exit path.
    pub async fn update<S, F>(&self, snapshot: S, on_failure: F) -> Result<DisplayUpdate, DisplayError>
    where
        S: Fn() -> RenderRequest,
        F: Fn(&DisplayError),
    {
        if !self.acquire() {
            debug!("Display update coalesced into pending run");
            return Ok(DisplayUpdate::Coalesced);
        }

        let mut guard = BusyGuard {
            state: &self.state,
            armed: true,
        };
        let mut runs = 0u32;

        loop {
            runs += 1;
            let result = self.run_once(&snapshot).await;

            if let Err(e) = &result {
                self.failed_runs.fetch_add(1, Ordering::Relaxed);
                error!(error = %e, "Display update failed");
                on_failure(e);
            }

            match self
                .state
                .compare_exchange(RUNNING, IDLE, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => {
                    guard.armed = false;
                    return result.map(|_| DisplayUpdate::Rendered { runs });
                }
                Err(_) => {
                    // A request arrived mid-run: consume the slot and go again.
                    self.state.store(RUNNING, Ordering::Release);
                    debug!(run = runs + 1, "Running pending display update");
                }
            }
        }
    }

    /// Try to become the runner; otherwise arm the pending slot.
    fn acquire(&self) -> bool {
        loop {
            match self
                .state
                .compare_exchange(IDLE, RUNNING, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return true,
                Err(RUNNING) => {
                    if self
                        .state
                        .compare_exchange(RUNNING, RUNNING_PENDING, Ordering::AcqRel, Ordering::Acquire)
                        .is_ok()
                    {
                        return false;
                    }
                    // The run finished in between; retry from the top.
                }
                Err(_) => return false,
            }
        }
    }

    async fn run_once<S>(&self, snapshot: &S) -> Result<(), DisplayError>
    where
        S: Fn() -> RenderRequest,
    {
        let started = Instant::now();
        let request = snapshot();
        let bitmap = self
            .renderer
            .render_viewport(&request)
            .await
            .map_err(DisplayError::Render)?;
        self.display
            .display_bitmap(bitmap)
            .await
            .map_err(DisplayError::Push)?;

        self.completed_runs.fetch_add(1, Ordering::Relaxed);
        *self.last_frame_at.lock() = Some(Utc::now());
        debug!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Display updated"
        );
        Ok(())
    }
}
