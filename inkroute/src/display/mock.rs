//! In-memory e-paper panel.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::{debug, warn};

use super::bitmap::Bitmap;
use super::traits::EpaperDisplay;
use crate::service::{BoxFuture, ServiceError};

/// Simulated panel that keeps the last frame.
///
/// With preview enabled every pushed frame is also PNG-encoded so web
/// viewers can fetch it without waiting; with preview disabled the PNG is
/// produced lazily by [`EpaperDisplay::preview_png`].
pub struct MockDisplay {
    width: u32,
    height: u32,
    last: Mutex<Option<Bitmap>>,
    preview: Mutex<Option<Bytes>>,
    preview_enabled: AtomicBool,
    asleep: AtomicBool,
    fail_pushes: AtomicBool,
    frames: AtomicU64,
}

impl MockDisplay {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            last: Mutex::new(None),
            preview: Mutex::new(None),
            preview_enabled: AtomicBool::new(true),
            asleep: AtomicBool::new(true),
            fail_pushes: AtomicBool::new(false),
            frames: AtomicU64::new(0),
        }
    }

    /// Panel size in pixels.
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Frames pushed since creation.
    pub fn frames_shown(&self) -> u64 {
        self.frames.load(Ordering::SeqCst)
    }

    pub fn is_asleep(&self) -> bool {
        self.asleep.load(Ordering::SeqCst)
    }

    /// Whether a PNG preview is cached for the last frame.
    pub fn has_cached_preview(&self) -> bool {
        self.preview.lock().is_some()
    }

    /// Make subsequent pushes fail.
    pub fn fail_pushes(&self, fail: bool) {
        self.fail_pushes.store(fail, Ordering::SeqCst);
    }
}

impl EpaperDisplay for MockDisplay {
    fn display_bitmap(&self, bitmap: Bitmap) -> BoxFuture<'_, Result<(), ServiceError>> {
        Box::pin(async move {
            if self.fail_pushes.load(Ordering::SeqCst) {
                return Err(ServiceError::failed("mock display push failure"));
            }
            if bitmap.width() != self.width || bitmap.height() != self.height {
                return Err(ServiceError::failed(format!(
                    "frame {}x{} does not match panel {}x{}",
                    bitmap.width(),
                    bitmap.height(),
                    self.width,
                    self.height
                )));
            }

            let preview = if self.preview_enabled.load(Ordering::SeqCst) {
                match bitmap.to_png() {
                    Ok(png) => Some(Bytes::from(png)),
                    Err(e) => {
                        warn!(error = %e, "Preview encoding failed");
                        None
                    }
                }
            } else {
                None
            };

            *self.preview.lock() = preview;
            *self.last.lock() = Some(bitmap);
            let n = self.frames.fetch_add(1, Ordering::SeqCst) + 1;
            debug!(frame = n, "Mock display updated");
            Ok(())
        })
    }

    fn sleep(&self) -> BoxFuture<'_, Result<(), ServiceError>> {
        Box::pin(async move {
            self.asleep.store(true, Ordering::SeqCst);
            Ok(())
        })
    }

    fn wake(&self) -> BoxFuture<'_, Result<(), ServiceError>> {
        Box::pin(async move {
            self.asleep.store(false, Ordering::SeqCst);
            Ok(())
        })
    }

    fn last_frame(&self) -> Option<Bitmap> {
        self.last.lock().clone()
    }

    fn is_mock(&self) -> bool {
        true
    }

    fn set_preview_enabled(&self, enabled: bool) {
        self.preview_enabled.store(enabled, Ordering::SeqCst);
    }

    fn preview_png(&self) -> Option<Bytes> {
        if let Some(png) = self.preview.lock().clone() {
            return Some(png);
        }
        let frame = self.last_frame()?;
        match frame.to_png() {
            Ok(png) => Some(Bytes::from(png)),
            Err(e) => {
                warn!(error = %e, "Preview encoding failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_push_keeps_last_frame_and_preview() {
        let display = MockDisplay::new(8, 8);
        display.wake().await.unwrap();
        display.display_bitmap(Bitmap::blank(8, 8)).await.unwrap();

        assert_eq!(display.frames_shown(), 1);
        assert!(display.has_cached_preview());
        assert!(display.preview_png().is_some());
        assert!(!display.is_asleep());
    }

    #[tokio::test]
    async fn test_disabled_preview_is_encoded_on_demand() {
        let display = MockDisplay::new(8, 8);
        display.set_preview_enabled(false);
        display.display_bitmap(Bitmap::blank(8, 8)).await.unwrap();

        assert!(!display.has_cached_preview());
        assert!(display.preview_png().is_some());
    }

    #[tokio::test]
    async fn test_size_mismatch_rejected() {
        let display = MockDisplay::new(8, 8);
        assert!(display.display_bitmap(Bitmap::blank(4, 4)).await.is_err());
        assert!(display.last_frame().is_none());
    }
}
