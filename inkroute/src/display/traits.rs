//! Renderer and display collaborator contracts.

use bytes::Bytes;

use super::bitmap::Bitmap;
use super::types::RenderRequest;
use crate::service::{BoxFuture, ServiceError};

/// Produces frames from a render request.
pub trait MapRenderer: Send + Sync {
    /// Load styles, fonts or tiles. Called once during initialisation.
    fn prepare(&self) -> BoxFuture<'_, Result<(), ServiceError>>;

    /// Render one frame.
    fn render_viewport<'a>(
        &'a self,
        request: &'a RenderRequest,
    ) -> BoxFuture<'a, Result<Bitmap, ServiceError>>;
}

/// The physical (or simulated) e-paper panel.
pub trait EpaperDisplay: Send + Sync {
    /// Push a frame to the panel.
    fn display_bitmap(&self, bitmap: Bitmap) -> BoxFuture<'_, Result<(), ServiceError>>;

    /// Put the panel into deep sleep.
    fn sleep(&self) -> BoxFuture<'_, Result<(), ServiceError>>;

    /// Wake the panel from deep sleep.
    fn wake(&self) -> BoxFuture<'_, Result<(), ServiceError>>;

    /// Last frame pushed, if the driver keeps one.
    fn last_frame(&self) -> Option<Bitmap>;

    /// Whether this is a simulated panel.
    fn is_mock(&self) -> bool {
        false
    }

    /// Enable or disable eager PNG preview encoding.
    fn set_preview_enabled(&self, _enabled: bool) {}

    /// PNG preview of the last frame, for simulated panels.
    fn preview_png(&self) -> Option<Bytes> {
        None
    }
}
