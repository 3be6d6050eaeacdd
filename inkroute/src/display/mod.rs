//! Rendering and e-paper output.
//!
//! # Components
//!
//! - [`MapRenderer`] / [`EpaperDisplay`] - collaborator contracts
//! - [`SimpleMapRenderer`] - tiny-skia reference renderer
//! - [`MockDisplay`] - in-memory display with PNG preview
//! - [`DisplayPipeline`] - single-flight render-and-push with one pending slot

mod bitmap;
mod mock;
mod pipeline;
pub mod projection;
mod renderer;
mod traits;
mod types;

pub use bitmap::Bitmap;
pub use mock::MockDisplay;
pub use pipeline::{DisplayError, DisplayPipeline, DisplayUpdate};
pub use renderer::SimpleMapRenderer;
pub use traits::{EpaperDisplay, MapRenderer};
pub use types::{OverlayValues, RenderRequest, ScreenType};
