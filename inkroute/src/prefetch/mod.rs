//! Background prefetch of route data.
//!
//! When a route becomes active the [`PrefetchCoordinator`] launches one job
//! per registered cache. Jobs split the route into chunks, query them
//! sequentially with a delay between requests, and report progress after
//! every chunk. Activating another route cancels the previous route's jobs
//! between chunks.
//!
//! # Throttling
//!
//! Jobs consult a [`PrefetchThrottler`] before every inter-request delay.
//! [`ViewerThrottle`] slows prefetch down while nobody is watching the web
//! preview, leaving bandwidth and CPU to the display loop.

mod chunker;
mod config;
mod coordinator;
mod progress;
mod throttler;

pub use chunker::{chunk_route, RouteChunk};
pub use config::{
    PrefetchContext, PrefetchJobConfig, DEFAULT_CHUNK_LENGTH_M, DEFAULT_IDLE_DELAY_FACTOR,
    DEFAULT_REQUEST_DELAY, DEFAULT_REQUEST_TIMEOUT,
};
pub use coordinator::{PrefetchCoordinator, ProgressCallback};
pub use progress::{PrefetchProgress, PrefetchSummary};
pub use throttler::{AlwaysThrottle, NeverThrottle, PrefetchThrottler, ThrottleState, ViewerThrottle};
