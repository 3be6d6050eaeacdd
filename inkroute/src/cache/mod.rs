//! Route-scoped data caches.
//!
//! Each cache kind (speed limits, POIs, elevation, road surface, place
//! names) stores the data found along one route, keyed by route id. Caches
//! are filled by the prefetch coordinator in the background and queried
//! synchronously from memory by the orchestrator.
//!
//! # Components
//!
//! - [`PrefetchableCache`] - contract the coordinator drives
//! - [`RouteDataCache`] - generic implementation over a [`ChunkSource`]
//! - [`RouteCacheStore`] - one JSON file per route and kind on disk
//! - [`HttpChunkSource`] - reqwest-backed chunk source

mod http;
mod route_data;
mod store;
mod traits;
mod types;

pub use http::HttpChunkSource;
pub use route_data::RouteDataCache;
pub use store::{RouteCacheFile, RouteCacheStore};
pub use traits::{ChunkSource, PrefetchableCache};
pub use types::{CacheError, CacheKind, CacheValue, CachedItem};
