//! Cache contracts.
//!
//! Both traits return [`BoxFuture`] so they stay dyn-compatible; the
//! coordinator holds caches as `Arc<dyn PrefetchableCache>`.

use std::sync::Arc;

use super::types::{CacheError, CacheKind, CacheValue, CachedItem};
use crate::position::Position;
use crate::prefetch::{PrefetchContext, PrefetchSummary, RouteChunk};
use crate::route::Route;
use crate::service::{BoxFuture, ServiceError};

/// A cache the prefetch coordinator can fill for a route.
pub trait PrefetchableCache: Send + Sync {
    /// Which kind of data this cache holds.
    fn kind(&self) -> CacheKind;

    /// Fill the cache for `route`.
    ///
    /// Loads an existing complete cache from disk when there is one;
    /// otherwise queries the chunk source chunk by chunk, reporting progress
    /// through `ctx` after every chunk.
    fn prefetch_route_data(
        &self,
        route: Arc<Route>,
        ctx: PrefetchContext,
    ) -> BoxFuture<'_, Result<PrefetchSummary, CacheError>>;

    /// Make `route_id` the route lookups answer for.
    ///
    /// Called by the coordinator on launch, after the previous route's job
    /// was cancelled.
    fn activate_route(&self, _route_id: &str) {}

    /// Nearest value for `position` from the active route's in-memory data.
    /// Never touches disk or the network.
    fn current_value(&self, position: &Position) -> Option<CacheValue>;

    /// Whether a complete cache for `route_id` exists on disk.
    fn has_route_cache<'a>(&'a self, route_id: &'a str) -> BoxFuture<'a, bool>;

    /// Delete the cache for one route.
    fn clear_route_cache<'a>(&'a self, route_id: &'a str) -> BoxFuture<'a, Result<(), CacheError>>;

    /// Delete every cached route of this kind.
    fn clear_all_cache(&self) -> BoxFuture<'_, Result<(), CacheError>>;
}

/// Answers data queries for one chunk of route geometry.
pub trait ChunkSource: Send + Sync {
    /// Query the data along `chunk`.
    fn fetch<'a>(&'a self, chunk: &'a RouteChunk) -> BoxFuture<'a, Result<Vec<CachedItem>, ServiceError>>;
}
