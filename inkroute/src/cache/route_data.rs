//! Generic route data cache over a chunk source.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::store::{RouteCacheFile, RouteCacheStore};
use super::traits::{ChunkSource, PrefetchableCache};
use super::types::{CacheError, CacheKind, CacheValue, CachedItem};
use crate::position::Position;
use crate::prefetch::{chunk_route, PrefetchContext, PrefetchProgress, PrefetchSummary};
use crate::route::Route;
use crate::service::BoxFuture;

/// Cache of one data kind, filled chunk by chunk from a [`ChunkSource`].
///
/// Loaded routes are kept in memory keyed by route id; lookups only consult
/// the route activated last.
pub struct RouteDataCache<S> {
    kind: CacheKind,
    source: S,
    store: RouteCacheStore,
    routes: DashMap<String, Arc<Vec<CachedItem>>>,
    active_route: Mutex<Option<String>>,
    /// Serialises disk writes so two jobs for one route never share a temp file.
    write_lock: tokio::sync::Mutex<()>,
}

impl<S: ChunkSource> RouteDataCache<S> {
    /// Create a cache storing files under `<cache_root>/<kind>/`.
    pub fn new(kind: CacheKind, source: S, cache_root: impl AsRef<std::path::Path>) -> Self {
        Self {
            kind,
            source,
            store: RouteCacheStore::new(cache_root, kind),
            routes: DashMap::new(),
            active_route: Mutex::new(None),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn store(&self) -> &RouteCacheStore {
        &self.store
    }

    /// Items held in memory for a route.
    pub fn items(&self, route_id: &str) -> Option<Arc<Vec<CachedItem>>> {
        self.routes.get(route_id).map(|e| Arc::clone(e.value()))
    }

    /// Take the active slot unless the job was superseded.
    ///
    /// The check and the write share the lock, and the coordinator cancels
    /// before it activates the next route, so a cancelled job never wins.
    fn activate(&self, route_id: &str, ctx: &PrefetchContext) -> Result<(), CacheError> {
        let mut active = self.active_route.lock();
        if ctx.is_cancelled() {
            return Err(CacheError::Cancelled);
        }
        *active = Some(route_id.to_string());
        Ok(())
    }

    async fn persist(&self, file: &RouteCacheFile, ctx: &PrefetchContext) -> Result<(), CacheError> {
        let _guard = self.write_lock.lock().await;
        if ctx.is_cancelled() {
            return Err(CacheError::Cancelled);
        }
        if let Err(e) = self.store.save(file).await {
            warn!(kind = %self.kind, error = %e, "Failed to persist route cache");
        }
        Ok(())
    }

    async fn hydrate(&self, route: &Route, ctx: &PrefetchContext) -> Result<Option<PrefetchSummary>, CacheError> {
        let file = match self.store.load(&route.id).await? {
            Some(file) if file.complete => file,
            _ => return Ok(None),
        };
        if ctx.is_cancelled() {
            return Err(CacheError::Cancelled);
        }

        let items = file.items.len();
        self.routes.insert(route.id.clone(), Arc::new(file.items));
        self.activate(&route.id, ctx)?;
        info!(kind = %self.kind, route_id = %route.id, items, "Route cache loaded from disk");

        ctx.report(PrefetchProgress {
            kind: self.kind,
            route_id: route.id.clone(),
            completed: file.chunk_count,
            total: file.chunk_count,
            found: items,
            complete: true,
        });

        Ok(Some(PrefetchSummary {
            kind: self.kind,
            route_id: route.id.clone(),
            chunks: file.chunk_count,
            failed_chunks: 0,
            items,
            hydrated: true,
        }))
    }

    async fn fetch_all(&self, route: &Route, ctx: &PrefetchContext) -> Result<PrefetchSummary, CacheError> {
        let chunks = chunk_route(&route.geometry, ctx.config().chunk_length_m);
        let total = chunks.len();
        let mut items: Vec<CachedItem> = Vec::new();
        let mut failed = 0usize;

        if ctx.is_cancelled() {
            return Err(CacheError::Cancelled);
        }
        self.routes.insert(route.id.clone(), Arc::new(Vec::new()));
        self.activate(&route.id, ctx)?;
        info!(kind = %self.kind, route_id = %route.id, chunks = total, "Prefetch started");

        for (i, chunk) in chunks.iter().enumerate() {
            if i > 0 {
                let delay = ctx.request_delay();
                tokio::select! {
                    biased;
                    _ = ctx.cancelled() => return Err(CacheError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
            } else if ctx.is_cancelled() {
                return Err(CacheError::Cancelled);
            }

            let timeout = ctx.config().request_timeout;
            let fetched = tokio::time::timeout(timeout, self.source.fetch(chunk)).await;
            // A superseded job must not touch memory, disk or subscribers.
            if ctx.is_cancelled() {
                return Err(CacheError::Cancelled);
            }
            match fetched {
                Ok(Ok(found)) => {
                    debug!(kind = %self.kind, chunk = i, found = found.len(), "Chunk fetched");
                    items.extend(found);
                }
                Ok(Err(e)) => {
                    failed += 1;
                    warn!(kind = %self.kind, chunk = i, error = %e, "Chunk request failed, skipping");
                }
                Err(_) => {
                    failed += 1;
                    warn!(kind = %self.kind, chunk = i, timeout_ms = timeout.as_millis() as u64, "Chunk request timed out, skipping");
                }
            }

            let done = i + 1 == total;
            self.routes.insert(route.id.clone(), Arc::new(items.clone()));
            let file = RouteCacheFile {
                route_id: route.id.clone(),
                kind: self.kind,
                // Files with skipped chunks are refetched on the next activation.
                complete: done && failed == 0,
                chunk_count: total,
                updated_at: Utc::now(),
                items: items.clone(),
            };
            self.persist(&file, ctx).await?;

            ctx.report(PrefetchProgress {
                kind: self.kind,
                route_id: route.id.clone(),
                completed: i + 1,
                total,
                found: items.len(),
                complete: done,
            });
        }

        if total > 0 && failed == total {
            return Err(CacheError::AllChunksFailed {
                kind: self.kind,
                chunks: total,
            });
        }

        info!(
            kind = %self.kind,
            route_id = %route.id,
            items = items.len(),
            failed_chunks = failed,
            "Prefetch complete"
        );

        Ok(PrefetchSummary {
            kind: self.kind,
            route_id: route.id.clone(),
            chunks: total,
            failed_chunks: failed,
            items: items.len(),
            hydrated: false,
        })
    }
}

impl<S: ChunkSource> PrefetchableCache for RouteDataCache<S> {
    fn kind(&self) -> CacheKind {
        self.kind
    }

    fn activate_route(&self, route_id: &str) {
        *self.active_route.lock() = Some(route_id.to_string());
    }

    fn prefetch_route_data(
        &self,
        route: Arc<Route>,
        ctx: PrefetchContext,
    ) -> BoxFuture<'_, Result<PrefetchSummary, CacheError>> {
        Box::pin(async move {
            if let Some(summary) = self.hydrate(&route, &ctx).await? {
                return Ok(summary);
            }
            self.fetch_all(&route, &ctx).await
        })
    }

    fn current_value(&self, position: &Position) -> Option<CacheValue> {
        let route_id = self.active_route.lock().clone()?;
        let items = self.items(&route_id)?;
        let here = position.coordinate();
        let radius = self.kind.lookup_radius_m();

        items
            .iter()
            .map(|item| (here.distance_to(&item.coordinate), item))
            .filter(|(d, _)| *d <= radius)
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, item)| item.value.clone())
    }

    fn has_route_cache<'a>(&'a self, route_id: &'a str) -> BoxFuture<'a, bool> {
        Box::pin(self.store.has_complete(route_id))
    }

    fn clear_route_cache<'a>(&'a self, route_id: &'a str) -> BoxFuture<'a, Result<(), CacheError>> {
        Box::pin(async move {
            self.routes.remove(route_id);
            {
                let mut active = self.active_route.lock();
                if active.as_deref() == Some(route_id) {
                    *active = None;
                }
            }
            self.store.remove(route_id).await
        })
    }

    fn clear_all_cache(&self) -> BoxFuture<'_, Result<(), CacheError>> {
        Box::pin(async move {
            self.routes.clear();
            *self.active_route.lock() = None;
            self.store.remove_all().await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::{destination_point, Coordinate};
    use crate::prefetch::{NeverThrottle, PrefetchJobConfig, RouteChunk};
    use crate::route::{Maneuver, Waypoint};
    use crate::service::ServiceError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::sync::Notify;
    use tokio_util::sync::CancellationToken;

    /// Returns one speed limit per chunk; fails the chunks listed in `fail`.
    struct FakeSource {
        calls: AtomicUsize,
        fail: Vec<usize>,
    }

    impl ChunkSource for FakeSource {
        fn fetch<'a>(&'a self, chunk: &'a RouteChunk) -> BoxFuture<'a, Result<Vec<CachedItem>, ServiceError>> {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                if self.fail.contains(&chunk.index) {
                    return Err(ServiceError::failed("upstream 503"));
                }
                Ok(vec![CachedItem::new(
                    chunk.points[0],
                    CacheValue::SpeedLimit {
                        kmh: 30 + chunk.index as u16,
                    },
                )])
            })
        }
    }

    fn route() -> Arc<Route> {
        let start = Coordinate::new(48.137, 11.575);
        let end = destination_point(&start, 0.0, 3_000.0);
        let wps = vec![
            Waypoint::new(start, "Start", Maneuver::Depart),
            Waypoint::new(end, "End", Maneuver::Arrive),
        ];
        Arc::new(Route::from_parts("r1", wps, vec![start, end], 10.0))
    }

    fn context(progress: Arc<parking_lot::Mutex<Vec<PrefetchProgress>>>) -> PrefetchContext {
        let config = PrefetchJobConfig {
            chunk_length_m: 1_000.0,
            request_delay: Duration::from_millis(1),
            request_timeout: Duration::from_secs(1),
            idle_delay_factor: 1.0,
        };
        PrefetchContext::new(
            config,
            CancellationToken::new(),
            Arc::new(NeverThrottle),
            Arc::new(move |p| progress.lock().push(p)),
        )
    }

    fn cache(dir: &TempDir, fail: Vec<usize>) -> RouteDataCache<FakeSource> {
        RouteDataCache::new(
            CacheKind::SpeedLimit,
            FakeSource {
                calls: AtomicUsize::new(0),
                fail,
            },
            dir.path(),
        )
    }

    #[tokio::test]
    async fn test_prefetch_reports_progress_per_chunk() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir, vec![]);
        let progress = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let summary = cache
            .prefetch_route_data(route(), context(progress.clone()))
            .await
            .unwrap();

        assert_eq!(summary.chunks, 3);
        assert_eq!(summary.items, 3);
        let events = progress.lock();
        assert_eq!(events.len(), 3);
        assert_eq!(events.iter().map(|p| p.completed).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert!(events[2].complete);
        assert!(cache.has_route_cache("r1").await);
    }

    #[tokio::test]
    async fn test_failed_chunk_is_skipped() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir, vec![1]);
        let progress = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let summary = cache
            .prefetch_route_data(route(), context(progress.clone()))
            .await
            .unwrap();

        assert_eq!(summary.failed_chunks, 1);
        assert_eq!(summary.items, 2);
        assert_eq!(progress.lock().len(), 3);
        assert!(!cache.has_route_cache("r1").await);

        // The partial file is not reused, so the next activation asks again.
        let summary = cache
            .prefetch_route_data(route(), context(progress))
            .await
            .unwrap();
        assert!(!summary.hydrated);
        assert_eq!(cache.source.calls.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn test_progress_names_route() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir, vec![]);
        let progress = Arc::new(parking_lot::Mutex::new(Vec::new()));

        cache
            .prefetch_route_data(route(), context(progress.clone()))
            .await
            .unwrap();

        assert!(progress.lock().iter().all(|p| p.route_id == "r1"));
    }

    /// Blocks every fetch until released.
    struct GatedSource {
        entered: Notify,
        release: Notify,
    }

    impl ChunkSource for GatedSource {
        fn fetch<'a>(&'a self, chunk: &'a RouteChunk) -> BoxFuture<'a, Result<Vec<CachedItem>, ServiceError>> {
            Box::pin(async move {
                self.entered.notify_one();
                self.release.notified().await;
                Ok(vec![CachedItem::new(chunk.points[0], CacheValue::SpeedLimit { kmh: 50 })])
            })
        }
    }

    #[tokio::test]
    async fn test_cancel_during_fetch_discards_result() {
        let dir = TempDir::new().unwrap();
        let cache = Arc::new(RouteDataCache::new(
            CacheKind::SpeedLimit,
            GatedSource {
                entered: Notify::new(),
                release: Notify::new(),
            },
            dir.path(),
        ));
        let progress = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let ctx = context(progress.clone());
        let token = ctx.cancel_token().clone();

        let job = tokio::spawn({
            let cache = Arc::clone(&cache);
            async move { cache.prefetch_route_data(route(), ctx).await }
        });
        cache.source.entered.notified().await;
        token.cancel();
        cache.source.release.notify_one();

        assert!(matches!(job.await.unwrap(), Err(CacheError::Cancelled)));
        assert!(progress.lock().is_empty());
        assert!(cache.store().load("r1").await.unwrap().is_none());
        assert_eq!(cache.items("r1").map(|items| items.len()), Some(0));
    }

    #[tokio::test]
    async fn test_cancelled_job_does_not_take_active_route() {
        let dir = TempDir::new().unwrap();
        let progress = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let cache = cache(&dir, vec![]);
        cache
            .prefetch_route_data(route(), context(progress.clone()))
            .await
            .unwrap();

        cache.activate_route("other");
        let ctx = context(progress);
        ctx.cancel_token().cancel();
        let result = cache.prefetch_route_data(route(), ctx).await;

        assert!(matches!(result, Err(CacheError::Cancelled)));
        assert!(cache.current_value(&Position::new(48.137, 11.575)).is_none());
    }

    #[tokio::test]
    async fn test_all_chunks_failed() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir, vec![0, 1, 2]);
        let progress = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let result = cache.prefetch_route_data(route(), context(progress)).await;

        assert!(matches!(result, Err(CacheError::AllChunksFailed { chunks: 3, .. })));
        assert!(!cache.has_route_cache("r1").await);
    }

    #[tokio::test]
    async fn test_second_activation_hydrates_from_disk() {
        let dir = TempDir::new().unwrap();
        let progress = Arc::new(parking_lot::Mutex::new(Vec::new()));
        cache(&dir, vec![])
            .prefetch_route_data(route(), context(progress.clone()))
            .await
            .unwrap();

        let fresh = cache(&dir, vec![]);
        let summary = fresh
            .prefetch_route_data(route(), context(progress))
            .await
            .unwrap();

        assert!(summary.hydrated);
        assert_eq!(summary.items, 3);
        assert_eq!(fresh.source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_current_value_uses_nearest_item_in_radius() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir, vec![]);
        let progress = Arc::new(parking_lot::Mutex::new(Vec::new()));
        cache
            .prefetch_route_data(route(), context(progress))
            .await
            .unwrap();

        let start = Coordinate::new(48.137, 11.575);
        let near = destination_point(&start, 0.0, 1_010.0);
        assert_eq!(
            cache.current_value(&Position::new(near.lat, near.lon)),
            Some(CacheValue::SpeedLimit { kmh: 31 })
        );

        let far = destination_point(&start, 90.0, 400.0);
        assert_eq!(cache.current_value(&Position::new(far.lat, far.lon)), None);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir, vec![]);
        let ctx = context(Arc::new(parking_lot::Mutex::new(Vec::new())));
        ctx.cancel_token().cancel();

        let result = cache.prefetch_route_data(route(), ctx).await;
        assert!(matches!(result, Err(CacheError::Cancelled)));
    }

    #[tokio::test]
    async fn test_clear_route_cache() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir, vec![]);
        let progress = Arc::new(parking_lot::Mutex::new(Vec::new()));
        cache
            .prefetch_route_data(route(), context(progress))
            .await
            .unwrap();

        cache.clear_route_cache("r1").await.unwrap();
        assert!(!cache.has_route_cache("r1").await);
        assert!(cache.items("r1").is_none());
        assert!(cache.current_value(&Position::new(48.137, 11.575)).is_none());
    }
}
