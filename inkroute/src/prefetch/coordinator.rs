//! Launches and supersedes per-route prefetch jobs.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::config::{PrefetchContext, PrefetchJobConfig};
use super::progress::PrefetchProgress;
use super::throttler::PrefetchThrottler;
use crate::cache::{CacheError, CacheKind, PrefetchableCache};
use crate::route::Route;

/// Receives progress from every job.
pub type ProgressCallback = Arc<dyn Fn(PrefetchProgress) + Send + Sync>;

struct ActiveRun {
    route_id: String,
    cancel: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

/// Runs one background job per cache for the active route.
///
/// Failures are logged and never propagate to the caller of
/// [`launch`](Self::launch).
pub struct PrefetchCoordinator {
    caches: Vec<Arc<dyn PrefetchableCache>>,
    config: PrefetchJobConfig,
    throttler: Arc<dyn PrefetchThrottler>,
    progress: ProgressCallback,
    shutdown: CancellationToken,
    active: Mutex<Option<ActiveRun>>,
}

impl PrefetchCoordinator {
    pub fn new(
        caches: Vec<Arc<dyn PrefetchableCache>>,
        config: PrefetchJobConfig,
        throttler: Arc<dyn PrefetchThrottler>,
        progress: ProgressCallback,
    ) -> Self {
        Self {
            caches,
            config,
            throttler,
            progress,
            shutdown: CancellationToken::new(),
            active: Mutex::new(None),
        }
    }

    /// Registered caches.
    pub fn caches(&self) -> &[Arc<dyn PrefetchableCache>] {
        &self.caches
    }

    /// The cache of one kind, if registered.
    pub fn cache(&self, kind: CacheKind) -> Option<&Arc<dyn PrefetchableCache>> {
        self.caches.iter().find(|c| c.kind() == kind)
    }

    /// Start prefetching `route`, cancelling the previous route's jobs.
    ///
    /// Must be called inside a tokio runtime. Returns the number of jobs
    /// started.
    pub fn launch(&self, route: Arc<Route>) -> usize {
        if self.shutdown.is_cancelled() {
            debug!("Prefetch coordinator shut down, ignoring launch");
            return 0;
        }

        // Held across the whole launch so two launches cannot interleave.
        let mut active = self.active.lock();
        if let Some(previous) = active.take() {
            debug!(route_id = %previous.route_id, "Cancelling superseded prefetch");
            previous.cancel.cancel();
        }

        // Lookups switch to the new route before its jobs run; a superseded
        // job re-checks its token under the cache's own lock and backs off.
        for cache in &self.caches {
            cache.activate_route(&route.id);
        }

        let cancel = self.shutdown.child_token();
        let mut handles = Vec::with_capacity(self.caches.len());

        for cache in &self.caches {
            let cache = Arc::clone(cache);
            let route = Arc::clone(&route);
            let ctx = PrefetchContext::new(
                self.config.clone(),
                cancel.clone(),
                Arc::clone(&self.throttler),
                Arc::clone(&self.progress),
            );

            handles.push(tokio::spawn(async move {
                let kind = cache.kind();
                match cache.prefetch_route_data(route, ctx).await {
                    Ok(summary) => debug!(
                        kind = %kind,
                        items = summary.items,
                        hydrated = summary.hydrated,
                        "Prefetch job finished"
                    ),
                    Err(CacheError::Cancelled) => debug!(kind = %kind, "Prefetch job cancelled"),
                    Err(e) => warn!(kind = %kind, error = %e, "Prefetch job failed"),
                }
            }));
        }

        let started = handles.len();
        *active = Some(ActiveRun {
            route_id: route.id.clone(),
            cancel,
            handles,
        });
        drop(active);

        info!(route_id = %route.id, jobs = started, "Prefetch launched");
        started
    }

    /// Cancel the active route's jobs. In-flight chunk requests finish.
    pub fn cancel_current(&self) {
        if let Some(run) = self.active.lock().take() {
            run.cancel.cancel();
            info!(route_id = %run.route_id, "Prefetch cancelled");
        }
    }

    /// Cancel everything and refuse further launches.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        self.active.lock().take();
    }

    /// Route whose jobs were launched last, if still tracked.
    pub fn active_route_id(&self) -> Option<String> {
        self.active.lock().as_ref().map(|r| r.route_id.clone())
    }

    /// Whether any job of the active route is still running.
    pub fn is_running(&self) -> bool {
        self.active
            .lock()
            .as_ref()
            .map(|r| r.handles.iter().any(|h| !h.is_finished()))
            .unwrap_or(false)
    }

    /// Wait for the active route's jobs to finish.
    pub async fn wait_idle(&self) {
        let handles = match self.active.lock().as_mut() {
            Some(run) => std::mem::take(&mut run.handles),
            None => return,
        };
        futures::future::join_all(handles).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheValue, CachedItem, ChunkSource, RouteDataCache};
    use crate::geo::{destination_point, Coordinate};
    use crate::position::Position;
    use crate::prefetch::{NeverThrottle, PrefetchSummary, RouteChunk};
    use crate::route::{Maneuver, Waypoint};
    use crate::service::{BoxFuture, ServiceError};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Cache that waits for cancellation or `chunks` short sleeps.
    struct SlowCache {
        kind: CacheKind,
        chunks: usize,
        finished: AtomicUsize,
        cancelled: AtomicUsize,
    }

    impl PrefetchableCache for SlowCache {
        fn kind(&self) -> CacheKind {
            self.kind
        }

        fn prefetch_route_data(
            &self,
            route: Arc<Route>,
            ctx: PrefetchContext,
        ) -> BoxFuture<'_, Result<PrefetchSummary, CacheError>> {
            Box::pin(async move {
                for i in 0..self.chunks {
                    tokio::select! {
                        _ = ctx.cancelled() => {
                            self.cancelled.fetch_add(1, Ordering::SeqCst);
                            return Err(CacheError::Cancelled);
                        }
                        _ = tokio::time::sleep(Duration::from_millis(5)) => {}
                    }
                    ctx.report(PrefetchProgress {
                        kind: self.kind,
                        route_id: route.id.clone(),
                        completed: i + 1,
                        total: self.chunks,
                        found: 0,
                        complete: i + 1 == self.chunks,
                    });
                }
                self.finished.fetch_add(1, Ordering::SeqCst);
                Ok(PrefetchSummary {
                    kind: self.kind,
                    route_id: route.id.clone(),
                    chunks: self.chunks,
                    failed_chunks: 0,
                    items: 0,
                    hydrated: false,
                })
            })
        }

        fn current_value(&self, _position: &Position) -> Option<CacheValue> {
            None
        }

        fn has_route_cache<'a>(&'a self, _route_id: &'a str) -> BoxFuture<'a, bool> {
            Box::pin(async { false })
        }

        fn clear_route_cache<'a>(&'a self, _route_id: &'a str) -> BoxFuture<'a, Result<(), CacheError>> {
            Box::pin(async { Ok(()) })
        }

        fn clear_all_cache(&self) -> BoxFuture<'_, Result<(), CacheError>> {
            Box::pin(async { Ok(()) })
        }
    }

    fn slow(kind: CacheKind, chunks: usize) -> Arc<SlowCache> {
        Arc::new(SlowCache {
            kind,
            chunks,
            finished: AtomicUsize::new(0),
            cancelled: AtomicUsize::new(0),
        })
    }

    /// One speed limit at the start of every chunk.
    struct StartOfChunk;

    impl ChunkSource for StartOfChunk {
        fn fetch<'a>(&'a self, chunk: &'a RouteChunk) -> BoxFuture<'a, Result<Vec<CachedItem>, ServiceError>> {
            Box::pin(async move {
                Ok(vec![CachedItem::new(chunk.points[0], CacheValue::SpeedLimit { kmh: 50 })])
            })
        }
    }

    fn route(id: &str) -> Arc<Route> {
        route_from(id, Coordinate::new(48.137, 11.575))
    }

    fn route_from(id: &str, a: Coordinate) -> Arc<Route> {
        let b = destination_point(&a, 0.0, 1_000.0);
        let wps = vec![
            Waypoint::new(a, "Start", Maneuver::Depart),
            Waypoint::new(b, "End", Maneuver::Arrive),
        ];
        Arc::new(Route::from_parts(id, wps, vec![a, b], 10.0))
    }

    fn coordinator(caches: Vec<Arc<dyn PrefetchableCache>>, seen: Arc<Mutex<Vec<PrefetchProgress>>>) -> PrefetchCoordinator {
        PrefetchCoordinator::new(
            caches,
            PrefetchJobConfig::default(),
            Arc::new(NeverThrottle),
            Arc::new(move |p| seen.lock().push(p)),
        )
    }

    #[tokio::test]
    async fn test_launch_runs_one_job_per_cache() {
        let speed = slow(CacheKind::SpeedLimit, 2);
        let poi = slow(CacheKind::Poi, 3);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let coordinator = coordinator(
            vec![
                speed.clone() as Arc<dyn PrefetchableCache>,
                poi.clone() as Arc<dyn PrefetchableCache>,
            ],
            seen.clone(),
        );

        assert_eq!(coordinator.launch(route("a")), 2);
        coordinator.wait_idle().await;

        assert_eq!(speed.finished.load(Ordering::SeqCst), 1);
        assert_eq!(poi.finished.load(Ordering::SeqCst), 1);
        let seen = seen.lock();
        assert_eq!(seen.iter().filter(|p| p.kind == CacheKind::SpeedLimit).count(), 2);
        assert_eq!(seen.iter().filter(|p| p.kind == CacheKind::Poi).count(), 3);
    }

    #[tokio::test]
    async fn test_new_route_cancels_previous_jobs() {
        let cache = slow(CacheKind::Elevation, 1_000);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let coordinator = coordinator(vec![cache.clone() as Arc<dyn PrefetchableCache>], seen);

        coordinator.launch(route("a"));
        tokio::time::sleep(Duration::from_millis(20)).await;
        coordinator.launch(route("b"));
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(cache.cancelled.load(Ordering::SeqCst), 1);
        assert_eq!(coordinator.active_route_id().as_deref(), Some("b"));

        coordinator.cancel_current();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(cache.cancelled.load(Ordering::SeqCst), 2);
        assert!(coordinator.active_route_id().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_superseded_job_never_retakes_active_route() {
        let dir = tempfile::TempDir::new().unwrap();
        let cache = Arc::new(RouteDataCache::new(CacheKind::SpeedLimit, StartOfChunk, dir.path()));
        let config = PrefetchJobConfig {
            chunk_length_m: 500.0,
            request_delay: Duration::from_millis(1),
            ..PrefetchJobConfig::default()
        };
        let coordinator = PrefetchCoordinator::new(
            vec![cache.clone() as Arc<dyn PrefetchableCache>],
            config,
            Arc::new(NeverThrottle),
            Arc::new(|_: PrefetchProgress| {}),
        );

        let a_start = Coordinate::new(48.137, 11.575);
        let b_start = destination_point(&a_start, 90.0, 20_000.0);
        let a = route_from("a", a_start);
        let b = route_from("b", b_start);

        // Both routes end up on disk, so later launches hydrate immediately.
        coordinator.launch(Arc::clone(&a));
        coordinator.wait_idle().await;
        coordinator.launch(Arc::clone(&b));
        coordinator.wait_idle().await;

        let mut wrong = 0;
        for _ in 0..50 {
            coordinator.launch(Arc::clone(&a));
            coordinator.launch(Arc::clone(&b));
            coordinator.wait_idle().await;
            // Give a cancelled job time to reach its activation point.
            tokio::time::sleep(Duration::from_millis(2)).await;

            let here = Position::new(b_start.lat, b_start.lon);
            if cache.current_value(&here) != Some(CacheValue::SpeedLimit { kmh: 50 }) {
                wrong += 1;
            }
        }
        assert_eq!(wrong, 0);
    }

    #[tokio::test]
    async fn test_shutdown_refuses_launch() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let coordinator = coordinator(vec![slow(CacheKind::Poi, 1) as Arc<dyn PrefetchableCache>], seen);
        coordinator.shutdown();
        assert_eq!(coordinator.launch(route("a")), 0);
        assert!(!coordinator.is_running());
    }

    #[tokio::test]
    async fn test_cache_lookup_by_kind() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let coordinator = coordinator(vec![slow(CacheKind::Poi, 1) as Arc<dyn PrefetchableCache>], seen);
        assert!(coordinator.cache(CacheKind::Poi).is_some());
        assert!(coordinator.cache(CacheKind::Location).is_none());
    }
}
