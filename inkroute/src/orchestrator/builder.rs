//! Assembles an [`Orchestrator`] from its collaborators.

use std::sync::Arc;

use tracing::{info, warn};

use super::channels::EventChannels;
use super::facade::{Inner, Orchestrator};
use crate::cache::{CacheKind, HttpChunkSource, PrefetchableCache, RouteDataCache};
use crate::config::ConfigStore;
use crate::display::{DisplayPipeline, EpaperDisplay, MapRenderer};
use crate::position::PositionSource;
use crate::prefetch::{PrefetchCoordinator, ProgressCallback, ViewerThrottle};
use crate::route::RouteSource;
use crate::service::{OptionalService, ServiceError};

/// Builder for [`Orchestrator`].
///
/// The five required collaborators are taken by [`new`](Self::new); caches
/// and optional services are added afterwards.
///
/// ```ignore
/// let orchestrator = OrchestratorBuilder::new(config, gps, routes, renderer, display)
///     .with_configured_caches()?
///     .optional_service(wifi)
///     .build();
/// ```
pub struct OrchestratorBuilder {
    config: Arc<dyn ConfigStore>,
    gps: Arc<dyn PositionSource>,
    routes: Arc<dyn RouteSource>,
    renderer: Arc<dyn MapRenderer>,
    display: Arc<dyn EpaperDisplay>,
    caches: Vec<Arc<dyn PrefetchableCache>>,
    optional: Vec<Arc<dyn OptionalService>>,
}

impl OrchestratorBuilder {
    pub fn new(
        config: Arc<dyn ConfigStore>,
        gps: Arc<dyn PositionSource>,
        routes: Arc<dyn RouteSource>,
        renderer: Arc<dyn MapRenderer>,
        display: Arc<dyn EpaperDisplay>,
    ) -> Self {
        Self {
            config,
            gps,
            routes,
            renderer,
            display,
            caches: Vec::new(),
            optional: Vec::new(),
        }
    }

    /// Register a prefetchable cache. A later cache of the same kind
    /// replaces an earlier one.
    pub fn cache(mut self, cache: Arc<dyn PrefetchableCache>) -> Self {
        let kind = cache.kind();
        self.caches.retain(|c| c.kind() != kind);
        self.caches.push(cache);
        self
    }

    /// Register several caches.
    pub fn caches(self, caches: impl IntoIterator<Item = Arc<dyn PrefetchableCache>>) -> Self {
        caches.into_iter().fold(self, |builder, cache| builder.cache(cache))
    }

    /// Register an HTTP-backed cache for every kind that has an endpoint in
    /// the `[prefetch]` section.
    pub fn with_configured_caches(mut self) -> Result<Self, ServiceError> {
        let settings = self.config.snapshot().prefetch;
        for kind in CacheKind::ALL {
            let Some(endpoint) = settings.endpoint(kind) else {
                continue;
            };
            let source = HttpChunkSource::new(kind, endpoint)?;
            let cache: Arc<dyn PrefetchableCache> =
                Arc::new(RouteDataCache::new(kind, source, &settings.cache_dir));
            self = self.cache(cache);
        }
        if self.caches.is_empty() && settings.enabled {
            warn!("Prefetch enabled but no cache endpoints configured");
        }
        Ok(self)
    }

    /// Register a non-essential service. Services start in registration
    /// order and stop in reverse.
    pub fn optional_service(mut self, service: Arc<dyn OptionalService>) -> Self {
        self.optional.push(service);
        self
    }

    /// Build the orchestrator. Nothing is started until
    /// [`Orchestrator::initialize`].
    pub fn build(self) -> Orchestrator {
        let snapshot = self.config.snapshot();
        let events = Arc::new(EventChannels::new());
        let throttle = Arc::new(ViewerThrottle::new());

        let progress_events = Arc::clone(&events);
        let progress: ProgressCallback =
            Arc::new(move |progress| progress_events.prefetch.emit(&progress));

        let prefetch = PrefetchCoordinator::new(
            self.caches,
            snapshot.prefetch.job_config(),
            throttle.clone(),
            progress,
        );

        info!(
            caches = prefetch.caches().len(),
            optional_services = self.optional.len(),
            mock_gps = self.gps.is_mock(),
            mock_display = self.display.is_mock(),
            "Orchestrator assembled"
        );

        // Nobody is watching until a viewer connects.
        self.display.set_preview_enabled(false);

        Orchestrator::from_inner(Arc::new(Inner::new(
            &snapshot,
            self.config,
            self.gps,
            self.routes,
            DisplayPipeline::new(self.renderer, self.display),
            prefetch,
            throttle,
            self.optional,
            events,
        )))
    }
}
