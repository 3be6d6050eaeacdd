//! The orchestrator façade and its shared state.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::channels::EventChannels;
use super::error::{display_service, OrchestratorError};
use super::tasks;
use super::types::{DeviceState, DisplayRefresh, ErrorEvent, SystemStatus};
use crate::cache::{CacheKind, CacheValue, PrefetchableCache};
use crate::config::{ConfigFile, ConfigStore, MIN_AUTO_UPDATE_INTERVAL_SECS};
use crate::display::{DisplayPipeline, DisplayUpdate, EpaperDisplay, OverlayValues, RenderRequest, ScreenType};
use crate::events::Subscription;
use crate::geo::Coordinate;
use crate::navigation::{
    DisplayMode, DriveNavigator, NavigationConfig, NavigationEventKind, NavigationStatus,
    NavigationUpdate,
};
use crate::position::{GpsEvent, GpsStatus, Position, PositionDebouncer, PositionSource};
use crate::prefetch::{PrefetchCoordinator, PrefetchProgress, ViewerThrottle};
use crate::route::{Route, RouteSource};
use crate::service::{OptionalService, ServiceKind};

/// State shared between the façade and its background tasks.
pub(crate) struct Inner {
    config: Arc<dyn ConfigStore>,
    gps: Arc<dyn PositionSource>,
    routes: Arc<dyn RouteSource>,
    pipeline: DisplayPipeline,
    prefetch: PrefetchCoordinator,
    throttle: Arc<ViewerThrottle>,
    optional: Vec<Arc<dyn OptionalService>>,
    started_optional: Mutex<Vec<Arc<dyn OptionalService>>>,

    state: Mutex<DeviceState>,
    navigator: Mutex<Option<DriveNavigator>>,
    nav_config: Mutex<NavigationConfig>,
    nav_display_mode: Mutex<Option<DisplayMode>>,
    debouncer: Mutex<PositionDebouncer>,
    events: Arc<EventChannels>,

    overview_requested: AtomicBool,
    initialized: AtomicBool,
    init_lock: tokio::sync::Mutex<()>,
    shutdown: CancellationToken,
    bridge: Mutex<Option<CancellationToken>>,
    auto_update: Mutex<Option<CancellationToken>>,
}

impl Inner {
    #[allow(clippy::too_many_arguments)]
    pub(super) fn new(
        snapshot: &ConfigFile,
        config: Arc<dyn ConfigStore>,
        gps: Arc<dyn PositionSource>,
        routes: Arc<dyn RouteSource>,
        pipeline: DisplayPipeline,
        prefetch: PrefetchCoordinator,
        throttle: Arc<ViewerThrottle>,
        optional: Vec<Arc<dyn OptionalService>>,
        events: Arc<EventChannels>,
    ) -> Self {
        Self {
            config,
            gps,
            routes,
            pipeline,
            prefetch,
            throttle,
            optional,
            started_optional: Mutex::new(Vec::new()),
            state: Mutex::new(DeviceState::from_config(snapshot)),
            navigator: Mutex::new(None),
            nav_config: Mutex::new(snapshot.navigation.navigation_config()),
            nav_display_mode: Mutex::new(None),
            debouncer: Mutex::new(PositionDebouncer::new(snapshot.gps.debounce_config())),
            events,
            overview_requested: AtomicBool::new(false),
            initialized: AtomicBool::new(false),
            init_lock: tokio::sync::Mutex::new(()),
            shutdown: CancellationToken::new(),
            bridge: Mutex::new(None),
            auto_update: Mutex::new(None),
        }
    }

    fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    fn ensure_initialized(&self) -> Result<(), OrchestratorError> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(OrchestratorError::NotInitialized)
        }
    }

    fn display(&self) -> &Arc<dyn EpaperDisplay> {
        self.pipeline.display()
    }

    fn is_auto_update_running(&self) -> bool {
        self.auto_update
            .lock()
            .as_ref()
            .is_some_and(|token| !token.is_cancelled())
    }

    /// Run the display pipeline once, coalescing with an in-flight run.
    pub(super) async fn update_display(
        &self,
        operation: &'static str,
    ) -> Result<DisplayUpdate, OrchestratorError> {
        self.ensure_initialized()?;

        let result = self
            .pipeline
            .update(
                || self.render_request(),
                |e| {
                    self.events.error.emit(&ErrorEvent {
                        operation,
                        service: display_service(e),
                        message: e.to_string(),
                    });
                },
            )
            .await;

        match result {
            Ok(DisplayUpdate::Rendered { runs }) => {
                let screen = self.state.lock().active_screen;
                self.events.display_update.emit(&DisplayRefresh {
                    runs,
                    total_frames: self.pipeline.completed_runs(),
                    screen,
                    at: Utc::now(),
                });
                Ok(DisplayUpdate::Rendered { runs })
            }
            Ok(DisplayUpdate::Coalesced) => Ok(DisplayUpdate::Coalesced),
            Err(e) => Err(OrchestratorError::from_display(operation, e)),
        }
    }

    /// Fire-and-forget display update. Relies on pipeline coalescing.
    fn spawn_display_update(self: &Arc<Self>, operation: &'static str) {
        if !self.is_initialized() {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            debug!(operation, "No runtime, skipping triggered display update");
            return;
        };
        let inner = Arc::clone(self);
        handle.spawn(async move {
            if let Err(e) = inner.update_display(operation).await {
                debug!(operation, error = %e, "Triggered display update failed");
            }
        });
    }

    /// Snapshot device state into a render request.
    fn render_request(&self) -> RenderRequest {
        let mut request = {
            let state = self.state.lock();
            let mut request = RenderRequest::new(state.width, state.height, state.zoom);
            request.screen = state.active_screen;
            request.route = state.active_route.clone();
            request.position = state.last_position;
            if state.rotate_with_bearing {
                request.rotation_deg = state
                    .last_position
                    .and_then(|p| p.bearing)
                    .unwrap_or(0.0);
            }
            let fallback = state.active_route.as_deref().and_then(route_center);
            request.center = match state.last_position {
                Some(p) if state.auto_center || fallback.is_none() => Some(p.coordinate()),
                _ => fallback,
            };
            request
        };

        if let Some(nav) = self.navigator.lock().as_ref() {
            request.navigation = Some(nav.status());
            request.route = Some(Arc::clone(nav.route()));
        }

        request.overview = self.overview_requested.swap(false, Ordering::AcqRel);
        if let Some(position) = request.position {
            request.overlay = self.overlay_values(&position);
        }
        request
    }

    fn overlay_values(&self, position: &Position) -> OverlayValues {
        let mut overlay = OverlayValues::default();
        for cache in self.prefetch.caches() {
            match cache.current_value(position) {
                Some(CacheValue::SpeedLimit { kmh }) => overlay.speed_limit_kmh = Some(kmh),
                Some(CacheValue::RoadSurface { surface }) => overlay.road_surface = Some(surface),
                Some(CacheValue::Location { name }) => overlay.location_name = Some(name),
                Some(CacheValue::Elevation { meters }) => overlay.elevation_m = Some(meters),
                Some(CacheValue::Poi { .. }) | None => {}
            }
        }
        overlay
    }

    pub(super) fn handle_gps_event(self: &Arc<Self>, event: GpsEvent) {
        match event {
            GpsEvent::Position(position) => self.handle_position(position),
            GpsEvent::Status(status) => {
                let changed = {
                    let mut state = self.state.lock();
                    let changed = state.gps_status != status;
                    state.gps_status = status;
                    changed
                };
                if changed {
                    info!(fix = ?status.fix, satellites = status.satellites, "GPS status changed");
                    self.events.gps_status.emit(&status);
                }
            }
        }
    }

    fn handle_position(self: &Arc<Self>, position: Position) {
        let auto_center = {
            let mut state = self.state.lock();
            state.last_position = Some(position);
            state.auto_center
        };
        let accepted = self.debouncer.lock().accept(&position);
        self.events.gps_update.emit(&position);

        let updates = self
            .navigator
            .lock()
            .as_mut()
            .map(|nav| nav.update(&position))
            .unwrap_or_default();
        let navigating = !updates.is_empty();

        let mut refresh = accepted && (auto_center || navigating) && !self.is_auto_update_running();
        if self.publish_navigation(&updates) {
            refresh = true;
        }

        debug!(
            accepted,
            navigating,
            refresh,
            lat = position.latitude,
            lon = position.longitude,
            "Position processed"
        );

        if refresh {
            self.spawn_display_update("gps_update");
        }
    }

    /// Emit navigation updates. Returns whether the screen needs a refresh:
    /// any event besides a plain status, or a display-mode change.
    fn publish_navigation(&self, updates: &[NavigationUpdate]) -> bool {
        let mut refresh = false;
        for update in updates {
            if update.kind != NavigationEventKind::Status {
                refresh = true;
            }
            let previous = self
                .nav_display_mode
                .lock()
                .replace(update.status.display_mode);
            if previous != Some(update.status.display_mode) {
                debug!(mode = %update.status.display_mode, "Navigation display mode changed");
                refresh = true;
            }
            self.events.navigation.emit(update);
        }
        refresh
    }

    fn set_screen(&self, screen: ScreenType) {
        self.state.lock().active_screen = screen;
        self.config.set_active_screen(screen);
    }

    async fn persist(&self, operation: &'static str) -> Result<(), OrchestratorError> {
        self.config
            .save()
            .await
            .map_err(|e| OrchestratorError::dependency(operation, ServiceKind::Config, e))
    }

    async fn load_active_gpx(&self, path: PathBuf, operation: &'static str) -> Result<Arc<Route>, OrchestratorError> {
        let route = self
            .routes
            .load_track(&path)
            .await
            .map_err(|e| OrchestratorError::dependency(operation, ServiceKind::Route, e))?;
        route
            .validate()
            .map_err(|e| OrchestratorError::validation("gpx", e.to_string()))?;
        let route = Arc::new(route);

        {
            let mut state = self.state.lock();
            state.active_route = Some(Arc::clone(&route));
            state.active_route_path = Some(path.clone());
        }
        self.config.set_active_gpx(Some(path.clone()));
        if let Err(e) = self.persist(operation).await {
            warn!(error = %e, "Could not persist active route");
        }

        // Navigation status belongs to the previous route.
        if self.navigator.lock().is_some() {
            if let Some(update) = self.cancel_navigation() {
                self.events.navigation.emit(&update);
            }
            self.set_screen(ScreenType::Track);
            info!(route_id = %route.id, "Drive navigation stopped for new active route");
        }

        info!(
            route_id = %route.id,
            name = route.display_name(),
            waypoints = route.waypoints.len(),
            distance_km = format!("{:.1}", route.total_distance_m / 1000.0),
            path = %path.display(),
            "Active route set"
        );

        if self.config.snapshot().prefetch.enabled {
            self.prefetch.launch(Arc::clone(&route));
        } else {
            debug!("Prefetch disabled, not launching jobs");
        }
        Ok(route)
    }

    fn start_auto_update(self: &Arc<Self>) -> bool {
        let mut slot = self.auto_update.lock();
        if slot.as_ref().is_some_and(|t| !t.is_cancelled()) {
            return false;
        }
        let interval = self.state.lock().auto_update_interval;
        let token = self.shutdown.child_token();
        tasks::spawn_auto_update(Arc::downgrade(self), interval, token.clone());
        *slot = Some(token);
        info!(interval_secs = interval.as_secs(), "Auto-update started");
        true
    }

    fn stop_auto_update(&self) -> bool {
        match self.auto_update.lock().take() {
            Some(token) => {
                token.cancel();
                info!("Auto-update stopped");
                true
            }
            None => false,
        }
    }

    fn cancel_navigation(&self) -> Option<NavigationUpdate> {
        let mut nav = self.navigator.lock().take()?;
        *self.nav_display_mode.lock() = None;
        nav.cancel()
    }
}

/// Midpoint of a route's bounding box.
fn route_center(route: &Route) -> Option<Coordinate> {
    route
        .bounds()
        .map(|(sw, ne)| Coordinate::new((sw.lat + ne.lat) / 2.0, (sw.lon + ne.lon) / 2.0))
}

/// Central coordinator owning device-wide state.
///
/// Cheap to clone; clones share the same state. Construct with
/// [`OrchestratorBuilder`](super::OrchestratorBuilder).
///
/// I/O operations (`update_display`, `set_active_gpx`, navigation start,
/// auto-update) require [`initialize`](Self::initialize) first and fail
/// with [`OrchestratorError::NotInitialized`] otherwise. Setters and queries
/// work at any time.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl Orchestrator {
    pub(super) fn from_inner(inner: Arc<Inner>) -> Self {
        Self { inner }
    }

    // ----- lifecycle -----

    /// Boot collaborators in dependency order.
    ///
    /// Config reload, GPS tracking, display wake and renderer preparation
    /// are required; a failure aborts and rolls back what was started.
    /// Optional services that fail are logged and skipped. Afterwards the
    /// persisted active route and auto-update are restored. Calling again
    /// after success is a no-op.
    pub async fn initialize(&self) -> Result<(), OrchestratorError> {
        const OP: &str = "initialize";
        let inner = &self.inner;
        let _guard = inner.init_lock.lock().await;
        if inner.is_initialized() {
            debug!("Orchestrator already initialized");
            return Ok(());
        }
        info!("Initializing orchestrator");

        inner
            .config
            .reload()
            .await
            .map_err(|e| OrchestratorError::dependency(OP, ServiceKind::Config, e))?;
        let config = inner.config.snapshot();
        inner.state.lock().apply_config(&config);
        *inner.debouncer.lock() = PositionDebouncer::new(config.gps.debounce_config());
        *inner.nav_config.lock() = config.navigation.navigation_config();

        // Subscribe before starting so the first readings are not missed.
        let gps_events = inner.gps.subscribe();
        inner
            .gps
            .start_tracking()
            .await
            .map_err(|e| OrchestratorError::dependency(OP, ServiceKind::Gps, e))?;

        if let Err(e) = inner.display().wake().await {
            self.stop_gps_quietly().await;
            return Err(OrchestratorError::dependency(OP, ServiceKind::Display, e));
        }

        if let Err(e) = inner.pipeline.renderer().prepare().await {
            if let Err(sleep_err) = inner.display().sleep().await {
                warn!(error = %sleep_err, "Display sleep failed during rollback");
            }
            self.stop_gps_quietly().await;
            return Err(OrchestratorError::dependency(OP, ServiceKind::Renderer, e));
        }

        for service in &inner.optional {
            match service.start().await {
                Ok(()) => {
                    info!(service = service.name(), "Optional service started");
                    inner.started_optional.lock().push(Arc::clone(service));
                }
                Err(e) => warn!(
                    service = service.name(),
                    error = %e,
                    "Optional service failed to start, continuing"
                ),
            }
        }

        {
            let mut state = inner.state.lock();
            state.gps_status = inner.gps.status();
            if state.last_position.is_none() {
                state.last_position = inner.gps.current_position();
            }
        }

        let bridge = inner.shutdown.child_token();
        tasks::spawn_gps_bridge(Arc::downgrade(inner), gps_events, bridge.clone());
        if let Some(previous) = inner.bridge.lock().replace(bridge) {
            previous.cancel();
        }

        inner.initialized.store(true, Ordering::Release);

        if let Some(path) = config.gpx.active.clone() {
            if let Err(e) = inner.load_active_gpx(path.clone(), OP).await {
                warn!(path = %path.display(), error = %e, "Could not restore active route");
            }
        }
        if config.auto_update.enabled {
            inner.start_auto_update();
        }

        info!(
            mock_gps = inner.gps.is_mock(),
            mock_display = inner.display().is_mock(),
            "Orchestrator initialized"
        );
        Ok(())
    }

    async fn stop_gps_quietly(&self) {
        if let Err(e) = self.inner.gps.stop_tracking().await {
            warn!(error = %e, "GPS stop failed during rollback");
        }
    }

    /// Whether [`initialize`](Self::initialize) has completed.
    pub fn is_initialized(&self) -> bool {
        self.inner.is_initialized()
    }

    /// Stop everything and release collaborators in reverse start order.
    ///
    /// Every step runs even if an earlier one fails; the first failure is
    /// returned. Subscriptions stay registered.
    pub async fn dispose(&self) -> Result<(), OrchestratorError> {
        const OP: &str = "dispose";
        let inner = &self.inner;
        let _guard = inner.init_lock.lock().await;
        info!("Disposing orchestrator");

        inner.stop_auto_update();
        if let Some(update) = inner.cancel_navigation() {
            inner.events.navigation.emit(&update);
        }
        inner.prefetch.shutdown();
        if let Some(bridge) = inner.bridge.lock().take() {
            bridge.cancel();
        }

        let was_initialized = inner.initialized.swap(false, Ordering::AcqRel);
        let mut first_error: Option<OrchestratorError> = None;

        let started: Vec<_> = inner.started_optional.lock().drain(..).collect();
        for service in started.iter().rev() {
            service.stop().await;
            debug!(service = service.name(), "Optional service stopped");
        }

        if was_initialized {
            if let Err(e) = inner.display().sleep().await {
                warn!(error = %e, "Display sleep failed");
                first_error.get_or_insert(OrchestratorError::dependency(OP, ServiceKind::Display, e));
            }
            if let Err(e) = inner.gps.stop_tracking().await {
                warn!(error = %e, "GPS stop failed");
                first_error.get_or_insert(OrchestratorError::dependency(OP, ServiceKind::Gps, e));
            }
        }

        if let Err(e) = inner.persist(OP).await {
            warn!(error = %e, "Config save failed");
            first_error.get_or_insert(e);
        }

        info!("Orchestrator disposed");
        first_error.map_or(Ok(()), Err)
    }

    // ----- display -----

    /// Render and push one frame.
    ///
    /// Returns [`DisplayUpdate::Rendered`] when this call ran the pipeline
    /// and [`DisplayUpdate::Coalesced`] when a run was already in flight and
    /// this request was folded into its single follow-up.
    pub async fn update_display(&self) -> Result<DisplayUpdate, OrchestratorError> {
        self.inner.update_display("update_display").await
    }

    /// Render one frame framing the whole route.
    pub async fn show_full_route(&self) -> Result<DisplayUpdate, OrchestratorError> {
        self.inner.ensure_initialized()?;
        let has_route = self.inner.navigator.lock().is_some()
            || self.inner.state.lock().active_route.is_some();
        if !has_route {
            return Err(OrchestratorError::NoActiveRoute);
        }
        self.inner.overview_requested.store(true, Ordering::Release);
        self.inner.update_display("show_full_route").await
    }

    // ----- route -----

    /// Load a route file and make it the active route.
    ///
    /// Persists the path and launches prefetch in the background. A running
    /// drive navigation is stopped and the screen returns to the track view.
    /// Does not refresh the display.
    pub async fn set_active_gpx(&self, path: impl AsRef<Path>) -> Result<Arc<Route>, OrchestratorError> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(OrchestratorError::validation("gpx", "path is empty"));
        }
        self.inner.ensure_initialized()?;
        self.inner.load_active_gpx(path.to_path_buf(), "set_active_gpx").await
    }

    /// Drop the active route and cancel its prefetch jobs.
    pub fn clear_active_gpx(&self) -> Result<(), OrchestratorError> {
        let previous = {
            let mut state = self.inner.state.lock();
            state.active_route_path = None;
            state.active_route.take()
        };
        self.inner.config.set_active_gpx(None);
        self.inner.prefetch.cancel_current();
        if let Some(route) = previous {
            info!(route_id = %route.id, "Active route cleared");
        }
        Ok(())
    }

    /// The active route, if any.
    pub fn active_route(&self) -> Option<Arc<Route>> {
        self.inner.state.lock().active_route.clone()
    }

    // ----- map settings -----

    /// Change zoom by `delta`, clamped to the configured range.
    pub fn change_zoom(&self, delta: i32) -> Result<u8, OrchestratorError> {
        let zoom = {
            let mut state = self.inner.state.lock();
            state.zoom = state.clamp_zoom(i32::from(state.zoom).saturating_add(delta));
            state.zoom
        };
        self.inner.config.set_zoom(zoom);
        debug!(zoom, delta, "Zoom changed");
        Ok(zoom)
    }

    /// Set zoom, clamped to the configured range.
    pub fn set_zoom(&self, level: i32) -> Result<u8, OrchestratorError> {
        let zoom = {
            let mut state = self.inner.state.lock();
            state.zoom = state.clamp_zoom(level);
            state.zoom
        };
        self.inner.config.set_zoom(zoom);
        debug!(zoom, requested = level, "Zoom set");
        Ok(zoom)
    }

    pub fn zoom(&self) -> u8 {
        self.inner.state.lock().zoom
    }

    pub fn set_auto_center(&self, enabled: bool) -> Result<(), OrchestratorError> {
        self.inner.state.lock().auto_center = enabled;
        self.inner.config.set_auto_center(enabled);
        Ok(())
    }

    pub fn set_rotate_with_bearing(&self, enabled: bool) -> Result<(), OrchestratorError> {
        self.inner.state.lock().rotate_with_bearing = enabled;
        self.inner.config.set_rotate_with_bearing(enabled);
        Ok(())
    }

    pub fn set_active_screen(&self, screen: ScreenType) -> Result<(), OrchestratorError> {
        self.inner.set_screen(screen);
        Ok(())
    }

    pub fn active_screen(&self) -> ScreenType {
        self.inner.state.lock().active_screen
    }

    // ----- auto-update -----

    /// Start periodic display refresh. A second start is a no-op.
    pub fn start_auto_update(&self) -> Result<(), OrchestratorError> {
        self.inner.ensure_initialized()?;
        if !self.inner.start_auto_update() {
            debug!("Auto-update already running");
        }
        self.inner.state.lock().auto_update_enabled = true;
        self.inner.config.set_auto_update_enabled(true);
        Ok(())
    }

    /// Stop periodic refresh. A refresh already running completes.
    pub fn stop_auto_update(&self) -> Result<(), OrchestratorError> {
        self.inner.stop_auto_update();
        self.inner.state.lock().auto_update_enabled = false;
        self.inner.config.set_auto_update_enabled(false);
        Ok(())
    }

    pub fn is_auto_update_running(&self) -> bool {
        self.inner.is_auto_update_running()
    }

    /// Change the refresh interval; a running scheduler is restarted.
    pub fn set_auto_update_interval(&self, interval: Duration) -> Result<(), OrchestratorError> {
        if interval < Duration::from_secs(MIN_AUTO_UPDATE_INTERVAL_SECS) {
            return Err(OrchestratorError::validation(
                "auto_update_interval",
                format!("must be at least {}s", MIN_AUTO_UPDATE_INTERVAL_SECS),
            ));
        }
        self.inner.state.lock().auto_update_interval = interval;
        self.inner.config.set_auto_update_interval(interval);
        if self.inner.stop_auto_update() {
            self.inner.start_auto_update();
        }
        Ok(())
    }

    // ----- drive navigation -----

    /// Start turn-by-turn navigation along `route`.
    ///
    /// Needs a known position and no navigation in progress. Switches the
    /// screen to turn-by-turn and evaluates the current position at once.
    /// Prefetch moves to `route` unless its jobs were already launched.
    pub async fn start_drive_navigation(
        &self,
        route: Arc<Route>,
    ) -> Result<NavigationStatus, OrchestratorError> {
        let inner = &self.inner;
        inner.ensure_initialized()?;
        route
            .validate()
            .map_err(|e| OrchestratorError::validation("route", e.to_string()))?;

        let position = inner
            .state
            .lock()
            .last_position
            .or_else(|| inner.gps.current_position())
            .ok_or(OrchestratorError::NoGpsPosition)?;

        let (updates, status) = {
            let mut slot = inner.navigator.lock();
            if slot.as_ref().is_some_and(|nav| nav.state().is_active()) {
                return Err(OrchestratorError::NavigationAlreadyActive);
            }
            let mut nav = DriveNavigator::new(Arc::clone(&route), inner.nav_config.lock().clone());
            let updates = nav.update(&position);
            let status = nav.status();
            *slot = Some(nav);
            (updates, status)
        };

        *inner.nav_display_mode.lock() = None;
        inner.set_screen(ScreenType::TurnByTurn);
        info!(route_id = %route.id, waypoints = route.waypoints.len(), "Drive navigation started");

        if inner.prefetch.active_route_id().as_deref() != Some(route.id.as_str()) {
            if inner.config.snapshot().prefetch.enabled {
                inner.prefetch.launch(Arc::clone(&route));
            } else {
                debug!("Prefetch disabled, not launching jobs for drive route");
            }
        }

        inner.publish_navigation(&updates);
        inner.spawn_display_update("start_drive_navigation");
        Ok(status)
    }

    /// Cancel navigation from any state and return to the track screen.
    ///
    /// Stopping while idle is a no-op.
    pub fn stop_drive_navigation(&self) -> Result<(), OrchestratorError> {
        let inner = &self.inner;
        if inner.navigator.lock().is_none() {
            debug!("Drive navigation not running, nothing to stop");
            return Ok(());
        }
        if let Some(update) = inner.cancel_navigation() {
            inner.events.navigation.emit(&update);
        }
        inner.set_screen(ScreenType::Track);
        info!("Drive navigation stopped");
        inner.spawn_display_update("stop_drive_navigation");
        Ok(())
    }

    /// Whether navigation is running (navigating or off-road).
    pub fn is_drive_navigating(&self) -> bool {
        self.inner
            .navigator
            .lock()
            .as_ref()
            .is_some_and(|nav| nav.state().is_active())
    }

    /// Current navigation snapshot. Still available after arrival.
    pub fn drive_navigation_status(&self) -> Result<NavigationStatus, OrchestratorError> {
        self.inner
            .navigator
            .lock()
            .as_ref()
            .map(DriveNavigator::status)
            .ok_or(OrchestratorError::NavigationNotStarted)
    }

    // ----- subscriptions -----

    pub fn on_gps_update<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&Position) + Send + Sync + 'static,
    {
        self.inner.events.gps_update.subscribe(handler)
    }

    pub fn on_gps_status_change<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&GpsStatus) + Send + Sync + 'static,
    {
        self.inner.events.gps_status.subscribe(handler)
    }

    pub fn on_display_update<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&DisplayRefresh) + Send + Sync + 'static,
    {
        self.inner.events.display_update.subscribe(handler)
    }

    pub fn on_error<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&ErrorEvent) + Send + Sync + 'static,
    {
        self.inner.events.error.subscribe(handler)
    }

    pub fn on_drive_navigation_update<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&NavigationUpdate) + Send + Sync + 'static,
    {
        self.inner.events.navigation.subscribe(handler)
    }

    /// Progress of the prefetch job for one cache kind.
    pub fn on_prefetch_progress<F>(&self, kind: CacheKind, handler: F) -> Subscription
    where
        F: Fn(&PrefetchProgress) + Send + Sync + 'static,
    {
        self.inner.events.prefetch.for_kind(kind).subscribe(handler)
    }

    pub fn on_speed_limit_prefetch_progress<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&PrefetchProgress) + Send + Sync + 'static,
    {
        self.on_prefetch_progress(CacheKind::SpeedLimit, handler)
    }

    pub fn on_poi_prefetch_progress<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&PrefetchProgress) + Send + Sync + 'static,
    {
        self.on_prefetch_progress(CacheKind::Poi, handler)
    }

    pub fn on_elevation_prefetch_progress<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&PrefetchProgress) + Send + Sync + 'static,
    {
        self.on_prefetch_progress(CacheKind::Elevation, handler)
    }

    pub fn on_road_surface_prefetch_progress<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&PrefetchProgress) + Send + Sync + 'static,
    {
        self.on_prefetch_progress(CacheKind::RoadSurface, handler)
    }

    pub fn on_location_prefetch_progress<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&PrefetchProgress) + Send + Sync + 'static,
    {
        self.on_prefetch_progress(CacheKind::Location, handler)
    }

    // ----- queries -----

    /// Latest reading, debounced or not.
    pub fn current_position(&self) -> Option<Position> {
        self.inner.state.lock().last_position
    }

    pub fn is_mock_gps(&self) -> bool {
        self.inner.gps.is_mock()
    }

    /// Cached value of one kind near the current position.
    pub fn current_cache_value(&self, kind: CacheKind) -> Option<CacheValue> {
        let position = self.current_position()?;
        self.inner.prefetch.cache(kind)?.current_value(&position)
    }

    pub fn current_speed_limit(&self) -> Option<u16> {
        match self.current_cache_value(CacheKind::SpeedLimit)? {
            CacheValue::SpeedLimit { kmh } => Some(kmh),
            _ => None,
        }
    }

    pub fn current_road_surface(&self) -> Option<String> {
        match self.current_cache_value(CacheKind::RoadSurface)? {
            CacheValue::RoadSurface { surface } => Some(surface),
            _ => None,
        }
    }

    pub fn current_location_name(&self) -> Option<String> {
        match self.current_cache_value(CacheKind::Location)? {
            CacheValue::Location { name } => Some(name),
            _ => None,
        }
    }

    pub fn current_elevation(&self) -> Option<f64> {
        match self.current_cache_value(CacheKind::Elevation)? {
            CacheValue::Elevation { meters } => Some(meters),
            _ => None,
        }
    }

    /// Registered prefetchable caches.
    pub fn caches(&self) -> &[Arc<dyn PrefetchableCache>] {
        self.inner.prefetch.caches()
    }

    /// Whether a prefetch job is still running.
    pub fn is_prefetching(&self) -> bool {
        self.inner.prefetch.is_running()
    }

    /// Wait until the current prefetch jobs finish.
    pub async fn wait_prefetch_idle(&self) {
        self.inner.prefetch.wait_idle().await;
    }

    /// Copy of the device state.
    pub fn device_state(&self) -> DeviceState {
        self.inner.state.lock().clone()
    }

    /// Snapshot for the serving layer.
    pub fn system_status(&self) -> SystemStatus {
        let inner = &self.inner;
        let navigation = inner.navigator.lock().as_ref().map(DriveNavigator::status);
        let state = inner.state.lock().clone();
        SystemStatus {
            version: crate::VERSION,
            initialized: inner.is_initialized(),
            gps: state.gps_status,
            is_mock_gps: inner.gps.is_mock(),
            position: state.last_position,
            zoom: state.zoom,
            auto_center: state.auto_center,
            rotate_with_bearing: state.rotate_with_bearing,
            active_screen: state.active_screen,
            auto_update_enabled: state.auto_update_enabled,
            auto_update_running: inner.is_auto_update_running(),
            auto_update_interval_secs: state.auto_update_interval.as_secs(),
            display_busy: inner.pipeline.is_busy(),
            frames_rendered: inner.pipeline.completed_runs(),
            failed_renders: inner.pipeline.failed_runs(),
            last_display_update: inner.pipeline.last_frame_at(),
            active_route_id: state.active_route.as_ref().map(|r| r.id.clone()),
            active_route_name: state.active_route.as_ref().and_then(|r| r.name.clone()),
            active_route_path: state.active_route_path,
            navigation,
            prefetch_running: inner.prefetch.is_running(),
            web_socket_clients: state.web_socket_clients,
        }
    }

    /// Last frame as PNG when the display is the mock panel.
    pub fn mock_display_image(&self) -> Option<Bytes> {
        let display = self.inner.display();
        if display.is_mock() {
            display.preview_png()
        } else {
            None
        }
    }

    // ----- viewers -----

    /// Number of connected web viewers.
    ///
    /// With no viewers, prefetch requests are spaced out further and the
    /// mock display stops encoding PNG previews eagerly.
    pub fn set_web_socket_client_count(&self, count: usize) {
        let previous = std::mem::replace(&mut self.inner.state.lock().web_socket_clients, count);
        self.inner.throttle.set_viewers(count);
        self.inner.display().set_preview_enabled(count > 0);
        if previous != count {
            debug!(viewers = count, "Viewer count changed");
        }
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("initialized", &self.inner.is_initialized())
            .field("navigating", &self.is_drive_navigating())
            .field("auto_update", &self.inner.is_auto_update_running())
            .finish()
    }
}
