//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use tempfile::TempDir;
use tokio::sync::Semaphore;

use inkroute::config::{ConfigFile, ConfigStore, IniConfigStore};
use inkroute::display::{Bitmap, MapRenderer, MockDisplay, RenderRequest};
use inkroute::geo::{destination_point, Coordinate};
use inkroute::orchestrator::{Orchestrator, OrchestratorBuilder};
use inkroute::position::{MockPositionSource, Position};
use inkroute::route::{JsonRouteSource, Maneuver, Route, Waypoint};
use inkroute::service::{BoxFuture, ServiceError};

pub const WIDTH: u32 = 80;
pub const HEIGHT: u32 = 48;

/// Munich, Marienplatz.
pub const START: Coordinate = Coordinate::new(48.137, 11.575);

/// Renderer returning a blank frame without touching the blocking pool.
#[derive(Default)]
pub struct CountingRenderer {
    calls: AtomicUsize,
}

impl CountingRenderer {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl MapRenderer for CountingRenderer {
    fn prepare(&self) -> BoxFuture<'_, Result<(), ServiceError>> {
        Box::pin(async { Ok(()) })
    }

    fn render_viewport<'a>(
        &'a self,
        request: &'a RenderRequest,
    ) -> BoxFuture<'a, Result<Bitmap, ServiceError>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Bitmap::blank(request.width, request.height))
        })
    }
}

/// Renderer that blocks each render until the test adds a permit.
pub struct GatedRenderer {
    pub gate: Arc<Semaphore>,
    calls: AtomicUsize,
}

impl GatedRenderer {
    pub fn new() -> Self {
        Self {
            gate: Arc::new(Semaphore::new(0)),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl MapRenderer for GatedRenderer {
    fn prepare(&self) -> BoxFuture<'_, Result<(), ServiceError>> {
        Box::pin(async { Ok(()) })
    }

    fn render_viewport<'a>(
        &'a self,
        request: &'a RenderRequest,
    ) -> BoxFuture<'a, Result<Bitmap, ServiceError>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let permit = self
                .gate
                .acquire()
                .await
                .map_err(|_| ServiceError::failed("gate closed"))?;
            permit.forget();
            Ok(Bitmap::blank(request.width, request.height))
        })
    }
}

/// Everything a test needs to drive an orchestrator.
pub struct Harness {
    pub orchestrator: Orchestrator,
    pub gps: Arc<MockPositionSource>,
    pub display: Arc<MockDisplay>,
    pub config: Arc<IniConfigStore>,
    pub dir: TempDir,
}

impl Harness {
    pub fn new(renderer: Arc<dyn MapRenderer>) -> Self {
        Self::with_config(renderer, |_| {})
    }

    pub fn with_config(renderer: Arc<dyn MapRenderer>, tweak: impl FnOnce(&mut ConfigFile)) -> Self {
        let dir = TempDir::new().unwrap();
        let mut config = ConfigFile::default();
        config.display.width = WIDTH;
        config.display.height = HEIGHT;
        config.prefetch.enabled = false;
        config.prefetch.cache_dir = dir.path().join("cache");
        config.prefetch.request_delay_ms = 0;
        tweak(&mut config);

        let config = Arc::new(IniConfigStore::in_memory(config));
        let gps = Arc::new(MockPositionSource::new());
        let display = Arc::new(MockDisplay::new(WIDTH, HEIGHT));
        let routes = Arc::new(JsonRouteSource::with_base_dir(dir.path()));

        let orchestrator = OrchestratorBuilder::new(
            config.clone() as Arc<dyn ConfigStore>,
            gps.clone(),
            routes,
            renderer,
            display.clone(),
        )
        .build();

        Self {
            orchestrator,
            gps,
            display,
            config,
            dir,
        }
    }

    /// Write `route` as JSON into the temp dir and return its file name.
    pub fn write_route(&self, route: &Route) -> PathBuf {
        let name = PathBuf::from(format!("{}.json", route.id));
        let json = serde_json::to_vec_pretty(route).unwrap();
        std::fs::write(self.dir.path().join(&name), json).unwrap();
        name
    }
}

/// Straight northbound route from [`START`] with `count` waypoints every
/// `spacing_m`, geometry sampled every 10 m.
pub fn northbound_route(id: &str, count: usize, spacing_m: f64) -> Route {
    let length = (count.saturating_sub(1)) as f64 * spacing_m;
    let steps = (length / 10.0).round() as usize;
    let geometry: Vec<Coordinate> = (0..=steps)
        .map(|i| destination_point(&START, 0.0, i as f64 * 10.0))
        .collect();
    let waypoints = (0..count)
        .map(|i| {
            let maneuver = match i {
                0 => Maneuver::Depart,
                i if i + 1 == count => Maneuver::Arrive,
                _ => Maneuver::Straight,
            };
            let coordinate = destination_point(&START, 0.0, i as f64 * spacing_m);
            Waypoint::new(coordinate, format!("Waypoint {}", i), maneuver)
        })
        .collect();
    Route::from_parts(id, waypoints, geometry, 1.4).with_name(format!("Route {}", id))
}

/// Timestamp `secs` after a fixed epoch.
pub fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

/// Position `meters` north of [`START`] at `secs`.
pub fn north_of_start(meters: f64, secs: i64) -> Position {
    let c = destination_point(&START, 0.0, meters);
    Position::at(c.lat, c.lon, ts(secs))
}

/// Poll `check` until it holds or two seconds pass.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..400 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    check()
}
