//! Run command - drive a route with a simulated GPS receiver.
//!
//! Wires the tracker core against the mock GPS and mock display, loads the
//! route, starts drive navigation and replays positions along the route
//! geometry until the destination is reached or Ctrl+C is pressed.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use inkroute::config::{ConfigStore, IniConfigStore};
use inkroute::display::{MockDisplay, SimpleMapRenderer};
use inkroute::geo::{bearing_deg, cumulative_distances_m, destination_point};
use inkroute::logging::{default_log_dir, default_log_file, init_logging};
use inkroute::navigation::{NavigationEventKind, NavigationState};
use inkroute::orchestrator::{Orchestrator, OrchestratorBuilder};
use inkroute::position::{MockPositionSource, Position};
use inkroute::route::{JsonRouteSource, Route};

use crate::error::CliError;

/// Arguments for the run command.
pub struct RunArgs {
    pub route: PathBuf,
    pub config: Option<PathBuf>,
    pub step_m: f64,
    pub interval_ms: u64,
    pub snapshot: Option<PathBuf>,
    pub navigate: bool,
}

/// Run the simulated drive.
pub async fn run(args: RunArgs) -> Result<(), CliError> {
    let _logging = init_logging(&default_log_dir(), default_log_file())
        .map_err(|e| CliError::LoggingInit(e.to_string()))?;
    info!(version = inkroute::VERSION, "InkRoute starting");

    if args.step_m.is_nan() || args.step_m <= 0.0 {
        return Err(CliError::Config("--step-m must be positive".to_string()));
    }

    let store = match &args.config {
        Some(path) => IniConfigStore::open(path)?,
        None => IniConfigStore::open_default()?,
    };
    let store = Arc::new(store);
    let snapshot = store.snapshot();

    let gps = Arc::new(MockPositionSource::new());
    let display = Arc::new(MockDisplay::new(snapshot.display.width, snapshot.display.height));
    let orchestrator = OrchestratorBuilder::new(
        store as Arc<dyn ConfigStore>,
        gps.clone(),
        Arc::new(JsonRouteSource::new()),
        Arc::new(SimpleMapRenderer::new()),
        display,
    )
    .with_configured_caches()
    .map_err(CliError::Setup)?
    .build();

    // Keep a rendered frame around for --snapshot.
    orchestrator.set_web_socket_client_count(usize::from(args.snapshot.is_some()));

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    ctrlc::set_handler(move || {
        println!();
        println!("Received shutdown signal, stopping...");
        signal.cancel();
    })
    .map_err(|e| CliError::Config(format!("Failed to set signal handler: {}", e)))?;

    let mut result = drive(&orchestrator, &gps, &args, &shutdown).await;
    if let Some(path) = &args.snapshot {
        result = result.and_then(|()| write_snapshot(&orchestrator, path));
    }

    let disposed = orchestrator
        .dispose()
        .await
        .map_err(|e| CliError::orchestrator("dispose", e));
    info!("InkRoute stopped");
    result.and(disposed)
}

async fn drive(
    orchestrator: &Orchestrator,
    gps: &MockPositionSource,
    args: &RunArgs,
    shutdown: &CancellationToken,
) -> Result<(), CliError> {
    orchestrator
        .initialize()
        .await
        .map_err(|e| CliError::orchestrator("initialize", e))?;

    let route = orchestrator
        .set_active_gpx(&args.route)
        .await
        .map_err(|e| CliError::orchestrator("set_active_gpx", e))?;

    println!("Route:     {}", route.display_name());
    println!("Waypoints: {}", route.waypoints.len());
    println!("Distance:  {:.1} km", route.total_distance_m / 1000.0);
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let _nav = orchestrator.on_drive_navigation_update(|update| match update.kind {
        NavigationEventKind::Status => {}
        NavigationEventKind::TurnApproaching(i) => {
            let instruction = update.status.next_instruction.as_deref().unwrap_or("-");
            println!(
                "[turn]    #{} in {:.0} m: {}",
                i, update.status.distance_to_next_turn_m, instruction
            );
        }
        NavigationEventKind::WaypointReached(i) => {
            println!("[reached] #{} ({:.0}%)", i, update.status.progress_percent);
        }
        NavigationEventKind::OffRoad => println!("[off-road]"),
        NavigationEventKind::Arrived => println!("[arrived]"),
    });
    let _errors = orchestrator.on_error(|event| {
        warn!(operation = event.operation, service = %event.service, "{}", event.message);
    });

    let interval = Duration::from_millis(args.interval_ms);
    let positions = simulate_drive(&route, args.step_m, interval, Utc::now());
    let Some(first) = positions.first() else {
        return Ok(());
    };

    gps.push(*first);
    if args.navigate {
        // The bridge task stores the first reading asynchronously.
        while orchestrator.current_position().is_none() {
            tokio::select! {
                _ = shutdown.cancelled() => return Ok(()),
                _ = tokio::time::sleep(Duration::from_millis(10)) => {}
            }
        }
        orchestrator
            .start_drive_navigation(Arc::clone(&route))
            .await
            .map_err(|e| CliError::orchestrator("start_drive_navigation", e))?;
    }

    for position in positions.into_iter().skip(1) {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(interval) => gps.push(position),
        }
        if args.navigate && !orchestrator.is_drive_navigating() {
            break;
        }
    }

    if let Ok(status) = orchestrator.drive_navigation_status() {
        println!();
        println!(
            "Navigation: {} ({:.0}%, {:.0} m remaining)",
            status.state, status.progress_percent, status.distance_remaining_m
        );
        if status.state != NavigationState::Arrived {
            orchestrator
                .stop_drive_navigation()
                .map_err(|e| CliError::orchestrator("stop_drive_navigation", e))?;
        }
    }
    let status = orchestrator.system_status();
    println!("Frames:     {} ({} failed)", status.frames_rendered, status.failed_renders);
    Ok(())
}

fn write_snapshot(orchestrator: &Orchestrator, path: &Path) -> Result<(), CliError> {
    let Some(png) = orchestrator.mock_display_image() else {
        warn!("No frame was rendered, skipping snapshot");
        return Ok(());
    };
    std::fs::write(path, &png).map_err(|error| CliError::FileWrite {
        path: path.display().to_string(),
        error,
    })?;
    println!("Snapshot:   {}", path.display());
    Ok(())
}

/// Positions every `step_m` along the route geometry, one per `interval`.
///
/// Each reading carries the segment bearing and the speed implied by the
/// step and interval. The last geometry point is always included.
pub fn simulate_drive(
    route: &Route,
    step_m: f64,
    interval: Duration,
    start: DateTime<Utc>,
) -> Vec<Position> {
    let geometry = &route.geometry;
    let cumulative = cumulative_distances_m(geometry);
    let Some(&total) = cumulative.last() else {
        return Vec::new();
    };

    let speed = if interval.is_zero() {
        None
    } else {
        Some(step_m / interval.as_secs_f64())
    };
    let step_interval = chrono::Duration::from_std(interval).unwrap_or_else(|_| chrono::Duration::zero());

    let mut distances: Vec<f64> = Vec::new();
    let mut d = 0.0;
    while d < total {
        distances.push(d);
        d += step_m;
    }
    distances.push(total);

    let mut segment = 0;
    distances
        .into_iter()
        .enumerate()
        .map(|(k, d)| {
            while segment + 2 < geometry.len() && cumulative[segment + 1] <= d {
                segment += 1;
            }
            let a = &geometry[segment];
            let (point, bearing) = match geometry.get(segment + 1) {
                Some(b) => {
                    let bearing = bearing_deg(a, b);
                    (destination_point(a, bearing, d - cumulative[segment]), Some(bearing))
                }
                None => (*a, None),
            };

            let mut position = Position::at(point.lat, point.lon, start + step_interval * k as i32);
            position.bearing = bearing;
            position.speed = speed;
            position
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use inkroute::geo::{haversine_distance_m, Coordinate};
    use inkroute::route::{Maneuver, Waypoint};

    fn northbound(length_m: f64) -> Route {
        let start = Coordinate::new(48.137, 11.575);
        let end = destination_point(&start, 0.0, length_m);
        let waypoints = vec![
            Waypoint::new(start, "Depart", Maneuver::Depart),
            Waypoint::new(end, "Arrive", Maneuver::Arrive),
        ];
        Route::from_parts("sim", waypoints, vec![start, end], 10.0)
    }

    #[test]
    fn test_simulate_drive_steps_along_geometry() {
        let route = northbound(95.0);
        let start = Utc::now();
        let positions = simulate_drive(&route, 10.0, Duration::from_secs(1), start);

        // 0, 10, ..., 90 and the end point.
        assert_eq!(positions.len(), 11);
        assert_eq!(positions[0].timestamp, start);
        assert_eq!(positions[3].timestamp, start + chrono::Duration::seconds(3));

        let origin = route.geometry[0];
        let d = haversine_distance_m(&origin, &positions[5].coordinate());
        assert!((d - 50.0).abs() < 0.5, "got {d}");

        let last = positions.last().unwrap().coordinate();
        assert!(haversine_distance_m(&last, &route.geometry[1]) < 0.5);
        assert!(positions.iter().all(|p| p.speed == Some(10.0)));
        let bearing = positions[1].bearing.unwrap();
        assert!(bearing < 1.0 || bearing > 359.0, "got {bearing}");
    }

    #[test]
    fn test_simulate_drive_empty_geometry() {
        let mut route = northbound(50.0);
        route.geometry.clear();
        assert!(simulate_drive(&route, 10.0, Duration::from_secs(1), Utc::now()).is_empty());
    }
}
