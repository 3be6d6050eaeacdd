//! The drive navigation state machine.

use std::sync::Arc;

use tracing::{debug, info};

use super::config::NavigationConfig;
use super::state::{
    derive_display_mode, NavigationEventKind, NavigationState, NavigationStatus,
    NavigationUpdate, OffRoadGuidance,
};
use crate::geo::{cumulative_distances_m, project_onto_polyline, Coordinate, PolylineProjection};
use crate::position::Position;
use crate::route::Route;

/// Tracks progress along one route instance.
///
/// Created in `Navigating` by the orchestrator once a position is known.
/// Feed every GPS reading to [`update`](Self::update), including the ones
/// the display debouncer drops; the returned
/// updates are in emission order and always end with a `Status` snapshot
/// while the instance is active.
///
/// # Example
///
/// ```ignore
/// let mut nav = DriveNavigator::new(route, NavigationConfig::default());
/// for update in nav.update(&position) {
///     println!("{:?} -> {}", update.kind, update.status.display_mode);
/// }
/// ```
#[derive(Debug)]
pub struct DriveNavigator {
    route: Arc<Route>,
    config: NavigationConfig,
    cumulative: Vec<f64>,
    geometry_length_m: f64,
    state: NavigationState,
    waypoint_index: usize,
    last_segment: usize,
    progress_percent: f64,
    distance_to_turn_m: f64,
    turn_announced: Option<usize>,
    off_road: Option<OffRoadGuidance>,
}

impl DriveNavigator {
    /// Start navigating `route`.
    ///
    /// The route must have passed [`Route::validate`].
    pub fn new(route: Arc<Route>, config: NavigationConfig) -> Self {
        let cumulative = cumulative_distances_m(&route.geometry);
        let geometry_length_m = cumulative.last().copied().unwrap_or(0.0);
        let distance_to_turn_m = route
            .waypoints
            .first()
            .zip(route.geometry.first())
            .map(|(wp, start)| start.distance_to(&wp.coordinate))
            .unwrap_or(0.0);

        info!(
            route_id = %route.id,
            waypoints = route.waypoints.len(),
            length_m = format!("{:.0}", geometry_length_m),
            "Drive navigation started"
        );

        Self {
            route,
            config,
            cumulative,
            geometry_length_m,
            state: NavigationState::Navigating,
            waypoint_index: 0,
            last_segment: 0,
            progress_percent: 0.0,
            distance_to_turn_m,
            turn_announced: None,
            off_road: None,
        }
    }

    /// The route being followed.
    pub fn route(&self) -> &Arc<Route> {
        &self.route
    }

    /// Current state.
    pub fn state(&self) -> NavigationState {
        self.state
    }

    /// Index of the upcoming waypoint.
    pub fn current_waypoint_index(&self) -> usize {
        self.waypoint_index
    }

    /// Evaluate a new position.
    ///
    /// Returns nothing once the instance is `Arrived` or `Cancelled`.
    pub fn update(&mut self, position: &Position) -> Vec<NavigationUpdate> {
        if !self.state.is_active() {
            return Vec::new();
        }

        let here = position.coordinate();
        let mut updates = Vec::new();

        let nearest = project_onto_polyline(
            &here,
            &self.route.geometry,
            &self.cumulative,
            0..self.route.geometry.len(),
        );

        if let Some(nearest) = nearest {
            match self.state {
                NavigationState::Navigating
                    if nearest.distance_m >= self.config.off_road_threshold_m =>
                {
                    self.state = NavigationState::OffRoad;
                    self.off_road = Some(guidance(&here, &nearest));
                    self.refresh_distance_to_turn(&here);
                    info!(
                        route_id = %self.route.id,
                        distance_m = format!("{:.0}", nearest.distance_m),
                        "Left route corridor"
                    );
                    updates.push(self.snapshot(NavigationEventKind::OffRoad));
                    updates.push(self.snapshot(NavigationEventKind::Status));
                    return updates;
                }
                NavigationState::OffRoad if nearest.distance_m < self.config.rejoin_threshold_m => {
                    self.state = NavigationState::Navigating;
                    self.off_road = None;
                    info!(
                        route_id = %self.route.id,
                        distance_m = format!("{:.0}", nearest.distance_m),
                        "Rejoined route"
                    );
                }
                NavigationState::OffRoad => {
                    self.off_road = Some(guidance(&here, &nearest));
                    self.refresh_distance_to_turn(&here);
                    updates.push(self.snapshot(NavigationEventKind::Status));
                    return updates;
                }
                _ => {}
            }
            self.advance_progress(&here, nearest);
        }

        self.advance_waypoints(&here, &mut updates);

        if self.state == NavigationState::Navigating
            && self.distance_to_turn_m < self.config.turn_screen_distance_m
            && self.turn_announced != Some(self.waypoint_index)
        {
            self.turn_announced = Some(self.waypoint_index);
            updates.push(self.snapshot(NavigationEventKind::TurnApproaching(
                self.waypoint_index,
            )));
        }

        debug!(
            state = %self.state,
            waypoint = self.waypoint_index,
            to_turn_m = format!("{:.0}", self.distance_to_turn_m),
            progress = format!("{:.1}", self.progress_percent),
            "Navigation tick"
        );

        updates.push(self.snapshot(NavigationEventKind::Status));
        updates
    }

    /// Cancel an active instance.
    ///
    /// Returns the final `Cancelled` status when the instance was still
    /// navigating or off-road.
    pub fn cancel(&mut self) -> Option<NavigationUpdate> {
        if !self.state.is_active() {
            return None;
        }
        self.state = NavigationState::Cancelled;
        self.off_road = None;
        info!(route_id = %self.route.id, "Drive navigation cancelled");
        Some(self.snapshot(NavigationEventKind::Status))
    }

    /// Current status snapshot.
    pub fn status(&self) -> NavigationStatus {
        let waypoint = self.route.waypoints.get(self.waypoint_index);
        let remaining_fraction = (1.0 - self.progress_percent / 100.0).clamp(0.0, 1.0);
        let total_distance = if self.route.total_distance_m > 0.0 {
            self.route.total_distance_m
        } else {
            self.geometry_length_m
        };

        NavigationStatus {
            route_id: self.route.id.clone(),
            state: self.state,
            display_mode: derive_display_mode(
                self.state,
                self.distance_to_turn_m,
                self.config.turn_screen_distance_m,
            ),
            current_waypoint_index: self.waypoint_index,
            waypoint_count: self.route.waypoints.len(),
            next_instruction: waypoint.map(|w| w.instruction.clone()),
            next_maneuver: waypoint.map(|w| w.maneuver),
            next_street: waypoint.and_then(|w| w.street_name.clone()),
            distance_to_next_turn_m: self.distance_to_turn_m,
            distance_remaining_m: total_distance * remaining_fraction,
            time_remaining_secs: self.route.estimated_time_secs.max(0.0) * remaining_fraction,
            progress_percent: self.progress_percent,
            off_road: self.off_road,
        }
    }

    fn snapshot(&self, kind: NavigationEventKind) -> NavigationUpdate {
        NavigationUpdate {
            kind,
            status: self.status(),
        }
    }

    fn refresh_distance_to_turn(&mut self, here: &Coordinate) {
        if let Some(wp) = self.route.waypoints.get(self.waypoint_index) {
            self.distance_to_turn_m = here.distance_to(&wp.coordinate);
        }
    }

    /// Move the along-track position forward.
    ///
    /// Searches a window ahead of the last matched segment so overlapping
    /// geometry (out-and-back roads) cannot pull progress backwards; falls
    /// back to the global match when the window is far from the position.
    fn advance_progress(&mut self, here: &Coordinate, global: PolylineProjection) {
        let window_end = self.last_segment + self.config.progress_window_segments + 1;
        let windowed = project_onto_polyline(
            here,
            &self.route.geometry,
            &self.cumulative,
            self.last_segment..window_end,
        );

        let matched = match windowed {
            Some(w) if w.distance_m < self.config.off_road_threshold_m => w,
            _ => global,
        };

        self.last_segment = self.last_segment.max(matched.segment_index);

        if self.geometry_length_m > 0.0 {
            let percent = (matched.along_track_m / self.geometry_length_m * 100.0).clamp(0.0, 100.0);
            self.progress_percent = self.progress_percent.max(percent);
        }
    }

    fn advance_waypoints(&mut self, here: &Coordinate, updates: &mut Vec<NavigationUpdate>) {
        let last = self.route.waypoints.len().saturating_sub(1);

        while let Some(waypoint) = self.route.waypoints.get(self.waypoint_index) {
            let distance = here.distance_to(&waypoint.coordinate);

            if self.waypoint_index == last {
                self.distance_to_turn_m = distance;
                if distance <= self.config.arrival_threshold_m {
                    self.state = NavigationState::Arrived;
                    self.progress_percent = 100.0;
                    self.distance_to_turn_m = 0.0;
                    info!(route_id = %self.route.id, "Arrived at destination");
                    updates.push(self.snapshot(NavigationEventKind::Arrived));
                }
                return;
            }

            if distance > self.config.waypoint_reached_m {
                self.distance_to_turn_m = distance;
                return;
            }

            let reached = self.waypoint_index;
            self.waypoint_index += 1;
            self.refresh_distance_to_turn(here);
            info!(
                route_id = %self.route.id,
                waypoint = reached,
                "Waypoint reached"
            );
            updates.push(self.snapshot(NavigationEventKind::WaypointReached(reached)));
        }
    }
}

fn guidance(here: &Coordinate, nearest: &PolylineProjection) -> OffRoadGuidance {
    OffRoadGuidance {
        bearing_deg: here.bearing_to(&nearest.nearest),
        distance_m: nearest.distance_m,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::destination_point;
    use crate::navigation::DisplayMode;
    use crate::route::{Maneuver, Waypoint};

    const START: Coordinate = Coordinate::new(48.137, 11.575);

    /// Straight northbound route with waypoints every `spacing_m`.
    fn northbound_route(waypoints: usize, spacing_m: f64) -> Arc<Route> {
        let coords: Vec<Coordinate> = (0..waypoints)
            .map(|i| destination_point(&START, 0.0, i as f64 * spacing_m))
            .collect();
        let wps = coords
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let maneuver = match i {
                    0 => Maneuver::Depart,
                    i if i == waypoints - 1 => Maneuver::Arrive,
                    _ => Maneuver::Straight,
                };
                Waypoint::new(*c, format!("Waypoint {}", i), maneuver)
            })
            .collect();
        Arc::new(Route::from_parts("north", wps, coords, 10.0))
    }

    fn at_distance(m: f64) -> Position {
        let c = destination_point(&START, 0.0, m);
        Position::new(c.lat, c.lon)
    }

    fn kinds(updates: &[NavigationUpdate]) -> Vec<NavigationEventKind> {
        updates.iter().map(|u| u.kind).collect()
    }

    #[test]
    fn test_position_on_polyline_never_goes_off_road() {
        let mut nav = DriveNavigator::new(northbound_route(3, 1_000.0), NavigationConfig::default());
        for step in 0..40 {
            nav.update(&at_distance(step as f64 * 25.0));
            assert_ne!(nav.state(), NavigationState::OffRoad);
        }
    }

    #[test]
    fn test_far_position_enters_off_road() {
        let mut nav = DriveNavigator::new(northbound_route(3, 1_000.0), NavigationConfig::default());
        let off = destination_point(&destination_point(&START, 0.0, 500.0), 90.0, 600.0);

        let updates = nav.update(&Position::new(off.lat, off.lon));

        assert_eq!(nav.state(), NavigationState::OffRoad);
        assert_eq!(
            kinds(&updates),
            vec![NavigationEventKind::OffRoad, NavigationEventKind::Status]
        );
        let status = &updates[1].status;
        assert_eq!(status.display_mode, DisplayMode::OffRoadArrow);
        let guidance = status.off_road.unwrap();
        assert!((guidance.distance_m - 600.0).abs() < 2.0);
        // Route is to the west of the position.
        assert!((guidance.bearing_deg - 270.0).abs() < 1.0);
    }

    #[test]
    fn test_off_road_rejoins_with_status_event() {
        let mut nav = DriveNavigator::new(northbound_route(3, 1_000.0), NavigationConfig::default());
        let off = destination_point(&destination_point(&START, 0.0, 500.0), 90.0, 700.0);
        nav.update(&Position::new(off.lat, off.lon));
        assert_eq!(nav.state(), NavigationState::OffRoad);

        let updates = nav.update(&at_distance(520.0));

        assert_eq!(nav.state(), NavigationState::Navigating);
        assert_eq!(updates.last().unwrap().kind, NavigationEventKind::Status);
        assert!(updates.last().unwrap().status.off_road.is_none());
    }

    #[test]
    fn test_rejoin_threshold_below_off_road_threshold() {
        let config = NavigationConfig {
            rejoin_threshold_m: 100.0,
            ..NavigationConfig::default()
        };
        let mut nav = DriveNavigator::new(northbound_route(3, 1_000.0), config);
        let abeam = destination_point(&START, 0.0, 500.0);
        let east = |m: f64| {
            let c = destination_point(&abeam, 90.0, m);
            Position::new(c.lat, c.lon)
        };

        nav.update(&east(600.0));
        assert_eq!(nav.state(), NavigationState::OffRoad);

        // Back inside the off-road corridor but not yet close enough to rejoin.
        let updates = nav.update(&east(300.0));
        assert_eq!(nav.state(), NavigationState::OffRoad);
        assert_eq!(kinds(&updates), vec![NavigationEventKind::Status]);
        let guidance = updates[0].status.off_road.unwrap();
        assert!((guidance.distance_m - 300.0).abs() < 2.0);

        nav.update(&east(150.0));
        assert_eq!(nav.state(), NavigationState::OffRoad);

        nav.update(&east(50.0));
        assert_eq!(nav.state(), NavigationState::Navigating);
        assert!(nav.status().off_road.is_none());
    }

    #[test]
    fn test_waypoint_reached_fires_once_per_crossing() {
        let mut nav = DriveNavigator::new(northbound_route(3, 1_000.0), NavigationConfig::default());
        nav.update(&at_distance(0.0));
        assert_eq!(nav.current_waypoint_index(), 1);

        let mut reached = 0;
        for m in [960.0, 975.0, 990.0, 1_000.0, 1_010.0] {
            let updates = nav.update(&at_distance(m));
            reached += kinds(&updates)
                .iter()
                .filter(|k| matches!(k, NavigationEventKind::WaypointReached(1)))
                .count();
        }

        assert_eq!(reached, 1);
        assert_eq!(nav.current_waypoint_index(), 2);
    }

    #[test]
    fn test_arrival_is_sticky() {
        let mut nav = DriveNavigator::new(northbound_route(2, 300.0), NavigationConfig::default());
        nav.update(&at_distance(0.0));

        let updates = nav.update(&at_distance(260.0));
        assert!(kinds(&updates).contains(&NavigationEventKind::Arrived));
        assert_eq!(nav.state(), NavigationState::Arrived);

        let far = destination_point(&START, 90.0, 5_000.0);
        assert!(nav.update(&Position::new(far.lat, far.lon)).is_empty());
        assert_eq!(nav.state(), NavigationState::Arrived);
        let status = nav.status();
        assert_eq!(status.progress_percent, 100.0);
        assert_eq!(status.display_mode, DisplayMode::Arrived);
    }

    #[test]
    fn test_turn_approaching_emitted_once_per_waypoint() {
        let mut nav = DriveNavigator::new(northbound_route(3, 2_000.0), NavigationConfig::default());
        nav.update(&at_distance(0.0));

        let mut announced = Vec::new();
        for step in 1..=20 {
            for update in nav.update(&at_distance(step as f64 * 100.0)) {
                if let NavigationEventKind::TurnApproaching(i) = update.kind {
                    announced.push(i);
                }
            }
        }

        assert_eq!(announced, vec![1]);
    }

    #[test]
    fn test_display_mode_switches_to_turn_screen_near_turn() {
        let mut nav = DriveNavigator::new(northbound_route(3, 2_000.0), NavigationConfig::default());
        nav.update(&at_distance(0.0));

        nav.update(&at_distance(1_000.0));
        assert_eq!(nav.status().display_mode, DisplayMode::MapWithOverlay);

        nav.update(&at_distance(1_600.0));
        assert_eq!(nav.status().display_mode, DisplayMode::TurnScreen);
    }

    #[test]
    fn test_cancel_only_from_active_states() {
        let mut nav = DriveNavigator::new(northbound_route(2, 300.0), NavigationConfig::default());
        let update = nav.cancel().unwrap();
        assert_eq!(update.status.state, NavigationState::Cancelled);
        assert!(nav.cancel().is_none());
        assert!(nav.update(&at_distance(0.0)).is_empty());
    }

    #[test]
    fn test_remaining_distance_and_time_shrink() {
        let mut nav = DriveNavigator::new(northbound_route(3, 1_000.0), NavigationConfig::default());
        nav.update(&at_distance(0.0));
        let before = nav.status();

        nav.update(&at_distance(500.0));
        let after = nav.status();

        assert!(after.distance_remaining_m < before.distance_remaining_m);
        assert!((after.distance_remaining_m - 1_500.0).abs() < 5.0);
        assert!(after.time_remaining_secs < before.time_remaining_secs);
        assert!((after.progress_percent - 25.0).abs() < 0.5);
    }

    #[test]
    fn test_progress_does_not_move_backwards() {
        let mut nav = DriveNavigator::new(northbound_route(3, 1_000.0), NavigationConfig::default());
        nav.update(&at_distance(800.0));
        let high = nav.status().progress_percent;

        nav.update(&at_distance(400.0));
        assert_eq!(nav.status().progress_percent, high);
    }
}
