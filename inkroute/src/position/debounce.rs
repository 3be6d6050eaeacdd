//! Position debouncing for display refresh decisions.
//!
//! The GPS may deliver readings at 1-10 Hz, far faster than an e-paper panel
//! can usefully refresh. The debouncer reduces the raw stream to readings that
//! are worth acting on.
//!
//! # Rules
//!
//! Rules are checked in order and the first match decides:
//!
//! 1. The first reading seen is accepted.
//! 2. Less than `min_interval` since the last accepted reading: rejected
//!    regardless of distance (rate limit).
//! 3. At least `min_distance_m` from the last accepted reading: accepted.
//! 4. At least `max_silence` since the last accepted reading: accepted
//!    (heartbeat so a stationary device still refreshes occasionally).
//! 5. Otherwise rejected.
//!
//! Elapsed time is measured with the readings' own timestamps so behaviour is
//! deterministic for recorded streams.

use std::time::Duration;

use super::types::Position;

/// Default minimum time between accepted readings.
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Default minimum movement for a reading to pass.
pub const DEFAULT_MIN_DISTANCE_M: f64 = 10.0;

/// Default heartbeat interval for a stationary device.
pub const DEFAULT_MAX_SILENCE: Duration = Duration::from_secs(30);

/// Debounce thresholds.
#[derive(Debug, Clone, PartialEq)]
pub struct DebounceConfig {
    /// Minimum time between accepted readings.
    pub min_interval: Duration,
    /// Minimum movement in metres for a reading to pass.
    pub min_distance_m: f64,
    /// Accept a reading after this long even without movement.
    pub max_silence: Duration,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            min_interval: DEFAULT_MIN_INTERVAL,
            min_distance_m: DEFAULT_MIN_DISTANCE_M,
            max_silence: DEFAULT_MAX_SILENCE,
        }
    }
}

/// Filters a raw position stream down to a rate- and distance-limited one.
#[derive(Debug)]
pub struct PositionDebouncer {
    config: DebounceConfig,
    last_accepted: Option<Position>,
    accepted: u64,
    suppressed: u64,
}

impl Default for PositionDebouncer {
    fn default() -> Self {
        Self::new(DebounceConfig::default())
    }
}

impl PositionDebouncer {
    /// Create a debouncer with the given thresholds.
    pub fn new(config: DebounceConfig) -> Self {
        Self {
            config,
            last_accepted: None,
            accepted: 0,
            suppressed: 0,
        }
    }

    /// Offer a reading. Returns `true` if it passes the filter.
    pub fn accept(&mut self, position: &Position) -> bool {
        let pass = match &self.last_accepted {
            None => true,
            Some(last) => {
                let elapsed = position
                    .timestamp
                    .signed_duration_since(last.timestamp)
                    .to_std()
                    // Out-of-order timestamps count as no time elapsed.
                    .unwrap_or(Duration::ZERO);

                if elapsed < self.config.min_interval {
                    false
                } else {
                    let moved = last.coordinate().distance_to(&position.coordinate());
                    moved >= self.config.min_distance_m || elapsed >= self.config.max_silence
                }
            }
        };

        if pass {
            self.last_accepted = Some(*position);
            self.accepted += 1;
        } else {
            self.suppressed += 1;
        }
        pass
    }

    /// Forget the last accepted reading so the next one passes.
    pub fn reset(&mut self) {
        self.last_accepted = None;
    }

    /// The last reading that passed.
    pub fn last_accepted(&self) -> Option<&Position> {
        self.last_accepted.as_ref()
    }

    /// Number of readings that passed.
    pub fn accepted_count(&self) -> u64 {
        self.accepted
    }

    /// Number of readings that were suppressed.
    pub fn suppressed_count(&self) -> u64 {
        self.suppressed
    }

    /// The active thresholds.
    pub fn config(&self) -> &DebounceConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::{destination_point, Coordinate};
    use chrono::{TimeZone, Utc};

    fn at(coord: Coordinate, secs: i64) -> Position {
        let ts = Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap();
        Position::at(coord.lat, coord.lon, ts)
    }

    const START: Coordinate = Coordinate::new(48.0, 11.0);

    #[test]
    fn test_first_position_always_passes() {
        let mut debouncer = PositionDebouncer::default();
        assert!(debouncer.accept(&at(START, 0)));
        assert_eq!(debouncer.accepted_count(), 1);
    }

    #[test]
    fn test_rate_limit_rejects_fast_readings_even_when_moving() {
        let mut debouncer = PositionDebouncer::default();
        debouncer.accept(&at(START, 0));

        let far = destination_point(&START, 0.0, 500.0);
        let fast = Position {
            timestamp: at(START, 0).timestamp + chrono::Duration::milliseconds(200),
            ..at(far, 0)
        };
        assert!(!debouncer.accept(&fast));
        assert_eq!(debouncer.suppressed_count(), 1);
    }

    #[test]
    fn test_distance_threshold() {
        let mut debouncer = PositionDebouncer::default();
        debouncer.accept(&at(START, 0));

        let near = destination_point(&START, 90.0, 3.0);
        assert!(!debouncer.accept(&at(near, 2)));

        let far = destination_point(&START, 90.0, 25.0);
        assert!(debouncer.accept(&at(far, 4)));
    }

    #[test]
    fn test_heartbeat_after_silence() {
        let mut debouncer = PositionDebouncer::default();
        debouncer.accept(&at(START, 0));

        assert!(!debouncer.accept(&at(START, 10)));
        assert!(debouncer.accept(&at(START, 31)));
    }

    #[test]
    fn test_out_of_order_timestamp_is_rejected() {
        let mut debouncer = PositionDebouncer::default();
        debouncer.accept(&at(START, 100));

        let far = destination_point(&START, 0.0, 1_000.0);
        assert!(!debouncer.accept(&at(far, 50)));
    }

    #[test]
    fn test_reset_lets_next_reading_pass() {
        let mut debouncer = PositionDebouncer::default();
        debouncer.accept(&at(START, 0));
        debouncer.reset();
        assert!(debouncer.accept(&at(START, 0)));
        assert!(debouncer.last_accepted().is_some());
    }
}
