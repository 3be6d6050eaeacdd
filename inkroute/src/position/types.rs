//! Core position types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geo::Coordinate;

/// A single GPS reading.
///
/// Immutable once emitted; each new reading supersedes the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Altitude above mean sea level in metres.
    pub altitude: Option<f64>,
    /// Horizontal accuracy in metres.
    pub accuracy: Option<f64>,
    /// Ground speed in metres per second.
    pub speed: Option<f64>,
    /// Ground track in degrees true.
    pub bearing: Option<f64>,
    /// When the reading was taken.
    pub timestamp: DateTime<Utc>,
}

impl Position {
    /// Create a position with only latitude/longitude, timestamped now.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self::at(latitude, longitude, Utc::now())
    }

    /// Create a position with an explicit timestamp.
    pub fn at(latitude: f64, longitude: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            latitude,
            longitude,
            altitude: None,
            accuracy: None,
            speed: None,
            bearing: None,
            timestamp,
        }
    }

    /// Set the ground track.
    pub fn with_bearing(mut self, bearing: f64) -> Self {
        self.bearing = Some(bearing);
        self
    }

    /// Set the ground speed.
    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = Some(speed);
        self
    }

    /// The reading as a plain coordinate.
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }
}

/// Quality of the current GPS fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixQuality {
    /// No fix.
    NoFix,
    /// Two-dimensional fix.
    Fix2d,
    /// Three-dimensional fix.
    Fix3d,
}

/// GPS receiver status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpsStatus {
    /// Fix quality.
    pub fix: FixQuality,
    /// Number of satellites in use.
    pub satellites: u8,
}

impl GpsStatus {
    /// Status reported before the receiver produces anything.
    pub fn no_fix() -> Self {
        Self {
            fix: FixQuality::NoFix,
            satellites: 0,
        }
    }

    /// Whether the receiver currently has a usable fix.
    pub fn has_fix(&self) -> bool {
        self.fix != FixQuality::NoFix
    }
}

/// Events published by a [`PositionSource`](super::PositionSource).
#[derive(Debug, Clone, PartialEq)]
pub enum GpsEvent {
    /// A new position reading.
    Position(Position),
    /// The receiver status changed.
    Status(GpsStatus),
}
