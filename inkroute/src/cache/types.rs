//! Cache value types and errors.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geo::Coordinate;

/// The five route data caches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheKind {
    SpeedLimit,
    Poi,
    Elevation,
    RoadSurface,
    Location,
}

impl CacheKind {
    /// Every kind, in prefetch launch order.
    pub const ALL: [CacheKind; 5] = [
        CacheKind::SpeedLimit,
        CacheKind::Poi,
        CacheKind::Elevation,
        CacheKind::RoadSurface,
        CacheKind::Location,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CacheKind::SpeedLimit => "speed_limit",
            CacheKind::Poi => "poi",
            CacheKind::Elevation => "elevation",
            CacheKind::RoadSurface => "road_surface",
            CacheKind::Location => "location",
        }
    }

    /// Sub-directory of the cache root used by this kind.
    pub fn dir_name(&self) -> &'static str {
        self.as_str()
    }

    /// Radius within which a cached item applies to a position.
    pub fn lookup_radius_m(&self) -> f64 {
        match self {
            CacheKind::SpeedLimit | CacheKind::RoadSurface => 50.0,
            CacheKind::Poi => 200.0,
            CacheKind::Elevation => 500.0,
            CacheKind::Location => 5_000.0,
        }
    }
}

impl fmt::Display for CacheKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CacheKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CacheKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown cache kind '{}'", s))
    }
}

/// A value found along a route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CacheValue {
    SpeedLimit { kmh: u16 },
    Poi { name: String, category: String },
    Elevation { meters: f64 },
    RoadSurface { surface: String },
    Location { name: String },
}

impl CacheValue {
    /// Kind of cache that produces this value.
    pub fn kind(&self) -> CacheKind {
        match self {
            CacheValue::SpeedLimit { .. } => CacheKind::SpeedLimit,
            CacheValue::Poi { .. } => CacheKind::Poi,
            CacheValue::Elevation { .. } => CacheKind::Elevation,
            CacheValue::RoadSurface { .. } => CacheKind::RoadSurface,
            CacheValue::Location { .. } => CacheKind::Location,
        }
    }
}

/// A value anchored at a coordinate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedItem {
    pub coordinate: Coordinate,
    pub value: CacheValue,
}

impl CachedItem {
    pub fn new(coordinate: Coordinate, value: CacheValue) -> Self {
        Self { coordinate, value }
    }
}

/// Errors from route data caches.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Disk I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A cache file could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Every chunk request of a prefetch job failed.
    #[error("all {chunks} {kind} chunk requests failed")]
    AllChunksFailed { kind: CacheKind, chunks: usize },

    /// The job was cancelled by a newer route activation or shutdown.
    #[error("prefetch cancelled")]
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trip_names() {
        for kind in CacheKind::ALL {
            assert_eq!(kind.as_str().parse::<CacheKind>().unwrap(), kind);
        }
        assert!("weather".parse::<CacheKind>().is_err());
    }

    #[test]
    fn test_value_serde_tag() {
        let json = serde_json::to_string(&CacheValue::SpeedLimit { kmh: 50 }).unwrap();
        assert_eq!(json, r#"{"type":"speed_limit","kmh":50}"#);
        assert_eq!(CacheValue::SpeedLimit { kmh: 50 }.kind(), CacheKind::SpeedLimit);
    }

    #[test]
    fn test_all_chunks_failed_message() {
        let err = CacheError::AllChunksFailed {
            kind: CacheKind::Poi,
            chunks: 3,
        };
        assert_eq!(err.to_string(), "all 3 poi chunk requests failed");
    }
}
