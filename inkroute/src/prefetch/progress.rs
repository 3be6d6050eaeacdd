//! Prefetch progress reporting.

use serde::Serialize;

use crate::cache::CacheKind;

/// Progress of one cache job, reported after every chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrefetchProgress {
    pub kind: CacheKind,
    /// Route the job is filling.
    pub route_id: String,
    /// Chunks attempted so far.
    pub completed: usize,
    /// Total chunks for the route.
    pub total: usize,
    /// Items found so far.
    pub found: usize,
    /// Whether the job has attempted every chunk.
    pub complete: bool,
}

impl PrefetchProgress {
    /// Completion as a percentage.
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            self.completed as f64 / self.total as f64 * 100.0
        }
    }
}

/// Result of a finished cache job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefetchSummary {
    pub kind: CacheKind,
    pub route_id: String,
    pub chunks: usize,
    pub failed_chunks: usize,
    pub items: usize,
    /// Loaded from an existing disk cache instead of queried.
    pub hydrated: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent() {
        let p = PrefetchProgress {
            kind: CacheKind::Poi,
            route_id: "r".to_string(),
            completed: 1,
            total: 4,
            found: 0,
            complete: false,
        };
        assert_eq!(p.percent(), 25.0);
        assert_eq!(PrefetchProgress { total: 0, ..p }.percent(), 100.0);
    }
}
