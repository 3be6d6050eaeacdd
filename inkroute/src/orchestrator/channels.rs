//! Event registries owned by the orchestrator, one per event kind.

use crate::cache::CacheKind;
use crate::events::EventRegistry;
use crate::navigation::NavigationUpdate;
use crate::position::{GpsStatus, Position};
use crate::prefetch::PrefetchProgress;

use super::types::{DisplayRefresh, ErrorEvent};

pub(crate) struct EventChannels {
    pub gps_update: EventRegistry<Position>,
    pub gps_status: EventRegistry<GpsStatus>,
    pub display_update: EventRegistry<DisplayRefresh>,
    pub error: EventRegistry<ErrorEvent>,
    pub navigation: EventRegistry<NavigationUpdate>,
    pub prefetch: PrefetchChannels,
}

impl EventChannels {
    pub fn new() -> Self {
        Self {
            gps_update: EventRegistry::new("gps_update"),
            gps_status: EventRegistry::new("gps_status_change"),
            display_update: EventRegistry::new("display_update"),
            error: EventRegistry::new("error"),
            navigation: EventRegistry::new("drive_navigation_update"),
            prefetch: PrefetchChannels::new(),
        }
    }
}

/// Progress registries, one per cache kind.
pub(crate) struct PrefetchChannels {
    speed_limit: EventRegistry<PrefetchProgress>,
    poi: EventRegistry<PrefetchProgress>,
    elevation: EventRegistry<PrefetchProgress>,
    road_surface: EventRegistry<PrefetchProgress>,
    location: EventRegistry<PrefetchProgress>,
}

impl PrefetchChannels {
    fn new() -> Self {
        Self {
            speed_limit: EventRegistry::new("speed_limit_prefetch_progress"),
            poi: EventRegistry::new("poi_prefetch_progress"),
            elevation: EventRegistry::new("elevation_prefetch_progress"),
            road_surface: EventRegistry::new("road_surface_prefetch_progress"),
            location: EventRegistry::new("location_prefetch_progress"),
        }
    }

    pub fn for_kind(&self, kind: CacheKind) -> &EventRegistry<PrefetchProgress> {
        match kind {
            CacheKind::SpeedLimit => &self.speed_limit,
            CacheKind::Poi => &self.poi,
            CacheKind::Elevation => &self.elevation,
            CacheKind::RoadSurface => &self.road_surface,
            CacheKind::Location => &self.location,
        }
    }

    pub fn emit(&self, progress: &PrefetchProgress) {
        self.for_kind(progress.kind).emit(progress);
    }
}
