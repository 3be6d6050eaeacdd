//! INI serialization logic for converting `ConfigFile` → INI string.

use std::path::Path;

use super::settings::ConfigFile;

/// Convert a `ConfigFile` to a commented INI string for saving.
pub fn to_config_string(config: &ConfigFile) -> String {
    let d = &config.display;
    let a = &config.auto_update;
    let g = &config.gps;
    let n = &config.navigation;
    let p = &config.prefetch;
    let active_gpx = config
        .gpx
        .active
        .as_ref()
        .map(|p| path_to_string(p))
        .unwrap_or_default();
    let url = |u: &Option<String>| u.clone().unwrap_or_default();

    format!(
        r#"[display]
; Map zoom level and the range the zoom buttons may move in (0-20)
zoom = {}
min_zoom = {}
max_zoom = {}
; Keep the map centred on the current position
auto_center = {}
; Rotate the map so the direction of travel points up
rotate_with_bearing = {}
; Active screen: track | turn_by_turn
screen = {}
; Panel size in pixels
width = {}
height = {}

[auto_update]
; Refresh the display periodically
enabled = {}
; Seconds between refreshes (minimum 1)
interval_secs = {}

[gpx]
; Route file restored at start-up (empty = none)
active = {}

[gps]
; Readings closer together than this are ignored (milliseconds)
debounce_min_interval_ms = {}
; Movement needed before a reading triggers a refresh (metres)
debounce_min_distance_m = {}
; Accept a reading after this long even without movement (seconds)
debounce_max_silence_secs = {}

[navigation]
; Distance from the route that counts as off-road (metres)
off_road_threshold_m = {}
; Distance below which an off-road vehicle counts as back on the route
rejoin_threshold_m = {}
; Distance at which a waypoint counts as reached
waypoint_reached_m = {}
; Distance to the destination that counts as arrival
arrival_threshold_m = {}
; Show the turn screen when the next turn is closer than this
turn_screen_distance_m = {}

[prefetch]
; Download speed limits, POIs, elevation, road surface and place names
; along the active route in the background
enabled = {}
; Where route caches are stored
cache_dir = {}
; Longest route piece queried in one request (metres)
chunk_length_m = {}
; Pause between requests (milliseconds)
request_delay_ms = {}
; Give up on a request after this many seconds
request_timeout_secs = {}
; Multiply the pause by this while no web viewer is connected (>= 1.0)
idle_delay_factor = {}
; Chunk endpoints per data kind (empty = disabled)
speed_limit_url = {}
poi_url = {}
elevation_url = {}
road_surface_url = {}
location_url = {}
"#,
        d.zoom,
        d.min_zoom,
        d.max_zoom,
        d.auto_center,
        d.rotate_with_bearing,
        d.screen,
        d.width,
        d.height,
        a.enabled,
        a.interval_secs,
        active_gpx,
        g.debounce_min_interval_ms,
        g.debounce_min_distance_m,
        g.debounce_max_silence_secs,
        n.off_road_threshold_m,
        n.rejoin_threshold_m,
        n.waypoint_reached_m,
        n.arrival_threshold_m,
        n.turn_screen_distance_m,
        p.enabled,
        path_to_string(&p.cache_dir),
        p.chunk_length_m,
        p.request_delay_ms,
        p.request_timeout_secs,
        p.idle_delay_factor,
        url(&p.speed_limit_url),
        url(&p.poi_url),
        url(&p.elevation_url),
        url(&p.road_surface_url),
        url(&p.location_url),
    )
}

/// Display a path, shortening the home directory to `~`.
fn path_to_string(path: &Path) -> String {
    if let Some(home) = dirs::home_dir() {
        if let Ok(stripped) = path.strip_prefix(&home) {
            return format!("~/{}", stripped.display());
        }
    }
    path.display().to_string()
}
