//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! The single place where INI key names are mapped to struct fields.

use std::path::PathBuf;
use std::str::FromStr;

use ini::{Ini, Properties};

use super::defaults::MIN_AUTO_UPDATE_INTERVAL_SECS;
use super::file::ConfigFileError;
use super::settings::ConfigFile;

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Parse `section.key` with `FromStr` if present.
fn parse<T: FromStr>(
    props: &Properties,
    section: &str,
    key: &str,
    reason: &str,
) -> Result<Option<T>, ConfigFileError> {
    match props.get(key) {
        Some(v) => v
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| invalid(section, key, v, reason)),
        None => Ok(None),
    }
}

fn parse_bool(props: &Properties, section: &str, key: &str) -> Result<Option<bool>, ConfigFileError> {
    match props.get(key) {
        Some(v) => match v.trim().to_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Ok(Some(true)),
            "false" | "no" | "off" | "0" => Ok(Some(false)),
            _ => Err(invalid(section, key, v, "must be true or false")),
        },
        None => Ok(None),
    }
}

/// Parse a non-negative distance in metres.
fn parse_metres(props: &Properties, section: &str, key: &str) -> Result<Option<f64>, ConfigFileError> {
    let value: Option<f64> = parse(props, section, key, "must be a number (metres)")?;
    match value {
        Some(v) if !v.is_finite() || v < 0.0 => Err(invalid(
            section,
            key,
            &v.to_string(),
            "must be a non-negative number (metres)",
        )),
        other => Ok(other),
    }
}

fn optional_string(props: &Properties, key: &str) -> Option<String> {
    props
        .get(key)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [display] section
    if let Some(section) = ini.section(Some("display")) {
        const S: &str = "display";
        let zoom_reason = "must be an integer between 0 and 20";
        if let Some(v) = parse(section, S, "zoom", zoom_reason)? {
            config.display.zoom = v;
        }
        if let Some(v) = parse(section, S, "min_zoom", zoom_reason)? {
            config.display.min_zoom = v;
        }
        if let Some(v) = parse(section, S, "max_zoom", zoom_reason)? {
            config.display.max_zoom = v;
        }
        if let Some(v) = parse_bool(section, S, "auto_center")? {
            config.display.auto_center = v;
        }
        if let Some(v) = parse_bool(section, S, "rotate_with_bearing")? {
            config.display.rotate_with_bearing = v;
        }
        if let Some(v) = parse(section, S, "screen", "must be 'track' or 'turn_by_turn'")? {
            config.display.screen = v;
        }
        if let Some(v) = parse(section, S, "width", "must be a positive integer (pixels)")? {
            config.display.width = v;
        }
        if let Some(v) = parse(section, S, "height", "must be a positive integer (pixels)")? {
            config.display.height = v;
        }
    }

    // [auto_update] section
    if let Some(section) = ini.section(Some("auto_update")) {
        if let Some(v) = parse_bool(section, "auto_update", "enabled")? {
            config.auto_update.enabled = v;
        }
        if let Some(v) = parse(
            section,
            "auto_update",
            "interval_secs",
            "must be a positive integer (seconds)",
        )? {
            config.auto_update.interval_secs = v;
        }
    }

    // [gpx] section
    if let Some(section) = ini.section(Some("gpx")) {
        config.gpx.active = optional_string(section, "active").map(|v| expand_tilde(&v));
    }

    // [gps] section
    if let Some(section) = ini.section(Some("gps")) {
        const S: &str = "gps";
        if let Some(v) = parse(section, S, "debounce_min_interval_ms", "must be an integer (milliseconds)")? {
            config.gps.debounce_min_interval_ms = v;
        }
        if let Some(v) = parse_metres(section, S, "debounce_min_distance_m")? {
            config.gps.debounce_min_distance_m = v;
        }
        if let Some(v) = parse(section, S, "debounce_max_silence_secs", "must be an integer (seconds)")? {
            config.gps.debounce_max_silence_secs = v;
        }
    }

    // [navigation] section
    if let Some(section) = ini.section(Some("navigation")) {
        const S: &str = "navigation";
        let nav = &mut config.navigation;
        let mut rejoin_set = false;
        if let Some(v) = parse_metres(section, S, "off_road_threshold_m")? {
            nav.off_road_threshold_m = v;
        }
        if let Some(v) = parse_metres(section, S, "rejoin_threshold_m")? {
            nav.rejoin_threshold_m = v;
            rejoin_set = true;
        }
        if !rejoin_set {
            nav.rejoin_threshold_m = nav.off_road_threshold_m;
        }
        if let Some(v) = parse_metres(section, S, "waypoint_reached_m")? {
            nav.waypoint_reached_m = v;
        }
        if let Some(v) = parse_metres(section, S, "arrival_threshold_m")? {
            nav.arrival_threshold_m = v;
        }
        if let Some(v) = parse_metres(section, S, "turn_screen_distance_m")? {
            nav.turn_screen_distance_m = v;
        }
    }

    // [prefetch] section
    if let Some(section) = ini.section(Some("prefetch")) {
        const S: &str = "prefetch";
        let prefetch = &mut config.prefetch;
        if let Some(v) = parse_bool(section, S, "enabled")? {
            prefetch.enabled = v;
        }
        if let Some(v) = optional_string(section, "cache_dir") {
            prefetch.cache_dir = expand_tilde(&v);
        }
        if let Some(v) = parse_metres(section, S, "chunk_length_m")? {
            prefetch.chunk_length_m = v;
        }
        if let Some(v) = parse(section, S, "request_delay_ms", "must be an integer (milliseconds)")? {
            prefetch.request_delay_ms = v;
        }
        if let Some(v) = parse(section, S, "request_timeout_secs", "must be an integer (seconds)")? {
            prefetch.request_timeout_secs = v;
        }
        if let Some(v) = parse::<f64>(section, S, "idle_delay_factor", "must be a number >= 1.0")? {
            if v.is_nan() || v < 1.0 {
                return Err(invalid(S, "idle_delay_factor", &v.to_string(), "must be a number >= 1.0"));
            }
            prefetch.idle_delay_factor = v;
        }
        prefetch.speed_limit_url = optional_string(section, "speed_limit_url");
        prefetch.poi_url = optional_string(section, "poi_url");
        prefetch.elevation_url = optional_string(section, "elevation_url");
        prefetch.road_surface_url = optional_string(section, "road_surface_url");
        prefetch.location_url = optional_string(section, "location_url");
    }

    validate(&config)?;
    Ok(config)
}

/// Cross-field checks.
fn validate(config: &ConfigFile) -> Result<(), ConfigFileError> {
    let d = &config.display;
    if d.max_zoom > crate::display::projection::MAX_ZOOM {
        return Err(invalid(
            "display",
            "max_zoom",
            &d.max_zoom.to_string(),
            "must be at most 20",
        ));
    }
    if d.min_zoom > d.max_zoom {
        return Err(invalid(
            "display",
            "min_zoom",
            &d.min_zoom.to_string(),
            "must not exceed max_zoom",
        ));
    }
    if d.zoom < d.min_zoom || d.zoom > d.max_zoom {
        return Err(invalid(
            "display",
            "zoom",
            &d.zoom.to_string(),
            "must be between min_zoom and max_zoom",
        ));
    }
    if d.width == 0 || d.height == 0 {
        return Err(invalid(
            "display",
            if d.width == 0 { "width" } else { "height" },
            "0",
            "must be a positive integer (pixels)",
        ));
    }
    if config.auto_update.interval_secs < MIN_AUTO_UPDATE_INTERVAL_SECS {
        return Err(invalid(
            "auto_update",
            "interval_secs",
            &config.auto_update.interval_secs.to_string(),
            "must be at least 1 second",
        ));
    }
    if config.prefetch.chunk_length_m <= 0.0 {
        return Err(invalid(
            "prefetch",
            "chunk_length_m",
            &config.prefetch.chunk_length_m.to_string(),
            "must be greater than 0",
        ));
    }
    Ok(())
}

/// Expand a leading `~/` to the home directory.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}
