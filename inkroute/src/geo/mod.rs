//! Geodesy helpers shared by the navigation and prefetch modules.
//!
//! Distances use a spherical earth (haversine). Point-to-segment distances use
//! a local equirectangular projection centred on the query point, which is
//! accurate to well under a metre for the segment lengths found in road
//! geometry.
//!
//! # Conventions
//!
//! - Latitude: degrees north (-90 to 90)
//! - Longitude: degrees east (-180 to 180)
//! - Bearing: degrees true (0-360, 0 = north, 90 = east)
//! - Distance: metres

use serde::{Deserialize, Serialize};

/// Mean earth radius in metres.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A geographic coordinate in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lon: f64,
}

impl Coordinate {
    /// Create a new coordinate.
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Check that latitude and longitude are finite and in range.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }

    /// Great-circle distance to another coordinate in metres.
    pub fn distance_to(&self, other: &Coordinate) -> f64 {
        haversine_distance_m(self, other)
    }

    /// Initial bearing towards another coordinate in degrees.
    pub fn bearing_to(&self, other: &Coordinate) -> f64 {
        bearing_deg(self, other)
    }
}

/// Great-circle distance between two coordinates in metres.
pub fn haversine_distance_m(a: &Coordinate, b: &Coordinate) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();

    let sin_dlat = (dlat / 2.0).sin();
    let sin_dlon = (dlon / 2.0).sin();
    let h = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlon * sin_dlon;
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_M * c
}

/// Initial great-circle bearing from `a` to `b`, normalised to 0-360.
pub fn bearing_deg(a: &Coordinate, b: &Coordinate) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlon = (b.lon - a.lon).to_radians();

    let y = dlon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();

    normalize_bearing(y.atan2(x).to_degrees())
}

/// Normalise a bearing to the 0-360 range.
pub fn normalize_bearing(bearing: f64) -> f64 {
    let b = bearing % 360.0;
    if b < 0.0 {
        b + 360.0
    } else {
        b
    }
}

/// Project a coordinate along a bearing for a distance in metres.
pub fn destination_point(start: &Coordinate, bearing: f64, distance_m: f64) -> Coordinate {
    let lat1 = start.lat.to_radians();
    let lon1 = start.lon.to_radians();
    let brg = bearing.to_radians();
    let ang = distance_m / EARTH_RADIUS_M;

    let lat2 = (lat1.sin() * ang.cos() + lat1.cos() * ang.sin() * brg.cos()).asin();
    let lon2 = lon1 + (brg.sin() * ang.sin() * lat1.cos()).atan2(ang.cos() - lat1.sin() * lat2.sin());

    let mut lon = lon2.to_degrees();
    if lon > 180.0 {
        lon -= 360.0;
    } else if lon < -180.0 {
        lon += 360.0;
    }

    Coordinate::new(lat2.to_degrees(), lon)
}

/// Total length of a polyline in metres.
pub fn polyline_length_m(points: &[Coordinate]) -> f64 {
    points.windows(2).map(|w| w[0].distance_to(&w[1])).sum()
}

/// Cumulative distance from the first point to each point of a polyline.
///
/// The returned vector has the same length as `points`; the first entry is 0.
pub fn cumulative_distances_m(points: &[Coordinate]) -> Vec<f64> {
    let mut out = Vec::with_capacity(points.len());
    let mut total = 0.0;
    for (i, p) in points.iter().enumerate() {
        if i > 0 {
            total += points[i - 1].distance_to(p);
        }
        out.push(total);
    }
    out
}

/// Closest point on a single segment to a query point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentProjection {
    /// Closest point on the segment.
    pub nearest: Coordinate,
    /// Distance from the query point to `nearest` in metres.
    pub distance_m: f64,
    /// Fraction along the segment (0 = start, 1 = end).
    pub fraction: f64,
}

/// Signed longitude difference `to - from`, wrapped into [-180, 180).
fn lon_delta(from: f64, to: f64) -> f64 {
    (to - from + 180.0).rem_euclid(360.0) - 180.0
}

/// Project a point onto the segment `a`-`b`.
///
/// Segments crossing the antimeridian take the short way round.
pub fn project_onto_segment(p: &Coordinate, a: &Coordinate, b: &Coordinate) -> SegmentProjection {
    // Local metres around p; p itself is the origin.
    let scale_y = EARTH_RADIUS_M.to_radians();
    let scale_x = scale_y * p.lat.to_radians().cos();

    let ax = lon_delta(p.lon, a.lon) * scale_x;
    let ay = (a.lat - p.lat) * scale_y;
    let bx = lon_delta(p.lon, b.lon) * scale_x;
    let by = (b.lat - p.lat) * scale_y;

    let dx = bx - ax;
    let dy = by - ay;
    let len_sq = dx * dx + dy * dy;

    let fraction = if len_sq <= f64::EPSILON {
        0.0
    } else {
        (-(ax * dx + ay * dy) / len_sq).clamp(0.0, 1.0)
    };

    let nx = ax + fraction * dx;
    let ny = ay + fraction * dy;

    let nearest = Coordinate::new(
        a.lat + fraction * (b.lat - a.lat),
        lon_delta(0.0, a.lon + fraction * lon_delta(a.lon, b.lon)),
    );

    SegmentProjection {
        nearest,
        distance_m: (nx * nx + ny * ny).sqrt(),
        fraction,
    }
}

/// Closest point on a polyline to a query point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolylineProjection {
    /// Index of the segment containing the closest point (segment `i` spans
    /// points `i` and `i + 1`).
    pub segment_index: usize,
    /// Closest point on the polyline.
    pub nearest: Coordinate,
    /// Perpendicular distance to the polyline in metres.
    pub distance_m: f64,
    /// Distance along the polyline from its start to `nearest` in metres.
    pub along_track_m: f64,
}

/// Project a point onto a polyline, searching the segments in `segments`.
///
/// `cumulative` must come from [`cumulative_distances_m`] for the same
/// polyline. Returns `None` when the polyline has fewer than two points or the
/// range is empty.
pub fn project_onto_polyline(
    p: &Coordinate,
    points: &[Coordinate],
    cumulative: &[f64],
    segments: std::ops::Range<usize>,
) -> Option<PolylineProjection> {
    if points.len() < 2 {
        return None;
    }
    let last_segment = points.len() - 1;
    let start = segments.start.min(last_segment);
    let end = segments.end.min(last_segment);

    let mut best: Option<PolylineProjection> = None;
    for i in start..end {
        let proj = project_onto_segment(p, &points[i], &points[i + 1]);
        if best.map_or(true, |b| proj.distance_m < b.distance_m) {
            let seg_len = cumulative[i + 1] - cumulative[i];
            best = Some(PolylineProjection {
                segment_index: i,
                nearest: proj.nearest,
                distance_m: proj.distance_m,
                along_track_m: cumulative[i] + proj.fraction * seg_len,
            });
        }
    }
    best
}
