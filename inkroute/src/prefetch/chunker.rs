//! Route geometry chunking.

use crate::geo::{cumulative_distances_m, Coordinate};

/// A piece of route geometry queried as one request.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteChunk {
    /// Position of the chunk along the route, from 0.
    pub index: usize,
    /// Polyline of the chunk, including both end points.
    pub points: Vec<Coordinate>,
    /// Distance from the route start to the first point.
    pub start_distance_m: f64,
}

/// Tolerance so a route of exactly N chunk lengths is not split into N + 1.
const LENGTH_EPSILON_M: f64 = 1e-3;

/// Split `geometry` into equal-length chunks of at most `max_length_m`.
///
/// Chunk boundaries are interpolated on the polyline, so neighbouring chunks
/// share their boundary point. Returns no chunks for fewer than two points.
pub fn chunk_route(geometry: &[Coordinate], max_length_m: f64) -> Vec<RouteChunk> {
    if geometry.len() < 2 {
        return Vec::new();
    }

    let cumulative = cumulative_distances_m(geometry);
    let total = cumulative.last().copied().unwrap_or(0.0);
    let count = if max_length_m > 0.0 && total > 0.0 {
        (((total - LENGTH_EPSILON_M) / max_length_m).ceil() as usize).max(1)
    } else {
        1
    };
    let step = total / count as f64;

    let mut chunks = Vec::with_capacity(count);
    let mut segment = 0usize;

    for index in 0..count {
        let start_d = step * index as f64;
        let end_d = if index + 1 == count { total } else { step * (index + 1) as f64 };

        let mut points = vec![interpolate(geometry, &cumulative, &mut segment, start_d)];
        let mut seg = segment;
        while seg + 1 < geometry.len() && cumulative[seg + 1] < end_d {
            points.push(geometry[seg + 1]);
            seg += 1;
        }
        let mut end_segment = seg;
        points.push(interpolate(geometry, &cumulative, &mut end_segment, end_d));

        chunks.push(RouteChunk {
            index,
            points,
            start_distance_m: start_d,
        });
    }

    chunks
}

/// Point at distance `d` along the polyline. `segment` is a search hint that
/// only moves forward.
fn interpolate(geometry: &[Coordinate], cumulative: &[f64], segment: &mut usize, d: f64) -> Coordinate {
    let last = geometry.len() - 1;
    *segment = (*segment).min(last - 1);
    while *segment + 1 < last && cumulative[*segment + 1] < d {
        *segment += 1;
    }
    let i = *segment;
    let (a, b) = (geometry[i], geometry[i + 1]);
    let seg_len = cumulative[i + 1] - cumulative[i];
    if seg_len <= 0.0 {
        return a;
    }
    let t = (d - cumulative[i]) / seg_len;
    if t <= 0.0 {
        return a;
    }
    if t >= 1.0 {
        return b;
    }
    Coordinate::new(a.lat + (b.lat - a.lat) * t, a.lon + (b.lon - a.lon) * t)
}
