//! Web Mercator pixel math for the reference renderer.

use std::f64::consts::PI;

use crate::geo::Coordinate;

/// Pixel size of one map tile.
pub const TILE_SIZE: f64 = 256.0;

/// Highest zoom level the renderer supports.
pub const MAX_ZOOM: u8 = 20;

/// Latitude limit of the Mercator projection.
const MAX_LATITUDE: f64 = 85.051_128_78;

/// Global pixel coordinates of `c` at `zoom`.
pub fn world_px(c: &Coordinate, zoom: u8) -> (f64, f64) {
    let size = TILE_SIZE * f64::from(1u32 << zoom.min(MAX_ZOOM));
    let lat = c.lat.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
    let x = (c.lon + 180.0) / 360.0 * size;
    let y = (1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / PI) / 2.0 * size;
    (x, y)
}

/// Screen position of `point` in a `width` x `height` frame centred on
/// `center`, before rotation.
pub fn to_screen(point: &Coordinate, center: &Coordinate, zoom: u8, width: u32, height: u32) -> (f32, f32) {
    let (px, py) = world_px(point, zoom);
    let (cx, cy) = world_px(center, zoom);
    (
        (px - cx + f64::from(width) / 2.0) as f32,
        (py - cy + f64::from(height) / 2.0) as f32,
    )
}

/// Centre and zoom that frame the box `sw`..`ne` inside the frame with
/// `padding` pixels on each side.
pub fn fit_bounds(sw: &Coordinate, ne: &Coordinate, width: u32, height: u32, padding: u32) -> (Coordinate, u8) {
    let center = Coordinate::new((sw.lat + ne.lat) / 2.0, (sw.lon + ne.lon) / 2.0);
    let avail_w = f64::from(width.saturating_sub(2 * padding).max(1));
    let avail_h = f64::from(height.saturating_sub(2 * padding).max(1));

    let zoom = (0..=MAX_ZOOM)
        .rev()
        .find(|&z| {
            let (x1, y1) = world_px(sw, z);
            let (x2, y2) = world_px(ne, z);
            (x2 - x1).abs() <= avail_w && (y2 - y1).abs() <= avail_h
        })
        .unwrap_or(0);

    (center, zoom)
}
