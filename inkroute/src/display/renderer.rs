//! Reference map renderer built on tiny-skia.
//!
//! Draws vector primitives only: route polyline, position marker, maneuver
//! and off-road arrows, and a progress bar. Text is left to real renderers.

use std::sync::Arc;

use tiny_skia::{Color, FillRule, Paint, PathBuilder, Pixmap, Shader, Stroke, Transform};
use tracing::{debug, info};

use super::bitmap::Bitmap;
use super::projection::{fit_bounds, to_screen};
use super::traits::MapRenderer;
use super::types::RenderRequest;
use crate::geo::Coordinate;
use crate::navigation::{DisplayMode, NavigationStatus};
use crate::route::Maneuver;
use crate::service::{BoxFuture, ServiceError};

/// Padding used when framing a whole route.
const OVERVIEW_PADDING_PX: u32 = 16;

/// Height of the navigation progress bar.
const PROGRESS_BAR_PX: f32 = 8.0;

/// Renders frames on a blocking thread.
#[derive(Debug, Clone)]
pub struct SimpleMapRenderer {
    route_width: f32,
}

impl Default for SimpleMapRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl SimpleMapRenderer {
    pub fn new() -> Self {
        Self { route_width: 3.0 }
    }

    /// Set the route stroke width in pixels.
    pub fn with_route_width(mut self, width: f32) -> Self {
        self.route_width = width;
        self
    }

    /// Render synchronously.
    pub fn render(&self, request: &RenderRequest) -> Result<Bitmap, ServiceError> {
        let mut pixmap = Pixmap::new(request.width, request.height).ok_or_else(|| {
            ServiceError::failed(format!(
                "invalid viewport {}x{}",
                request.width, request.height
            ))
        })?;
        pixmap.fill(Color::WHITE);

        let mode = request.navigation.as_ref().map(|n| n.display_mode);
        match (mode, request.navigation.as_ref()) {
            (Some(DisplayMode::TurnScreen), Some(status)) if !request.overview => {
                draw_turn_screen(&mut pixmap, status);
            }
            (Some(DisplayMode::OffRoadArrow), Some(status)) if !request.overview => {
                draw_off_road(&mut pixmap, status, request.rotation_deg);
            }
            (Some(DisplayMode::Arrived), _) if !request.overview => draw_arrived(&mut pixmap),
            _ => self.draw_map(&mut pixmap, request),
        }

        if let Some(status) = &request.navigation {
            draw_progress(&mut pixmap, status.progress_percent);
        }

        Ok(to_bitmap(&pixmap))
    }

    fn draw_map(&self, pixmap: &mut Pixmap, request: &RenderRequest) {
        let (center, zoom) = match (&request.route, request.overview) {
            (Some(route), true) => match route.bounds() {
                Some((sw, ne)) => fit_bounds(&sw, &ne, request.width, request.height, OVERVIEW_PADDING_PX),
                None => return,
            },
            _ => match request.center {
                Some(c) => (c, request.zoom),
                None => return,
            },
        };

        let (w, h) = (request.width, request.height);
        let rotation = if request.overview { 0.0 } else { request.rotation_deg };
        let transform = Transform::from_rotate_at(-rotation as f32, w as f32 / 2.0, h as f32 / 2.0);

        if let Some(route) = &request.route {
            let mut pb = PathBuilder::new();
            for (i, c) in route.geometry.iter().enumerate() {
                let (x, y) = to_screen(c, &center, zoom, w, h);
                if i == 0 {
                    pb.move_to(x, y);
                } else {
                    pb.line_to(x, y);
                }
            }
            if let Some(path) = pb.finish() {
                let stroke = Stroke {
                    width: self.route_width,
                    ..Default::default()
                };
                pixmap.stroke_path(&path, &black(), &stroke, transform, None);
            }
        }

        if let Some(position) = &request.position {
            let here = Coordinate::new(position.latitude, position.longitude);
            let (x, y) = to_screen(&here, &center, zoom, w, h);
            if let Some(marker) = PathBuilder::from_circle(x, y, 6.0) {
                pixmap.fill_path(&marker, &black(), FillRule::Winding, transform, None);
            }
        }
    }
}

impl MapRenderer for SimpleMapRenderer {
    fn prepare(&self) -> BoxFuture<'_, Result<(), ServiceError>> {
        Box::pin(async move {
            info!("Reference map renderer ready");
            Ok(())
        })
    }

    fn render_viewport<'a>(
        &'a self,
        request: &'a RenderRequest,
    ) -> BoxFuture<'a, Result<Bitmap, ServiceError>> {
        let renderer = Arc::new(self.clone());
        let request = request.clone();
        Box::pin(async move {
            let started = std::time::Instant::now();
            let bitmap = tokio::task::spawn_blocking(move || renderer.render(&request))
                .await
                .map_err(|e| ServiceError::failed(format!("render task failed: {}", e)))??;
            debug!(elapsed_ms = started.elapsed().as_millis() as u64, "Frame rendered");
            Ok(bitmap)
        })
    }
}

fn black() -> Paint<'static> {
    Paint {
        shader: Shader::SolidColor(Color::BLACK),
        anti_alias: true,
        ..Default::default()
    }
}

/// Rotation of the turn arrow in degrees, clockwise from straight ahead.
fn maneuver_angle(maneuver: Maneuver) -> f32 {
    match maneuver {
        Maneuver::Depart | Maneuver::Straight | Maneuver::Arrive => 0.0,
        Maneuver::SlightLeft => -45.0,
        Maneuver::Left => -90.0,
        Maneuver::SharpLeft => -135.0,
        Maneuver::SlightRight => 45.0,
        Maneuver::Right => 90.0,
        Maneuver::SharpRight => 135.0,
        Maneuver::UTurn => 180.0,
        Maneuver::Roundabout => 90.0,
        Maneuver::Merge => 20.0,
        Maneuver::Ramp => 30.0,
    }
}

/// Upward arrow centred on `(cx, cy)`, rotated by `angle` degrees.
fn draw_arrow(pixmap: &mut Pixmap, cx: f32, cy: f32, size: f32, angle: f32) {
    let mut pb = PathBuilder::new();
    let half = size / 2.0;
    pb.move_to(cx, cy - half);
    pb.line_to(cx + half * 0.6, cy);
    pb.line_to(cx + half * 0.2, cy);
    pb.line_to(cx + half * 0.2, cy + half);
    pb.line_to(cx - half * 0.2, cy + half);
    pb.line_to(cx - half * 0.2, cy);
    pb.line_to(cx - half * 0.6, cy);
    pb.close();

    if let Some(path) = pb.finish() {
        let transform = Transform::from_rotate_at(angle, cx, cy);
        pixmap.fill_path(&path, &black(), FillRule::Winding, transform, None);
    }
}

fn draw_turn_screen(pixmap: &mut Pixmap, status: &NavigationStatus) {
    let (w, h) = (pixmap.width() as f32, pixmap.height() as f32);
    let angle = status.next_maneuver.map(maneuver_angle).unwrap_or(0.0);
    draw_arrow(pixmap, w / 2.0, h / 2.0, w.min(h) * 0.6, angle);
}

fn draw_off_road(pixmap: &mut Pixmap, status: &NavigationStatus, heading: f64) {
    let (w, h) = (pixmap.width() as f32, pixmap.height() as f32);
    let bearing = status.off_road.map(|g| g.bearing_deg).unwrap_or(0.0);
    draw_arrow(pixmap, w / 2.0, h / 2.0, w.min(h) * 0.5, (bearing - heading) as f32);
}

fn draw_arrived(pixmap: &mut Pixmap) {
    let (w, h) = (pixmap.width() as f32, pixmap.height() as f32);
    let radius = w.min(h) * 0.3;
    if let Some(ring) = PathBuilder::from_circle(w / 2.0, h / 2.0, radius) {
        let stroke = Stroke {
            width: radius * 0.2,
            ..Default::default()
        };
        pixmap.stroke_path(&ring, &black(), &stroke, Transform::identity(), None);
    }
    if let Some(dot) = PathBuilder::from_circle(w / 2.0, h / 2.0, radius * 0.3) {
        pixmap.fill_path(&dot, &black(), FillRule::Winding, Transform::identity(), None);
    }
}

fn draw_progress(pixmap: &mut Pixmap, percent: f64) {
    let (w, h) = (pixmap.width() as f32, pixmap.height() as f32);
    let filled = w * (percent.clamp(0.0, 100.0) / 100.0) as f32;
    if filled <= 0.0 {
        return;
    }
    if let Some(rect) = tiny_skia::Rect::from_xywh(0.0, h - PROGRESS_BAR_PX, filled, PROGRESS_BAR_PX) {
        pixmap.fill_rect(rect, &black(), Transform::identity(), None);
    }
}

/// Collapse premultiplied RGBA into grayscale luminance.
fn to_bitmap(pixmap: &Pixmap) -> Bitmap {
    let pixels = pixmap
        .pixels()
        .iter()
        .map(|p| {
            let c = p.demultiply();
            let luma = 0.299 * f32::from(c.red()) + 0.587 * f32::from(c.green()) + 0.114 * f32::from(c.blue());
            luma.round().clamp(0.0, 255.0) as u8
        })
        .collect::<Vec<_>>();
    // Dimensions come from the pixmap, so the buffer always matches.
    Bitmap::from_gray(pixmap.width(), pixmap.height(), pixels)
        .unwrap_or_else(|_| Bitmap::blank(pixmap.width(), pixmap.height()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::destination_point;
    use crate::navigation::{NavigationState, OffRoadGuidance};
    use crate::position::Position;
    use crate::route::{Route, Waypoint};

    fn sample_route() -> Arc<Route> {
        let a = Coordinate::new(48.137, 11.575);
        let b = destination_point(&a, 45.0, 800.0);
        let wps = vec![
            Waypoint::new(a, "Start", Maneuver::Depart),
            Waypoint::new(b, "Arrive", Maneuver::Arrive),
        ];
        Arc::new(Route::from_parts("r", wps, vec![a, b], 10.0))
    }

    fn status(mode: DisplayMode) -> NavigationStatus {
        NavigationStatus {
            route_id: "r".into(),
            state: NavigationState::Navigating,
            display_mode: mode,
            current_waypoint_index: 1,
            waypoint_count: 2,
            next_instruction: Some("Turn left".into()),
            next_maneuver: Some(Maneuver::Left),
            next_street: None,
            distance_to_next_turn_m: 120.0,
            distance_remaining_m: 400.0,
            time_remaining_secs: 40.0,
            progress_percent: 50.0,
            off_road: Some(OffRoadGuidance {
                bearing_deg: 90.0,
                distance_m: 600.0,
            }),
        }
    }

    #[test]
    fn test_blank_request_renders_white() {
        let bitmap = SimpleMapRenderer::new()
            .render(&RenderRequest::new(64, 48, 15))
            .unwrap();
        assert_eq!(bitmap.width(), 64);
        assert_eq!(bitmap.height(), 48);
        assert_eq!(bitmap.dark_pixel_count(), 0);
    }

    #[test]
    fn test_route_and_marker_are_drawn() {
        let route = sample_route();
        let mut request = RenderRequest::new(200, 200, 15);
        request.center = Some(route.geometry[0]);
        request.position = Some(Position::new(48.137, 11.575));
        request.route = Some(route);

        let bitmap = SimpleMapRenderer::new().render(&request).unwrap();
        assert!(bitmap.dark_pixel_count() > 50);
    }

    #[test]
    fn test_overview_frames_route_without_center() {
        let mut request = RenderRequest::new(200, 200, 3);
        request.route = Some(sample_route());
        request.overview = true;

        let bitmap = SimpleMapRenderer::new().render(&request).unwrap();
        assert!(bitmap.dark_pixel_count() > 50);
    }

    #[test]
    fn test_navigation_modes_draw_something() {
        for mode in [DisplayMode::TurnScreen, DisplayMode::OffRoadArrow, DisplayMode::Arrived] {
            let mut request = RenderRequest::new(120, 120, 15);
            request.navigation = Some(status(mode));
            let bitmap = SimpleMapRenderer::new().render(&request).unwrap();
            assert!(bitmap.dark_pixel_count() > 100, "mode {} drew nothing", mode);
        }
    }

    #[test]
    fn test_zero_size_viewport_fails() {
        assert!(SimpleMapRenderer::new()
            .render(&RenderRequest::new(0, 10, 15))
            .is_err());
    }

    #[tokio::test]
    async fn test_render_viewport_async() {
        let renderer = SimpleMapRenderer::new();
        renderer.prepare().await.unwrap();
        let bitmap = renderer
            .render_viewport(&RenderRequest::new(32, 32, 10))
            .await
            .unwrap();
        assert_eq!(bitmap.width(), 32);
    }
}
