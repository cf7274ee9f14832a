#![allow(clippy::clone_on_copy, clippy::float_cmp)]

use super::*;

const EPSILON: f64 = 1e-9;

fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < EPSILON
}

fn point_approx_eq(a: Point, b: Point) -> bool {
    approx_eq(a.x, b.x) && approx_eq(a.y, b.y)
}

fn pixel(dy: f64) -> WheelDelta {
    WheelDelta { dx: 0.0, dy, mode: DeltaMode::Pixel }
}

// --- Defaults ---

#[test]
fn viewport_default_is_origin_at_unit_zoom() {
    let vp = Viewport::default();
    assert_eq!(vp.x, 0.0);
    assert_eq!(vp.y, 0.0);
    assert_eq!(vp.zoom, 1.0);
}

// --- screen_to_world / world_to_screen ---

#[test]
fn screen_to_world_identity() {
    let vp = Viewport::default();
    let world = vp.screen_to_world(Point::new(50.0, 75.0));
    assert!(point_approx_eq(world, Point::new(50.0, 75.0)));
}

#[test]
fn screen_to_world_with_zoom() {
    let vp = Viewport { x: 0.0, y: 0.0, zoom: 4.0 };
    let world = vp.screen_to_world(Point::new(40.0, 80.0));
    assert!(point_approx_eq(world, Point::new(10.0, 20.0)));
}

#[test]
fn screen_to_world_subtracts_world_offset() {
    let vp = Viewport { x: 100.0, y: 50.0, zoom: 2.0 };
    // (20 / 2) - 100 = -90, (10 / 2) - 50 = -45
    let world = vp.screen_to_world(Point::new(20.0, 10.0));
    assert!(point_approx_eq(world, Point::new(-90.0, -45.0)));
}

#[test]
fn round_trip_with_pan_and_zoom() {
    let vp = Viewport { x: 13.7, y: -42.3, zoom: 0.75 };
    let world = Point::new(333.3, -999.9);
    let back = vp.screen_to_world(vp.world_to_screen(world));
    assert!(point_approx_eq(world, back));
}

#[test]
fn screen_dist_to_world_ignores_offset() {
    let vp = Viewport { x: 999.0, y: -999.0, zoom: 4.0 };
    assert!(approx_eq(vp.screen_dist_to_world(8.0), 2.0));
}

#[test]
fn visible_world_rect_scales_with_zoom() {
    let vp = Viewport { x: -100.0, y: -50.0, zoom: 2.0 };
    let rect = vp.visible_world_rect(Size::new(800.0, 600.0));
    assert!(approx_eq(rect.x, 100.0));
    assert!(approx_eq(rect.y, 50.0));
    assert!(approx_eq(rect.w, 400.0));
    assert!(approx_eq(rect.h, 300.0));
}

// --- pan ---

#[test]
fn pan_divides_screen_delta_by_zoom() {
    let mut vp = Viewport { x: 0.0, y: 0.0, zoom: 2.0 };
    let out = vp.pan(100.0, -40.0);
    assert!(approx_eq(out.x, 50.0));
    assert!(approx_eq(out.y, -20.0));
    assert_eq!(out, vp);
}

#[test]
fn pan_moves_content_by_exact_screen_delta() {
    let mut vp = Viewport { x: 10.0, y: 20.0, zoom: 0.5 };
    let world = Point::new(300.0, 300.0);
    let before = vp.world_to_screen(world);
    vp.pan(37.0, -11.0);
    let after = vp.world_to_screen(world);
    assert!(approx_eq(after.x - before.x, 37.0));
    assert!(approx_eq(after.y - before.y, -11.0));
}

// --- zoom_at ---

#[test]
fn zoom_at_keeps_world_point_under_cursor() {
    let mut vp = Viewport { x: 25.0, y: -60.0, zoom: 1.3 };
    let cursor = Point::new(412.0, 233.0);
    let before = vp.screen_to_world(cursor);
    vp.zoom_at(cursor, 1.7, ZoomLimits::default());
    let after = vp.screen_to_world(cursor);
    assert!(point_approx_eq(before, after));
    assert!(approx_eq(vp.zoom, 1.3 * 1.7));
}

#[test]
fn zoom_at_sequence_keeps_world_point_under_cursor() {
    let mut vp = Viewport::default();
    let cursor = Point::new(640.0, 360.0);
    let before = vp.screen_to_world(cursor);
    let limits = ZoomLimits::default();
    for factor in [1.1, 1.1, 1.02, 0.5, 3.0, 1.0 / 1.1, 0.98, 25.0, 0.001, 1.2] {
        vp.zoom_at(cursor, factor, limits);
    }
    let after = vp.screen_to_world(cursor);
    assert!(point_approx_eq(before, after));
}

#[test]
fn zoom_at_clamps_to_limits() {
    let limits = ZoomLimits::default();
    let mut vp = Viewport::default();
    vp.zoom_at(Point::new(0.0, 0.0), 1_000.0, limits);
    assert_eq!(vp.zoom, limits.max);
    vp.zoom_at(Point::new(0.0, 0.0), 1e-9, limits);
    assert_eq!(vp.zoom, limits.min);
}

#[test]
fn zoom_at_pinned_at_limit_keeps_offset() {
    let limits = ZoomLimits::default();
    let mut vp = Viewport { x: 5.0, y: 7.0, zoom: limits.max };
    vp.zoom_at(Point::new(123.0, 456.0), 2.0, limits);
    assert!(approx_eq(vp.x, 5.0));
    assert!(approx_eq(vp.y, 7.0));
}

#[test]
fn zoom_limits_clamp_non_finite_to_min() {
    let limits = ZoomLimits::default();
    assert_eq!(limits.clamp(f64::NAN), limits.min);
}

// --- reset ---

#[test]
fn reset_returns_default() {
    let mut vp = Viewport { x: 1.0, y: 2.0, zoom: 3.0 };
    assert_eq!(vp.reset(), Viewport::default());
}

// --- wheel discrimination ---

#[test]
fn wheel_fine_input_uses_small_step() {
    assert!(approx_eq(wheel_zoom_factor(pixel(-4.0)), ZOOM_STEP_FINE));
    assert!(approx_eq(wheel_zoom_factor(pixel(4.0)), 1.0 / ZOOM_STEP_FINE));
}

#[test]
fn wheel_coarse_input_uses_large_step() {
    assert!(approx_eq(wheel_zoom_factor(pixel(-100.0)), ZOOM_STEP_COARSE));
    let line = WheelDelta { dx: 0.0, dy: 1.0, mode: DeltaMode::Line };
    assert!(is_coarse(line));
    assert!(approx_eq(wheel_zoom_factor(line), 1.0 / ZOOM_STEP_COARSE));
}

#[test]
fn wheel_zero_delta_is_no_zoom() {
    assert_eq!(wheel_zoom_factor(pixel(0.0)), 1.0);
}

// --- momentum ---

#[test]
fn momentum_idle_does_not_reschedule() {
    let mut m = ZoomMomentum::default();
    let mut vp = Viewport::default();
    assert!(!m.is_active());
    assert!(!m.tick(&mut vp, ZoomLimits::default()));
    assert_eq!(vp, Viewport::default());
}

#[test]
fn momentum_decays_to_rest_and_zeroes_velocity() {
    let mut m = ZoomMomentum::default();
    let mut vp = Viewport::default();
    m.impulse(Point::new(100.0, 100.0), 2.0);
    let mut frames = 0;
    while m.tick(&mut vp, ZoomLimits::default()) {
        frames += 1;
        assert!(frames < 1_000, "momentum never settled");
    }
    assert_eq!(m.velocity(), 0.0);
    assert!(!m.is_active());
    // The decayed series approaches the requested factor.
    assert!((vp.zoom - 2.0).abs() < 0.05);
}

#[test]
fn momentum_preserves_anchor_point() {
    let mut m = ZoomMomentum::default();
    let mut vp = Viewport { x: -30.0, y: 12.0, zoom: 0.8 };
    let anchor = Point::new(250.0, 180.0);
    let before = vp.screen_to_world(anchor);
    m.impulse(anchor, 0.5);
    while m.tick(&mut vp, ZoomLimits::default()) {}
    assert!(point_approx_eq(before, vp.screen_to_world(anchor)));
}

#[test]
fn momentum_stops_when_pinned_at_limit() {
    let limits = ZoomLimits::default();
    let mut m = ZoomMomentum::default();
    let mut vp = Viewport { x: 0.0, y: 0.0, zoom: limits.max };
    m.impulse(Point::new(0.0, 0.0), 4.0);
    assert!(!m.tick(&mut vp, limits));
    assert!(!m.is_active());
}

#[test]
fn momentum_ignores_invalid_factor() {
    let mut m = ZoomMomentum::default();
    m.impulse(Point::new(0.0, 0.0), 0.0);
    m.impulse(Point::new(0.0, 0.0), f64::INFINITY);
    assert!(!m.is_active());
}
