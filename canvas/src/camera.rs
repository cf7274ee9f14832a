//! Viewport controller: pan/zoom transform for the infinite canvas.
//!
//! The viewport stores a world-space offset and a scalar zoom. A screen point
//! maps to world space as `screen / zoom - offset`, so panning divides the
//! screen delta by the zoom and visual pan speed stays constant at any zoom.

#[cfg(test)]
#[path = "camera_test.rs"]
mod camera_test;

use serde::{Deserialize, Serialize};

use crate::consts::{
    MOMENTUM_DECAY, MOMENTUM_EPSILON, WHEEL_COARSE_THRESHOLD_PX, ZOOM_MAX, ZOOM_MIN, ZOOM_STEP_COARSE, ZOOM_STEP_FINE,
};
use crate::geom::{Point, Rect, Size};
use crate::input::{DeltaMode, WheelDelta};

/// Inclusive bounds for the zoom factor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoomLimits {
    pub min: f64,
    pub max: f64,
}

impl Default for ZoomLimits {
    fn default() -> Self {
        Self { min: ZOOM_MIN, max: ZOOM_MAX }
    }
}

impl ZoomLimits {
    #[must_use]
    pub fn clamp(&self, zoom: f64) -> f64 {
        if !zoom.is_finite() {
            return self.min;
        }
        zoom.clamp(self.min, self.max)
    }
}

/// Pan/zoom state.
///
/// `x` / `y` are a world-space offset. `zoom` is a scale factor (1.0 = no zoom).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub x: f64,
    pub y: f64,
    pub zoom: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self { x: 0.0, y: 0.0, zoom: 1.0 }
    }
}

impl Viewport {
    /// Convert a screen-space point to world coordinates.
    #[must_use]
    pub fn screen_to_world(&self, screen: Point) -> Point {
        Point { x: screen.x / self.zoom - self.x, y: screen.y / self.zoom - self.y }
    }

    /// Convert a world-space point to screen coordinates.
    #[must_use]
    pub fn world_to_screen(&self, world: Point) -> Point {
        Point { x: (world.x + self.x) * self.zoom, y: (world.y + self.y) * self.zoom }
    }

    /// Convert a screen-space distance (pixels) to world-space distance.
    #[must_use]
    pub fn screen_dist_to_world(&self, screen_dist: f64) -> f64 {
        screen_dist / self.zoom
    }

    /// The world-space rectangle covered by a surface of `container` pixels.
    #[must_use]
    pub fn visible_world_rect(&self, container: Size) -> Rect {
        let origin = self.screen_to_world(Point::new(0.0, 0.0));
        Rect::new(origin.x, origin.y, container.width / self.zoom, container.height / self.zoom)
    }

    /// Pan by a screen-space delta.
    pub fn pan(&mut self, dx_screen: f64, dy_screen: f64) -> Viewport {
        self.x += dx_screen / self.zoom;
        self.y += dy_screen / self.zoom;
        *self
    }

    /// Multiply the zoom by `factor`, keeping the world point under `screen` fixed.
    ///
    /// The resulting zoom is clamped into `limits`.
    pub fn zoom_at(&mut self, screen: Point, factor: f64, limits: ZoomLimits) -> Viewport {
        let world = self.screen_to_world(screen);
        let zoom = limits.clamp(self.zoom * factor);
        self.zoom = zoom;
        self.x = screen.x / zoom - world.x;
        self.y = screen.y / zoom - world.y;
        *self
    }

    /// Return to the origin at zoom 1.
    pub fn reset(&mut self) -> Viewport {
        *self = Self::default();
        *self
    }
}

/// Multiplicative zoom factor for a wheel event.
///
/// Coarse input (line/page deltas or large pixel deltas from a wheel notch)
/// steps by [`ZOOM_STEP_COARSE`]; fine trackpad input steps by the smaller
/// [`ZOOM_STEP_FINE`]. Scrolling up (negative `dy`) zooms in.
#[must_use]
pub fn wheel_zoom_factor(delta: WheelDelta) -> f64 {
    if delta.dy == 0.0 {
        return 1.0;
    }
    let step = if is_coarse(delta) { ZOOM_STEP_COARSE } else { ZOOM_STEP_FINE };
    if delta.dy < 0.0 { step } else { 1.0 / step }
}

/// Whether a wheel event came from a discrete notch rather than a continuous gesture.
#[must_use]
pub fn is_coarse(delta: WheelDelta) -> bool {
    delta.mode != DeltaMode::Pixel || delta.dy.abs() >= WHEEL_COARSE_THRESHOLD_PX
}

/// Decaying zoom velocity applied once per animation frame.
///
/// Velocity is in log-zoom units per tick. Each impulse is pre-scaled so the
/// geometric series of decayed ticks adds up to the impulse's full factor.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ZoomMomentum {
    velocity: f64,
    anchor: Point,
}

impl ZoomMomentum {
    /// Add a zoom impulse anchored at `screen`.
    pub fn impulse(&mut self, screen: Point, factor: f64) {
        if !(factor.is_finite() && factor > 0.0) {
            return;
        }
        self.velocity += factor.ln() * (1.0 - MOMENTUM_DECAY);
        self.anchor = screen;
    }

    /// Whether another frame is needed.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.velocity != 0.0
    }

    #[must_use]
    pub fn velocity(&self) -> f64 {
        self.velocity
    }

    /// Advance one frame. Returns `true` if another frame should be scheduled.
    pub fn tick(&mut self, viewport: &mut Viewport, limits: ZoomLimits) -> bool {
        if self.velocity.abs() < MOMENTUM_EPSILON {
            self.velocity = 0.0;
            return false;
        }
        let before = viewport.zoom;
        viewport.zoom_at(self.anchor, self.velocity.exp(), limits);
        self.velocity *= MOMENTUM_DECAY;
        // Pinned against a zoom limit: nothing left to animate.
        if (viewport.zoom - before).abs() < f64::EPSILON || self.velocity.abs() < MOMENTUM_EPSILON {
            self.velocity = 0.0;
            return false;
        }
        true
    }

    /// Drop any remaining velocity.
    pub fn stop(&mut self) {
        self.velocity = 0.0;
    }
}
