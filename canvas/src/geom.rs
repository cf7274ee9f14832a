//! Geometry primitives: points, sizes, axis-aligned rectangles, grid snapping.
//!
//! All types here are plain `Copy` values. Rectangles use a half-open
//! convention for collision: two boxes that merely share an edge do not
//! intersect.

#[cfg(test)]
#[path = "geom_test.rs"]
mod geom_test;

use serde::{Deserialize, Serialize};

/// A point in either screen or world space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    #[must_use]
    pub fn distance(self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Width and height of a surface, in whatever space the caller uses.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    #[must_use]
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// One of the two rectangle axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Horizontal,
    Vertical,
}

impl Axis {
    /// The perpendicular axis.
    #[must_use]
    pub fn other(self) -> Self {
        match self {
            Self::Horizontal => Self::Vertical,
            Self::Vertical => Self::Horizontal,
        }
    }
}

/// Axis-aligned rectangle: top-left corner plus extent.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Rect {
    #[must_use]
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }

    #[must_use]
    pub fn right(&self) -> f64 {
        self.x + self.w
    }

    #[must_use]
    pub fn bottom(&self) -> f64 {
        self.y + self.h
    }

    #[must_use]
    pub fn center(&self) -> Point {
        Point::new(self.x + self.w * 0.5, self.y + self.h * 0.5)
    }

    /// Lower edge on `axis` (left or top).
    #[must_use]
    pub fn min(&self, axis: Axis) -> f64 {
        match axis {
            Axis::Horizontal => self.x,
            Axis::Vertical => self.y,
        }
    }

    /// Upper edge on `axis` (right or bottom).
    #[must_use]
    pub fn max(&self, axis: Axis) -> f64 {
        match axis {
            Axis::Horizontal => self.right(),
            Axis::Vertical => self.bottom(),
        }
    }

    /// Extent on `axis` (width or height).
    #[must_use]
    pub fn extent(&self, axis: Axis) -> f64 {
        match axis {
            Axis::Horizontal => self.w,
            Axis::Vertical => self.h,
        }
    }

    /// Copy of this rectangle with its origin on `axis` moved to `value`.
    #[must_use]
    pub fn with_origin(self, axis: Axis, value: f64) -> Self {
        match axis {
            Axis::Horizontal => Self { x: value, ..self },
            Axis::Vertical => Self { y: value, ..self },
        }
    }

    /// Strict overlap test. Touching edges do not collide.
    #[must_use]
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.right() && other.x < self.right() && self.y < other.bottom() && other.y < self.bottom()
    }

    /// Length of the shared interval on `axis`; zero or negative when disjoint.
    #[must_use]
    pub fn overlap(&self, other: &Rect, axis: Axis) -> f64 {
        self.max(axis).min(other.max(axis)) - self.min(axis).max(other.min(axis))
    }

    /// Whether `pt` lies inside the rectangle (edges inclusive).
    #[must_use]
    pub fn contains(&self, pt: Point) -> bool {
        pt.x >= self.x && pt.x <= self.right() && pt.y >= self.y && pt.y <= self.bottom()
    }

    /// Grow the rectangle by `amount` on every side.
    #[must_use]
    pub fn inflate(self, amount: f64) -> Self {
        Self { x: self.x - amount, y: self.y - amount, w: self.w + amount * 2.0, h: self.h + amount * 2.0 }
    }

    /// Translate by `(dx, dy)`.
    #[must_use]
    pub fn offset(self, dx: f64, dy: f64) -> Self {
        Self { x: self.x + dx, y: self.y + dy, ..self }
    }
}

/// Snap `value` to the nearest multiple of `grid`.
///
/// A non-positive or non-finite grid disables snapping.
#[must_use]
pub fn snap(value: f64, grid: f64) -> f64 {
    if !grid_is_usable(grid) {
        return value;
    }
    (value / grid).round() * grid
}

/// Snap `value` up to the next multiple of `grid` (or keep it if already aligned).
#[must_use]
pub fn snap_ceil(value: f64, grid: f64) -> f64 {
    if !grid_is_usable(grid) {
        return value;
    }
    (value / grid).ceil() * grid
}

/// Snap `value` down to the previous multiple of `grid` (or keep it if already aligned).
#[must_use]
pub fn snap_floor(value: f64, grid: f64) -> f64 {
    if !grid_is_usable(grid) {
        return value;
    }
    (value / grid).floor() * grid
}

fn grid_is_usable(grid: f64) -> bool {
    grid.is_finite() && grid > 0.0
}
