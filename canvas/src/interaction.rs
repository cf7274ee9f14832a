//! Drag/resize interaction: geometry math for the single active gesture.
//!
//! An [`Interaction`] is created on pointer-down over a drag body or resize
//! handle and lives until pointer-up (commit) or cancel. Every pointer-move
//! recomputes `current` from the start geometry and the world-space pointer
//! delta, snapped to the grid, so the preview always matches what a commit
//! would store.

#[cfg(test)]
#[path = "interaction_test.rs"]
mod interaction_test;

use crate::doc::{Entity, EntityId, KindTag};
use crate::geom::{Point, Rect, snap};
use crate::hit::ResizeAnchor;

/// What the active gesture does to its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Drag,
    Resize(ResizeAnchor),
}

impl Mode {
    #[must_use]
    pub fn verb(self) -> &'static str {
        match self {
            Self::Drag => "Move",
            Self::Resize(_) => "Resize",
        }
    }
}

/// The one active drag/resize gesture.
#[derive(Debug, Clone, PartialEq)]
pub struct Interaction {
    /// Entity being dragged or resized.
    pub active_id: EntityId,
    /// Widget or nest container.
    pub kind: KindTag,
    /// Drag, or resize from a specific anchor.
    pub mode: Mode,
    /// World-space pointer position at pointer-down.
    pub pointer_start_world: Point,
    /// Entity geometry at pointer-down.
    pub start: Rect,
    /// Snapped geometry for the latest pointer position.
    pub current: Rect,
    /// Parent interior for nested entities; geometry is kept inside it.
    pub bounds: Option<Rect>,
}

impl Interaction {
    /// Start a gesture on `entity`.
    #[must_use]
    pub fn begin(entity: &Entity, mode: Mode, pointer_world: Point, bounds: Option<Rect>) -> Self {
        Self {
            active_id: entity.id.clone(),
            kind: entity.tag(),
            mode,
            pointer_start_world: pointer_world,
            start: entity.rect(),
            current: entity.rect(),
            bounds,
        }
    }

    /// Recompute the preview for a new pointer position. Returns `true` if it changed.
    pub fn update(&mut self, pointer_world: Point, grid: f64) -> bool {
        let dx = pointer_world.x - self.pointer_start_world.x;
        let dy = pointer_world.y - self.pointer_start_world.y;
        let next = match self.mode {
            Mode::Drag => drag_rect(self.start, dx, dy, grid, self.bounds),
            Mode::Resize(anchor) => resize_rect(self.start, anchor, dx, dy, grid, self.bounds),
        };
        let changed = next != self.current;
        self.current = next;
        changed
    }

    /// Whether the preview differs from the starting geometry.
    #[must_use]
    pub fn has_moved(&self) -> bool {
        self.current != self.start
    }

    /// Short description used for the history entry on commit.
    #[must_use]
    pub fn description(&self) -> String {
        format!("{} {}", self.mode.verb(), self.kind.label())
    }
}

/// Smallest allowed width/height: one grid pitch.
#[must_use]
pub fn min_size(grid: f64) -> f64 {
    if grid.is_finite() && grid > 0.0 { grid } else { 1.0 }
}

/// Translate `start` by `(dx, dy)` and snap the origin.
#[must_use]
pub fn drag_rect(start: Rect, dx: f64, dy: f64, grid: f64, bounds: Option<Rect>) -> Rect {
    let moved = Rect::new(snap(start.x + dx, grid), snap(start.y + dy, grid), start.w, start.h);
    match bounds {
        Some(b) => clamp_origin(moved, &b),
        None => moved,
    }
}

/// Move the edges `anchor` controls by `(dx, dy)`, snapping every edge.
///
/// The opposite edges stay put. Width and height never drop below one grid
/// pitch: a dragged edge stops one pitch short of its fixed counterpart.
#[must_use]
pub fn resize_rect(start: Rect, anchor: ResizeAnchor, dx: f64, dy: f64, grid: f64, bounds: Option<Rect>) -> Rect {
    let min = min_size(grid);
    let mut left = snap(start.x, grid);
    let mut top = snap(start.y, grid);
    let mut right = snap(start.right(), grid);
    let mut bottom = snap(start.bottom(), grid);

    if anchor.moves_left() {
        left = snap(start.x + dx, grid);
        if let Some(b) = bounds {
            left = left.max(b.x);
        }
        left = left.min(right - min);
    }
    if anchor.moves_right() {
        right = snap(start.right() + dx, grid);
        if let Some(b) = bounds {
            right = right.min(b.right());
        }
        right = right.max(left + min);
    }
    if anchor.moves_top() {
        top = snap(start.y + dy, grid);
        if let Some(b) = bounds {
            top = top.max(b.y);
        }
        top = top.min(bottom - min);
    }
    if anchor.moves_bottom() {
        bottom = snap(start.bottom() + dy, grid);
        if let Some(b) = bounds {
            bottom = bottom.min(b.bottom());
        }
        bottom = bottom.max(top + min);
    }

    Rect::new(left, top, right - left, bottom - top)
}

/// Clamp `rect`'s origin so it stays inside `bounds` (top-left wins if it can't fit).
#[must_use]
pub fn clamp_origin(rect: Rect, bounds: &Rect) -> Rect {
    let max_x = (bounds.right() - rect.w).max(bounds.x);
    let max_y = (bounds.bottom() - rect.h).max(bounds.y);
    Rect { x: rect.x.clamp(bounds.x, max_x), y: rect.y.clamp(bounds.y, max_y), ..rect }
}
