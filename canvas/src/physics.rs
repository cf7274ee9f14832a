//! Collision and push physics.
//!
//! When an entity lands on others, each collider is shoved out along the axis
//! of least overlap, away from the mover. A displaced entity becomes a pusher
//! in turn, so chains resolve breadth-first. No entity is pushed twice in one
//! pass, which bounds the work by the population size. A displaced entity
//! never lands on the mover or on anything already settled in the pass,
//! unless container bounds leave no room.
//!
//! Pure and synchronous: callers decide whether to commit the result.

#[cfg(test)]
#[path = "physics_test.rs"]
mod physics_test;

use std::collections::VecDeque;

use crate::consts::PUSH_BUFFER;
use crate::doc::Entity;
use crate::geom::{Axis, Rect, snap, snap_ceil, snap_floor};

/// An entity displaced by [`resolve_push`], with its new position.
#[derive(Debug, Clone, PartialEq)]
pub struct Pushed {
    /// The entity at its resolved position.
    pub entity: Entity,
    /// 0 for entities hit by the mover, 1+ for chained pushes.
    pub chain_depth: usize,
}

/// Resolve overlaps caused by `moved`, using the default push buffer.
///
/// Returns only the entities from `others` that changed position.
#[must_use]
pub fn resolve_push(moved: &Entity, others: &[Entity], grid_size: f64, bounds: Option<Rect>) -> Vec<Pushed> {
    resolve_push_with_buffer(moved, others, grid_size, bounds, PUSH_BUFFER)
}

/// [`resolve_push`] with an explicit separation buffer.
#[must_use]
pub fn resolve_push_with_buffer(
    moved: &Entity,
    others: &[Entity],
    grid_size: f64,
    bounds: Option<Rect>,
    buffer: f64,
) -> Vec<Pushed> {
    let mover = moved.rect();
    let mut working: Vec<Entity> = others.iter().filter(|e| e.id != moved.id).cloned().collect();
    let mut pushed = vec![false; working.len()];
    let mut order: Vec<(usize, usize)> = Vec::new();
    let mut pushers: VecDeque<(Rect, usize)> = VecDeque::from([(mover, 0)]);

    while let Some((pusher, depth)) = pushers.pop_front() {
        for index in 0..working.len() {
            let target = working[index].rect();
            if pushed[index] || !pusher.intersects(&target) {
                continue;
            }
            // The mover and everything already settled this pass stay put.
            let obstacles: Vec<Rect> = std::iter::once(mover)
                .chain(order.iter().map(|&(settled, _)| working[settled].rect()))
                .collect();
            let dest = displace(&pusher, &target, &obstacles, grid_size, bounds, buffer);
            working[index].x = dest.x;
            working[index].y = dest.y;
            pushed[index] = true;
            order.push((index, depth));
            pushers.push_back((dest, depth + 1));
        }
    }

    order
        .into_iter()
        .map(|(index, chain_depth)| Pushed { entity: working[index].clone(), chain_depth })
        .collect()
}

/// The axis to push along: the one with the smaller overlap, horizontal on ties.
#[must_use]
pub fn push_axis(pusher: &Rect, target: &Rect) -> Axis {
    if pusher.overlap(target, Axis::Horizontal) <= pusher.overlap(target, Axis::Vertical) {
        Axis::Horizontal
    } else {
        Axis::Vertical
    }
}

/// Direction (`1.0` or `-1.0`) from the pusher's center toward the target's on `axis`.
///
/// Coincident centers push in the positive direction.
#[must_use]
pub fn away_sign(pusher: &Rect, target: &Rect, axis: Axis) -> f64 {
    let delta = match axis {
        Axis::Horizontal => target.center().x - pusher.center().x,
        Axis::Vertical => target.center().y - pusher.center().y,
    };
    if delta < 0.0 { -1.0 } else { 1.0 }
}

/// New box for `target` once pushed clear of `pusher` and `obstacles`.
///
/// Candidates, in order: least-overlap axis away from the pusher, the other
/// axis away from the pusher, then both axes toward the far side. The first
/// candidate that touches neither the pusher nor an obstacle after clamping
/// wins. If none does, each direction is retried sliding past whatever it
/// lands on. If clamping defeats that too, the first candidate is kept.
#[must_use]
pub fn displace(pusher: &Rect, target: &Rect, obstacles: &[Rect], grid: f64, bounds: Option<Rect>, buffer: f64) -> Rect {
    let axis = push_axis(pusher, target);
    let other = axis.other();
    let along = away_sign(pusher, target, axis);
    let across = away_sign(pusher, target, other);
    let candidates = [(axis, along), (other, across), (axis, -along), (other, -across)];
    let blocker = |r: &Rect| std::iter::once(pusher).chain(obstacles).find(|o| r.intersects(o)).copied();

    let placed = candidates.map(|(axis, dir)| place(pusher, target, axis, dir, grid, bounds, buffer));
    if let Some(clear) = placed.iter().find(|r| blocker(r).is_none()) {
        return *clear;
    }
    candidates
        .iter()
        .zip(placed)
        .find_map(|(&(axis, dir), start)| {
            let mut rect = start;
            // Each step clears one blocker for good, so this is bounded.
            for _ in 0..=obstacles.len() {
                let Some(block) = blocker(&rect) else {
                    return Some(rect);
                };
                let next = place(&block, &rect, axis, dir, grid, bounds, buffer);
                if next == rect {
                    return None;
                }
                rect = next;
            }
            blocker(&rect).is_none().then_some(rect)
        })
        .unwrap_or(placed[0])
}

/// Shift `target` along `axis` in direction `dir` until it clears `pusher` by `buffer`.
///
/// For the usual partial overlap the shift is exactly overlap + buffer; a
/// target that straddles the pusher moves far enough to clear its far edge.
/// The pushed coordinate snaps away from the pusher so rounding can't pull it
/// back into contact.
fn place(pusher: &Rect, target: &Rect, axis: Axis, dir: f64, grid: f64, bounds: Option<Rect>, buffer: f64) -> Rect {
    let origin = if dir > 0.0 {
        snap_ceil(pusher.max(axis) + buffer, grid)
    } else {
        snap_floor(pusher.min(axis) - buffer - target.extent(axis), grid)
    };
    let other = axis.other();
    let moved = target
        .with_origin(axis, origin)
        .with_origin(other, snap(target.min(other), grid));
    clamp(moved, bounds)
}

/// Keep `rect` inside `bounds`, or in the non-negative quadrant without bounds.
fn clamp(rect: Rect, bounds: Option<Rect>) -> Rect {
    match bounds {
        Some(b) => crate::interaction::clamp_origin(rect, &b),
        None => Rect { x: rect.x.max(0.0), y: rect.y.max(0.0), ..rect },
    }
}
