//! Spatial virtualization: which entities are worth rendering for a viewport.
//!
//! Small canvases pass through untouched. Past the threshold, top-level
//! entities are kept when they intersect the buffered viewport, and if that
//! still leaves too many, the ones nearest the viewport center win. Nested
//! entities follow their container and count against the render limit with
//! it. The entity under an active drag/resize is always kept, whatever its
//! position, even if that alone exceeds the limit.

#[cfg(test)]
#[path = "cull_test.rs"]
mod cull_test;

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::camera::Viewport;
use crate::consts::{CULL_BUFFER, CULL_THRESHOLD, MAX_RENDERED};
use crate::doc::{CanvasState, Entity, EntityId};
use crate::geom::{Rect, Size};

/// Tuning knobs for culling.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CullConfig {
    /// Buffer around the viewport in world units at zoom 1; divided by zoom.
    pub buffer: f64,
    /// At or below this many entities, culling is an identity pass.
    pub threshold: usize,
    /// Most entities kept once culling is active, children included.
    pub max_rendered: usize,
}

impl Default for CullConfig {
    fn default() -> Self {
        Self { buffer: CULL_BUFFER, threshold: CULL_THRESHOLD, max_rendered: MAX_RENDERED }
    }
}

/// Output of [`cull`].
#[derive(Debug, Clone)]
pub struct CullResult<'a> {
    /// Entities to render, in canonical order (widgets, nests, nested).
    pub visible: Vec<&'a Entity>,
    /// Entities on the canvas.
    pub total_count: usize,
    /// Entities in `visible`.
    pub rendered_count: usize,
}

/// The buffered world-space rectangle used for visibility tests.
#[must_use]
pub fn buffered_area(viewport: &Viewport, container: Size, buffer: f64) -> Rect {
    viewport
        .visible_world_rect(container)
        .inflate(viewport.screen_dist_to_world(buffer))
}

/// Compute the visible subset of `state` for `viewport`.
///
/// `active` names the entity under an active drag/resize, if any.
#[must_use]
pub fn cull<'a>(
    state: &'a CanvasState,
    viewport: &Viewport,
    container: Size,
    config: &CullConfig,
    active: Option<&EntityId>,
) -> CullResult<'a> {
    let total_count = state.total_count();
    if total_count <= config.threshold {
        let visible: Vec<&Entity> = state.iter().collect();
        return CullResult { rendered_count: visible.len(), visible, total_count };
    }

    let area = buffered_area(viewport, container, config.buffer);
    let center = area.center();

    // Pinned: the active entity, or the container of an active nested entity.
    let pinned: Option<&EntityId> = active.and_then(|id| state.get(id)).map(|e| e.parent_nest_id.as_ref().unwrap_or(&e.id));

    // A container renders with all of its children, so it costs 1 + children.
    let mut children: HashMap<&EntityId, usize> = HashMap::new();
    for parent in state.nested.iter().filter_map(|e| e.parent_nest_id.as_ref()) {
        *children.entry(parent).or_default() += 1;
    }
    let cost = |e: &Entity| 1 + children.get(&e.id).copied().unwrap_or(0);

    let mut kept: Vec<(usize, &Entity)> = Vec::new();
    let mut candidates: Vec<(usize, &Entity, f64)> = Vec::new();
    for (order, entity) in state.top_level().enumerate() {
        if Some(&entity.id) == pinned {
            kept.push((order, entity));
        } else if entity.rect().intersects(&area) {
            candidates.push((order, entity, entity.rect().center().distance(center)));
        }
    }

    let mut budget = config.max_rendered.saturating_sub(kept.iter().map(|(_, e)| cost(*e)).sum());
    if candidates.iter().map(|(_, e, _)| cost(*e)).sum::<usize>() > budget {
        // Stable sort: equal distances keep canonical order.
        candidates.sort_by(|a, b| a.2.total_cmp(&b.2));
        candidates.retain(|(_, e, _)| {
            let fits = cost(*e) <= budget;
            if fits {
                budget -= cost(*e);
            }
            fits
        });
    }
    kept.extend(candidates.into_iter().map(|(order, entity, _)| (order, entity)));
    kept.sort_by_key(|(order, _)| *order);

    let visible_nests: HashSet<&EntityId> = kept
        .iter()
        .filter(|(_, e)| e.is_nest())
        .map(|(_, e)| &e.id)
        .collect();

    let mut visible: Vec<&Entity> = kept.into_iter().map(|(_, e)| e).collect();
    visible.extend(
        state
            .nested
            .iter()
            .filter(|e| e.parent_nest_id.as_ref().is_some_and(|p| visible_nests.contains(p))),
    );

    CullResult { rendered_count: visible.len(), visible, total_count }
}
