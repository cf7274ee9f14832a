use super::*;
use crate::doc::Entity;

const SCREEN: Size = Size { width: 800.0, height: 600.0 };

fn config(threshold: usize, max_rendered: usize) -> CullConfig {
    CullConfig { buffer: 300.0, threshold, max_rendered }
}

/// A row of `n` 100x100 widgets spaced 200 units apart starting at `x0`.
fn row(state: &mut CanvasState, n: usize, x0: f64, y: f64) -> Vec<EntityId> {
    (0..n)
        .map(|i| {
            #[allow(clippy::cast_precision_loss)]
            let x = x0 + i as f64 * 200.0;
            let e = Entity::widget("cpu", Rect::new(x, y, 100.0, 100.0), 0);
            let id = e.id.clone();
            state.insert_widget(e);
            id
        })
        .collect()
}

fn ids(result: &CullResult<'_>) -> Vec<EntityId> {
    result.visible.iter().map(|e| e.id.clone()).collect()
}

// =============================================================
// Identity pass under the threshold
// =============================================================

#[test]
fn under_threshold_returns_everything() {
    let mut state = CanvasState::new(20.0);
    // Far offscreen; still returned because culling is off.
    let all = row(&mut state, 10, 50_000.0, 50_000.0);
    let result = cull(&state, &Viewport::default(), SCREEN, &CullConfig::default(), None);
    assert_eq!(result.total_count, 10);
    assert_eq!(result.rendered_count, 10);
    assert_eq!(ids(&result), all);
}

#[test]
fn exactly_at_threshold_is_identity() {
    let mut state = CanvasState::new(20.0);
    row(&mut state, 6, 90_000.0, 0.0);
    let result = cull(&state, &Viewport::default(), SCREEN, &config(6, 100), None);
    assert_eq!(result.rendered_count, result.total_count);
}

#[test]
fn empty_canvas() {
    let state = CanvasState::new(20.0);
    let result = cull(&state, &Viewport::default(), SCREEN, &CullConfig::default(), None);
    assert_eq!(result.total_count, 0);
    assert!(result.visible.is_empty());
}

// =============================================================
// Intersection culling
// =============================================================

#[test]
fn offscreen_entities_are_dropped() {
    let mut state = CanvasState::new(20.0);
    let near = row(&mut state, 3, 0.0, 0.0);
    row(&mut state, 5, 10_000.0, 10_000.0);
    let result = cull(&state, &Viewport::default(), SCREEN, &config(4, 100), None);
    assert_eq!(result.total_count, 8);
    assert_eq!(ids(&result), near);
    assert_eq!(result.rendered_count, 3);
}

#[test]
fn buffer_keeps_entities_just_past_the_edge() {
    let mut state = CanvasState::new(20.0);
    // Screen covers x in [0, 800); buffer reaches to 1100 at zoom 1.
    let just_past = row(&mut state, 1, 1_000.0, 0.0);
    row(&mut state, 1, 1_200.0, 0.0);
    row(&mut state, 3, 20_000.0, 0.0);
    let result = cull(&state, &Viewport::default(), SCREEN, &config(2, 100), None);
    assert_eq!(ids(&result), just_past);
}

#[test]
fn buffer_shrinks_in_world_units_when_zoomed_in() {
    let mut state = CanvasState::new(20.0);
    row(&mut state, 1, 1_000.0, 0.0);
    row(&mut state, 3, 20_000.0, 0.0);
    // At zoom 2 the screen spans 400 world units and the buffer 150.
    let zoomed = Viewport { x: 0.0, y: 0.0, zoom: 2.0 };
    let result = cull(&state, &zoomed, SCREEN, &config(2, 100), None);
    assert!(result.visible.is_empty());
}

#[test]
fn panned_viewport_sees_other_region() {
    let mut state = CanvasState::new(20.0);
    row(&mut state, 3, 0.0, 0.0);
    let far = row(&mut state, 3, 10_000.0, 0.0);
    let panned = Viewport { x: -10_000.0, y: 0.0, zoom: 1.0 };
    let result = cull(&state, &panned, SCREEN, &config(4, 100), None);
    assert_eq!(ids(&result), far);
}

// =============================================================
// Max render count
// =============================================================

#[test]
fn over_max_keeps_nearest_to_center() {
    let mut state = CanvasState::new(20.0);
    // Centered around the viewport center (400, 300): i = 0..5 at x = -400..400.
    let all = row(&mut state, 5, -400.0, 250.0);
    let result = cull(&state, &Viewport::default(), SCREEN, &config(2, 2), None);
    assert_eq!(result.rendered_count, 2);
    // Centers at x = 250 and x = 450 are nearest to the viewport center x = 400.
    assert_eq!(ids(&result), vec![all[3].clone(), all[4].clone()]);
}

#[test]
fn output_keeps_canonical_order_after_ranking() {
    let mut state = CanvasState::new(20.0);
    let all = row(&mut state, 6, -200.0, 250.0);
    let result = cull(&state, &Viewport::default(), SCREEN, &config(2, 3), None);
    let kept = ids(&result);
    let positions: Vec<usize> = kept.iter().map(|id| all.iter().position(|a| a == id).unwrap()).collect();
    let mut sorted = positions.clone();
    sorted.sort_unstable();
    assert_eq!(positions, sorted);
}

// =============================================================
// Active entity guarantee
// =============================================================

#[test]
fn active_entity_is_always_visible() {
    let mut state = CanvasState::new(20.0);
    row(&mut state, 5, 0.0, 0.0);
    let far = row(&mut state, 1, 90_000.0, 90_000.0);
    let result = cull(&state, &Viewport::default(), SCREEN, &config(2, 100), Some(&far[0]));
    assert!(ids(&result).contains(&far[0]));
}

#[test]
fn active_entity_survives_max_truncation() {
    let mut state = CanvasState::new(20.0);
    let near = row(&mut state, 5, 0.0, 0.0);
    let result = cull(&state, &Viewport::default(), SCREEN, &config(2, 1), Some(&near[4]));
    assert_eq!(result.rendered_count, 1);
    assert_eq!(ids(&result), vec![near[4].clone()]);
}

#[test]
fn unknown_active_id_is_ignored() {
    let mut state = CanvasState::new(20.0);
    row(&mut state, 5, 0.0, 0.0);
    let ghost = EntityId::from("ghost");
    let result = cull(&state, &Viewport::default(), SCREEN, &config(2, 100), Some(&ghost));
    assert_eq!(result.rendered_count, 5);
}

// =============================================================
// Nested entities follow their container
// =============================================================

fn nest_with_children(state: &mut CanvasState, rect: Rect, children: usize) -> (EntityId, Vec<EntityId>) {
    let nest = Entity::nest("group", rect, 0);
    let nest_id = nest.id.clone();
    state.insert_nest(nest);
    let kids = (0..children)
        .map(|_| {
            // Local geometry sits near the origin, so an independent test would always pass.
            let child = Entity::nested(nest_id.clone(), "fan", Rect::new(0.0, 0.0, 20.0, 20.0), 0);
            let id = child.id.clone();
            state.insert_nested(child);
            id
        })
        .collect();
    (nest_id, kids)
}

#[test]
fn nested_visible_iff_parent_visible() {
    let mut state = CanvasState::new(20.0);
    let (_, near_kids) = nest_with_children(&mut state, Rect::new(100.0, 100.0, 200.0, 200.0), 2);
    let (_, far_kids) = nest_with_children(&mut state, Rect::new(50_000.0, 50_000.0, 200.0, 200.0), 2);
    let result = cull(&state, &Viewport::default(), SCREEN, &config(2, 100), None);
    let visible = ids(&result);
    for kid in &near_kids {
        assert!(visible.contains(kid));
    }
    for kid in &far_kids {
        assert!(!visible.contains(kid));
    }
    assert_eq!(result.total_count, 6);
    assert_eq!(result.rendered_count, 3);
}

#[test]
fn active_nested_entity_pins_its_container() {
    let mut state = CanvasState::new(20.0);
    row(&mut state, 3, 0.0, 0.0);
    let (nest_id, kids) = nest_with_children(&mut state, Rect::new(70_000.0, 0.0, 200.0, 200.0), 2);
    let result = cull(&state, &Viewport::default(), SCREEN, &config(2, 100), Some(&kids[1]));
    let visible = ids(&result);
    assert!(visible.contains(&nest_id));
    assert!(visible.contains(&kids[0]));
    assert!(visible.contains(&kids[1]));
}

#[test]
fn children_count_against_the_render_limit() {
    let mut state = CanvasState::new(20.0);
    let widgets = row(&mut state, 5, 0.0, 0.0);
    // The container is nearest the center but needs 11 of the 4 slots.
    let (nest_id, kids) = nest_with_children(&mut state, Rect::new(100.0, 200.0, 200.0, 200.0), 10);
    let result = cull(&state, &Viewport::default(), SCREEN, &config(3, 4), None);

    assert_eq!(result.total_count, 16);
    assert!(result.rendered_count <= 4);
    assert_eq!(ids(&result), widgets[..4].to_vec());
    let visible = ids(&result);
    assert!(!visible.contains(&nest_id));
    assert!(kids.iter().all(|k| !visible.contains(k)));
}

#[test]
fn container_that_fits_brings_every_child() {
    let mut state = CanvasState::new(20.0);
    let widgets = row(&mut state, 5, 0.0, 0.0);
    let (nest_id, kids) = nest_with_children(&mut state, Rect::new(100.0, 200.0, 200.0, 200.0), 10);
    let result = cull(&state, &Viewport::default(), SCREEN, &config(3, 12), None);

    assert_eq!(result.rendered_count, 12);
    let visible = ids(&result);
    assert!(visible.contains(&nest_id));
    assert!(kids.iter().all(|k| visible.contains(k)));
    // The one slot left goes to the widget nearest the center.
    assert!(visible.contains(&widgets[2]));
}

#[test]
fn config_deserializes_with_defaults() {
    let cfg: CullConfig = serde_json::from_str(r#"{"threshold": 10}"#).unwrap();
    assert_eq!(cfg.threshold, 10);
    assert_eq!(cfg.max_rendered, MAX_RENDERED);
}
