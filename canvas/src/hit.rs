#[cfg(test)]
#[path = "hit_test.rs"]
mod hit_test;

use serde::{Deserialize, Serialize};

use crate::camera::Viewport;
use crate::consts::HANDLE_RADIUS_PX;
use crate::doc::{CanvasState, Entity, EntityId};
use crate::geom::{Point, Rect};

/// Which part of an entity was hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitPart {
    Body,
    ResizeHandle(ResizeAnchor),
}

/// Anchor position for resize handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeAnchor {
    N,
    Ne,
    E,
    Se,
    S,
    Sw,
    W,
    Nw,
}

impl ResizeAnchor {
    /// Every anchor, corners before edges so corners win where handles overlap.
    pub const ALL: [ResizeAnchor; 8] = [
        ResizeAnchor::Nw,
        ResizeAnchor::Ne,
        ResizeAnchor::Se,
        ResizeAnchor::Sw,
        ResizeAnchor::N,
        ResizeAnchor::E,
        ResizeAnchor::S,
        ResizeAnchor::W,
    ];

    #[must_use]
    pub fn moves_left(self) -> bool {
        matches!(self, Self::W | Self::Nw | Self::Sw)
    }

    #[must_use]
    pub fn moves_right(self) -> bool {
        matches!(self, Self::E | Self::Ne | Self::Se)
    }

    #[must_use]
    pub fn moves_top(self) -> bool {
        matches!(self, Self::N | Self::Ne | Self::Nw)
    }

    #[must_use]
    pub fn moves_bottom(self) -> bool {
        matches!(self, Self::S | Self::Se | Self::Sw)
    }

    /// Where this handle sits on `rect`.
    #[must_use]
    pub fn handle_point(self, rect: &Rect) -> Point {
        let x = if self.moves_left() {
            rect.x
        } else if self.moves_right() {
            rect.right()
        } else {
            rect.center().x
        };
        let y = if self.moves_top() {
            rect.y
        } else if self.moves_bottom() {
            rect.bottom()
        } else {
            rect.center().y
        };
        Point::new(x, y)
    }

    /// CSS cursor name shown while hovering or dragging this handle.
    #[must_use]
    pub fn cursor(self) -> &'static str {
        match self {
            Self::N | Self::S => "ns-resize",
            Self::E | Self::W => "ew-resize",
            Self::Ne | Self::Sw => "nesw-resize",
            Self::Nw | Self::Se => "nwse-resize",
        }
    }
}

/// Result of a hit test.
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub id: EntityId,
    pub part: HitPart,
}

/// Test which entity (if any) is under `world_pt`, checking the selected entity's handles first.
///
/// Bodies are tested top-down: nested children over widgets over nest
/// containers, later insertion over earlier.
#[must_use]
pub fn hit_test(world_pt: Point, state: &CanvasState, viewport: &Viewport, selected_id: Option<&EntityId>) -> Option<Hit> {
    if let Some(selected) = selected_id.and_then(|id| state.get(id)) {
        let rect = state.world_rect(selected);
        let slop = viewport.screen_dist_to_world(HANDLE_RADIUS_PX);
        for anchor in ResizeAnchor::ALL {
            if anchor.handle_point(&rect).distance(world_pt) <= slop {
                return Some(Hit { id: selected.id.clone(), part: HitPart::ResizeHandle(anchor) });
            }
        }
    }

    let topmost = |entities: &[Entity]| {
        entities
            .iter()
            .rev()
            .find(|e| state.world_rect(e).contains(world_pt))
            .map(|e| Hit { id: e.id.clone(), part: HitPart::Body })
    };

    topmost(&state.nested)
        .or_else(|| topmost(&state.widgets))
        .or_else(|| topmost(&state.nests))
}
