//! Document model: entities, their kinds, and the canvas state that owns them.
//!
//! A canvas holds three independent collections: top-level widgets, nest
//! containers, and widgets nested inside a container. Nested geometry is
//! relative to the parent container's origin, so moving a container carries
//! its children with it. Every mutation here is whole-entity; partial state is
//! never observable.

#[cfg(test)]
#[path = "doc_test.rs"]
mod doc_test;

use std::fmt;

use rand::Rng;
use rand::distr::Alphanumeric;
use serde::{Deserialize, Serialize};

use crate::consts::DEFAULT_GRID_SIZE;
use crate::geom::Rect;

/// Length of the random suffix appended to generated ids.
const ID_SUFFIX_LEN: usize = 8;

/// Opaque unique identifier for an entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub String);

impl EntityId {
    /// Generate a fresh id from a prefix, the creation timestamp, and a random suffix.
    #[must_use]
    pub fn generate(prefix: &str, now_ms: i64) -> Self {
        let suffix: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(ID_SUFFIX_LEN)
            .map(char::from)
            .collect();
        Self(format!("{prefix}-{now_ms}-{}", suffix.to_ascii_lowercase()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// What an entity is. Each kind carries only the fields it needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntityKind {
    /// A dashboard widget; `widget_type` names the renderer that draws it.
    Widget { widget_type: String },
    /// A nest container that other widgets can live inside.
    Nest { title: String },
}

/// Coarse kind used by interaction state and history descriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KindTag {
    Widget,
    Nest,
}

impl KindTag {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Widget => "widget",
            Self::Nest => "nest",
        }
    }
}

/// A widget or nest container on the canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Unique identifier, never reused.
    pub id: EntityId,
    /// Left edge in world units (relative to the parent container when nested).
    pub x: f64,
    /// Top edge in world units (relative to the parent container when nested).
    pub y: f64,
    /// Width in world units; always positive.
    pub w: f64,
    /// Height in world units; always positive.
    pub h: f64,
    /// Kind and kind-specific fields.
    #[serde(flatten)]
    pub kind: EntityKind,
    /// Container this entity lives in, for nested entities.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_nest_id: Option<EntityId>,
    /// Creation time, milliseconds since the Unix epoch.
    pub created_at: i64,
    /// Last geometry change, milliseconds since the Unix epoch.
    pub updated_at: i64,
}

impl Entity {
    /// A new top-level widget with a generated id.
    #[must_use]
    pub fn widget(widget_type: impl Into<String>, rect: Rect, now_ms: i64) -> Self {
        Self::build(EntityKind::Widget { widget_type: widget_type.into() }, rect, None, now_ms)
    }

    /// A new nest container with a generated id.
    #[must_use]
    pub fn nest(title: impl Into<String>, rect: Rect, now_ms: i64) -> Self {
        Self::build(EntityKind::Nest { title: title.into() }, rect, None, now_ms)
    }

    /// A new widget inside `parent`, with `rect` relative to the parent's origin.
    #[must_use]
    pub fn nested(parent: EntityId, widget_type: impl Into<String>, rect: Rect, now_ms: i64) -> Self {
        Self::build(EntityKind::Widget { widget_type: widget_type.into() }, rect, Some(parent), now_ms)
    }

    fn build(kind: EntityKind, rect: Rect, parent_nest_id: Option<EntityId>, now_ms: i64) -> Self {
        let prefix = match kind {
            EntityKind::Widget { .. } => "widget",
            EntityKind::Nest { .. } => "nest",
        };
        Self {
            id: EntityId::generate(prefix, now_ms),
            x: rect.x,
            y: rect.y,
            w: rect.w,
            h: rect.h,
            kind,
            parent_nest_id,
            created_at: now_ms,
            updated_at: now_ms,
        }
    }

    /// Geometry as a rectangle (local to the parent when nested).
    #[must_use]
    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.w, self.h)
    }

    /// Replace the geometry and bump `updated_at`.
    pub fn set_rect(&mut self, rect: Rect, now_ms: i64) {
        self.x = rect.x;
        self.y = rect.y;
        self.w = rect.w;
        self.h = rect.h;
        self.updated_at = now_ms;
    }

    #[must_use]
    pub fn tag(&self) -> KindTag {
        match self.kind {
            EntityKind::Widget { .. } => KindTag::Widget,
            EntityKind::Nest { .. } => KindTag::Nest,
        }
    }

    #[must_use]
    pub fn is_nest(&self) -> bool {
        matches!(self.kind, EntityKind::Nest { .. })
    }
}

/// Which collection an entity lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Widgets,
    Nests,
    Nested,
}

/// The canonical set of entities plus the snap pitch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanvasState {
    /// Top-level widgets.
    pub widgets: Vec<Entity>,
    /// Nest containers.
    pub nests: Vec<Entity>,
    /// Widgets living inside a nest container.
    pub nested: Vec<Entity>,
    /// Snap pitch in world units.
    pub grid_size: f64,
}

impl Default for CanvasState {
    fn default() -> Self {
        Self::new(DEFAULT_GRID_SIZE)
    }
}

impl CanvasState {
    /// Create an empty canvas with the given snap pitch.
    #[must_use]
    pub fn new(grid_size: f64) -> Self {
        Self { widgets: Vec::new(), nests: Vec::new(), nested: Vec::new(), grid_size }
    }

    /// Total number of entities across all collections.
    #[must_use]
    pub fn total_count(&self) -> usize {
        self.widgets.len() + self.nests.len() + self.nested.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total_count() == 0
    }

    /// Which collection holds `id`, if any.
    #[must_use]
    pub fn collection_of(&self, id: &EntityId) -> Option<Collection> {
        if self.widgets.iter().any(|e| &e.id == id) {
            Some(Collection::Widgets)
        } else if self.nests.iter().any(|e| &e.id == id) {
            Some(Collection::Nests)
        } else if self.nested.iter().any(|e| &e.id == id) {
            Some(Collection::Nested)
        } else {
            None
        }
    }

    /// Look up an entity in any collection.
    #[must_use]
    pub fn get(&self, id: &EntityId) -> Option<&Entity> {
        self.iter().find(|e| &e.id == id)
    }

    /// Mutable lookup in any collection.
    pub fn get_mut(&mut self, id: &EntityId) -> Option<&mut Entity> {
        self.widgets
            .iter_mut()
            .chain(self.nests.iter_mut())
            .chain(self.nested.iter_mut())
            .find(|e| &e.id == id)
    }

    /// All entities: widgets, then nests, then nested.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.widgets.iter().chain(self.nests.iter()).chain(self.nested.iter())
    }

    /// Top-level entities (widgets, then nest containers).
    pub fn top_level(&self) -> impl Iterator<Item = &Entity> {
        self.widgets.iter().chain(self.nests.iter())
    }

    /// Nested entities whose parent is `nest_id`.
    pub fn children_of<'a>(&'a self, nest_id: &'a EntityId) -> impl Iterator<Item = &'a Entity> + 'a {
        self.nested
            .iter()
            .filter(move |e| e.parent_nest_id.as_ref() == Some(nest_id))
    }

    /// Entities that share a plane with `id`: top-level peers for top-level
    /// entities, siblings in the same container for nested ones.
    #[must_use]
    pub fn peers_of(&self, id: &EntityId) -> Vec<Entity> {
        let Some(entity) = self.get(id) else {
            return Vec::new();
        };
        match &entity.parent_nest_id {
            Some(parent) => self
                .children_of(parent)
                .filter(|e| &e.id != id)
                .cloned()
                .collect(),
            None => self.top_level().filter(|e| &e.id != id).cloned().collect(),
        }
    }

    /// Interior of `nest_id` in the container's own coordinates.
    #[must_use]
    pub fn interior_of(&self, nest_id: &EntityId) -> Option<Rect> {
        self.nests
            .iter()
            .find(|e| &e.id == nest_id)
            .map(|nest| Rect::new(0.0, 0.0, nest.w, nest.h))
    }

    /// World-space bounding box, resolving nested geometry against the parent.
    #[must_use]
    pub fn world_rect(&self, entity: &Entity) -> Rect {
        let local = entity.rect();
        match entity.parent_nest_id.as_ref().and_then(|p| self.get(p)) {
            Some(parent) => local.offset(parent.x, parent.y),
            None => local,
        }
    }

    /// Add a top-level widget. Refused if the id is taken or the entity is not a widget.
    pub fn insert_widget(&mut self, entity: Entity) -> bool {
        if !matches!(entity.kind, EntityKind::Widget { .. }) || entity.parent_nest_id.is_some() {
            return false;
        }
        if self.get(&entity.id).is_some() {
            return false;
        }
        self.widgets.push(entity);
        true
    }

    /// Add a nest container. Refused if the id is taken or the entity is not a nest.
    pub fn insert_nest(&mut self, entity: Entity) -> bool {
        if !entity.is_nest() || entity.parent_nest_id.is_some() {
            return false;
        }
        if self.get(&entity.id).is_some() {
            return false;
        }
        self.nests.push(entity);
        true
    }

    /// Add a nested widget. Refused unless its parent is a live container.
    pub fn insert_nested(&mut self, entity: Entity) -> bool {
        let Some(parent) = entity.parent_nest_id.as_ref() else {
            return false;
        };
        if entity.is_nest() || self.interior_of(parent).is_none() {
            return false;
        }
        if self.get(&entity.id).is_some() {
            return false;
        }
        self.nested.push(entity);
        true
    }

    /// Remove an entity. Removing a container also removes its children.
    ///
    /// Returns every removed entity, the requested one first.
    pub fn remove(&mut self, id: &EntityId) -> Vec<Entity> {
        let mut removed = Vec::new();
        match self.collection_of(id) {
            Some(Collection::Widgets) => {
                self.widgets.retain(|e| {
                    if &e.id == id {
                        removed.push(e.clone());
                        false
                    } else {
                        true
                    }
                });
            }
            Some(Collection::Nests) => {
                self.nests.retain(|e| {
                    if &e.id == id {
                        removed.push(e.clone());
                        false
                    } else {
                        true
                    }
                });
                self.nested.retain(|e| {
                    if e.parent_nest_id.as_ref() == Some(id) {
                        removed.push(e.clone());
                        false
                    } else {
                        true
                    }
                });
            }
            Some(Collection::Nested) => {
                self.nested.retain(|e| {
                    if &e.id == id {
                        removed.push(e.clone());
                        false
                    } else {
                        true
                    }
                });
            }
            None => {}
        }
        removed
    }

    /// Replace an entity's geometry. Returns false if the entity doesn't exist.
    pub fn set_rect(&mut self, id: &EntityId, rect: Rect, now_ms: i64) -> bool {
        let Some(entity) = self.get_mut(id) else {
            return false;
        };
        entity.set_rect(rect, now_ms);
        true
    }
}
