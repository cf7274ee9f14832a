//! Export/import document for a whole canvas.
//!
//! A snapshot is self-describing JSON: the three entity collections, the grid
//! pitch, the viewport and an export timestamp. Import validates everything
//! at this boundary, so the rest of the engine can trust canvas invariants.
//! A rejected document never touches live state: parsing produces a new
//! value and the caller swaps it in only on success.

#[cfg(test)]
#[path = "snapshot_test.rs"]
mod snapshot_test;

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::camera::{Viewport, ZoomLimits};
use crate::consts::DEFAULT_GRID_SIZE;
use crate::doc::{CanvasState, Entity, EntityId, EntityKind};

/// Value of the `format` field in every exported snapshot.
pub const SNAPSHOT_FORMAT: &str = "widgetboard.canvas";

/// Current snapshot layout version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// The entity collections every snapshot must carry.
const COLLECTIONS: [&str; 3] = ["widgets", "nests", "nested"];

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("snapshot must be a JSON object")]
    NotAnObject,
    #[error("unknown snapshot format: {0}")]
    UnknownFormat(String),
    #[error("unsupported snapshot version {0}")]
    UnsupportedVersion(u32),
    #[error("missing entity collection: {0}")]
    MissingCollection(&'static str),
    #[error("entity collection {0} is not an array")]
    NotACollection(&'static str),
    #[error("grid size must be a positive number, got {0}")]
    InvalidGridSize(f64),
    #[error("viewport must have a finite offset")]
    InvalidViewport,
    #[error("entity {0} has invalid geometry")]
    InvalidGeometry(EntityId),
    #[error("duplicate entity id: {0}")]
    DuplicateId(EntityId),
    #[error("entity {id} does not belong in {collection}")]
    WrongKind { id: EntityId, collection: &'static str },
    #[error("nested entity {0} references a missing container")]
    OrphanedEntity(EntityId),
}

/// A serialized canvas plus viewport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanvasSnapshot {
    #[serde(default = "default_format")]
    pub format: String,
    #[serde(default = "default_version")]
    pub version: u32,
    pub widgets: Vec<Entity>,
    pub nests: Vec<Entity>,
    pub nested: Vec<Entity>,
    #[serde(default = "default_grid_size")]
    pub grid_size: f64,
    #[serde(default)]
    pub viewport: Viewport,
    /// Milliseconds since the Unix epoch; 0 when absent.
    #[serde(default)]
    pub exported_at: i64,
}

fn default_format() -> String {
    SNAPSHOT_FORMAT.to_owned()
}

fn default_version() -> u32 {
    SNAPSHOT_VERSION
}

fn default_grid_size() -> f64 {
    DEFAULT_GRID_SIZE
}

impl CanvasSnapshot {
    /// Capture `canvas` and `viewport` at `now_ms`.
    #[must_use]
    pub fn capture(canvas: &CanvasState, viewport: &Viewport, now_ms: i64) -> Self {
        Self {
            format: default_format(),
            version: SNAPSHOT_VERSION,
            widgets: canvas.widgets.clone(),
            nests: canvas.nests.clone(),
            nested: canvas.nested.clone(),
            grid_size: canvas.grid_size,
            viewport: *viewport,
            exported_at: now_ms,
        }
    }

    /// Split into the canvas and viewport it describes.
    #[must_use]
    pub fn into_parts(self) -> (CanvasState, Viewport) {
        let canvas = CanvasState { widgets: self.widgets, nests: self.nests, nested: self.nested, grid_size: self.grid_size };
        (canvas, self.viewport)
    }

    /// Pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Json`] if serialization fails.
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse and validate a snapshot document. Zoom is clamped into `limits`.
    ///
    /// # Errors
    ///
    /// Returns a [`SnapshotError`] describing the first problem found.
    pub fn parse(text: &str, limits: ZoomLimits) -> Result<Self, SnapshotError> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(value, limits)
    }

    /// Validate an already-decoded JSON value.
    ///
    /// # Errors
    ///
    /// Returns a [`SnapshotError`] describing the first problem found.
    pub fn from_value(value: Value, limits: ZoomLimits) -> Result<Self, SnapshotError> {
        let Some(object) = value.as_object() else {
            return Err(SnapshotError::NotAnObject);
        };
        for name in COLLECTIONS {
            match object.get(name) {
                None | Some(Value::Null) => return Err(SnapshotError::MissingCollection(name)),
                Some(Value::Array(_)) => {}
                Some(_) => return Err(SnapshotError::NotACollection(name)),
            }
        }

        let mut snapshot: Self = serde_json::from_value(value)?;
        if snapshot.format != SNAPSHOT_FORMAT {
            return Err(SnapshotError::UnknownFormat(snapshot.format));
        }
        if snapshot.version > SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion(snapshot.version));
        }
        snapshot.validate()?;
        snapshot.viewport.zoom = limits.clamp(snapshot.viewport.zoom);
        Ok(snapshot)
    }

    fn validate(&self) -> Result<(), SnapshotError> {
        if !(self.grid_size.is_finite() && self.grid_size > 0.0) {
            return Err(SnapshotError::InvalidGridSize(self.grid_size));
        }
        if !(self.viewport.x.is_finite() && self.viewport.y.is_finite()) {
            return Err(SnapshotError::InvalidViewport);
        }

        let mut seen: HashSet<&EntityId> = HashSet::new();
        let groups = [("widgets", &self.widgets), ("nests", &self.nests), ("nested", &self.nested)];
        for (collection, entities) in groups {
            for entity in entities {
                check_geometry(entity)?;
                if !seen.insert(&entity.id) {
                    return Err(SnapshotError::DuplicateId(entity.id.clone()));
                }
                let belongs = match collection {
                    "nests" => matches!(entity.kind, EntityKind::Nest { .. }) && entity.parent_nest_id.is_none(),
                    "nested" => matches!(entity.kind, EntityKind::Widget { .. }) && entity.parent_nest_id.is_some(),
                    _ => matches!(entity.kind, EntityKind::Widget { .. }) && entity.parent_nest_id.is_none(),
                };
                if !belongs {
                    return Err(SnapshotError::WrongKind { id: entity.id.clone(), collection });
                }
            }
        }

        let containers: HashSet<&EntityId> = self.nests.iter().map(|n| &n.id).collect();
        for child in &self.nested {
            if !child.parent_nest_id.as_ref().is_some_and(|p| containers.contains(p)) {
                return Err(SnapshotError::OrphanedEntity(child.id.clone()));
            }
        }
        Ok(())
    }
}

fn check_geometry(entity: &Entity) -> Result<(), SnapshotError> {
    let finite = entity.x.is_finite() && entity.y.is_finite() && entity.w.is_finite() && entity.h.is_finite();
    if finite && entity.w > 0.0 && entity.h > 0.0 {
        Ok(())
    } else {
        Err(SnapshotError::InvalidGeometry(entity.id.clone()))
    }
}
