//! Engine tuning, deserializable from JSON with every field optional.

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

use serde::{Deserialize, Serialize};

use crate::autosave::AutoSaveConfig;
use crate::camera::ZoomLimits;
use crate::consts::{DEFAULT_GRID_SIZE, HISTORY_LIMIT, PUSH_BUFFER};
use crate::cull::CullConfig;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Snap pitch for new canvases.
    pub grid_size: f64,
    pub zoom: ZoomLimits,
    pub cull: CullConfig,
    /// Gap left between a pushed entity and its pusher.
    pub push_buffer: f64,
    /// Most history entries kept.
    pub history_limit: usize,
    pub autosave: AutoSaveConfig,
    /// Coast wheel zoom after the wheel stops.
    pub momentum: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            grid_size: DEFAULT_GRID_SIZE,
            zoom: ZoomLimits::default(),
            cull: CullConfig::default(),
            push_buffer: PUSH_BUFFER,
            history_limit: HISTORY_LIMIT,
            autosave: AutoSaveConfig::default(),
            momentum: true,
        }
    }
}

impl EngineConfig {
    /// Replace out-of-range values with defaults.
    #[must_use]
    pub fn sanitized(self) -> Self {
        let defaults = Self::default();
        let zoom_ok = self.zoom.min.is_finite()
            && self.zoom.max.is_finite()
            && self.zoom.min > 0.0
            && self.zoom.min <= self.zoom.max;
        Self {
            grid_size: if self.grid_size.is_finite() && self.grid_size > 0.0 { self.grid_size } else { defaults.grid_size },
            zoom: if zoom_ok { self.zoom } else { defaults.zoom },
            push_buffer: if self.push_buffer.is_finite() && self.push_buffer >= 0.0 {
                self.push_buffer
            } else {
                defaults.push_buffer
            },
            history_limit: self.history_limit.max(1),
            ..self
        }
    }
}
