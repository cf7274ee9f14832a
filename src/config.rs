//! Host configuration loaded from `WIDGETBOARD_*` environment variables.
//!
//! Missing or unparsable values fall back to the engine defaults; the
//! resulting [`EngineConfig`] is sanitized before use.

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

use std::path::PathBuf;

use canvas::config::EngineConfig;
use tracing::info;

const DEFAULT_PROFILE_DIR: &str = "profiles";

/// Everything the host needs to open a session.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Directory holding `<profile>.json` snapshots.
    pub profile_dir: PathBuf,
    pub engine: EngineConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = EngineConfig::default();
        let mut engine = defaults;
        engine.grid_size = env_parse("WIDGETBOARD_GRID_SIZE", defaults.grid_size);
        engine.autosave.debounce_ms = env_parse("WIDGETBOARD_AUTOSAVE_DEBOUNCE_MS", defaults.autosave.debounce_ms);
        engine.autosave.max_retries = env_parse("WIDGETBOARD_AUTOSAVE_MAX_RETRIES", defaults.autosave.max_retries);
        engine.autosave.backoff_base_ms =
            env_parse("WIDGETBOARD_AUTOSAVE_BACKOFF_BASE_MS", defaults.autosave.backoff_base_ms);
        engine.cull.threshold = env_parse("WIDGETBOARD_CULL_THRESHOLD", defaults.cull.threshold);
        engine.cull.max_rendered = env_parse("WIDGETBOARD_MAX_RENDERED", defaults.cull.max_rendered);
        engine.momentum = env_parse("WIDGETBOARD_MOMENTUM", defaults.momentum);
        let engine = engine.sanitized();

        let profile_dir = std::env::var("WIDGETBOARD_PROFILE_DIR").map_or_else(|_| PathBuf::from(DEFAULT_PROFILE_DIR), PathBuf::from);

        info!(
            profile_dir = %profile_dir.display(),
            grid_size = engine.grid_size,
            debounce_ms = engine.autosave.debounce_ms,
            max_retries = engine.autosave.max_retries,
            backoff_base_ms = engine.autosave.backoff_base_ms,
            "configuration loaded"
        );
        Self { profile_dir, engine }
    }
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}
