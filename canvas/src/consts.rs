//! Shared numeric constants for the canvas crate.

// ── Grid ────────────────────────────────────────────────────────

/// Default snap pitch in world units.
pub const DEFAULT_GRID_SIZE: f64 = 20.0;

// ── Viewport ────────────────────────────────────────────────────

/// Smallest allowed zoom factor.
pub const ZOOM_MIN: f64 = 0.05;

/// Largest allowed zoom factor.
pub const ZOOM_MAX: f64 = 10.0;

/// Multiplicative zoom step for coarse (mouse wheel notch) input.
pub const ZOOM_STEP_COARSE: f64 = 1.1;

/// Multiplicative zoom step for fine (trackpad / high-resolution) input.
pub const ZOOM_STEP_FINE: f64 = 1.02;

/// Wheel deltas at or above this magnitude (pixels) count as coarse input.
pub const WHEEL_COARSE_THRESHOLD_PX: f64 = 50.0;

/// Per-tick decay applied to zoom momentum velocity.
pub const MOMENTUM_DECAY: f64 = 0.85;

/// Momentum velocity (log-zoom per tick) below which the animation stops.
pub const MOMENTUM_EPSILON: f64 = 1e-3;

// ── Virtualization ──────────────────────────────────────────────

/// Buffer around the viewport, in world units at zoom 1.
pub const CULL_BUFFER: f64 = 300.0;

/// At or below this many entities, culling is an identity pass.
pub const CULL_THRESHOLD: usize = 60;

/// Upper bound on rendered top-level entities once culling is active.
pub const MAX_RENDERED: usize = 200;

// ── Push physics ────────────────────────────────────────────────

/// Extra separation added to every push, in world units.
pub const PUSH_BUFFER: f64 = 10.0;

// ── Hit-testing ─────────────────────────────────────────────────

/// Screen-space hit slop in pixels for resize handles.
pub const HANDLE_RADIUS_PX: f64 = 8.0;

// ── History / persistence ───────────────────────────────────────

/// Maximum number of history entries kept in the ring.
pub const HISTORY_LIMIT: usize = 50;

/// Quiet period after the last mutation before an auto-save fires.
pub const AUTOSAVE_DEBOUNCE_MS: i64 = 2_000;

/// Retries after the first failed save attempt.
pub const AUTOSAVE_MAX_RETRIES: u32 = 3;

/// Base unit for exponential retry back-off (`base * 2^attempt`).
pub const AUTOSAVE_BACKOFF_BASE_MS: i64 = 1_000;
