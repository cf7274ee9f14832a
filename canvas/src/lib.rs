//! Widget board engine: an infinite, grid-snapped canvas of widgets and
//! widget containers.
//!
//! The crate is pure state and logic. It never touches a clock, a file or a
//! display: hosts feed [`engine::Command`]s into [`engine::EngineCore`] with a
//! timestamp and act on the [`engine::Action`]s that come back, whether that
//! means repainting, changing the cursor or writing a save snapshot.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`engine`] | Command dispatch and the testable [`engine::EngineCore`] |
//! | [`doc`] | Entities, ids and the three-collection canvas state |
//! | [`geom`] | Points, rectangles and grid snapping |
//! | [`camera`] | Viewport transform, zoom limits and zoom momentum |
//! | [`input`] | Input event types and the gesture state machine |
//! | [`interaction`] | Drag/resize preview geometry |
//! | [`hit`] | Hit-testing bodies and resize handles |
//! | [`physics`] | Push resolution after a drop or an add |
//! | [`cull`] | Viewport culling for large canvases |
//! | [`history`] | Bounded undo/redo stack |
//! | [`autosave`] | Debounced save scheduling with retry back-off |
//! | [`snapshot`] | Export/import document and its validation |
//! | [`config`] | Engine tuning knobs |
//! | [`consts`] | Shared numeric constants (zoom limits, grid pitch, timings) |

pub mod autosave;
pub mod camera;
pub mod config;
pub mod consts;
pub mod cull;
pub mod doc;
pub mod engine;
pub mod geom;
pub mod hit;
pub mod history;
pub mod input;
pub mod interaction;
pub mod physics;
pub mod snapshot;
