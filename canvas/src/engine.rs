//! Engine core: the single owner of canvas, viewport and gesture state.
//!
//! DESIGN
//! ======
//! Every mutation enters through [`EngineCore::dispatch`] as a [`Command`]
//! and comes back as a list of [`Action`]s for the host to apply: render
//! requests, cursor changes, persistence requests and the notification side
//! channel. Commands are plain data, so a recorded script replays to the same
//! state.
//!
//! Drag and resize previews live in the active [`Interaction`]; canonical
//! canvas state only changes on commit. [`EngineCore::render_list`] overlays
//! the preview for renderers.
//!
//! ERROR HANDLING
//! ==============
//! Invalid operations (stale ids, a second gesture, undo mid-drag) are
//! refused with an empty action list and a `debug!` line. Malformed imports
//! surface as [`Action::ImportRejected`] and leave state untouched.

#[cfg(test)]
#[path = "engine_test.rs"]
mod engine_test;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::autosave::{AutoSave, SaveOutcome, SaveStatus, SaveTicket};
use crate::camera::{Viewport, ZoomMomentum, is_coarse, wheel_zoom_factor};
use crate::config::EngineConfig;
use crate::cull::cull;
use crate::doc::{CanvasState, Entity, EntityId};
use crate::geom::{Point, Rect, Size, snap};
use crate::history::{History, HistoryEntry};
use crate::hit::{Hit, HitPart, ResizeAnchor, hit_test};
use crate::input::{Button, InputState, Key, Modifiers, UiState, WheelDelta};
use crate::interaction::{Interaction, Mode, clamp_origin, min_size};
use crate::physics::resolve_push_with_buffer;
use crate::snapshot::CanvasSnapshot;

const CURSOR_DEFAULT: &str = "default";
const CURSOR_MOVE: &str = "move";
const CURSOR_GRABBING: &str = "grabbing";

/// Inputs to the engine. Everything that changes engine state is one of these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    PointerDown {
        screen: Point,
        button: Button,
        #[serde(default)]
        modifiers: Modifiers,
    },
    PointerMove {
        screen: Point,
        #[serde(default)]
        modifiers: Modifiers,
    },
    PointerUp {
        screen: Point,
        #[serde(default)]
        modifiers: Modifiers,
    },
    /// Pointer capture lost.
    PointerCancel,
    Wheel {
        screen: Point,
        delta: WheelDelta,
        #[serde(default)]
        modifiers: Modifiers,
    },
    KeyDown {
        key: Key,
        #[serde(default)]
        modifiers: Modifiers,
    },
    /// Pan by a screen-space delta.
    PanBy { dx: f64, dy: f64 },
    /// Zoom by `factor` keeping the world point under `screen` fixed.
    ZoomAt { screen: Point, factor: f64 },
    ResetView,
    SetContainerSize { width: f64, height: f64 },
    /// Start dragging `id` with the pointer at screen position `pointer`.
    StartDrag { id: EntityId, pointer: Point },
    StartResize { id: EntityId, anchor: ResizeAnchor, pointer: Point },
    /// Commit the active interaction at its current preview.
    Commit,
    Cancel,
    AddWidget {
        widget_type: String,
        rect: Rect,
        #[serde(default)]
        id: Option<EntityId>,
    },
    AddNest {
        title: String,
        rect: Rect,
        #[serde(default)]
        id: Option<EntityId>,
    },
    /// Add a widget inside `parent`; `rect` is relative to the container.
    AddNested {
        parent: EntityId,
        widget_type: String,
        rect: Rect,
        #[serde(default)]
        id: Option<EntityId>,
    },
    Remove { id: EntityId },
    Undo,
    Redo,
    /// Record the current canvas as a labelled history checkpoint.
    AddHistoryEntry { description: String },
    /// Save now instead of waiting for the debounce window.
    Save,
    /// Replace the canvas with a snapshot document.
    Import { text: String },
    /// Animation frame / timer tick.
    Tick,
    /// Host report for a [`SaveRequest`].
    SaveFinished { ticket: SaveTicket, outcome: SaveOutcome },
}

/// A snapshot for the host to write, tagged so the outcome can be reported back.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SaveRequest {
    pub ticket: SaveTicket,
    pub snapshot: CanvasSnapshot,
}

/// Outputs from [`EngineCore::dispatch`] for the host to process.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    /// Committed geometry of an entity changed (local coordinates).
    GeometryChanged { id: EntityId, rect: Rect },
    /// Push physics moved an entity out of the way.
    EntityPushed { id: EntityId, rect: Rect, chain_depth: usize },
    EntityAdded { entity: Entity },
    EntityRemoved { id: EntityId },
    /// The whole canvas was replaced (undo, redo, import).
    StateReplaced,
    ViewportChanged { viewport: Viewport },
    SelectionChanged { id: Option<EntityId> },
    InteractionCancelled { id: EntityId },
    HistoryChanged { index: usize, len: usize },
    /// Entity count changed; advisory.
    CountChanged { total: usize },
    SaveRequested(SaveRequest),
    SaveStatusChanged { status: SaveStatus },
    ImportRejected { reason: String },
    SetCursor { cursor: String },
    /// Momentum needs another [`Command::Tick`] next frame.
    FrameRequested,
    RenderNeeded,
}

/// One entity as the renderer should draw it.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderItem<'a> {
    pub entity: &'a Entity,
    /// Geometry with any active preview applied, in the entity's own frame.
    pub rect: Rect,
    /// `rect` in world coordinates.
    pub world: Rect,
    /// Target of the active drag/resize.
    pub active: bool,
}

/// Output of [`EngineCore::render_list`].
#[derive(Debug, Clone, PartialEq)]
pub struct RenderList<'a> {
    pub items: Vec<RenderItem<'a>>,
    pub total_count: usize,
    pub rendered_count: usize,
}

/// Observable state captured before a command, diffed after it.
struct Observed {
    viewport: Viewport,
    selected: Option<EntityId>,
    count: usize,
    history_revision: u64,
    status: SaveStatus,
}

/// Core engine state. No I/O and no clock: time arrives with each command.
#[derive(Debug, Clone)]
pub struct EngineCore {
    canvas: CanvasState,
    viewport: Viewport,
    ui: UiState,
    input: InputState,
    container: Size,
    cursor: String,
    config: EngineConfig,
    history: History,
    autosave: AutoSave,
    momentum: ZoomMomentum,
}

impl Default for EngineCore {
    fn default() -> Self {
        Self::new(EngineConfig::default(), 0)
    }
}

impl EngineCore {
    /// An empty canvas.
    #[must_use]
    pub fn new(config: EngineConfig, now_ms: i64) -> Self {
        let config = config.sanitized();
        Self::with_state(config, CanvasState::new(config.grid_size), Viewport::default(), now_ms)
    }

    /// Start from existing state, e.g. a loaded profile. History starts fresh.
    #[must_use]
    pub fn with_state(config: EngineConfig, canvas: CanvasState, viewport: Viewport, now_ms: i64) -> Self {
        let config = config.sanitized();
        let viewport = Viewport { zoom: config.zoom.clamp(viewport.zoom), ..viewport };
        let initial = HistoryEntry {
            canvas: canvas.clone(),
            viewport,
            timestamp: now_ms,
            description: "Initial state".to_owned(),
        };
        Self {
            canvas,
            viewport,
            ui: UiState::default(),
            input: InputState::default(),
            container: Size::default(),
            cursor: CURSOR_DEFAULT.to_owned(),
            config,
            history: History::seeded(config.history_limit, initial),
            autosave: AutoSave::new(config.autosave),
            momentum: ZoomMomentum::default(),
        }
    }

    // --- Queries ---

    #[must_use]
    pub fn canvas(&self) -> &CanvasState {
        &self.canvas
    }

    #[must_use]
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    #[must_use]
    pub fn selection(&self) -> Option<&EntityId> {
        self.ui.selected_id.as_ref()
    }

    #[must_use]
    pub fn input(&self) -> &InputState {
        &self.input
    }

    #[must_use]
    pub fn container(&self) -> Size {
        self.container
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn history(&self) -> &History {
        &self.history
    }

    #[must_use]
    pub fn save_status(&self) -> &SaveStatus {
        self.autosave.status()
    }

    /// Unsaved changes exist.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.autosave.is_dirty()
    }

    /// When the host should next send [`Command::Tick`] for auto-save.
    #[must_use]
    pub fn next_deadline(&self) -> Option<i64> {
        self.autosave.next_deadline()
    }

    /// Zoom momentum is still coasting.
    #[must_use]
    pub fn momentum_active(&self) -> bool {
        self.momentum.is_active()
    }

    /// Committed state as an export document.
    #[must_use]
    pub fn export_snapshot(&self, now_ms: i64) -> CanvasSnapshot {
        CanvasSnapshot::capture(&self.canvas, &self.viewport, now_ms)
    }

    /// Culled entities for the current viewport, with the active preview applied.
    #[must_use]
    pub fn render_list(&self) -> RenderList<'_> {
        let active = match &self.input {
            InputState::Active(interaction) => Some(interaction),
            _ => None,
        };
        let culled = cull(&self.canvas, &self.viewport, self.container, &self.config.cull, active.map(|i| &i.active_id));
        let local = |entity: &Entity| match active {
            Some(i) if i.active_id == entity.id => i.current,
            _ => entity.rect(),
        };

        let items = culled
            .visible
            .iter()
            .map(|&entity| {
                let rect = local(entity);
                let world = match entity.parent_nest_id.as_ref().and_then(|p| self.canvas.get(p)) {
                    Some(parent) => {
                        // Children ride along with a dragged container but stay put while it resizes.
                        let origin = match active {
                            Some(i) if i.active_id == parent.id && i.mode == Mode::Drag => i.current,
                            _ => parent.rect(),
                        };
                        rect.offset(origin.x, origin.y)
                    }
                    None => rect,
                };
                RenderItem { entity, rect, world, active: active.is_some_and(|i| i.active_id == entity.id) }
            })
            .collect();

        RenderList { items, total_count: culled.total_count, rendered_count: culled.rendered_count }
    }

    // --- Dispatch ---

    /// Apply one command at time `now_ms` and return what the host should do.
    pub fn dispatch(&mut self, command: Command, now_ms: i64) -> Vec<Action> {
        let before = self.observe();
        let actions = match command {
            Command::PointerDown { screen, button, .. } => self.on_pointer_down(screen, button),
            Command::PointerMove { screen, .. } => self.on_pointer_move(screen),
            Command::PointerUp { screen, .. } => self.on_pointer_up(screen, now_ms),
            Command::PointerCancel | Command::Cancel => self.cancel(),
            Command::Wheel { screen, delta, .. } => self.on_wheel(screen, delta),
            Command::KeyDown { key, modifiers } => self.on_key_down(&key, modifiers, now_ms),
            Command::PanBy { dx, dy } => {
                self.viewport.pan(dx, dy);
                Vec::new()
            }
            Command::ZoomAt { screen, factor } => {
                if factor.is_finite() && factor > 0.0 {
                    self.viewport.zoom_at(screen, factor, self.config.zoom);
                }
                Vec::new()
            }
            Command::ResetView => self.reset_view(),
            Command::SetContainerSize { width, height } => {
                self.container = Size::new(width.max(0.0), height.max(0.0));
                vec![Action::RenderNeeded]
            }
            Command::StartDrag { id, pointer } => {
                let world = self.viewport.screen_to_world(pointer);
                self.begin(&id, Mode::Drag, world)
            }
            Command::StartResize { id, anchor, pointer } => {
                let world = self.viewport.screen_to_world(pointer);
                self.begin(&id, Mode::Resize(anchor), world)
            }
            Command::Commit => self.commit(now_ms),
            Command::AddWidget { widget_type, rect, id } => match self.placement(rect, None) {
                Some(rect) => self.add(with_id(Entity::widget(widget_type, rect, now_ms), id), now_ms),
                None => Vec::new(),
            },
            Command::AddNest { title, rect, id } => match self.placement(rect, None) {
                Some(rect) => self.add(with_id(Entity::nest(title, rect, now_ms), id), now_ms),
                None => Vec::new(),
            },
            Command::AddNested { parent, widget_type, rect, id } => match self.placement(rect, Some(&parent)) {
                Some(rect) => self.add(with_id(Entity::nested(parent, widget_type, rect, now_ms), id), now_ms),
                None => Vec::new(),
            },
            Command::Remove { id } => self.remove(&id, now_ms),
            Command::Undo => self.undo(now_ms),
            Command::Redo => self.redo(now_ms),
            Command::AddHistoryEntry { description } => self.add_history_entry(&description, now_ms),
            Command::Save => {
                self.autosave.request_now(now_ms);
                Vec::new()
            }
            Command::Import { text } => self.import(&text, now_ms),
            Command::Tick => self.step_momentum(),
            Command::SaveFinished { ticket, outcome } => {
                self.autosave.complete(ticket, outcome, now_ms);
                Vec::new()
            }
        };
        self.finish(before, actions, now_ms)
    }

    fn observe(&self) -> Observed {
        Observed {
            viewport: self.viewport,
            selected: self.ui.selected_id.clone(),
            count: self.canvas.total_count(),
            history_revision: self.history.revision(),
            status: self.autosave.status().clone(),
        }
    }

    /// Append the side-channel notifications implied by what changed, and
    /// start a save if one is due.
    fn finish(&mut self, before: Observed, mut actions: Vec<Action>, now_ms: i64) -> Vec<Action> {
        let mut render = false;
        actions.retain(|a| {
            let is_render = matches!(a, Action::RenderNeeded);
            render |= is_render;
            !is_render
        });

        if self.viewport != before.viewport {
            actions.push(Action::ViewportChanged { viewport: self.viewport });
            render = true;
        }
        if self.ui.selected_id != before.selected {
            actions.push(Action::SelectionChanged { id: self.ui.selected_id.clone() });
            render = true;
        }
        let total = self.canvas.total_count();
        if total != before.count {
            actions.push(Action::CountChanged { total });
        }
        if self.history.revision() != before.history_revision {
            actions.push(Action::HistoryChanged { index: self.history.index(), len: self.history.len() });
        }
        if let Some(ticket) = self.autosave.poll(now_ms) {
            let snapshot = self.export_snapshot(now_ms);
            actions.push(Action::SaveRequested(SaveRequest { ticket, snapshot }));
        }
        if *self.autosave.status() != before.status {
            actions.push(Action::SaveStatusChanged { status: self.autosave.status().clone() });
        }
        if render {
            actions.push(Action::RenderNeeded);
        }
        actions
    }

    // --- Pointer ---

    fn on_pointer_down(&mut self, screen: Point, button: Button) -> Vec<Action> {
        if !self.input.is_idle() {
            debug!("pointer-down ignored: gesture already in progress");
            return Vec::new();
        }
        match button {
            Button::Middle => self.start_pan(screen),
            Button::Secondary => Vec::new(),
            Button::Primary => {
                self.momentum.stop();
                let world = self.viewport.screen_to_world(screen);
                match hit_test(world, &self.canvas, &self.viewport, self.ui.selected_id.as_ref()) {
                    Some(Hit { id, part: HitPart::ResizeHandle(anchor) }) => self.begin(&id, Mode::Resize(anchor), world),
                    Some(Hit { id, part: HitPart::Body }) => self.begin(&id, Mode::Drag, world),
                    None => {
                        self.ui.selected_id = None;
                        self.start_pan(screen)
                    }
                }
            }
        }
    }

    fn on_pointer_move(&mut self, screen: Point) -> Vec<Action> {
        match &mut self.input {
            InputState::Panning { last_screen } => {
                let (dx, dy) = (screen.x - last_screen.x, screen.y - last_screen.y);
                *last_screen = screen;
                self.viewport.pan(dx, dy);
                Vec::new()
            }
            InputState::Active(interaction) => {
                let world = self.viewport.screen_to_world(screen);
                if interaction.update(world, self.canvas.grid_size) {
                    vec![Action::RenderNeeded]
                } else {
                    Vec::new()
                }
            }
            InputState::Idle => self.hover(screen),
        }
    }

    fn on_pointer_up(&mut self, screen: Point, now_ms: i64) -> Vec<Action> {
        match &mut self.input {
            InputState::Panning { .. } => {
                self.input = InputState::Idle;
                let mut actions = Vec::new();
                self.set_cursor(CURSOR_DEFAULT, &mut actions);
                actions
            }
            InputState::Active(interaction) => {
                let world = self.viewport.screen_to_world(screen);
                interaction.update(world, self.canvas.grid_size);
                self.commit(now_ms)
            }
            InputState::Idle => Vec::new(),
        }
    }

    fn hover(&mut self, screen: Point) -> Vec<Action> {
        let world = self.viewport.screen_to_world(screen);
        let cursor = match hit_test(world, &self.canvas, &self.viewport, self.ui.selected_id.as_ref()) {
            Some(Hit { part: HitPart::ResizeHandle(anchor), .. }) => anchor.cursor(),
            Some(Hit { part: HitPart::Body, .. }) => CURSOR_MOVE,
            None => CURSOR_DEFAULT,
        };
        let mut actions = Vec::new();
        self.set_cursor(cursor, &mut actions);
        actions
    }

    fn start_pan(&mut self, screen: Point) -> Vec<Action> {
        self.input = InputState::Panning { last_screen: screen };
        let mut actions = Vec::new();
        self.set_cursor(CURSOR_GRABBING, &mut actions);
        actions
    }

    fn set_cursor(&mut self, cursor: &str, actions: &mut Vec<Action>) {
        if self.cursor != cursor {
            cursor.clone_into(&mut self.cursor);
            actions.push(Action::SetCursor { cursor: cursor.to_owned() });
        }
    }

    // --- Interaction ---

    /// `Idle -> Active`. Refused for stale ids or while another gesture runs.
    fn begin(&mut self, id: &EntityId, mode: Mode, pointer_world: Point) -> Vec<Action> {
        if !self.input.is_idle() {
            debug!(id = %id, "interaction refused: another gesture is active");
            return Vec::new();
        }
        let Some(entity) = self.canvas.get(id) else {
            debug!(id = %id, "interaction refused: unknown entity");
            return Vec::new();
        };
        let bounds = entity.parent_nest_id.as_ref().and_then(|p| self.canvas.interior_of(p));
        let interaction = Interaction::begin(entity, mode, pointer_world, bounds);
        let cursor = match mode {
            Mode::Drag => CURSOR_MOVE,
            Mode::Resize(anchor) => anchor.cursor(),
        };

        self.input = InputState::Active(interaction);
        self.ui.selected_id = Some(id.clone());
        let mut actions = Vec::new();
        self.set_cursor(cursor, &mut actions);
        actions.push(Action::RenderNeeded);
        actions
    }

    /// `Active -> Committed -> Idle`: store the preview, push neighbours
    /// out of the way after a drag, and record history.
    fn commit(&mut self, now_ms: i64) -> Vec<Action> {
        let InputState::Active(interaction) = std::mem::take(&mut self.input) else {
            return Vec::new();
        };
        let mut actions = vec![Action::RenderNeeded];
        self.set_cursor(CURSOR_DEFAULT, &mut actions);
        if !interaction.has_moved() {
            return actions;
        }

        let id = interaction.active_id.clone();
        let Some(before) = self.canvas.get(&id).map(Entity::rect) else {
            debug!(id = %id, "commit dropped: entity no longer exists");
            return actions;
        };
        if !self.canvas.set_rect(&id, interaction.current, now_ms) {
            debug!(id = %id, "commit dropped: entity no longer exists");
            return actions;
        }
        actions.push(Action::GeometryChanged { id: id.clone(), rect: interaction.current });
        match interaction.mode {
            Mode::Drag => self.settle(&id, now_ms, &mut actions),
            Mode::Resize(_) => {
                let shift = (interaction.current.x - before.x, interaction.current.y - before.y);
                self.fit_children(&id, shift, now_ms, &mut actions);
            }
        }

        let description = interaction.description();
        debug!(id = %id, description = %description, "interaction committed");
        self.record(&description, now_ms);
        actions
    }

    /// `Active -> Cancelled -> Idle`. Canvas state is untouched.
    fn cancel(&mut self) -> Vec<Action> {
        let mut actions = Vec::new();
        match std::mem::take(&mut self.input) {
            InputState::Active(interaction) => {
                debug!(id = %interaction.active_id, "interaction cancelled");
                actions.push(Action::InteractionCancelled { id: interaction.active_id });
                actions.push(Action::RenderNeeded);
            }
            InputState::Panning { .. } | InputState::Idle => {}
        }
        self.set_cursor(CURSOR_DEFAULT, &mut actions);
        actions
    }

    /// Push physics for an entity that just landed at its current position.
    fn settle(&mut self, id: &EntityId, now_ms: i64, actions: &mut Vec<Action>) {
        let Some(moved) = self.canvas.get(id).cloned() else {
            return;
        };
        let bounds = moved.parent_nest_id.as_ref().and_then(|p| self.canvas.interior_of(p));
        let peers = self.canvas.peers_of(id);
        let pushed = resolve_push_with_buffer(&moved, &peers, self.canvas.grid_size, bounds, self.config.push_buffer);
        for p in pushed {
            let rect = p.entity.rect();
            if self.canvas.set_rect(&p.entity.id, rect, now_ms) {
                actions.push(Action::EntityPushed { id: p.entity.id, rect, chain_depth: p.chain_depth });
            }
        }
    }

    /// Keep a resized container's children where they were in world space,
    /// then inside its new interior. `shift` is how far the origin moved.
    fn fit_children(&mut self, nest_id: &EntityId, shift: (f64, f64), now_ms: i64, actions: &mut Vec<Action>) {
        let Some(interior) = self.canvas.interior_of(nest_id) else {
            return;
        };
        let moves: Vec<(EntityId, Rect)> = self
            .canvas
            .children_of(nest_id)
            .filter_map(|child| {
                let fitted = clamp_origin(child.rect().offset(-shift.0, -shift.1), &interior);
                (fitted != child.rect()).then(|| (child.id.clone(), fitted))
            })
            .collect();
        for (id, rect) in moves {
            if self.canvas.set_rect(&id, rect, now_ms) {
                actions.push(Action::GeometryChanged { id, rect });
            }
        }
    }

    // --- Viewport ---

    fn on_wheel(&mut self, screen: Point, delta: WheelDelta) -> Vec<Action> {
        if delta.dy == 0.0 {
            if delta.dx != 0.0 {
                self.viewport.pan(-delta.dx, 0.0);
            }
            return Vec::new();
        }
        let factor = wheel_zoom_factor(delta);
        if self.config.momentum && is_coarse(delta) {
            self.momentum.impulse(screen, factor);
            return self.step_momentum();
        }
        self.viewport.zoom_at(screen, factor, self.config.zoom);
        Vec::new()
    }

    fn step_momentum(&mut self) -> Vec<Action> {
        if self.momentum.is_active() && self.momentum.tick(&mut self.viewport, self.config.zoom) {
            vec![Action::FrameRequested]
        } else {
            Vec::new()
        }
    }

    fn reset_view(&mut self) -> Vec<Action> {
        self.momentum.stop();
        self.viewport.reset();
        Vec::new()
    }

    // --- Keyboard ---

    fn on_key_down(&mut self, key: &Key, modifiers: Modifiers, now_ms: i64) -> Vec<Action> {
        if key.is("Escape") {
            return self.cancel();
        }
        if modifiers.command() {
            if key.is("z") {
                return if modifiers.shift { self.redo(now_ms) } else { self.undo(now_ms) };
            }
            if key.is("y") {
                return self.redo(now_ms);
            }
            if key.is("s") {
                self.autosave.request_now(now_ms);
            } else if key.is("0") {
                return self.reset_view();
            }
            return Vec::new();
        }
        if key.is("Delete") || key.is("Backspace") {
            if let Some(id) = self.ui.selected_id.clone() {
                return self.remove(&id, now_ms);
            }
        }
        Vec::new()
    }

    // --- Add / remove ---

    /// Snap a requested box to the grid, fitting it inside `parent` if given.
    fn placement(&self, rect: Rect, parent: Option<&EntityId>) -> Option<Rect> {
        let finite = rect.x.is_finite() && rect.y.is_finite() && rect.w.is_finite() && rect.h.is_finite();
        if !finite || rect.w <= 0.0 || rect.h <= 0.0 {
            debug!(?rect, "add refused: invalid geometry");
            return None;
        }
        let grid = self.canvas.grid_size;
        let min = min_size(grid);
        let snapped = Rect::new(snap(rect.x, grid), snap(rect.y, grid), snap(rect.w, grid).max(min), snap(rect.h, grid).max(min));
        match parent {
            None => Some(snapped),
            Some(parent) => match self.canvas.interior_of(parent) {
                Some(interior) => Some(clamp_origin(snapped, &interior)),
                None => {
                    debug!(parent = %parent, "add refused: unknown container");
                    None
                }
            },
        }
    }

    fn add(&mut self, entity: Entity, now_ms: i64) -> Vec<Action> {
        let id = entity.id.clone();
        let description = format!("Add {}", entity.tag().label());
        let inserted = if entity.is_nest() {
            self.canvas.insert_nest(entity.clone())
        } else if entity.parent_nest_id.is_some() {
            self.canvas.insert_nested(entity.clone())
        } else {
            self.canvas.insert_widget(entity.clone())
        };
        if !inserted {
            debug!(id = %id, "add refused: duplicate id or missing container");
            return Vec::new();
        }

        let mut actions = vec![Action::EntityAdded { entity }, Action::RenderNeeded];
        self.settle(&id, now_ms, &mut actions);
        self.record(&description, now_ms);
        actions
    }

    fn remove(&mut self, id: &EntityId, now_ms: i64) -> Vec<Action> {
        if self.input.active_id().is_some() {
            debug!(id = %id, "remove refused: interaction active");
            return Vec::new();
        }
        let removed = self.canvas.remove(id);
        let Some(first) = removed.first() else {
            debug!(id = %id, "remove refused: unknown entity");
            return Vec::new();
        };
        let description = format!("Remove {}", first.tag().label());
        if self.ui.selected_id.as_ref().is_some_and(|sel| removed.iter().any(|e| &e.id == sel)) {
            self.ui.selected_id = None;
        }

        let mut actions: Vec<Action> = removed.into_iter().map(|e| Action::EntityRemoved { id: e.id }).collect();
        actions.push(Action::RenderNeeded);
        self.record(&description, now_ms);
        actions
    }

    // --- History ---

    /// Record the current canvas as a new history entry, unless it is
    /// already the entry under the cursor.
    fn record(&mut self, description: &str, now_ms: i64) {
        if self.history.current().is_some_and(|entry| entry.canvas == self.canvas) {
            return;
        }
        self.push_history(description, now_ms);
        self.autosave.mark_dirty(now_ms);
    }

    /// Host-requested checkpoint. Always appends, even when nothing changed,
    /// so the label shows up in history. Refused mid-gesture.
    fn add_history_entry(&mut self, description: &str, now_ms: i64) -> Vec<Action> {
        if self.input.active_id().is_some() {
            debug!(description, "history entry refused: interaction active");
            return Vec::new();
        }
        self.push_history(description, now_ms);
        Vec::new()
    }

    fn push_history(&mut self, description: &str, now_ms: i64) {
        self.history.push(HistoryEntry {
            canvas: self.canvas.clone(),
            viewport: self.viewport,
            timestamp: now_ms,
            description: description.to_owned(),
        });
    }

    fn undo(&mut self, now_ms: i64) -> Vec<Action> {
        if self.input.active_id().is_some() {
            debug!("undo refused: interaction active");
            return Vec::new();
        }
        match self.history.undo().map(|entry| entry.canvas.clone()) {
            Some(canvas) => self.restore(canvas, now_ms),
            None => Vec::new(),
        }
    }

    fn redo(&mut self, now_ms: i64) -> Vec<Action> {
        if self.input.active_id().is_some() {
            debug!("redo refused: interaction active");
            return Vec::new();
        }
        match self.history.redo().map(|entry| entry.canvas.clone()) {
            Some(canvas) => self.restore(canvas, now_ms),
            None => Vec::new(),
        }
    }

    fn restore(&mut self, canvas: CanvasState, now_ms: i64) -> Vec<Action> {
        self.canvas = canvas;
        if self.ui.selected_id.as_ref().is_some_and(|id| self.canvas.get(id).is_none()) {
            self.ui.selected_id = None;
        }
        self.autosave.mark_dirty(now_ms);
        vec![Action::StateReplaced, Action::RenderNeeded]
    }

    // --- Import ---

    fn import(&mut self, text: &str, now_ms: i64) -> Vec<Action> {
        let snapshot = match CanvasSnapshot::parse(text, self.config.zoom) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(error = %err, "snapshot import rejected");
                return vec![Action::ImportRejected { reason: err.to_string() }];
            }
        };

        let mut actions = self.cancel();
        let (canvas, viewport) = snapshot.into_parts();
        info!(entities = canvas.total_count(), grid_size = canvas.grid_size, "snapshot imported");
        self.canvas = canvas;
        self.viewport = viewport;
        self.momentum.stop();
        self.ui.selected_id = None;
        self.record("Import snapshot", now_ms);
        actions.push(Action::StateReplaced);
        actions.push(Action::RenderNeeded);
        actions
    }
}

fn with_id(mut entity: Entity, id: Option<EntityId>) -> Entity {
    if let Some(id) = id {
        entity.id = id;
    }
    entity
}
