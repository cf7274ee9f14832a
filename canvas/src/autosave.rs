//! Debounced auto-save scheduler.
//!
//! DESIGN
//! ======
//! The scheduler does no I/O and owns no timer. Callers report mutations
//! with [`AutoSave::mark_dirty`], ask [`AutoSave::poll`] whether a save is
//! due, perform the write themselves, and report back through
//! [`AutoSave::complete`]. [`AutoSave::next_deadline`] tells an async host
//! how long it may sleep.
//!
//! Each mutation restarts the debounce window. A failed attempt backs off
//! exponentially and retries up to `max_retries` times; after that the cycle
//! is abandoned with a terminal status, and the dirty flag stays set so the
//! next mutation starts a fresh cycle.
//!
//! ERROR HANDLING
//! ==============
//! The dirty flag is cleared only when a save of the latest generation
//! succeeds. A mutation that lands while a save is in flight leaves the
//! flag set, and a new debounce starts once that save completes.

#[cfg(test)]
#[path = "autosave_test.rs"]
mod autosave_test;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::consts::{AUTOSAVE_BACKOFF_BASE_MS, AUTOSAVE_DEBOUNCE_MS, AUTOSAVE_MAX_RETRIES};

/// Largest backoff exponent; keeps the shift from overflowing.
const MAX_BACKOFF_EXPONENT: u32 = 16;

/// Timing for the auto-save cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoSaveConfig {
    /// Quiet period after the last mutation before a save fires.
    pub debounce_ms: i64,
    /// Retries after the first failed attempt.
    pub max_retries: u32,
    /// Retry `n` waits `backoff_base_ms * 2^n`.
    pub backoff_base_ms: i64,
}

impl Default for AutoSaveConfig {
    fn default() -> Self {
        Self {
            debounce_ms: AUTOSAVE_DEBOUNCE_MS,
            max_retries: AUTOSAVE_MAX_RETRIES,
            backoff_base_ms: AUTOSAVE_BACKOFF_BASE_MS,
        }
    }
}

impl AutoSaveConfig {
    /// Delay before retry `n` (1-based).
    #[must_use]
    pub fn backoff_ms(&self, retry: u32) -> i64 {
        let factor = 1_i64 << retry.min(MAX_BACKOFF_EXPONENT);
        self.backoff_base_ms.max(0).saturating_mul(factor)
    }
}

/// Handle for one save attempt. Completions for stale tickets are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveTicket {
    /// Mutation generation captured by this attempt.
    pub generation: u64,
    /// 1-based attempt number within the current cycle.
    pub attempt: u32,
}

/// Result of a save attempt, as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", content = "message", rename_all = "snake_case")]
pub enum SaveOutcome {
    Saved,
    Failed(String),
}

/// User-facing save status.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SaveStatus {
    /// Nothing saved yet in this session and nothing pending.
    #[default]
    Idle,
    /// Waiting for the debounce window to close.
    Pending,
    Saving {
        attempt: u32,
    },
    /// Last attempt failed; another is scheduled.
    Retrying {
        attempt: u32,
        retry_at_ms: i64,
    },
    Saved {
        at_ms: i64,
    },
    /// Retries exhausted. Unsaved changes remain.
    Failed {
        attempts: u32,
        message: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Quiet,
    Debouncing { due: i64 },
    InFlight { ticket: SaveTicket },
    Backoff { attempt: u32, retry_at: i64 },
}

/// The auto-save state machine.
#[derive(Debug, Clone)]
pub struct AutoSave {
    config: AutoSaveConfig,
    phase: Phase,
    status: SaveStatus,
    generation: u64,
    dirty: bool,
}

impl Default for AutoSave {
    fn default() -> Self {
        Self::new(AutoSaveConfig::default())
    }
}

impl AutoSave {
    #[must_use]
    pub fn new(config: AutoSaveConfig) -> Self {
        Self { config, phase: Phase::Quiet, status: SaveStatus::Idle, generation: 0, dirty: false }
    }

    #[must_use]
    pub fn config(&self) -> AutoSaveConfig {
        self.config
    }

    #[must_use]
    pub fn status(&self) -> &SaveStatus {
        &self.status
    }

    /// Unsaved changes exist.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Monotonic mutation counter.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// A save is currently being written.
    #[must_use]
    pub fn in_flight(&self) -> bool {
        matches!(self.phase, Phase::InFlight { .. })
    }

    /// Record a mutation and restart the debounce window.
    pub fn mark_dirty(&mut self, now_ms: i64) {
        self.generation += 1;
        self.dirty = true;
        if self.in_flight() {
            return;
        }
        self.phase = Phase::Debouncing { due: now_ms.saturating_add(self.config.debounce_ms) };
        self.status = SaveStatus::Pending;
    }

    /// Save at the next poll, skipping the debounce window.
    ///
    /// During an in-flight save the request is folded into a follow-up save.
    pub fn request_now(&mut self, now_ms: i64) {
        if self.in_flight() {
            self.generation += 1;
            self.dirty = true;
            return;
        }
        self.phase = Phase::Debouncing { due: now_ms };
        self.status = SaveStatus::Pending;
    }

    /// When the next attempt is due, if one is scheduled.
    #[must_use]
    pub fn next_deadline(&self) -> Option<i64> {
        match self.phase {
            Phase::Debouncing { due } => Some(due),
            Phase::Backoff { retry_at, .. } => Some(retry_at),
            Phase::Quiet | Phase::InFlight { .. } => None,
        }
    }

    /// Start a save attempt if one is due at `now_ms`.
    pub fn poll(&mut self, now_ms: i64) -> Option<SaveTicket> {
        let attempt = match self.phase {
            Phase::Debouncing { due } if now_ms >= due => 1,
            Phase::Backoff { attempt, retry_at } if now_ms >= retry_at => attempt,
            _ => return None,
        };
        let ticket = SaveTicket { generation: self.generation, attempt };
        self.phase = Phase::InFlight { ticket };
        self.status = SaveStatus::Saving { attempt };
        debug!(generation = ticket.generation, attempt, "auto-save attempt started");
        Some(ticket)
    }

    /// Report the outcome of `ticket`. Returns `false` for a stale ticket.
    pub fn complete(&mut self, ticket: SaveTicket, outcome: SaveOutcome, now_ms: i64) -> bool {
        if self.phase != (Phase::InFlight { ticket }) {
            debug!(generation = ticket.generation, attempt = ticket.attempt, "ignoring stale save completion");
            return false;
        }

        match outcome {
            SaveOutcome::Saved if ticket.generation == self.generation => {
                self.dirty = false;
                self.phase = Phase::Quiet;
                self.status = SaveStatus::Saved { at_ms: now_ms };
            }
            SaveOutcome::Saved => {
                // Mutated mid-write; what landed on disk is already stale.
                self.phase = Phase::Debouncing { due: now_ms.saturating_add(self.config.debounce_ms) };
                self.status = SaveStatus::Pending;
            }
            SaveOutcome::Failed(message) if ticket.attempt <= self.config.max_retries => {
                let retry_at = now_ms.saturating_add(self.config.backoff_ms(ticket.attempt));
                let attempt = ticket.attempt + 1;
                warn!(attempt = ticket.attempt, retry_at_ms = retry_at, error = %message, "auto-save failed; retrying");
                self.phase = Phase::Backoff { attempt, retry_at };
                self.status = SaveStatus::Retrying { attempt, retry_at_ms: retry_at };
            }
            SaveOutcome::Failed(message) => {
                warn!(attempts = ticket.attempt, error = %message, "auto-save failed; retries exhausted");
                self.phase = Phase::Quiet;
                self.status = SaveStatus::Failed { attempts: ticket.attempt, message };
            }
        }
        true
    }
}
