//! Linear undo/redo history of canvas snapshots.
//!
//! The entry under the cursor always mirrors the live state, so undo steps
//! the cursor back and hands out the previous entry, and redo steps it
//! forward. Pushing after an undo discards the forward tail. The oldest
//! entries fall off once the limit is reached.

#[cfg(test)]
#[path = "history_test.rs"]
mod history_test;

use std::collections::VecDeque;

use crate::camera::Viewport;
use crate::consts::HISTORY_LIMIT;
use crate::doc::CanvasState;

/// One recorded state.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub canvas: CanvasState,
    pub viewport: Viewport,
    /// Milliseconds since the epoch at record time.
    pub timestamp: i64,
    /// Human-readable label, e.g. "Move widget".
    pub description: String,
}

/// Bounded undo/redo stack.
#[derive(Debug, Clone)]
pub struct History {
    entries: VecDeque<HistoryEntry>,
    index: usize,
    limit: usize,
    revision: u64,
}

impl Default for History {
    fn default() -> Self {
        Self::new(HISTORY_LIMIT)
    }
}

impl History {
    /// An empty history holding at most `limit` entries (minimum one).
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self { entries: VecDeque::new(), index: 0, limit: limit.max(1), revision: 0 }
    }

    /// A history whose only entry is `initial`.
    #[must_use]
    pub fn seeded(limit: usize, initial: HistoryEntry) -> Self {
        let mut history = Self::new(limit);
        history.entries.push_back(initial);
        history
    }

    /// Drop everything and start over from `initial`.
    pub fn reset(&mut self, initial: HistoryEntry) {
        self.entries.clear();
        self.entries.push_back(initial);
        self.index = 0;
        self.revision += 1;
    }

    /// Record a new state at the cursor, discarding any redo tail.
    pub fn push(&mut self, entry: HistoryEntry) {
        if !self.entries.is_empty() {
            self.entries.truncate(self.index + 1);
        }
        self.entries.push_back(entry);
        while self.entries.len() > self.limit {
            self.entries.pop_front();
        }
        self.index = self.entries.len() - 1;
        self.revision += 1;
    }

    /// Step back one entry and return it, or `None` at the start.
    pub fn undo(&mut self) -> Option<&HistoryEntry> {
        if !self.can_undo() {
            return None;
        }
        self.index -= 1;
        self.revision += 1;
        self.entries.get(self.index)
    }

    /// Step forward one entry and return it, or `None` at the end.
    pub fn redo(&mut self) -> Option<&HistoryEntry> {
        if !self.can_redo() {
            return None;
        }
        self.index += 1;
        self.revision += 1;
        self.entries.get(self.index)
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.index > 0
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.index + 1 < self.entries.len()
    }

    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Bumped on every push, undo, redo and reset.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// The entry under the cursor.
    #[must_use]
    pub fn current(&self) -> Option<&HistoryEntry> {
        self.entries.get(self.index)
    }
}
