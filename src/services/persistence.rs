//! Persistence service: runs engine save requests against a profile store.
//!
//! DESIGN
//! ======
//! Each [`SaveRequest`] becomes one spawned task that serializes the
//! snapshot and writes it through the [`ProfileStore`]. The outcome is
//! reported back on a bounded channel tagged with the request's ticket, so
//! the session loop never waits on disk I/O.
//!
//! ERROR HANDLING
//! ==============
//! A failed write is reported, not retried here. Retry timing and the dirty
//! flag belong to the engine's auto-save scheduler, which only clears the
//! flag after it receives a successful outcome for the current generation.

#[cfg(test)]
#[path = "persistence_test.rs"]
mod persistence_test;

use std::sync::Arc;

use canvas::autosave::{SaveOutcome, SaveTicket};
use canvas::engine::SaveRequest;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::services::profile::ProfileStore;

const DEFAULT_COMPLETION_CAPACITY: usize = 16;

/// The result of one save attempt, ready to feed back to the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveCompletion {
    pub ticket: SaveTicket,
    pub outcome: SaveOutcome,
}

/// Spawns save tasks for one profile.
#[derive(Clone)]
pub struct SaveWorker {
    store: Arc<dyn ProfileStore>,
    profile: String,
    done_tx: mpsc::Sender<SaveCompletion>,
}

impl SaveWorker {
    /// A worker for `profile` and the receiver its completions arrive on.
    #[must_use]
    pub fn new(store: Arc<dyn ProfileStore>, profile: impl Into<String>) -> (Self, mpsc::Receiver<SaveCompletion>) {
        let (done_tx, done_rx) = mpsc::channel(DEFAULT_COMPLETION_CAPACITY);
        (Self { store, profile: profile.into(), done_tx }, done_rx)
    }

    #[must_use]
    pub fn profile(&self) -> &str {
        &self.profile
    }

    /// Start writing `request` in the background.
    pub fn submit(&self, request: SaveRequest) -> JoinHandle<()> {
        let store = Arc::clone(&self.store);
        let profile = self.profile.clone();
        let done_tx = self.done_tx.clone();
        tokio::spawn(async move {
            let outcome = write_snapshot(store.as_ref(), &profile, &request).await;
            let completion = SaveCompletion { ticket: request.ticket, outcome };
            if done_tx.send(completion).await.is_err() {
                warn!(profile = %profile, "save completion dropped: session closed");
            }
        })
    }
}

/// Serialize and store one snapshot.
pub async fn write_snapshot(store: &dyn ProfileStore, profile: &str, request: &SaveRequest) -> SaveOutcome {
    let attempt = request.ticket.attempt;
    let text = match request.snapshot.to_json() {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, profile, attempt, "snapshot serialization failed");
            return SaveOutcome::Failed(e.to_string());
        }
    };
    match store.save(profile, &text).await {
        Ok(()) => {
            info!(profile, attempt, generation = request.ticket.generation, "auto-save written");
            SaveOutcome::Saved
        }
        Err(e) => {
            warn!(error = %e, profile, attempt, "auto-save write failed");
            SaveOutcome::Failed(e.to_string())
        }
    }
}
