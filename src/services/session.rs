//! Session: one open profile and the engine editing it.
//!
//! DESIGN
//! ======
//! The session owns the [`EngineCore`] and is the only code that touches
//! it. [`Session::run`] multiplexes three sources with `tokio::select!`:
//! incoming commands, the engine's next wake-up (auto-save debounce, retry
//! back-off, momentum frames) and save completions from the worker. Save
//! I/O runs in spawned tasks, so a slow disk never delays a command.
//!
//! Engine time is milliseconds since the epoch, measured on tokio's clock
//! from the moment the session opened. Paused-time tests are therefore
//! deterministic.
//!
//! ERROR HANDLING
//! ==============
//! Only opening can fail. Once open, rejected commands come back as actions
//! and save failures go through the engine's retry schedule.

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use canvas::autosave::SaveStatus;
use canvas::config::EngineConfig;
use canvas::engine::{Action, Command, EngineCore};
use canvas::snapshot::{CanvasSnapshot, SnapshotError};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::services::persistence::{SaveCompletion, SaveWorker};
use crate::services::profile::{ProfileStore, StoreError};

/// Delay between zoom momentum frames.
const FRAME_INTERVAL_MS: i64 = 16;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("stored profile {profile} is unreadable: {source}")]
    Corrupt {
        profile: String,
        #[source]
        source: SnapshotError,
    },
}

pub struct Session {
    core: EngineCore,
    worker: SaveWorker,
    done_rx: mpsc::Receiver<SaveCompletion>,
    observer: Option<mpsc::UnboundedSender<Action>>,
    started: Instant,
    epoch_ms: i64,
    frame_due: Option<i64>,
}

impl Session {
    /// Load `profile` from `store`, or start an empty canvas if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] if the profile can't be read or fails validation.
    pub async fn open(store: Arc<dyn ProfileStore>, profile: &str, config: EngineConfig) -> Result<Self, SessionError> {
        let epoch_ms = wall_clock_ms();
        let core = match store.load(profile).await? {
            Some(text) => {
                let snapshot = CanvasSnapshot::parse(&text, config.zoom)
                    .map_err(|source| SessionError::Corrupt { profile: profile.to_owned(), source })?;
                let (canvas, viewport) = snapshot.into_parts();
                info!(profile, entities = canvas.total_count(), "profile opened");
                EngineCore::with_state(config, canvas, viewport, epoch_ms)
            }
            None => {
                info!(profile, "new profile");
                EngineCore::new(config, epoch_ms)
            }
        };
        let (worker, done_rx) = SaveWorker::new(store, profile);
        Ok(Self { core, worker, done_rx, observer: None, started: Instant::now(), epoch_ms, frame_due: None })
    }

    #[must_use]
    pub fn core(&self) -> &EngineCore {
        &self.core
    }

    #[must_use]
    pub fn profile(&self) -> &str {
        self.worker.profile()
    }

    /// Current engine time.
    #[must_use]
    pub fn now_ms(&self) -> i64 {
        let elapsed = i64::try_from(self.started.elapsed().as_millis()).unwrap_or(i64::MAX);
        self.epoch_ms.saturating_add(elapsed)
    }

    /// Receive a copy of every action from now on.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<Action> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.observer = Some(tx);
        rx
    }

    /// Dispatch one command and route the actions the host must act on.
    pub fn apply(&mut self, command: Command) -> Vec<Action> {
        if matches!(command, Command::Tick) {
            self.frame_due = None;
        }
        let now = self.now_ms();
        let actions = self.core.dispatch(command, now);

        for action in &actions {
            match action {
                Action::SaveRequested(request) => {
                    // Detached: the outcome comes back on `done_rx`.
                    drop(self.worker.submit(request.clone()));
                }
                Action::FrameRequested => self.frame_due = Some(now + FRAME_INTERVAL_MS),
                Action::ImportRejected { reason } => warn!(profile = %self.profile(), reason = %reason, "import rejected"),
                Action::SaveStatusChanged { status } => debug!(profile = %self.profile(), ?status, "save status changed"),
                _ => {}
            }
        }

        let observer_gone = self
            .observer
            .as_ref()
            .is_some_and(|tx| actions.iter().any(|a| tx.send(a.clone()).is_err()));
        if observer_gone {
            self.observer = None;
        }
        actions
    }

    /// Process commands until the sender closes, then flush pending saves.
    pub async fn run(&mut self, mut commands: mpsc::Receiver<Command>) -> SaveStatus {
        loop {
            let sleep = sleep_until(self.next_wake().map(|ms| self.instant_for(ms)));
            tokio::select! {
                maybe = commands.recv() => match maybe {
                    Some(command) => {
                        self.apply(command);
                    }
                    None => break,
                },
                Some(done) = self.done_rx.recv() => self.finish_save(done),
                () = sleep => {
                    self.apply(Command::Tick);
                }
            }
        }
        self.flush().await
    }

    /// Save outstanding changes now, following the retry schedule on failure.
    pub async fn flush(&mut self) -> SaveStatus {
        loop {
            let status = self.core.save_status().clone();
            match status {
                SaveStatus::Pending => {
                    self.apply(Command::Save);
                }
                SaveStatus::Saving { .. } | SaveStatus::Retrying { .. } => self.wait_for_save().await,
                SaveStatus::Idle | SaveStatus::Saved { .. } | SaveStatus::Failed { .. } => {
                    if let SaveStatus::Failed { attempts, message } = &status {
                        warn!(profile = %self.profile(), attempts, error = %message, "unsaved changes remain");
                    }
                    return status;
                }
            }
        }
    }

    async fn wait_for_save(&mut self) {
        let sleep = sleep_until(self.core.next_deadline().map(|ms| self.instant_for(ms)));
        tokio::select! {
            Some(done) = self.done_rx.recv() => self.finish_save(done),
            () = sleep => {
                self.apply(Command::Tick);
            }
        }
    }

    fn finish_save(&mut self, done: SaveCompletion) {
        self.apply(Command::SaveFinished { ticket: done.ticket, outcome: done.outcome });
    }

    fn next_wake(&self) -> Option<i64> {
        match (self.core.next_deadline(), self.frame_due) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    fn instant_for(&self, at_ms: i64) -> Instant {
        let offset = u64::try_from(at_ms.saturating_sub(self.epoch_ms)).unwrap_or(0);
        self.started + Duration::from_millis(offset)
    }
}

/// Sleep until `at`, or forever when there is nothing scheduled.
async fn sleep_until(at: Option<Instant>) {
    match at {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

fn wall_clock_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
}
