//! Profile store: named canvas snapshots on disk.
//!
//! DESIGN
//! ======
//! A profile is one snapshot document stored as `<dir>/<profile>.json`.
//! The store moves opaque text; parsing and validation belong to the
//! engine's snapshot module. [`ProfileStore`] is a trait so sessions can be
//! driven against an in-memory or failing store in tests.
//!
//! ERROR HANDLING
//! ==============
//! Writes go to a uniquely named temp file in the same directory and are
//! renamed into place, so a crash mid-write leaves the previous snapshot
//! intact. A missing profile is `Ok(None)`, not an error.

#[cfg(test)]
#[path = "profile_test.rs"]
mod profile_test;

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use rand::Rng;
use rand::distr::Alphanumeric;
use tracing::{debug, info};

const EXTENSION: &str = "json";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("invalid profile name {0:?}: use letters, digits, '-' or '_'")]
    InvalidName(String),
    #[error("profile I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Storage for named snapshot documents.
#[async_trait::async_trait]
pub trait ProfileStore: Send + Sync {
    /// Read a profile, or `None` if it has never been saved.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] for a bad name or an unreadable file.
    async fn load(&self, profile: &str) -> Result<Option<String>, StoreError>;

    /// Replace a profile's contents.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] for a bad name or a failed write.
    async fn save(&self, profile: &str, contents: &str) -> Result<(), StoreError>;

    /// Names of all stored profiles, sorted.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store cannot be enumerated.
    async fn list(&self) -> Result<Vec<String>, StoreError>;
}

/// Profiles as JSON files in one directory.
#[derive(Debug, Clone)]
pub struct FileProfileStore {
    dir: PathBuf,
}

impl FileProfileStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, profile: &str) -> Result<PathBuf, StoreError> {
        validate_name(profile)?;
        Ok(self.dir.join(format!("{profile}.{EXTENSION}")))
    }
}

#[async_trait::async_trait]
impl ProfileStore for FileProfileStore {
    async fn load(&self, profile: &str) -> Result<Option<String>, StoreError> {
        let path = self.path_for(profile)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => {
                debug!(profile, bytes = text.len(), "profile loaded");
                Ok(Some(text))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, profile: &str, contents: &str) -> Result<(), StoreError> {
        let path = self.path_for(profile)?;
        tokio::fs::create_dir_all(&self.dir).await?;

        let suffix: String = rand::rng().sample_iter(&Alphanumeric).take(8).map(char::from).collect();
        let tmp = self.dir.join(format!(".{profile}.{suffix}.tmp"));
        tokio::fs::write(&tmp, contents).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            if let Err(cleanup) = tokio::fs::remove_file(&tmp).await {
                debug!(error = %cleanup, path = %tmp.display(), "temp file cleanup failed");
            }
            return Err(e.into());
        }
        info!(profile, bytes = contents.len(), path = %path.display(), "profile saved");
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>, StoreError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_none_or(|e| e != EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) {
                if validate_name(&stem).is_ok() {
                    names.push(stem);
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

/// Profile names become file names, so keep them to a safe alphabet.
///
/// # Errors
///
/// Returns [`StoreError::InvalidName`] for empty, overlong or unsafe names.
pub fn validate_name(profile: &str) -> Result<(), StoreError> {
    let valid = !profile.is_empty()
        && profile.len() <= 64
        && profile.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid { Ok(()) } else { Err(StoreError::InvalidName(profile.to_owned())) }
}
