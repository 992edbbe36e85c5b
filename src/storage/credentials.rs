//! Durable credential snapshot, so session cookies survive a restart

use crate::pool::Credential;
use crate::storage::traits::{StorageError, StorageResult};
use std::fs;
use std::path::{Path, PathBuf};

/// JSON file holding `[{username, password, cookie?}]`
///
/// The file is rewritten wholesale on every change. Writes go to a sibling
/// temporary file that is then renamed over the snapshot, so a crash never
/// leaves a truncated snapshot behind.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the snapshot; a missing file is an empty snapshot
    pub fn load(&self) -> StorageResult<Vec<Credential>> {
        if !self.path.is_file() {
            return Ok(Vec::new());
        }

        tracing::debug!("Loading cookies from {}", self.path.display());

        let content = fs::read_to_string(&self.path).map_err(|source| StorageError::Read {
            path: self.path.clone(),
            source,
        })?;

        Ok(serde_json::from_str(&content)?)
    }

    /// Replaces the snapshot with `credentials`
    pub fn save(&self, credentials: &[Credential]) -> StorageResult<()> {
        tracing::debug!("Saving cookies to {}", self.path.display());

        let json = serde_json::to_string_pretty(credentials)?;
        let tmp = self.path.with_extension("tmp");

        fs::write(&tmp, json).map_err(|source| StorageError::Write {
            path: tmp.clone(),
            source,
        })?;

        fs::rename(&tmp, &self.path).map_err(|source| StorageError::Write {
            path: self.path.clone(),
            source,
        })
    }
}
