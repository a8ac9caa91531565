//! Artifact persistence
//!
//! One JSON file per ledger instance:
//!
//! ```text
//! {
//!   "chain": [ { "index", "timestamp", "transactions", "previous_digest", "nonce", "digest" }, ... ],
//!   "pending_transactions": [ ... ]
//! }
//! ```
//!
//! Saves write a sibling temp file and rename it over the artifact, so a
//! failed write never truncates the previous artifact. Loads reconstruct
//! blocks verbatim; nothing is re-sealed.

use crate::{
    error::{Error, Result},
    types::LedgerSnapshot,
};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// JSON file store for a [`LedgerSnapshot`]
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    path: PathBuf,
}

impl ArtifactStore {
    /// Store backed by `path` (created on first save)
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Artifact location
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Overwrite the artifact with `snapshot`
    pub fn save(&self, snapshot: &LedgerSnapshot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| self.storage_error("create directory", e))?;
            }
        }

        let bytes = serde_json::to_vec_pretty(snapshot)?;
        let tmp = self.tmp_path();
        {
            let mut file = fs::File::create(&tmp)
                .map_err(|e| self.storage_error("create temp file", e))?;
            file.write_all(&bytes)
                .and_then(|_| file.sync_all())
                .map_err(|e| self.storage_error("write temp file", e))?;
        }
        fs::rename(&tmp, &self.path).map_err(|e| self.storage_error("replace artifact", e))?;

        tracing::debug!(
            path = %self.path.display(),
            blocks = snapshot.chain.len(),
            pending = snapshot.pending_transactions.len(),
            "Ledger artifact saved"
        );

        Ok(())
    }

    /// Read the artifact
    ///
    /// `Ok(None)` when no artifact exists, `Error::Storage` when it cannot be
    /// read and `Error::Corrupted` when it cannot be parsed.
    pub fn load(&self) -> Result<Option<LedgerSnapshot>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.storage_error("read artifact", e)),
        };

        let snapshot: LedgerSnapshot = serde_json::from_slice(&bytes).map_err(|e| {
            Error::Corrupted(format!("{}: {}", self.path.display(), e))
        })?;

        tracing::debug!(
            path = %self.path.display(),
            blocks = snapshot.chain.len(),
            pending = snapshot.pending_transactions.len(),
            "Ledger artifact loaded"
        );

        Ok(Some(snapshot))
    }

    fn storage_error(&self, action: &str, e: std::io::Error) -> Error {
        Error::Storage(format!("{} {}: {}", action, self.path.display(), e))
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "ledger".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
