//! Cursor persistence for crash-safe resumption
//!
//! One small JSON file per tailed journal file, keyed by a hash of the
//! absolute path. Persistence is best-effort: write failures are swallowed
//! and logged, and an invalid or missing cursor means "start from offset 0".

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Resume point for one journal file.
///
/// `byte_offset` is the first byte not yet consumed into a complete record;
/// the in-memory partial-line buffer is never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cursor {
    pub byte_offset: u64,
    pub line_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_uuid: Option<String>,
}

/// Loads and saves cursors in a process-wide temp directory.
#[derive(Debug)]
pub struct CursorStore {
    dir: PathBuf,
}

impl CursorStore {
    pub fn new() -> Self {
        Self {
            dir: std::env::temp_dir(),
        }
    }

    /// A store rooted at a custom directory (for testing).
    pub fn with_dir(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Cursor file path for a journal file: the first 16 hex chars of the
    /// SHA-256 of the absolute path.
    pub fn path_for(&self, file: &Path) -> PathBuf {
        let mut hasher = Sha256::new();
        hasher.update(file.to_string_lossy().as_bytes());
        let digest = format!("{:x}", hasher.finalize());
        self.dir
            .join(format!("claude-linear-cursor-{}.json", &digest[..16]))
    }

    /// Load the cursor for a file; corrupt or missing files yield `None`.
    pub fn load(&self, file: &Path) -> Option<Cursor> {
        let raw = std::fs::read_to_string(self.path_for(file)).ok()?;
        serde_json::from_str(&raw).ok()
    }

    /// Persist the cursor for a file. Failures are logged and swallowed.
    pub fn save(&self, file: &Path, cursor: &Cursor) {
        let path = self.path_for(file);
        let json = match serde_json::to_string(cursor) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialize cursor");
                return;
            }
        };
        if let Err(e) = std::fs::write(&path, json) {
            tracing::warn!(path = %path.display(), error = %e, "Failed to save cursor");
        }
    }
}

impl Default for CursorStore {
    fn default() -> Self {
        Self::new()
    }
}
