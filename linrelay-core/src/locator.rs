//! Session-file discovery and successor scanning
//!
//! The initial journal is found by globbing the agent's project directory
//! for `*/{sessionId}.jsonl`. After that, sibling journal files whose first
//! records reference a known session id are adopted as successors of the
//! same logical session.

use std::collections::HashSet;
use std::ffi::OsStr;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tokio::time::{Duration, Instant};

/// Journal basenames are UUID-shaped.
static JOURNAL_FILE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}\.jsonl$").unwrap()
});

/// Successor scans fire at most this often.
pub const SCAN_INTERVAL: Duration = Duration::from_secs(3);

/// How much of a candidate's head is examined for a linking session id.
const SCAN_HEAD_BYTES: u64 = 32 * 1024;
const SCAN_HEAD_LINES: usize = 5;

/// Find the journal file for a session under the projects directory.
///
/// Returns the first `*/{sessionId}.jsonl` match, or `None` when the agent
/// has not created it yet.
pub fn find_session_file(projects_dir: &Path, session_id: &str) -> Option<PathBuf> {
    let pattern = projects_dir
        .join("*")
        .join(format!("{session_id}.jsonl"));
    glob::glob(&pattern.to_string_lossy())
        .ok()?
        .flatten()
        .next()
}

/// Discovers sibling journal files linked to a known session.
///
/// Files are examined once, match or not; a file that only later gains a
/// linking session id is missed. Known limitation.
#[derive(Debug)]
pub struct SuccessorScanner {
    dir: PathBuf,
    checked: HashSet<PathBuf>,
    last_scan: Option<Instant>,
}

impl SuccessorScanner {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            checked: HashSet::new(),
            last_scan: None,
        }
    }

    /// Exclude a file from future scans (the initially tailed journal).
    pub fn mark_checked(&mut self, path: &Path) {
        self.checked.insert(path.to_path_buf());
    }

    /// Scan the directory for adoptable successors, throttled to
    /// [`SCAN_INTERVAL`]. Returns the files to start tailing.
    pub fn scan(&mut self, sessions: &HashSet<String>) -> Vec<PathBuf> {
        if let Some(last) = self.last_scan {
            if last.elapsed() < SCAN_INTERVAL {
                return Vec::new();
            }
        }
        self.last_scan = Some(Instant::now());

        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(dir = %self.dir.display(), error = %e, "Successor scan failed");
                return Vec::new();
            }
        };

        let mut adopted = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            let Some(name) = path.file_name().and_then(OsStr::to_str) else {
                continue;
            };
            if !JOURNAL_FILE_NAME.is_match(name) {
                continue;
            }
            if !self.checked.insert(path.clone()) {
                continue;
            }
            if links_known_session(&path, sessions) {
                adopted.push(path);
            }
        }
        adopted
    }
}

/// Whether any of the first few records carries a known session id.
/// Unreadable candidates are treated as non-matches (and stay checked).
fn links_known_session(path: &Path, sessions: &HashSet<String>) -> bool {
    let Ok(file) = File::open(path) else {
        return false;
    };
    let mut head = Vec::new();
    if file.take(SCAN_HEAD_BYTES).read_to_end(&mut head).is_err() {
        return false;
    }

    let text = String::from_utf8_lossy(&head);
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .take(SCAN_HEAD_LINES)
        .any(|line| {
            serde_json::from_str::<Value>(line)
                .ok()
                .and_then(|value| {
                    value
                        .get("sessionId")
                        .and_then(Value::as_str)
                        .map(|id| sessions.contains(id))
                })
                .unwrap_or(false)
        })
}
