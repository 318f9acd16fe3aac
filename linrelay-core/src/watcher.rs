//! Watcher orchestrator
//!
//! Binds locator, tailers, projector, and cursor store into the main loop:
//! await the initial journal, tail every adopted file in byte order, run the
//! successor scan on its own cadence, persist cursors periodically, and
//! drain everything once the stopping flag is set.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::time::{Duration, Instant, sleep};

use crate::cursor::CursorStore;
use crate::emitter::Emitter;
use crate::error::Result;
use crate::locator::{self, SuccessorScanner};
use crate::tailer::TailedFile;
use crate::tracker::TrackerClient;

const CURSOR_SAVE_INTERVAL: Duration = Duration::from_secs(5);
const CURSOR_SAVE_LINES: u32 = 10;

/// Totals reported after shutdown.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WatchSummary {
    /// Journal files tailed
    pub files: usize,
    /// Journal lines processed across all files (cumulative, cursor-seeded)
    pub lines: u64,
    /// Bytes consumed this run
    pub bytes: u64,
    /// Activities posted this run
    pub activities: u64,
}

/// Tails every journal file of one logical session and projects it.
pub struct Watcher<C: TrackerClient> {
    session_id: String,
    projects_dir: PathBuf,
    poll_interval: Duration,
    cursors: CursorStore,
    emitter: Emitter<C>,
    files: Vec<TailedFile>,
    sessions: HashSet<String>,
    stopping: Arc<AtomicBool>,
}

impl<C: TrackerClient> Watcher<C> {
    pub fn new(
        session_id: impl Into<String>,
        projects_dir: PathBuf,
        tracker: C,
        stopping: Arc<AtomicBool>,
    ) -> Self {
        let session_id = session_id.into();
        // The known-sessions set is seeded with the watched session and
        // grows with every record observed.
        let sessions = HashSet::from([session_id.clone()]);
        Self {
            emitter: Emitter::new(session_id.clone(), tracker),
            session_id,
            projects_dir,
            poll_interval: Duration::from_millis(500),
            cursors: CursorStore::new(),
            files: Vec::new(),
            sessions,
            stopping,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_cursor_store(mut self, cursors: CursorStore) -> Self {
        self.cursors = cursors;
        self
    }

    /// Run until the stopping flag is set, then drain and persist.
    pub async fn run(&mut self) -> Result<WatchSummary> {
        // The journal may not exist yet when the watcher starts
        let initial = loop {
            if let Some(path) = locator::find_session_file(&self.projects_dir, &self.session_id) {
                break path;
            }
            if self.stopping.load(Ordering::SeqCst) {
                tracing::info!(session_id = %self.session_id, "Stopped before journal appeared");
                return Ok(WatchSummary::default());
            }
            sleep(self.poll_interval).await;
        };
        tracing::info!(
            session_id = %self.session_id,
            path = %initial.display(),
            "Tailing session journal"
        );

        let scan_dir = initial
            .parent()
            .map(PathBuf::from)
            .unwrap_or_else(|| self.projects_dir.clone());
        let mut scanner = SuccessorScanner::new(scan_dir);
        scanner.mark_checked(&initial);
        self.adopt(initial);

        let mut last_save = Instant::now();
        let mut total_bytes = 0u64;

        while !self.stopping.load(Ordering::SeqCst) {
            let bytes = self.read_all().await;
            total_bytes += bytes;

            for path in scanner.scan(&self.sessions) {
                tracing::info!(path = %path.display(), "Adopted successor journal");
                self.adopt(path);
            }

            if last_save.elapsed() >= CURSOR_SAVE_INTERVAL
                || self
                    .files
                    .iter()
                    .any(|file| file.unsaved_lines() >= CURSOR_SAVE_LINES)
            {
                self.persist_cursors();
                last_save = Instant::now();
            }

            if bytes == 0 {
                sleep(self.poll_interval).await;
            }
        }

        // Drain whatever was appended while shutting down
        total_bytes += self.read_all().await;
        self.persist_cursors();

        let summary = WatchSummary {
            files: self.files.len(),
            lines: self.files.iter().map(TailedFile::line_count).sum(),
            bytes: total_bytes,
            activities: self.emitter.activities_posted(),
        };
        tracing::info!(
            files = summary.files,
            lines = summary.lines,
            bytes = summary.bytes,
            activities = summary.activities,
            "Watcher stopped"
        );
        Ok(summary)
    }

    async fn read_all(&mut self) -> u64 {
        let mut bytes = 0;
        for file in &mut self.files {
            match file.read_new_lines(&mut self.emitter, &mut self.sessions).await {
                Ok(n) => bytes += n,
                Err(e) => {
                    tracing::warn!(
                        path = %file.path().display(),
                        error = %e,
                        "Failed to read journal"
                    );
                }
            }
        }
        bytes
    }

    fn adopt(&mut self, path: PathBuf) {
        let file = match self.cursors.load(&path) {
            Some(cursor) => {
                tracing::debug!(
                    path = %path.display(),
                    offset = cursor.byte_offset,
                    "Resuming from cursor"
                );
                TailedFile::from_cursor(path, cursor)
            }
            None => TailedFile::new(path),
        };
        self.files.push(file);
    }

    fn persist_cursors(&mut self) {
        for file in &mut self.files {
            self.cursors.save(file.path(), &file.cursor());
            file.mark_saved();
        }
    }
}
