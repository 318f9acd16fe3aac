//! Byte-incremental append-only journal reader
//!
//! Reads whatever bytes appeared since the last observed size, carries a
//! partial trailing line in memory, and submits each complete JSON record
//! to the projector. The byte offset only ever covers complete records, so
//! a cursor persisted mid-line resumes exactly at the unfinished line.

use std::collections::HashSet;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::cursor::Cursor;
use crate::emitter::Emitter;
use crate::journal::JournalRecord;
use crate::tracker::TrackerClient;

/// Tailing state for one journal file.
#[derive(Debug)]
pub struct TailedFile {
    path: PathBuf,
    byte_offset: u64,
    partial: Vec<u8>,
    line_count: u64,
    last_uuid: Option<String>,
    unsaved_lines: u32,
}

impl TailedFile {
    /// Start tailing from the beginning of a file.
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            byte_offset: 0,
            partial: Vec::new(),
            line_count: 0,
            last_uuid: None,
            unsaved_lines: 0,
        }
    }

    /// Resume tailing from a persisted cursor.
    pub fn from_cursor(path: PathBuf, cursor: Cursor) -> Self {
        Self {
            path,
            byte_offset: cursor.byte_offset,
            partial: Vec::new(),
            line_count: cursor.line_count,
            last_uuid: cursor.last_uuid,
            unsaved_lines: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn line_count(&self) -> u64 {
        self.line_count
    }

    /// The resumable state: offset of the first byte not yet consumed into
    /// a complete record.
    pub fn cursor(&self) -> Cursor {
        Cursor {
            byte_offset: self.byte_offset,
            line_count: self.line_count,
            last_uuid: self.last_uuid.clone(),
        }
    }

    /// Lines processed since the cursor was last persisted.
    pub fn unsaved_lines(&self) -> u32 {
        self.unsaved_lines
    }

    pub fn mark_saved(&mut self) {
        self.unsaved_lines = 0;
    }

    /// Read newly appended bytes, submit complete records to the projector,
    /// and return the number of bytes consumed.
    ///
    /// A vanished file yields 0 (it may not exist yet); truncation is
    /// undefined behavior and also yields 0. Malformed or non-UTF-8 lines
    /// are skipped.
    pub async fn read_new_lines<C: TrackerClient>(
        &mut self,
        emitter: &mut Emitter<C>,
        sessions: &mut HashSet<String>,
    ) -> std::io::Result<u64> {
        let size = match std::fs::metadata(&self.path) {
            Ok(metadata) => metadata.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };
        // The partial buffer already covers bytes past the offset; after a
        // restart the buffer is empty and the offset re-covers the
        // unfinished line from disk.
        let read_from = self.byte_offset + self.partial.len() as u64;
        if size <= read_from {
            return Ok(0);
        }

        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(read_from))?;
        let to_read = size - read_from;
        let mut chunk = Vec::with_capacity(to_read as usize);
        file.take(to_read).read_to_end(&mut chunk)?;
        let bytes_read = chunk.len() as u64;

        let mut data = std::mem::take(&mut self.partial);
        data.extend_from_slice(&chunk);

        // Everything after the last newline stays buffered; the offset only
        // ever covers complete records.
        let residual_start = match data.iter().rposition(|&b| b == b'\n') {
            Some(i) => i + 1,
            None => 0,
        };
        self.partial = data.split_off(residual_start);
        self.byte_offset = read_from + bytes_read - self.partial.len() as u64;

        for raw_line in data.split(|&b| b == b'\n') {
            let Ok(line) = std::str::from_utf8(raw_line) else {
                continue;
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let value: Value = match serde_json::from_str(line) {
                Ok(value) => value,
                Err(e) => {
                    tracing::debug!(
                        path = %self.path.display(),
                        error = %e,
                        "Skipping malformed journal line"
                    );
                    continue;
                }
            };

            self.line_count += 1;
            self.unsaved_lines += 1;
            if let Some(uuid) = value.get("uuid").and_then(Value::as_str) {
                self.last_uuid = Some(uuid.to_string());
            }
            if let Some(session_id) = value.get("sessionId").and_then(Value::as_str) {
                sessions.insert(session_id.to_string());
            }

            match serde_json::from_value::<JournalRecord>(value) {
                Ok(record) => emitter.process(&record).await,
                Err(e) => {
                    tracing::debug!(
                        path = %self.path.display(),
                        error = %e,
                        "Skipping unprojectable journal record"
                    );
                }
            }
        }

        Ok(bytes_read)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::{Activity, ActivityContent, PlanItem};
    use crate::error::Result;
    use std::cell::RefCell;
    use std::fs::OpenOptions;
    use std::io::Write;
    use std::rc::Rc;
    use tempfile::TempDir;

    #[derive(Clone, Default)]
    struct RecordingTracker {
        activities: Rc<RefCell<Vec<Activity>>>,
    }

    impl TrackerClient for RecordingTracker {
        async fn create_activity(&self, activity: &Activity) -> Result<()> {
            self.activities.borrow_mut().push(activity.clone());
            Ok(())
        }

        async fn update_session_plan(&self, _session_id: &str, _plan: &[PlanItem]) -> Result<()> {
            Ok(())
        }
    }

    fn setup() -> (TempDir, PathBuf, Emitter<RecordingTracker>, RecordingTracker) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.jsonl");
        let tracker = RecordingTracker::default();
        let emitter = Emitter::new("sess-1", tracker.clone());
        (dir, path, emitter, tracker)
    }

    fn append(path: &Path, data: &str) {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .unwrap();
        file.write_all(data.as_bytes()).unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_file_reads_zero() {
        let (_dir, path, mut emitter, _tracker) = setup();
        let mut tailed = TailedFile::new(path);
        let mut sessions = HashSet::new();
        assert_eq!(
            tailed.read_new_lines(&mut emitter, &mut sessions).await.unwrap(),
            0
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_line_buffered_until_completed() {
        let (_dir, path, mut emitter, tracker) = setup();
        let mut tailed = TailedFile::new(path.clone());
        let mut sessions = HashSet::new();

        let head = r#"{"type":"summary","summary":"hel"#;
        append(&path, head);
        let read = tailed.read_new_lines(&mut emitter, &mut sessions).await.unwrap();
        assert_eq!(read, head.len() as u64);
        assert_eq!(tailed.line_count(), 0);
        assert_eq!(tailed.cursor().byte_offset, 0);
        assert!(tracker.activities.borrow().is_empty());

        let tail = "lo\",\"leafUuid\":\"x\"}\n";
        append(&path, tail);
        let read = tailed.read_new_lines(&mut emitter, &mut sessions).await.unwrap();
        assert_eq!(read, tail.len() as u64);
        assert_eq!(tailed.line_count(), 1);
        assert_eq!(tailed.cursor().byte_offset, (head.len() + tail.len()) as u64);

        let activities = tracker.activities.borrow();
        assert_eq!(activities.len(), 1);
        assert_eq!(
            activities[0].content,
            ActivityContent::Thought {
                body: "Context: hello".to_string()
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_chunked_feed_matches_whole_feed() {
        let journal = concat!(
            r#"{"type":"summary","summary":"one"}"#,
            "\n",
            r#"{"type":"assistant","message":{"content":[{"type":"text","text":"two"}]}}"#,
            "\n",
            r#"{"type":"summary","summary":"three"}"#,
            "\n",
        );

        // Whole file at once
        let (_dir, path, mut emitter, tracker) = setup();
        append(&path, journal);
        let mut tailed = TailedFile::new(path);
        let mut sessions = HashSet::new();
        tailed.read_new_lines(&mut emitter, &mut sessions).await.unwrap();
        let expected = tracker.activities.borrow().clone();

        // Arbitrary chunk boundaries, one read per chunk
        for chunk_size in [1usize, 3, 7, 17] {
            let (_dir, path, mut emitter, tracker) = setup();
            let mut tailed = TailedFile::new(path.clone());
            let mut sessions = HashSet::new();
            for chunk in journal.as_bytes().chunks(chunk_size) {
                let mut file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&path)
                    .unwrap();
                file.write_all(chunk).unwrap();
                drop(file);
                tailed.read_new_lines(&mut emitter, &mut sessions).await.unwrap();
            }
            assert_eq!(*tracker.activities.borrow(), expected, "chunk={chunk_size}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_lines_skipped() {
        let (_dir, path, mut emitter, tracker) = setup();
        append(&path, "not json\n");
        append(&path, "{\"type\":\"summary\",\"summary\":\"ok\"}\n");
        append(&path, "\n");

        let mut tailed = TailedFile::new(path);
        let mut sessions = HashSet::new();
        tailed.read_new_lines(&mut emitter, &mut sessions).await.unwrap();

        assert_eq!(tailed.line_count(), 1);
        assert_eq!(tracker.activities.borrow().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_uuid_and_session_capture() {
        let (_dir, path, mut emitter, _tracker) = setup();
        append(
            &path,
            "{\"type\":\"progress\",\"uuid\":\"u-9\",\"sessionId\":\"s-9\"}\n",
        );

        let mut tailed = TailedFile::new(path);
        let mut sessions = HashSet::new();
        tailed.read_new_lines(&mut emitter, &mut sessions).await.unwrap();

        assert_eq!(tailed.cursor().last_uuid.as_deref(), Some("u-9"));
        assert!(sessions.contains("s-9"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_offset_monotonic_and_consistent() {
        let (_dir, path, mut emitter, _tracker) = setup();
        let mut tailed = TailedFile::new(path.clone());
        let mut sessions = HashSet::new();

        let mut last_offset = 0;
        let pieces = [
            "{\"type\":\"summary\",",
            "\"summary\":\"a\"}\n{\"type\":\"sum",
            "mary\",\"summary\":\"b\"}\n",
        ];
        for piece in pieces {
            append(&path, piece);
            tailed.read_new_lines(&mut emitter, &mut sessions).await.unwrap();
            let offset = tailed.cursor().byte_offset;
            assert!(offset >= last_offset);
            let size = std::fs::metadata(&path).unwrap().len();
            assert_eq!(offset + tailed.partial.len() as u64, size);
            last_offset = offset;
        }
        assert_eq!(tailed.line_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_from_cursor_skips_processed_lines() {
        let (_dir, path, mut emitter, tracker) = setup();
        append(&path, "{\"type\":\"summary\",\"summary\":\"A\"}\n");
        append(&path, "{\"type\":\"summary\",\"summary\":\"B\"}\n");

        let mut tailed = TailedFile::new(path.clone());
        let mut sessions = HashSet::new();
        tailed.read_new_lines(&mut emitter, &mut sessions).await.unwrap();
        assert_eq!(tracker.activities.borrow().len(), 2);
        let cursor = tailed.cursor();

        append(&path, "{\"type\":\"summary\",\"summary\":\"C\"}\n");

        // Fresh tailer and emitter, as after a restart
        let fresh_tracker = RecordingTracker::default();
        let mut fresh_emitter = Emitter::new("sess-1", fresh_tracker.clone());
        let mut resumed = TailedFile::from_cursor(path, cursor);
        resumed
            .read_new_lines(&mut fresh_emitter, &mut sessions)
            .await
            .unwrap();

        let activities = fresh_tracker.activities.borrow();
        assert_eq!(activities.len(), 1);
        assert_eq!(
            activities[0].content,
            ActivityContent::Thought {
                body: "Context: C".to_string()
            }
        );
        assert_eq!(resumed.line_count(), 3);
    }
}
