//! Single-session lock
//!
//! Exactly one watcher per session id per host. The lock is a JSON file
//! created with exclusive-create under `<tmpdir>/linear-agent-locks/`; a
//! recorded pid that no longer answers a no-op signal marks the lock stale,
//! and a stale lock is removed and retaken.

use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use crate::error::{Error, Result};

const LOCK_DIR: &str = "linear-agent-locks";

/// Owner info written into the lock file for probing and debugging.
#[derive(Debug, Serialize, Deserialize)]
struct LockInfo {
    pid: u32,
    #[serde(rename = "sessionId")]
    session_id: String,
    #[serde(rename = "createdAt")]
    created_at: i64,
}

/// Held lock for one session id. Dropping it removes the lock file.
#[derive(Debug)]
pub struct SessionLock {
    path: PathBuf,
}

impl SessionLock {
    /// Try to acquire the lock for a session id.
    ///
    /// Returns `Ok(None)` when another live process already holds it.
    pub fn acquire(session_id: &str) -> Result<Option<SessionLock>> {
        let dir = std::env::temp_dir().join(LOCK_DIR);
        Self::acquire_in(dir, session_id)
    }

    /// Acquire with a custom lock directory (for testing).
    pub fn acquire_in(dir: PathBuf, session_id: &str) -> Result<Option<SessionLock>> {
        fs::create_dir_all(&dir)?;
        let path = dir.join(format!("{session_id}.lock"));

        // Two rounds: a stale lock removed on the first round is retaken on
        // the second. A live holder on either round means contention.
        for _ in 0..2 {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    let info = LockInfo {
                        pid: std::process::id(),
                        session_id: session_id.to_string(),
                        created_at: chrono::Utc::now().timestamp_millis(),
                    };
                    let json = serde_json::to_string(&info)?;
                    file.write_all(json.as_bytes())?;
                    return Ok(Some(SessionLock { path }));
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    let holder = fs::read_to_string(&path)
                        .ok()
                        .and_then(|raw| serde_json::from_str::<LockInfo>(&raw).ok());
                    match holder {
                        Some(info) if pid_alive(info.pid) => return Ok(None),
                        // Stale or unreadable lock: remove and retake
                        _ => {
                            let _ = fs::remove_file(&path);
                        }
                    }
                }
                Err(e) => {
                    return Err(Error::Lock(format!(
                        "failed to create lock file {}: {}",
                        path.display(),
                        e
                    )));
                }
            }
        }

        Ok(None)
    }
}

impl Drop for SessionLock {
    fn drop(&mut self) {
        // Best-effort cleanup; a leftover file is reclaimed via the pid probe.
        let _ = fs::remove_file(&self.path);
    }
}

/// Probe a pid with signal 0: delivers nothing, only checks existence.
/// EPERM means the process exists but belongs to another user.
#[cfg(unix)]
fn pid_alive(pid: u32) -> bool {
    let Ok(pid) = i32::try_from(pid) else {
        return false;
    };
    // SAFETY: kill with signal 0 performs a permission/existence check only.
    let rc = unsafe { kill(pid, 0) };
    if rc == 0 {
        return true;
    }
    std::io::Error::last_os_error().raw_os_error() == Some(1) // EPERM
}

#[cfg(unix)]
unsafe extern "C" {
    fn kill(pid: i32, sig: i32) -> i32;
}

#[cfg(not(unix))]
compile_error!("linrelay session locks currently require Unix (macOS/Linux)");

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_acquire_writes_owner_info() {
        let dir = TempDir::new().unwrap();
        let lock = SessionLock::acquire_in(dir.path().to_path_buf(), "sess-1")
            .unwrap()
            .expect("lock should be free");

        let raw = fs::read_to_string(dir.path().join("sess-1.lock")).unwrap();
        let info: LockInfo = serde_json::from_str(&raw).unwrap();
        assert_eq!(info.pid, std::process::id());
        assert_eq!(info.session_id, "sess-1");
        assert!(info.created_at > 0);

        drop(lock);
        assert!(!dir.path().join("sess-1.lock").exists());
    }

    #[test]
    fn test_live_holder_blocks_second_acquire() {
        let dir = TempDir::new().unwrap();
        // Our own pid is alive, so a lock we hold blocks a second acquire.
        let _held = SessionLock::acquire_in(dir.path().to_path_buf(), "sess-2")
            .unwrap()
            .expect("lock should be free");

        let second = SessionLock::acquire_in(dir.path().to_path_buf(), "sess-2").unwrap();
        assert!(second.is_none());
    }

    #[test]
    fn test_stale_lock_is_reclaimed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sess-3.lock");
        // Pid far beyond any real pid range
        fs::write(
            &path,
            r#"{"pid": 999999999, "sessionId": "sess-3", "createdAt": 1}"#,
        )
        .unwrap();

        let lock = SessionLock::acquire_in(dir.path().to_path_buf(), "sess-3").unwrap();
        assert!(lock.is_some());
    }

    #[test]
    fn test_garbage_lock_is_reclaimed() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("sess-4.lock"), "not json").unwrap();

        let lock = SessionLock::acquire_in(dir.path().to_path_buf(), "sess-4").unwrap();
        assert!(lock.is_some());
    }

    #[test]
    fn test_different_sessions_do_not_contend() {
        let dir = TempDir::new().unwrap();
        let a = SessionLock::acquire_in(dir.path().to_path_buf(), "sess-a").unwrap();
        let b = SessionLock::acquire_in(dir.path().to_path_buf(), "sess-b").unwrap();
        assert!(a.is_some());
        assert!(b.is_some());
    }
}
