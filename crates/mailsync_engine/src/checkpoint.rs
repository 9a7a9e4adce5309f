//! Durable progress checkpoints.
//!
//! A checkpoint records the stream offset a session may safely resume
//! from, together with its cumulative counters. Checkpoint durability
//! is a hard invariant: the scheduler only advances a checkpoint after
//! every remote write in the batch has been acknowledged, and a store
//! that cannot persist progress fails the session rather than risk
//! silent duplication on resume.

use crate::session::SessionStatsSnapshot;
use chrono::{DateTime, Utc};
use fs2::FileExt;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use uuid::Uuid;

/// Lock file name within a checkpoint directory.
const LOCK_FILE: &str = "LOCK";

/// Durable progress marker for one session.
///
/// Each checkpoint supersedes the prior one for the same session;
/// offsets are strictly monotonic and a stale save is rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// The session this checkpoint belongs to.
    pub session_id: Uuid,
    /// Batch sequence number, starting at 1.
    pub sequence: u64,
    /// Number of source records consumed so far.
    pub offset: u64,
    /// When the checkpoint was taken.
    pub timestamp: DateTime<Utc>,
    /// Cumulative statistics at this offset.
    pub stats: SessionStatsSnapshot,
}

impl Checkpoint {
    /// Creates a checkpoint stamped with the current time.
    pub fn new(
        session_id: Uuid,
        sequence: u64,
        offset: u64,
        stats: SessionStatsSnapshot,
    ) -> Self {
        Self {
            session_id,
            sequence,
            offset,
            timestamp: Utc::now(),
            stats,
        }
    }
}

/// Errors from checkpoint persistence.
#[derive(Debug, Error)]
pub enum CheckpointError {
    /// Underlying I/O failure.
    #[error("checkpoint I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Checkpoint could not be encoded or decoded.
    #[error("checkpoint serialization error: {0}")]
    Serialization(String),

    /// A save would move the offset backwards.
    #[error("stale checkpoint: stored offset {current}, attempted {attempted}")]
    StaleOffset {
        /// Offset already stored.
        current: u64,
        /// Offset of the rejected save.
        attempted: u64,
    },

    /// Another process holds the checkpoint directory lock.
    #[error("checkpoint directory is locked by another process")]
    Locked,
}

/// Persists and retrieves checkpoints.
pub trait CheckpointStore: Send + Sync {
    /// Persists a checkpoint, superseding the prior one for the session.
    fn save(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError>;

    /// Loads the latest checkpoint for a session.
    fn load_latest(&self, session_id: Uuid) -> Result<Option<Checkpoint>, CheckpointError>;
}

/// An in-memory checkpoint store for tests.
///
/// Saves can be scripted to fail, which exercises the fatal
/// checkpoint-write path.
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    checkpoints: RwLock<HashMap<Uuid, Checkpoint>>,
    fail_saves: AtomicBool,
}

impl MemoryCheckpointStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent save fail.
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Number of sessions with a stored checkpoint.
    pub fn len(&self) -> usize {
        self.checkpoints.read().len()
    }

    /// Returns true if no checkpoints are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    fn save(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(CheckpointError::Serialization(
                "scripted save failure".to_string(),
            ));
        }

        let mut checkpoints = self.checkpoints.write();
        if let Some(existing) = checkpoints.get(&checkpoint.session_id) {
            if checkpoint.offset <= existing.offset {
                return Err(CheckpointError::StaleOffset {
                    current: existing.offset,
                    attempted: checkpoint.offset,
                });
            }
        }
        checkpoints.insert(checkpoint.session_id, checkpoint.clone());
        Ok(())
    }

    fn load_latest(&self, session_id: Uuid) -> Result<Option<Checkpoint>, CheckpointError> {
        Ok(self.checkpoints.read().get(&session_id).cloned())
    }
}

/// A file-backed checkpoint store.
///
/// One JSON document per session inside a directory guarded by an
/// exclusive lock file; only one process may own the directory at a
/// time. Saves go through a temp file and an atomic rename, so a crash
/// mid-write leaves the prior checkpoint intact.
#[derive(Debug)]
pub struct FileCheckpointStore {
    dir: PathBuf,
    /// Lock file handle (held for exclusive access).
    _lock_file: File,
}

impl FileCheckpointStore {
    /// Opens or creates a checkpoint directory.
    ///
    /// # Errors
    ///
    /// Returns [`CheckpointError::Locked`] when another process holds
    /// the directory lock.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, CheckpointError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;

        let lock_path = dir.join(LOCK_FILE);
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;
        if lock_file.try_lock_exclusive().is_err() {
            return Err(CheckpointError::Locked);
        }

        Ok(Self {
            dir,
            _lock_file: lock_file,
        })
    }

    /// Returns the checkpoint directory path.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Lists sessions with a stored checkpoint.
    pub fn sessions(&self) -> Result<Vec<Uuid>, CheckpointError> {
        let mut sessions = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(stem) = name.strip_suffix(".json") {
                if let Ok(id) = stem.parse::<Uuid>() {
                    sessions.push(id);
                }
            }
        }
        sessions.sort();
        Ok(sessions)
    }

    fn path_for(&self, session_id: Uuid) -> PathBuf {
        self.dir.join(format!("{session_id}.json"))
    }
}

impl CheckpointStore for FileCheckpointStore {
    fn save(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        if let Some(existing) = self.load_latest(checkpoint.session_id)? {
            if checkpoint.offset <= existing.offset {
                return Err(CheckpointError::StaleOffset {
                    current: existing.offset,
                    attempted: checkpoint.offset,
                });
            }
        }

        let bytes = serde_json::to_vec_pretty(checkpoint)
            .map_err(|e| CheckpointError::Serialization(e.to_string()))?;

        let path = self.path_for(checkpoint.session_id);
        let temp_path = path.with_extension("json.tmp");
        {
            let mut file = File::create(&temp_path)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }
        fs::rename(&temp_path, &path)?;

        tracing::debug!(
            session_id = %checkpoint.session_id,
            sequence = checkpoint.sequence,
            offset = checkpoint.offset,
            "checkpoint committed",
        );
        Ok(())
    }

    fn load_latest(&self, session_id: Uuid) -> Result<Option<Checkpoint>, CheckpointError> {
        let path = self.path_for(session_id);
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&path)?;
        let checkpoint = serde_json::from_slice(&bytes)
            .map_err(|e| CheckpointError::Serialization(e.to_string()))?;
        Ok(Some(checkpoint))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn checkpoint(session_id: Uuid, sequence: u64, offset: u64) -> Checkpoint {
        Checkpoint::new(session_id, sequence, offset, SessionStatsSnapshot::default())
    }

    #[test]
    fn memory_store_supersedes() {
        let store = MemoryCheckpointStore::new();
        let session = Uuid::new_v4();

        store.save(&checkpoint(session, 1, 50)).unwrap();
        store.save(&checkpoint(session, 2, 100)).unwrap();

        let latest = store.load_latest(session).unwrap().unwrap();
        assert_eq!(latest.sequence, 2);
        assert_eq!(latest.offset, 100);
    }

    #[test]
    fn memory_store_rejects_stale_offsets() {
        let store = MemoryCheckpointStore::new();
        let session = Uuid::new_v4();

        store.save(&checkpoint(session, 1, 100)).unwrap();
        let error = store.save(&checkpoint(session, 2, 100)).unwrap_err();
        assert!(matches!(
            error,
            CheckpointError::StaleOffset {
                current: 100,
                attempted: 100
            }
        ));
    }

    #[test]
    fn memory_store_scripted_failure() {
        let store = MemoryCheckpointStore::new();
        store.set_fail_saves(true);
        assert!(store.save(&checkpoint(Uuid::new_v4(), 1, 10)).is_err());
    }

    #[test]
    fn file_store_roundtrip() {
        let dir = tempdir().unwrap();
        let store = FileCheckpointStore::open(dir.path().join("state")).unwrap();
        let session = Uuid::new_v4();

        assert_eq!(store.load_latest(session).unwrap(), None);

        let saved = checkpoint(session, 3, 150);
        store.save(&saved).unwrap();
        let loaded = store.load_latest(session).unwrap().unwrap();
        assert_eq!(loaded, saved);
    }

    #[test]
    fn file_store_rejects_stale_offsets() {
        let dir = tempdir().unwrap();
        let store = FileCheckpointStore::open(dir.path()).unwrap();
        let session = Uuid::new_v4();

        store.save(&checkpoint(session, 1, 200)).unwrap();
        assert!(store.save(&checkpoint(session, 2, 199)).is_err());

        // The stored checkpoint is untouched by the rejected save.
        assert_eq!(store.load_latest(session).unwrap().unwrap().offset, 200);
    }

    #[test]
    fn file_store_lists_sessions() {
        let dir = tempdir().unwrap();
        let store = FileCheckpointStore::open(dir.path()).unwrap();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        store.save(&checkpoint(first, 1, 10)).unwrap();
        store.save(&checkpoint(second, 1, 10)).unwrap();

        let mut expected = vec![first, second];
        expected.sort();
        assert_eq!(store.sessions().unwrap(), expected);
    }

    #[test]
    fn directory_lock_is_exclusive() {
        let dir = tempdir().unwrap();
        let _store = FileCheckpointStore::open(dir.path()).unwrap();
        assert!(matches!(
            FileCheckpointStore::open(dir.path()),
            Err(CheckpointError::Locked)
        ));
    }

    #[test]
    fn lock_released_on_drop() {
        let dir = tempdir().unwrap();
        {
            let _store = FileCheckpointStore::open(dir.path()).unwrap();
        }
        assert!(FileCheckpointStore::open(dir.path()).is_ok());
    }
}
