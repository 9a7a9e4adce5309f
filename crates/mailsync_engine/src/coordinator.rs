//! Session lifecycle coordination.
//!
//! The coordinator spawns each session on its own worker thread and
//! exposes lifecycle control (`start`, `pause`, `resume`, `cancel`),
//! live progress snapshots, and the conflict queue to the rest of the
//! application. Sessions share the engine's duplicate index and contact
//! cache; everything else is per-session.

use crate::checkpoint::CheckpointStore;
use crate::conflict::ConflictQueue;
use crate::engine::ImportEngine;
use crate::error::{EngineError, EngineResult};
use crate::remote::{RecordSource, RemoteWriter};
use crate::session::{ImportSession, ProgressSnapshot, SessionContext};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use uuid::Uuid;

struct SessionEntry {
    ctx: Arc<SessionContext>,
    join: Mutex<Option<JoinHandle<EngineResult<ImportSession>>>>,
}

/// Coordinates concurrent import sessions over one engine.
pub struct SessionCoordinator<W: RemoteWriter + 'static, C: CheckpointStore + 'static> {
    engine: Arc<ImportEngine<W, C>>,
    conflicts: Arc<ConflictQueue>,
    sessions: RwLock<HashMap<Uuid, SessionEntry>>,
}

impl<W: RemoteWriter + 'static, C: CheckpointStore + 'static> SessionCoordinator<W, C> {
    /// Creates a coordinator over an engine.
    pub fn new(engine: Arc<ImportEngine<W, C>>) -> Self {
        let conflicts = Arc::new(ConflictQueue::new(engine.config().conflict_strategy));
        Self {
            engine,
            conflicts,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the underlying engine.
    pub fn engine(&self) -> &Arc<ImportEngine<W, C>> {
        &self.engine
    }

    /// Returns the conflict queue for the manual-resolution front end.
    pub fn conflicts(&self) -> &Arc<ConflictQueue> {
        &self.conflicts
    }

    /// Starts a fresh session on a worker thread and returns its id.
    pub fn start<S>(&self, source: S) -> Uuid
    where
        S: RecordSource + Send + 'static,
    {
        let ctx = Arc::new(SessionContext::new());
        let id = ctx.id();
        let engine = Arc::clone(&self.engine);
        let worker_ctx = Arc::clone(&ctx);
        let join = thread::spawn(move || engine.run_with_context(source, worker_ctx));

        self.sessions.write().insert(
            id,
            SessionEntry {
                ctx,
                join: Mutex::new(Some(join)),
            },
        );
        id
    }

    /// Resumes a checkpointed session on a worker thread.
    pub fn resume<S>(&self, session_id: Uuid, source: S) -> EngineResult<Uuid>
    where
        S: RecordSource + Send + 'static,
    {
        let checkpoint = self
            .engine
            .load_checkpoint(session_id)?
            .ok_or(EngineError::NoCheckpoint { session_id })?;
        let ctx = Arc::new(SessionContext::resumed(session_id, &checkpoint.stats));
        let engine = Arc::clone(&self.engine);
        let worker_ctx = Arc::clone(&ctx);
        let join =
            thread::spawn(move || engine.resume_with_context(source, worker_ctx, checkpoint));

        self.sessions.write().insert(
            session_id,
            SessionEntry {
                ctx,
                join: Mutex::new(Some(join)),
            },
        );
        Ok(session_id)
    }

    /// Requests a pause at the next batch boundary.
    pub fn pause(&self, session_id: Uuid) -> EngineResult<()> {
        self.with_ctx(session_id, |ctx| ctx.request_pause())
    }

    /// Releases a paused session.
    pub fn resume_paused(&self, session_id: Uuid) -> EngineResult<()> {
        self.with_ctx(session_id, |ctx| ctx.clear_pause())
    }

    /// Requests cooperative cancellation.
    ///
    /// The session stops after the in-flight batch commits its
    /// checkpoint, so a cancelled session is always resumable.
    pub fn cancel(&self, session_id: Uuid) -> EngineResult<()> {
        self.with_ctx(session_id, |ctx| ctx.request_cancel())
    }

    /// Returns a live progress snapshot for a session.
    pub fn progress(&self, session_id: Uuid) -> Option<ProgressSnapshot> {
        self.sessions
            .read()
            .get(&session_id)
            .map(|entry| entry.ctx.progress())
    }

    /// Ids of all sessions the coordinator knows about.
    pub fn session_ids(&self) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = self.sessions.read().keys().copied().collect();
        ids.sort();
        ids
    }

    /// Waits for a session's worker thread and returns its outcome.
    pub fn join(&self, session_id: Uuid) -> EngineResult<ImportSession> {
        let handle = {
            let sessions = self.sessions.read();
            let entry = sessions
                .get(&session_id)
                .ok_or(EngineError::SessionNotFound { session_id })?;
            let handle = entry.join.lock().take();
            handle
        };
        match handle {
            Some(handle) => handle.join().map_err(|_| EngineError::WorkerTerminated)?,
            None => Err(EngineError::SessionNotFound { session_id }),
        }
    }

    fn with_ctx<F: FnOnce(&SessionContext)>(&self, session_id: Uuid, f: F) -> EngineResult<()> {
        let sessions = self.sessions.read();
        let entry = sessions
            .get(&session_id)
            .ok_or(EngineError::SessionNotFound { session_id })?;
        f(&entry.ctx);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::BatchConfig;
    use crate::checkpoint::MemoryCheckpointStore;
    use crate::config::EngineConfig;
    use crate::remote::{MemoryRemote, MemorySource};
    use crate::retry::RetryConfig;
    use crate::session::SessionState;
    use chrono::{TimeZone, Utc};
    use mailsync_core::Record;

    fn coordinator() -> SessionCoordinator<MemoryRemote, MemoryCheckpointStore> {
        let config = EngineConfig::new()
            .with_batch(BatchConfig::new().with_initial(4).with_bounds(2, 8))
            .with_retry(RetryConfig::no_retry());
        let engine = Arc::new(ImportEngine::new(
            config,
            MemoryRemote::new(),
            MemoryCheckpointStore::new(),
        ));
        SessionCoordinator::new(engine)
    }

    fn records(count: usize) -> Vec<Record> {
        (0..count)
            .map(|i| {
                Record::new(
                    format!("r-{i}"),
                    Utc.timestamp_opt(1_700_000_000 + (i as i64) * 7_200, 0).unwrap(),
                    format!("sender{i}@example.com"),
                )
                .with_subject(format!("distinct topic number {i}"))
                .with_body_hash(format!("{i:04x}"))
                .with_message_id(format!("<r-{i}@mail.test>"))
            })
            .collect()
    }

    #[test]
    fn start_and_join() {
        let coordinator = coordinator();
        let id = coordinator.start(MemorySource::new(records(6)));

        let session = coordinator.join(id).unwrap();
        assert_eq!(session.id, id);
        assert_eq!(session.state, SessionState::Completed);
        assert_eq!(session.stats.succeeded, 6);
    }

    #[test]
    fn progress_is_observable() {
        let coordinator = coordinator();
        let id = coordinator.start(MemorySource::new(records(3)));
        let _ = coordinator.join(id).unwrap();

        let progress = coordinator.progress(id).unwrap();
        assert_eq!(progress.session_id, id);
        assert_eq!(progress.state, SessionState::Completed);
        assert_eq!(progress.stats.succeeded, 3);
        assert_eq!(progress.total_records, Some(3));
    }

    #[test]
    fn unknown_session_operations_fail() {
        let coordinator = coordinator();
        let missing = Uuid::new_v4();
        assert!(matches!(
            coordinator.cancel(missing),
            Err(EngineError::SessionNotFound { .. })
        ));
        assert!(matches!(
            coordinator.join(missing),
            Err(EngineError::SessionNotFound { .. })
        ));
        assert!(coordinator.progress(missing).is_none());
    }

    #[test]
    fn cancelled_session_reaches_terminal_state() {
        let coordinator = coordinator();
        let id = coordinator.start(MemorySource::new(records(64)));
        coordinator.cancel(id).unwrap();

        let session = coordinator.join(id).unwrap();
        // Depending on timing the session either finished or was
        // cancelled at a batch boundary; both are terminal and
        // resumable states.
        assert!(session.state.is_terminal());
    }

    #[test]
    fn pause_then_cancel_resolves() {
        let coordinator = coordinator();
        let id = coordinator.start(MemorySource::new(records(64)));
        coordinator.pause(id).unwrap();
        coordinator.cancel(id).unwrap();

        let session = coordinator.join(id).unwrap();
        assert!(session.state.is_terminal());
    }

    #[test]
    fn session_ids_are_listed() {
        let coordinator = coordinator();
        let first = coordinator.start(MemorySource::new(records(2)));
        let second = coordinator.start(MemorySource::new(records(2)));

        let ids = coordinator.session_ids();
        assert!(ids.contains(&first));
        assert!(ids.contains(&second));

        let _ = coordinator.join(first);
        let _ = coordinator.join(second);
    }
}
