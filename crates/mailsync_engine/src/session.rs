//! Import session state, statistics, and lifecycle control.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use uuid::Uuid;

/// Lifecycle state of an import session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Created, not yet running.
    Pending,
    /// Actively processing batches.
    Running,
    /// Parked between batches at the operator's request.
    Paused,
    /// Ran to the end of the source stream.
    Completed,
    /// Stopped cooperatively after a checkpoint; resumable.
    Cancelled,
    /// Stopped by a fatal error; the last checkpoint is intact.
    Aborted,
}

impl SessionState {
    /// Returns true for states no session leaves.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Completed | SessionState::Cancelled | SessionState::Aborted
        )
    }

    /// Returns true while the session occupies a worker thread.
    pub fn is_active(&self) -> bool {
        matches!(self, SessionState::Running | SessionState::Paused)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Pending => "pending",
            SessionState::Running => "running",
            SessionState::Paused => "paused",
            SessionState::Completed => "completed",
            SessionState::Cancelled => "cancelled",
            SessionState::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Live session counters.
///
/// All counters are atomic and readable while the session runs. The
/// processed count is never stored: it is derived as
/// `succeeded + failed + duplicates` at snapshot time, so the invariant
/// holds at every observation point by construction. Ambiguous and
/// invalid records are categorized separately and excluded from it.
#[derive(Debug, Default)]
pub struct ImportStats {
    succeeded: AtomicU64,
    failed: AtomicU64,
    duplicates: AtomicU64,
    ambiguous: AtomicU64,
    invalid: AtomicU64,
    batches: AtomicU64,
    retries: AtomicU64,
    checkpoints: AtomicU64,
    // Gauges
    current_batch_size: AtomicU64,
    offset: AtomicU64,
}

impl ImportStats {
    /// Creates zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restores counters from a checkpoint snapshot on resume.
    pub fn restore(snapshot: &SessionStatsSnapshot) -> Self {
        let stats = Self::new();
        stats.succeeded.store(snapshot.succeeded, Ordering::Relaxed);
        stats.failed.store(snapshot.failed, Ordering::Relaxed);
        stats.duplicates.store(snapshot.duplicates, Ordering::Relaxed);
        stats.ambiguous.store(snapshot.ambiguous, Ordering::Relaxed);
        stats.invalid.store(snapshot.invalid, Ordering::Relaxed);
        stats.batches.store(snapshot.batches, Ordering::Relaxed);
        stats.retries.store(snapshot.retries, Ordering::Relaxed);
        stats.checkpoints.store(snapshot.checkpoints, Ordering::Relaxed);
        stats
            .current_batch_size
            .store(snapshot.current_batch_size, Ordering::Relaxed);
        stats
    }

    /// Records a successful import.
    pub fn record_succeeded(&self) {
        self.succeeded.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a failed import.
    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a skipped duplicate.
    pub fn record_duplicate(&self) {
        self.duplicates.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a record routed to manual review.
    pub fn record_ambiguous(&self) {
        self.ambiguous.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a structurally invalid record.
    pub fn record_invalid(&self) {
        self.invalid.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a completed batch.
    pub fn record_batch(&self) {
        self.batches.fetch_add(1, Ordering::Relaxed);
    }

    /// Adds remote-call retries.
    pub fn add_retries(&self, count: u64) {
        if count > 0 {
            self.retries.fetch_add(count, Ordering::Relaxed);
        }
    }

    /// Records a committed checkpoint.
    pub fn record_checkpoint(&self) {
        self.checkpoints.fetch_add(1, Ordering::Relaxed);
    }

    /// Updates the current adaptive batch size gauge.
    pub fn set_current_batch_size(&self, size: u64) {
        self.current_batch_size.store(size, Ordering::Relaxed);
    }

    /// Updates the last committed stream offset gauge.
    pub fn set_offset(&self, offset: u64) {
        self.offset.store(offset, Ordering::Relaxed);
    }

    /// Records processed so far (`succeeded + failed + duplicates`).
    pub fn processed(&self) -> u64 {
        self.succeeded.load(Ordering::Relaxed)
            + self.failed.load(Ordering::Relaxed)
            + self.duplicates.load(Ordering::Relaxed)
    }

    /// Last committed stream offset.
    pub fn offset(&self) -> u64 {
        self.offset.load(Ordering::Relaxed)
    }

    /// Returns a point-in-time snapshot.
    pub fn snapshot(&self) -> SessionStatsSnapshot {
        let succeeded = self.succeeded.load(Ordering::Relaxed);
        let failed = self.failed.load(Ordering::Relaxed);
        let duplicates = self.duplicates.load(Ordering::Relaxed);
        SessionStatsSnapshot {
            processed: succeeded + failed + duplicates,
            succeeded,
            failed,
            duplicates,
            ambiguous: self.ambiguous.load(Ordering::Relaxed),
            invalid: self.invalid.load(Ordering::Relaxed),
            batches: self.batches.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            checkpoints: self.checkpoints.load(Ordering::Relaxed),
            current_batch_size: self.current_batch_size.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of session statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStatsSnapshot {
    /// `succeeded + failed + duplicates`.
    pub processed: u64,
    /// Records imported to the remote.
    pub succeeded: u64,
    /// Records whose import failed after retries.
    pub failed: u64,
    /// Records skipped as duplicates.
    pub duplicates: u64,
    /// Records routed to manual review.
    pub ambiguous: u64,
    /// Structurally invalid records and addresses.
    pub invalid: u64,
    /// Batches completed.
    pub batches: u64,
    /// Remote-call retries performed.
    pub retries: u64,
    /// Checkpoints committed.
    pub checkpoints: u64,
    /// Batch size at snapshot time.
    pub current_batch_size: u64,
}

/// Final description of one import session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportSession {
    /// Session id.
    pub id: Uuid,
    /// When the session started.
    pub started_at: DateTime<Utc>,
    /// When the session reached a terminal state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// Terminal (or last observed) state.
    pub state: SessionState,
    /// Total records in the source, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_records: Option<u64>,
    /// Offset of the last committed checkpoint.
    pub last_checkpoint_offset: u64,
    /// Final statistics.
    pub stats: SessionStatsSnapshot,
    /// Fatal error description for ABORTED sessions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Progress view of a running session.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressSnapshot {
    /// Session id.
    pub session_id: Uuid,
    /// Current state.
    pub state: SessionState,
    /// Live statistics.
    pub stats: SessionStatsSnapshot,
    /// Total records in the source, when known.
    pub total_records: Option<u64>,
    /// Throughput in records per minute.
    pub records_per_minute: f64,
    /// Estimated seconds until completion, when computable.
    pub estimated_remaining_secs: Option<u64>,
}

/// Shared handle between a session's worker thread and its observers.
///
/// Cancellation and pause are cooperative flags checked at batch
/// boundaries; the worker owns state transitions.
#[derive(Debug)]
pub struct SessionContext {
    id: Uuid,
    started_at: DateTime<Utc>,
    cancel: AtomicBool,
    pause: AtomicBool,
    state: RwLock<SessionState>,
    stats: ImportStats,
    total_records: RwLock<Option<u64>>,
}

impl SessionContext {
    /// Creates a context for a fresh session.
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4(), ImportStats::new())
    }

    /// Creates a context for a resumed session, restoring its counters.
    pub fn resumed(id: Uuid, stats: &SessionStatsSnapshot) -> Self {
        Self::with_id(id, ImportStats::restore(stats))
    }

    fn with_id(id: Uuid, stats: ImportStats) -> Self {
        Self {
            id,
            started_at: Utc::now(),
            cancel: AtomicBool::new(false),
            pause: AtomicBool::new(false),
            state: RwLock::new(SessionState::Pending),
            stats,
            total_records: RwLock::new(None),
        }
    }

    /// Session id.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// When the session (or its resumption) started.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Requests cooperative cancellation.
    pub fn request_cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    /// Returns true once cancellation was requested.
    pub fn cancel_requested(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Requests a pause at the next batch boundary.
    pub fn request_pause(&self) {
        self.pause.store(true, Ordering::SeqCst);
    }

    /// Clears a pause request.
    pub fn clear_pause(&self) {
        self.pause.store(false, Ordering::SeqCst);
    }

    /// Returns true while a pause is requested.
    pub fn pause_requested(&self) -> bool {
        self.pause.load(Ordering::SeqCst)
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    /// Sets the state. Worker-thread use only.
    pub fn set_state(&self, state: SessionState) {
        *self.state.write() = state;
    }

    /// Live counters.
    pub fn stats(&self) -> &ImportStats {
        &self.stats
    }

    /// Records the source's total size, when known.
    pub fn set_total_records(&self, total: Option<u64>) {
        *self.total_records.write() = total;
    }

    /// Total records in the source, when known.
    pub fn total_records(&self) -> Option<u64> {
        *self.total_records.read()
    }

    /// Builds a progress snapshot with throughput and an estimate of
    /// remaining time.
    pub fn progress(&self) -> ProgressSnapshot {
        let stats = self.stats.snapshot();
        let elapsed_secs = (Utc::now() - self.started_at).num_seconds().max(0) as f64;
        let consumed = self.stats.offset();

        let records_per_minute = if elapsed_secs > 0.0 {
            consumed as f64 * 60.0 / elapsed_secs
        } else {
            0.0
        };

        let total_records = self.total_records();
        let estimated_remaining_secs = match total_records {
            Some(total) if consumed > 0 && total > consumed => {
                let rate = consumed as f64 / elapsed_secs.max(1.0);
                Some(((total - consumed) as f64 / rate).ceil() as u64)
            }
            Some(total) if total <= consumed => Some(0),
            _ => None,
        };

        ProgressSnapshot {
            session_id: self.id,
            state: self.state(),
            stats,
            total_records,
            records_per_minute,
            estimated_remaining_secs,
        }
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}
