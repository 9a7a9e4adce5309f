//! The import engine: batch scheduling, remote writes, checkpointing.
//!
//! One session is a single logical pipeline over its source stream:
//! records are pulled, fingerprinted, matched, and written in source
//! order, one batch window in memory at a time. Remote writes inside a
//! batch fan out across a bounded worker pool; the checkpoint for the
//! batch is written strictly after every write has definitively
//! succeeded or failed. Cancellation and pause are honored at batch
//! boundaries, so a stopped session always resumes from a durable
//! checkpoint.

use crate::batch::AdaptiveBatchSize;
use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::config::EngineConfig;
use crate::contact::{ContactCache, ContactRef, ContactRequest, ContactResolver, EmailAddress};
use crate::error::{EngineError, EngineResult};
use crate::remote::{RecordSource, RecordStatus, RemoteError, RemoteId, RemoteWriter, SourceError};
use crate::retry::retry_remote;
use crate::review::ReviewQueue;
use crate::session::{ImportSession, SessionContext, SessionState};
use chrono::Utc;
use mailsync_core::{
    compute_fingerprints, DuplicateResolver, MatchOutcome, MatchStatsSnapshot, Record, RecordIndex,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use uuid::Uuid;

/// How long the scheduler sleeps between pause-flag checks.
const PAUSE_POLL: Duration = Duration::from_millis(25);

enum SessionOutcome {
    Completed,
    Cancelled,
    Fatal(EngineError),
}

/// The import engine.
///
/// The duplicate index and contact cache are the only state shared
/// between sessions; everything else is local to one `drive` call.
/// Multiple sessions may run concurrently against one engine, or
/// multiple engines may be built over shared structures with
/// [`ImportEngine::with_shared`].
pub struct ImportEngine<W: RemoteWriter, C: CheckpointStore> {
    config: EngineConfig,
    writer: Arc<W>,
    checkpoints: Arc<C>,
    index: Arc<RecordIndex>,
    resolver: DuplicateResolver,
    contacts: ContactResolver<W>,
    review: Arc<ReviewQueue>,
}

impl<W: RemoteWriter, C: CheckpointStore> ImportEngine<W, C> {
    /// Creates an engine with its own index and contact cache.
    pub fn new(config: EngineConfig, writer: W, checkpoints: C) -> Self {
        let index = Arc::new(RecordIndex::new(&config.matching));
        let cache = Arc::new(ContactCache::new());
        Self::with_shared(config, Arc::new(writer), Arc::new(checkpoints), index, cache)
    }

    /// Creates an engine over shared structures.
    ///
    /// Engines built over the same index and cache behave as one
    /// deduplication domain: a record imported by either is a duplicate
    /// for both, and a contact created by either is reused by both.
    pub fn with_shared(
        config: EngineConfig,
        writer: Arc<W>,
        checkpoints: Arc<C>,
        index: Arc<RecordIndex>,
        cache: Arc<ContactCache>,
    ) -> Self {
        let resolver = DuplicateResolver::new(config.matching.clone());
        let contacts =
            ContactResolver::new(Arc::clone(&writer), cache, config.contacts.clone());
        Self {
            config,
            writer,
            checkpoints,
            index,
            resolver,
            contacts,
            review: Arc::new(ReviewQueue::new()),
        }
    }

    /// Returns the engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns the shared duplicate index.
    pub fn index(&self) -> &Arc<RecordIndex> {
        &self.index
    }

    /// Returns the manual review queue for ambiguous matches.
    pub fn review(&self) -> &Arc<ReviewQueue> {
        &self.review
    }

    /// Returns the checkpoint store.
    pub fn checkpoints(&self) -> &Arc<C> {
        &self.checkpoints
    }

    /// Returns per-strategy matching counters.
    pub fn match_stats(&self) -> MatchStatsSnapshot {
        self.resolver.stats()
    }

    /// Returns contact resolution counters.
    pub fn contact_stats(&self) -> crate::contact::ContactStatsSnapshot {
        self.contacts.stats()
    }

    /// Loads the latest checkpoint for a session.
    pub fn load_checkpoint(&self, session_id: Uuid) -> EngineResult<Option<Checkpoint>> {
        Ok(self.checkpoints.load_latest(session_id)?)
    }

    /// Runs a fresh import session to a terminal state.
    pub fn run_session<S: RecordSource>(&self, source: S) -> EngineResult<ImportSession> {
        self.run_with_context(source, Arc::new(SessionContext::new()))
    }

    /// Runs a fresh session under an externally held context.
    pub fn run_with_context<S: RecordSource>(
        &self,
        source: S,
        ctx: Arc<SessionContext>,
    ) -> EngineResult<ImportSession> {
        self.drive(source, ctx, None)
    }

    /// Resumes a session from its latest checkpoint.
    ///
    /// The source is reopened at the checkpoint offset; records before
    /// it are never reprocessed. Records after it are re-validated
    /// through the duplicate resolver, so work that was written but not
    /// checkpointed before a crash is skipped, not re-imported.
    pub fn resume_session<S: RecordSource>(
        &self,
        session_id: Uuid,
        source: S,
    ) -> EngineResult<ImportSession> {
        let checkpoint = self
            .load_checkpoint(session_id)?
            .ok_or(EngineError::NoCheckpoint { session_id })?;
        let ctx = Arc::new(SessionContext::resumed(session_id, &checkpoint.stats));
        self.resume_with_context(source, ctx, checkpoint)
    }

    /// Resumes under an externally held context.
    pub fn resume_with_context<S: RecordSource>(
        &self,
        source: S,
        ctx: Arc<SessionContext>,
        checkpoint: Checkpoint,
    ) -> EngineResult<ImportSession> {
        self.drive(source, ctx, Some(checkpoint))
    }

    fn drive<S: RecordSource>(
        &self,
        mut source: S,
        ctx: Arc<SessionContext>,
        resume_from: Option<Checkpoint>,
    ) -> EngineResult<ImportSession> {
        let revalidate = resume_from.is_some();
        let (mut committed, mut sequence) = match &resume_from {
            Some(checkpoint) => {
                source.seek(checkpoint.offset)?;
                (checkpoint.offset, checkpoint.sequence)
            }
            None => (0, 0),
        };
        let mut cursor = committed;

        ctx.stats().set_offset(committed);
        ctx.set_total_records(source.size_hint());
        ctx.set_state(SessionState::Running);
        tracing::info!(
            session_id = %ctx.id(),
            resumed = revalidate,
            offset = committed,
            "import session started",
        );

        let mut batch_size = AdaptiveBatchSize::new(self.config.batch.clone());
        ctx.stats().set_current_batch_size(batch_size.current() as u64);

        let outcome = loop {
            // Pause parks the pipeline between batches; the worker pool
            // is idle while parked.
            if ctx.pause_requested() && !ctx.cancel_requested() {
                ctx.set_state(SessionState::Paused);
                tracing::info!(session_id = %ctx.id(), "session paused");
                while ctx.pause_requested() && !ctx.cancel_requested() {
                    thread::sleep(PAUSE_POLL);
                }
                ctx.set_state(SessionState::Running);
                tracing::info!(session_id = %ctx.id(), "session resumed from pause");
            }

            // Checkpoint-aligned cancellation: the previous batch has
            // already committed, so the session is resumable from here.
            if ctx.cancel_requested() {
                break SessionOutcome::Cancelled;
            }

            let batch = match pull_batch(&mut source, batch_size.current()) {
                Ok(batch) => batch,
                Err(error) => break SessionOutcome::Fatal(error.into()),
            };
            if batch.is_empty() {
                break SessionOutcome::Completed;
            }
            let consumed = batch.len() as u64;

            let clean = match self.process_batch(&batch, revalidate, &ctx) {
                Ok(clean) => clean,
                Err(error) => break SessionOutcome::Fatal(error),
            };

            // Checkpoint advance happens strictly after every write in
            // the batch has been acknowledged.
            sequence += 1;
            cursor += consumed;
            let checkpoint = Checkpoint::new(ctx.id(), sequence, cursor, ctx.stats().snapshot());
            if let Err(error) = self.checkpoints.save(&checkpoint) {
                break SessionOutcome::Fatal(error.into());
            }
            committed = cursor;
            ctx.stats().record_checkpoint();
            ctx.stats().record_batch();
            ctx.stats().set_offset(committed);

            if clean {
                batch_size.record_success();
            } else {
                batch_size.record_failure();
            }
            ctx.stats().set_current_batch_size(batch_size.current() as u64);

            if sequence % self.config.release_interval == 0 {
                self.index.shrink_to_fit();
                tracing::debug!(session_id = %ctx.id(), sequence, "memory release point");
            }
        };

        let (state, error) = match outcome {
            SessionOutcome::Completed => (SessionState::Completed, None),
            SessionOutcome::Cancelled => (SessionState::Cancelled, None),
            SessionOutcome::Fatal(error) => {
                tracing::error!(
                    session_id = %ctx.id(),
                    error = %error,
                    committed_offset = committed,
                    "session aborted; last checkpoint intact",
                );
                (SessionState::Aborted, Some(error.to_string()))
            }
        };
        ctx.set_state(state);

        let stats = ctx.stats().snapshot();
        tracing::info!(
            session_id = %ctx.id(),
            state = %state,
            processed = stats.processed,
            succeeded = stats.succeeded,
            duplicates = stats.duplicates,
            failed = stats.failed,
            "import session finished",
        );

        Ok(ImportSession {
            id: ctx.id(),
            started_at: ctx.started_at(),
            finished_at: Some(Utc::now()),
            state,
            total_records: ctx.total_records(),
            last_checkpoint_offset: committed,
            stats,
            error,
        })
    }

    /// Processes one batch window: classify, resolve contacts, write.
    ///
    /// Returns whether the batch was clean (no failed records). A
    /// permanent remote error is returned as `Err` and aborts the
    /// session before its checkpoint.
    fn process_batch(
        &self,
        records: &[Record],
        revalidate: bool,
        ctx: &SessionContext,
    ) -> EngineResult<bool> {
        let mut writes: Vec<&Record> = Vec::new();

        for record in records {
            if let Err(error) = EmailAddress::parse(&record.sender) {
                ctx.stats().record_invalid();
                self.contacts.record_invalid();
                tracing::warn!(
                    record_id = %record.id,
                    error = %error,
                    "record rejected: invalid sender address",
                );
                continue;
            }

            let decision = if revalidate {
                self.resolver.revalidate(record, &self.index)
            } else {
                self.resolver.resolve(record, &self.index)
            };
            match decision.outcome {
                MatchOutcome::Duplicate => ctx.stats().record_duplicate(),
                MatchOutcome::Ambiguous => {
                    ctx.stats().record_ambiguous();
                    self.review.push(record.clone(), decision);
                }
                MatchOutcome::New => writes.push(record),
            }
        }

        if writes.is_empty() {
            return Ok(true);
        }

        let resolved = self.resolve_batch_contacts(&writes, ctx)?;
        self.write_batch(&writes, &resolved, ctx)
    }

    /// Resolves every address the batch references to a ContactRef.
    fn resolve_batch_contacts(
        &self,
        writes: &[&Record],
        ctx: &SessionContext,
    ) -> EngineResult<HashMap<String, ContactRef>> {
        let mut requests: BTreeMap<String, ContactRequest> = BTreeMap::new();
        for record in writes {
            if let Ok(email) = EmailAddress::parse(&record.sender) {
                requests
                    .entry(email.as_str().to_string())
                    .or_insert_with(|| ContactRequest::new(email));
            }
            for recipient in &record.recipients {
                match EmailAddress::parse(recipient) {
                    Ok(email) => {
                        requests
                            .entry(email.as_str().to_string())
                            .or_insert_with(|| ContactRequest::new(email));
                    }
                    Err(error) => {
                        ctx.stats().record_invalid();
                        self.contacts.record_invalid();
                        tracing::warn!(
                            record_id = %record.id,
                            recipient = %recipient,
                            error = %error,
                            "skipping invalid recipient address",
                        );
                    }
                }
            }
        }

        let request_list: Vec<ContactRequest> = requests.into_values().collect();
        let batch = self.contacts.ensure_contacts(&request_list);

        let mut resolved: HashMap<String, ContactRef> = batch
            .resolved
            .into_iter()
            .map(|contact| (contact.email.as_str().to_string(), contact))
            .collect();

        // First-pass failures go through the shared retry policy.
        for (email, first_error) in batch.failures {
            if !first_error.is_transient() {
                return Err(first_error.into());
            }
            let (result, retries) =
                retry_remote(&self.config.retry, || self.contacts.resolve_or_create(&email, None));
            ctx.stats().add_retries(u64::from(retries));
            match result {
                Ok(contact) => {
                    resolved.insert(email.as_str().to_string(), contact);
                }
                Err(error) if error.is_transient() => {
                    tracing::warn!(
                        email = %email,
                        error = %error,
                        "contact unresolved after retries; records proceed without the link",
                    );
                }
                Err(error) => return Err(error.into()),
            }
        }

        Ok(resolved)
    }

    /// Issues the batch's creates across the worker pool and accounts
    /// for every outcome in source order.
    fn write_batch(
        &self,
        writes: &[&Record],
        resolved: &HashMap<String, ContactRef>,
        ctx: &SessionContext,
    ) -> EngineResult<bool> {
        let worker_count = self.config.workers.min(writes.len()).max(1);
        let chunk_size = writes.len().div_ceil(worker_count);
        let retry = &self.config.retry;
        let writer = &self.writer;

        let results: EngineResult<Vec<(usize, Result<RemoteId, RemoteError>, u32)>> =
            thread::scope(|scope| {
                let mut handles = Vec::with_capacity(worker_count);
                for (chunk_index, chunk) in writes.chunks(chunk_size).enumerate() {
                    handles.push(scope.spawn(move || {
                        let mut out = Vec::with_capacity(chunk.len());
                        for (i, record) in chunk.iter().enumerate() {
                            let refs = linked_contacts(record, resolved);
                            let (result, retries) =
                                retry_remote(retry, || writer.create_record(record, &refs));
                            out.push((chunk_index * chunk_size + i, result, retries));
                        }
                        out
                    }));
                }

                let mut results = Vec::with_capacity(writes.len());
                for handle in handles {
                    let chunk = handle.join().map_err(|_| EngineError::WorkerTerminated)?;
                    results.extend(chunk);
                }
                Ok(results)
            });
        let mut results = results?;
        results.sort_by_key(|(index, _, _)| *index);

        let mut clean = true;
        let mut fatal: Option<EngineError> = None;
        for (index, result, retries) in results {
            let record = writes[index];
            ctx.stats().add_retries(u64::from(retries));
            match result {
                Ok(remote_id) => {
                    // Status update is best-effort; the record exists
                    // remotely either way.
                    if let Err(error) =
                        self.writer.update_status(&remote_id, RecordStatus::Completed)
                    {
                        tracing::warn!(
                            record_id = %record.id,
                            remote_id = %remote_id,
                            error = %error,
                            "status update failed",
                        );
                    }
                    let fingerprints = compute_fingerprints(record, self.resolver.config());
                    self.index.insert(record, &fingerprints);
                    ctx.stats().record_succeeded();
                }
                Err(error) if error.is_transient() => {
                    ctx.stats().record_failed();
                    clean = false;
                    tracing::warn!(
                        record_id = %record.id,
                        error = %error,
                        "record import failed after retries",
                    );
                }
                Err(error) => {
                    clean = false;
                    tracing::error!(
                        record_id = %record.id,
                        error = %error,
                        "permanent remote error",
                    );
                    if fatal.is_none() {
                        fatal = Some(error.into());
                    }
                }
            }
        }

        match fatal {
            Some(error) => Err(error),
            None => Ok(clean),
        }
    }
}

fn pull_batch<S: RecordSource>(source: &mut S, limit: usize) -> Result<Vec<Record>, SourceError> {
    let mut batch = Vec::with_capacity(limit);
    while batch.len() < limit {
        match source.next_record()? {
            Some(record) => batch.push(record),
            None => break,
        }
    }
    Ok(batch)
}

fn linked_contacts(record: &Record, resolved: &HashMap<String, ContactRef>) -> Vec<ContactRef> {
    let mut refs = Vec::with_capacity(1 + record.recipients.len());
    if let Some(contact) = resolved.get(&record.sender.trim().to_lowercase()) {
        refs.push(contact.clone());
    }
    for recipient in &record.recipients {
        if let Some(contact) = resolved.get(&recipient.trim().to_lowercase()) {
            refs.push(contact.clone());
        }
    }
    refs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::BatchConfig;
    use crate::checkpoint::MemoryCheckpointStore;
    use crate::remote::{MemoryRemote, MemorySource};
    use crate::retry::RetryConfig;
    use chrono::TimeZone;
    use mailsync_core::RecordId;

    fn record(id: &str, secs: i64, sender: &str) -> Record {
        Record::new(id, Utc.timestamp_opt(secs, 0).unwrap(), sender)
            .with_recipient("inbox@local.test")
            .with_subject(format!("subject for {id}"))
            .with_body_hash(format!("hash-{id}"))
            .with_message_id(format!("<{id}@mail.test>"))
    }

    fn engine_with(
        config: EngineConfig,
    ) -> (ImportEngine<MemoryRemote, MemoryCheckpointStore>, Arc<MemoryRemote>) {
        let remote = Arc::new(MemoryRemote::new());
        let engine = ImportEngine::with_shared(
            config,
            Arc::clone(&remote),
            Arc::new(MemoryCheckpointStore::new()),
            Arc::new(RecordIndex::new(&mailsync_core::MatchConfig::default())),
            Arc::new(ContactCache::new()),
        );
        (engine, remote)
    }

    fn quick_config() -> EngineConfig {
        EngineConfig::new()
            .with_batch(BatchConfig::new().with_initial(10).with_bounds(2, 20))
            .with_retry(RetryConfig::no_retry())
    }

    #[test]
    fn imports_all_unique_records() {
        let (engine, remote) = engine_with(quick_config());
        let records: Vec<Record> = (0..5)
            .map(|i| {
                record(
                    &format!("r-{i}"),
                    1_700_000_000 + i * 3_600,
                    &format!("sender{i}@example.com"),
                )
            })
            .collect();

        let session = engine.run_session(MemorySource::new(records)).unwrap();

        assert_eq!(session.state, SessionState::Completed);
        assert_eq!(session.stats.succeeded, 5);
        assert_eq!(session.stats.failed, 0);
        assert_eq!(session.stats.duplicates, 0);
        assert_eq!(session.stats.processed, 5);
        assert_eq!(session.last_checkpoint_offset, 5);
        assert_eq!(remote.created_records().len(), 5);

        let checkpoint = engine.load_checkpoint(session.id).unwrap().unwrap();
        assert_eq!(checkpoint.offset, 5);
        assert_eq!(checkpoint.stats.succeeded, 5);
    }

    #[test]
    fn shared_transport_id_scenario() {
        // Records #1 and #3 share a transport id, #2 is unique.
        let (engine, remote) = engine_with(quick_config());
        let base = 1_700_000_000;
        let records = vec![
            Record::new("r-1", Utc.timestamp_opt(base, 0).unwrap(), "alice@example.com")
                .with_recipient("inbox@local.test")
                .with_subject("quarterly budget review")
                .with_body_hash("hash-r-1")
                .with_message_id("<r-1@mail.test>"),
            Record::new("r-2", Utc.timestamp_opt(base + 60, 0).unwrap(), "bridget@example.com")
                .with_recipient("inbox@local.test")
                .with_subject("completely unrelated picnic")
                .with_body_hash("hash-r-2"),
            Record::new("r-3", Utc.timestamp_opt(base + 120, 0).unwrap(), "carol@example.com")
                .with_subject("something else entirely")
                .with_message_id("<r-1@mail.test>"),
        ];

        let session = engine.run_session(MemorySource::new(records)).unwrap();

        assert_eq!(session.stats.succeeded, 2);
        assert_eq!(session.stats.duplicates, 1);
        assert_eq!(session.stats.ambiguous, 0);
        assert_eq!(
            remote.created_records(),
            vec![RecordId::new("r-1"), RecordId::new("r-2")]
        );
    }

    #[test]
    fn invalid_sender_is_counted_not_fatal() {
        let (engine, remote) = engine_with(quick_config());
        let records = vec![
            record("r-1", 1_700_000_000, "not-an-address"),
            record("r-2", 1_700_000_060, "fine@example.com"),
        ];

        let session = engine.run_session(MemorySource::new(records)).unwrap();

        assert_eq!(session.state, SessionState::Completed);
        assert_eq!(session.stats.invalid, 1);
        assert_eq!(session.stats.succeeded, 1);
        // The invalid record is excluded from processed but consumed
        // from the stream.
        assert_eq!(session.stats.processed, 1);
        assert_eq!(session.last_checkpoint_offset, 2);
        assert_eq!(remote.created_records(), vec![RecordId::new("r-2")]);
    }

    #[test]
    fn contacts_are_created_for_sender_and_recipients() {
        let (engine, remote) = engine_with(quick_config());
        let records = vec![
            record("r-1", 1_700_000_000, "alice@example.com"),
            record("r-2", 1_700_010_000, "alice@example.com"),
        ];

        engine.run_session(MemorySource::new(records)).unwrap();

        assert!(remote.contact("alice@example.com").is_some());
        assert!(remote.contact("inbox@local.test").is_some());
        // Shared addresses resolve once, not once per record.
        assert_eq!(remote.create_contact_calls(), 2);
        assert_eq!(engine.contact_stats().created, 2);
    }

    #[test]
    fn transient_failure_exhausts_retries_and_counts_failed() {
        let (engine, remote) = engine_with(quick_config());
        remote.fail_record("r-1", RemoteError::unavailable("outage"));

        let session = engine
            .run_session(MemorySource::new(vec![record("r-1", 1_700_000_000, "a@example.com")]))
            .unwrap();

        assert_eq!(session.state, SessionState::Completed);
        assert_eq!(session.stats.failed, 1);
        assert_eq!(session.stats.succeeded, 0);
        assert!(remote.created_records().is_empty());
    }

    #[test]
    fn transient_failure_recovers_within_retry_budget() {
        let config = quick_config().with_retry(
            RetryConfig::new(3).with_initial_delay(Duration::from_millis(1)),
        );
        let (engine, remote) = engine_with(config);
        remote.fail_record("r-1", RemoteError::unavailable("blip"));

        let session = engine
            .run_session(MemorySource::new(vec![record("r-1", 1_700_000_000, "a@example.com")]))
            .unwrap();

        assert_eq!(session.stats.succeeded, 1);
        assert_eq!(session.stats.failed, 0);
        assert!(session.stats.retries >= 1);
    }

    #[test]
    fn permanent_error_aborts_with_checkpoint_intact() {
        let config = quick_config().with_batch(BatchConfig::new().with_initial(2).with_bounds(2, 2));
        let (engine, remote) = engine_with(config);
        // First batch of two is fine; the third record hits an auth
        // failure.
        remote.fail_record("r-3", RemoteError::unauthorized("expired credentials"));

        let records = vec![
            record("r-1", 1_700_000_000, "a@example.com"),
            record("r-2", 1_700_010_000, "b@example.com"),
            record("r-3", 1_700_020_000, "c@example.com"),
            record("r-4", 1_700_030_000, "d@example.com"),
        ];
        let session = engine.run_session(MemorySource::new(records)).unwrap();

        assert_eq!(session.state, SessionState::Aborted);
        assert!(session.error.as_deref().unwrap_or("").contains("unauthorized"));
        // Only the first batch was checkpointed.
        assert_eq!(session.last_checkpoint_offset, 2);
        let checkpoint = engine.load_checkpoint(session.id).unwrap().unwrap();
        assert_eq!(checkpoint.offset, 2);
    }

    #[test]
    fn checkpoint_write_failure_is_fatal() {
        let (engine, _remote) = engine_with(quick_config());
        engine.checkpoints().set_fail_saves(true);

        let session = engine
            .run_session(MemorySource::new(vec![record("r-1", 1_700_000_000, "a@example.com")]))
            .unwrap();

        assert_eq!(session.state, SessionState::Aborted);
        assert_eq!(session.last_checkpoint_offset, 0);
    }

    #[test]
    fn cancel_before_start_is_honored() {
        let (engine, remote) = engine_with(quick_config());
        let ctx = Arc::new(SessionContext::new());
        ctx.request_cancel();

        let session = engine
            .run_with_context(
                MemorySource::new(vec![record("r-1", 1_700_000_000, "a@example.com")]),
                ctx,
            )
            .unwrap();

        assert_eq!(session.state, SessionState::Cancelled);
        assert_eq!(session.stats.processed, 0);
        assert!(remote.created_records().is_empty());
    }

    #[test]
    fn resume_without_checkpoint_is_an_error() {
        let (engine, _remote) = engine_with(quick_config());
        let result = engine.resume_session(Uuid::new_v4(), MemorySource::new(Vec::new()));
        assert!(matches!(result, Err(EngineError::NoCheckpoint { .. })));
    }
}
