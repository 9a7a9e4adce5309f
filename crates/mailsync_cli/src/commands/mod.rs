//! CLI command implementations.

pub mod inspect;
pub mod resume;
pub mod run;

use crate::io::JsonlRemote;
use mailsync_core::{compute_fingerprints, RecordIndex};
use mailsync_engine::{
    BatchConfig, ContactCache, EngineConfig, FileCheckpointStore, ImportEngine, ImportSession,
    SessionState,
};
use std::error::Error;
use std::path::Path;
use std::sync::Arc;

/// Engine type used by the CLI commands.
pub type CliEngine = ImportEngine<JsonlRemote, FileCheckpointStore>;

/// Builds an engine over the state directory and export file, seeding
/// the duplicate index with everything a previous run already exported.
pub fn build_engine(
    state_dir: &Path,
    output: &Path,
    batch_size: Option<usize>,
    workers: Option<usize>,
) -> Result<CliEngine, Box<dyn Error>> {
    let mut batch = BatchConfig::new();
    if let Some(size) = batch_size {
        batch = batch.with_initial(size);
    }
    let mut config = EngineConfig::new().with_batch(batch);
    if let Some(workers) = workers {
        config = config.with_workers(workers);
    }

    let store = FileCheckpointStore::open(state_dir.join("checkpoints"))?;
    let remote = JsonlRemote::open(output)?;

    let index = Arc::new(RecordIndex::new(&config.matching));
    for record in remote.exported_records() {
        let fingerprints = compute_fingerprints(&record, &config.matching);
        index.insert(&record, &fingerprints);
    }
    if !index.is_empty() {
        tracing::info!(
            exported = index.len(),
            "seeded duplicate index from existing export",
        );
    }

    Ok(ImportEngine::with_shared(
        config,
        Arc::new(remote),
        Arc::new(store),
        index,
        Arc::new(ContactCache::new()),
    ))
}

/// Prints a finished session in the requested format.
pub fn print_session(session: &ImportSession, json: bool) -> Result<(), Box<dyn Error>> {
    if json {
        println!("{}", serde_json::to_string_pretty(session)?);
        return Ok(());
    }

    println!("Session {} {}", session.id, session.state);
    println!("  processed:  {}", session.stats.processed);
    println!("  succeeded:  {}", session.stats.succeeded);
    println!("  duplicates: {}", session.stats.duplicates);
    println!("  failed:     {}", session.stats.failed);
    println!("  ambiguous:  {}", session.stats.ambiguous);
    println!("  invalid:    {}", session.stats.invalid);
    println!("  batches:    {}", session.stats.batches);
    println!("  offset:     {}", session.last_checkpoint_offset);
    if let Some(error) = &session.error {
        println!("  error:      {error}");
    }
    Ok(())
}

/// Converts an aborted session into a command error.
pub fn check_outcome(session: &ImportSession) -> Result<(), Box<dyn Error>> {
    if session.state == SessionState::Aborted {
        return Err(session
            .error
            .clone()
            .unwrap_or_else(|| "session aborted".to_string())
            .into());
    }
    Ok(())
}
