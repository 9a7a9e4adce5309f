//! Inspect command implementation.

use mailsync_engine::{Checkpoint, CheckpointStore, FileCheckpointStore};
use std::error::Error;
use std::path::Path;
use uuid::Uuid;

/// Shows checkpoint state for one session or lists all of them.
pub fn run(state_dir: &Path, session_id: Option<Uuid>, json: bool) -> Result<(), Box<dyn Error>> {
    let store = FileCheckpointStore::open(state_dir.join("checkpoints"))?;

    match session_id {
        Some(session_id) => {
            let checkpoint = store
                .load_latest(session_id)?
                .ok_or_else(|| format!("no checkpoint recorded for session {session_id}"))?;
            print_checkpoint(&checkpoint, json)
        }
        None => {
            let sessions = store.sessions()?;
            if sessions.is_empty() {
                println!("no checkpointed sessions");
                return Ok(());
            }
            for session_id in sessions {
                if let Some(checkpoint) = store.load_latest(session_id)? {
                    print_checkpoint(&checkpoint, json)?;
                }
            }
            Ok(())
        }
    }
}

fn print_checkpoint(checkpoint: &Checkpoint, json: bool) -> Result<(), Box<dyn Error>> {
    if json {
        println!("{}", serde_json::to_string_pretty(checkpoint)?);
        return Ok(());
    }

    println!(
        "Session {}  batch #{}  offset {}  at {}",
        checkpoint.session_id,
        checkpoint.sequence,
        checkpoint.offset,
        checkpoint.timestamp.to_rfc3339(),
    );
    println!(
        "  succeeded {} / duplicates {} / failed {} / ambiguous {} / invalid {}",
        checkpoint.stats.succeeded,
        checkpoint.stats.duplicates,
        checkpoint.stats.failed,
        checkpoint.stats.ambiguous,
        checkpoint.stats.invalid,
    );
    Ok(())
}
