//! Resume command implementation.

use crate::commands::{build_engine, check_outcome, print_session};
use crate::io::JsonlSource;
use std::error::Error;
use std::path::Path;
use uuid::Uuid;

/// Resumes a checkpointed session over the same archive dump.
pub fn run(
    state_dir: &Path,
    session_id: Uuid,
    input: &Path,
    output: &Path,
    batch_size: Option<usize>,
    workers: Option<usize>,
    json: bool,
) -> Result<(), Box<dyn Error>> {
    let engine = build_engine(state_dir, output, batch_size, workers)?;
    let source = JsonlSource::open(input)?;

    let session = engine.resume_session(session_id, source)?;
    print_session(&session, json)?;
    check_outcome(&session)
}
