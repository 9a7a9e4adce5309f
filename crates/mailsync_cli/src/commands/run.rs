//! Run command implementation.

use crate::commands::{build_engine, check_outcome, print_session};
use crate::io::JsonlSource;
use std::error::Error;
use std::path::Path;

/// Runs a fresh import session over an archive dump.
pub fn run(
    state_dir: &Path,
    input: &Path,
    output: &Path,
    batch_size: Option<usize>,
    workers: Option<usize>,
    json: bool,
) -> Result<(), Box<dyn Error>> {
    let engine = build_engine(state_dir, output, batch_size, workers)?;
    let source = JsonlSource::open(input)?;

    let session = engine.run_session(source)?;
    print_session(&session, json)?;

    let review = engine.review().poll();
    if !review.is_empty() && !json {
        println!("  review:     {} record(s) awaiting manual classification", review.len());
    }

    check_outcome(&session)
}
