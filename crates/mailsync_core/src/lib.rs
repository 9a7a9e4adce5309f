//! # Mailsync Core
//!
//! Record model, fingerprinting, and duplicate resolution for Mailsync.
//!
//! This crate provides:
//! - The [`Record`] value type pulled from an archive source
//! - Fingerprint derivation ([`compute_fingerprints`])
//! - Similarity scoring for fuzzy matching
//! - A sharded, concurrently readable duplicate index ([`RecordIndex`])
//! - The strategy cascade that classifies records ([`DuplicateResolver`])
//!
//! This is a pure matching crate with no I/O operations. Remote systems,
//! checkpointing, and session orchestration live in `mailsync_engine`.
//!
//! ## Key Invariants
//!
//! - Decisions are deterministic given identical index state
//! - A DUPLICATE decision always cites the highest-confidence strategy
//!   that fired
//! - Index lookups are sub-linear: exact maps plus coarse buckets,
//!   never a full scan per incoming record

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod fingerprint;
mod index;
mod record;
mod resolver;
mod similarity;

pub use config::MatchConfig;
pub use fingerprint::{
    compute_fingerprints, normalize_message_id, normalize_subject, subject_signature,
    window_index, Fingerprint, FingerprintKind, Trust,
};
pub use index::{IndexEntry, RecordIndex};
pub use record::{Record, RecordId};
pub use resolver::{
    DuplicateResolver, MatchDecision, MatchOutcome, MatchStats, MatchStatsSnapshot, MatchStrategy,
};
pub use similarity::{edit_distance_ratio, subject_similarity, token_overlap};
