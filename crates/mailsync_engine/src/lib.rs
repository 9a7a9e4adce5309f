//! # Mailsync Engine
//!
//! Batch import engine with checkpointed resume.
//!
//! This crate provides:
//! - The import scheduler with adaptive batch sizing
//! - Durable checkpointing (memory and file-backed stores)
//! - Contact resolution with idempotent creation
//! - Conflict detection and resolution
//! - Session lifecycle coordination (start, pause, resume, cancel)
//! - Retry with exponential backoff
//! - Abstract source/remote interfaces with in-memory test doubles
//!
//! ## Architecture
//!
//! A session pulls records from a [`RecordSource`] in source order,
//! classifies each against the shared duplicate index, resolves linked
//! contacts, writes NEW records through a bounded worker pool, and only
//! then commits a [`Checkpoint`]. Resume reopens the source at the last
//! committed offset and re-validates everything after it.
//!
//! ## Key Invariants
//!
//! - Checkpoint advance happens strictly after write acknowledgment
//! - A crash between write and checkpoint never double-imports
//! - `processed = succeeded + failed + duplicates` at every observation
//!   point
//! - Cancellation is checkpoint-aligned; cancelled sessions resume
//! - A contact's remote identity is assigned at most once per email

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod batch;
mod checkpoint;
mod config;
mod conflict;
mod contact;
mod coordinator;
mod engine;
mod error;
mod remote;
mod retry;
mod review;
mod session;

pub use batch::{AdaptiveBatchSize, BatchConfig};
pub use checkpoint::{
    Checkpoint, CheckpointError, CheckpointStore, FileCheckpointStore, MemoryCheckpointStore,
};
pub use config::EngineConfig;
pub use conflict::{
    last_write_wins, merge, Conflict, ConflictError, ConflictQueue, ConflictState,
    ConflictStrategy, EntityVersion, ManualResolution, SyncPoint,
};
pub use contact::{
    derive_contact_fields, derive_display_name, split_display_name, AddressError, CompanyTable,
    ContactBatch, ContactCache, ContactConfig, ContactFields, ContactRef, ContactRequest,
    ContactResolver, ContactStats, ContactStatsSnapshot, EmailAddress, MissingAnalysis,
};
pub use coordinator::SessionCoordinator;
pub use engine::ImportEngine;
pub use error::{EngineError, EngineResult};
pub use remote::{
    MemoryRemote, MemorySource, RecordSource, RecordStatus, RemoteError, RemoteId, RemoteWriter,
    SourceError,
};
pub use retry::{retry_remote, RetryConfig};
pub use review::{AmbiguousMatch, ReviewQueue};
pub use session::{
    ImportSession, ImportStats, ProgressSnapshot, SessionContext, SessionState,
    SessionStatsSnapshot,
};
