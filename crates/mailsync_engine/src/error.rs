//! Error types for the import engine.
//!
//! Each variant names the exact condition it covers; there is no
//! catch-all. Per-record errors accumulate into session statistics,
//! per-batch fatal errors abort the session and leave the last
//! successful checkpoint intact.

use crate::checkpoint::CheckpointError;
use crate::remote::{RemoteError, SourceError};
use thiserror::Error;
use uuid::Uuid;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur while running an import session.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A record or address failed structural validation. Counted,
    /// never fatal to a batch.
    #[error("validation error: {message}")]
    Validation {
        /// Description of the validation failure.
        message: String,
    },

    /// A remote call failed. Transient errors were already retried by
    /// the time this surfaces.
    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    /// Progress could not be durably recorded. Fatal to the session.
    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    /// The archive source failed.
    #[error("source error: {0}")]
    Source(#[from] SourceError),

    /// No session with the given id is known.
    #[error("session not found: {session_id}")]
    SessionNotFound {
        /// The unknown session id.
        session_id: Uuid,
    },

    /// Resume was requested but no checkpoint exists.
    #[error("no checkpoint recorded for session {session_id}")]
    NoCheckpoint {
        /// The session without a checkpoint.
        session_id: Uuid,
    },

    /// The session worker thread terminated abnormally.
    #[error("session worker terminated abnormally")]
    WorkerTerminated,
}

impl EngineError {
    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Returns true if retrying the whole operation could help.
    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::Remote(error) => error.is_transient(),
            _ => false,
        }
    }
}
