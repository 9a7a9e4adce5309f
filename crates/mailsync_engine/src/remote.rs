//! Abstract interfaces to the archive source and the remote system.
//!
//! The engine never speaks a wire protocol. It consumes the archive
//! through [`RecordSource`] and the remote system through
//! [`RemoteWriter`], which lets tests (and dry runs) substitute
//! in-memory implementations for the real transport.

use crate::contact::{ContactFields, ContactRef, EmailAddress};
use mailsync_core::{Record, RecordId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Identifier assigned by the remote system when a record is created.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemoteId(String);

impl RemoteId {
    /// Creates a remote id from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Workflow status of an imported record at the remote system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordStatus {
    /// Newly created, still open for processing.
    Open,
    /// Import finished; the record is closed at the remote.
    Completed,
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordStatus::Open => f.write_str("open"),
            RecordStatus::Completed => f.write_str("completed"),
        }
    }
}

/// Errors surfaced by the archive source.
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    /// The source could not be read.
    #[error("source read failed: {message}")]
    Read {
        /// Description of the failure.
        message: String,
    },

    /// A seek target lies beyond the end of the stream.
    #[error("seek offset {offset} is out of range")]
    SeekOutOfRange {
        /// The requested offset.
        offset: u64,
    },
}

impl SourceError {
    /// Creates a read error.
    pub fn read(message: impl Into<String>) -> Self {
        Self::Read {
            message: message.into(),
        }
    }
}

/// Errors surfaced by the remote system.
///
/// The split between transient and permanent variants drives the retry
/// policy: transient errors are retried with backoff, permanent errors
/// abort the session immediately.
#[derive(Debug, Clone, Error)]
pub enum RemoteError {
    /// The call did not complete within its timeout. Counts as a
    /// transient failure, never as silent success.
    #[error("remote call timed out after {timeout:?}")]
    Timeout {
        /// The timeout that elapsed.
        timeout: Duration,
    },

    /// The remote asked us to slow down.
    #[error("rate limited: {message}")]
    RateLimited {
        /// Description from the remote.
        message: String,
    },

    /// The remote failed transiently (5xx-class).
    #[error("remote unavailable: {message}")]
    Unavailable {
        /// Description of the failure.
        message: String,
    },

    /// Authentication or permission failure. Retry cannot help.
    #[error("unauthorized: {message}")]
    Unauthorized {
        /// Description of the failure.
        message: String,
    },

    /// The remote rejected the request (non-rate-limit 4xx-class).
    #[error("request rejected: {message}")]
    Rejected {
        /// Description of the rejection.
        message: String,
    },
}

impl RemoteError {
    /// Creates a timeout error.
    pub fn timeout(timeout: Duration) -> Self {
        Self::Timeout { timeout }
    }

    /// Creates a rate-limit error.
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::RateLimited {
            message: message.into(),
        }
    }

    /// Creates a transient unavailability error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Creates a permanent authorization error.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    /// Creates a permanent rejection error.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }

    /// Returns true if the error is worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RemoteError::Timeout { .. }
                | RemoteError::RateLimited { .. }
                | RemoteError::Unavailable { .. }
        )
    }
}

/// A stream of records pulled from the local archive.
///
/// Offsets count records from the start of the stream and are stable
/// across re-opens, which is what checkpoints rely on.
pub trait RecordSource {
    /// Returns the next record, or `None` at end of stream.
    fn next_record(&mut self) -> Result<Option<Record>, SourceError>;

    /// Repositions the stream so the next read returns the record at
    /// `offset`.
    fn seek(&mut self, offset: u64) -> Result<(), SourceError>;

    /// Total number of records, when the source knows it up front.
    fn size_hint(&self) -> Option<u64> {
        None
    }
}

/// Write-side interface to the remote system.
///
/// Implementations enforce the per-call timeout themselves and surface
/// it as [`RemoteError::Timeout`].
pub trait RemoteWriter: Send + Sync {
    /// Creates a record at the remote, linked to the given contacts.
    fn create_record(
        &self,
        record: &Record,
        contacts: &[ContactRef],
    ) -> Result<RemoteId, RemoteError>;

    /// Looks up a contact by email address.
    fn find_contact(&self, email: &EmailAddress) -> Result<Option<ContactRef>, RemoteError>;

    /// Creates a contact at the remote.
    fn create_contact(&self, fields: &ContactFields) -> Result<ContactRef, RemoteError>;

    /// Updates the workflow status of an imported record.
    fn update_status(&self, remote_id: &RemoteId, status: RecordStatus)
        -> Result<(), RemoteError>;
}

/// An in-memory record source for tests and fixtures.
#[derive(Debug, Default)]
pub struct MemorySource {
    records: Vec<Record>,
    position: usize,
}

impl MemorySource {
    /// Creates a source over the given records.
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            records,
            position: 0,
        }
    }

    /// Current read position.
    pub fn position(&self) -> u64 {
        self.position as u64
    }
}

impl RecordSource for MemorySource {
    fn next_record(&mut self) -> Result<Option<Record>, SourceError> {
        match self.records.get(self.position) {
            Some(record) => {
                self.position += 1;
                Ok(Some(record.clone()))
            }
            None => Ok(None),
        }
    }

    fn seek(&mut self, offset: u64) -> Result<(), SourceError> {
        if offset > self.records.len() as u64 {
            return Err(SourceError::SeekOutOfRange { offset });
        }
        self.position = offset as usize;
        Ok(())
    }

    fn size_hint(&self) -> Option<u64> {
        Some(self.records.len() as u64)
    }
}

#[derive(Debug, Default)]
struct MemoryRemoteState {
    records: HashMap<RecordId, RemoteId>,
    created_order: Vec<RecordId>,
    contacts: HashMap<String, ContactRef>,
    statuses: HashMap<RemoteId, RecordStatus>,
    record_failures: HashMap<RecordId, VecDeque<RemoteError>>,
    contact_failures: HashMap<String, VecDeque<RemoteError>>,
    next_id: u64,
    create_record_calls: u64,
    create_contact_calls: u64,
    find_contact_calls: u64,
}

/// An in-memory remote for testing.
///
/// Failures can be scripted per record or contact; each scripted error
/// is consumed by one call, so a single injected transient error
/// exercises the retry path.
#[derive(Debug, Default)]
pub struct MemoryRemote {
    state: Mutex<MemoryRemoteState>,
}

impl MemoryRemote {
    /// Creates an empty remote.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a contact that already exists at the remote.
    pub fn seed_contact(&self, contact: ContactRef) {
        let mut state = self.state.lock();
        state.contacts.insert(contact.email.as_str().to_string(), contact);
    }

    /// Scripts the next `create_record` call for this record to fail.
    pub fn fail_record(&self, record_id: impl Into<RecordId>, error: RemoteError) {
        self.state
            .lock()
            .record_failures
            .entry(record_id.into())
            .or_default()
            .push_back(error);
    }

    /// Scripts the next `create_contact` call for this address to fail.
    pub fn fail_contact(&self, email: &str, error: RemoteError) {
        self.state
            .lock()
            .contact_failures
            .entry(email.to_lowercase())
            .or_default()
            .push_back(error);
    }

    /// Record ids created at the remote, in creation order.
    pub fn created_records(&self) -> Vec<RecordId> {
        self.state.lock().created_order.clone()
    }

    /// Returns the contact stored for an address, if any.
    pub fn contact(&self, email: &str) -> Option<ContactRef> {
        self.state.lock().contacts.get(&email.to_lowercase()).cloned()
    }

    /// Returns the status recorded for a remote id, if any.
    pub fn status(&self, remote_id: &RemoteId) -> Option<RecordStatus> {
        self.state.lock().statuses.get(remote_id).copied()
    }

    /// Number of `create_record` calls observed.
    pub fn create_record_calls(&self) -> u64 {
        self.state.lock().create_record_calls
    }

    /// Number of `create_contact` calls observed.
    pub fn create_contact_calls(&self) -> u64 {
        self.state.lock().create_contact_calls
    }

    /// Number of `find_contact` calls observed.
    pub fn find_contact_calls(&self) -> u64 {
        self.state.lock().find_contact_calls
    }
}

impl RemoteWriter for MemoryRemote {
    fn create_record(
        &self,
        record: &Record,
        _contacts: &[ContactRef],
    ) -> Result<RemoteId, RemoteError> {
        let mut state = self.state.lock();
        state.create_record_calls += 1;

        if let Some(queue) = state.record_failures.get_mut(&record.id) {
            if let Some(error) = queue.pop_front() {
                return Err(error);
            }
        }

        if let Some(existing) = state.records.get(&record.id) {
            // A re-create of an existing record is an upstream bug;
            // surface it instead of silently succeeding.
            return Err(RemoteError::rejected(format!(
                "record {} already exists as {}",
                record.id, existing
            )));
        }

        state.next_id += 1;
        let remote_id = RemoteId::new(format!("rem-{}", state.next_id));
        state.records.insert(record.id.clone(), remote_id.clone());
        state.created_order.push(record.id.clone());
        state.statuses.insert(remote_id.clone(), RecordStatus::Open);
        Ok(remote_id)
    }

    fn find_contact(&self, email: &EmailAddress) -> Result<Option<ContactRef>, RemoteError> {
        let mut state = self.state.lock();
        state.find_contact_calls += 1;
        Ok(state.contacts.get(email.as_str()).cloned())
    }

    fn create_contact(&self, fields: &ContactFields) -> Result<ContactRef, RemoteError> {
        let mut state = self.state.lock();
        state.create_contact_calls += 1;

        let key = fields.email.as_str().to_string();
        if let Some(queue) = state.contact_failures.get_mut(&key) {
            if let Some(error) = queue.pop_front() {
                return Err(error);
            }
        }

        if state.contacts.contains_key(&key) {
            return Err(RemoteError::rejected(format!(
                "contact {key} already exists"
            )));
        }

        state.next_id += 1;
        let contact = ContactRef {
            email: fields.email.clone(),
            display_name: fields.display_name.clone(),
            company: fields.company.clone(),
            remote_id: RemoteId::new(format!("con-{}", state.next_id)),
        };
        state.contacts.insert(key, contact.clone());
        Ok(contact)
    }

    fn update_status(
        &self,
        remote_id: &RemoteId,
        status: RecordStatus,
    ) -> Result<(), RemoteError> {
        let mut state = self.state.lock();
        match state.statuses.get_mut(remote_id) {
            Some(slot) => {
                *slot = status;
                Ok(())
            }
            None => Err(RemoteError::rejected(format!(
                "unknown remote id {remote_id}"
            ))),
        }
    }
}
