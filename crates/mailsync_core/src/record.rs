//! Archive record model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Identifier of a record within its archive source.
///
/// Record ids are opaque strings assigned by the archive parser. They are
/// unique within one source stream and stable across re-reads, which is
/// what makes checkpoint-based resume possible.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId(String);

impl RecordId {
    /// Creates a record id from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// A single record pulled from the archive source.
///
/// The archive parser (out of scope for this crate) is responsible for
/// producing well-formed field values; the body is never carried here,
/// only its hash, so a session holds one batch window of lightweight
/// records at a time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Archive-assigned record id.
    pub id: RecordId,
    /// When the record was originally produced, in UTC.
    pub source_timestamp: DateTime<Utc>,
    /// Sender address.
    pub sender: String,
    /// Recipient addresses. Ordered set so derived fingerprints are
    /// independent of archive enumeration order.
    pub recipients: BTreeSet<String>,
    /// Subject line. Empty when the source had none.
    #[serde(default)]
    pub subject: String,
    /// Hex hash of the normalized body, computed by the archive parser.
    /// Empty when the source record had no body.
    #[serde(default)]
    pub body_hash: String,
    /// Transport-level message identifier, when the source preserved one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    /// Record size in bytes as reported by the archive.
    #[serde(default)]
    pub size: u64,
}

impl Record {
    /// Creates a record with the mandatory fields.
    pub fn new(
        id: impl Into<RecordId>,
        source_timestamp: DateTime<Utc>,
        sender: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source_timestamp,
            sender: sender.into(),
            recipients: BTreeSet::new(),
            subject: String::new(),
            body_hash: String::new(),
            message_id: None,
            size: 0,
        }
    }

    /// Adds a recipient address.
    #[must_use]
    pub fn with_recipient(mut self, recipient: impl Into<String>) -> Self {
        self.recipients.insert(recipient.into());
        self
    }

    /// Sets the subject line.
    #[must_use]
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    /// Sets the body hash.
    #[must_use]
    pub fn with_body_hash(mut self, body_hash: impl Into<String>) -> Self {
        self.body_hash = body_hash.into();
        self
    }

    /// Sets the transport message id.
    #[must_use]
    pub fn with_message_id(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = Some(message_id.into());
        self
    }

    /// Sets the record size in bytes.
    #[must_use]
    pub fn with_size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    /// Returns the recipients joined into a single canonical key.
    ///
    /// Because `recipients` is an ordered set, two records with the same
    /// addresses always produce the same key.
    pub fn recipients_key(&self) -> String {
        let mut key = String::new();
        for (i, recipient) in self.recipients.iter().enumerate() {
            if i > 0 {
                key.push(',');
            }
            key.push_str(&recipient.to_lowercase());
        }
        key
    }
}

impl From<String> for RecordId {
    fn from(id: String) -> Self {
        Self(id)
    }
}
