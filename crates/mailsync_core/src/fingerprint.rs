//! Fingerprint derivation.
//!
//! A fingerprint is a comparable signal derived from a record. Each kind
//! carries an inherent trust level; the resolver cascade evaluates them
//! in trust order. Derivation is a pure function of the record and the
//! matching configuration: a missing optional field simply omits that
//! fingerprint kind, never an error.

use crate::config::MatchConfig;
use crate::record::{Record, RecordId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

/// The kind of signal a fingerprint encodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FingerprintKind {
    /// Exact transport-level message identifier.
    TransportId,
    /// Hash over normalized subject, body hash, and sender.
    ContentHash,
    /// Coarse (sender, recipient set, rounded timestamp) triple.
    Participants,
    /// Token-level subject signature for similarity scoring.
    SubjectSignature,
}

impl FingerprintKind {
    /// Inherent trust level of this fingerprint kind.
    pub fn trust(&self) -> Trust {
        match self {
            FingerprintKind::TransportId => Trust::Exact,
            FingerprintKind::ContentHash => Trust::Strong,
            FingerprintKind::Participants => Trust::Coarse,
            FingerprintKind::SubjectSignature => Trust::Weak,
        }
    }
}

/// Trust levels, ordered strongest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Trust {
    /// Globally unique identifier equality.
    Exact,
    /// Content-derived hash equality.
    Strong,
    /// Bucketed metadata equality.
    Coarse,
    /// Fuzzy similarity input.
    Weak,
}

/// A derived, comparable identity signal for one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fingerprint {
    /// The record this fingerprint was derived from.
    pub record_id: RecordId,
    /// Which signal this is.
    pub kind: FingerprintKind,
    /// Canonical string value used for index lookups.
    pub value: String,
    /// Inherent trust level, copied from the kind for convenience.
    pub trust: Trust,
}

impl Fingerprint {
    fn new(record_id: &RecordId, kind: FingerprintKind, value: String) -> Self {
        Self {
            record_id: record_id.clone(),
            kind,
            trust: kind.trust(),
            value,
        }
    }
}

/// Derives all available fingerprints for a record.
///
/// Produces at most one fingerprint per kind. `Participants` is always
/// present (sender and timestamp are mandatory fields); the other kinds
/// are omitted when their underlying field is absent.
pub fn compute_fingerprints(record: &Record, config: &MatchConfig) -> Vec<Fingerprint> {
    let mut fingerprints = Vec::with_capacity(4);

    if let Some(message_id) = record.message_id.as_deref() {
        let normalized = normalize_message_id(message_id);
        if !normalized.is_empty() {
            fingerprints.push(Fingerprint::new(
                &record.id,
                FingerprintKind::TransportId,
                normalized,
            ));
        }
    }

    if let Some(hash) = content_hash(record) {
        fingerprints.push(Fingerprint::new(
            &record.id,
            FingerprintKind::ContentHash,
            hash,
        ));
    }

    let window = window_index(record.source_timestamp, config.window_seconds());
    fingerprints.push(Fingerprint::new(
        &record.id,
        FingerprintKind::Participants,
        participants_value(&record.sender, &record.recipients_key(), window),
    ));

    let signature = subject_signature(&record.subject);
    if !signature.is_empty() {
        fingerprints.push(Fingerprint::new(
            &record.id,
            FingerprintKind::SubjectSignature,
            signature,
        ));
    }

    fingerprints
}

/// Strips angle brackets and whitespace from a transport message id and
/// lowercases it.
pub fn normalize_message_id(message_id: &str) -> String {
    message_id
        .trim()
        .trim_start_matches('<')
        .trim_end_matches('>')
        .trim()
        .to_lowercase()
}

/// Normalizes a subject for comparison: lowercased, punctuation stripped,
/// whitespace collapsed.
pub fn normalize_subject(subject: &str) -> String {
    let mut normalized = String::with_capacity(subject.len());
    let mut last_was_space = true;
    for ch in subject.chars() {
        if ch.is_alphanumeric() {
            normalized.extend(ch.to_lowercase());
            last_was_space = false;
        } else if !last_was_space {
            normalized.push(' ');
            last_was_space = true;
        }
    }
    if normalized.ends_with(' ') {
        normalized.pop();
    }
    normalized
}

/// Builds the token-level subject signature: normalized tokens,
/// deduplicated and sorted.
pub fn subject_signature(subject: &str) -> String {
    let normalized = normalize_subject(subject);
    let tokens: BTreeSet<&str> = normalized.split_whitespace().collect();
    let mut signature = String::with_capacity(normalized.len());
    for (i, token) in tokens.iter().enumerate() {
        if i > 0 {
            signature.push(' ');
        }
        signature.push_str(token);
    }
    signature
}

/// Maps a timestamp onto its coarse window index.
pub fn window_index(timestamp: DateTime<Utc>, window_seconds: i64) -> i64 {
    timestamp.timestamp().div_euclid(window_seconds)
}

/// Canonical value of the coarse participants fingerprint.
pub(crate) fn participants_value(sender: &str, recipients_key: &str, window: i64) -> String {
    format!("{}|{}|{}", sender.to_lowercase(), recipients_key, window)
}

/// Content hash over normalized subject, body hash, and sender.
///
/// Returns `None` when the record carries neither subject nor body hash;
/// sender alone is not content.
fn content_hash(record: &Record) -> Option<String> {
    let subject = normalize_subject(&record.subject);
    if subject.is_empty() && record.body_hash.is_empty() {
        return None;
    }

    let mut hasher = Sha256::new();
    hasher.update(subject.as_bytes());
    hasher.update([0u8]);
    hasher.update(record.body_hash.to_lowercase().as_bytes());
    hasher.update([0u8]);
    hasher.update(record.sender.to_lowercase().as_bytes());

    use std::fmt::Write;
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(64);
    for byte in digest {
        let _ = write!(hex, "{byte:02x}");
    }
    Some(hex)
}
