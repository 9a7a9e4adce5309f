//! Sharded index of previously processed records.
//!
//! The index is the only matching structure shared between concurrent
//! import sessions, so it is an explicit synchronized service: every map
//! is split across shards guarded by their own `parking_lot::RwLock`,
//! routed by the lookup key. Lookups are sub-linear at scale: exact maps
//! for transport ids, content hashes, and subject signatures, plus
//! bucket maps keyed by coarse fingerprint and rounded timestamp window.
//! A full scan per incoming record never happens.

use crate::config::MatchConfig;
use crate::fingerprint::{
    normalize_subject, participants_value, window_index, Fingerprint, FingerprintKind,
};
use crate::record::{Record, RecordId};
use crate::resolver::MatchDecision;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A previously processed record as held by the index.
///
/// Carries only the fields the fuzzy strategies compare against; the
/// full record is released once its batch completes.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    /// Id of the indexed record.
    pub record_id: RecordId,
    /// Lowercased sender address.
    pub sender: String,
    /// Canonical recipients key.
    pub recipients_key: String,
    /// Coarse window the record's timestamp falls into.
    pub window: i64,
    /// Original source timestamp.
    pub timestamp: DateTime<Utc>,
    /// Normalized subject, empty when the record had none.
    pub subject_norm: String,
}

#[derive(Debug, Default)]
struct Shard {
    transport_ids: HashMap<String, RecordId>,
    content_hashes: HashMap<String, RecordId>,
    participants: HashMap<String, Vec<Arc<IndexEntry>>>,
    windows: HashMap<i64, Vec<Arc<IndexEntry>>>,
    signatures: HashMap<String, Vec<RecordId>>,
    records: HashSet<RecordId>,
    decisions: HashMap<RecordId, MatchDecision>,
}

/// Sharded index of known records with a match-decision cache.
///
/// The decision cache lives exactly as long as the index, which is what
/// makes replay after resume reproduce the original outcomes.
#[derive(Debug)]
pub struct RecordIndex {
    shards: Vec<RwLock<Shard>>,
    window_seconds: i64,
    len: AtomicUsize,
}

impl RecordIndex {
    /// Creates an index sized and windowed per the matching configuration.
    pub fn new(config: &MatchConfig) -> Self {
        let shard_count = config.shard_count.max(1);
        let mut shards = Vec::with_capacity(shard_count);
        for _ in 0..shard_count {
            shards.push(RwLock::new(Shard::default()));
        }
        Self {
            shards,
            window_seconds: config.window_seconds(),
            len: AtomicUsize::new(0),
        }
    }

    /// Number of indexed records.
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    /// Returns true if no records have been indexed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if the record id has already been indexed.
    pub fn contains(&self, record_id: &RecordId) -> bool {
        self.shard_for(record_id).read().records.contains(record_id)
    }

    /// Inserts a processed record and its fingerprints.
    ///
    /// Inserting the same record id twice is a no-op.
    pub fn insert(&self, record: &Record, fingerprints: &[Fingerprint]) {
        {
            let mut shard = self.shard_for(&record.id).write();
            if !shard.records.insert(record.id.clone()) {
                return;
            }
        }
        self.len.fetch_add(1, Ordering::Relaxed);

        let window = window_index(record.source_timestamp, self.window_seconds);
        let entry = Arc::new(IndexEntry {
            record_id: record.id.clone(),
            sender: record.sender.to_lowercase(),
            recipients_key: record.recipients_key(),
            window,
            timestamp: record.source_timestamp,
            subject_norm: normalize_subject(&record.subject),
        });

        for fingerprint in fingerprints {
            match fingerprint.kind {
                FingerprintKind::TransportId => {
                    self.shard_for(&fingerprint.value)
                        .write()
                        .transport_ids
                        .entry(fingerprint.value.clone())
                        .or_insert_with(|| record.id.clone());
                }
                FingerprintKind::ContentHash => {
                    self.shard_for(&fingerprint.value)
                        .write()
                        .content_hashes
                        .entry(fingerprint.value.clone())
                        .or_insert_with(|| record.id.clone());
                }
                FingerprintKind::Participants => {
                    self.shard_for(&fingerprint.value)
                        .write()
                        .participants
                        .entry(fingerprint.value.clone())
                        .or_default()
                        .push(Arc::clone(&entry));
                }
                FingerprintKind::SubjectSignature => {
                    self.shard_for(&fingerprint.value)
                        .write()
                        .signatures
                        .entry(fingerprint.value.clone())
                        .or_default()
                        .push(record.id.clone());
                }
            }
        }

        self.shard_for(&window)
            .write()
            .windows
            .entry(window)
            .or_default()
            .push(entry);
    }

    /// Looks up an exact transport-id match.
    pub fn transport_match(&self, value: &str) -> Option<RecordId> {
        self.shard_for(&value).read().transport_ids.get(value).cloned()
    }

    /// Looks up an exact content-hash match.
    pub fn content_match(&self, value: &str) -> Option<RecordId> {
        self.shard_for(&value).read().content_hashes.get(value).cloned()
    }

    /// Returns entries sharing the coarse participants fingerprint in the
    /// given window or either adjacent window, sorted by record id.
    pub fn participant_candidates(
        &self,
        sender: &str,
        recipients_key: &str,
        window: i64,
    ) -> Vec<Arc<IndexEntry>> {
        let sender = sender.to_lowercase();
        let mut candidates = Vec::new();
        for w in window - 1..=window + 1 {
            let value = participants_value(&sender, recipients_key, w);
            let shard = self.shard_for(&value).read();
            if let Some(entries) = shard.participants.get(&value) {
                candidates.extend(entries.iter().cloned());
            }
        }
        candidates.sort_by(|a, b| a.record_id.cmp(&b.record_id));
        candidates
    }

    /// Returns all entries whose timestamp falls in the given window or
    /// either adjacent window, sorted by record id.
    pub fn window_candidates(&self, window: i64) -> Vec<Arc<IndexEntry>> {
        let mut candidates = Vec::new();
        for w in window - 1..=window + 1 {
            let shard = self.shard_for(&w).read();
            if let Some(entries) = shard.windows.get(&w) {
                candidates.extend(entries.iter().cloned());
            }
        }
        candidates.sort_by(|a, b| a.record_id.cmp(&b.record_id));
        candidates
    }

    /// Returns record ids sharing an exact subject signature, sorted.
    pub fn signature_matches(&self, signature: &str) -> Vec<RecordId> {
        let mut ids = self
            .shard_for(&signature)
            .read()
            .signatures
            .get(signature)
            .cloned()
            .unwrap_or_default();
        ids.sort();
        ids
    }

    /// Returns the cached decision for a record, if one was computed.
    pub fn cached_decision(&self, record_id: &RecordId) -> Option<MatchDecision> {
        self.shard_for(record_id).read().decisions.get(record_id).cloned()
    }

    /// Caches a computed decision for the lifetime of the index.
    pub fn cache_decision(&self, decision: MatchDecision) {
        self.shard_for(&decision.record_id)
            .write()
            .decisions
            .insert(decision.record_id.clone(), decision);
    }

    /// Drops the cached decision for a record, forcing re-evaluation.
    pub fn evict_decision(&self, record_id: &RecordId) {
        self.shard_for(record_id).write().decisions.remove(record_id);
    }

    /// Releases spare capacity across all shards.
    ///
    /// Called by the scheduler at its periodic release points to bound
    /// peak memory during very large sessions.
    pub fn shrink_to_fit(&self) {
        for shard in &self.shards {
            let mut shard = shard.write();
            shard.transport_ids.shrink_to_fit();
            shard.content_hashes.shrink_to_fit();
            shard.participants.shrink_to_fit();
            shard.windows.shrink_to_fit();
            shard.signatures.shrink_to_fit();
            shard.records.shrink_to_fit();
            shard.decisions.shrink_to_fit();
        }
    }

    fn shard_for<K: Hash + ?Sized>(&self, key: &K) -> &RwLock<Shard> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let index = (hasher.finish() as usize) % self.shards.len();
        &self.shards[index]
    }
}

impl Default for RecordIndex {
    fn default() -> Self {
        Self::new(&MatchConfig::default())
    }
}
