//! Manual review queue for ambiguous matches.
//!
//! An ambiguous match is a designed outcome, not a failure: the record
//! is parked here with its decision until an operator classifies it,
//! instead of being silently imported or silently dropped.

use chrono::{DateTime, Utc};
use mailsync_core::{MatchDecision, Record};
use parking_lot::Mutex;
use serde::Serialize;

/// A record whose classification needs an operator.
#[derive(Debug, Clone, Serialize)]
pub struct AmbiguousMatch {
    /// The record awaiting classification.
    pub record: Record,
    /// The ambiguous decision that parked it.
    pub decision: MatchDecision,
    /// When the ambiguity was detected.
    pub detected_at: DateTime<Utc>,
}

/// Queue of ambiguous matches, pollable and drainable by a
/// manual-resolution front end.
#[derive(Debug, Default)]
pub struct ReviewQueue {
    entries: Mutex<Vec<AmbiguousMatch>>,
}

impl ReviewQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parks a record with its ambiguous decision.
    pub fn push(&self, record: Record, decision: MatchDecision) {
        tracing::info!(
            record_id = %record.id,
            confidence = decision.confidence,
            "ambiguous match routed to manual review",
        );
        self.entries.lock().push(AmbiguousMatch {
            record,
            decision,
            detected_at: Utc::now(),
        });
    }

    /// Returns a copy of the queued entries, oldest first.
    pub fn poll(&self) -> Vec<AmbiguousMatch> {
        self.entries.lock().clone()
    }

    /// Removes and returns all queued entries.
    pub fn drain(&self) -> Vec<AmbiguousMatch> {
        std::mem::take(&mut *self.entries.lock())
    }

    /// Number of queued entries.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true if the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use mailsync_core::{DuplicateResolver, MatchConfig, RecordIndex};

    fn decision_for(record: &Record, index: &RecordIndex) -> MatchDecision {
        DuplicateResolver::new(MatchConfig::default()).resolve(record, index)
    }

    #[test]
    fn push_poll_drain() {
        let queue = ReviewQueue::new();
        assert!(queue.is_empty());

        let index = RecordIndex::default();
        let record = Record::new(
            "r-1",
            Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            "alice@example.com",
        );
        let decision = decision_for(&record, &index);
        queue.push(record.clone(), decision);

        assert_eq!(queue.len(), 1);
        assert_eq!(queue.poll().len(), 1);
        assert_eq!(queue.len(), 1);

        let drained = queue.drain();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].record.id, record.id);
        assert!(queue.is_empty());
    }
}
