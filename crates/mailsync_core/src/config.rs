//! Configuration for duplicate matching.

use std::time::Duration;

/// Configuration for the fingerprint engine and duplicate resolver.
///
/// Thresholds and per-strategy confidences are tunable defaults, not
/// proven-optimal values. Changing them between a run and its resume
/// changes replay classification, so a resumed session must use the
/// configuration of the original run.
#[derive(Debug, Clone)]
pub struct MatchConfig {
    /// Width of the coarse timestamp window.
    pub timestamp_window: Duration,
    /// Minimum subject similarity for the window+subject strategy.
    pub subject_similarity_threshold: f64,
    /// Minimum similarity for the standalone similarity strategy.
    pub content_similarity_threshold: f64,
    /// Confidence reported by a content-hash match.
    pub content_hash_confidence: f64,
    /// Confidence reported by a window+subject match.
    pub window_subject_confidence: f64,
    /// Confidence reported by a sender+recipient match inside the window.
    pub participant_confidence: f64,
    /// Confidence reported by a standalone similarity match.
    pub similarity_confidence: f64,
    /// Number of index shards. Must be non-zero.
    pub shard_count: usize,
}

impl MatchConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the coarse timestamp window.
    #[must_use]
    pub fn with_timestamp_window(mut self, window: Duration) -> Self {
        self.timestamp_window = window;
        self
    }

    /// Sets the subject similarity threshold.
    #[must_use]
    pub fn with_subject_similarity_threshold(mut self, threshold: f64) -> Self {
        self.subject_similarity_threshold = threshold;
        self
    }

    /// Sets the standalone content similarity threshold.
    #[must_use]
    pub fn with_content_similarity_threshold(mut self, threshold: f64) -> Self {
        self.content_similarity_threshold = threshold;
        self
    }

    /// Sets the number of index shards.
    #[must_use]
    pub fn with_shard_count(mut self, shards: usize) -> Self {
        self.shard_count = shards.max(1);
        self
    }

    /// Width of the timestamp window in whole seconds, floored at one.
    pub(crate) fn window_seconds(&self) -> i64 {
        (self.timestamp_window.as_secs().max(1)) as i64
    }
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            timestamp_window: Duration::from_secs(5 * 60),
            subject_similarity_threshold: 0.8,
            content_similarity_threshold: 0.9,
            content_hash_confidence: 0.95,
            window_subject_confidence: 0.85,
            participant_confidence: 0.80,
            similarity_confidence: 0.75,
            shard_count: 16,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_thresholds() {
        let config = MatchConfig::default();
        assert_eq!(config.timestamp_window, Duration::from_secs(300));
        assert_eq!(config.subject_similarity_threshold, 0.8);
        assert_eq!(config.content_similarity_threshold, 0.9);
        assert_eq!(config.shard_count, 16);
    }

    #[test]
    fn builder_overrides() {
        let config = MatchConfig::new()
            .with_timestamp_window(Duration::from_secs(60))
            .with_subject_similarity_threshold(0.7)
            .with_shard_count(4);

        assert_eq!(config.timestamp_window, Duration::from_secs(60));
        assert_eq!(config.subject_similarity_threshold, 0.7);
        assert_eq!(config.shard_count, 4);
    }

    #[test]
    fn shard_count_never_zero() {
        let config = MatchConfig::new().with_shard_count(0);
        assert_eq!(config.shard_count, 1);
    }
}
