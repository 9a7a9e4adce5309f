//! Engine configuration.

use crate::batch::BatchConfig;
use crate::conflict::ConflictStrategy;
use crate::contact::ContactConfig;
use crate::retry::RetryConfig;
use mailsync_core::MatchConfig;
use std::time::Duration;

/// Upper bound on the remote-write worker pool.
const MAX_WORKERS: usize = 8;

/// Configuration for the import engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Duplicate matching configuration.
    pub matching: MatchConfig,
    /// Adaptive batch sizing.
    pub batch: BatchConfig,
    /// Retry policy for transient remote errors.
    pub retry: RetryConfig,
    /// Contact resolution configuration.
    pub contacts: ContactConfig,
    /// Default strategy for the conflict queue.
    pub conflict_strategy: ConflictStrategy,
    /// Concurrent remote writes per batch. Clamped to `1..=8`.
    pub workers: usize,
    /// Per-call timeout handed to remote writer implementations.
    pub remote_timeout: Duration,
    /// Explicit memory release every N batches.
    pub release_interval: u64,
}

impl EngineConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the matching configuration.
    #[must_use]
    pub fn with_matching(mut self, matching: MatchConfig) -> Self {
        self.matching = matching;
        self
    }

    /// Sets the batch sizing configuration.
    #[must_use]
    pub fn with_batch(mut self, batch: BatchConfig) -> Self {
        self.batch = batch;
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the contact configuration.
    #[must_use]
    pub fn with_contacts(mut self, contacts: ContactConfig) -> Self {
        self.contacts = contacts;
        self
    }

    /// Sets the conflict strategy.
    #[must_use]
    pub fn with_conflict_strategy(mut self, strategy: ConflictStrategy) -> Self {
        self.conflict_strategy = strategy;
        self
    }

    /// Sets the worker pool size.
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.clamp(1, MAX_WORKERS);
        self
    }

    /// Sets the remote call timeout.
    #[must_use]
    pub fn with_remote_timeout(mut self, timeout: Duration) -> Self {
        self.remote_timeout = timeout;
        self
    }

    /// Sets the memory release interval, in batches.
    #[must_use]
    pub fn with_release_interval(mut self, batches: u64) -> Self {
        self.release_interval = batches.max(1);
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            matching: MatchConfig::default(),
            batch: BatchConfig::default(),
            retry: RetryConfig::default(),
            contacts: ContactConfig::default(),
            conflict_strategy: ConflictStrategy::LastWriteWins,
            workers: 4,
            remote_timeout: Duration::from_secs(30),
            release_interval: 10,
        }
    }
}
