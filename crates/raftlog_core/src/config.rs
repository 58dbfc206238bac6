//! Log configuration.

use crate::pruning::PruningStrategy;
use std::time::Duration;

/// Default file name prefix for segment files.
pub const DEFAULT_FILE_PREFIX: &str = "raft.log";

/// Configuration for opening a log.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Writer position at which the current segment is rotated.
    pub rotate_at_size: u64,

    /// Maximum number of idle reader handles kept open.
    pub reader_pool_size: usize,

    /// Idle readers older than this are closed by the sweeper.
    pub reader_pool_max_age: Duration,

    /// How often the sweeper runs (zero = no background sweeper).
    pub reader_pool_sweep_interval: Duration,

    /// Strategy deciding how much history pruning keeps.
    pub pruning_strategy: PruningStrategy,

    /// Whether `flush` also syncs file data to disk.
    pub force_on_flush: bool,

    /// Prefix of segment file names (`<prefix>.<version>`).
    pub file_prefix: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            rotate_at_size: 250 * 1024 * 1024, // 250 MB
            reader_pool_size: 8,
            reader_pool_max_age: Duration::from_secs(60),
            reader_pool_sweep_interval: Duration::from_secs(10),
            pruning_strategy: PruningStrategy::ByteBudget(1024 * 1024 * 1024), // 1 GB
            force_on_flush: true,
            file_prefix: DEFAULT_FILE_PREFIX.to_string(),
        }
    }
}

impl LogConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the rotation threshold in bytes.
    #[must_use]
    pub const fn rotate_at_size(mut self, size: u64) -> Self {
        self.rotate_at_size = size;
        self
    }

    /// Sets the reader pool capacity.
    #[must_use]
    pub const fn reader_pool_size(mut self, size: usize) -> Self {
        self.reader_pool_size = size;
        self
    }

    /// Sets the maximum idle age of pooled readers.
    #[must_use]
    pub const fn reader_pool_max_age(mut self, age: Duration) -> Self {
        self.reader_pool_max_age = age;
        self
    }

    /// Sets the sweeper interval.
    #[must_use]
    pub const fn reader_pool_sweep_interval(mut self, interval: Duration) -> Self {
        self.reader_pool_sweep_interval = interval;
        self
    }

    /// Sets the pruning strategy.
    #[must_use]
    pub fn pruning_strategy(mut self, strategy: PruningStrategy) -> Self {
        self.pruning_strategy = strategy;
        self
    }

    /// Sets whether flushes sync to disk.
    #[must_use]
    pub const fn force_on_flush(mut self, value: bool) -> Self {
        self.force_on_flush = value;
        self
    }

    /// Sets the segment file prefix.
    #[must_use]
    pub fn file_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.file_prefix = prefix.into();
        self
    }
}
