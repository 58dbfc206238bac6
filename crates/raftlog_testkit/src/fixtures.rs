//! Test fixtures and log helpers.
//!
//! Provides temporary logs that clean up after themselves and can be closed
//! and reopened to exercise recovery.

use raftlog_core::{
    LogConfig, LogIndex, LogResult, PruningStrategy, RaftLogEntry, SegmentedLog, StringMarshal,
    Term,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

/// Configuration suited to tests: no fsync, no background sweeper and no
/// pruning unless a test asks for it.
pub fn test_config() -> LogConfig {
    LogConfig::new()
        .force_on_flush(false)
        .reader_pool_sweep_interval(Duration::ZERO)
        .pruning_strategy(PruningStrategy::None)
}

/// A string log in a temporary directory.
pub struct TestLog {
    log: Option<SegmentedLog<StringMarshal>>,
    config: LogConfig,
    temp_dir: TempDir,
}

impl TestLog {
    /// Creates a log with [`test_config`].
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    /// Creates a log whose segments rotate once they reach `bytes`.
    pub fn with_small_segments(bytes: u64) -> Self {
        Self::with_config(test_config().rotate_at_size(bytes))
    }

    /// Creates a log with a custom configuration.
    pub fn with_config(config: LogConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let log = SegmentedLog::open(temp_dir.path(), config.clone(), StringMarshal)
            .expect("Failed to open test log");
        Self {
            log: Some(log),
            config,
            temp_dir,
        }
    }

    /// Returns the open log.
    ///
    /// # Panics
    ///
    /// Panics if the log is closed.
    pub fn log(&self) -> &SegmentedLog<StringMarshal> {
        self.log.as_ref().expect("Test log is closed")
    }

    /// Returns the log directory.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Returns the path of the segment with `version`.
    pub fn segment_path(&self, version: u64) -> PathBuf {
        self.temp_dir
            .path()
            .join(format!("{}.{version}", self.config.file_prefix))
    }

    /// Closes the log, leaving the files in place.
    pub fn close(&mut self) {
        if let Some(log) = self.log.take() {
            log.close().expect("Failed to close test log");
        }
    }

    /// Opens the log again, returning the recovery result.
    pub fn try_reopen(&mut self) -> LogResult<()> {
        self.close();
        self.log = Some(SegmentedLog::open(
            self.temp_dir.path(),
            self.config.clone(),
            StringMarshal,
        )?);
        Ok(())
    }

    /// Opens the log again.
    ///
    /// # Panics
    ///
    /// Panics if recovery fails.
    pub fn reopen(&mut self) {
        self.try_reopen().expect("Failed to reopen test log");
    }

    /// Appends one entry per string, all with `term`.
    pub fn append_strings(&self, term: Term, contents: &[&str]) -> LogIndex {
        let entries: Vec<_> = contents
            .iter()
            .map(|c| RaftLogEntry::new(term, (*c).to_string()))
            .collect();
        self.log().append(&entries).expect("Failed to append")
    }

    /// Reads `(index, term, content)` for every entry from `from` on.
    pub fn read_from(&self, from: LogIndex) -> Vec<(LogIndex, Term, String)> {
        self.log()
            .open_cursor(from)
            .expect("Failed to open cursor")
            .map(|e| {
                let e = e.expect("Failed to read entry");
                (e.index, e.term, e.content)
            })
            .collect()
    }

    /// Reads the content of every entry from `from` on.
    pub fn contents_from(&self, from: LogIndex) -> Vec<String> {
        self.read_from(from).into_iter().map(|(_, _, c)| c).collect()
    }

    /// Lists the segment versions present on disk.
    pub fn versions(&self) -> Vec<u64> {
        raftlog_core::FileNames::new(self.temp_dir.path(), self.config.file_prefix.clone())
            .all_files()
            .expect("Failed to list segments")
            .into_keys()
            .collect()
    }
}

impl Default for TestLog {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TestLog {
    type Target = SegmentedLog<StringMarshal>;

    fn deref(&self) -> &Self::Target {
        self.log()
    }
}

/// Runs a test with a temporary log.
///
/// # Example
///
/// ```rust,ignore
/// use raftlog_testkit::with_temp_log;
///
/// #[test]
/// fn my_test() {
///     with_temp_log(|log| {
///         log.append_strings(1, &["a"]);
///     });
/// }
/// ```
pub fn with_temp_log<F, R>(f: F) -> R
where
    F: FnOnce(&mut TestLog) -> R,
{
    let mut log = TestLog::new();
    f(&mut log)
}
