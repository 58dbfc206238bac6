//! Stress harness for concurrent log access.
//!
//! One writer appends batches while reader threads stream entries from
//! random starting points and a pruner deletes old segments. Readers check
//! that every entry they see is contiguous and carries the content the
//! writer gave it.

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use raftlog_core::{
    LogError, LogIndex, PruningStrategy, RaftLogEntry, SegmentedLog, StringMarshal,
};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

use crate::fixtures::test_config;

/// Configuration for a stress run.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of batches the writer appends.
    pub batches: usize,
    /// Largest batch size.
    pub max_batch: usize,
    /// Number of reader threads.
    pub readers: usize,
    /// Segment rotation threshold in bytes.
    pub rotate_at_size: u64,
    /// Entries kept by the pruner.
    pub keep_entries: u64,
    /// The pruner runs after every this many batches (zero disables it).
    pub prune_every: usize,
    /// Seed for the random batch sizes and reader start points.
    pub seed: u64,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            batches: 500,
            max_batch: 16,
            readers: 4,
            rotate_at_size: 4 * 1024,
            keep_entries: 200,
            prune_every: 25,
            seed: 0x5eed,
        }
    }
}

/// Result of a stress run.
#[derive(Debug, Clone)]
pub struct StressResult {
    /// Entries appended by the writer.
    pub entries_written: u64,
    /// Entries read by all readers.
    pub entries_read: u64,
    /// Cursors that ended because their segment was pruned.
    pub disposed_reads: u64,
    /// Reader errors other than pruned segments, and validation failures.
    pub failures: Vec<String>,
    /// Segments deleted by the pruner.
    pub segments_pruned: u64,
    /// Total duration.
    pub duration: Duration,
}

impl StressResult {
    /// Whether the run saw no failures.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Prints a summary of the run.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {} ===", name);
        println!("Entries written: {}", self.entries_written);
        println!("Entries read: {}", self.entries_read);
        println!("Pruned under reader: {}", self.disposed_reads);
        println!("Segments pruned: {}", self.segments_pruned);
        println!("Failures: {}", self.failures.len());
        println!("Duration: {:?}", self.duration);
    }
}

/// Content the writer stores at `index`.
pub fn stress_content(index: LogIndex) -> String {
    format!("entry-{index}")
}

/// Runs the writer, readers and pruner against a fresh log.
///
/// # Panics
///
/// Panics if the log cannot be created or a thread panics.
pub fn run_stress(config: &StressConfig) -> StressResult {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let log_config = test_config()
        .rotate_at_size(config.rotate_at_size)
        .pruning_strategy(PruningStrategy::EntryBudget(config.keep_entries));
    let log = Arc::new(
        SegmentedLog::open(temp_dir.path(), log_config, StringMarshal)
            .expect("Failed to open stress log"),
    );

    let done = Arc::new(AtomicBool::new(false));
    let entries_read = Arc::new(AtomicU64::new(0));
    let disposed_reads = Arc::new(AtomicU64::new(0));
    let failures = Arc::new(Mutex::new(Vec::new()));
    let start = Instant::now();

    let readers: Vec<_> = (0..config.readers)
        .map(|r| {
            let log = Arc::clone(&log);
            let done = Arc::clone(&done);
            let entries_read = Arc::clone(&entries_read);
            let disposed_reads = Arc::clone(&disposed_reads);
            let failures = Arc::clone(&failures);
            let seed = config.seed.wrapping_add(r as u64 + 1);

            thread::spawn(move || {
                let mut rng = StdRng::seed_from_u64(seed);
                while !done.load(Ordering::Acquire) {
                    let low = log.prev_index() + 1;
                    let high = log.append_index();
                    if high < low {
                        thread::yield_now();
                        continue;
                    }
                    let from = rng.gen_range(low..=high);
                    match read_and_check(&log, from) {
                        Ok(count) => {
                            entries_read.fetch_add(count, Ordering::Relaxed);
                        }
                        Err(ReadFailure::Disposed(count)) => {
                            entries_read.fetch_add(count, Ordering::Relaxed);
                            disposed_reads.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(ReadFailure::Invalid(message)) => {
                            failures.lock().push(message);
                        }
                    }
                }
            })
        })
        .collect();

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut entries_written = 0u64;
    for batch in 0..config.batches {
        let first = log.append_index() + 1;
        let size = rng.gen_range(1..=config.max_batch.max(1));
        let entries: Vec<_> = (0..size as LogIndex)
            .map(|offset| RaftLogEntry::new(1, stress_content(first + offset)))
            .collect();
        match log.append(&entries) {
            Ok(_) => entries_written += size as u64,
            Err(e) => failures.lock().push(format!("append failed: {e}")),
        }

        if config.prune_every > 0 && batch % config.prune_every == 0 {
            if let Err(e) = log.prune(log.append_index()) {
                failures.lock().push(format!("prune failed: {e}"));
            }
        }
    }

    done.store(true, Ordering::Release);
    for reader in readers {
        reader.join().expect("Reader thread panicked");
    }

    let segments_pruned = log.stats().segments_pruned;
    let failures = std::mem::take(&mut *failures.lock());
    StressResult {
        entries_written,
        entries_read: entries_read.load(Ordering::Relaxed),
        disposed_reads: disposed_reads.load(Ordering::Relaxed),
        failures,
        segments_pruned,
        duration: start.elapsed(),
    }
}

enum ReadFailure {
    Disposed(u64),
    Invalid(String),
}

fn read_and_check(log: &SegmentedLog<StringMarshal>, from: LogIndex) -> Result<u64, ReadFailure> {
    let cursor = match log.open_cursor(from) {
        Ok(cursor) => cursor,
        Err(e) => return Err(ReadFailure::Invalid(format!("open_cursor({from}): {e}"))),
    };

    let mut expected = from;
    let mut count = 0;
    for entry in cursor {
        let entry = match entry {
            Ok(entry) => entry,
            Err(LogError::SegmentDisposed { .. }) => return Err(ReadFailure::Disposed(count)),
            Err(e) => return Err(ReadFailure::Invalid(format!("read from {from}: {e}"))),
        };
        if entry.index != expected {
            return Err(ReadFailure::Invalid(format!(
                "expected index {expected}, read {}",
                entry.index
            )));
        }
        if entry.content != stress_content(entry.index) {
            return Err(ReadFailure::Invalid(format!(
                "entry {} holds {:?}",
                entry.index, entry.content
            )));
        }
        expected += 1;
        count += 1;
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_run_is_clean() {
        let config = StressConfig {
            batches: 60,
            readers: 2,
            rotate_at_size: 1024,
            keep_entries: 50,
            prune_every: 10,
            ..StressConfig::default()
        };
        let result = run_stress(&config);
        assert!(result.is_clean(), "failures: {:?}", result.failures);
        assert!(result.entries_written >= 60);
    }
}
