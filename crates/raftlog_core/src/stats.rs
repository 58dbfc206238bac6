//! Log statistics.
//!
//! Counters are updated by the log as it runs and can be read at any time
//! without blocking the writer.
//!
//! ```rust,ignore
//! let log = SegmentedLog::open(dir, LogConfig::default(), StringMarshal)?;
//! log.append(&[RaftLogEntry::new(1, "a".to_string())])?;
//!
//! let stats = log.stats();
//! println!("entries appended: {}", stats.entries_appended);
//! println!("rotations: {}", stats.rotations);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counters describing what the log has done since it was opened.
#[derive(Debug, Default)]
pub struct LogStats {
    // Writes
    entries_appended: AtomicU64,
    bytes_appended: AtomicU64,
    truncations: AtomicU64,
    skips: AtomicU64,

    // Segment lifecycle
    rotations: AtomicU64,
    segments_pruned: AtomicU64,

    // Reads
    cursors_opened: AtomicU64,
    entries_read: AtomicU64,

    /// Failed writes.
    errors: AtomicU64,
}

impl LogStats {
    /// Creates zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_append(&self, entries: u64, bytes: u64) {
        self.entries_appended.fetch_add(entries, Ordering::Relaxed);
        self.bytes_appended.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn record_truncation(&self) {
        self.truncations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_skip(&self) {
        self.skips.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rotation(&self) {
        self.rotations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_pruned(&self, segments: u64) {
        self.segments_pruned.fetch_add(segments, Ordering::Relaxed);
    }

    pub(crate) fn record_cursor(&self) {
        self.cursors_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_read(&self) {
        self.entries_read.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of entries appended.
    pub fn entries_appended(&self) -> u64 {
        self.entries_appended.load(Ordering::Relaxed)
    }

    /// Returns the number of content bytes appended.
    pub fn bytes_appended(&self) -> u64 {
        self.bytes_appended.load(Ordering::Relaxed)
    }

    /// Returns the number of segment rotations.
    pub fn rotations(&self) -> u64 {
        self.rotations.load(Ordering::Relaxed)
    }

    /// Returns a point-in-time copy of every counter.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            entries_appended: self.entries_appended(),
            bytes_appended: self.bytes_appended(),
            truncations: self.truncations.load(Ordering::Relaxed),
            skips: self.skips.load(Ordering::Relaxed),
            rotations: self.rotations(),
            segments_pruned: self.segments_pruned.load(Ordering::Relaxed),
            cursors_opened: self.cursors_opened.load(Ordering::Relaxed),
            entries_read: self.entries_read.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// A snapshot of [`LogStats`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    /// Entries appended.
    pub entries_appended: u64,
    /// Content bytes appended, excluding framing.
    pub bytes_appended: u64,
    /// Truncations performed.
    pub truncations: u64,
    /// Skips performed.
    pub skips: u64,
    /// Segments started because the current one grew too large.
    pub rotations: u64,
    /// Segment files deleted by pruning.
    pub segments_pruned: u64,
    /// Cursors opened.
    pub cursors_opened: u64,
    /// Entries returned by cursors.
    pub entries_read: u64,
    /// Failed appends.
    pub errors: u64,
}
