//! The segmented log.
//!
//! [`SegmentedLog`] is the entry point used by the consensus module. It
//! owns the directory lock, the segment set, and the term index, and
//! serializes every mutation behind a single writer lock. Reads go through
//! cursors, which may be consumed on any thread while the writer keeps
//! appending.

use crate::config::LogConfig;
use crate::cursor::EntryCursor;
use crate::dir::LogDir;
use crate::error::{LogError, LogResult};
use crate::marshal::ContentMarshal;
use crate::pruning::LogPruner;
use crate::reader::ReaderPool;
use crate::recovery::RecoveryProtocol;
use crate::segment::{SegmentFile, SegmentSet};
use crate::stats::{LogStats, StatsSnapshot};
use crate::terms::TermIndex;
use crate::types::{LogIndex, RaftLogEntry, Term, NO_TERM};
use parking_lot::{Mutex, RwLock};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Writer-side view of the log boundaries.
#[derive(Debug)]
struct WriterState {
    append_index: LogIndex,
    prev_index: LogIndex,
    prev_term: Term,
}

/// An append-only, segmented log of consensus entries.
///
/// Entries are numbered contiguously from 0. The writer can append at the
/// end, truncate a suffix, skip forward past entries it will never receive,
/// or prune a prefix that the consensus module no longer needs.
///
/// # Example
///
/// ```rust,ignore
/// use raftlog_core::{LogConfig, RaftLogEntry, SegmentedLog, StringMarshal};
///
/// let log = SegmentedLog::open("raft-log", LogConfig::default(), StringMarshal)?;
/// let index = log.append(&[RaftLogEntry::new(1, "set x = 1".to_string())])?;
///
/// for entry in log.open_cursor(index)? {
///     println!("{}", entry?);
/// }
/// ```
pub struct SegmentedLog<M: ContentMarshal> {
    dir: LogDir,
    config: LogConfig,
    marshal: Arc<M>,
    pool: Arc<ReaderPool>,
    segments: Arc<SegmentSet>,
    pruner: LogPruner,
    terms: RwLock<TermIndex>,
    writer: Mutex<WriterState>,
    /// Published copies of the writer state for lock-free readers.
    append_index: AtomicI64,
    prev_index: AtomicI64,
    prev_term: AtomicI64,
    needs_recovery: AtomicBool,
    is_open: RwLock<bool>,
    stats: Arc<LogStats>,
    sweeper: Mutex<Option<Sweeper>>,
}

impl<M: ContentMarshal> SegmentedLog<M> {
    /// Opens the log in `path`, recovering any segments already there.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Another process has the directory locked (`Locked`)
    /// - The segments on disk are inconsistent (`DamagedLog`)
    /// - I/O errors occur
    pub fn open(path: impl AsRef<Path>, config: LogConfig, marshal: M) -> LogResult<Self> {
        let dir = LogDir::open(path.as_ref(), &config.file_prefix)?;
        let names = dir.file_names().clone();
        let pool = Arc::new(ReaderPool::new(names.clone(), config.reader_pool_size));

        let recovered =
            RecoveryProtocol::new(names, Arc::clone(&pool), config.force_on_flush).run()?;

        let sweeper = if config.reader_pool_sweep_interval.is_zero() {
            None
        } else {
            Some(Sweeper::start(
                Arc::clone(&pool),
                config.reader_pool_sweep_interval,
                config.reader_pool_max_age,
            )?)
        };

        info!(
            path = %dir.path().display(),
            prev_index = recovered.prev_index,
            append_index = recovered.append_index,
            "opened log"
        );

        Ok(Self {
            pruner: LogPruner::new(config.pruning_strategy),
            marshal: Arc::new(marshal),
            segments: Arc::new(recovered.segments),
            terms: RwLock::new(recovered.terms),
            writer: Mutex::new(WriterState {
                append_index: recovered.append_index,
                prev_index: recovered.prev_index,
                prev_term: recovered.prev_term,
            }),
            append_index: AtomicI64::new(recovered.append_index),
            prev_index: AtomicI64::new(recovered.prev_index),
            prev_term: AtomicI64::new(recovered.prev_term),
            needs_recovery: AtomicBool::new(false),
            is_open: RwLock::new(true),
            stats: Arc::new(LogStats::new()),
            sweeper: Mutex::new(sweeper),
            pool,
            config,
            dir,
        })
    }

    /// Appends entries after the current append index.
    ///
    /// Returns the new append index. The batch is durable (subject to
    /// `force_on_flush`) when this returns.
    ///
    /// # Errors
    ///
    /// - `NonMonotonicTerm` if any term is lower than its predecessor; nothing
    ///   is written
    /// - `Codec` if the content cannot be marshaled; nothing is written
    /// - `NeedsRecovery` if an earlier write failed
    /// - I/O errors, after which the log needs recovery
    pub fn append(&self, entries: &[RaftLogEntry<M::Content>]) -> LogResult<LogIndex> {
        let mut state = self.writer.lock();
        self.ensure_writable()?;
        if entries.is_empty() {
            return Ok(state.append_index);
        }

        let mut latest = self.terms.read().latest();
        for entry in entries {
            if entry.term < latest {
                return Err(LogError::NonMonotonicTerm {
                    latest,
                    term: entry.term,
                });
            }
            latest = entry.term;
        }

        let mut encoded = Vec::with_capacity(entries.len());
        for entry in entries {
            let mut buf = Vec::new();
            self.marshal.marshal(&entry.content, &mut buf)?;
            encoded.push(buf);
        }

        let segment = self.current_segment()?;
        let first = state.append_index + 1;
        let written = self.poison_on_error(Self::write_batch(&segment, first, entries, &encoded))?;

        {
            let mut terms = self.terms.write();
            for (offset, entry) in entries.iter().enumerate() {
                terms.append(first + offset as LogIndex, entry.term)?;
            }
        }
        state.append_index = first + entries.len() as LogIndex - 1;
        self.append_index.store(state.append_index, Ordering::Release);
        self.stats.record_append(entries.len() as u64, written);

        if segment.size() >= self.config.rotate_at_size {
            let append_index = state.append_index;
            self.poison_on_error(self.segments.rotate(append_index, append_index, latest))?;
            self.stats.record_rotation();
        }

        Ok(state.append_index)
    }

    fn write_batch(
        segment: &SegmentFile,
        first: LogIndex,
        entries: &[RaftLogEntry<M::Content>],
        encoded: &[Vec<u8>],
    ) -> LogResult<u64> {
        let mut written = 0;
        for (offset, (entry, content)) in entries.iter().zip(encoded).enumerate() {
            segment.write(first + offset as LogIndex, entry.term, content)?;
            written += content.len() as u64;
        }
        segment.flush()?;
        Ok(written)
    }

    /// Removes every entry from `from_index` on.
    ///
    /// `from_index` must lie in `(prev_index, append_index + 1]`; truncating
    /// at `append_index + 1` removes nothing.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if `from_index` is out of range, or an I/O
    /// error, after which the log needs recovery.
    pub fn truncate(&self, from_index: LogIndex) -> LogResult<()> {
        let mut state = self.writer.lock();
        self.ensure_writable()?;
        if from_index <= state.prev_index || from_index > state.append_index + 1 {
            return Err(LogError::invalid_operation(format!(
                "cannot truncate at {from_index}: valid range is ({}, {}]",
                state.prev_index,
                state.append_index + 1
            )));
        }

        let prev_index = from_index - 1;
        let prev_term = self.term_at(prev_index, &state)?;
        self.poison_on_error(self.segments.truncate(state.append_index, prev_index, prev_term))?;

        {
            let mut terms = self.terms.write();
            if from_index > terms.min() {
                terms.truncate(from_index)?;
            } else {
                terms.skip(prev_index, prev_term);
            }
        }
        state.append_index = prev_index;
        self.append_index.store(prev_index, Ordering::Release);
        self.stats.record_truncation();

        info!(from_index, "truncated log");
        Ok(())
    }

    /// Moves the log forward so that the next append lands at
    /// `new_index + 1`.
    ///
    /// Does nothing unless `new_index` lies beyond the append index.
    ///
    /// # Errors
    ///
    /// Returns an I/O error, after which the log needs recovery.
    pub fn skip(&self, new_index: LogIndex, new_term: Term) -> LogResult<()> {
        let mut state = self.writer.lock();
        self.ensure_writable()?;
        if new_index <= state.append_index {
            return Ok(());
        }

        self.poison_on_error(self.segments.skip(state.append_index, new_index, new_term))?;
        self.terms.write().skip(new_index, new_term);

        state.append_index = new_index;
        state.prev_index = new_index;
        state.prev_term = new_term;
        self.publish_prev(&state);
        self.append_index.store(new_index, Ordering::Release);
        self.stats.record_skip();

        info!(new_index, new_term, "skipped log forward");
        Ok(())
    }

    /// Deletes segments no longer needed, never going beyond `safe_index`
    /// and never beyond what the pruning strategy allows.
    ///
    /// Returns the new prev index.
    ///
    /// # Errors
    ///
    /// Returns `NeedsRecovery` if an earlier write failed.
    pub fn prune(&self, safe_index: LogIndex) -> LogResult<LogIndex> {
        let mut state = self.writer.lock();
        self.ensure_writable()?;

        let prune_index = self.pruner.index_to_prune(safe_index, &self.segments);
        let before = self.segments.len();
        let survivor = self.segments.prune(prune_index)?;
        let deleted = before - self.segments.len();

        let header = survivor.header();
        if header.prev_index > state.prev_index {
            // A survivor written before a truncation records a superseded term.
            let live_term = self.terms.read().get(header.prev_index);
            state.prev_index = header.prev_index;
            state.prev_term = if live_term == NO_TERM {
                header.prev_term
            } else {
                live_term
            };
            self.publish_prev(&state);
        }
        self.terms.write().prune(state.prev_index);
        self.stats.record_pruned(deleted as u64);

        debug!(safe_index, prune_index, deleted, prev_index = state.prev_index, "pruned log");
        Ok(state.prev_index)
    }

    /// Returns the term of the entry at `index`, or `-1` if the log does not
    /// hold it.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry has to be read from disk and the read
    /// fails.
    pub fn read_entry_term(&self, index: LogIndex) -> LogResult<Term> {
        let append_index = self.append_index.load(Ordering::Acquire);
        let prev_index = self.prev_index.load(Ordering::Acquire);
        if index > append_index || index < prev_index {
            return Ok(NO_TERM);
        }

        let term = self.terms.read().get(index);
        if term != NO_TERM {
            return Ok(term);
        }
        if index == prev_index {
            return Ok(self.prev_term.load(Ordering::Acquire));
        }
        self.read_term_from_disk(index)
    }

    /// Opens a cursor yielding entries from `from_index` on.
    ///
    /// A cursor opened at or below the prev index is empty.
    ///
    /// # Errors
    ///
    /// Returns `Closed` if the log has been closed.
    pub fn open_cursor(&self, from_index: LogIndex) -> LogResult<EntryCursor<M>> {
        self.ensure_open()?;
        self.stats.record_cursor();

        let segments = Arc::clone(&self.segments);
        let marshal = Arc::clone(&self.marshal);
        let stats = Arc::clone(&self.stats);
        if from_index <= self.prev_index.load(Ordering::Acquire) {
            return Ok(EntryCursor::empty(segments, marshal, stats));
        }
        Ok(EntryCursor::new(segments, marshal, stats, from_index))
    }

    /// Index of the last appended entry, or `-1` if there is none.
    #[must_use]
    pub fn append_index(&self) -> LogIndex {
        self.append_index.load(Ordering::Acquire)
    }

    /// Index preceding the first entry the log can return.
    #[must_use]
    pub fn prev_index(&self) -> LogIndex {
        self.prev_index.load(Ordering::Acquire)
    }

    /// Returns `true` once a write failure requires the log to be reopened.
    #[must_use]
    pub fn needs_recovery(&self) -> bool {
        self.needs_recovery.load(Ordering::Acquire)
    }

    /// Number of segment files currently on disk.
    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Returns a snapshot of the log statistics.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Returns the configuration the log was opened with.
    #[must_use]
    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// Returns the log directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Checks if the log is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        *self.is_open.read()
    }

    /// Flushes and closes every segment and stops the reader sweeper.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if a cursor still holds a segment, or an
    /// I/O error from the final flush.
    pub fn close(&self) -> LogResult<()> {
        let _state = self.writer.lock();
        let mut is_open = self.is_open.write();
        if !*is_open {
            return Ok(());
        }
        *is_open = false;

        if let Some(sweeper) = self.sweeper.lock().take() {
            sweeper.stop();
        }
        self.segments.close()?;
        self.pool.clear();
        info!(path = %self.dir.path().display(), "closed log");
        Ok(())
    }

    fn ensure_open(&self) -> LogResult<()> {
        if *self.is_open.read() {
            Ok(())
        } else {
            Err(LogError::Closed)
        }
    }

    fn ensure_writable(&self) -> LogResult<()> {
        self.ensure_open()?;
        if self.needs_recovery.load(Ordering::Acquire) {
            return Err(LogError::NeedsRecovery);
        }
        Ok(())
    }

    fn poison_on_error<T>(&self, result: LogResult<T>) -> LogResult<T> {
        if let Err(e) = &result {
            if matches!(e, LogError::Io(_) | LogError::SegmentDisposed { .. }) {
                error!(error = %e, "log write failed; log needs recovery");
                self.needs_recovery.store(true, Ordering::Release);
            }
            self.stats.record_error();
        }
        result
    }

    fn publish_prev(&self, state: &WriterState) {
        self.prev_term.store(state.prev_term, Ordering::Release);
        self.prev_index.store(state.prev_index, Ordering::Release);
    }

    fn current_segment(&self) -> LogResult<Arc<SegmentFile>> {
        self.segments
            .last()
            .ok_or_else(|| LogError::invalid_operation("log has no segment to write to"))
    }

    /// Term of `index` as seen by the writer.
    fn term_at(&self, index: LogIndex, state: &WriterState) -> LogResult<Term> {
        if index == state.prev_index {
            return Ok(state.prev_term);
        }
        let term = self.terms.read().get(index);
        if term != NO_TERM {
            return Ok(term);
        }
        self.read_term_from_disk(index)
    }

    fn read_term_from_disk(&self, index: LogIndex) -> LogResult<Term> {
        let Some(range) = self.segments.get_for_index(index) else {
            return Ok(NO_TERM);
        };
        let mut cursor = range.segment.open_cursor(index)?;
        match cursor.next_raw()? {
            Some(entry) if entry.index == index => Ok(entry.term),
            Some(entry) => Err(LogError::damaged(format!(
                "expected entry {index} but read entry {}",
                entry.index
            ))),
            None => Ok(NO_TERM),
        }
    }
}

impl<M: ContentMarshal> std::fmt::Debug for SegmentedLog<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentedLog")
            .field("path", &self.dir.path())
            .field("is_open", &self.is_open())
            .field("prev_index", &self.prev_index())
            .field("append_index", &self.append_index())
            .field("segments", &self.segment_count())
            .finish_non_exhaustive()
    }
}

impl<M: ContentMarshal> Drop for SegmentedLog<M> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(error = %e, "failed to close log cleanly");
        }
    }
}

/// Background thread closing idle pooled readers.
#[derive(Debug)]
struct Sweeper {
    stop: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

impl Sweeper {
    fn start(pool: Arc<ReaderPool>, interval: Duration, max_age: Duration) -> LogResult<Self> {
        let (stop, stopped) = mpsc::channel::<()>();
        let handle = thread::Builder::new()
            .name("raftlog-reader-sweeper".to_string())
            .spawn(move || loop {
                match stopped.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        let closed = pool.prune_idle(max_age);
                        if closed > 0 {
                            debug!(closed, "closed idle readers");
                        }
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })?;
        Ok(Self { stop, handle })
    }

    fn stop(self) {
        drop(self.stop);
        if self.handle.join().is_err() {
            error!("reader sweeper thread panicked");
        }
    }
}
