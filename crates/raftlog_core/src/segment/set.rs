//! The ordered set of live segments.

use crate::dir::sync_directory;
use crate::error::{LogError, LogResult};
use crate::naming::FileNames;
use crate::reader::ReaderPool;
use crate::segment::file::SegmentFile;
use crate::segment::header::SegmentHeader;
use crate::segment::range::RangeIndex;
use crate::types::{LogIndex, Term};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{error, info, warn};

/// The segment owning an index, and the first index it does not own.
#[derive(Debug, Clone)]
pub struct SegmentRange {
    /// Segment holding the looked-up index.
    pub segment: Arc<SegmentFile>,
    /// First index served by a later segment, or `None` for the newest.
    pub limit: Option<LogIndex>,
}

#[derive(Debug)]
struct Inner {
    segments: Vec<Arc<SegmentFile>>,
    ranges: RangeIndex<Arc<SegmentFile>>,
    current_version: Option<u64>,
}

/// Every segment that is still on disk, oldest first, together with the
/// index ranges each one serves.
///
/// New segments are created by rotation, truncation, or skip; each starts
/// serving at its `prev_index + 1` and takes over every index from there
/// on. Old segments leave the set only through [`prune`](Self::prune).
#[derive(Debug)]
pub struct SegmentSet {
    names: FileNames,
    pool: Arc<ReaderPool>,
    force_on_flush: bool,
    inner: Mutex<Inner>,
}

impl SegmentSet {
    /// Builds the set from segments found during recovery, oldest first.
    pub fn new(
        names: FileNames,
        pool: Arc<ReaderPool>,
        force_on_flush: bool,
        segments: Vec<Arc<SegmentFile>>,
    ) -> Self {
        let mut ranges = RangeIndex::new();
        for segment in &segments {
            ranges.replace_from(segment.header().first_index(), Arc::clone(segment));
        }
        let current_version = segments.last().map(|s| s.version());

        Self {
            names,
            pool,
            force_on_flush,
            inner: Mutex::new(Inner {
                segments,
                ranges,
                current_version,
            }),
        }
    }

    /// Starts a new segment continuing exactly where the newest one ends.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::InvalidOperation`] if `prev_file_last_index` and
    /// `prev_index` differ, or an I/O error.
    pub fn rotate(
        &self,
        prev_file_last_index: LogIndex,
        prev_index: LogIndex,
        prev_term: Term,
    ) -> LogResult<Arc<SegmentFile>> {
        if prev_file_last_index != prev_index {
            return Err(LogError::invalid_operation(format!(
                "cannot rotate: previous file ends at {prev_file_last_index}, \
                 new segment continues after {prev_index}"
            )));
        }
        self.create_next(prev_file_last_index, prev_index, prev_term)
    }

    /// Starts a new segment that overrides every index after `prev_index`.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::InvalidOperation`] if the truncation point lies
    /// after the end of the previous file or before the oldest live range,
    /// or an I/O error.
    pub fn truncate(
        &self,
        prev_file_last_index: LogIndex,
        prev_index: LogIndex,
        prev_term: Term,
    ) -> LogResult<Arc<SegmentFile>> {
        if prev_file_last_index < prev_index {
            return Err(LogError::invalid_operation(format!(
                "cannot truncate at {} beyond previous file end {prev_file_last_index}",
                prev_index + 1
            )));
        }
        if prev_file_last_index == prev_index {
            warn!(
                prev_index,
                "truncating at the end of the previous file; no entries are removed"
            );
        }
        if let Some(oldest) = self.inner.lock().segments.first() {
            if prev_index < oldest.header().prev_index {
                return Err(LogError::invalid_operation(format!(
                    "cannot truncate at {}: oldest live segment starts at {}",
                    prev_index + 1,
                    oldest.header().first_index()
                )));
            }
        }
        self.create_next(prev_file_last_index, prev_index, prev_term)
    }

    /// Starts a new segment whose first index lies past the end of the
    /// previous file.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::InvalidOperation`] if `prev_index` lies before
    /// the end of the previous file, or an I/O error.
    pub fn skip(
        &self,
        prev_file_last_index: LogIndex,
        prev_index: LogIndex,
        prev_term: Term,
    ) -> LogResult<Arc<SegmentFile>> {
        if prev_file_last_index > prev_index {
            return Err(LogError::invalid_operation(format!(
                "cannot skip to {prev_index}: previous file already ends at {prev_file_last_index}"
            )));
        }
        if prev_file_last_index == prev_index {
            warn!(prev_index, "skipping to the end of the previous file");
        }
        self.create_next(prev_file_last_index, prev_index, prev_term)
    }

    fn create_next(
        &self,
        prev_file_last_index: LogIndex,
        prev_index: LogIndex,
        prev_term: Term,
    ) -> LogResult<Arc<SegmentFile>> {
        let mut inner = self.inner.lock();

        if let Some(previous) = inner.segments.last() {
            previous.close_writer()?;
        }

        let version = inner.current_version.map_or(0, |v| v + 1);
        let header = SegmentHeader::new(prev_file_last_index, version, prev_index, prev_term);
        let segment = SegmentFile::create(
            self.names.path_for(version),
            header,
            Arc::clone(&self.pool),
            self.force_on_flush,
        )?;
        sync_directory(self.names.dir())?;

        let segment = Arc::new(segment);
        inner.current_version = Some(version);
        inner.segments.push(Arc::clone(&segment));
        inner
            .ranges
            .replace_from(header.first_index(), Arc::clone(&segment));

        info!(version, %header, "started segment");
        Ok(segment)
    }

    /// Deletes the oldest segments whose entries all lie at or below
    /// `prune_index`.
    ///
    /// A segment is deleted only if the segment after it starts no later
    /// than `prune_index + 1`, so the entry at `prune_index` stays readable
    /// or is provably superseded. Deletion stops at the first segment still
    /// referenced by a cursor or whose file cannot be removed.
    ///
    /// Returns the oldest surviving segment.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::InvalidOperation`] if the set is empty.
    pub fn prune(&self, prune_index: LogIndex) -> LogResult<Arc<SegmentFile>> {
        let mut inner = self.inner.lock();

        let mut deleted = 0;
        while inner.segments.len() > 1 {
            let next_starts_after = inner.segments[1].header().prev_file_last_index > prune_index;
            if next_starts_after {
                break;
            }
            let oldest = &inner.segments[0];
            if !oldest.try_close() {
                break;
            }
            if let Err(e) = oldest.delete() {
                error!(version = oldest.version(), error = %e, "failed to delete pruned segment");
                break;
            }
            inner.segments.remove(0);
            deleted += 1;
        }

        let Some(survivor) = inner.segments.first().cloned() else {
            return Err(LogError::invalid_operation("no segments to prune"));
        };
        if deleted > 0 {
            inner.ranges.remove_below(survivor.header().first_index());
            info!(
                deleted,
                prune_index,
                oldest_version = survivor.version(),
                "pruned segments"
            );
        }
        Ok(survivor)
    }

    /// Looks up the segment currently serving `index`.
    #[must_use]
    pub fn get_for_index(&self, index: LogIndex) -> Option<SegmentRange> {
        let found = self.inner.lock().ranges.lookup(index);
        found.value.map(|segment| SegmentRange {
            segment,
            limit: found.limit,
        })
    }

    /// The newest segment, the one being written.
    #[must_use]
    pub fn last(&self) -> Option<Arc<SegmentFile>> {
        self.inner.lock().segments.last().cloned()
    }

    /// Snapshot of all live segments, oldest first.
    #[must_use]
    pub fn segments(&self) -> Vec<Arc<SegmentFile>> {
        self.inner.lock().segments.clone()
    }

    /// Number of live segments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().segments.len()
    }

    /// Returns `true` if no segment exists.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Visits segments newest first until `visitor` returns `true`.
    pub fn visit_backwards<F>(&self, mut visitor: F)
    where
        F: FnMut(&SegmentFile) -> bool,
    {
        for segment in self.segments().iter().rev() {
            if visitor(segment) {
                break;
            }
        }
    }

    /// Closes every segment.
    ///
    /// All segments are attempted; the first failure is returned.
    ///
    /// # Errors
    ///
    /// Returns the first error encountered.
    pub fn close(&self) -> LogResult<()> {
        let inner = self.inner.lock();
        let mut first_error = None;
        for segment in &inner.segments {
            if let Err(e) = segment.close() {
                error!(version = segment.version(), error = %e, "failed to close segment");
                first_error.get_or_insert(e);
            }
        }
        self.pool.clear();
        first_error.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NO_INDEX;
    use tempfile::{tempdir, TempDir};

    fn empty_set() -> (TempDir, SegmentSet) {
        let dir = tempdir().unwrap();
        let names = FileNames::new(dir.path(), "raft.log");
        let pool = Arc::new(ReaderPool::new(names.clone(), 4));
        (dir, SegmentSet::new(names, pool, false, Vec::new()))
    }

    fn fill(segment: &SegmentFile, from: LogIndex, to: LogIndex) {
        for index in from..to {
            segment.write(index, 1, b"x").unwrap();
        }
        segment.flush().unwrap();
    }

    #[test]
    fn first_rotation_creates_version_zero() {
        let (dir, set) = empty_set();
        let segment = set.rotate(NO_INDEX, NO_INDEX, -1).unwrap();
        assert_eq!(segment.version(), 0);
        assert!(dir.path().join("raft.log.0").exists());
        assert_eq!(set.len(), 1);
        assert!(set.get_for_index(0).is_some());
    }

    #[test]
    fn rotation_requires_continuity() {
        let (_dir, set) = empty_set();
        set.rotate(NO_INDEX, NO_INDEX, -1).unwrap();
        assert!(matches!(
            set.rotate(5, 4, 1),
            Err(LogError::InvalidOperation { .. })
        ));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn versions_increase_and_ranges_follow() {
        let (_dir, set) = empty_set();
        let v0 = set.rotate(NO_INDEX, NO_INDEX, -1).unwrap();
        fill(&v0, 0, 10);
        let v1 = set.rotate(9, 9, 1).unwrap();
        fill(&v1, 10, 15);
        let v2 = set.truncate(14, 12, 1).unwrap();

        assert_eq!(v2.version(), 2);
        let range = set.get_for_index(5).unwrap();
        assert_eq!(range.segment.version(), 0);
        assert_eq!(range.limit, Some(10));

        let range = set.get_for_index(11).unwrap();
        assert_eq!(range.segment.version(), 1);
        assert_eq!(range.limit, Some(13));

        let range = set.get_for_index(13).unwrap();
        assert_eq!(range.segment.version(), 2);
        assert_eq!(range.limit, None);
    }

    #[test]
    fn truncate_and_skip_preconditions() {
        let (_dir, set) = empty_set();
        let v0 = set.rotate(NO_INDEX, NO_INDEX, -1).unwrap();
        fill(&v0, 0, 5);

        assert!(set.truncate(4, 6, 1).is_err());
        assert!(set.skip(4, 2, 1).is_err());
        assert!(set.truncate(4, -2, 1).is_err());

        let skipped = set.skip(4, 100, 3).unwrap();
        assert_eq!(skipped.header().first_index(), 101);
        assert!(set.get_for_index(50).unwrap().segment.version() == 0);
    }

    #[test]
    fn prune_respects_next_segment_start() {
        let (_dir, set) = empty_set();
        let v0 = set.rotate(NO_INDEX, NO_INDEX, -1).unwrap();
        fill(&v0, 0, 10);
        let v1 = set.rotate(9, 9, 1).unwrap();
        fill(&v1, 10, 20);
        let v2 = set.rotate(19, 19, 1).unwrap();
        fill(&v2, 20, 25);

        assert_eq!(set.prune(8).unwrap().version(), 0);
        assert_eq!(set.len(), 3);

        let survivor = set.prune(15).unwrap();
        assert_eq!(survivor.version(), 1);
        assert_eq!(set.len(), 2);
        assert!(!v0.path().exists());
        assert!(set.get_for_index(5).is_none());

        let survivor = set.prune(1000).unwrap();
        assert_eq!(survivor.version(), 2);
        assert_eq!(set.len(), 1);
        assert!(set.get_for_index(22).is_some());
    }

    #[test]
    fn prune_past_truncation_keeps_replacing_segment() {
        let (_dir, set) = empty_set();
        let v0 = set.rotate(NO_INDEX, NO_INDEX, -1).unwrap();
        fill(&v0, 0, 10);
        let v1 = set.rotate(9, 9, 1).unwrap();
        fill(&v1, 10, 20);
        let v2 = set.truncate(19, 4, 1).unwrap();
        fill(&v2, 5, 16);

        let survivor = set.prune(12).unwrap();
        assert_eq!(survivor.version(), 1);
        assert!(!v0.path().exists());

        let range = set.get_for_index(survivor.header().first_index()).unwrap();
        assert_eq!(range.segment.version(), 2);
        assert_eq!(range.limit, None);
    }

    #[test]
    fn prune_stops_at_referenced_segment() {
        let (_dir, set) = empty_set();
        let v0 = set.rotate(NO_INDEX, NO_INDEX, -1).unwrap();
        fill(&v0, 0, 10);
        let v1 = set.rotate(9, 9, 1).unwrap();
        fill(&v1, 10, 20);

        let cursor = v0.open_cursor(3).unwrap();
        assert_eq!(set.prune(15).unwrap().version(), 0);
        assert!(v0.path().exists());

        drop(cursor);
        assert_eq!(set.prune(15).unwrap().version(), 1);
        assert!(!v0.path().exists());
    }

    #[test]
    fn prune_empty_set_fails() {
        let (_dir, set) = empty_set();
        assert!(set.prune(10).is_err());
    }

    #[test]
    fn visit_backwards_stops_early() {
        let (_dir, set) = empty_set();
        set.rotate(NO_INDEX, NO_INDEX, -1).unwrap();
        set.rotate(NO_INDEX, NO_INDEX, -1).unwrap();
        set.rotate(NO_INDEX, NO_INDEX, -1).unwrap();

        let mut seen = Vec::new();
        set.visit_backwards(|s| {
            seen.push(s.version());
            seen.len() == 2
        });
        assert_eq!(seen, vec![2, 1]);
    }

    #[test]
    fn close_disposes_everything() {
        let (_dir, set) = empty_set();
        let v0 = set.rotate(NO_INDEX, NO_INDEX, -1).unwrap();
        fill(&v0, 0, 3);
        set.close().unwrap();
        assert!(v0.open_cursor(0).is_err());
    }
}
