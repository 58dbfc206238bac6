//! Streaming cursor over log entries.
//!
//! An [`EntryCursor`] yields entries in index order starting at the index it
//! was opened at, moving from one segment to the next as each segment's
//! range ends. Only one segment is referenced at a time.

use crate::error::{LogError, LogResult};
use crate::marshal::ContentMarshal;
use crate::segment::{SegmentCursor, SegmentSet};
use crate::stats::LogStats;
use crate::types::{EntryRecord, LogIndex};
use std::sync::Arc;

/// A cursor over the entries of the log.
///
/// # Error Handling
///
/// - Reaching the end of the written data ends iteration
/// - A frame whose index breaks the sequence yields [`LogError::DamagedLog`]
/// - A segment pruned from under the cursor yields
///   [`LogError::SegmentDisposed`]
///
/// After yielding an error the cursor is finished.
///
/// # Example
///
/// ```ignore
/// for entry in log.open_cursor(10)? {
///     let entry = entry?;
///     send_to_follower(entry.index, entry.term, entry.content);
/// }
/// ```
pub struct EntryCursor<M: ContentMarshal> {
    segments: Arc<SegmentSet>,
    marshal: Arc<M>,
    stats: Arc<LogStats>,
    next_index: LogIndex,
    /// First index not served by the current segment.
    limit: Option<LogIndex>,
    current: Option<SegmentCursor>,
    finished: bool,
}

impl<M: ContentMarshal> EntryCursor<M> {
    pub(crate) fn new(
        segments: Arc<SegmentSet>,
        marshal: Arc<M>,
        stats: Arc<LogStats>,
        from_index: LogIndex,
    ) -> Self {
        Self {
            segments,
            marshal,
            stats,
            next_index: from_index,
            limit: None,
            current: None,
            finished: false,
        }
    }

    pub(crate) fn empty(segments: Arc<SegmentSet>, marshal: Arc<M>, stats: Arc<LogStats>) -> Self {
        let mut cursor = Self::new(segments, marshal, stats, 0);
        cursor.finished = true;
        cursor
    }

    /// Index of the entry the next call to `next` returns.
    #[must_use]
    pub fn next_index(&self) -> LogIndex {
        self.next_index
    }

    fn needs_segment(&self) -> bool {
        self.current.is_none() || self.limit.is_some_and(|limit| self.next_index >= limit)
    }

    fn open_segment(&mut self) -> LogResult<bool> {
        // Release the old segment before referencing the next one.
        self.current = None;

        let Some(range) = self.segments.get_for_index(self.next_index) else {
            return Ok(false);
        };
        self.current = Some(range.segment.open_cursor(self.next_index)?);
        self.limit = range.limit;
        Ok(true)
    }

    fn read_next(&mut self) -> LogResult<Option<EntryRecord<M::Content>>> {
        if self.needs_segment() && !self.open_segment()? {
            return Ok(None);
        }
        let Some(current) = self.current.as_mut() else {
            return Ok(None);
        };
        let Some(raw) = current.next_raw()? else {
            return Ok(None);
        };

        if raw.index != self.next_index {
            return Err(LogError::damaged(format!(
                "expected entry {} but read entry {}",
                self.next_index, raw.index
            )));
        }
        let content = self.marshal.unmarshal(&raw.content)?;
        self.next_index += 1;
        Ok(Some(EntryRecord {
            index: raw.index,
            term: raw.term,
            content,
        }))
    }
}

impl<M: ContentMarshal> Iterator for EntryCursor<M> {
    type Item = LogResult<EntryRecord<M::Content>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.read_next() {
            Ok(Some(entry)) => {
                self.stats.record_read();
                Some(Ok(entry))
            }
            Ok(None) => {
                self.finished = true;
                self.current = None;
                None
            }
            Err(e) => {
                self.finished = true;
                self.current = None;
                Some(Err(e))
            }
        }
    }
}

impl<M: ContentMarshal> std::fmt::Debug for EntryCursor<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryCursor")
            .field("next_index", &self.next_index)
            .field("limit", &self.limit)
            .field("finished", &self.finished)
            .finish()
    }
}
