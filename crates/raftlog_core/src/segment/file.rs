//! A single segment file.

use crate::error::{LogError, LogResult};
use crate::reader::{PositionCache, Reader, ReaderPool};
use crate::refcount::{RefCounter, RefState};
use crate::segment::header::{SegmentHeader, HEADER_SIZE};
use crate::segment::record::{read_entry, write_entry, RawEntry};
use crate::types::{LogIndex, LogPosition, Term};
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

/// Write buffer size for the segment writer.
const WRITE_BUFFER_SIZE: usize = 64 * 1024; // 64 KB

/// One versioned segment file holding a contiguous run of entries.
///
/// The writer is opened lazily on the first write and holds one reference
/// on the segment for as long as it is open. Every cursor holds another.
/// A segment whose references have all been released can be disposed,
/// after which it accepts neither writes nor new cursors.
#[derive(Debug)]
pub struct SegmentFile {
    path: PathBuf,
    header: SegmentHeader,
    pool: Arc<ReaderPool>,
    refs: RefCounter,
    writer: Mutex<Option<BufWriter<File>>>,
    size: AtomicU64,
    positions: Mutex<PositionCache>,
    force_on_flush: bool,
}

impl SegmentFile {
    /// Creates a new segment file and durably writes its header.
    ///
    /// # Errors
    ///
    /// Returns an error if the file already exists or cannot be written.
    pub fn create(
        path: PathBuf,
        header: SegmentHeader,
        pool: Arc<ReaderPool>,
        force_on_flush: bool,
    ) -> LogResult<Self> {
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)?;
        header.write_to(&mut file)?;
        file.sync_all()?;

        debug!(path = %path.display(), %header, "created segment");
        Ok(Self::with_size(
            path,
            header,
            pool,
            HEADER_SIZE as u64,
            force_on_flush,
        ))
    }

    /// Wraps an existing segment file whose header has already been read.
    ///
    /// # Errors
    ///
    /// Returns an error if the file's metadata cannot be read.
    pub fn open(
        path: PathBuf,
        header: SegmentHeader,
        pool: Arc<ReaderPool>,
        force_on_flush: bool,
    ) -> LogResult<Self> {
        let size = fs::metadata(&path)?.len();
        Ok(Self::with_size(path, header, pool, size, force_on_flush))
    }

    fn with_size(
        path: PathBuf,
        header: SegmentHeader,
        pool: Arc<ReaderPool>,
        size: u64,
        force_on_flush: bool,
    ) -> Self {
        Self {
            path,
            header,
            pool,
            refs: RefCounter::new(),
            writer: Mutex::new(None),
            size: AtomicU64::new(size),
            positions: Mutex::new(PositionCache::new(LogPosition::new(0, HEADER_SIZE as u64))),
            force_on_flush,
        }
    }

    /// Returns the segment header.
    #[must_use]
    pub fn header(&self) -> &SegmentHeader {
        &self.header
    }

    /// Returns the segment version.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.header.version
    }

    /// Returns the path of the segment file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes written to the segment, header included.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size.load(Ordering::Acquire)
    }

    /// Current reference state.
    #[must_use]
    pub fn references(&self) -> RefState {
        self.refs.state()
    }

    /// Appends one entry frame.
    ///
    /// The frame may sit in the write buffer until [`flush`](Self::flush).
    ///
    /// # Errors
    ///
    /// Returns [`LogError::SegmentDisposed`] if the segment was disposed, or
    /// an I/O error.
    pub fn write(&self, index: LogIndex, term: Term, content: &[u8]) -> LogResult<()> {
        let mut guard = self.writer.lock();
        if guard.is_none() {
            if !self.refs.increase() {
                return Err(LogError::SegmentDisposed {
                    version: self.version(),
                });
            }
            match OpenOptions::new().append(true).open(&self.path) {
                Ok(file) => *guard = Some(BufWriter::with_capacity(WRITE_BUFFER_SIZE, file)),
                Err(e) => {
                    self.refs.decrease();
                    return Err(e.into());
                }
            }
        }

        let Some(writer) = guard.as_mut() else {
            return Err(LogError::invalid_operation("segment writer unavailable"));
        };
        let written = write_entry(writer, index, term, content)?;
        self.size.fetch_add(written, Ordering::AcqRel);
        trace!(version = self.version(), index, term, written, "wrote entry");
        Ok(())
    }

    /// Pushes buffered frames to the file, syncing if configured to.
    ///
    /// # Errors
    ///
    /// Returns an I/O error.
    pub fn flush(&self) -> LogResult<()> {
        if let Some(writer) = self.writer.lock().as_mut() {
            writer.flush()?;
            if self.force_on_flush {
                writer.get_ref().sync_data()?;
            }
        }
        Ok(())
    }

    /// Flushes and closes the writer, releasing its reference.
    ///
    /// # Errors
    ///
    /// Returns an I/O error from the final flush.
    pub fn close_writer(&self) -> LogResult<()> {
        let Some(mut writer) = self.writer.lock().take() else {
            return Ok(());
        };
        let flushed = writer.flush().map_err(LogError::from).and_then(|()| {
            if self.force_on_flush {
                writer.get_ref().sync_data()?;
            }
            Ok(())
        });
        drop(writer);
        self.refs.decrease();
        flushed
    }

    /// Opens a cursor positioned at `from_index`.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::SegmentDisposed`] if the segment was disposed,
    /// [`LogError::InvalidOperation`] if `from_index` precedes the segment,
    /// or an I/O error.
    pub fn open_cursor(self: &Arc<Self>, from_index: LogIndex) -> LogResult<SegmentCursor> {
        SegmentCursor::open(Arc::clone(self), from_index)
    }

    /// Disposes the segment if nothing references it.
    ///
    /// Returns `false` if a writer or cursor still holds the segment.
    pub fn try_close(&self) -> bool {
        if !self.refs.try_dispose() {
            return false;
        }
        let closed = self.pool.prune_version(self.version());
        debug!(version = self.version(), closed, "disposed segment");
        true
    }

    /// Closes the writer and disposes the segment.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::InvalidOperation`] if a cursor still holds the
    /// segment, or an I/O error from the final flush.
    pub fn close(&self) -> LogResult<()> {
        self.close_writer()?;
        if self.try_close() {
            Ok(())
        } else {
            Err(LogError::invalid_operation(format!(
                "segment {} is still referenced by open cursors",
                self.version()
            )))
        }
    }

    /// Removes the file from disk.
    ///
    /// # Errors
    ///
    /// Returns an I/O error.
    pub fn delete(&self) -> LogResult<()> {
        fs::remove_file(&self.path)?;
        debug!(path = %self.path.display(), "deleted segment");
        Ok(())
    }
}

/// Sequential reader over the entries of one segment.
///
/// The cursor holds a reference on its segment from construction until it
/// is dropped. When it is dropped after reading cleanly its position is
/// remembered by the segment and its file handle goes back to the pool.
#[derive(Debug)]
pub struct SegmentCursor {
    segment: Arc<SegmentFile>,
    reader: Option<Reader>,
    relative_index: i64,
    next_offset: u64,
    file_len: u64,
}

impl SegmentCursor {
    fn open(segment: Arc<SegmentFile>, from_index: LogIndex) -> LogResult<Self> {
        let prev_index = segment.header.prev_index;
        if from_index <= prev_index {
            return Err(LogError::invalid_operation(format!(
                "index {from_index} precedes segment {} starting after {prev_index}",
                segment.version()
            )));
        }
        if !segment.refs.increase() {
            return Err(LogError::SegmentDisposed {
                version: segment.version(),
            });
        }

        let target = from_index - prev_index - 1;
        let start = segment.positions.lock().lookup(target);
        let mut cursor = Self {
            reader: None,
            relative_index: start.relative_index,
            next_offset: start.byte_offset,
            file_len: 0,
            segment,
        };
        cursor.reader = Some(
            cursor
                .segment
                .pool
                .acquire(cursor.segment.version(), start.byte_offset)?,
        );

        while cursor.relative_index < target {
            if cursor.next_raw()?.is_none() {
                break;
            }
        }
        Ok(cursor)
    }

    /// Index of the entry the next read returns.
    #[must_use]
    pub fn next_index(&self) -> LogIndex {
        self.segment.header.first_index() + self.relative_index
    }

    /// Reads the next frame, or `None` at the end of the written data.
    ///
    /// After an error the cursor is unusable and its file handle is
    /// discarded rather than pooled.
    ///
    /// # Errors
    ///
    /// Returns an I/O error.
    pub fn next_raw(&mut self) -> LogResult<Option<RawEntry>> {
        let result = self.read_frame();
        if result.is_err() {
            self.reader = None;
        }
        result
    }

    fn read_frame(&mut self) -> LogResult<Option<RawEntry>> {
        let Some(reader) = self.reader.as_mut() else {
            return Ok(None);
        };
        loop {
            let remaining = self.file_len.saturating_sub(self.next_offset);
            if let Some(entry) = read_entry(reader, remaining)? {
                self.relative_index += 1;
                self.next_offset += entry.frame_len();
                return Ok(Some(entry));
            }
            // Rewind past a frame the writer has only partly flushed.
            reader.seek_to(self.next_offset)?;
            let file_len = reader.file_len()?;
            if file_len <= self.file_len {
                return Ok(None);
            }
            self.file_len = file_len;
        }
    }
}

impl Drop for SegmentCursor {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            if self.relative_index > 0 {
                self.segment
                    .positions
                    .lock()
                    .put(LogPosition::new(self.relative_index, self.next_offset));
            }
            self.segment.pool.release(reader);
        }
        self.segment.refs.decrease();
    }
}
