//! Pool of open segment readers.

use crate::error::LogResult;
use crate::naming::FileNames;
use parking_lot::Mutex;
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::time::{Duration, Instant};
use tracing::debug;

/// Read buffer size for segment readers.
const READ_BUFFER_SIZE: usize = 64 * 1024; // 64 KB

/// An open, seekable read handle over one segment file.
///
/// The handle tracks its byte position so cursors can record where each
/// entry starts without extra syscalls.
#[derive(Debug)]
pub struct Reader {
    version: u64,
    inner: BufReader<File>,
    position: u64,
    last_used: Instant,
}

impl Reader {
    fn open(names: &FileNames, version: u64) -> LogResult<Self> {
        let file = File::open(names.path_for(version))?;
        Ok(Self {
            version,
            inner: BufReader::with_capacity(READ_BUFFER_SIZE, file),
            position: 0,
            last_used: Instant::now(),
        })
    }

    /// Version of the segment this reader is open on.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Current byte position.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Current length of the underlying file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file metadata cannot be read.
    pub fn file_len(&self) -> LogResult<u64> {
        Ok(self.inner.get_ref().metadata()?.len())
    }

    /// Moves to `offset`.
    ///
    /// # Errors
    ///
    /// Returns an error if the seek fails.
    pub fn seek_to(&mut self, offset: u64) -> LogResult<()> {
        if offset != self.position {
            self.inner.seek(SeekFrom::Start(offset))?;
            self.position = offset;
        }
        Ok(())
    }
}

impl Read for Reader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.position += n as u64;
        Ok(n)
    }
}

/// Bounded pool of idle [`Reader`]s keyed by segment version.
///
/// Acquiring takes a handle out of the pool; releasing puts it back. When
/// the pool is over capacity the least recently used handle is closed.
#[derive(Debug)]
pub struct ReaderPool {
    names: FileNames,
    max_size: usize,
    pool: Mutex<Vec<Reader>>,
}

impl ReaderPool {
    /// Creates a pool that opens files named by `names`.
    pub fn new(names: FileNames, max_size: usize) -> Self {
        Self {
            names,
            max_size,
            pool: Mutex::new(Vec::new()),
        }
    }

    /// Returns a reader on `version` positioned at `byte_offset`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or the seek fails.
    pub fn acquire(&self, version: u64, byte_offset: u64) -> LogResult<Reader> {
        let pooled = {
            let mut pool = self.pool.lock();
            pool.iter()
                .position(|r| r.version == version)
                .map(|i| pool.swap_remove(i))
        };

        let mut reader = match pooled {
            Some(reader) => reader,
            None => Reader::open(&self.names, version)?,
        };
        reader.seek_to(byte_offset)?;
        Ok(reader)
    }

    /// Returns a reader to the pool.
    pub fn release(&self, mut reader: Reader) {
        reader.last_used = Instant::now();

        let evicted = {
            let mut pool = self.pool.lock();
            pool.push(reader);
            if pool.len() > self.max_size {
                pool.iter()
                    .enumerate()
                    .min_by_key(|(_, r)| r.last_used)
                    .map(|(i, _)| i)
                    .map(|i| pool.swap_remove(i))
            } else {
                None
            }
        };

        if let Some(evicted) = evicted {
            debug!(version = evicted.version, "evicting reader over pool capacity");
        }
    }

    /// Closes readers that have been idle for longer than `max_age`.
    ///
    /// Returns the number of readers closed.
    pub fn prune_idle(&self, max_age: Duration) -> usize {
        let now = Instant::now();
        self.evict(|r| now.duration_since(r.last_used) > max_age)
    }

    /// Closes every pooled reader on `version`.
    ///
    /// Returns the number of readers closed.
    pub fn prune_version(&self, version: u64) -> usize {
        self.evict(|r| r.version == version)
    }

    /// Closes every pooled reader.
    pub fn clear(&self) {
        self.pool.lock().clear();
    }

    /// Number of idle readers in the pool.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pool.lock().len()
    }

    /// Returns `true` if no readers are pooled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn evict<F>(&self, mut predicate: F) -> usize
    where
        F: FnMut(&Reader) -> bool,
    {
        // Dropping the readers outside the lock closes their files.
        let removed: Vec<Reader> = {
            let mut pool = self.pool.lock();
            let (removed, kept): (Vec<_>, Vec<_>) = pool.drain(..).partition(|r| predicate(r));
            *pool = kept;
            removed
        };
        removed.len()
    }
}
