//! Log directory management.
//!
//! ```text
//! <log_dir>/
//! ├─ LOCK              # Advisory lock for single-writer
//! ├─ raft.log.0        # Segment files, one per version
//! ├─ raft.log.1
//! └─ ...
//! ```
//!
//! The LOCK file ensures only one process can write to the log at a time.

use crate::error::{LogError, LogResult};
use crate::naming::FileNames;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "LOCK";

/// Holds an exclusive lock on a log directory.
///
/// Only one `LogDir` instance can exist per directory at a time; the lock is
/// released when the value is dropped.
#[derive(Debug)]
pub struct LogDir {
    path: PathBuf,
    names: FileNames,
    _lock_file: File,
}

impl LogDir {
    /// Opens (creating if needed) a log directory and locks it.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The path exists but is not a directory
    /// - Another process holds the lock (returns `Locked`)
    /// - I/O errors occur
    pub fn open(path: &Path, file_prefix: &str) -> LogResult<Self> {
        if !path.exists() {
            fs::create_dir_all(path)?;
        }

        if !path.is_dir() {
            return Err(LogError::invalid_operation(format!(
                "path is not a directory: {}",
                path.display()
            )));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(LogError::Locked);
        }

        Ok(Self {
            path: path.to_path_buf(),
            names: FileNames::new(path, file_prefix),
            _lock_file: lock_file,
        })
    }

    /// Returns the directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the segment naming scheme for this directory.
    #[must_use]
    pub fn file_names(&self) -> &FileNames {
        &self.names
    }
}

/// Syncs a directory so that file creations and deletions are durable.
///
/// On Windows NTFS the journal covers metadata durability, so this is a
/// no-op there.
#[cfg(unix)]
pub fn sync_directory(path: &Path) -> LogResult<()> {
    File::open(path)?.sync_all()?;
    Ok(())
}

/// Syncs a directory so that file creations and deletions are durable.
#[cfg(not(unix))]
pub fn sync_directory(_path: &Path) -> LogResult<()> {
    Ok(())
}
