//! Segment file naming.
//!
//! Segment files are named `<prefix>.<version>` where `version` is a
//! decimal number without leading zeros.

use crate::error::LogResult;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Maps segment versions to file paths inside a log directory.
#[derive(Debug, Clone)]
pub struct FileNames {
    dir: PathBuf,
    prefix: String,
}

impl FileNames {
    /// Creates a naming scheme for `dir` using `prefix`.
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
        }
    }

    /// Returns the log directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the file name prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Returns the path of the segment with `version`.
    #[must_use]
    pub fn path_for(&self, version: u64) -> PathBuf {
        self.dir.join(format!("{}.{}", self.prefix, version))
    }

    /// Parses a file name, returning its version if it is a segment name.
    #[must_use]
    pub fn parse(&self, file_name: &str) -> Option<u64> {
        let digits = file_name
            .strip_prefix(self.prefix.as_str())?
            .strip_prefix('.')?;

        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        if digits.len() > 1 && digits.starts_with('0') {
            return None;
        }
        digits.parse().ok()
    }

    /// Lists segment files in the directory, ordered by version.
    ///
    /// Files with other names are ignored; names that look like segment
    /// files but do not parse are reported.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be read.
    pub fn all_files(&self) -> LogResult<BTreeMap<u64, PathBuf>> {
        let mut files = BTreeMap::new();

        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };

            match self.parse(name) {
                Some(version) => {
                    files.insert(version, entry.path());
                }
                None if name.starts_with(self.prefix.as_str()) => {
                    warn!(file = %name, "ignoring out of place file in log directory");
                }
                None => {}
            }
        }

        Ok(files)
    }
}
