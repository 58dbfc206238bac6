//! Sequential scanning of a segment file without the live log.
//!
//! Recovery uses the scanner to find where the valid data of a segment
//! ends; the command line tools use it to dump and inspect segments.

use crate::error::LogResult;
use crate::segment::header::{SegmentHeader, HEADER_SIZE};
use crate::segment::record::{read_entry, RawEntry};
use crate::types::{LogIndex, Term};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Reads a segment front to back, tracking the end of the last complete
/// frame.
#[derive(Debug)]
pub struct SegmentScanner {
    reader: BufReader<File>,
    header: Option<SegmentHeader>,
    valid_len: u64,
    file_len: u64,
}

impl SegmentScanner {
    /// Opens `path` and reads its header.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or read.
    pub fn open(path: &Path) -> LogResult<Self> {
        let file = File::open(path)?;
        let file_len = file.metadata()?.len();
        let mut reader = BufReader::new(file);
        let header = SegmentHeader::read_from(&mut reader)?;
        let valid_len = if header.is_some() { HEADER_SIZE as u64 } else { 0 };

        Ok(Self {
            reader,
            header,
            valid_len,
            file_len,
        })
    }

    /// The header, or `None` if the file is shorter than a header.
    #[must_use]
    pub fn header(&self) -> Option<&SegmentHeader> {
        self.header.as_ref()
    }

    /// Reads the next complete frame.
    ///
    /// # Errors
    ///
    /// Returns an I/O error.
    pub fn next_entry(&mut self) -> LogResult<Option<RawEntry>> {
        if self.header.is_none() {
            return Ok(None);
        }
        let remaining = self.file_len.saturating_sub(self.valid_len);
        let entry = read_entry(&mut self.reader, remaining)?;
        if let Some(entry) = &entry {
            self.valid_len += entry.frame_len();
        }
        Ok(entry)
    }

    /// Byte length up to the end of the last frame read so far.
    #[must_use]
    pub fn valid_len(&self) -> u64 {
        self.valid_len
    }

    /// Length of the file when it was opened.
    #[must_use]
    pub fn file_len(&self) -> u64 {
        self.file_len
    }

    /// Reads the whole segment and summarizes it.
    ///
    /// # Errors
    ///
    /// Returns an I/O error.
    pub fn summarize(path: &Path) -> LogResult<SegmentSummary> {
        let mut scanner = Self::open(path)?;
        let mut summary = SegmentSummary {
            header: scanner.header,
            entry_count: 0,
            first_index: None,
            last_index: None,
            last_term: None,
            valid_len: 0,
            file_len: scanner.file_len,
        };
        while let Some(entry) = scanner.next_entry()? {
            summary.entry_count += 1;
            summary.first_index.get_or_insert(entry.index);
            summary.last_index = Some(entry.index);
            summary.last_term = Some(entry.term);
        }
        summary.valid_len = scanner.valid_len;
        Ok(summary)
    }
}

/// What a full scan of one segment found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentSummary {
    /// Header, if complete.
    pub header: Option<SegmentHeader>,
    /// Number of complete frames.
    pub entry_count: u64,
    /// Index of the first frame.
    pub first_index: Option<LogIndex>,
    /// Index of the last frame.
    pub last_index: Option<LogIndex>,
    /// Term of the last frame.
    pub last_term: Option<Term>,
    /// Bytes up to the end of the last complete frame.
    pub valid_len: u64,
    /// Bytes in the file.
    pub file_len: u64,
}

impl SegmentSummary {
    /// Returns `true` if the file has trailing bytes after the last
    /// complete frame.
    #[must_use]
    pub fn is_torn(&self) -> bool {
        self.valid_len < self.file_len
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::record::{write_entry, FRAME_HEADER_SIZE};
    use std::fs;
    use tempfile::tempdir;

    fn segment_bytes(entries: &[(LogIndex, Term, &[u8])]) -> Vec<u8> {
        let mut buf = Vec::new();
        SegmentHeader::new(-1, 0, -1, -1).write_to(&mut buf).unwrap();
        for (index, term, content) in entries {
            write_entry(&mut buf, *index, *term, content).unwrap();
        }
        buf
    }

    #[test]
    fn summarize_complete_segment() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("raft.log.0");
        fs::write(&path, segment_bytes(&[(0, 1, b"a"), (1, 1, b"bb"), (2, 2, b"")])).unwrap();

        let summary = SegmentScanner::summarize(&path).unwrap();
        assert_eq!(summary.header.unwrap().version, 0);
        assert_eq!(summary.entry_count, 3);
        assert_eq!(summary.first_index, Some(0));
        assert_eq!(summary.last_index, Some(2));
        assert_eq!(summary.last_term, Some(2));
        assert!(!summary.is_torn());
    }

    #[test]
    fn corrupt_length_ends_scan_at_previous_frame() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("raft.log.0");
        let mut bytes = segment_bytes(&[(0, 1, b"first"), (1, 1, b"second")]);
        let second = HEADER_SIZE + FRAME_HEADER_SIZE + 5;
        bytes[second + 16..second + 20].copy_from_slice(&0x7fff_ffffu32.to_le_bytes());
        fs::write(&path, &bytes).unwrap();

        let summary = SegmentScanner::summarize(&path).unwrap();
        assert_eq!(summary.entry_count, 1);
        assert_eq!(summary.last_index, Some(0));
        assert_eq!(summary.valid_len, second as u64);
        assert!(summary.is_torn());
    }

    #[test]
    fn torn_tail_is_detected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("raft.log.0");
        let mut bytes = segment_bytes(&[(0, 1, b"first"), (1, 1, b"second")]);
        let full = bytes.len();
        bytes.truncate(full - 3);
        fs::write(&path, &bytes).unwrap();

        let summary = SegmentScanner::summarize(&path).unwrap();
        assert_eq!(summary.entry_count, 1);
        assert_eq!(summary.valid_len, (HEADER_SIZE + 20 + 5) as u64);
        assert!(summary.is_torn());
    }

    #[test]
    fn short_header_yields_no_entries() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("raft.log.0");
        fs::write(&path, [0u8; 10]).unwrap();

        let mut scanner = SegmentScanner::open(&path).unwrap();
        assert!(scanner.header().is_none());
        assert!(scanner.next_entry().unwrap().is_none());
        assert_eq!(scanner.valid_len(), 0);
        assert_eq!(scanner.file_len(), 10);
    }
}
