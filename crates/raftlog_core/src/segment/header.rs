//! Segment header format.
//!
//! ```text
//! | prev_file_last_index (8) | version (8) | prev_index (8) | prev_term (8) |
//! ```
//!
//! All fields are little-endian.

use crate::error::LogResult;
use crate::segment::record::read_fully;
use crate::types::{LogIndex, Term};
use std::fmt;
use std::io::{Read, Write};

/// Size of the header in bytes.
pub const HEADER_SIZE: usize = 32;

/// How a segment came to exist, derived from its header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentTransition {
    /// The previous file ended exactly where this one starts.
    Rotation,
    /// This segment rolled back a suffix of the previous file.
    Truncation,
    /// This segment jumped forward past entries that were never written.
    Skip,
}

/// Fixed-size header at the start of every segment file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentHeader {
    /// Last index of the previous file when this segment was created.
    pub prev_file_last_index: LogIndex,
    /// Version of this segment; equals the version in the file name.
    pub version: u64,
    /// Index of the entry preceding this segment's first entry.
    pub prev_index: LogIndex,
    /// Term of the entry at `prev_index`.
    pub prev_term: Term,
}

impl SegmentHeader {
    /// Creates a header.
    #[must_use]
    pub const fn new(
        prev_file_last_index: LogIndex,
        version: u64,
        prev_index: LogIndex,
        prev_term: Term,
    ) -> Self {
        Self {
            prev_file_last_index,
            version,
            prev_index,
            prev_term,
        }
    }

    /// Returns the first index this segment can hold.
    #[must_use]
    pub const fn first_index(&self) -> LogIndex {
        self.prev_index + 1
    }

    /// Classifies how this segment relates to its predecessor.
    #[must_use]
    pub fn transition(&self) -> SegmentTransition {
        match self.prev_file_last_index.cmp(&self.prev_index) {
            std::cmp::Ordering::Equal => SegmentTransition::Rotation,
            std::cmp::Ordering::Greater => SegmentTransition::Truncation,
            std::cmp::Ordering::Less => SegmentTransition::Skip,
        }
    }

    /// Encodes the header.
    #[must_use]
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..8].copy_from_slice(&self.prev_file_last_index.to_le_bytes());
        buf[8..16].copy_from_slice(&self.version.to_le_bytes());
        buf[16..24].copy_from_slice(&self.prev_index.to_le_bytes());
        buf[24..32].copy_from_slice(&self.prev_term.to_le_bytes());
        buf
    }

    /// Decodes a header.
    #[must_use]
    pub fn decode(buf: &[u8; HEADER_SIZE]) -> Self {
        let field = |i: usize| -> [u8; 8] {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(&buf[i * 8..(i + 1) * 8]);
            bytes
        };
        Self {
            prev_file_last_index: i64::from_le_bytes(field(0)),
            version: u64::from_le_bytes(field(1)),
            prev_index: i64::from_le_bytes(field(2)),
            prev_term: i64::from_le_bytes(field(3)),
        }
    }

    /// Reads a header from the start of a stream.
    ///
    /// Returns `Ok(None)` if the stream ends before a full header, which
    /// happens when a crash interrupted the header write.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure.
    pub fn read_from<R: Read>(reader: &mut R) -> LogResult<Option<Self>> {
        let mut buf = [0u8; HEADER_SIZE];
        if !read_fully(reader, &mut buf)? {
            return Ok(None);
        }
        Ok(Some(Self::decode(&buf)))
    }

    /// Writes the header.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> LogResult<()> {
        writer.write_all(&self.encode())?;
        Ok(())
    }
}

impl fmt::Display for SegmentHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SegmentHeader{{prev_file_last_index={}, version={}, prev_index={}, prev_term={}}}",
            self.prev_file_last_index, self.version, self.prev_index, self.prev_term
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn encode_layout_is_fixed() {
        let header = SegmentHeader::new(9, 3, 9, 2);
        let bytes = header.encode();
        assert_eq!(&bytes[0..8], &9i64.to_le_bytes());
        assert_eq!(&bytes[8..16], &3u64.to_le_bytes());
        assert_eq!(&bytes[16..24], &9i64.to_le_bytes());
        assert_eq!(&bytes[24..32], &2i64.to_le_bytes());
        assert_eq!(SegmentHeader::decode(&bytes), header);
    }

    #[test]
    fn initial_header_keeps_sentinels() {
        let header = SegmentHeader::new(-1, 0, -1, -1);
        let mut buf = Vec::new();
        header.write_to(&mut buf).unwrap();
        let read = SegmentHeader::read_from(&mut Cursor::new(buf)).unwrap();
        assert_eq!(read, Some(header));
        assert_eq!(header.first_index(), 0);
    }

    #[test]
    fn short_header_reads_as_none() {
        let bytes = SegmentHeader::new(1, 1, 1, 1).encode();
        let mut cursor = Cursor::new(bytes[..20].to_vec());
        assert_eq!(SegmentHeader::read_from(&mut cursor).unwrap(), None);

        let mut empty = Cursor::new(Vec::new());
        assert_eq!(SegmentHeader::read_from(&mut empty).unwrap(), None);
    }

    #[test]
    fn transition_classification() {
        assert_eq!(
            SegmentHeader::new(5, 1, 5, 1).transition(),
            SegmentTransition::Rotation
        );
        assert_eq!(
            SegmentHeader::new(8, 1, 5, 1).transition(),
            SegmentTransition::Truncation
        );
        assert_eq!(
            SegmentHeader::new(5, 1, 20, 3).transition(),
            SegmentTransition::Skip
        );
    }
}
