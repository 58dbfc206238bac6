//! Entry framing within a segment.
//!
//! ```text
//! | index (8) | term (8) | content_len (4) | content (N) |
//! ```
//!
//! All integers are little-endian. A frame cut short by the end of the file
//! is treated as the end of the segment: it is the remains of a write that
//! a crash interrupted.

use crate::error::{LogError, LogResult};
use crate::types::{LogIndex, Term};
use std::io::{self, Read, Write};

/// Size of the fixed part of an entry frame.
pub const FRAME_HEADER_SIZE: usize = 20;

/// Maximum size of a single entry's content.
///
/// The frame uses a 4-byte length field.
pub const MAX_CONTENT_SIZE: usize = u32::MAX as usize;

/// An entry frame with undecoded content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntry {
    /// Index of the entry.
    pub index: LogIndex,
    /// Term of the entry.
    pub term: Term,
    /// Marshaled content bytes.
    pub content: Vec<u8>,
}

impl RawEntry {
    /// Total encoded size of the frame.
    #[must_use]
    pub fn frame_len(&self) -> u64 {
        (FRAME_HEADER_SIZE + self.content.len()) as u64
    }
}

/// Writes one entry frame and returns the number of bytes written.
///
/// # Errors
///
/// Returns an error if the content exceeds [`MAX_CONTENT_SIZE`] or on I/O
/// failure.
pub fn write_entry<W: Write>(
    writer: &mut W,
    index: LogIndex,
    term: Term,
    content: &[u8],
) -> LogResult<u64> {
    let len = u32::try_from(content.len()).map_err(|_| {
        LogError::invalid_operation(format!(
            "entry content too large: {} bytes exceeds maximum of {} bytes",
            content.len(),
            MAX_CONTENT_SIZE
        ))
    })?;

    let mut head = [0u8; FRAME_HEADER_SIZE];
    head[0..8].copy_from_slice(&index.to_le_bytes());
    head[8..16].copy_from_slice(&term.to_le_bytes());
    head[16..20].copy_from_slice(&len.to_le_bytes());

    writer.write_all(&head)?;
    writer.write_all(content)?;

    Ok((FRAME_HEADER_SIZE + content.len()) as u64)
}

/// Reads the next entry frame from a stream holding `remaining` more bytes.
///
/// Returns `Ok(None)` at the end of the data, including when only part of a
/// frame is present. A length field reaching past `remaining` also ends the
/// data, and no content is read for it.
///
/// # Errors
///
/// Returns an error on I/O failure.
pub fn read_entry<R: Read>(reader: &mut R, remaining: u64) -> LogResult<Option<RawEntry>> {
    if remaining < FRAME_HEADER_SIZE as u64 {
        return Ok(None);
    }
    let mut head = [0u8; FRAME_HEADER_SIZE];
    if !read_fully(reader, &mut head)? {
        return Ok(None);
    }

    let index = i64::from_le_bytes(head[0..8].try_into().map_err(|_| frame_error())?);
    let term = i64::from_le_bytes(head[8..16].try_into().map_err(|_| frame_error())?);
    let len = u32::from_le_bytes(head[16..20].try_into().map_err(|_| frame_error())?) as usize;
    if len as u64 > remaining - FRAME_HEADER_SIZE as u64 {
        return Ok(None);
    }

    let mut content = Vec::with_capacity(len);
    let read = reader.take(len as u64).read_to_end(&mut content)?;
    if read < len {
        return Ok(None);
    }

    Ok(Some(RawEntry {
        index,
        term,
        content,
    }))
}

fn frame_error() -> LogError {
    LogError::damaged("malformed entry frame")
}

/// Fills `buf` completely.
///
/// Returns `Ok(false)` if the stream ended first; bytes read before the end
/// are discarded.
pub(crate) fn read_fully<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => return Ok(false),
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(true)
}
