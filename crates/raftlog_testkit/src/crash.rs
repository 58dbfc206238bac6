//! Crash simulation for segment files.
//!
//! A crash can leave the newest segment with a partly written entry or a
//! partly written header. These helpers damage closed segment files the
//! same way so recovery can be tested against them.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use raftlog_testkit::crash::{simulate_crash, CrashPoint};
//!
//! log.close();
//! simulate_crash(&log.segment_path(1), CrashPoint::MidEntry)?;
//! log.reopen();
//! ```

use raftlog_core::segment::HEADER_SIZE;
use raftlog_core::SegmentHeader;
use std::fs::{self, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Points at which a crash can be simulated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrashPoint {
    /// The header of a new segment was only partly written.
    MidHeader,
    /// The last entry frame was only partly written.
    MidEntry,
}

/// Damages `path` as a crash at `point` would.
///
/// # Errors
///
/// Returns an I/O error if the file cannot be modified.
pub fn simulate_crash(path: &Path, point: CrashPoint) -> io::Result<()> {
    match point {
        CrashPoint::MidHeader => truncate_header(path, HEADER_SIZE / 2),
        CrashPoint::MidEntry => chop_file(path, 1).map(|_| ()),
    }
}

/// Removes the last `bytes` bytes of a file.
///
/// Returns the new length.
///
/// # Errors
///
/// Returns an I/O error if the file cannot be resized.
pub fn chop_file(path: &Path, bytes: u64) -> io::Result<u64> {
    let file = OpenOptions::new().write(true).open(path)?;
    let len = file.metadata()?.len();
    let new_len = len.saturating_sub(bytes);
    file.set_len(new_len)?;
    file.sync_all()?;
    Ok(new_len)
}

/// Cuts a segment down to its first `keep` bytes, leaving an incomplete
/// header.
///
/// # Errors
///
/// Returns `InvalidInput` if `keep` would leave a complete header, or an
/// I/O error.
pub fn truncate_header(path: &Path, keep: usize) -> io::Result<()> {
    if keep >= HEADER_SIZE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("keeping {keep} bytes leaves the {HEADER_SIZE} byte header intact"),
        ));
    }
    let file = OpenOptions::new().write(true).open(path)?;
    file.set_len(keep as u64)?;
    file.sync_all()
}

/// Overwrites the version field in a segment header.
///
/// # Errors
///
/// Returns an I/O error, or `UnexpectedEof` if the file has no complete
/// header.
pub fn rewrite_header_version(path: &Path, version: u64) -> io::Result<()> {
    let mut file = OpenOptions::new().read(true).write(true).open(path)?;
    let mut buf = [0u8; HEADER_SIZE];
    file.read_exact(&mut buf)?;

    let mut header = SegmentHeader::decode(&buf);
    header.version = version;
    file.seek(SeekFrom::Start(0))?;
    file.write_all(&header.encode())?;
    file.sync_all()
}

/// Reads the header of a segment file.
///
/// # Errors
///
/// Returns an I/O error, or `UnexpectedEof` if the file has no complete
/// header.
pub fn read_header(path: &Path) -> io::Result<SegmentHeader> {
    let bytes = fs::read(path)?;
    let buf: [u8; HEADER_SIZE] = bytes
        .get(..HEADER_SIZE)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "incomplete header"))?;
    Ok(SegmentHeader::decode(&buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn segment(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("raft.log.0");
        let mut bytes = SegmentHeader::new(-1, 0, -1, -1).encode().to_vec();
        bytes.extend_from_slice(&[7u8; 40]);
        fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn chop_removes_tail() {
        let dir = tempdir().unwrap();
        let path = segment(dir.path());
        assert_eq!(chop_file(&path, 10).unwrap(), 62);
        assert_eq!(chop_file(&path, 1000).unwrap(), 0);
    }

    #[test]
    fn truncate_header_refuses_complete_header() {
        let dir = tempdir().unwrap();
        let path = segment(dir.path());
        assert!(truncate_header(&path, HEADER_SIZE).is_err());
        truncate_header(&path, 5).unwrap();
        assert_eq!(fs::metadata(&path).unwrap().len(), 5);
        assert!(read_header(&path).is_err());
    }

    #[test]
    fn rewrite_version_keeps_other_fields() {
        let dir = tempdir().unwrap();
        let path = segment(dir.path());
        rewrite_header_version(&path, 9).unwrap();
        assert_eq!(read_header(&path).unwrap(), SegmentHeader::new(-1, 9, -1, -1));
        assert_eq!(fs::metadata(&path).unwrap().len(), 72);
    }
}
