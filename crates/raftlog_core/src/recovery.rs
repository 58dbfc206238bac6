//! Rebuilding log state from the segment files on disk.
//!
//! Recovery runs once when the log is opened:
//! 1. An empty directory yields a fresh log with one empty segment.
//! 2. Every file is checked for a contiguous version and a header carrying
//!    the version in its name.
//! 3. Headers describing a skip move the start of the log forward.
//! 4. The newest readable segment is scanned to rebuild the term index;
//!    a torn frame at its end is cut off.
//! 5. A newest segment whose header was never completely written is
//!    rewritten with a header continuing the log.

use crate::error::{LogError, LogResult};
use crate::naming::FileNames;
use crate::reader::ReaderPool;
use crate::segment::{SegmentFile, SegmentHeader, SegmentScanner, SegmentSet};
use crate::terms::TermIndex;
use crate::types::{LogIndex, Term, NO_INDEX, NO_TERM};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Log state reconstructed from disk.
#[derive(Debug)]
pub struct RecoveredState {
    /// Index of the last entry.
    pub append_index: LogIndex,
    /// Index preceding the first readable entry.
    pub prev_index: LogIndex,
    /// Term of the entry at `prev_index`.
    pub prev_term: Term,
    /// Terms of the entries in the newest segment.
    pub terms: TermIndex,
    /// Every live segment.
    pub segments: SegmentSet,
}

/// Reads the segment files of one directory back into a [`RecoveredState`].
#[derive(Debug)]
pub struct RecoveryProtocol {
    names: FileNames,
    pool: Arc<ReaderPool>,
    force_on_flush: bool,
}

impl RecoveryProtocol {
    /// Creates a protocol over the files named by `names`.
    pub fn new(names: FileNames, pool: Arc<ReaderPool>, force_on_flush: bool) -> Self {
        Self {
            names,
            pool,
            force_on_flush,
        }
    }

    /// Runs recovery.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::DamagedLog`] if the files are inconsistent in a
    /// way that cannot be repaired, or an I/O error.
    pub fn run(self) -> LogResult<RecoveredState> {
        let files = self.names.all_files()?;
        if files.is_empty() {
            return self.fresh();
        }

        let file_count = files.len();
        let mut expected_version = files.keys().next().copied().unwrap_or(0);
        let mut headers: Vec<(PathBuf, SegmentHeader)> = Vec::with_capacity(file_count);
        let mut broken_last: Option<(u64, PathBuf)> = None;
        let mut prev_index = NO_INDEX;
        let mut prev_term = NO_TERM;

        for (position, (version, path)) in files.into_iter().enumerate() {
            if version != expected_version {
                return Err(LogError::damaged(format!(
                    "non-contiguous versions: expected {expected_version}, found {version}"
                )));
            }
            expected_version += 1;

            let Some(header) = read_header(&path)? else {
                if position + 1 < file_count {
                    return Err(LogError::damaged(format!(
                        "intermediate file with incomplete header: {}",
                        path.display()
                    )));
                }
                if file_count == 1 && version != 0 {
                    return Err(LogError::damaged(format!(
                        "single file with incomplete header: {}",
                        path.display()
                    )));
                }
                broken_last = Some((version, path));
                break;
            };

            if header.version != version {
                return Err(LogError::damaged(format!(
                    "version mismatch: {} carries header version {}",
                    path.display(),
                    header.version
                )));
            }
            if position == 0 || header.prev_index > header.prev_file_last_index {
                prev_index = header.prev_index;
                prev_term = header.prev_term;
            }
            headers.push((path, header));
        }

        let (append_index, terms) = match headers.last() {
            Some((last_path, last_header)) => scan_last_segment(last_path, last_header)?,
            None => (NO_INDEX, TermIndex::new(NO_INDEX, NO_TERM)),
        };

        if let Some((version, path)) = broken_last {
            // A lone first segment was torn while the log was being created.
            let header = if headers.is_empty() {
                SegmentHeader::new(NO_INDEX, version, NO_INDEX, NO_TERM)
            } else {
                SegmentHeader::new(append_index, version, append_index, terms.latest())
            };
            warn!(path = %path.display(), %header, "rewriting incomplete segment header");
            let mut file = File::create(&path)?;
            header.write_to(&mut file)?;
            file.sync_all()?;
            headers.push((path, header));
        }

        let mut segments = Vec::with_capacity(headers.len());
        for (path, header) in headers {
            segments.push(Arc::new(SegmentFile::open(
                path,
                header,
                Arc::clone(&self.pool),
                self.force_on_flush,
            )?));
        }
        let segment_count = segments.len();
        let segments = SegmentSet::new(self.names, self.pool, self.force_on_flush, segments);

        info!(
            segments = segment_count,
            prev_index, append_index, "recovered log"
        );
        Ok(RecoveredState {
            append_index,
            prev_index,
            prev_term,
            terms,
            segments,
        })
    }

    fn fresh(self) -> LogResult<RecoveredState> {
        let segments = SegmentSet::new(self.names, self.pool, self.force_on_flush, Vec::new());
        segments.rotate(NO_INDEX, NO_INDEX, NO_TERM)?;
        info!("initialized empty log");
        Ok(RecoveredState {
            append_index: NO_INDEX,
            prev_index: NO_INDEX,
            prev_term: NO_TERM,
            terms: TermIndex::new(NO_INDEX, NO_TERM),
            segments,
        })
    }
}

fn read_header(path: &Path) -> LogResult<Option<SegmentHeader>> {
    let scanner = SegmentScanner::open(path)?;
    Ok(scanner.header().copied())
}

/// Scans the newest segment, cutting off a torn tail, and returns the
/// append index together with the terms of its entries.
fn scan_last_segment(path: &Path, header: &SegmentHeader) -> LogResult<(LogIndex, TermIndex)> {
    let mut terms = TermIndex::new(header.prev_index, header.prev_term);
    let mut append_index = header.prev_index;

    let mut scanner = SegmentScanner::open(path)?;
    while let Some(entry) = scanner.next_entry()? {
        if entry.index != append_index + 1 {
            return Err(LogError::damaged(format!(
                "{} holds index {} where {} was expected",
                path.display(),
                entry.index,
                append_index + 1
            )));
        }
        terms.append(entry.index, entry.term).map_err(|e| {
            LogError::damaged(format!("{}: {e}", path.display()))
        })?;
        append_index = entry.index;
    }

    if scanner.valid_len() < scanner.file_len() {
        warn!(
            path = %path.display(),
            valid_len = scanner.valid_len(),
            file_len = scanner.file_len(),
            "cutting torn entry from end of segment"
        );
        let file = OpenOptions::new().write(true).open(path)?;
        file.set_len(scanner.valid_len())?;
        file.sync_all()?;
    }

    Ok((append_index, terms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::{write_entry, HEADER_SIZE};
    use std::fs;
    use tempfile::{tempdir, TempDir};

    struct Fixture {
        dir: TempDir,
        names: FileNames,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempdir().unwrap();
            let names = FileNames::new(dir.path(), "raft.log");
            Self { dir, names }
        }

        fn write_segment(&self, header: SegmentHeader, entries: &[(LogIndex, Term)]) {
            let mut buf = Vec::new();
            header.write_to(&mut buf).unwrap();
            for &(index, term) in entries {
                write_entry(&mut buf, index, term, b"payload").unwrap();
            }
            fs::write(self.names.path_for(header.version), buf).unwrap();
        }

        fn recover(&self) -> LogResult<RecoveredState> {
            let pool = Arc::new(ReaderPool::new(self.names.clone(), 4));
            RecoveryProtocol::new(self.names.clone(), pool, false).run()
        }
    }

    #[test]
    fn empty_directory_creates_first_segment() {
        let fx = Fixture::new();
        let state = fx.recover().unwrap();
        assert_eq!(state.append_index, NO_INDEX);
        assert_eq!(state.prev_index, NO_INDEX);
        assert_eq!(state.segments.len(), 1);
        assert!(fx.dir.path().join("raft.log.0").exists());
    }

    #[test]
    fn recovers_rotated_segments() {
        let fx = Fixture::new();
        fx.write_segment(SegmentHeader::new(-1, 0, -1, -1), &[(0, 1), (1, 1), (2, 2)]);
        fx.write_segment(SegmentHeader::new(2, 1, 2, 2), &[(3, 2), (4, 3)]);

        let state = fx.recover().unwrap();
        assert_eq!(state.append_index, 4);
        assert_eq!(state.prev_index, -1);
        assert_eq!(state.terms.get(4), 3);
        assert_eq!(state.terms.get(3), 2);
        assert_eq!(state.segments.len(), 2);
    }

    #[test]
    fn truncation_keeps_earlier_entries_readable() {
        let fx = Fixture::new();
        fx.write_segment(SegmentHeader::new(-1, 0, -1, -1), &[(0, 1), (1, 1), (2, 1)]);
        fx.write_segment(SegmentHeader::new(2, 1, 0, 1), &[(1, 2)]);

        let state = fx.recover().unwrap();
        assert_eq!(state.prev_index, -1);
        assert_eq!(state.append_index, 1);
        assert_eq!(state.terms.get(1), 2);
    }

    #[test]
    fn skip_moves_start_forward() {
        let fx = Fixture::new();
        fx.write_segment(SegmentHeader::new(-1, 0, -1, -1), &[(0, 1)]);
        fx.write_segment(SegmentHeader::new(0, 1, 50, 4), &[(51, 4)]);

        let state = fx.recover().unwrap();
        assert_eq!(state.prev_index, 50);
        assert_eq!(state.prev_term, 4);
        assert_eq!(state.append_index, 51);
    }

    #[test]
    fn first_file_after_pruning_sets_start() {
        let fx = Fixture::new();
        fx.write_segment(SegmentHeader::new(9, 3, 9, 1), &[(10, 1), (11, 1)]);

        let state = fx.recover().unwrap();
        assert_eq!(state.prev_index, 9);
        assert_eq!(state.prev_term, 1);
        assert_eq!(state.append_index, 11);
    }

    #[test]
    fn version_gap_is_damage() {
        let fx = Fixture::new();
        fx.write_segment(SegmentHeader::new(-1, 0, -1, -1), &[]);
        fx.write_segment(SegmentHeader::new(-1, 2, -1, -1), &[]);

        let err = fx.recover().unwrap_err();
        assert!(err.to_string().contains("non-contiguous versions"), "{err}");
    }

    #[test]
    fn header_version_must_match_name() {
        let fx = Fixture::new();
        fx.write_segment(SegmentHeader::new(-1, 0, -1, -1), &[]);
        let mut buf = Vec::new();
        SegmentHeader::new(-1, 7, -1, -1).write_to(&mut buf).unwrap();
        fs::write(fx.names.path_for(1), buf).unwrap();

        let err = fx.recover().unwrap_err();
        assert!(err.to_string().contains("version mismatch"), "{err}");
    }

    #[test]
    fn torn_first_header_is_rewritten_as_fresh_log() {
        let fx = Fixture::new();
        fs::write(fx.names.path_for(0), [0u8; 12]).unwrap();

        let state = fx.recover().unwrap();
        assert_eq!(state.append_index, NO_INDEX);
        assert_eq!(state.prev_index, NO_INDEX);
        assert_eq!(state.prev_term, NO_TERM);
        assert_eq!(state.segments.len(), 1);

        let rewritten = fs::read(fx.names.path_for(0)).unwrap();
        let mut header = [0u8; HEADER_SIZE];
        header.copy_from_slice(&rewritten);
        assert_eq!(
            SegmentHeader::decode(&header),
            SegmentHeader::new(NO_INDEX, 0, NO_INDEX, NO_TERM)
        );
    }

    #[test]
    fn torn_single_header_after_pruning_is_damage() {
        let fx = Fixture::new();
        fs::write(fx.names.path_for(4), [0u8; 12]).unwrap();
        assert!(matches!(fx.recover(), Err(LogError::DamagedLog { .. })));
    }

    #[test]
    fn torn_intermediate_header_is_damage() {
        let fx = Fixture::new();
        fx.write_segment(SegmentHeader::new(-1, 0, -1, -1), &[(0, 1)]);
        fs::write(fx.names.path_for(1), [0u8; 5]).unwrap();
        fx.write_segment(SegmentHeader::new(0, 2, 0, 1), &[]);

        let err = fx.recover().unwrap_err();
        assert!(err.to_string().contains("intermediate"), "{err}");
    }

    #[test]
    fn torn_last_header_is_rewritten() {
        let fx = Fixture::new();
        fx.write_segment(SegmentHeader::new(-1, 0, -1, -1), &[(0, 1), (1, 2)]);
        fs::write(fx.names.path_for(1), [0u8; 7]).unwrap();

        let state = fx.recover().unwrap();
        assert_eq!(state.append_index, 1);
        assert_eq!(state.segments.len(), 2);

        let rewritten = fs::read(fx.names.path_for(1)).unwrap();
        assert_eq!(rewritten.len(), HEADER_SIZE);
        let mut header = [0u8; HEADER_SIZE];
        header.copy_from_slice(&rewritten);
        assert_eq!(
            SegmentHeader::decode(&header),
            SegmentHeader::new(1, 1, 1, 2)
        );
    }

    #[test]
    fn torn_entry_is_cut() {
        let fx = Fixture::new();
        fx.write_segment(SegmentHeader::new(-1, 0, -1, -1), &[(0, 1), (1, 1)]);
        let path = fx.names.path_for(0);
        let len = fs::metadata(&path).unwrap().len();
        let file = OpenOptions::new().write(true).open(&path).unwrap();
        file.set_len(len - 4).unwrap();
        drop(file);

        let state = fx.recover().unwrap();
        assert_eq!(state.append_index, 0);
        let expected = HEADER_SIZE as u64 + 20 + 7;
        assert_eq!(fs::metadata(&path).unwrap().len(), expected);
    }

    #[test]
    fn index_gap_inside_segment_is_damage() {
        let fx = Fixture::new();
        fx.write_segment(SegmentHeader::new(-1, 0, -1, -1), &[(0, 1), (2, 1)]);
        assert!(matches!(fx.recover(), Err(LogError::DamagedLog { .. })));
    }
}
