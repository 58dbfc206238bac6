//! Dump command implementation.

use super::{preview, segment_files, CliError, OutputFormat};
use raftlog_core::SegmentScanner;
use serde::Serialize;
use std::path::Path;
use tracing::debug;

/// Bytes of content shown per entry.
const PREVIEW_LEN: usize = 32;

/// One segment and the entries printed from it.
#[derive(Debug, Serialize)]
pub struct SegmentDump {
    /// Version from the file name.
    pub version: u64,
    /// File name.
    pub file: String,
    /// Header fields, absent if the header is incomplete.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header: Option<HeaderInfo>,
    /// Entries read from the segment.
    pub entries: Vec<EntryInfo>,
    /// Bytes after the last complete entry.
    pub trailing_bytes: u64,
}

/// Segment header representation for output.
#[derive(Debug, Serialize)]
pub struct HeaderInfo {
    /// Last index of the previous file.
    pub prev_file_last_index: i64,
    /// Version recorded in the header.
    pub version: u64,
    /// Index preceding the first entry.
    pub prev_index: i64,
    /// Term of the entry at `prev_index`.
    pub prev_term: i64,
    /// How the segment was started.
    pub transition: String,
}

/// Entry representation for output.
#[derive(Debug, Serialize)]
pub struct EntryInfo {
    /// Entry index.
    pub index: i64,
    /// Entry term.
    pub term: i64,
    /// Content length in bytes.
    pub length: usize,
    /// Content preview.
    pub preview: String,
}

/// Runs the dump command.
pub fn run(
    path: &Path,
    prefix: &str,
    from: Option<i64>,
    limit: Option<usize>,
    format: OutputFormat,
) -> Result<(), CliError> {
    let dumps = read_segments(path, prefix, from, limit)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&dumps)?),
        OutputFormat::Text => print_text_output(&dumps),
    }
    Ok(())
}

/// Reads every segment of `path`, keeping entries at or above `from` and
/// at most `limit` entries overall.
pub fn read_segments(
    path: &Path,
    prefix: &str,
    from: Option<i64>,
    limit: Option<usize>,
) -> Result<Vec<SegmentDump>, CliError> {
    let mut remaining = limit.unwrap_or(usize::MAX);
    let mut dumps = Vec::new();

    for (version, file) in segment_files(path, prefix)? {
        let mut scanner = SegmentScanner::open(&file)?;
        let header = scanner.header().map(|h| HeaderInfo {
            prev_file_last_index: h.prev_file_last_index,
            version: h.version,
            prev_index: h.prev_index,
            prev_term: h.prev_term,
            transition: format!("{:?}", h.transition()).to_lowercase(),
        });

        let mut entries = Vec::new();
        while remaining > 0 {
            let Some(entry) = scanner.next_entry()? else {
                break;
            };
            if from.is_some_and(|from| entry.index < from) {
                continue;
            }
            entries.push(EntryInfo {
                index: entry.index,
                term: entry.term,
                length: entry.content.len(),
                preview: preview(&entry.content, PREVIEW_LEN),
            });
            remaining -= 1;
        }

        let trailing_bytes = if remaining > 0 {
            scanner.file_len() - scanner.valid_len()
        } else {
            0
        };
        debug!(version, entries = entries.len(), trailing_bytes, "dumped segment");
        dumps.push(SegmentDump {
            version,
            file: file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            header,
            entries,
            trailing_bytes,
        });
    }

    Ok(dumps)
}

fn print_text_output(dumps: &[SegmentDump]) {
    let total: usize = dumps.iter().map(|d| d.entries.len()).sum();
    println!("Log Entries ({} total, {} segments)", total, dumps.len());
    println!("================");

    for dump in dumps {
        println!();
        match &dump.header {
            Some(h) => println!(
                "{} [{}] prev_file_last_index={} prev_index={} prev_term={}",
                dump.file, h.transition, h.prev_file_last_index, h.prev_index, h.prev_term
            ),
            None => println!("{} [incomplete header]", dump.file),
        }

        for entry in &dump.entries {
            println!(
                "  [{:>10}] term={:<6} len={:<8} {}",
                entry.index, entry.term, entry.length, entry.preview
            );
        }
        if dump.trailing_bytes > 0 {
            println!("  ({} trailing bytes after last entry)", dump.trailing_bytes);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raftlog_core::segment::write_entry;
    use raftlog_core::SegmentHeader;
    use std::fs;
    use tempfile::tempdir;

    fn write_log(dir: &Path) {
        let mut v0 = Vec::new();
        SegmentHeader::new(-1, 0, -1, -1).write_to(&mut v0).unwrap();
        for i in 0..3 {
            write_entry(&mut v0, i, 1, format!("entry-{i}").as_bytes()).unwrap();
        }
        fs::write(dir.join("raft.log.0"), v0).unwrap();

        let mut v1 = Vec::new();
        SegmentHeader::new(2, 1, 2, 1).write_to(&mut v1).unwrap();
        write_entry(&mut v1, 3, 2, &[0xde, 0xad]).unwrap();
        v1.extend_from_slice(&[1, 2, 3]);
        fs::write(dir.join("raft.log.1"), v1).unwrap();
    }

    #[test]
    fn dumps_all_segments() {
        let dir = tempdir().unwrap();
        write_log(dir.path());

        let dumps = read_segments(dir.path(), "raft.log", None, None).unwrap();
        assert_eq!(dumps.len(), 2);
        assert_eq!(dumps[0].entries.len(), 3);
        assert_eq!(dumps[0].entries[1].preview, "entry-1");
        assert_eq!(dumps[1].header.as_ref().unwrap().transition, "rotation");
        assert_eq!(dumps[1].entries[0].preview, "0xdead");
        assert_eq!(dumps[1].trailing_bytes, 3);
    }

    #[test]
    fn from_and_limit_filter_entries() {
        let dir = tempdir().unwrap();
        write_log(dir.path());

        let dumps = read_segments(dir.path(), "raft.log", Some(1), Some(2)).unwrap();
        let indices: Vec<i64> = dumps
            .iter()
            .flat_map(|d| d.entries.iter().map(|e| e.index))
            .collect();
        assert_eq!(indices, vec![1, 2]);
    }

    #[test]
    fn json_output_serializes() {
        let dir = tempdir().unwrap();
        write_log(dir.path());
        let dumps = read_segments(dir.path(), "raft.log", None, Some(1)).unwrap();
        let json = serde_json::to_string(&dumps).unwrap();
        assert!(json.contains("\"prev_index\":-1"));
        assert!(json.contains("\"preview\":\"entry-0\""));
    }
}
