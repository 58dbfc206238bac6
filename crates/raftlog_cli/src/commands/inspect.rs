//! Inspect command implementation.

use super::{segment_files, CliError, OutputFormat};
use raftlog_core::{SegmentScanner, SegmentSummary};
use serde::Serialize;
use std::path::Path;
use tracing::{debug, warn};

/// Log directory inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Log directory path.
    pub path: String,
    /// Number of segment files.
    pub segment_count: usize,
    /// Sum of all segment file sizes.
    pub total_size: u64,
    /// Number of complete entries across all segments.
    pub entry_count: u64,
    /// Lowest version present.
    pub first_version: u64,
    /// Highest version present.
    pub last_version: u64,
    /// Per-segment details.
    pub segments: Vec<SegmentInfo>,
}

/// Statistics for a single segment.
#[derive(Debug, Serialize)]
pub struct SegmentInfo {
    /// Version from the file name.
    pub version: u64,
    /// How the segment was started, or `incomplete` without a header.
    pub transition: String,
    /// Index preceding the segment's first entry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev_index: Option<i64>,
    /// First entry index.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_index: Option<i64>,
    /// Last entry index.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_index: Option<i64>,
    /// Number of complete entries.
    pub entry_count: u64,
    /// File size in bytes.
    pub size: u64,
    /// Whether the file ends with a partial entry.
    pub torn: bool,
}

impl SegmentInfo {
    fn from_summary(version: u64, summary: &SegmentSummary) -> Self {
        Self {
            version,
            transition: summary.header.map_or_else(
                || "incomplete".to_string(),
                |h| format!("{:?}", h.transition()).to_lowercase(),
            ),
            prev_index: summary.header.map(|h| h.prev_index),
            first_index: summary.first_index,
            last_index: summary.last_index,
            entry_count: summary.entry_count,
            size: summary.file_len,
            torn: summary.is_torn(),
        }
    }
}

/// Runs the inspect command.
pub fn run(path: &Path, prefix: &str, format: OutputFormat) -> Result<(), CliError> {
    let result = inspect(path, prefix)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Text => print_text_output(&result),
    }
    Ok(())
}

/// Scans every segment of `path` and summarizes the directory.
pub fn inspect(path: &Path, prefix: &str) -> Result<InspectResult, CliError> {
    let files = segment_files(path, prefix)?;

    let mut segments = Vec::with_capacity(files.len());
    for (version, file) in &files {
        let summary = SegmentScanner::summarize(file)?;
        debug!(
            version,
            entries = summary.entry_count,
            valid_len = summary.valid_len,
            "scanned segment"
        );
        if summary.is_torn() {
            warn!(
                version,
                trailing = summary.file_len - summary.valid_len,
                "segment ends with a partial entry"
            );
        }
        segments.push(SegmentInfo::from_summary(*version, &summary));
    }

    Ok(InspectResult {
        path: path.display().to_string(),
        segment_count: segments.len(),
        total_size: segments.iter().map(|s| s.size).sum(),
        entry_count: segments.iter().map(|s| s.entry_count).sum(),
        first_version: files.first().map_or(0, |(v, _)| *v),
        last_version: files.last().map_or(0, |(v, _)| *v),
        segments,
    })
}

fn print_text_output(result: &InspectResult) {
    println!("Log Directory: {}", result.path);
    println!("================");
    println!();
    println!("Segments:      {}", result.segment_count);
    println!(
        "Versions:      {} - {}",
        result.first_version, result.last_version
    );
    println!("Entries:       {}", result.entry_count);
    println!("Total Size:    {} bytes", result.total_size);
    println!();

    println!(
        "{:>8}  {:<11} {:>10} {:>10} {:>10} {:>12}",
        "version", "transition", "prev", "first", "last", "size"
    );
    for segment in &result.segments {
        let show = |v: Option<i64>| v.map_or_else(|| "-".to_string(), |v| v.to_string());
        println!(
            "{:>8}  {:<11} {:>10} {:>10} {:>10} {:>12}{}",
            segment.version,
            segment.transition,
            show(segment.prev_index),
            show(segment.first_index),
            show(segment.last_index),
            segment.size,
            if segment.torn { "  (torn)" } else { "" }
        );
    }
}
