//! CLI command implementations.

pub mod dump;
pub mod inspect;

use raftlog_core::{FileNames, LogError};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

/// Errors reported by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// The directory holds no segment files.
    #[error("no log segments found in {}", .0.display())]
    NoLog(PathBuf),

    /// Reading the segments failed.
    #[error(transparent)]
    Log(#[from] LogError),

    /// Encoding JSON output failed.
    #[error("failed to encode output: {0}")]
    Json(#[from] serde_json::Error),
}

/// Output format of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human readable text.
    Text,
    /// Pretty-printed JSON.
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown format '{other}' (expected text or json)")),
        }
    }
}

/// Lists the segment files of `dir`, oldest first.
pub fn segment_files(dir: &Path, prefix: &str) -> Result<Vec<(u64, PathBuf)>, CliError> {
    let files = FileNames::new(dir, prefix).all_files()?;
    if files.is_empty() {
        return Err(CliError::NoLog(dir.to_path_buf()));
    }
    debug!(dir = %dir.display(), prefix, count = files.len(), "found segment files");
    Ok(files.into_iter().collect())
}

/// Renders entry content for display: the text itself if it is printable
/// UTF-8, otherwise a hex preview.
pub fn preview(content: &[u8], max_len: usize) -> String {
    match std::str::from_utf8(content) {
        Ok(text) if !text.chars().any(char::is_control) => {
            let mut shown: String = text.chars().take(max_len).collect();
            if shown.len() < text.len() {
                shown.push_str("...");
            }
            shown
        }
        _ => {
            let mut shown: String = content
                .iter()
                .take(max_len)
                .map(|b| format!("{b:02x}"))
                .collect();
            if content.len() > max_len {
                shown.push_str("...");
            }
            format!("0x{shown}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_text_and_binary() {
        assert_eq!(preview(b"hello", 16), "hello");
        assert_eq!(preview(b"hello world", 5), "hello...");
        assert_eq!(preview(&[0x00, 0xff], 16), "0x00ff");
        assert_eq!(preview(&[1, 2, 3, 4], 2), "0x0102...");
    }

    #[test]
    fn parse_output_format() {
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("text".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert!("yaml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn empty_directory_has_no_log() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            segment_files(dir.path(), "raft.log"),
            Err(CliError::NoLog(_))
        ));
    }
}
