//! # Raftlog Core
//!
//! Segmented, append-only log storage for a consensus module.
//!
//! This crate provides:
//! - Versioned segment files with rotation, truncation and skip
//! - Crash recovery of the segment set and term index
//! - Streaming cursors backed by a pool of reusable file handles
//! - Retention policies for pruning old segments

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod cursor;
pub mod dir;
pub mod error;
pub mod log;
pub mod marshal;
pub mod naming;
pub mod pruning;
pub mod reader;
pub mod recovery;
pub mod refcount;
pub mod segment;
pub mod stats;
pub mod terms;
pub mod types;

pub use config::{LogConfig, DEFAULT_FILE_PREFIX};
pub use cursor::EntryCursor;
pub use dir::LogDir;
pub use error::{LogError, LogResult};
pub use log::SegmentedLog;
pub use marshal::{BytesMarshal, ContentMarshal, StringMarshal};
pub use naming::FileNames;
pub use pruning::{LogPruner, PruningStrategy};
pub use segment::{SegmentHeader, SegmentScanner, SegmentSummary, SegmentTransition};
pub use stats::{LogStats, StatsSnapshot};
pub use terms::TermIndex;
pub use types::{EntryRecord, LogIndex, LogPosition, RaftLogEntry, Term, NO_INDEX, NO_TERM};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
