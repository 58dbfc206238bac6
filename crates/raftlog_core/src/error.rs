//! Error types for the segmented log.

use crate::types::{LogIndex, Term};
use std::io;
use thiserror::Error;

/// Result type for log operations.
pub type LogResult<T> = Result<T, LogError>;

/// Errors that can occur in log operations.
#[derive(Debug, Error)]
pub enum LogError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The on-disk segments are inconsistent and cannot be recovered
    /// automatically.
    #[error("damaged log storage: {message}")]
    DamagedLog {
        /// Description of the damage.
        message: String,
    },

    /// The segment was reclaimed by pruning.
    #[error("segment {version} has been disposed")]
    SegmentDisposed {
        /// Version of the disposed segment.
        version: u64,
    },

    /// A previous append or flush failed; the log must be reopened.
    #[error("log needs recovery after a failed write")]
    NeedsRecovery,

    /// An index was appended out of sequence.
    #[error("out of order append: expected index {expected}, got {actual}")]
    OutOfOrderAppend {
        /// The index that would have been in sequence.
        expected: LogIndex,
        /// The index that was supplied.
        actual: LogIndex,
    },

    /// A term lower than the latest term was appended.
    #[error("non-monotonic term: latest term is {latest}, got {term}")]
    NonMonotonicTerm {
        /// The latest recorded term.
        latest: Term,
        /// The term that was supplied.
        term: Term,
    },

    /// Operation not permitted in the current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why the operation is invalid.
        message: String,
    },

    /// The content marshal failed to encode or decode a payload.
    #[error("codec error: {message}")]
    Codec {
        /// Description of the failure.
        message: String,
    },

    /// A configuration value could not be parsed.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the problem.
        message: String,
    },

    /// The log has been closed.
    #[error("log is closed")]
    Closed,

    /// Another process holds the log directory.
    #[error("log directory locked: another process has exclusive access")]
    Locked,
}

impl LogError {
    /// Creates a damaged log error.
    pub fn damaged(message: impl Into<String>) -> Self {
        Self::DamagedLog {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Creates a codec error.
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec {
            message: message.into(),
        }
    }

    /// Creates an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Returns `true` for errors that indicate a broken invariant or damaged
    /// storage rather than a transient condition.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::DamagedLog { .. }
                | Self::NeedsRecovery
                | Self::OutOfOrderAppend { .. }
                | Self::NonMonotonicTerm { .. }
        )
    }
}
