//! # Raftlog Testkit
//!
//! Test utilities for raftlog.
//!
//! This crate provides:
//! - Temporary log fixtures that can be closed, damaged and reopened
//! - Crash simulation helpers operating on segment files
//! - Property-based test generators using proptest
//! - A stress harness running a writer against concurrent readers
//!
//! ## Usage
//!
//! ```rust,ignore
//! use raftlog_testkit::prelude::*;
//!
//! #[test]
//! fn survives_torn_entry() {
//!     let mut log = TestLog::new();
//!     log.append_strings(1, &["a", "b"]);
//!     log.close();
//!     chop_file(&log.segment_path(0), 3).unwrap();
//!     log.reopen();
//!     assert_eq!(log.append_index(), 0);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod crash;
pub mod fixtures;
pub mod generators;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::crash::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::stress::*;
}

pub use crash::*;
pub use fixtures::*;
pub use generators::*;
pub use stress::*;
