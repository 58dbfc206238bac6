//! Segment files.
//!
//! The log is stored as a sequence of versioned files named
//! `<prefix>.<version>`. Each file begins with a fixed header followed by
//! entry frames:
//!
//! ```text
//! +------------------------+
//! | header (32 bytes)      |
//! +------------------------+
//! | frame: index, term,    |
//! |        len, content    |
//! +------------------------+
//! | frame ...              |
//! +------------------------+
//! ```
//!
//! A new file is started on rotation, truncation, or skip. The header
//! records which of the three it was, so recovery can rebuild the index
//! ranges each file is responsible for.

mod file;
mod header;
mod range;
pub(crate) mod record;
mod scan;
mod set;

pub use file::{SegmentCursor, SegmentFile};
pub use header::{SegmentHeader, SegmentTransition, HEADER_SIZE};
pub use range::{RangeIndex, ValueRange};
pub use record::{read_entry, write_entry, RawEntry, FRAME_HEADER_SIZE, MAX_CONTENT_SIZE};
pub use scan::{SegmentScanner, SegmentSummary};
pub use set::{SegmentRange, SegmentSet};
