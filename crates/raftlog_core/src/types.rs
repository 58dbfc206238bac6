//! Core type definitions for the log.

use std::fmt;

/// Position of an entry in the replicated log.
///
/// Valid indices start at 0. [`NO_INDEX`] (`-1`) denotes "none" and orders
/// below every valid index, which is also how it is stored in segment
/// headers.
pub type LogIndex = i64;

/// Consensus term of an entry. [`NO_TERM`] (`-1`) denotes "none".
pub type Term = i64;

/// Sentinel for "no index".
pub const NO_INDEX: LogIndex = -1;

/// Sentinel for "no term".
pub const NO_TERM: Term = -1;

/// An entry supplied by the consensus module for appending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaftLogEntry<C> {
    /// Term in which the entry was created.
    pub term: Term,
    /// Opaque application content.
    pub content: C,
}

impl<C> RaftLogEntry<C> {
    /// Creates a new entry.
    pub fn new(term: Term, content: C) -> Self {
        Self { term, content }
    }
}

/// An entry as stored in the log, together with its index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryRecord<C> {
    /// Index of the entry.
    pub index: LogIndex,
    /// Term of the entry.
    pub term: Term,
    /// Decoded content.
    pub content: C,
}

impl<C> EntryRecord<C> {
    /// Drops the index, returning the entry as supplied to `append`.
    pub fn into_entry(self) -> RaftLogEntry<C> {
        RaftLogEntry {
            term: self.term,
            content: self.content,
        }
    }
}

impl<C> fmt::Display for EntryRecord<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entry[index={}, term={}]", self.index, self.term)
    }
}

/// A position inside a segment: an index relative to the segment's first
/// entry and the byte offset where that entry starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogPosition {
    /// Index relative to the first entry of the segment.
    pub relative_index: i64,
    /// Byte offset within the segment file.
    pub byte_offset: u64,
}

impl LogPosition {
    /// Creates a new position.
    #[must_use]
    pub const fn new(relative_index: i64, byte_offset: u64) -> Self {
        Self {
            relative_index,
            byte_offset,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels_order_below_valid_indices() {
        assert!(NO_INDEX < 0);
        assert!(NO_TERM < 0);
    }

    #[test]
    fn record_into_entry() {
        let record = EntryRecord {
            index: 7,
            term: 2,
            content: "x".to_string(),
        };
        assert_eq!(record.to_string(), "entry[index=7, term=2]");
        assert_eq!(record.into_entry(), RaftLogEntry::new(2, "x".to_string()));
    }
}
