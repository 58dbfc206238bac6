//! Map from index ranges to the segments that own them.

use crate::types::LogIndex;
use std::collections::BTreeMap;

/// Result of a [`RangeIndex::lookup`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueRange<V> {
    /// Value owning the looked-up key, if any.
    pub value: Option<V>,
    /// Start of the next range, or `None` if the value's range is open-ended.
    pub limit: Option<LogIndex>,
}

/// Half-open ranges keyed by their start, where the last range is
/// open-ended.
///
/// Each range `[start, next_start)` maps to one value; the final range
/// `[tail_start, ∞)` is kept separately so lookups past every known start
/// resolve without touching the tree.
#[derive(Debug, Clone)]
pub struct RangeIndex<V> {
    ranges: BTreeMap<LogIndex, V>,
    tail: Option<(LogIndex, V)>,
}

impl<V> Default for RangeIndex<V> {
    fn default() -> Self {
        Self {
            ranges: BTreeMap::new(),
            tail: None,
        }
    }
}

impl<V: Clone> RangeIndex<V> {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps `[from, ∞)` to `value`, discarding every range that starts at
    /// or after `from`.
    ///
    /// Returns the values whose ranges were discarded.
    pub fn replace_from(&mut self, from: LogIndex, value: V) -> Vec<V> {
        let removed: Vec<V> = self.ranges.split_off(&from).into_values().collect();
        self.ranges.insert(from, value.clone());
        self.tail = Some((from, value));
        removed
    }

    /// Looks up the value owning `key` and where its range ends.
    #[must_use]
    pub fn lookup(&self, key: LogIndex) -> ValueRange<V> {
        if let Some((start, value)) = &self.tail {
            if *start <= key {
                return ValueRange {
                    value: Some(value.clone()),
                    limit: None,
                };
            }
        }

        let Some((_, value)) = self.ranges.range(..=key).next_back() else {
            return ValueRange {
                value: None,
                limit: None,
            };
        };
        let limit = self.ranges.range(key + 1..).next().map(|(start, _)| *start);

        ValueRange {
            value: Some(value.clone()),
            limit,
        }
    }

    /// Drops every range lying entirely below `less_than`.
    ///
    /// The range covering `less_than` is kept even if it starts earlier,
    /// and the open-ended tail always stays reachable. Returns the dropped
    /// values.
    pub fn remove_below(&mut self, less_than: LogIndex) -> Vec<V> {
        let mut kept = self.ranges.split_off(&less_than);
        if !kept.contains_key(&less_than) {
            if let Some((start, value)) = self.ranges.pop_last() {
                kept.insert(start, value);
            }
        }
        let removed = std::mem::replace(&mut self.ranges, kept);
        removed.into_values().collect()
    }

    /// Value of the open-ended range.
    #[must_use]
    pub fn last(&self) -> Option<&V> {
        self.tail.as_ref().map(|(_, v)| v)
    }

    /// Number of mapped ranges.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// Returns `true` if nothing is mapped.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty() && self.tail.is_none()
    }
}
