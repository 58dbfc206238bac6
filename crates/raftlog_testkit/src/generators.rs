//! Property-based test generators using proptest.
//!
//! Strategies produce entry content, batches whose terms never decrease and
//! sequences of log operations that a model can replay.

use proptest::prelude::*;
use raftlog_core::{RaftLogEntry, Term};

/// Strategy for entry content.
pub fn content_strategy() -> impl Strategy<Value = String> {
    "[a-z0-9 ]{0,48}"
}

/// Strategy for raw byte content, including empty content.
pub fn bytes_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..256)
}

/// Strategy for a batch of entries with terms starting at `base_term`.
///
/// Terms never decrease within the batch.
pub fn entry_batch_strategy(
    base_term: Term,
    max_len: usize,
) -> impl Strategy<Value = Vec<RaftLogEntry<String>>> {
    prop::collection::vec((0..2i64, content_strategy()), 1..=max_len.max(1)).prop_map(
        move |items| {
            let mut term = base_term;
            items
                .into_iter()
                .map(|(bump, content)| {
                    term += bump;
                    RaftLogEntry::new(term, content)
                })
                .collect()
        },
    )
}

/// An operation against a log.
#[derive(Debug, Clone)]
pub enum LogOperation {
    /// Append entries with the given term increments and contents.
    Append {
        /// Term increment applied before each entry.
        bumps: Vec<(Term, String)>,
    },
    /// Truncate the log, removing `back` entries from the end.
    Truncate {
        /// Number of entries to remove, clamped to the live range.
        back: u8,
    },
    /// Skip forward `ahead` indices.
    Skip {
        /// Distance beyond the append index.
        ahead: u8,
    },
    /// Prune with a safe index `safe` entries past the prev index.
    Prune {
        /// Distance beyond the prev index, clamped to the append index.
        safe: u8,
    },
    /// Close and reopen the log.
    Reopen,
}

/// Strategy for a single log operation.
pub fn log_operation_strategy() -> impl Strategy<Value = LogOperation> {
    prop_oneof![
        6 => prop::collection::vec((0..2i64, content_strategy()), 1..8)
            .prop_map(|bumps| LogOperation::Append { bumps }),
        2 => (0u8..6).prop_map(|back| LogOperation::Truncate { back }),
        1 => (1u8..20).prop_map(|ahead| LogOperation::Skip { ahead }),
        2 => (0u8..24).prop_map(|safe| LogOperation::Prune { safe }),
        1 => Just(LogOperation::Reopen),
    ]
}

/// Strategy for a sequence of log operations.
pub fn operation_sequence_strategy(
    min_ops: usize,
    max_ops: usize,
) -> impl Strategy<Value = Vec<LogOperation>> {
    prop::collection::vec(log_operation_strategy(), min_ops..max_ops)
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 64,
            max_shrink_iters: 500,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 16,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 512,
            max_shrink_iters: 5000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #![proptest_config(PropTestConfig::quick().to_proptest_config())]

        #[test]
        fn batch_terms_never_decrease(batch in entry_batch_strategy(3, 10)) {
            prop_assert!(!batch.is_empty());
            prop_assert!(batch[0].term >= 3);
            for pair in batch.windows(2) {
                prop_assert!(pair[0].term <= pair[1].term);
            }
        }

        #[test]
        fn content_fits_preview(content in content_strategy()) {
            prop_assert!(content.len() <= 48);
        }

        #[test]
        fn sequences_respect_bounds(ops in operation_sequence_strategy(2, 6)) {
            prop_assert!(ops.len() >= 2 && ops.len() < 6);
        }
    }
}
