//! In-memory index of entry terms.
//!
//! Terms only ever grow along the log, so the index stores one
//! `(first index, term)` pair per run of equal terms rather than one term
//! per entry.

use crate::error::{LogError, LogResult};
use crate::types::{LogIndex, Term, NO_TERM};

/// Run-length index of the terms of the live entries.
///
/// The index covers `[min, max]`. `min` is the prev index of the log, whose
/// term is kept so that the consensus module can check log matching at the
/// very start of the live range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermIndex {
    min: LogIndex,
    max: LogIndex,
    runs: Vec<(LogIndex, Term)>,
}

impl TermIndex {
    /// Creates an index whose only known entry is `prev_index` at
    /// `prev_term`.
    #[must_use]
    pub fn new(prev_index: LogIndex, prev_term: Term) -> Self {
        Self {
            min: prev_index,
            max: prev_index,
            runs: vec![(prev_index, prev_term)],
        }
    }

    /// Records the term of the next index.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::OutOfOrderAppend`] unless `index` is one past the
    /// current maximum, or [`LogError::NonMonotonicTerm`] if `term` is lower
    /// than the latest term.
    pub fn append(&mut self, index: LogIndex, term: Term) -> LogResult<()> {
        if index != self.max + 1 {
            return Err(LogError::OutOfOrderAppend {
                expected: self.max + 1,
                actual: index,
            });
        }
        let latest = self.latest();
        if term < latest {
            return Err(LogError::NonMonotonicTerm { latest, term });
        }

        self.max = index;
        if term != latest {
            self.runs.push((index, term));
        }
        Ok(())
    }

    /// Forgets every index from `from_index` on.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::InvalidOperation`] if `from_index` is not above
    /// the minimum.
    pub fn truncate(&mut self, from_index: LogIndex) -> LogResult<()> {
        if from_index <= self.min {
            return Err(LogError::invalid_operation(format!(
                "cannot truncate terms from {from_index}: minimum is {}",
                self.min
            )));
        }
        self.max = self.max.min(from_index - 1);
        self.runs.retain(|&(start, _)| start < from_index);
        Ok(())
    }

    /// Resets the index to a single known entry after a skip.
    pub fn skip(&mut self, prev_index: LogIndex, prev_term: Term) {
        *self = Self::new(prev_index, prev_term);
    }

    /// Forgets every index below `up_to`.
    pub fn prune(&mut self, up_to: LogIndex) {
        self.min = self.min.max(up_to);
        let covering = self
            .runs
            .iter()
            .rposition(|&(start, _)| start <= self.min)
            .unwrap_or(0);
        self.runs.drain(..covering);
    }

    /// Term of the entry at `index`, or [`NO_TERM`] if it is not covered.
    #[must_use]
    pub fn get(&self, index: LogIndex) -> Term {
        if index < self.min || index > self.max {
            return NO_TERM;
        }
        self.runs
            .iter()
            .rev()
            .find(|&&(start, _)| start <= index)
            .map_or(NO_TERM, |&(_, term)| term)
    }

    /// Term of the last run.
    #[must_use]
    pub fn latest(&self) -> Term {
        self.runs.last().map_or(NO_TERM, |&(_, term)| term)
    }

    /// Lowest covered index.
    #[must_use]
    pub fn min(&self) -> LogIndex {
        self.min
    }

    /// Highest covered index.
    #[must_use]
    pub fn max(&self) -> LogIndex {
        self.max
    }

    /// Number of stored runs.
    #[must_use]
    pub fn run_count(&self) -> usize {
        self.runs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn filled(terms: &[Term]) -> TermIndex {
        let mut index = TermIndex::new(-1, -1);
        for (i, &term) in terms.iter().enumerate() {
            index.append(i as LogIndex, term).unwrap();
        }
        index
    }

    #[test]
    fn runs_collapse_equal_terms() {
        let index = filled(&[1, 1, 1, 2, 2, 5]);
        assert_eq!(index.run_count(), 4);
        assert_eq!(index.get(0), 1);
        assert_eq!(index.get(2), 1);
        assert_eq!(index.get(3), 2);
        assert_eq!(index.get(5), 5);
        assert_eq!(index.get(6), NO_TERM);
        assert_eq!(index.latest(), 5);
    }

    #[test]
    fn append_rejects_gaps_and_lower_terms() {
        let mut index = filled(&[1, 2]);
        assert!(matches!(
            index.append(3, 2),
            Err(LogError::OutOfOrderAppend {
                expected: 2,
                actual: 3
            })
        ));
        assert!(matches!(
            index.append(2, 1),
            Err(LogError::NonMonotonicTerm { latest: 2, term: 1 })
        ));
        assert_eq!(index.max(), 1);
    }

    #[test]
    fn truncate_drops_later_runs() {
        let mut index = filled(&[1, 1, 2, 2, 3]);
        index.truncate(3).unwrap();
        assert_eq!(index.max(), 2);
        assert_eq!(index.get(2), 2);
        assert_eq!(index.get(3), NO_TERM);
        assert_eq!(index.latest(), 2);

        index.truncate(2).unwrap();
        assert_eq!(index.latest(), 1);
        index.append(2, 4).unwrap();
        assert_eq!(index.get(2), 4);
    }

    #[test]
    fn truncate_at_or_below_min_fails() {
        let mut index = filled(&[1, 1]);
        assert!(index.truncate(-1).is_err());
        assert!(index.truncate(0).is_ok());
        assert_eq!(index.max(), -1);
    }

    #[test]
    fn skip_resets_to_single_entry() {
        let mut index = filled(&[1, 2, 3]);
        index.skip(100, 7);
        assert_eq!(index.min(), 100);
        assert_eq!(index.max(), 100);
        assert_eq!(index.get(100), 7);
        assert_eq!(index.get(1), NO_TERM);
        index.append(101, 7).unwrap();
        assert_eq!(index.run_count(), 1);
    }

    #[test]
    fn prune_keeps_covering_run() {
        let mut index = filled(&[1, 1, 1, 2, 2, 3]);
        index.prune(4);
        assert_eq!(index.min(), 4);
        assert_eq!(index.get(3), NO_TERM);
        assert_eq!(index.get(4), 2);
        assert_eq!(index.get(5), 3);
        assert_eq!(index.run_count(), 2);

        index.prune(2);
        assert_eq!(index.min(), 4);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Append(Term),
        Truncate(usize),
        Prune(usize),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            4 => (0i64..3).prop_map(Op::Append),
            1 => (0usize..40).prop_map(Op::Truncate),
            1 => (0usize..40).prop_map(Op::Prune),
        ]
    }

    proptest! {
        #[test]
        fn matches_per_entry_model(ops in proptest::collection::vec(op(), 1..80)) {
            let mut index = TermIndex::new(-1, -1);
            // model[i] holds the term of index i - 1, or None once pruned.
            let mut model: Vec<Option<Term>> = vec![Some(-1)];
            let mut min: LogIndex = -1;

            for op in ops {
                match op {
                    Op::Append(delta) => {
                        let latest = index.latest();
                        let term = latest.max(0) + delta;
                        let next = model.len() as LogIndex - 1;
                        index.append(next, term).unwrap();
                        model.push(Some(term));
                    }
                    Op::Truncate(at) => {
                        let from = at as LogIndex - 1;
                        let result = index.truncate(from);
                        if from <= min {
                            prop_assert!(result.is_err());
                        } else {
                            prop_assert!(result.is_ok());
                            model.truncate((from + 1).min(model.len() as LogIndex) as usize);
                        }
                    }
                    Op::Prune(at) => {
                        let up_to = (at as LogIndex - 1).min(model.len() as LogIndex - 2);
                        index.prune(up_to);
                        min = min.max(up_to);
                        for slot in model.iter_mut().take((min + 1) as usize) {
                            *slot = None;
                        }
                    }
                }

                for i in -1..model.len() as LogIndex + 2 {
                    let expected = model
                        .get((i + 1) as usize)
                        .copied()
                        .flatten()
                        .unwrap_or(NO_TERM);
                    prop_assert_eq!(index.get(i), expected, "index {}", i);
                }
            }
        }
    }
}
