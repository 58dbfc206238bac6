//! Retention policies deciding how much of the log to keep.

use crate::error::{LogError, LogResult};
use crate::segment::SegmentSet;
use crate::types::{LogIndex, NO_INDEX};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// How much history to retain beyond what the consensus module still needs.
///
/// Parses from configuration strings:
///
/// | String             | Strategy                    |
/// |--------------------|-----------------------------|
/// | `keep_all`, `true` | [`None`](Self::None)        |
/// | `500 entries`      | [`EntryBudget`](Self::EntryBudget) |
/// | `256m size`        | [`ByteBudget`](Self::ByteBudget)   |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PruningStrategy {
    /// Never prune.
    None,
    /// Keep at least this many bytes of segments.
    ByteBudget(u64),
    /// Keep at least this many entries.
    EntryBudget(u64),
}

impl PruningStrategy {
    /// Returns the highest index the strategy allows pruning up to.
    #[must_use]
    pub fn index_to_keep(&self, segments: &SegmentSet) -> LogIndex {
        match *self {
            Self::None => NO_INDEX,
            Self::ByteBudget(budget) => {
                let mut accumulated = 0u64;
                let mut index = NO_INDEX;
                segments.visit_backwards(|segment| {
                    if accumulated >= budget {
                        return true;
                    }
                    accumulated += segment.size();
                    index = segment.header().prev_index;
                    false
                });
                index
            }
            Self::EntryBudget(budget) => {
                let mut accumulated = 0u64;
                let mut last_prev: Option<LogIndex> = None;
                segments.visit_backwards(|segment| {
                    let prev_index = segment.header().prev_index;
                    if let Some(last) = last_prev {
                        accumulated += last.saturating_sub(prev_index).max(0) as u64;
                    }
                    last_prev = Some(prev_index);
                    accumulated >= budget
                });
                last_prev.unwrap_or_else(|| {
                    warn!("no segments visited while applying entry budget");
                    NO_INDEX
                })
            }
        }
    }
}

impl fmt::Display for PruningStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "keep_all"),
            Self::ByteBudget(bytes) => write!(f, "{bytes} size"),
            Self::EntryBudget(entries) => write!(f, "{entries} entries"),
        }
    }
}

impl FromStr for PruningStrategy {
    type Err = LogError;

    fn from_str(s: &str) -> LogResult<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("keep_all") || s.eq_ignore_ascii_case("true") {
            return Ok(Self::None);
        }

        let mut parts = s.split_whitespace();
        let (Some(amount), Some(kind), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(LogError::invalid_config(format!(
                "invalid pruning strategy '{s}': expected 'keep_all', '<n> entries' or '<n> size'"
            )));
        };

        match kind.to_ascii_lowercase().as_str() {
            "entries" => parse_count(amount).map(Self::EntryBudget),
            "size" => parse_bytes(amount).map(Self::ByteBudget),
            other => Err(LogError::invalid_config(format!(
                "invalid pruning strategy '{s}': unknown kind '{other}'"
            ))),
        }
    }
}

fn parse_count(amount: &str) -> LogResult<u64> {
    amount
        .parse()
        .map_err(|_| LogError::invalid_config(format!("invalid entry count '{amount}'")))
}

fn parse_bytes(amount: &str) -> LogResult<u64> {
    let lower = amount.to_ascii_lowercase();
    let (digits, multiplier) = match lower.as_bytes().last() {
        Some(b'k') => (&lower[..lower.len() - 1], 1024),
        Some(b'm') => (&lower[..lower.len() - 1], 1024 * 1024),
        Some(b'g') => (&lower[..lower.len() - 1], 1024 * 1024 * 1024),
        _ => (lower.as_str(), 1),
    };
    digits
        .parse::<u64>()
        .ok()
        .and_then(|n| n.checked_mul(multiplier))
        .ok_or_else(|| LogError::invalid_config(format!("invalid byte size '{amount}'")))
}

/// Combines the retention policy with the index the consensus module
/// considers safe to discard.
#[derive(Debug, Clone)]
pub struct LogPruner {
    strategy: PruningStrategy,
}

impl LogPruner {
    /// Creates a pruner applying `strategy`.
    #[must_use]
    pub fn new(strategy: PruningStrategy) -> Self {
        Self { strategy }
    }

    /// The configured strategy.
    #[must_use]
    pub fn strategy(&self) -> PruningStrategy {
        self.strategy
    }

    /// Highest index that may be pruned: never beyond `safe_index`, and
    /// never more than the strategy lets go of.
    #[must_use]
    pub fn index_to_prune(&self, safe_index: LogIndex, segments: &SegmentSet) -> LogIndex {
        safe_index.min(self.strategy.index_to_keep(segments))
    }
}
