//! Cache of known entry positions within one segment.

use crate::types::LogPosition;

/// Number of positions remembered per segment.
pub const CACHE_SIZE: usize = 8;

/// A small ring of `(relative index, byte offset)` checkpoints.
///
/// Opening a cursor in the middle of a segment starts from the closest
/// cached position at or before the wanted entry instead of the segment
/// start, bounding the linear scan.
#[derive(Debug, Clone)]
pub struct PositionCache {
    slots: [Option<LogPosition>; CACHE_SIZE],
    next: usize,
    first: LogPosition,
}

impl PositionCache {
    /// Creates an empty cache; `first` is the position of the segment's
    /// first entry.
    #[must_use]
    pub fn new(first: LogPosition) -> Self {
        Self {
            slots: [None; CACHE_SIZE],
            next: 0,
            first,
        }
    }

    /// Records a position, replacing the oldest slot.
    pub fn put(&mut self, position: LogPosition) {
        self.slots[self.next] = Some(position);
        self.next = (self.next + 1) % CACHE_SIZE;
    }

    /// Returns the highest cached position at or before `relative_index`.
    #[must_use]
    pub fn lookup(&self, relative_index: i64) -> LogPosition {
        self.slots
            .iter()
            .flatten()
            .filter(|p| p.relative_index <= relative_index)
            .max_by_key(|p| p.relative_index)
            .copied()
            .unwrap_or(self.first)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIRST: LogPosition = LogPosition::new(0, 32);

    #[test]
    fn empty_cache_returns_first() {
        let cache = PositionCache::new(FIRST);
        assert_eq!(cache.lookup(0), FIRST);
        assert_eq!(cache.lookup(100), FIRST);
    }

    #[test]
    fn lookup_returns_floor_position() {
        let mut cache = PositionCache::new(FIRST);
        cache.put(LogPosition::new(10, 500));
        cache.put(LogPosition::new(4, 200));
        cache.put(LogPosition::new(20, 900));

        assert_eq!(cache.lookup(3), FIRST);
        assert_eq!(cache.lookup(4), LogPosition::new(4, 200));
        assert_eq!(cache.lookup(15), LogPosition::new(10, 500));
        assert_eq!(cache.lookup(25), LogPosition::new(20, 900));
    }

    #[test]
    fn oldest_slot_is_overwritten() {
        let mut cache = PositionCache::new(FIRST);
        for i in 1..=CACHE_SIZE as i64 {
            cache.put(LogPosition::new(i * 10, (i * 100) as u64));
        }
        assert_eq!(cache.lookup(10), LogPosition::new(10, 100));

        cache.put(LogPosition::new(1000, 9999));
        assert_eq!(cache.lookup(15), FIRST);
        assert_eq!(cache.lookup(25), LogPosition::new(20, 200));
    }
}
