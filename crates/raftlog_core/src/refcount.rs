//! Reference counting with a terminal disposed state.
//!
//! Segments are shared between the writer, open cursors, and the pruner.
//! A segment file may only be closed and deleted once nobody references it,
//! and once disposed it can never be referenced again.

use std::sync::atomic::{AtomicU64, Ordering};
use tracing::error;

const DISPOSED: u64 = u64::MAX;

/// Observable state of a [`RefCounter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefState {
    /// Number of outstanding references.
    Active(u64),
    /// Terminal state; no further references can be taken.
    Disposed,
}

/// Lock-free reference count.
///
/// Transitions:
/// - `Active(n)` → `Active(n + 1)` via [`increase`](Self::increase)
/// - `Active(n)` → `Active(n - 1)` via [`decrease`](Self::decrease), `n > 0`
/// - `Active(0)` → `Disposed` via [`try_dispose`](Self::try_dispose)
#[derive(Debug, Default)]
pub struct RefCounter {
    count: AtomicU64,
}

impl RefCounter {
    /// Creates a counter with no references.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            count: AtomicU64::new(0),
        }
    }

    /// Takes a reference. Returns `false` if the counter is disposed.
    pub fn increase(&self) -> bool {
        let mut current = self.count.load(Ordering::Acquire);
        loop {
            if current == DISPOSED {
                return false;
            }
            // DISPOSED - 1 references cannot realistically be reached
            match self.count.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    /// Releases a reference.
    ///
    /// Returns `false` (and logs) if there was no reference to release,
    /// which indicates a bookkeeping bug in the caller.
    pub fn decrease(&self) -> bool {
        let mut current = self.count.load(Ordering::Acquire);
        loop {
            if current == 0 || current == DISPOSED {
                error!(state = ?self.state(), "reference count released without a reference");
                debug_assert!(false, "reference count released without a reference");
                return false;
            }
            match self.count.compare_exchange_weak(
                current,
                current - 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    /// Disposes the counter if no references are held.
    ///
    /// Idempotent: returns `true` if the counter is (now) disposed.
    pub fn try_dispose(&self) -> bool {
        match self
            .count
            .compare_exchange(0, DISPOSED, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => true,
            Err(actual) => actual == DISPOSED,
        }
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> RefState {
        match self.count.load(Ordering::Acquire) {
            DISPOSED => RefState::Disposed,
            n => RefState::Active(n),
        }
    }

    /// Returns `true` if the counter has been disposed.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.state() == RefState::Disposed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn increase_and_decrease() {
        let counter = RefCounter::new();
        assert!(counter.increase());
        assert!(counter.increase());
        assert_eq!(counter.state(), RefState::Active(2));
        assert!(counter.decrease());
        assert_eq!(counter.state(), RefState::Active(1));
    }

    #[test]
    fn dispose_fails_while_referenced() {
        let counter = RefCounter::new();
        counter.increase();
        assert!(!counter.try_dispose());
        counter.decrease();
        assert!(counter.try_dispose());
        assert!(counter.is_disposed());
    }

    #[test]
    fn dispose_is_idempotent_and_terminal() {
        let counter = RefCounter::new();
        assert!(counter.try_dispose());
        assert!(counter.try_dispose());
        assert!(!counter.increase());
        assert_eq!(counter.state(), RefState::Disposed);
    }

    #[test]
    fn concurrent_increase_decrease_balances() {
        let counter = Arc::new(RefCounter::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let counter = Arc::clone(&counter);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        assert!(counter.increase());
                        assert!(counter.decrease());
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(counter.state(), RefState::Active(0));
        assert!(counter.try_dispose());
    }
}
