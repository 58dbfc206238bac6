//! Segment readers.
//!
//! Cursors read segments through pooled file handles. Opening a file per
//! cursor is expensive when the consensus module streams entries to many
//! followers, so idle handles are kept in a [`ReaderPool`] and a
//! [`PositionCache`] per segment remembers where recently read entries
//! start.

mod pool;
mod position;

pub use pool::{Reader, ReaderPool};
pub use position::{PositionCache, CACHE_SIZE};
