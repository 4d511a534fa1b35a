//! Cache Module
//!
//! Variable-weight LRU caching: a strict variant that drops what does not
//! fit, an overflowing variant that defers to a close hook before evicting,
//! and a sharded front for concurrent use.

mod entry;
mod listener;
mod lru;
mod overflow;
mod sharded;
mod stats;
mod store;
mod weight;


// Re-export public types
pub use entry::{CacheEntry, SlotId};
pub use listener::{DeletionListener, RemovalCause};
pub use lru::{Iter, RecencyQueue};
pub use overflow::{
    AlwaysClose, CacheView, Closer, FnCloser, NeverClose, OverflowingLruCache,
    DEFAULT_LOAD_FACTOR,
};
pub use sharded::ShardedCache;
pub use stats::{CacheDiagnostics, CacheStats, KindSummary};
pub use store::{Admission, LruCache};
pub use weight::{Footprint, FootprintWeigher, FnWeigher, UnitWeigher, Weigher};

// == Public Constants ==
/// Capacity used when none is specified
pub const DEFAULT_SPACE_LIMIT: usize = 100;
