//! Cache Entry Module
//!
//! Defines the arena node stored for each live key, and the handle type used
//! to link nodes into the recency queue.

// == Slot Handle ==
/// Index of an entry inside the recency queue's slot arena.
///
/// Handles are only meaningful for the queue that issued them and are reused
/// once the entry they pointed at is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotId(pub(crate) usize);

impl SlotId {
    pub fn index(self) -> usize {
        self.0
    }
}

// == Cache Entry ==
/// A single live entry: payload plus the bookkeeping the cache needs.
#[derive(Debug, Clone)]
pub struct CacheEntry<K, V> {
    /// Key the entry is stored under
    pub key: K,
    /// The cached payload
    pub value: V,
    /// Capacity units this entry consumes
    pub weight: usize,
    /// Stamp of the last insertion or access
    pub timestamp: u64,
    /// Towards the head (more recently used)
    pub(crate) prev: Option<SlotId>,
    /// Towards the tail (less recently used)
    pub(crate) next: Option<SlotId>,
}

impl<K, V> CacheEntry<K, V> {
    // == Constructor ==
    /// Creates an unlinked entry.
    pub fn new(key: K, value: V, weight: usize, timestamp: u64) -> Self {
        Self {
            key,
            value,
            weight,
            timestamp,
            prev: None,
            next: None,
        }
    }

    /// True when the entry is not linked to any neighbour.
    pub fn is_detached(&self) -> bool {
        self.prev.is_none() && self.next.is_none()
    }
}
