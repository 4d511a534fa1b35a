//! Cache Store Module
//!
//! Strict variable-weight LRU cache: a key table pointing into an
//! arena-backed recency queue, with space accounting against a limit.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use tracing::{debug, info};

use crate::cache::stats::filling_ratio;
use crate::cache::{
    CacheDiagnostics, CacheEntry, CacheStats, DeletionListener, Footprint, FootprintWeigher,
    RecencyQueue, RemovalCause, SlotId, UnitWeigher, Weigher, DEFAULT_SPACE_LIMIT,
};
use crate::error::{CacheError, Result};

// == Admission ==
/// Outcome of a strict [`LruCache::put`].
///
/// Insertion is best-effort: a value heavier than the whole cache is handed
/// back instead of being stored. No error is raised.
#[derive(Debug, PartialEq)]
pub enum Admission<'a, V> {
    /// The value now lives in the cache.
    Admitted(&'a V),
    /// No room could be made; the value is returned untouched.
    Rejected(V),
}

impl<'a, V> Admission<'a, V> {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admitted(_))
    }

    /// The value that was put, whether or not it was kept.
    pub fn value(&self) -> &V {
        match self {
            Admission::Admitted(value) => *value,
            Admission::Rejected(value) => value,
        }
    }
}

// == LRU Cache ==
/// Fixed-capacity cache whose entries carry a weight.
///
/// Every live key has exactly one entry in the recency queue, and
/// `current_space` always equals the sum of live weights. Not thread-safe;
/// wrap it in a lock (or use [`ShardedCache`](crate::cache::ShardedCache)) to
/// share it.
pub struct LruCache<K, V> {
    pub(crate) table: HashMap<K, SlotId>,
    pub(crate) queue: RecencyQueue<K, V>,
    pub(crate) current_space: usize,
    pub(crate) space_limit: usize,
    timestamp_counter: u64,
    /// Cleared while an eviction sweep walks the queue
    pub(crate) timestamps_on: bool,
    weigher: Box<dyn Weigher<K, V>>,
    listener: Option<Box<dyn DeletionListener<K, V>>>,
    pub(crate) stats: CacheStats,
}

impl<K, V> LruCache<K, V>
where
    K: Hash + Eq + Clone,
{
    // == Constructor ==
    /// Creates an empty cache where every entry weighs 1.
    pub fn new(space_limit: usize) -> Self {
        Self {
            table: HashMap::new(),
            queue: RecencyQueue::new(),
            current_space: 0,
            space_limit,
            timestamp_counter: 0,
            timestamps_on: true,
            weigher: Box::new(UnitWeigher),
            listener: None,
            stats: CacheStats::new(),
        }
    }

    /// Replaces the weigher used for subsequent insertions.
    pub fn with_weigher(mut self, weigher: impl Weigher<K, V> + 'static) -> Self {
        self.weigher = Box::new(weigher);
        self
    }

    /// Weighs entries by their value's [`Footprint`].
    pub fn weigh_by_footprint(self) -> Self
    where
        V: Footprint,
    {
        self.with_weigher(FootprintWeigher)
    }

    /// Installs the deletion listener.
    pub fn with_listener<F>(mut self, listener: F) -> Self
    where
        F: FnMut(&K, &V, RemovalCause) + Send + 'static,
    {
        self.listener = Some(Box::new(listener));
        self
    }

    // == Get ==
    /// Looks up `key` and marks it most recently used.
    pub fn get<Q>(&mut self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let Some(&id) = self.table.get(key) else {
            self.stats.record_miss();
            return None;
        };
        self.stats.record_hit();
        self.touch(id);
        Some(&self.queue[id].value)
    }

    // == Peek ==
    /// Looks up `key` without affecting recency order.
    pub fn peek<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let &id = self.table.get(key)?;
        self.queue.get(id).map(|entry| &entry.value)
    }

    /// Mutable lookup without affecting recency order.
    ///
    /// The entry keeps the weight it was inserted with; `put` the value again
    /// if the change alters its footprint.
    pub fn peek_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let &id = self.table.get(key)?;
        self.queue.get_mut(id).map(|entry| &mut entry.value)
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.table.contains_key(key)
    }

    // == Put ==
    /// Stores `value` under `key`, evicting least recently used entries as
    /// needed.
    ///
    /// An existing key is updated in place when the new weight still fits;
    /// otherwise the old entry is dropped and the value re-inserted. A value
    /// heavier than the whole cache is rejected.
    pub fn put(&mut self, key: K, value: V) -> Admission<'_, V> {
        let weight = self.weigh(&key, &value);

        let value = match self.replace_in_place(&key, value, weight) {
            Ok(id) => return Admission::Admitted(&self.queue[id].value),
            Err(value) => value,
        };

        if !self.make_space(weight) {
            self.stats.record_rejection();
            debug!(
                "Rejected entry of weight {} (space limit {})",
                weight, self.space_limit
            );
            return Admission::Rejected(value);
        }

        let id = self.insert_new(key, value, weight);
        Admission::Admitted(&self.queue[id].value)
    }

    // == Make Space ==
    /// Evicts from the tail until `space` more units fit.
    ///
    /// Fails without evicting anything when `space` exceeds the limit.
    pub fn make_space(&mut self, space: usize) -> bool {
        let limit = self.space_limit;
        if self.current_space + space <= limit {
            return true;
        }
        if space > limit {
            return false;
        }

        while self.current_space + space > limit {
            let Some(tail) = self.queue.tail() else {
                break;
            };
            self.detach_slot(tail, RemovalCause::Evicted);
        }
        true
    }

    // == Remove ==
    /// Removes `key` unconditionally. Missing keys are a no-op.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.detach(key, RemovalCause::Explicit)
    }

    // == Flush ==
    /// Removes every entry, notifying from least to most recently used.
    pub fn flush(&mut self) {
        while let Some(tail) = self.queue.tail() {
            self.detach_slot(tail, RemovalCause::Flushed);
        }
        self.queue.clear();
        self.table.clear();
        self.current_space = 0;
        self.stats.set_total_entries(0);
    }

    /// Removes a single entry, reporting it as flushed.
    pub fn flush_key<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.detach(key, RemovalCause::Flushed)
    }

    // == Space Limit ==
    /// Changes the capacity, evicting first when it shrinks.
    pub fn set_space_limit(&mut self, limit: usize) {
        if limit < self.space_limit {
            self.make_space(self.space_limit - limit);
        }
        info!("Space limit changed from {} to {}", self.space_limit, limit);
        self.space_limit = limit;
    }

    pub fn space_limit(&self) -> usize {
        self.space_limit
    }

    pub fn current_space(&self) -> usize {
        self.current_space
    }

    // == Length ==
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Percentage of the limit currently in use.
    pub fn filling_ratio(&self) -> f64 {
        filling_ratio(self.current_space, 0, self.space_limit)
    }

    // == Snapshots ==
    /// Values in MRU-to-LRU order, copied at call time.
    pub fn elements(&self) -> std::vec::IntoIter<V>
    where
        V: Clone,
    {
        self.queue
            .iter()
            .map(|entry| entry.value.clone())
            .collect::<Vec<_>>()
            .into_iter()
    }

    /// Keys in MRU-to-LRU order, copied at call time.
    pub fn keys(&self) -> std::vec::IntoIter<K> {
        self.queue
            .iter()
            .map(|entry| entry.key.clone())
            .collect::<Vec<_>>()
            .into_iter()
    }

    /// Borrowing MRU-to-LRU view.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> + '_ {
        self.queue.iter().map(|entry| (&entry.key, &entry.value))
    }

    // == Stats ==
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_total_entries(self.table.len());
        stats
    }

    /// Diagnostics grouped by the value's type name.
    pub fn diagnostics(&self) -> CacheDiagnostics {
        let kind = std::any::type_name::<V>();
        self.diagnostics_by(|_, _| kind.to_string())
    }

    /// Diagnostics grouped by a caller-supplied classifier.
    pub fn diagnostics_by<F>(&self, classify: F) -> CacheDiagnostics
    where
        F: Fn(&K, &V) -> String,
    {
        let mut diagnostics = CacheDiagnostics {
            queue_length: self.queue.iter().count(),
            table_length: self.table.len(),
            current_space: self.current_space,
            space_limit: self.space_limit,
            overflow: 0,
            filling_ratio: self.filling_ratio(),
            ..Default::default()
        };
        for entry in self.queue.iter() {
            diagnostics.record(classify(&entry.key, &entry.value), entry.weight);
        }
        diagnostics
    }

    // == Invariants ==
    /// Walks the queue and cross-checks it against the table and space total.
    pub fn check_invariants(&self) -> Result<()> {
        let mut walked = 0;
        let mut weight = 0;
        let mut prev: Option<SlotId> = None;
        let mut cursor = self.queue.head();

        while let Some(id) = cursor {
            if walked >= self.queue.len() {
                return Err(CacheError::Invariant(
                    "queue is longer than its recorded length".to_string(),
                ));
            }
            let entry = self.queue.get(id).ok_or_else(|| {
                CacheError::Invariant(format!("queue links to empty slot {}", id.index()))
            })?;
            if entry.prev != prev {
                return Err(CacheError::Invariant(format!(
                    "broken back link at slot {}",
                    id.index()
                )));
            }
            if self.table.get(&entry.key) != Some(&id) {
                return Err(CacheError::Invariant(format!(
                    "slot {} is not referenced by the table",
                    id.index()
                )));
            }
            weight += entry.weight;
            walked += 1;
            prev = Some(id);
            cursor = entry.next;
        }

        if self.queue.tail() != prev {
            return Err(CacheError::Invariant("tail does not end the queue".to_string()));
        }
        if walked != self.table.len() || walked != self.queue.len() {
            return Err(CacheError::Invariant(format!(
                "table holds {} keys but queue links {}",
                self.table.len(),
                walked
            )));
        }
        if weight != self.current_space {
            return Err(CacheError::Invariant(format!(
                "current space is {} but entries weigh {}",
                self.current_space, weight
            )));
        }
        Ok(())
    }

    // == Internals shared with the overflowing variant ==
    pub(crate) fn weigh(&self, key: &K, value: &V) -> usize {
        self.weigher.weigh(key, value)
    }

    fn next_timestamp(&mut self) -> u64 {
        self.timestamp_counter += 1;
        self.timestamp_counter
    }

    /// Marks an entry most recently used unless a sweep is running.
    fn touch(&mut self, id: SlotId) {
        if !self.timestamps_on {
            return;
        }
        let stamp = self.next_timestamp();
        self.queue[id].timestamp = stamp;
        self.queue.move_to_front(id);
    }

    /// Links a new entry at the head and accounts for its weight.
    pub(crate) fn insert_new(&mut self, key: K, value: V, weight: usize) -> SlotId {
        let stamp = self.next_timestamp();
        let id = self
            .queue
            .push_front(CacheEntry::new(key.clone(), value, weight, stamp));
        self.table.insert(key, id);
        self.current_space += weight;
        self.stats.set_total_entries(self.table.len());
        id
    }

    /// Updates an existing entry when the new weight fits, otherwise drops it.
    ///
    /// Hands the value back when the caller still has to insert it.
    pub(crate) fn replace_in_place(
        &mut self,
        key: &K,
        value: V,
        weight: usize,
    ) -> std::result::Result<SlotId, V> {
        let Some(&id) = self.table.get(key) else {
            return Err(value);
        };

        let new_total = self.current_space - self.queue[id].weight + weight;
        if new_total <= self.space_limit {
            let stamp = self.next_timestamp();
            let entry = &mut self.queue[id];
            entry.value = value;
            entry.weight = weight;
            entry.timestamp = stamp;
            self.queue.move_to_front(id);
            self.current_space = new_total;
            return Ok(id);
        }

        self.detach_slot(id, RemovalCause::Replaced);
        Err(value)
    }

    pub(crate) fn detach<Q>(&mut self, key: &Q, cause: RemovalCause) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let &id = self.table.get(key)?;
        self.detach_slot(id, cause).map(|entry| entry.value)
    }

    /// Unlinks an entry from both structures and fires the listener.
    pub(crate) fn detach_slot(
        &mut self,
        id: SlotId,
        cause: RemovalCause,
    ) -> Option<CacheEntry<K, V>> {
        let entry = self.queue.remove(id)?;
        self.table.remove(&entry.key);
        self.current_space -= entry.weight;
        self.stats.set_total_entries(self.table.len());

        if cause == RemovalCause::Evicted {
            self.stats.record_eviction();
            debug!(
                "Evicted entry of weight {} ({} of {} in use)",
                entry.weight, self.current_space, self.space_limit
            );
        }
        if let Some(listener) = self.listener.as_mut() {
            listener.on_delete(&entry.key, &entry.value, cause);
        }
        Some(entry)
    }
}

impl<K, V> Default for LruCache<K, V>
where
    K: Hash + Eq + Clone,
{
    fn default() -> Self {
        Self::new(DEFAULT_SPACE_LIMIT)
    }
}

impl<K, V> fmt::Debug for LruCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LruCache")
            .field("entries", &self.table.len())
            .field("current_space", &self.current_space)
            .field("space_limit", &self.space_limit)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}
