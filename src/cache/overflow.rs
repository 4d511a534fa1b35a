//! Overflowing LRU Cache Module
//!
//! LRU cache that asks a close hook before evicting anything. Entries whose
//! hook refuses stay cached, and the cache records how far it has run past
//! its limit instead of failing the insertion.

use std::borrow::Borrow;
use std::collections::HashSet;
use std::fmt;
use std::hash::Hash;

use tracing::{debug, info};

use crate::cache::stats::filling_ratio;
use crate::cache::{
    CacheDiagnostics, CacheStats, Footprint, FootprintWeigher, LruCache, RemovalCause, SlotId,
    Weigher,
};
use crate::error::{CacheError, Result};

/// Fraction of the limit reclaimed by a sweep unless configured otherwise.
pub const DEFAULT_LOAD_FACTOR: f64 = 1.0 / 3.0;

// == Close Hook ==
/// Decides whether an eviction candidate may leave the cache.
///
/// `close` should release whatever the cached value stands for and return
/// `true` once it is safe to drop, or `false` while it is still in use. The
/// hook receives a [`CacheView`] so it can inspect or remove other keys; it
/// must not remove the key it is being asked about.
pub trait Closer<K, V>: Send {
    fn close(&mut self, key: &K, cache: &mut CacheView<'_, K, V>) -> anyhow::Result<bool>;
}

/// A [`Closer`] backed by a closure.
pub struct FnCloser<F>(pub F);

impl<K, V, F> Closer<K, V> for FnCloser<F>
where
    F: FnMut(&K, &mut CacheView<'_, K, V>) -> anyhow::Result<bool> + Send,
{
    fn close(&mut self, key: &K, cache: &mut CacheView<'_, K, V>) -> anyhow::Result<bool> {
        (self.0)(key, cache)
    }
}

/// Lets every eviction through.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysClose;

impl<K, V> Closer<K, V> for AlwaysClose {
    fn close(&mut self, _key: &K, _cache: &mut CacheView<'_, K, V>) -> anyhow::Result<bool> {
        Ok(true)
    }
}

/// Refuses every eviction.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverClose;

impl<K, V> Closer<K, V> for NeverClose {
    fn close(&mut self, _key: &K, _cache: &mut CacheView<'_, K, V>) -> anyhow::Result<bool> {
        Ok(false)
    }
}

// == Cache View ==
/// What a close hook may do to the cache while a sweep is in progress.
///
/// Lookups through the view never reorder the recency queue.
pub struct CacheView<'a, K, V> {
    cache: &'a mut LruCache<K, V>,
}

impl<'a, K, V> CacheView<'a, K, V>
where
    K: Hash + Eq + Clone,
{
    pub fn peek<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.cache.peek(key)
    }

    pub fn peek_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.cache.peek_mut(key)
    }

    /// Counted as a hit or miss, but recency is frozen during the sweep.
    pub fn get<Q>(&mut self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.cache.get(key)
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.cache.contains_key(key)
    }

    /// Removes another key, e.g. a dependent entry that must go first.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.cache.remove(key)
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn current_space(&self) -> usize {
        self.cache.current_space()
    }
}

// == Overflowing LRU Cache ==
/// LRU cache that tolerates running over its limit when evictions are vetoed.
///
/// `put` never loses the value being inserted. When the close hook keeps too
/// many entries alive, the shortfall is recorded in [`overflow`] and later
/// `put` or [`shrink`] calls try to pay it back.
///
/// [`overflow`]: OverflowingLruCache::overflow
/// [`shrink`]: OverflowingLruCache::shrink
pub struct OverflowingLruCache<K, V> {
    inner: LruCache<K, V>,
    closer: Box<dyn Closer<K, V>>,
    overflow: usize,
    load_factor: f64,
}

impl<K, V> OverflowingLruCache<K, V>
where
    K: Hash + Eq + Clone,
{
    // == Constructor ==
    /// Creates an empty cache that consults `closer` before every eviction.
    pub fn new(space_limit: usize, closer: impl Closer<K, V> + 'static) -> Self {
        Self {
            inner: LruCache::new(space_limit),
            closer: Box::new(closer),
            overflow: 0,
            load_factor: DEFAULT_LOAD_FACTOR,
        }
    }

    /// Same as [`new`](Self::new) with a closure as the close hook.
    pub fn with_close_fn<F>(space_limit: usize, close: F) -> Self
    where
        F: FnMut(&K, &mut CacheView<'_, K, V>) -> anyhow::Result<bool> + Send + 'static,
    {
        Self::new(space_limit, FnCloser(close))
    }

    pub fn with_weigher(mut self, weigher: impl Weigher<K, V> + 'static) -> Self {
        self.inner = self.inner.with_weigher(weigher);
        self
    }

    pub fn weigh_by_footprint(self) -> Self
    where
        V: Footprint,
    {
        self.with_weigher(FootprintWeigher)
    }

    pub fn with_listener<F>(mut self, listener: F) -> Self
    where
        F: FnMut(&K, &V, RemovalCause) + Send + 'static,
    {
        self.inner = self.inner.with_listener(listener);
        self
    }

    /// Sets the load factor, rejecting values outside (0, 1].
    pub fn with_load_factor(mut self, load_factor: f64) -> Result<Self> {
        self.set_load_factor(load_factor)?;
        Ok(self)
    }

    /// Starts the cache with a recorded overflow, as when cloning a cache
    /// that was already over its limit.
    pub fn with_initial_overflow(mut self, overflow: usize) -> Self {
        self.overflow = overflow;
        self
    }

    // == Load Factor ==
    pub fn load_factor(&self) -> f64 {
        self.load_factor
    }

    pub fn set_load_factor(&mut self, load_factor: f64) -> Result<()> {
        if !(load_factor > 0.0 && load_factor <= 1.0) {
            return Err(CacheError::InvalidArgument(format!(
                "load factor must be in (0, 1], got {}",
                load_factor
            )));
        }
        self.load_factor = load_factor;
        Ok(())
    }

    // == Lookups ==
    /// Looks up `key` and marks it most recently used.
    pub fn get<Q>(&mut self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.get(key)
    }

    /// Looks up `key` without affecting recency order.
    pub fn peek<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.peek(key)
    }

    pub fn peek_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.peek_mut(key)
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.contains_key(key)
    }

    // == Put ==
    /// Stores `value` under `key` and returns a reference to it.
    ///
    /// Pending overflow is paid back first. The value is inserted even when
    /// the close hook keeps enough entries alive to push the cache past its
    /// limit. The only error is a failing close hook, in which case the new
    /// value is not inserted.
    pub fn put(&mut self, key: K, value: V) -> Result<&V> {
        if self.overflow > 0 {
            self.shrink()?;
        }

        let weight = self.inner.weigh(&key, &value);
        let value = match self.inner.replace_in_place(&key, value, weight) {
            Ok(id) => {
                self.overflow = 0;
                return Ok(&self.inner.queue[id].value);
            }
            Err(value) => value,
        };

        self.make_space(weight)?;
        let id = self.inner.insert_new(key, value, weight);
        Ok(&self.inner.queue[id].value)
    }

    // == Make Space ==
    /// Sweeps from the tail, closing entries until `space` more units fit.
    ///
    /// Each sweep aims to free at least `(1 - load_factor)` of the limit.
    /// Returns `Ok(false)` and records the shortfall in `overflow` when the
    /// close hook kept too much alive.
    pub fn make_space(&mut self, space: usize) -> Result<bool> {
        let limit = self.inner.space_limit;
        if self.inner.current_space + space <= limit {
            self.overflow = 0;
            return Ok(true);
        }

        let reclaim_target = ((1.0 - self.load_factor) * limit as f64) as usize;
        let space_needed = reclaim_target.max(space);

        self.inner.timestamps_on = false;
        let swept = self.sweep(space_needed, limit);
        self.inner.timestamps_on = true;
        swept?;

        if self.inner.current_space + space <= limit {
            if self.overflow > 0 {
                info!("Cache back within its limit of {}", limit);
            }
            self.overflow = 0;
            return Ok(true);
        }

        let overflow = self.inner.current_space + space - limit;
        if overflow != self.overflow {
            info!(
                "Cache overflowing by {} (limit {}, in use {})",
                overflow, limit, self.inner.current_space
            );
        }
        self.overflow = overflow;
        Ok(false)
    }

    fn sweep(&mut self, space_needed: usize, limit: usize) -> Result<()> {
        let mut visited = HashSet::new();
        let mut cursor = self.inner.queue.tail();

        while self.inner.current_space + space_needed > limit {
            let Some(id) = cursor else {
                break;
            };
            let key = self.inner.queue[id].key.clone();
            let prev_key = self
                .inner
                .queue
                .prev(id)
                .map(|prev| self.inner.queue[prev].key.clone());

            self.close_entry(&key)?;
            visited.insert(key.clone());

            cursor = match self.inner.table.get(&key) {
                // vetoed: its live predecessor has not been visited yet
                Some(&id) => self.inner.queue.prev(id),
                None => prev_key
                    .and_then(|prev| self.inner.table.get(&prev).copied())
                    .or_else(|| self.first_unvisited(&visited)),
            };
        }
        Ok(())
    }

    /// Least recently used entry the current sweep has not asked about.
    ///
    /// Used when the hook removed both the entry it was asked about and
    /// that entry's predecessor, leaving no link to continue from.
    fn first_unvisited(&self, visited: &HashSet<K>) -> Option<SlotId> {
        let mut cursor = self.inner.queue.tail();
        while let Some(id) = cursor {
            if !visited.contains(&self.inner.queue[id].key) {
                return Some(id);
            }
            cursor = self.inner.queue.prev(id);
        }
        None
    }

    /// Asks the hook about one entry and detaches it if allowed.
    fn close_entry(&mut self, key: &K) -> Result<bool> {
        let closed = {
            let mut view = CacheView {
                cache: &mut self.inner,
            };
            self.closer
                .close(key, &mut view)
                .map_err(CacheError::Close)?
        };

        if !closed {
            self.inner.stats.record_veto();
            debug!("Eviction vetoed by close hook");
            return Ok(false);
        }

        // the hook may already have taken the entry out itself
        if let Some(&id) = self.inner.table.get(key) {
            self.inner.detach_slot(id, RemovalCause::Evicted);
        }
        Ok(true)
    }

    // == Shrink ==
    /// Retries reclaiming pending overflow. A no-op when not overflowing.
    pub fn shrink(&mut self) -> Result<bool> {
        if self.overflow == 0 {
            return Ok(true);
        }
        self.make_space(0)
    }

    // == Removal ==
    /// Removes `key` without consulting the close hook.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let removed = self.inner.remove(key);
        self.settle_overflow();
        removed
    }

    /// Removes every entry, notifying from least to most recently used.
    pub fn flush(&mut self) {
        self.inner.flush();
        self.overflow = 0;
    }

    pub fn flush_key<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let removed = self.inner.flush_key(key);
        self.settle_overflow();
        removed
    }

    fn settle_overflow(&mut self) {
        let excess = self
            .inner
            .current_space
            .saturating_sub(self.inner.space_limit);
        self.overflow = self.overflow.min(excess);
    }

    // == Space Limit ==
    /// Changes the capacity. Shrinking reclaims first; whatever the close
    /// hook keeps alive beyond the new limit becomes overflow.
    ///
    /// The new limit is applied even when the close hook fails part way
    /// through the sweep; the hook's error is still returned.
    pub fn set_space_limit(&mut self, limit: usize) -> Result<()> {
        let old = self.inner.space_limit;
        let reclaimed = if limit < old {
            self.make_space(old - limit).map(|_| ())
        } else {
            Ok(())
        };
        info!("Space limit changed from {} to {}", old, limit);
        self.inner.space_limit = limit;
        self.overflow = self.inner.current_space.saturating_sub(limit);
        reclaimed
    }

    pub fn space_limit(&self) -> usize {
        self.inner.space_limit()
    }

    pub fn current_space(&self) -> usize {
        self.inner.current_space()
    }

    pub fn overflow(&self) -> usize {
        self.overflow
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Percentage of the limit in use, counting overflow.
    pub fn filling_ratio(&self) -> f64 {
        filling_ratio(self.inner.current_space, self.overflow, self.inner.space_limit)
    }

    // == Snapshots ==
    pub fn elements(&self) -> std::vec::IntoIter<V>
    where
        V: Clone,
    {
        self.inner.elements()
    }

    pub fn keys(&self) -> std::vec::IntoIter<K> {
        self.inner.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> + '_ {
        self.inner.iter()
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.stats()
    }

    pub fn diagnostics(&self) -> CacheDiagnostics {
        self.with_overflow(self.inner.diagnostics())
    }

    pub fn diagnostics_by<F>(&self, classify: F) -> CacheDiagnostics
    where
        F: Fn(&K, &V) -> String,
    {
        self.with_overflow(self.inner.diagnostics_by(classify))
    }

    fn with_overflow(&self, mut diagnostics: CacheDiagnostics) -> CacheDiagnostics {
        diagnostics.overflow = self.overflow;
        diagnostics.filling_ratio = self.filling_ratio();
        diagnostics
    }

    /// Structural checks plus overflow accounting.
    pub fn check_invariants(&self) -> Result<()> {
        self.inner.check_invariants()?;
        if self.inner.current_space > self.inner.space_limit + self.overflow {
            return Err(CacheError::Invariant(format!(
                "{} in use exceeds limit {} plus overflow {}",
                self.inner.current_space, self.inner.space_limit, self.overflow
            )));
        }
        Ok(())
    }
}

impl<K, V> fmt::Debug for OverflowingLruCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OverflowingLruCache")
            .field("inner", &self.inner)
            .field("overflow", &self.overflow)
            .field("load_factor", &self.load_factor)
            .finish_non_exhaustive()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::FnWeigher;
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};

    fn pinned_closer(
        pinned: Arc<Mutex<HashSet<u32>>>,
    ) -> impl FnMut(&u32, &mut CacheView<'_, u32, &'static str>) -> anyhow::Result<bool> + Send
    {
        move |key, _view| Ok(!pinned.lock().unwrap().contains(key))
    }

    #[test]
    fn test_new_defaults() {
        let cache: OverflowingLruCache<u32, u32> = OverflowingLruCache::new(100, AlwaysClose);
        assert_eq!(cache.space_limit(), 100);
        assert_eq!(cache.overflow(), 0);
        assert!((cache.load_factor() - DEFAULT_LOAD_FACTOR).abs() < f64::EPSILON);
    }

    #[test]
    fn test_invalid_load_factor() {
        for bad in [0.0, -0.5, 1.5, f64::NAN] {
            let result =
                OverflowingLruCache::<u32, u32>::new(10, AlwaysClose).with_load_factor(bad);
            assert!(matches!(result, Err(CacheError::InvalidArgument(_))));
        }
        assert!(OverflowingLruCache::<u32, u32>::new(10, AlwaysClose)
            .with_load_factor(1.0)
            .is_ok());
    }

    #[test]
    fn test_sweep_reclaims_load_factor_share() {
        let mut cache = OverflowingLruCache::new(9, AlwaysClose);
        for key in 0..9u32 {
            cache.put(key, key).unwrap();
        }

        cache.put(9, 9).unwrap();

        // (1 - 1/3) * 9 = 6 units must be free before the insert
        assert_eq!(cache.len(), 4);
        assert_eq!(cache.keys().collect::<Vec<_>>(), vec![9, 8, 7, 6]);
        assert_eq!(cache.overflow(), 0);
    }

    #[test]
    fn test_full_load_factor_evicts_minimum() {
        let mut cache = OverflowingLruCache::new(10, AlwaysClose)
            .with_weigher(FnWeigher(|_: &u32, weight: &usize| *weight))
            .with_load_factor(1.0)
            .unwrap();
        for key in 0..10u32 {
            cache.put(key, 1).unwrap();
        }

        cache.put(100, 5).unwrap();

        assert_eq!(cache.current_space(), 10);
        assert_eq!(cache.len(), 6);
        assert!(!cache.contains_key(&4));
        assert!(cache.contains_key(&5));
    }

    #[test]
    fn test_veto_keeps_everything_and_records_shortfall() {
        let mut cache = OverflowingLruCache::new(3, NeverClose);
        cache.put(1, "a").unwrap();
        cache.put(2, "b").unwrap();
        cache.put(3, "c").unwrap();

        let stored = cache.put(4, "d").unwrap();
        assert_eq!(*stored, "d");

        assert_eq!(cache.overflow(), 1);
        assert_eq!(cache.current_space(), 4);
        for key in 1..=4 {
            assert!(cache.get(&key).is_some());
        }
        assert_eq!(cache.stats().vetoes, 3);
        cache.check_invariants().unwrap();
    }

    #[test]
    fn test_veto_skips_to_predecessor() {
        let pinned = Arc::new(Mutex::new(HashSet::from([1u32])));
        let mut cache = OverflowingLruCache::with_close_fn(3, pinned_closer(Arc::clone(&pinned)))
            .with_load_factor(1.0)
            .unwrap();
        cache.put(1, "a").unwrap();
        cache.put(2, "b").unwrap();
        cache.put(3, "c").unwrap();

        cache.put(4, "d").unwrap();

        assert!(cache.contains_key(&1));
        assert!(!cache.contains_key(&2));
        assert_eq!(cache.overflow(), 0);
    }

    #[test]
    fn test_shrink_after_unpin() {
        let pinned = Arc::new(Mutex::new(HashSet::from([1u32, 2, 3, 4])));
        let mut cache = OverflowingLruCache::with_close_fn(3, pinned_closer(Arc::clone(&pinned)));
        for (key, value) in [(1, "a"), (2, "b"), (3, "c"), (4, "d")] {
            cache.put(key, value).unwrap();
        }
        assert_eq!(cache.overflow(), 1);

        assert!(!cache.shrink().unwrap());
        assert_eq!(cache.overflow(), 1);
        assert!(!cache.shrink().unwrap());
        assert_eq!(cache.overflow(), 1);

        pinned.lock().unwrap().clear();
        assert!(cache.shrink().unwrap());
        assert_eq!(cache.overflow(), 0);
        assert!(cache.current_space() <= cache.space_limit());
    }

    #[test]
    fn test_shrink_without_overflow_is_trivial() {
        let mut cache: OverflowingLruCache<u32, u32> = OverflowingLruCache::new(3, NeverClose);
        assert!(cache.shrink().unwrap());
        assert_eq!(cache.overflow(), 0);
    }

    #[test]
    fn test_initial_overflow_cleared_by_shrink() {
        let mut cache: OverflowingLruCache<u32, u32> =
            OverflowingLruCache::new(3, NeverClose).with_initial_overflow(2);
        assert_eq!(cache.overflow(), 2);
        assert!(cache.shrink().unwrap());
        assert_eq!(cache.overflow(), 0);
    }

    #[test]
    fn test_remove_settles_overflow() {
        let mut cache = OverflowingLruCache::new(2, NeverClose);
        cache.put(1, "a").unwrap();
        cache.put(2, "b").unwrap();
        cache.put(3, "c").unwrap();
        assert_eq!(cache.overflow(), 1);

        assert_eq!(cache.remove(&1), Some("a"));
        assert_eq!(cache.overflow(), 0);
        assert!(cache.remove(&1).is_none());
    }

    #[test]
    fn test_hook_failure_propagates_and_keeps_cache_consistent() {
        let mut cache = OverflowingLruCache::with_close_fn(
            2,
            |key: &u32, _view: &mut CacheView<'_, u32, u32>| {
                if *key == 1 {
                    anyhow::bail!("cannot release {}", key);
                }
                Ok(true)
            },
        );
        cache.put(1, 10).unwrap();
        cache.put(2, 20).unwrap();

        let result = cache.put(3, 30);
        assert!(matches!(result, Err(CacheError::Close(_))));

        assert!(cache.contains_key(&1));
        assert!(cache.contains_key(&2));
        assert!(!cache.contains_key(&3));
        cache.check_invariants().unwrap();
    }

    #[test]
    fn test_hook_can_remove_other_keys() {
        // closing 1 also drops its dependent 2
        let mut cache = OverflowingLruCache::with_close_fn(
            3,
            |key: &u32, view: &mut CacheView<'_, u32, u32>| {
                if *key == 1 {
                    view.remove(&2);
                }
                Ok(true)
            },
        )
        .with_load_factor(1.0)
        .unwrap();
        cache.put(2, 20).unwrap();
        cache.put(1, 10).unwrap();
        cache.put(3, 30).unwrap();
        cache.get(&2);

        cache.put(4, 40).unwrap();

        assert!(!cache.contains_key(&1));
        assert!(!cache.contains_key(&2));
        assert_eq!(cache.keys().collect::<Vec<_>>(), vec![4, 3]);
        cache.check_invariants().unwrap();
    }

    #[test]
    fn test_hook_reads_do_not_reorder_queue() {
        let mut cache = OverflowingLruCache::with_close_fn(
            4,
            |key: &u32, view: &mut CacheView<'_, u32, u32>| {
                if *key == 1 {
                    view.get(&3);
                    return Ok(false);
                }
                Ok(true)
            },
        )
        .with_load_factor(1.0)
        .unwrap();
        for key in 1..=4u32 {
            cache.put(key, key * 10).unwrap();
        }

        cache.put(5, 50).unwrap();

        assert!(cache.contains_key(&1));
        assert!(!cache.contains_key(&2));
        assert_eq!(cache.keys().collect::<Vec<_>>(), vec![5, 4, 3, 1]);
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn test_hook_removing_itself_counts_as_closed() {
        let mut cache = OverflowingLruCache::with_close_fn(
            1,
            |key: &u32, view: &mut CacheView<'_, u32, u32>| {
                view.remove(key);
                Ok(true)
            },
        );
        cache.put(1, 10).unwrap();
        cache.put(2, 20).unwrap();

        assert_eq!(cache.keys().collect::<Vec<_>>(), vec![2]);
        assert_eq!(cache.overflow(), 0);
        cache.check_invariants().unwrap();
    }

    #[test]
    fn test_sweep_continues_when_hook_removes_predecessor() {
        // closing 1 also releases 2, which was the next candidate
        let mut cache = OverflowingLruCache::with_close_fn(
            7,
            |key: &u32, view: &mut CacheView<'_, u32, usize>| {
                if *key == 1 {
                    view.remove(&2);
                }
                Ok(true)
            },
        )
        .with_load_factor(1.0)
        .unwrap()
        .with_weigher(FnWeigher(|_: &u32, weight: &usize| *weight));
        cache.put(1, 1).unwrap();
        cache.put(2, 1).unwrap();
        cache.put(3, 5).unwrap();
        assert_eq!(cache.current_space(), 7);

        cache.put(4, 3).unwrap();

        assert_eq!(cache.overflow(), 0);
        assert_eq!(cache.keys().collect::<Vec<_>>(), vec![4]);
        assert_eq!(cache.stats().vetoes, 0);
        cache.check_invariants().unwrap();
    }

    #[test]
    fn test_sweep_does_not_ask_twice_after_losing_its_place() {
        let asked = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&asked);
        let mut cache = OverflowingLruCache::with_close_fn(
            4,
            move |key: &u32, view: &mut CacheView<'_, u32, u32>| {
                sink.lock().unwrap().push(*key);
                match *key {
                    1 => Ok(false),
                    2 => {
                        view.remove(&3);
                        Ok(true)
                    }
                    _ => Ok(true),
                }
            },
        )
        .with_load_factor(1.0)
        .unwrap();
        for key in 1..=4u32 {
            cache.put(key, key).unwrap();
        }

        cache.set_space_limit(1).unwrap();

        // 1 is vetoed once, 3 goes with 2, then 4 is the only candidate left
        assert_eq!(*asked.lock().unwrap(), vec![1, 2, 4]);
        assert_eq!(cache.keys().collect::<Vec<_>>(), vec![1]);
        assert_eq!(cache.overflow(), 0);
    }

    #[test]
    fn test_set_space_limit_applies_even_when_hook_fails() {
        let mut cache = OverflowingLruCache::with_close_fn(
            3,
            |_: &u32, _view: &mut CacheView<'_, u32, u32>| anyhow::bail!("device busy"),
        );
        for key in 0..3u32 {
            cache.put(key, key).unwrap();
        }

        assert!(matches!(cache.set_space_limit(1), Err(CacheError::Close(_))));

        assert_eq!(cache.space_limit(), 1);
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.overflow(), 2);
        cache.check_invariants().unwrap();
    }

    #[test]
    fn test_listener_sees_evictions_but_not_vetoes() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        let mut cache = OverflowingLruCache::with_close_fn(
            2,
            |key: &u32, _view: &mut CacheView<'_, u32, u32>| Ok(*key != 1),
        )
        .with_load_factor(1.0)
        .unwrap()
        .with_listener(move |key: &u32, _: &u32, cause| {
            sink.lock().unwrap().push((*key, cause))
        });
        cache.put(1, 10).unwrap();
        cache.put(2, 20).unwrap();
        cache.put(3, 30).unwrap();

        assert_eq!(*log.lock().unwrap(), vec![(2, RemovalCause::Evicted)]);
    }

    #[test]
    fn test_set_space_limit_with_vetoes() {
        let mut cache = OverflowingLruCache::new(4, NeverClose);
        for key in 0..4u32 {
            cache.put(key, key).unwrap();
        }

        cache.set_space_limit(2).unwrap();

        assert_eq!(cache.space_limit(), 2);
        assert_eq!(cache.len(), 4);
        assert_eq!(cache.overflow(), 2);

        cache.set_space_limit(10).unwrap();
        assert_eq!(cache.overflow(), 0);
    }

    #[test]
    fn test_update_in_place_clears_overflow() {
        let mut cache = OverflowingLruCache::new(2, NeverClose)
            .with_weigher(FnWeigher(|_: &u32, weight: &usize| *weight));
        cache.put(1, 1).unwrap();
        cache.put(2, 2).unwrap();
        assert_eq!(cache.overflow(), 1);

        // the shrink before the put still fails, but the lighter value fits in place
        cache.put(2, 1).unwrap();
        assert_eq!(cache.overflow(), 0);
        assert_eq!(cache.current_space(), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_filling_ratio_counts_overflow() {
        let mut cache = OverflowingLruCache::new(4, NeverClose);
        for key in 0..5u32 {
            cache.put(key, key).unwrap();
        }
        assert_eq!(cache.overflow(), 1);
        assert_eq!(cache.filling_ratio(), 150.0);
        assert_eq!(cache.diagnostics().overflow, 1);
    }
}
