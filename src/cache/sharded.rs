//! Sharded Cache Module
//!
//! Splits the keyspace over independently locked overflowing caches so that
//! unrelated keys do not serialize on one lock. Recency is tracked per shard,
//! so eviction order is only approximately global.

use std::borrow::Borrow;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::cache::{CacheDiagnostics, CacheStats, OverflowingLruCache};
use crate::error::{CacheError, Result};

// == Sharded Cache ==
/// Thread-safe front for a set of [`OverflowingLruCache`] shards.
pub struct ShardedCache<K, V> {
    shards: Vec<Mutex<OverflowingLruCache<K, V>>>,
}

impl<K, V> ShardedCache<K, V>
where
    K: Hash + Eq + Clone,
{
    // == Constructor ==
    /// Builds `shard_count` shards sharing `space_limit` between them.
    ///
    /// `build` is called once per shard with that shard's share of the limit.
    pub fn new<F>(shard_count: usize, space_limit: usize, mut build: F) -> Result<Self>
    where
        F: FnMut(usize) -> Result<OverflowingLruCache<K, V>>,
    {
        if shard_count == 0 {
            return Err(CacheError::InvalidArgument(
                "shard count must be at least 1".to_string(),
            ));
        }
        check_split(space_limit, shard_count)?;

        let shards = (0..shard_count)
            .map(|index| build(shard_limit(space_limit, shard_count, index)).map(Mutex::new))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { shards })
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    fn shard_for<Q>(&self, key: &Q) -> &Mutex<OverflowingLruCache<K, V>>
    where
        Q: Hash + ?Sized,
    {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let index = (hasher.finish() % self.shards.len() as u64) as usize;
        &self.shards[index]
    }

    /// Runs `f` with the shard that owns `key` locked.
    pub fn with_shard<Q, R>(
        &self,
        key: &Q,
        f: impl FnOnce(&mut OverflowingLruCache<K, V>) -> R,
    ) -> R
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let mut shard = self.shard_for(key).lock();
        f(&mut shard)
    }

    // == Lookups ==
    /// Clones the value out and marks it most recently used in its shard.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        self.shard_for(key).lock().get(key).cloned()
    }

    pub fn peek<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        self.shard_for(key).lock().peek(key).cloned()
    }

    /// Mutates a value in place without touching recency or weight.
    pub fn update<Q, R>(&self, key: &Q, f: impl FnOnce(&mut V) -> R) -> Option<R>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.shard_for(key).lock().peek_mut(key).map(f)
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.shard_for(key).lock().contains_key(key)
    }

    // == Mutations ==
    pub fn put(&self, key: K, value: V) -> Result<()> {
        let mut shard = self.shard_for(&key).lock();
        shard.put(key, value)?;
        Ok(())
    }

    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.shard_for(key).lock().remove(key)
    }

    /// Empties every shard and returns how many entries were dropped.
    pub fn flush(&self) -> usize {
        self.shards
            .iter()
            .map(|shard| {
                let mut shard = shard.lock();
                let count = shard.len();
                shard.flush();
                count
            })
            .sum()
    }

    /// Shrinks every shard; true when none is left overflowing.
    ///
    /// A failing shard does not stop the others; the first error is returned.
    pub fn shrink(&self) -> Result<bool> {
        let mut settled = true;
        let mut first_error = None;

        for (index, shard) in self.shards.iter().enumerate() {
            match shard.lock().shrink() {
                Ok(done) => settled &= done,
                Err(err) => {
                    warn!("Shrinking shard {} failed: {}", index, err);
                    settled = false;
                    first_error.get_or_insert(err);
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(settled),
        }
    }

    /// Redistributes a new total limit over the shards.
    ///
    /// Every shard gets its new limit even if some close hook fails, so the
    /// total always matches `space_limit` afterwards; the first hook error
    /// is returned.
    pub fn set_space_limit(&self, space_limit: usize) -> Result<()> {
        let count = self.shards.len();
        check_split(space_limit, count)?;

        let mut first_error = None;
        for (index, shard) in self.shards.iter().enumerate() {
            let limit = shard_limit(space_limit, count, index);
            if let Err(err) = shard.lock().set_space_limit(limit) {
                warn!("Reclaiming shard {} for limit {} failed: {}", index, limit, err);
                first_error.get_or_insert(err);
            }
        }
        info!("Space limit set to {} across {} shards", space_limit, count);

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    // == Aggregates ==
    pub fn space_limit(&self) -> usize {
        self.sum(|shard| shard.space_limit())
    }

    pub fn current_space(&self) -> usize {
        self.sum(|shard| shard.current_space())
    }

    pub fn overflow(&self) -> usize {
        self.sum(|shard| shard.overflow())
    }

    pub fn len(&self) -> usize {
        self.sum(|shard| shard.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let mut total = CacheStats::new();
        for shard in &self.shards {
            total.merge(&shard.lock().stats());
        }
        total
    }

    pub fn diagnostics_by<F>(&self, classify: F) -> CacheDiagnostics
    where
        F: Fn(&K, &V) -> String,
    {
        let mut total = CacheDiagnostics::default();
        for shard in &self.shards {
            total.merge(&shard.lock().diagnostics_by(&classify));
        }
        total
    }

    pub fn check_invariants(&self) -> Result<()> {
        for shard in &self.shards {
            shard.lock().check_invariants()?;
        }
        Ok(())
    }

    fn sum(&self, f: impl Fn(&OverflowingLruCache<K, V>) -> usize) -> usize {
        self.shards.iter().map(|shard| f(&shard.lock())).sum()
    }
}

/// Every shard needs room for at least one unit of weight.
fn check_split(total: usize, count: usize) -> Result<()> {
    if total < count {
        return Err(CacheError::InvalidArgument(format!(
            "space limit {} cannot be split over {} shards",
            total, count
        )));
    }
    Ok(())
}

/// Even split of `total` over `count` shards, remainder to the first ones.
fn shard_limit(total: usize, count: usize, index: usize) -> usize {
    total / count + usize::from(index < total % count)
}
