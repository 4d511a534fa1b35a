//! Deletion listener: a callback invoked whenever an entry leaves the cache.
//!
//! Fired for explicit removal, flushes, replacement and successful eviction.
//! A vetoed eviction leaves the entry in place and fires nothing.

// == Removal Cause ==
/// The reason an entry left the cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RemovalCause {
    /// Removed by caller request through `remove`.
    Explicit,
    /// Chosen as a victim while the cache reclaimed space.
    Evicted,
    /// Dropped because a `put` on the same key no longer fit in place.
    Replaced,
    /// Removed by `flush` or `flush_key`.
    Flushed,
}

// == Deletion Listener ==
/// Receives every entry on its way out, after it has been unlinked.
pub trait DeletionListener<K, V>: Send {
    fn on_delete(&mut self, key: &K, value: &V, cause: RemovalCause);
}

impl<K, V, F> DeletionListener<K, V> for F
where
    F: FnMut(&K, &V, RemovalCause) + Send,
{
    fn on_delete(&mut self, key: &K, value: &V, cause: RemovalCause) {
        self(key, value, cause)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_listener_records_calls() {
        let mut seen = Vec::new();
        {
            let mut listener =
                |key: &u32, value: &u64, cause: RemovalCause| seen.push((*key, *value, cause));
            listener.on_delete(&1, &10, RemovalCause::Evicted);
            listener.on_delete(&2, &20, RemovalCause::Explicit);
        }
        assert_eq!(
            seen,
            vec![(1, 10, RemovalCause::Evicted), (2, 20, RemovalCause::Explicit)]
        );
    }
}
