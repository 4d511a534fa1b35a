//! Entry Weight Module
//!
//! Decides how many capacity units an entry consumes. Every entry costs 1 by
//! default; values that know their own size implement [`Footprint`] and the
//! cache is built with [`FootprintWeigher`] to honour it.

// == Footprint Capability ==
/// Optional capability for cached values that report their own cost.
pub trait Footprint {
    /// Capacity units this value occupies. 0 is counted as 1.
    fn cache_footprint(&self) -> usize;
}

impl Footprint for String {
    fn cache_footprint(&self) -> usize {
        self.len()
    }
}

impl<T> Footprint for Vec<T> {
    fn cache_footprint(&self) -> usize {
        self.len()
    }
}

impl<T: Footprint + ?Sized> Footprint for Box<T> {
    fn cache_footprint(&self) -> usize {
        (**self).cache_footprint()
    }
}

impl<T: Footprint + ?Sized> Footprint for std::sync::Arc<T> {
    fn cache_footprint(&self) -> usize {
        (**self).cache_footprint()
    }
}

// == Weigher Strategy ==
/// Computes the weight of a `(key, value)` pair at insertion time.
pub trait Weigher<K, V>: Send {
    fn weigh(&self, key: &K, value: &V) -> usize;
}

/// Every entry costs exactly 1 unit.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnitWeigher;

impl<K, V> Weigher<K, V> for UnitWeigher {
    #[inline]
    fn weigh(&self, _key: &K, _value: &V) -> usize {
        1
    }
}

/// Asks the value for its [`Footprint`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FootprintWeigher;

impl<K, V: Footprint> Weigher<K, V> for FootprintWeigher {
    #[inline]
    fn weigh(&self, _key: &K, value: &V) -> usize {
        value.cache_footprint().max(1)
    }
}

/// A weigher backed by a closure.
pub struct FnWeigher<F>(pub F);

impl<K, V, F> Weigher<K, V> for FnWeigher<F>
where
    F: Fn(&K, &V) -> usize + Send,
{
    #[inline]
    fn weigh(&self, key: &K, value: &V) -> usize {
        (self.0)(key, value).max(1)
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    struct Blob(usize);

    impl Footprint for Blob {
        fn cache_footprint(&self) -> usize {
            self.0
        }
    }

    #[test]
    fn test_unit_weigher() {
        assert_eq!(Weigher::<&str, Blob>::weigh(&UnitWeigher, &"k", &Blob(40)), 1);
    }

    #[test]
    fn test_footprint_weigher_uses_value() {
        assert_eq!(FootprintWeigher.weigh(&"k", &Blob(5)), 5);
    }

    #[test]
    fn test_zero_footprint_counts_as_one() {
        assert_eq!(FootprintWeigher.weigh(&"k", &Blob(0)), 1);
        assert_eq!(FnWeigher(|_: &u32, _: &u32| 0).weigh(&1, &2), 1);
    }

    #[test]
    fn test_fn_weigher() {
        let weigher = FnWeigher(|key: &String, value: &Vec<u8>| key.len() + value.len());
        assert_eq!(weigher.weigh(&"abc".to_string(), &vec![0; 7]), 10);
    }

    #[test]
    fn test_footprint_through_smart_pointers() {
        let boxed: Box<String> = Box::new("four".to_string());
        let shared = std::sync::Arc::new(vec![1u8, 2, 3]);
        assert_eq!(boxed.cache_footprint(), 4);
        assert_eq!(shared.cache_footprint(), 3);
    }
}
