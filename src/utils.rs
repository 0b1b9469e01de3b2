//! Utility types.

use std::cell::RefCell;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

/// Lazily populated map of derived results.
///
/// Entries are computed at most once per key and never invalidated; the
/// data they derive from is immutable for the lifetime of the owner. The
/// compute closure runs with no borrow held, so populating one entry may
/// consult sibling caches, including this one.
///
/// ```
/// use rta_recon::utils::Memo;
///
/// let memo: Memo<u32, u32> = Memo::new();
/// let mut runs = 0;
///
/// for _ in 0..2 {
///     let v = memo
///         .get_or_try_insert_with::<(), _>(&7, || {
///             runs += 1;
///             Ok(7 * 2)
///         })
///         .unwrap();
///     assert_eq!(*v, 14);
/// }
///
/// assert_eq!(runs, 1);
/// ```
pub struct Memo<K, V> {
    items: RefCell<HashMap<K, Arc<V>>>,
}

impl<K, V> Memo<K, V>
where
    K: Hash + Eq + Clone,
{
    pub fn new() -> Self {
        Self {
            items: RefCell::new(HashMap::new()),
        }
    }

    /// Returns the value for `k`, computing it with `f` on first use.
    ///
    /// Failures are not cached: the computation is a pure function of
    /// immutable data, so a retry fails identically at no extra cost.
    pub fn get_or_try_insert_with<E, F>(&self, k: &K, f: F) -> Result<Arc<V>, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        if let Some(v) = self.items.borrow().get(k) {
            return Ok(Arc::clone(v));
        }

        let v = Arc::new(f()?);

        Ok(Arc::clone(
            self.items.borrow_mut().entry(k.clone()).or_insert(v),
        ))
    }
}

impl<K, V> Default for Memo<K, V>
where
    K: Hash + Eq + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::Memo;

    #[test]
    fn test_compute_once_per_key() {
        let memo: Memo<u32, u32> = Memo::new();
        let mut runs = 0;

        for _ in 0..3 {
            let v = memo
                .get_or_try_insert_with::<(), _>(&1, || {
                    runs += 1;
                    Ok(10)
                })
                .unwrap();
            assert_eq!(*v, 10);
        }

        assert_eq!(runs, 1);
    }

    #[test]
    fn test_failures_recompute() {
        let memo: Memo<u32, u32> = Memo::new();

        let first: Result<_, &str> = memo.get_or_try_insert_with(&1, || Err("nope"));
        assert!(first.is_err());

        let second = memo.get_or_try_insert_with::<&str, _>(&1, || Ok(10)).unwrap();
        assert_eq!(*second, 10);
    }

    #[test]
    fn test_reentrant_population() {
        let memo: Memo<u32, u32> = Memo::new();

        let v = memo
            .get_or_try_insert_with::<(), _>(&1, || {
                let inner = memo.get_or_try_insert_with::<(), _>(&2, || Ok(20))?;
                Ok(*inner + 1)
            })
            .unwrap();

        assert_eq!(*v, 21);
    }
}
