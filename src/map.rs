//! OrderedMap: sorted key-value map over the red-black tree engine.

use core::borrow::Borrow;
use core::fmt;
use core::ops::{Index, RangeBounds};

use crate::error::{Error, ResultExt};
use crate::functional::{Compare, Less};
use crate::rb_tree::{self, Handle, InsertResult, RbTree};
use crate::value_traits::PairKey;

/// Sorted map with unique keys.
pub struct OrderedMap<K, V, C = Less> {
    pub(crate) tree: RbTree<PairKey<K, V>, C>,
}

impl<K, V, C: Default> OrderedMap<K, V, C> {
    pub fn new() -> Self {
        Self {
            tree: RbTree::default(),
        }
    }
}

impl<K, V, C: Default> Default for OrderedMap<K, V, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, C> OrderedMap<K, V, C> {
    pub fn with_compare(cmp: C) -> Self {
        Self {
            tree: RbTree::with_compare(cmp),
        }
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    pub fn clear(&mut self) {
        self.tree.clear()
    }

    pub fn swap(&mut self, other: &mut Self) {
        self.tree.swap(&mut other.tree)
    }

    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter(self.tree.iter())
    }

    pub fn keys(&self) -> impl DoubleEndedIterator<Item = &K> + '_ {
        self.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl DoubleEndedIterator<Item = &V> + '_ {
        self.iter().map(|(_, v)| v)
    }

    pub fn first(&self) -> Option<(&K, &V)> {
        self.tree.first().and_then(|h| self.entry_at(h))
    }

    pub fn last(&self) -> Option<(&K, &V)> {
        self.tree.last().and_then(|h| self.entry_at(h))
    }

    pub fn entry_at(&self, h: Handle) -> Option<(&K, &V)> {
        self.tree.get(h).map(|(k, v)| (k, v))
    }

    pub fn value_at_mut(&mut self, h: Handle) -> Option<&mut V> {
        self.tree.mapped_mut(h)
    }

    pub fn erase(&mut self, h: Handle) -> Option<(K, V)> {
        self.tree.erase(h)
    }
}

impl<K, V, C: Compare<K>> OrderedMap<K, V, C> {
    /// Adds the entry unless the key is present; then the pair is handed back untouched.
    pub fn insert(&mut self, key: K, value: V) -> InsertResult<(K, V)> {
        self.tree.insert_unique((key, value))
    }

    /// Adds the entry, or overwrites the value of the existing one and returns the old value.
    pub fn insert_or_assign(&mut self, key: K, value: V) -> Option<V> {
        match self.tree.insert_unique((key, value)) {
            Ok(_) => None,
            Err(rejected) => {
                let slot = self.tree.mapped_mut(rejected.existing)?;
                Some(core::mem::replace(slot, rejected.value.1))
            }
        }
    }

    pub fn find<Q>(&self, key: &Q) -> Option<Handle>
    where
        K: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        self.tree.find(key)
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        self.tree.contains(key)
    }

    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        self.tree.find(key).and_then(|h| self.tree.get(h)).map(|e| &e.1)
    }

    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        let h = self.tree.find(key)?;
        self.tree.mapped_mut(h)
    }

    /// Checked access.
    ///
    /// # Errors
    /// [`Error::KeyNotFound`] if no entry has an equivalent key.
    pub fn at<Q>(&self, key: &Q) -> Result<&V, Error>
    where
        K: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        self.get(key).ok_or(Error::KeyNotFound)
    }

    pub fn at_mut<Q>(&mut self, key: &Q) -> Result<&mut V, Error>
    where
        K: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        self.get_mut(key).ok_or(Error::KeyNotFound)
    }

    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        self.remove_entry(key).map(|(_, v)| v)
    }

    pub fn remove_entry<Q>(&mut self, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        let h = self.tree.find(key)?;
        self.tree.erase(h)
    }

    pub fn range<Q, R>(&self, range: R) -> Iter<'_, K, V>
    where
        K: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
        R: RangeBounds<Q>,
    {
        Iter(self.tree.range_by(range))
    }
}

impl<K, V, C, Q> Index<&Q> for OrderedMap<K, V, C>
where
    K: Borrow<Q>,
    C: Compare<K> + Compare<Q>,
    Q: ?Sized,
{
    type Output = V;

    /// Panics if the key is absent.
    fn index(&self, key: &Q) -> &V {
        self.at(key).throw()
    }
}

impl<K: Clone, V: Clone, C: Clone> Clone for OrderedMap<K, V, C> {
    fn clone(&self) -> Self {
        Self {
            tree: self.tree.clone(),
        }
    }
}

impl<K: PartialEq, V: PartialEq, C> PartialEq for OrderedMap<K, V, C> {
    fn eq(&self, other: &Self) -> bool {
        self.tree == other.tree
    }
}

impl<K: Eq, V: Eq, C> Eq for OrderedMap<K, V, C> {}

impl<K: fmt::Debug, V: fmt::Debug, C> fmt::Debug for OrderedMap<K, V, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V, C: Compare<K> + Default> FromIterator<(K, V)> for OrderedMap<K, V, C> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        map.extend(iter);
        map
    }
}

impl<K, V, C: Compare<K>> Extend<(K, V)> for OrderedMap<K, V, C> {
    /// Entries whose key is already present are dropped.
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for entry in iter {
            let _ = self.tree.insert_unique_hint(None, entry);
        }
    }
}

impl<K, V, C> IntoIterator for OrderedMap<K, V, C> {
    type Item = (K, V);
    type IntoIter = rb_tree::IntoIter<(K, V)>;

    fn into_iter(self) -> Self::IntoIter {
        self.tree.into_iter()
    }
}

impl<'a, K, V, C> IntoIterator for &'a OrderedMap<K, V, C> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Iter<'a, K, V> {
        self.iter()
    }
}

/// In-order iterator over `(&K, &V)`.
pub struct Iter<'a, K, V>(rb_tree::Iter<'a, (K, V)>);

impl<K, V> Clone for Iter<'_, K, V> {
    fn clone(&self) -> Self {
        Iter(self.0.clone())
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for Iter<'_, K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.clone()).finish()
    }
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(|(k, v)| (k, v))
    }
}

impl<K, V> DoubleEndedIterator for Iter<'_, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.0.next_back().map(|(k, v)| (k, v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_rejects_and_insert_or_assign_overwrites() {
        let mut m: OrderedMap<String, u32> = OrderedMap::new();
        m.insert("b".into(), 2).unwrap();
        m.insert("a".into(), 1).unwrap();
        let rejected = m.insert("a".into(), 10).unwrap_err();
        assert_eq!(rejected.value, ("a".to_string(), 10));
        assert_eq!(m["a"], 1);
        assert_eq!(m.insert_or_assign("a".into(), 10), Some(1));
        assert_eq!(m.insert_or_assign("c".into(), 3), None);
        assert_eq!(m.keys().map(String::as_str).collect::<Vec<_>>(), ["a", "b", "c"]);
        assert_eq!(m.values().copied().collect::<Vec<_>>(), [10, 2, 3]);
    }

    #[test]
    fn at_reports_missing_key() {
        let mut m: OrderedMap<u8, char> = [(1, 'x')].into_iter().collect();
        assert_eq!(m.at(&1), Ok(&'x'));
        assert_eq!(m.at(&2), Err(Error::KeyNotFound));
        *m.at_mut(&1).unwrap() = 'y';
        assert_eq!(m.get(&1), Some(&'y'));
        assert!(m.at_mut(&3).unwrap_err().is_out_of_range());
    }

    #[test]
    #[should_panic(expected = "key not found")]
    fn index_panics_on_missing_key() {
        let m: OrderedMap<u8, u8> = OrderedMap::new();
        let _value: u8 = m[&0u8];
    }

    #[test]
    fn range_and_remove() {
        let mut m: OrderedMap<i32, i32> = (0..10).map(|k| (k, k * k)).collect();
        let squares: Vec<i32> = m.range(3..6).map(|(_, v)| *v).collect();
        assert_eq!(squares, [9, 16, 25]);
        assert_eq!(m.remove(&4), Some(16));
        assert_eq!(m.remove_entry(&5), Some((5, 25)));
        assert_eq!(m.range(3..6).count(), 1);
        assert_eq!(m.first(), Some((&0, &0)));
        assert_eq!(m.last(), Some((&9, &81)));
        assert_eq!(format!("{:?}", m.range(..=1).collect::<Vec<_>>()), "[(0, 0), (1, 1)]");
    }
}
