//! UnorderedMap: hash map over the open-chaining engine.

use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use core::ops::Index;
use std::collections::hash_map::RandomState;

use crate::error::{Error, ResultExt};
use crate::functional::EqualTo;
use crate::hashtable::{self, HashTable, Handle, InsertResult};
use crate::value_traits::PairKey;

/// Hash map with unique keys.
pub struct UnorderedMap<K, V, S = RandomState> {
    pub(crate) table: HashTable<PairKey<K, V>, S, EqualTo>,
}

impl<K, V> UnorderedMap<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bucket_hint(bucket_hint: usize) -> Self {
        Self::with_bucket_hint_and_hasher(bucket_hint, RandomState::new())
    }
}

impl<K, V, S: Default> Default for UnorderedMap<K, V, S> {
    fn default() -> Self {
        Self {
            table: HashTable::default(),
        }
    }
}

impl<K, V, S> UnorderedMap<K, V, S> {
    pub fn with_hasher(hasher: S) -> Self {
        Self::with_bucket_hint_and_hasher(hashtable::DEFAULT_BUCKET_HINT, hasher)
    }

    pub fn with_bucket_hint_and_hasher(bucket_hint: usize, hasher: S) -> Self {
        Self {
            table: HashTable::with_parts(bucket_hint, hasher, EqualTo, Default::default()),
        }
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn clear(&mut self) {
        self.table.clear()
    }

    pub fn swap(&mut self, other: &mut Self) {
        self.table.swap(&mut other.table)
    }

    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter(self.table.iter())
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> + '_ {
        self.iter().map(|(_, v)| v)
    }

    pub fn entry_at(&self, h: Handle) -> Option<(&K, &V)> {
        self.table.get(h).map(|(k, v)| (k, v))
    }

    pub fn value_at_mut(&mut self, h: Handle) -> Option<&mut V> {
        self.table.mapped_mut(h)
    }

    pub fn erase(&mut self, h: Handle) -> Option<(K, V)> {
        self.table.erase(h)
    }

    pub fn hasher(&self) -> &S {
        self.table.hasher()
    }

    pub fn bucket_count(&self) -> usize {
        self.table.bucket_count()
    }

    pub fn max_bucket_count(&self) -> usize {
        self.table.max_bucket_count()
    }

    pub fn bucket_len(&self, n: usize) -> Result<usize, Error> {
        self.table.bucket_len(n)
    }

    /// Entries of bucket `n` in chain order.
    pub fn bucket_iter(&self, n: usize) -> Result<impl Iterator<Item = (&K, &V)> + '_, Error> {
        Ok(self.table.bucket_iter(n)?.map(|(k, v)| (k, v)))
    }

    pub fn load_factor(&self) -> f32 {
        self.table.load_factor()
    }

    pub fn max_load_factor(&self) -> f32 {
        self.table.max_load_factor()
    }

    pub fn set_max_load_factor(&mut self, ml: f32) -> Result<(), Error> {
        self.table.set_max_load_factor(ml)
    }

    pub fn rehash(&mut self, count: usize) {
        self.table.rehash(count)
    }

    pub fn try_rehash(&mut self, count: usize) -> Result<(), Error> {
        self.table.try_rehash(count)
    }

    pub fn reserve(&mut self, count: usize) {
        self.table.reserve(count)
    }

    pub fn try_reserve(&mut self, count: usize) -> Result<(), Error> {
        self.table.try_reserve(count)
    }
}

impl<K: Hash + Eq, V, S: BuildHasher> UnorderedMap<K, V, S> {
    /// Adds the entry unless the key is present; then the pair is handed back untouched.
    pub fn insert(&mut self, key: K, value: V) -> InsertResult<(K, V)> {
        self.table.insert_unique((key, value))
    }

    /// # Errors
    /// [`Error::Alloc`] if the table had to grow and could not; the pair is dropped.
    pub fn try_insert(&mut self, key: K, value: V) -> Result<InsertResult<(K, V)>, Error> {
        self.table.try_insert_unique((key, value))
    }

    /// Adds the entry, or overwrites the value of the existing one and returns the old value.
    pub fn insert_or_assign(&mut self, key: K, value: V) -> Option<V> {
        match self.table.insert_unique((key, value)) {
            Ok(_) => None,
            Err(rejected) => {
                let slot = self.table.mapped_mut(rejected.existing)?;
                Some(core::mem::replace(slot, rejected.value.1))
            }
        }
    }

    pub fn find<Q>(&self, key: &Q) -> Option<Handle>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.table.find(key)
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.table.contains(key)
    }

    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.table.find(key).and_then(|h| self.table.get(h)).map(|e| &e.1)
    }

    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let h = self.table.find(key)?;
        self.table.mapped_mut(h)
    }

    /// Checked access.
    ///
    /// # Errors
    /// [`Error::KeyNotFound`] if the key is absent.
    pub fn at<Q>(&self, key: &Q) -> Result<&V, Error>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get(key).ok_or(Error::KeyNotFound)
    }

    pub fn at_mut<Q>(&mut self, key: &Q) -> Result<&mut V, Error>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get_mut(key).ok_or(Error::KeyNotFound)
    }

    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.remove_entry(key).map(|(_, v)| v)
    }

    pub fn remove_entry<Q>(&mut self, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let h = self.table.find(key)?;
        self.table.erase(h)
    }

    pub fn bucket<Q>(&self, key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: Hash + ?Sized,
    {
        self.table.bucket(key)
    }
}

impl<K, V, S, Q> Index<&Q> for UnorderedMap<K, V, S>
where
    K: Hash + Eq + Borrow<Q>,
    S: BuildHasher,
    Q: Hash + Eq + ?Sized,
{
    type Output = V;

    /// Panics if the key is absent.
    fn index(&self, key: &Q) -> &V {
        self.at(key).throw()
    }
}

impl<K: Clone, V: Clone, S: Clone> Clone for UnorderedMap<K, V, S> {
    fn clone(&self) -> Self {
        Self {
            table: self.table.clone(),
        }
    }
}

impl<K: Hash + Eq, V: PartialEq, S: BuildHasher> PartialEq for UnorderedMap<K, V, S> {
    fn eq(&self, other: &Self) -> bool {
        self.table.eq_unique(&other.table)
    }
}

impl<K: Hash + Eq, V: Eq, S: BuildHasher> Eq for UnorderedMap<K, V, S> {}

impl<K: fmt::Debug, V: fmt::Debug, S> fmt::Debug for UnorderedMap<K, V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K: Hash + Eq, V, S: BuildHasher + Default> FromIterator<(K, V)> for UnorderedMap<K, V, S> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::default();
        map.extend(iter);
        map
    }
}

impl<K: Hash + Eq, V, S: BuildHasher> Extend<(K, V)> for UnorderedMap<K, V, S> {
    /// Entries whose key is already present are dropped.
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        let iter = iter.into_iter();
        self.table.grow_for(iter.size_hint().0);
        for entry in iter {
            let _ = self.table.insert_unique(entry);
        }
    }
}

impl<K, V, S> IntoIterator for UnorderedMap<K, V, S> {
    type Item = (K, V);
    type IntoIter = hashtable::IntoIter<(K, V)>;

    fn into_iter(self) -> Self::IntoIter {
        self.table.into_iter()
    }
}

impl<'a, K, V, S> IntoIterator for &'a UnorderedMap<K, V, S> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Iter<'a, K, V> {
        self.iter()
    }
}

/// Iterator over `(&K, &V)` in table order.
pub struct Iter<'a, K, V>(hashtable::Iter<'a, (K, V)>);

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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_get_assign_remove() {
        let mut m: UnorderedMap<&str, i32> = UnorderedMap::new();
        m.insert("one", 1).unwrap();
        assert!(m.insert("one", 11).is_err());
        assert_eq!(m.insert_or_assign("one", 11), Some(1));
        assert_eq!(m["one"], 11);
        *m.get_mut("one").unwrap() += 1;
        assert_eq!(m.at("one"), Ok(&12));
        assert_eq!(m.at("two"), Err(Error::KeyNotFound));
        assert_eq!(m.remove("one"), Some(12));
        assert!(m.is_empty());
    }

    #[test]
    fn equality_compares_values_per_key() {
        let a: UnorderedMap<u8, char> = [(1, 'a'), (2, 'b')].into_iter().collect();
        let mut b: UnorderedMap<u8, char> = [(2, 'b'), (1, 'a')].into_iter().collect();
        assert_eq!(a, b);
        b.insert_or_assign(2, 'z');
        assert_ne!(a, b);
    }

    #[test]
    fn bucket_api_sees_every_entry() {
        let m: UnorderedMap<u32, u32> = (0..300).map(|k| (k, k + 1)).collect();
        let total: usize = (0..m.bucket_count()).map(|b| m.bucket_len(b).unwrap()).sum();
        assert_eq!(total, 300);
        let b = m.bucket(&42);
        assert!(m.bucket_iter(b).unwrap().any(|(k, v)| *k == 42 && *v == 43));
        assert!(m.bucket_iter(m.bucket_count()).is_err());
    }
}
