//! Hash sets over the open-chaining engine.

use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use std::collections::hash_map::RandomState;

use crate::error::Error;
use crate::functional::EqualTo;
use crate::hashtable::{self, HashTable, Handle, InsertResult, Iter, LocalIter};
use crate::value_traits::Identity;

/// Set of unique values.
pub struct UnorderedSet<T, S = RandomState> {
    pub(crate) table: HashTable<Identity<T>, S, EqualTo>,
}

/// Multiset: equivalent values sit next to each other in insertion order.
pub struct UnorderedMultiSet<T, S = RandomState> {
    pub(crate) table: HashTable<Identity<T>, S, EqualTo>,
}

impl<T> UnorderedSet<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bucket_hint(bucket_hint: usize) -> Self {
        Self::with_bucket_hint_and_hasher(bucket_hint, RandomState::new())
    }
}

impl<T> UnorderedMultiSet<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bucket_hint(bucket_hint: usize) -> Self {
        Self::with_bucket_hint_and_hasher(bucket_hint, RandomState::new())
    }
}

impl<T, S: Default> Default for UnorderedSet<T, S> {
    fn default() -> Self {
        Self {
            table: HashTable::default(),
        }
    }
}

impl<T, S: Default> Default for UnorderedMultiSet<T, S> {
    fn default() -> Self {
        Self {
            table: HashTable::default(),
        }
    }
}

impl<T, S> UnorderedSet<T, S> {
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

    pub fn iter(&self) -> Iter<'_, T> {
        self.table.iter()
    }

    pub fn get_at(&self, h: Handle) -> Option<&T> {
        self.table.get(h)
    }

    pub fn erase(&mut self, h: Handle) -> Option<T> {
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

    pub fn bucket_iter(&self, n: usize) -> Result<LocalIter<'_, T>, Error> {
        self.table.bucket_iter(n)
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

impl<T, S> UnorderedMultiSet<T, S> {
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

    pub fn iter(&self) -> Iter<'_, T> {
        self.table.iter()
    }

    pub fn get_at(&self, h: Handle) -> Option<&T> {
        self.table.get(h)
    }

    pub fn erase(&mut self, h: Handle) -> Option<T> {
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

    pub fn bucket_iter(&self, n: usize) -> Result<LocalIter<'_, T>, Error> {
        self.table.bucket_iter(n)
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

impl<T: Hash + Eq, S: BuildHasher> UnorderedSet<T, S> {
    /// Adds `value` unless an equal one is present; then `value` is handed back.
    pub fn insert(&mut self, value: T) -> InsertResult<T> {
        self.table.insert_unique(value)
    }

    /// # Errors
    /// [`Error::Alloc`] if the table had to grow and could not; `value` is dropped.
    pub fn try_insert(&mut self, value: T) -> Result<InsertResult<T>, Error> {
        self.table.try_insert_unique(value)
    }

    pub fn find<Q>(&self, value: &Q) -> Option<Handle>
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.table.find(value)
    }

    pub fn get<Q>(&self, value: &Q) -> Option<&T>
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.table.find(value).and_then(|h| self.table.get(h))
    }

    pub fn contains<Q>(&self, value: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.table.contains(value)
    }

    /// 0 or 1.
    pub fn count<Q>(&self, value: &Q) -> usize
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        usize::from(self.contains(value))
    }

    pub fn remove<Q>(&mut self, value: &Q) -> Option<T>
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let h = self.table.find(value)?;
        self.table.erase(h)
    }

    pub fn bucket<Q>(&self, value: &Q) -> usize
    where
        T: Borrow<Q>,
        Q: Hash + ?Sized,
    {
        self.table.bucket(value)
    }
}

impl<T: Hash + Eq, S: BuildHasher> UnorderedMultiSet<T, S> {
    pub fn insert(&mut self, value: T) -> Handle {
        self.table.insert_multi(value)
    }

    /// # Errors
    /// [`Error::Alloc`] if the table had to grow and could not; `value` is dropped.
    pub fn try_insert(&mut self, value: T) -> Result<Handle, Error> {
        self.table.try_insert_multi(value)
    }

    pub fn find<Q>(&self, value: &Q) -> Option<Handle>
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.table.find(value)
    }

    pub fn contains<Q>(&self, value: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.table.contains(value)
    }

    pub fn count<Q>(&self, value: &Q) -> usize
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.table.count(value)
    }

    /// Every value equal to `value`, in insertion order.
    pub fn equal_range<Q>(&self, value: &Q) -> Iter<'_, T>
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let (from, to) = self.table.equal_range(value);
        self.table.range(from, to)
    }

    /// Removes the earliest value equal to `value`.
    pub fn remove_one<Q>(&mut self, value: &Q) -> Option<T>
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let h = self.table.find(value)?;
        self.table.erase(h)
    }

    /// Removes every value equal to `value`; returns how many there were.
    pub fn remove_all<Q>(&mut self, value: &Q) -> usize
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.table.erase_key(value)
    }

    pub fn bucket<Q>(&self, value: &Q) -> usize
    where
        T: Borrow<Q>,
        Q: Hash + ?Sized,
    {
        self.table.bucket(value)
    }
}

impl<T: Clone, S: Clone> Clone for UnorderedSet<T, S> {
    fn clone(&self) -> Self {
        Self {
            table: self.table.clone(),
        }
    }
}

impl<T: Clone, S: Clone> Clone for UnorderedMultiSet<T, S> {
    fn clone(&self) -> Self {
        Self {
            table: self.table.clone(),
        }
    }
}

impl<T: Hash + Eq, S: BuildHasher> PartialEq for UnorderedSet<T, S> {
    fn eq(&self, other: &Self) -> bool {
        self.table.eq_unique(&other.table)
    }
}

impl<T: Hash + Eq, S: BuildHasher> Eq for UnorderedSet<T, S> {}

impl<T: Hash + Eq, S: BuildHasher> PartialEq for UnorderedMultiSet<T, S> {
    fn eq(&self, other: &Self) -> bool {
        self.table.eq_multi(&other.table)
    }
}

impl<T: Hash + Eq, S: BuildHasher> Eq for UnorderedMultiSet<T, S> {}

impl<T: fmt::Debug, S> fmt::Debug for UnorderedSet<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<T: fmt::Debug, S> fmt::Debug for UnorderedMultiSet<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T: Hash + Eq, S: BuildHasher + Default> FromIterator<T> for UnorderedSet<T, S> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut set = Self::default();
        set.extend(iter);
        set
    }
}

impl<T: Hash + Eq, S: BuildHasher + Default> FromIterator<T> for UnorderedMultiSet<T, S> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut set = Self::default();
        set.extend(iter);
        set
    }
}

impl<T: Hash + Eq, S: BuildHasher> Extend<T> for UnorderedSet<T, S> {
    /// Grows once for the iterator's lower size bound; duplicates are dropped.
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        let iter = iter.into_iter();
        self.table.grow_for(iter.size_hint().0);
        for value in iter {
            let _ = self.table.insert_unique(value);
        }
    }
}

impl<T: Hash + Eq, S: BuildHasher> Extend<T> for UnorderedMultiSet<T, S> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        let iter = iter.into_iter();
        self.table.grow_for(iter.size_hint().0);
        for value in iter {
            self.table.insert_multi(value);
        }
    }
}

impl<T, S> IntoIterator for UnorderedSet<T, S> {
    type Item = T;
    type IntoIter = hashtable::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.table.into_iter()
    }
}

impl<T, S> IntoIterator for UnorderedMultiSet<T, S> {
    type Item = T;
    type IntoIter = hashtable::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.table.into_iter()
    }
}

impl<'a, T, S> IntoIterator for &'a UnorderedSet<T, S> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Iter<'a, T> {
        self.iter()
    }
}

impl<'a, T, S> IntoIterator for &'a UnorderedMultiSet<T, S> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Iter<'a, T> {
        self.iter()
    }
}
