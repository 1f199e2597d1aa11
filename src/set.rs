//! Ordered sets over the red-black tree engine.

use core::borrow::Borrow;
use core::fmt;
use core::ops::RangeBounds;

use crate::functional::{Compare, Less};
use crate::rb_tree::{Handle, InsertResult, IntoIter, Iter, RbTree};
use crate::value_traits::Identity;

/// Sorted set of unique values.
pub struct OrderedSet<T, C = Less> {
    pub(crate) tree: RbTree<Identity<T>, C>,
}

impl<T, C: Default> OrderedSet<T, C> {
    pub fn new() -> Self {
        Self {
            tree: RbTree::default(),
        }
    }
}

impl<T, C: Default> Default for OrderedSet<T, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, C> OrderedSet<T, C> {
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

    pub fn iter(&self) -> Iter<'_, T> {
        self.tree.iter()
    }

    pub fn first(&self) -> Option<&T> {
        self.tree.first().and_then(|h| self.tree.get(h))
    }

    pub fn last(&self) -> Option<&T> {
        self.tree.last().and_then(|h| self.tree.get(h))
    }

    pub fn get(&self, h: Handle) -> Option<&T> {
        self.tree.get(h)
    }

    /// Removes the value at `h`.
    pub fn erase(&mut self, h: Handle) -> Option<T> {
        self.tree.erase(h)
    }
}

impl<T, C: Compare<T>> OrderedSet<T, C> {
    /// Adds `value` unless an equivalent one is present; then `value` is handed back.
    pub fn insert(&mut self, value: T) -> InsertResult<T> {
        self.tree.insert_unique(value)
    }

    /// Like [`OrderedSet::insert`], starting the search next to `hint`.
    pub fn insert_hint(&mut self, hint: Option<Handle>, value: T) -> InsertResult<T> {
        self.tree.insert_unique_hint(hint, value)
    }

    pub fn find<Q>(&self, value: &Q) -> Option<Handle>
    where
        T: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        self.tree.find(value)
    }

    pub fn contains<Q>(&self, value: &Q) -> bool
    where
        T: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        self.tree.contains(value)
    }

    /// 0 or 1.
    pub fn count<Q>(&self, value: &Q) -> usize
    where
        T: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        usize::from(self.contains(value))
    }

    pub fn remove<Q>(&mut self, value: &Q) -> Option<T>
    where
        T: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        let h = self.tree.find(value)?;
        self.tree.erase(h)
    }

    /// The first value not less than `value`.
    pub fn lower_bound<Q>(&self, value: &Q) -> Option<&T>
    where
        T: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        self.tree.lower_bound(value).and_then(|h| self.tree.get(h))
    }

    /// The first value greater than `value`.
    pub fn upper_bound<Q>(&self, value: &Q) -> Option<&T>
    where
        T: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        self.tree.upper_bound(value).and_then(|h| self.tree.get(h))
    }

    pub fn range<Q, R>(&self, range: R) -> Iter<'_, T>
    where
        T: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
        R: RangeBounds<Q>,
    {
        self.tree.range_by(range)
    }
}

impl<T: Clone, C: Clone> Clone for OrderedSet<T, C> {
    fn clone(&self) -> Self {
        Self {
            tree: self.tree.clone(),
        }
    }
}

impl<T: PartialEq, C> PartialEq for OrderedSet<T, C> {
    fn eq(&self, other: &Self) -> bool {
        self.tree == other.tree
    }
}

impl<T: Eq, C> Eq for OrderedSet<T, C> {}

impl<T: fmt::Debug, C> fmt::Debug for OrderedSet<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<T, C: Compare<T> + Default> FromIterator<T> for OrderedSet<T, C> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

impl<T, C: Compare<T>> Extend<T> for OrderedSet<T, C> {
    /// Duplicates are dropped.
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            // Sorted input appends at the end without a descent.
            let _ = self.tree.insert_unique_hint(None, value);
        }
    }
}

impl<T, C> IntoIterator for OrderedSet<T, C> {
    type Item = T;
    type IntoIter = IntoIter<T>;

    fn into_iter(self) -> IntoIter<T> {
        self.tree.into_iter()
    }
}

impl<'a, T, C> IntoIterator for &'a OrderedSet<T, C> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Iter<'a, T> {
        self.iter()
    }
}

/// Sorted multiset: equivalent values are kept in insertion order.
pub struct OrderedMultiSet<T, C = Less> {
    pub(crate) tree: RbTree<Identity<T>, C>,
}

impl<T, C: Default> OrderedMultiSet<T, C> {
    pub fn new() -> Self {
        Self {
            tree: RbTree::default(),
        }
    }
}

impl<T, C: Default> Default for OrderedMultiSet<T, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, C> OrderedMultiSet<T, C> {
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

    pub fn iter(&self) -> Iter<'_, T> {
        self.tree.iter()
    }

    pub fn first(&self) -> Option<&T> {
        self.tree.first().and_then(|h| self.tree.get(h))
    }

    pub fn last(&self) -> Option<&T> {
        self.tree.last().and_then(|h| self.tree.get(h))
    }

    pub fn get(&self, h: Handle) -> Option<&T> {
        self.tree.get(h)
    }

    pub fn erase(&mut self, h: Handle) -> Option<T> {
        self.tree.erase(h)
    }
}

impl<T, C: Compare<T>> OrderedMultiSet<T, C> {
    pub fn insert(&mut self, value: T) -> Handle {
        self.tree.insert_multi(value)
    }

    pub fn insert_hint(&mut self, hint: Option<Handle>, value: T) -> Handle {
        self.tree.insert_multi_hint(hint, value)
    }

    /// The first of the values equivalent to `value`.
    pub fn find<Q>(&self, value: &Q) -> Option<Handle>
    where
        T: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        self.tree.find(value)
    }

    pub fn contains<Q>(&self, value: &Q) -> bool
    where
        T: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        self.tree.contains(value)
    }

    pub fn count<Q>(&self, value: &Q) -> usize
    where
        T: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        self.tree.count(value)
    }

    /// Every value equivalent to `value`, in insertion order.
    pub fn equal_range<Q>(&self, value: &Q) -> Iter<'_, T>
    where
        T: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        let (from, to) = self.tree.equal_range(value);
        self.tree.range(from, to)
    }

    /// Removes the earliest value equivalent to `value`.
    pub fn remove_one<Q>(&mut self, value: &Q) -> Option<T>
    where
        T: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        let h = self.tree.find(value)?;
        self.tree.erase(h)
    }

    /// Removes every value equivalent to `value`; returns how many there were.
    pub fn remove_all<Q>(&mut self, value: &Q) -> usize
    where
        T: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        self.tree.erase_key(value)
    }

    pub fn lower_bound<Q>(&self, value: &Q) -> Option<&T>
    where
        T: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        self.tree.lower_bound(value).and_then(|h| self.tree.get(h))
    }

    pub fn upper_bound<Q>(&self, value: &Q) -> Option<&T>
    where
        T: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        self.tree.upper_bound(value).and_then(|h| self.tree.get(h))
    }

    pub fn range<Q, R>(&self, range: R) -> Iter<'_, T>
    where
        T: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
        R: RangeBounds<Q>,
    {
        self.tree.range_by(range)
    }
}

impl<T: Clone, C: Clone> Clone for OrderedMultiSet<T, C> {
    fn clone(&self) -> Self {
        Self {
            tree: self.tree.clone(),
        }
    }
}

impl<T: PartialEq, C> PartialEq for OrderedMultiSet<T, C> {
    fn eq(&self, other: &Self) -> bool {
        self.tree == other.tree
    }
}

impl<T: Eq, C> Eq for OrderedMultiSet<T, C> {}

impl<T: fmt::Debug, C> fmt::Debug for OrderedMultiSet<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T, C: Compare<T> + Default> FromIterator<T> for OrderedMultiSet<T, C> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

impl<T, C: Compare<T>> Extend<T> for OrderedMultiSet<T, C> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            self.tree.insert_multi_hint(None, value);
        }
    }
}

impl<T, C> IntoIterator for OrderedMultiSet<T, C> {
    type Item = T;
    type IntoIter = IntoIter<T>;

    fn into_iter(self) -> IntoIter<T> {
        self.tree.into_iter()
    }
}

impl<'a, T, C> IntoIterator for &'a OrderedMultiSet<T, C> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Iter<'a, T> {
        self.iter()
    }
}
