//! Ordering and equality predicates consumed by the engines.

/// A strict weak ordering over `K`.
///
/// Two keys are equivalent when neither is less than the other; the tree derives key equality
/// from exactly that and never from `Eq`.
pub trait Compare<K: ?Sized> {
    fn less(&self, a: &K, b: &K) -> bool;

    #[inline]
    fn equivalent(&self, a: &K, b: &K) -> bool {
        !self.less(a, b) && !self.less(b, a)
    }
}

/// Ascending order via [`Ord`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Less;

impl<K: Ord + ?Sized> Compare<K> for Less {
    #[inline]
    fn less(&self, a: &K, b: &K) -> bool {
        a < b
    }
}

/// Descending order via [`Ord`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Greater;

impl<K: Ord + ?Sized> Compare<K> for Greater {
    #[inline]
    fn less(&self, a: &K, b: &K) -> bool {
        a > b
    }
}

/// Any `Fn(&K, &K) -> bool` closure is a comparator.
#[derive(Clone, Copy)]
pub struct CompareFn<F>(pub F);

impl<K: ?Sized, F: Fn(&K, &K) -> bool> Compare<K> for CompareFn<F> {
    #[inline]
    fn less(&self, a: &K, b: &K) -> bool {
        (self.0)(a, b)
    }
}

/// Key equality for the hash table. Must agree with the hasher: equal keys hash equally.
pub trait KeyEqual<K: ?Sized> {
    fn equal(&self, a: &K, b: &K) -> bool;
}

/// Equality via [`Eq`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EqualTo;

impl<K: Eq + ?Sized> KeyEqual<K> for EqualTo {
    #[inline]
    fn equal(&self, a: &K, b: &K) -> bool {
        a == b
    }
}
