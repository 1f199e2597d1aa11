//! How an engine finds the key inside a stored value.
//!
//! Sets store the key itself ([`Identity`]); maps store a `(key, mapped)` pair and key on the
//! first component ([`PairKey`]). Both engines are written once against [`ValueTraits`].

use core::marker::PhantomData;

pub trait ValueTraits {
    /// What a node stores.
    type Value;
    /// The part of the value the engine orders or hashes on.
    type Key;
    /// The part of the value callers may mutate in place. Equals `Key` for sets.
    type Mapped;

    fn key(value: &Self::Value) -> &Self::Key;

    fn mapped(value: &Self::Value) -> &Self::Mapped;
}

/// Marker for values that mutate their mapped part without touching the key.
pub trait MappedMut: ValueTraits {
    fn mapped_mut(value: &mut Self::Value) -> &mut Self::Mapped;
}

/// The value is its own key.
pub struct Identity<T>(PhantomData<fn() -> T>);

impl<T> ValueTraits for Identity<T> {
    type Value = T;
    type Key = T;
    type Mapped = T;

    #[inline]
    fn key(value: &T) -> &T {
        value
    }

    #[inline]
    fn mapped(value: &T) -> &T {
        value
    }
}

/// The value is a `(key, mapped)` pair.
pub struct PairKey<K, V>(PhantomData<fn() -> (K, V)>);

impl<K, V> ValueTraits for PairKey<K, V> {
    type Value = (K, V);
    type Key = K;
    type Mapped = V;

    #[inline]
    fn key(value: &(K, V)) -> &K {
        &value.0
    }

    #[inline]
    fn mapped(value: &(K, V)) -> &V {
        &value.1
    }
}

impl<K, V> MappedMut for PairKey<K, V> {
    #[inline]
    fn mapped_mut(value: &mut (K, V)) -> &mut V {
        &mut value.1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_and_pair_extraction() {
        assert_eq!(Identity::<u8>::key(&4), &4);
        let mut entry = ("k", 1);
        assert_eq!(PairKey::<&str, i32>::key(&entry), &"k");
        *PairKey::<&str, i32>::mapped_mut(&mut entry) += 1;
        assert_eq!(PairKey::<&str, i32>::mapped(&entry), &2);
    }
}
