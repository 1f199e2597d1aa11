//! HashTable: unordered storage engine behind `UnorderedSet`, `UnorderedMultiSet` and
//! `UnorderedMap`.
//!
//! Summary
//! - Separate chaining. The bucket array is an allocation record of chain heads; chain nodes live
//!   in a generational arena and carry their full 64-bit hash next to the value.
//! - Bucket counts come from a fixed prime table. A rehash relinks existing nodes into a fresh
//!   bucket array; values are never moved, cloned or rehashed, so the only thing that can fail is
//!   the bucket array allocation, and then the table is left exactly as it was.
//! - Entries with equivalent keys are kept adjacent in their chain, so a multi-key lookup is a
//!   single contiguous run.
//!
//! Positions
//! - A [`Handle`] names one entry and survives rehashes and unrelated erasures.
//! - Table order is ascending bucket index, then chain order. The position after the last entry of
//!   a bucket is the head of the next non-empty bucket; past-the-end is `None`.

use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use core::marker::PhantomData;
use core::mem;
use std::collections::hash_map::RandomState;

use slotmap::SlotMap;

use crate::alloc::{Allocator, Global, RawBuf};
use crate::error::{Error, Rejected, ResultExt};
use crate::functional::{EqualTo, KeyEqual};
use crate::primes::{max_prime, next_prime};
use crate::uninit::uninitialized_fill;
use crate::value_traits::{MappedMut, ValueTraits};

slotmap::new_key_type! {
    struct ChainKey;
}

/// Bucket hint used by `Default`; rounds up to 101 buckets.
pub const DEFAULT_BUCKET_HINT: usize = 100;
pub const DEFAULT_MAX_LOAD_FACTOR: f32 = 1.0;

/// Stable position of an entry in a [`HashTable`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Handle(ChainKey);

pub type InsertResult<T> = Result<Handle, Rejected<Handle, T>>;

struct ChainNode<T> {
    next: Option<ChainKey>,
    hash: u64,
    value: T,
}

type Nodes<T> = SlotMap<ChainKey, ChainNode<T>>;
type Buckets<A> = RawBuf<Option<ChainKey>, A>;

#[inline]
fn index_for(hash: u64, bucket_count: usize) -> usize {
    (hash % bucket_count as u64) as usize
}

/// Allocates `n` empty chain heads.
fn new_buckets<A: Allocator>(n: usize, alloc: A) -> Result<Buckets<A>, Error> {
    let mut buf = RawBuf::try_new_in(n, alloc)?;
    uninitialized_fill(buf.slots_mut(), &None);
    Ok(buf)
}

/// First non-empty chain head at or after bucket `from`.
fn head_from(heads: &[Option<ChainKey>], from: usize) -> Option<ChainKey> {
    heads.get(from..)?.iter().find_map(|h| *h)
}

/// The table position after `k`.
fn next_position<T>(nodes: &Nodes<T>, heads: &[Option<ChainKey>], k: ChainKey) -> Option<ChainKey> {
    let node = &nodes[k];
    node.next
        .or_else(|| head_from(heads, index_for(node.hash, heads.len()) + 1))
}

/// Structural defects reported by [`HashTable::check_invariants`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum InvariantError {
    #[error("entry with hash {hash:#x} sits in bucket {found}, expected {expected}")]
    WrongBucket { hash: u64, found: usize, expected: usize },
    #[error("cached hash no longer matches the key")]
    StaleHash,
    #[error("entries with equivalent keys are not adjacent in bucket {bucket}")]
    SplitRun { bucket: usize },
    #[error("reachable entries ({reachable}) differ from len ({len})")]
    LengthMismatch { reachable: usize, len: usize },
}

/// Open-chaining hash table over values described by `Tr`, keyed on `Tr::Key`.
pub struct HashTable<Tr: ValueTraits, S = RandomState, E = EqualTo, A: Allocator = Global> {
    nodes: Nodes<Tr::Value>,
    buckets: Buckets<A>,
    max_load_factor: f32,
    hasher: S,
    key_eq: E,
    _traits: PhantomData<fn() -> Tr>,
}

impl<Tr: ValueTraits> HashTable<Tr> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table with at least `bucket_hint` buckets (rounded up to the next tabled prime).
    pub fn with_bucket_hint(bucket_hint: usize) -> Self {
        Self::with_parts(bucket_hint, RandomState::new(), EqualTo, Global)
    }
}

impl<Tr, S, E, A> Default for HashTable<Tr, S, E, A>
where
    Tr: ValueTraits,
    S: Default,
    E: Default,
    A: Allocator + Clone + Default,
{
    fn default() -> Self {
        Self::with_parts(DEFAULT_BUCKET_HINT, S::default(), E::default(), A::default())
    }
}

impl<Tr: ValueTraits, S, E, A: Allocator + Clone> HashTable<Tr, S, E, A> {
    /// Builds an empty table with `next_prime(bucket_hint)` buckets.
    ///
    /// # Errors
    /// [`Error::Alloc`] if the bucket array cannot be allocated.
    pub fn try_with_parts(bucket_hint: usize, hasher: S, key_eq: E, alloc: A) -> Result<Self, Error> {
        Ok(HashTable {
            nodes: SlotMap::with_key(),
            buckets: new_buckets(next_prime(bucket_hint), alloc)?,
            max_load_factor: DEFAULT_MAX_LOAD_FACTOR,
            hasher,
            key_eq,
            _traits: PhantomData,
        })
    }

    pub fn with_parts(bucket_hint: usize, hasher: S, key_eq: E, alloc: A) -> Self {
        Self::try_with_parts(bucket_hint, hasher, key_eq, alloc).throw()
    }

    #[inline]
    fn heads(&self) -> &[Option<ChainKey>] {
        // SAFETY: Every slot of the bucket array is initialized when it is allocated.
        unsafe { self.buckets.as_slice(self.buckets.capacity()) }
    }

    #[inline]
    fn heads_mut(&mut self) -> &mut [Option<ChainKey>] {
        let cap = self.buckets.capacity();
        // SAFETY: As in `heads`.
        unsafe { self.buckets.as_mut_slice(cap) }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Largest number of entries the arena can index.
    pub const fn max_len(&self) -> usize {
        u32::MAX as usize - 1
    }

    pub fn hasher(&self) -> &S {
        &self.hasher
    }

    pub fn key_eq(&self) -> &E {
        &self.key_eq
    }

    pub fn allocator(&self) -> &A {
        self.buckets.allocator()
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.capacity()
    }

    pub fn max_bucket_count(&self) -> usize {
        max_prime()
    }

    pub fn load_factor(&self) -> f32 {
        match self.bucket_count() {
            0 => 0.0,
            n => self.len() as f32 / n as f32,
        }
    }

    pub fn max_load_factor(&self) -> f32 {
        self.max_load_factor
    }

    /// Sets the growth threshold. Takes effect at the next insert or rehash.
    ///
    /// # Errors
    /// [`Error::InvalidLoadFactor`] unless `ml` is finite and positive.
    pub fn set_max_load_factor(&mut self, ml: f32) -> Result<(), Error> {
        if !(ml.is_finite() && ml > 0.0) {
            return Err(Error::InvalidLoadFactor(ml));
        }
        self.max_load_factor = ml;
        Ok(())
    }

    /// Iterates the entries of bucket `n` in chain order.
    ///
    /// # Errors
    /// [`Error::IndexOutOfRange`] if `n >= bucket_count()`.
    pub fn bucket_iter(&self, n: usize) -> Result<LocalIter<'_, Tr::Value>, Error> {
        match self.heads().get(n) {
            Some(&head) => Ok(LocalIter {
                nodes: &self.nodes,
                cur: head,
            }),
            None => Err(Error::IndexOutOfRange {
                index: n,
                len: self.bucket_count(),
            }),
        }
    }

    pub fn bucket_len(&self, n: usize) -> Result<usize, Error> {
        self.bucket_iter(n).map(Iterator::count)
    }

    pub fn get(&self, h: Handle) -> Option<&Tr::Value> {
        self.nodes.get(h.0).map(|n| &n.value)
    }

    /// Mutable access to the non-key part of an entry.
    pub fn mapped_mut(&mut self, h: Handle) -> Option<&mut Tr::Mapped>
    where
        Tr: MappedMut,
    {
        self.nodes.get_mut(h.0).map(|n| Tr::mapped_mut(&mut n.value))
    }

    pub fn first(&self) -> Option<Handle> {
        head_from(self.heads(), 0).map(Handle)
    }

    /// The position after `h`; `None` is past-the-end (also for a stale handle).
    pub fn successor(&self, h: Handle) -> Option<Handle> {
        if !self.nodes.contains_key(h.0) {
            return None;
        }
        next_position(&self.nodes, self.heads(), h.0).map(Handle)
    }

    pub fn iter(&self) -> Iter<'_, Tr::Value> {
        Iter {
            nodes: &self.nodes,
            heads: self.heads(),
            cur: head_from(self.heads(), 0),
            end: None,
        }
    }

    /// Iterates the half-open position range `[from, to)`. `to` must be reachable from `from`.
    /// An erased handle at either end yields an empty range.
    pub fn range(&self, from: Option<Handle>, to: Option<Handle>) -> Iter<'_, Tr::Value> {
        let live = |h: Handle| self.nodes.contains_key(h.0);
        let cur = match to {
            Some(h) if !live(h) => None,
            _ => from.filter(|&h| live(h)).map(|h| h.0),
        };
        Iter {
            nodes: &self.nodes,
            heads: self.heads(),
            cur,
            end: to.map(|h| h.0),
        }
    }

    /// Removes the entry at `h` and returns its value. Other handles stay valid.
    pub fn erase(&mut self, h: Handle) -> Option<Tr::Value> {
        let node = self.nodes.get(h.0)?;
        let (next, idx) = (node.next, index_for(node.hash, self.bucket_count()));
        if self.heads()[idx] == Some(h.0) {
            self.heads_mut()[idx] = next;
        } else {
            let mut cur = self.heads()[idx];
            while let Some(k) = cur {
                if self.nodes[k].next == Some(h.0) {
                    self.nodes[k].next = next;
                    break;
                }
                cur = self.nodes[k].next;
            }
        }
        self.nodes.remove(h.0).map(|n| n.value)
    }

    /// Removes every entry in `[from, to)` and returns how many were removed.
    pub fn erase_range(&mut self, from: Option<Handle>, to: Option<Handle>) -> usize {
        if from == self.first() && to.is_none() {
            let n = self.len();
            self.clear();
            return n;
        }
        let mut removed = 0;
        let mut cur = from;
        while let Some(h) = cur {
            if cur == to {
                break;
            }
            cur = self.successor(h);
            if self.erase(h).is_some() {
                removed += 1;
            }
        }
        removed
    }

    /// Drops every entry. The bucket array keeps its size.
    pub fn clear(&mut self) {
        log::trace!(
            "hashtable: clearing {} entries from {} buckets",
            self.len(),
            self.bucket_count()
        );
        self.heads_mut().fill(None);
        self.nodes.clear();
    }

    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(self, other);
    }

    /// Moves the contents out. The table left behind is empty, owns no bucket array and allocates
    /// one on the next insert.
    pub fn take(&mut self) -> Self
    where
        S: Clone,
        E: Clone,
    {
        let empty = HashTable {
            nodes: SlotMap::with_key(),
            buckets: RawBuf::new_in(self.allocator().clone()),
            max_load_factor: self.max_load_factor,
            hasher: self.hasher.clone(),
            key_eq: self.key_eq.clone(),
            _traits: PhantomData,
        };
        mem::replace(self, empty)
    }

    /// Rehash policy: grow whenever the tabled prime for `count` is larger than the current
    /// bucket count; shrink only when that both relieves the load by a clear margin and saves at
    /// least a quarter of the buckets.
    ///
    /// # Errors
    /// [`Error::Alloc`] if the new bucket array cannot be allocated; the table is unchanged.
    pub fn try_rehash(&mut self, count: usize) -> Result<(), Error> {
        let n = next_prime(count);
        let current = self.bucket_count();
        let grow = n > current;
        let shrink = (self.len() as f32 / n as f32) < self.max_load_factor - 0.25
            && (n as f32) < current as f32 * 0.75;
        if grow || shrink {
            self.replace_buckets(n)?;
        }
        Ok(())
    }

    pub fn rehash(&mut self, count: usize) {
        self.try_rehash(count).throw()
    }

    /// Makes room for `count` entries without exceeding the max load factor.
    pub fn try_reserve(&mut self, count: usize) -> Result<(), Error> {
        self.try_rehash((count as f32 / self.max_load_factor + 0.5) as usize)
    }

    pub fn reserve(&mut self, count: usize) {
        self.try_reserve(count).throw()
    }

    /// Rehashes ahead of `extra` more inserts if they would push the load past the maximum.
    pub(crate) fn try_grow_for(&mut self, extra: usize) -> Result<(), Error> {
        let max = self.max_len();
        let want = match self.len().checked_add(extra) {
            Some(want) if want <= max => want,
            _ => {
                return Err(Error::Length {
                    requested: self.len().saturating_add(extra),
                    max,
                })
            }
        };
        if want as f32 > self.bucket_count() as f32 * self.max_load_factor {
            self.try_rehash((want as f32 / self.max_load_factor).ceil() as usize)?;
        }
        Ok(())
    }

    pub(crate) fn grow_for(&mut self, extra: usize) {
        self.try_grow_for(extra).throw()
    }

    /// Relinks every node into a fresh array of `n` buckets using the cached hashes.
    ///
    /// No user code runs here. Runs of equivalent keys are adjacent and share a hash, so each
    /// node that follows a same-hash node moving to the same bucket is linked right behind it;
    /// everything else is pushed on the front of its new chain.
    fn replace_buckets(&mut self, n: usize) -> Result<(), Error> {
        let mut fresh = new_buckets(n, self.allocator().clone())?;
        log::debug!(
            "hashtable: replacing {} buckets with {} ({} entries)",
            self.bucket_count(),
            n,
            self.len()
        );
        {
            // SAFETY: `new_buckets` initialized all `n` heads.
            let new_heads = unsafe { fresh.as_mut_slice(n) };
            // SAFETY: As in `heads`; borrowed through the field so `nodes` stays free.
            let old_heads = unsafe { self.buckets.as_slice(self.buckets.capacity()) };
            for &head in old_heads {
                let mut prev: Option<ChainKey> = None;
                let mut cur = head;
                while let Some(k) = cur {
                    cur = self.nodes[k].next;
                    let hash = self.nodes[k].hash;
                    let idx = index_for(hash, n);
                    match prev.filter(|&p| self.nodes[p].hash == hash) {
                        Some(p) => {
                            self.nodes[k].next = self.nodes[p].next;
                            self.nodes[p].next = Some(k);
                        }
                        None => {
                            self.nodes[k].next = new_heads[idx];
                            new_heads[idx] = Some(k);
                        }
                    }
                    prev = Some(k);
                }
            }
        }
        self.buckets = fresh;
        Ok(())
    }

    /// Links a new node at the front of its bucket.
    fn link_front(&mut self, hash: u64, value: Tr::Value) -> ChainKey {
        let idx = index_for(hash, self.bucket_count());
        let next = self.heads()[idx];
        let k = self.nodes.insert(ChainNode { next, hash, value });
        self.heads_mut()[idx] = Some(k);
        k
    }

    /// Links a new node directly after `prev`.
    fn link_after(&mut self, prev: ChainKey, hash: u64, value: Tr::Value) -> ChainKey {
        let next = self.nodes[prev].next;
        let k = self.nodes.insert(ChainNode { next, hash, value });
        self.nodes[prev].next = Some(k);
        k
    }
}

impl<Tr, S, E, A> HashTable<Tr, S, E, A>
where
    Tr: ValueTraits,
    Tr::Key: Hash,
    S: BuildHasher,
    E: KeyEqual<Tr::Key>,
    A: Allocator + Clone,
{
    #[inline]
    fn hash_of<Q: Hash + ?Sized>(&self, key: &Q) -> u64 {
        self.hasher.hash_one(key)
    }

    #[inline]
    fn matches<Q>(&self, k: ChainKey, hash: u64, key: &Q) -> bool
    where
        Tr::Key: Borrow<Q>,
        E: KeyEqual<Q>,
        Q: ?Sized,
    {
        let node = &self.nodes[k];
        node.hash == hash && KeyEqual::<Q>::equal(&self.key_eq, Tr::key(&node.value).borrow(), key)
    }

    /// First node of the run equivalent to `key` in its bucket, with that bucket's index.
    fn locate<Q>(&self, hash: u64, key: &Q) -> Option<(usize, ChainKey)>
    where
        Tr::Key: Borrow<Q>,
        E: KeyEqual<Q>,
        Q: ?Sized,
    {
        if self.bucket_count() == 0 {
            return None;
        }
        let idx = index_for(hash, self.bucket_count());
        let mut cur = self.heads()[idx];
        while let Some(k) = cur {
            if self.matches(k, hash, key) {
                return Some((idx, k));
            }
            cur = self.nodes[k].next;
        }
        None
    }

    /// The node after the run that starts at `first`, within the chain.
    fn run_end<Q>(&self, first: ChainKey, hash: u64, key: &Q) -> Option<ChainKey>
    where
        Tr::Key: Borrow<Q>,
        E: KeyEqual<Q>,
        Q: ?Sized,
    {
        let mut cur = self.nodes[first].next;
        while let Some(k) = cur {
            if !self.matches(k, hash, key) {
                break;
            }
            cur = self.nodes[k].next;
        }
        cur
    }

    /// Inserts `value` unless an equivalent key is present, in which case the value comes back
    /// together with the position of the existing entry.
    ///
    /// # Errors
    /// [`Error::Alloc`] or [`Error::Length`] if the table had to grow and could not; the table is
    /// unchanged and `value` is dropped.
    pub fn try_insert_unique(
        &mut self,
        value: Tr::Value,
    ) -> Result<InsertResult<Tr::Value>, Error> {
        let hash = self.hash_of(Tr::key(&value));
        if let Some((_, existing)) = self.locate(hash, Tr::key(&value)) {
            return Ok(Err(Rejected {
                existing: Handle(existing),
                value,
            }));
        }
        self.try_grow_for(1)?;
        Ok(Ok(Handle(self.link_front(hash, value))))
    }

    /// Inserts `value` right after any entries with an equivalent key.
    ///
    /// # Errors
    /// As [`HashTable::try_insert_unique`].
    pub fn try_insert_multi(&mut self, value: Tr::Value) -> Result<Handle, Error> {
        let hash = self.hash_of(Tr::key(&value));
        self.try_grow_for(1)?;
        let run = self.locate(hash, Tr::key(&value)).map(|(_, first)| {
            let mut last = first;
            while let Some(next) = self.nodes[last].next {
                if !self.matches(next, hash, Tr::key(&value)) {
                    break;
                }
                last = next;
            }
            last
        });
        let k = match run {
            Some(last) => self.link_after(last, hash, value),
            None => self.link_front(hash, value),
        };
        Ok(Handle(k))
    }

    pub fn insert_unique(&mut self, value: Tr::Value) -> InsertResult<Tr::Value> {
        self.try_insert_unique(value).throw()
    }

    pub fn insert_multi(&mut self, value: Tr::Value) -> Handle {
        self.try_insert_multi(value).throw()
    }

    pub fn insert(&mut self, value: Tr::Value, allow_duplicates: bool) -> InsertResult<Tr::Value> {
        if allow_duplicates {
            Ok(self.insert_multi(value))
        } else {
            self.insert_unique(value)
        }
    }

    /// Builds the value first; if that fails the table is untouched.
    pub fn try_insert_unique_with<X>(
        &mut self,
        make: impl FnOnce() -> Result<Tr::Value, X>,
    ) -> Result<InsertResult<Tr::Value>, X> {
        let value = make()?;
        Ok(self.insert_unique(value))
    }

    /// Builds the value first; if that fails the table is untouched.
    pub fn try_insert_multi_with<X>(
        &mut self,
        make: impl FnOnce() -> Result<Tr::Value, X>,
    ) -> Result<Handle, X> {
        let value = make()?;
        Ok(self.insert_multi(value))
    }

    /// Index of the bucket `key` hashes to.
    pub fn bucket<Q>(&self, key: &Q) -> usize
    where
        Tr::Key: Borrow<Q>,
        Q: Hash + ?Sized,
    {
        match self.bucket_count() {
            0 => 0,
            n => index_for(self.hash_of(key), n),
        }
    }

    pub fn find<Q>(&self, key: &Q) -> Option<Handle>
    where
        Tr::Key: Borrow<Q>,
        E: KeyEqual<Q>,
        Q: Hash + ?Sized,
    {
        self.locate(self.hash_of(key), key).map(|(_, k)| Handle(k))
    }

    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        Tr::Key: Borrow<Q>,
        E: KeyEqual<Q>,
        Q: Hash + ?Sized,
    {
        self.find(key).is_some()
    }

    pub fn count<Q>(&self, key: &Q) -> usize
    where
        Tr::Key: Borrow<Q>,
        E: KeyEqual<Q>,
        Q: Hash + ?Sized,
    {
        let (from, to) = self.equal_range(key);
        self.range(from, to).count()
    }

    /// The run of entries equivalent to `key`. The end is the next entry in table order, which
    /// may be the head of a later bucket. An absent key yields an empty range.
    pub fn equal_range<Q>(&self, key: &Q) -> (Option<Handle>, Option<Handle>)
    where
        Tr::Key: Borrow<Q>,
        E: KeyEqual<Q>,
        Q: Hash + ?Sized,
    {
        let hash = self.hash_of(key);
        let Some((idx, first)) = self.locate(hash, key) else {
            return (None, None);
        };
        let end = self
            .run_end(first, hash, key)
            .or_else(|| head_from(self.heads(), idx + 1));
        (Some(Handle(first)), end.map(Handle))
    }

    /// Removes every entry equivalent to `key` and returns how many were removed.
    pub fn erase_key<Q>(&mut self, key: &Q) -> usize
    where
        Tr::Key: Borrow<Q>,
        E: KeyEqual<Q>,
        Q: Hash + ?Sized,
    {
        let hash = self.hash_of(key);
        let Some((idx, first)) = self.locate(hash, key) else {
            return 0;
        };
        let after = self.run_end(first, hash, key);

        // All key comparisons are done; only relinking from here on.
        if self.heads()[idx] == Some(first) {
            self.heads_mut()[idx] = after;
        } else {
            let mut cur = self.heads()[idx];
            while let Some(k) = cur {
                if self.nodes[k].next == Some(first) {
                    self.nodes[k].next = after;
                    break;
                }
                cur = self.nodes[k].next;
            }
        }
        let mut doomed = Vec::new();
        let mut cur = Some(first);
        while cur != after {
            let Some(k) = cur else { break };
            cur = self.nodes[k].next;
            doomed.extend(self.nodes.remove(k).map(|n| n.value));
        }
        doomed.len()
    }

    /// Same length and every entry has an equal counterpart under the same key.
    pub fn eq_unique(&self, other: &Self) -> bool
    where
        Tr::Value: PartialEq,
    {
        self.len() == other.len()
            && self.iter().all(|v| {
                other
                    .find(Tr::key(v))
                    .and_then(|h| other.get(h))
                    .is_some_and(|w| w == v)
            })
    }

    /// Same length and, for every key, the two runs of equivalent entries are permutations of
    /// each other.
    pub fn eq_multi(&self, other: &Self) -> bool
    where
        Tr::Value: PartialEq,
    {
        if self.len() != other.len() {
            return false;
        }
        let mut pos = self.first();
        while let Some(h) = pos {
            let Some(v) = self.get(h) else { return false };
            let key = Tr::key(v);
            let (a0, a1) = self.equal_range(key);
            let (b0, b1) = other.equal_range(key);
            let ours: Vec<&Tr::Value> = self.range(a0, a1).collect();
            let theirs: Vec<&Tr::Value> = other.range(b0, b1).collect();
            if !is_permutation(&ours, &theirs) {
                return false;
            }
            pos = a1;
        }
        true
    }

    /// Verifies bucket placement, cached hashes, run adjacency and the entry count.
    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        let n = self.bucket_count();
        let mut reachable = 0;
        for (bucket, &head) in self.heads().iter().enumerate() {
            let chain: Vec<ChainKey> =
                core::iter::successors(head, |&k| self.nodes[k].next).collect();
            for &k in &chain {
                let node = &self.nodes[k];
                if node.hash != self.hash_of(Tr::key(&node.value)) {
                    return Err(InvariantError::StaleHash);
                }
                let expected = index_for(node.hash, n);
                if expected != bucket {
                    return Err(InvariantError::WrongBucket {
                        hash: node.hash,
                        found: bucket,
                        expected,
                    });
                }
            }
            let same = |a: ChainKey, b: ChainKey| {
                let (a, b) = (&self.nodes[a], &self.nodes[b]);
                a.hash == b.hash
                    && KeyEqual::<Tr::Key>::equal(&self.key_eq, Tr::key(&a.value), Tr::key(&b.value))
            };
            let mut i = 0;
            while i < chain.len() {
                let mut j = i + 1;
                while j < chain.len() && same(chain[i], chain[j]) {
                    j += 1;
                }
                if chain[j..].iter().any(|&later| same(chain[i], later)) {
                    return Err(InvariantError::SplitRun { bucket });
                }
                i = j;
            }
            reachable += chain.len();
        }
        if reachable != self.len() {
            return Err(InvariantError::LengthMismatch {
                reachable,
                len: self.len(),
            });
        }
        Ok(())
    }
}

fn is_permutation<T: PartialEq>(a: &[T], b: &[T]) -> bool {
    a.len() == b.len()
        && a.iter().all(|x| {
            let want = a.iter().filter(|y| *y == x).count();
            b.iter().filter(|y| *y == x).count() == want
        })
}

impl<Tr, S, E, A> Clone for HashTable<Tr, S, E, A>
where
    Tr: ValueTraits,
    Tr::Value: Clone,
    S: Clone,
    E: Clone,
    A: Allocator + Clone,
{
    /// Copies the bucket layout and chain order exactly. If a value's `clone` panics, the partial
    /// copy is dropped with the unwinding and `self` is unaffected.
    fn clone(&self) -> Self {
        let n = self.bucket_count();
        let mut buckets = new_buckets(n, self.allocator().clone()).throw();
        let mut nodes: Nodes<Tr::Value> = SlotMap::with_capacity_and_key(self.len());
        {
            // SAFETY: `new_buckets` initialized all `n` heads.
            let heads = unsafe { buckets.as_mut_slice(n) };
            for (bucket, &head) in self.heads().iter().enumerate() {
                let mut tail: Option<ChainKey> = None;
                let mut cur = head;
                while let Some(k) = cur {
                    let src = &self.nodes[k];
                    let copy = nodes.insert(ChainNode {
                        next: None,
                        hash: src.hash,
                        value: src.value.clone(),
                    });
                    match tail {
                        None => heads[bucket] = Some(copy),
                        Some(t) => nodes[t].next = Some(copy),
                    }
                    tail = Some(copy);
                    cur = src.next;
                }
            }
        }
        HashTable {
            nodes,
            buckets,
            max_load_factor: self.max_load_factor,
            hasher: self.hasher.clone(),
            key_eq: self.key_eq.clone(),
            _traits: PhantomData,
        }
    }
}

impl<Tr, S, E, A> fmt::Debug for HashTable<Tr, S, E, A>
where
    Tr: ValueTraits,
    Tr::Value: fmt::Debug,
    A: Allocator + Clone,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// Forward iterator over a range of table positions.
pub struct Iter<'a, T> {
    nodes: &'a Nodes<T>,
    heads: &'a [Option<ChainKey>],
    cur: Option<ChainKey>,
    end: Option<ChainKey>,
}

impl<T> Clone for Iter<'_, T> {
    fn clone(&self) -> Self {
        Iter { ..*self }
    }
}

impl<T: fmt::Debug> fmt::Debug for Iter<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.clone()).finish()
    }
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        if self.cur == self.end {
            return None;
        }
        let k = self.cur?;
        self.cur = next_position(self.nodes, self.heads, k);
        Some(&self.nodes[k].value)
    }
}

impl<T> core::iter::FusedIterator for Iter<'_, T> {}

/// Iterator over a single bucket's chain.
pub struct LocalIter<'a, T> {
    nodes: &'a Nodes<T>,
    cur: Option<ChainKey>,
}

impl<T> Clone for LocalIter<'_, T> {
    fn clone(&self) -> Self {
        LocalIter { ..*self }
    }
}

impl<T: fmt::Debug> fmt::Debug for LocalIter<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.clone()).finish()
    }
}

impl<'a, T> Iterator for LocalIter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        let node = &self.nodes[self.cur?];
        self.cur = node.next;
        Some(&node.value)
    }
}

/// Owning iterator in table order.
pub struct IntoIter<T> {
    order: std::vec::IntoIter<ChainKey>,
    nodes: Nodes<T>,
}

impl<T> Iterator for IntoIter<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        let k = self.order.next()?;
        self.nodes.remove(k).map(|n| n.value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.order.size_hint()
    }
}

impl<T> ExactSizeIterator for IntoIter<T> {}

impl<Tr: ValueTraits, S, E, A: Allocator + Clone> IntoIterator for HashTable<Tr, S, E, A> {
    type Item = Tr::Value;
    type IntoIter = IntoIter<Tr::Value>;

    fn into_iter(self) -> IntoIter<Tr::Value> {
        let order: Vec<ChainKey> = self
            .heads()
            .iter()
            .flat_map(|&head| core::iter::successors(head, |&k| self.nodes[k].next))
            .collect();
        IntoIter {
            order: order.into_iter(),
            nodes: self.nodes,
        }
    }
}

impl<'a, Tr: ValueTraits, S, E, A: Allocator + Clone> IntoIterator for &'a HashTable<Tr, S, E, A> {
    type Item = &'a Tr::Value;
    type IntoIter = Iter<'a, Tr::Value>;

    fn into_iter(self) -> Iter<'a, Tr::Value> {
        self.iter()
    }
}
