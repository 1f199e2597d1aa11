//! stl-core: the container core of a generic-containers library. A raw
//! allocation layer, a red-black tree engine, an open-chaining hash table
//! engine, and the ordered and unordered containers built on them.
//!
//! Internal Design:
//!
//! Summary
//! - Layers:
//!   - `alloc` / `construct` / `uninit`: storage acquisition kept apart
//!     from object lifetime. `RawBuf` owns a block, never the values in it;
//!     bulk construction into a block is all-or-nothing.
//!   - `rb_tree::RbTree<Tr, C>`: ordered engine. Unique and multi inserts,
//!     bound queries, in-order iteration both ways.
//!   - `hashtable::HashTable<Tr, S, E, A>`: hashed engine. Prime bucket
//!     counts, load-factor driven growth, per-bucket iteration.
//!   - `set`, `map`, `unordered_set`, `unordered_map`: thin wrappers that
//!     pick the value traits (`Identity` or `PairKey`) and the duplicate
//!     policy.
//! - Both engines are parameterized by a `ValueTraits` type that says how
//!   to pull the key out of a stored value, so one engine serves sets and
//!   maps alike.
//!
//! Constraints
//! - Nodes live in a `slotmap` arena and are addressed by generational
//!   `Handle`s. A handle stays valid until its entry is erased; after that
//!   it resolves to `None`, never to another entry.
//! - The past-the-end position is `None`. Stepping back from it yields the
//!   last element.
//! - Unique inserts never fail loudly on a duplicate: the value comes back
//!   in `Rejected` together with the handle of the entry that won.
//! - Single-owner, no internal synchronization. The containers are
//!   `Send`/`Sync` exactly when their parts are.
//!
//! Hasher and rehashing invariants
//! - Each chain node stores the full `u64` hash computed at insertion.
//!   Rehashing relinks nodes by the stored hash and never calls the hasher
//!   or the key-equality predicate, so a bucket array replacement cannot
//!   observe user code or fail halfway.
//! - Every entry sits in bucket `hash % bucket_count`; equivalent keys are
//!   adjacent within their chain.
//! - A bucket array that cannot be allocated leaves the table exactly as it
//!   was. The `try_*` methods report that as `Error::Alloc`; the plain
//!   methods panic with the same message.
//!
//! Errors
//! - `Error` covers allocation failure, oversize requests, out-of-range
//!   access and a rejected load factor. Broken preconditions are
//!   `debug_assert!`s.
//!
//! Notes and non-goals
//! - No dynamic array, deque, list, string, adaptors or algorithm library.
//! - Tree nodes are not allocated through `Allocator`; the hash table's
//!   bucket array is.
//! - `check_invariants` on both engines is public so tests outside the
//!   crate can validate structure after arbitrary operation sequences.

pub mod alloc;
pub mod construct;
pub mod error;
pub mod functional;
pub mod hashtable;
mod hashtable_proptest;
pub mod map;
mod primes;
pub mod rb_tree;
mod rb_tree_proptest;
pub mod set;
pub mod uninit;
pub mod unordered_map;
pub mod unordered_set;
pub mod value_traits;

// Public surface
pub use alloc::{max_len, Allocator, Global, RawBuf};
pub use error::{AllocError, Error, Rejected};
pub use functional::{Compare, CompareFn, EqualTo, Greater, KeyEqual, Less};
pub use hashtable::HashTable;
pub use map::OrderedMap;
pub use rb_tree::RbTree;
pub use set::{OrderedMultiSet, OrderedSet};
pub use unordered_map::UnorderedMap;
pub use unordered_set::{UnorderedMultiSet, UnorderedSet};
pub use value_traits::{Identity, PairKey, ValueTraits};
