// End-to-end scenarios over the public engines and containers.
//
// Each test states the behavior it verifies. Structural checks go through the
// public `check_invariants` on both engines.
use stl_core::rb_tree::RbTree;
use stl_core::{
    HashTable, Identity, OrderedMultiSet, OrderedSet, PairKey, UnorderedMultiSet, UnorderedSet,
};

// Test: unique tree keeps sorted order across an erase of the root key.
// Verifies: in-order traversal before and after; red-black shape stays valid.
#[test]
fn tree_insert_then_erase_middle_key() {
    let mut t: RbTree<Identity<i32>> = RbTree::default();
    for k in [5, 3, 8, 1, 4, 7, 9] {
        t.insert_unique(k).expect("fresh key");
    }
    assert_eq!(t.iter().copied().collect::<Vec<_>>(), [1, 3, 4, 5, 7, 8, 9]);
    t.check_invariants().expect("valid after inserts");

    assert_eq!(t.erase_key(&5), 1);
    assert_eq!(t.iter().copied().collect::<Vec<_>>(), [1, 3, 4, 7, 8, 9]);
    t.check_invariants().expect("valid after erase");
}

// Test: a small bucket hint rounds up to the first tabled prime and the set grows as needed.
// Verifies: size, load-factor bound, find hits and a miss.
#[test]
fn set_with_small_hint_holds_hundred_keys() {
    let mut s: UnorderedSet<u32> = UnorderedSet::with_bucket_hint(7);
    assert_eq!(s.bucket_count(), 101);
    for k in 0..100u32 {
        s.insert(k * 3).expect("distinct");
    }
    assert_eq!(s.len(), 100);
    assert!(s.load_factor() <= s.max_load_factor());
    for k in 0..100u32 {
        assert!(s.find(&(k * 3)).is_some(), "missing {}", k * 3);
    }
    assert!(s.find(&1).is_none());
    let per_bucket: usize = (0..s.bucket_count()).map(|b| s.bucket_len(b).unwrap()).sum();
    assert_eq!(per_bucket, 100);
}

// Test: duplicates allowed.
// Verifies: count after inserts and after erasing a single occurrence.
#[test]
fn multi_table_counts_duplicates() {
    let mut t: HashTable<Identity<char>> = HashTable::new();
    for k in ['A', 'B', 'A', 'C', 'A'] {
        t.insert(k, true).expect("multi insert never rejects");
    }
    assert_eq!(t.count(&'A'), 3);
    let h = t.find(&'A').expect("present");
    assert_eq!(t.erase(h), Some('A'));
    assert_eq!(t.count(&'A'), 2);
    assert_eq!(t.len(), 4);
}

// Test: the duplicate policy is the same on both engines.
// Verifies: unique rejection keeps the size; multi grows and equal_range spans two entries.
#[test]
fn duplicate_policy_on_both_engines() {
    let mut set = OrderedSet::<i32>::new();
    set.insert(1).unwrap();
    let rejected = set.insert(1).unwrap_err();
    assert_eq!(rejected.value, 1);
    assert_eq!(set.get(rejected.existing), Some(&1));
    assert_eq!(set.len(), 1);

    let mut multi = OrderedMultiSet::<i32>::new();
    multi.insert(1);
    multi.insert(1);
    assert_eq!(multi.len(), 2);
    assert_eq!(multi.equal_range(&1).count(), 2);

    let mut uset = UnorderedSet::<i32>::new();
    uset.insert(1).unwrap();
    assert!(uset.insert(1).is_err());
    assert_eq!(uset.len(), 1);

    let mut umulti = UnorderedMultiSet::<i32>::new();
    umulti.insert(1);
    umulti.insert(1);
    assert_eq!(umulti.len(), 2);
    assert_eq!(umulti.equal_range(&1).count(), 2);
}

// Test: a unique engine over pairs only compares keys.
// Verifies: a second pair with the same key is rejected and handed back whole.
#[test]
fn pair_key_uniqueness_ignores_mapped_value() {
    let mut t: RbTree<PairKey<&str, u8>> = RbTree::default();
    t.insert_unique(("k", 1)).unwrap();
    let rejected = t.insert_unique(("k", 2)).unwrap_err();
    assert_eq!(rejected.value, ("k", 2));
    assert_eq!(t.get(rejected.existing), Some(&("k", 1)));

    let mut h: HashTable<PairKey<&str, u8>> = HashTable::new();
    h.insert_unique(("k", 1)).unwrap();
    assert_eq!(h.insert_unique(("k", 2)).unwrap_err().value, ("k", 2));
    assert_eq!(h.len(), 1);
}
