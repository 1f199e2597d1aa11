#![cfg(test)]

// Property tests for HashTable kept inside the crate so the structural checker can run after
// every operation.

use crate::functional::EqualTo;
use crate::hashtable::HashTable;
use crate::value_traits::{Identity, PairKey};
use proptest::prelude::*;
use std::collections::hash_map::RandomState;
use std::collections::{BTreeSet, HashMap};

#[derive(Clone, Debug)]
enum Op {
    InsertUnique(u16),
    InsertMulti(u16),
    EraseKey(u16),
    EraseOne(u16),
    Rehash(usize),
    Reserve(usize),
    SetLoadFactor(u8),
    Clear,
}

fn arb_op() -> impl Strategy<Value = Op> {
    let key = 0u16..64;
    prop_oneof![
        6 => key.clone().prop_map(Op::InsertUnique),
        6 => key.clone().prop_map(Op::InsertMulti),
        2 => key.clone().prop_map(Op::EraseKey),
        2 => key.prop_map(Op::EraseOne),
        1 => (0usize..2_000).prop_map(Op::Rehash),
        1 => (0usize..500).prop_map(Op::Reserve),
        1 => (1u8..8).prop_map(Op::SetLoadFactor),
        1 => Just(Op::Clear),
    ]
}

// Property: a multi table agrees with a HashMap<key, multiplicity> model.
// Invariants checked after every operation:
// - every entry sits in the bucket its hash selects, including right after a rehash;
// - equivalent keys are adjacent in their chain;
// - count/contains parity with the model;
// - after any insert the load factor does not exceed the maximum.
proptest! {
    #![proptest_config(ProptestConfig { cases: 128, .. ProptestConfig::default() })]
    #[test]
    fn prop_multi_table_matches_model(ops in proptest::collection::vec(arb_op(), 1..150)) {
        let mut sut: HashTable<Identity<u16>> = HashTable::new();
        let mut model: HashMap<u16, usize> = HashMap::new();

        for op in ops {
            let mut inserted = false;
            match op {
                Op::InsertUnique(k) => {
                    let r = sut.insert_unique(k);
                    let present = model.contains_key(&k);
                    prop_assert_eq!(r.is_err(), present);
                    if !present {
                        model.insert(k, 1);
                        inserted = true;
                    }
                }
                Op::InsertMulti(k) => {
                    sut.insert_multi(k);
                    *model.entry(k).or_default() += 1;
                    inserted = true;
                }
                Op::EraseKey(k) => {
                    prop_assert_eq!(sut.erase_key(&k), model.remove(&k).unwrap_or(0));
                }
                Op::EraseOne(k) => match sut.find(&k) {
                    Some(h) => {
                        prop_assert_eq!(sut.erase(h), Some(k));
                        let left = model.get_mut(&k).unwrap();
                        *left -= 1;
                        if *left == 0 {
                            model.remove(&k);
                        }
                    }
                    None => prop_assert!(!model.contains_key(&k)),
                },
                Op::Rehash(n) => sut.rehash(n),
                Op::Reserve(n) => sut.reserve(n),
                Op::SetLoadFactor(tenths) => {
                    sut.set_max_load_factor(f32::from(tenths) / 4.0).unwrap();
                }
                Op::Clear => {
                    sut.clear();
                    model.clear();
                }
            }

            prop_assert!(sut.check_invariants().is_ok(), "{:?}", sut.check_invariants());
            prop_assert_eq!(sut.len(), model.values().sum::<usize>());
            if inserted {
                prop_assert!(sut.load_factor() <= sut.max_load_factor());
            }
        }

        for k in 0u16..64 {
            prop_assert_eq!(sut.count(&k), model.get(&k).copied().unwrap_or(0));
            prop_assert_eq!(sut.contains(&k), model.contains_key(&k));
        }
    }
}

// Property: the set of keys reachable through `find` is identical before and after a rehash,
// whether it grows or shrinks the bucket array, and handles keep resolving to the same entry.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_rehash_preserves_membership(
        keys in proptest::collection::btree_set(any::<u32>(), 0..300),
        target in 0usize..5_000,
    ) {
        let mut sut: HashTable<PairKey<u32, usize>, RandomState, EqualTo> =
            HashTable::with_bucket_hint(0);
        let handles: Vec<_> = keys
            .iter()
            .enumerate()
            .map(|(i, &k)| (k, i, sut.insert_unique((k, i)).unwrap()))
            .collect();
        let before: BTreeSet<u32> = keys.iter().copied().filter(|k| sut.contains(k)).collect();

        sut.rehash(target);
        prop_assert!(sut.check_invariants().is_ok());

        let after: BTreeSet<u32> = keys.iter().copied().filter(|k| sut.contains(k)).collect();
        prop_assert_eq!(&before, &keys);
        prop_assert_eq!(before, after);
        for (k, i, h) in handles {
            prop_assert_eq!(sut.get(h), Some(&(k, i)));
        }
    }
}
