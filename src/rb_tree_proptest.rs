#![cfg(test)]

// Property tests for RbTree kept inside the crate so they can inspect handles and run the
// structural checker after every step.

use crate::rb_tree::{Handle, RbTree};
use crate::value_traits::{Identity, PairKey};
use proptest::prelude::*;
use std::collections::BTreeMap;

#[derive(Clone, Debug)]
enum Op {
    InsertUnique(u8),
    InsertMulti(u8),
    InsertHint(u8, u8),
    EraseKey(u8),
    EraseFirstOf(u8),
    EraseRange(u8, u8),
    Clear,
}

fn arb_op() -> impl Strategy<Value = Op> {
    // Small key space so duplicates and erase hits are frequent.
    let key = 0u8..32;
    prop_oneof![
        4 => key.clone().prop_map(Op::InsertUnique),
        4 => key.clone().prop_map(Op::InsertMulti),
        2 => (key.clone(), key.clone()).prop_map(|(h, k)| Op::InsertHint(h, k)),
        2 => key.clone().prop_map(Op::EraseKey),
        2 => key.clone().prop_map(Op::EraseFirstOf),
        1 => (key.clone(), key).prop_map(|(a, b)| Op::EraseRange(a.min(b), a.max(b))),
        1 => Just(Op::Clear),
    ]
}

fn model_contents(model: &BTreeMap<u8, usize>) -> Vec<u8> {
    model
        .iter()
        .flat_map(|(&k, &n)| std::iter::repeat(k).take(n))
        .collect()
}

// Property: a multiset tree agrees with a BTreeMap<key, multiplicity> model.
// Invariants checked after every operation:
// - red-black colouring, black height, parent links, cached extrema;
// - in-order traversal equals the model's sorted expansion;
// - counts and find parity for every key touched.
proptest! {
    #![proptest_config(ProptestConfig { cases: 128, .. ProptestConfig::default() })]
    #[test]
    fn prop_multiset_matches_model(ops in proptest::collection::vec(arb_op(), 1..120)) {
        let mut sut: RbTree<Identity<u8>> = RbTree::default();
        let mut model: BTreeMap<u8, usize> = BTreeMap::new();

        for op in ops {
            match op {
                Op::InsertUnique(k) => {
                    let r = sut.insert_unique(k);
                    let present = model.contains_key(&k);
                    prop_assert_eq!(r.is_err(), present);
                    if !present {
                        model.insert(k, 1);
                    }
                }
                Op::InsertMulti(k) => {
                    sut.insert_multi(k);
                    *model.entry(k).or_default() += 1;
                }
                Op::InsertHint(h, k) => {
                    let hint = sut.lower_bound(&h);
                    sut.insert_multi_hint(hint, k);
                    *model.entry(k).or_default() += 1;
                }
                Op::EraseKey(k) => {
                    let n = sut.erase_key(&k);
                    prop_assert_eq!(n, model.remove(&k).unwrap_or(0));
                }
                Op::EraseFirstOf(k) => {
                    match sut.find(&k) {
                        Some(h) => {
                            prop_assert_eq!(sut.erase(h), Some(k));
                            let left = model.get_mut(&k).unwrap();
                            *left -= 1;
                            if *left == 0 {
                                model.remove(&k);
                            }
                        }
                        None => prop_assert!(!model.contains_key(&k)),
                    }
                }
                Op::EraseRange(a, b) => {
                    let n = sut.erase_range(sut.lower_bound(&a), sut.upper_bound(&b));
                    let doomed: Vec<u8> = model.range(a..=b).map(|(&k, _)| k).collect();
                    let mut expect = 0;
                    for k in doomed {
                        expect += model.remove(&k).unwrap_or(0);
                    }
                    prop_assert_eq!(n, expect);
                }
                Op::Clear => {
                    sut.clear();
                    model.clear();
                }
            }

            prop_assert!(sut.check_invariants().is_ok(), "{:?}", sut.check_invariants());
            prop_assert_eq!(sut.len(), model.values().sum::<usize>());
            let got: Vec<u8> = sut.iter().copied().collect();
            prop_assert_eq!(got, model_contents(&model));
        }

        for k in 0u8..32 {
            prop_assert_eq!(sut.count(&k), model.get(&k).copied().unwrap_or(0));
            prop_assert_eq!(sut.contains(&k), model.contains_key(&k));
        }
    }
}

// Property: handles stay bound to their entry across arbitrary unrelated erasures.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_handles_are_stable(
        keys in proptest::collection::btree_set(any::<i16>(), 1..80),
        erase_mask in proptest::collection::vec(any::<bool>(), 80),
    ) {
        let mut sut: RbTree<PairKey<i16, u32>> = RbTree::default();
        let mut handles: Vec<(i16, Handle)> = Vec::new();
        for (i, &k) in keys.iter().enumerate() {
            let h = sut.insert_unique((k, i as u32)).unwrap();
            handles.push((k, h));
        }
        let mut kept = Vec::new();
        for (i, (k, h)) in handles.into_iter().enumerate() {
            if erase_mask[i] {
                prop_assert_eq!(sut.erase(h).map(|e| e.0), Some(k));
                prop_assert!(sut.get(h).is_none());
            } else {
                kept.push((k, h, i as u32));
            }
        }
        sut.check_invariants().unwrap();
        for (k, h, v) in kept {
            prop_assert_eq!(sut.get(h), Some(&(k, v)));
        }
    }
}
