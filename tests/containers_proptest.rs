use proptest::prelude::*;
use std::collections::{BTreeMap, HashMap};
use stl_core::{OrderedMap, UnorderedMap, UnorderedMultiSet};

#[derive(Clone, Debug)]
enum Op {
    Insert(u8, u32),
    Assign(u8, u32),
    Remove(u8),
    Get(u8),
    Clear,
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        5 => (any::<u8>(), any::<u32>()).prop_map(|(k, v)| Op::Insert(k, v)),
        3 => (any::<u8>(), any::<u32>()).prop_map(|(k, v)| Op::Assign(k, v)),
        3 => any::<u8>().prop_map(Op::Remove),
        3 => any::<u8>().prop_map(Op::Get),
        1 => Just(Op::Clear),
    ]
}

// Property: OrderedMap behaves like BTreeMap for insert/assign/remove/get and iterates in the
// same order; UnorderedMap holds the same entries in some order.
proptest! {
    #![proptest_config(ProptestConfig { cases: 128, .. ProptestConfig::default() })]
    #[test]
    fn prop_maps_match_btreemap(ops in proptest::collection::vec(arb_op(), 1..200)) {
        let mut ordered: OrderedMap<u8, u32> = OrderedMap::new();
        let mut unordered: UnorderedMap<u8, u32> = UnorderedMap::new();
        let mut model: BTreeMap<u8, u32> = BTreeMap::new();

        for op in ops {
            match op {
                Op::Insert(k, v) => {
                    let fresh = !model.contains_key(&k);
                    prop_assert_eq!(ordered.insert(k, v).is_ok(), fresh);
                    prop_assert_eq!(unordered.insert(k, v).is_ok(), fresh);
                    model.entry(k).or_insert(v);
                }
                Op::Assign(k, v) => {
                    let old = model.insert(k, v);
                    prop_assert_eq!(ordered.insert_or_assign(k, v), old);
                    prop_assert_eq!(unordered.insert_or_assign(k, v), old);
                }
                Op::Remove(k) => {
                    let old = model.remove(&k);
                    prop_assert_eq!(ordered.remove(&k), old);
                    prop_assert_eq!(unordered.remove(&k), old);
                }
                Op::Get(k) => {
                    prop_assert_eq!(ordered.get(&k), model.get(&k));
                    prop_assert_eq!(unordered.get(&k), model.get(&k));
                    prop_assert_eq!(ordered.at(&k).is_err(), !model.contains_key(&k));
                }
                Op::Clear => {
                    ordered.clear();
                    unordered.clear();
                    model.clear();
                }
            }
            prop_assert_eq!(ordered.len(), model.len());
            prop_assert_eq!(unordered.len(), model.len());
        }

        let from_ordered: Vec<(u8, u32)> = ordered.iter().map(|(k, v)| (*k, *v)).collect();
        let from_model: Vec<(u8, u32)> = model.iter().map(|(k, v)| (*k, *v)).collect();
        prop_assert_eq!(&from_ordered, &from_model);

        let mut from_unordered: Vec<(u8, u32)> = unordered.iter().map(|(k, v)| (*k, *v)).collect();
        from_unordered.sort_unstable();
        prop_assert_eq!(from_unordered, from_model);
        prop_assert!(unordered.load_factor() <= unordered.max_load_factor());
    }
}

// Property: two multisets built from permutations of the same bag compare equal, whatever
// their bucket layout; removing one occurrence breaks equality.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_multiset_equality_is_bag_equality(
        bag in proptest::collection::vec(0u8..16, 1..80),
        hint in 0usize..2_000,
    ) {
        let a: UnorderedMultiSet<u8> = bag.iter().copied().collect();
        let mut b: UnorderedMultiSet<u8> = UnorderedMultiSet::with_bucket_hint(hint);
        b.extend(bag.iter().rev().copied());
        prop_assert_eq!(&a, &b);

        let mut counts: HashMap<u8, usize> = HashMap::new();
        for k in &bag {
            *counts.entry(*k).or_default() += 1;
        }
        for (k, n) in &counts {
            prop_assert_eq!(a.count(k), *n);
            prop_assert_eq!(b.equal_range(k).count(), *n);
        }

        prop_assert!(b.remove_one(&bag[0]).is_some());
        prop_assert_ne!(&a, &b);
    }
}
