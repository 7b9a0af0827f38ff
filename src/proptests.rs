//! Randomised workload checks against a `BTreeMap` reference model.

use std::collections::BTreeMap;

use bytes::Bytes;
use proptest::prelude::*;

use crate::AdaptiveRadixTree;

#[derive(Debug, Clone)]
enum Action {
    Insert(Vec<u8>, u32),
    Delete(Vec<u8>),
}

fn key_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop_oneof![
        Just(vec![]),
        prop::collection::vec(any::<u8>(), 1..4),
        prop::collection::vec(any::<u8>(), 4..32),
        // Keys with long shared runs, to exercise prefix compression and
        // the optimistic-tail reconstruction beyond MAX_PREFIX_LEN.
        (1usize..40).prop_map(|n| {
            let mut v = vec![b'x'; n];
            v.push(b'!');
            v
        }),
    ]
}

fn action_strategy() -> impl Strategy<Value = Action> {
    prop_oneof![
        (key_strategy(), any::<u32>()).prop_map(|(k, v)| Action::Insert(k, v)),
        key_strategy().prop_map(Action::Delete),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Every insert/delete agrees with a `BTreeMap` run alongside it: same
    /// values for the same keys, same length, same ordered iteration.
    #[test]
    fn matches_btreemap_reference(actions in prop::collection::vec(action_strategy(), 0..200)) {
        let mut tree = AdaptiveRadixTree::new();
        let mut model: BTreeMap<Vec<u8>, u32> = BTreeMap::new();

        for action in actions {
            match action {
                Action::Insert(k, v) => {
                    let expected = model.insert(k.clone(), v);
                    let got = tree.insert(Bytes::from(k), v);
                    prop_assert_eq!(got, expected);
                }
                Action::Delete(k) => {
                    let expected = model.remove(&k);
                    let got = tree.delete(&k).ok();
                    prop_assert_eq!(got, expected);
                }
            }
            prop_assert_eq!(tree.len(), model.len());
        }

        for (k, v) in &model {
            prop_assert_eq!(tree.search(k), Ok(v));
        }

        let tree_entries: Vec<(Vec<u8>, u32)> = tree.iter().map(|(k, v)| (k.to_vec(), *v)).collect();
        let model_entries: Vec<(Vec<u8>, u32)> = model.into_iter().collect();
        prop_assert_eq!(tree_entries, model_entries);
    }

    /// A clone never observes mutations made to the original afterwards, and
    /// vice versa.
    #[test]
    fn clone_is_independent(
        initial in prop::collection::vec((key_strategy(), any::<u32>()), 0..50),
        extra_original in prop::collection::vec((key_strategy(), any::<u32>()), 0..20),
        extra_clone in prop::collection::vec((key_strategy(), any::<u32>()), 0..20),
    ) {
        let mut tree = AdaptiveRadixTree::new();
        for (k, v) in &initial {
            tree.insert(Bytes::from(k.clone()), *v);
        }
        let mut cloned = tree.clone();
        prop_assert_eq!(tree.len(), cloned.len());

        for (k, v) in &extra_original {
            tree.insert(Bytes::from(k.clone()), *v);
        }
        for (k, v) in &extra_clone {
            cloned.insert(Bytes::from(k.clone()), *v);
        }

        for (k, _) in &extra_original {
            if !extra_clone.iter().any(|(ck, _)| ck == k) {
                prop_assert!(cloned.search(k).is_err() || initial.iter().any(|(ik, _)| ik == k));
            }
        }
        for (k, _) in &extra_clone {
            if !extra_original.iter().any(|(ok, _)| ok == k) {
                prop_assert!(tree.search(k).is_err() || initial.iter().any(|(ik, _)| ik == k));
            }
        }
    }

    /// `iter_prefix` returns exactly the keys that start with the queried
    /// prefix, in ascending order, matching a linear scan.
    #[test]
    fn iter_prefix_matches_linear_scan(
        entries in prop::collection::vec((key_strategy(), any::<u32>()), 0..100),
        prefix in key_strategy(),
    ) {
        let mut tree = AdaptiveRadixTree::new();
        let mut model: BTreeMap<Vec<u8>, u32> = BTreeMap::new();
        for (k, v) in entries {
            model.insert(k.clone(), v);
            tree.insert(Bytes::from(k), v);
        }

        let mut expected: Vec<(Vec<u8>, u32)> = model
            .into_iter()
            .filter(|(k, _)| k.starts_with(prefix.as_slice()))
            .collect();
        expected.sort();

        let got: Vec<(Vec<u8>, u32)> = tree.iter_prefix(&prefix).map(|(k, v)| (k.to_vec(), *v)).collect();
        prop_assert_eq!(got, expected);
    }

    /// Deleting every inserted key empties the tree and forgets every key.
    #[test]
    fn round_trip_to_empty(entries in prop::collection::vec((key_strategy(), any::<u32>()), 0..100)) {
        let mut tree = AdaptiveRadixTree::new();
        let mut unique_keys: Vec<Vec<u8>> = Vec::new();
        for (k, v) in &entries {
            tree.insert(Bytes::from(k.clone()), *v);
            if !unique_keys.contains(k) {
                unique_keys.push(k.clone());
            }
        }
        prop_assert_eq!(tree.len(), unique_keys.len());

        for k in &unique_keys {
            prop_assert!(tree.delete(k).is_ok());
        }
        prop_assert!(tree.is_empty());
        for k in &unique_keys {
            prop_assert!(tree.search(k).is_err());
        }
    }
}
