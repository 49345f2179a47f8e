use super::*;

use proptest::prelude::*;
use proptest_derive::Arbitrary;
use std::collections::{BTreeMap, HashMap};

use crate::ordered::validate_tree;
use crate::prefix::validate_trie;

fn small_key() -> impl Strategy<Value = i32> {
    -64i32..64
}

fn trie_key() -> impl Strategy<Value = Vec<u8>> {
    // A tiny alphabet forces shared prefixes and deep branch/prune paths.
    prop::collection::vec(prop::sample::select(vec![b'a', b'b', b'c']), 0..=6)
}

#[derive(Clone, Debug, Arbitrary)]
enum OrderedOp {
    #[proptest(weight = 5)]
    Insert(#[proptest(strategy = "small_key()")] i32),
    #[proptest(weight = 3)]
    Remove(#[proptest(strategy = "small_key()")] i32),
    #[proptest(weight = 2)]
    Lookup(#[proptest(strategy = "small_key()")] i32),
}

#[derive(Clone, Debug, Arbitrary)]
enum PrefixOp {
    #[proptest(weight = 5)]
    Insert(#[proptest(strategy = "trie_key()")] Vec<u8>),
    #[proptest(weight = 3)]
    Remove(#[proptest(strategy = "trie_key()")] Vec<u8>),
    #[proptest(weight = 2)]
    Lookup(#[proptest(strategy = "trie_key()")] Vec<u8>),
}

fn key_of(r: &i32) -> i32 {
    *r
}

fn bytes_of(r: &Vec<u8>) -> &[u8] {
    r
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        max_shrink_iters: 50_000,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_ordered_equivalence(ops in prop::collection::vec(any::<OrderedOp>(), 0..=400)) {
        let mut records: Arena<i32> = Arena::new();
        let mut t = OrderedIndex::new("prop", key_of).unwrap();
        let mut m: BTreeMap<i32, Handle> = BTreeMap::new();

        for op in ops {
            match op {
                OrderedOp::Insert(key) => {
                    let h = records.insert(key);
                    let got = t.insert(&records, h);
                    if m.contains_key(&key) {
                        prop_assert_eq!(got, Err(Error::DuplicateKey));
                        records.remove(h);
                    } else {
                        prop_assert_eq!(got, Ok(()));
                        m.insert(key, h);
                    }
                }
                OrderedOp::Remove(key) => match m.remove(&key) {
                    Some(h) => {
                        prop_assert_eq!(t.remove(&records, h), Ok(()));
                        records.remove(h);
                    }
                    None => {
                        let probe = records.insert(key);
                        prop_assert_eq!(t.remove(&records, probe), Err(Error::KeyNotFound));
                        records.remove(probe);
                    }
                },
                OrderedOp::Lookup(key) => {
                    prop_assert_eq!(t.lookup(&records, key).unwrap(), m.get(&key).copied());
                }
            }

            prop_assert_eq!(t.count(), m.len());
        }

        validate_tree(&t, &records);
        let got: Vec<Handle> = t.iter().collect();
        let expected: Vec<Handle> = m.values().copied().collect();
        prop_assert_eq!(got, expected);

        for h in m.values() {
            t.remove(&records, *h).unwrap();
        }
        prop_assert!(t.destroy().is_ok());
    }

    #[test]
    fn prop_prefix_equivalence(ops in prop::collection::vec(any::<PrefixOp>(), 0..=400)) {
        let mut records: Arena<Vec<u8>> = Arena::new();
        let mut t: PrefixIndex<Vec<u8>, _> = PrefixIndex::new("prop", bytes_of).unwrap();
        let mut m: HashMap<Vec<u8>, Handle> = HashMap::new();

        for op in ops {
            match op {
                PrefixOp::Insert(key) => {
                    let nodes = t.node_count();
                    let h = records.insert(key.clone());
                    let got = t.insert(&key, h);
                    if m.contains_key(&key) {
                        prop_assert_eq!(got, Err(Error::DuplicateKey));
                        prop_assert_eq!(t.node_count(), nodes);
                        records.remove(h);
                    } else {
                        prop_assert_eq!(got, Ok(()));
                        m.insert(key, h);
                    }
                }
                PrefixOp::Remove(key) => {
                    let got = t.remove(&key);
                    match m.remove(&key) {
                        Some(h) => {
                            prop_assert_eq!(got, Ok(h));
                            records.remove(h);
                        }
                        None => prop_assert_eq!(got, Err(Error::KeyNotFound)),
                    }
                }
                PrefixOp::Lookup(key) => {
                    prop_assert_eq!(t.lookup(&key), m.get(&key).copied());
                }
            }

            prop_assert_eq!(t.count(), m.len());
        }

        validate_trie(&t);

        // iter() and least()/next() agree, and cover exactly the stored set.
        let iterated: Vec<(Vec<u8>, Handle)> = t.iter().collect();
        let mut walked = Vec::new();
        let mut cursor = t.least();
        while let Some(h) = cursor {
            walked.push(h);
            cursor = t.next(&records, h).unwrap();
        }
        prop_assert_eq!(iterated.iter().map(|(_, h)| *h).collect::<Vec<_>>(), walked);

        let mut got: Vec<(Vec<u8>, Handle)> = iterated;
        got.sort();
        let mut expected: Vec<(Vec<u8>, Handle)> = m.into_iter().collect();
        expected.sort();
        prop_assert_eq!(&got, &expected);

        for (key, _) in &got {
            t.remove(key).unwrap();
        }
        prop_assert_eq!(t.node_count(), 0);
        prop_assert!(t.destroy().is_ok());
    }
}

fn for_each_permutation<T: Clone>(items: &[T], mut f: impl FnMut(Vec<T>)) {
    fn rec<T: Clone>(
        items: &[T],
        used: &mut [bool],
        out: &mut Vec<T>,
        f: &mut impl FnMut(Vec<T>),
    ) {
        if out.len() == items.len() {
            f(out.clone());
            return;
        }
        for i in 0..items.len() {
            if used[i] {
                continue;
            }
            used[i] = true;
            out.push(items[i].clone());
            rec(items, used, out, f);
            out.pop();
            used[i] = false;
        }
    }

    let mut used = vec![false; items.len()];
    let mut out = Vec::with_capacity(items.len());
    rec(items, &mut used, &mut out, &mut f);
}

#[test]
fn exhaustive_ordered_remove_order() {
    let keys = [4, 2, 6, 1, 3, 5, 7];

    for_each_permutation(&keys, |perm| {
        let mut records: Arena<i32> = Arena::new();
        let mut t = OrderedIndex::new("perm", key_of).unwrap();
        let handles: HashMap<i32, Handle> = keys
            .iter()
            .map(|&k| {
                let h = records.insert(k);
                t.insert(&records, h).unwrap();
                (k, h)
            })
            .collect();

        let mut remaining: Vec<i32> = keys.to_vec();
        for k in perm {
            t.remove(&records, handles[&k]).unwrap();
            remaining.retain(|&r| r != k);
            validate_tree(&t, &records);
            let got: Vec<i32> = t.iter().map(|h| records[h]).collect();
            let mut expected = remaining.clone();
            expected.sort_unstable();
            assert_eq!(got, expected);
        }
        assert_eq!(t.root(), None);
    });
}

#[test]
fn exhaustive_prefix_insert_and_remove_order() {
    let keys: Vec<Vec<u8>> = vec![
        b"a".to_vec(),
        b"ab".to_vec(),
        b"abc".to_vec(),
        b"b".to_vec(),
        b"ba".to_vec(),
        b"".to_vec(),
    ];

    for_each_permutation(&keys, |perm| {
        let mut records: Arena<Vec<u8>> = Arena::new();
        let mut t: PrefixIndex<Vec<u8>, _> = PrefixIndex::new("perm", bytes_of).unwrap();
        for k in &perm {
            let h = records.insert(k.clone());
            t.insert(k, h).unwrap();
        }
        validate_trie(&t);
        // "" and "a b c b a" plus one sentinel per key.
        assert_eq!(t.node_count(), 5 + keys.len());

        // Remove in reverse of insertion order.
        for (i, k) in perm.iter().rev().enumerate() {
            let h = t.remove(k).unwrap();
            assert_eq!(&records[h], k);
            validate_trie(&t);
            assert_eq!(t.count(), keys.len() - i - 1);
            for other in &perm[..keys.len() - i - 1] {
                assert!(t.contains_key(other));
            }
        }
        assert_eq!(t.node_count(), 0);
    });
}
