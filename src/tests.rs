use bytes::Bytes;

use crate::{ArtError, MAX_PREFIX_LEN};
use crate::AdaptiveRadixTree;

fn b(s: &str) -> Bytes {
    Bytes::copy_from_slice(s.as_bytes())
}

#[test]
fn test_get() {
    let mut tree = AdaptiveRadixTree::new();
    tree.insert(b("foo"), 1);
    assert_eq!(tree.search(b"foo"), Ok(&1));
}

#[test]
fn test_search_missing() {
    let tree: AdaptiveRadixTree<i32> = AdaptiveRadixTree::new();
    assert_eq!(tree.search(b"foo"), Err(ArtError::NotFound));
}

#[test]
fn test_mapping() {
    let mut tree = AdaptiveRadixTree::new();
    tree.insert(b("foo"), 1);
    tree.insert(b("bar"), 2);
    assert_eq!(tree.search(b"foo"), Ok(&1));
    assert_eq!(tree.search(b"bar"), Ok(&2));
    assert_eq!(tree.len(), 2);

    assert_eq!(tree.delete(b"foo"), Ok(1));
    assert_eq!(tree.search(b"foo"), Err(ArtError::NotFound));
    assert_eq!(tree.len(), 1);
    assert_eq!(tree.delete(b"foo"), Err(ArtError::NotFound));
}

#[test]
fn test_overwrite_returns_old_value() {
    let mut tree = AdaptiveRadixTree::new();
    assert_eq!(tree.insert(b("foo"), 1), None);
    assert_eq!(tree.insert(b("foo"), 2), Some(1));
    assert_eq!(tree.search(b"foo"), Ok(&2));
    assert_eq!(tree.len(), 1);
}

#[test]
fn test_each() {
    let mut tree = AdaptiveRadixTree::new();
    tree.insert(b("foo"), 1);
    assert_eq!(collect(&tree), vec![(b("foo"), 1)]);

    tree.insert(b("foobar"), 2);
    assert_eq!(collect(&tree), vec![(b("foo"), 1), (b("foobar"), 2)]);

    assert_eq!(collect_prefix(&tree, b"foo"), vec![(b("foo"), 1), (b("foobar"), 2)]);
    assert_eq!(collect_prefix(&tree, b"foob"), vec![(b("foobar"), 2)]);
    assert_eq!(collect_prefix(&tree, b"bar"), vec![]);
}

#[test]
fn test_min_max_key() {
    let mut tree = AdaptiveRadixTree::new();
    tree.insert(b("test"), ());
    tree.insert(b("foo"), ());
    tree.insert(b("bar"), ());
    assert_eq!(tree.minimum(), Ok((b("bar"), &())));
    assert_eq!(tree.maximum(), Ok((b("test"), &())));
}

#[test]
fn test_min_max_empty() {
    let tree: AdaptiveRadixTree<()> = AdaptiveRadixTree::new();
    assert_eq!(tree.minimum(), Err(ArtError::Empty));
    assert_eq!(tree.maximum(), Err(ArtError::Empty));
}

#[test]
fn test_clone_is_independent() {
    let mut tree = AdaptiveRadixTree::new();
    tree.insert(b("test"), 1);
    let mut other = tree.clone();
    assert_eq!(other.search(b"test"), Ok(&1));
    assert_eq!(other.len(), tree.len());

    other.insert(b("test"), 2);
    assert_eq!(other.search(b"test"), Ok(&2));
    assert_eq!(tree.search(b"test"), Ok(&1));

    other.insert(b("bar"), 3);
    assert!(other.search(b"bar").is_ok());
    assert!(tree.search(b"bar").is_err());

    tree.insert(b("foo"), 4);
    assert!(other.search(b"foo").is_err());
    assert!(tree.search(b"foo").is_ok());
}

#[test]
fn test_empty_key_is_valid() {
    let mut tree = AdaptiveRadixTree::new();
    tree.insert(Bytes::new(), 7);
    assert_eq!(tree.search(b""), Ok(&7));
    tree.insert(b("a"), 1);
    assert_eq!(tree.search(b""), Ok(&7));
    assert_eq!(tree.minimum(), Ok((Bytes::new(), &7)));
}

#[test]
fn test_one_key_prefix_of_another() {
    let mut tree = AdaptiveRadixTree::new();
    tree.insert(b("foo"), 1);
    tree.insert(b("foobar"), 2);
    assert_eq!(tree.search(b"foo"), Ok(&1));
    assert_eq!(tree.search(b"foobar"), Ok(&2));
    assert_eq!(tree.len(), 2);

    assert_eq!(tree.delete(b"foo"), Ok(1));
    assert_eq!(tree.search(b"foo"), Err(ArtError::NotFound));
    assert_eq!(tree.search(b"foobar"), Ok(&2));
}

#[test]
fn test_delete_collapses_single_child_chain() {
    let mut tree = AdaptiveRadixTree::new();
    tree.insert(b("foo1"), 1);
    tree.insert(b("foo2"), 2);
    assert_eq!(tree.delete(b"foo1"), Ok(1));
    assert_eq!(tree.search(b"foo2"), Ok(&2));
    assert_eq!(tree.len(), 1);
    assert_eq!(collect(&tree), vec![(b("foo2"), 2)]);
}

#[test]
fn test_long_shared_prefix_beyond_materialised_bound() {
    // Longer than MAX_PREFIX_LEN so the compressed prefix can't be fully
    // materialised and has to be verified against a descendant leaf.
    let shared: String = "x".repeat(MAX_PREFIX_LEN * 3);
    let key_a = format!("{shared}a");
    let key_b = format!("{shared}b");
    let key_c = format!("{shared}"); // a key that ends exactly at the shared prefix

    let mut tree = AdaptiveRadixTree::new();
    tree.insert(b(&key_a), 1);
    tree.insert(b(&key_b), 2);
    tree.insert(b(&key_c), 3);

    assert_eq!(tree.search(key_a.as_bytes()), Ok(&1));
    assert_eq!(tree.search(key_b.as_bytes()), Ok(&2));
    assert_eq!(tree.search(key_c.as_bytes()), Ok(&3));
    // A sibling that diverges before the shared run must not match.
    let other = format!("{}y", "x".repeat(MAX_PREFIX_LEN));
    assert_eq!(tree.search(other.as_bytes()), Err(ArtError::NotFound));

    assert_eq!(tree.len(), 3);
    assert_eq!(tree.minimum(), Ok((b(&key_c), &3)));
}

#[test]
fn test_variant_growth_and_shrink_thresholds() {
    let mut tree = AdaptiveRadixTree::new();
    for byte in 0..=255u8 {
        tree.insert(Bytes::copy_from_slice(&[byte]), byte);
    }
    assert_eq!(tree.len(), 256);
    for byte in 0..=255u8 {
        assert_eq!(tree.search(&[byte]), Ok(&byte));
    }

    for byte in 0..=255u8 {
        assert_eq!(tree.delete(&[byte]), Ok(byte));
    }
    assert!(tree.is_empty());
    assert_eq!(tree.search(&[0u8]), Err(ArtError::NotFound));
}

#[test]
fn test_try_for_each_propagates_callback_error() {
    let mut tree = AdaptiveRadixTree::new();
    tree.insert(b("a"), 1);
    tree.insert(b("b"), 2);

    let mut seen = Vec::new();
    let result = tree.try_for_each::<&str>(|k, v| {
        seen.push((k.clone(), *v));
        if k.as_ref() == b"b" {
            Err("stop at b")
        } else {
            Ok(())
        }
    });
    assert!(result.is_err());
    assert_eq!(seen, vec![(b("a"), 1), (b("b"), 2)]);
}

#[test]
fn test_try_for_each_aborts_on_first_item() {
    let mut tree = AdaptiveRadixTree::new();
    tree.insert(b("bar"), 1);
    tree.insert(b("foo"), 2);

    let mut seen = Vec::new();
    let result = tree.try_for_each::<&str>(|k, v| {
        seen.push((k.clone(), *v));
        Err("stop immediately")
    });
    assert!(result.is_err());
    assert_eq!(seen, vec![(b("bar"), 1)]);
}

#[test]
fn test_iter_orders_decimal_keys_lexicographically() {
    let mut tree = AdaptiveRadixTree::new();
    for i in 0..1024 {
        tree.insert(b(&i.to_string()), i);
    }
    assert_eq!(tree.len(), 1024);

    let keys: Vec<Bytes> = tree.iter().map(|(k, _)| k).collect();
    let mut expected: Vec<Bytes> = (0..1024).map(|i| b(&i.to_string())).collect();
    expected.sort();
    assert_eq!(keys, expected);

    // The literal trap: "10" sorts before "2" lexicographically even
    // though 10 > 2 numerically.
    let pos_10 = keys.iter().position(|k| k == &b("10")).unwrap();
    let pos_2 = keys.iter().position(|k| k == &b("2")).unwrap();
    assert!(pos_10 < pos_2);
}

fn collect<V: Clone>(tree: &AdaptiveRadixTree<V>) -> Vec<(Bytes, V)> {
    tree.iter().map(|(k, v)| (k, v.clone())).collect()
}

fn collect_prefix<V: Clone>(tree: &AdaptiveRadixTree<V>, prefix: &[u8]) -> Vec<(Bytes, V)> {
    tree.iter_prefix(prefix).map(|(k, v)| (k, v.clone())).collect()
}
