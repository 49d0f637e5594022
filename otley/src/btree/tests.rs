use std::path::Path;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use super::*;
use crate::btree::node::{MAX_CHILDREN, MAX_KEYS, MIN_KEYS};

fn cleanup(path: &Path) {
    let _ = std::fs::remove_file(path);
}

#[test]
fn it_creates_an_empty_tree_with_a_root_node() {
    let path = Path::new("btree_empty.db");
    let mut tree = BTree::create(path).expect("creates tree");
    assert_eq!(tree.root_block_id().unwrap(), 1);
    assert_eq!(tree.search(42).unwrap(), None);
    cleanup(path);
}

#[test]
fn it_inserts_and_finds_a_single_key() {
    let path = Path::new("btree_single.db");
    let mut tree = BTree::create(path).expect("creates tree");
    assert!(tree.insert(7, 700).unwrap());
    assert_eq!(tree.search(7).unwrap(), Some(700));
    assert_eq!(tree.search(8).unwrap(), None);
    cleanup(path);
}

#[test]
fn it_rejects_a_duplicate_key_without_changing_the_tree() {
    let path = Path::new("btree_dup.db");
    let mut tree = BTree::create(path).expect("creates tree");
    assert!(tree.insert(7, 700).unwrap());
    assert!(!tree.insert(7, 999).unwrap());
    assert_eq!(tree.search(7).unwrap(), Some(700));
    cleanup(path);
}

#[test]
fn it_fills_a_leaf_root_without_splitting() {
    let path = Path::new("btree_full_leaf.db");
    let mut tree = BTree::create(path).expect("creates tree");
    for k in 0..MAX_KEYS as u64 {
        assert!(tree.insert(k, k * 10).unwrap());
    }
    let root_id = tree.root_block_id().unwrap();
    assert_eq!(root_id, 1, "root is still the original block, no split yet");
    let root = tree.debug_read_node(root_id).unwrap();
    assert_eq!(root.num_keys as usize, MAX_KEYS);
    assert!(root.is_leaf());
    for k in 0..MAX_KEYS as u64 {
        assert_eq!(tree.search(k).unwrap(), Some(k * 10));
    }
    cleanup(path);
}

#[test]
fn it_splits_the_root_on_the_twentieth_insert() {
    let path = Path::new("btree_root_split.db");
    let mut tree = BTree::create(path).expect("creates tree");
    for k in 0..(MAX_KEYS as u64 + 1) {
        tree.insert(k, k * 10).unwrap();
    }

    let root_id = tree.root_block_id().unwrap();
    assert_ne!(root_id, 1, "a new root must have been allocated");
    let root = tree.debug_read_node(root_id).unwrap();
    assert_eq!(root.num_keys, 1);
    assert!(!root.is_leaf());

    let left = tree.debug_read_node(root.children[0]).unwrap();
    let right = tree.debug_read_node(root.children[1]).unwrap();
    assert_eq!(left.num_keys as usize, MIN_KEYS);
    assert_eq!(right.num_keys as usize, MIN_KEYS);
    assert!(left.is_leaf());
    assert!(right.is_leaf());

    // Every original key is still reachable after the split.
    for k in 0..(MAX_KEYS as u64 + 1) {
        assert_eq!(tree.search(k).unwrap(), Some(k * 10));
    }
    cleanup(path);
}

#[test_log::test]
fn it_keeps_leaves_at_a_uniform_depth() {
    let path = Path::new("btree_uniform_depth.db");
    let mut tree = BTree::create(path).expect("creates tree");
    for k in 0..2000u64 {
        tree.insert(k, k).unwrap();
    }

    fn depth(tree: &mut BTree, block_id: u64) -> usize {
        let node = tree.debug_read_node(block_id).unwrap();
        if node.is_leaf() {
            return 0;
        }
        1 + depth(tree, node.children[0])
    }

    fn leftmost_and_rightmost_depth(tree: &mut BTree, block_id: u64) -> (usize, usize) {
        let node = tree.debug_read_node(block_id).unwrap();
        if node.is_leaf() {
            return (0, 0);
        }
        let left = depth(tree, node.children[0]);
        let last_child = node.children[node.num_keys as usize];
        let right = depth(tree, last_child);
        (left, right)
    }

    let root_id = tree.root_block_id().unwrap();
    let (left_depth, right_depth) = leftmost_and_rightmost_depth(&mut tree, root_id);
    assert_eq!(left_depth, right_depth);
    cleanup(path);
}

#[test_log::test]
fn it_persists_across_close_and_reopen_with_many_random_keys() {
    let path = Path::new("btree_random_roundtrip.db");
    let mut rng = StdRng::seed_from_u64(1234);
    let mut keys: Vec<u64> = (0..500u64).collect();
    keys.shuffle(&mut rng);

    {
        let mut tree = BTree::create(path).expect("creates tree");
        for &k in &keys {
            assert!(tree.insert(k, k * 2 + 1).unwrap());
        }
        tree.close();
    }

    let mut tree = BTree::open(path).expect("reopens tree");
    for &k in &keys {
        assert_eq!(tree.search(k).unwrap(), Some(k * 2 + 1));
    }
    assert_eq!(tree.search(500_000).unwrap(), None);
    cleanup(path);
}

#[test]
fn it_allocates_monotonic_block_ids_as_the_tree_grows() {
    let path = Path::new("btree_alloc_growth.db");
    let mut tree = BTree::create(path).expect("creates tree");
    let before = tree.next_block_id().unwrap();
    for k in 0..(MAX_KEYS as u64 + 1) {
        tree.insert(k, k).unwrap();
    }
    let after = tree.next_block_id().unwrap();
    // A root split allocates a new root plus a new right sibling: two blocks.
    assert_eq!(after, before + 2);
    cleanup(path);
}

#[test]
fn it_zero_fills_vacated_slots_after_a_split() {
    let path = Path::new("btree_split_zeroing.db");
    let mut tree = BTree::create(path).expect("creates tree");
    for k in 0..(MAX_KEYS as u64 + 1) {
        tree.insert(k, k).unwrap();
    }
    let root = tree.debug_read_node(tree.root_block_id().unwrap()).unwrap();
    let left = tree.debug_read_node(root.children[0]).unwrap();
    assert!(left.keys[MIN_KEYS..MAX_KEYS].iter().all(|&k| k == 0));
    assert!(left.values[MIN_KEYS..MAX_KEYS].iter().all(|&v| v == 0));
    assert!(left.children[(MIN_KEYS + 1)..MAX_CHILDREN].iter().all(|&c| c == 0));
    cleanup(path);
}
