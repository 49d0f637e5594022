//! B-Tree search and split-on-descent insertion.
//!
//! Implements the algorithms from the crate's design notes directly on top
//! of [`IndexFile`]: root management, the linear-scan search used both to
//! look a key up and to find where it belongs during insertion, and the
//! top-down split that keeps every node legal without ever needing to
//! propagate a split back up the tree.

use std::path::Path;

use anyhow::Result;

use super::node::Node;
use crate::index_file::IndexFile;

/// A persistent, disk-resident B-tree of order 20 over an [`IndexFile`].
#[derive(Debug, Default)]
pub struct BTree {
    index: IndexFile,
}

impl BTree {
    /// Create a brand new index file at `path` and open a tree over it.
    ///
    /// The caller is responsible for any overwrite confirmation; this call
    /// unconditionally truncates an existing file at `path`, matching
    /// [`IndexFile::create`].
    pub fn create(path: &Path) -> Result<Self> {
        IndexFile::create(path)?;
        let mut index = IndexFile::new();
        index.open(path)?;
        let mut tree = Self { index };
        tree.ensure_root()?;
        Ok(tree)
    }

    /// Open an existing index file at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let mut index = IndexFile::new();
        index.open(path)?;
        let mut tree = Self { index };
        tree.ensure_root()?;
        Ok(tree)
    }

    /// Close the underlying index file. Idempotent.
    pub fn close(&mut self) {
        self.index.close();
    }

    /// Is there an open index file backing this tree?
    pub fn is_open(&self) -> bool {
        self.index.is_open()
    }

    /// If the tree has never been populated (`root_block_id == 0`),
    /// allocate and install an empty root node.
    fn ensure_root(&mut self) -> Result<()> {
        if self.index.root_block_id()? == 0 {
            let block_id = self.index.alloc_block_id()?;
            tracing::info!(block_id, "creating empty root node");
            let root = Node::new(block_id);
            self.write_node(&root)?;
            self.index.set_root_block_id(block_id)?;
        }
        Ok(())
    }

    fn read_node(&mut self, block_id: u64) -> Result<Node> {
        let block = self.index.read_block(block_id)?;
        Node::deserialize(&block)
    }

    fn write_node(&mut self, node: &Node) -> Result<()> {
        tracing::debug!(block_id = node.block_id, num_keys = node.num_keys, "writing node");
        self.index.write_block(node.block_id, &node.serialize())
    }

    fn alloc_node(&mut self) -> Result<Node> {
        let block_id = self.index.alloc_block_id()?;
        Ok(Node::new(block_id))
    }

    /// Look up `key`. Returns its stored value, or `None` if it isn't present.
    pub fn search(&mut self, key: u64) -> Result<Option<u64>> {
        let root_id = self.index.root_block_id()?;
        let mut node = self.read_node(root_id)?;
        loop {
            let i = node.search_index(key);
            if i < node.num_keys as usize && node.keys[i] == key {
                return Ok(Some(node.values[i]));
            }
            if node.is_leaf() {
                return Ok(None);
            }
            node = self.read_node(node.children[i])?;
        }
    }

    /// Insert `key`/`value`. Returns `Ok(true)` if the key was newly
    /// inserted, `Ok(false)` if `key` already existed (the tree is left
    /// unchanged: duplicates are rejected silently, never overwritten).
    pub fn insert(&mut self, key: u64, value: u64) -> Result<bool> {
        let root_id = self.index.root_block_id()?;
        let mut node = self.read_node(root_id)?;

        if node.is_full() {
            tracing::debug!(old_root = node.block_id, "root is full, growing the tree by one level");
            let mut new_root = self.alloc_node()?;
            new_root.children[0] = node.block_id;
            node.parent_id = new_root.block_id;
            self.write_node(&node)?;
            self.split_child(&mut new_root, 0, &mut node)?;
            self.index.set_root_block_id(new_root.block_id)?;
            node = new_root;
        }

        loop {
            let i = node.search_index(key);
            if i < node.num_keys as usize && node.keys[i] == key {
                tracing::debug!(key, "duplicate key rejected");
                return Ok(false);
            }

            if node.is_leaf() {
                node.insert_at(i, key, value)?;
                self.write_node(&node)?;
                return Ok(true);
            }

            let mut child = self.read_node(node.children[i])?;
            if child.is_full() {
                self.split_child(&mut node, i, &mut child)?;
                // The split may have pushed `key`'s destination one slot to
                // the right (or, in the case of a key equal to the promoted
                // median, made it a duplicate of an internal key now).
                let i = node.search_index(key);
                if i < node.num_keys as usize && node.keys[i] == key {
                    tracing::debug!(key, "duplicate key rejected at promoted median");
                    return Ok(false);
                }
                child = self.read_node(node.children[i])?;
            }
            node = child;
        }
    }

    /// Split the full `child` hanging off `parent.children[i]` into two
    /// half-full nodes, promoting the median key/value into `parent` at
    /// position `i`. Writes `child`, the freshly allocated sibling, and
    /// `parent` to disk before returning.
    fn split_child(&mut self, parent: &mut Node, i: usize, child: &mut Node) -> Result<()> {
        use super::node::{MAX_CHILDREN, MAX_KEYS, MIN_KEYS, SPLIT_MEDIAN};

        debug_assert_eq!(child.num_keys as usize, MAX_KEYS, "split_child requires a full child");
        let mid = SPLIT_MEDIAN;

        let mut new_child = self.alloc_node()?;
        new_child.num_keys = MIN_KEYS as u64;
        for j in 0..MIN_KEYS {
            new_child.keys[j] = child.keys[mid + 1 + j];
            new_child.values[j] = child.values[mid + 1 + j];
        }
        for j in 0..(MIN_KEYS + 1) {
            new_child.children[j] = child.children[mid + 1 + j];
        }

        for j in (mid + 1)..MAX_KEYS {
            child.keys[j] = 0;
            child.values[j] = 0;
        }
        for j in (mid + 1)..MAX_CHILDREN {
            child.children[j] = 0;
        }

        let promoted_key = child.keys[mid];
        let promoted_value = child.values[mid];
        child.keys[mid] = 0;
        child.values[mid] = 0;
        child.num_keys = mid as u64;

        new_child.parent_id = parent.block_id;
        child.parent_id = parent.block_id;

        // Insert the promoted key first so `num_keys` already reflects its
        // new value when `insert_child_at` works out how far to shift.
        parent.insert_at(i, promoted_key, promoted_value)?;
        parent.insert_child_at(i + 1, new_child.block_id);

        tracing::debug!(
            parent = parent.block_id,
            child = child.block_id,
            new_child = new_child.block_id,
            promoted_key,
            "split_child"
        );

        self.write_node(child)?;
        self.write_node(&new_child)?;
        self.write_node(parent)?;
        Ok(())
    }
}

#[cfg(test)]
impl BTree {
    pub(crate) fn root_block_id(&self) -> Result<u64> {
        self.index.root_block_id()
    }

    pub(crate) fn next_block_id(&self) -> Result<u64> {
        self.index.next_block_id()
    }

    pub(crate) fn debug_read_node(&mut self, block_id: u64) -> Result<Node> {
        self.read_node(block_id)
    }
}

#[cfg(test)]
mod tests;
