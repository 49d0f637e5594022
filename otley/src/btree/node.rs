//! B-Tree Node codec
//!
//! A `Node` is the in-memory shape of exactly one 512-byte block: metadata
//! (`block_id`, `parent_id`, `num_keys`) followed by fixed-size key, value,
//! and child arrays. Serialization packs the 61 `u64` fields big-endian,
//! back to back, with the 24 trailing bytes always zeroed.

use anyhow::Result;
use thiserror::Error;

use crate::block::Block;
use crate::BLOCK_SIZE;

/// Maximum number of keys (and values) a node can hold. Order 20, minimum degree t=10.
pub const MAX_KEYS: usize = 19;
/// Maximum number of children a node can hold.
pub const MAX_CHILDREN: usize = 20;
/// Minimum number of keys a non-root node must carry once it has been split.
pub const MIN_KEYS: usize = 9;
/// 0-indexed median position used by `split_child` (`MAX_KEYS / 2`).
pub const SPLIT_MEDIAN: usize = 9;

const U64_BYTES: usize = 8;

/// Errors arising from node (de)serialization.
#[derive(Error, Debug)]
pub enum NodeError {
    /// A node block reported more keys than the format allows.
    #[error("node at block {block_id} has {num_keys} keys, more than the {MAX_KEYS} maximum")]
    TooManyKeys {
        /// Offending block id.
        block_id: u64,
        /// The corrupt key count read from disk.
        num_keys: u64,
    },

    /// Attempted to insert into a node that already holds the maximum number of keys.
    #[error("node at block {0} is full")]
    Full(u64),
}

/// One B-tree node: the in-memory form of a single on-disk block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Node {
    /// The block this node lives in (and will be written back to).
    pub block_id: u64,
    /// The parent's block id, or `0` for the root. Advisory only: see the
    /// crate-level design notes on why splits don't chase this field down
    /// into migrated children.
    pub parent_id: u64,
    /// How many of `keys`/`values` (from index 0) are in use.
    pub num_keys: u64,
    /// Keys, ascending in `0..num_keys`; unused trailing slots are zero.
    pub keys: [u64; MAX_KEYS],
    /// Values, positionally matched to `keys`.
    pub values: [u64; MAX_KEYS],
    /// Child block ids. All zero iff this node is a leaf.
    pub children: [u64; MAX_CHILDREN],
}

impl Node {
    /// A freshly allocated, empty node occupying `block_id`.
    pub fn new(block_id: u64) -> Self {
        Self {
            block_id,
            parent_id: 0,
            num_keys: 0,
            keys: [0; MAX_KEYS],
            values: [0; MAX_KEYS],
            children: [0; MAX_CHILDREN],
        }
    }

    /// A node is a leaf iff every child slot is zero.
    pub fn is_leaf(&self) -> bool {
        self.children.iter().all(|&c| c == 0)
    }

    /// Is this node at the `MAX_KEYS` cap?
    pub fn is_full(&self) -> bool {
        self.num_keys as usize == MAX_KEYS
    }

    /// Smallest index `i` in `0..num_keys` such that `key <= keys[i]`;
    /// `num_keys` if no such index exists (key is larger than everything
    /// currently stored).
    pub fn search_index(&self, key: u64) -> usize {
        let n = self.num_keys as usize;
        for (i, k) in self.keys[..n].iter().enumerate() {
            if key <= *k {
                return i;
            }
        }
        n
    }

    /// Serialize to exactly one 512-byte block, big-endian throughout.
    pub fn serialize(&self) -> Block {
        let mut block = [0u8; BLOCK_SIZE];
        let mut offset = 0;
        let mut put = |value: u64| {
            block[offset..offset + U64_BYTES].copy_from_slice(&value.to_be_bytes());
            offset += U64_BYTES;
        };
        put(self.block_id);
        put(self.parent_id);
        put(self.num_keys);
        for key in self.keys {
            put(key);
        }
        for value in self.values {
            put(value);
        }
        for child in self.children {
            put(child);
        }
        block
    }

    /// Deserialize a block written by [`Node::serialize`].
    pub fn deserialize(block: &Block) -> Result<Self> {
        let mut offset = 0;
        let mut take = || {
            let value = u64::from_be_bytes(block[offset..offset + U64_BYTES].try_into().unwrap());
            offset += U64_BYTES;
            value
        };
        let block_id = take();
        let parent_id = take();
        let num_keys = take();
        if num_keys as usize > MAX_KEYS {
            return Err(NodeError::TooManyKeys { block_id, num_keys }.into());
        }
        let mut keys = [0u64; MAX_KEYS];
        for key in keys.iter_mut() {
            *key = take();
        }
        let mut values = [0u64; MAX_KEYS];
        for value in values.iter_mut() {
            *value = take();
        }
        let mut children = [0u64; MAX_CHILDREN];
        for child in children.iter_mut() {
            *child = take();
        }
        Ok(Self {
            block_id,
            parent_id,
            num_keys,
            keys,
            values,
            children,
        })
    }

    /// Insert `key`/`value` at position `p` (as found by [`Node::search_index`]),
    /// shifting later entries right by one. Returns an error if the node is full.
    pub fn insert_at(&mut self, p: usize, key: u64, value: u64) -> Result<()> {
        if self.is_full() {
            return Err(NodeError::Full(self.block_id).into());
        }
        let n = self.num_keys as usize;
        for i in (p..n).rev() {
            self.keys[i + 1] = self.keys[i];
            self.values[i + 1] = self.values[i];
        }
        self.keys[p] = key;
        self.values[p] = value;
        self.num_keys += 1;
        Ok(())
    }

    /// Insert `child` at position `p` into the children array, shifting
    /// later entries right by one. The caller is responsible for keeping
    /// `children` consistent with `keys`/`num_keys`.
    pub fn insert_child_at(&mut self, p: usize, child: u64) {
        let n = self.num_keys as usize; // number of keys *after* the matching key insert
        for i in (p..n).rev() {
            self.children[i + 1] = self.children[i];
        }
        self.children[p] = child;
    }
}
