#![warn(missing_docs)]
//! Otley B-tree index
//!
//! # Implementation Details
//!
//! A single-file, disk-resident key/value index implemented as a B-tree of
//! order 20 (minimum degree `t = 10`): up to 19 keys and 20 child pointers
//! per node. Every node (including the header) occupies exactly one
//! fixed 512-byte block, so the whole file is just an array of blocks
//! addressed by a zero-based integer id.
//!
//! The crate is layered bottom-up:
//!
//!  - [`block`] owns the open file handle and knows how to read and write
//!    fixed-size blocks. It has no idea a B-tree exists.
//!  - [`index_file`] adds the header block on top: the magic that
//!    identifies the file, the current root, and the next free block id.
//!  - [`btree`] implements the node codec and the search/insert algorithms
//!    over an open index file.
//!
//! Keys and values are both unsigned 64-bit integers; this crate does not
//! support variable-length keys, arbitrary values, or deletion.
//!
//! All I/O is synchronous: this index is meant to be driven by one thread
//! in one process at a time, so there is no async runtime anywhere in this
//! crate.

pub mod block;
pub mod btree;
pub mod index_file;

pub(crate) const BLOCK_SIZE: usize = 512;
