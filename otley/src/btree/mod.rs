//! The B-tree itself: node layout plus the search and split-on-descent
//! insertion algorithms that run on top of an [`crate::index_file::IndexFile`].

pub mod node;
mod tree;

pub use node::{Node, NodeError};
pub use tree::BTree;
