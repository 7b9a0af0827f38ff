//! An adaptive radix tree: an in-memory ordered map keyed by byte strings.
//!
//! Fan-out adapts per node between four variants (`Node4`, `Node16`,
//! `Node48`, `Node256`) as children are added and removed, and shared key
//! bytes along a chain of single-child nodes are compressed into one
//! prefix instead of one node per byte. The result keeps memory close to
//! `HashMap`-like for sparse keys while still supporting ordered iteration,
//! prefix scans, and `min`/`max` the way a sorted `BTreeMap` would, without
//! `BTreeMap`'s per-key string comparisons on every branch.
//!
//! ```
//! use artrie::AdaptiveRadixTree;
//! use bytes::Bytes;
//!
//! let mut tree = AdaptiveRadixTree::new();
//! tree.insert(Bytes::from_static(b"apple"), 1);
//! tree.insert(Bytes::from_static(b"apply"), 2);
//! assert_eq!(tree.search(b"apple"), Ok(&1));
//! assert_eq!(tree.len(), 2);
//! ```

mod error;
mod node;
mod tree;

pub use error::{ArtError, CallbackError, Result};
pub use node::MAX_PREFIX_LEN;
pub use tree::{AdaptiveRadixTree, Iter};

#[cfg(test)]
mod tests;
#[cfg(test)]
mod proptests;
