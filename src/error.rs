//! Error types for the adaptive radix tree core.

use thiserror::Error;

/// Errors produced by [`crate::AdaptiveRadixTree`] operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArtError {
    /// `search`/`delete` was called with a key that is not present in the tree.
    #[error("key not found")]
    NotFound,

    /// `minimum`/`maximum` was called on a tree with no entries.
    #[error("tree is empty")]
    Empty,
}

/// Result alias for core tree operations.
pub type Result<T> = std::result::Result<T, ArtError>;

/// Error produced by [`crate::AdaptiveRadixTree::try_for_each`] when the caller's
/// callback aborts traversal.
///
/// Wraps the callback's own error type unchanged so the caller can recover it
/// with `?` or a `match` without any string-ification in between.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("traversal callback aborted: {0}")]
pub struct CallbackError<E>(pub E);
