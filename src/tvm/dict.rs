//! Dictionary interface used by builders and slices
//!
//! Dictionaries in TON are binary tries (hashmaps) stored in cells. Cells only
//! need to know how to wrap and unwrap a trie root, so the trie logic lives
//! behind the [`Dictionary`] trait. [`RawDict`] keeps the root untouched.

use crate::tvm::builder::Builder;
use crate::tvm::cell::Cell;
use crate::tvm::error::Result;
use crate::tvm::slice::Slice;
use std::sync::Arc;

/// A dictionary that can be written to and read back from a `HashmapE`
pub trait Dictionary: Sized {
    /// Creates an empty dictionary with `key_size`-bit keys
    fn empty(key_size: usize) -> Self;

    /// Parses a non-empty dictionary from a slice holding its root reference
    fn parse(key_size: usize, slice: Slice) -> Result<Self>;

    /// Returns the trie root cell wrapped in a `HashmapE` cell:
    /// a `1` bit plus the root reference, or a single `0` bit when empty
    fn cell(&self) -> Result<Arc<Cell>>;
}

/// Dictionary whose trie root is kept as an opaque cell
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDict {
    key_size: usize,
    root: Option<Arc<Cell>>,
}

impl RawDict {
    pub fn with_root(key_size: usize, root: Arc<Cell>) -> Self {
        Self {
            key_size,
            root: Some(root),
        }
    }

    pub fn key_size(&self) -> usize {
        self.key_size
    }

    /// Trie root, `None` for an empty dictionary
    pub fn root(&self) -> Option<&Arc<Cell>> {
        self.root.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }
}

impl Dictionary for RawDict {
    fn empty(key_size: usize) -> Self {
        Self {
            key_size,
            root: None,
        }
    }

    fn parse(key_size: usize, mut slice: Slice) -> Result<Self> {
        let root = slice.load_maybe_ref()?;
        Ok(Self { key_size, root })
    }

    fn cell(&self) -> Result<Arc<Cell>> {
        let mut builder = Builder::new();
        builder.store_maybe_ref(self.root.clone())?;
        builder.build()
    }
}
