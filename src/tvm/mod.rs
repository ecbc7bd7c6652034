//! TVM (TON Virtual Machine) data structures and utilities
//!
//! This module provides implementations of fundamental TON blockchain data structures:
//! - Cell: The basic data structure that can store up to 1023 bits and up to 4 references
//! - Mask: Level mask of a cell, selecting which hashes are significant
//! - Builder: Accumulates bits and references and freezes them into a cell
//! - Slice: A reader for sequentially accessing cell data
//! - BoC: Bag of Cells serialization format for encoding cells into byte arrays
//! - Address, Coins, Dictionary: Values commonly stored in cells

pub mod address;
pub mod bits;
pub mod boc;
pub mod builder;
pub mod cell;
pub mod coins;
pub mod dict;
pub mod error;
pub mod mask;
pub mod slice;
#[cfg(test)]
pub mod tests;

pub use address::Address;
pub use boc::{
    Boc, BocOptions, TopologicalOrder, base64_to_boc, boc_to_base64, boc_to_hex, deserialize_boc,
    hex_to_boc, serialize_boc,
};
pub use builder::Builder;
pub use cell::{
    Cell, CellType, EMPTY_CELL, MAX_CELL_BITS, MAX_CELL_DEPTH, MAX_CELL_LEVEL, MAX_CELL_REFS,
};
pub use coins::Coins;
pub use dict::{Dictionary, RawDict};
pub use error::{CellError, Result};
pub use mask::Mask;
pub use slice::Slice;
