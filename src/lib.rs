//! Cells, multi-level cell hashing and Bag of Cells serialization.
//!
//! The [`tvm`] module holds the data model ([`tvm::Cell`], [`tvm::Builder`],
//! [`tvm::Slice`]) and the [`tvm::boc`] codec. [`cli`] backs the `tonboc` binary.

pub mod cli;
pub mod crc;
pub mod tvm;
pub mod utils;
