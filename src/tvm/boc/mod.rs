//! Bag of Cells (BoC) serialization and deserialization
//!
//! BoC is a serialization format that encodes a graph of cells into a byte
//! array. Three encodings of the same bag are supported: raw bytes, hex and
//! base64. The fift hex tree notation is accepted as a textual alternative.

use crate::tvm::cell::Cell;
use crate::tvm::error::{CellError, Result};
use base64::{Engine, engine::general_purpose::STANDARD};
use std::str::FromStr;
use std::sync::Arc;

pub mod de;
pub mod fift;
pub mod ser;

pub use de::{BocHeader, deserialize};
pub use fift::{deserialize_fift, to_fift_hex};
pub use ser::{SortedCells, breadth_first_sort, depth_first_sort, serialize};

/// BoC magic number for standard format
pub const BOC_GENERIC_MAGIC: u32 = 0xb5ee9c72;

/// BoC magic number for the lean indexed format
pub const BOC_INDEXED_MAGIC: u32 = 0x68ff65f3;

/// BoC magic number for the lean indexed format with CRC32C
pub const BOC_INDEXED_CRC32C_MAGIC: u32 = 0xacc3a728;

/// Maximum number of roots held by a [`Boc`]
pub const MAX_BOC_ROOTS: usize = 4;

/// Order in which cells are laid out in the serialized bag
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TopologicalOrder {
    #[default]
    BreadthFirst,
    DepthFirst,
}

/// Serializer settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BocOptions {
    /// Write the index of cell offsets after the root list
    pub has_index: bool,
    /// Append a CRC-32C checksum of everything before it
    pub hash_crc32: bool,
    pub has_cache_bits: bool,
    pub topological_order: TopologicalOrder,
    /// Two reserved header bits
    pub flags: u8,
}

impl Default for BocOptions {
    fn default() -> Self {
        Self {
            has_index: false,
            hash_crc32: true,
            has_cache_bits: false,
            topological_order: TopologicalOrder::BreadthFirst,
            flags: 0,
        }
    }
}

/// A set of 1 to 4 root cells sharing one bag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Boc {
    roots: Vec<Arc<Cell>>,
}

impl Boc {
    pub fn new(roots: Vec<Arc<Cell>>) -> Result<Self> {
        if roots.is_empty() || roots.len() > MAX_BOC_ROOTS {
            return Err(CellError::Validation(format!(
                "BOC must have from 1 to {} roots, got {}",
                MAX_BOC_ROOTS,
                roots.len()
            )));
        }
        Ok(Self { roots })
    }

    /// Parses a serialized bag
    pub fn from_bytes(data: &[u8], check_merkle_proofs: bool) -> Result<Self> {
        Self::new(deserialize(data, check_merkle_proofs)?)
    }

    /// Parses fift hex text
    pub fn from_fift(text: &str) -> Result<Self> {
        Self::new(deserialize_fift(text)?)
    }

    /// Parses text in any supported encoding: fift hex, hex or base64
    ///
    /// Fift hex carries no exotic cells, so it is rejected when merkle proofs
    /// are required.
    pub fn from_str_checked(data: &str, check_merkle_proofs: bool) -> Result<Self> {
        let data = data.trim();

        if data.starts_with("x{") {
            if check_merkle_proofs {
                return Err(CellError::Format(
                    "Fift hex can't contain Merkle Proofs".to_string(),
                ));
            }
            return Self::from_fift(data);
        }

        if let Ok(bytes) = hex::decode(data) {
            return Self::from_bytes(&bytes, check_merkle_proofs);
        }

        match STANDARD.decode(data) {
            Ok(bytes) => Self::from_bytes(&bytes, check_merkle_proofs),
            Err(_) => Err(CellError::Format(
                "BOC must be a fift hex, hex or base64 string".to_string(),
            )),
        }
    }

    pub fn to_bytes(&self, options: &BocOptions) -> Result<Vec<u8>> {
        serialize(&self.roots, options)
    }

    pub fn to_hex(&self, options: &BocOptions) -> Result<String> {
        Ok(hex::encode(self.to_bytes(options)?))
    }

    pub fn to_base64(&self, options: &BocOptions) -> Result<String> {
        Ok(STANDARD.encode(self.to_bytes(options)?))
    }

    pub fn to_fift(&self) -> String {
        to_fift_hex(&self.roots)
    }

    pub fn roots(&self) -> &[Arc<Cell>] {
        &self.roots
    }

    /// The first root
    pub fn root(&self) -> &Arc<Cell> {
        // Never empty, checked in `new`
        &self.roots[0]
    }

    pub fn into_roots(self) -> Vec<Arc<Cell>> {
        self.roots
    }
}

impl FromStr for Boc {
    type Err = CellError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_str_checked(s, false)
    }
}

impl IntoIterator for Boc {
    type Item = Arc<Cell>;
    type IntoIter = std::vec::IntoIter<Arc<Cell>>;

    fn into_iter(self) -> Self::IntoIter {
        self.roots.into_iter()
    }
}

impl<'a> IntoIterator for &'a Boc {
    type Item = &'a Arc<Cell>;
    type IntoIter = std::slice::Iter<'a, Arc<Cell>>;

    fn into_iter(self) -> Self::IntoIter {
        self.roots.iter()
    }
}

/// Serializes a cell and its references into a Bag of Cells (BoC) format
pub fn serialize_boc(root: &Arc<Cell>, has_crc32: bool) -> Result<Vec<u8>> {
    let options = BocOptions {
        hash_crc32: has_crc32,
        ..Default::default()
    };
    serialize(std::slice::from_ref(root), &options)
}

/// Deserializes a Bag of Cells (BoC) into its first root cell
pub fn deserialize_boc(data: &[u8]) -> Result<Arc<Cell>> {
    Ok(Boc::from_bytes(data, false)?.root().clone())
}

/// Converts a cell to a hex-encoded BoC string
pub fn boc_to_hex(cell: &Arc<Cell>, has_crc32: bool) -> Result<String> {
    Ok(hex::encode(serialize_boc(cell, has_crc32)?))
}

/// Parses a hex-encoded BoC string into a cell
pub fn hex_to_boc(hex_str: &str) -> Result<Arc<Cell>> {
    let bytes = hex::decode(hex_str.trim())
        .map_err(|e| CellError::Format(format!("Invalid BOC hex: {}", e)))?;
    deserialize_boc(&bytes)
}

/// Converts a cell to a base64-encoded BoC string
pub fn boc_to_base64(cell: &Arc<Cell>, has_crc32: bool) -> Result<String> {
    Ok(STANDARD.encode(serialize_boc(cell, has_crc32)?))
}

/// Parses a base64-encoded BoC string into a cell
pub fn base64_to_boc(base64_str: &str) -> Result<Arc<Cell>> {
    let bytes = STANDARD
        .decode(base64_str.trim())
        .map_err(|e| CellError::Format(format!("Invalid BOC base64: {}", e)))?;
    deserialize_boc(&bytes)
}

impl serde::Serialize for Cell {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        use serde::ser::Error;

        let root = Arc::new(self.clone());
        let boc = serialize(std::slice::from_ref(&root), &BocOptions::default())
            .map_err(S::Error::custom)?;

        if serializer.is_human_readable() {
            serializer.serialize_str(&STANDARD.encode(boc))
        } else {
            serializer.serialize_bytes(&boc)
        }
    }
}

/// Serde helpers for `Arc<Cell>` fields, used as `#[serde(with = "serde_boc")]`
///
/// Cells are stored as a base64 BoC for human-readable formats and as raw
/// BoC bytes otherwise.
pub mod serde_boc {
    use super::*;
    use serde::de::{Error, Visitor};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(
        cell: &Arc<Cell>,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        cell.as_ref().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Arc<Cell>, D::Error> {
        let bytes = if deserializer.is_human_readable() {
            let encoded = String::deserialize(deserializer)?;
            STANDARD.decode(encoded.trim()).map_err(D::Error::custom)?
        } else {
            deserializer.deserialize_bytes(BytesVisitor)?
        };

        deserialize_boc(&bytes).map_err(Error::custom)
    }

    struct BytesVisitor;

    impl<'de> Visitor<'de> for BytesVisitor {
        type Value = Vec<u8>;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("a byte array")
        }

        fn visit_bytes<E: Error>(self, v: &[u8]) -> std::result::Result<Self::Value, E> {
            Ok(v.to_vec())
        }

        fn visit_byte_buf<E: Error>(self, v: Vec<u8>) -> std::result::Result<Self::Value, E> {
            Ok(v)
        }

        fn visit_seq<A>(self, mut seq: A) -> std::result::Result<Self::Value, A::Error>
        where
            A: serde::de::SeqAccess<'de>,
        {
            let mut bytes = Vec::with_capacity(seq.size_hint().unwrap_or(0));
            while let Some(byte) = seq.next_element::<u8>()? {
                bytes.push(byte);
            }
            Ok(bytes)
        }
    }
}
