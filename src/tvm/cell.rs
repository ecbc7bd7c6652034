//! Cell implementation for TON blockchain
//!
//! A cell is a fundamental data structure in TON that can store up to 1023 bits
//! of data and maintain up to 4 references to other cells. Cells are immutable:
//! hashes and depths for every significant level are computed once, when the
//! cell is constructed.

use crate::tvm::bits;
use crate::tvm::error::{CellError, Result};
use crate::tvm::mask::Mask;
use crate::tvm::slice::Slice;
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::{Arc, LazyLock};

/// Maximum number of bits a cell can store
pub const MAX_CELL_BITS: usize = 1023;

/// Maximum number of references a cell can have
pub const MAX_CELL_REFS: usize = 4;

/// Cell level range (0-3)
pub const MAX_CELL_LEVEL: u8 = 3;

/// Cells at this depth or deeper can't be constructed
pub const MAX_CELL_DEPTH: u16 = 1024;

const HASH_BYTES: usize = 32;
const DEPTH_BYTES: usize = 2;
const HASH_BITS: usize = HASH_BYTES * 8;
const DEPTH_BITS: usize = DEPTH_BYTES * 8;

const EMPTY_CELL_HASH: [u8; 32] = [
    0x96, 0xa2, 0x96, 0xd2, 0x24, 0xf2, 0x85, 0xc6, 0x7b, 0xee, 0x93, 0xc3, 0x0f, 0x8a, 0x30, 0x91,
    0x57, 0xf0, 0xda, 0xa3, 0x5d, 0xc5, 0xb8, 0x7e, 0x41, 0x0b, 0x78, 0x63, 0x0a, 0x09, 0xcf, 0xc7,
];

/// Shared empty ordinary cell
pub static EMPTY_CELL: LazyLock<Arc<Cell>> = LazyLock::new(|| {
    Arc::new(Cell {
        data: Vec::new(),
        bit_len: 0,
        references: Vec::new(),
        cell_type: CellType::Ordinary,
        mask: Mask::new(0),
        hashes: vec![EMPTY_CELL_HASH],
        depths: vec![0],
    })
});

/// Cell kind. Exotic kinds carry their tag in the first data byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CellType {
    #[default]
    Ordinary,
    PrunedBranch,
    LibraryReference,
    MerkleProof,
    MerkleUpdate,
}

impl CellType {
    /// Numeric tag of the type (`-1` for ordinary cells)
    pub const fn tag(self) -> i8 {
        match self {
            CellType::Ordinary => -1,
            CellType::PrunedBranch => 1,
            CellType::LibraryReference => 2,
            CellType::MerkleProof => 3,
            CellType::MerkleUpdate => 4,
        }
    }

    pub fn from_tag(tag: i8) -> Result<Self> {
        match tag {
            -1 => Ok(CellType::Ordinary),
            1 => Ok(CellType::PrunedBranch),
            2 => Ok(CellType::LibraryReference),
            3 => Ok(CellType::MerkleProof),
            4 => Ok(CellType::MerkleUpdate),
            other => Err(CellError::UnknownType(other)),
        }
    }

    pub const fn is_exotic(self) -> bool {
        !matches!(self, CellType::Ordinary)
    }

    pub const fn is_merkle(self) -> bool {
        matches!(self, CellType::MerkleProof | CellType::MerkleUpdate)
    }
}

impl fmt::Display for CellType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CellType::Ordinary => "Ordinary",
            CellType::PrunedBranch => "Pruned Branch",
            CellType::LibraryReference => "Library Reference",
            CellType::MerkleProof => "Merkle Proof",
            CellType::MerkleUpdate => "Merkle Update",
        };
        f.write_str(name)
    }
}

/// Represents a cell in the TON blockchain
#[derive(Clone)]
pub struct Cell {
    /// Cell data as bytes, trailing bits past `bit_len` are zero
    data: Vec<u8>,
    /// Number of bits in the cell (not necessarily a multiple of 8)
    bit_len: usize,
    /// References to other cells
    references: Vec<Arc<Cell>>,
    cell_type: CellType,
    mask: Mask,
    /// One hash per computed significant level, lowest first
    hashes: Vec<[u8; 32]>,
    depths: Vec<u16>,
}

impl Cell {
    /// Creates a cell of the given type, validating its layout and computing
    /// hashes for all significant levels
    pub fn with_parts(
        data: Vec<u8>,
        bit_len: usize,
        references: Vec<Arc<Cell>>,
        cell_type: CellType,
    ) -> Result<Self> {
        if data.len() < bit_len.div_ceil(8) {
            return Err(CellError::Validation(format!(
                "Data length {} is insufficient for {} bits",
                data.len(),
                bit_len
            )));
        }

        let data = bits::normalize(data, bit_len);
        validate(&data, bit_len, &references, cell_type)?;

        let mask = match cell_type {
            CellType::Ordinary => references
                .iter()
                .fold(Mask::new(0), |acc, r| acc | r.mask()),
            CellType::PrunedBranch => Mask::new(data[1]),
            CellType::LibraryReference => Mask::new(0),
            CellType::MerkleProof => references[0].mask() >> 1,
            CellType::MerkleUpdate => (references[0].mask() | references[1].mask()) >> 1,
        };

        let mut cell = Self {
            data,
            bit_len,
            references,
            cell_type,
            mask,
            hashes: Vec::with_capacity(mask.hash_count()),
            depths: Vec::with_capacity(mask.hash_count()),
        };
        cell.compute_hashes()?;

        Ok(cell)
    }

    /// Creates an ordinary leaf cell with the given data and bit length
    pub fn with_data(data: Vec<u8>, bit_len: usize) -> Result<Self> {
        Self::with_parts(data, bit_len, Vec::new(), CellType::Ordinary)
    }

    /// Creates a cell from unpacked bits
    pub fn from_bits(bits: &[bool], references: Vec<Arc<Cell>>, cell_type: CellType) -> Result<Self> {
        Self::with_parts(bits::from_bools(bits), bits.len(), references, cell_type)
    }

    /// Returns the shared empty ordinary cell
    pub fn empty() -> Arc<Cell> {
        EMPTY_CELL.clone()
    }

    fn compute_hashes(&mut self) -> Result<()> {
        let is_pruned = self.cell_type == CellType::PrunedBranch;
        let ref_level_shift = u8::from(self.cell_type.is_merkle());
        // Pruned branches store the hashes of lower levels in their data
        let offset = if is_pruned { self.mask.hash_count() - 1 } else { 0 };

        let mut hash_index = 0;
        for level in 0..=self.mask.level() {
            if !self.mask.is_significant(level) {
                continue;
            }
            if hash_index < offset {
                hash_index += 1;
                continue;
            }
            if (hash_index == offset && level != 0 && !is_pruned)
                || (hash_index != offset && level == 0 && is_pruned)
            {
                return Err(CellError::Validation(
                    "Can't deserialize cell: inconsistent level mask".to_string(),
                ));
            }

            let ref_level = level + ref_level_shift;
            let mut hasher = Sha256::new();
            hasher.update([
                self.refs_descriptor(Some(self.mask.apply(level))),
                self.bits_descriptor(),
            ]);
            if hash_index == offset {
                hasher.update(self.augmented_data());
            } else {
                hasher.update(self.hashes[hash_index - offset - 1]);
            }

            let mut max_depth = 0u16;
            for reference in &self.references {
                let depth = reference.depth_at(ref_level);
                hasher.update(depth.to_be_bytes());
                max_depth = max_depth.max(depth);
            }
            for reference in &self.references {
                hasher.update(reference.hash_at(ref_level));
            }

            let depth = if self.references.is_empty() {
                0
            } else {
                max_depth.saturating_add(1)
            };
            if depth >= MAX_CELL_DEPTH {
                return Err(CellError::Validation(format!(
                    "Cell depth can't be more than {}, got \"{}\"",
                    MAX_CELL_DEPTH - 1,
                    depth
                )));
            }

            let mut hash = [0u8; 32];
            hash.copy_from_slice(&hasher.finalize());
            self.hashes.push(hash);
            self.depths.push(depth);

            hash_index += 1;
        }

        Ok(())
    }

    /// Representation hash at the given level
    pub fn hash_at(&self, level: u8) -> [u8; 32] {
        let hash_index = self.mask.apply(level).hash_index();
        if self.cell_type != CellType::PrunedBranch {
            return self.hashes[hash_index];
        }

        if hash_index != self.mask.hash_index() {
            let offset = 2 + hash_index * HASH_BYTES;
            let mut hash = [0u8; 32];
            hash.copy_from_slice(&self.data[offset..offset + HASH_BYTES]);
            hash
        } else {
            self.hashes[0]
        }
    }

    /// Depth at the given level
    pub fn depth_at(&self, level: u8) -> u16 {
        let hash_index = self.mask.apply(level).hash_index();
        if self.cell_type != CellType::PrunedBranch {
            return self.depths[hash_index];
        }

        let this_hash_index = self.mask.hash_index();
        if hash_index != this_hash_index {
            let offset = 2 + this_hash_index * HASH_BYTES + hash_index * DEPTH_BYTES;
            u16::from_be_bytes([self.data[offset], self.data[offset + 1]])
        } else {
            self.depths[0]
        }
    }

    /// Computes the representation hash of the cell (highest level)
    pub fn hash(&self) -> [u8; 32] {
        self.hash_at(MAX_CELL_LEVEL)
    }

    /// Computes the depth of the cell (highest level)
    pub fn depth(&self) -> u16 {
        self.depth_at(MAX_CELL_LEVEL)
    }

    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash())
    }

    pub fn mask(&self) -> Mask {
        self.mask
    }

    /// Returns the cell's level
    pub fn level(&self) -> u8 {
        self.mask.level()
    }

    pub fn cell_type(&self) -> CellType {
        self.cell_type
    }

    /// Returns whether this is an exotic cell
    pub fn is_exotic(&self) -> bool {
        self.cell_type.is_exotic()
    }

    /// Returns the number of bits in the cell
    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    /// Returns the cell's data
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Returns the cell's data as unpacked bits
    pub fn bits(&self) -> Vec<bool> {
        bits::to_bools(&self.data, 0, self.bit_len)
    }

    /// Returns the cell's references
    pub fn references(&self) -> &[Arc<Cell>] {
        &self.references
    }

    /// Gets a reference by index
    pub fn reference(&self, index: usize) -> Option<&Arc<Cell>> {
        self.references.get(index)
    }

    /// Returns the number of references
    pub fn reference_count(&self) -> usize {
        self.references.len()
    }

    /// First descriptor byte: `refs + 8 * exotic + 32 * mask`
    ///
    /// Uses the cell's own mask when `mask` is `None`.
    pub fn refs_descriptor(&self, mask: Option<Mask>) -> u8 {
        let mask = mask.unwrap_or(self.mask);
        self.references.len() as u8 + 8 * u8::from(self.is_exotic()) + 32 * mask.value()
    }

    /// Second descriptor byte: `ceil(bits / 8) + floor(bits / 8)`
    pub fn bits_descriptor(&self) -> u8 {
        (self.bit_len.div_ceil(8) + self.bit_len / 8) as u8
    }

    /// Computes the cell's descriptors (2 bytes)
    pub fn descriptors(&self) -> [u8; 2] {
        [self.refs_descriptor(None), self.bits_descriptor()]
    }

    /// Cell data padded with a completion tag up to a whole number of bytes
    pub fn augmented_data(&self) -> Vec<u8> {
        bits::augment(&self.data, self.bit_len, 8).0
    }

    /// Creates a reader over a copy of this cell's content
    pub fn slice(&self) -> Slice {
        Slice::parse(self)
    }

    /// Renders the cell tree in fift hex notation, one cell per line
    pub fn print(&self, indent: usize) -> String {
        let mut output = String::new();
        let mut stack: Vec<(&Cell, usize)> = vec![(self, 0)];

        while let Some((cell, depth)) = stack.pop() {
            output.push_str(&" ".repeat(indent * depth));
            output.push_str("x{");
            output.push_str(&bits::to_fift_hex(&cell.data, cell.bit_len));
            output.push_str("}\n");

            for reference in cell.references.iter().rev() {
                stack.push((reference, depth + 1));
            }
        }

        output
    }
}

fn validate(data: &[u8], bit_len: usize, refs: &[Arc<Cell>], cell_type: CellType) -> Result<()> {
    let fail = |msg: String| Err(CellError::Validation(msg));

    match cell_type {
        CellType::Ordinary => {
            if bit_len > MAX_CELL_BITS {
                return fail(format!(
                    "Ordinary cell can't have more than {} bits, got \"{}\"",
                    MAX_CELL_BITS, bit_len
                ));
            }
            if refs.len() > MAX_CELL_REFS {
                return fail(format!(
                    "Ordinary cell can't have more than {} refs, got \"{}\"",
                    MAX_CELL_REFS,
                    refs.len()
                ));
            }
        }
        CellType::PrunedBranch => {
            let min_size = 8 + 8 + HASH_BITS + DEPTH_BITS;
            if bit_len < min_size {
                return fail(format!(
                    "Pruned Branch cell can't have less than {} bits, got \"{}\"",
                    min_size, bit_len
                ));
            }
            if !refs.is_empty() {
                return fail(format!(
                    "Pruned Branch cell can't have refs, got \"{}\"",
                    refs.len()
                ));
            }
            check_type_byte(data, cell_type)?;

            let mask = Mask::new(data[1]);
            if !(1..=MAX_CELL_LEVEL).contains(&mask.level()) {
                return fail(format!(
                    "Pruned Branch cell level must be >= 1 and <= 3, got \"{}\"",
                    mask.level()
                ));
            }

            let hash_count = mask.apply(mask.level() - 1).hash_count();
            let size = 8 + 8 + hash_count * (HASH_BITS + DEPTH_BITS);
            if bit_len != size {
                return fail(format!(
                    "Pruned Branch cell with level \"{}\" must have exactly {} bits, got \"{}\"",
                    mask.level(),
                    size,
                    bit_len
                ));
            }
        }
        CellType::LibraryReference => {
            let size = 8 + HASH_BITS;
            if bit_len != size {
                return fail(format!(
                    "Library Reference cell must have exactly {} bits, got \"{}\"",
                    size, bit_len
                ));
            }
            if !refs.is_empty() {
                return fail(format!(
                    "Library Reference cell can't have refs, got \"{}\"",
                    refs.len()
                ));
            }
            check_type_byte(data, cell_type)?;
        }
        CellType::MerkleProof => {
            let size = 8 + HASH_BITS + DEPTH_BITS;
            if bit_len != size {
                return fail(format!(
                    "Merkle Proof cell must have exactly {} bits, got \"{}\"",
                    size, bit_len
                ));
            }
            if refs.len() != 1 {
                return fail(format!(
                    "Merkle Proof cell must have exactly 1 ref, got \"{}\"",
                    refs.len()
                ));
            }
            check_type_byte(data, cell_type)?;

            let depth_offset = 1 + HASH_BYTES;
            check_merkle_ref(
                "Merkle Proof cell ref",
                &data[1..depth_offset],
                u16::from_be_bytes([data[depth_offset], data[depth_offset + 1]]),
                &refs[0],
            )?;
        }
        CellType::MerkleUpdate => {
            let size = 8 + 2 * (HASH_BITS + DEPTH_BITS);
            if bit_len != size {
                return fail(format!(
                    "Merkle Update cell must have exactly {} bits, got \"{}\"",
                    size, bit_len
                ));
            }
            if refs.len() != 2 {
                return fail(format!(
                    "Merkle Update cell must have exactly 2 refs, got \"{}\"",
                    refs.len()
                ));
            }
            check_type_byte(data, cell_type)?;

            for (i, reference) in refs.iter().enumerate() {
                let hash_offset = 1 + i * HASH_BYTES;
                let depth_offset = 1 + 2 * HASH_BYTES + i * DEPTH_BYTES;
                check_merkle_ref(
                    &format!("Merkle Update cell ref #{}", i),
                    &data[hash_offset..hash_offset + HASH_BYTES],
                    u16::from_be_bytes([data[depth_offset], data[depth_offset + 1]]),
                    reference,
                )?;
            }
        }
    }

    Ok(())
}

fn check_type_byte(data: &[u8], cell_type: CellType) -> Result<()> {
    let tag = data[0] as i8;
    if tag != cell_type.tag() {
        return Err(CellError::Validation(format!(
            "{} cell type must be exactly {}, got \"{}\"",
            cell_type,
            cell_type.tag(),
            tag
        )));
    }
    Ok(())
}

fn check_merkle_ref(what: &str, hash: &[u8], depth: u16, reference: &Cell) -> Result<()> {
    let ref_hash = reference.hash_at(0);
    if hash != ref_hash {
        return Err(CellError::Validation(format!(
            "{} hash must be exactly \"{}\", got \"{}\"",
            what,
            hex::encode(hash),
            hex::encode(ref_hash)
        )));
    }

    let ref_depth = reference.depth_at(0);
    if depth != ref_depth {
        return Err(CellError::Validation(format!(
            "{} depth must be exactly \"{}\", got \"{}\"",
            what, depth, ref_depth
        )));
    }

    Ok(())
}

impl Default for Cell {
    fn default() -> Self {
        EMPTY_CELL.as_ref().clone()
    }
}

impl PartialEq for Cell {
    fn eq(&self, other: &Self) -> bool {
        self.hash() == other.hash()
    }
}

impl Eq for Cell {}

impl std::hash::Hash for Cell {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        Cell::hash(self).hash(state);
    }
}

impl fmt::Debug for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cell")
            .field("cell_type", &self.cell_type)
            .field("bits", &bits::to_fift_hex(&self.data, self.bit_len))
            .field("references", &self.references)
            .field("hash", &self.hash_hex())
            .finish()
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.print(1))
    }
}
