//! Builder for constructing cells
//!
//! A `Builder` accumulates bits (up to its capacity, 1023 by default) and up to
//! 4 references, then freezes them into an immutable [`Cell`]. Every store is
//! all-or-nothing: a call that fails leaves the builder exactly as it was.
//!
//! # Examples
//!
//! ```rust
//! use tonboc_rs::tvm::{Address, Builder, Coins};
//!
//! let mut builder = Builder::new();
//!
//! // Store an address
//! let addr = Address::new(0, [0u8; 32]);
//! builder.store_address(Some(&addr)).unwrap();
//!
//! // Store coins (1 TON)
//! builder.store_coins(&Coins::from(1_000_000_000)).unwrap();
//!
//! // Store a string
//! builder.store_string("Hello, TON!").unwrap();
//!
//! // Build the cell
//! let cell = builder.build().unwrap();
//! assert_eq!(cell.bit_len(), 267 + 4 + 32 + 88);
//! ```

use crate::tvm::address::{ADDRESS_BITS, Address};
use crate::tvm::bits;
use crate::tvm::cell::{Cell, CellType, MAX_CELL_BITS, MAX_CELL_REFS};
use crate::tvm::coins::{COINS_MAX_LEN, Coins};
use crate::tvm::dict::Dictionary;
use crate::tvm::error::{CellError, Result};
use crate::tvm::slice::Slice;
use num_bigint::{BigInt, Sign};
use num_traits::Zero;
use std::sync::Arc;

/// Bounded accumulator of bits and references
#[derive(Debug, Clone)]
pub struct Builder {
    data: Vec<u8>,
    bit_len: usize,
    references: Vec<Arc<Cell>>,
    capacity: usize,
}

impl Builder {
    /// Creates a new builder with the standard cell capacity
    pub fn new() -> Self {
        Self::with_capacity(MAX_CELL_BITS)
    }

    /// Creates a builder that accepts at most `capacity` bits
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity.div_ceil(8)),
            bit_len: 0,
            references: Vec::new(),
            capacity,
        }
    }

    /// Maximum number of bits this builder accepts
    pub fn size(&self) -> usize {
        self.capacity
    }

    /// Returns the number of bits used
    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    /// Returns the number of available bits
    pub fn remaining_bits(&self) -> usize {
        self.capacity - self.bit_len
    }

    /// Returns the number of available references
    pub fn remaining_refs(&self) -> usize {
        MAX_CELL_REFS - self.references.len()
    }

    /// Stored bits, unpacked
    pub fn bits(&self) -> Vec<bool> {
        bits::to_bools(&self.data, 0, self.bit_len)
    }

    /// Stored bits, packed MSB first
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn refs(&self) -> &[Arc<Cell>] {
        &self.references
    }

    fn check_bits(&self, requested: usize) -> Result<()> {
        let available = self.remaining_bits();
        if requested > available {
            return Err(CellError::BitsOverflow {
                requested,
                available,
            });
        }
        Ok(())
    }

    fn check_refs(&self, requested: usize) -> Result<()> {
        let available = self.remaining_refs();
        if requested > available {
            return Err(CellError::RefsOverflow {
                requested,
                available,
            });
        }
        Ok(())
    }

    /// Runs a compound store on a copy and commits it only on success
    fn atomically(&mut self, store: impl FnOnce(&mut Self) -> Result<()>) -> Result<&mut Self> {
        let mut draft = self.clone();
        store(&mut draft)?;
        *self = draft;
        Ok(self)
    }

    /// Stores a single bit
    pub fn store_bit(&mut self, bit: bool) -> Result<&mut Self> {
        self.check_bits(1)?;
        bits::push_bit(&mut self.data, &mut self.bit_len, bit);
        Ok(self)
    }

    /// Stores unpacked bits
    pub fn store_bits(&mut self, bits: &[bool]) -> Result<&mut Self> {
        self.check_bits(bits.len())?;
        for &bit in bits {
            bits::push_bit(&mut self.data, &mut self.bit_len, bit);
        }
        Ok(self)
    }

    /// Stores the first `bit_len` bits of a packed byte slice
    pub fn store_raw_bits(&mut self, data: &[u8], bit_len: usize) -> Result<&mut Self> {
        if data.len() < bit_len.div_ceil(8) {
            return Err(CellError::Range(format!(
                "Insufficient data for {} bits: got {} bytes",
                bit_len,
                data.len()
            )));
        }
        self.check_bits(bit_len)?;
        bits::append_bits(&mut self.data, &mut self.bit_len, data, 0, bit_len);
        Ok(self)
    }

    /// Stores a two's complement signed integer of `size` bits
    pub fn store_int(&mut self, value: impl Into<BigInt>, size: usize) -> Result<&mut Self> {
        let value = value.into();
        check_int_range(&value, size)?;
        self.check_bits(size)?;
        self.push_int_bits(&value, size);
        Ok(self)
    }

    /// Stores an unsigned integer of `size` bits
    pub fn store_uint(&mut self, value: impl Into<BigInt>, size: usize) -> Result<&mut Self> {
        let value = value.into();
        check_uint_range(&value, size)?;
        self.check_bits(size)?;
        self.push_int_bits(&value, size);
        Ok(self)
    }

    /// Appends the low `size` bits of `value`, MSB first. Range is checked by callers.
    fn push_int_bits(&mut self, value: &BigInt, size: usize) {
        for i in (0..size as u64).rev() {
            bits::push_bit(&mut self.data, &mut self.bit_len, value.bit(i));
        }
    }

    /// Stores a byte
    pub fn store_u8(&mut self, value: u8) -> Result<&mut Self> {
        self.store_raw_bits(&[value], 8)
    }

    /// Stores a u32 value
    pub fn store_u32(&mut self, value: u32) -> Result<&mut Self> {
        self.store_raw_bits(&value.to_be_bytes(), 32)
    }

    /// Stores a u64 value
    pub fn store_u64(&mut self, value: u64) -> Result<&mut Self> {
        self.store_raw_bits(&value.to_be_bytes(), 64)
    }

    /// Stores a variable-length signed integer (`VarInteger max_len`)
    pub fn store_var_int(&mut self, value: impl Into<BigInt>, max_len: usize) -> Result<&mut Self> {
        let value = value.into();
        let len = if value.is_zero() {
            0
        } else {
            signed_bit_width(&value).div_ceil(8)
        };
        self.store_var(&value, len, max_len, true)
    }

    /// Stores a variable-length unsigned integer (`VarUInteger max_len`)
    pub fn store_var_uint(&mut self, value: impl Into<BigInt>, max_len: usize) -> Result<&mut Self> {
        let value = value.into();
        if value.sign() == Sign::Minus {
            return Err(CellError::Range(format!(
                "Builder: can't store negative value {} as unsigned",
                value
            )));
        }
        let len = (value.bits() as usize).div_ceil(8);
        self.store_var(&value, len, max_len, false)
    }

    fn store_var(&mut self, value: &BigInt, len: usize, max_len: usize, signed: bool) -> Result<&mut Self> {
        if len >= max_len {
            return Err(CellError::Range(format!(
                "Builder: value {} needs {} bytes, VarInteger {} allows at most {}",
                value,
                len,
                max_len,
                max_len.saturating_sub(1)
            )));
        }

        let len_bits = bits::var_len_bits(max_len);
        self.atomically(|b| {
            b.store_uint(len as u64, len_bits)?;
            if signed {
                b.store_int(value.clone(), len * 8)?;
            } else {
                b.store_uint(value.clone(), len * 8)?;
            }
            Ok(())
        })
    }

    /// Stores multiple bytes
    pub fn store_bytes(&mut self, bytes: &[u8]) -> Result<&mut Self> {
        self.store_raw_bits(bytes, bytes.len() * 8)
    }

    /// Stores a string as its UTF-8 bytes
    pub fn store_string(&mut self, s: &str) -> Result<&mut Self> {
        self.store_bytes(s.as_bytes())
    }

    /// Stores a reference to another cell
    pub fn store_ref(&mut self, cell: Arc<Cell>) -> Result<&mut Self> {
        self.check_refs(1)?;
        self.references.push(cell);
        Ok(self)
    }

    /// Stores several references
    pub fn store_refs(&mut self, cells: &[Arc<Cell>]) -> Result<&mut Self> {
        self.check_refs(cells.len())?;
        self.references.extend_from_slice(cells);
        Ok(self)
    }

    /// Stores an optional reference (Maybe ^Cell)
    pub fn store_maybe_ref(&mut self, cell: Option<Arc<Cell>>) -> Result<&mut Self> {
        match cell {
            Some(c) => self.atomically(|b| {
                b.store_bit(true)?;
                b.store_ref(c)?;
                Ok(())
            }),
            None => self.store_bit(false),
        }
    }

    /// Stores the remaining bits and refs of a slice
    pub fn store_slice(&mut self, slice: &Slice) -> Result<&mut Self> {
        let bit_len = slice.remaining_bits();
        self.check_bits(bit_len)?;
        self.check_refs(slice.remaining_refs())?;

        let data = slice.preload_raw_bits(bit_len)?;
        bits::append_bits(&mut self.data, &mut self.bit_len, &data, 0, bit_len);
        self.references.extend_from_slice(slice.refs());
        Ok(self)
    }

    /// Stores a TON address, `None` as `addr_none$00`
    pub fn store_address(&mut self, address: Option<&Address>) -> Result<&mut Self> {
        match address {
            // addr_none$00
            None => self.store_raw_bits(&[0], 2),
            // addr_std$10 anycast:(Maybe Anycast) workchain_id:int8 address:bits256
            Some(addr) => {
                self.check_bits(ADDRESS_BITS)?;
                self.store_raw_bits(&[0b1000_0000], 3)?;
                self.store_int(addr.workchain, 8)?;
                self.store_bytes(&addr.hash_part)
            }
        }
    }

    /// Stores coins (VarUInteger 16)
    pub fn store_coins(&mut self, coins: &Coins) -> Result<&mut Self> {
        if coins.is_negative() {
            return Err(CellError::Range(format!(
                "Builder: coins value must be non-negative, got {}",
                coins
            )));
        }
        self.store_var_uint(coins.to_nano().clone(), COINS_MAX_LEN)
    }

    /// Stores a dictionary as `HashmapE`
    pub fn store_dict(&mut self, dict: &impl Dictionary) -> Result<&mut Self> {
        let cell = dict.cell()?;
        self.store_slice(&cell.slice())
    }

    /// Builds an ordinary cell
    pub fn build(&self) -> Result<Arc<Cell>> {
        self.build_as(CellType::Ordinary)
    }

    /// Builds a cell of the given type; exotic layouts are validated by the cell
    pub fn build_as(&self, cell_type: CellType) -> Result<Arc<Cell>> {
        let cell = Cell::with_parts(
            self.data.clone(),
            self.bit_len,
            self.references.clone(),
            cell_type,
        )?;
        Ok(Arc::new(cell))
    }

    /// Converts to a slice
    pub fn to_slice(&self) -> Result<Slice> {
        Ok(self.build()?.slice())
    }
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

/// Width of the shortest two's complement form of `value`, sign bit included
fn signed_bit_width(value: &BigInt) -> usize {
    let magnitude = if value.sign() == Sign::Minus {
        -value - 1
    } else {
        value.clone()
    };
    magnitude.bits() as usize + 1
}

fn check_int_range(value: &BigInt, size: usize) -> Result<()> {
    let fits = if size == 0 {
        value.is_zero()
    } else {
        signed_bit_width(value) <= size
    };
    if !fits {
        return Err(CellError::Range(format!(
            "Builder: value {} doesn't fit into {} signed bits",
            value, size
        )));
    }
    Ok(())
}

fn check_uint_range(value: &BigInt, size: usize) -> Result<()> {
    if value.sign() == Sign::Minus {
        return Err(CellError::Range(format!(
            "Builder: can't store negative value {} as unsigned",
            value
        )));
    }
    if value.bits() as usize > size {
        return Err(CellError::Range(format!(
            "Builder: value {} doesn't fit into {} unsigned bits",
            value, size
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bit_string(builder: &Builder) -> String {
        builder
            .bits()
            .iter()
            .map(|&b| if b { '1' } else { '0' })
            .collect()
    }

    #[test]
    fn test_builder_basic() {
        let mut builder = Builder::new();
        builder.store_u32(0x12345678).unwrap();
        builder.store_u8(0xFF).unwrap();

        let cell = builder.build().unwrap();
        assert_eq!(cell.bit_len(), 40);
        assert_eq!(cell.data(), &[0x12, 0x34, 0x56, 0x78, 0xFF]);
    }

    #[test]
    fn test_store_int_patterns() {
        let mut builder = Builder::new();
        builder.store_int(-14, 15).unwrap();
        assert_eq!(bit_string(&builder), "111111111110010");

        let mut builder = Builder::new();
        builder.store_uint(14u32, 9).unwrap();
        assert_eq!(bit_string(&builder), "000001110");
    }

    #[test]
    fn test_store_int_range() {
        let mut builder = Builder::new();
        assert!(builder.store_int(127, 8).is_ok());
        assert!(builder.store_int(-128, 8).is_ok());
        assert!(matches!(builder.store_int(128, 8), Err(CellError::Range(_))));
        assert!(matches!(builder.store_int(-129, 8), Err(CellError::Range(_))));
        assert!(matches!(builder.store_uint(-1, 8), Err(CellError::Range(_))));
        assert!(matches!(builder.store_uint(256, 8), Err(CellError::Range(_))));
        assert!(builder.store_uint(0u8, 0).is_ok());
        assert!(builder.store_int(1, 0).is_err());
        assert_eq!(builder.bit_len(), 16);
    }

    #[test]
    fn test_store_var_int() {
        let mut builder = Builder::new();
        builder.store_var_int(-14, 4).unwrap();
        // 2 length bits, then one byte
        assert_eq!(bit_string(&builder), "0111110010");

        let mut builder = Builder::new();
        builder.store_var_uint(0u8, 16).unwrap();
        assert_eq!(bit_string(&builder), "0000");

        let mut builder = Builder::new();
        assert!(builder.store_var_uint(0x1_0000u32, 3).is_err());
        assert!(builder.store_var_int(128, 2).is_err());
        assert_eq!(builder.bit_len(), 0);
    }

    #[test]
    fn test_builder_overflow_boundary() {
        let mut builder = Builder::new();
        builder.store_raw_bits(&[0u8; 128], 1023).unwrap();
        assert_eq!(builder.remaining_bits(), 0);

        let err = builder.store_bit(true).unwrap_err();
        assert_eq!(
            err,
            CellError::BitsOverflow {
                requested: 1,
                available: 0
            }
        );
        assert!(err.is_overflow());
        assert_eq!(builder.bit_len(), 1023);
    }

    #[test]
    fn test_builder_with_capacity() {
        let mut builder = Builder::with_capacity(8);
        assert_eq!(builder.size(), 8);
        builder.store_u8(1).unwrap();
        assert!(builder.store_bit(false).is_err());
    }

    #[test]
    fn test_builder_refs_overflow() {
        let mut builder = Builder::new();
        builder.store_refs(&vec![Cell::empty(); 3]).unwrap();
        assert!(builder.store_refs(&vec![Cell::empty(); 2]).is_err());
        assert_eq!(builder.remaining_refs(), 1);

        builder.store_ref(Cell::empty()).unwrap();
        let err = builder.store_maybe_ref(Some(Cell::empty())).unwrap_err();
        assert!(matches!(err, CellError::RefsOverflow { .. }));
        // The maybe bit was rolled back
        assert_eq!(builder.bit_len(), 0);
    }

    #[test]
    fn test_builder_address() {
        let addr = Address::new(0, [0u8; 32]);
        let mut builder = Builder::new();
        builder.store_address(Some(&addr)).unwrap();

        let cell = builder.build().unwrap();
        // 2 bits (addr_std) + 1 bit (no anycast) + 8 bits (workchain) + 256 bits (hash) = 267 bits
        assert_eq!(cell.bit_len(), 267);

        let mut none = Builder::new();
        none.store_address(None).unwrap();
        assert_eq!(bit_string(&none), "00");
    }

    #[test]
    fn test_builder_coins() {
        let mut builder = Builder::new();
        builder.store_coins(&Coins::from(1_000_000_000)).unwrap();

        // 4 length bits + 4 bytes
        assert_eq!(builder.bit_len(), 36);

        let negative = Coins::from_nano(-1, 9).unwrap();
        assert!(builder.store_coins(&negative).is_err());
    }

    #[test]
    fn test_builder_string() {
        let mut builder = Builder::new();
        builder.store_string("Hello, TON!").unwrap();

        let cell = builder.build().unwrap();
        assert_eq!(cell.bit_len(), 11 * 8);
    }

    #[test]
    fn test_store_slice() {
        let mut inner = Builder::new();
        inner.store_raw_bits(&[0b1010_0000], 3).unwrap();
        inner.store_ref(Cell::empty()).unwrap();
        let mut slice = inner.to_slice().unwrap();
        slice.skip_bits(1).unwrap();

        let mut builder = Builder::new();
        builder.store_bit(true).unwrap();
        builder.store_slice(&slice).unwrap();
        assert_eq!(bit_string(&builder), "101");
        assert_eq!(builder.refs().len(), 1);
    }

    #[test]
    fn test_build_exotic() {
        let mut builder = Builder::new();
        builder.store_u8(2).unwrap();
        builder.store_bytes(&[0x55; 32]).unwrap();

        let cell = builder.build_as(CellType::LibraryReference).unwrap();
        assert!(cell.is_exotic());
        assert!(builder.build_as(CellType::MerkleProof).is_err());
    }

    #[test]
    fn test_builder_is_reusable() {
        let mut builder = Builder::new();
        builder.store_u8(7).unwrap();
        let first = builder.build().unwrap();
        let second = builder.clone().build().unwrap();
        assert_eq!(first, second);
    }
}
