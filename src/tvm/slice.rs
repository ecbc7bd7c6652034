//! Slice implementation for reading data from cells
//!
//! A Slice owns a copy of a cell's bits and references and reads them
//! sequentially, tracking the current position in both. `load_*` methods
//! consume data, `preload_*` methods only look at it. A failing load leaves
//! the position untouched.

use crate::tvm::address::Address;
use crate::tvm::bits;
use crate::tvm::cell::Cell;
use crate::tvm::coins::{COINS_MAX_LEN, Coins};
use crate::tvm::dict::Dictionary;
use crate::tvm::error::{CellError, Result};
use num_bigint::{BigInt, BigUint};
use num_traits::{One, ToPrimitive};
use std::sync::Arc;

/// A slice for reading data from a cell
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slice {
    data: Vec<u8>,
    bit_len: usize,
    /// Current bit position
    bit_pos: usize,
    refs: Vec<Arc<Cell>>,
    /// Current reference position
    ref_pos: usize,
}

impl Slice {
    /// Creates a slice over a copy of the cell content
    pub fn parse(cell: &Cell) -> Self {
        Self::from_parts(cell.data().to_vec(), cell.bit_len(), cell.references().to_vec())
    }

    /// Creates a slice from packed bits and references
    pub fn from_parts(data: Vec<u8>, bit_len: usize, refs: Vec<Arc<Cell>>) -> Self {
        let mut data = bits::normalize(data, bit_len);
        data.resize(bit_len.div_ceil(8), 0);
        Self {
            data,
            bit_len,
            bit_pos: 0,
            refs,
            ref_pos: 0,
        }
    }

    /// Returns the number of remaining bits
    pub fn remaining_bits(&self) -> usize {
        self.bit_len - self.bit_pos
    }

    /// Returns the number of remaining references
    pub fn remaining_refs(&self) -> usize {
        self.refs.len() - self.ref_pos
    }

    /// Checks if there are any remaining bits or references
    pub fn is_empty(&self) -> bool {
        self.remaining_bits() == 0 && self.remaining_refs() == 0
    }

    /// Remaining bits, unpacked
    pub fn bits(&self) -> Vec<bool> {
        bits::to_bools(&self.data, self.bit_pos, self.remaining_bits())
    }

    /// Remaining references
    pub fn refs(&self) -> &[Arc<Cell>] {
        &self.refs[self.ref_pos..]
    }

    /// Gets the current bit position
    pub fn bit_position(&self) -> usize {
        self.bit_pos
    }

    /// Gets the current reference position
    pub fn ref_position(&self) -> usize {
        self.ref_pos
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

    /// Runs a compound load, rewinding the cursor if any step fails
    fn atomically<T>(&mut self, load: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let (bit_pos, ref_pos) = (self.bit_pos, self.ref_pos);
        let result = load(self);
        if result.is_err() {
            self.bit_pos = bit_pos;
            self.ref_pos = ref_pos;
        }
        result
    }

    /// Runs a load on a throwaway cursor
    fn peek<T>(&self, load: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let mut cursor = self.clone();
        load(&mut cursor)
    }

    /// Skips a number of bits
    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.skip_bits(n)
    }

    /// Skips a number of bits
    pub fn skip_bits(&mut self, n: usize) -> Result<()> {
        self.check_bits(n)?;
        self.bit_pos += n;
        Ok(())
    }

    /// Skips a number of references
    pub fn skip_refs(&mut self, n: usize) -> Result<()> {
        self.check_refs(n)?;
        self.ref_pos += n;
        Ok(())
    }

    /// Skips a `HashmapE`: one bit, plus the root reference when it is set
    pub fn skip_dict(&mut self) -> Result<()> {
        self.atomically(|s| {
            if s.load_bit()? {
                s.skip_refs(1)?;
            }
            Ok(())
        })
    }

    /// Loads a single bit
    pub fn load_bit(&mut self) -> Result<bool> {
        self.check_bits(1)?;
        let bit = bits::get_bit(&self.data, self.bit_pos);
        self.bit_pos += 1;
        Ok(bit)
    }

    pub fn preload_bit(&self) -> Result<bool> {
        self.check_bits(1)?;
        Ok(bits::get_bit(&self.data, self.bit_pos))
    }

    /// Loads `n` bits, unpacked
    pub fn load_bits(&mut self, n: usize) -> Result<Vec<bool>> {
        self.check_bits(n)?;
        let result = bits::to_bools(&self.data, self.bit_pos, n);
        self.bit_pos += n;
        Ok(result)
    }

    pub fn preload_bits(&self, n: usize) -> Result<Vec<bool>> {
        self.peek(|s| s.load_bits(n))
    }

    /// Loads `n` bits packed MSB first into bytes
    pub fn load_raw_bits(&mut self, n: usize) -> Result<Vec<u8>> {
        self.check_bits(n)?;
        let result = bits::copy_bits(&self.data, self.bit_pos, n);
        self.bit_pos += n;
        Ok(result)
    }

    pub fn preload_raw_bits(&self, n: usize) -> Result<Vec<u8>> {
        self.peek(|s| s.load_raw_bits(n))
    }

    /// Loads an unsigned integer of any width
    pub fn load_big_uint(&mut self, bits: usize) -> Result<BigUint> {
        let raw = self.load_raw_bits(bits)?;
        let padding = raw.len() * 8 - bits;
        Ok(BigUint::from_bytes_be(&raw) >> padding)
    }

    pub fn preload_big_uint(&self, bits: usize) -> Result<BigUint> {
        self.peek(|s| s.load_big_uint(bits))
    }

    /// Loads a two's complement signed integer of any width
    pub fn load_big_int(&mut self, bits: usize) -> Result<BigInt> {
        self.check_bits(bits)?;
        let negative = bits > 0 && bits::get_bit(&self.data, self.bit_pos);
        let value = BigInt::from(self.load_big_uint(bits)?);
        if negative {
            Ok(value - (BigInt::one() << bits))
        } else {
            Ok(value)
        }
    }

    pub fn preload_big_int(&self, bits: usize) -> Result<BigInt> {
        self.peek(|s| s.load_big_int(bits))
    }

    /// Loads a uint with a specific number of bits
    pub fn load_uint(&mut self, bits: usize) -> Result<u64> {
        self.atomically(|s| {
            let value = s.load_big_uint(bits)?;
            value.to_u64().ok_or_else(|| {
                CellError::Range(format!("Loaded value {} doesn't fit into u64", value))
            })
        })
    }

    pub fn preload_uint(&self, bits: usize) -> Result<u64> {
        self.peek(|s| s.load_uint(bits))
    }

    /// Loads a signed integer with a specific number of bits
    pub fn load_int(&mut self, bits: usize) -> Result<i64> {
        self.atomically(|s| {
            let value = s.load_big_int(bits)?;
            value.to_i64().ok_or_else(|| {
                CellError::Range(format!("Loaded value {} doesn't fit into i64", value))
            })
        })
    }

    pub fn preload_int(&self, bits: usize) -> Result<i64> {
        self.peek(|s| s.load_int(bits))
    }

    /// Loads a byte (8 bits)
    pub fn load_u8(&mut self) -> Result<u8> {
        Ok(self.load_uint(8)? as u8)
    }

    pub fn preload_u8(&self) -> Result<u8> {
        Ok(self.preload_uint(8)? as u8)
    }

    /// Loads a u16 value (16 bits, big-endian)
    pub fn load_u16(&mut self) -> Result<u16> {
        Ok(self.load_uint(16)? as u16)
    }

    pub fn preload_u16(&self) -> Result<u16> {
        Ok(self.preload_uint(16)? as u16)
    }

    /// Loads a u32 value (32 bits, big-endian)
    pub fn load_u32(&mut self) -> Result<u32> {
        Ok(self.load_uint(32)? as u32)
    }

    pub fn preload_u32(&self) -> Result<u32> {
        Ok(self.preload_uint(32)? as u32)
    }

    /// Loads a u64 value (64 bits, big-endian)
    pub fn load_u64(&mut self) -> Result<u64> {
        self.load_uint(64)
    }

    pub fn preload_u64(&self) -> Result<u64> {
        self.preload_uint(64)
    }

    /// Byte count prefix of a var integer, which must stay below `max_len`
    fn load_var_len(&mut self, max_len: usize) -> Result<usize> {
        let len = self.load_uint(bits::var_len_bits(max_len))? as usize;
        if len >= max_len {
            return Err(CellError::Range(format!(
                "Var integer length {} exceeds the limit of {} bytes",
                len,
                max_len.saturating_sub(1)
            )));
        }
        Ok(len)
    }

    /// Loads a `VarUInteger max_len`: a `ceil(log2(max_len))`-bit byte count,
    /// then that many bytes of value
    pub fn load_var_big_uint(&mut self, max_len: usize) -> Result<BigUint> {
        self.atomically(|s| {
            let len = s.load_var_len(max_len)?;
            s.load_big_uint(len * 8)
        })
    }

    pub fn preload_var_big_uint(&self, max_len: usize) -> Result<BigUint> {
        self.peek(|s| s.load_var_big_uint(max_len))
    }

    /// Loads a `VarInteger max_len`
    pub fn load_var_big_int(&mut self, max_len: usize) -> Result<BigInt> {
        self.atomically(|s| {
            let len = s.load_var_len(max_len)?;
            s.load_big_int(len * 8)
        })
    }

    pub fn preload_var_big_int(&self, max_len: usize) -> Result<BigInt> {
        self.peek(|s| s.load_var_big_int(max_len))
    }

    pub fn load_var_uint(&mut self, max_len: usize) -> Result<u64> {
        self.atomically(|s| {
            let value = s.load_var_big_uint(max_len)?;
            value.to_u64().ok_or_else(|| {
                CellError::Range(format!("Loaded value {} doesn't fit into u64", value))
            })
        })
    }

    pub fn preload_var_uint(&self, max_len: usize) -> Result<u64> {
        self.peek(|s| s.load_var_uint(max_len))
    }

    pub fn load_var_int(&mut self, max_len: usize) -> Result<i64> {
        self.atomically(|s| {
            let value = s.load_var_big_int(max_len)?;
            value.to_i64().ok_or_else(|| {
                CellError::Range(format!("Loaded value {} doesn't fit into i64", value))
            })
        })
    }

    pub fn preload_var_int(&self, max_len: usize) -> Result<i64> {
        self.peek(|s| s.load_var_int(max_len))
    }

    /// Loads `n` bytes
    ///
    /// `n` counts bytes, not bits: `load_bytes(4)` consumes 32 bits.
    pub fn load_bytes(&mut self, n: usize) -> Result<Vec<u8>> {
        self.load_raw_bits(n * 8)
    }

    pub fn preload_bytes(&self, n: usize) -> Result<Vec<u8>> {
        self.preload_raw_bits(n * 8)
    }

    /// Loads a UTF-8 string of `size` bytes, or of all remaining bits when
    /// `size` is `None` (they must form whole bytes)
    pub fn load_string(&mut self, size: Option<usize>) -> Result<String> {
        self.atomically(|s| {
            let size = match size {
                Some(size) => size,
                None => {
                    let remaining = s.remaining_bits();
                    if remaining % 8 != 0 {
                        return Err(CellError::Range(format!(
                            "Slice: remaining {} bits don't form whole bytes",
                            remaining
                        )));
                    }
                    remaining / 8
                }
            };

            let bytes = s.load_bytes(size)?;
            String::from_utf8(bytes)
                .map_err(|e| CellError::Format(format!("Slice: invalid UTF-8 string: {}", e)))
        })
    }

    pub fn preload_string(&self, size: Option<usize>) -> Result<String> {
        self.peek(|s| s.load_string(size))
    }

    /// Loads a reference to another cell
    pub fn load_ref(&mut self) -> Result<Arc<Cell>> {
        let reference = self.preload_ref()?;
        self.ref_pos += 1;
        Ok(reference)
    }

    pub fn preload_ref(&self) -> Result<Arc<Cell>> {
        self.check_refs(1)?;
        Ok(self.refs[self.ref_pos].clone())
    }

    /// Loads an optional reference (Maybe ^Cell)
    pub fn load_maybe_ref(&mut self) -> Result<Option<Arc<Cell>>> {
        self.atomically(|s| {
            if s.load_bit()? {
                Ok(Some(s.load_ref()?))
            } else {
                Ok(None)
            }
        })
    }

    pub fn preload_maybe_ref(&self) -> Result<Option<Arc<Cell>>> {
        self.peek(|s| s.load_maybe_ref())
    }

    /// Loads `addr_none$00` as `None` or `addr_std$10` as an address.
    /// The anycast bit is read but ignored.
    pub fn load_address(&mut self) -> Result<Option<Address>> {
        self.atomically(|s| match s.load_uint(2)? {
            0b00 => Ok(None),
            0b10 => {
                s.skip_bits(1)?;
                let workchain = s.load_int(8)? as i8;
                let mut hash_part = [0u8; 32];
                hash_part.copy_from_slice(&s.load_bytes(32)?);
                Ok(Some(Address::new(workchain, hash_part)))
            }
            _ => Err(CellError::Validation(
                "Slice: bad address flag bits".to_string(),
            )),
        })
    }

    pub fn preload_address(&self) -> Result<Option<Address>> {
        self.peek(|s| s.load_address())
    }

    /// Loads coins (VarUInteger 16)
    pub fn load_coins(&mut self, decimals: u32) -> Result<Coins> {
        self.atomically(|s| {
            let nano = s.load_var_big_uint(COINS_MAX_LEN)?;
            Coins::from_nano(nano, decimals)
        })
    }

    pub fn preload_coins(&self, decimals: u32) -> Result<Coins> {
        self.peek(|s| s.load_coins(decimals))
    }

    /// Loads a `HashmapE` with `key_size`-bit keys
    pub fn load_dict<D: Dictionary>(&mut self, key_size: usize) -> Result<D> {
        self.atomically(|s| {
            if s.load_bit()? {
                let root = s.load_ref()?;
                D::parse(key_size, Slice::from_parts(vec![0x80], 1, vec![root]))
            } else {
                Ok(D::empty(key_size))
            }
        })
    }

    pub fn preload_dict<D: Dictionary>(&self, key_size: usize) -> Result<D> {
        self.peek(|s| s.load_dict(key_size))
    }
}

impl From<&Cell> for Slice {
    fn from(cell: &Cell) -> Self {
        Self::parse(cell)
    }
}

impl From<Arc<Cell>> for Slice {
    fn from(cell: Arc<Cell>) -> Self {
        Self::parse(&cell)
    }
}
