//! Helpers for packed bit strings
//!
//! Bits are packed MSB first: bit `i` lives in byte `i / 8` at position
//! `7 - i % 8`. Unused trailing bits of the last byte are kept zeroed.

use crate::tvm::error::{CellError, Result};

/// Returns the bit at `index`
#[inline]
pub fn get_bit(data: &[u8], index: usize) -> bool {
    (data[index / 8] >> (7 - index % 8)) & 1 == 1
}

/// Appends a single bit to a packed buffer holding `bit_len` bits
#[inline]
pub fn push_bit(data: &mut Vec<u8>, bit_len: &mut usize, bit: bool) {
    if *bit_len % 8 == 0 {
        data.push(0);
    }
    if bit {
        data[*bit_len / 8] |= 1 << (7 - *bit_len % 8);
    }
    *bit_len += 1;
}

/// Appends `len` bits of `src` starting at `offset`
pub fn append_bits(data: &mut Vec<u8>, bit_len: &mut usize, src: &[u8], offset: usize, len: usize) {
    if *bit_len % 8 == 0 && offset % 8 == 0 {
        // Fast path: both sides are byte aligned
        let start = offset / 8;
        let full = len / 8;
        data.extend_from_slice(&src[start..start + full]);
        *bit_len += full * 8;
        for i in full * 8..len {
            push_bit(data, bit_len, get_bit(src, offset + i));
        }
        return;
    }

    for i in 0..len {
        push_bit(data, bit_len, get_bit(src, offset + i));
    }
}

/// Copies `len` bits of `src` starting at `offset` into a new packed buffer
pub fn copy_bits(src: &[u8], offset: usize, len: usize) -> Vec<u8> {
    let mut data = Vec::with_capacity(len.div_ceil(8));
    let mut bit_len = 0;
    append_bits(&mut data, &mut bit_len, src, offset, len);
    data
}

/// Truncates `data` to `bit_len` bits and clears the unused tail
pub fn normalize(mut data: Vec<u8>, bit_len: usize) -> Vec<u8> {
    data.truncate(bit_len.div_ceil(8));
    if bit_len % 8 != 0 {
        if let Some(last) = data.last_mut() {
            *last &= 0xFF << (8 - bit_len % 8);
        }
    }
    data
}

/// Pads `bit_len` bits with a single `1` and zeros up to a multiple of `divisor`.
///
/// Returns the padded data and its new length. Data already aligned to
/// `divisor` is returned unchanged.
pub fn augment(data: &[u8], bit_len: usize, divisor: usize) -> (Vec<u8>, usize) {
    let mut result = normalize(data.to_vec(), bit_len);
    if bit_len % divisor == 0 {
        return (result, bit_len);
    }

    let mut len = bit_len;
    push_bit(&mut result, &mut len, true);
    while len % divisor != 0 {
        push_bit(&mut result, &mut len, false);
    }
    (result, len)
}

/// Finds the length of augmented data: everything before the last `1` bit
pub fn rollback(data: &[u8], bit_len: usize) -> Option<usize> {
    (0..bit_len).rev().find(|&i| get_bit(data, i))
}

/// Size of the length prefix of a variable-length integer with `max_len` bytes:
/// `ceil(log2(max_len))`
pub fn var_len_bits(max_len: usize) -> usize {
    if max_len <= 1 {
        return 0;
    }
    (usize::BITS - (max_len - 1).leading_zeros()) as usize
}

/// Unpacks bits into a vector of booleans
pub fn to_bools(data: &[u8], offset: usize, len: usize) -> Vec<bool> {
    (offset..offset + len).map(|i| get_bit(data, i)).collect()
}

/// Packs booleans into bytes
pub fn from_bools(bits: &[bool]) -> Vec<u8> {
    let mut data = Vec::with_capacity(bits.len().div_ceil(8));
    let mut bit_len = 0;
    for &bit in bits {
        push_bit(&mut data, &mut bit_len, bit);
    }
    data
}

/// Renders bits as fift hex: uppercase nibbles, `_` suffix when the last
/// nibble is padded with a completion tag
pub fn to_fift_hex(data: &[u8], bit_len: usize) -> String {
    let (augmented, len) = augment(data, bit_len, 4);
    let mut hex = hex::encode_upper(&augmented);
    hex.truncate(len / 4);
    if len != bit_len {
        hex.push('_');
    }
    hex
}

/// Parses the body of an `x{...}` fift hex literal into packed bits
pub fn parse_fift_hex(fift: &str) -> Result<(Vec<u8>, usize)> {
    let (body, augmented) = match fift.strip_suffix('_') {
        Some(body) => (body, true),
        None => (fift, false),
    };

    let mut data = Vec::with_capacity(body.len().div_ceil(2));
    let mut bit_len = 0;
    for c in body.chars() {
        let nibble = c
            .to_digit(16)
            .ok_or_else(|| CellError::Format(format!("Bad fift hex character '{}'", c)))?;
        for shift in (0..4).rev() {
            push_bit(&mut data, &mut bit_len, (nibble >> shift) & 1 == 1);
        }
    }

    if augmented {
        // An empty augmented literal (`x{_}`) holds no bits at all
        bit_len = if bit_len == 0 {
            0
        } else {
            rollback(&data, bit_len).ok_or_else(|| {
                CellError::Format(format!("Fift hex '{}' has no completion tag", fift))
            })?
        };
    }

    Ok((normalize(data, bit_len), bit_len))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_get_bits() {
        let mut data = Vec::new();
        let mut len = 0;
        for bit in [true, false, true, true, false, false, false, false, true] {
            push_bit(&mut data, &mut len, bit);
        }
        assert_eq!(len, 9);
        assert_eq!(data, vec![0b1011_0000, 0b1000_0000]);
        assert!(get_bit(&data, 8));
    }

    #[test]
    fn test_append_unaligned() {
        let mut data = vec![0b1000_0000];
        let mut len = 1;
        append_bits(&mut data, &mut len, &[0xFF, 0x00], 4, 8);
        assert_eq!(len, 9);
        assert_eq!(data, vec![0b1111_1000, 0b0000_0000]);
    }

    #[test]
    fn test_augment_and_rollback() {
        let (augmented, len) = augment(&[0b1010_0000], 3, 8);
        assert_eq!(len, 8);
        assert_eq!(augmented, vec![0b1011_0000]);
        assert_eq!(rollback(&augmented, len), Some(3));

        let (aligned, len) = augment(&[0xAB], 8, 8);
        assert_eq!((aligned, len), (vec![0xAB], 8));
    }

    #[test]
    fn test_var_len_bits() {
        assert_eq!(var_len_bits(1), 0);
        assert_eq!(var_len_bits(2), 1);
        assert_eq!(var_len_bits(4), 2);
        assert_eq!(var_len_bits(5), 3);
        assert_eq!(var_len_bits(16), 4);
        assert_eq!(var_len_bits(32), 5);
    }

    #[test]
    fn test_normalize_clears_tail() {
        assert_eq!(normalize(vec![0xFF, 0xFF], 4), vec![0xF0]);
    }

    #[test]
    fn test_fift_hex_roundtrip() {
        assert_eq!(to_fift_hex(&[], 0), "");
        assert_eq!(to_fift_hex(&[0x80], 1), "C_");
        assert_eq!(to_fift_hex(&[0xAB, 0xC0], 12), "ABC");

        assert_eq!(parse_fift_hex("C_").unwrap(), (vec![0x80], 1));
        assert_eq!(parse_fift_hex("ABC").unwrap(), (vec![0xAB, 0xC0], 12));
        assert_eq!(parse_fift_hex("_").unwrap(), (vec![], 0));
        assert_eq!(parse_fift_hex("").unwrap(), (vec![], 0));
    }

    #[test]
    fn test_fift_hex_errors() {
        assert!(parse_fift_hex("XY").is_err());
        assert!(parse_fift_hex("0_").is_err());
    }
}
