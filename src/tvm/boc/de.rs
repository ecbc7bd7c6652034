//! Bag of Cells deserialization

use crate::crc::crc32c_le;
use crate::tvm::bits;
use crate::tvm::cell::{Cell, CellType};
use crate::tvm::error::{CellError, Result};
use crate::tvm::mask::Mask;
use byteorder::{BigEndian, ByteOrder};
use std::sync::Arc;

use super::{BOC_GENERIC_MAGIC, BOC_INDEXED_CRC32C_MAGIC, BOC_INDEXED_MAGIC};

fn format_err<T>(msg: impl Into<String>) -> Result<T> {
    Err(CellError::Format(msg.into()))
}

/// Parsed bag header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BocHeader {
    pub has_index: bool,
    pub hash_crc32: bool,
    pub has_cache_bits: bool,
    pub flags: u8,
    /// Size of cell indices in bytes
    pub size_bytes: usize,
    /// Size of offsets in bytes
    pub offset_bytes: usize,
    pub cells_num: usize,
    pub roots_num: usize,
    pub absent_num: usize,
    pub tot_cells_size: usize,
    pub root_list: Vec<usize>,
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn read_bytes(&mut self, n: usize, what: &str) -> Result<&'a [u8]> {
        if n > self.remaining() {
            return format_err(format!("Not enough bytes for {}", what));
        }
        let bytes = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    fn read_u8(&mut self, what: &str) -> Result<u8> {
        Ok(self.read_bytes(1, what)?[0])
    }

    fn read_uint(&mut self, size: usize, what: &str) -> Result<usize> {
        let bytes = self.read_bytes(size, what)?;
        usize::try_from(BigEndian::read_uint(bytes, size))
            .or_else(|_| format_err(format!("Value of {} is too large", what)))
    }
}

/// Cell body before its references are resolved
struct RawCell {
    cell_type: CellType,
    data: Vec<u8>,
    bit_len: usize,
    refs: Vec<usize>,
}

fn parse_header(reader: &mut Reader<'_>) -> Result<BocHeader> {
    let magic = BigEndian::read_u32(reader.read_bytes(4, "magic prefix")?);
    let flags_byte = reader.read_u8("flags")?;

    let (has_index, hash_crc32, has_cache_bits, flags, size_bytes) = match magic {
        BOC_GENERIC_MAGIC => (
            flags_byte & 0x80 != 0,
            flags_byte & 0x40 != 0,
            flags_byte & 0x20 != 0,
            (flags_byte >> 3) & 0b11,
            (flags_byte & 0x07) as usize,
        ),
        // Lean formats spend the whole byte on the index size
        BOC_INDEXED_MAGIC => (true, false, false, 0, flags_byte as usize),
        BOC_INDEXED_CRC32C_MAGIC => (true, true, false, 0, flags_byte as usize),
        _ => return format_err(format!("Bad magic prefix: 0x{:08x}", magic)),
    };

    if !(1..=8).contains(&size_bytes) {
        return format_err(format!("Invalid size_bytes: {}", size_bytes));
    }

    let offset_bytes = reader.read_u8("offset size")? as usize;
    if !(1..=8).contains(&offset_bytes) {
        return format_err(format!("Invalid offset_bytes: {}", offset_bytes));
    }

    let cells_num = reader.read_uint(size_bytes, "cells counter")?;
    let roots_num = reader.read_uint(size_bytes, "roots counter")?;
    let absent_num = reader.read_uint(size_bytes, "absent counter")?;
    let tot_cells_size = reader.read_uint(offset_bytes, "total cells size")?;

    if roots_num > cells_num {
        return format_err(format!(
            "Roots counter {} exceeds cells counter {}",
            roots_num, cells_num
        ));
    }

    let mut root_list = Vec::with_capacity(roots_num.min(reader.remaining() / size_bytes));
    for _ in 0..roots_num {
        root_list.push(reader.read_uint(size_bytes, "root cells indices")?);
    }

    Ok(BocHeader {
        has_index,
        hash_crc32,
        has_cache_bits,
        flags,
        size_bytes,
        offset_bytes,
        cells_num,
        roots_num,
        absent_num,
        tot_cells_size,
        root_list,
    })
}

fn parse_cell(reader: &mut Reader<'_>, ref_size: usize) -> Result<RawCell> {
    let refs_descriptor = reader.read_u8("cell descriptors")?;
    let mask = Mask::new(refs_descriptor >> 5);
    let total_refs = (refs_descriptor & 7) as usize;
    let has_hashes = refs_descriptor & 16 != 0;
    let is_exotic = refs_descriptor & 8 != 0;

    if total_refs == 7 && has_hashes {
        return format_err("Absent cells are not supported");
    }
    if total_refs > 4 {
        return format_err(format!(
            "Cell can't have more than 4 refs, got {}",
            total_refs
        ));
    }

    let bits_descriptor = reader.read_u8("cell descriptors")?;
    let is_augmented = bits_descriptor & 1 != 0;
    let data_size = (bits_descriptor >> 1) as usize + usize::from(is_augmented);

    if has_hashes {
        // Stored hashes and depths are recomputed on construction
        let hash_count = mask.hash_count();
        reader.read_bytes(hash_count * (32 + 2), "cell hashes")?;
    }

    let data = reader.read_bytes(data_size, "cell data")?.to_vec();
    let bit_len = if is_augmented {
        bits::rollback(&data, data_size * 8)
            .ok_or_else(|| CellError::Format("Cell data has no completion tag".to_string()))?
    } else {
        data_size * 8
    };

    let cell_type = if is_exotic {
        if bit_len < 8 {
            return format_err("Not enough bits for an exotic cell type");
        }
        let cell_type = CellType::from_tag(data[0] as i8)?;
        if cell_type == CellType::Ordinary {
            return format_err("An exotic cell can't be of ordinary type");
        }
        cell_type
    } else {
        CellType::Ordinary
    };

    let mut refs = Vec::with_capacity(total_refs);
    for _ in 0..total_refs {
        refs.push(reader.read_uint(ref_size, "cell references")?);
    }

    Ok(RawCell {
        cell_type,
        data,
        bit_len,
        refs,
    })
}

/// Deserializes a Bag of Cells, returning its roots in order.
///
/// With `check_merkle_proofs` the bag must contain at least one Merkle proof
/// or Merkle update cell.
pub fn deserialize(data: &[u8], check_merkle_proofs: bool) -> Result<Vec<Arc<Cell>>> {
    let mut reader = Reader { data, pos: 0 };
    let header = parse_header(&mut reader)?;

    if header.has_index {
        reader.read_bytes(header.cells_num.saturating_mul(header.offset_bytes), "index")?;
    }

    let cells_data = reader.read_bytes(header.tot_cells_size, "cells data")?;

    if header.hash_crc32 {
        let expected = crc32c_le(&data[..reader.pos]);
        let actual = reader.read_bytes(4, "crc32c hashsum")?;
        if *actual != expected {
            return format_err(format!(
                "Crc32c hashsum mismatch: expected {}, got {}",
                hex::encode(expected),
                hex::encode(actual)
            ));
        }
    }

    if reader.remaining() != 0 {
        return format_err(format!(
            "Too much bytes in BoC serialization: {} left",
            reader.remaining()
        ));
    }

    let mut cells_reader = Reader {
        data: cells_data,
        pos: 0,
    };
    let mut raw_cells = Vec::with_capacity(header.cells_num.min(cells_data.len() / 2));
    for _ in 0..header.cells_num {
        raw_cells.push(parse_cell(&mut cells_reader, header.size_bytes)?);
    }

    let cells = build_cells(raw_cells, check_merkle_proofs)?;

    let roots = header
        .root_list
        .iter()
        .map(|&index| {
            cells
                .get(index)
                .cloned()
                .ok_or_else(|| CellError::Format(format!("Bad root index: {}", index)))
        })
        .collect::<Result<Vec<_>>>()?;

    log::debug!(
        "deserialized bag of {} cells ({} roots) from {} bytes",
        cells.len(),
        roots.len(),
        data.len()
    );

    Ok(roots)
}

/// Builds cells from the last one to the first, so references always exist
fn build_cells(raw_cells: Vec<RawCell>, check_merkle_proofs: bool) -> Result<Vec<Arc<Cell>>> {
    let count = raw_cells.len();
    let mut built: Vec<Option<Arc<Cell>>> = vec![None; count];
    let mut has_merkle_proofs = false;

    for (index, raw) in raw_cells.into_iter().enumerate().rev() {
        let mut refs = Vec::with_capacity(raw.refs.len());
        for &ref_index in &raw.refs {
            if ref_index >= count {
                return format_err(format!("Bad reference index: {}", ref_index));
            }
            if ref_index <= index {
                return format_err("Topological order is broken");
            }
            let reference = built[ref_index]
                .clone()
                .ok_or_else(|| CellError::Format("Topological order is broken".to_string()))?;
            refs.push(reference);
        }

        has_merkle_proofs |= raw.cell_type.is_merkle();
        let cell = Cell::with_parts(raw.data, raw.bit_len, refs, raw.cell_type)?;
        built[index] = Some(Arc::new(cell));
    }

    if check_merkle_proofs && !has_merkle_proofs {
        return format_err("BOC does not contain Merkle Proofs");
    }

    Ok(built.into_iter().flatten().collect())
}
