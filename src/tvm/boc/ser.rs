//! Bag of Cells serialization
//!
//! Cells are linearized so that every cell precedes the cells it references,
//! then written as a `B5EE9C72` bag.

use crate::crc::crc32c_le;
use crate::tvm::cell::Cell;
use crate::tvm::error::{CellError, Result};
use byteorder::{BigEndian, ByteOrder};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::{BOC_GENERIC_MAGIC, BocOptions, TopologicalOrder};

/// Distinct cells of a graph in topological order
#[derive(Debug, Clone, Default)]
pub struct SortedCells {
    /// Parents always come before their references
    pub cells: Vec<Arc<Cell>>,
    /// Position of each cell in `cells`, by representation hash
    pub indices: HashMap<[u8; 32], usize>,
}

impl SortedCells {
    /// Wraps cells that are already in topological order
    fn from_ordered(cells: Vec<Arc<Cell>>) -> Self {
        let indices = cells
            .iter()
            .enumerate()
            .map(|(i, cell)| (cell.hash(), i))
            .collect();
        Self { cells, indices }
    }

    /// Index of a cell in the sorted list
    pub fn index_of(&self, cell: &Cell) -> Option<usize> {
        self.indices.get(&cell.hash()).copied()
    }
}

/// Slot list where re-encountered cells move to the end
#[derive(Default)]
struct Placement {
    slots: Vec<Option<Arc<Cell>>>,
    positions: HashMap<[u8; 32], usize>,
}

impl Placement {
    /// Appends `cell`, vacating its previous slot if it was already placed
    fn place(&mut self, cell: &Arc<Cell>) {
        let hash = cell.hash();
        if let Some(previous) = self.positions.get(&hash) {
            self.slots[*previous] = None;
        }
        self.positions.insert(hash, self.slots.len());
        self.slots.push(Some(cell.clone()));
    }

    fn finish(self) -> SortedCells {
        SortedCells::from_ordered(self.slots.into_iter().flatten().collect())
    }
}

fn distinct_roots(roots: &[Arc<Cell>]) -> Vec<Arc<Cell>> {
    let mut seen = HashSet::new();
    roots
        .iter()
        .filter(|root| seen.insert(root.hash()))
        .cloned()
        .collect()
}

/// Sorts cells level by level starting from the roots
pub fn breadth_first_sort(roots: &[Arc<Cell>]) -> SortedCells {
    let mut placement = Placement::default();
    let mut layer = distinct_roots(roots);
    for root in &layer {
        placement.place(root);
    }

    while !layer.is_empty() {
        let mut next = Vec::new();
        let mut queued = HashSet::new();

        for cell in &layer {
            for reference in cell.references() {
                placement.place(reference);
                if queued.insert(reference.hash()) {
                    next.push(reference.clone());
                }
            }
        }

        log::trace!("breadth-first layer of {} cells", next.len());
        layer = next;
    }

    placement.finish()
}

/// Sorts cells following each branch down to its leaves before the next one
///
/// Every distinct cell is visited once: the walk collects cells in post-order
/// (children scanned right to left), and reversing that puts parents first.
pub fn depth_first_sort(roots: &[Arc<Cell>]) -> SortedCells {
    let mut visited = HashSet::new();
    let mut post_order = Vec::new();
    // Open cells with the number of references still to scan
    let mut stack: Vec<(Arc<Cell>, usize)> = Vec::new();

    for root in distinct_roots(roots).into_iter().rev() {
        if !visited.insert(root.hash()) {
            continue;
        }
        let refs = root.reference_count();
        stack.push((root, refs));

        while let Some((cell, remaining)) = stack.last_mut() {
            if *remaining == 0 {
                if let Some((done, _)) = stack.pop() {
                    post_order.push(done);
                }
                continue;
            }

            *remaining -= 1;
            let child = cell.references()[*remaining].clone();
            if visited.insert(child.hash()) {
                let refs = child.reference_count();
                stack.push((child, refs));
            }
        }
    }

    post_order.reverse();
    log::trace!("depth-first walk placed {} cells", post_order.len());
    SortedCells::from_ordered(post_order)
}

/// Serializes root cells and everything they reference into a Bag of Cells
pub fn serialize(roots: &[Arc<Cell>], options: &BocOptions) -> Result<Vec<u8>> {
    if roots.is_empty() {
        return Err(CellError::Format(
            "Can't serialize an empty list of root cells".to_string(),
        ));
    }

    let sorted = match options.topological_order {
        TopologicalOrder::BreadthFirst => breadth_first_sort(roots),
        TopologicalOrder::DepthFirst => depth_first_sort(roots),
    };

    let cells_num = sorted.cells.len();
    let size_bytes = bytes_needed(cells_num);

    // Serialize each cell, remembering where it ends
    let mut cells_data = Vec::new();
    let mut end_offsets = Vec::with_capacity(cells_num);
    for cell in &sorted.cells {
        serialize_cell(cell, &sorted, size_bytes, &mut cells_data)?;
        end_offsets.push(cells_data.len());
    }

    let full_size = cells_data.len();
    let offset_bytes = bytes_needed(full_size);

    let mut result = Vec::with_capacity(
        16 + (4 + roots.len()) * size_bytes
            + (1 + if options.has_index { cells_num } else { 0 }) * offset_bytes
            + full_size,
    );

    // Magic number
    result.extend_from_slice(&BOC_GENERIC_MAGIC.to_be_bytes());

    // Flags and size
    let flags_and_size = (u8::from(options.has_index) << 7)
        | (u8::from(options.hash_crc32) << 6)
        | (u8::from(options.has_cache_bits) << 5)
        | ((options.flags & 0b11) << 3)
        | size_bytes as u8;
    result.push(flags_and_size);
    result.push(offset_bytes as u8);

    write_uint(&mut result, cells_num, size_bytes);
    write_uint(&mut result, roots.len(), size_bytes);
    // Absent cells are never produced
    write_uint(&mut result, 0, size_bytes);
    write_uint(&mut result, full_size, offset_bytes);

    for root in roots {
        let index = sorted.index_of(root).ok_or_else(|| {
            CellError::Format("Root cell not found in sorted cells".to_string())
        })?;
        write_uint(&mut result, index, size_bytes);
    }

    if options.has_index {
        for offset in &end_offsets {
            write_uint(&mut result, *offset, offset_bytes);
        }
    }

    result.extend_from_slice(&cells_data);

    if options.hash_crc32 {
        let crc = crc32c_le(&result);
        result.extend_from_slice(&crc);
    }

    log::debug!(
        "serialized bag of {} cells ({} roots) into {} bytes",
        cells_num,
        roots.len(),
        result.len()
    );

    Ok(result)
}

fn serialize_cell(
    cell: &Cell,
    sorted: &SortedCells,
    ref_size: usize,
    target: &mut Vec<u8>,
) -> Result<()> {
    target.extend_from_slice(&cell.descriptors());
    target.extend_from_slice(&cell.augmented_data());

    for reference in cell.references() {
        let ref_idx = sorted.index_of(reference).ok_or_else(|| {
            CellError::Format("Reference not found in sorted cells".to_string())
        })?;
        write_uint(target, ref_idx, ref_size);
    }

    Ok(())
}

/// Minimal number of bytes holding `value`, at least one
pub(crate) fn bytes_needed(value: usize) -> usize {
    if value == 0 {
        return 1;
    }

    let bits = (usize::BITS - value.leading_zeros()) as usize;
    bits.div_ceil(8)
}

fn write_uint(buf: &mut Vec<u8>, value: usize, size: usize) {
    let mut bytes = [0u8; 8];
    BigEndian::write_uint(&mut bytes, value as u64, size);
    buf.extend_from_slice(&bytes[..size]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tvm::builder::Builder;

    fn cell_with(byte: u8, refs: &[Arc<Cell>]) -> Arc<Cell> {
        let mut builder = Builder::new();
        builder.store_u8(byte).unwrap();
        builder.store_refs(refs).unwrap();
        builder.build().unwrap()
    }

    fn assert_topological(sorted: &SortedCells) {
        for (i, cell) in sorted.cells.iter().enumerate() {
            for reference in cell.references() {
                assert!(sorted.index_of(reference).unwrap() > i);
            }
        }
    }

    #[test]
    fn test_bytes_needed() {
        assert_eq!(bytes_needed(0), 1);
        assert_eq!(bytes_needed(255), 1);
        assert_eq!(bytes_needed(256), 2);
        assert_eq!(bytes_needed(65536), 3);
    }

    #[test]
    fn test_breadth_first_order() {
        let d = cell_with(4, &[]);
        let b = cell_with(2, &[d.clone()]);
        let c = cell_with(3, &[]);
        let a = cell_with(1, &[b.clone(), c.clone()]);

        let sorted = breadth_first_sort(&[a.clone()]);
        assert_eq!(sorted.cells, vec![a, b, c, d]);
        assert_topological(&sorted);
    }

    #[test]
    fn test_depth_first_order() {
        let d = cell_with(4, &[]);
        let b = cell_with(2, &[d.clone()]);
        let c = cell_with(3, &[]);
        let a = cell_with(1, &[b.clone(), c.clone()]);

        let sorted = depth_first_sort(&[a.clone()]);
        assert_eq!(sorted.cells, vec![a, b, d, c]);
        assert_topological(&sorted);
    }

    #[test]
    fn test_shared_cell_moves_after_all_parents() {
        // `shared` is referenced from two different depths
        let shared = cell_with(9, &[]);
        let mid = cell_with(2, &[shared.clone()]);
        let root = cell_with(1, &[shared.clone(), mid.clone()]);

        for sorted in [breadth_first_sort(&[root.clone()]), depth_first_sort(&[root.clone()])] {
            assert_eq!(sorted.cells.len(), 3);
            assert_eq!(sorted.cells.last(), Some(&shared));
            assert_topological(&sorted);
        }
    }

    /// Each level references the previous one twice
    fn diamond_chain(levels: usize) -> Arc<Cell> {
        let mut cell = cell_with(0, &[]);
        for i in 1..=levels {
            cell = cell_with(i as u8, &[cell.clone(), cell.clone()]);
        }
        cell
    }

    #[test]
    fn test_shared_chain_is_walked_once() {
        let root = diamond_chain(64);

        for sorted in [breadth_first_sort(&[root.clone()]), depth_first_sort(&[root.clone()])] {
            assert_eq!(sorted.cells.len(), 65);
            assert_eq!(sorted.cells[0], root);
            assert_topological(&sorted);
        }

        let options = BocOptions {
            topological_order: TopologicalOrder::DepthFirst,
            ..Default::default()
        };
        let boc = serialize(&[root], &options).unwrap();
        // cells counter
        assert_eq!(boc[6], 65);
    }

    #[test]
    fn test_depth_first_multiple_roots() {
        let leaf = cell_with(3, &[]);
        let inner = cell_with(2, &[leaf.clone()]);
        let outer = cell_with(1, &[inner.clone()]);

        // `inner` is both a root and a child of `outer`
        let sorted = depth_first_sort(&[inner.clone(), outer.clone()]);
        assert_eq!(sorted.cells, vec![outer, inner, leaf]);
        assert_topological(&sorted);
    }

    #[test]
    fn test_duplicate_roots_are_merged() {
        let leaf = cell_with(7, &[]);
        let root = cell_with(1, &[leaf.clone()]);

        let sorted = breadth_first_sort(&[root.clone(), root.clone(), leaf.clone()]);
        assert_eq!(sorted.cells.len(), 2);
        assert_topological(&sorted);
    }

    #[test]
    fn test_serialize_empty_cell() {
        let boc = serialize(&[Cell::empty()], &BocOptions::default()).unwrap();
        assert_eq!(hex::encode(boc), "b5ee9c724101010100020000004cacb9cd");
    }

    #[test]
    fn test_serialize_without_crc() {
        let mut builder = Builder::new();
        builder.store_u8(0xFF).unwrap();
        let cell = builder.build().unwrap();

        let options = BocOptions {
            hash_crc32: false,
            ..Default::default()
        };
        let boc = serialize(&[cell], &options).unwrap();
        assert_eq!(hex::encode(boc), "b5ee9c72010101010003000002ff");
    }

    #[test]
    fn test_serialize_with_index() {
        let leaf = cell_with(2, &[]);
        let root = cell_with(1, &[leaf]);
        let options = BocOptions {
            has_index: true,
            hash_crc32: false,
            ..Default::default()
        };
        let boc = serialize(&[root], &options).unwrap();

        // Root: 2 descriptor bytes + 1 data byte + 1 ref index; leaf: 3 bytes
        assert_eq!(boc[4], 0b1000_0001);
        assert_eq!(&boc[11..13], &[4, 7]);
    }

    #[test]
    fn test_serialize_no_roots() {
        assert!(serialize(&[], &BocOptions::default()).is_err());
    }
}
