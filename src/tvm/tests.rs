//! Integration tests and additional test coverage for TVM modules

use crate::tvm::*;
use std::sync::Arc;

/// Helper function to create a cell with specific data
fn create_test_cell(data: Vec<u8>, bit_len: usize) -> Arc<Cell> {
    Arc::new(Cell::with_data(data, bit_len).unwrap())
}

/// A small tree with a cell shared between two parents
fn sample_tree() -> Arc<Cell> {
    let shared = create_test_cell(vec![0xAA, 0xBB], 12);

    let mut left = Builder::new();
    left.store_uint(5u32, 3).unwrap();
    left.store_ref(shared.clone()).unwrap();
    let left = left.build().unwrap();

    let mut right = Builder::new();
    right.store_string("right").unwrap();
    right.store_ref(shared).unwrap();
    right.store_ref(Cell::empty()).unwrap();
    let right = right.build().unwrap();

    let mut root = Builder::new();
    root.store_int(-1234, 20).unwrap();
    root.store_refs(&[left, right]).unwrap();
    root.build().unwrap()
}

fn prune(cell: &Cell) -> Arc<Cell> {
    let mut data = vec![CellType::PrunedBranch.tag() as u8, 0x01];
    data.extend_from_slice(&cell.hash_at(0));
    data.extend_from_slice(&cell.depth_at(0).to_be_bytes());
    Arc::new(Cell::with_parts(data, 288, vec![], CellType::PrunedBranch).unwrap())
}

fn merkle_proof(partial: &Arc<Cell>) -> Arc<Cell> {
    let mut builder = Builder::new();
    builder.store_u8(CellType::MerkleProof.tag() as u8).unwrap();
    builder.store_bytes(&partial.hash_at(0)).unwrap();
    builder.store_uint(partial.depth_at(0), 16).unwrap();
    builder.store_ref(partial.clone()).unwrap();
    builder.build_as(CellType::MerkleProof).unwrap()
}

/// Test basic cell operations
#[test]
fn test_cell_operations() {
    let cell = create_test_cell(vec![0xFF, 0x00], 16);
    assert_eq!(cell.bit_len(), 16);
    assert_eq!(cell.data()[0], 0xFF);
    assert_eq!(cell.data()[1], 0x00);

    // Test hash consistency
    let hash1 = cell.hash();
    let hash2 = cell.hash();
    assert_eq!(hash1, hash2);
}

#[test]
fn test_builder_slice_round_trip() {
    let addr = Address::new(0, [1u8; 32]);
    let child = create_test_cell(vec![0x01], 8);

    let mut builder = Builder::new();
    builder.store_address(Some(&addr)).unwrap();
    builder.store_u32(42).unwrap();
    builder.store_bit(true).unwrap();
    builder.store_coins(&Coins::from(1_500_000_000u64)).unwrap();
    builder.store_var_int(-300, 8).unwrap();
    builder.store_ref(child.clone()).unwrap();
    let cell = builder.build().unwrap();

    let mut slice = cell.slice();
    assert_eq!(slice.load_address().unwrap(), Some(addr));
    assert_eq!(slice.load_u32().unwrap(), 42);
    assert!(slice.load_bit().unwrap());
    assert_eq!(slice.load_coins(9).unwrap().to_string(), "1.5");
    assert_eq!(slice.load_var_int(8).unwrap(), -300);
    assert_eq!(slice.load_ref().unwrap(), child);
    assert!(slice.is_empty());
}

#[test]
fn test_slice_reproduces_cell() {
    let root = sample_tree();
    let slice = root.slice();

    let mut builder = Builder::new();
    builder.store_slice(&slice).unwrap();
    assert_eq!(builder.build().unwrap(), root);
}

#[test]
fn test_boc_round_trip_all_options() {
    let root = sample_tree();

    for order in [TopologicalOrder::BreadthFirst, TopologicalOrder::DepthFirst] {
        for hash_crc32 in [false, true] {
            for has_index in [false, true] {
                let options = BocOptions {
                    has_index,
                    hash_crc32,
                    topological_order: order,
                    ..Default::default()
                };
                let bytes = boc::serialize(&[root.clone()], &options).unwrap();
                let roots = boc::deserialize(&bytes, false).unwrap();

                assert_eq!(roots.len(), 1);
                assert_eq!(roots[0], root);
                assert_eq!(roots[0].depth(), root.depth());
                assert_eq!(roots[0].print(1), root.print(1));
            }
        }
    }
}

#[test]
fn test_shared_cells_are_stored_once() {
    let root = sample_tree();
    let bytes = serialize_boc(&root, false).unwrap();
    // root, left, right, shared, empty
    assert_eq!(bytes[6], 5);
}

#[test]
fn test_multiple_roots() {
    let first = sample_tree();
    let second = create_test_cell(vec![0x12, 0x34], 16);
    let boc = Boc::new(vec![first.clone(), second.clone(), first.clone()]).unwrap();

    let hex = boc.to_hex(&BocOptions::default()).unwrap();
    let decoded: Boc = hex.parse().unwrap();
    assert_eq!(decoded.roots(), &[first.clone(), second, first][..]);
}

#[test]
fn test_crc_corruption_is_detected() {
    let root = sample_tree();
    let mut bytes = serialize_boc(&root, true).unwrap();
    let middle = bytes.len() / 2;
    bytes[middle] ^= 0x01;

    let err = deserialize_boc(&bytes).unwrap_err();
    assert!(matches!(err, CellError::Format(_)));
}

#[test]
fn test_fift_round_trip() {
    let root = sample_tree();
    let text = root.print(1);
    let boc = Boc::from_fift(&text).unwrap();

    assert_eq!(boc.root(), &root);
    assert_eq!(boc.to_fift(), text);
}

#[test]
fn test_merkle_proof_boc() {
    let leaf = create_test_cell(vec![0xCA, 0xFE], 16);
    let full = Arc::new(
        Cell::with_parts(vec![0x01], 8, vec![leaf.clone()], CellType::Ordinary).unwrap(),
    );
    let partial = Arc::new(
        Cell::with_parts(vec![0x01], 8, vec![prune(&leaf)], CellType::Ordinary).unwrap(),
    );
    assert_eq!(partial.hash_at(0), full.hash());

    let proof = merkle_proof(&partial);
    assert_eq!(proof.level(), 0);

    let bytes = serialize_boc(&proof, true).unwrap();
    let roots = boc::deserialize(&bytes, true).unwrap();
    assert_eq!(roots[0], proof);
    assert_eq!(roots[0].cell_type(), CellType::MerkleProof);
    assert_eq!(
        roots[0].references()[0].references()[0].cell_type(),
        CellType::PrunedBranch
    );

    let plain = serialize_boc(&full, true).unwrap();
    let err = boc::deserialize(&plain, true).unwrap_err();
    assert_eq!(
        err,
        CellError::Format("BOC does not contain Merkle Proofs".to_string())
    );
}

#[test]
fn test_dictionary_in_boc() {
    let mut value = Builder::new();
    value.store_u64(7).unwrap();
    let dict = RawDict::with_root(32, value.build().unwrap());

    let mut builder = Builder::new();
    builder.store_dict(&dict).unwrap();
    let cell = builder.build().unwrap();

    let decoded = base64_to_boc(&boc_to_base64(&cell, true).unwrap()).unwrap();
    let parsed: RawDict = decoded.slice().load_dict(32).unwrap();
    assert_eq!(parsed, dict);
}

#[test]
fn test_serde_json_cell() {
    let cell = sample_tree();
    let json = serde_json::to_value(cell.as_ref()).unwrap();
    let encoded = json.as_str().unwrap();
    assert_eq!(base64_to_boc(encoded).unwrap(), cell);
}

#[test]
fn test_empty_cell_shared() {
    assert!(Arc::ptr_eq(&Cell::empty(), &*EMPTY_CELL));
    assert_eq!(Cell::default(), *Cell::empty());
    assert_eq!(hex_to_boc("b5ee9c724101010100020000004cacb9cd").unwrap(), Cell::empty());
}

#[test]
fn test_deep_chain_round_trip() {
    let mut cell = create_test_cell(vec![0x5A], 8);
    for i in 0..1023u32 {
        let mut builder = Builder::new();
        builder.store_uint(i, 16).unwrap();
        builder.store_ref(cell).unwrap();
        cell = builder.build().unwrap();
    }
    assert_eq!(cell.depth(), MAX_CELL_DEPTH - 1);

    let mut too_deep = Builder::new();
    too_deep.store_ref(cell.clone()).unwrap();
    assert!(matches!(too_deep.build(), Err(CellError::Validation(_))));

    for order in [TopologicalOrder::BreadthFirst, TopologicalOrder::DepthFirst] {
        let options = BocOptions {
            topological_order: order,
            ..Default::default()
        };
        let bytes = boc::serialize(&[cell.clone()], &options).unwrap();
        let roots = boc::deserialize(&bytes, false).unwrap();
        assert_eq!(roots[0], cell);
        assert_eq!(roots[0].depth(), MAX_CELL_DEPTH - 1);
    }

    // one line per cell
    assert_eq!(cell.print(1).lines().count(), 1024);
}
