//! Tests for CRC module

use super::*;

#[test]
fn test_crc16_check_value() {
    // CRC-16/XMODEM check value
    assert_eq!(CRC16.checksum(b"123456789"), 0x31c3);
    assert_eq!(crc16_be(b"123456789"), [0x31, 0xc3]);
}

#[test]
fn test_crc32c_check_value() {
    // CRC-32C (Castagnoli) check value
    assert_eq!(CRC32C.checksum(b"123456789"), 0xe306_9283);
    assert_eq!(crc32c_le(b"123456789"), [0x83, 0x92, 0x06, 0xe3]);
}

#[test]
fn test_crc32c_empty_data() {
    assert_eq!(CRC32C.checksum(b""), 0);
}

#[test]
fn test_crc32c_empty_cell_boc_trailer() {
    let header = hex::decode("b5ee9c72410101010002000000").unwrap();
    assert_eq!(crc32c_le(&header), [0x4c, 0xac, 0xb9, 0xcd]);
}

#[test]
fn test_crc16_digest_update() {
    let mut digest = CRC16.digest();
    digest.update(b"hello");
    digest.update(b" world");

    assert_eq!(digest.finalize(), CRC16.checksum(b"hello world"));
}

#[test]
fn test_crc32c_digest_update() {
    let mut digest = CRC32C.digest();
    digest.update(b"hello");
    digest.update(b" world");

    assert_eq!(digest.finalize(), CRC32C.checksum(b"hello world"));
}

#[test]
fn test_crc32c_order_matters() {
    assert_ne!(CRC32C.checksum(b"abc"), CRC32C.checksum(b"bca"));
}

#[test]
fn test_crc16_single_bit_flip() {
    let data = vec![0xAAu8, 0x55, 0xAA, 0x55];
    let mut flipped = data.clone();
    flipped[2] ^= 0x01;

    assert_ne!(CRC16.checksum(&data), CRC16.checksum(&flipped));
}
