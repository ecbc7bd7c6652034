use crc::{CRC_16_XMODEM, CRC_32_ISCSI, Crc};

/// CRC16 used by the user-friendly address form (big-endian output)
pub const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);

/// CRC32C (Castagnoli) used as the Bag of Cells trailer (little-endian output)
pub const CRC32C: Crc<u32> = Crc::<u32>::new(&CRC_32_ISCSI);

/// Returns the CRC32C of `data` as the 4 little-endian bytes appended to a BoC
pub fn crc32c_le(data: &[u8]) -> [u8; 4] {
    CRC32C.checksum(data).to_le_bytes()
}

/// Returns the CRC16 of `data` as 2 big-endian bytes
pub fn crc16_be(data: &[u8]) -> [u8; 2] {
    CRC16.checksum(data).to_be_bytes()
}

#[cfg(test)]
mod tests;
