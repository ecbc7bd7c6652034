//! TON Address implementation
//!
//! Internal standard addresses: a signed workchain byte plus a 256-bit account
//! hash. Supports the raw `workchain:hex` form and the user-friendly base64
//! form protected by CRC-16/XMODEM.

use crate::crc::crc16_be;
use crate::tvm::error::{CellError, Result};
use base64::Engine;
use std::fmt;

/// Bit length of `addr_std$10` without anycast
pub const ADDRESS_BITS: usize = 2 + 1 + 8 + 256;

const TAG_BOUNCEABLE: u8 = 0x11;
const TAG_NON_BOUNCEABLE: u8 = 0x51;
const TAG_TEST_ONLY: u8 = 0x80;

/// Represents a TON blockchain address
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    /// Workchain ID (-1 for masterchain, 0 for basechain)
    pub workchain: i8,
    /// 32-byte hash part of the address
    pub hash_part: [u8; 32],
    /// Whether the address is bounceable
    pub is_bounceable: bool,
    /// Whether this is a test-only address
    pub is_test_only: bool,
}

impl Address {
    /// Creates a new address from workchain and hash part
    pub fn new(workchain: i8, hash_part: [u8; 32]) -> Self {
        Self {
            workchain,
            hash_part,
            is_bounceable: true,
            is_test_only: false,
        }
    }

    /// Parses an address from string (supports both raw and base64 formats)
    pub fn parse(address: &str) -> Result<Self> {
        if address.contains(':') {
            return Self::from_hex(address);
        }
        Self::from_base64(address)
    }

    /// Parses address from raw format: "workchain:hash"
    pub fn from_hex(address: &str) -> Result<Self> {
        let (workchain, hash_hex) = address
            .split_once(':')
            .ok_or_else(|| CellError::Format("Invalid raw address format".to_string()))?;

        let workchain = workchain
            .parse::<i8>()
            .map_err(|e| CellError::Format(format!("Invalid address workchain: {}", e)))?;

        if hash_hex.len() != 64 {
            return Err(CellError::Format(
                "Hash part must be 64 hex characters".to_string(),
            ));
        }

        let hash_bytes = hex::decode(hash_hex)
            .map_err(|e| CellError::Format(format!("Invalid address hash: {}", e)))?;
        let mut hash_part = [0u8; 32];
        hash_part.copy_from_slice(&hash_bytes);

        Ok(Self::new(workchain, hash_part))
    }

    /// Parses address from base64 user-friendly format
    pub fn from_base64(address: &str) -> Result<Self> {
        let decoded = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(address)
            .or_else(|_| base64::engine::general_purpose::STANDARD.decode(address))
            .map_err(|e| CellError::Format(format!("Invalid base64 address: {}", e)))?;

        if decoded.len() != 36 {
            return Err(CellError::Format(
                "Invalid base64 address length".to_string(),
            ));
        }

        let mut tag = decoded[0];
        let is_test_only = tag & TAG_TEST_ONLY != 0;
        if is_test_only {
            tag ^= TAG_TEST_ONLY;
        }

        let is_bounceable = match tag {
            TAG_BOUNCEABLE => true,
            TAG_NON_BOUNCEABLE => false,
            _ => return Err(CellError::Format("Invalid address tag".to_string())),
        };

        if decoded[34..36] != crc16_be(&decoded[0..34]) {
            return Err(CellError::Format("Invalid address CRC".to_string()));
        }

        let workchain = decoded[1] as i8;
        let mut hash_part = [0u8; 32];
        hash_part.copy_from_slice(&decoded[2..34]);

        Ok(Self {
            workchain,
            hash_part,
            is_bounceable,
            is_test_only,
        })
    }

    /// Converts address to the user-friendly representation with explicit flags
    pub fn to_friendly(&self, url_safe: bool, bounceable: bool, test_only: bool) -> String {
        let mut tag = if bounceable {
            TAG_BOUNCEABLE
        } else {
            TAG_NON_BOUNCEABLE
        };
        if test_only {
            tag |= TAG_TEST_ONLY;
        }

        let mut data = Vec::with_capacity(36);
        data.push(tag);
        data.push(self.workchain as u8);
        data.extend_from_slice(&self.hash_part);

        let crc = crc16_be(&data);
        data.extend_from_slice(&crc);

        if url_safe {
            base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(&data)
        } else {
            base64::engine::general_purpose::STANDARD.encode(&data)
        }
    }

    /// Converts to raw format (workchain:hash)
    pub fn to_hex(&self) -> String {
        format!("{}:{}", self.workchain, hex::encode(self.hash_part))
    }

    /// Converts to user-friendly base64 format using the address flags
    pub fn to_base64(&self) -> String {
        self.to_friendly(true, self.is_bounceable, self.is_test_only)
    }

    /// Sets the bounceable flag
    pub fn set_bounceable(&mut self, bounceable: bool) {
        self.is_bounceable = bounceable;
    }

    /// Sets the test-only flag
    pub fn set_test_only(&mut self, test_only: bool) {
        self.is_test_only = test_only;
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_base64())
    }
}

impl std::str::FromStr for Address {
    type Err = CellError;

    fn from_str(s: &str) -> Result<Self> {
        Address::parse(s)
    }
}
