//! Currency amounts stored in nano units
//!
//! Only the pieces cells need: a nano value, its decimal scale and a decimal
//! rendering. Amounts are written into cells as `VarUInteger 16`.

use crate::tvm::error::{CellError, Result};
use num_bigint::BigInt;
use num_traits::{Signed, Zero};
use std::fmt;

/// Decimal places of the native currency
pub const DEFAULT_DECIMALS: u32 = 9;

pub const MAX_DECIMALS: u32 = 18;

/// Length field size of the `VarUInteger 16` encoding
pub const COINS_MAX_LEN: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Coins {
    nano: BigInt,
    decimals: u32,
}

impl Coins {
    /// Wraps an amount already expressed in nano units
    pub fn from_nano(nano: impl Into<BigInt>, decimals: u32) -> Result<Self> {
        if decimals > MAX_DECIMALS {
            return Err(CellError::Range(format!(
                "Coins decimals must be between 0 and {}, got \"{}\"",
                MAX_DECIMALS, decimals
            )));
        }

        Ok(Self {
            nano: nano.into(),
            decimals,
        })
    }

    pub fn to_nano(&self) -> &BigInt {
        &self.nano
    }

    pub fn decimals(&self) -> u32 {
        self.decimals
    }

    pub fn is_negative(&self) -> bool {
        self.nano.is_negative()
    }

    pub fn is_zero(&self) -> bool {
        self.nano.is_zero()
    }
}

impl From<u64> for Coins {
    /// Native currency amount in nano units
    fn from(nano: u64) -> Self {
        Self {
            nano: BigInt::from(nano),
            decimals: DEFAULT_DECIMALS,
        }
    }
}

impl fmt::Display for Coins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.nano.abs().to_string();
        let sign = if self.is_negative() { "-" } else { "" };
        let decimals = self.decimals as usize;

        if decimals == 0 {
            return write!(f, "{}{}", sign, digits);
        }

        let padded = format!("{:0>width$}", digits, width = decimals + 1);
        let (int_part, frac_part) = padded.split_at(padded.len() - decimals);
        let frac_part = frac_part.trim_end_matches('0');

        if frac_part.is_empty() {
            write!(f, "{}{}", sign, int_part)
        } else {
            write!(f, "{}{}.{}", sign, int_part, frac_part)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Coins::from(1_000_000_000).to_string(), "1");
        assert_eq!(Coins::from(1_500_000_000).to_string(), "1.5");
        assert_eq!(Coins::from(1).to_string(), "0.000000001");
        assert_eq!(Coins::from(0).to_string(), "0");
        assert_eq!(Coins::from_nano(-25, 2).unwrap().to_string(), "-0.25");
        assert_eq!(Coins::from_nano(42, 0).unwrap().to_string(), "42");
    }

    #[test]
    fn test_decimals_range() {
        assert!(Coins::from_nano(1, 18).is_ok());
        assert!(matches!(
            Coins::from_nano(1, 19),
            Err(CellError::Range(_))
        ));
    }

    #[test]
    fn test_sign() {
        assert!(Coins::from_nano(-1, 9).unwrap().is_negative());
        assert!(!Coins::from(5).is_negative());
        assert!(Coins::from(0).is_zero());
    }
}
