//! Level mask of a cell
//!
//! Bit `L - 1` of the mask tells whether level `L` carries its own hash and
//! depth. Level 0 is always significant.

/// Cell level mask (valid values are 0..=31)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Mask(u8);

impl Mask {
    pub const fn new(value: u8) -> Self {
        Self(value)
    }

    pub const fn value(self) -> u8 {
        self.0
    }

    /// Position of the highest set bit, 0 for an empty mask
    pub const fn level(self) -> u8 {
        (u8::BITS - self.0.leading_zeros()) as u8
    }

    /// Number of significant levels above zero
    pub const fn hash_index(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Number of hashes stored by a cell with this mask
    pub const fn hash_count(self) -> usize {
        self.hash_index() + 1
    }

    pub const fn is_significant(self, level: u8) -> bool {
        level == 0 || (level <= 8 && (self.0 >> (level - 1)) & 1 != 0)
    }

    /// Keeps only the bits of levels below `level`
    pub const fn apply(self, level: u8) -> Self {
        if level >= u8::BITS as u8 {
            return self;
        }
        Self(self.0 & ((1u8 << level) - 1))
    }
}

impl From<u8> for Mask {
    fn from(value: u8) -> Self {
        Self(value)
    }
}

impl std::ops::BitOr for Mask {
    type Output = Mask;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::Shr<u8> for Mask {
    type Output = Mask;

    fn shr(self, rhs: u8) -> Self::Output {
        Self(self.0 >> rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_levels() {
        assert_eq!(Mask::new(0b000).level(), 0);
        assert_eq!(Mask::new(0b001).level(), 1);
        assert_eq!(Mask::new(0b011).level(), 2);
        assert_eq!(Mask::new(0b111).level(), 3);
        assert_eq!(Mask::new(0b100).level(), 3);
    }

    #[test]
    fn test_mask_hash_index_and_count() {
        assert_eq!(Mask::new(0b000).hash_index(), 0);
        assert_eq!(Mask::new(0b000).hash_count(), 1);
        assert_eq!(Mask::new(0b111).hash_index(), 3);
        assert_eq!(Mask::new(0b111).hash_count(), 4);
        assert_eq!(Mask::new(0b11111_000).hash_index(), 5);
        assert_eq!(Mask::new(0b11111_111).hash_count(), 9);
    }

    #[test]
    fn test_mask_significance() {
        let mask = Mask::new(0b101);
        assert!(mask.is_significant(0));
        assert!(mask.is_significant(1));
        assert!(!mask.is_significant(2));
        assert!(mask.is_significant(3));
    }

    #[test]
    fn test_mask_apply() {
        let mask = Mask::new(0b111);
        assert_eq!(mask.apply(0), Mask::new(0));
        assert_eq!(mask.apply(1), Mask::new(0b001));
        assert_eq!(mask.apply(2), Mask::new(0b011));
        assert_eq!(mask.apply(3), Mask::new(0b111));
        assert_eq!(Mask::new(0b11111_000).apply(3), Mask::new(0));
    }

    #[test]
    fn test_mask_ops() {
        assert_eq!(Mask::new(0b001) | Mask::new(0b100), Mask::new(0b101));
        assert_eq!(Mask::new(0b110) >> 1, Mask::new(0b011));
    }
}
