use thiserror::Error;

/// Errors raised while building, reading or (de)serializing cells.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CellError {
    /// Cell content violates the structural rules of its type
    #[error("{0}")]
    Validation(String),
    /// Not enough bits left in a builder or slice
    #[error("bits overflow: can't take {requested} bits, only {available} left")]
    BitsOverflow { requested: usize, available: usize },
    /// Not enough refs left in a builder or slice
    #[error("refs overflow: can't take {requested} refs, only {available} left")]
    RefsOverflow { requested: usize, available: usize },
    /// Value does not fit the requested bit width or target integer type
    #[error("{0}")]
    Range(String),
    /// Malformed Bag of Cells or fift-hex input
    #[error("{0}")]
    Format(String),
    /// Unrecognized cell type tag
    #[error("unknown cell type: {0}")]
    UnknownType(i8),
}

impl CellError {
    /// Returns true for both bits and refs overflow
    pub fn is_overflow(&self) -> bool {
        matches!(
            self,
            CellError::BitsOverflow { .. } | CellError::RefsOverflow { .. }
        )
    }
}

pub type Result<T, E = CellError> = std::result::Result<T, E>;
