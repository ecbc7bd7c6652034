//! Fift hex tree notation
//!
//! Each line holds one cell as `x{HEX}`; children follow their parent with a
//! deeper indentation:
//!
//! ```text
//! x{AB}
//!  x{C_}
//!  x{}
//! ```

use crate::tvm::bits;
use crate::tvm::builder::Builder;
use crate::tvm::cell::Cell;
use crate::tvm::error::{CellError, Result};
use std::sync::Arc;

/// Renders root cells as fift hex trees, one after another
pub fn to_fift_hex(roots: &[Arc<Cell>]) -> String {
    roots.iter().map(|root| root.print(1)).collect()
}

/// Parses fift hex text into ordinary cells, returning the top-level ones
pub fn deserialize_fift(text: &str) -> Result<Vec<Arc<Cell>>> {
    let mut roots = Vec::new();
    // Open cells, indentation strictly increasing from bottom to top
    let mut stack: Vec<(usize, Builder)> = Vec::new();

    for line in text.lines() {
        let content = line.trim_start();
        if content.trim_end().is_empty() {
            continue;
        }

        let indent = line.len() - content.len();
        let builder = parse_line(content.trim_end())?;

        while stack.last().is_some_and(|(open, _)| *open >= indent) {
            close_top(&mut stack, &mut roots)?;
        }
        stack.push((indent, builder));
    }

    while !stack.is_empty() {
        close_top(&mut stack, &mut roots)?;
    }

    if roots.is_empty() {
        return Err(CellError::Format(
            "Can't deserialize. Empty fift hex.".to_string(),
        ));
    }

    Ok(roots)
}

fn parse_line(content: &str) -> Result<Builder> {
    let hex = content
        .strip_prefix("x{")
        .and_then(|rest| rest.strip_suffix('}'))
        .ok_or_else(|| CellError::Format(format!("Bad fift hex line: {}", content)))?;

    let (data, bit_len) = bits::parse_fift_hex(hex)?;
    let mut builder = Builder::new();
    builder.store_raw_bits(&data, bit_len)?;
    Ok(builder)
}

/// Builds the innermost open cell and attaches it to its parent
fn close_top(stack: &mut Vec<(usize, Builder)>, roots: &mut Vec<Arc<Cell>>) -> Result<()> {
    let Some((_, builder)) = stack.pop() else {
        return Ok(());
    };
    let cell = builder.build()?;

    match stack.last_mut() {
        Some((_, parent)) => {
            parent.store_ref(cell)?;
        }
        None => roots.push(cell),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_cell() {
        let roots = deserialize_fift("x{AB}").unwrap();
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].data(), &[0xAB]);
        assert_eq!(roots[0].bit_len(), 8);
    }

    #[test]
    fn test_empty_forms() {
        for text in ["x{}", "x{_}"] {
            let roots = deserialize_fift(text).unwrap();
            assert_eq!(roots[0], Cell::empty());
        }
    }

    #[test]
    fn test_nested_tree() {
        let text = "x{AB}\n x{C_}\n  x{1}\n x{}\n";
        let roots = deserialize_fift(text).unwrap();
        assert_eq!(roots.len(), 1);

        let root = &roots[0];
        assert_eq!(root.reference_count(), 2);
        assert_eq!(root.references()[0].bit_len(), 1);
        assert_eq!(root.references()[0].reference_count(), 1);
        assert_eq!(root.references()[0].references()[0].bit_len(), 4);
        assert_eq!(root.references()[1], Cell::empty());

        assert_eq!(root.print(1), text);
    }

    #[test]
    fn test_multiple_roots() {
        let text = "x{01}\n x{02}\nx{03}\n";
        let roots = deserialize_fift(text).unwrap();
        assert_eq!(roots.len(), 2);
        assert_eq!(roots[0].reference_count(), 1);
        assert_eq!(roots[1].data(), &[0x03]);
        assert_eq!(to_fift_hex(&roots), text);
    }

    #[test]
    fn test_deep_pop() {
        // Returning from depth 2 straight to depth 1
        let text = "x{01}\n x{02}\n  x{03}\n x{04}";
        let roots = deserialize_fift(text).unwrap();
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].reference_count(), 2);
        assert_eq!(roots[0].references()[1].data(), &[0x04]);
    }

    #[test]
    fn test_bad_input() {
        assert!(deserialize_fift("").is_err());
        assert!(deserialize_fift("   \n").is_err());
        assert!(deserialize_fift("y{00}").is_err());
        assert!(deserialize_fift("x{0G}").is_err());
        assert!(deserialize_fift("x{00}\n x{}\n x{}\n x{}\n x{}\n x{}").is_err());
    }
}
