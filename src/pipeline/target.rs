//! Binary landslide label derivation
//!
//! The label is derived from the `landslide_scars` band: the no-scar
//! sentinel maps to 0, every other (valid) scar value maps to 1. The
//! cleaner's floor on `landslide_scars` is this same sentinel, so a value
//! that survives cleaning is either the sentinel or a real scar.

use anyhow::{Context, Result};
use polars::prelude::*;

/// Scar band value meaning "no landslide scar at this pixel"
pub const NO_SCAR_SENTINEL: i64 = -1;

/// Column the label is derived from
pub const SCAR_COLUMN: &str = "landslide_scars";

/// Name of the derived binary label column
pub const LABEL_COLUMN: &str = "ls";

/// Per-class row counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClassCounts {
    pub negative: usize,
    pub positive: usize,
}

impl ClassCounts {
    pub fn total(&self) -> usize {
        self.negative + self.positive
    }

    pub fn minority(&self) -> usize {
        self.negative.min(self.positive)
    }
}

/// Return a copy of `df` with the binary label column appended.
///
/// Rows whose scar value is null get a null label; callers are expected to
/// pass a cleaned table.
pub fn derive_label(df: &DataFrame) -> Result<DataFrame> {
    let scars = df
        .column(SCAR_COLUMN)
        .with_context(|| format!("Column '{}' not found", SCAR_COLUMN))?
        .cast(&DataType::Int64)
        .with_context(|| format!("Column '{}' is not numeric", SCAR_COLUMN))?;

    let labels: Vec<Option<i32>> = scars
        .i64()?
        .into_iter()
        .map(|scar| scar.map(|v| i32::from(v != NO_SCAR_SENTINEL)))
        .collect();

    let mut labelled = df.clone();
    labelled.with_column(Column::new(LABEL_COLUMN.into(), labels))?;
    Ok(labelled)
}

/// Extract the label column as 0/1 values.
///
/// Fails when the column is missing, contains nulls, or holds anything
/// other than 0 and 1.
pub fn label_values(df: &DataFrame) -> Result<Vec<u8>> {
    let column = df
        .column(LABEL_COLUMN)
        .with_context(|| format!("Label column '{}' not found", LABEL_COLUMN))?
        .cast(&DataType::Int32)?;

    column
        .i32()?
        .into_iter()
        .enumerate()
        .map(|(row, value)| match value {
            Some(0) => Ok(0u8),
            Some(1) => Ok(1u8),
            Some(other) => anyhow::bail!("Label at row {} is {}, expected 0 or 1", row, other),
            None => anyhow::bail!("Label at row {} is missing", row),
        })
        .collect()
}

/// Count rows per class of the label column
pub fn class_counts(df: &DataFrame) -> Result<ClassCounts> {
    let labels = label_values(df)?;
    let positive = labels.iter().filter(|&&y| y == 1).count();
    Ok(ClassCounts {
        negative: labels.len() - positive,
        positive,
    })
}
