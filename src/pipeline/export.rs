//! Persisting the balanced dataset

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use polars::prelude::*;

use super::target::LABEL_COLUMN;

/// On-disk format of the balanced table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetFormat {
    Csv,
    Parquet,
}

impl DatasetFormat {
    /// Format named by the extension of `path`, case-insensitive
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();

        match extension.as_str() {
            "csv" => Ok(Self::Csv),
            "parquet" => Ok(Self::Parquet),
            other => anyhow::bail!(
                "Unsupported balanced dataset format: '{}'. Use a .csv or .parquet path",
                other
            ),
        }
    }
}

/// Write the balanced pixel table (features plus the label column) to `path`.
///
/// Missing parent directories are created.
pub fn save_balanced(df: &mut DataFrame, path: &Path) -> Result<()> {
    let format = DatasetFormat::from_path(path)?;

    if df.column(LABEL_COLUMN).is_err() {
        anyhow::bail!(
            "Balanced dataset has no '{}' column; labels must be derived before export",
            LABEL_COLUMN
        );
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let mut file = File::create(path)
        .with_context(|| format!("Failed to create balanced dataset file: {}", path.display()))?;

    match format {
        DatasetFormat::Csv => CsvWriter::new(&mut file).finish(df).map(|_| ()),
        DatasetFormat::Parquet => ParquetWriter::new(file).finish(df).map(|_| ()),
    }
    .with_context(|| {
        format!(
            "Failed to write {} balanced rows to {}",
            df.height(),
            path.display()
        )
    })
}
