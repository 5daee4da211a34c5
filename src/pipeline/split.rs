//! Feature extraction and stratified train/test splitting

use anyhow::{Context, Result};
use ndarray::{Array1, Array2, Axis};
use polars::prelude::*;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use super::target::label_values;

/// Model inputs: the nine cleaned physical variables
pub const FEATURE_COLUMNS: [&str; 9] = [
    "aspect",
    "elevation",
    "geology",
    "ndvi",
    "plan_curv",
    "profile_curv",
    "slope",
    "spi",
    "twi",
];

/// Build a row-major `n_rows x n_features` matrix from the given columns
pub fn feature_matrix(df: &DataFrame, columns: &[&str]) -> Result<Array2<f64>> {
    let mut matrix = Array2::<f64>::zeros((df.height(), columns.len()));

    for (j, name) in columns.iter().enumerate() {
        let column = df
            .column(name)
            .with_context(|| format!("Feature column '{}' not found", name))?
            .cast(&DataType::Float64)
            .with_context(|| format!("Feature column '{}' is not numeric", name))?;
        let values = column.f64()?;

        if values.null_count() > 0 {
            anyhow::bail!("Feature column '{}' contains missing values", name);
        }

        for (cell, value) in matrix.column_mut(j).iter_mut().zip(values.into_no_null_iter()) {
            *cell = value;
        }
    }

    Ok(matrix)
}

/// Extract the binary label column as an array
pub fn label_vector(df: &DataFrame) -> Result<Array1<u8>> {
    Ok(Array1::from(label_values(df)?))
}

/// Row indices of the two partitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitIndices {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Split rows into train/test partitions preserving the class ratio.
///
/// The test partition holds `ceil(test_fraction * n)` rows, allocated to each
/// class in proportion to its share. Both partitions must receive at least
/// one row of each class.
pub fn stratified_split(labels: &[u8], test_fraction: f64, seed: u64) -> Result<SplitIndices> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        anyhow::bail!("Test fraction must be in (0, 1), got {}", test_fraction);
    }

    let n = labels.len();
    let (mut positive, mut negative): (Vec<usize>, Vec<usize>) =
        (0..n).partition(|&i| labels[i] == 1);

    if positive.len() < 2 || negative.len() < 2 {
        anyhow::bail!(
            "Stratified split needs at least 2 rows per class, got {} negative and {} positive",
            negative.len(),
            positive.len()
        );
    }

    let n_test = (test_fraction * n as f64).ceil() as usize;
    if n_test < 2 || n - n_test < 2 {
        anyhow::bail!(
            "A test fraction of {} leaves too few rows in one partition of {} rows",
            test_fraction,
            n
        );
    }

    let test_positive = ((n_test * positive.len()) as f64 / n as f64)
        .round()
        .clamp(1.0, (positive.len() - 1) as f64) as usize;
    let test_negative = n_test - test_positive;
    if test_negative == 0 || test_negative >= negative.len() {
        anyhow::bail!(
            "Cannot allocate {} test rows across classes of {} negative and {} positive",
            n_test,
            negative.len(),
            positive.len()
        );
    }

    let mut rng = StdRng::seed_from_u64(seed);
    negative.shuffle(&mut rng);
    positive.shuffle(&mut rng);

    let mut test: Vec<usize> = negative[..test_negative]
        .iter()
        .chain(&positive[..test_positive])
        .copied()
        .collect();
    let mut train: Vec<usize> = negative[test_negative..]
        .iter()
        .chain(&positive[test_positive..])
        .copied()
        .collect();

    train.shuffle(&mut rng);
    test.shuffle(&mut rng);

    Ok(SplitIndices { train, test })
}

/// Gather the given rows of a matrix
pub fn select_rows(x: &Array2<f64>, rows: &[usize]) -> Array2<f64> {
    x.select(Axis(0), rows)
}

/// Gather the given entries of a label array
pub fn select_labels(y: &Array1<u8>, rows: &[usize]) -> Array1<u8> {
    y.select(Axis(0), rows)
}
