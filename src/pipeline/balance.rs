//! Class balancing by downsampling the majority class

use anyhow::{Context, Result};
use polars::prelude::*;
use rand::rngs::StdRng;
use rand::seq::{index, SliceRandom};
use rand::SeedableRng;

use super::target::label_values;

/// Downsample the majority class to the size of the minority class.
///
/// The minority rows are kept whole; `minority` rows are drawn without
/// replacement from the majority class with an RNG seeded by `seed`, and the
/// combined rows are shuffled with a fresh RNG from the same seed. When both
/// classes are the same size, label 0 is treated as the majority.
///
/// The label column must contain both classes; if one is absent the result
/// is an empty table.
pub fn balance_classes(df: &DataFrame, seed: u64) -> Result<DataFrame> {
    let indices = balanced_indices(&label_values(df)?, seed);
    let idx = IdxCa::from_vec(
        "idx".into(),
        indices.into_iter().map(|i| i as IdxSize).collect(),
    );
    df.take(&idx).context("Failed to gather balanced rows")
}

/// Row indices of the balanced, shuffled dataset
pub fn balanced_indices(labels: &[u8], seed: u64) -> Vec<usize> {
    let (positive, negative): (Vec<usize>, Vec<usize>) =
        (0..labels.len()).partition(|&i| labels[i] == 1);

    let (minority, majority) = if positive.len() <= negative.len() {
        (positive, negative)
    } else {
        (negative, positive)
    };

    let mut rng = StdRng::seed_from_u64(seed);
    let mut combined = minority;
    let n = combined.len();
    combined.extend(
        index::sample(&mut rng, majority.len(), n)
            .into_iter()
            .map(|i| majority[i]),
    );

    let mut rng = StdRng::seed_from_u64(seed);
    combined.shuffle(&mut rng);
    combined
}
