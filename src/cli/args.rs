//! Command-line argument definitions using clap

use clap::Parser;
use std::path::PathBuf;

use crate::pipeline::TrainingConfig;

/// Scarp - Landslide susceptibility classification from a ten-band raster
#[derive(Parser, Debug)]
#[command(name = "scarp")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Input raster (GeoTIFF with ten bands in fixed order)
    #[arg(short, long, default_value = "data/composite_bands4.tif")]
    pub input: PathBuf,

    /// Output directory for figures, created if absent
    #[arg(long, default_value = "images")]
    pub images_dir: PathBuf,

    /// Seed for balancing, splitting and the seeded models
    #[arg(long, default_value = "42")]
    pub seed: u64,

    /// Fraction of the balanced rows held out for evaluation (0.0 to 1.0, exclusive)
    #[arg(long, default_value = "0.2", value_parser = validate_test_size)]
    pub test_size: f64,

    /// Number of trees in the random forest
    #[arg(long, default_value = "100", value_parser = clap::value_parser!(u64).range(1..))]
    pub trees: u64,

    /// Maximum training epochs of the neural network
    #[arg(long, default_value = "1000", value_parser = clap::value_parser!(u64).range(1..))]
    pub max_epochs: u64,

    /// Write the results to this JSON file
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Save the balanced dataset (CSV or Parquet, determined by extension)
    #[arg(long)]
    pub export_balanced: Option<PathBuf>,
}

impl Cli {
    /// Training configuration with the command-line overrides applied
    pub fn training_config(&self) -> TrainingConfig {
        let mut config = TrainingConfig::default().with_seed(self.seed);
        config.test_fraction = self.test_size;
        config.forest.n_trees = self.trees as usize;
        config.mlp.max_epochs = self.max_epochs as usize;
        config
    }
}

/// Validator for test_size parameter
fn validate_test_size(s: &str) -> Result<f64, String> {
    let value: f64 = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;

    if value > 0.0 && value < 1.0 {
        Ok(value)
    } else {
        Err(format!(
            "test_size must be between 0.0 and 1.0 (exclusive), got {}",
            value
        ))
    }
}
