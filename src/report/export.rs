//! JSON export of a training run

use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;

use super::results::ResultsReport;
use crate::pipeline::TrainingConfig;

/// Metadata about the run
#[derive(Debug, Serialize)]
pub struct RunMetadata {
    /// Timestamp of the run (ISO 8601 format)
    pub timestamp: String,
    pub scarp_version: String,
    pub input_file: String,
    pub seed: u64,
    pub test_fraction: f64,
    pub n_trees: usize,
    pub max_epochs: usize,
}

/// Row counts through the data preparation stages
#[derive(Debug, Serialize)]
pub struct DataSummary {
    pub pixels: usize,
    pub rows_after_cleaning: usize,
    pub rows_dropped: usize,
    /// Values invalidated per column during cleaning
    pub invalidated: Vec<ColumnCount>,
    pub scar_pixels: usize,
    pub non_scar_pixels: usize,
    pub balanced_rows: usize,
    pub train_rows: usize,
    pub test_rows: usize,
}

#[derive(Debug, Serialize)]
pub struct ColumnCount {
    pub column: String,
    pub count: usize,
}

/// Test-set scores of one model
#[derive(Debug, Serialize)]
pub struct ModelEntry {
    pub model: String,
    pub auc: f64,
    pub accuracy: f64,
    pub fit_seconds: f64,
    pub converged: bool,
}

#[derive(Debug, Serialize)]
pub struct ImportanceEntry {
    pub feature: String,
    pub importance: f64,
}

/// Complete run export
#[derive(Debug, Serialize)]
pub struct RunExport {
    pub metadata: RunMetadata,
    pub data: DataSummary,
    pub models: Vec<ModelEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_model: Option<String>,
    pub feature_importances: Vec<ImportanceEntry>,
}

impl RunExport {
    pub fn build(report: &ResultsReport, config: &TrainingConfig, input_file: &Path) -> Self {
        let outcome = report.outcome;
        let cleaning = report.cleaning;

        RunExport {
            metadata: RunMetadata {
                timestamp: Utc::now().to_rfc3339(),
                scarp_version: env!("CARGO_PKG_VERSION").to_string(),
                input_file: input_file.display().to_string(),
                seed: config.seed,
                test_fraction: config.test_fraction,
                n_trees: config.forest.n_trees,
                max_epochs: config.mlp.max_epochs,
            },
            data: DataSummary {
                pixels: cleaning.rows_before,
                rows_after_cleaning: cleaning.rows_after,
                rows_dropped: cleaning.rows_dropped(),
                invalidated: cleaning
                    .invalidated
                    .iter()
                    .map(|(column, count)| ColumnCount {
                        column: column.clone(),
                        count: *count,
                    })
                    .collect(),
                scar_pixels: report.class_counts.positive,
                non_scar_pixels: report.class_counts.negative,
                balanced_rows: report.balanced_rows,
                train_rows: outcome.train_rows,
                test_rows: outcome.test_rows,
            },
            models: outcome
                .results
                .iter()
                .map(|r| ModelEntry {
                    model: r.name().to_string(),
                    auc: r.auc,
                    accuracy: r.accuracy,
                    fit_seconds: r.fit_time.as_secs_f64(),
                    converged: r.converged(),
                })
                .collect(),
            best_model: report.best().map(|b| b.name().to_string()),
            feature_importances: report
                .importances()
                .unwrap_or_default()
                .into_iter()
                .map(|(feature, importance)| ImportanceEntry {
                    feature,
                    importance,
                })
                .collect(),
        }
    }
}

/// Write the run results to a pretty-printed JSON file
pub fn export_results(
    report: &ResultsReport,
    config: &TrainingConfig,
    input_file: &Path,
    output_path: &Path,
) -> Result<()> {
    let export = RunExport::build(report, config, input_file);

    let json =
        serde_json::to_string_pretty(&export).context("Failed to serialize results to JSON")?;

    std::fs::write(output_path, json)
        .with_context(|| format!("Failed to write results to {}", output_path.display()))?;

    Ok(())
}
