//! Model comparison report

use comfy_table::{presets::UTF8_FULL_CONDENSED, Attribute, Cell, Color, Table};
use console::style;

use crate::pipeline::{CleaningReport, ClassCounts, ModelResult, TrainingOutcome};
use crate::utils::Palette;

/// Result with the highest test AUC; the earliest wins ties
pub fn best_model(results: &[ModelResult]) -> Option<&ModelResult> {
    results.iter().fold(None, |best, result| match best {
        Some(current) if current.auc >= result.auc => Some(current),
        _ => Some(result),
    })
}

/// Pair feature names with importances, most important first
pub fn ranked_importances(names: &[String], importances: &[f64]) -> Vec<(String, f64)> {
    let mut ranked: Vec<(String, f64)> = names
        .iter()
        .cloned()
        .zip(importances.iter().copied())
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked
}

/// Everything the final summary shows
#[derive(Debug)]
pub struct ResultsReport<'a> {
    pub cleaning: &'a CleaningReport,
    pub class_counts: ClassCounts,
    pub balanced_rows: usize,
    pub outcome: &'a TrainingOutcome,
}

impl<'a> ResultsReport<'a> {
    pub fn new(
        cleaning: &'a CleaningReport,
        class_counts: ClassCounts,
        balanced_rows: usize,
        outcome: &'a TrainingOutcome,
    ) -> Self {
        Self {
            cleaning,
            class_counts,
            balanced_rows,
            outcome,
        }
    }

    pub fn best(&self) -> Option<&ModelResult> {
        best_model(&self.outcome.results)
    }

    /// Ranked importances of the first model that reports them
    pub fn importances(&self) -> Option<Vec<(String, f64)>> {
        self.outcome.results.iter().find_map(|result| {
            result
                .model
                .feature_importances()
                .map(|imp| ranked_importances(&self.outcome.feature_names, &imp.to_vec()))
        })
    }

    pub fn display(&self, palette: &Palette) {
        self.display_data_summary(palette);
        self.display_models(palette);
        self.display_importances(palette);
    }

    fn section_header(icon: &str, title: &str, palette: &Palette) {
        println!();
        println!(
            "    {} {}",
            style(icon).cyan(),
            palette.primary_style().bold().apply_to(title)
        );
        println!("    {}", style("─".repeat(50)).dim());
        println!();
    }

    fn print_table(table: &Table) {
        for line in table.to_string().lines() {
            println!("    {}", line);
        }
    }

    fn display_data_summary(&self, palette: &Palette) {
        Self::section_header("📋", "DATA SUMMARY", palette);

        let mut table = Table::new();
        table.load_preset(UTF8_FULL_CONDENSED);
        table.set_header(vec![
            Cell::new("Metric").add_attribute(Attribute::Bold),
            Cell::new("Value").add_attribute(Attribute::Bold),
        ]);

        table.add_row(vec![
            Cell::new("📁 Pixels loaded"),
            Cell::new(self.cleaning.rows_before),
        ]);
        table.add_row(vec![
            Cell::new("🗑️  Rows dropped"),
            Cell::new(format!(
                "{} ({:.1}%)",
                self.cleaning.rows_dropped(),
                self.cleaning.dropped_pct()
            ))
            .fg(if self.cleaning.rows_dropped() == 0 {
                Color::White
            } else {
                Color::Red
            }),
        ]);
        table.add_row(vec![
            Cell::new("⛰️  Scar pixels"),
            Cell::new(self.class_counts.positive),
        ]);
        table.add_row(vec![
            Cell::new("🌿 Non-scar pixels"),
            Cell::new(self.class_counts.negative),
        ]);
        table.add_row(vec![
            Cell::new("⚖️  Balanced rows"),
            Cell::new(self.balanced_rows)
                .fg(Color::Green)
                .add_attribute(Attribute::Bold),
        ]);
        table.add_row(vec![
            Cell::new("✂️  Train / Test"),
            Cell::new(format!(
                "{} / {}",
                self.outcome.train_rows, self.outcome.test_rows
            )),
        ]);

        Self::print_table(&table);
    }

    fn display_models(&self, palette: &Palette) {
        Self::section_header("🤖", "MODEL COMPARISON", palette);

        let best = self.best().map(|b| b.kind);

        let mut table = Table::new();
        table.load_preset(UTF8_FULL_CONDENSED);
        table.set_header(vec![
            Cell::new("Model").add_attribute(Attribute::Bold),
            Cell::new("AUC").add_attribute(Attribute::Bold),
            Cell::new("Accuracy").add_attribute(Attribute::Bold),
            Cell::new("Fit time").add_attribute(Attribute::Bold),
            Cell::new("Converged").add_attribute(Attribute::Bold),
        ]);

        for result in &self.outcome.results {
            let is_best = Some(result.kind) == best;
            let mut name = Cell::new(result.name());
            let mut auc = Cell::new(format!("{:.4}", result.auc)).fg(auc_color(result.auc));
            if is_best {
                name = name.add_attribute(Attribute::Bold);
                auc = auc.add_attribute(Attribute::Bold);
            }
            table.add_row(vec![
                name,
                auc,
                Cell::new(format!("{:.4}", result.accuracy)),
                Cell::new(format!("{:.2}s", result.fit_time.as_secs_f64())),
                if result.converged() {
                    Cell::new("yes")
                } else {
                    Cell::new("no").fg(Color::Yellow)
                },
            ]);
        }

        Self::print_table(&table);

        if let Some(best) = self.best() {
            println!();
            println!(
                "    {} Best model: {} {}",
                style("★").yellow(),
                palette.accent_style().bold().apply_to(best.name()),
                style(format!("(AUC {:.4})", best.auc)).dim()
            );
        }
    }

    fn display_importances(&self, palette: &Palette) {
        let Some(ranked) = self.importances() else {
            return;
        };

        Self::section_header("🌲", "FEATURE IMPORTANCE", palette);

        let mut table = Table::new();
        table.load_preset(UTF8_FULL_CONDENSED);
        table.set_header(vec![
            Cell::new("#").add_attribute(Attribute::Bold),
            Cell::new("Feature").add_attribute(Attribute::Bold),
            Cell::new("Importance").add_attribute(Attribute::Bold),
        ]);

        for (rank, (feature, importance)) in ranked.iter().enumerate() {
            table.add_row(vec![
                Cell::new(rank + 1),
                Cell::new(feature),
                Cell::new(format!("{:.4}", importance)),
            ]);
        }

        Self::print_table(&table);
    }
}

fn auc_color(auc: f64) -> Color {
    if auc >= 0.8 {
        Color::Green
    } else if auc >= 0.6 {
        Color::Yellow
    } else {
        Color::Red
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Classifier, ModelKind, RandomForest};
    use std::time::Duration;

    fn result(kind: ModelKind, auc: f64) -> ModelResult {
        ModelResult {
            kind,
            model: Box::new(RandomForest::default()) as Box<dyn Classifier>,
            auc,
            accuracy: 0.5,
            fit_time: Duration::from_millis(10),
        }
    }

    #[test]
    fn test_best_model_max_auc() {
        let results = vec![
            result(ModelKind::RandomForest, 0.81),
            result(ModelKind::Svm, 0.92),
            result(ModelKind::NeuralNetwork, 0.88),
        ];
        assert_eq!(best_model(&results).unwrap().kind, ModelKind::Svm);
    }

    #[test]
    fn test_best_model_first_wins_ties() {
        let results = vec![
            result(ModelKind::RandomForest, 0.9),
            result(ModelKind::Svm, 0.9),
        ];
        assert_eq!(best_model(&results).unwrap().kind, ModelKind::RandomForest);
        assert!(best_model(&[]).is_none());
    }

    #[test]
    fn test_ranked_importances_descending() {
        let names = vec!["slope".to_string(), "ndvi".to_string(), "twi".to_string()];
        let ranked = ranked_importances(&names, &[0.2, 0.5, 0.3]);
        let order: Vec<&str> = ranked.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(order, vec!["ndvi", "twi", "slope"]);
    }

    #[test]
    fn test_auc_color() {
        assert_eq!(auc_color(0.95), Color::Green);
        assert_eq!(auc_color(0.7), Color::Yellow);
        assert_eq!(auc_color(0.4), Color::Red);
    }
}
