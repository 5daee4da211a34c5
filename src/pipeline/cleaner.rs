//! Range-based outlier filtering for the pixel table
//!
//! Every rule is column-local: a value outside its inclusive bound is
//! replaced with null, and rows holding any null are then dropped. There is
//! no imputation.

use anyhow::{Context, Result};
use polars::prelude::*;

use super::target::NO_SCAR_SENTINEL;

/// Inclusive bound accepted by a [`ColumnRule`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bound {
    /// `lo <= value <= hi`
    Between(f64, f64),
    /// `value >= lo`
    AtLeast(f64),
}

impl Bound {
    pub fn contains(&self, value: f64) -> bool {
        match *self {
            Bound::Between(lo, hi) => value >= lo && value <= hi,
            Bound::AtLeast(lo) => value >= lo,
        }
    }
}

/// Validity rule for one column of the pixel table
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnRule {
    pub column: &'static str,
    pub bound: Bound,
    /// Truncate toward zero and store as `Int64` before checking the bound
    pub integer: bool,
}

impl ColumnRule {
    const fn new(column: &'static str, bound: Bound, integer: bool) -> Self {
        Self {
            column,
            bound,
            integer,
        }
    }

    /// Apply the rule to one raw value, returning `None` when it is invalid
    pub fn admit(&self, value: f64) -> Option<f64> {
        if !value.is_finite() {
            return None;
        }
        let value = if self.integer { value.trunc() } else { value };
        self.bound.contains(value).then_some(value)
    }
}

/// Physical validity ranges of the composite raster bands.
///
/// The `landslide_scars` floor is the no-scar sentinel: anything below it is
/// nodata, while the sentinel itself survives to be labelled as class 0.
pub const VALID_RANGES: [ColumnRule; 10] = [
    ColumnRule::new("elevation", Bound::Between(-30.0, 942.0), true),
    ColumnRule::new("aspect", Bound::Between(-1.0, 360.0), false),
    ColumnRule::new("geology", Bound::AtLeast(0.0), true),
    ColumnRule::new("landslide_scars", Bound::AtLeast(NO_SCAR_SENTINEL as f64), true),
    ColumnRule::new("ndvi", Bound::Between(-1.0, 1.0), false),
    ColumnRule::new("plan_curv", Bound::Between(-8.04696, 6.0631), false),
    ColumnRule::new("profile_curv", Bound::Between(-8.8354, 10.5086), false),
    ColumnRule::new("slope", Bound::Between(0.0, 64.991), false),
    ColumnRule::new("spi", Bound::Between(-14.5964, 7.18534), false),
    ColumnRule::new("twi", Bound::Between(-6907.75, 12986.3), false),
];

/// Look up the validity rule of a column
pub fn rule_for(column: &str) -> Option<&'static ColumnRule> {
    VALID_RANGES.iter().find(|rule| rule.column == column)
}

/// Outcome of cleaning the pixel table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CleaningReport {
    pub rows_before: usize,
    pub rows_after: usize,
    /// Values nulled by each rule (already-missing values are not counted)
    pub invalidated: Vec<(String, usize)>,
}

impl CleaningReport {
    pub fn rows_dropped(&self) -> usize {
        self.rows_before - self.rows_after
    }

    pub fn dropped_pct(&self) -> f64 {
        if self.rows_before == 0 {
            0.0
        } else {
            self.rows_dropped() as f64 / self.rows_before as f64 * 100.0
        }
    }
}

/// Apply [`VALID_RANGES`] to the pixel table and drop incomplete rows.
///
/// Columns without a rule are passed through unchanged, but their nulls
/// still cause rows to be dropped.
pub fn clean_pixel_table(df: &DataFrame) -> Result<(DataFrame, CleaningReport)> {
    clean_with_rules(df, &VALID_RANGES)
}

/// Apply an arbitrary rule set; see [`clean_pixel_table`]
pub fn clean_with_rules(
    df: &DataFrame,
    rules: &[ColumnRule],
) -> Result<(DataFrame, CleaningReport)> {
    let mut filtered = df.clone();
    let mut invalidated = Vec::with_capacity(rules.len());

    for rule in rules {
        let column = df
            .column(rule.column)
            .with_context(|| format!("Column '{}' not found in pixel table", rule.column))?;
        let (column, nulled) = apply_rule(column, rule)?;
        filtered
            .with_column(column)
            .with_context(|| format!("Failed to replace column '{}'", rule.column))?;
        invalidated.push((rule.column.to_string(), nulled));
    }

    let cleaned = filtered
        .drop_nulls::<String>(None)
        .context("Failed to drop incomplete rows")?;

    let report = CleaningReport {
        rows_before: df.height(),
        rows_after: cleaned.height(),
        invalidated,
    };

    Ok((cleaned, report))
}

fn apply_rule(column: &Column, rule: &ColumnRule) -> Result<(Column, usize)> {
    let as_float = column
        .cast(&DataType::Float64)
        .with_context(|| format!("Column '{}' is not numeric", rule.column))?;
    let values = as_float.f64()?;

    let mut nulled = 0usize;
    let admitted: Vec<Option<f64>> = values
        .into_iter()
        .map(|value| {
            let value = value?;
            let kept = rule.admit(value);
            if kept.is_none() {
                nulled += 1;
            }
            kept
        })
        .collect();

    let name: PlSmallStr = rule.column.into();
    let column = if rule.integer {
        let ints: Vec<Option<i64>> = admitted.iter().map(|v| v.map(|x| x as i64)).collect();
        Column::new(name, ints)
    } else {
        Column::new(name, admitted)
    };

    Ok((column, nulled))
}
