//! Feature standardisation (zero mean, unit variance)

use anyhow::Result;
use ndarray::{Array1, Array2, Axis};

/// Per-feature standardisation fitted on one partition and applied to others
#[derive(Debug, Clone, PartialEq)]
pub struct StandardScaler {
    pub mean: Array1<f64>,
    /// Population standard deviation; constant features get a scale of 1
    pub scale: Array1<f64>,
}

impl StandardScaler {
    pub fn fit(x: &Array2<f64>) -> Result<Self> {
        if x.nrows() == 0 {
            anyhow::bail!("Cannot fit a scaler on an empty matrix");
        }

        let mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| anyhow::anyhow!("Cannot compute feature means"))?;
        let scale = x
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s > f64::EPSILON { s } else { 1.0 });

        Ok(Self { mean, scale })
    }

    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if x.ncols() != self.mean.len() {
            anyhow::bail!(
                "Scaler was fitted on {} features, got {}",
                self.mean.len(),
                x.ncols()
            );
        }
        Ok((x - &self.mean) / &self.scale)
    }

    pub fn fit_transform(x: &Array2<f64>) -> Result<(Self, Array2<f64>)> {
        let scaler = Self::fit(x)?;
        let scaled = scaler.transform(x)?;
        Ok((scaler, scaled))
    }
}
