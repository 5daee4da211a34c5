//! Binary classifiers used for susceptibility modelling
//!
//! - [`RandomForest`]: bagged CART trees, scale-invariant, exposes
//!   impurity-based feature importances
//! - [`SvmClassifier`]: RBF-kernel support vector machine with Platt-scaled
//!   probabilities
//! - [`MlpClassifier`]: feed-forward network trained with Adam
//!
//! All models predict the probability of the positive class (label 1).

pub mod forest;
pub mod metrics;
pub mod mlp;
pub mod svm;

pub use forest::{DecisionTree, ForestParams, RandomForest};
pub use metrics::{accuracy, roc_auc};
pub use mlp::{MlpClassifier, MlpParams};
pub use svm::{SvmClassifier, SvmParams};

use ndarray::{Array1, ArrayView1, ArrayView2};
use thiserror::Error;

/// Errors raised by model fitting, prediction and evaluation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Training set is empty")]
    EmptyTrainingSet,

    #[error("Training labels contain a single class; both 0 and 1 are required")]
    SingleClass,

    #[error("Label {0} is not binary")]
    InvalidLabel(u8),

    #[error("Feature matrix has {rows} rows but {labels} labels were given")]
    LengthMismatch { rows: usize, labels: usize },

    #[error("Model was fitted on {expected} features, got {found}")]
    FeatureMismatch { expected: usize, found: usize },

    #[error("Model has not been fitted")]
    NotFitted,

    #[error("Training diverged: {0}")]
    Diverged(String),

    #[error("AUC is undefined when only one class is present in the evaluation labels")]
    UndefinedAuc,
}

/// The three classifier families compared by the analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelKind {
    RandomForest,
    Svm,
    NeuralNetwork,
}

impl ModelKind {
    pub fn display_name(&self) -> &'static str {
        match self {
            ModelKind::RandomForest => "Random Forest",
            ModelKind::Svm => "SVM",
            ModelKind::NeuralNetwork => "Neural Network",
        }
    }

    /// Whether the model is fitted on standardised features
    pub fn needs_scaling(&self) -> bool {
        !matches!(self, ModelKind::RandomForest)
    }
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Common interface of the binary classifiers
pub trait Classifier: Send + Sync {
    fn kind(&self) -> ModelKind;

    fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<u8>) -> Result<(), ModelError>;

    /// Probability of the positive class for every row of `x`
    fn predict_proba(&self, x: ArrayView2<f64>) -> Result<Array1<f64>, ModelError>;

    /// Hard 0/1 predictions; class 1 only when its probability exceeds 0.5
    fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<u8>, ModelError> {
        Ok(self.predict_proba(x)?.mapv(|p| u8::from(p > 0.5)))
    }

    /// Whether the last fit stopped before its iteration limit
    fn converged(&self) -> bool {
        true
    }

    /// Per-feature importances, when the model provides them
    fn feature_importances(&self) -> Option<Array1<f64>> {
        None
    }
}

/// Shared argument checks for [`Classifier::fit`]
pub(crate) fn validate_training_data(
    x: &ArrayView2<f64>,
    y: &ArrayView1<u8>,
) -> Result<(), ModelError> {
    if x.nrows() != y.len() {
        return Err(ModelError::LengthMismatch {
            rows: x.nrows(),
            labels: y.len(),
        });
    }
    if x.nrows() == 0 {
        return Err(ModelError::EmptyTrainingSet);
    }
    if let Some(&bad) = y.iter().find(|&&label| label > 1) {
        return Err(ModelError::InvalidLabel(bad));
    }
    let positives = y.iter().filter(|&&label| label == 1).count();
    if positives == 0 || positives == y.len() {
        return Err(ModelError::SingleClass);
    }
    Ok(())
}

/// Shared argument check for prediction
pub(crate) fn validate_features(
    x: &ArrayView2<f64>,
    expected: usize,
) -> Result<(), ModelError> {
    if x.ncols() != expected {
        return Err(ModelError::FeatureMismatch {
            expected,
            found: x.ncols(),
        });
    }
    Ok(())
}

/// Numerically stable logistic function
pub(crate) fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}
