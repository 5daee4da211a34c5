//! Fixed three-model training and evaluation loop
//!
//! All models share one stratified split. The random forest is fitted on
//! raw features; the SVM and neural network on features standardised with
//! statistics from the training partition.

use std::fmt;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use ndarray::{Array1, Array2};
use polars::prelude::*;

use super::scaler::StandardScaler;
use super::split::{
    feature_matrix, label_vector, select_labels, select_rows, stratified_split, FEATURE_COLUMNS,
};
use crate::models::{
    accuracy, roc_auc, Classifier, ForestParams, MlpClassifier, MlpParams, ModelKind,
    RandomForest, SvmClassifier, SvmParams,
};

/// Models in the order they are trained and reported
pub const MODEL_ORDER: [ModelKind; 3] = [
    ModelKind::RandomForest,
    ModelKind::Svm,
    ModelKind::NeuralNetwork,
];

/// Embedded training constants
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingConfig {
    /// Seed of the stratified split; model seeds live in their own params
    pub seed: u64,
    pub test_fraction: f64,
    pub forest: ForestParams,
    pub svm: SvmParams,
    pub mlp: MlpParams,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            test_fraction: 0.2,
            forest: ForestParams::default(),
            svm: SvmParams::default(),
            mlp: MlpParams::default(),
        }
    }
}

impl TrainingConfig {
    /// Use `seed` for the split and every seeded model
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self.forest.seed = seed;
        self.mlp.seed = seed;
        self
    }
}

/// Train/test partitions in raw and standardised form
#[derive(Debug, Clone)]
pub struct PreparedData {
    pub feature_names: Vec<String>,
    pub x_train: Array2<f64>,
    pub x_test: Array2<f64>,
    pub x_train_scaled: Array2<f64>,
    pub x_test_scaled: Array2<f64>,
    pub y_train: Array1<u8>,
    pub y_test: Array1<u8>,
    pub scaler: StandardScaler,
}

impl PreparedData {
    fn inputs(&self, kind: ModelKind) -> (&Array2<f64>, &Array2<f64>) {
        if kind.needs_scaling() {
            (&self.x_train_scaled, &self.x_test_scaled)
        } else {
            (&self.x_train, &self.x_test)
        }
    }
}

/// Evaluation record of one fitted model
pub struct ModelResult {
    pub kind: ModelKind,
    pub model: Box<dyn Classifier>,
    pub auc: f64,
    pub accuracy: f64,
    pub fit_time: Duration,
}

impl ModelResult {
    pub fn name(&self) -> &'static str {
        self.kind.display_name()
    }

    pub fn converged(&self) -> bool {
        self.model.converged()
    }
}

impl fmt::Debug for ModelResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelResult")
            .field("kind", &self.kind)
            .field("auc", &self.auc)
            .field("accuracy", &self.accuracy)
            .field("fit_time", &self.fit_time)
            .field("converged", &self.converged())
            .finish()
    }
}

/// Everything produced by the training step
#[derive(Debug)]
pub struct TrainingOutcome {
    pub feature_names: Vec<String>,
    pub train_rows: usize,
    pub test_rows: usize,
    pub results: Vec<ModelResult>,
}

/// Extract features and labels from the balanced table, split them, and
/// standardise a copy of both partitions.
pub fn prepare_data(df: &DataFrame, config: &TrainingConfig) -> Result<PreparedData> {
    let x = feature_matrix(df, &FEATURE_COLUMNS)?;
    let y = label_vector(df)?;

    let labels = y.to_vec();
    let split = stratified_split(&labels, config.test_fraction, config.seed)
        .context("Failed to split the balanced dataset")?;

    let x_train = select_rows(&x, &split.train);
    let x_test = select_rows(&x, &split.test);
    let y_train = select_labels(&y, &split.train);
    let y_test = select_labels(&y, &split.test);

    let (scaler, x_train_scaled) = StandardScaler::fit_transform(&x_train)?;
    let x_test_scaled = scaler.transform(&x_test)?;

    Ok(PreparedData {
        feature_names: FEATURE_COLUMNS.iter().map(|s| s.to_string()).collect(),
        x_train,
        x_test,
        x_train_scaled,
        x_test_scaled,
        y_train,
        y_test,
        scaler,
    })
}

/// Construct an unfitted model of the given kind
pub fn build_model(kind: ModelKind, config: &TrainingConfig) -> Box<dyn Classifier> {
    match kind {
        ModelKind::RandomForest => Box::new(RandomForest::new(config.forest.clone())),
        ModelKind::Svm => Box::new(SvmClassifier::new(config.svm.clone())),
        ModelKind::NeuralNetwork => Box::new(MlpClassifier::new(config.mlp.clone())),
    }
}

/// Fit one model on the training partition and score it on the test partition
pub fn train_model(
    kind: ModelKind,
    data: &PreparedData,
    config: &TrainingConfig,
) -> Result<ModelResult> {
    let (train, test) = data.inputs(kind);
    let mut model = build_model(kind, config);

    let start = Instant::now();
    model.fit(train.view(), data.y_train.view())?;
    let fit_time = start.elapsed();

    let proba = model.predict_proba(test.view())?;
    let predicted = model.predict(test.view())?;

    let y_test = data.y_test.to_vec();
    let auc = roc_auc(&y_test, &proba.to_vec())?;
    let accuracy = accuracy(&y_test, &predicted.to_vec());

    Ok(ModelResult {
        kind,
        model,
        auc,
        accuracy,
        fit_time,
    })
}

/// Progress notifications from [`train_models`]
#[derive(Debug)]
pub enum TrainingEvent<'a> {
    Started(ModelKind),
    Finished(&'a ModelResult),
}

/// Train every model of [`MODEL_ORDER`] on prepared partitions, reporting
/// each start and finish to `on_event`.
pub fn train_models<F>(
    data: PreparedData,
    config: &TrainingConfig,
    mut on_event: F,
) -> Result<TrainingOutcome>
where
    F: FnMut(TrainingEvent<'_>),
{
    let mut results = Vec::with_capacity(MODEL_ORDER.len());
    for kind in MODEL_ORDER {
        on_event(TrainingEvent::Started(kind));
        let result = train_model(kind, &data, config)
            .with_context(|| format!("{} training failed", kind))?;
        on_event(TrainingEvent::Finished(&result));
        results.push(result);
    }

    Ok(TrainingOutcome {
        train_rows: data.y_train.len(),
        test_rows: data.y_test.len(),
        feature_names: data.feature_names,
        results,
    })
}

/// Prepare the data and train every model of [`MODEL_ORDER`]
pub fn train_and_evaluate(df: &DataFrame, config: &TrainingConfig) -> Result<TrainingOutcome> {
    let data = prepare_data(df, config)?;
    train_models(data, config, |_| {})
}
