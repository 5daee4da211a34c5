//! Random forest of CART trees with Gini impurity
//!
//! Each tree is grown to purity on a bootstrap sample, considering a random
//! subset of features at every split. Trees are fitted in parallel, each
//! with its own RNG seeded from the forest seed and the tree index, so the
//! fitted forest does not depend on thread scheduling.

use ndarray::{Array1, ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use super::{validate_features, validate_training_data, Classifier, ModelError, ModelKind};

/// Random forest hyperparameters
#[derive(Debug, Clone, PartialEq)]
pub struct ForestParams {
    pub n_trees: usize,
    /// Candidate features per split; `None` means `floor(sqrt(n_features))`
    pub max_features: Option<usize>,
    pub min_samples_split: usize,
    pub max_depth: Option<usize>,
    pub bootstrap: bool,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_features: None,
            min_samples_split: 2,
            max_depth: None,
            bootstrap: true,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        positive_rate: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// Growth limits shared by every tree of a forest
#[derive(Debug, Clone, Copy)]
pub struct TreeSettings {
    pub max_features: usize,
    pub min_samples_split: usize,
    pub max_depth: Option<usize>,
}

/// A single CART classification tree
#[derive(Debug, Clone)]
pub struct DecisionTree {
    nodes: Vec<Node>,
    /// Total weighted impurity decrease per feature
    impurity_decrease: Array1<f64>,
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    /// Sum of `n * gini` over both children
    child_impurity: f64,
}

impl DecisionTree {
    /// Grow a tree on the rows listed in `samples` (duplicates allowed)
    pub fn fit(
        x: &ArrayView2<f64>,
        y: &ArrayView1<u8>,
        samples: Vec<usize>,
        settings: TreeSettings,
        rng: &mut StdRng,
    ) -> Self {
        let mut nodes = vec![Node::Leaf { positive_rate: 0.0 }];
        let mut impurity_decrease = Array1::<f64>::zeros(x.ncols());
        let mut stack = vec![(0usize, samples, 0usize)];

        while let Some((id, samples, depth)) = stack.pop() {
            let n = samples.len();
            let positives = samples.iter().filter(|&&i| y[i] == 1).count();
            let leaf = Node::Leaf {
                positive_rate: if n == 0 { 0.0 } else { positives as f64 / n as f64 },
            };

            let depth_reached = settings.max_depth.is_some_and(|max| depth >= max);
            if positives == 0 || positives == n || n < settings.min_samples_split || depth_reached
            {
                nodes[id] = leaf;
                continue;
            }

            let Some(split) = best_split(x, y, &samples, positives, settings.max_features, rng)
            else {
                nodes[id] = leaf;
                continue;
            };

            impurity_decrease[split.feature] +=
                weighted_gini(n, positives) - split.child_impurity;

            let (left, right): (Vec<usize>, Vec<usize>) = samples
                .into_iter()
                .partition(|&i| x[[i, split.feature]] <= split.threshold);

            let left_id = nodes.len();
            let right_id = left_id + 1;
            nodes.push(Node::Leaf { positive_rate: 0.0 });
            nodes.push(Node::Leaf { positive_rate: 0.0 });
            nodes[id] = Node::Split {
                feature: split.feature,
                threshold: split.threshold,
                left: left_id,
                right: right_id,
            };

            stack.push((right_id, right, depth + 1));
            stack.push((left_id, left, depth + 1));
        }

        Self {
            nodes,
            impurity_decrease,
        }
    }

    /// Positive-class rate of the leaf that `row` falls into
    pub fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        let mut id = 0;
        loop {
            match self.nodes[id] {
                Node::Leaf { positive_rate } => return positive_rate,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    id = if row[feature] <= threshold { left } else { right };
                }
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Impurity decrease per feature normalised to sum to 1 (all zeros for a
    /// tree without splits)
    pub fn feature_importances(&self) -> Array1<f64> {
        normalise(self.impurity_decrease.clone())
    }
}

/// `n * gini` of a node with `positives` of `n` rows in class 1
fn weighted_gini(n: usize, positives: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    2.0 * positives as f64 * (n - positives) as f64 / n as f64
}

fn best_split(
    x: &ArrayView2<f64>,
    y: &ArrayView1<u8>,
    samples: &[usize],
    positives: usize,
    max_features: usize,
    rng: &mut StdRng,
) -> Option<SplitCandidate> {
    let n = samples.len();
    let mut features: Vec<usize> = (0..x.ncols()).collect();
    features.shuffle(rng);

    let mut sorted = samples.to_vec();
    let mut informative = 0;
    let mut best: Option<SplitCandidate> = None;

    for feature in features {
        if informative >= max_features {
            break;
        }

        sorted.sort_by(|&a, &b| x[[a, feature]].total_cmp(&x[[b, feature]]));
        if x[[sorted[0], feature]] == x[[sorted[n - 1], feature]] {
            // constant within this node; does not count against max_features
            continue;
        }
        informative += 1;

        let mut left_positives = 0;
        for k in 0..n - 1 {
            left_positives += usize::from(y[sorted[k]]);
            let value = x[[sorted[k], feature]];
            let next = x[[sorted[k + 1], feature]];
            if value == next {
                continue;
            }

            let n_left = k + 1;
            let child_impurity = weighted_gini(n_left, left_positives)
                + weighted_gini(n - n_left, positives - left_positives);

            if best
                .as_ref()
                .map_or(true, |b| child_impurity < b.child_impurity)
            {
                let mut threshold = value + (next - value) / 2.0;
                if threshold >= next || !threshold.is_finite() {
                    threshold = value;
                }
                best = Some(SplitCandidate {
                    feature,
                    threshold,
                    child_impurity,
                });
            }
        }
    }

    best
}

fn normalise(values: Array1<f64>) -> Array1<f64> {
    let total = values.sum();
    if total > 0.0 {
        values / total
    } else {
        values
    }
}

/// Bagged ensemble of [`DecisionTree`]s
#[derive(Debug, Clone)]
pub struct RandomForest {
    params: ForestParams,
    trees: Vec<DecisionTree>,
    n_features: usize,
}

impl RandomForest {
    pub fn new(params: ForestParams) -> Self {
        Self {
            params,
            trees: Vec::new(),
            n_features: 0,
        }
    }

    fn settings(&self, n_features: usize) -> TreeSettings {
        let default = ((n_features as f64).sqrt().floor() as usize).max(1);
        TreeSettings {
            max_features: self
                .params
                .max_features
                .unwrap_or(default)
                .clamp(1, n_features.max(1)),
            min_samples_split: self.params.min_samples_split.max(2),
            max_depth: self.params.max_depth,
        }
    }
}

impl Default for RandomForest {
    fn default() -> Self {
        Self::new(ForestParams::default())
    }
}

impl Classifier for RandomForest {
    fn kind(&self) -> ModelKind {
        ModelKind::RandomForest
    }

    fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<u8>) -> Result<(), ModelError> {
        validate_training_data(&x, &y)?;
        if self.params.n_trees == 0 {
            return Err(ModelError::Diverged("forest needs at least one tree".into()));
        }

        let n = x.nrows();
        let settings = self.settings(x.ncols());
        let bootstrap = self.params.bootstrap;
        let seed = self.params.seed;

        self.trees = (0..self.params.n_trees)
            .into_par_iter()
            .map(|t| {
                let mut rng = StdRng::seed_from_u64(seed.wrapping_add(t as u64));
                let samples: Vec<usize> = if bootstrap {
                    (0..n).map(|_| rng.gen_range(0..n)).collect()
                } else {
                    (0..n).collect()
                };
                DecisionTree::fit(&x, &y, samples, settings, &mut rng)
            })
            .collect();
        self.n_features = x.ncols();
        Ok(())
    }

    fn predict_proba(&self, x: ArrayView2<f64>) -> Result<Array1<f64>, ModelError> {
        if self.trees.is_empty() {
            return Err(ModelError::NotFitted);
        }
        validate_features(&x, self.n_features)?;

        let n_trees = self.trees.len() as f64;
        Ok(x.outer_iter()
            .map(|row| {
                self.trees
                    .iter()
                    .map(|tree| tree.predict_row(row))
                    .sum::<f64>()
                    / n_trees
            })
            .collect())
    }

    /// Mean decrease in impurity, averaged over trees and normalised to sum
    /// to 1
    fn feature_importances(&self) -> Option<Array1<f64>> {
        if self.trees.is_empty() {
            return None;
        }
        let mut total = Array1::<f64>::zeros(self.n_features);
        for tree in &self.trees {
            total += &tree.feature_importances();
        }
        Some(normalise(total / self.trees.len() as f64))
    }
}
