//! Multi-layer perceptron for binary classification
//!
//! ReLU hidden layers, a single logistic output unit, log-loss with L2
//! regularisation, and minibatch Adam. Training stops after `max_epochs` or
//! once the epoch loss has failed to improve by `tolerance` for more than
//! `n_iter_no_change` consecutive epochs.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use super::{
    sigmoid, validate_features, validate_training_data, Classifier, ModelError, ModelKind,
};

/// MLP hyperparameters
#[derive(Debug, Clone, PartialEq)]
pub struct MlpParams {
    pub hidden_layers: Vec<usize>,
    pub learning_rate: f64,
    /// L2 penalty
    pub alpha: f64,
    pub batch_size: usize,
    pub max_epochs: usize,
    pub tolerance: f64,
    pub n_iter_no_change: usize,
    pub beta1: f64,
    pub beta2: f64,
    pub epsilon: f64,
    pub seed: u64,
}

impl Default for MlpParams {
    fn default() -> Self {
        Self {
            hidden_layers: vec![100, 50],
            learning_rate: 1e-3,
            alpha: 1e-4,
            batch_size: 200,
            max_epochs: 1000,
            tolerance: 1e-4,
            n_iter_no_change: 10,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone)]
struct Layer {
    weights: Array2<f64>,
    bias: Array1<f64>,
}

/// First and second moment estimates of one layer
#[derive(Debug, Clone)]
struct Moments {
    m_w: Array2<f64>,
    v_w: Array2<f64>,
    m_b: Array1<f64>,
    v_b: Array1<f64>,
}

impl Moments {
    fn zeros_like(layer: &Layer) -> Self {
        Self {
            m_w: Array2::zeros(layer.weights.raw_dim()),
            v_w: Array2::zeros(layer.weights.raw_dim()),
            m_b: Array1::zeros(layer.bias.raw_dim()),
            v_b: Array1::zeros(layer.bias.raw_dim()),
        }
    }
}

/// Feed-forward neural network classifier
#[derive(Debug, Clone)]
pub struct MlpClassifier {
    params: MlpParams,
    layers: Vec<Layer>,
    loss_curve: Vec<f64>,
    converged: bool,
}

impl MlpClassifier {
    pub fn new(params: MlpParams) -> Self {
        Self {
            params,
            layers: Vec::new(),
            loss_curve: Vec::new(),
            converged: false,
        }
    }

    /// Mean training loss of every completed epoch
    pub fn loss_curve(&self) -> &[f64] {
        &self.loss_curve
    }

    fn init_layers(&self, n_features: usize, rng: &mut StdRng) -> Vec<Layer> {
        let mut sizes = vec![n_features];
        sizes.extend(&self.params.hidden_layers);
        sizes.push(1);

        let last = sizes.len() - 2;
        sizes
            .windows(2)
            .enumerate()
            .map(|(index, pair)| {
                let (fan_in, fan_out) = (pair[0], pair[1]);
                // Glorot uniform; the logistic output layer uses the narrower bound
                let factor = if index == last { 2.0 } else { 6.0 };
                let bound = (factor / (fan_in + fan_out) as f64).sqrt();
                Layer {
                    weights: Array2::from_shape_fn((fan_in, fan_out), |_| {
                        rng.gen_range(-bound..bound)
                    }),
                    bias: Array1::from_shape_fn(fan_out, |_| rng.gen_range(-bound..bound)),
                }
            })
            .collect()
    }

    /// Activations of every layer, input included
    fn forward(layers: &[Layer], x: ArrayView2<f64>) -> Vec<Array2<f64>> {
        let mut activations = Vec::with_capacity(layers.len() + 1);
        activations.push(x.to_owned());
        for (index, layer) in layers.iter().enumerate() {
            let z = activations[index].dot(&layer.weights) + &layer.bias;
            let a = if index + 1 == layers.len() {
                z.mapv(sigmoid)
            } else {
                z.mapv(|v| v.max(0.0))
            };
            activations.push(a);
        }
        activations
    }

    /// Gradients of the regularised loss for one batch, plus the loss itself
    fn backward(
        &self,
        activations: &[Array2<f64>],
        y: &Array2<f64>,
    ) -> (f64, Vec<(Array2<f64>, Array1<f64>)>) {
        let n = y.nrows() as f64;
        let output = &activations[activations.len() - 1];

        let data_loss = output
            .iter()
            .zip(y.iter())
            .map(|(&p, &t)| {
                let p = p.clamp(1e-15, 1.0 - 1e-15);
                -(t * p.ln() + (1.0 - t) * (1.0 - p).ln())
            })
            .sum::<f64>()
            / n;
        let penalty: f64 = self
            .layers
            .iter()
            .map(|layer| layer.weights.iter().map(|w| w * w).sum::<f64>())
            .sum();
        let loss = data_loss + 0.5 * self.params.alpha * penalty / n;

        let mut grads = Vec::with_capacity(self.layers.len());
        let mut delta = output - y;
        for index in (0..self.layers.len()).rev() {
            let layer = &self.layers[index];
            let input = &activations[index];
            let grad_w = (input.t().dot(&delta) + &layer.weights * self.params.alpha) / n;
            let grad_b = delta.sum_axis(Axis(0)) / n;
            if index > 0 {
                let mut next = delta.dot(&layer.weights.t());
                next.zip_mut_with(input, |d, &a| {
                    if a <= 0.0 {
                        *d = 0.0;
                    }
                });
                delta = next;
            }
            grads.push((grad_w, grad_b));
        }
        grads.reverse();
        (loss, grads)
    }
}

impl Default for MlpClassifier {
    fn default() -> Self {
        Self::new(MlpParams::default())
    }
}

impl Classifier for MlpClassifier {
    fn kind(&self) -> ModelKind {
        ModelKind::NeuralNetwork
    }

    fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<u8>) -> Result<(), ModelError> {
        validate_training_data(&x, &y)?;

        let mut rng = StdRng::seed_from_u64(self.params.seed);
        self.layers = self.init_layers(x.ncols(), &mut rng);
        self.loss_curve.clear();
        self.converged = false;

        let mut moments: Vec<Moments> = self.layers.iter().map(Moments::zeros_like).collect();
        let targets = y.mapv(f64::from).insert_axis(Axis(1));
        let n = x.nrows();
        let batch_size = self.params.batch_size.clamp(1, n);
        let mut order: Vec<usize> = (0..n).collect();

        let mut best_loss = f64::INFINITY;
        let mut no_improvement = 0usize;
        let mut step = 0i32;

        for _ in 0..self.params.max_epochs {
            order.shuffle(&mut rng);
            let mut epoch_loss = 0.0;

            for batch in order.chunks(batch_size) {
                let xb = x.select(Axis(0), batch);
                let yb = targets.select(Axis(0), batch);
                let activations = Self::forward(&self.layers, xb.view());
                let (loss, grads) = self.backward(&activations, &yb);
                if !loss.is_finite() {
                    return Err(ModelError::Diverged(format!(
                        "non-finite loss after {} epochs",
                        self.loss_curve.len()
                    )));
                }
                epoch_loss += loss * batch.len() as f64;

                step += 1;
                let p = &self.params;
                let lr = p.learning_rate * (1.0 - p.beta2.powi(step)).sqrt()
                    / (1.0 - p.beta1.powi(step));
                for ((layer, moment), (grad_w, grad_b)) in
                    self.layers.iter_mut().zip(moments.iter_mut()).zip(grads)
                {
                    moment.m_w = &moment.m_w * p.beta1 + &grad_w * (1.0 - p.beta1);
                    moment.v_w = &moment.v_w * p.beta2 + grad_w.mapv(|g| g * g) * (1.0 - p.beta2);
                    moment.m_b = &moment.m_b * p.beta1 + &grad_b * (1.0 - p.beta1);
                    moment.v_b = &moment.v_b * p.beta2 + grad_b.mapv(|g| g * g) * (1.0 - p.beta2);

                    let eps = p.epsilon;
                    layer
                        .weights
                        .zip_mut_with(&(&moment.m_w / &moment.v_w.mapv(|v| v.sqrt() + eps)), |w, &u| {
                            *w -= lr * u
                        });
                    layer
                        .bias
                        .zip_mut_with(&(&moment.m_b / &moment.v_b.mapv(|v| v.sqrt() + eps)), |b, &u| {
                            *b -= lr * u
                        });
                }
            }

            let epoch_loss = epoch_loss / n as f64;
            self.loss_curve.push(epoch_loss);

            if epoch_loss > best_loss - self.params.tolerance {
                no_improvement += 1;
            } else {
                no_improvement = 0;
            }
            if epoch_loss < best_loss {
                best_loss = epoch_loss;
            }
            if no_improvement > self.params.n_iter_no_change {
                self.converged = true;
                break;
            }
        }

        Ok(())
    }

    fn predict_proba(&self, x: ArrayView2<f64>) -> Result<Array1<f64>, ModelError> {
        let first = self.layers.first().ok_or(ModelError::NotFitted)?;
        validate_features(&x, first.weights.nrows())?;

        let activations = Self::forward(&self.layers, x);
        let output = &activations[activations.len() - 1];
        Ok(output.column(0).to_owned())
    }

    fn converged(&self) -> bool {
        self.converged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn blobs() -> (Array2<f64>, Array1<u8>) {
        let x = array![
            [-1.0, -1.0],
            [-0.9, -1.1],
            [-1.2, -0.8],
            [-0.8, -1.3],
            [1.0, 1.0],
            [1.1, 0.9],
            [0.8, 1.2],
            [1.3, 0.7]
        ];
        let y = array![0u8, 0, 0, 0, 1, 1, 1, 1];
        (x, y)
    }

    fn small_params() -> MlpParams {
        MlpParams {
            hidden_layers: vec![16, 8],
            learning_rate: 0.01,
            max_epochs: 500,
            tolerance: 0.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_mlp_separates_blobs() {
        let (x, y) = blobs();
        let mut mlp = MlpClassifier::new(small_params());
        mlp.fit(x.view(), y.view()).unwrap();

        assert_eq!(mlp.predict(x.view()).unwrap(), y);
    }

    #[test]
    fn test_loss_decreases() {
        let (x, y) = blobs();
        let mut mlp = MlpClassifier::new(small_params());
        mlp.fit(x.view(), y.view()).unwrap();

        let curve = mlp.loss_curve();
        assert!(!curve.is_empty());
        assert!(curve[curve.len() - 1] < curve[0]);
    }

    #[test]
    fn test_probabilities_in_unit_interval() {
        let (x, y) = blobs();
        let mut mlp = MlpClassifier::new(small_params());
        mlp.fit(x.view(), y.view()).unwrap();

        let proba = mlp.predict_proba(x.view()).unwrap();
        assert_eq!(proba.len(), 8);
        assert!(proba.iter().all(|p| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn test_layer_shapes() {
        let mlp = MlpClassifier::default();
        let mut rng = StdRng::seed_from_u64(0);
        let layers = mlp.init_layers(9, &mut rng);
        let shapes: Vec<_> = layers.iter().map(|l| l.weights.dim()).collect();
        assert_eq!(shapes, vec![(9, 100), (100, 50), (50, 1)]);
    }

    #[test]
    fn test_unfitted_mlp() {
        let mlp = MlpClassifier::default();
        assert_eq!(
            mlp.predict_proba(array![[1.0]].view()),
            Err(ModelError::NotFitted)
        );
    }
}
