//! Support vector machine with an RBF kernel
//!
//! The dual problem is solved with SMO using maximal-violating-pair working
//! set selection. Kernel rows are computed on demand and kept in a bounded
//! cache. Positive-class probabilities come from a Platt sigmoid fitted on
//! the training decision values.

use std::collections::{HashMap, VecDeque};

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

use super::{validate_features, validate_training_data, Classifier, ModelError, ModelKind};

/// SVM hyperparameters
#[derive(Debug, Clone, PartialEq)]
pub struct SvmParams {
    /// Box constraint on the dual coefficients
    pub c: f64,
    /// RBF width; `None` means `1 / (n_features * Var(X))`
    pub gamma: Option<f64>,
    /// Stopping tolerance on the maximal KKT violation
    pub tolerance: f64,
    pub max_iter: usize,
    /// Memory budget of the kernel-row cache in bytes
    pub cache_bytes: usize,
}

impl Default for SvmParams {
    fn default() -> Self {
        Self {
            c: 1.0,
            gamma: None,
            tolerance: 1e-3,
            max_iter: 1_000_000,
            cache_bytes: 200 << 20,
        }
    }
}

#[derive(Debug, Clone)]
struct FittedSvm {
    support_vectors: Array2<f64>,
    /// `alpha_i * y_i` for each support vector, with `y` in {-1, +1}
    dual_coef: Array1<f64>,
    rho: f64,
    gamma: f64,
    platt_a: f64,
    platt_b: f64,
}

/// RBF-kernel SVM classifier
#[derive(Debug, Clone)]
pub struct SvmClassifier {
    params: SvmParams,
    fitted: Option<FittedSvm>,
    converged: bool,
}

impl SvmClassifier {
    pub fn new(params: SvmParams) -> Self {
        Self {
            params,
            fitted: None,
            converged: false,
        }
    }

    pub fn n_support(&self) -> usize {
        self.fitted.as_ref().map_or(0, |f| f.dual_coef.len())
    }

    /// Signed distance to the separating surface; positive means class 1
    pub fn decision_function(&self, x: ArrayView2<f64>) -> Result<Array1<f64>, ModelError> {
        let fitted = self.fitted.as_ref().ok_or(ModelError::NotFitted)?;
        validate_features(&x, fitted.support_vectors.ncols())?;

        Ok(x.outer_iter()
            .map(|row| {
                fitted
                    .support_vectors
                    .outer_iter()
                    .zip(fitted.dual_coef.iter())
                    .map(|(sv, &coef)| coef * rbf(sv, row, fitted.gamma))
                    .sum::<f64>()
                    - fitted.rho
            })
            .collect())
    }
}

impl Default for SvmClassifier {
    fn default() -> Self {
        Self::new(SvmParams::default())
    }
}

impl Classifier for SvmClassifier {
    fn kind(&self) -> ModelKind {
        ModelKind::Svm
    }

    fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<u8>) -> Result<(), ModelError> {
        validate_training_data(&x, &y)?;

        let gamma = match self.params.gamma {
            Some(gamma) => gamma,
            None => scale_gamma(&x),
        };
        let signs: Vec<f64> = y.iter().map(|&label| if label == 1 { 1.0 } else { -1.0 }).collect();

        let mut solver = Smo::new(x.view(), &signs, gamma, self.params.c, self.params.cache_bytes);
        let outcome = solver.solve(self.params.tolerance, self.params.max_iter);
        self.converged = outcome.converged;

        let support: Vec<usize> = (0..signs.len())
            .filter(|&i| solver.alpha[i] > 0.0)
            .collect();
        let dual_coef: Array1<f64> = support.iter().map(|&i| solver.alpha[i] * signs[i]).collect();

        let mut fitted = FittedSvm {
            support_vectors: x.select(Axis(0), &support),
            dual_coef,
            rho: outcome.rho,
            gamma,
            platt_a: 0.0,
            platt_b: 0.0,
        };
        self.fitted = Some(fitted.clone());

        let decisions = self.decision_function(x)?.to_vec();
        let (a, b) = fit_platt(&decisions, &signs);
        fitted.platt_a = a;
        fitted.platt_b = b;
        self.fitted = Some(fitted);
        Ok(())
    }

    fn predict_proba(&self, x: ArrayView2<f64>) -> Result<Array1<f64>, ModelError> {
        let fitted = self.fitted.as_ref().ok_or(ModelError::NotFitted)?;
        let decisions = self.decision_function(x)?;
        Ok(decisions.mapv(|f| platt_probability(f, fitted.platt_a, fitted.platt_b)))
    }

    /// Class by the sign of the decision function
    fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<u8>, ModelError> {
        Ok(self.decision_function(x)?.mapv(|f| u8::from(f > 0.0)))
    }

    fn converged(&self) -> bool {
        self.converged
    }
}

fn rbf(a: ArrayView1<f64>, b: ArrayView1<f64>, gamma: f64) -> f64 {
    let dist: f64 = a.iter().zip(b.iter()).map(|(u, v)| (u - v).powi(2)).sum();
    (-gamma * dist).exp()
}

/// `1 / (n_features * Var(X))`, with the variance taken over all entries
fn scale_gamma(x: &ArrayView2<f64>) -> f64 {
    let var = x.var(0.0);
    if var > 0.0 && var.is_finite() {
        1.0 / (x.ncols() as f64 * var)
    } else {
        1.0
    }
}

struct SolveOutcome {
    rho: f64,
    converged: bool,
}

/// SMO solver state for `min 0.5 a'Qa - e'a` subject to `0 <= a <= C`,
/// `y'a = 0`, with `Q_ij = y_i y_j K(x_i, x_j)`
struct Smo<'x, 'y> {
    x: ArrayView2<'x, f64>,
    y: &'y [f64],
    gamma: f64,
    c: f64,
    alpha: Vec<f64>,
    gradient: Vec<f64>,
    cache: KernelCache,
}

impl<'x, 'y> Smo<'x, 'y> {
    fn new(x: ArrayView2<'x, f64>, y: &'y [f64], gamma: f64, c: f64, cache_bytes: usize) -> Self {
        let n = y.len();
        Self {
            x,
            y,
            gamma,
            c,
            alpha: vec![0.0; n],
            gradient: vec![-1.0; n],
            cache: KernelCache::new(cache_capacity(cache_bytes, n)),
        }
    }

    fn kernel_row(&mut self, i: usize) -> std::rc::Rc<Vec<f64>> {
        let (x, gamma) = (self.x, self.gamma);
        self.cache.get_or_insert(i, || {
            let row_i = x.row(i);
            x.outer_iter().map(|row| rbf(row_i, row, gamma)).collect()
        })
    }

    fn in_up(&self, t: usize) -> bool {
        (self.y[t] > 0.0 && self.alpha[t] < self.c) || (self.y[t] < 0.0 && self.alpha[t] > 0.0)
    }

    fn in_low(&self, t: usize) -> bool {
        (self.y[t] > 0.0 && self.alpha[t] > 0.0) || (self.y[t] < 0.0 && self.alpha[t] < self.c)
    }

    /// Maximal violating pair, or `None` once the KKT gap is below `tolerance`
    fn select_pair(&self, tolerance: f64) -> Option<(usize, usize)> {
        let mut up = (f64::NEG_INFINITY, usize::MAX);
        let mut low = (f64::INFINITY, usize::MAX);
        for t in 0..self.y.len() {
            let score = -self.y[t] * self.gradient[t];
            if self.in_up(t) && score > up.0 {
                up = (score, t);
            }
            if self.in_low(t) && score < low.0 {
                low = (score, t);
            }
        }
        if up.1 == usize::MAX || low.1 == usize::MAX || up.0 - low.0 < tolerance {
            None
        } else {
            Some((up.1, low.1))
        }
    }

    fn solve(&mut self, tolerance: f64, max_iter: usize) -> SolveOutcome {
        const TAU: f64 = 1e-12;
        let mut iterations = 0;
        let mut converged = false;

        while iterations < max_iter {
            let Some((i, j)) = self.select_pair(tolerance) else {
                converged = true;
                break;
            };
            iterations += 1;

            let k_i = self.kernel_row(i);
            let k_j = self.kernel_row(j);
            let (y_i, y_j) = (self.y[i], self.y[j]);
            let (old_i, old_j) = (self.alpha[i], self.alpha[j]);
            let c = self.c;

            // Q_ii = Q_jj = 1 for the RBF kernel
            let (mut a_i, mut a_j);
            if y_i != y_j {
                let quad = (2.0 - 2.0 * k_i[j]).max(TAU);
                let delta = (-self.gradient[i] - self.gradient[j]) / quad;
                let diff = old_i - old_j;
                a_i = old_i + delta;
                a_j = old_j + delta;
                if diff > 0.0 {
                    if a_j < 0.0 {
                        a_j = 0.0;
                        a_i = diff;
                    }
                } else if a_i < 0.0 {
                    a_i = 0.0;
                    a_j = -diff;
                }
                if diff > 0.0 {
                    if a_i > c {
                        a_i = c;
                        a_j = c - diff;
                    }
                } else if a_j > c {
                    a_j = c;
                    a_i = c + diff;
                }
            } else {
                let quad = (2.0 - 2.0 * k_i[j]).max(TAU);
                let delta = (self.gradient[i] - self.gradient[j]) / quad;
                let sum = old_i + old_j;
                a_i = old_i - delta;
                a_j = old_j + delta;
                if sum > c {
                    if a_i > c {
                        a_i = c;
                        a_j = sum - c;
                    }
                } else if a_j < 0.0 {
                    a_j = 0.0;
                    a_i = sum;
                }
                if sum > c {
                    if a_j > c {
                        a_j = c;
                        a_i = sum - c;
                    }
                } else if a_i < 0.0 {
                    a_i = 0.0;
                    a_j = sum;
                }
            }

            self.alpha[i] = a_i;
            self.alpha[j] = a_j;
            let (d_i, d_j) = (a_i - old_i, a_j - old_j);
            for t in 0..self.y.len() {
                self.gradient[t] += self.y[t] * (y_i * k_i[t] * d_i + y_j * k_j[t] * d_j);
            }
        }

        SolveOutcome {
            rho: self.rho(),
            converged,
        }
    }

    /// Bias term: mean of `y_i * G_i` over free vectors, or the midpoint of
    /// the feasible interval when no vector is free
    fn rho(&self) -> f64 {
        let mut free_sum = 0.0;
        let mut free_count = 0usize;
        let mut upper = f64::INFINITY;
        let mut lower = f64::NEG_INFINITY;

        for t in 0..self.y.len() {
            let yg = self.y[t] * self.gradient[t];
            let at_upper = self.alpha[t] >= self.c;
            let at_lower = self.alpha[t] <= 0.0;
            if at_upper {
                if self.y[t] < 0.0 {
                    upper = upper.min(yg);
                } else {
                    lower = lower.max(yg);
                }
            } else if at_lower {
                if self.y[t] > 0.0 {
                    upper = upper.min(yg);
                } else {
                    lower = lower.max(yg);
                }
            } else {
                free_count += 1;
                free_sum += yg;
            }
        }

        if free_count > 0 {
            free_sum / free_count as f64
        } else if upper.is_finite() && lower.is_finite() {
            (upper + lower) / 2.0
        } else if upper.is_finite() {
            upper
        } else if lower.is_finite() {
            lower
        } else {
            0.0
        }
    }
}

/// FIFO-evicting cache of kernel rows
/// Kernel rows of `n` doubles that fit in `cache_bytes`, never fewer than two
fn cache_capacity(cache_bytes: usize, n: usize) -> usize {
    let row_bytes = std::mem::size_of::<f64>() * n.max(1);
    (cache_bytes / row_bytes).max(2)
}

struct KernelCache {
    capacity: usize,
    rows: HashMap<usize, std::rc::Rc<Vec<f64>>>,
    order: VecDeque<usize>,
}

impl KernelCache {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            rows: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    fn get_or_insert(
        &mut self,
        key: usize,
        compute: impl FnOnce() -> Vec<f64>,
    ) -> std::rc::Rc<Vec<f64>> {
        if let Some(row) = self.rows.get(&key) {
            return row.clone();
        }
        if self.rows.len() >= self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.rows.remove(&evicted);
            }
        }
        let row = std::rc::Rc::new(compute());
        self.rows.insert(key, row.clone());
        self.order.push_back(key);
        row
    }
}

/// Fit Platt's sigmoid `P(y=1|f) = 1 / (1 + exp(A f + B))` by Newton's
/// method with backtracking line search on regularised targets.
pub fn fit_platt(decisions: &[f64], signs: &[f64]) -> (f64, f64) {
    const MAX_ITER: usize = 100;
    const MIN_STEP: f64 = 1e-10;
    const SIGMA: f64 = 1e-12;
    const EPS: f64 = 1e-5;

    let prior1 = signs.iter().filter(|&&s| s > 0.0).count() as f64;
    let prior0 = signs.len() as f64 - prior1;
    let hi_target = (prior1 + 1.0) / (prior1 + 2.0);
    let lo_target = 1.0 / (prior0 + 2.0);
    let targets: Vec<f64> = signs
        .iter()
        .map(|&s| if s > 0.0 { hi_target } else { lo_target })
        .collect();

    let objective = |a: f64, b: f64| -> f64 {
        decisions
            .iter()
            .zip(&targets)
            .map(|(&f, &t)| {
                let fab = f * a + b;
                if fab >= 0.0 {
                    t * fab + (1.0 + (-fab).exp()).ln()
                } else {
                    (t - 1.0) * fab + (1.0 + fab.exp()).ln()
                }
            })
            .sum()
    };

    let mut a = 0.0;
    let mut b = ((prior0 + 1.0) / (prior1 + 1.0)).ln();
    let mut fval = objective(a, b);

    for _ in 0..MAX_ITER {
        let (mut h11, mut h22, mut h21, mut g1, mut g2) = (SIGMA, SIGMA, 0.0, 0.0, 0.0);
        for (&f, &t) in decisions.iter().zip(&targets) {
            let fab = f * a + b;
            let (p, q) = if fab >= 0.0 {
                let e = (-fab).exp();
                (e / (1.0 + e), 1.0 / (1.0 + e))
            } else {
                let e = fab.exp();
                (1.0 / (1.0 + e), e / (1.0 + e))
            };
            let d2 = p * q;
            h11 += f * f * d2;
            h22 += d2;
            h21 += f * d2;
            let d1 = t - p;
            g1 += f * d1;
            g2 += d1;
        }

        if g1.abs() < EPS && g2.abs() < EPS {
            break;
        }

        let det = h11 * h22 - h21 * h21;
        let da = -(h22 * g1 - h21 * g2) / det;
        let db = -(-h21 * g1 + h11 * g2) / det;
        let gd = g1 * da + g2 * db;

        let mut step = 1.0;
        while step >= MIN_STEP {
            let (new_a, new_b) = (a + step * da, b + step * db);
            let new_f = objective(new_a, new_b);
            if new_f < fval + 1e-4 * step * gd {
                a = new_a;
                b = new_b;
                fval = new_f;
                break;
            }
            step /= 2.0;
        }
        if step < MIN_STEP {
            break;
        }
    }

    (a, b)
}

/// Positive-class probability under a fitted Platt sigmoid
pub fn platt_probability(decision: f64, a: f64, b: f64) -> f64 {
    let fab = decision * a + b;
    if fab >= 0.0 {
        let e = (-fab).exp();
        e / (1.0 + e)
    } else {
        1.0 / (1.0 + fab.exp())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn blobs() -> (Array2<f64>, Array1<u8>) {
        let x = array![
            [-2.0, -1.5],
            [-1.5, -2.0],
            [-1.8, -1.2],
            [-1.2, -1.9],
            [1.6, 1.4],
            [1.9, 1.1],
            [1.3, 1.8],
            [2.1, 1.7]
        ];
        let y = array![0u8, 0, 0, 0, 1, 1, 1, 1];
        (x, y)
    }

    #[test]
    fn test_svm_separates_blobs() {
        let (x, y) = blobs();
        let mut svm = SvmClassifier::default();
        svm.fit(x.view(), y.view()).unwrap();

        assert!(svm.converged());
        assert!(svm.n_support() > 0);
        assert_eq!(svm.predict(x.view()).unwrap(), y);

        let decisions = svm.decision_function(x.view()).unwrap();
        assert!(decisions.iter().take(4).all(|&f| f < 0.0));
        assert!(decisions.iter().skip(4).all(|&f| f > 0.0));
    }

    #[test]
    fn test_svm_probabilities_rank_classes() {
        let (x, y) = blobs();
        let mut svm = SvmClassifier::default();
        svm.fit(x.view(), y.view()).unwrap();

        let proba = svm.predict_proba(x.view()).unwrap();
        assert!(proba.iter().all(|p| (0.0..=1.0).contains(p)));
        let max_negative = proba.iter().take(4).cloned().fold(f64::MIN, f64::max);
        let min_positive = proba.iter().skip(4).cloned().fold(f64::MAX, f64::min);
        assert!(max_negative < min_positive);
    }

    #[test]
    fn test_dual_constraint_holds() {
        let (x, y) = blobs();
        let signs: Vec<f64> = y.iter().map(|&l| if l == 1 { 1.0 } else { -1.0 }).collect();
        // room for four of the eight kernel rows
        let mut solver = Smo::new(x.view(), &signs, 0.5, 1.0, 4 * 8 * signs.len());
        let outcome = solver.solve(1e-3, 10_000);

        assert!(outcome.converged);
        let balance: f64 = solver.alpha.iter().zip(&signs).map(|(a, s)| a * s).sum();
        assert!(balance.abs() < 1e-9);
        assert!(solver.alpha.iter().all(|&a| (0.0..=1.0).contains(&a)));
    }

    #[test]
    fn test_platt_is_monotone_increasing() {
        let decisions = [-2.0, -1.0, -0.5, 0.4, 1.0, 2.0];
        let signs = [-1.0, -1.0, -1.0, 1.0, 1.0, 1.0];
        let (a, b) = fit_platt(&decisions, &signs);

        assert!(a < 0.0, "slope should favour positive decisions, got {}", a);
        assert!(platt_probability(2.0, a, b) > platt_probability(-2.0, a, b));
    }

    #[test]
    fn test_cache_capacity_follows_byte_budget() {
        assert_eq!(cache_capacity(200 << 20, 100_000), 262);
        assert_eq!(cache_capacity(200 << 20, 1_000), 26_214);
        assert_eq!(cache_capacity(1024, 1_000_000), 2);
        assert_eq!(cache_capacity(0, 0), 2);
    }

    #[test]
    fn test_fit_borrows_caller_matrix() {
        let (x, y) = blobs();
        let view = x.view();
        let mut svm = SvmClassifier::default();
        svm.fit(view, y.view()).unwrap();
        assert!(svm.n_support() > 0);
        assert_eq!(view.nrows(), 8);
    }

    #[test]
    fn test_kernel_cache_evicts_oldest() {
        let mut cache = KernelCache::new(2);
        cache.get_or_insert(0, || vec![0.0]);
        cache.get_or_insert(1, || vec![1.0]);
        cache.get_or_insert(2, || vec![2.0]);
        assert!(!cache.rows.contains_key(&0));
        assert_eq!(cache.rows.len(), 2);
    }

    #[test]
    fn test_scale_gamma() {
        let x = array![[0.0, 2.0], [2.0, 0.0]];
        // variance over all entries is 1
        assert!((scale_gamma(&x.view()) - 0.5).abs() < 1e-12);
    }
}
