//! Logistic regression: IRLS (Newton-Raphson) training with L2
//! regularization, and a grid-search cross-validator over the
//! regularization strength.

use tracing::{instrument, trace, warn};

use crate::error::{DedupeError, Result};
use crate::model::FeatureVector;

const MAX_ITER: usize = 100;
const CONVERGENCE_TOL: f64 = 1e-8;
const DEFAULT_K_FOLDS: usize = 20;
const BOOTSTRAP_RIDGE: f64 = 0.001;

pub fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// Trained logistic model: per-field weights plus a scalar bias.
#[derive(Debug, Clone)]
pub struct LogisticModel {
    pub weights: Vec<f64>,
    pub bias: f64,
}

impl LogisticModel {
    pub fn predict_proba(&self, features: &FeatureVector) -> f64 {
        let z: f64 = self
            .weights
            .iter()
            .zip(features)
            .map(|(w, x)| w * x)
            .sum::<f64>()
            + self.bias;
        sigmoid(z)
    }
}

/// Fit an L2-regularized logistic regression by Newton-Raphson (IRLS). The
/// bias column is left unregularized. Fails with `NumericalError` if the
/// Hessian becomes singular or the iteration does not converge within
/// `MAX_ITER` steps.
#[instrument(skip(features, labels), fields(n = features.len(), alpha))]
pub fn train(features: &[FeatureVector], labels: &[u8], alpha: f64) -> Result<LogisticModel> {
    if features.is_empty() {
        return Err(DedupeError::EmptyInput("cannot train on zero labeled pairs".into()));
    }
    let d = features[0].len();
    let p = d + 1; // + bias

    let mut beta = vec![0.0; p];

    for iter in 0..MAX_ITER {
        let mut hessian = vec![vec![0.0; p]; p];
        let mut gradient = vec![0.0; p];

        for (x, &y) in features.iter().zip(labels) {
            let z: f64 = beta[..d].iter().zip(x).map(|(w, xi)| w * xi).sum::<f64>() + beta[d];
            let pi = sigmoid(z);
            let w = (pi * (1.0 - pi)).max(1e-10);
            let residual = pi - y as f64;

            let mut row = x.clone();
            row.push(1.0);

            for i in 0..p {
                gradient[i] += row[i] * residual;
                for j in 0..p {
                    hessian[i][j] += w * row[i] * row[j];
                }
            }
        }

        // L2 penalty on every weight except the bias (index d).
        for i in 0..d {
            gradient[i] += alpha * beta[i];
            hessian[i][i] += alpha;
        }

        let delta = solve_linear(hessian, gradient.clone()).ok_or_else(|| DedupeError::Numerical {
            alpha,
            detail: "Hessian is singular".into(),
        })?;

        let mut max_delta: f64 = 0.0;
        for i in 0..p {
            beta[i] -= delta[i];
            max_delta = max_delta.max(delta[i].abs());
        }

        trace!(iter, max_delta, "irls step");
        if max_delta < CONVERGENCE_TOL {
            return Ok(LogisticModel {
                weights: beta[..d].to_vec(),
                bias: beta[d],
            });
        }
    }

    Err(DedupeError::Numerical {
        alpha,
        detail: format!("did not converge within {MAX_ITER} iterations"),
    })
}

/// Bootstrap weights for uncertainty sampling before enough labels exist: a
/// heavily ridge-penalized fit (`alpha = 0.001`) so the model stays close to
/// the origin but still orders pairs sensibly.
pub fn bootstrap(features: &[FeatureVector], labels: &[u8]) -> Result<LogisticModel> {
    train(features, labels, BOOTSTRAP_RIDGE)
}

/// Solve `H x = g` by Gaussian elimination with partial pivoting. Returns
/// `None` if `H` is numerically singular.
fn solve_linear(mut h: Vec<Vec<f64>>, mut g: Vec<f64>) -> Option<Vec<f64>> {
    let n = g.len();
    for col in 0..n {
        let pivot = (col..n).max_by(|&a, &b| h[a][col].abs().partial_cmp(&h[b][col].abs()).unwrap())?;
        if h[pivot][col].abs() < 1e-12 {
            return None;
        }
        h.swap(col, pivot);
        g.swap(col, pivot);

        for row in (col + 1)..n {
            let factor = h[row][col] / h[col][col];
            for k in col..n {
                h[row][k] -= factor * h[col][k];
            }
            g[row] -= factor * g[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let sum: f64 = (row + 1..n).map(|k| h[row][k] * x[k]).sum();
        x[row] = (g[row] - sum) / h[row][row];
    }
    Some(x)
}

/// A log-spaced grid of L2 strengths from `1e-4` to `10`.
pub fn default_alpha_grid() -> Vec<f64> {
    let (lo, hi, steps) = (1e-4_f64, 10.0_f64, 12);
    let log_lo = lo.ln();
    let log_hi = hi.ln();
    (0..steps)
        .map(|i| {
            let t = i as f64 / (steps - 1) as f64;
            (log_lo + t * (log_hi - log_lo)).exp()
        })
        .collect()
}

/// K-fold average log-loss for a single alpha. Folds are assigned
/// round-robin by index (`i % k`), which is deterministic given input
/// order and needs no shuffling.
fn cv_log_loss(features: &[FeatureVector], labels: &[u8], alpha: f64, k: usize) -> Option<f64> {
    let n = features.len();
    let mut total_loss = 0.0;
    let mut total_held_out = 0usize;

    for fold in 0..k {
        let train_features: Vec<FeatureVector> = (0..n).filter(|i| i % k != fold).map(|i| features[i].clone()).collect();
        let train_labels: Vec<u8> = (0..n).filter(|i| i % k != fold).map(|i| labels[i]).collect();
        let test_idx: Vec<usize> = (0..n).filter(|i| i % k == fold).collect();

        if train_features.is_empty() || test_idx.is_empty() {
            continue;
        }
        // Need both classes present to fit meaningfully; skip fold if not.
        if !train_labels.contains(&0) || !train_labels.contains(&1) {
            continue;
        }

        let model = train(&train_features, &train_labels, alpha).ok()?;
        for &i in &test_idx {
            let p = model.predict_proba(&features[i]).clamp(1e-12, 1.0 - 1e-12);
            let y = labels[i] as f64;
            total_loss += -(y * p.ln() + (1.0 - y) * (1.0 - p).ln());
            total_held_out += 1;
        }
    }

    if total_held_out == 0 {
        None
    } else {
        Some(total_loss / total_held_out as f64)
    }
}

/// Grid search over `default_alpha_grid()` by `k`-fold cross-validated log
/// loss. Ties are broken toward the larger alpha (more regularization),
/// matching the source's preference for simpler models.
#[instrument(skip(features, labels), fields(n = features.len()))]
pub fn grid_search(features: &[FeatureVector], labels: &[u8], k: Option<usize>) -> Result<f64> {
    let requested = k.unwrap_or(DEFAULT_K_FOLDS);
    let k = requested.min(features.len().max(1));
    if k != requested {
        warn!(requested, actual = k, "reduced cross-validation fold count");
    }
    if k < 2 {
        return Err(DedupeError::EmptyInput(
            "grid search needs at least 2 labeled pairs per class".into(),
        ));
    }

    let mut best_alpha = None;
    let mut best_loss = f64::INFINITY;

    for alpha in default_alpha_grid() {
        let Some(loss) = cv_log_loss(features, labels, alpha, k) else {
            continue;
        };
        // `<=` so a later (larger) alpha wins a tie, per the grid's ascending order.
        if loss <= best_loss {
            best_loss = loss;
            best_alpha = Some(alpha);
        }
    }

    best_alpha.ok_or_else(|| {
        DedupeError::EmptyInput("no alpha in the grid produced a valid cross-validation fold".into())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn separable_data() -> (Vec<FeatureVector>, Vec<u8>) {
        let mut features = Vec::new();
        let mut labels = Vec::new();
        for i in 0..40 {
            features.push(vec![0.05 + (i % 3) as f64 * 0.01]);
            labels.push(1);
        }
        for i in 0..40 {
            features.push(vec![0.9 + (i % 3) as f64 * 0.01]);
            labels.push(0);
        }
        (features, labels)
    }

    #[test]
    fn trains_and_separates() {
        let (features, labels) = separable_data();
        let model = train(&features, &labels, 0.1).unwrap();
        assert!(model.predict_proba(&vec![0.05]) > 0.5);
        assert!(model.predict_proba(&vec![0.95]) < 0.5);
    }

    #[test]
    fn empty_input_is_an_error() {
        let err = train(&[], &[], 1.0).unwrap_err();
        assert!(matches!(err, DedupeError::EmptyInput(_)));
    }

    #[test]
    fn solve_linear_identity() {
        let h = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        let g = vec![3.0, 4.0];
        let x = solve_linear(h, g).unwrap();
        assert!((x[0] - 3.0).abs() < 1e-9);
        assert!((x[1] - 4.0).abs() < 1e-9);
    }

    #[test]
    fn solve_linear_singular_returns_none() {
        let h = vec![vec![1.0, 1.0], vec![1.0, 1.0]];
        let g = vec![1.0, 2.0];
        assert!(solve_linear(h, g).is_none());
    }

    #[test]
    fn grid_search_picks_an_alpha_in_grid() {
        let (features, labels) = separable_data();
        let alpha = grid_search(&features, &labels, Some(4)).unwrap();
        assert!(default_alpha_grid().iter().any(|&a| (a - alpha).abs() < 1e-15));
    }

    #[test]
    fn alpha_grid_is_ascending() {
        let grid = default_alpha_grid();
        for w in grid.windows(2) {
            assert!(w[0] < w[1]);
        }
    }
}
