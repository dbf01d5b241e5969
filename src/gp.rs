//! Gaussian Process regression.
//!
//! The regressor conditions a zero-mean GP prior (optionally shifted by the
//! training mean) on observed input/target pairs, then predicts a posterior
//! mean and uncertainty at new inputs, draws correlated posterior samples and
//! scores the fit through the log marginal likelihood.
//!
//! Fitting follows the usual recipe: factor `K + αI = L·Lᵀ` once, then obtain
//! `K⁻¹y` through a forward and a back substitution. `K⁻¹` is never formed.

use rand::Rng;
use serde::Serialize;

use crate::cholesky::{CholeskyFactor, cholesky};
use crate::error::GpError;
use crate::kernel::{Kernel, feature_dimension};
use crate::matrix::Matrix;
use crate::sampler::MultivariateNormal;

/// Diagonal jitter used by [`GaussianProcessRegressor::sample_y`].
pub const DEFAULT_SAMPLE_JITTER: f64 = 1e-10;

/// z-score of a two-sided 95% interval.
pub const Z_95: f64 = 1.96;

/// Negative variances below this are reported at `warn` level, since they
/// are larger than round-off would explain.
const CLAMP_WARN_THRESHOLD: f64 = -1e-6;

/// Promotes scalar inputs to one-dimensional feature vectors.
pub fn promote_1d(xs: &[f64]) -> Vec<Vec<f64>> {
    xs.iter().map(|&x| vec![x]).collect()
}

/// Posterior prediction at a set of query points.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub mean: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub std: Option<Vec<f64>>,
    /// Number of query points whose variance came out negative and was floored to zero.
    #[serde(skip)]
    pub clamped: usize,
}

impl Prediction {
    /// Returns `(mean - z·std, mean + z·std)`, if standard deviations were requested.
    pub fn bounds(&self, z: f64) -> Option<(Vec<f64>, Vec<f64>)> {
        let std = self.std.as_ref()?;
        let lower = self.mean.iter().zip(std).map(|(m, s)| m - z * s).collect();
        let upper = self.mean.iter().zip(std).map(|(m, s)| m + z * s).collect();
        Some((lower, upper))
    }
}

/// Training data and everything derived from it. Built in one piece by `fit`.
#[derive(Debug, Clone)]
struct FittedState {
    x_train: Vec<Vec<f64>>,
    y_train: Vec<f64>,
    /// Offset subtracted from targets before solving (0 unless centering is on).
    y_offset: f64,
    /// Cholesky factor of K(X, X) + αI
    cholesky: CholeskyFactor,
    /// (K + αI)⁻¹ (y - offset)
    alpha_vector: Vec<f64>,
}

impl FittedState {
    fn dim(&self) -> Option<usize> {
        self.x_train.first().map(Vec::len)
    }

    fn centered_targets(&self) -> impl Iterator<Item = f64> + '_ {
        self.y_train.iter().map(move |y| y - self.y_offset)
    }
}

/// Posterior mean `Ksᵀ α + offset` from a precomputed cross-covariance.
fn posterior_mean(state: &FittedState, k_star: &Matrix) -> Result<Vec<f64>, GpError> {
    Ok(k_star
        .transpose()
        .mul_vector(&state.alpha_vector)?
        .into_iter()
        .map(|m| m + state.y_offset)
        .collect())
}

/// Gaussian Process regressor over a kernel `K`.
///
/// `predict`, `sample_y` and `log_marginal_likelihood` take `&self` and can be
/// shared across readers; `fit` takes `&mut self`.
#[derive(Debug, Clone)]
pub struct GaussianProcessRegressor<K> {
    kernel: K,
    /// Observation noise / jitter added to the diagonal of K.
    alpha: f64,
    center_targets: bool,
    state: Option<FittedState>,
}

impl<K: Kernel> GaussianProcessRegressor<K> {
    /// Creates an unfitted regressor.
    pub fn new(kernel: K, alpha: f64) -> Result<Self, GpError> {
        if !alpha.is_finite() || alpha < 0.0 {
            return Err(GpError::InvalidParameter(format!(
                "alpha must be non-negative and finite, got {}",
                alpha
            )));
        }
        Ok(Self {
            kernel,
            alpha,
            center_targets: false,
            state: None,
        })
    }

    /// Subtract the training mean from targets before fitting and add it back
    /// to predictions, so the posterior reverts to the data mean instead of zero.
    pub fn with_centered_targets(mut self, center: bool) -> Self {
        self.center_targets = center;
        self
    }

    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn is_fitted(&self) -> bool {
        self.state.is_some()
    }

    fn fitted(&self) -> Result<&FittedState, GpError> {
        self.state.as_ref().ok_or(GpError::NotFitted)
    }

    /// Fits the model to training data.
    ///
    /// On error the previous fitted state (if any) is left untouched.
    pub fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<(), GpError> {
        if x.len() != y.len() {
            return Err(GpError::LengthMismatch {
                x: x.len(),
                y: y.len(),
            });
        }
        if x.is_empty() {
            return Err(GpError::EmptyInput);
        }
        feature_dimension(x)?;
        if let Some(i) = x.iter().position(|p| p.iter().any(|v| !v.is_finite())) {
            return Err(GpError::InvalidParameter(format!(
                "training input {} contains a non-finite value",
                i
            )));
        }
        if let Some(i) = y.iter().position(|v| !v.is_finite()) {
            return Err(GpError::InvalidParameter(format!(
                "training target {} is not finite: {}",
                i, y[i]
            )));
        }

        let n = x.len();
        let y_offset = if self.center_targets {
            y.iter().sum::<f64>() / n as f64
        } else {
            0.0
        };
        let targets: Vec<f64> = y.iter().map(|v| v - y_offset).collect();

        let mut k = self.kernel.call(x, None)?;
        for i in 0..n {
            k[(i, i)] += self.alpha;
        }

        let cholesky = cholesky(&k)?;
        let alpha_vector = cholesky.solve(&targets)?;

        log::debug!(
            "fitted GP ({} kernel) on {} points, log|K| = {:.4}",
            self.kernel.name(),
            n,
            cholesky.log_determinant()
        );

        self.state = Some(FittedState {
            x_train: x.to_vec(),
            y_train: y.to_vec(),
            y_offset,
            cholesky,
            alpha_vector,
        });
        Ok(())
    }

    /// Fits on scalar inputs.
    pub fn fit_1d(&mut self, x: &[f64], y: &[f64]) -> Result<(), GpError> {
        self.fit(&promote_1d(x), y)
    }

    fn check_query(&self, state: &FittedState, x: &[Vec<f64>]) -> Result<(), GpError> {
        if let (Some(expected), Some(got)) = (state.dim(), feature_dimension(x)?)
            && expected != got
        {
            return Err(GpError::DimensionMismatch { expected, got });
        }
        Ok(())
    }

    /// Predicts the posterior mean, and optionally the standard deviation, at `x`.
    pub fn predict(&self, x: &[Vec<f64>], return_std: bool) -> Result<Prediction, GpError> {
        let state = self.fitted()?;
        self.check_query(state, x)?;

        // Ks is n_train x n_query
        let k_star = self.kernel.call(&state.x_train, Some(x))?;
        let mean = posterior_mean(state, &k_star)?;

        if !return_std {
            return Ok(Prediction {
                mean,
                std: None,
                clamped: 0,
            });
        }

        // Solve L·V = Ks; column j of V belongs to query point j
        let v = state.cholesky.solve_lower_matrix(&k_star)?;
        let mut std = Vec::with_capacity(x.len());
        let mut clamped = 0;
        let mut most_negative = 0.0_f64;

        for (j, point) in x.iter().enumerate() {
            let k_self = self.kernel.compute(point, point);
            let v_norm_sq: f64 = (0..v.rows()).map(|i| v[(i, j)] * v[(i, j)]).sum();
            let variance = k_self - v_norm_sq;
            if variance < 0.0 {
                clamped += 1;
                most_negative = most_negative.min(variance);
            }
            std.push(variance.max(0.0).sqrt());
        }

        if clamped > 0 {
            if most_negative < CLAMP_WARN_THRESHOLD {
                log::warn!(
                    "clamped {} negative predictive variances (min {:e}); consider a larger alpha",
                    clamped,
                    most_negative
                );
            } else {
                log::debug!("clamped {} negative predictive variances to zero", clamped);
            }
        }

        Ok(Prediction {
            mean,
            std: Some(std),
            clamped,
        })
    }

    /// Predicts on scalar inputs.
    pub fn predict_1d(&self, x: &[f64], return_std: bool) -> Result<Prediction, GpError> {
        self.predict(&promote_1d(x), return_std)
    }

    /// Full posterior covariance `Kss - Ksᵀ (K + αI)⁻¹ Ks` at `x`.
    pub fn predict_covariance(&self, x: &[Vec<f64>]) -> Result<Matrix, GpError> {
        let state = self.fitted()?;
        self.check_query(state, x)?;

        let k_star = self.kernel.call(&state.x_train, Some(x))?;
        self.posterior_covariance(state, x, &k_star)
    }

    fn posterior_covariance(
        &self,
        state: &FittedState,
        x: &[Vec<f64>],
        k_star: &Matrix,
    ) -> Result<Matrix, GpError> {
        let k_star_star = self.kernel.call(x, None)?;
        let v = state.cholesky.solve_lower_matrix(k_star)?;

        let v = v.as_dmatrix();
        let cov = k_star_star.as_dmatrix() - v.transpose() * v;
        // VᵀV is symmetric only up to round-off
        let cov = (&cov + cov.transpose()) * 0.5;
        Ok(Matrix::from(cov))
    }

    /// Draws `n_samples` functions from the posterior, evaluated at `x`.
    ///
    /// Returns one row per sample, each of length `x.len()`.
    pub fn sample_y<R: Rng + ?Sized>(
        &self,
        x: &[Vec<f64>],
        n_samples: usize,
        rng: &mut R,
    ) -> Result<Vec<Vec<f64>>, GpError> {
        self.sample_y_with_jitter(x, n_samples, DEFAULT_SAMPLE_JITTER, rng)
    }

    /// Like [`sample_y`](Self::sample_y) with an explicit diagonal jitter on the
    /// posterior covariance.
    pub fn sample_y_with_jitter<R: Rng + ?Sized>(
        &self,
        x: &[Vec<f64>],
        n_samples: usize,
        jitter: f64,
        rng: &mut R,
    ) -> Result<Vec<Vec<f64>>, GpError> {
        let state = self.fitted()?;
        self.check_query(state, x)?;

        let k_star = self.kernel.call(&state.x_train, Some(x))?;
        let mean = posterior_mean(state, &k_star)?;
        let cov = self.posterior_covariance(state, x, &k_star)?;
        let mvn = MultivariateNormal::new(mean, &cov, jitter)?;
        Ok(mvn.sample_n(n_samples, rng))
    }

    /// Log marginal likelihood of the training targets.
    ///
    /// log p(y|X) = -½ yᵀ(K + αI)⁻¹y - Σᵢ log Lᵢᵢ - n/2 log(2π)
    pub fn log_marginal_likelihood(&self) -> Result<f64, GpError> {
        let state = self.fitted()?;
        let n = state.y_train.len() as f64;

        let data_fit = -0.5
            * state
                .centered_targets()
                .zip(&state.alpha_vector)
                .map(|(y, a)| y * a)
                .sum::<f64>();
        let complexity = -0.5 * state.cholesky.log_determinant();
        let constant = -0.5 * n * (2.0 * std::f64::consts::PI).ln();

        Ok(data_fit + complexity + constant)
    }

    /// Number of training points, or 0 before `fit`.
    pub fn n_train(&self) -> usize {
        self.state.as_ref().map_or(0, |s| s.x_train.len())
    }

    pub fn x_train(&self) -> Option<&[Vec<f64>]> {
        self.state.as_ref().map(|s| s.x_train.as_slice())
    }

    pub fn y_train(&self) -> Option<&[f64]> {
        self.state.as_ref().map(|s| s.y_train.as_slice())
    }

    /// `(K + αI)⁻¹ y` from the last fit.
    pub fn alpha_vector(&self) -> Option<&[f64]> {
        self.state.as_ref().map(|s| s.alpha_vector.as_slice())
    }

    pub fn cholesky_factor(&self) -> Option<&CholeskyFactor> {
        self.state.as_ref().map(|s| &s.cholesky)
    }
}
