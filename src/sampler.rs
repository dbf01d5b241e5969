//! Multivariate normal sampling.
//!
//! A draw is `mean + L·z` where `L` is the Cholesky factor of the covariance and
//! `z` holds independent standard normals, so `Cov(L·z) = L·Lᵀ`. The random
//! source is always passed in by the caller; nothing here touches a global RNG.

use nalgebra::DVector;
use rand::Rng;
use rand_distr::StandardNormal;

use crate::cholesky::{CholeskyFactor, cholesky};
use crate::error::GpError;
use crate::matrix::Matrix;

/// Draws `n` independent standard normal variates.
pub fn standard_normal_vector<R: Rng + ?Sized>(n: usize, rng: &mut R) -> Vec<f64> {
    (0..n).map(|_| rng.sample(StandardNormal)).collect()
}

/// A multivariate normal distribution with a pre-factored covariance.
#[derive(Debug, Clone)]
pub struct MultivariateNormal {
    mean: Vec<f64>,
    factor: CholeskyFactor,
}

impl MultivariateNormal {
    /// Factors `covariance + jitter·I`.
    ///
    /// A positive `jitter` lets rank-deficient (PSD) covariances be sampled.
    pub fn new(mean: Vec<f64>, covariance: &Matrix, jitter: f64) -> Result<Self, GpError> {
        if !covariance.is_square() {
            return Err(GpError::NotSquare {
                rows: covariance.rows(),
                columns: covariance.columns(),
            });
        }
        if mean.len() != covariance.rows() {
            return Err(GpError::DimensionMismatch {
                expected: covariance.rows(),
                got: mean.len(),
            });
        }
        if !jitter.is_finite() || jitter < 0.0 {
            return Err(GpError::InvalidParameter(format!(
                "jitter must be non-negative and finite, got {}",
                jitter
            )));
        }

        let factor = if jitter > 0.0 {
            let mut jittered = covariance.clone();
            for i in 0..jittered.rows() {
                jittered[(i, i)] += jitter;
            }
            cholesky(&jittered)?
        } else {
            cholesky(covariance)?
        };

        Ok(Self { mean, factor })
    }

    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    /// Cholesky factor of the (jittered) covariance.
    pub fn factor(&self) -> &CholeskyFactor {
        &self.factor
    }

    /// Draws one vector.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<f64> {
        let z = DVector::from_vec(standard_normal_vector(self.dim(), rng));
        let correlated = self.factor.l().as_dmatrix() * z;
        self.mean
            .iter()
            .zip(correlated.iter())
            .map(|(m, c)| m + c)
            .collect()
    }

    /// Draws `n` independent vectors.
    pub fn sample_n<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Vec<Vec<f64>> {
        log::trace!("drawing {} samples of dimension {}", n, self.dim());
        (0..n).map(|_| self.sample(rng)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn empirical_covariance(samples: &[Vec<f64>]) -> (Vec<f64>, Vec<Vec<f64>>) {
        let n = samples.len() as f64;
        let d = samples[0].len();
        let mut mean = vec![0.0; d];
        for s in samples {
            for (m, v) in mean.iter_mut().zip(s) {
                *m += v / n;
            }
        }
        let mut cov = vec![vec![0.0; d]; d];
        for s in samples {
            for i in 0..d {
                for j in 0..d {
                    cov[i][j] += (s[i] - mean[i]) * (s[j] - mean[j]) / (n - 1.0);
                }
            }
        }
        (mean, cov)
    }

    #[test]
    fn test_standard_normal_moments() {
        let mut rng = StdRng::seed_from_u64(7);
        let z = standard_normal_vector(20_000, &mut rng);
        let mean = z.iter().sum::<f64>() / z.len() as f64;
        let var = z.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / z.len() as f64;
        assert!(mean.abs() < 0.05, "mean {}", mean);
        assert!((var - 1.0).abs() < 0.05, "variance {}", var);
    }

    #[test]
    fn test_seeded_sampling_is_reproducible() {
        let cov = Matrix::from_2d_array(&[vec![1.0, 0.5], vec![0.5, 1.0]]).unwrap();
        let mvn = MultivariateNormal::new(vec![0.0, 0.0], &cov, 0.0).unwrap();

        let a = mvn.sample_n(3, &mut StdRng::seed_from_u64(42));
        let b = mvn.sample_n(3, &mut StdRng::seed_from_u64(42));
        let c = mvn.sample_n(3, &mut StdRng::seed_from_u64(43));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_empirical_covariance_converges() {
        let cov = Matrix::from_2d_array(&[vec![1.0, 0.8], vec![0.8, 2.0]]).unwrap();
        let mvn = MultivariateNormal::new(vec![60.0, -3.0], &cov, 0.0).unwrap();
        let mut rng = StdRng::seed_from_u64(2024);
        let samples = mvn.sample_n(20_000, &mut rng);

        let (mean, emp) = empirical_covariance(&samples);
        assert!((mean[0] - 60.0).abs() < 0.05, "mean[0] = {}", mean[0]);
        assert!((mean[1] + 3.0).abs() < 0.05, "mean[1] = {}", mean[1]);
        for i in 0..2 {
            for j in 0..2 {
                assert!(
                    (emp[i][j] - cov[(i, j)]).abs() < 0.1,
                    "cov[{}][{}]: empirical {} vs {}",
                    i,
                    j,
                    emp[i][j],
                    cov[(i, j)]
                );
            }
        }
    }

    #[test]
    fn test_jitter_allows_singular_covariance() {
        // Rank one: both coordinates perfectly correlated
        let cov = Matrix::from_2d_array(&[vec![1.0, 1.0], vec![1.0, 1.0]]).unwrap();
        assert!(matches!(
            MultivariateNormal::new(vec![0.0, 0.0], &cov, 0.0),
            Err(GpError::NotPositiveDefinite { .. })
        ));

        let mvn = MultivariateNormal::new(vec![0.0, 0.0], &cov, 1e-10).unwrap();
        let s = mvn.sample(&mut StdRng::seed_from_u64(1));
        assert!((s[0] - s[1]).abs() < 1e-3);
    }

    #[test]
    fn test_shape_validation() {
        let cov = Matrix::identity(2);
        assert!(matches!(
            MultivariateNormal::new(vec![0.0], &cov, 0.0),
            Err(GpError::DimensionMismatch { .. })
        ));
        assert!(matches!(
            MultivariateNormal::new(vec![0.0, 0.0], &Matrix::zeros(2, 3), 0.0),
            Err(GpError::NotSquare { .. })
        ));
        assert!(MultivariateNormal::new(vec![0.0, 0.0], &cov, -1.0).is_err());
    }
}
