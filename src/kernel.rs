//! Covariance functions (kernels) over feature vectors.
//!
//! Three stationary kernels are provided: squared exponential ([`Rbf`]),
//! [`RationalQuadratic`] and [`Periodic`]. All of them depend on the inputs only
//! through the Euclidean distance `‖x1 - x2‖`, so `k(x, x) = variance` for every `x`.
//!
//! Kernels are immutable after construction; constructors validate parameters
//! so that a bad length scale fails here rather than as NaN in a Cholesky pivot.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::error::GpError;
use crate::matrix::Matrix;

/// A positive semi-definite covariance function.
pub trait Kernel {
    /// Covariance between two feature vectors of equal length.
    fn compute(&self, x1: &[f64], x2: &[f64]) -> f64;

    /// Parameters this kernel was built with.
    fn parameters(&self) -> KernelParameters;

    fn name(&self) -> &'static str;

    /// Builds a covariance matrix.
    ///
    /// With `x2 = None` this is the symmetric `|x1| x |x1|` matrix; each
    /// off-diagonal entry is computed once and mirrored, so the result is
    /// exactly symmetric. Otherwise it is the `|x1| x |x2|` cross-covariance.
    fn call(&self, x1: &[Vec<f64>], x2: Option<&[Vec<f64>]>) -> Result<Matrix, GpError> {
        let dim = feature_dimension(x1)?;

        match x2 {
            None => {
                let n = x1.len();
                let mut k = Matrix::zeros(n, n);
                for i in 0..n {
                    for j in i..n {
                        let value = self.compute(&x1[i], &x1[j]);
                        k[(i, j)] = value;
                        k[(j, i)] = value;
                    }
                }
                Ok(k)
            }
            Some(x2) => {
                let dim2 = feature_dimension(x2)?;
                if let (Some(expected), Some(got)) = (dim, dim2)
                    && expected != got
                {
                    return Err(GpError::DimensionMismatch { expected, got });
                }

                let mut k = Matrix::zeros(x1.len(), x2.len());
                for (i, a) in x1.iter().enumerate() {
                    for (j, b) in x2.iter().enumerate() {
                        k[(i, j)] = self.compute(a, b);
                    }
                }
                Ok(k)
            }
        }
    }
}

/// Returns the shared dimension of a point set, or `None` if it is empty.
pub(crate) fn feature_dimension(points: &[Vec<f64>]) -> Result<Option<usize>, GpError> {
    let Some(first) = points.first() else {
        return Ok(None);
    };
    let expected = first.len();
    if let Some(p) = points.iter().find(|p| p.len() != expected) {
        return Err(GpError::DimensionMismatch {
            expected,
            got: p.len(),
        });
    }
    Ok(Some(expected))
}

fn squared_distance(x1: &[f64], x2: &[f64]) -> f64 {
    debug_assert_eq!(x1.len(), x2.len());
    x1.iter().zip(x2).map(|(a, b)| (a - b) * (a - b)).sum()
}

fn check_length_scale(length_scale: f64) -> Result<(), GpError> {
    if !length_scale.is_finite() || length_scale <= 0.0 {
        return Err(GpError::InvalidParameter(format!(
            "length_scale must be positive and finite, got {}",
            length_scale
        )));
    }
    Ok(())
}

fn check_variance(variance: f64) -> Result<(), GpError> {
    if !variance.is_finite() || variance < 0.0 {
        return Err(GpError::InvalidParameter(format!(
            "variance must be non-negative and finite, got {}",
            variance
        )));
    }
    Ok(())
}

fn check_positive(name: &str, value: f64) -> Result<(), GpError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(GpError::InvalidParameter(format!(
            "{} must be positive and finite, got {}",
            name, value
        )));
    }
    Ok(())
}

/// Squared exponential kernel.
///
/// k(x, x') = σ² × exp(-‖x - x'‖² / (2 l²))
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rbf {
    length_scale: f64,
    variance: f64,
}

impl Rbf {
    pub fn new(length_scale: f64, variance: f64) -> Result<Self, GpError> {
        check_length_scale(length_scale)?;
        check_variance(variance)?;
        Ok(Self {
            length_scale,
            variance,
        })
    }

    pub fn length_scale(&self) -> f64 {
        self.length_scale
    }

    pub fn variance(&self) -> f64 {
        self.variance
    }
}

impl Kernel for Rbf {
    fn compute(&self, x1: &[f64], x2: &[f64]) -> f64 {
        let sq_dist = squared_distance(x1, x2);
        self.variance * (-sq_dist / (2.0 * self.length_scale * self.length_scale)).exp()
    }

    fn parameters(&self) -> KernelParameters {
        KernelParameters::Rbf {
            length_scale: self.length_scale,
            variance: self.variance,
        }
    }

    fn name(&self) -> &'static str {
        "RBF"
    }
}

/// Rational quadratic kernel, a scale mixture of RBF kernels.
///
/// k(x, x') = σ² × (1 + ‖x - x'‖² / (2 α l²))^(-α)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RationalQuadratic {
    length_scale: f64,
    variance: f64,
    alpha: f64,
}

impl RationalQuadratic {
    pub fn new(length_scale: f64, variance: f64, alpha: f64) -> Result<Self, GpError> {
        check_length_scale(length_scale)?;
        check_variance(variance)?;
        check_positive("alpha", alpha)?;
        Ok(Self {
            length_scale,
            variance,
            alpha,
        })
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }
}

impl Kernel for RationalQuadratic {
    fn compute(&self, x1: &[f64], x2: &[f64]) -> f64 {
        let sq_dist = squared_distance(x1, x2);
        let base = 1.0 + sq_dist / (2.0 * self.alpha * self.length_scale * self.length_scale);
        self.variance * base.powf(-self.alpha)
    }

    fn parameters(&self) -> KernelParameters {
        KernelParameters::RationalQuadratic {
            length_scale: self.length_scale,
            variance: self.variance,
            alpha: self.alpha,
        }
    }

    fn name(&self) -> &'static str {
        "RationalQuadratic"
    }
}

/// Exp-sine-squared kernel for repeating structure.
///
/// k(x, x') = σ² × exp(-2 sin²(π ‖x - x'‖ / p) / l²)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Periodic {
    length_scale: f64,
    variance: f64,
    periodicity: f64,
}

impl Periodic {
    pub fn new(length_scale: f64, variance: f64, periodicity: f64) -> Result<Self, GpError> {
        check_length_scale(length_scale)?;
        check_variance(variance)?;
        check_positive("periodicity", periodicity)?;
        Ok(Self {
            length_scale,
            variance,
            periodicity,
        })
    }

    pub fn periodicity(&self) -> f64 {
        self.periodicity
    }
}

impl Kernel for Periodic {
    fn compute(&self, x1: &[f64], x2: &[f64]) -> f64 {
        let dist = squared_distance(x1, x2).sqrt();
        let sin_term = (PI * dist / self.periodicity).sin();
        self.variance
            * (-2.0 * sin_term * sin_term / (self.length_scale * self.length_scale)).exp()
    }

    fn parameters(&self) -> KernelParameters {
        KernelParameters::Periodic {
            length_scale: self.length_scale,
            variance: self.variance,
            periodicity: self.periodicity,
        }
    }

    fn name(&self) -> &'static str {
        "Periodic"
    }
}

/// Plain-data description of a kernel, as read from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum KernelParameters {
    Rbf {
        length_scale: f64,
        variance: f64,
    },
    RationalQuadratic {
        length_scale: f64,
        variance: f64,
        alpha: f64,
    },
    Periodic {
        length_scale: f64,
        variance: f64,
        periodicity: f64,
    },
}

impl KernelParameters {
    pub fn length_scale(&self) -> f64 {
        match *self {
            KernelParameters::Rbf { length_scale, .. }
            | KernelParameters::RationalQuadratic { length_scale, .. }
            | KernelParameters::Periodic { length_scale, .. } => length_scale,
        }
    }

    pub fn variance(&self) -> f64 {
        match *self {
            KernelParameters::Rbf { variance, .. }
            | KernelParameters::RationalQuadratic { variance, .. }
            | KernelParameters::Periodic { variance, .. } => variance,
        }
    }

    /// Validates the parameters and builds the kernel.
    pub fn build(&self) -> Result<KernelKind, GpError> {
        let kernel = match *self {
            KernelParameters::Rbf {
                length_scale,
                variance,
            } => KernelKind::Rbf(Rbf::new(length_scale, variance)?),
            KernelParameters::RationalQuadratic {
                length_scale,
                variance,
                alpha,
            } => KernelKind::RationalQuadratic(RationalQuadratic::new(
                length_scale,
                variance,
                alpha,
            )?),
            KernelParameters::Periodic {
                length_scale,
                variance,
                periodicity,
            } => KernelKind::Periodic(Periodic::new(length_scale, variance, periodicity)?),
        };
        Ok(kernel)
    }
}

/// Closed set of supported kernels, for callers that pick one at runtime.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KernelKind {
    Rbf(Rbf),
    RationalQuadratic(RationalQuadratic),
    Periodic(Periodic),
}

impl Kernel for KernelKind {
    fn compute(&self, x1: &[f64], x2: &[f64]) -> f64 {
        match self {
            KernelKind::Rbf(k) => k.compute(x1, x2),
            KernelKind::RationalQuadratic(k) => k.compute(x1, x2),
            KernelKind::Periodic(k) => k.compute(x1, x2),
        }
    }

    fn parameters(&self) -> KernelParameters {
        match self {
            KernelKind::Rbf(k) => k.parameters(),
            KernelKind::RationalQuadratic(k) => k.parameters(),
            KernelKind::Periodic(k) => k.parameters(),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            KernelKind::Rbf(k) => k.name(),
            KernelKind::RationalQuadratic(k) => k.name(),
            KernelKind::Periodic(k) => k.name(),
        }
    }
}

impl From<Rbf> for KernelKind {
    fn from(k: Rbf) -> Self {
        KernelKind::Rbf(k)
    }
}

impl From<RationalQuadratic> for KernelKind {
    fn from(k: RationalQuadratic) -> Self {
        KernelKind::RationalQuadratic(k)
    }
}

impl From<Periodic> for KernelKind {
    fn from(k: Periodic) -> Self {
        KernelKind::Periodic(k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kernels() -> Vec<KernelKind> {
        vec![
            Rbf::new(1.5, 2.0).unwrap().into(),
            RationalQuadratic::new(1.5, 2.0, 0.5).unwrap().into(),
            Periodic::new(1.5, 2.0, 3.0).unwrap().into(),
        ]
    }

    #[test]
    fn test_self_covariance_equals_variance() {
        let points = [vec![0.0], vec![-3.5], vec![1.0, 2.0], vec![100.0, -7.0, 0.25]];
        for kernel in kernels() {
            for x in &points {
                let k = kernel.compute(x, x);
                assert!(
                    (k - 2.0).abs() < 1e-12,
                    "{} self-covariance {} != variance",
                    kernel.name(),
                    k
                );
            }
        }
    }

    #[test]
    fn test_symmetry() {
        let a = [0.3, -1.2];
        let b = [2.0, 0.7];
        for kernel in kernels() {
            assert_eq!(kernel.compute(&a, &b), kernel.compute(&b, &a));
        }
    }

    #[test]
    fn test_rbf_known_value() {
        let k = Rbf::new(1.0, 1.0).unwrap();
        let expected = (-0.5_f64).exp();
        assert!((k.compute(&[0.0], &[1.0]) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_rbf_decreases_with_distance() {
        let k = Rbf::new(1.0, 1.0).unwrap();
        let close = k.compute(&[0.0], &[0.5]);
        let far = k.compute(&[0.0], &[3.0]);
        assert!(close > far);
    }

    #[test]
    fn test_rational_quadratic_known_value() {
        // (1 + 4 / (2 · 2 · 1))^-2 = 2^-2
        let k = RationalQuadratic::new(1.0, 1.0, 2.0).unwrap();
        assert!((k.compute(&[0.0], &[2.0]) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_periodic_repeats_at_period() {
        let k = Periodic::new(1.0, 1.0, 4.0).unwrap();
        assert!((k.compute(&[0.0], &[4.0]) - 1.0).abs() < 1e-12);
        assert!((k.compute(&[1.0], &[9.0]) - 1.0).abs() < 1e-12);
        // Half a period away: sin² = 1
        assert!((k.compute(&[0.0], &[2.0]) - (-2.0_f64).exp()).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_length_scale_fails_fast() {
        assert!(matches!(
            Rbf::new(0.0, 1.0),
            Err(GpError::InvalidParameter(_))
        ));
        assert!(Rbf::new(-1.0, 1.0).is_err());
        assert!(Rbf::new(f64::NAN, 1.0).is_err());
        assert!(RationalQuadratic::new(-0.1, 1.0, 1.0).is_err());
        assert!(Periodic::new(0.0, 1.0, 1.0).is_err());
    }

    #[test]
    fn test_invalid_kernel_specific_parameters() {
        assert!(Rbf::new(1.0, -0.5).is_err());
        assert!(Rbf::new(1.0, 0.0).is_ok());
        assert!(RationalQuadratic::new(1.0, 1.0, 0.0).is_err());
        assert!(Periodic::new(1.0, 1.0, -2.0).is_err());
        assert!(Periodic::new(1.0, f64::INFINITY, 2.0).is_err());
    }

    #[test]
    fn test_call_symmetric_matrix() {
        let x = vec![vec![0.0], vec![0.7], vec![1.9], vec![4.0]];
        for kernel in kernels() {
            let k = kernel.call(&x, None).unwrap();
            assert_eq!((k.rows(), k.columns()), (4, 4));
            for i in 0..4 {
                assert!((k[(i, i)] - 2.0).abs() < 1e-12);
                for j in 0..4 {
                    assert_eq!(k[(i, j)].to_bits(), k[(j, i)].to_bits());
                }
            }
        }
    }

    #[test]
    fn test_call_cross_covariance() {
        let kernel = Rbf::new(1.0, 1.0).unwrap();
        let x1 = vec![vec![0.0], vec![1.0]];
        let x2 = vec![vec![0.0], vec![1.0], vec![2.0]];
        let k = kernel.call(&x1, Some(&x2)).unwrap();
        assert_eq!((k.rows(), k.columns()), (2, 3));
        assert!((k[(0, 0)] - 1.0).abs() < 1e-12);
        assert!((k[(1, 2)] - kernel.compute(&[1.0], &[2.0])).abs() < 1e-12);
    }

    #[test]
    fn test_call_rejects_dimension_mismatch() {
        let kernel = Rbf::new(1.0, 1.0).unwrap();
        let ragged = vec![vec![0.0], vec![1.0, 2.0]];
        assert!(matches!(
            kernel.call(&ragged, None),
            Err(GpError::DimensionMismatch {
                expected: 1,
                got: 2
            })
        ));

        let x1 = vec![vec![0.0]];
        let x2 = vec![vec![0.0, 1.0]];
        assert!(kernel.call(&x1, Some(&x2)).is_err());
    }

    #[test]
    fn test_parameters_roundtrip_through_build() {
        for kernel in kernels() {
            let params = kernel.parameters();
            assert_eq!(params.build().unwrap(), kernel);
            assert_eq!(params.length_scale(), 1.5);
            assert_eq!(params.variance(), 2.0);
        }
    }

    #[test]
    fn test_parameters_from_json() {
        let params: KernelParameters = serde_json::from_str(
            r#"{"kind": "periodic", "length_scale": 1.0, "variance": 0.5, "periodicity": 8.0}"#,
        )
        .unwrap();
        let kernel = params.build().unwrap();
        assert_eq!(kernel.name(), "Periodic");

        let bad: KernelParameters =
            serde_json::from_str(r#"{"kind": "rbf", "length_scale": -1.0, "variance": 1.0}"#)
                .unwrap();
        assert!(bad.build().is_err());
    }
}
