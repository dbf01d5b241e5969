//! Kernel-driven random walks.
//!
//! Draws a path from a GP prior over equally spaced time steps. The kernel
//! decides the character of the walk: a long RBF length scale gives slowly
//! drifting contours, a short one gives jumpy lines, and a periodic kernel
//! gives a phrase that repeats every `periodicity` units.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::GpError;
use crate::gp::promote_1d;
use crate::kernel::Kernel;
use crate::sampler::MultivariateNormal;

/// Shape of a generated walk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkConfig {
    /// Number of points in the path.
    pub steps: usize,
    /// Mean level the walk fluctuates around (e.g. a MIDI pitch).
    pub start: f64,
    /// Spacing between consecutive inputs.
    pub step_size: f64,
    /// Diagonal jitter on the prior covariance. Prior covariances over many
    /// closely spaced points are numerically singular without it.
    pub jitter: f64,
}

impl Default for WalkConfig {
    fn default() -> Self {
        Self {
            steps: 32,
            start: 0.0,
            step_size: 1.0,
            jitter: 1e-8,
        }
    }
}

/// Generator for GP-prior random walks.
#[derive(Debug, Clone)]
pub struct RandomWalk {
    config: WalkConfig,
}

impl RandomWalk {
    pub fn new(config: WalkConfig) -> Result<Self, GpError> {
        if config.steps == 0 {
            return Err(GpError::EmptyInput);
        }
        if !config.step_size.is_finite() || config.step_size <= 0.0 {
            return Err(GpError::InvalidParameter(format!(
                "step_size must be positive and finite, got {}",
                config.step_size
            )));
        }
        if !config.start.is_finite() {
            return Err(GpError::InvalidParameter(format!(
                "start must be finite, got {}",
                config.start
            )));
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &WalkConfig {
        &self.config
    }

    /// Time inputs of the walk: `0, step_size, 2·step_size, ...`.
    pub fn inputs(&self) -> Vec<f64> {
        (0..self.config.steps)
            .map(|i| i as f64 * self.config.step_size)
            .collect()
    }

    fn distribution<K: Kernel>(&self, kernel: &K) -> Result<MultivariateNormal, GpError> {
        let x = promote_1d(&self.inputs());
        let cov = kernel.call(&x, None)?;
        let mean = vec![self.config.start; self.config.steps];
        MultivariateNormal::new(mean, &cov, self.config.jitter)
    }

    /// Generates one walk.
    pub fn generate<K: Kernel, R: Rng + ?Sized>(
        &self,
        kernel: &K,
        rng: &mut R,
    ) -> Result<Vec<f64>, GpError> {
        Ok(self.distribution(kernel)?.sample(rng))
    }

    /// Generates `n` independent walks, factoring the covariance once.
    pub fn generate_n<K: Kernel, R: Rng + ?Sized>(
        &self,
        kernel: &K,
        n: usize,
        rng: &mut R,
    ) -> Result<Vec<Vec<f64>>, GpError> {
        let mvn = self.distribution(kernel)?;
        log::debug!(
            "generating {} walks of {} steps with {} kernel",
            n,
            self.config.steps,
            kernel.name()
        );
        Ok(mvn.sample_n(n, rng))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::{Periodic, Rbf};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn mean_abs_step(path: &[f64]) -> f64 {
        path.windows(2).map(|w| (w[1] - w[0]).abs()).sum::<f64>() / (path.len() - 1) as f64
    }

    #[test]
    fn test_walk_length_and_reproducibility() {
        let walk = RandomWalk::new(WalkConfig {
            steps: 16,
            start: 60.0,
            ..WalkConfig::default()
        })
        .unwrap();
        let kernel = Rbf::new(3.0, 4.0).unwrap();

        let a = walk.generate(&kernel, &mut StdRng::seed_from_u64(5)).unwrap();
        let b = walk.generate(&kernel, &mut StdRng::seed_from_u64(5)).unwrap();
        assert_eq!(a.len(), 16);
        assert_eq!(a, b);
        assert!(a.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_long_length_scale_is_smoother() {
        let walk = RandomWalk::new(WalkConfig {
            steps: 64,
            ..WalkConfig::default()
        })
        .unwrap();
        let smooth = Rbf::new(10.0, 1.0).unwrap();
        let rough = Rbf::new(0.5, 1.0).unwrap();

        let smooth_path = walk.generate(&smooth, &mut StdRng::seed_from_u64(8)).unwrap();
        let rough_path = walk.generate(&rough, &mut StdRng::seed_from_u64(8)).unwrap();
        assert!(
            mean_abs_step(&smooth_path) < mean_abs_step(&rough_path),
            "smooth {} vs rough {}",
            mean_abs_step(&smooth_path),
            mean_abs_step(&rough_path)
        );
    }

    #[test]
    fn test_periodic_walk_repeats() {
        let walk = RandomWalk::new(WalkConfig {
            steps: 24,
            start: 64.0,
            ..WalkConfig::default()
        })
        .unwrap();
        let kernel = Periodic::new(1.0, 4.0, 8.0).unwrap();
        let path = walk.generate(&kernel, &mut StdRng::seed_from_u64(21)).unwrap();

        for i in 0..16 {
            assert!(
                (path[i] - path[i + 8]).abs() < 1e-2,
                "step {} = {} but step {} = {}",
                i,
                path[i],
                i + 8,
                path[i + 8]
            );
        }
    }

    #[test]
    fn test_generate_n() {
        let walk = RandomWalk::new(WalkConfig::default()).unwrap();
        let kernel = Rbf::new(2.0, 1.0).unwrap();
        let walks = walk
            .generate_n(&kernel, 4, &mut StdRng::seed_from_u64(1))
            .unwrap();
        assert_eq!(walks.len(), 4);
        assert!(walks.iter().all(|w| w.len() == 32));
        assert_ne!(walks[0], walks[1]);
    }

    #[test]
    fn test_invalid_config() {
        let zero_steps = WalkConfig {
            steps: 0,
            ..WalkConfig::default()
        };
        assert_eq!(RandomWalk::new(zero_steps).unwrap_err(), GpError::EmptyInput);

        let bad_step = WalkConfig {
            step_size: 0.0,
            ..WalkConfig::default()
        };
        assert!(RandomWalk::new(bad_step).is_err());
    }

    #[test]
    fn test_inputs_are_evenly_spaced() {
        let walk = RandomWalk::new(WalkConfig {
            steps: 4,
            step_size: 0.5,
            ..WalkConfig::default()
        })
        .unwrap();
        assert_eq!(walk.inputs(), vec![0.0, 0.5, 1.0, 1.5]);
    }
}
