//! Gaussian Process regression and sampling for generative music.
//!
//! Fit a GP to a handful of observed notes, predict a smooth contour with
//! uncertainty between and beyond them, draw correlated variations from the
//! posterior, or generate kernel-shaped random walks from the prior. Outputs
//! are plain numeric sequences for downstream pitch/rhythm mapping.

pub mod cholesky;
pub mod dataset;
pub mod error;
pub mod gp;
pub mod kernel;
pub mod matrix;
pub mod sampler;
pub mod walk;

pub use cholesky::{CholeskyFactor, cholesky};
pub use error::{ErrorKind, GpError};
pub use gp::{GaussianProcessRegressor, Prediction, promote_1d};
pub use kernel::{Kernel, KernelKind, KernelParameters, Periodic, RationalQuadratic, Rbf};
pub use matrix::Matrix;
pub use sampler::MultivariateNormal;
pub use walk::{RandomWalk, WalkConfig};
