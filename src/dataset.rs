//! Loading training data from JSON files.
//!
//! Expected format:
//!
//! ```json
//! {
//!   "x": [0, 1, 2, 3],              // or [[0.0, 1.0], [1.0, 0.5], ...]
//!   "y": [60, 62, 64, 65],
//!   "query": [0.5, 1.5],            // optional
//!   "kernel": {"kind": "rbf", "length_scale": 1.0, "variance": 1.0}   // optional
//! }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::gp::promote_1d;
use crate::kernel::KernelParameters;

/// Errors that can occur when loading a dataset.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("cannot read file {path}: {source}")]
    CannotRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid dataset JSON: {0}")]
    InvalidFormat(#[from] serde_json::Error),
}

/// Feature inputs: either scalars or full feature vectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Inputs {
    Scalars(Vec<f64>),
    Vectors(Vec<Vec<f64>>),
}

impl Inputs {
    /// Returns feature vectors, promoting scalars to one-element vectors.
    pub fn to_vectors(&self) -> Vec<Vec<f64>> {
        match self {
            Inputs::Scalars(xs) => promote_1d(xs),
            Inputs::Vectors(xs) => xs.clone(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Inputs::Scalars(xs) => xs.len(),
            Inputs::Vectors(xs) => xs.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Observed inputs and targets, plus optional query points and kernel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingData {
    pub x: Inputs,
    pub y: Vec<f64>,
    #[serde(default)]
    pub query: Option<Inputs>,
    #[serde(default)]
    pub kernel: Option<KernelParameters>,
}

impl TrainingData {
    pub fn from_json(json: &str) -> Result<Self, DatasetError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Loads a dataset from a JSON file.
pub fn load_training_data(path: &Path) -> Result<TrainingData, DatasetError> {
    if !path.exists() {
        return Err(DatasetError::FileNotFound(path.to_path_buf()));
    }
    let contents = std::fs::read_to_string(path).map_err(|source| DatasetError::CannotRead {
        path: path.to_path_buf(),
        source,
    })?;
    let data = TrainingData::from_json(&contents)?;
    log::info!(
        "loaded {} observations from {}",
        data.x.len(),
        path.display()
    );
    Ok(data)
}
