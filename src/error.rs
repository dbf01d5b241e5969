//! Error types for the Gaussian Process engine.

use thiserror::Error;

/// Broad category of a [`GpError`].
///
/// Lets callers tell bad input shapes apart from numerical breakdown,
/// e.g. to retry a fit with more jitter only on `Numerical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Shape,
    Numerical,
    Precondition,
    Parameter,
}

/// Errors that can occur in matrix, kernel and GP operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GpError {
    #[error("empty input: at least one observation is required")]
    EmptyInput,

    #[error("length mismatch: {x} feature vectors but {y} targets")]
    LengthMismatch { x: usize, y: usize },

    #[error("dimension mismatch: expected {expected} features, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("ragged rows: row {row} has {got} entries, expected {expected}")]
    RaggedRows {
        row: usize,
        expected: usize,
        got: usize,
    },

    #[error("matrix is not square: {rows}x{columns}")]
    NotSquare { rows: usize, columns: usize },

    #[error("index ({row}, {column}) out of bounds for {rows}x{columns} matrix")]
    IndexOutOfBounds {
        row: usize,
        column: usize,
        rows: usize,
        columns: usize,
    },

    #[error("matrix not positive definite: pivot {pivot} at diagonal index {index}")]
    NotPositiveDefinite { index: usize, pivot: f64 },

    #[error("model not fitted: call fit before predicting or sampling")]
    NotFitted,

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

impl GpError {
    /// Returns the category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            GpError::EmptyInput
            | GpError::LengthMismatch { .. }
            | GpError::DimensionMismatch { .. }
            | GpError::RaggedRows { .. }
            | GpError::NotSquare { .. }
            | GpError::IndexOutOfBounds { .. } => ErrorKind::Shape,
            GpError::NotPositiveDefinite { .. } => ErrorKind::Numerical,
            GpError::NotFitted => ErrorKind::Precondition,
            GpError::InvalidParameter(_) => ErrorKind::Parameter,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(GpError::EmptyInput.kind(), ErrorKind::Shape);
        assert_eq!(
            GpError::LengthMismatch { x: 5, y: 4 }.kind(),
            ErrorKind::Shape
        );
        assert_eq!(
            GpError::NotPositiveDefinite {
                index: 0,
                pivot: -1.0
            }
            .kind(),
            ErrorKind::Numerical
        );
        assert_eq!(GpError::NotFitted.kind(), ErrorKind::Precondition);
        assert_eq!(
            GpError::InvalidParameter("x".into()).kind(),
            ErrorKind::Parameter
        );
    }

    #[test]
    fn test_error_messages() {
        let err = GpError::LengthMismatch { x: 5, y: 4 };
        assert_eq!(
            err.to_string(),
            "length mismatch: 5 feature vectors but 4 targets"
        );
    }
}
