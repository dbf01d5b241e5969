//! Cholesky decomposition and triangular solves.
//!
//! Factors a symmetric positive-definite matrix `A` into `L·Lᵀ` with `L` lower
//! triangular. No pivoting is done: covariance matrices with a positive diagonal
//! jitter are SPD in exact arithmetic, and a non-positive pivot is reported as
//! `GpError::NotPositiveDefinite` instead of being repaired.

use nalgebra::DVector;

use crate::error::GpError;
use crate::matrix::Matrix;

/// Lower-triangular Cholesky factor `L` of an SPD matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct CholeskyFactor {
    l: Matrix,
}

/// Computes the Cholesky factor of a square SPD matrix.
///
/// Only the lower triangle of `a` is read.
pub fn cholesky(a: &Matrix) -> Result<CholeskyFactor, GpError> {
    if !a.is_square() {
        return Err(GpError::NotSquare {
            rows: a.rows(),
            columns: a.columns(),
        });
    }

    let n = a.rows();
    let mut l = Matrix::zeros(n, n);

    for j in 0..n {
        let sum_sq: f64 = (0..j).map(|k| l[(j, k)] * l[(j, k)]).sum();
        let pivot = a[(j, j)] - sum_sq;
        if pivot.is_nan() || pivot <= 0.0 {
            return Err(GpError::NotPositiveDefinite { index: j, pivot });
        }
        let diag = pivot.sqrt();
        l[(j, j)] = diag;

        for i in (j + 1)..n {
            let dot: f64 = (0..j).map(|k| l[(i, k)] * l[(j, k)]).sum();
            l[(i, j)] = (a[(i, j)] - dot) / diag;
        }
    }

    Ok(CholeskyFactor { l })
}

impl CholeskyFactor {
    /// Returns the lower-triangular factor.
    pub fn l(&self) -> &Matrix {
        &self.l
    }

    pub fn into_l(self) -> Matrix {
        self.l
    }

    /// Size of the factored matrix.
    pub fn dim(&self) -> usize {
        self.l.rows()
    }

    fn check_len(&self, len: usize) -> Result<(), GpError> {
        if len != self.dim() {
            return Err(GpError::DimensionMismatch {
                expected: self.dim(),
                got: len,
            });
        }
        Ok(())
    }

    /// A zero diagonal entry makes nalgebra's triangular solves return `None`.
    /// `cholesky` never produces one, but a factor rebuilt from a singular `L`
    /// reports it here.
    fn singular(&self) -> GpError {
        let diag = self.l.diagonal();
        let index = diag.iter().position(|d| *d == 0.0).unwrap_or(0);
        GpError::NotPositiveDefinite {
            index,
            pivot: diag.get(index).copied().unwrap_or(0.0),
        }
    }

    /// Solves `L·z = b` by forward substitution.
    pub fn solve_lower(&self, b: &[f64]) -> Result<Vec<f64>, GpError> {
        self.check_len(b.len())?;
        let b = DVector::from_column_slice(b);
        let z = self
            .l
            .as_dmatrix()
            .solve_lower_triangular(&b)
            .ok_or_else(|| self.singular())?;
        Ok(z.iter().copied().collect())
    }

    /// Solves `Lᵀ·x = z` by back substitution.
    pub fn solve_upper(&self, z: &[f64]) -> Result<Vec<f64>, GpError> {
        self.check_len(z.len())?;
        let z = DVector::from_column_slice(z);
        let x = self
            .l
            .as_dmatrix()
            .tr_solve_lower_triangular(&z)
            .ok_or_else(|| self.singular())?;
        Ok(x.iter().copied().collect())
    }

    /// Solves `A·x = b` with two triangular solves, never forming `A⁻¹`.
    pub fn solve(&self, b: &[f64]) -> Result<Vec<f64>, GpError> {
        let z = self.solve_lower(b)?;
        self.solve_upper(&z)
    }

    /// Solves `L·V = B` for all columns of `B` in one batch.
    pub fn solve_lower_matrix(&self, b: &Matrix) -> Result<Matrix, GpError> {
        self.check_len(b.rows())?;
        let v = self
            .l
            .as_dmatrix()
            .solve_lower_triangular(b.as_dmatrix())
            .ok_or_else(|| self.singular())?;
        Ok(Matrix::from(v))
    }

    /// Log-determinant of the factored matrix: `2 Σ log Lᵢᵢ`.
    pub fn log_determinant(&self) -> f64 {
        2.0 * self.l.diagonal().iter().map(|d| d.ln()).sum::<f64>()
    }

    /// Rebuilds `L·Lᵀ`.
    pub fn reconstruct(&self) -> Matrix {
        Matrix::from(self.l.as_dmatrix() * self.l.as_dmatrix().transpose())
    }

    /// Computes `L·z`.
    pub fn mul_lower(&self, z: &[f64]) -> Result<Vec<f64>, GpError> {
        self.l.mul_vector(z)
    }
}
