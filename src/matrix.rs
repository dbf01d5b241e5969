//! Dense matrix value type.
//!
//! `Matrix` is a thin, bounds-checked wrapper around `nalgebra::DMatrix<f64>`.
//! Checked accessors (`get`, `set`, `row`, `column`) return `GpError` instead of
//! panicking; tuple indexing (`m[(i, j)]`) is available for hot loops where the
//! indices are known to be in range.

use std::ops::{Index, IndexMut};

use nalgebra::DMatrix;

use crate::error::GpError;

/// Dense 2D matrix of `f64` with a fixed shape.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    data: DMatrix<f64>,
}

impl Matrix {
    /// Creates a `rows` x `columns` matrix of zeros.
    pub fn zeros(rows: usize, columns: usize) -> Self {
        Self {
            data: DMatrix::zeros(rows, columns),
        }
    }

    /// Creates an `n` x `n` identity matrix.
    pub fn identity(n: usize) -> Self {
        Self {
            data: DMatrix::identity(n, n),
        }
    }

    /// Builds a matrix from nested rows.
    ///
    /// The column count is taken from the first row; any row of a different
    /// length is rejected.
    pub fn from_2d_array(data: &[Vec<f64>]) -> Result<Self, GpError> {
        let rows = data.len();
        let columns = data.first().map_or(0, Vec::len);

        if let Some((row, r)) = data.iter().enumerate().find(|(_, r)| r.len() != columns) {
            return Err(GpError::RaggedRows {
                row,
                expected: columns,
                got: r.len(),
            });
        }

        Ok(Self {
            data: DMatrix::from_fn(rows, columns, |i, j| data[i][j]),
        })
    }

    /// Builds an `n` x 1 column matrix.
    pub fn from_column(values: &[f64]) -> Self {
        Self {
            data: DMatrix::from_column_slice(values.len(), 1, values),
        }
    }

    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn columns(&self) -> usize {
        self.data.ncols()
    }

    pub fn is_square(&self) -> bool {
        self.rows() == self.columns()
    }

    fn check_bounds(&self, row: usize, column: usize) -> Result<(), GpError> {
        if row >= self.rows() || column >= self.columns() {
            return Err(GpError::IndexOutOfBounds {
                row,
                column,
                rows: self.rows(),
                columns: self.columns(),
            });
        }
        Ok(())
    }

    /// Returns the element at (`row`, `column`).
    pub fn get(&self, row: usize, column: usize) -> Result<f64, GpError> {
        self.check_bounds(row, column)?;
        Ok(self.data[(row, column)])
    }

    /// Overwrites the element at (`row`, `column`).
    pub fn set(&mut self, row: usize, column: usize, value: f64) -> Result<(), GpError> {
        self.check_bounds(row, column)?;
        self.data[(row, column)] = value;
        Ok(())
    }

    /// Returns a copy of row `row`.
    pub fn row(&self, row: usize) -> Result<Vec<f64>, GpError> {
        if row >= self.rows() {
            return Err(GpError::IndexOutOfBounds {
                row,
                column: 0,
                rows: self.rows(),
                columns: self.columns(),
            });
        }
        Ok(self.data.row(row).iter().copied().collect())
    }

    /// Returns a copy of column `column`.
    pub fn column(&self, column: usize) -> Result<Vec<f64>, GpError> {
        if column >= self.columns() {
            return Err(GpError::IndexOutOfBounds {
                row: 0,
                column,
                rows: self.rows(),
                columns: self.columns(),
            });
        }
        Ok(self.data.column(column).iter().copied().collect())
    }

    /// Returns a new matrix with rows and columns swapped.
    pub fn transpose(&self) -> Matrix {
        Matrix {
            data: self.data.transpose(),
        }
    }

    /// Matrix product `self · other`.
    pub fn matmul(&self, other: &Matrix) -> Result<Matrix, GpError> {
        if self.columns() != other.rows() {
            return Err(GpError::DimensionMismatch {
                expected: self.columns(),
                got: other.rows(),
            });
        }
        Ok(Matrix {
            data: &self.data * &other.data,
        })
    }

    /// Matrix-vector product `self · v`.
    pub fn mul_vector(&self, v: &[f64]) -> Result<Vec<f64>, GpError> {
        if self.columns() != v.len() {
            return Err(GpError::DimensionMismatch {
                expected: self.columns(),
                got: v.len(),
            });
        }
        let v = nalgebra::DVector::from_column_slice(v);
        Ok((&self.data * v).iter().copied().collect())
    }

    /// Returns the main diagonal.
    pub fn diagonal(&self) -> Vec<f64> {
        self.data.diagonal().iter().copied().collect()
    }

    /// Converts to nested rows.
    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        (0..self.rows())
            .map(|i| self.data.row(i).iter().copied().collect())
            .collect()
    }

    pub fn as_dmatrix(&self) -> &DMatrix<f64> {
        &self.data
    }

    pub fn into_dmatrix(self) -> DMatrix<f64> {
        self.data
    }
}

impl From<DMatrix<f64>> for Matrix {
    fn from(data: DMatrix<f64>) -> Self {
        Self { data }
    }
}

/// Unchecked element access. Panics when out of range.
impl Index<(usize, usize)> for Matrix {
    type Output = f64;

    fn index(&self, index: (usize, usize)) -> &f64 {
        &self.data[index]
    }
}

impl IndexMut<(usize, usize)> for Matrix {
    fn index_mut(&mut self, index: (usize, usize)) -> &mut f64 {
        &mut self.data[index]
    }
}
