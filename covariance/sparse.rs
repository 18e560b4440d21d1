//! Compressed row index over a dense matrix.
//!
//! The dense matrices stay the source of truth; a `SparseRows` only records,
//! per row, which columns survived a magnitude cutoff so that repeated products
//! touch the stored entries and nothing else.

use crate::error::CovarianceError;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

/// Row-compressed storage of the entries of a matrix whose magnitude exceeds
/// a cutoff. Column indices within a row are strictly increasing.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseRows {
    ncols: usize,
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
    values: Vec<f64>,
}

impl SparseRows {
    /// Keeps every entry of `matrix` with `|value| > cutoff`, scanning all
    /// columns of every row.
    pub fn from_dense(matrix: ArrayView2<f64>, cutoff: f64) -> Self {
        let mut row_ptr = Vec::with_capacity(matrix.nrows() + 1);
        let mut col_idx = Vec::new();
        let mut values = Vec::new();
        row_ptr.push(0);
        for row in matrix.rows() {
            for (col, &value) in row.iter().enumerate() {
                if value.abs() > cutoff {
                    col_idx.push(col);
                    values.push(value);
                }
            }
            row_ptr.push(col_idx.len());
        }
        Self {
            ncols: matrix.ncols(),
            row_ptr,
            col_idx,
            values,
        }
    }

    pub fn nrows(&self) -> usize {
        self.row_ptr.len() - 1
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    /// Number of stored entries.
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Fraction of the full matrix that is stored.
    pub fn density(&self) -> f64 {
        let total = self.nrows() * self.ncols;
        if total == 0 {
            0.0
        } else {
            self.nnz() as f64 / total as f64
        }
    }

    /// Stored column indices and values of row `i`.
    pub fn row(&self, i: usize) -> (&[usize], &[f64]) {
        let range = self.row_ptr[i]..self.row_ptr[i + 1];
        (&self.col_idx[range.clone()], &self.values[range])
    }

    /// Value at `(i, j)`, zero when the entry is not stored.
    pub fn get(&self, i: usize, j: usize) -> f64 {
        let (cols, vals) = self.row(i);
        match cols.binary_search(&j) {
            Ok(pos) => vals[pos],
            Err(_) => 0.0,
        }
    }

    /// `self · v`.
    pub fn mul_vec(&self, v: ArrayView1<f64>) -> Result<Array1<f64>, CovarianceError> {
        self.check_operand("mul_vec", "entries", v.len())?;
        Ok(Array1::from_shape_fn(self.nrows(), |i| {
            let (cols, vals) = self.row(i);
            cols.iter().zip(vals).map(|(&k, &value)| value * v[k]).sum()
        }))
    }

    /// `self · m`.
    pub fn mul_mat(&self, m: ArrayView2<f64>) -> Result<Array2<f64>, CovarianceError> {
        self.check_operand("mul_mat", "rows", m.nrows())?;
        let mut out = Array2::zeros((self.nrows(), m.ncols()));
        for (i, mut out_row) in out.outer_iter_mut().enumerate() {
            let (cols, vals) = self.row(i);
            for (&k, &value) in cols.iter().zip(vals) {
                out_row.scaled_add(value, &m.row(k));
            }
        }
        Ok(out)
    }

    /// `m · selfᵀ`: column `j` of the result is built from row `j` of `self`.
    pub fn mat_mul_transpose(&self, m: ArrayView2<f64>) -> Result<Array2<f64>, CovarianceError> {
        self.check_operand("mat_mul_transpose", "columns", m.ncols())?;
        let mut out = Array2::zeros((m.nrows(), self.nrows()));
        for j in 0..self.nrows() {
            let (cols, vals) = self.row(j);
            let mut out_col = out.column_mut(j);
            for (&k, &value) in cols.iter().zip(vals) {
                out_col.scaled_add(value, &m.column(k));
            }
        }
        Ok(out)
    }

    // Every product contracts over the stored column index.
    fn check_operand(
        &self,
        operation: &'static str,
        axis: &'static str,
        found: usize,
    ) -> Result<(), CovarianceError> {
        if found != self.ncols {
            return Err(CovarianceError::DimensionMismatch {
                operation,
                axis,
                expected: self.ncols,
                found,
            });
        }
        Ok(())
    }

    /// Copy with every stored value multiplied by `factor`. The sparsity
    /// pattern is kept as is.
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            ncols: self.ncols,
            row_ptr: self.row_ptr.clone(),
            col_idx: self.col_idx.clone(),
            values: self.values.iter().map(|v| v * factor).collect(),
        }
    }

    pub fn to_dense(&self) -> Array2<f64> {
        let mut dense = Array2::zeros((self.nrows(), self.ncols));
        for i in 0..self.nrows() {
            let (cols, vals) = self.row(i);
            for (&j, &value) in cols.iter().zip(vals) {
                dense[(i, j)] = value;
            }
        }
        dense
    }
}
