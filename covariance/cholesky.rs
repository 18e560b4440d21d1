use crate::error::ErrorKind;
use crate::faer_ndarray::FaerCholesky;
use crate::sparse::SparseRows;
use faer::Side;
use ndarray::{Array2, ArrayView2, s};
use thiserror::Error;

/// Pivots at or below this value are treated as a failure of positive
/// definiteness.
pub const POSITIVITY_THRESHOLD: f64 = 1.0e-10;

/// Relative tolerance for the symmetry check on the input matrix.
pub const SYMMETRY_TOLERANCE: f64 = 1.0e-12;

/// Default cutoff for the sparse views of `L` and `Lᵗ`. Independent of the
/// covariance threshold.
pub const DEFAULT_FACTOR_EPSILON: f64 = 1.0e-14;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CholeskyError {
    #[error("Cholesky factorization requires a square matrix, but got {rows}x{cols}.")]
    NotSquare { rows: usize, cols: usize },

    #[error("Matrix is not symmetric: entry ({row}, {col}) is {upper} but ({col}, {row}) is {lower}.")]
    NotSymmetric {
        row: usize,
        col: usize,
        upper: f64,
        lower: f64,
    },

    #[error(
        "Matrix is not positive definite: pivot {pivot:e} at index {index} does not exceed {threshold:e}."
    )]
    NonPositivePivot {
        index: usize,
        pivot: f64,
        threshold: f64,
    },
}

impl CholeskyError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CholeskyError::NotSquare { .. } => ErrorKind::InvalidArgument,
            CholeskyError::NotSymmetric { .. } | CholeskyError::NonPositivePivot { .. } => {
                ErrorKind::Numerical
            }
        }
    }
}

/// Dense lower Cholesky factor `L` with `A = L·Lᵗ`, computed by faer.
///
/// Fails on the first pivot `L[i][i]²` that is not above
/// [`POSITIVITY_THRESHOLD`]; the input is never regularized.
pub fn cholesky_lower(matrix: ArrayView2<f64>) -> Result<Array2<f64>, CholeskyError> {
    let (rows, cols) = matrix.dim();
    if rows != cols {
        return Err(CholeskyError::NotSquare { rows, cols });
    }
    check_symmetric(matrix)?;
    if rows == 0 {
        return Ok(Array2::zeros((0, 0)));
    }

    match matrix.cholesky(Side::Lower) {
        Ok(factor) => {
            let lower = factor.lower();
            match first_small_pivot(&lower) {
                Some(err) => Err(err),
                None => Ok(lower),
            }
        }
        Err(e) => Err(failing_pivot(matrix, e.pivot_index())),
    }
}

fn first_small_pivot(lower: &Array2<f64>) -> Option<CholeskyError> {
    lower
        .diag()
        .iter()
        .map(|d| d * d)
        .enumerate()
        .find(|(_, pivot)| !(*pivot > POSITIVITY_THRESHOLD))
        .map(|(index, pivot)| CholeskyError::NonPositivePivot {
            index,
            pivot,
            threshold: POSITIVITY_THRESHOLD,
        })
}

// faer only reports where it stopped. The pivot there is the Schur complement
// a[k][k] - bᵗ·A[..k, ..k]⁻¹·b of the leading block, which did factor.
fn failing_pivot(matrix: ArrayView2<f64>, index: usize) -> CholeskyError {
    let pivot = if index == 0 {
        matrix[(0, 0)]
    } else {
        let leading = matrix.slice(s![..index, ..index]);
        let column = matrix.slice(s![..index, index]).to_owned();
        match leading.cholesky(Side::Lower) {
            Ok(factor) => {
                if let Some(err) = first_small_pivot(&factor.lower()) {
                    return err;
                }
                matrix[(index, index)] - column.dot(&factor.solve_vec(&column))
            }
            Err(e) => return failing_pivot(matrix, e.pivot_index().min(index - 1)),
        }
    };
    CholeskyError::NonPositivePivot {
        index,
        pivot,
        threshold: POSITIVITY_THRESHOLD,
    }
}

fn check_symmetric(matrix: ArrayView2<f64>) -> Result<(), CholeskyError> {
    let n = matrix.nrows();
    for i in 0..n {
        for j in (i + 1)..n {
            let upper = matrix[(i, j)];
            let lower = matrix[(j, i)];
            let scale = upper.abs().max(lower.abs());
            if (upper - lower).abs() > SYMMETRY_TOLERANCE * scale {
                return Err(CholeskyError::NotSymmetric {
                    row: i,
                    col: j,
                    upper,
                    lower,
                });
            }
        }
    }
    Ok(())
}

/// `L`, `Lᵗ` and their sparse row views.
#[derive(Debug, Clone)]
pub struct CholeskyFactor {
    lower: Array2<f64>,
    upper: Array2<f64>,
    lower_rows: SparseRows,
    upper_rows: SparseRows,
    epsilon: f64,
}

impl CholeskyFactor {
    /// Factors `matrix` and indexes the entries of `L` and `Lᵗ` whose
    /// magnitude exceeds `epsilon`.
    pub fn factorize(matrix: ArrayView2<f64>, epsilon: f64) -> Result<Self, CholeskyError> {
        log::info!(
            "Computing Cholesky decomposition of a {}x{} covariance matrix",
            matrix.nrows(),
            matrix.ncols()
        );
        let lower = cholesky_lower(matrix)?;
        let factor = Self::from_lower(lower, epsilon);
        log::debug!(
            "Cholesky factor stores {} of {} entries ({:.1}% dense)",
            factor.lower_rows.nnz(),
            factor.lower.len(),
            100.0 * factor.lower_rows.density()
        );
        Ok(factor)
    }

    fn from_lower(lower: Array2<f64>, epsilon: f64) -> Self {
        let upper = lower.t().to_owned();
        let lower_rows = SparseRows::from_dense(lower.view(), epsilon);
        let upper_rows = SparseRows::from_dense(upper.view(), epsilon);
        Self {
            lower,
            upper,
            lower_rows,
            upper_rows,
            epsilon,
        }
    }

    pub fn lower(&self) -> &Array2<f64> {
        &self.lower
    }

    pub fn upper(&self) -> &Array2<f64> {
        &self.upper
    }

    pub fn lower_rows(&self) -> &SparseRows {
        &self.lower_rows
    }

    pub fn upper_rows(&self) -> &SparseRows {
        &self.upper_rows
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Factor of `factor² · A`, given that `self` factors `A`.
    pub(crate) fn scaled(&self, factor: f64) -> Self {
        Self::from_lower(&self.lower * factor, self.epsilon)
    }
}
