//! # Covariance kernel and matrix assembly
//!
//! The a-priori covariance between two unknowns of the same physical type is a
//! separable Gaussian in horizontal angular separation and radial separation,
//! scaled by the product of their pre-weights. Unknowns of different physical
//! types never covary, so the matrix is block structured by type once the
//! parameters are grouped, but the caller's ordering is always preserved.

use crate::error::CovarianceError;
use crate::sparse::SparseRows;
use crate::types::{CorrelationLengths, Location, UnknownParameter};
use ndarray::{Array1, Array2};

/// Separable Gaussian correlation `exp(-(Δh/h)²) · exp(-(Δv/v)²)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CorrelationKernel {
    lengths: CorrelationLengths,
}

impl CorrelationKernel {
    pub fn new(lengths: CorrelationLengths) -> Self {
        Self { lengths }
    }

    pub fn lengths(&self) -> &CorrelationLengths {
        &self.lengths
    }

    /// Horizontal factor for an angular separation in degrees.
    pub fn horizontal(&self, separation: f64) -> f64 {
        gaussian(separation, self.lengths.horizontal())
    }

    /// Vertical factor for a radial separation in km.
    pub fn vertical(&self, separation: f64) -> f64 {
        gaussian(separation, self.lengths.vertical())
    }

    pub fn evaluate(&self, a: &Location, b: &Location) -> f64 {
        self.horizontal(a.angular_distance(b)) * self.vertical(a.radial_distance(b))
    }
}

// A zero length degenerates to an indicator of zero separation.
fn gaussian(separation: f64, length: f64) -> f64 {
    if length > 0.0 {
        let x = separation / length;
        (-x * x).exp()
    } else if separation == 0.0 {
        1.0
    } else {
        0.0
    }
}

/// The assembled covariance matrix `C` and its sparse row index.
#[derive(Debug, Clone)]
pub struct CovarianceMatrix {
    dense: Array2<f64>,
    rows: SparseRows,
    threshold: f64,
}

impl CovarianceMatrix {
    pub fn dense(&self) -> &Array2<f64> {
        &self.dense
    }

    pub fn rows(&self) -> &SparseRows {
        &self.rows
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn dim(&self) -> usize {
        self.dense.nrows()
    }

    pub(crate) fn scaled(&self, factor: f64) -> Self {
        Self {
            dense: &self.dense * factor,
            rows: self.rows.scaled(factor),
            threshold: self.threshold,
        }
    }
}

/// Builds a [`CovarianceMatrix`] for an ordered list of unknowns.
///
/// Off-diagonal values at or below the threshold are stored as zero in both
/// the dense matrix and the sparse index, so the index is always exactly the
/// nonzero pattern of the dense matrix. Diagonal entries are `preWeight²`
/// whatever the threshold.
pub struct MatrixBuilder<'a> {
    parameters: &'a [UnknownParameter],
    kernel: CorrelationKernel,
    pre_weights: Option<Array1<f64>>,
    threshold: f64,
}

impl<'a> MatrixBuilder<'a> {
    pub fn new(parameters: &'a [UnknownParameter], lengths: CorrelationLengths) -> Self {
        Self {
            parameters,
            kernel: CorrelationKernel::new(lengths),
            pre_weights: None,
            threshold: 0.0,
        }
    }

    /// Per-parameter pre-weights, in parameter order. Defaults to all ones.
    pub fn pre_weights(mut self, pre_weights: Array1<f64>) -> Self {
        self.pre_weights = Some(pre_weights);
        self
    }

    pub fn threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn build(self) -> Result<CovarianceMatrix, CovarianceError> {
        let n = self.parameters.len();
        if !(self.threshold.is_finite() && self.threshold >= 0.0) {
            return Err(CovarianceError::InvalidThreshold(self.threshold));
        }
        let weights = match self.pre_weights {
            Some(w) => w,
            None => Array1::ones(n),
        };
        validate_pre_weights(&weights, n)?;

        log::info!(
            "Computing model covariance matrix with {} parameters (h = {} deg, v = {} km, threshold = {})",
            n,
            self.kernel.lengths().horizontal(),
            self.kernel.lengths().vertical(),
            self.threshold
        );

        let mut dense = Array2::<f64>::zeros((n, n));
        for i in 0..n {
            let pi = &self.parameters[i];
            dense[(i, i)] = weights[i] * weights[i];
            for j in (i + 1)..n {
                let pj = &self.parameters[j];
                if pi.physical_type() != pj.physical_type() {
                    continue;
                }
                let value =
                    weights[i] * weights[j] * self.kernel.evaluate(pi.location(), pj.location());
                if value <= self.threshold {
                    continue;
                }
                dense[(i, j)] = value;
                dense[(j, i)] = value;
            }
        }

        let rows = SparseRows::from_dense(dense.view(), 0.0);
        log::debug!(
            "Covariance matrix stores {} of {} entries ({:.1}% dense)",
            rows.nnz(),
            n * n,
            100.0 * rows.density()
        );

        Ok(CovarianceMatrix {
            dense,
            rows,
            threshold: self.threshold,
        })
    }
}

fn validate_pre_weights(weights: &Array1<f64>, expected: usize) -> Result<(), CovarianceError> {
    if weights.len() != expected {
        return Err(CovarianceError::PreWeightLengthMismatch {
            found: weights.len(),
            expected,
        });
    }
    if let Some((index, &value)) = weights
        .iter()
        .enumerate()
        .find(|(_, w)| !(w.is_finite() && **w > 0.0))
    {
        return Err(CovarianceError::InvalidPreWeight { index, value });
    }
    Ok(())
}
