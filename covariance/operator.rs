//! # Model covariance operator
//!
//! `ModelCovariance` owns the covariance matrix `C`, its Cholesky factor `L`
//! and `Lᵗ`, and the sparse row views of all three. Everything is computed once
//! in the constructor and never mutated afterwards: applying a scale factor
//! builds a new instance, so the dense matrices and their sparse views cannot
//! drift apart.
//!
//! The products are evaluated through the sparse rows. They are algebraically
//! identical to dense multiplication and only cheaper when rows are short
//! compared with the number of unknowns.

use crate::cholesky::CholeskyFactor;
use crate::config::{CovarianceConfig, SparsityConfig};
use crate::error::CovarianceError;
use crate::io::{SensitivityRecord, align_sensitivities};
use crate::kernel::{CovarianceMatrix, MatrixBuilder};
use crate::sparse::SparseRows;
use crate::types::{CorrelationLengths, PhysicalType, UnknownParameter};
use crate::weights::compute_pre_weights;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone)]
pub struct ModelCovariance {
    parameters: Vec<UnknownParameter>,
    lengths: CorrelationLengths,
    pre_weights: Array1<f64>,
    covariance: CovarianceMatrix,
    factor: CholeskyFactor,
}

impl ModelCovariance {
    /// Uniform pre-weights, no threshold.
    pub fn new(
        parameters: &[UnknownParameter],
        lengths: CorrelationLengths,
    ) -> Result<Self, CovarianceError> {
        Self::with_pre_weights(
            parameters,
            lengths,
            Array1::ones(parameters.len()),
            &SparsityConfig::default(),
        )
    }

    /// Builds `C` from explicit pre-weights, then factors it.
    pub fn with_pre_weights(
        parameters: &[UnknownParameter],
        lengths: CorrelationLengths,
        pre_weights: Array1<f64>,
        sparsity: &SparsityConfig,
    ) -> Result<Self, CovarianceError> {
        sparsity.validate()?;
        let covariance = MatrixBuilder::new(parameters, lengths)
            .pre_weights(pre_weights.clone())
            .threshold(sparsity.threshold)
            .build()?;
        let factor = CholeskyFactor::factorize(covariance.dense().view(), sparsity.factor_epsilon)?;
        Ok(Self {
            parameters: parameters.to_vec(),
            lengths,
            pre_weights,
            covariance,
            factor,
        })
    }

    /// Builds the operator from a configuration.
    ///
    /// `sensitivities` must be given, in parameter order, when the
    /// configuration selects the sensitivity policy; they are checked against
    /// the unknowns before any matrix work starts.
    pub fn from_config(
        parameters: &[UnknownParameter],
        config: &CovarianceConfig,
        sensitivities: Option<&[SensitivityRecord]>,
    ) -> Result<Self, CovarianceError> {
        config.validate()?;
        let lengths = config.lengths()?;
        let aligned = match sensitivities {
            Some(records) if config.weights.needs_sensitivities() => {
                Some(align_sensitivities(records, parameters)?)
            }
            _ => None,
        };
        let pre_weights =
            compute_pre_weights(&config.weights, parameters, &lengths, aligned.as_deref())?;
        Self::with_pre_weights(parameters, lengths, pre_weights, &config.sparsity)
    }

    pub fn dim(&self) -> usize {
        self.parameters.len()
    }

    pub fn parameters(&self) -> &[UnknownParameter] {
        &self.parameters
    }

    pub fn lengths(&self) -> &CorrelationLengths {
        &self.lengths
    }

    pub fn pre_weights(&self) -> &Array1<f64> {
        &self.pre_weights
    }

    /// Dense covariance matrix `C`.
    pub fn covariance(&self) -> &Array2<f64> {
        self.covariance.dense()
    }

    /// Dense lower Cholesky factor `L`.
    pub fn factor(&self) -> &Array2<f64> {
        self.factor.lower()
    }

    /// Dense `Lᵗ`.
    pub fn factor_transpose(&self) -> &Array2<f64> {
        self.factor.upper()
    }

    pub fn covariance_rows(&self) -> &SparseRows {
        self.covariance.rows()
    }

    pub fn factor_rows(&self) -> &SparseRows {
        self.factor.lower_rows()
    }

    pub fn factor_transpose_rows(&self) -> &SparseRows {
        self.factor.upper_rows()
    }

    /// `M·L`, for `M` with one column per unknown.
    pub fn right_multiply_by_l(&self, m: ArrayView2<f64>) -> Result<Array2<f64>, CovarianceError> {
        self.check_len("right_multiply_by_l", "columns", m.ncols())?;
        self.factor.upper_rows().mat_mul_transpose(m)
    }

    /// `L·M`, for `M` with one row per unknown.
    pub fn left_multiply_by_l(&self, m: ArrayView2<f64>) -> Result<Array2<f64>, CovarianceError> {
        self.check_len("left_multiply_by_l", "rows", m.nrows())?;
        self.factor.lower_rows().mul_mat(m)
    }

    /// `Lᵗ·M`, for `M` with one row per unknown.
    pub fn left_multiply_by_lt(&self, m: ArrayView2<f64>) -> Result<Array2<f64>, CovarianceError> {
        self.check_len("left_multiply_by_lt", "rows", m.nrows())?;
        self.factor.upper_rows().mul_mat(m)
    }

    /// `C·M`, for `M` with one row per unknown.
    pub fn left_multiply(&self, m: ArrayView2<f64>) -> Result<Array2<f64>, CovarianceError> {
        self.check_len("left_multiply", "rows", m.nrows())?;
        self.covariance.rows().mul_mat(m)
    }

    /// `C·v`.
    pub fn operate(&self, v: ArrayView1<f64>) -> Result<Array1<f64>, CovarianceError> {
        self.check_len("operate", "entries", v.len())?;
        self.covariance.rows().mul_vec(v)
    }

    /// `L·v`.
    pub fn apply_l(&self, v: ArrayView1<f64>) -> Result<Array1<f64>, CovarianceError> {
        self.check_len("apply_l", "entries", v.len())?;
        self.factor.lower_rows().mul_vec(v)
    }

    /// `Lᵗ·v`.
    pub fn apply_lt(&self, v: ArrayView1<f64>) -> Result<Array1<f64>, CovarianceError> {
        self.check_len("apply_lt", "entries", v.len())?;
        self.factor.upper_rows().mul_vec(v)
    }

    /// The operator for `factor · C`.
    ///
    /// `C`, its sparse view and the pre-weights are scaled consistently, and
    /// the Cholesky factor is scaled by `√factor` instead of being recomputed.
    pub fn scaled(&self, factor: f64) -> Result<Self, CovarianceError> {
        if !(factor.is_finite() && factor > 0.0) {
            return Err(CovarianceError::InvalidScale(factor));
        }
        let root = factor.sqrt();
        Ok(Self {
            parameters: self.parameters.clone(),
            lengths: self.lengths,
            pre_weights: &self.pre_weights * root,
            covariance: self.covariance.scaled(factor),
            factor: self.factor.scaled(root),
        })
    }

    /// Storage and accuracy figures for logging and the CLI.
    ///
    /// The reconstruction check forms `L·Lᵗ` densely and costs O(n³).
    pub fn summary(&self) -> CovarianceSummary {
        let mut type_counts = BTreeMap::new();
        for p in &self.parameters {
            *type_counts.entry(p.physical_type()).or_insert(0) += 1;
        }

        let c = self.covariance();
        let rebuilt = self.factor().dot(self.factor_transpose());
        let scale = c.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
        let max_error = rebuilt
            .iter()
            .zip(c.iter())
            .fold(0.0_f64, |acc, (a, b)| acc.max((a - b).abs()));
        let reconstruction_error = if scale > 0.0 { max_error / scale } else { max_error };

        CovarianceSummary {
            parameters: self.dim(),
            type_counts,
            covariance_entries: self.covariance_rows().nnz(),
            factor_entries: self.factor_rows().nnz(),
            factor_transpose_entries: self.factor_transpose_rows().nnz(),
            covariance_density: self.covariance_rows().density(),
            factor_density: self.factor_rows().density(),
            reconstruction_error,
        }
    }

    fn check_len(
        &self,
        operation: &'static str,
        axis: &'static str,
        found: usize,
    ) -> Result<(), CovarianceError> {
        let expected = self.dim();
        if found != expected {
            return Err(CovarianceError::DimensionMismatch {
                operation,
                axis,
                expected,
                found,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CovarianceSummary {
    pub parameters: usize,
    pub type_counts: BTreeMap<PhysicalType, usize>,
    pub covariance_entries: usize,
    pub factor_entries: usize,
    pub factor_transpose_entries: usize,
    pub covariance_density: f64,
    pub factor_density: f64,
    /// `max |L·Lᵗ − C| / max |C|`.
    pub reconstruction_error: f64,
}

impl fmt::Display for CovarianceSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "unknown parameters: {}", self.parameters)?;
        for (t, count) in &self.type_counts {
            writeln!(f, "  {t}: {count}")?;
        }
        writeln!(
            f,
            "C stored entries:  {} ({:.2}%)",
            self.covariance_entries,
            100.0 * self.covariance_density
        )?;
        writeln!(
            f,
            "L stored entries:  {} ({:.2}%)",
            self.factor_entries,
            100.0 * self.factor_density
        )?;
        writeln!(f, "Lt stored entries: {}", self.factor_transpose_entries)?;
        write!(f, "max relative |L*Lt - C|: {:.3e}", self.reconstruction_error)
    }
}
