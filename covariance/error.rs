use crate::cholesky::CholeskyError;
use crate::io::FileError;
use crate::types::PhysicalType;
use thiserror::Error;

/// Coarse classification of every failure the crate can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller supplied inconsistent or out-of-range inputs.
    InvalidArgument,
    /// The covariance matrix could not be factored.
    Numerical,
    /// An input file was missing, unreadable or malformed.
    Io,
}

/// A comprehensive error type for building and applying the model covariance.
#[derive(Error, Debug)]
pub enum CovarianceError {
    #[error("The {axis} correlation length must be finite and non-negative, but was {value}.")]
    InvalidCorrelationLength { axis: &'static str, value: f64 },

    #[error("The sparsity threshold must be finite and non-negative, but was {0}.")]
    InvalidThreshold(f64),

    #[error("The factor epsilon must be finite and non-negative, but was {0}.")]
    InvalidFactorEpsilon(f64),

    #[error("Unknown parameter weighting must be finite and positive, but was {0}.")]
    InvalidWeighting(f64),

    #[error("Pre-weight vector has {found} entries, but there are {expected} unknown parameters.")]
    PreWeightLengthMismatch { found: usize, expected: usize },

    #[error("Pre-weight of unknown parameter {index} must be finite and positive, but was {value}.")]
    InvalidPreWeight { index: usize, value: f64 },

    #[error(
        "The sensitivity weighting policy needs one sensitivity per unknown parameter, but none were supplied."
    )]
    MissingSensitivities,

    #[error("Got {found} sensitivities for {expected} unknown parameters.")]
    SensitivityLengthMismatch { found: usize, expected: usize },

    #[error("Sensitivity of unknown parameter {index} must be finite, but was {value}.")]
    InvalidSensitivity { index: usize, value: f64 },

    #[error(
        "The {policy} weighting policy normalizes by the kernel integral and needs a positive horizontal correlation length."
    )]
    ZeroLengthNormalization { policy: &'static str },

    #[error("No reference amplitude is configured for physical type {0}.")]
    MissingReferenceAmplitude(PhysicalType),

    #[error("Physical type {0} has more than one reference amplitude.")]
    DuplicateReferenceAmplitude(PhysicalType),

    #[error("The amplitude for physical type {physical_type} must be finite and positive, but was {value}.")]
    InvalidAmplitude {
        physical_type: PhysicalType,
        value: f64,
    },

    #[error("{operation}: expected {expected} {axis}, but the operand has {found}.")]
    DimensionMismatch {
        operation: &'static str,
        axis: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("The scale factor must be finite and positive, but was {0}.")]
    InvalidScale(f64),

    #[error("Cholesky factorization of the model covariance failed: {0}")]
    Cholesky(#[from] CholeskyError),

    #[error(transparent)]
    File(#[from] FileError),
}

impl CovarianceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CovarianceError::Cholesky(inner) => inner.kind(),
            CovarianceError::File(_) => ErrorKind::Io,
            _ => ErrorKind::InvalidArgument,
        }
    }
}
