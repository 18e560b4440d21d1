#![deny(dead_code)]
#![deny(unused_imports)]

pub mod cholesky;
pub mod config;
pub mod error;
pub mod faer_ndarray;
pub mod io;
pub mod kernel;
pub mod operator;
pub mod precondition;
pub mod sparse;
pub mod types;
pub mod weights;

pub use config::{CovarianceConfig, SparsityConfig};
pub use error::{CovarianceError, ErrorKind};
pub use operator::{CovarianceSummary, ModelCovariance};
pub use types::{CorrelationLengths, Location, PhysicalType, UnknownParameter};
pub use weights::WeightPolicy;
