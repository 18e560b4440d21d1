use crate::cholesky::DEFAULT_FACTOR_EPSILON;
use crate::error::CovarianceError;
use crate::types::CorrelationLengths;
use crate::weights::WeightPolicy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;

// --- Public Data Structures ---
// These structs define the human-readable covariance settings stored as TOML.

/// Correlation lengths as written in the configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CorrelationConfig {
    /// Horizontal correlation length in degrees.
    pub horizontal_deg: f64,
    /// Vertical correlation length in km.
    pub vertical_km: f64,
}

/// Cutoffs for the sparse row views.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SparsityConfig {
    /// Off-diagonal covariances at or below this value are stored as zero.
    #[serde(default)]
    pub threshold: f64,
    /// Entries of `L` and `Lᵗ` with magnitude at or below this value are left
    /// out of their sparse views. The dense factor is not affected.
    #[serde(default = "default_factor_epsilon")]
    pub factor_epsilon: f64,
}

fn default_factor_epsilon() -> f64 {
    DEFAULT_FACTOR_EPSILON
}

impl Default for SparsityConfig {
    fn default() -> Self {
        Self {
            threshold: 0.0,
            factor_epsilon: DEFAULT_FACTOR_EPSILON,
        }
    }
}

impl SparsityConfig {
    pub fn validate(&self) -> Result<(), CovarianceError> {
        if !(self.threshold.is_finite() && self.threshold >= 0.0) {
            return Err(CovarianceError::InvalidThreshold(self.threshold));
        }
        if !(self.factor_epsilon.is_finite() && self.factor_epsilon >= 0.0) {
            return Err(CovarianceError::InvalidFactorEpsilon(self.factor_epsilon));
        }
        Ok(())
    }
}

/// The complete covariance configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CovarianceConfig {
    pub correlation: CorrelationConfig,
    #[serde(default)]
    pub sparsity: SparsityConfig,
    #[serde(default)]
    pub weights: WeightPolicy,
}

impl Default for CovarianceConfig {
    fn default() -> Self {
        Self {
            correlation: CorrelationConfig {
                horizontal_deg: 5.0,
                vertical_km: 0.0,
            },
            sparsity: SparsityConfig::default(),
            weights: WeightPolicy::Uniform,
        }
    }
}

/// Custom error type for loading and saving configuration files.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read or write configuration file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML configuration file: {0}")]
    TomlParseError(#[from] toml::de::Error),
    #[error("Failed to serialize configuration to TOML format: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl CovarianceConfig {
    pub fn lengths(&self) -> Result<CorrelationLengths, CovarianceError> {
        CorrelationLengths::new(self.correlation.horizontal_deg, self.correlation.vertical_km)
    }

    /// Checks every value that would otherwise only fail once the matrix is
    /// being built.
    pub fn validate(&self) -> Result<(), CovarianceError> {
        self.lengths()?;
        self.sparsity.validate()?;
        self.weights.validate()
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let toml_string = toml::to_string_pretty(self)?;
        let mut file = BufWriter::new(fs::File::create(path)?);
        file.write_all(toml_string.as_bytes())?;
        file.flush()?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let toml_string = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&toml_string)?;
        config
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PhysicalType;
    use crate::weights::{Amplitude, RadialEmphasis, TypeReference};

    #[test]
    fn round_trips_through_toml() {
        let config = CovarianceConfig {
            correlation: CorrelationConfig {
                horizontal_deg: 2.5,
                vertical_km: 80.0,
            },
            sparsity: SparsityConfig {
                threshold: 0.005,
                factor_epsilon: 1e-12,
            },
            weights: WeightPolicy::KernelIntegral {
                amplitude: Amplitude::PerType {
                    base: 1.5,
                    references: vec![TypeReference {
                        physical_type: PhysicalType::Lambda2Mu,
                        value: 3.25e-4,
                    }],
                },
                radial: RadialEmphasis::LowermostMantle,
            },
        };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("covariance.toml");
        config.save(&path).unwrap();
        let loaded = CovarianceConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn omitted_tables_take_defaults() {
        let config: CovarianceConfig = toml::from_str(
            r#"
            [correlation]
            horizontal_deg = 4.0
            vertical_km = 0.0
            "#,
        )
        .unwrap();
        assert_eq!(config.sparsity, SparsityConfig::default());
        assert_eq!(config.weights, WeightPolicy::Uniform);
    }

    #[test]
    fn sensitivity_policy_parses_from_a_tag() {
        let config: CovarianceConfig = toml::from_str(
            r#"
            [correlation]
            horizontal_deg = 4.0
            vertical_km = 50.0

            [weights]
            policy = "sensitivity"
            normalize = true
            "#,
        )
        .unwrap();
        assert_eq!(config.weights, WeightPolicy::Sensitivity { normalize: true });
    }

    #[test]
    fn invalid_values_are_rejected_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(
            &path,
            "[correlation]\nhorizontal_deg = -1.0\nvertical_km = 0.0\n",
        )
        .unwrap();
        assert!(matches!(
            CovarianceConfig::load(&path),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn duplicated_reference_amplitudes_fail_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("duplicated.toml");
        fs::write(
            &path,
            r#"
            [correlation]
            horizontal_deg = 4.0
            vertical_km = 0.0

            [weights]
            policy = "kernel_integral"

            [weights.amplitude]
            kind = "per_type"
            base = 1.0

            [[weights.amplitude.references]]
            physical_type = "MU"
            value = 0.25

            [[weights.amplitude.references]]
            physical_type = "MU"
            value = 0.5
            "#,
        )
        .unwrap();
        match CovarianceConfig::load(&path) {
            Err(ConfigError::Invalid(message)) => assert!(message.contains("MU"), "{message}"),
            other => panic!("expected an invalid configuration, got {other:?}"),
        }
    }
}
