//! # Pre-weight policies
//!
//! Each unknown carries a positive pre-weight `w`, and the covariance between
//! unknowns `i` and `j` is scaled by `w_i · w_j`. Several policies were used by
//! past inversions. They are kept as distinct, named variants because they
//! reproduce specific published results; none of them is the general default
//! apart from `Uniform`.
//!
//! The clamp bounds, the radial emphasis factor and the `√π·h` divisor are part
//! of the numerical contract and must not be altered.

use crate::error::CovarianceError;
use crate::types::{CorrelationLengths, Location, PhysicalType, UnknownParameter};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Lower clamp bound of the inverse sensitivity.
pub const INVERSE_SENSITIVITY_MIN: f64 = 1.0 / 3.0;
/// Upper clamp bound of the inverse sensitivity.
pub const INVERSE_SENSITIVITY_MAX: f64 = 3.0;

/// Multiplier applied to the emphasized depth range.
pub const RADIAL_EMPHASIS_FACTOR: f64 = 1.2248;
/// Unknowns at or below this depth (km) belong to the transition-zone emphasis.
pub const TRANSITION_ZONE_DEPTH_KM: f64 = 600.0;
/// Unknowns strictly below this depth (km) belong to the lowermost-mantle emphasis.
pub const LOWERMOST_MANTLE_DEPTH_KM: f64 = 2791.0;

/// How pre-weights are derived from the unknowns.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum WeightPolicy {
    /// Every pre-weight is 1.
    #[default]
    Uniform,
    /// `sqrt(clamp(1/s, [1/3, 3]))` from per-unknown sensitivities `s`; with
    /// `normalize`, further divided by the mean pre-weight and by `√π·h`.
    Sensitivity {
        #[serde(default)]
        normalize: bool,
    },
    /// Radial emphasis, then `sqrt(amplitude) / mean / (√π·h)`, where the mean
    /// is taken over the radially emphasized weights.
    KernelIntegral {
        amplitude: Amplitude,
        #[serde(default)]
        radial: RadialEmphasis,
    },
}

impl WeightPolicy {
    pub fn name(&self) -> &'static str {
        match self {
            WeightPolicy::Uniform => "uniform",
            WeightPolicy::Sensitivity { .. } => "sensitivity",
            WeightPolicy::KernelIntegral { .. } => "kernel_integral",
        }
    }

    pub fn needs_sensitivities(&self) -> bool {
        matches!(self, WeightPolicy::Sensitivity { .. })
    }

    /// Rejects settings that no parameter list could make valid.
    pub fn validate(&self) -> Result<(), CovarianceError> {
        if let WeightPolicy::KernelIntegral {
            amplitude: Amplitude::PerType { references, .. },
            ..
        } = self
        {
            for (i, reference) in references.iter().enumerate() {
                if references[..i]
                    .iter()
                    .any(|r| r.physical_type == reference.physical_type)
                {
                    return Err(CovarianceError::DuplicateReferenceAmplitude(
                        reference.physical_type,
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Variance amplitude for the kernel-integral policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Amplitude {
    /// The same amplitude for every unknown.
    Uniform { value: f64 },
    /// `base / reference`, where the reference value depends on the physical
    /// type of the unknown. Types without a reference are rejected.
    PerType {
        base: f64,
        references: Vec<TypeReference>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TypeReference {
    pub physical_type: PhysicalType,
    pub value: f64,
}

impl Amplitude {
    fn value_for(&self, physical_type: PhysicalType) -> Result<f64, CovarianceError> {
        let value = match self {
            Amplitude::Uniform { value } => *value,
            Amplitude::PerType { base, references } => {
                let reference = references
                    .iter()
                    .find(|r| r.physical_type == physical_type)
                    .ok_or(CovarianceError::MissingReferenceAmplitude(physical_type))?;
                base / reference.value
            }
        };
        if !(value.is_finite() && value > 0.0) {
            return Err(CovarianceError::InvalidAmplitude {
                physical_type,
                value,
            });
        }
        Ok(value)
    }
}

/// Depth-dependent emphasis used by individual studies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RadialEmphasis {
    #[default]
    None,
    /// Depth ≥ 600 km.
    TransitionZone,
    /// Depth > 2791 km (D'' layer).
    LowermostMantle,
}

impl RadialEmphasis {
    pub fn multiplier(self, location: &Location) -> f64 {
        let depth = location.depth();
        let emphasized = match self {
            RadialEmphasis::None => false,
            RadialEmphasis::TransitionZone => depth >= TRANSITION_ZONE_DEPTH_KM,
            RadialEmphasis::LowermostMantle => depth > LOWERMOST_MANTLE_DEPTH_KM,
        };
        if emphasized { RADIAL_EMPHASIS_FACTOR } else { 1.0 }
    }
}

/// Pre-weight from a single sensitivity value.
pub fn sensitivity_weight(sensitivity: f64) -> f64 {
    (1.0 / sensitivity)
        .clamp(INVERSE_SENSITIVITY_MIN, INVERSE_SENSITIVITY_MAX)
        .sqrt()
}

/// Computes one pre-weight per unknown, in parameter order.
///
/// `sensitivities` is read positionally and is required only by the
/// sensitivity policy.
pub fn compute_pre_weights(
    policy: &WeightPolicy,
    parameters: &[UnknownParameter],
    lengths: &CorrelationLengths,
    sensitivities: Option<&[f64]>,
) -> Result<Array1<f64>, CovarianceError> {
    policy.validate()?;
    let n = parameters.len();
    let weights = match policy {
        WeightPolicy::Uniform => Array1::ones(n),
        WeightPolicy::Sensitivity { normalize } => {
            let sensitivities = sensitivities.ok_or(CovarianceError::MissingSensitivities)?;
            if sensitivities.len() != n {
                return Err(CovarianceError::SensitivityLengthMismatch {
                    found: sensitivities.len(),
                    expected: n,
                });
            }
            if let Some((index, &value)) = sensitivities
                .iter()
                .enumerate()
                .find(|(_, s)| s.is_nan())
            {
                return Err(CovarianceError::InvalidSensitivity { index, value });
            }
            let raw: Array1<f64> = sensitivities.iter().map(|&s| sensitivity_weight(s)).collect();
            if *normalize {
                normalize_by_kernel_integral(raw, lengths, policy.name())?
            } else {
                raw
            }
        }
        WeightPolicy::KernelIntegral { amplitude, radial } => {
            let emphasized: Array1<f64> = parameters
                .iter()
                .map(|p| radial.multiplier(p.location()))
                .collect();
            let mut weights = normalize_by_kernel_integral(emphasized, lengths, policy.name())?;
            for (w, p) in weights.iter_mut().zip(parameters) {
                *w *= amplitude.value_for(p.physical_type())?.sqrt();
            }
            weights
        }
    };
    if n > 0 {
        log::debug!(
            "Pre-weights ({}): min {:.4e}, max {:.4e}",
            policy.name(),
            weights.iter().copied().fold(f64::INFINITY, f64::min),
            weights.iter().copied().fold(f64::NEG_INFINITY, f64::max)
        );
    }
    Ok(weights)
}

// w / mean(w) / (√π·h)
fn normalize_by_kernel_integral(
    weights: Array1<f64>,
    lengths: &CorrelationLengths,
    policy: &'static str,
) -> Result<Array1<f64>, CovarianceError> {
    let h = lengths.horizontal();
    if h <= 0.0 {
        return Err(CovarianceError::ZeroLengthNormalization { policy });
    }
    let Some(mean) = weights.mean() else {
        return Ok(weights);
    };
    let divisor = mean * std::f64::consts::PI.sqrt() * h;
    Ok(weights.mapv(|w| w / divisor))
}
