use crate::error::CovarianceError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Reference Earth radius in km. Depths are measured from this surface.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// The physical quantity perturbed by an unknown parameter.
///
/// The set is closed: two parameters covary only when their tags are equal,
/// so the comparison is plain value equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PhysicalType {
    /// Shear modulus.
    #[serde(rename = "MU")]
    Mu,
    /// First Lamé parameter.
    #[serde(rename = "LAMBDA")]
    Lambda,
    /// Bulk modulus.
    #[serde(rename = "KAPPA")]
    Kappa,
    /// P-wave modulus, lambda + 2 mu.
    #[serde(rename = "LAMBDA2MU")]
    Lambda2Mu,
    #[serde(rename = "A")]
    A,
    #[serde(rename = "C")]
    C,
    #[serde(rename = "F")]
    F,
    #[serde(rename = "L")]
    L,
    #[serde(rename = "N")]
    N,
    /// Attenuation.
    #[serde(rename = "Q")]
    Q,
}

impl PhysicalType {
    pub const ALL: [PhysicalType; 10] = [
        PhysicalType::Mu,
        PhysicalType::Lambda,
        PhysicalType::Kappa,
        PhysicalType::Lambda2Mu,
        PhysicalType::A,
        PhysicalType::C,
        PhysicalType::F,
        PhysicalType::L,
        PhysicalType::N,
        PhysicalType::Q,
    ];

    /// The name used in parameter and sensitivity files.
    pub fn name(self) -> &'static str {
        match self {
            PhysicalType::Mu => "MU",
            PhysicalType::Lambda => "LAMBDA",
            PhysicalType::Kappa => "KAPPA",
            PhysicalType::Lambda2Mu => "LAMBDA2MU",
            PhysicalType::A => "A",
            PhysicalType::C => "C",
            PhysicalType::F => "F",
            PhysicalType::L => "L",
            PhysicalType::N => "N",
            PhysicalType::Q => "Q",
        }
    }
}

impl fmt::Display for PhysicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown physical type '{0}'. Expected one of MU, LAMBDA, KAPPA, LAMBDA2MU, A, C, F, L, N, Q.")]
pub struct UnknownPhysicalType(pub String);

impl FromStr for PhysicalType {
    type Err = UnknownPhysicalType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PhysicalType::ALL
            .iter()
            .copied()
            .find(|t| t.name() == s)
            .ok_or_else(|| UnknownPhysicalType(s.to_string()))
    }
}

/// A point inside the spherical Earth: latitude and longitude in degrees,
/// radius in km.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    latitude: f64,
    longitude: f64,
    radius: f64,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64, radius: f64) -> Self {
        Self {
            latitude,
            longitude,
            radius,
        }
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Depth below the reference surface, in km.
    pub fn depth(&self) -> f64 {
        EARTH_RADIUS_KM - self.radius
    }

    /// Great-circle angular separation from `other`, in degrees.
    ///
    /// Uses the haversine form so that two locations with identical latitude
    /// and longitude are separated by exactly zero, which the zero-length
    /// kernels rely on.
    pub fn angular_distance(&self, other: &Location) -> f64 {
        let phi1 = self.latitude.to_radians();
        let phi2 = other.latitude.to_radians();
        let half_dphi = 0.5 * (other.latitude - self.latitude).to_radians();
        let half_dlambda = 0.5 * (other.longitude - self.longitude).to_radians();

        let a = half_dphi.sin().powi(2) + phi1.cos() * phi2.cos() * half_dlambda.sin().powi(2);
        let a = a.clamp(0.0, 1.0);
        (2.0 * a.sqrt().atan2((1.0 - a).sqrt())).to_degrees()
    }

    /// Absolute radial separation from `other`, in km.
    pub fn radial_distance(&self, other: &Location) -> f64 {
        (self.radius - other.radius).abs()
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.latitude, self.longitude, self.radius)
    }
}

/// One scalar degree of freedom of the tomographic model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UnknownParameter {
    physical_type: PhysicalType,
    location: Location,
    weighting: f64,
}

impl UnknownParameter {
    /// `weighting` is the integration measure of the parameter (e.g. a cell
    /// volume) and must be finite and positive.
    pub fn new(
        physical_type: PhysicalType,
        location: Location,
        weighting: f64,
    ) -> Result<Self, CovarianceError> {
        if !(weighting.is_finite() && weighting > 0.0) {
            return Err(CovarianceError::InvalidWeighting(weighting));
        }
        Ok(Self {
            physical_type,
            location,
            weighting,
        })
    }

    pub fn physical_type(&self) -> PhysicalType {
        self.physical_type
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn weighting(&self) -> f64 {
        self.weighting
    }

    /// True when both parameters perturb the same quantity at the same point,
    /// regardless of weighting.
    pub fn same_unknown(&self, other: &UnknownParameter) -> bool {
        self.physical_type == other.physical_type && self.location == other.location
    }
}

impl fmt::Display for UnknownParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.physical_type, self.location, self.weighting)
    }
}

/// Horizontal (degrees) and vertical (km) correlation lengths.
///
/// A zero length does not mean "uncorrelated": it means parameters covary only
/// at exactly zero separation along that axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CorrelationLengths {
    horizontal: f64,
    vertical: f64,
}

impl CorrelationLengths {
    pub fn new(horizontal: f64, vertical: f64) -> Result<Self, CovarianceError> {
        if !(horizontal.is_finite() && horizontal >= 0.0) {
            return Err(CovarianceError::InvalidCorrelationLength {
                axis: "horizontal",
                value: horizontal,
            });
        }
        if !(vertical.is_finite() && vertical >= 0.0) {
            return Err(CovarianceError::InvalidCorrelationLength {
                axis: "vertical",
                value: vertical,
            });
        }
        Ok(Self {
            horizontal,
            vertical,
        })
    }

    /// Horizontal correlation length in degrees.
    pub fn horizontal(&self) -> f64 {
        self.horizontal
    }

    /// Vertical correlation length in km.
    pub fn vertical(&self) -> f64 {
        self.vertical
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn physical_type_names_round_trip() {
        for t in PhysicalType::ALL {
            assert_eq!(t.name().parse::<PhysicalType>().unwrap(), t);
        }
        assert_eq!(
            "mu".parse::<PhysicalType>(),
            Err(UnknownPhysicalType("mu".to_string()))
        );
    }

    #[test]
    fn angular_distance_along_meridian() {
        let a = Location::new(0.0, 0.0, EARTH_RADIUS_KM);
        let b = Location::new(2.0, 0.0, EARTH_RADIUS_KM);
        assert_abs_diff_eq!(a.angular_distance(&b), 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(b.angular_distance(&a), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn angular_distance_along_equator_and_antipode() {
        let a = Location::new(0.0, 10.0, 6000.0);
        let b = Location::new(0.0, 40.0, 3480.0);
        assert_abs_diff_eq!(a.angular_distance(&b), 30.0, epsilon = 1e-10);

        let north = Location::new(90.0, 0.0, 6371.0);
        let south = Location::new(-90.0, 0.0, 6371.0);
        assert_abs_diff_eq!(north.angular_distance(&south), 180.0, epsilon = 1e-10);
    }

    #[test]
    fn identical_horizontal_positions_are_exactly_zero_apart() {
        let a = Location::new(37.3, -122.1, 6371.0);
        let b = Location::new(37.3, -122.1, 5000.0);
        assert_eq!(a.angular_distance(&b), 0.0);
        assert_eq!(a.radial_distance(&b), 1371.0);
    }

    #[test]
    fn correlation_lengths_reject_negative_and_nan() {
        assert!(CorrelationLengths::new(0.0, 0.0).is_ok());
        assert!(matches!(
            CorrelationLengths::new(-1.0, 10.0),
            Err(CovarianceError::InvalidCorrelationLength { axis: "horizontal", .. })
        ));
        assert!(matches!(
            CorrelationLengths::new(1.0, f64::NAN),
            Err(CovarianceError::InvalidCorrelationLength { axis: "vertical", .. })
        ));
    }

    #[test]
    fn unknown_parameter_requires_positive_weighting() {
        let loc = Location::new(0.0, 0.0, 6371.0);
        assert!(UnknownParameter::new(PhysicalType::Mu, loc, 1.0).is_ok());
        assert!(matches!(
            UnknownParameter::new(PhysicalType::Mu, loc, 0.0),
            Err(CovarianceError::InvalidWeighting(_))
        ));
    }
}
