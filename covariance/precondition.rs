//! Normal equations in the whitened model space.
//!
//! With `m = L·x`, the damped least-squares system `(AᵗA + C⁻¹)·m = Aᵗd`
//! becomes `(Lᵗ·AᵗA·L + I)·x = Lᵗ·Aᵗd`. The solver works on `x` and the model
//! perturbation is recovered as `L·x`.

use crate::error::CovarianceError;
use crate::operator::ModelCovariance;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

/// `Lᵗ·AᵗA·L + I` and `Lᵗ·Aᵗd`.
#[derive(Debug, Clone)]
pub struct PreconditionedSystem {
    pub ata: Array2<f64>,
    pub atd: Array1<f64>,
}

pub fn precondition(
    covariance: &ModelCovariance,
    ata: ArrayView2<f64>,
    atd: ArrayView1<f64>,
) -> Result<PreconditionedSystem, CovarianceError> {
    let ata_l = covariance.right_multiply_by_l(ata)?;
    let mut whitened = covariance.left_multiply_by_lt(ata_l.view())?;
    whitened.diag_mut().mapv_inplace(|v| v + 1.0);
    let whitened_atd = covariance.apply_lt(atd)?;
    log::debug!(
        "Preconditioned normal equations of size {}",
        whitened.nrows()
    );
    Ok(PreconditionedSystem {
        ata: whitened,
        atd: whitened_atd,
    })
}

/// Model perturbation `L·x` for a solution `x` of the preconditioned system.
pub fn recover_model(
    covariance: &ModelCovariance,
    x: ArrayView1<f64>,
) -> Result<Array1<f64>, CovarianceError> {
    covariance.apply_l(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CorrelationLengths, Location, PhysicalType, UnknownParameter};
    use approx::assert_abs_diff_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn grid() -> Vec<UnknownParameter> {
        let mut params = Vec::new();
        for t in [PhysicalType::Mu, PhysicalType::Kappa] {
            for (lat, r) in [(0.0, 6371.0), (1.0, 6371.0), (0.0, 6300.0), (1.5, 6300.0)] {
                params.push(UnknownParameter::new(t, Location::new(lat, 10.0, r), 1.0).unwrap());
            }
        }
        params
    }

    #[test]
    fn matches_dense_whitening() {
        let params = grid();
        let n = params.len();
        let cov = ModelCovariance::new(&params, CorrelationLengths::new(1.0, 100.0).unwrap())
            .unwrap();

        let mut rng = StdRng::seed_from_u64(17);
        let a = Array2::from_shape_fn((12, n), |_| rng.gen_range(-1.0..1.0));
        let d = Array1::from_shape_fn(12, |_| rng.gen_range(-1.0..1.0));
        let ata = a.t().dot(&a);
        let atd = a.t().dot(&d);

        let system = precondition(&cov, ata.view(), atd.view()).unwrap();

        let l = cov.factor();
        let mut expected = l.t().dot(&ata).dot(l);
        for i in 0..n {
            expected[(i, i)] += 1.0;
        }
        for (got, want) in system.ata.iter().zip(expected.iter()) {
            assert_abs_diff_eq!(got, want, epsilon = 1e-10);
        }
        let expected_atd = l.t().dot(&atd);
        for (got, want) in system.atd.iter().zip(expected_atd.iter()) {
            assert_abs_diff_eq!(got, want, epsilon = 1e-10);
        }

        let x = Array1::from_shape_fn(n, |i| i as f64 - 3.0);
        let m = recover_model(&cov, x.view()).unwrap();
        let expected_m = l.dot(&x);
        for (got, want) in m.iter().zip(expected_m.iter()) {
            assert_abs_diff_eq!(got, want, epsilon = 1e-12);
        }
    }

    #[test]
    fn rejects_mismatched_normal_equations() {
        let params = grid();
        let cov = ModelCovariance::new(&params, CorrelationLengths::new(1.0, 0.0).unwrap())
            .unwrap();
        let ata = Array2::<f64>::eye(3);
        let atd = Array1::<f64>::zeros(params.len());
        assert!(matches!(
            precondition(&cov, ata.view(), atd.view()),
            Err(CovarianceError::DimensionMismatch { .. })
        ));
        let ata = Array2::<f64>::eye(params.len());
        let atd = Array1::<f64>::zeros(2);
        assert!(precondition(&cov, ata.view(), atd.view()).is_err());
    }
}
