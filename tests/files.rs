use approx::assert_abs_diff_eq;
use std::f64::consts::PI;
use std::fs;
use std::path::Path;
use tempfile::tempdir;
use tomocov::config::CorrelationConfig;
use tomocov::io::{read_sensitivity_file, read_unknown_parameters};
use tomocov::weights::{Amplitude, RadialEmphasis, TypeReference, sensitivity_weight};
use tomocov::{CovarianceConfig, ErrorKind, ModelCovariance, PhysicalType, WeightPolicy};

const PARAMETERS: &str = "\
# type  lat  lon  radius  weighting
MU      0    0    6371    1
MU      1    0    6371    1
MU      0    1    5671    1
KAPPA   0    0    6371    1
KAPPA   1    0    3480    1
";

const SENSITIVITIES: &str = "\
MU      0    0    6371    0.5
MU      1    0    6371    1
MU      0    1    5671    100
KAPPA   0    0    6371    0.01
KAPPA   1    0    3480    2
";

fn write(dir: &Path, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

fn config(weights: WeightPolicy) -> CovarianceConfig {
    CovarianceConfig {
        correlation: CorrelationConfig {
            horizontal_deg: 2.0,
            vertical_km: 300.0,
        },
        weights,
        ..CovarianceConfig::default()
    }
}

#[test]
fn sensitivity_weights_flow_into_the_diagonal() {
    let dir = tempdir().unwrap();
    let parameters = read_unknown_parameters(&write(dir.path(), "unknowns.txt", PARAMETERS)).unwrap();
    let sensitivities =
        read_sensitivity_file(&write(dir.path(), "sensitivity.txt", SENSITIVITIES)).unwrap();

    let cov = ModelCovariance::from_config(
        &parameters,
        &config(WeightPolicy::Sensitivity { normalize: false }),
        Some(&sensitivities),
    )
    .unwrap();

    let expected = [2.0, 1.0, 1.0 / 3.0, 3.0, 0.5];
    for (i, want) in expected.iter().enumerate() {
        assert_abs_diff_eq!(cov.covariance()[(i, i)], *want, epsilon = 1e-12);
        assert_abs_diff_eq!(
            cov.pre_weights()[i],
            sensitivity_weight(sensitivities[i].sensitivity),
            epsilon = 1e-15
        );
    }
}

#[test]
fn normalized_sensitivity_weights_divide_by_the_kernel_integral() {
    let dir = tempdir().unwrap();
    let parameters = read_unknown_parameters(&write(dir.path(), "unknowns.txt", PARAMETERS)).unwrap();
    let sensitivities =
        read_sensitivity_file(&write(dir.path(), "sensitivity.txt", SENSITIVITIES)).unwrap();

    let cov = ModelCovariance::from_config(
        &parameters,
        &config(WeightPolicy::Sensitivity { normalize: true }),
        Some(&sensitivities),
    )
    .unwrap();

    let raw: Vec<f64> = sensitivities
        .iter()
        .map(|s| sensitivity_weight(s.sensitivity))
        .collect();
    let mean = raw.iter().sum::<f64>() / raw.len() as f64;
    for (i, w) in raw.iter().enumerate() {
        assert_abs_diff_eq!(
            cov.pre_weights()[i],
            w / mean / (PI.sqrt() * 2.0),
            epsilon = 1e-14
        );
    }
}

#[test]
fn kernel_integral_weights_use_per_type_references() {
    let dir = tempdir().unwrap();
    let parameters = read_unknown_parameters(&write(dir.path(), "unknowns.txt", PARAMETERS)).unwrap();
    let policy = WeightPolicy::KernelIntegral {
        amplitude: Amplitude::PerType {
            base: 1.0,
            references: vec![
                TypeReference {
                    physical_type: PhysicalType::Mu,
                    value: 0.25,
                },
                TypeReference {
                    physical_type: PhysicalType::Kappa,
                    value: 4.0,
                },
            ],
        },
        radial: RadialEmphasis::TransitionZone,
    };
    let cov = ModelCovariance::from_config(&parameters, &config(policy), None).unwrap();

    // Unknowns 2 and 4 sit at 700 km and 2891 km depth.
    let emphasized = [1.0, 1.0, 1.2248, 1.0, 1.2248];
    let mean = emphasized.iter().sum::<f64>() / 5.0;
    let amplitude: [f64; 5] = [4.0, 4.0, 4.0, 0.25, 0.25];
    for i in 0..5 {
        let want = emphasized[i] / mean / (PI.sqrt() * 2.0) * amplitude[i].sqrt();
        assert_abs_diff_eq!(cov.pre_weights()[i], want, epsilon = 1e-14);
    }
}

#[test]
fn missing_reference_amplitude_is_an_invalid_argument() {
    let dir = tempdir().unwrap();
    let parameters = read_unknown_parameters(&write(dir.path(), "unknowns.txt", PARAMETERS)).unwrap();
    let policy = WeightPolicy::KernelIntegral {
        amplitude: Amplitude::PerType {
            base: 1.0,
            references: vec![TypeReference {
                physical_type: PhysicalType::Mu,
                value: 0.25,
            }],
        },
        radial: RadialEmphasis::None,
    };
    let err = ModelCovariance::from_config(&parameters, &config(policy), None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test]
fn sensitivity_problems_stop_construction() {
    let dir = tempdir().unwrap();
    let parameters = read_unknown_parameters(&write(dir.path(), "unknowns.txt", PARAMETERS)).unwrap();
    let policy = config(WeightPolicy::Sensitivity { normalize: false });

    let err = ModelCovariance::from_config(&parameters, &policy, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    let short = read_sensitivity_file(&write(
        dir.path(),
        "short.txt",
        "MU 0 0 6371 0.5\nMU 1 0 6371 1\n",
    ))
    .unwrap();
    let err = ModelCovariance::from_config(&parameters, &policy, Some(&short)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);

    let reordered = SENSITIVITIES.replacen("MU      0    0", "LAMBDA  0    0", 1);
    let wrong_type =
        read_sensitivity_file(&write(dir.path(), "wrong.txt", &reordered)).unwrap();
    let err = ModelCovariance::from_config(&parameters, &policy, Some(&wrong_type)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
    assert!(err.to_string().contains("LAMBDA"));
}

#[test]
fn saved_configuration_builds_the_same_operator() {
    let dir = tempdir().unwrap();
    let parameters = read_unknown_parameters(&write(dir.path(), "unknowns.txt", PARAMETERS)).unwrap();
    let original = config(WeightPolicy::KernelIntegral {
        amplitude: Amplitude::Uniform { value: 2.0 },
        radial: RadialEmphasis::LowermostMantle,
    });
    let path = dir.path().join("covariance.toml");
    original.save(&path).unwrap();
    let loaded = CovarianceConfig::load(&path).unwrap();
    assert_eq!(loaded, original);

    let a = ModelCovariance::from_config(&parameters, &original, None).unwrap();
    let b = ModelCovariance::from_config(&parameters, &loaded, None).unwrap();
    assert_eq!(a.covariance(), b.covariance());
    assert_eq!(a.factor(), b.factor());
}
