use std::fs;
use std::process::Command;

use tempfile::tempdir;

#[test]
fn default_config_then_summary() {
    let tmp = tempdir().expect("temporary directory");
    let exe = env!("CARGO_BIN_EXE_tomocov");

    let status = Command::new(exe)
        .current_dir(tmp.path())
        .args(["default-config"])
        .status()
        .expect("run tomocov default-config");
    assert!(status.success(), "CLI exited with status {status:?}");
    let config_path = tmp.path().join("covariance.toml");
    assert!(config_path.exists(), "covariance.toml missing");

    let parameters = tmp.path().join("unknowns.txt");
    fs::write(
        &parameters,
        "MU 0 0 6371 1\nMU 2 0 6371 1\nMU 4 0 6371 1\nLAMBDA 0 0 6371 1\n",
    )
    .expect("write parameters");

    let output = Command::new(exe)
        .current_dir(tmp.path())
        .args([
            "summary",
            parameters.to_str().expect("path str"),
            "--config",
            config_path.to_str().expect("path str"),
            "--horizontal",
            "1.0",
        ])
        .output()
        .expect("run tomocov summary");
    assert!(output.status.success(), "CLI failed: {output:?}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("unknown parameters: 4"), "{stdout}");
    assert!(stdout.contains("MU: 3"), "{stdout}");
}

#[test]
fn duplicated_unknowns_fail_with_an_error_message() {
    let tmp = tempdir().expect("temporary directory");
    let parameters = tmp.path().join("unknowns.txt");
    fs::write(&parameters, "KAPPA 10 10 6000 1\nKAPPA 10 10 6000 1\n").expect("write parameters");

    let output = Command::new(env!("CARGO_BIN_EXE_tomocov"))
        .args(["summary", parameters.to_str().expect("path str")])
        .output()
        .expect("run tomocov summary");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Error:"), "{stderr}");
}
