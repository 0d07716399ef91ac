//! Tests for YAML settings loading and one-pass validation.

use photonbench::config::Settings;
use photonbench::error::Error;
use tempfile::TempDir;

const VALID: &str = r#"
lightwave:
  address: "GPIB0::20::INSTR"
  laser_slot: 1
  power_slot: 2
  power_channel: 1
  timeout_ms: 5000
sourcemeter:
  address: "GPIB0::24::INSTR"
  wire_mode: 4
  compliance_amps: 0.01
  measure_current_range: 1.0e-3
  timeout_ms: 5000
dut:
  device_type: "ring"
  device_name: "R1C4"
sweeps:
  laser:
    start_nm: 1545.0
    stop_nm: 1555.0
    step_nm: 0.05
    delay_s: 0.1
  iv:
    start_v: 0.0
    stop_v: 1.0
    step_v: 0.25
    delay_s: 0.1
  liv:
    center_wavelength_nm: 1550.0
    power_delay_s: 0.1
output:
  results_dir: "data/raw"
  plots_dir: "plots"
"#;

fn write_config(dir: &TempDir, yaml: &str) -> std::path::PathBuf {
    let path = dir.path().join("settings.yaml");
    std::fs::write(&path, yaml).unwrap();
    path
}

#[test]
fn test_load_valid_settings_from_file() {
    let dir = TempDir::new().unwrap();
    let settings = Settings::from_path(write_config(&dir, VALID)).unwrap();

    assert_eq!(settings.lightwave.address, "GPIB0::20::INSTR");
    assert_eq!(settings.sourcemeter.wire_mode, 4);
    assert_eq!(settings.dut.device_name, "R1C4");
    assert_eq!(settings.laser_range().step, 0.05);
    assert_eq!(settings.iv_range().stop, 1.0);
}

#[test]
fn test_loading_twice_yields_equal_settings() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, VALID);
    assert_eq!(
        Settings::from_path(&path).unwrap(),
        Settings::from_path(&path).unwrap()
    );
}

#[test]
fn test_missing_file_reports_its_path() {
    let err = Settings::from_path("no/such/settings.yaml").unwrap_err();
    assert!(matches!(err, Error::ConfigNotFound { .. }));
    assert!(err.to_string().contains("no/such/settings.yaml"));
}

#[test]
fn test_malformed_yaml_is_a_parse_error() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "lightwave: [unclosed\n");
    let err = Settings::from_path(path).unwrap_err();
    assert!(matches!(err, Error::ConfigParse { .. }));
}

#[test]
fn test_unknown_top_level_key_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, &format!("{VALID}\nlock_in: {{}}\n"));
    let err = Settings::from_path(path).unwrap_err();
    assert!(matches!(err, Error::ConfigParse { .. }));
}

#[test]
fn test_unknown_nested_key_rejected() {
    // The appended key lands inside the trailing `output` block.
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, &format!("{VALID}  archive_dir: \"old\"\n"));
    assert!(Settings::from_path(path).is_err());
}

#[test]
fn test_every_violation_reported_together() {
    let broken = VALID
        .replace("wire_mode: 4", "wire_mode: 3")
        .replace("step_v: 0.25", "step_v: 0.0")
        .replace("device_name: \"R1C4\"", "device_name: \"R1/C4\"")
        .replace("power_channel: 1", "power_channel: 0");

    let dir = TempDir::new().unwrap();
    let err = Settings::from_path(write_config(&dir, &broken)).unwrap_err();

    match &err {
        Error::ConfigInvalid { problems } => assert_eq!(problems.len(), 4),
        other => panic!("expected ConfigInvalid, got {other}"),
    }
    let text = err.to_string();
    assert!(text.contains("sourcemeter.wire_mode"));
    assert!(text.contains("sweeps.iv"));
    assert!(text.contains("dut.device_name"));
    assert!(text.contains("lightwave.power_channel"));
}

#[test]
fn test_defaults_fill_omitted_fields() {
    let minimal = r#"
lightwave:
  address: "GPIB0::20::INSTR"
sourcemeter:
  address: "GPIB0::24::INSTR"
dut:
  device_type: "mzi"
  device_name: "M3"
sweeps:
  laser:
    start_nm: 1549.0
    stop_nm: 1551.0
    step_nm: 0.02
  iv:
    start_v: 0.0
    stop_v: 0.5
    step_v: 0.1
"#;
    let dir = TempDir::new().unwrap();
    let settings = Settings::from_path(write_config(&dir, minimal)).unwrap();

    assert_eq!(settings.lightwave.laser_slot, 1);
    assert_eq!(settings.lightwave.power_slot, 2);
    assert_eq!(settings.sourcemeter.wire_mode, 2);
    assert_eq!(settings.sourcemeter.compliance_amps, 0.01);
    assert_eq!(settings.sweeps.liv.center_wavelength_nm, 1550.0);
    assert_eq!(settings.output.plots_dir.to_str(), Some("plots"));
}

#[test]
fn test_zero_step_alone_is_rejected() {
    let broken = VALID.replace("step_nm: 0.05", "step_nm: 0.0");
    let dir = TempDir::new().unwrap();
    let err = Settings::from_path(write_config(&dir, &broken)).unwrap_err();
    assert!(err.to_string().contains("sweeps.laser"));
}

#[test]
fn test_sign_mismatched_range_is_rejected() {
    let broken = VALID.replace("stop_v: 1.0", "stop_v: -1.0");
    let dir = TempDir::new().unwrap();
    let err = Settings::from_path(write_config(&dir, &broken)).unwrap_err();
    assert!(err.to_string().contains("never reaches stop"));
}

#[test]
fn test_shipped_default_config_is_valid() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/default.yaml");
    let settings = Settings::from_path(path).unwrap();
    assert_eq!(settings.sweeps.laser.step_nm, 0.05);
    assert_eq!(settings.sourcemeter.wire_mode, 2);
}
