//! Configuration management.
//!
//! Settings are loaded from a YAML file into typed structs and validated in a
//! single pass before anything touches an instrument. Every violation found by
//! [`Settings::validate`] is collected and reported at once, so a broken config
//! does not fail one field at a time.

use crate::error::{Error, Result};
use crate::sweep::SweepRange;
use serde::Deserialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level settings for one bench run.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Lightwave mainframe (tunable laser + power meter).
    pub lightwave: LightwaveSettings,
    /// Source meter.
    pub sourcemeter: SourceMeterSettings,
    /// Device under test descriptor; used to build output filenames.
    pub dut: DutSettings,
    /// Per-sweep parameter blocks.
    pub sweeps: SweepSettings,
    /// Output directories.
    #[serde(default)]
    pub output: OutputSettings,
}

/// Connection and slot layout of the lightwave mainframe.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct LightwaveSettings {
    /// VISA resource address, e.g. `GPIB0::20::INSTR`.
    pub address: String,
    /// Mainframe slot holding the tunable laser source.
    #[serde(default = "default_laser_slot")]
    pub laser_slot: u8,
    /// Mainframe slot holding the power-meter head.
    #[serde(default = "default_power_slot")]
    pub power_slot: u8,
    /// Power-meter channel within its slot.
    #[serde(default = "default_channel")]
    pub power_channel: u8,
    /// Link timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

/// Connection and measurement limits of the source meter.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SourceMeterSettings {
    /// VISA resource address, e.g. `GPIB0::24::INSTR`.
    pub address: String,
    /// Sense wiring: 2 (local) or 4 (remote/Kelvin).
    #[serde(default = "default_wire_mode")]
    pub wire_mode: u8,
    /// Current compliance limit in amps while sourcing voltage.
    #[serde(default = "default_compliance_amps")]
    pub compliance_amps: f64,
    /// Fixed current measurement range in amps.
    #[serde(default = "default_measure_current_range")]
    pub measure_current_range: f64,
    /// Link timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

/// Identity of the device under test.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct DutSettings {
    /// Device family, e.g. `ring` or `mzi`.
    pub device_type: String,
    /// Specific device label, e.g. `R1C4`.
    pub device_name: String,
}

/// Parameter blocks for each sweep kind.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SweepSettings {
    /// Wavelength sweep of the laser against the power meter.
    pub laser: LaserSweepSettings,
    /// Voltage sweep against measured current.
    pub iv: IvSweepSettings,
    /// Combined voltage sweep with optical readback.
    #[serde(default)]
    pub liv: LivSweepSettings,
}

/// Wavelength sweep parameters.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct LaserSweepSettings {
    pub start_nm: f64,
    pub stop_nm: f64,
    pub step_nm: f64,
    /// Settling wait between tuning and readback, in seconds.
    #[serde(default = "default_delay_s")]
    pub delay_s: f64,
}

/// IV sweep parameters.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct IvSweepSettings {
    pub start_v: f64,
    pub stop_v: f64,
    pub step_v: f64,
    /// Settling wait between sourcing and readback, in seconds.
    #[serde(default = "default_delay_s")]
    pub delay_s: f64,
}

/// LIV sweep parameters. The voltage range is shared with the IV block.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct LivSweepSettings {
    /// Laser wavelength held for the whole sweep, in nanometers.
    #[serde(default = "default_center_wavelength_nm")]
    pub center_wavelength_nm: f64,
    /// Extra wait before each optical power readback, in seconds.
    #[serde(default = "default_delay_s")]
    pub power_delay_s: f64,
}

impl Default for LivSweepSettings {
    fn default() -> Self {
        Self {
            center_wavelength_nm: default_center_wavelength_nm(),
            power_delay_s: default_delay_s(),
        }
    }
}

/// Where results and plots land.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct OutputSettings {
    /// Directory for CSV results.
    #[serde(default = "default_results_dir")]
    pub results_dir: PathBuf,
    /// Directory for rendered plots.
    #[serde(default = "default_plots_dir")]
    pub plots_dir: PathBuf,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            results_dir: default_results_dir(),
            plots_dir: default_plots_dir(),
        }
    }
}

fn default_laser_slot() -> u8 {
    1
}
fn default_power_slot() -> u8 {
    2
}
fn default_channel() -> u8 {
    1
}
fn default_timeout_ms() -> u64 {
    5000
}
fn default_wire_mode() -> u8 {
    2
}
fn default_compliance_amps() -> f64 {
    0.01
}
fn default_measure_current_range() -> f64 {
    1.0e-3
}
fn default_delay_s() -> f64 {
    0.1
}
fn default_center_wavelength_nm() -> f64 {
    1550.0
}
fn default_results_dir() -> PathBuf {
    PathBuf::from("data/raw")
}
fn default_plots_dir() -> PathBuf {
    PathBuf::from("plots")
}

impl Settings {
    /// Loads and validates settings from a YAML file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                Error::ConfigNotFound {
                    path: path.to_path_buf(),
                }
            } else {
                Error::Io(err)
            }
        })?;
        let settings: Settings =
            serde_yaml::from_str(&raw).map_err(|source| Error::ConfigParse {
                path: path.to_path_buf(),
                source,
            })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Checks every field constraint and reports all violations together.
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        check_address(&mut problems, "lightwave.address", &self.lightwave.address);
        check_address(
            &mut problems,
            "sourcemeter.address",
            &self.sourcemeter.address,
        );

        if self.lightwave.laser_slot == 0 {
            problems.push("lightwave.laser_slot: slots are numbered from 1".into());
        }
        if self.lightwave.power_slot == 0 {
            problems.push("lightwave.power_slot: slots are numbered from 1".into());
        }
        if self.lightwave.power_channel == 0 {
            problems.push("lightwave.power_channel: channels are numbered from 1".into());
        }
        if self.lightwave.timeout_ms == 0 {
            problems.push("lightwave.timeout_ms: must be positive".into());
        }

        if !matches!(self.sourcemeter.wire_mode, 2 | 4) {
            problems.push(format!(
                "sourcemeter.wire_mode: must be 2 or 4, got {}",
                self.sourcemeter.wire_mode
            ));
        }
        check_positive(
            &mut problems,
            "sourcemeter.compliance_amps",
            self.sourcemeter.compliance_amps,
        );
        check_positive(
            &mut problems,
            "sourcemeter.measure_current_range",
            self.sourcemeter.measure_current_range,
        );
        if self.sourcemeter.timeout_ms == 0 {
            problems.push("sourcemeter.timeout_ms: must be positive".into());
        }

        check_name(&mut problems, "dut.device_type", &self.dut.device_type);
        check_name(&mut problems, "dut.device_name", &self.dut.device_name);

        check_range(&mut problems, "sweeps.laser", self.laser_range());
        check_delay(&mut problems, "sweeps.laser.delay_s", self.sweeps.laser.delay_s);
        check_range(&mut problems, "sweeps.iv", self.iv_range());
        check_delay(&mut problems, "sweeps.iv.delay_s", self.sweeps.iv.delay_s);
        check_positive(
            &mut problems,
            "sweeps.liv.center_wavelength_nm",
            self.sweeps.liv.center_wavelength_nm,
        );
        check_delay(
            &mut problems,
            "sweeps.liv.power_delay_s",
            self.sweeps.liv.power_delay_s,
        );

        if self.output.results_dir.as_os_str().is_empty() {
            problems.push("output.results_dir: must not be empty".into());
        }
        if self.output.plots_dir.as_os_str().is_empty() {
            problems.push("output.plots_dir: must not be empty".into());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(Error::ConfigInvalid { problems })
        }
    }

    /// Wavelength sweep range from the laser block.
    pub fn laser_range(&self) -> SweepRange {
        SweepRange {
            start: self.sweeps.laser.start_nm,
            stop: self.sweeps.laser.stop_nm,
            step: self.sweeps.laser.step_nm,
        }
    }

    /// Voltage sweep range from the IV block (also used by LIV).
    pub fn iv_range(&self) -> SweepRange {
        SweepRange {
            start: self.sweeps.iv.start_v,
            stop: self.sweeps.iv.stop_v,
            step: self.sweeps.iv.step_v,
        }
    }
}

impl LightwaveSettings {
    /// Link timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl SourceMeterSettings {
    /// Link timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl LaserSweepSettings {
    /// Settling delay as a [`Duration`].
    pub fn delay(&self) -> Duration {
        Duration::from_secs_f64(self.delay_s.max(0.0))
    }
}

impl IvSweepSettings {
    /// Settling delay as a [`Duration`].
    pub fn delay(&self) -> Duration {
        Duration::from_secs_f64(self.delay_s.max(0.0))
    }
}

impl LivSweepSettings {
    /// Optical readback delay as a [`Duration`].
    pub fn power_delay(&self) -> Duration {
        Duration::from_secs_f64(self.power_delay_s.max(0.0))
    }
}

fn check_address(problems: &mut Vec<String>, field: &str, address: &str) {
    if address.trim().is_empty() {
        problems.push(format!("{field}: must not be empty"));
    } else if !address.contains("::") {
        problems.push(format!(
            "{field}: '{address}' does not look like a VISA resource (expected e.g. GPIB0::20::INSTR)"
        ));
    }
}

fn check_name(problems: &mut Vec<String>, field: &str, name: &str) {
    if name.trim().is_empty() {
        problems.push(format!("{field}: must not be empty"));
    } else if name.contains('/') || name.contains('\\') {
        problems.push(format!(
            "{field}: '{name}' must not contain path separators (it becomes part of a filename)"
        ));
    }
}

fn check_positive(problems: &mut Vec<String>, field: &str, value: f64) {
    if !value.is_finite() || value <= 0.0 {
        problems.push(format!("{field}: must be a positive number, got {value}"));
    }
}

fn check_delay(problems: &mut Vec<String>, field: &str, value: f64) {
    if !value.is_finite() || value < 0.0 {
        problems.push(format!(
            "{field}: must be zero or a positive number of seconds, got {value}"
        ));
    }
}

fn check_range(problems: &mut Vec<String>, field: &str, range: SweepRange) {
    if let Err(err) = range.validate() {
        problems.push(format!("{field}: {err}"));
    }
}
