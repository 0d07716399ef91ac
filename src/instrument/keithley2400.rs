//! Keithley 2400 SourceMeter driver.
//!
//! The 2400 is both the stimulus and the ammeter of the electrical sweeps:
//! each sweep point programs the source, lets the device settle, then reads
//! back through the sense path. Wire mode (2- or 4-terminal), current
//! compliance, and the current measure range come from
//! [`SourceMeterSettings`] so a device under test is never driven outside
//! its safe region by a stale front-panel setup.

use crate::config::SourceMeterSettings;
use crate::error::Result;
use crate::instrument::{DriverState, Instrument, Scpi, SourceMeter};
use crate::session::InstrumentBus;
use log::{info, warn};
use std::thread;
use std::time::Duration;

/// Compliance and range used on the voltage side when sourcing current.
/// 21 V is the instrument's lowest range that still covers every diode
/// and heater this rig drives.
const VOLTAGE_COMPLIANCE_V: f64 = 21.0;

/// Driver for the Keithley 2400 source measure unit.
pub struct Keithley2400 {
    scpi: Scpi,
    wire_mode: u8,
    compliance_amps: f64,
    measure_current_range: f64,
}

impl Keithley2400 {
    /// Opens the instrument session and reads its identity.
    pub fn new(bus: &dyn InstrumentBus, settings: &SourceMeterSettings) -> Result<Self> {
        let scpi = Scpi::connect(bus, "sourcemeter", &settings.address, settings.timeout())?;
        Ok(Self {
            scpi,
            wire_mode: settings.wire_mode,
            compliance_amps: settings.compliance_amps,
            measure_current_range: settings.measure_current_range,
        })
    }

    /// `*IDN?` reply captured at connect time.
    pub fn identity(&self) -> &str {
        self.scpi.identity()
    }

    /// Pops one entry from the instrument's error queue (`SYST:ERR?`).
    ///
    /// Returns the raw reply, e.g. `0,"No error"`. Useful when a sweep
    /// produced suspicious readings and the log alone does not explain why.
    pub fn system_error(&mut self) -> Result<String> {
        self.scpi.query("SYST:ERR?")
    }

    /// Runs `configure`, reads one value, and always tries to drop the
    /// output again, so a decode failure cannot leave the DUT powered.
    fn measure_with_output<F>(&mut self, configure: F) -> Result<f64>
    where
        F: FnOnce(&mut Scpi) -> Result<()>,
    {
        self.scpi.require_initialized()?;
        configure(&mut self.scpi)?;
        self.scpi.write(":OUTP ON")?;
        let reading = self.scpi.query_f64(":READ?");
        if let Err(err) = self.scpi.write(":OUTP OFF") {
            warn!("'{}' output-off after read failed: {err}", self.scpi.name());
        }
        reading
    }
}

impl Instrument for Keithley2400 {
    fn name(&self) -> &str {
        self.scpi.name()
    }

    fn state(&self) -> DriverState {
        self.scpi.state()
    }

    fn initialize(&mut self) -> Result<()> {
        self.scpi.write("*CLS")?;
        self.scpi.write("*RST")?;
        self.scpi.write(":OUTP OFF")?;
        let sense = if self.wire_mode == 4 { "ON" } else { "OFF" };
        self.scpi.write(&format!(":SYST:RSEN {sense}"))?;
        self.scpi.mark_initialized();
        info!(
            "'{}' initialized: {}-wire sensing, compliance {} A",
            self.name(),
            self.wire_mode,
            self.compliance_amps
        );
        Ok(())
    }

    fn turn_off(&mut self) -> Result<()> {
        self.scpi.write(":OUTP OFF")
    }

    fn close(&mut self) -> Result<()> {
        if self.scpi.state() != DriverState::Closed {
            if let Err(err) = self.turn_off() {
                warn!("'{}' output-off during close failed: {err}", self.name());
            }
        }
        self.scpi.close()
    }
}

impl SourceMeter for Keithley2400 {
    fn source_voltage_read_current(
        &mut self,
        volts: f64,
        source_range: f64,
        delay: Duration,
    ) -> Result<f64> {
        self.scpi.require_initialized()?;
        self.scpi.write(":SOUR:FUNC VOLT")?;
        self.scpi.write(":SOUR:VOLT:MODE FIXED")?;
        self.scpi.write(&format!(":SOUR:VOLT:RANG {source_range}"))?;
        self.scpi.write(&format!(":SOUR:VOLT:LEV {volts}"))?;
        self.scpi
            .write(&format!(":SENS:CURR:PROT {}", self.compliance_amps))?;
        self.scpi.write(":SENS:FUNC \"CURR\"")?;
        self.scpi
            .write(&format!(":SENS:CURR:RANG {}", self.measure_current_range))?;
        self.scpi.write(":FORM:ELEM CURR")?;
        self.scpi.write(":OUTP ON")?;
        thread::sleep(delay);
        self.scpi.query_f64(":READ?")
    }

    fn source_current_read_voltage(
        &mut self,
        amps: f64,
        source_range: f64,
        delay: Duration,
    ) -> Result<f64> {
        self.scpi.require_initialized()?;
        self.scpi.write(":SOUR:FUNC CURR")?;
        self.scpi.write(":SOUR:CURR:MODE FIXED")?;
        self.scpi.write(&format!(":SOUR:CURR:RANG {source_range}"))?;
        self.scpi.write(&format!(":SOUR:CURR:LEV {amps}"))?;
        self.scpi
            .write(&format!(":SENS:VOLT:PROT {VOLTAGE_COMPLIANCE_V}"))?;
        self.scpi.write(":SENS:FUNC \"VOLT\"")?;
        self.scpi
            .write(&format!(":SENS:VOLT:RANG {VOLTAGE_COMPLIANCE_V}"))?;
        self.scpi.write(":FORM:ELEM VOLT")?;
        self.scpi.write(":OUTP ON")?;
        thread::sleep(delay);
        self.scpi.query_f64(":READ?")
    }

    fn read_resistance(&mut self) -> Result<f64> {
        self.measure_with_output(|scpi| {
            scpi.write(":SENS:FUNC \"RES\"")?;
            scpi.write(":SENS:RES:MODE AUTO")?;
            scpi.write(":SENS:RES:RANG:AUTO ON")?;
            scpi.write(":FORM:ELEM RES")
        })
    }

    fn read_resistance_manual(&mut self, range_ohms: f64) -> Result<f64> {
        self.measure_with_output(move |scpi| {
            scpi.write(":SENS:FUNC \"RES\"")?;
            scpi.write(":SENS:RES:MODE AUTO")?;
            scpi.write(&format!(":SENS:RES:RANG {range_ohms}"))?;
            scpi.write(":FORM:ELEM RES")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MockBus;

    fn settings() -> SourceMeterSettings {
        SourceMeterSettings {
            address: "GPIB0::24::INSTR".into(),
            wire_mode: 2,
            compliance_amps: 0.01,
            measure_current_range: 0.001,
            timeout_ms: 1000,
        }
    }

    #[test]
    fn initialize_resets_and_selects_wire_mode() {
        let bus = MockBus::new();
        let mut smu = Keithley2400::new(&bus, &settings()).unwrap();
        smu.initialize().unwrap();
        let commands = bus.commands_for("sourcemeter");
        assert_eq!(
            commands,
            vec!["*IDN?", "*OPT?", "*CLS", "*RST", ":OUTP OFF", ":SYST:RSEN OFF"]
        );

        let mut four_wire = settings();
        four_wire.wire_mode = 4;
        let bus = MockBus::new();
        let mut smu = Keithley2400::new(&bus, &four_wire).unwrap();
        smu.initialize().unwrap();
        assert!(bus
            .commands_for("sourcemeter")
            .contains(&":SYST:RSEN ON".to_string()));
    }

    #[test]
    fn voltage_point_programs_source_then_reads() {
        let bus = MockBus::new().with_reply(":READ?", "2.5E-4");
        let mut smu = Keithley2400::new(&bus, &settings()).unwrap();
        smu.initialize().unwrap();

        let amps = smu
            .source_voltage_read_current(0.75, 1.25, Duration::ZERO)
            .unwrap();
        assert_eq!(amps, 2.5e-4);

        let commands = bus.commands_for("sourcemeter");
        let point: Vec<&str> = commands.iter().skip(6).map(String::as_str).collect();
        assert_eq!(
            point,
            vec![
                ":SOUR:FUNC VOLT",
                ":SOUR:VOLT:MODE FIXED",
                ":SOUR:VOLT:RANG 1.25",
                ":SOUR:VOLT:LEV 0.75",
                ":SENS:CURR:PROT 0.01",
                ":SENS:FUNC \"CURR\"",
                ":SENS:CURR:RANG 0.001",
                ":FORM:ELEM CURR",
                ":OUTP ON",
                ":READ?",
            ]
        );
    }

    #[test]
    fn current_point_clamps_voltage_side_to_21v() {
        let bus = MockBus::new().with_reply(":READ?", "1.8");
        let mut smu = Keithley2400::new(&bus, &settings()).unwrap();
        smu.initialize().unwrap();

        let volts = smu
            .source_current_read_voltage(0.002, 0.01, Duration::ZERO)
            .unwrap();
        assert_eq!(volts, 1.8);

        let commands = bus.commands_for("sourcemeter");
        assert!(commands.contains(&":SENS:VOLT:PROT 21".to_string()));
        assert!(commands.contains(&":SENS:VOLT:RANG 21".to_string()));
    }

    #[test]
    fn resistance_read_drops_output_even_on_failure() {
        let bus = MockBus::new();
        bus.fail_matching(":READ?");
        let mut smu = Keithley2400::new(&bus, &settings()).unwrap();
        smu.initialize().unwrap();

        assert!(smu.read_resistance().is_err());
        let commands = bus.commands_for("sourcemeter");
        assert_eq!(commands.last().map(String::as_str), Some(":OUTP OFF"));
    }

    #[test]
    fn manual_resistance_range_is_forwarded() {
        let bus = MockBus::new().with_reply(":READ?", "997.4");
        let mut smu = Keithley2400::new(&bus, &settings()).unwrap();
        smu.initialize().unwrap();

        assert_eq!(smu.read_resistance_manual(1000.0).unwrap(), 997.4);
        assert!(bus
            .commands_for("sourcemeter")
            .contains(&":SENS:RES:RANG 1000".to_string()));
    }

    #[test]
    fn sourcing_before_initialize_fails() {
        let bus = MockBus::new();
        let mut smu = Keithley2400::new(&bus, &settings()).unwrap();
        assert!(smu
            .source_voltage_read_current(0.1, 1.0, Duration::ZERO)
            .is_err());
    }

    #[test]
    fn system_error_returns_the_raw_queue_entry() {
        let bus = MockBus::new().with_reply("SYST:ERR?", "-113,\"Undefined header\"");
        let mut smu = Keithley2400::new(&bus, &settings()).unwrap();
        assert_eq!(smu.system_error().unwrap(), "-113,\"Undefined header\"");
    }
}
