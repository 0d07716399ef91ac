//! Agilent 8163 Lightwave mainframe driver.
//!
//! One mainframe carries both roles used by the optical sweeps: a tunable
//! laser module in one slot and a power-meter head in another, reached over
//! a single GPIB session. The driver therefore implements [`LaserSource`]
//! and [`PowerMeter`] on the same type, and the wavelength sweep takes it
//! once under both bounds.

use crate::config::LightwaveSettings;
use crate::error::Result;
use crate::instrument::{DriverState, Instrument, LaserSource, PowerMeter, Scpi};
use crate::session::InstrumentBus;
use log::{info, warn};

/// Driver for the Agilent 8163 Lightwave multimeter mainframe.
pub struct Agilent8163 {
    scpi: Scpi,
    laser_slot: u8,
    power_slot: u8,
    power_channel: u8,
}

impl Agilent8163 {
    /// Opens the mainframe session and reads its identity.
    pub fn new(bus: &dyn InstrumentBus, settings: &LightwaveSettings) -> Result<Self> {
        let scpi = Scpi::connect(bus, "lightwave", &settings.address, settings.timeout())?;
        Ok(Self {
            scpi,
            laser_slot: settings.laser_slot,
            power_slot: settings.power_slot,
            power_channel: settings.power_channel,
        })
    }

    /// `*IDN?` reply captured at connect time.
    pub fn identity(&self) -> &str {
        self.scpi.identity()
    }

    /// Installed-options string (`*OPT?`), useful to confirm slot layout.
    pub fn options(&self) -> &str {
        self.scpi.options()
    }
}

impl Instrument for Agilent8163 {
    fn name(&self) -> &str {
        self.scpi.name()
    }

    fn state(&self) -> DriverState {
        self.scpi.state()
    }

    fn initialize(&mut self) -> Result<()> {
        self.scpi.write("*CLS")?;
        let command = format!("sour{}:pow:stat 1", self.laser_slot);
        self.scpi.write(&command)?;
        self.scpi.mark_initialized();
        info!(
            "'{}' initialized: laser in slot {} emitting",
            self.name(),
            self.laser_slot
        );
        Ok(())
    }

    fn turn_off(&mut self) -> Result<()> {
        let command = format!("sour{}:pow:stat 0", self.laser_slot);
        self.scpi.write(&command)
    }

    fn close(&mut self) -> Result<()> {
        if self.scpi.state() != DriverState::Closed {
            if let Err(err) = self.turn_off() {
                warn!("'{}' laser-off during close failed: {err}", self.name());
            }
        }
        self.scpi.close()
    }
}

impl LaserSource for Agilent8163 {
    fn set_wavelength(&mut self, nm: f64) -> Result<()> {
        self.scpi.require_initialized()?;
        let command = format!("sour{}:wav {}NM", self.laser_slot, nm);
        self.scpi.write(&command)
    }
}

impl PowerMeter for Agilent8163 {
    fn measure_power(&mut self) -> Result<f64> {
        self.scpi.require_initialized()?;
        let command = format!("fetch{}:chan{}:pow?", self.power_slot, self.power_channel);
        self.scpi.query_f64(&command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MockBus;

    fn settings() -> LightwaveSettings {
        LightwaveSettings {
            address: "GPIB0::20::INSTR".into(),
            laser_slot: 1,
            power_slot: 2,
            power_channel: 1,
            timeout_ms: 1000,
        }
    }

    #[test]
    fn initialize_clears_status_and_enables_emission() {
        let bus = MockBus::new();
        let mut lightwave = Agilent8163::new(&bus, &settings()).unwrap();
        lightwave.initialize().unwrap();
        let commands = bus.commands_for("lightwave");
        assert_eq!(
            commands,
            vec!["*IDN?", "*OPT?", "*CLS", "sour1:pow:stat 1"]
        );
        assert_eq!(lightwave.state(), DriverState::Initialized);
    }

    #[test]
    fn wavelength_and_power_commands_use_configured_slots() {
        let bus = MockBus::new().with_reply("fetch2:chan1:pow?", "-42.5");
        let mut lightwave = Agilent8163::new(&bus, &settings()).unwrap();
        lightwave.initialize().unwrap();

        lightwave.set_wavelength(1550.25).unwrap();
        assert_eq!(lightwave.measure_power().unwrap(), -42.5);

        let commands = bus.commands_for("lightwave");
        assert!(commands.contains(&"sour1:wav 1550.25NM".to_string()));
        assert!(commands.contains(&"fetch2:chan1:pow?".to_string()));
    }

    #[test]
    fn measurement_before_initialize_fails() {
        let bus = MockBus::new();
        let mut lightwave = Agilent8163::new(&bus, &settings()).unwrap();
        assert!(lightwave.measure_power().is_err());
        assert!(lightwave.set_wavelength(1550.0).is_err());
    }

    #[test]
    fn close_turns_the_laser_off_first() {
        let bus = MockBus::new();
        let mut lightwave = Agilent8163::new(&bus, &settings()).unwrap();
        lightwave.initialize().unwrap();
        lightwave.close().unwrap();

        let commands = bus.commands_for("lightwave");
        assert_eq!(commands.last().map(String::as_str), Some("sour1:pow:stat 0"));
        assert!(lightwave.measure_power().is_err());
        // A second close stays quiet.
        lightwave.close().unwrap();
        assert_eq!(bus.commands_for("lightwave").len(), commands.len());
    }
}
