//! In-process stand-ins for the bench instruments.
//!
//! These drivers keep the full lifecycle contract of the real hardware but
//! answer from fixtures, so sweeps and the binary's `--mock` mode run
//! without a VISA stack. Builders shape the synthetic device: a flat
//! fixture, a spectrum function for wavelength sweeps, an I-V curve for the
//! electrical sweeps, and optional seeded noise when a plot should look
//! like a real trace instead of a ruler line.

use crate::error::{Error, Result};
use crate::instrument::{DriverState, Instrument, LaserSource, PowerMeter, SourceMeter};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

/// Reading reported by the power meter while the laser is off.
const DARK_FLOOR_DBM: f64 = -90.0;

fn require_initialized(name: &str, state: DriverState) -> Result<()> {
    if state == DriverState::Initialized {
        Ok(())
    } else {
        Err(Error::InvalidState {
            instrument: name.to_string(),
            state: state.as_str(),
        })
    }
}

// ===== Lightwave =====

/// Mock lightwave mainframe: tunable laser plus power meter in one unit.
pub struct MockLightwave {
    state: DriverState,
    wavelength_nm: f64,
    emitting: bool,
    fixture_dbm: f64,
    spectrum: Option<Box<dyn Fn(f64) -> f64 + Send>>,
    noise: Option<(StdRng, f64)>,
    set_wavelength_calls: usize,
    measure_calls: usize,
}

impl Default for MockLightwave {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLightwave {
    /// Fresh uninitialized mock parked at 1550 nm.
    pub fn new() -> Self {
        Self {
            state: DriverState::Uninitialized,
            wavelength_nm: 1550.0,
            emitting: false,
            fixture_dbm: -30.0,
            spectrum: None,
            noise: None,
            set_wavelength_calls: 0,
            measure_calls: 0,
        }
    }

    /// Flat power reading used when no spectrum function is set.
    pub fn with_fixture_dbm(mut self, dbm: f64) -> Self {
        self.fixture_dbm = dbm;
        self
    }

    /// Power as a function of the last programmed wavelength.
    pub fn with_spectrum<F>(mut self, spectrum: F) -> Self
    where
        F: Fn(f64) -> f64 + Send + 'static,
    {
        self.spectrum = Some(Box::new(spectrum));
        self
    }

    /// Adds seeded uniform noise of the given amplitude to every reading.
    pub fn with_noise(mut self, seed: u64, amplitude_db: f64) -> Self {
        self.noise = Some((StdRng::seed_from_u64(seed), amplitude_db));
        self
    }

    /// Last programmed wavelength.
    pub fn wavelength_nm(&self) -> f64 {
        self.wavelength_nm
    }

    /// How many times the wavelength was programmed.
    pub fn set_wavelength_calls(&self) -> usize {
        self.set_wavelength_calls
    }

    /// How many power readings were taken.
    pub fn measure_calls(&self) -> usize {
        self.measure_calls
    }
}

impl Instrument for MockLightwave {
    fn name(&self) -> &str {
        "lightwave"
    }

    fn state(&self) -> DriverState {
        self.state
    }

    fn initialize(&mut self) -> Result<()> {
        self.state = DriverState::Initialized;
        self.emitting = true;
        Ok(())
    }

    fn turn_off(&mut self) -> Result<()> {
        require_initialized(self.name(), self.state)?;
        self.emitting = false;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.emitting = false;
        self.state = DriverState::Closed;
        Ok(())
    }
}

impl LaserSource for MockLightwave {
    fn set_wavelength(&mut self, nm: f64) -> Result<()> {
        require_initialized(self.name(), self.state)?;
        self.wavelength_nm = nm;
        self.set_wavelength_calls += 1;
        Ok(())
    }
}

impl PowerMeter for MockLightwave {
    fn measure_power(&mut self) -> Result<f64> {
        require_initialized(self.name(), self.state)?;
        self.measure_calls += 1;
        if !self.emitting {
            return Ok(DARK_FLOOR_DBM);
        }
        let mut dbm = match &self.spectrum {
            Some(spectrum) => spectrum(self.wavelength_nm),
            None => self.fixture_dbm,
        };
        if let Some((rng, amplitude)) = &mut self.noise {
            dbm += rng.gen_range(-*amplitude..=*amplitude);
        }
        Ok(dbm)
    }
}

// ===== Source meter =====

/// Mock source measure unit with a programmable I-V response.
pub struct MockSourceMeter {
    state: DriverState,
    fixture_amps: f64,
    fixture_ohms: f64,
    iv_curve: Option<Box<dyn Fn(f64) -> f64 + Send>>,
    sourced: Vec<f64>,
    output_on: bool,
    read_calls: usize,
}

impl Default for MockSourceMeter {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSourceMeter {
    /// Fresh uninitialized mock with microamp-scale fixtures.
    pub fn new() -> Self {
        Self {
            state: DriverState::Uninitialized,
            fixture_amps: 1.0e-6,
            fixture_ohms: 1.0e3,
            iv_curve: None,
            sourced: Vec::new(),
            output_on: false,
            read_calls: 0,
        }
    }

    /// Flat current reading used when no I-V curve is set.
    pub fn with_fixture_amps(mut self, amps: f64) -> Self {
        self.fixture_amps = amps;
        self
    }

    /// Resistance reported by the resistance reads.
    pub fn with_fixture_ohms(mut self, ohms: f64) -> Self {
        self.fixture_ohms = ohms;
        self
    }

    /// Current as a function of the sourced voltage.
    pub fn with_iv_curve<F>(mut self, curve: F) -> Self
    where
        F: Fn(f64) -> f64 + Send + 'static,
    {
        self.iv_curve = Some(Box::new(curve));
        self
    }

    /// Every level sourced so far, in call order.
    pub fn sourced(&self) -> &[f64] {
        &self.sourced
    }

    /// Whether the simulated output stage is currently driving.
    pub fn output_on(&self) -> bool {
        self.output_on
    }

    /// How many readings were taken.
    pub fn read_calls(&self) -> usize {
        self.read_calls
    }
}

impl Instrument for MockSourceMeter {
    fn name(&self) -> &str {
        "sourcemeter"
    }

    fn state(&self) -> DriverState {
        self.state
    }

    fn initialize(&mut self) -> Result<()> {
        self.state = DriverState::Initialized;
        self.output_on = false;
        Ok(())
    }

    fn turn_off(&mut self) -> Result<()> {
        require_initialized(self.name(), self.state)?;
        self.output_on = false;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.output_on = false;
        self.state = DriverState::Closed;
        Ok(())
    }
}

impl SourceMeter for MockSourceMeter {
    fn source_voltage_read_current(
        &mut self,
        volts: f64,
        _source_range: f64,
        _delay: Duration,
    ) -> Result<f64> {
        require_initialized(self.name(), self.state)?;
        self.sourced.push(volts);
        self.output_on = true;
        self.read_calls += 1;
        Ok(match &self.iv_curve {
            Some(curve) => curve(volts),
            None => self.fixture_amps,
        })
    }

    fn source_current_read_voltage(
        &mut self,
        amps: f64,
        _source_range: f64,
        _delay: Duration,
    ) -> Result<f64> {
        require_initialized(self.name(), self.state)?;
        self.sourced.push(amps);
        self.output_on = true;
        self.read_calls += 1;
        Ok(amps * self.fixture_ohms)
    }

    fn read_resistance(&mut self) -> Result<f64> {
        require_initialized(self.name(), self.state)?;
        self.read_calls += 1;
        Ok(self.fixture_ohms)
    }

    fn read_resistance_manual(&mut self, _range_ohms: f64) -> Result<f64> {
        self.read_resistance()
    }
}
