//! Instrument drivers and the capability traits the sweeps are written
//! against.
//!
//! Each physical instrument model gets one concrete driver type; what a
//! driver can do is expressed through role traits so the sweep controller
//! never names a model:
//!
//! | Trait         | Contract                                   | Implemented by              |
//! |---------------|--------------------------------------------|-----------------------------|
//! | `Instrument`  | lifecycle: initialize / turn_off / close   | every driver                |
//! | `LaserSource` | tune emission wavelength                   | `Agilent8163`, `MockLightwave` |
//! | `PowerMeter`  | read optical power in dBm                  | `Agilent8163`, `MockLightwave` |
//! | `SourceMeter` | source V or I, read the complement, read R | `Keithley2400`, `MockSourceMeter` |
//!
//! Drivers share their command plumbing through composition: each holds a
//! [`Scpi`] core that owns the link, tracks the lifecycle state, and parses
//! numeric replies. The lifecycle is strict: a driver moves uninitialized →
//! initialized → closed, and nothing moves out of closed.

mod agilent8163;
mod keithley2400;
mod mock;
mod scpi;

pub use agilent8163::Agilent8163;
pub use keithley2400::Keithley2400;
pub use mock::{MockLightwave, MockSourceMeter};
pub use scpi::Scpi;

use crate::error::Result;
use std::time::Duration;

/// Driver lifecycle state.
///
/// `initialize()` and `close()` are the only transitions; there is no way
/// back out of [`DriverState::Closed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    /// Link open, instrument identity read, defaults not yet applied.
    Uninitialized,
    /// Known default state applied; measurement methods are allowed.
    Initialized,
    /// Link released; every further use fails fast.
    Closed,
}

impl DriverState {
    /// Lowercase name used in lifecycle errors.
    pub fn as_str(self) -> &'static str {
        match self {
            DriverState::Uninitialized => "uninitialized",
            DriverState::Initialized => "initialized",
            DriverState::Closed => "closed",
        }
    }
}

/// Lifecycle shared by every instrument driver.
pub trait Instrument {
    /// Logical name used in logs and errors.
    fn name(&self) -> &str;

    /// Current lifecycle state.
    fn state(&self) -> DriverState;

    /// Puts the instrument into a known default state (clears status,
    /// resets, applies safe limits). Calling it again while initialized is
    /// permitted and repeats the setup.
    fn initialize(&mut self) -> Result<()>;

    /// Disables any active output. Default no-op for pure meters.
    fn turn_off(&mut self) -> Result<()> {
        Ok(())
    }

    /// Turns outputs off (best effort) and releases the link. Idempotent;
    /// every other method fails once the driver is closed.
    fn close(&mut self) -> Result<()>;
}

/// Tunable laser source role.
pub trait LaserSource: Instrument {
    /// Tunes the emission wavelength, in nanometers.
    fn set_wavelength(&mut self, nm: f64) -> Result<()>;
}

/// Optical power meter role.
pub trait PowerMeter: Instrument {
    /// Reads the optical power, in dBm.
    fn measure_power(&mut self) -> Result<f64>;
}

/// Source meter role: source one electrical quantity, read its complement.
///
/// The sourcing methods re-send the full configuration sequence on every
/// call; instrument state such as compliance trip flags makes replayed
/// commands non-idempotent, so callers must treat each call as an
/// order-sensitive side effect.
pub trait SourceMeter: Instrument {
    /// Sources `volts` on a fixed `source_range`, waits `delay`, reads the
    /// current in amps.
    fn source_voltage_read_current(
        &mut self,
        volts: f64,
        source_range: f64,
        delay: Duration,
    ) -> Result<f64>;

    /// Sources `amps` on a fixed `source_range`, waits `delay`, reads the
    /// voltage in volts.
    fn source_current_read_voltage(
        &mut self,
        amps: f64,
        source_range: f64,
        delay: Duration,
    ) -> Result<f64>;

    /// Reads resistance in ohms with automatic ranging.
    fn read_resistance(&mut self) -> Result<f64>;

    /// Reads resistance in ohms on a fixed range.
    fn read_resistance_manual(&mut self, range_ohms: f64) -> Result<f64>;
}
