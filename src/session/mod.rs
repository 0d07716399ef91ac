//! Bus and link abstractions over instrument communication.
//!
//! A [`InstrumentBus`] opens command/response channels ([`InstrumentLink`]) to
//! physical instruments addressed by VISA resource strings. The orchestration
//! layer owns exactly one bus per run and lends it by reference to every driver
//! constructor; each driver then owns its link exclusively. Commands on a
//! shared bus are serialized by construction: one in-flight exchange at a
//! time, issued by whichever driver owns it.
//!
//! Two backends exist: [`VisaBus`] (behind the `instrument_visa` feature)
//! talks to real hardware through the installed VISA library, and [`MockBus`]
//! is a scriptable in-memory stand-in used by the test suite and `--mock`
//! dry runs.

mod mock;
#[cfg(feature = "instrument_visa")]
mod visa;

pub use mock::MockBus;
#[cfg(feature = "instrument_visa")]
pub use visa::VisaBus;

use crate::error::Result;
use std::time::Duration;

/// One open command/response channel to a physical instrument.
///
/// Every exchange blocks the calling thread until it completes or the
/// backend's timeout fires. No retries happen at this layer.
pub trait InstrumentLink {
    /// Logical instrument name, carried for log and error context.
    fn name(&self) -> &str;

    /// Sends one command, terminator included by the backend.
    fn write(&mut self, command: &str) -> Result<()>;

    /// Sends one command and returns the instrument's reply, trimmed.
    fn query(&mut self, command: &str) -> Result<String>;
}

/// Factory for instrument links, shared across co-located drivers.
pub trait InstrumentBus {
    /// Opens a link to the instrument at `resource`, tagged with the logical
    /// `name` used in diagnostics.
    fn open(
        &self,
        name: &str,
        resource: &str,
        timeout: Duration,
    ) -> Result<Box<dyn InstrumentLink>>;

    /// Lists the resource strings currently visible on the bus.
    fn list_resources(&self) -> Result<Vec<String>>;
}
