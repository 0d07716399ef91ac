//! Shared SCPI plumbing for the concrete drivers.
//!
//! Every driver composes a [`Scpi`] core instead of inheriting one: the core
//! owns the bus link, applies the lifecycle guards, reads the identity
//! strings at connect time, and turns textual replies into numbers. The
//! wire-level command/reply echo lives here too, at `trace` level, so
//! `RUST_LOG=photonbench=trace` shows every exchange for any driver.

use crate::error::{Error, Result};
use crate::instrument::DriverState;
use crate::session::{InstrumentBus, InstrumentLink};
use log::{info, trace};
use std::time::Duration;

/// Link ownership, lifecycle state, and reply parsing for one instrument.
pub struct Scpi {
    name: String,
    link: Option<Box<dyn InstrumentLink>>,
    state: DriverState,
    identity: String,
    options: String,
}

impl Scpi {
    /// Opens the link and reads `*IDN?` / `*OPT?`.
    ///
    /// The driver comes up [`DriverState::Uninitialized`]: connected and
    /// identified, but not yet put into a known default state.
    pub fn connect(
        bus: &dyn InstrumentBus,
        name: &str,
        resource: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let link = bus.open(name, resource, timeout)?;
        let mut scpi = Self {
            name: name.to_string(),
            link: Some(link),
            state: DriverState::Uninitialized,
            identity: String::new(),
            options: String::new(),
        };
        scpi.identity = scpi.query("*IDN?")?;
        scpi.options = scpi.query("*OPT?")?;
        info!(
            "'{}' connected: {} (options: {})",
            scpi.name, scpi.identity, scpi.options
        );
        Ok(scpi)
    }

    /// Logical instrument name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current lifecycle state.
    pub fn state(&self) -> DriverState {
        self.state
    }

    /// `*IDN?` reply captured at connect time.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// `*OPT?` reply captured at connect time.
    pub fn options(&self) -> &str {
        &self.options
    }

    /// Errors unless the driver has been initialized and not closed.
    ///
    /// Drivers call this at the top of every measurement or mutator method;
    /// `initialize()` itself talks to the link directly and then calls
    /// [`Scpi::mark_initialized`].
    pub fn require_initialized(&self) -> Result<()> {
        match self.state {
            DriverState::Initialized => Ok(()),
            other => Err(Error::InvalidState {
                instrument: self.name.clone(),
                state: other.as_str(),
            }),
        }
    }

    /// Records the uninitialized → initialized transition.
    pub fn mark_initialized(&mut self) {
        self.state = DriverState::Initialized;
    }

    /// Sends one command.
    pub fn write(&mut self, command: &str) -> Result<()> {
        trace!("'{}' >>> {}", self.name, command);
        self.link_mut()?.write(command)
    }

    /// Sends one command and returns the trimmed reply.
    pub fn query(&mut self, command: &str) -> Result<String> {
        trace!("'{}' >>> {}", self.name, command);
        let reply = self.link_mut()?.query(command)?;
        trace!("'{}' <<< {}", self.name, reply);
        Ok(reply)
    }

    /// Queries and parses a single float.
    ///
    /// Instruments with stale format state sometimes answer with a
    /// comma-separated tuple where one element is expected; the first field
    /// is taken in that case.
    pub fn query_f64(&mut self, command: &str) -> Result<f64> {
        let reply = self.query(command)?;
        let field = reply.split(',').next().unwrap_or("").trim();
        field.parse::<f64>().map_err(|_| Error::Decode {
            instrument: self.name.clone(),
            command: command.to_string(),
            reply,
        })
    }

    /// Queries and parses a comma-separated list of floats.
    pub fn query_f64_list(&mut self, command: &str) -> Result<Vec<f64>> {
        let reply = self.query(command)?;
        let mut values = Vec::new();
        for field in reply.split(',').map(str::trim).filter(|f| !f.is_empty()) {
            match field.parse::<f64>() {
                Ok(value) => values.push(value),
                Err(_) => {
                    return Err(Error::Decode {
                        instrument: self.name.clone(),
                        command: command.to_string(),
                        reply: reply.clone(),
                    })
                }
            }
        }
        Ok(values)
    }

    /// Releases the link. Further writes and queries fail fast; closing an
    /// already-closed core is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if self.state == DriverState::Closed {
            return Ok(());
        }
        self.state = DriverState::Closed;
        // Dropping the link closes the underlying session.
        self.link = None;
        info!("'{}' closed", self.name);
        Ok(())
    }

    fn link_mut(&mut self) -> Result<&mut dyn InstrumentLink> {
        let name = &self.name;
        match self.link.as_mut() {
            Some(link) => Ok(link.as_mut()),
            None => Err(Error::InvalidState {
                instrument: name.clone(),
                state: "closed",
            }),
        }
    }
}
