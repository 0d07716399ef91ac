//! # PhotonBench Core Library
//!
//! This crate is the core library of the `photonbench` application: a thin,
//! synchronous orchestration layer for characterizing photonic devices on a
//! probe station. It drives a tunable-laser/power-meter mainframe and a
//! source measure unit over a shared message-based instrument bus, walks
//! linear sweeps across them, and lands the results as timestamped CSV
//! files and quick-look PNG charts.
//!
//! ## Crate Structure
//!
//! - **`config`**: YAML settings loading and one-pass validation. See
//!   [`config::Settings`].
//! - **`error`**: The crate-wide [`error::Error`] enum and `Result` alias.
//! - **`session`**: The [`session::InstrumentBus`] seam between drivers and
//!   the transport, with a VISA implementation (feature `instrument_visa`)
//!   and a scriptable mock.
//! - **`instrument`**: Driver lifecycle traits and the concrete drivers:
//!   Agilent 8163 lightwave mainframe, Keithley 2400 source meter, and the
//!   in-process mocks.
//! - **`sweep`**: Range arithmetic, the result table, and the wavelength /
//!   IV / LIV sweep loops.
//! - **`data`**: CSV persistence and PNG rendering of sweep tables.
//! - **`analysis`**: Peak finding over measured traces.

pub mod analysis;
pub mod config;
pub mod data;
pub mod error;
pub mod instrument;
pub mod session;
pub mod sweep;

pub use error::{Error, Result};
