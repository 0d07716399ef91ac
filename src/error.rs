//! Custom error types for the application.
//!
//! This module defines the primary error type, `Error`, for the entire crate.
//! Using the `thiserror` crate, it provides a centralized and consistent way to
//! handle the different kinds of failures a bench run can hit, from configuration
//! and file I/O problems to instrument-level faults.
//!
//! ## Error Hierarchy
//!
//! - **`ConfigNotFound` / `ConfigParse` / `ConfigInvalid`**: configuration
//!   failures. The first two cover the file itself (missing path, malformed
//!   YAML); `ConfigInvalid` carries every semantic violation found by the
//!   load-time validation pass, so a broken config is reported in one shot
//!   instead of one field at a time.
//! - **`Connection`**: bus/session failures. The link could not be opened,
//!   a command could not be written, or a reply timed out. Carries the
//!   instrument's logical name.
//! - **`Decode`**: the instrument answered, but the reply does not parse into
//!   the expected numeric shape. Carries the command and the raw reply so the
//!   exchange can be diagnosed without re-running.
//! - **`InvalidState`**: a driver method was called before `initialize()` or
//!   after `close()`. Fails fast instead of returning stale data.
//! - **`Range`**: invalid sweep bounds (zero or sign-mismatched step). Raised
//!   before any instrument command is issued.
//! - **`Io` / `Csv` / `Plot`**: file-output failures from the saver and the
//!   plot renderer.
//!
//! None of these are recovered locally: every failure aborts the current
//! operation and propagates to the caller. There is no retry policy.

use std::path::PathBuf;
use thiserror::Error;

/// Convenience alias for results using the crate error type.
pub type Result<T> = std::result::Result<T, Error>;

/// All failure modes of a bench run.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration file not found: {}", path.display())]
    ConfigNotFound { path: PathBuf },

    #[error("Failed to parse configuration {}: {source}", path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid configuration:\n  - {}", problems.join("\n  - "))]
    ConfigInvalid { problems: Vec<String> },

    #[error("Connection error on '{instrument}': {message}")]
    Connection { instrument: String, message: String },

    #[error("Could not decode reply from '{instrument}' to '{command}': {reply:?}")]
    Decode {
        instrument: String,
        command: String,
        reply: String,
    },

    #[error("Instrument '{instrument}' used while {state}")]
    InvalidState {
        instrument: String,
        state: &'static str,
    },

    #[error("Invalid sweep range (start={start}, stop={stop}, step={step}): {reason}")]
    Range {
        start: f64,
        stop: f64,
        step: f64,
        reason: &'static str,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Plot rendering failed for '{figure}': {message}")]
    Plot { figure: String, message: String },

    #[error("VISA support not enabled. Rebuild with --features instrument_visa")]
    VisaFeatureDisabled,
}

impl Error {
    /// Builds a [`Error::Connection`] for the named instrument.
    pub fn connection(instrument: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Connection {
            instrument: instrument.into(),
            message: message.into(),
        }
    }
}
