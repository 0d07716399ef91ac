//! Real VISA backend, enabled by the `instrument_visa` feature.

use super::{InstrumentBus, InstrumentLink};
use crate::error::{Error, Result};
use log::debug;
use std::ffi::CString;
use std::io::{BufRead, BufReader, Write};
use std::time::Duration;
use visa_rs::prelude::*;

/// [`InstrumentBus`] backed by the installed VISA library.
///
/// Holds the default resource manager for the lifetime of the run; the
/// orchestration layer creates one `VisaBus` and drops it after every driver
/// is closed.
pub struct VisaBus {
    rm: DefaultRM,
}

impl VisaBus {
    /// Opens the default VISA resource manager.
    pub fn new() -> Result<Self> {
        let rm = DefaultRM::new()
            .map_err(|err| Error::connection("VISA", format!("resource manager: {err}")))?;
        Ok(Self { rm })
    }
}

impl InstrumentBus for VisaBus {
    fn open(
        &self,
        name: &str,
        resource: &str,
        timeout: Duration,
    ) -> Result<Box<dyn InstrumentLink>> {
        debug!("Opening VISA session '{name}' at {resource}");
        let res_name = CString::new(resource)
            .map_err(|_| Error::connection(name, "resource string contains a NUL byte"))?
            .into();
        let instr = self
            .rm
            .open(&res_name, AccessMode::NO_LOCK, timeout)
            .map_err(|err| Error::connection(name, format!("open {resource}: {err}")))?;
        Ok(Box::new(VisaLink {
            name: name.to_string(),
            instr,
        }))
    }

    fn list_resources(&self) -> Result<Vec<String>> {
        let expr = CString::new("?*INSTR")
            .map_err(|_| Error::connection("VISA", "bad search expression"))?
            .into();
        let mut list = self
            .rm
            .find_res_list(&expr)
            .map_err(|err| Error::connection("VISA", format!("find resources: {err}")))?;
        let mut resources = Vec::new();
        loop {
            match list.find_next() {
                Ok(Some(res)) => resources.push(res.to_string()),
                Ok(None) => break,
                Err(err) => {
                    return Err(Error::connection("VISA", format!("enumerate: {err}")));
                }
            }
        }
        Ok(resources)
    }
}

struct VisaLink {
    name: String,
    instr: visa_rs::Instrument,
}

impl InstrumentLink for VisaLink {
    fn name(&self) -> &str {
        &self.name
    }

    fn write(&mut self, command: &str) -> Result<()> {
        // One write_all per command keeps the GPIB message boundary intact.
        let framed = format!("{command}\n");
        self.instr
            .write_all(framed.as_bytes())
            .map_err(|err| Error::connection(&self.name, format!("write '{command}': {err}")))
    }

    fn query(&mut self, command: &str) -> Result<String> {
        self.write(command)?;
        let mut response = String::new();
        {
            // Scoped so the reader borrow ends before the next exchange.
            let mut reader = BufReader::new(&self.instr);
            let read = reader.read_line(&mut response).map_err(|err| {
                Error::connection(&self.name, format!("read reply to '{command}': {err}"))
            })?;
            if read == 0 {
                return Err(Error::connection(
                    &self.name,
                    format!("no reply to '{command}'"),
                ));
            }
        }
        Ok(response.trim_end().to_string())
    }
}
