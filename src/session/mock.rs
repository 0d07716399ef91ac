//! Scriptable in-memory bus for tests and dry runs.

use super::{InstrumentBus, InstrumentLink};
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Default)]
struct MockState {
    /// Exact command → scripted reply.
    replies: HashMap<String, String>,
    /// Every command sent through any link, as (link name, command).
    log: Vec<(String, String)>,
    /// Resources opened so far, reported by `list_resources`.
    opened: Vec<String>,
    /// Commands containing this substring fail with a connection error.
    fail_matching: Option<String>,
    /// Remaining successful exchanges before everything starts failing.
    budget: Option<usize>,
}

/// In-memory [`InstrumentBus`] with scripted replies and a command log.
///
/// Unscripted queries fall back to sensible defaults (`*IDN?`, `*OPT?`,
/// `SYST:ERR?`, and `0.0` for anything else ending in `?`), so a bench can
/// run end to end against this bus with no setup at all. Tests script the
/// replies they care about and assert on the recorded command log.
#[derive(Clone, Default)]
pub struct MockBus {
    inner: Arc<Mutex<MockState>>,
}

impl MockBus {
    /// Creates a bus with no scripted replies.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts a fixed reply for an exact command (builder form).
    pub fn with_reply(self, command: &str, reply: &str) -> Self {
        self.set_reply(command, reply);
        self
    }

    /// Scripts a fixed reply for an exact command.
    pub fn set_reply(&self, command: &str, reply: &str) {
        self.state()
            .replies
            .insert(command.to_string(), reply.to_string());
    }

    /// Makes every command containing `needle` fail with a connection error.
    pub fn fail_matching(&self, needle: &str) {
        self.state().fail_matching = Some(needle.to_string());
    }

    /// Lets `count` more exchanges succeed, then fails every one after.
    pub fn fail_after(&self, count: usize) {
        self.state().budget = Some(count);
    }

    /// All commands observed so far, as (link name, command) pairs.
    pub fn commands(&self) -> Vec<(String, String)> {
        self.state().log.clone()
    }

    /// Commands observed on the named link, in order.
    pub fn commands_for(&self, name: &str) -> Vec<String> {
        self.state()
            .log
            .iter()
            .filter(|(link, _)| link == name)
            .map(|(_, command)| command.clone())
            .collect()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn exchange(&self, name: &str, command: &str) -> Result<Option<String>> {
        let mut state = self.state();
        state.log.push((name.to_string(), command.to_string()));

        if let Some(needle) = &state.fail_matching {
            if command.contains(needle.as_str()) {
                return Err(Error::connection(
                    name,
                    format!("mock failure injected on '{command}'"),
                ));
            }
        }
        if let Some(budget) = state.budget.as_mut() {
            if *budget == 0 {
                return Err(Error::connection(
                    name,
                    format!("mock failure budget exhausted at '{command}'"),
                ));
            }
            *budget -= 1;
        }

        if let Some(reply) = state.replies.get(command) {
            return Ok(Some(reply.clone()));
        }
        Ok(default_reply(command))
    }
}

fn default_reply(command: &str) -> Option<String> {
    match command {
        "*IDN?" => Some("PhotonBench,MockInstrument,0,0.1".to_string()),
        "*OPT?" => Some("MOCK".to_string()),
        "SYST:ERR?" => Some("0,\"No error\"".to_string()),
        _ if command.ends_with('?') => Some("0.0".to_string()),
        _ => None,
    }
}

impl InstrumentBus for MockBus {
    fn open(
        &self,
        name: &str,
        resource: &str,
        _timeout: Duration,
    ) -> Result<Box<dyn InstrumentLink>> {
        self.state().opened.push(resource.to_string());
        Ok(Box::new(MockLink {
            name: name.to_string(),
            bus: self.clone(),
        }))
    }

    fn list_resources(&self) -> Result<Vec<String>> {
        Ok(self.state().opened.clone())
    }
}

struct MockLink {
    name: String,
    bus: MockBus,
}

impl InstrumentLink for MockLink {
    fn name(&self) -> &str {
        &self.name
    }

    fn write(&mut self, command: &str) -> Result<()> {
        self.bus.exchange(&self.name, command)?;
        Ok(())
    }

    fn query(&mut self, command: &str) -> Result<String> {
        match self.bus.exchange(&self.name, command)? {
            Some(reply) => Ok(reply),
            None => Err(Error::connection(
                &self.name,
                format!("no scripted reply for '{command}'"),
            )),
        }
    }
}
