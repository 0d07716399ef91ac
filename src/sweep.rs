//! Sweep engine.
//!
//! A sweep walks a linear range of setpoints, settles, reads, and collects
//! the readings into a [`SweepTable`]. Three sweeps cover the bench:
//!
//! - wavelength sweep: tune the laser, read optical power,
//! - IV sweep: source voltage, read current,
//! - LIV sweep: source voltage, read current and optical power together.
//!
//! Ranges are validated before any instrument traffic, so a bad step can
//! never leave a device half-configured. Every point is computed as
//! `start + i * step` from the original bounds rather than accumulated, so
//! the thousandth point of a long sweep is as exact as the first. On any
//! failure mid-sweep the partial table is discarded and the stimulus is
//! still turned off.

use crate::error::{Error, Result};
use crate::instrument::{Instrument, LaserSource, PowerMeter, SourceMeter};
use log::{info, trace, warn};
use std::thread;
use std::time::Duration;

/// Column label for the tuned wavelength.
pub const COL_WAVELENGTH: &str = "Wavelength (nm)";
/// Column label for optical power read by the power meter.
pub const COL_POWER: &str = "Power (dBm)";
/// Column label for the sourced voltage.
pub const COL_VOLTAGE: &str = "Voltage (V)";
/// Column label for the measured current.
pub const COL_CURRENT: &str = "Current (A)";
/// Column label for optical power in an LIV sweep.
pub const COL_OPTICAL_POWER: &str = "Optical Power (dBm)";

// ===== Range =====

/// A linear setpoint range: `start`, `stop`, and a signed `step`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepRange {
    /// First setpoint, always included.
    pub start: f64,
    /// Last intended setpoint; included when the span divides evenly.
    pub stop: f64,
    /// Signed increment; its sign must match `stop - start`.
    pub step: f64,
}

impl SweepRange {
    /// Builds a range without validating it; call [`SweepRange::validate`]
    /// before use.
    pub fn new(start: f64, stop: f64, step: f64) -> Self {
        Self { start, stop, step }
    }

    /// Checks the range before any hardware is touched.
    ///
    /// A zero or non-finite step never terminates, and a step pointing away
    /// from `stop` would walk the source in the wrong direction. A
    /// zero-span range is fine with either step sign and yields one point.
    pub fn validate(&self) -> Result<()> {
        if !self.start.is_finite() || !self.stop.is_finite() || !self.step.is_finite() {
            return Err(self.range_error("bounds and step must be finite"));
        }
        if self.step == 0.0 {
            return Err(self.range_error("step must be non-zero"));
        }
        let span = self.stop - self.start;
        if span != 0.0 && span.signum() != self.step.signum() {
            return Err(self.range_error("step direction never reaches stop"));
        }
        Ok(())
    }

    /// Number of points, including both endpoints when the span divides
    /// evenly. The small slack absorbs binary rounding in spans like
    /// `0.3 / 0.1` so that a point landing on `stop` is not dropped.
    pub fn len(&self) -> usize {
        let span = (self.stop - self.start).abs();
        if span == 0.0 {
            return 1;
        }
        (span / self.step.abs() + 1.0e-9) as usize + 1
    }

    /// A validated range always has at least one point.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Setpoints in sweep order, each computed from the range bounds.
    pub fn points(&self) -> Vec<f64> {
        let step = if self.stop >= self.start {
            self.step.abs()
        } else {
            -self.step.abs()
        };
        (0..self.len())
            .map(|i| self.start + i as f64 * step)
            .collect()
    }

    /// Source range handed to the instrument so every setpoint, including
    /// the overshoot of the final step, stays inside it.
    pub fn source_range(&self) -> f64 {
        (self.stop - self.start).abs() + self.step.abs()
    }

    fn range_error(&self, reason: &'static str) -> Error {
        Error::Range {
            start: self.start,
            stop: self.stop,
            step: self.step,
            reason,
        }
    }
}

// ===== Table =====

/// Column-labelled numeric results of one sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepTable {
    headers: Vec<String>,
    rows: Vec<Vec<f64>>,
}

impl SweepTable {
    /// Empty table with the given column labels.
    pub fn new(headers: &[&str]) -> Self {
        Self {
            headers: headers.iter().map(|h| (*h).to_string()).collect(),
            rows: Vec::new(),
        }
    }

    /// Appends one row; its arity must match the headers.
    pub fn push_row(&mut self, row: Vec<f64>) {
        debug_assert_eq!(row.len(), self.headers.len());
        self.rows.push(row);
    }

    /// Column labels, in column order.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Rows, in the order they were measured.
    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    /// Number of measured rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when no rows were collected.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// One column as a contiguous vector, in row order.
    pub fn column(&self, index: usize) -> Vec<f64> {
        self.rows
            .iter()
            .filter_map(|row| row.get(index).copied())
            .collect()
    }
}

// ===== Sweeps =====

/// Tunes the laser across `range` and reads optical power at each point.
///
/// The lightwave driver is (re-)initialized first, and the laser is turned
/// off again when the sweep ends, successfully or not.
pub fn sweep_wavelength<M>(lightwave: &mut M, range: SweepRange, delay: Duration) -> Result<SweepTable>
where
    M: LaserSource + PowerMeter,
{
    range.validate()?;
    info!(
        "wavelength sweep: {} -> {} nm, step {} nm ({} points)",
        range.start,
        range.stop,
        range.step,
        range.len()
    );
    lightwave.initialize()?;

    let result = (|| {
        let mut table = SweepTable::new(&[COL_WAVELENGTH, COL_POWER]);
        for nm in range.points() {
            lightwave.set_wavelength(nm)?;
            thread::sleep(delay);
            let dbm = lightwave.measure_power()?;
            trace!("{nm} nm -> {dbm} dBm");
            table.push_row(vec![nm, dbm]);
        }
        Ok(table)
    })();

    turn_off_quietly(lightwave);
    result
}

/// Sources voltage across `range` and reads current at each point.
pub fn sweep_iv<S>(smu: &mut S, range: SweepRange, delay: Duration) -> Result<SweepTable>
where
    S: SourceMeter,
{
    range.validate()?;
    info!(
        "IV sweep: {} -> {} V, step {} V ({} points)",
        range.start,
        range.stop,
        range.step,
        range.len()
    );
    smu.initialize()?;
    let source_range = range.source_range();

    let result = (|| {
        let mut table = SweepTable::new(&[COL_VOLTAGE, COL_CURRENT]);
        for volts in range.points() {
            let amps = smu.source_voltage_read_current(volts, source_range, delay)?;
            trace!("{volts} V -> {amps} A");
            table.push_row(vec![volts, amps]);
        }
        Ok(table)
    })();

    turn_off_quietly(smu);
    result
}

/// Sources voltage and reads both current and optical power at each point.
///
/// The laser is parked at `center_wavelength_nm` before the electrical
/// sweep starts; `power_delay` separates the current read from the optical
/// read so the photodetector sees a settled emission level.
pub fn sweep_liv<S, M>(
    smu: &mut S,
    lightwave: &mut M,
    range: SweepRange,
    delay: Duration,
    center_wavelength_nm: f64,
    power_delay: Duration,
) -> Result<SweepTable>
where
    S: SourceMeter,
    M: LaserSource + PowerMeter,
{
    range.validate()?;
    info!(
        "LIV sweep: {} -> {} V, step {} V at {} nm ({} points)",
        range.start,
        range.stop,
        range.step,
        center_wavelength_nm,
        range.len()
    );
    smu.initialize()?;
    lightwave.initialize()?;
    let source_range = range.source_range();

    let result = (|| {
        lightwave.set_wavelength(center_wavelength_nm)?;
        let mut table = SweepTable::new(&[COL_VOLTAGE, COL_CURRENT, COL_OPTICAL_POWER]);
        for volts in range.points() {
            let amps = smu.source_voltage_read_current(volts, source_range, delay)?;
            thread::sleep(power_delay);
            let dbm = lightwave.measure_power()?;
            trace!("{volts} V -> {amps} A, {dbm} dBm");
            table.push_row(vec![volts, amps, dbm]);
        }
        Ok(table)
    })();

    turn_off_quietly(smu);
    turn_off_quietly(lightwave);
    result
}

/// Turning the stimulus off must not mask the sweep's own outcome, so a
/// failure here is only logged.
fn turn_off_quietly<I: Instrument + ?Sized>(instrument: &mut I) {
    if let Err(err) = instrument.turn_off() {
        warn!("'{}' turn-off after sweep failed: {err}", instrument.name());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instrument::{DriverState, MockLightwave, MockSourceMeter};

    #[test]
    fn point_count_includes_both_endpoints() {
        assert_eq!(SweepRange::new(0.0, 1.0, 0.25).len(), 5);
        assert_eq!(
            SweepRange::new(0.0, 1.0, 0.25).points(),
            vec![0.0, 0.25, 0.5, 0.75, 1.0]
        );
    }

    #[test]
    fn point_count_survives_binary_rounding() {
        // 0.3 / 0.1 is 2.999... in binary; the stop point must not vanish.
        assert_eq!(SweepRange::new(0.0, 0.3, 0.1).len(), 4);
        assert_eq!(SweepRange::new(1520.0, 1570.0, 0.3).len(), 167);
    }

    #[test]
    fn non_dividing_step_stops_short_of_stop() {
        let points = SweepRange::new(0.0, 1.0, 0.3).points();
        assert_eq!(points.len(), 4);
        assert!((points[3] - 0.9).abs() < 1.0e-12);
    }

    #[test]
    fn zero_span_is_a_single_point_with_either_sign() {
        for step in [0.1, -0.1] {
            let range = SweepRange::new(2.0, 2.0, step);
            range.validate().unwrap();
            assert_eq!(range.points(), vec![2.0]);
        }
    }

    #[test]
    fn descending_range_walks_downward() {
        let range = SweepRange::new(1.0, 0.0, -0.5);
        range.validate().unwrap();
        assert_eq!(range.points(), vec![1.0, 0.5, 0.0]);
    }

    #[test]
    fn bad_steps_are_rejected() {
        assert!(SweepRange::new(0.0, 1.0, 0.0).validate().is_err());
        assert!(SweepRange::new(0.0, 1.0, -0.1).validate().is_err());
        assert!(SweepRange::new(1.0, 0.0, 0.1).validate().is_err());
        assert!(SweepRange::new(0.0, f64::NAN, 0.1).validate().is_err());
    }

    #[test]
    fn bad_range_fails_before_any_instrument_call() {
        let mut smu = MockSourceMeter::new();
        let err = sweep_iv(&mut smu, SweepRange::new(0.0, 1.0, -0.25), Duration::ZERO);
        assert!(matches!(err, Err(Error::Range { .. })));
        assert!(smu.sourced().is_empty());
        assert_eq!(smu.state(), DriverState::Uninitialized);
    }

    #[test]
    fn wavelength_sweep_collects_ordered_rows_and_parks_laser() {
        let mut lightwave =
            MockLightwave::new().with_spectrum(|nm| -30.0 + (nm - 1550.0) * 0.5);
        let range = SweepRange::new(1550.0, 1552.0, 0.5);

        let table = sweep_wavelength(&mut lightwave, range, Duration::ZERO).unwrap();
        assert_eq!(table.headers(), &[COL_WAVELENGTH, COL_POWER]);
        assert_eq!(table.column(0), vec![1550.0, 1550.5, 1551.0, 1551.5, 1552.0]);
        assert_eq!(table.rows()[4], vec![1552.0, -29.0]);

        // Emission dropped on exit, so a fresh read sees the dark floor.
        assert_eq!(lightwave.measure_power().unwrap(), -90.0);
    }

    #[test]
    fn iv_sweep_sources_the_exact_setpoints() {
        let mut smu = MockSourceMeter::new().with_iv_curve(|v| v * 1.0e-3);
        let range = SweepRange::new(0.0, 1.0, 0.25);

        let table = sweep_iv(&mut smu, range, Duration::ZERO).unwrap();
        assert_eq!(table.len(), 5);
        assert_eq!(smu.sourced(), &[0.0, 0.25, 0.5, 0.75, 1.0]);
        assert_eq!(table.rows()[2], vec![0.5, 0.5e-3]);
        assert!(!smu.output_on());
    }

    #[test]
    fn liv_sweep_parks_wavelength_once_and_reads_pairs() {
        let mut smu = MockSourceMeter::new().with_iv_curve(|v| v * 2.0e-3);
        let mut lightwave = MockLightwave::new().with_fixture_dbm(-3.5);
        let range = SweepRange::new(0.0, 0.5, 0.25);

        let table = sweep_liv(
            &mut smu,
            &mut lightwave,
            range,
            Duration::ZERO,
            1310.0,
            Duration::ZERO,
        )
        .unwrap();

        assert_eq!(
            table.headers(),
            &[COL_VOLTAGE, COL_CURRENT, COL_OPTICAL_POWER]
        );
        assert_eq!(table.len(), 3);
        assert_eq!(table.rows()[1], vec![0.25, 0.5e-3, -3.5]);
        assert_eq!(lightwave.set_wavelength_calls(), 1);
        assert_eq!(lightwave.wavelength_nm(), 1310.0);
    }

    #[test]
    fn source_range_covers_the_far_endpoint() {
        assert_eq!(SweepRange::new(0.0, 1.0, 0.25).source_range(), 1.25);
        assert_eq!(SweepRange::new(1.0, 0.0, -0.25).source_range(), 1.25);
    }
}
