//! Small built-in trace analysis.
//!
//! Enough to answer "did the sweep see the resonance?" right at the bench,
//! without exporting to an external tool first. Dips in a transmission
//! trace are peaks of the negated trace.

use crate::sweep::SweepTable;

/// Indices of strict local maxima whose prominence reaches `min_prominence`.
///
/// Endpoints and plateau samples are never peaks. Prominence is the height
/// of a peak above the higher of the two valleys separating it from higher
/// ground (or from the trace edge).
pub fn find_peaks(values: &[f64], min_prominence: f64) -> Vec<usize> {
    let mut peaks = Vec::new();
    if values.len() < 3 {
        return peaks;
    }
    for i in 1..values.len() - 1 {
        if values[i] > values[i - 1]
            && values[i] > values[i + 1]
            && prominence(values, i) >= min_prominence
        {
            peaks.push(i);
        }
    }
    peaks
}

fn prominence(values: &[f64], peak: usize) -> f64 {
    let height = values[peak];

    let mut left_min = height;
    for &value in values[..peak].iter().rev() {
        if value > height {
            break;
        }
        left_min = left_min.min(value);
    }

    let mut right_min = height;
    for &value in &values[peak + 1..] {
        if value > height {
            break;
        }
        right_min = right_min.min(value);
    }

    height - left_min.max(right_min)
}

/// Peaks of a wavelength sweep as `(wavelength_nm, power_dbm)` pairs.
///
/// Expects the table layout produced by the wavelength sweep: wavelength in
/// the first column, power in the second.
pub fn wavelength_peaks(table: &SweepTable, min_prominence: f64) -> Vec<(f64, f64)> {
    let wavelengths = table.column(0);
    let powers = table.column(1);
    find_peaks(&powers, min_prominence)
        .into_iter()
        .map(|i| (wavelengths[i], powers[i]))
        .collect()
}
