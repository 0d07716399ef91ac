//! PNG line charts for sweep tables.

use crate::data::saver::timestamped_name;
use crate::error::{Error, Result};
use crate::sweep::SweepTable;
use log::info;
use plotters::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

/// Series colors, cycled when a table carries more than one value column.
const SERIES_COLORS: [RGBColor; 4] = [
    RGBColor(31, 119, 180),
    RGBColor(255, 127, 14),
    RGBColor(44, 160, 44),
    RGBColor(214, 39, 40),
];

/// Renders `table` as a line chart PNG under `dir` and returns the path.
///
/// The first column is the x axis; every further column becomes one line
/// series named after its header. LIV tables therefore get both the
/// electrical and the optical trace in a single quick-look figure.
pub fn plot_table(table: &SweepTable, dir: &Path, base: &str, title: &str) -> Result<PathBuf> {
    if table.is_empty() {
        return Err(plot_error(base, "table has no rows"));
    }
    if table.headers().len() < 2 {
        return Err(plot_error(base, "table has no value column"));
    }
    fs::create_dir_all(dir)?;
    let path = dir.join(timestamped_name(base, "png"));

    let (x_min, x_max) = padded_bounds(&table.column(0));
    let mut values = Vec::new();
    for column in 1..table.headers().len() {
        values.extend(table.column(column));
    }
    let (y_min, y_max) = padded_bounds(&values);

    let render_path = path.clone();
    let root = BitMapBackend::new(&render_path, (1024, 768)).into_drawing_area();
    root.fill(&WHITE).map_err(|err| plot_error(base, err))?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 28))
        .margin(16)
        .x_label_area_size(48)
        .y_label_area_size(64)
        .build_cartesian_2d(x_min..x_max, y_min..y_max)
        .map_err(|err| plot_error(base, err))?;

    chart
        .configure_mesh()
        .x_desc(table.headers()[0].as_str())
        .y_desc(table.headers()[1..].join(" / "))
        .draw()
        .map_err(|err| plot_error(base, err))?;

    for (column, header) in table.headers().iter().enumerate().skip(1) {
        let color = SERIES_COLORS[(column - 1) % SERIES_COLORS.len()];
        let points: Vec<(f64, f64)> = table
            .rows()
            .iter()
            .filter_map(|row| Some((*row.first()?, *row.get(column)?)))
            .collect();
        chart
            .draw_series(LineSeries::new(points, &color))
            .map_err(|err| plot_error(base, err))?
            .label(header)
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 18, y)], color));
    }

    if table.headers().len() > 2 {
        chart
            .configure_series_labels()
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()
            .map_err(|err| plot_error(base, err))?;
    }

    root.present().map_err(|err| plot_error(base, err))?;
    info!("rendered '{}'", path.display());
    Ok(path)
}

/// Opens the rendered figure with the platform's default image viewer.
pub fn show(path: &Path) -> Result<()> {
    opener::open(path).map_err(|err| Error::Plot {
        figure: path.display().to_string(),
        message: err.to_string(),
    })
}

/// Axis bounds with 5% headroom; a flat trace still gets a visible band.
fn padded_bounds(values: &[f64]) -> (f64, f64) {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for &value in values {
        min = min.min(value);
        max = max.max(value);
    }
    if !min.is_finite() || !max.is_finite() {
        return (0.0, 1.0);
    }
    if min == max {
        return (min - 1.0, max + 1.0);
    }
    let pad = (max - min) * 0.05;
    (min - pad, max + pad)
}

fn plot_error(figure: &str, err: impl std::fmt::Display) -> Error {
    Error::Plot {
        figure: figure.to_string(),
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sweep::{COL_POWER, COL_WAVELENGTH};

    #[test]
    fn empty_table_is_refused_before_touching_disk() {
        let dir = tempfile::tempdir().unwrap();
        let table = SweepTable::new(&[COL_WAVELENGTH, COL_POWER]);
        let err = plot_table(&table, dir.path(), "ring_r1_laser", "Ring R1");
        assert!(matches!(err, Err(Error::Plot { .. })));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn single_column_table_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let mut table = SweepTable::new(&[COL_WAVELENGTH]);
        table.push_row(vec![1550.0]);
        assert!(plot_table(&table, dir.path(), "ring_r1_laser", "Ring R1").is_err());
    }

    #[test]
    fn bounds_pad_the_data_and_widen_flat_traces() {
        let (min, max) = padded_bounds(&[0.0, 10.0]);
        assert_eq!((min, max), (-0.5, 10.5));

        let (min, max) = padded_bounds(&[3.0, 3.0, 3.0]);
        assert_eq!((min, max), (2.0, 4.0));

        assert_eq!(padded_bounds(&[]), (0.0, 1.0));
    }
}
