//! CLI entry point for photonbench.
//!
//! Provides a command-line interface for:
//! - Running the configured sweeps against the bench (or mock instruments)
//! - Listing the VISA resources visible on this machine
//!
//! # Usage
//!
//! Run every configured sweep:
//! ```bash
//! photonbench run --config config/default.yaml
//! ```
//!
//! Run only the electrical sweeps, without hardware:
//! ```bash
//! photonbench run --mock --sweeps iv,liv
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use photonbench::analysis;
use photonbench::config::Settings;
use photonbench::data::{plot_table, save_table, show};
use photonbench::instrument::{Instrument, LaserSource, PowerMeter, SourceMeter};
use photonbench::instrument::{MockLightwave, MockSourceMeter};
use photonbench::sweep::{self, SweepTable};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "photonbench")]
#[command(version, about = "Photonic device characterization bench", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the configured sweeps and save CSV results and plots
    Run {
        /// Path to the YAML settings file
        #[arg(long, default_value = "config/default.yaml")]
        config: PathBuf,

        /// Which sweeps to run, in order
        #[arg(long, value_delimiter = ',', default_value = "laser,iv,liv")]
        sweeps: Vec<SweepKind>,

        /// Open each rendered plot in the default image viewer
        #[arg(long)]
        show: bool,

        /// Use in-process mock instruments instead of VISA hardware
        #[arg(long)]
        mock: bool,
    },

    /// List VISA resources visible on this machine
    Discover,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum SweepKind {
    /// Wavelength sweep of the laser against the power meter
    Laser,
    /// Voltage sweep with current readback
    Iv,
    /// Voltage sweep with current and optical power readback
    Liv,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            config,
            sweeps,
            show,
            mock,
        } => run(&config, &sweeps, show, mock),
        Commands::Discover => discover(),
    }
}

fn run(config: &Path, sweeps: &[SweepKind], show_plots: bool, mock: bool) -> Result<()> {
    let settings = Settings::from_path(config)
        .with_context(|| format!("loading settings from '{}'", config.display()))?;
    println!(
        "🔬 photonbench: {} '{}'",
        settings.dut.device_type, settings.dut.device_name
    );

    if mock {
        println!("   mock instruments, no hardware will be touched");
        let mut lightwave = demo_lightwave();
        let mut smu = demo_sourcemeter();
        run_bench(&mut smu, &mut lightwave, &settings, sweeps, show_plots)?;
        smu.close()?;
        lightwave.close()?;
        return Ok(());
    }

    #[cfg(feature = "instrument_visa")]
    {
        use photonbench::instrument::{Agilent8163, Keithley2400};
        use photonbench::session::VisaBus;

        let bus = VisaBus::new()?;
        let mut lightwave = Agilent8163::new(&bus, &settings.lightwave)?;
        println!("   lightwave:   {}", lightwave.identity());
        let mut smu = Keithley2400::new(&bus, &settings.sourcemeter)?;
        println!("   sourcemeter: {}", smu.identity());

        run_bench(&mut smu, &mut lightwave, &settings, sweeps, show_plots)?;
        smu.close()?;
        lightwave.close()?;
        Ok(())
    }
    #[cfg(not(feature = "instrument_visa"))]
    {
        Err(photonbench::Error::VisaFeatureDisabled.into())
    }
}

/// Runs the requested sweeps in order against whichever drivers are wired in.
fn run_bench<S, M>(
    smu: &mut S,
    lightwave: &mut M,
    settings: &Settings,
    sweeps: &[SweepKind],
    show_plots: bool,
) -> Result<()>
where
    S: SourceMeter,
    M: LaserSource + PowerMeter,
{
    for kind in sweeps {
        match kind {
            SweepKind::Laser => {
                let table = sweep::sweep_wavelength(
                    lightwave,
                    settings.laser_range(),
                    settings.sweeps.laser.delay(),
                )?;
                report_peaks(&table);
                finish(&table, settings, "laser", "Wavelength sweep", show_plots)?;
            }
            SweepKind::Iv => {
                let table =
                    sweep::sweep_iv(smu, settings.iv_range(), settings.sweeps.iv.delay())?;
                finish(&table, settings, "iv", "IV sweep", show_plots)?;
            }
            SweepKind::Liv => {
                let table = sweep::sweep_liv(
                    smu,
                    lightwave,
                    settings.iv_range(),
                    settings.sweeps.iv.delay(),
                    settings.sweeps.liv.center_wavelength_nm,
                    settings.sweeps.liv.power_delay(),
                )?;
                finish(&table, settings, "liv", "LIV sweep", show_plots)?;
            }
        }
    }
    Ok(())
}

/// Saves the table, renders its plot, and optionally opens the viewer.
fn finish(
    table: &SweepTable,
    settings: &Settings,
    kind: &str,
    title: &str,
    show_plots: bool,
) -> Result<()> {
    let base = format!(
        "{}_{}_{}",
        settings.dut.device_type, settings.dut.device_name, kind
    );
    let csv = save_table(table, &settings.output.results_dir, &base)?;
    println!("✅ {} rows -> '{}'", table.len(), csv.display());

    let caption = format!(
        "{title}: {} {}",
        settings.dut.device_type, settings.dut.device_name
    );
    let png = plot_table(table, &settings.output.plots_dir, &base, &caption)?;
    println!("   plot -> '{}'", png.display());
    if show_plots {
        show(&png)?;
    }
    Ok(())
}

fn report_peaks(table: &SweepTable) {
    let peaks = analysis::wavelength_peaks(table, 3.0);
    if peaks.is_empty() {
        println!("   no peaks above 3 dB prominence");
    }
    for (nm, dbm) in peaks {
        println!("   peak: {nm:.3} nm at {dbm:.2} dBm");
    }
}

/// Mock lightwave with two resonances riding on a flat baseline, plus a
/// little noise so the rendered trace looks like a bench trace.
fn demo_lightwave() -> MockLightwave {
    MockLightwave::new()
        .with_spectrum(|nm| {
            let resonance = |center: f64, width: f64, height: f64| {
                let detune = (nm - center) / width;
                height / (1.0 + detune * detune)
            };
            -25.0 + resonance(1548.2, 0.4, 12.0) + resonance(1553.6, 0.6, 8.0)
        })
        .with_noise(11, 0.2)
}

/// Mock source meter with a diode-like exponential turn-on.
fn demo_sourcemeter() -> MockSourceMeter {
    MockSourceMeter::new().with_iv_curve(|volts| {
        let saturated = ((volts / 0.052).exp() - 1.0).min(1.0e7);
        1.0e-9 * saturated
    })
}

fn discover() -> Result<()> {
    #[cfg(feature = "instrument_visa")]
    {
        use photonbench::session::{InstrumentBus, VisaBus};

        let bus = VisaBus::new()?;
        let resources = bus.list_resources()?;
        if resources.is_empty() {
            println!("📡 no VISA resources found");
        } else {
            println!("📡 {} VISA resource(s):", resources.len());
            for resource in resources {
                println!("   {resource}");
            }
        }
        Ok(())
    }
    #[cfg(not(feature = "instrument_visa"))]
    {
        Err(photonbench::Error::VisaFeatureDisabled.into())
    }
}
