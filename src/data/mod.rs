//! Result persistence and quick-look rendering.
//!
//! Sweep tables leave the process in two forms: a timestamped CSV under the
//! results directory, and a PNG line chart under the plots directory. Both
//! share the `<base>_<timestamp>.<ext>` naming scheme so a measurement and
//! its picture sort next to each other.

pub mod plot;
pub mod saver;

pub use plot::{plot_table, show};
pub use saver::{save_table, timestamped_name};
