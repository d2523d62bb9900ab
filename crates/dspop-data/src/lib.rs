//! Input and output adapters for dsPopSim: parameter and run-configuration
//! files, daily temperature files and plain-text reports.

pub mod loader;
pub mod report;
pub mod temperature;

pub use loader::{DataLoadError, load_parameters, load_sim_config};
pub use report::ReportError;
pub use temperature::load_temperatures;
