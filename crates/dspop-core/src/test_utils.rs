//! Shared test helpers for integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so these helpers
//! are available in unit tests, integration tests, and benchmarks (via the
//! `test-utils` feature).

use crate::cell::CellSimulator;
use crate::grid::CellInput;
use crate::params::{ParamKey, ParameterSet, StageParam};
use crate::sim::{Injection, SimConfig};
use crate::stage::Stage;
use crate::temperature::TemperatureSeries;

// ===========================================================================
// Configurations
// ===========================================================================

/// Diapause and fruit both bypassed; populations injected on day 0.
pub fn plain_config() -> SimConfig {
    SimConfig {
        ignore_fruit: true,
        ignore_diapause: true,
        injection: Injection::OnDay(0),
        ..SimConfig::default()
    }
}

// ===========================================================================
// Parameter sets
// ===========================================================================

/// Every initial population zero except `stage`, set to `count`.
pub fn single_stage_params(stage: Stage, count: f64) -> ParameterSet {
    let updates = Stage::ALL.iter().map(|&s| {
        let value = if s == stage { count } else { 0.0 };
        (ParamKey::Stage(s, StageParam::Initial), value)
    });
    let mut params = ParameterSet::default();
    params
        .set_many(updates)
        .expect("initial populations are non-negative");
    params
}

/// [`single_stage_params`] with every development maximum zeroed, so
/// nothing leaves its stage except through mortality.
pub fn no_development_params(stage: Stage, count: f64) -> ParameterSet {
    let mut params = single_stage_params(stage, count);
    let updates: Vec<_> = Stage::ALL
        .iter()
        .filter(|s| s.has_development())
        .map(|&s| (ParamKey::Stage(s, StageParam::DevelopmentMax), 0.0))
        .collect();
    params
        .set_many(updates)
        .expect("zero development is valid");
    params
}

// ===========================================================================
// Temperatures
// ===========================================================================

pub fn constant_temps(t: f64) -> TemperatureSeries {
    TemperatureSeries::constant(t).expect("finite temperature")
}

/// A smooth annual cycle between `low` (mid-January) and `high`
/// (mid-July).
pub fn seasonal_temps(low: f64, high: f64) -> TemperatureSeries {
    let mid = (low + high) / 2.0;
    let amplitude = (high - low) / 2.0;
    let daily = (0..365)
        .map(|d| {
            let phase = (f64::from(d) - 15.0) / 365.0 * std::f64::consts::TAU;
            mid - amplitude * phase.cos()
        })
        .collect();
    TemperatureSeries::new(daily).expect("finite temperatures")
}

// ===========================================================================
// Cells and grids
// ===========================================================================

/// Run a fresh cell and return it.
pub fn run_cell(
    params: ParameterSet,
    config: SimConfig,
    temps: &TemperatureSeries,
    days: f64,
) -> CellSimulator {
    let mut cell = CellSimulator::new(params, config);
    cell.run(temps, days);
    cell
}

/// Row-major inputs for a `rows` x `cols` grid sharing one temperature
/// series, with latitude stepping by `lat_step` per row.
pub fn grid_inputs(
    rows: usize,
    cols: usize,
    temps: &TemperatureSeries,
    lat_start: f64,
    lat_step: f64,
) -> Vec<CellInput> {
    let mut inputs = Vec::with_capacity(rows * cols);
    for row in 0..rows {
        for col in 0..cols {
            inputs.push(CellInput {
                row,
                col,
                latitude: lat_start + lat_step * row as f64,
                temperatures: Some(temps.as_slice().to_vec()),
            });
        }
    }
    inputs
}
