//! dsPopSim Core -- a stage-structured insect population simulator.
//!
//! Tracks thirteen life stages (eggs, three instars, pupae, adult males and
//! seven adult-female age classes) under daily temperatures, a
//! photoperiod-driven diapause switch and a coupled fruit-quality resource,
//! integrated with a fixed-step explicit scheme.
//!
//! # Per-Tick Pipeline
//!
//! Each call to [`cell::CellSimulator::advance`] moves one cell forward by
//! `dt` days:
//!
//! 1. **Fruit** -- Update fruit quality from the growth signal and the
//!    time-lagged harvest rule.
//! 2. **Diapause** -- Compute the next switch pair from the previous one and
//!    the day length; hold a dormant population still.
//! 3. **Rates** -- Evaluate development, mortality and fecundity for every
//!    stage at the tick's temperature and fruit quality.
//! 4. **Integrate** -- One simultaneous Euler step over the stage chain,
//!    clamped to non-negative.
//! 5. **Record** -- Append to every history series and update maxima and
//!    totals.
//!
//! # Key Types
//!
//! - [`params::ParameterSet`] -- Validated parameter table indexed by stage
//!   and parameter kind, with the flat `"eggs mortality max"` names as a
//!   compatibility view.
//! - [`population::PopulationState`] -- Stage vector plus diapause state,
//!   advanced by a pure step function.
//! - [`cell::CellSimulator`] -- One cell: population, fruit, history.
//! - [`grid::GridRunner`] -- Batched parallel runs over a spatial grid.
//! - [`validation`] -- Parameter rules and determinism checks.

pub mod cell;
pub mod daylight;
pub mod diapause;
pub mod fruit;
pub mod grid;
pub mod history;
pub mod integrator;
pub mod params;
pub mod population;
pub mod rates;
pub mod sim;
pub mod stage;
pub mod temperature;
pub mod validation;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
