//! One simulation cell: a population, its fruit, its temperatures and its
//! recorded history.

use std::collections::BTreeMap;

use crate::diapause::DiapauseState;
use crate::fruit::FruitModel;
use crate::history::{CellSummary, History};
use crate::params::{ParamError, ParamKey, ParameterSet};
use crate::population::{PopulationState, StepInput};
use crate::sim::{Injection, SimConfig, SimState, StateHash};
use crate::stage::{Stage, StagePopulations};
use crate::temperature::TemperatureSeries;

/// Couples a [`PopulationState`] to a [`FruitModel`] and records every
/// tick. Reusable across runs via [`reset`](Self::reset).
#[derive(Debug, Clone)]
pub struct CellSimulator {
    params: ParameterSet,
    config: SimConfig,
    clock: SimState,
    population: PopulationState,
    fruit: FruitModel,
    history: History,
    injected: bool,
}

impl Default for CellSimulator {
    fn default() -> Self {
        Self::new(ParameterSet::default(), SimConfig::default())
    }
}

impl CellSimulator {
    pub fn new(params: ParameterSet, config: SimConfig) -> Self {
        Self {
            params,
            config,
            clock: SimState::new(),
            population: PopulationState::new(),
            fruit: FruitModel::new(),
            history: History::new(),
            injected: false,
        }
    }

    // -- Parameters and configuration --

    pub fn params(&self) -> &ParameterSet {
        &self.params
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn set_param(&mut self, key: ParamKey, value: f64) -> Result<(), ParamError> {
        self.params.set(key, value)
    }

    pub fn set_named(&mut self, name: &str, value: f64) -> Result<(), ParamError> {
        self.params.set_named(name, value)
    }

    /// Take every non-fruit parameter from `template`.
    pub fn apply_template(&mut self, template: &ParameterSet) {
        self.params.apply_template(template);
    }

    pub fn set_fruit_params(&mut self, map: &BTreeMap<String, f64>) -> Result<(), ParamError> {
        self.params.set_fruit_params(map)
    }

    // -- State --

    pub fn populations(&self) -> &StagePopulations {
        &self.population.stages
    }

    pub fn diapause(&self) -> &DiapauseState {
        &self.population.diapause
    }

    pub fn fruit(&self) -> &FruitModel {
        &self.fruit
    }

    pub fn tick(&self) -> u64 {
        self.clock.tick
    }

    /// Elapsed days.
    pub fn time(&self) -> f64 {
        self.clock.time(self.config.dt)
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Return to tick 0 with empty populations, fresh fruit and no history.
    /// Parameters and configuration are kept.
    pub fn reset(&mut self) {
        self.clock = SimState::new();
        self.population = PopulationState::new();
        self.fruit.reset();
        self.history.clear();
        self.injected = false;
    }

    /// Load the initial populations now, independent of diapause.
    pub fn inject(&mut self) {
        self.population.seed(&self.params);
        self.injected = true;
        tracing::debug!(tick = self.clock.tick, "initial populations injected");
    }

    /// Advance one tick at `temperature`.
    pub fn advance(&mut self, temperature: f64) {
        let dt = self.config.dt;
        let time = self.clock.time(dt);
        let day = self.clock.day(dt);

        let quality = self.fruit.step(temperature, day, time, dt, self.params.fruit());
        let input = StepInput {
            temperature,
            fruit_quality: quality,
            day,
        };
        self.population = self.population.step(input, &self.params, &self.config);
        self.history.record(time, &self.population.stages, quality, dt);
        self.clock.tick += 1;
    }

    /// Advance one tick of a scheduled run, reading the temperature of the
    /// current whole day from `temperatures` and injecting the initial
    /// populations on the configured day.
    pub fn step(&mut self, temperatures: &TemperatureSeries) {
        let day = self.clock.day(self.config.dt);
        if let Injection::OnDay(start) = self.config.injection {
            self.population.arm_injection();
            if day == start && !self.injected {
                self.inject();
            }
        }
        self.advance(temperatures.at_day(day));
    }

    /// Run `horizon_days` from the current tick.
    pub fn run(&mut self, temperatures: &TemperatureSeries, horizon_days: f64) {
        for _ in 0..self.config.ticks_for(horizon_days) {
            self.step(temperatures);
        }
    }

    /// Run at a single temperature with the populations injected at once.
    pub fn run_constant(&mut self, temperature: f64, horizon_days: f64) {
        self.population.arm_injection();
        if !self.injected {
            self.inject();
        }
        for _ in 0..self.config.ticks_for(horizon_days) {
            self.advance(temperature);
        }
    }

    pub fn summary(&self) -> CellSummary {
        let stages = std::array::from_fn(|i| *self.history.stats(Stage::ALL[i]));
        let grand_total = Stage::ALL
            .iter()
            .map(|&s| self.history.stats(s).total)
            .sum();
        CellSummary {
            stages,
            females: *self.history.female_stats(),
            grand_total,
            crossed_day: self.population.diapause.crossed_day,
            harvest_day: self.fruit.harvest_day(),
            max_fruit_day: self.fruit.max_fruit_day(),
            first_female_time: self.history.first_female_time(),
            ticks: self.clock.tick,
        }
    }

    /// Hash of the evolving state at the current tick.
    pub fn state_hash(&self) -> u64 {
        let mut h = StateHash::new();
        h.write_u64(self.clock.tick);
        for value in self.population.stages.as_array() {
            h.write_f64(*value);
        }
        h.write_f64(self.fruit.quality());
        let d = &self.population.diapause;
        h.write(&[d.s1 as u8, d.s2 as u8, d.crossed as u8, self.fruit.is_harvested() as u8]);
        h.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{GeneralParam, StageParam};

    fn ignoring_both() -> SimConfig {
        SimConfig {
            ignore_fruit: true,
            ignore_diapause: true,
            ..SimConfig::default()
        }
    }

    #[test]
    fn advance_records_one_sample_per_tick() {
        let mut cell = CellSimulator::new(ParameterSet::default(), ignoring_both());
        cell.inject();
        for _ in 0..10 {
            cell.advance(22.0);
        }
        assert_eq!(cell.tick(), 10);
        assert_eq!(cell.history().len(), 10);
        let times: Vec<f64> = cell.history().fruit().samples().iter().map(|s| s.time).collect();
        assert_eq!(times[0], 0.0);
        assert!((times[9] - 0.45).abs() < 1e-12);
    }

    #[test]
    fn run_covers_horizon() {
        let mut cell = CellSimulator::new(ParameterSet::default(), ignoring_both());
        let temps = TemperatureSeries::constant(20.0).unwrap();
        cell.run(&temps, 10.0);
        assert_eq!(cell.tick(), 200);
        assert_eq!(cell.summary().ticks, 200);
    }

    #[test]
    fn injection_on_day_waits_for_that_day() {
        let config = SimConfig {
            injection: Injection::OnDay(5),
            ignore_fruit: true,
            ..SimConfig::default()
        };
        let mut cell = CellSimulator::new(ParameterSet::default(), config);
        let temps = TemperatureSeries::constant(22.0).unwrap();
        cell.run(&temps, 10.0);

        let females = cell.history().females();
        assert_eq!(females.samples()[99].value, 0.0);
        assert!(females.samples()[100].value > 0.0);
        assert_eq!(cell.summary().first_female_time, Some(5.0));
    }

    #[test]
    fn diapause_exit_records_crossing_day() {
        let mut cell = CellSimulator::default();
        // warm and long days from the start of a mid-year series
        let mut daily = vec![5.0; 120];
        daily.extend(vec![25.0; 60]);
        let temps = TemperatureSeries::new(daily).unwrap();
        cell.run(&temps, 180.0);
        let summary = cell.summary();
        assert_eq!(summary.crossed_day, Some(120));
        assert!(summary.females.max > 0.0);
    }

    #[test]
    fn reset_returns_to_tick_zero_and_keeps_params() {
        let mut cell = CellSimulator::default();
        cell.set_param(ParamKey::General(GeneralParam::Latitude), 30.0).unwrap();
        cell.run_constant(22.0, 5.0);
        assert!(cell.tick() > 0);

        cell.reset();
        assert_eq!(cell.tick(), 0);
        assert!(cell.history().is_empty());
        assert_eq!(cell.populations(), &StagePopulations::zero());
        assert_eq!(cell.params().general().latitude, 30.0);
    }

    #[test]
    fn identical_cells_hash_identically() {
        let mut a = CellSimulator::default();
        let mut b = CellSimulator::default();
        a.run_constant(21.0, 3.0);
        b.run_constant(21.0, 3.0);
        assert_eq!(a.state_hash(), b.state_hash());

        b.advance(21.0);
        assert_ne!(a.state_hash(), b.state_hash());
    }

    #[test]
    fn rejected_param_leaves_cell_params() {
        let mut cell = CellSimulator::default();
        let before = cell.params().clone();
        let key = ParamKey::Stage(Stage::Eggs, StageParam::Initial);
        assert!(cell.set_param(key, -1.0).is_err());
        assert_eq!(cell.params(), &before);
    }
}
