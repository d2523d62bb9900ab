//! Stage populations plus diapause state, advanced by a pure step function.

use serde::{Deserialize, Serialize};

use crate::daylight;
use crate::diapause::{DiapauseState, Phase};
use crate::integrator::{self, StageRates};
use crate::params::ParameterSet;
use crate::sim::SimConfig;
use crate::stage::StagePopulations;

/// Per-tick inputs from the owning cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepInput {
    pub temperature: f64,
    /// Fruit quality after this tick's fruit update.
    pub fruit_quality: f64,
    /// Whole elapsed days.
    pub day: u32,
}

/// Everything that evolves for one population.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PopulationState {
    pub stages: StagePopulations,
    pub diapause: DiapauseState,
}

impl PopulationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the initial populations from `params` and arm the injection
    /// flag.
    pub fn seed(&mut self, params: &ParameterSet) {
        self.stages = StagePopulations::from_array(params.initial_populations());
        self.diapause.injection_armed = true;
    }

    /// Mark that populations will be injected on a chosen day, so the
    /// dormant gate does not hold integration back.
    pub fn arm_injection(&mut self) {
        self.diapause.injection_armed = true;
    }

    /// Daylight hours seen on elapsed `day`.
    pub fn daylight_hours(day: u32, params: &ParameterSet, config: &SimConfig) -> f64 {
        let year = (day / 365) as i32;
        let date = (day % 365) as i32;
        let calendar_year = config.calendar_year.map(|y| y.saturating_add(year));
        let offset = daylight::solstice_offset(calendar_year);
        daylight::daylight_hours(date + offset, params.general().latitude)
    }

    /// Produce the state one tick later.
    pub fn step(self, input: StepInput, params: &ParameterSet, config: &SimConfig) -> Self {
        let mut next = self;
        next.stages.clamp_non_negative();

        let mut fecundity_multiplier = 1.0;
        if !config.ignore_diapause {
            let hours = Self::daylight_hours(input.day, params, config);
            let tr = self
                .diapause
                .transition(hours, input.temperature, params.diapause(), input.day);
            next.diapause = tr.state;
            fecundity_multiplier = tr.fecundity_multiplier;

            match tr.phase {
                Phase::Dormant => return next,
                Phase::Exit { seed: true } => next.seed(params),
                Phase::Exit { seed: false } | Phase::Active => {}
            }
        }

        let rates = StageRates::evaluate(
            input.temperature,
            input.fruit_quality,
            fecundity_multiplier,
            params,
            config.ignore_fruit,
        );
        next.stages = integrator::integrate(&next.stages, &rates, config.dt, &config.noise_guard);
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::Stage;

    fn input(t: f64, day: u32) -> StepInput {
        StepInput {
            temperature: t,
            fruit_quality: 1.0,
            day,
        }
    }

    #[test]
    fn dormant_step_leaves_populations_alone() {
        let params = ParameterSet::default();
        let config = SimConfig::default();
        let state = PopulationState::new();
        let next = state.step(input(5.0, 10), &params, &config);
        assert_eq!(next.stages, StagePopulations::zero());
        assert!(!next.diapause.crossed);
    }

    #[test]
    fn diapause_exit_seeds_initial_populations() {
        let params = ParameterSet::default();
        let config = SimConfig::default();
        // day 150 is long and warm at the default latitude
        let next = PopulationState::new().step(input(25.0, 150), &params, &config);
        assert!(next.diapause.crossed);
        assert_eq!(next.diapause.crossed_day, Some(150));
        assert!(next.stages[Stage::Females1] > 0.0);
        assert!(next.stages[Stage::Eggs] > 0.0);
    }

    #[test]
    fn ignoring_diapause_always_integrates() {
        let params = ParameterSet::default();
        let config = SimConfig {
            ignore_diapause: true,
            ..SimConfig::default()
        };
        let mut state = PopulationState::new();
        state.stages[Stage::Pupae] = 5.0;
        let next = state.step(input(5.0, 0), &params, &config);
        assert!(next.stages[Stage::Pupae] < 5.0);
        assert!(!next.diapause.crossed);
    }

    #[test]
    fn armed_injection_integrates_while_dormant() {
        let params = ParameterSet::default();
        let config = SimConfig::default();
        let mut state = PopulationState::new();
        state.seed(&params);
        let next = state.step(input(10.0, 0), &params, &config);
        assert!(!next.diapause.s1);
        assert!(next.stages[Stage::Females1] < 10.0);
        // no eggs while s1 is off
        assert_eq!(next.stages[Stage::Eggs], 0.0);
    }

    #[test]
    fn extreme_calendar_year_uses_default_solstice() {
        let params = ParameterSet::default();
        let config = SimConfig {
            calendar_year: Some(i32::MAX),
            ..SimConfig::default()
        };
        let fallback = SimConfig::default();
        for day in [0, 364, 365, 400, 365 * 3 + 10] {
            assert_eq!(
                PopulationState::daylight_hours(day, &params, &config),
                PopulationState::daylight_hours(day, &params, &fallback),
            );
        }
    }
}
