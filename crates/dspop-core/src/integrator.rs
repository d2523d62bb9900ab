//! Explicit fixed-step integration of the stage-flow system.
//!
//! Flow topology: eggs are fed by fecundity across the female sub-stages;
//! each instar and the pupae are fed by development out of the preceding
//! stage; pupal development splits between adult males and the first female
//! sub-stage by the male proportion; each later female sub-stage is fed by
//! the one before it. All inflows and outflows of a tick read the pre-tick
//! populations.

use serde::{Deserialize, Serialize};

use crate::params::ParameterSet;
use crate::rates;
use crate::stage::{FEMALE_STAGE_COUNT, STAGE_COUNT, Stage, StagePopulations};

/// One explicit Euler step.
#[inline]
pub fn euler(current: f64, derivative: f64, dt: f64) -> f64 {
    current + derivative * dt
}

// ---------------------------------------------------------------------------
// Noise guard
// ---------------------------------------------------------------------------

/// Which stages the ratio-based noise guard applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardScope {
    Instars,
    AllStages,
    Disabled,
}

/// Suppresses updates whose ratio to the previous value (in either
/// direction) falls below `epsilon`, keeping the previous value instead.
/// A previous value of exactly zero always accepts the update.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseGuard {
    pub epsilon: f64,
    pub scope: GuardScope,
}

impl Default for NoiseGuard {
    fn default() -> Self {
        Self {
            epsilon: 1e-15,
            scope: GuardScope::Instars,
        }
    }
}

impl NoiseGuard {
    pub fn applies_to(&self, stage: Stage) -> bool {
        match self.scope {
            GuardScope::Instars => stage.is_instar(),
            GuardScope::AllStages => true,
            GuardScope::Disabled => false,
        }
    }

    pub fn filter(&self, previous: f64, raw: f64) -> f64 {
        if previous == 0.0 {
            return raw;
        }
        if raw / previous < self.epsilon || previous / raw < self.epsilon {
            return previous;
        }
        raw
    }
}

// ---------------------------------------------------------------------------
// Per-tick rates
// ---------------------------------------------------------------------------

/// Every rate the integrator needs for one tick, indexed by stage.
#[derive(Debug, Clone, PartialEq)]
pub struct StageRates {
    /// Eggs per female per day, already scaled by diapause.
    pub fecundity: f64,
    /// Zero for adult males and the last female sub-stage.
    pub development: [f64; STAGE_COUNT],
    /// Natural mortality including the fruit-quality term.
    pub mortality: [f64; STAGE_COUNT],
    pub predation: [f64; STAGE_COUNT],
    pub egg_viability: [f64; FEMALE_STAGE_COUNT],
    pub male_proportion: f64,
}

impl StageRates {
    /// Evaluate every rate at temperature `t` and fruit quality `quality`.
    pub fn evaluate(
        t: f64,
        quality: f64,
        fecundity_multiplier: f64,
        params: &ParameterSet,
        ignore_fruit: bool,
    ) -> Self {
        let fruit = params.fruit();
        let development_effect = if ignore_fruit {
            1.0
        } else {
            rates::fruit_development_effect(quality, fruit)
        };

        let mut development = [0.0; STAGE_COUNT];
        let mut mortality = [0.0; STAGE_COUNT];
        let mut predation = [0.0; STAGE_COUNT];

        for stage in Stage::ALL {
            let i = stage.index();
            let sp = params.stage(stage);

            development[i] = if stage.is_juvenile() {
                rates::development_rate(t, sp.development_max) * development_effect
            } else if stage.has_development() {
                // female sub-stages age at a constant rate
                sp.development_max
            } else {
                0.0
            };

            let fruit_mortality = if ignore_fruit {
                0.0
            } else {
                rates::fruit_mortality_effect(quality, sp.mortality.max, fruit)
            };
            mortality[i] = rates::mortality_rate(t, &sp.mortality) + fruit_mortality;
            predation[i] = sp.predation;
        }

        let egg_viability =
            std::array::from_fn(|k| params.stage(Stage::FEMALES[k]).egg_viability);

        Self {
            fecundity: rates::fecundity(t, params.general().fertility_tmax) * fecundity_multiplier,
            development,
            mortality,
            predation,
            egg_viability,
            male_proportion: params.general().male_proportion,
        }
    }

    fn outflow(&self, stage: Stage) -> f64 {
        let i = stage.index();
        self.mortality[i] + self.predation[i] + self.development[i]
    }

    /// Development out of `stage` per day.
    fn developed(&self, stage: Stage, populations: &StagePopulations) -> f64 {
        self.development[stage.index()] * populations[stage]
    }
}

// ---------------------------------------------------------------------------
// Integration
// ---------------------------------------------------------------------------

/// Advance `previous` by one step of length `dt`. The result is clamped to
/// be non-negative.
pub fn integrate(
    previous: &StagePopulations,
    rates: &StageRates,
    dt: f64,
    guard: &NoiseGuard,
) -> StagePopulations {
    let p = previous;
    let mut next = StagePopulations::zero();

    let laid: f64 = rates
        .egg_viability
        .iter()
        .zip(p.females())
        .map(|(viability, females)| viability * females)
        .sum::<f64>()
        * rates.fecundity;

    for stage in Stage::ALL {
        let inflow = match stage {
            Stage::Eggs => laid,
            Stage::Instar1 => rates.developed(Stage::Eggs, p),
            Stage::Instar2 => rates.developed(Stage::Instar1, p),
            Stage::Instar3 => rates.developed(Stage::Instar2, p),
            Stage::Pupae => rates.developed(Stage::Instar3, p),
            Stage::Males => rates.male_proportion * rates.developed(Stage::Pupae, p),
            Stage::Females1 => (1.0 - rates.male_proportion) * rates.developed(Stage::Pupae, p),
            _ => {
                let before = Stage::ALL[stage.index() - 1];
                rates.developed(before, p)
            }
        };
        let raw = euler(p[stage], inflow - p[stage] * rates.outflow(stage), dt);
        next[stage] = if guard.applies_to(stage) {
            guard.filter(p[stage], raw)
        } else {
            raw
        };
    }

    next.clamp_non_negative();
    next
}
