//! The two-switch diapause hysteresis machine.
//!
//! `s1` gates reproduction; `s2` records that the season has been long
//! enough for a later short day to send the population back into dormancy.
//! A transition always reads the previous tick's switches and produces the
//! next ones, so `s2` can never observe the `s1` computed for the same tick.

use serde::{Deserialize, Serialize};

use crate::params::DiapauseParams;
use crate::rates;

/// Diapause switches and active-season bookkeeping for one population.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DiapauseState {
    pub s1: bool,
    pub s2: bool,
    /// Set on the first tick `s1` turns on. Stays set until reset.
    pub crossed: bool,
    /// Day the active season started.
    pub crossed_day: Option<u32>,
    /// Initial populations were (or will be) injected explicitly, so the
    /// dormant gate does not apply and diapause exit does not reseed.
    pub injection_armed: bool,
}

/// What the population should do on this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Before the active season: skip integration entirely.
    Dormant,
    /// First active tick. `seed` asks for the initial populations to be
    /// loaded before integrating.
    Exit { seed: bool },
    Active,
}

/// Result of one diapause transition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    pub state: DiapauseState,
    pub phase: Phase,
    /// Fraction of fecundity retained this tick.
    pub fecundity_multiplier: f64,
}

impl DiapauseState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute the next switches from this (previous) state.
    pub fn transition(
        self,
        daylight_hours: f64,
        t: f64,
        params: &DiapauseParams,
        day: u32,
    ) -> Transition {
        let s1 = rates::diapause_switch1(
            daylight_hours,
            t,
            self.s1,
            self.s2,
            params.critical_temp,
            params.daylight_hours,
        );
        let s2 = rates::diapause_switch2(daylight_hours, self.s1, self.s2, params.daylight_hours);

        let fecundity_multiplier = if s1 {
            rates::diapause_fecundity_multiplier(daylight_hours)
        } else {
            0.0
        };

        let mut next = DiapauseState { s1, s2, ..self };
        let phase = if !s1 && !self.crossed && !self.injection_armed {
            Phase::Dormant
        } else if s1 && !self.crossed {
            next.crossed = true;
            next.crossed_day = Some(day);
            tracing::debug!(day, "diapause exit");
            Phase::Exit {
                seed: !self.injection_armed,
            }
        } else {
            Phase::Active
        };

        Transition {
            state: next,
            phase,
            fecundity_multiplier,
        }
    }
}
