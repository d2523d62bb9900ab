//! Run configuration, tick clock and state hashing.

use serde::{Deserialize, Serialize};

use crate::integrator::NoiseGuard;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// When the initial populations enter the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Injection {
    /// On the tick the population first leaves diapause.
    #[default]
    OnDiapauseExit,
    /// On the first tick of the given elapsed day, regardless of diapause.
    OnDay(u32),
}

/// Options for one cell run. Parameter values live in
/// [`ParameterSet`](crate::params::ParameterSet); this only selects how the
/// model is driven.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Integration step, in days.
    pub dt: f64,
    /// Drop the fruit-quality effects on development and mortality.
    pub ignore_fruit: bool,
    /// Bypass the diapause machine; integrate every tick with full
    /// fecundity.
    pub ignore_diapause: bool,
    pub injection: Injection,
    pub noise_guard: NoiseGuard,
    /// Calendar year of the first simulated year. Only used to pick the
    /// solstice offset.
    pub calendar_year: Option<i32>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            dt: 0.05,
            ignore_fruit: false,
            ignore_diapause: false,
            injection: Injection::default(),
            noise_guard: NoiseGuard::default(),
            calendar_year: None,
        }
    }
}

impl SimConfig {
    /// Number of ticks that cover `days`.
    pub fn ticks_for(&self, days: f64) -> u64 {
        if days <= 0.0 || self.dt <= 0.0 {
            return 0;
        }
        (days / self.dt).round() as u64
    }

    /// Ticks per simulated day, for daily sampling of tick series.
    pub fn ticks_per_day(&self) -> u64 {
        self.ticks_for(1.0).max(1)
    }
}

// ---------------------------------------------------------------------------
// Simulation clock
// ---------------------------------------------------------------------------

/// Tick counter of one cell. Elapsed time is derived as `tick * dt` rather
/// than accumulated, so it carries no floating-point drift.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SimState {
    pub tick: u64,
}

impl SimState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Elapsed days at the current tick.
    pub fn time(&self, dt: f64) -> f64 {
        self.tick as f64 * dt
    }

    /// Whole elapsed days at the current tick.
    pub fn day(&self, dt: f64) -> u32 {
        // nudge so that e.g. 20 * 0.05 counts as day 1
        (self.time(dt) + 1e-9).floor() as u32
    }

    /// Calendar day-of-year index (0..365).
    pub fn day_of_year(&self, dt: f64) -> usize {
        (self.day(dt) % 365) as usize
    }
}

// ---------------------------------------------------------------------------
// State hash
// ---------------------------------------------------------------------------

/// Deterministic FNV-1a (64-bit) hash over simulation state, used to find
/// the first tick at which two runs diverge. Not cryptographic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateHash(pub u64);

impl StateHash {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;

    pub fn new() -> Self {
        Self(Self::FNV_OFFSET)
    }

    pub fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 ^= b as u64;
            self.0 = self.0.wrapping_mul(Self::FNV_PRIME);
        }
    }

    pub fn write_u64(&mut self, v: u64) {
        self.write(&v.to_le_bytes());
    }

    /// Feed an f64 by bit pattern, so `0.0` and `-0.0` hash differently.
    pub fn write_f64(&mut self, v: f64) {
        self.write(&v.to_bits().to_le_bytes());
    }

    pub fn finish(self) -> u64 {
        self.0
    }
}

impl Default for StateHash {
    fn default() -> Self {
        Self::new()
    }
}
