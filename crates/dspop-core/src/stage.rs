//! Life stages and the stage-population vector.
//!
//! The thirteen stages are kept in a fixed order that doubles as the
//! biological progression order: eggs, three instars, pupae, adult males,
//! then seven adult-female sub-stages ordered by age/fecundity class.

use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut};

/// Number of tracked life stages.
pub const STAGE_COUNT: usize = 13;

/// Number of adult-female sub-stages.
pub const FEMALE_STAGE_COUNT: usize = 7;

/// One of the thirteen life-stage population classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Stage {
    Eggs,
    Instar1,
    Instar2,
    Instar3,
    Pupae,
    Males,
    Females1,
    Females2,
    Females3,
    Females4,
    Females5,
    Females6,
    Females7,
}

impl Stage {
    /// All stages in progression order.
    pub const ALL: [Stage; STAGE_COUNT] = [
        Stage::Eggs,
        Stage::Instar1,
        Stage::Instar2,
        Stage::Instar3,
        Stage::Pupae,
        Stage::Males,
        Stage::Females1,
        Stage::Females2,
        Stage::Females3,
        Stage::Females4,
        Stage::Females5,
        Stage::Females6,
        Stage::Females7,
    ];

    /// The female sub-stages in order.
    pub const FEMALES: [Stage; FEMALE_STAGE_COUNT] = [
        Stage::Females1,
        Stage::Females2,
        Stage::Females3,
        Stage::Females4,
        Stage::Females5,
        Stage::Females6,
        Stage::Females7,
    ];

    /// Position of this stage in [`Stage::ALL`].
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Stage at the given position, if in range.
    pub fn from_index(index: usize) -> Option<Stage> {
        Stage::ALL.get(index).copied()
    }

    /// The `n`th female sub-stage (0-based).
    pub fn female(n: usize) -> Option<Stage> {
        Stage::FEMALES.get(n).copied()
    }

    pub fn is_female(self) -> bool {
        self >= Stage::Females1
    }

    pub fn is_instar(self) -> bool {
        matches!(self, Stage::Instar1 | Stage::Instar2 | Stage::Instar3)
    }

    /// Whether this stage develops into a following stage. Adult males and
    /// the last female sub-stage are terminal.
    pub fn has_development(self) -> bool {
        !matches!(self, Stage::Males | Stage::Females7)
    }

    /// Whether development of this stage is temperature-driven. Female
    /// sub-stages age at a constant rate instead.
    pub fn is_juvenile(self) -> bool {
        self <= Stage::Pupae
    }

    /// Legacy name used in flat parameter keys (`"eggs"`, `"females3"`).
    pub fn name(self) -> &'static str {
        match self {
            Stage::Eggs => "eggs",
            Stage::Instar1 => "instar1",
            Stage::Instar2 => "instar2",
            Stage::Instar3 => "instar3",
            Stage::Pupae => "pupae",
            Stage::Males => "males",
            Stage::Females1 => "females1",
            Stage::Females2 => "females2",
            Stage::Females3 => "females3",
            Stage::Females4 => "females4",
            Stage::Females5 => "females5",
            Stage::Females6 => "females6",
            Stage::Females7 => "females7",
        }
    }

    /// Parse a legacy stage name.
    pub fn from_name(name: &str) -> Option<Stage> {
        Stage::ALL.iter().copied().find(|s| s.name() == name)
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Stage populations
// ---------------------------------------------------------------------------

/// Abundance of every stage at one instant. Continuous, not integer counts.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StagePopulations {
    values: [f64; STAGE_COUNT],
}

impl StagePopulations {
    /// All stages empty.
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn from_array(values: [f64; STAGE_COUNT]) -> Self {
        Self { values }
    }

    pub fn as_array(&self) -> &[f64; STAGE_COUNT] {
        &self.values
    }

    pub fn get(&self, stage: Stage) -> f64 {
        self.values[stage.index()]
    }

    pub fn set(&mut self, stage: Stage, value: f64) {
        self.values[stage.index()] = value;
    }

    /// The seven female sub-stage populations, in order.
    pub fn females(&self) -> &[f64] {
        &self.values[Stage::Females1.index()..]
    }

    /// Sum across the female sub-stages.
    pub fn female_total(&self) -> f64 {
        self.females().iter().sum()
    }

    /// Sum across every stage.
    pub fn total(&self) -> f64 {
        self.values.iter().sum()
    }

    /// Replace every negative entry with zero.
    pub fn clamp_non_negative(&mut self) {
        for v in &mut self.values {
            if *v < 0.0 {
                *v = 0.0;
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Stage, f64)> + '_ {
        Stage::ALL.iter().map(move |&s| (s, self.values[s.index()]))
    }
}

impl Index<Stage> for StagePopulations {
    type Output = f64;

    fn index(&self, stage: Stage) -> &f64 {
        &self.values[stage.index()]
    }
}

impl IndexMut<Stage> for StagePopulations {
    fn index_mut(&mut self, stage: Stage) -> &mut f64 {
        &mut self.values[stage.index()]
    }
}
