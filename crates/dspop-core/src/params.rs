//! The model parameter table.
//!
//! Parameters are stored as a structured table indexed by [`Stage`] and a
//! parameter kind rather than by concatenated string keys. [`ParamKey`]
//! provides the flat, name-keyed view (`"females3 mortality beta2"`) used by
//! parameter files and external tooling; both views address the same slots.
//!
//! Every mutating operation validates the whole candidate set before
//! committing it. A rejected update leaves the set untouched.

use std::collections::BTreeMap;

use crate::stage::{FEMALE_STAGE_COUNT, STAGE_COUNT, Stage};
use crate::validation::{self, Check};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// The range a rejected value was required to fall in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    /// `[0, 1]`
    UnitInterval,
    /// `[0, 24]`
    DayLength,
    /// `>= 0`
    NonNegative,
}

impl std::fmt::Display for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rule::UnitInterval => f.write_str("between 0 and 1 inclusive"),
            Rule::DayLength => f.write_str("between 0 and 24 inclusive"),
            Rule::NonNegative => f.write_str("non-negative"),
        }
    }
}

/// Why a parameter lookup or update was rejected.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParamError {
    #[error("invalid parameter: {0}")]
    UnknownParameter(String),
    #[error("{name} must be {rule}")]
    OutOfRange { name: String, rule: Rule },
    #[error("{0} is not a number")]
    NotANumber(String),
    #[error("missing fruit parameter: {0}")]
    MissingFruitParameter(String),
    #[error("unknown parameter category: {0}")]
    UnknownCategory(String),
}

// ---------------------------------------------------------------------------
// Parameter kinds
// ---------------------------------------------------------------------------

/// Fruit-quality sub-model parameters. These are cell-local.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FruitParam {
    N,
    M,
    TimeLag,
    BaseTemp,
    GtMultiplier,
    HarvestCutoff,
    HarvestDrop,
}

impl FruitParam {
    pub const ALL: [FruitParam; 7] = [
        FruitParam::N,
        FruitParam::M,
        FruitParam::TimeLag,
        FruitParam::BaseTemp,
        FruitParam::GtMultiplier,
        FruitParam::HarvestCutoff,
        FruitParam::HarvestDrop,
    ];

    fn suffix(self) -> &'static str {
        match self {
            FruitParam::N => "n",
            FruitParam::M => "m",
            FruitParam::TimeLag => "time lag",
            FruitParam::BaseTemp => "base temp",
            FruitParam::GtMultiplier => "gt multiplier",
            FruitParam::HarvestCutoff => "harvest cutoff",
            FruitParam::HarvestDrop => "harvest drop",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiapauseParam {
    CriticalTemp,
    DaylightHours,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeneralParam {
    Time,
    ConstantTemp,
    MaleProportion,
    Latitude,
    FertilityTmax,
}

impl GeneralParam {
    pub const ALL: [GeneralParam; 5] = [
        GeneralParam::Time,
        GeneralParam::ConstantTemp,
        GeneralParam::MaleProportion,
        GeneralParam::Latitude,
        GeneralParam::FertilityTmax,
    ];

    fn name(self) -> &'static str {
        match self {
            GeneralParam::Time => "time",
            GeneralParam::ConstantTemp => "constant temp",
            GeneralParam::MaleProportion => "male proportion",
            GeneralParam::Latitude => "latitude",
            GeneralParam::FertilityTmax => "fertility tmax",
        }
    }
}

/// Per-stage parameter kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageParam {
    Initial,
    DevelopmentMax,
    MortalityMax,
    MortalityMinTemp,
    MortalityMaxTemp,
    MortalityTau,
    /// Polynomial coefficient, degree 0..=3.
    MortalityBeta(u8),
    Predation,
    EggViability,
}

impl StageParam {
    pub const ALL: [StageParam; 12] = [
        StageParam::Initial,
        StageParam::DevelopmentMax,
        StageParam::MortalityMax,
        StageParam::MortalityMinTemp,
        StageParam::MortalityMaxTemp,
        StageParam::MortalityTau,
        StageParam::MortalityBeta(0),
        StageParam::MortalityBeta(1),
        StageParam::MortalityBeta(2),
        StageParam::MortalityBeta(3),
        StageParam::Predation,
        StageParam::EggViability,
    ];

    /// Whether this kind exists for `stage`.
    pub fn applies_to(self, stage: Stage) -> bool {
        match self {
            StageParam::DevelopmentMax => stage.has_development(),
            StageParam::EggViability => stage.is_female(),
            StageParam::MortalityBeta(k) => k < 4,
            _ => true,
        }
    }

    fn suffix(self) -> Option<String> {
        let s = match self {
            StageParam::Initial => return None,
            StageParam::DevelopmentMax => "development max".to_string(),
            StageParam::MortalityMax => "mortality max".to_string(),
            StageParam::MortalityMinTemp => "mortality min temp".to_string(),
            StageParam::MortalityMaxTemp => "mortality max temp".to_string(),
            StageParam::MortalityTau => "mortality tau".to_string(),
            StageParam::MortalityBeta(k) => format!("mortality beta{k}"),
            StageParam::Predation => "mortality due to predation".to_string(),
            StageParam::EggViability => "egg viability".to_string(),
        };
        Some(s)
    }

    fn from_suffix(suffix: &str) -> Option<StageParam> {
        StageParam::ALL
            .iter()
            .copied()
            .find(|k| k.suffix().as_deref() == Some(suffix))
    }
}

/// Address of a single parameter, convertible to and from its flat name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKey {
    Fruit(FruitParam),
    Diapause(DiapauseParam),
    General(GeneralParam),
    Stage(Stage, StageParam),
}

impl ParamKey {
    pub fn stage(stage: Stage, kind: StageParam) -> Self {
        ParamKey::Stage(stage, kind)
    }

    pub fn is_fruit(self) -> bool {
        matches!(self, ParamKey::Fruit(_))
    }

    /// Whether this key addresses a slot that exists.
    pub fn is_valid(self) -> bool {
        match self {
            ParamKey::Stage(stage, kind) => kind.applies_to(stage),
            _ => true,
        }
    }

    /// Flat legacy name.
    pub fn name(self) -> String {
        match self {
            ParamKey::Fruit(p) => format!("fruit {}", p.suffix()),
            ParamKey::Diapause(DiapauseParam::CriticalTemp) => "diapause critical temp".to_string(),
            ParamKey::Diapause(DiapauseParam::DaylightHours) => {
                "diapause daylight hours".to_string()
            }
            ParamKey::General(p) => p.name().to_string(),
            ParamKey::Stage(stage, kind) => match kind.suffix() {
                None => format!("initial {stage}"),
                Some(suffix) => format!("{stage} {suffix}"),
            },
        }
    }

    /// Parse a flat legacy name. Returns `None` for unknown names and for
    /// kinds that do not apply to the named stage.
    pub fn parse(name: &str) -> Option<ParamKey> {
        let name = name.trim();
        if let Some(rest) = name.strip_prefix("fruit ") {
            return FruitParam::ALL
                .iter()
                .copied()
                .find(|p| p.suffix() == rest)
                .map(ParamKey::Fruit);
        }
        match name {
            "diapause critical temp" => return Some(ParamKey::Diapause(DiapauseParam::CriticalTemp)),
            "diapause daylight hours" => {
                return Some(ParamKey::Diapause(DiapauseParam::DaylightHours));
            }
            _ => {}
        }
        if let Some(p) = GeneralParam::ALL.iter().copied().find(|p| p.name() == name) {
            return Some(ParamKey::General(p));
        }
        if let Some(stage_name) = name.strip_prefix("initial ") {
            return Stage::from_name(stage_name).map(|s| ParamKey::Stage(s, StageParam::Initial));
        }
        let (stage_name, suffix) = name.split_once(' ')?;
        let stage = Stage::from_name(stage_name)?;
        let kind = StageParam::from_suffix(suffix)?;
        let key = ParamKey::Stage(stage, kind);
        key.is_valid().then_some(key)
    }

    /// Every valid key, globals first, then per stage in stage order.
    pub fn all() -> Vec<ParamKey> {
        let mut keys: Vec<ParamKey> = FruitParam::ALL.iter().map(|&p| ParamKey::Fruit(p)).collect();
        keys.push(ParamKey::Diapause(DiapauseParam::CriticalTemp));
        keys.push(ParamKey::Diapause(DiapauseParam::DaylightHours));
        keys.extend(GeneralParam::ALL.iter().map(|&p| ParamKey::General(p)));
        for stage in Stage::ALL {
            for kind in StageParam::ALL {
                if kind.applies_to(stage) {
                    keys.push(ParamKey::Stage(stage, kind));
                }
            }
        }
        keys
    }
}

impl std::fmt::Display for ParamKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name())
    }
}

// ---------------------------------------------------------------------------
// Parameter groups
// ---------------------------------------------------------------------------

/// Temperature-dependent mortality: `max` outside `[min_temp, max_temp]`,
/// otherwise a cubic in `T - tau`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MortalityParams {
    pub max: f64,
    pub min_temp: f64,
    pub max_temp: f64,
    pub tau: f64,
    pub betas: [f64; 4],
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageParams {
    pub initial: f64,
    /// Zero for stages without development.
    pub development_max: f64,
    pub mortality: MortalityParams,
    pub predation: f64,
    /// Zero for non-female stages.
    pub egg_viability: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FruitParams {
    pub n: f64,
    pub m: f64,
    pub time_lag: f64,
    pub base_temp: f64,
    pub gt_multiplier: f64,
    pub harvest_cutoff: f64,
    pub harvest_drop: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiapauseParams {
    pub critical_temp: f64,
    pub daylight_hours: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeneralParams {
    pub time: f64,
    pub constant_temp: f64,
    pub male_proportion: f64,
    pub latitude: f64,
    pub fertility_tmax: f64,
}

// ---------------------------------------------------------------------------
// ParameterSet
// ---------------------------------------------------------------------------

/// A complete, validated parameter set.
///
/// Every constructor and mutator keeps the set valid; there is no way to
/// observe a partially applied update.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSet {
    fruit: FruitParams,
    diapause: DiapauseParams,
    general: GeneralParams,
    stages: [StageParams; STAGE_COUNT],
}

/// Default mortality maxima, polynomial intercepts and development maxima
/// per stage, in stage order.
const DEFAULT_MORTALITY_MAX: [f64; STAGE_COUNT] = [
    0.3288, 0.2688, 0.1020, 0.1068, 0.0303, 0.1398, 0.0537, 0.1200, 0.4500, 0.0, 0.7500, 0.6000,
    0.8367,
];
const DEFAULT_BETA0: [f64; STAGE_COUNT] = [
    0.1602, 0.1402, 0.0846, 0.0862, 0.0607, 0.0972, 0.0685, 0.0906, 0.2006, 0.0506, 0.3006,
    0.2506, 0.3295,
];
const DEFAULT_DEVELOPMENT_MAX: [f64; STAGE_COUNT] = [
    0.72,
    0.94,
    0.68,
    0.32,
    0.17,
    0.0,
    1.0 / 80.0,
    1.0 / 10.0,
    1.0 / 10.0,
    1.0 / 5.0,
    1.0 / 4.0,
    1.0 / 5.0,
    0.0,
];
const DEFAULT_EGG_VIABILITY: [f64; FEMALE_STAGE_COUNT] =
    [0.832, 0.807, 0.763, 0.556, 0.324, 0.257, 0.0];

impl Default for ParameterSet {
    fn default() -> Self {
        let stages = std::array::from_fn(|i| {
            let stage = Stage::ALL[i];
            StageParams {
                initial: if stage == Stage::Females1 { 10.0 } else { 0.0 },
                development_max: DEFAULT_DEVELOPMENT_MAX[i],
                mortality: MortalityParams {
                    max: DEFAULT_MORTALITY_MAX[i],
                    min_temp: 3.0,
                    max_temp: 33.0,
                    tau: 8.1776,
                    betas: [DEFAULT_BETA0[i], -0.0077, 0.00032, -0.000002],
                },
                predation: 0.0,
                egg_viability: if stage.is_female() {
                    DEFAULT_EGG_VIABILITY[i - Stage::Females1.index()]
                } else {
                    0.0
                },
            }
        });

        Self {
            fruit: FruitParams {
                n: 4.0,
                m: 0.75,
                time_lag: 50.0,
                base_temp: 4.0,
                gt_multiplier: 4.0,
                harvest_cutoff: 0.95,
                harvest_drop: 0.1,
            },
            diapause: DiapauseParams {
                critical_temp: 18.0,
                daylight_hours: 10.0,
            },
            general: GeneralParams {
                time: 100.0,
                constant_temp: 15.0,
                male_proportion: 0.5,
                latitude: 45.7,
                fertility_tmax: 30.0,
            },
            stages,
        }
    }
}

impl ParameterSet {
    /// Build a set from a flat name-keyed map layered over the defaults.
    pub fn from_flat_map(map: &BTreeMap<String, f64>) -> Result<Self, ParamError> {
        let mut params = Self::default();
        params.apply_flat_map(map, true)?;
        Ok(params)
    }

    // -- Typed accessors used by the kernel --

    pub fn fruit(&self) -> &FruitParams {
        &self.fruit
    }

    pub fn diapause(&self) -> &DiapauseParams {
        &self.diapause
    }

    pub fn general(&self) -> &GeneralParams {
        &self.general
    }

    pub fn stage(&self, stage: Stage) -> &StageParams {
        &self.stages[stage.index()]
    }

    /// Initial populations for every stage.
    pub fn initial_populations(&self) -> [f64; STAGE_COUNT] {
        std::array::from_fn(|i| self.stages[i].initial)
    }

    // -- Keyed access --

    /// Read one parameter.
    pub fn get(&self, key: ParamKey) -> Result<f64, ParamError> {
        if !key.is_valid() {
            return Err(ParamError::UnknownParameter(key.name()));
        }
        Ok(*self.slot(key))
    }

    /// Read one parameter by its flat name.
    pub fn get_named(&self, name: &str) -> Result<f64, ParamError> {
        let key = ParamKey::parse(name).ok_or_else(|| ParamError::UnknownParameter(name.to_string()))?;
        self.get(key)
    }

    /// Set one parameter, validating the whole resulting set.
    pub fn set(&mut self, key: ParamKey, value: f64) -> Result<(), ParamError> {
        self.set_many([(key, value)])
    }

    /// Set one parameter by its flat name.
    pub fn set_named(&mut self, name: &str, value: f64) -> Result<(), ParamError> {
        let key = ParamKey::parse(name).ok_or_else(|| ParamError::UnknownParameter(name.to_string()))?;
        self.set(key, value)
    }

    /// Builder-style [`set`](Self::set).
    pub fn with(mut self, key: ParamKey, value: f64) -> Result<Self, ParamError> {
        self.set(key, value)?;
        Ok(self)
    }

    /// Apply several updates as one atomic change.
    pub fn set_many<I>(&mut self, updates: I) -> Result<(), ParamError>
    where
        I: IntoIterator<Item = (ParamKey, f64)>,
    {
        let mut candidate = self.clone();
        for (key, value) in updates {
            if !key.is_valid() {
                return Err(ParamError::UnknownParameter(key.name()));
            }
            *candidate.slot_mut(key) = value;
        }
        self.commit(candidate, Check::All)
    }

    /// Apply a flat name-keyed map. Fruit entries are skipped unless
    /// `include_fruit` is set. Any unknown name or invalid value rejects the
    /// whole map.
    pub fn apply_flat_map(
        &mut self,
        map: &BTreeMap<String, f64>,
        include_fruit: bool,
    ) -> Result<(), ParamError> {
        let mut updates = Vec::with_capacity(map.len());
        for (name, &value) in map {
            let key =
                ParamKey::parse(name).ok_or_else(|| ParamError::UnknownParameter(name.clone()))?;
            if key.is_fruit() && !include_fruit {
                continue;
            }
            updates.push((key, value));
        }
        self.set_many(updates)
    }

    /// Replace the fruit parameters. All seven must be present.
    pub fn set_fruit_params(&mut self, map: &BTreeMap<String, f64>) -> Result<(), ParamError> {
        let mut candidate = self.clone();
        for p in FruitParam::ALL {
            let key = ParamKey::Fruit(p);
            let name = key.name();
            let value = map
                .get(&name)
                .copied()
                .ok_or(ParamError::MissingFruitParameter(name))?;
            *candidate.slot_mut(key) = value;
        }
        self.commit(candidate, Check::FruitOnly)
    }

    /// Set a stage's maximum mortality.
    pub fn set_max_mortality(&mut self, stage: Stage, value: f64) -> Result<(), ParamError> {
        self.set(ParamKey::Stage(stage, StageParam::MortalityMax), value)
    }

    /// Copy every non-fruit parameter from `template`. Fruit parameters are
    /// cell-local and survive a broadcast.
    pub fn apply_template(&mut self, template: &ParameterSet) {
        let fruit = self.fruit;
        *self = template.clone();
        self.fruit = fruit;
    }

    /// Values of one per-stage kind for every stage it applies to, in stage
    /// order: 13 entries for initial, mortality and predation kinds, 11 for
    /// development maxima, 7 for egg viabilities.
    pub fn array(&self, kind: StageParam) -> Vec<f64> {
        Stage::ALL
            .iter()
            .filter(|&&s| kind.applies_to(s))
            .map(|&s| *self.slot(ParamKey::Stage(s, kind)))
            .collect()
    }

    /// [`array`](Self::array) addressed by category name (`"initial"`,
    /// `"development max"`, `"mortality beta1"`, `"egg viability"`, ...).
    pub fn array_named(&self, category: &str) -> Result<Vec<f64>, ParamError> {
        let kind = if category.trim() == "initial" {
            StageParam::Initial
        } else {
            StageParam::from_suffix(category.trim())
                .ok_or_else(|| ParamError::UnknownCategory(category.to_string()))?
        };
        Ok(self.array(kind))
    }

    /// Every parameter under its flat name.
    pub fn to_flat_map(&self) -> BTreeMap<String, f64> {
        ParamKey::all()
            .into_iter()
            .map(|k| (k.name(), *self.slot(k)))
            .collect()
    }

    /// Check the set as a whole.
    pub fn validate(&self) -> Result<(), ParamError> {
        validation::check_parameters(self, Check::All)
    }

    fn commit(&mut self, candidate: ParameterSet, check: Check) -> Result<(), ParamError> {
        match validation::check_parameters(&candidate, check) {
            Ok(()) => {
                *self = candidate;
                Ok(())
            }
            Err(e) => {
                tracing::debug!(reason = %e, "parameter update rejected");
                Err(e)
            }
        }
    }

    fn slot(&self, key: ParamKey) -> &f64 {
        match key {
            ParamKey::Fruit(p) => match p {
                FruitParam::N => &self.fruit.n,
                FruitParam::M => &self.fruit.m,
                FruitParam::TimeLag => &self.fruit.time_lag,
                FruitParam::BaseTemp => &self.fruit.base_temp,
                FruitParam::GtMultiplier => &self.fruit.gt_multiplier,
                FruitParam::HarvestCutoff => &self.fruit.harvest_cutoff,
                FruitParam::HarvestDrop => &self.fruit.harvest_drop,
            },
            ParamKey::Diapause(DiapauseParam::CriticalTemp) => &self.diapause.critical_temp,
            ParamKey::Diapause(DiapauseParam::DaylightHours) => &self.diapause.daylight_hours,
            ParamKey::General(p) => match p {
                GeneralParam::Time => &self.general.time,
                GeneralParam::ConstantTemp => &self.general.constant_temp,
                GeneralParam::MaleProportion => &self.general.male_proportion,
                GeneralParam::Latitude => &self.general.latitude,
                GeneralParam::FertilityTmax => &self.general.fertility_tmax,
            },
            ParamKey::Stage(stage, kind) => {
                let s = &self.stages[stage.index()];
                match kind {
                    StageParam::Initial => &s.initial,
                    StageParam::DevelopmentMax => &s.development_max,
                    StageParam::MortalityMax => &s.mortality.max,
                    StageParam::MortalityMinTemp => &s.mortality.min_temp,
                    StageParam::MortalityMaxTemp => &s.mortality.max_temp,
                    StageParam::MortalityTau => &s.mortality.tau,
                    StageParam::MortalityBeta(k) => &s.mortality.betas[usize::from(k.min(3))],
                    StageParam::Predation => &s.predation,
                    StageParam::EggViability => &s.egg_viability,
                }
            }
        }
    }

    fn slot_mut(&mut self, key: ParamKey) -> &mut f64 {
        match key {
            ParamKey::Fruit(p) => match p {
                FruitParam::N => &mut self.fruit.n,
                FruitParam::M => &mut self.fruit.m,
                FruitParam::TimeLag => &mut self.fruit.time_lag,
                FruitParam::BaseTemp => &mut self.fruit.base_temp,
                FruitParam::GtMultiplier => &mut self.fruit.gt_multiplier,
                FruitParam::HarvestCutoff => &mut self.fruit.harvest_cutoff,
                FruitParam::HarvestDrop => &mut self.fruit.harvest_drop,
            },
            ParamKey::Diapause(DiapauseParam::CriticalTemp) => &mut self.diapause.critical_temp,
            ParamKey::Diapause(DiapauseParam::DaylightHours) => &mut self.diapause.daylight_hours,
            ParamKey::General(p) => match p {
                GeneralParam::Time => &mut self.general.time,
                GeneralParam::ConstantTemp => &mut self.general.constant_temp,
                GeneralParam::MaleProportion => &mut self.general.male_proportion,
                GeneralParam::Latitude => &mut self.general.latitude,
                GeneralParam::FertilityTmax => &mut self.general.fertility_tmax,
            },
            ParamKey::Stage(stage, kind) => {
                let s = &mut self.stages[stage.index()];
                match kind {
                    StageParam::Initial => &mut s.initial,
                    StageParam::DevelopmentMax => &mut s.development_max,
                    StageParam::MortalityMax => &mut s.mortality.max,
                    StageParam::MortalityMinTemp => &mut s.mortality.min_temp,
                    StageParam::MortalityMaxTemp => &mut s.mortality.max_temp,
                    StageParam::MortalityTau => &mut s.mortality.tau,
                    StageParam::MortalityBeta(k) => &mut s.mortality.betas[usize::from(k.min(3))],
                    StageParam::Predation => &mut s.predation,
                    StageParam::EggViability => &mut s.egg_viability,
                }
            }
        }
    }
}
