//! Parameter validation and determinism checking.
//!
//! Parameter checks run over a whole candidate set so an update is accepted
//! or rejected as a unit. The determinism tools compare two cells tick by
//! tick, or two finished histories series by series.

use crate::cell::CellSimulator;
use crate::history::History;
use crate::params::{
    DiapauseParam, FruitParam, GeneralParam, ParamError, ParamKey, ParameterSet, Rule, StageParam,
};
use crate::sim::SimConfig;
use crate::stage::Stage;
use crate::temperature::TemperatureSeries;

// ---------------------------------------------------------------------------
// Parameter rules
// ---------------------------------------------------------------------------

/// Which part of a parameter set to check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Check {
    All,
    FruitOnly,
    NonFruit,
}

fn require(set: &ParameterSet, key: ParamKey, rule: Rule) -> Result<(), ParamError> {
    let value = set.get(key)?;
    let ok = match rule {
        Rule::UnitInterval => (0.0..=1.0).contains(&value),
        Rule::DayLength => (0.0..=24.0).contains(&value),
        Rule::NonNegative => value >= 0.0,
    };
    if ok {
        Ok(())
    } else {
        Err(ParamError::OutOfRange {
            name: key.name(),
            rule,
        })
    }
}

fn fruit_rules() -> [(ParamKey, Rule); 4] {
    [
        (ParamKey::Fruit(FruitParam::M), Rule::UnitInterval),
        (ParamKey::Fruit(FruitParam::TimeLag), Rule::NonNegative),
        (ParamKey::Fruit(FruitParam::HarvestCutoff), Rule::UnitInterval),
        (ParamKey::Fruit(FruitParam::HarvestDrop), Rule::UnitInterval),
    ]
}

/// Check `set` against the model's range rules. Also rejects NaN anywhere in
/// the checked part. The first violation found is reported.
pub fn check_parameters(set: &ParameterSet, check: Check) -> Result<(), ParamError> {
    for key in ParamKey::all() {
        let wanted = match check {
            Check::All => true,
            Check::FruitOnly => key.is_fruit(),
            Check::NonFruit => !key.is_fruit(),
        };
        if wanted && set.get(key)?.is_nan() {
            return Err(ParamError::NotANumber(key.name()));
        }
    }

    if check != Check::NonFruit {
        for (key, rule) in fruit_rules() {
            require(set, key, rule)?;
        }
    }
    if check == Check::FruitOnly {
        return Ok(());
    }

    require(
        set,
        ParamKey::Diapause(DiapauseParam::DaylightHours),
        Rule::DayLength,
    )?;
    require(
        set,
        ParamKey::General(GeneralParam::MaleProportion),
        Rule::UnitInterval,
    )?;

    const NON_NEGATIVE: [StageParam; 5] = [
        StageParam::Initial,
        StageParam::MortalityMax,
        StageParam::Predation,
        StageParam::DevelopmentMax,
        StageParam::EggViability,
    ];
    for stage in Stage::ALL {
        for kind in NON_NEGATIVE {
            if kind.applies_to(stage) {
                require(set, ParamKey::Stage(stage, kind), Rule::NonNegative)?;
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// History diff
// ---------------------------------------------------------------------------

/// A series that differs between two histories.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesDiff {
    pub series: &'static str,
    /// First sample index at which the values (by bit pattern) or times
    /// differ, or the shorter length if one is a prefix of the other.
    pub first_index: usize,
}

/// Compare two histories series by series. Empty when identical.
pub fn diff_histories(a: &History, b: &History) -> Vec<SeriesDiff> {
    a.named_series()
        .into_iter()
        .zip(b.named_series())
        .filter_map(|((name, sa), (_, sb))| {
            let mismatch = sa
                .samples()
                .iter()
                .zip(sb.samples())
                .position(|(x, y)| {
                    x.time.to_bits() != y.time.to_bits() || x.value.to_bits() != y.value.to_bits()
                });
            match mismatch {
                Some(first_index) => Some(SeriesDiff {
                    series: name,
                    first_index,
                }),
                None if sa.len() != sb.len() => Some(SeriesDiff {
                    series: name,
                    first_index: sa.len().min(sb.len()),
                }),
                None => None,
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Determinism validation
// ---------------------------------------------------------------------------

/// Result of a determinism validation run.
#[derive(Debug, Clone)]
pub struct DeterminismResult {
    pub is_deterministic: bool,
    /// Tick at which the state hashes first differed.
    pub divergence_tick: Option<u64>,
    /// `(tick, hash_a, hash_b)` after every tick.
    pub hash_log: Vec<(u64, u64, u64)>,
}

/// Run two independent cells over the same inputs and compare their state
/// hashes after every tick.
pub fn validate_determinism(
    params: &ParameterSet,
    config: &SimConfig,
    temperatures: &TemperatureSeries,
    horizon_days: f64,
) -> DeterminismResult {
    let mut a = CellSimulator::new(params.clone(), config.clone());
    let mut b = CellSimulator::new(params.clone(), config.clone());

    let mut hash_log = Vec::new();
    let mut divergence_tick = None;

    for _ in 0..config.ticks_for(horizon_days) {
        a.step(temperatures);
        b.step(temperatures);

        let (ha, hb) = (a.state_hash(), b.state_hash());
        let tick = a.tick();
        hash_log.push((tick, ha, hb));
        if ha != hb && divergence_tick.is_none() {
            divergence_tick = Some(tick);
        }
    }

    DeterminismResult {
        is_deterministic: divergence_tick.is_none(),
        divergence_tick,
        hash_log,
    }
}
