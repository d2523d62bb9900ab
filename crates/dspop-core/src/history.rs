//! Per-tick history series and running statistics.

use serde::{Deserialize, Serialize};

use crate::stage::{STAGE_COUNT, Stage, StagePopulations};

/// One `(time, value)` observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub time: f64,
    pub value: f64,
}

/// Append-only sequence of samples, one per tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Series {
    samples: Vec<Sample>,
}

impl Series {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, time: f64, value: f64) {
        self.samples.push(Sample { time, value });
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn last(&self) -> Option<Sample> {
        self.samples.last().copied()
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().map(|s| s.value)
    }

    /// Every `stride`-th sample starting at the first.
    pub fn every(&self, stride: usize) -> impl Iterator<Item = Sample> + '_ {
        self.samples.iter().copied().step_by(stride.max(1))
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

/// Running maximum (with its time) and left-rectangle integral of a series.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StageStats {
    pub max: f64,
    pub max_time: f64,
    pub total: f64,
}

impl StageStats {
    fn record(&mut self, time: f64, value: f64, dt: f64) {
        if value > self.max {
            self.max = value;
            self.max_time = time;
        }
        self.total += value * dt;
    }
}

/// Everything a cell records while it runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct History {
    stages: [Series; STAGE_COUNT],
    females: Series,
    fruit: Series,
    stage_stats: [StageStats; STAGE_COUNT],
    female_stats: StageStats,
    first_female_time: Option<f64>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one tick.
    pub fn record(&mut self, time: f64, populations: &StagePopulations, fruit_quality: f64, dt: f64) {
        for (stage, value) in populations.iter() {
            let i = stage.index();
            self.stages[i].push(time, value);
            self.stage_stats[i].record(time, value, dt);
        }
        let females = populations.female_total();
        self.females.push(time, females);
        self.female_stats.record(time, females, dt);
        if self.first_female_time.is_none() && females > 0.0 {
            self.first_female_time = Some(time);
        }
        self.fruit.push(time, fruit_quality);
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Number of recorded ticks.
    pub fn len(&self) -> usize {
        self.fruit.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fruit.is_empty()
    }

    pub fn stage(&self, stage: Stage) -> &Series {
        &self.stages[stage.index()]
    }

    /// Sum of the female sub-stages.
    pub fn females(&self) -> &Series {
        &self.females
    }

    pub fn fruit(&self) -> &Series {
        &self.fruit
    }

    pub fn stats(&self, stage: Stage) -> &StageStats {
        &self.stage_stats[stage.index()]
    }

    pub fn female_stats(&self) -> &StageStats {
        &self.female_stats
    }

    pub fn first_female_time(&self) -> Option<f64> {
        self.first_female_time
    }

    /// Stage series in stage order, then females and fruit, with labels.
    pub fn named_series(&self) -> Vec<(&'static str, &Series)> {
        let mut out: Vec<(&'static str, &Series)> =
            Stage::ALL.iter().map(|&s| (s.name(), self.stage(s))).collect();
        out.push(("females", &self.females));
        out.push(("fruit", &self.fruit));
        out
    }
}

/// End-of-run statistics for one cell.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CellSummary {
    pub stages: [StageStats; STAGE_COUNT],
    /// Aggregate over the female sub-stages.
    pub females: StageStats,
    /// Sum of every stage total.
    pub grand_total: f64,
    pub crossed_day: Option<u32>,
    pub harvest_day: Option<u32>,
    pub max_fruit_day: Option<f64>,
    pub first_female_time: Option<f64>,
    pub ticks: u64,
}

impl CellSummary {
    pub fn stage(&self, stage: Stage) -> &StageStats {
        &self.stages[stage.index()]
    }
}
