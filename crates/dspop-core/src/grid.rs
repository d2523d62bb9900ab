//! Running many independent cells over a spatial grid.
//!
//! Cells are processed in row-major batches, one batch at a time. Each batch
//! has at most `workers` cells; every cell in it runs its whole tick loop on
//! a worker of a dedicated rayon pool, using one of a fixed set of pooled
//! [`CellSimulator`]s. The batch completes before the next one starts, so
//! the number of simulators and threads stays fixed regardless of grid size.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::cell::CellSimulator;
use crate::history::{CellSummary, History};
use crate::params::{GeneralParam, ParamError, ParamKey, ParameterSet};
use crate::sim::SimConfig;
use crate::temperature::{TemperatureError, TemperatureSeries};

// ---------------------------------------------------------------------------
// Configuration and inputs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub rows: usize,
    pub cols: usize,
    /// Worker threads, and simulators in the pool.
    pub workers: usize,
    pub horizon_days: f64,
    /// Hand each cell's full history to the sink. Summaries are always
    /// produced.
    pub keep_history: bool,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            rows: 1,
            cols: 1,
            workers: 2,
            horizon_days: 365.0,
            keep_history: true,
        }
    }
}

impl GridConfig {
    pub fn cell_count(&self) -> usize {
        self.rows * self.cols
    }
}

/// Inputs for one grid cell. `temperatures` is `None` when the source could
/// not be read.
#[derive(Debug, Clone, PartialEq)]
pub struct CellInput {
    pub row: usize,
    pub col: usize,
    pub latitude: f64,
    pub temperatures: Option<Vec<f64>>,
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Why a cell was not run.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SkipReason {
    #[error("no temperature data")]
    MissingTemperatures,
    #[error(transparent)]
    InvalidTemperatures(#[from] TemperatureError),
    #[error(transparent)]
    InvalidLatitude(#[from] ParamError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum CellStatus {
    Completed,
    Skipped(SkipReason),
}

/// Result of one grid cell. A skipped cell carries a default summary and an
/// empty history.
#[derive(Debug, Clone)]
pub struct CellOutcome {
    pub row: usize,
    pub col: usize,
    pub status: CellStatus,
    pub summary: CellSummary,
    pub history: History,
}

impl CellOutcome {
    fn skipped(input: &CellInput, reason: SkipReason) -> Self {
        Self {
            row: input.row,
            col: input.col,
            status: CellStatus::Skipped(reason),
            summary: CellSummary::default(),
            history: History::default(),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == CellStatus::Completed
    }
}

/// Cell with the highest female peak.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridPeak {
    pub row: usize,
    pub col: usize,
    pub females: f64,
    pub time: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GridReport {
    pub cells_run: usize,
    pub cells_skipped: usize,
    pub batches: usize,
    pub peak: Option<GridPeak>,
}

impl GridReport {
    fn observe(&mut self, outcome: &CellOutcome) {
        if !outcome.is_completed() {
            self.cells_skipped += 1;
            return;
        }
        self.cells_run += 1;
        let females = outcome.summary.females;
        let better = self.peak.is_none_or(|p| females.max > p.females);
        if better {
            self.peak = Some(GridPeak {
                row: outcome.row,
                col: outcome.col,
                females: females.max,
                time: females.max_time,
            });
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GridError {
    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("grid needs at least one worker")]
    NoWorkers,
    #[error("grid has {expected} cells but {actual} inputs were supplied")]
    InputCount { expected: usize, actual: usize },
    #[error("cell ({row}, {col}) is outside the grid")]
    OutOfBounds { row: usize, col: usize },
}

// ---------------------------------------------------------------------------
// GridRunner
// ---------------------------------------------------------------------------

pub struct GridRunner {
    config: GridConfig,
    template: ParameterSet,
    cells: Vec<CellSimulator>,
    pool: rayon::ThreadPool,
}

impl GridRunner {
    /// Build the worker pool and the pooled simulators. Pool construction
    /// failure is fatal for the run.
    pub fn new(
        config: GridConfig,
        template: ParameterSet,
        sim: SimConfig,
    ) -> Result<Self, GridError> {
        if config.workers == 0 {
            return Err(GridError::NoWorkers);
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.workers)
            .thread_name(|i| format!("dspop-cell-{i}"))
            .build()?;
        let cells = (0..config.workers)
            .map(|_| CellSimulator::new(template.clone(), sim.clone()))
            .collect();
        Ok(Self {
            config,
            template,
            cells,
            pool,
        })
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    /// Run every cell, handing each outcome to `sink` in row-major order.
    pub fn run<F>(&mut self, mut inputs: Vec<CellInput>, mut sink: F) -> Result<GridReport, GridError>
    where
        F: FnMut(CellOutcome),
    {
        let expected = self.config.cell_count();
        if inputs.len() != expected {
            return Err(GridError::InputCount {
                expected,
                actual: inputs.len(),
            });
        }
        if let Some(bad) = inputs
            .iter()
            .find(|c| c.row >= self.config.rows || c.col >= self.config.cols)
        {
            return Err(GridError::OutOfBounds {
                row: bad.row,
                col: bad.col,
            });
        }
        inputs.sort_by_key(|c| (c.row, c.col));

        tracing::info!(
            rows = self.config.rows,
            cols = self.config.cols,
            workers = self.config.workers,
            "grid run started"
        );

        let mut report = GridReport::default();
        let horizon = self.config.horizon_days;
        let keep_history = self.config.keep_history;
        let template = &self.template;
        let pool = &self.pool;

        for batch in inputs.chunks(self.config.workers) {
            let cells = &mut self.cells[..batch.len()];
            let outcomes: Vec<CellOutcome> = pool.install(|| {
                cells
                    .par_iter_mut()
                    .zip(batch.par_iter())
                    .map(|(cell, input)| run_cell(cell, input, template, horizon, keep_history))
                    .collect()
            });
            report.batches += 1;
            for outcome in outcomes {
                report.observe(&outcome);
                sink(outcome);
            }
        }

        tracing::info!(
            run = report.cells_run,
            skipped = report.cells_skipped,
            "grid run finished"
        );
        Ok(report)
    }

    /// [`run`](Self::run), collecting every outcome.
    pub fn run_collect(
        &mut self,
        inputs: Vec<CellInput>,
    ) -> Result<(Vec<CellOutcome>, GridReport), GridError> {
        let mut outcomes = Vec::with_capacity(inputs.len());
        let report = self.run(inputs, |o| outcomes.push(o))?;
        Ok((outcomes, report))
    }
}

fn run_cell(
    cell: &mut CellSimulator,
    input: &CellInput,
    template: &ParameterSet,
    horizon_days: f64,
    keep_history: bool,
) -> CellOutcome {
    cell.apply_template(template);
    cell.reset();

    let prepared = input
        .temperatures
        .clone()
        .ok_or(SkipReason::MissingTemperatures)
        .and_then(|daily| TemperatureSeries::new(daily).map_err(SkipReason::from))
        .and_then(|temps| {
            cell.set_param(ParamKey::General(GeneralParam::Latitude), input.latitude)?;
            Ok(temps)
        });
    let temps = match prepared {
        Ok(temps) => temps,
        Err(reason) => {
            tracing::warn!(row = input.row, col = input.col, %reason, "skipping cell");
            return CellOutcome::skipped(input, reason);
        }
    };

    cell.run(&temps, horizon_days);
    CellOutcome {
        row: input.row,
        col: input.col,
        status: CellStatus::Completed,
        summary: cell.summary(),
        history: if keep_history {
            cell.history().clone()
        } else {
            History::default()
        },
    }
}
