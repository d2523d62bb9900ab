use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use dspop_core::cell::CellSimulator;
use dspop_core::grid::{CellInput, GridConfig, GridRunner};
use dspop_core::params::ParameterSet;
use dspop_core::sim::{Injection, SimConfig};
use dspop_data::loader::{load_parameters, load_sim_config};
use dspop_data::report::{self, ReportError};
use dspop_data::temperature::{cell_temperatures, load_temperatures};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "dspop")]
#[command(about = "Stage-structured insect population simulator")]
struct Cli {
    /// Log filter, e.g. "debug" or "dspop_core=debug" (overrides RUST_LOG)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one cell and write its daily table and summary
    Single(SingleArgs),
    /// Run a grid of cells in parallel batches
    Grid(GridArgs),
}

/// Options shared by both subcommands.
#[derive(Args, Debug)]
struct ModelArgs {
    /// Parameter file (name: value lines, or TOML/JSON/RON table)
    #[arg(long)]
    params: Option<PathBuf>,

    /// Run configuration file (TOML/JSON/RON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Drop fruit-quality effects on development and mortality
    #[arg(long)]
    ignore_fruit: bool,

    /// Bypass the diapause switch
    #[arg(long)]
    ignore_diapause: bool,

    /// Inject the initial populations on this elapsed day instead of at
    /// diapause exit
    #[arg(long)]
    start_day: Option<u32>,

    /// Initial count of the youngest adult females
    #[arg(long)]
    females: Option<f64>,

    /// Days to simulate
    #[arg(long, default_value = "365")]
    days: f64,
}

#[derive(Args, Debug)]
struct SingleArgs {
    /// Daily temperatures, whitespace-separated
    #[arg(long)]
    temps: PathBuf,

    /// Report file to write
    #[arg(long)]
    out: PathBuf,

    #[command(flatten)]
    model: ModelArgs,
}

#[derive(Args, Debug)]
struct GridArgs {
    #[arg(long)]
    rows: usize,

    #[arg(long)]
    cols: usize,

    /// Temperature file path with {row} and {col} placeholders
    #[arg(long)]
    temps_pattern: String,

    /// Latitude of row 0
    #[arg(long)]
    lat_start: f64,

    /// Latitude increment per row
    #[arg(long, default_value = "1")]
    lat_step: f64,

    /// Directory for per-cell reports and the grid summary
    #[arg(long)]
    out_dir: PathBuf,

    /// Worker threads
    #[arg(long, default_value = "2")]
    workers: usize,

    #[command(flatten)]
    model: ModelArgs,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref());

    match cli.command {
        Command::Single(args) => run_single(args),
        Command::Grid(args) => run_grid(args),
    }
}

fn init_tracing(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Resolve parameters and run configuration from files and flags. Flags
/// win over file contents.
fn build_model(args: &ModelArgs) -> Result<(ParameterSet, SimConfig)> {
    let mut params = match &args.params {
        Some(path) => load_parameters(path)?,
        None => ParameterSet::default(),
    };
    if let Some(count) = args.females {
        params
            .set_named("initial females1", count)
            .context("--females")?;
    }

    let mut config = match &args.config {
        Some(path) => load_sim_config(path)?,
        None => SimConfig::default(),
    };
    config.ignore_fruit |= args.ignore_fruit;
    config.ignore_diapause |= args.ignore_diapause;
    if let Some(day) = args.start_day {
        config.injection = Injection::OnDay(day);
    }
    if config.dt.is_nan() || config.dt <= 0.0 {
        bail!("dt must be positive, got {}", config.dt);
    }
    Ok((params, config))
}

fn run_single(args: SingleArgs) -> Result<()> {
    let (params, config) = build_model(&args.model)?;
    let temps = load_temperatures(&args.temps)?;
    let ticks_per_day = config.ticks_per_day() as usize;

    info!(temps = %args.temps.display(), days = args.model.days, "running single cell");
    let mut cell = CellSimulator::new(params, config);
    cell.run(&temps, args.model.days);

    let summary = cell.summary();
    report::save_cell_report(&args.out, cell.history(), &summary, ticks_per_day)?;
    info!(
        out = %args.out.display(),
        crossed_day = ?summary.crossed_day,
        females_peak = summary.females.max,
        "report written"
    );
    Ok(())
}

fn cell_path(pattern: &str, row: usize, col: usize) -> PathBuf {
    PathBuf::from(
        pattern
            .replace("{row}", &row.to_string())
            .replace("{col}", &col.to_string()),
    )
}

fn grid_inputs(args: &GridArgs) -> Vec<CellInput> {
    let mut inputs = Vec::with_capacity(args.rows * args.cols);
    for row in 0..args.rows {
        for col in 0..args.cols {
            inputs.push(CellInput {
                row,
                col,
                latitude: args.lat_start + args.lat_step * row as f64,
                temperatures: cell_temperatures(&cell_path(&args.temps_pattern, row, col)),
            });
        }
    }
    inputs
}

fn run_grid(args: GridArgs) -> Result<()> {
    let (params, config) = build_model(&args.model)?;
    let ticks_per_day = config.ticks_per_day() as usize;
    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("creating {}", args.out_dir.display()))?;

    let grid = GridConfig {
        rows: args.rows,
        cols: args.cols,
        workers: args.workers,
        horizon_days: args.model.days,
        keep_history: true,
    };
    let mut runner = GridRunner::new(grid, params, config)?;

    let summary_path = args.out_dir.join("grid_summary.tsv");
    let file = File::create(&summary_path)
        .with_context(|| format!("creating {}", summary_path.display()))?;
    let mut summary_out = BufWriter::new(file);
    report::write_grid_header(&mut summary_out)?;

    let out_dir = args.out_dir.as_path();
    let mut failure: Option<ReportError> = None;
    let result = runner.run(grid_inputs(&args), |outcome| {
        if failure.is_some() {
            return;
        }
        let written = report::write_grid_row(&mut summary_out, &outcome).and_then(|()| {
            if !outcome.is_completed() {
                return Ok(());
            }
            let path = cell_report_path(out_dir, outcome.row, outcome.col);
            report::save_cell_report(&path, &outcome.history, &outcome.summary, ticks_per_day)
        });
        if let Err(e) = written {
            error!(row = outcome.row, col = outcome.col, error = %e, "report failed");
            failure = Some(e);
        }
    })?;
    if let Some(e) = failure {
        return Err(e.into());
    }

    report::write_grid_footer(&mut summary_out, &result)?;
    summary_out.flush()?;
    info!(summary = %summary_path.display(), "grid summary written");
    Ok(())
}

fn cell_report_path(dir: &Path, row: usize, col: usize) -> PathBuf {
    dir.join(format!("cell_{row}_{col}.txt"))
}
