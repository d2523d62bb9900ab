//! Plain-text run reports.
//!
//! A cell report is a tab-separated daily table followed by summary
//! sections. Grid runs add one summary row per cell.

use dspop_core::grid::{CellOutcome, CellStatus, GridReport};
use dspop_core::history::{CellSummary, History, Series, StageStats};
use dspop_core::stage::Stage;
use std::fmt::Display;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("cannot create report {file}: {source}")]
    Create {
        file: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Stages reported individually; the female age classes are reported as
/// one aggregate column.
const TABLE_STAGES: [Stage; 6] = [
    Stage::Eggs,
    Stage::Instar1,
    Stage::Instar2,
    Stage::Instar3,
    Stage::Pupae,
    Stage::Males,
];

fn optional<T: Display>(value: Option<T>) -> String {
    value.map_or_else(|| "none".to_string(), |v| v.to_string())
}

/// The reported columns, in order, with their series.
fn columns(history: &History) -> Vec<(&'static str, &Series)> {
    let mut cols: Vec<(&'static str, &Series)> = TABLE_STAGES
        .iter()
        .map(|&s| (s.name(), history.stage(s)))
        .collect();
    cols.push(("females", history.females()));
    cols.push(("fruit", history.fruit()));
    cols
}

/// Write one row per simulated day, sampling every `ticks_per_day` ticks.
pub fn write_daily_table<W: Write>(
    out: &mut W,
    history: &History,
    ticks_per_day: usize,
) -> Result<(), ReportError> {
    let cols = columns(history);
    let stride = ticks_per_day.max(1);

    write!(out, "time")?;
    for (name, _) in &cols {
        write!(out, "\t{name}")?;
    }
    writeln!(out)?;

    let mut rows: Vec<_> = cols.iter().map(|(_, series)| series.every(stride)).collect();
    for sample in cols[0].1.every(stride) {
        write!(out, "{}", sample.time)?;
        for row in rows.iter_mut() {
            if let Some(s) = row.next() {
                write!(out, "\t{}", s.value)?;
            }
        }
        writeln!(out)?;
    }
    Ok(())
}

fn write_section<W, F>(out: &mut W, title: &str, summary: &CellSummary, field: F) -> Result<(), ReportError>
where
    W: Write,
    F: Fn(&StageStats) -> f64,
{
    writeln!(out, "{title}")?;
    for stage in TABLE_STAGES {
        writeln!(out, "{}\t{}", stage.name(), field(summary.stage(stage)))?;
    }
    writeln!(out, "females\t{}", field(&summary.females))?;
    Ok(())
}

/// Write totals, peaks, peak times and the event days of one run.
pub fn write_summary<W: Write>(out: &mut W, summary: &CellSummary) -> Result<(), ReportError> {
    write_section(out, "Total Cumulative Populations", summary, |s| s.total)?;
    writeln!(out, "all\t{}", summary.grand_total)?;
    write_section(out, "Peak Populations", summary, |s| s.max)?;
    write_section(out, "Peak Populations Day", summary, |s| s.max_time)?;
    writeln!(out, "Diapause crossing day\t{}", optional(summary.crossed_day))?;
    writeln!(out, "First female day\t{}", optional(summary.first_female_time))?;
    writeln!(out, "Fruit max day\t{}", optional(summary.max_fruit_day))?;
    writeln!(out, "Harvest day\t{}", optional(summary.harvest_day))?;
    Ok(())
}

/// Daily table, a blank line, then the summary.
pub fn write_cell_report<W: Write>(
    out: &mut W,
    history: &History,
    summary: &CellSummary,
    ticks_per_day: usize,
) -> Result<(), ReportError> {
    write_daily_table(out, history, ticks_per_day)?;
    writeln!(out)?;
    write_summary(out, summary)
}

/// Write a cell report to `path`.
pub fn save_cell_report(
    path: &Path,
    history: &History,
    summary: &CellSummary,
    ticks_per_day: usize,
) -> Result<(), ReportError> {
    let file = std::fs::File::create(path).map_err(|source| ReportError::Create {
        file: path.to_path_buf(),
        source,
    })?;
    let mut out = BufWriter::new(file);
    write_cell_report(&mut out, history, summary, ticks_per_day)?;
    out.flush()?;
    Ok(())
}

/// Write the header of a grid summary table.
pub fn write_grid_header<W: Write>(out: &mut W) -> Result<(), ReportError> {
    writeln!(
        out,
        "row\tcol\tstatus\tfemales_peak\tfemales_peak_day\tgrand_total\tcrossed_day\tfruit_max_day"
    )?;
    Ok(())
}

/// One row of the grid summary.
pub fn write_grid_row<W: Write>(out: &mut W, outcome: &CellOutcome) -> Result<(), ReportError> {
    let status = match &outcome.status {
        CellStatus::Completed => "completed".to_string(),
        CellStatus::Skipped(reason) => format!("skipped ({reason})"),
    };
    let s = &outcome.summary;
    writeln!(
        out,
        "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
        outcome.row,
        outcome.col,
        status,
        s.females.max,
        s.females.max_time,
        s.grand_total,
        optional(s.crossed_day),
        optional(s.max_fruit_day),
    )?;
    Ok(())
}

/// Closing lines of the grid summary.
pub fn write_grid_footer<W: Write>(out: &mut W, report: &GridReport) -> Result<(), ReportError> {
    writeln!(out)?;
    writeln!(out, "cells run\t{}", report.cells_run)?;
    writeln!(out, "cells skipped\t{}", report.cells_skipped)?;
    match report.peak {
        Some(peak) => writeln!(
            out,
            "peak cell\t{}\t{}\t{}\t{}",
            peak.row, peak.col, peak.females, peak.time
        )?,
        None => writeln!(out, "peak cell\tnone")?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dspop_core::grid::SkipReason;
    use dspop_core::params::ParameterSet;
    use dspop_core::sim::SimConfig;
    use dspop_core::test_utils::*;

    fn render<F>(f: F) -> String
    where
        F: FnOnce(&mut Vec<u8>) -> Result<(), ReportError>,
    {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn daily_table_has_one_row_per_day() {
        let params = single_stage_params(Stage::Females1, 10.0);
        let config = plain_config();
        let ticks_per_day = config.ticks_per_day() as usize;
        let cell = run_cell(params, config, &constant_temps(22.0), 10.0);

        let text = render(|out| write_daily_table(out, cell.history(), ticks_per_day));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "time\teggs\tinstar1\tinstar2\tinstar3\tpupae\tmales\tfemales\tfruit"
        );
        assert_eq!(lines.len(), 11);
        assert!(lines[1].starts_with("0\t"));
        for line in &lines[1..] {
            assert_eq!(line.split('\t').count(), 9);
        }
    }

    #[test]
    fn daily_table_samples_stride_from_first_tick() {
        let mut history = History::default();
        let mut pops = dspop_core::stage::StagePopulations::zero();
        for tick in 0..45 {
            pops[Stage::Eggs] = f64::from(tick);
            history.record(f64::from(tick) * 0.05, &pops, 0.05, 0.05);
        }

        let text = render(|out| write_daily_table(out, &history, 20));
        let eggs: Vec<&str> = text
            .lines()
            .skip(1)
            .map(|line| line.split('\t').nth(1).unwrap())
            .collect();
        assert_eq!(eggs, vec!["0", "20", "40"]);
    }

    #[test]
    fn empty_history_has_only_header() {
        let text = render(|out| write_daily_table(out, &History::default(), 20));
        assert_eq!(text.lines().count(), 1);
    }

    #[test]
    fn summary_sections_in_order() {
        let cell = run_cell(
            ParameterSet::default(),
            SimConfig::default(),
            &seasonal_temps(0.0, 28.0),
            365.0,
        );
        let text = render(|out| write_summary(out, &cell.summary()));

        let totals = text.find("Total Cumulative Populations").unwrap();
        let peaks = text.find("Peak Populations\n").unwrap();
        let days = text.find("Peak Populations Day").unwrap();
        let crossing = text.find("Diapause crossing day").unwrap();
        assert!(totals < peaks && peaks < days && days < crossing);
        assert!(text.contains("Fruit max day\t"));
        assert!(!text.contains("Diapause crossing day\tnone"));
    }

    #[test]
    fn missing_events_print_none() {
        let text = render(|out| write_summary(out, &CellSummary::default()));
        assert!(text.contains("Diapause crossing day\tnone"));
        assert!(text.contains("Harvest day\tnone"));
    }

    #[test]
    fn grid_rows_show_skips() {
        let outcome = CellOutcome {
            row: 1,
            col: 2,
            status: CellStatus::Skipped(SkipReason::MissingTemperatures),
            summary: CellSummary::default(),
            history: History::default(),
        };
        let text = render(|out| write_grid_row(out, &outcome));
        assert!(text.starts_with("1\t2\tskipped (no temperature data)\t0\t"));
    }

    #[test]
    fn grid_footer_without_peak() {
        let text = render(|out| write_grid_footer(out, &GridReport::default()));
        assert!(text.contains("cells run\t0"));
        assert!(text.contains("peak cell\tnone"));
    }
}
