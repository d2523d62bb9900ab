//! Daily temperature files: whitespace-separated numbers, one per day.

use crate::loader::DataLoadError;
use dspop_core::temperature::TemperatureSeries;
use std::path::Path;
use tracing::warn;

/// Parse whitespace-separated temperatures. Values are returned as written,
/// including non-finite ones; validation happens when the series is built.
pub fn parse_temperatures(path: &Path, content: &str) -> Result<Vec<f64>, DataLoadError> {
    let mut daily = Vec::new();
    for (i, line) in content.lines().enumerate() {
        for token in line.split_whitespace() {
            let t = token.parse::<f64>().map_err(|_| DataLoadError::InvalidValue {
                file: path.to_path_buf(),
                line: i + 1,
                value: token.to_string(),
            })?;
            daily.push(t);
        }
    }
    Ok(daily)
}

/// Read a temperature file into raw daily values.
pub fn read_daily(path: &Path) -> Result<Vec<f64>, DataLoadError> {
    let content = std::fs::read_to_string(path)?;
    parse_temperatures(path, &content)
}

/// Read a temperature file into a validated series.
pub fn load_temperatures(path: &Path) -> Result<TemperatureSeries, DataLoadError> {
    let daily = read_daily(path)?;
    TemperatureSeries::new(daily).map_err(|source| DataLoadError::Temperature {
        file: path.to_path_buf(),
        source,
    })
}

/// Temperatures for a grid cell. A file that cannot be read or parsed
/// yields `None` so the cell is skipped rather than failing the run.
pub fn cell_temperatures(path: &Path) -> Option<Vec<f64>> {
    match read_daily(path) {
        Ok(daily) => Some(daily),
        Err(e) => {
            warn!(file = %path.display(), error = %e, "no temperatures for cell");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dspop_core::temperature::TemperatureError;
    use std::fs;
    use std::path::PathBuf;

    fn make_test_dir(suffix: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "dspop_data_temps_{suffix}_{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn cleanup(dir: &Path) {
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn mixed_separators() {
        let daily = parse_temperatures(Path::new("t.txt"), "1.5 2\n\t3.25\n\n-4\n").unwrap();
        assert_eq!(daily, vec![1.5, 2.0, 3.25, -4.0]);
    }

    #[test]
    fn bad_token_reports_line() {
        let err = parse_temperatures(Path::new("t.txt"), "1 2\n3 warm\n").unwrap_err();
        assert!(matches!(err, DataLoadError::InvalidValue { line: 2, .. }));
    }

    #[test]
    fn nan_is_kept_raw_but_rejected_as_series() {
        let dir = make_test_dir("nan");
        let path = dir.join("temps.txt");
        fs::write(&path, "10 11 NaN 12").unwrap();

        let daily = read_daily(&path).unwrap();
        assert_eq!(daily.len(), 4);
        assert!(daily[2].is_nan());

        let err = load_temperatures(&path).unwrap_err();
        assert!(matches!(
            err,
            DataLoadError::Temperature {
                source: TemperatureError::NonFinite { day: 2 },
                ..
            }
        ));
        cleanup(&dir);
    }

    #[test]
    fn empty_file_is_empty_series() {
        let dir = make_test_dir("empty");
        let path = dir.join("temps.txt");
        fs::write(&path, "\n").unwrap();
        let err = load_temperatures(&path).unwrap_err();
        assert!(matches!(
            err,
            DataLoadError::Temperature {
                source: TemperatureError::Empty,
                ..
            }
        ));
        cleanup(&dir);
    }

    #[test]
    fn unreadable_cell_file_is_absent() {
        assert_eq!(cell_temperatures(Path::new("/nonexistent/dspop/cell_0_0.txt")), None);
    }

    #[test]
    fn readable_cell_file_is_present() {
        let dir = make_test_dir("cell");
        let path = dir.join("cell.txt");
        fs::write(&path, "5\n6\n7\n").unwrap();
        assert_eq!(cell_temperatures(&path), Some(vec![5.0, 6.0, 7.0]));
        cleanup(&dir);
    }
}
