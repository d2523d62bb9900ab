//! Parameter and run-configuration files.
//!
//! Parameter files come in two shapes: the legacy line format (`name: value`,
//! one per line, `.txt` or no extension) and a flat name-keyed table in
//! RON, TOML or JSON. Both resolve to the same flat map and are applied
//! through [`ParameterSet::apply_flat_map`], so a file either applies
//! completely or not at all.

use dspop_core::grid::GridConfig;
use dspop_core::params::{ParamError, ParamKey, ParameterSet};
use dspop_core::sim::SimConfig;
use dspop_core::temperature::TemperatureError;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::warn;

// ===========================================================================
// Errors
// ===========================================================================

/// Errors that can occur while loading input files.
#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    /// The file has an extension we don't support.
    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// A deserialization error occurred.
    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    /// A line of a text file holds a value that is not a number.
    #[error("invalid value on line {line} of {file}: {value:?}")]
    InvalidValue {
        file: PathBuf,
        line: usize,
        value: String,
    },

    /// The file parsed but the parameter set rejected it.
    #[error("rejected parameters in {file}: {source}")]
    Param {
        file: PathBuf,
        #[source]
        source: ParamError,
    },

    /// The temperatures parsed but do not form a usable series.
    #[error("unusable temperatures in {file}: {source}")]
    Temperature {
        file: PathBuf,
        #[source]
        source: TemperatureError,
    },

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Format detection
// ===========================================================================

/// Supported input file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
    /// `name: value` lines.
    Text,
}

/// Detect the format of a file based on its extension. Files without an
/// extension are read as text.
pub fn detect_format(path: &Path) -> Result<Format, DataLoadError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ron") => Ok(Format::Ron),
        Some("toml") => Ok(Format::Toml),
        Some("json") => Ok(Format::Json),
        Some("txt") | None => Ok(Format::Text),
        _ => Err(DataLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        }),
    }
}

// ===========================================================================
// Deserialization
// ===========================================================================

/// Read a structured file (RON/TOML/JSON) and deserialize it.
pub fn deserialize_file<T: DeserializeOwned>(path: &Path) -> Result<T, DataLoadError> {
    let parse_err = |detail: String| DataLoadError::Parse {
        file: path.to_path_buf(),
        detail,
    };

    match detect_format(path)? {
        Format::Ron => {
            let content = std::fs::read_to_string(path)?;
            ron::from_str(&content).map_err(|e| parse_err(e.to_string()))
        }
        Format::Json => {
            let content = std::fs::read_to_string(path)?;
            serde_json::from_str(&content).map_err(|e| parse_err(e.to_string()))
        }
        Format::Toml => {
            let content = std::fs::read_to_string(path)?;
            toml::from_str(&content).map_err(|e| parse_err(e.to_string()))
        }
        Format::Text => Err(DataLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        }),
    }
}

/// Parse `name: value` lines. Blank lines and lines with nothing after the
/// colon are skipped; a value that is not a number is an error.
pub fn parse_text_params(path: &Path, content: &str) -> Result<BTreeMap<String, f64>, DataLoadError> {
    let mut map = BTreeMap::new();
    for (i, line) in content.lines().enumerate() {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let (name, value) = (name.trim(), value.trim());
        if name.is_empty() || value.is_empty() {
            continue;
        }
        let parsed = value
            .parse::<f64>()
            .map_err(|_| DataLoadError::InvalidValue {
                file: path.to_path_buf(),
                line: i + 1,
                value: value.to_string(),
            })?;
        map.insert(name.to_string(), parsed);
    }
    Ok(map)
}

/// Read a flat name-keyed parameter map from any supported format.
pub fn read_param_map(path: &Path) -> Result<BTreeMap<String, f64>, DataLoadError> {
    match detect_format(path)? {
        Format::Text => {
            let content = std::fs::read_to_string(path)?;
            parse_text_params(path, &content)
        }
        _ => deserialize_file(path),
    }
}

// ===========================================================================
// Loading
// ===========================================================================

/// Load a parameter file over the defaults.
///
/// Names the model does not know are dropped with a warning, matching how
/// older parameter files carried extra entries. Every remaining value is
/// validated as one update.
pub fn load_parameters(path: &Path) -> Result<ParameterSet, DataLoadError> {
    let mut params = ParameterSet::default();
    apply_parameter_file(&mut params, path)?;
    Ok(params)
}

/// Apply a parameter file to an existing set. On error `params` is
/// unchanged.
pub fn apply_parameter_file(params: &mut ParameterSet, path: &Path) -> Result<(), DataLoadError> {
    let raw = read_param_map(path)?;
    let known: BTreeMap<String, f64> = raw
        .into_iter()
        .filter(|(name, _)| {
            let known = ParamKey::parse(name).is_some();
            if !known {
                warn!(file = %path.display(), name = %name, "ignoring unknown parameter");
            }
            known
        })
        .collect();

    params
        .apply_flat_map(&known, true)
        .map_err(|source| DataLoadError::Param {
            file: path.to_path_buf(),
            source,
        })
}

/// Load a [`SimConfig`] from RON, TOML or JSON. Missing fields take their
/// defaults.
pub fn load_sim_config(path: &Path) -> Result<SimConfig, DataLoadError> {
    deserialize_file(path)
}

/// Load a [`GridConfig`] from RON, TOML or JSON.
pub fn load_grid_config(path: &Path) -> Result<GridConfig, DataLoadError> {
    deserialize_file(path)
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use dspop_core::sim::Injection;
    use std::fs;

    fn make_test_dir(suffix: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "dspop_data_loader_{suffix}_{}",
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
    fn detect_format_by_extension() {
        assert_eq!(detect_format(Path::new("a.ron")).unwrap(), Format::Ron);
        assert_eq!(detect_format(Path::new("a.toml")).unwrap(), Format::Toml);
        assert_eq!(detect_format(Path::new("a.json")).unwrap(), Format::Json);
        assert_eq!(detect_format(Path::new("a.txt")).unwrap(), Format::Text);
        assert_eq!(detect_format(Path::new("params")).unwrap(), Format::Text);
        assert!(matches!(
            detect_format(Path::new("a.csv")),
            Err(DataLoadError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn text_params_skip_blank_values() {
        let content = "initial eggs: 12\n\nlatitude:\nmale proportion : 0.4\n";
        let map = parse_text_params(Path::new("p.txt"), content).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map["initial eggs"], 12.0);
        assert_eq!(map["male proportion"], 0.4);
    }

    #[test]
    fn text_params_reject_bad_number() {
        let err = parse_text_params(Path::new("p.txt"), "a: 1\nlatitude: north\n").unwrap_err();
        match err {
            DataLoadError::InvalidValue { line, value, .. } => {
                assert_eq!(line, 2);
                assert_eq!(value, "north");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn load_text_parameters_ignores_unknown_names() {
        let dir = make_test_dir("text");
        let path = dir.join("params.txt");
        fs::write(&path, "initial eggs: 5\nold setting: 3\nlatitude: 30\n").unwrap();

        let params = load_parameters(&path).unwrap();
        assert_eq!(params.get_named("initial eggs").unwrap(), 5.0);
        assert_eq!(params.get_named("latitude").unwrap(), 30.0);
        cleanup(&dir);
    }

    #[test]
    fn load_json_parameters() {
        let dir = make_test_dir("json");
        let path = dir.join("params.json");
        fs::write(&path, r#"{"initial females1": 20.0, "fruit harvest cutoff": 0.8}"#).unwrap();

        let params = load_parameters(&path).unwrap();
        assert_eq!(params.get_named("initial females1").unwrap(), 20.0);
        assert_eq!(params.fruit().harvest_cutoff, 0.8);
        cleanup(&dir);
    }

    #[test]
    fn load_toml_parameters() {
        let dir = make_test_dir("toml");
        let path = dir.join("params.toml");
        fs::write(&path, "\"eggs mortality max\" = 0.2\n\"diapause daylight hours\" = 13.5\n").unwrap();

        let params = load_parameters(&path).unwrap();
        assert_eq!(params.get_named("eggs mortality max").unwrap(), 0.2);
        assert_eq!(params.diapause().daylight_hours, 13.5);
        cleanup(&dir);
    }

    #[test]
    fn invalid_value_rejects_whole_file() {
        let dir = make_test_dir("reject");
        let path = dir.join("params.txt");
        fs::write(&path, "initial eggs: 5\nmale proportion: 1.5\n").unwrap();

        let mut params = ParameterSet::default();
        let before = params.clone();
        let err = apply_parameter_file(&mut params, &path).unwrap_err();
        assert!(matches!(err, DataLoadError::Param { .. }));
        assert!(err.to_string().contains("male proportion must be between 0 and 1 inclusive"));
        assert_eq!(params, before);
        cleanup(&dir);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_parameters(Path::new("/nonexistent/dspop/params.txt")).unwrap_err();
        assert!(matches!(err, DataLoadError::Io(_)));
    }

    #[test]
    fn load_sim_config_fills_defaults() {
        let dir = make_test_dir("sim_config");
        let path = dir.join("run.toml");
        fs::write(&path, "ignore_fruit = true\ninjection = { on_day = 90 }\n").unwrap();

        let config = load_sim_config(&path).unwrap();
        assert!(config.ignore_fruit);
        assert!(!config.ignore_diapause);
        assert_eq!(config.injection, Injection::OnDay(90));
        assert_eq!(config.dt, 0.05);
        cleanup(&dir);
    }

    #[test]
    fn load_sim_config_from_ron() {
        let dir = make_test_dir("sim_config_ron");
        let path = dir.join("run.ron");
        fs::write(&path, "(dt: 0.1, calendar_year: Some(2010))").unwrap();

        let config = load_sim_config(&path).unwrap();
        assert_eq!(config.dt, 0.1);
        assert_eq!(config.calendar_year, Some(2010));
        cleanup(&dir);
    }

    #[test]
    fn load_grid_config_from_json() {
        let dir = make_test_dir("grid_config");
        let path = dir.join("grid.json");
        fs::write(&path, r#"{"rows": 3, "cols": 4, "workers": 8}"#).unwrap();

        let config = load_grid_config(&path).unwrap();
        assert_eq!(config.cell_count(), 12);
        assert_eq!(config.workers, 8);
        cleanup(&dir);
    }

    #[test]
    fn text_config_is_unsupported() {
        let err = load_sim_config(Path::new("run.txt")).unwrap_err();
        assert!(matches!(err, DataLoadError::UnsupportedFormat { .. }));
    }

    #[test]
    fn text_file_is_never_read_as_toml() {
        let dir = make_test_dir("text_as_toml");
        let path = dir.join("run.txt");
        fs::write(&path, "ignore_fruit = true\n").unwrap();

        let err = load_sim_config(&path).unwrap_err();
        assert!(matches!(err, DataLoadError::UnsupportedFormat { .. }));
        cleanup(&dir);
    }
}
