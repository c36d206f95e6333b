//! JSON pipeline configuration.
//!
//! # Responsibility
//! - Describe one batch run: input log, schema, stage parameters, outputs.
//! - Convert raw configuration values into validated pipeline types.
//!
//! # Invariants
//! - Unknown keys are rejected.
//! - Relative paths are resolved against the configuration file directory.

use crate::io::CsvSourceOptions;
use crate::model::schema::{FieldSpec, Schema, TIMESTAMP_COLUMN};
use crate::pipeline::leap_day::LeapReference;
use crate::pipeline::short_horizon::OutageWindow;
use crate::pipeline::PipelineOptions;
use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

const CONFIG_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const CONFIG_DATE_FORMAT: &str = "%Y-%m-%d";

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug)]
pub enum ConfigError {
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse(serde_json::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "failed to parse config: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Read { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    pub input: InputConfig,
    pub fields: Vec<FieldSpec>,
    #[serde(default)]
    pub outage_window: Option<WindowConfig>,
    /// `YYYY-MM-DD`; must be a February 28. Defaults to the preceding year.
    #[serde(default)]
    pub leap_reference: Option<String>,
    #[serde(default = "default_lookback_years")]
    pub historical_lookback_years: u32,
    pub output: OutputConfig,
    #[serde(default)]
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InputConfig {
    pub path: PathBuf,
    #[serde(default = "default_timestamp_column")]
    pub timestamp_column: String,
    #[serde(default = "default_timestamp_format")]
    pub timestamp_format: String,
}

/// Inclusive outage bounds as `YYYY-MM-DD HH:MM:SS`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WindowConfig {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    pub csv_path: PathBuf,
    #[serde(default)]
    pub sqlite_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level_owned")]
    pub level: String,
    /// Absolute directory for rolling log files.
    pub dir: String,
}

fn default_lookback_years() -> u32 {
    1
}

fn default_timestamp_column() -> String {
    TIMESTAMP_COLUMN.to_string()
}

fn default_timestamp_format() -> String {
    CsvSourceOptions::default().timestamp_format
}

fn default_log_level_owned() -> String {
    crate::logging::default_log_level().to_string()
}

/// Reads and parses the config at `path`, resolving relative paths against
/// its directory.
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<PipelineConfig> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let mut config = PipelineConfig::from_json_str(&text)?;
    if let Some(base) = path.parent() {
        config.resolve_paths(base);
    }
    Ok(config)
}

impl PipelineConfig {
    pub fn from_json_str(text: &str) -> ConfigResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Makes input and output paths absolute relative to `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        let resolve = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };
        resolve(&mut self.input.path);
        resolve(&mut self.output.csv_path);
        if let Some(path) = self.output.sqlite_path.as_mut() {
            resolve(path);
        }
    }

    pub fn schema(&self) -> ConfigResult<Schema> {
        Schema::new(self.fields.clone()).map_err(|err| ConfigError::Invalid(err.to_string()))
    }

    pub fn csv_source_options(&self) -> CsvSourceOptions {
        CsvSourceOptions {
            timestamp_column: self.input.timestamp_column.clone(),
            timestamp_format: self.input.timestamp_format.clone(),
        }
    }

    pub fn pipeline_options(&self) -> ConfigResult<PipelineOptions> {
        let outage_window = match &self.outage_window {
            Some(window) => Some(
                OutageWindow::new(
                    parse_timestamp(&window.start, "outage_window.start")?,
                    parse_timestamp(&window.end, "outage_window.end")?,
                )
                .map_err(|err| ConfigError::Invalid(format!("outage_window: {err}")))?,
            ),
            None => None,
        };

        let leap_reference = match &self.leap_reference {
            Some(text) => {
                let date = NaiveDate::parse_from_str(text, CONFIG_DATE_FORMAT).map_err(|_| {
                    ConfigError::Invalid(format!(
                        "leap_reference `{text}` is not a YYYY-MM-DD date"
                    ))
                })?;
                LeapReference::fixed(date).map_err(|err| ConfigError::Invalid(err.to_string()))?
            }
            None => LeapReference::PrecedingYear,
        };

        if self.historical_lookback_years == 0 {
            return Err(ConfigError::Invalid(
                "historical_lookback_years must be at least 1".to_string(),
            ));
        }

        Ok(PipelineOptions {
            outage_window,
            leap_reference,
            historical_lookback_years: self.historical_lookback_years,
        })
    }
}

fn parse_timestamp(text: &str, key: &str) -> ConfigResult<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, CONFIG_TIMESTAMP_FORMAT).map_err(|_| {
        ConfigError::Invalid(format!(
            "{key} `{text}` is not a YYYY-MM-DD HH:MM:SS timestamp"
        ))
    })
}
