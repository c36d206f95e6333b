//! Tabular input and output adapters.
//!
//! # Responsibility
//! - Read a raw observation log from CSV into `Observation`s.
//! - Write a `CompleteGrid` as CSV with fixed-format timestamps.
//!
//! # Invariants
//! - Output timestamps never depend on locale.
//! - Only complete grids can be written.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod csv_sink;
pub mod csv_source;

pub use csv_sink::{write_grid_csv, write_grid_csv_file};
pub use csv_source::{read_observations, read_observations_file, CsvSourceOptions};

/// Fixed output timestamp format.
pub const OUTPUT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub type IoResult<T> = Result<T, IoError>;

#[derive(Debug)]
pub enum IoError {
    Io(std::io::Error),
    Csv(csv::Error),
    MissingColumn(String),
    InvalidTimestamp {
        line: u64,
        value: String,
    },
    InvalidNumber {
        line: u64,
        column: String,
        value: String,
    },
}

impl Display for IoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "{err}"),
            Self::Csv(err) => write!(f, "{err}"),
            Self::MissingColumn(name) => write!(f, "input is missing column `{name}`"),
            Self::InvalidTimestamp { line, value } => {
                write!(f, "line {line}: invalid timestamp `{value}`")
            }
            Self::InvalidNumber {
                line,
                column,
                value,
            } => write!(f, "line {line}: invalid number `{value}` in column `{column}`"),
        }
    }
}

impl Error for IoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Csv(err) => Some(err),
            Self::MissingColumn(_) | Self::InvalidTimestamp { .. } | Self::InvalidNumber { .. } => {
                None
            }
        }
    }
}

impl From<std::io::Error> for IoError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<csv::Error> for IoError {
    fn from(value: csv::Error) -> Self {
        Self::Csv(value)
    }
}
