//! CSV reader for the raw observation log.
//!
//! Empty cells and non-finite numbers become missing values; columns not in
//! the schema are ignored.

use crate::io::{IoError, IoResult};
use crate::model::observation::{FieldValue, Observation};
use crate::model::schema::{FieldKind, Schema, TIMESTAMP_COLUMN};
use chrono::NaiveDateTime;
use csv::ReaderBuilder;
use log::info;
use std::fs::File;
use std::io::Read;
use std::path::Path;

const DEFAULT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Column naming and timestamp parsing for the raw log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvSourceOptions {
    pub timestamp_column: String,
    /// `chrono` format string, e.g. `%d-%m-%Y %H:%M`.
    pub timestamp_format: String,
}

impl Default for CsvSourceOptions {
    fn default() -> Self {
        Self {
            timestamp_column: TIMESTAMP_COLUMN.to_string(),
            timestamp_format: DEFAULT_TIMESTAMP_FORMAT.to_string(),
        }
    }
}

/// Reads the raw log at `path`.
pub fn read_observations_file(
    path: impl AsRef<Path>,
    schema: &Schema,
    options: &CsvSourceOptions,
) -> IoResult<Vec<Observation>> {
    let path = path.as_ref();
    let observations = read_observations(File::open(path)?, schema, options)?;
    info!(
        "event=read_input module=io status=ok path={} records={}",
        path.display(),
        observations.len()
    );
    Ok(observations)
}

/// Reads a raw log with a header row from `reader`, preserving row order.
pub fn read_observations<R: Read>(
    reader: R,
    schema: &Schema,
    options: &CsvSourceOptions,
) -> IoResult<Vec<Observation>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader.headers()?.clone();
    let column_of = |name: &str| {
        headers
            .iter()
            .position(|header| header == name)
            .ok_or_else(|| IoError::MissingColumn(name.to_string()))
    };
    let timestamp_column = column_of(&options.timestamp_column)?;
    let field_columns = schema
        .names()
        .map(column_of)
        .collect::<IoResult<Vec<usize>>>()?;

    let mut observations = Vec::new();
    for record in reader.records() {
        let record = record?;
        let line = record.position().map_or(0, |position| position.line());

        let raw_timestamp = record.get(timestamp_column).unwrap_or_default();
        let timestamp = NaiveDateTime::parse_from_str(raw_timestamp, &options.timestamp_format)
            .map_err(|_| IoError::InvalidTimestamp {
                line,
                value: raw_timestamp.to_string(),
            })?;

        let mut values = Vec::with_capacity(schema.len());
        for (field, column) in schema.fields().iter().zip(&field_columns) {
            let raw = record.get(*column).unwrap_or_default();
            values.push(parse_value(raw, field.kind).map_err(|_| IoError::InvalidNumber {
                line,
                column: field.name.clone(),
                value: raw.to_string(),
            })?);
        }

        observations.push(Observation::new(timestamp, values));
    }

    Ok(observations)
}

fn parse_value(raw: &str, kind: FieldKind) -> Result<Option<FieldValue>, std::num::ParseFloatError> {
    if raw.is_empty() {
        return Ok(None);
    }
    match kind {
        FieldKind::Numeric => {
            let value: f64 = raw.parse()?;
            Ok(value.is_finite().then_some(FieldValue::Numeric(value)))
        }
        FieldKind::Categorical => Ok(Some(FieldValue::Categorical(raw.to_string()))),
    }
}
