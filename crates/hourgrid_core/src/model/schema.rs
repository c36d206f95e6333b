//! Field schema declaration and validation.
//!
//! # Responsibility
//! - Declare the ordered set of numeric and categorical fields of a series.
//! - Reject names that cannot be emitted as output columns.
//!
//! # Invariants
//! - Field names are unique identifiers.
//! - Reserved output column names are never used as field names.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Output column carrying the zero-based row identifier.
pub const ROW_ID_COLUMN: &str = "id";
/// Output column carrying the slot timestamp.
pub const TIMESTAMP_COLUMN: &str = "date_time";

const RESERVED_COLUMNS: &[&str] = &[ROW_ID_COLUMN, TIMESTAMP_COLUMN];

static FIELD_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid field name regex"));

/// Value category of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Continuous measurement (temperature, precipitation, counts).
    Numeric,
    /// Label drawn from a small fixed or open set (holiday, weather).
    Categorical,
}

/// One declared field of the series.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
}

impl FieldSpec {
    pub fn numeric(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Numeric,
        }
    }

    pub fn categorical(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Categorical,
        }
    }
}

/// Schema validation and observation shape errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    Empty,
    InvalidName(String),
    DuplicateName(String),
    ReservedName(String),
    /// Observation carries a different number of values than the schema.
    ArityMismatch { expected: usize, found: usize },
    /// Observation value kind differs from the declared field kind.
    KindMismatch { field: String, expected: FieldKind },
}

impl Display for SchemaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "schema must declare at least one field"),
            Self::InvalidName(name) => write!(f, "invalid field name `{name}`"),
            Self::DuplicateName(name) => write!(f, "duplicate field name `{name}`"),
            Self::ReservedName(name) => {
                write!(f, "field name `{name}` is reserved for an output column")
            }
            Self::ArityMismatch { expected, found } => write!(
                f,
                "observation has {found} values, schema declares {expected} fields"
            ),
            Self::KindMismatch { field, expected } => {
                write!(f, "field `{field}` expects a {expected:?} value")
            }
        }
    }
}

impl Error for SchemaError {}

/// Ordered, validated field list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    fields: Vec<FieldSpec>,
}

impl Schema {
    /// Validates and builds a schema from declared fields.
    ///
    /// # Errors
    /// - `Empty` when no field is declared.
    /// - `InvalidName`, `ReservedName`, `DuplicateName` on bad names.
    pub fn new(fields: Vec<FieldSpec>) -> Result<Self, SchemaError> {
        if fields.is_empty() {
            return Err(SchemaError::Empty);
        }

        let mut seen = BTreeSet::new();
        for field in &fields {
            if !FIELD_NAME_RE.is_match(&field.name) {
                return Err(SchemaError::InvalidName(field.name.clone()));
            }
            if RESERVED_COLUMNS.contains(&field.name.as_str()) {
                return Err(SchemaError::ReservedName(field.name.clone()));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(SchemaError::DuplicateName(field.name.clone()));
            }
        }

        Ok(Self { fields })
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|field| field.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|field| field.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::{FieldSpec, Schema, SchemaError};

    #[test]
    fn accepts_identifier_names() {
        let schema = Schema::new(vec![
            FieldSpec::numeric("temp"),
            FieldSpec::categorical("weather_main"),
        ])
        .expect("valid schema");
        assert_eq!(schema.len(), 2);
        assert_eq!(schema.index_of("weather_main"), Some(1));
    }

    #[test]
    fn rejects_reserved_and_duplicate_names() {
        let reserved = Schema::new(vec![FieldSpec::numeric("date_time")]).unwrap_err();
        assert_eq!(reserved, SchemaError::ReservedName("date_time".to_string()));

        let duplicate = Schema::new(vec![
            FieldSpec::numeric("temp"),
            FieldSpec::categorical("temp"),
        ])
        .unwrap_err();
        assert_eq!(duplicate, SchemaError::DuplicateName("temp".to_string()));
    }

    #[test]
    fn rejects_non_identifier_and_empty() {
        assert!(matches!(
            Schema::new(vec![FieldSpec::numeric("rain 1h")]),
            Err(SchemaError::InvalidName(_))
        ));
        assert_eq!(Schema::new(Vec::new()).unwrap_err(), SchemaError::Empty);
    }
}
