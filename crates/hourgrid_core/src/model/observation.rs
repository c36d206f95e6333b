//! Raw observation record.
//!
//! # Responsibility
//! - Carry one timestamped record of the irregular input log.
//! - Check record shape against a `Schema` before it enters the pipeline.
//!
//! # Invariants
//! - `values[i]` corresponds to `schema.fields()[i]`.
//! - `None` is the only missing marker; numeric values are finite.

use crate::model::schema::{FieldKind, Schema, SchemaError};
use chrono::NaiveDateTime;

/// One field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Numeric(f64),
    Categorical(String),
}

impl FieldValue {
    pub fn kind(&self) -> FieldKind {
        match self {
            Self::Numeric(_) => FieldKind::Numeric,
            Self::Categorical(_) => FieldKind::Categorical,
        }
    }

    pub fn as_numeric(&self) -> Option<f64> {
        match self {
            Self::Numeric(value) => Some(*value),
            Self::Categorical(_) => None,
        }
    }

    pub fn as_categorical(&self) -> Option<&str> {
        match self {
            Self::Numeric(_) => None,
            Self::Categorical(value) => Some(value.as_str()),
        }
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Numeric(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Categorical(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Categorical(value)
    }
}

/// Timestamped record of the input log.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// Identity key; unique after deduplication.
    pub timestamp: NaiveDateTime,
    /// One slot per schema field, `None` when missing.
    pub values: Vec<Option<FieldValue>>,
}

impl Observation {
    pub fn new(timestamp: NaiveDateTime, values: Vec<Option<FieldValue>>) -> Self {
        Self { timestamp, values }
    }

    /// Record with every field missing.
    /// Validates arity and per-field kinds against `schema`.
    pub fn check_shape(&self, schema: &Schema) -> Result<(), SchemaError> {
        if self.values.len() != schema.len() {
            return Err(SchemaError::ArityMismatch {
                expected: schema.len(),
                found: self.values.len(),
            });
        }

        for (value, field) in self.values.iter().zip(schema.fields()) {
            if let Some(value) = value {
                if value.kind() != field.kind {
                    return Err(SchemaError::KindMismatch {
                        field: field.name.clone(),
                        expected: field.kind,
                    });
                }
            }
        }

        Ok(())
    }
}
