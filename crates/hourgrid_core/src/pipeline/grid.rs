//! Canonical hourly grid construction and invariant checks.
//!
//! # Responsibility
//! - Generate the hourly timeline spanning the observed range.
//! - Own the aligned cells of every slot for the imputation stages.
//!
//! # Invariants
//! - Slot timestamps are strictly increasing with exactly one hour spacing.
//! - Every slot carries one cell per schema field.
//! - A grid that violates spacing is never constructed.

use crate::model::cell::Cell;
use crate::model::schema::Schema;
use chrono::{Duration, NaiveDateTime};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::ops::Range;

const SECONDS_PER_HOUR: i64 = 3_600;

/// Declared analysis resolution of the grid.
pub fn step() -> Duration {
    Duration::hours(1)
}

/// Grid construction and spacing errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GridError {
    Empty,
    InvertedRange {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },
    /// Adjacent slots are not exactly one hour apart.
    NonContiguous {
        index: usize,
        previous: NaiveDateTime,
        found: NaiveDateTime,
    },
    CellArity {
        index: usize,
        expected: usize,
        found: usize,
    },
}

impl Display for GridError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "grid has no slots"),
            Self::InvertedRange { start, end } => {
                write!(f, "grid range is inverted: start {start} is after end {end}")
            }
            Self::NonContiguous {
                index,
                previous,
                found,
            } => write!(
                f,
                "grid slot {index} at {found} does not follow {previous} by exactly one hour"
            ),
            Self::CellArity {
                index,
                expected,
                found,
            } => write!(
                f,
                "grid slot {index} has {found} cells, schema declares {expected} fields"
            ),
        }
    }
}

impl Error for GridError {}

/// Generates every hourly timestamp from `start` to `end` inclusive.
///
/// The step is the declared resolution, never inferred from the data, so a
/// sub-hourly `end` offset is truncated to the last full step.
pub fn build_timeline(
    start: NaiveDateTime,
    end: NaiveDateTime,
) -> Result<Vec<NaiveDateTime>, GridError> {
    if start > end {
        return Err(GridError::InvertedRange { start, end });
    }

    let hours = (end - start).num_seconds() / SECONDS_PER_HOUR;
    let mut timeline = Vec::with_capacity(usize::try_from(hours).unwrap_or(0) + 1);
    let mut current = start;
    while current <= end {
        timeline.push(current);
        current += step();
    }

    Ok(timeline)
}

/// Checks strict one-hour spacing over the whole timeline.
pub fn validate_timeline(timeline: &[NaiveDateTime]) -> Result<(), GridError> {
    if timeline.is_empty() {
        return Err(GridError::Empty);
    }

    for (offset, pair) in timeline.windows(2).enumerate() {
        if pair[1] - pair[0] != step() {
            return Err(GridError::NonContiguous {
                index: offset + 1,
                previous: pair[0],
                found: pair[1],
            });
        }
    }

    Ok(())
}

/// One grid position with its aligned cells.
#[derive(Debug, Clone, PartialEq)]
pub struct Slot {
    timestamp: NaiveDateTime,
    cells: Vec<Cell>,
}

impl Slot {
    pub fn new(timestamp: NaiveDateTime, cells: Vec<Cell>) -> Self {
        Self { timestamp, cells }
    }

    pub fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }
}

/// Hourly grid owned by exactly one pipeline stage at a time.
#[derive(Debug, Clone, PartialEq)]
pub struct HourlyGrid {
    schema: Schema,
    slots: Vec<Slot>,
}

impl HourlyGrid {
    /// Builds a grid after checking spacing and cell arity.
    ///
    /// # Errors
    /// - `GridError::Empty` for no slots.
    /// - `GridError::NonContiguous` when spacing is not exactly one hour.
    /// - `GridError::CellArity` when a slot does not match the schema width.
    pub fn from_slots(schema: Schema, slots: Vec<Slot>) -> Result<Self, GridError> {
        let timeline: Vec<NaiveDateTime> = slots.iter().map(Slot::timestamp).collect();
        validate_timeline(&timeline)?;

        for (index, slot) in slots.iter().enumerate() {
            if slot.cells.len() != schema.len() {
                return Err(GridError::CellArity {
                    index,
                    expected: schema.len(),
                    found: slot.cells.len(),
                });
            }
        }

        Ok(Self { schema, slots })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn start(&self) -> NaiveDateTime {
        self.slots[0].timestamp
    }

    pub fn end(&self) -> NaiveDateTime {
        self.slots[self.slots.len() - 1].timestamp
    }

    pub fn timestamp(&self, index: usize) -> NaiveDateTime {
        self.slots[index].timestamp
    }

    /// Slot index of an exact grid timestamp, if it lies on the grid.
    pub fn index_of(&self, timestamp: NaiveDateTime) -> Option<usize> {
        let seconds = (timestamp - self.start()).num_seconds();
        if seconds < 0 || seconds % SECONDS_PER_HOUR != 0 {
            return None;
        }
        let index = usize::try_from(seconds / SECONDS_PER_HOUR).ok()?;
        (index < self.slots.len()).then_some(index)
    }

    /// Indices of slots within `[start, end]`, clamped to the grid.
    pub fn index_range(&self, start: NaiveDateTime, end: NaiveDateTime) -> Range<usize> {
        if start > end || end < self.start() || start > self.end() {
            return 0..0;
        }

        let first = if start <= self.start() {
            0
        } else {
            let seconds = (start - self.start()).num_seconds();
            let whole = seconds / SECONDS_PER_HOUR;
            let partial = i64::from(seconds % SECONDS_PER_HOUR != 0);
            usize::try_from(whole + partial).unwrap_or(usize::MAX)
        };
        let last = usize::try_from((end - self.start()).num_seconds() / SECONDS_PER_HOUR)
            .unwrap_or(0)
            .min(self.slots.len() - 1);

        if first > last {
            return 0..0;
        }
        first..last + 1
    }

    pub fn cell(&self, slot: usize, field: usize) -> &Cell {
        &self.slots[slot].cells[field]
    }

    pub(crate) fn cell_mut(&mut self, slot: usize, field: usize) -> &mut Cell {
        &mut self.slots[slot].cells[field]
    }

    /// Total number of missing cells.
    pub fn missing_count(&self) -> usize {
        self.slots
            .iter()
            .map(|slot| slot.cells.iter().filter(|cell| cell.is_missing()).count())
            .sum()
    }
}
