//! Post-pipeline gap report and fill accounting.

use crate::model::cell::{FillState, Provenance};
use crate::pipeline::grid::HourlyGrid;
use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

/// One (slot, field) that no stage could fill.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedCell {
    pub timestamp: NaiveDateTime,
    pub field: String,
}

/// Cells still missing after every stage ran.
///
/// A non-empty report is a defect in the input data (for example the same
/// hours missing in consecutive years) and is surfaced, never passed on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GapReport {
    cells: Vec<UnresolvedCell>,
    /// Input records dropped for not sitting on a grid slot.
    off_grid_records: usize,
}

impl GapReport {
    pub fn new(cells: Vec<UnresolvedCell>) -> Self {
        Self {
            cells,
            off_grid_records: 0,
        }
    }

    pub fn with_off_grid(mut self, records: usize) -> Self {
        self.off_grid_records = records;
        self
    }

    pub fn off_grid_records(&self) -> usize {
        self.off_grid_records
    }

    pub fn from_grid(grid: &HourlyGrid) -> Self {
        let mut cells = Vec::new();
        for slot in grid.slots() {
            for (cell, field) in slot.cells().iter().zip(grid.schema().fields()) {
                if cell.is_missing() {
                    cells.push(UnresolvedCell {
                        timestamp: slot.timestamp(),
                        field: field.name.clone(),
                    });
                }
            }
        }
        Self::new(cells)
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn cells(&self) -> &[UnresolvedCell] {
        &self.cells
    }

    /// Unresolved cell count per field name.
    pub fn by_field(&self) -> BTreeMap<&str, usize> {
        let mut counts = BTreeMap::new();
        for cell in &self.cells {
            *counts.entry(cell.field.as_str()).or_insert(0) += 1;
        }
        counts
    }
}

impl Display for GapReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.cells.first() {
            None => write!(f, "no unresolved cells")?,
            Some(first) => write!(
                f,
                "{} unresolved cells, first `{}` at {}",
                self.cells.len(),
                first.field,
                first.timestamp
            )?,
        }
        if self.off_grid_records > 0 {
            write!(
                f,
                "; {} input records were off the hourly grid",
                self.off_grid_records
            )?;
        }
        Ok(())
    }
}

/// Cell counts by final state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FillSummary {
    pub observed: usize,
    pub short_horizon: usize,
    pub historical_year: usize,
    pub leap_day_fallback: usize,
    pub unresolved: usize,
}

impl FillSummary {
    pub fn from_grid(grid: &HourlyGrid) -> Self {
        let mut summary = Self::default();
        for cell in grid.slots().iter().flat_map(|slot| slot.cells()) {
            match cell.state() {
                FillState::Resolved(provenance) => *summary.slot_for(provenance) += 1,
                _ => summary.unresolved += 1,
            }
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.observed
            + self.short_horizon
            + self.historical_year
            + self.leap_day_fallback
            + self.unresolved
    }

    fn slot_for(&mut self, provenance: Provenance) -> &mut usize {
        match provenance {
            Provenance::Observed => &mut self.observed,
            Provenance::ShortHorizon => &mut self.short_horizon,
            Provenance::HistoricalYear => &mut self.historical_year,
            Provenance::LeapDayFallback => &mut self.leap_day_fallback,
        }
    }
}
