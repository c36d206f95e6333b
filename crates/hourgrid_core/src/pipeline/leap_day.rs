//! February 29 fallback.
//!
//! A leap-day slot has no one-year-back counterpart, so cells the
//! historical-year stage deferred are copied from a February 28 reference
//! date at the same hour.

use crate::model::cell::{FillState, Provenance};
use crate::pipeline::grid::HourlyGrid;
use crate::pipeline::{PipelineError, PipelineResult, Staged};
use chrono::{Datelike, NaiveDate};
use log::info;
use std::time::Instant;

/// Source date for leap-day cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LeapReference {
    /// A specific February 28, used for every leap day.
    Fixed(NaiveDate),
    /// February 28 of the year before the leap day.
    #[default]
    PrecedingYear,
}

impl LeapReference {
    /// Fixed reference; `date` must be a February 28.
    pub fn fixed(date: NaiveDate) -> PipelineResult<Self> {
        if date.month() != 2 || date.day() != 28 {
            return Err(PipelineError::InvalidOptions(format!(
                "leap-day reference must be a February 28, got {date}"
            )));
        }
        Ok(Self::Fixed(date))
    }

    pub fn date_for(&self, leap_day: NaiveDate) -> Option<NaiveDate> {
        match self {
            Self::Fixed(date) => Some(*date),
            Self::PrecedingYear => NaiveDate::from_ymd_opt(leap_day.year() - 1, 2, 28),
        }
    }
}

/// Resolves `AwaitingLeapFallback` cells; anything left becomes `Unresolved`.
pub fn resolve_leap_days(mut grid: HourlyGrid, reference: &LeapReference) -> Staged {
    let started_at = Instant::now();
    let width = grid.schema().len();
    let mut filled = 0;

    for index in 0..grid.len() {
        let pending = grid.slots()[index]
            .cells()
            .iter()
            .any(|cell| cell.awaits(FillState::AwaitingLeapFallback));
        if !pending {
            continue;
        }

        let timestamp = grid.timestamp(index);
        let source = reference
            .date_for(timestamp.date())
            .map(|date| date.and_time(timestamp.time()))
            .and_then(|candidate| grid.index_of(candidate));

        for field in 0..width {
            if !grid.cell(index, field).awaits(FillState::AwaitingLeapFallback) {
                continue;
            }

            match source.and_then(|source| grid.cell(source, field).value().cloned()) {
                Some(value) => {
                    grid.cell_mut(index, field)
                        .resolve(value, Provenance::LeapDayFallback);
                    filled += 1;
                }
                None => grid.cell_mut(index, field).defer(FillState::Unresolved),
            }
        }
    }

    info!(
        "event=stage_done module=pipeline stage=leap_day status=ok filled={} duration_ms={}",
        filled,
        started_at.elapsed().as_millis()
    );

    Staged { grid, filled }
}
