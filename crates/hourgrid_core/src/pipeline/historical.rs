//! Same-time-of-year fill from earlier years.
//!
//! # Responsibility
//! - Fill every cell still missing after the short-horizon stage by copying
//!   the value recorded at the same month, day and hour one year earlier.
//!
//! # Invariants
//! - Slots are visited in chronological order; a value copied into an earlier
//!   slot in this pass is a valid source for a later one.
//! - Fields are resolved independently from the candidate slot.
//! - February 29 cells left missing await the leap-day stage; any other cell
//!   left missing is `Unresolved`.

use crate::model::cell::{FillState, Provenance};
use crate::pipeline::grid::HourlyGrid;
use crate::pipeline::Staged;
use chrono::{Datelike, NaiveDateTime};
use log::info;
use std::time::Instant;

/// `timestamp` shifted back `years` calendar years, keeping month, day and
/// time of day. `None` when that date does not exist (February 29).
pub fn years_back(timestamp: NaiveDateTime, years: u32) -> Option<NaiveDateTime> {
    let year = timestamp.year().checked_sub(i32::try_from(years).ok()?)?;
    timestamp
        .date()
        .with_year(year)
        .map(|date| date.and_time(timestamp.time()))
}

pub fn is_leap_day(timestamp: NaiveDateTime) -> bool {
    timestamp.month() == 2 && timestamp.day() == 29
}

/// Fills missing cells from `T - k years` for `k = 1..=lookback_years`,
/// nearest year first.
pub fn fill_from_prior_years(mut grid: HourlyGrid, lookback_years: u32) -> Staged {
    let started_at = Instant::now();
    let width = grid.schema().len();
    let mut filled = 0;
    let mut deferred = 0;

    for index in 0..grid.len() {
        let timestamp = grid.timestamp(index);
        for field in 0..width {
            if !grid.cell(index, field).awaits(FillState::AwaitingHistorical) {
                continue;
            }

            let source = (1..=lookback_years)
                .filter_map(|years| years_back(timestamp, years))
                .filter_map(|candidate| grid.index_of(candidate))
                .find_map(|source| grid.cell(source, field).value().cloned());

            match source {
                Some(value) => {
                    grid.cell_mut(index, field)
                        .resolve(value, Provenance::HistoricalYear);
                    filled += 1;
                }
                None if is_leap_day(timestamp) => {
                    grid.cell_mut(index, field)
                        .defer(FillState::AwaitingLeapFallback);
                    deferred += 1;
                }
                None => grid.cell_mut(index, field).defer(FillState::Unresolved),
            }
        }
    }

    info!(
        "event=stage_done module=pipeline stage=historical_year status=ok lookback_years={} filled={} leap_deferred={} duration_ms={}",
        lookback_years,
        filled,
        deferred,
        started_at.elapsed().as_millis()
    );

    Staged { grid, filled }
}

#[cfg(test)]
mod tests {
    use super::{is_leap_day, years_back};
    use chrono::{NaiveDate, NaiveDateTime};

    fn ts(year: i32, month: u32, day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(year, month, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    #[test]
    fn years_back_keeps_calendar_position() {
        assert_eq!(years_back(ts(2014, 10, 2, 9), 1), Some(ts(2013, 10, 2, 9)));
        assert_eq!(years_back(ts(2016, 3, 1, 0), 1), Some(ts(2015, 3, 1, 0)));
        assert_eq!(years_back(ts(2016, 2, 28, 23), 2), Some(ts(2014, 2, 28, 23)));
    }

    #[test]
    fn years_back_does_not_exist_for_leap_day() {
        assert_eq!(years_back(ts(2016, 2, 29, 5), 1), None);
        assert_eq!(years_back(ts(2016, 2, 29, 5), 4), Some(ts(2012, 2, 29, 5)));
        assert!(is_leap_day(ts(2016, 2, 29, 5)));
        assert!(!is_leap_day(ts(2015, 3, 1, 5)));
    }
}
