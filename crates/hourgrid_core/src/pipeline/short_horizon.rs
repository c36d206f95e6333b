//! Short-horizon fill of the single known outage window.
//!
//! # Responsibility
//! - Fill numeric gaps with the mean of the two most recent known values.
//! - Forward-fill categorical gaps.
//!
//! # Invariants
//! - Slots are visited in chronological order and values written earlier in
//!   the pass are visible to later slots.
//! - The backward search spans the whole grid, not only the window.
//! - Grid cardinality never changes.

use crate::model::cell::{FillState, Provenance};
use crate::model::observation::FieldValue;
use crate::model::schema::FieldKind;
use crate::pipeline::grid::{GridError, HourlyGrid};
use crate::pipeline::Staged;
use chrono::NaiveDateTime;
use log::info;
use std::ops::Range;
use std::time::Instant;

/// Externally identified outage span, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutageWindow {
    start: NaiveDateTime,
    end: NaiveDateTime,
}

impl OutageWindow {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self, GridError> {
        if start > end {
            return Err(GridError::InvertedRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn end(&self) -> NaiveDateTime {
        self.end
    }

    pub fn contains(&self, timestamp: NaiveDateTime) -> bool {
        self.start <= timestamp && timestamp <= self.end
    }
}

/// Rolling pair of the two most recent known numeric values.
#[derive(Debug, Clone, Copy, Default)]
struct RecentPair {
    older: Option<f64>,
    latest: Option<f64>,
}

impl RecentPair {
    fn push(&mut self, value: f64) {
        self.older = self.latest;
        self.latest = Some(value);
    }

    fn mean(&self) -> Option<f64> {
        match (self.older, self.latest) {
            (Some(older), Some(latest)) => Some((older + latest) / 2.0),
            (None, Some(latest)) => Some(latest),
            _ => None,
        }
    }
}

/// Fills the outage window in place and hands the grid to the next stage.
///
/// Cells that cannot be filled (no earlier known value) move on to
/// `AwaitingHistorical`.
pub fn fill_outage_window(mut grid: HourlyGrid, window: &OutageWindow) -> Staged {
    let started_at = Instant::now();
    let range = grid.index_range(window.start, window.end);
    let kinds: Vec<FieldKind> = grid.schema().fields().iter().map(|f| f.kind).collect();

    let mut filled = 0;
    for (field, kind) in kinds.into_iter().enumerate() {
        filled += match kind {
            FieldKind::Numeric => fill_numeric(&mut grid, field, range.clone()),
            FieldKind::Categorical => fill_categorical(&mut grid, field, range.clone()),
        };
    }

    info!(
        "event=stage_done module=pipeline stage=short_horizon status=ok window_slots={} filled={} duration_ms={}",
        range.len(),
        filled,
        started_at.elapsed().as_millis()
    );

    Staged { grid, filled }
}

fn fill_numeric(grid: &mut HourlyGrid, field: usize, range: Range<usize>) -> usize {
    let mut recent = RecentPair::default();
    let mut seed: Vec<f64> = (0..range.start)
        .rev()
        .filter_map(|index| grid.cell(index, field).value().and_then(FieldValue::as_numeric))
        .take(2)
        .collect();
    while let Some(value) = seed.pop() {
        recent.push(value);
    }

    let mut filled = 0;
    for index in range {
        if let Some(value) = grid.cell(index, field).value().and_then(FieldValue::as_numeric) {
            recent.push(value);
            continue;
        }
        if !grid.cell(index, field).awaits(FillState::AwaitingShortHorizon) {
            continue;
        }

        match recent.mean() {
            Some(mean) => {
                grid.cell_mut(index, field)
                    .resolve(FieldValue::Numeric(mean), Provenance::ShortHorizon);
                recent.push(mean);
                filled += 1;
            }
            None => grid
                .cell_mut(index, field)
                .defer(FillState::AwaitingHistorical),
        }
    }

    filled
}

fn fill_categorical(grid: &mut HourlyGrid, field: usize, range: Range<usize>) -> usize {
    let mut last: Option<FieldValue> = (0..range.start)
        .rev()
        .find_map(|index| grid.cell(index, field).value().cloned());

    let mut filled = 0;
    for index in range {
        if let Some(value) = grid.cell(index, field).value() {
            last = Some(value.clone());
            continue;
        }
        if !grid.cell(index, field).awaits(FillState::AwaitingShortHorizon) {
            continue;
        }

        match &last {
            Some(value) => {
                grid.cell_mut(index, field)
                    .resolve(value.clone(), Provenance::ShortHorizon);
                filled += 1;
            }
            None => grid
                .cell_mut(index, field)
                .defer(FillState::AwaitingHistorical),
        }
    }

    filled
}

#[cfg(test)]
mod tests {
    use super::{fill_outage_window, OutageWindow, RecentPair};
    use crate::model::cell::{FillState, Provenance};
    use crate::model::observation::{FieldValue, Observation};
    use crate::model::schema::{FieldSpec, Schema};
    use crate::pipeline::align::align;
    use crate::pipeline::grid::{build_timeline, HourlyGrid};
    use chrono::{NaiveDate, NaiveDateTime};

    fn at(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2012, 10, 2)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn grid_with(values: &[Option<f64>], labels: &[Option<&str>], window: &OutageWindow) -> HourlyGrid {
        let schema = Schema::new(vec![
            FieldSpec::numeric("temp"),
            FieldSpec::categorical("weather_main"),
        ])
        .unwrap();
        let observations = values
            .iter()
            .zip(labels)
            .enumerate()
            .filter(|(_, (value, label))| value.is_some() || label.is_some())
            .map(|(hour, (value, label))| {
                Observation::new(
                    at(hour as u32),
                    vec![value.map(FieldValue::Numeric), label.map(FieldValue::from)],
                )
            })
            .collect();
        let timeline = build_timeline(at(0), at(values.len() as u32 - 1)).unwrap();
        align(schema, timeline, observations, Some(window))
            .unwrap()
            .grid
    }

    fn numeric(grid: &HourlyGrid, slot: usize) -> Option<f64> {
        grid.cell(slot, 0).value().and_then(FieldValue::as_numeric)
    }

    #[test]
    fn recent_pair_degrades_to_available_values() {
        let mut pair = RecentPair::default();
        assert_eq!(pair.mean(), None);
        pair.push(4.0);
        assert_eq!(pair.mean(), Some(4.0));
        pair.push(6.0);
        assert_eq!(pair.mean(), Some(5.0));
    }

    #[test]
    fn numeric_gap_uses_mean_of_two_preceding_values_recursively() {
        let window = OutageWindow::new(at(2), at(5)).unwrap();
        let grid = grid_with(
            &[Some(10.0), Some(20.0), None, None, Some(100.0), None],
            &[Some("Clouds"); 6],
            &window,
        );

        let staged = fill_outage_window(grid, &window);
        let grid = staged.grid;
        // 15 = mean(10, 20); 17.5 = mean(20, 15); slot 5 = mean(17.5, 100)
        assert_eq!(numeric(&grid, 2), Some(15.0));
        assert_eq!(numeric(&grid, 3), Some(17.5));
        assert_eq!(numeric(&grid, 4), Some(100.0));
        assert_eq!(numeric(&grid, 5), Some(58.75));
        assert_eq!(staged.filled, 3);
        assert_eq!(grid.cell(3, 0).state(), FillState::Resolved(Provenance::ShortHorizon));
    }

    #[test]
    fn backward_search_reaches_past_window_start_and_skips_gaps() {
        let window = OutageWindow::new(at(4), at(4)).unwrap();
        let grid = grid_with(
            &[Some(1.0), Some(3.0), None, None, None],
            &[Some("Clear"), None, None, None, None],
            &window,
        );

        let grid = fill_outage_window(grid, &window).grid;
        assert_eq!(numeric(&grid, 4), Some(2.0));
        assert_eq!(grid.cell(4, 1).value(), Some(&FieldValue::from("Clear")));
        // Outside the window nothing is touched.
        assert_eq!(grid.cell(2, 0).state(), FillState::AwaitingHistorical);
        assert_eq!(grid.cell(3, 1).state(), FillState::AwaitingHistorical);
    }

    #[test]
    fn categorical_gap_is_forward_filled_with_updates() {
        let window = OutageWindow::new(at(1), at(4)).unwrap();
        let grid = grid_with(
            &[Some(1.0); 5],
            &[Some("Rain"), None, Some("Snow"), None, None],
            &window,
        );

        let grid = fill_outage_window(grid, &window).grid;
        let labels: Vec<&str> = (0..5)
            .map(|slot| grid.cell(slot, 1).value().and_then(FieldValue::as_categorical).unwrap())
            .collect();
        assert_eq!(labels, vec!["Rain", "Rain", "Snow", "Snow", "Snow"]);
    }

    #[test]
    fn gap_without_history_is_deferred() {
        let window = OutageWindow::new(at(0), at(1)).unwrap();
        let grid = grid_with(&[None, None, Some(5.0)], &[None, None, Some("Mist")], &window);

        let staged = fill_outage_window(grid, &window);
        assert_eq!(staged.filled, 0);
        assert_eq!(staged.grid.cell(0, 0).state(), FillState::AwaitingHistorical);
        assert_eq!(staged.grid.cell(1, 1).state(), FillState::AwaitingHistorical);
    }
}
