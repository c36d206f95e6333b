//! Left join of deduplicated observations onto the canonical timeline.
//!
//! # Invariants
//! - Output slot count equals timeline length.
//! - A cell is either an observed value or an explicit missing marker; no
//!   value is fabricated here.
//! - Missing cells inside the outage window await the short-horizon stage,
//!   all others await the historical-year stage.

use crate::model::cell::{Cell, FillState};
use crate::model::observation::Observation;
use crate::model::schema::Schema;
use crate::pipeline::grid::{GridError, HourlyGrid, Slot};
use crate::pipeline::short_horizon::OutageWindow;
use chrono::NaiveDateTime;
use log::warn;

#[derive(Debug, Clone, PartialEq)]
pub struct AlignOutcome {
    pub grid: HourlyGrid,
    /// Observations whose timestamp is not a grid slot.
    pub off_grid: usize,
}

/// Joins `observations` onto `timeline` keyed on exact timestamp equality.
///
/// `observations` must already be deduplicated; if two still share a slot the
/// first one wins and the rest count as off-grid.
pub fn align(
    schema: Schema,
    timeline: Vec<NaiveDateTime>,
    observations: Vec<Observation>,
    outage: Option<&OutageWindow>,
) -> Result<AlignOutcome, GridError> {
    let width = schema.len();
    let slots = timeline
        .into_iter()
        .map(|timestamp| {
            let state = match outage {
                Some(window) if window.contains(timestamp) => FillState::AwaitingShortHorizon,
                _ => FillState::AwaitingHistorical,
            };
            Slot::new(timestamp, vec![Cell::missing(state); width])
        })
        .collect();
    let mut grid = HourlyGrid::from_slots(schema, slots)?;

    let mut matched = vec![false; grid.len()];
    let mut off_grid = 0;
    for observation in observations {
        let Some(index) = grid.index_of(observation.timestamp) else {
            off_grid += 1;
            continue;
        };
        if matched[index] {
            off_grid += 1;
            continue;
        }
        matched[index] = true;

        for (field, value) in observation.values.into_iter().enumerate() {
            if let Some(value) = value {
                *grid.cell_mut(index, field) = Cell::observed(value);
            }
        }
    }

    if off_grid > 0 {
        warn!(
            "event=align module=pipeline status=ok off_grid_records={} note=records_not_on_hourly_grid",
            off_grid
        );
    }

    Ok(AlignOutcome { grid, off_grid })
}

#[cfg(test)]
mod tests {
    use super::align;
    use crate::model::cell::{FillState, Provenance};
    use crate::model::observation::{FieldValue, Observation};
    use crate::model::schema::{FieldSpec, Schema};
    use crate::pipeline::grid::build_timeline;
    use crate::pipeline::short_horizon::OutageWindow;
    use chrono::{Duration, NaiveDate, NaiveDateTime};

    fn at(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2013, 5, 1)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn schema() -> Schema {
        Schema::new(vec![
            FieldSpec::numeric("temp"),
            FieldSpec::categorical("weather_main"),
        ])
        .unwrap()
    }

    #[test]
    fn unmatched_slots_are_fully_missing() {
        let observations = vec![
            Observation::new(at(0), vec![Some(FieldValue::Numeric(280.0)), Some("Clear".into())]),
            Observation::new(at(3), vec![None, Some("Rain".into())]),
        ];
        let timeline = build_timeline(at(0), at(3)).unwrap();

        let outcome = align(schema(), timeline, observations, None).unwrap();
        let grid = outcome.grid;
        assert_eq!(grid.len(), 4);
        assert_eq!(outcome.off_grid, 0);

        assert_eq!(grid.cell(0, 0).state(), FillState::Resolved(Provenance::Observed));
        assert!(grid.slots()[1].cells().iter().all(|cell| cell.is_missing()));
        assert!(grid.slots()[2].cells().iter().all(|cell| cell.is_missing()));
        assert!(grid.cell(3, 0).is_missing());
        assert_eq!(grid.cell(3, 1).value(), Some(&FieldValue::from("Rain")));
        assert_eq!(grid.missing_count(), 5);
    }

    #[test]
    fn outage_window_marks_cells_for_short_horizon() {
        let window = OutageWindow::new(at(1), at(2)).unwrap();
        let timeline = build_timeline(at(0), at(3)).unwrap();

        let grid = align(schema(), timeline, Vec::new(), Some(&window))
            .unwrap()
            .grid;
        assert_eq!(grid.cell(0, 0).state(), FillState::AwaitingHistorical);
        assert_eq!(grid.cell(1, 0).state(), FillState::AwaitingShortHorizon);
        assert_eq!(grid.cell(2, 1).state(), FillState::AwaitingShortHorizon);
        assert_eq!(grid.cell(3, 1).state(), FillState::AwaitingHistorical);
    }

    #[test]
    fn off_hour_records_are_counted_not_merged() {
        let observations = vec![
            Observation::new(at(0), vec![Some(FieldValue::Numeric(1.0)), None]),
            Observation::new(
                at(0) + Duration::minutes(30),
                vec![Some(FieldValue::Numeric(2.0)), None],
            ),
            Observation::new(at(1), vec![Some(FieldValue::Numeric(3.0)), None]),
        ];
        let timeline = build_timeline(at(0), at(1)).unwrap();

        let outcome = align(schema(), timeline, observations, None).unwrap();
        assert_eq!(outcome.off_grid, 1);
        assert_eq!(outcome.grid.cell(0, 0).value(), Some(&FieldValue::Numeric(1.0)));
        assert_eq!(outcome.grid.cell(1, 0).value(), Some(&FieldValue::Numeric(3.0)));
    }
}
