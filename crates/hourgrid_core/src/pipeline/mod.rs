//! Tiered imputation pipeline.
//!
//! # Responsibility
//! - Turn an irregular, incomplete observation log into a gapless hourly grid.
//! - Run the stages strictly in order: deduplicate, build grid, align,
//!   short-horizon, historical-year, leap-day fallback.
//!
//! # Invariants
//! - Each stage takes the grid by value and hands it to the next; no stage
//!   keeps a reference after handoff.
//! - Within a stage slots are processed in chronological order.
//! - Residual missing cells are reported through `GapReport`, never hidden.

use crate::model::cell::{FillState, Provenance};
use crate::model::observation::{FieldValue, Observation};
use crate::model::schema::{Schema, SchemaError};
use chrono::NaiveDateTime;
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

pub mod align;
pub mod dedup;
pub mod grid;
pub mod historical;
pub mod leap_day;
pub mod report;
pub mod short_horizon;

use align::align;
use dedup::deduplicate;
use grid::{build_timeline, GridError, HourlyGrid};
use historical::fill_from_prior_years;
use leap_day::{resolve_leap_days, LeapReference};
use report::{FillSummary, GapReport, UnresolvedCell};
use short_horizon::{fill_outage_window, OutageWindow};

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineError {
    EmptyInput,
    Schema(SchemaError),
    /// Malformed grid; imputation never runs on it.
    Grid(GridError),
    InvalidOptions(String),
    /// Cells left missing after the final stage.
    UnresolvableGaps(GapReport),
}

impl Display for PipelineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyInput => write!(f, "observation log is empty"),
            Self::Schema(err) => write!(f, "{err}"),
            Self::Grid(err) => write!(f, "{err}"),
            Self::InvalidOptions(message) => write!(f, "invalid pipeline options: {message}"),
            Self::UnresolvableGaps(report) => write!(f, "unresolvable gaps: {report}"),
        }
    }
}

impl Error for PipelineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Schema(err) => Some(err),
            Self::Grid(err) => Some(err),
            Self::EmptyInput | Self::InvalidOptions(_) | Self::UnresolvableGaps(_) => None,
        }
    }
}

impl From<SchemaError> for PipelineError {
    fn from(value: SchemaError) -> Self {
        Self::Schema(value)
    }
}

impl From<GridError> for PipelineError {
    fn from(value: GridError) -> Self {
        Self::Grid(value)
    }
}

/// Grid handed from one stage to the next, with the number of cells filled.
#[derive(Debug, Clone, PartialEq)]
pub struct Staged {
    pub grid: HourlyGrid,
    pub filled: usize,
}

/// Externally supplied stage parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOptions {
    /// Span handled by the short-horizon stage; `None` skips that stage.
    pub outage_window: Option<OutageWindow>,
    pub leap_reference: LeapReference,
    /// How many years back the historical stage may look; `1` only tries
    /// `T - 1 year`.
    pub historical_lookback_years: u32,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            outage_window: None,
            leap_reference: LeapReference::default(),
            historical_lookback_years: 1,
        }
    }
}

/// What ingestion dropped before imputation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub raw_records: usize,
    pub exact_duplicates: usize,
    pub conflicting_records: usize,
    pub timestamp_conflicts: Vec<NaiveDateTime>,
    pub off_grid: usize,
}

/// Pipeline output before the completeness check.
#[derive(Debug, Clone, PartialEq)]
pub struct ImputedGrid {
    grid: HourlyGrid,
    stats: IngestStats,
    summary: FillSummary,
}

impl ImputedGrid {
    pub fn grid(&self) -> &HourlyGrid {
        &self.grid
    }

    pub fn stats(&self) -> &IngestStats {
        &self.stats
    }

    pub fn summary(&self) -> FillSummary {
        self.summary
    }

    pub fn gap_report(&self) -> GapReport {
        GapReport::from_grid(&self.grid).with_off_grid(self.stats.off_grid)
    }

    /// Converts into a `CompleteGrid`.
    ///
    /// # Errors
    /// - `PipelineError::UnresolvableGaps` listing every missing cell.
    pub fn into_complete(self) -> PipelineResult<CompleteGrid> {
        let Self {
            grid,
            stats,
            summary,
        } = self;
        let mut rows = Vec::with_capacity(grid.len());
        let mut unresolved = Vec::new();

        for slot in grid.slots() {
            let mut values = Vec::with_capacity(slot.cells().len());
            let mut provenance = Vec::with_capacity(slot.cells().len());
            for (cell, field) in slot.cells().iter().zip(grid.schema().fields()) {
                match (cell.value(), cell.state()) {
                    (Some(value), FillState::Resolved(source)) => {
                        values.push(value.clone());
                        provenance.push(source);
                    }
                    _ => unresolved.push(UnresolvedCell {
                        timestamp: slot.timestamp(),
                        field: field.name.clone(),
                    }),
                }
            }
            rows.push(CompleteRow {
                timestamp: slot.timestamp(),
                values,
                provenance,
            });
        }

        if !unresolved.is_empty() {
            return Err(PipelineError::UnresolvableGaps(
                GapReport::new(unresolved).with_off_grid(stats.off_grid),
            ));
        }

        Ok(CompleteGrid {
            schema: grid.schema().clone(),
            rows,
            summary,
        })
    }
}

/// One fully populated output row.
#[derive(Debug, Clone, PartialEq)]
pub struct CompleteRow {
    pub timestamp: NaiveDateTime,
    pub values: Vec<FieldValue>,
    pub provenance: Vec<Provenance>,
}

/// Gapless hourly grid with every field resolved.
///
/// The only shape handed to writers and the run archive.
#[derive(Debug, Clone, PartialEq)]
pub struct CompleteGrid {
    schema: Schema,
    rows: Vec<CompleteRow>,
    summary: FillSummary,
}

impl CompleteGrid {
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn rows(&self) -> &[CompleteRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn summary(&self) -> FillSummary {
        self.summary
    }

    pub fn start(&self) -> Option<NaiveDateTime> {
        self.rows.first().map(|row| row.timestamp)
    }

    pub fn end(&self) -> Option<NaiveDateTime> {
        self.rows.last().map(|row| row.timestamp)
    }
}

/// Configured pipeline over one schema.
#[derive(Debug, Clone)]
pub struct Pipeline {
    schema: Schema,
    options: PipelineOptions,
}

impl Pipeline {
    /// # Errors
    /// - `InvalidOptions` when `historical_lookback_years` is zero.
    pub fn new(schema: Schema, options: PipelineOptions) -> PipelineResult<Self> {
        if options.historical_lookback_years == 0 {
            return Err(PipelineError::InvalidOptions(
                "historical_lookback_years must be at least 1".to_string(),
            ));
        }
        Ok(Self { schema, options })
    }

    /// Runs every stage over `raw` in order.
    ///
    /// # Errors
    /// - `Schema` when a record does not match the schema.
    /// - `EmptyInput` when `raw` is empty.
    /// - `Grid` when the canonical grid cannot be built.
    pub fn run(&self, raw: Vec<Observation>) -> PipelineResult<ImputedGrid> {
        let started_at = Instant::now();
        let raw_records = raw.len();
        info!(
            "event=pipeline_run module=pipeline status=start records={} fields={}",
            raw_records,
            self.schema.len()
        );

        for observation in &raw {
            observation.check_shape(&self.schema)?;
        }

        let dedup = deduplicate(raw);
        info!(
            "event=stage_done module=pipeline stage=dedup status=ok kept={} exact_duplicates={} conflicting_records={}",
            dedup.observations.len(),
            dedup.exact_duplicates,
            dedup.conflicting_records
        );

        let (start, end) = observed_bounds(&dedup.observations).ok_or(PipelineError::EmptyInput)?;
        let timeline = build_timeline(start, end)?;
        info!(
            "event=stage_done module=pipeline stage=grid status=ok slots={} start={} end={}",
            timeline.len(),
            start,
            end
        );

        let aligned = align(
            self.schema.clone(),
            timeline,
            dedup.observations,
            self.options.outage_window.as_ref(),
        )?;
        let stats = IngestStats {
            raw_records,
            exact_duplicates: dedup.exact_duplicates,
            conflicting_records: dedup.conflicting_records,
            timestamp_conflicts: dedup.timestamp_conflicts,
            off_grid: aligned.off_grid,
        };
        info!(
            "event=stage_done module=pipeline stage=align status=ok missing_cells={}",
            aligned.grid.missing_count()
        );

        let grid = match &self.options.outage_window {
            Some(window) => fill_outage_window(aligned.grid, window).grid,
            None => aligned.grid,
        };
        let grid = fill_from_prior_years(grid, self.options.historical_lookback_years).grid;
        let grid = resolve_leap_days(grid, &self.options.leap_reference).grid;

        let summary = FillSummary::from_grid(&grid);
        if summary.unresolved > 0 {
            warn!(
                "event=pipeline_run module=pipeline status=incomplete unresolved_cells={} duration_ms={}",
                summary.unresolved,
                started_at.elapsed().as_millis()
            );
        } else {
            info!(
                "event=pipeline_run module=pipeline status=ok slots={} observed={} short_horizon={} historical_year={} leap_day_fallback={} duration_ms={}",
                grid.len(),
                summary.observed,
                summary.short_horizon,
                summary.historical_year,
                summary.leap_day_fallback,
                started_at.elapsed().as_millis()
            );
        }

        Ok(ImputedGrid {
            grid,
            stats,
            summary,
        })
    }
}

fn observed_bounds(observations: &[Observation]) -> Option<(NaiveDateTime, NaiveDateTime)> {
    let start = observations.iter().map(|o| o.timestamp).min()?;
    let end = observations.iter().map(|o| o.timestamp).max()?;
    Some((start, end))
}
