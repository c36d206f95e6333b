//! Grid cell and per-cell completion state.
//!
//! # Responsibility
//! - Track, for every (slot, field), whether a value exists and which stage
//!   produced it.
//! - Make the terminal `Unresolved` outcome an explicit, queryable state.
//!
//! # Invariants
//! - `value.is_some()` iff `state` is `FillState::Resolved(_)`.
//! - A resolved cell is never rewritten by a later stage.

use crate::model::observation::FieldValue;

/// Stage that produced a resolved value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provenance {
    /// Present in the deduplicated input log.
    Observed,
    /// Rolling two-predecessor rule inside the outage window.
    ShortHorizon,
    /// Copied from the same hour one (or more) calendar years earlier.
    HistoricalYear,
    /// Copied from the February 28 reference date.
    LeapDayFallback,
}

impl Provenance {
    pub const ALL: [Provenance; 4] = [
        Provenance::Observed,
        Provenance::ShortHorizon,
        Provenance::HistoricalYear,
        Provenance::LeapDayFallback,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Observed => "observed",
            Self::ShortHorizon => "short_horizon",
            Self::HistoricalYear => "historical_year",
            Self::LeapDayFallback => "leap_day_fallback",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|provenance| provenance.as_str() == value)
    }
}

/// Completion state of one (slot, field) cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillState {
    Resolved(Provenance),
    AwaitingShortHorizon,
    AwaitingHistorical,
    AwaitingLeapFallback,
    /// Terminal: no stage could produce a value.
    Unresolved,
}

impl FillState {
    pub fn is_resolved(self) -> bool {
        matches!(self, Self::Resolved(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    value: Option<FieldValue>,
    state: FillState,
}

impl Cell {
    pub fn observed(value: FieldValue) -> Self {
        Self {
            value: Some(value),
            state: FillState::Resolved(Provenance::Observed),
        }
    }

    /// Missing cell waiting for the stage named by `state`.
    pub fn missing(state: FillState) -> Self {
        debug_assert!(!state.is_resolved());
        Self { value: None, state }
    }

    pub fn value(&self) -> Option<&FieldValue> {
        self.value.as_ref()
    }

    pub fn state(&self) -> FillState {
        self.state
    }

    pub fn is_missing(&self) -> bool {
        self.value.is_none()
    }

    /// Whether this cell is still missing and waiting for `state`.
    pub fn awaits(&self, state: FillState) -> bool {
        self.value.is_none() && self.state == state
    }

    pub(crate) fn resolve(&mut self, value: FieldValue, provenance: Provenance) {
        debug_assert!(self.value.is_none());
        self.value = Some(value);
        self.state = FillState::Resolved(provenance);
    }

    pub(crate) fn defer(&mut self, state: FillState) {
        debug_assert!(self.value.is_none() && !state.is_resolved());
        self.state = state;
    }
}
