//! Domain model for grid reconstruction.
//!
//! # Responsibility
//! - Define the field schema shared by ingestion, imputation and output.
//! - Define the per-cell completion state carried through every stage.
//!
//! # Invariants
//! - Observations are keyed by timestamp and carry one value slot per field.
//! - A grid cell holds a value iff its state is `FillState::Resolved`.

pub mod cell;
pub mod observation;
pub mod schema;
