//! Persistence contracts for completed grids.
//!
//! # Responsibility
//! - Define the run archive access contract.
//! - Keep SQL details out of the service layer.
//!
//! # Invariants
//! - Only `CompleteGrid`s are archived; partial grids have no storage shape.
//! - Read paths reject invalid persisted state instead of masking it.

pub mod grid_repo;
