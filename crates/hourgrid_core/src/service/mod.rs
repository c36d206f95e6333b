//! Use-case services.
//!
//! # Responsibility
//! - Orchestrate ingestion, the imputation pipeline, output and archiving
//!   into batch-level entry points.
//! - Keep the CLI decoupled from storage and file format details.

pub mod run_service;
