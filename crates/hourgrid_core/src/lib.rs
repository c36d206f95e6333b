//! Core library for hourly grid reconstruction.
//! This crate is the single source of truth for pipeline invariants.

pub mod config;
pub mod db;
pub mod io;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod repo;
pub mod service;

pub use config::{load_config, ConfigError, PipelineConfig};
pub use io::{IoError, IoResult};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::cell::{Cell, FillState, Provenance};
pub use model::observation::{FieldValue, Observation};
pub use model::schema::{FieldKind, FieldSpec, Schema, SchemaError};
pub use pipeline::grid::{GridError, HourlyGrid};
pub use pipeline::leap_day::LeapReference;
pub use pipeline::report::{FillSummary, GapReport, UnresolvedCell};
pub use pipeline::short_horizon::OutageWindow;
pub use pipeline::{
    CompleteGrid, CompleteRow, ImputedGrid, IngestStats, Pipeline, PipelineError, PipelineOptions,
    PipelineResult,
};
pub use repo::grid_repo::{
    GridRepository, RepoError, RepoResult, RunId, RunRecord, SqliteGridRepository, StoredCell,
};
pub use service::run_service::{run_from_config, RunReport, RunService, ServiceError};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
