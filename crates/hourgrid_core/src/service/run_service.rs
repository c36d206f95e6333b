//! Batch reconstruction service.
//!
//! # Responsibility
//! - Run the pipeline and refuse to hand on grids with unresolved cells.
//! - Write the CSV output and, optionally, archive the run.
//!
//! # Invariants
//! - Nothing is written when the grid is incomplete.
//! - The archive only sees grids already written to CSV.

use crate::config::{ConfigError, PipelineConfig};
use crate::db::{open_db, DbError};
use crate::io::{read_observations_file, write_grid_csv_file, IoError};
use crate::model::observation::Observation;
use crate::pipeline::report::FillSummary;
use crate::pipeline::{CompleteGrid, IngestStats, Pipeline, PipelineError};
use crate::repo::grid_repo::{GridRepository, RepoError, RunId, SqliteGridRepository};
use log::{error, info};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug)]
pub enum ServiceError {
    Config(ConfigError),
    Io(IoError),
    Pipeline(PipelineError),
    Db(DbError),
    Repo(RepoError),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(err) => write!(f, "{err}"),
            Self::Io(err) => write!(f, "{err}"),
            Self::Pipeline(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            Self::Io(err) => Some(err),
            Self::Pipeline(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::Repo(err) => Some(err),
        }
    }
}

impl From<ConfigError> for ServiceError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<IoError> for ServiceError {
    fn from(value: IoError) -> Self {
        Self::Io(value)
    }
}

impl From<PipelineError> for ServiceError {
    fn from(value: PipelineError) -> Self {
        Self::Pipeline(value)
    }
}

impl From<DbError> for ServiceError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Complete grid plus ingestion accounting.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconstruction {
    pub grid: CompleteGrid,
    pub stats: IngestStats,
}

/// Outcome of one batch run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub stats: IngestStats,
    pub summary: FillSummary,
    pub slots: usize,
    pub archived_run: Option<RunId>,
}

pub struct RunService {
    pipeline: Pipeline,
}

impl RunService {
    pub fn new(pipeline: Pipeline) -> Self {
        Self { pipeline }
    }

    /// Runs the pipeline and enforces completeness.
    ///
    /// # Errors
    /// - `PipelineError::UnresolvableGaps` when any cell stays missing.
    pub fn reconstruct(&self, raw: Vec<Observation>) -> ServiceResult<Reconstruction> {
        let imputed = self.pipeline.run(raw)?;
        let stats = imputed.stats().clone();
        let grid = imputed.into_complete().map_err(|err| {
            error!(
                "event=reconstruct module=service status=error error_code=unresolvable_gaps error={}",
                err
            );
            err
        })?;
        Ok(Reconstruction { grid, stats })
    }

    /// Writes a finished reconstruction to `csv_path` and the optional archive.
    pub fn store(
        &self,
        reconstruction: Reconstruction,
        csv_path: &Path,
        archive: Option<&dyn GridRepository>,
    ) -> ServiceResult<RunReport> {
        let Reconstruction { grid, stats } = reconstruction;
        write_grid_csv_file(&grid, csv_path)?;

        let archived_run = match archive {
            Some(repo) => Some(repo.save_run(&grid)?),
            None => None,
        };

        Ok(RunReport {
            stats,
            summary: grid.summary(),
            slots: grid.len(),
            archived_run,
        })
    }
}

/// Executes the whole batch described by `config`.
pub fn run_from_config(config: &PipelineConfig) -> ServiceResult<RunReport> {
    let schema = config.schema()?;
    let options = config.pipeline_options()?;
    let raw = read_observations_file(&config.input.path, &schema, &config.csv_source_options())?;
    let service = RunService::new(Pipeline::new(schema, options)?);

    let reconstruction = service.reconstruct(raw)?;

    let report = match &config.output.sqlite_path {
        Some(path) => {
            let conn = open_db(path)?;
            let repo = SqliteGridRepository::new(&conn);
            service.store(reconstruction, &config.output.csv_path, Some(&repo))?
        }
        None => service.store(reconstruction, &config.output.csv_path, None)?,
    };

    info!(
        "event=batch_run module=service status=ok slots={} raw_records={} archived_run={}",
        report.slots,
        report.stats.raw_records,
        report
            .archived_run
            .map_or_else(|| "none".to_string(), |id| id.to_string())
    );
    Ok(report)
}
