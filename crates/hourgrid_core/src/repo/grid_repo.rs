//! Run archive repository and SQLite implementation.
//!
//! # Responsibility
//! - Store every cell of a completed grid with its provenance under a run ID.
//! - Read back run metadata, per-field series and provenance counts.
//!
//! # Invariants
//! - A run is written in a single transaction; readers never see half a run.
//! - Exactly one of `numeric_value` / `categorical_value` is set per cell.

use crate::db::DbError;
use crate::io::OUTPUT_TIMESTAMP_FORMAT;
use crate::model::cell::Provenance;
use crate::model::observation::FieldValue;
use crate::pipeline::report::FillSummary;
use crate::pipeline::CompleteGrid;
use chrono::NaiveDateTime;
use log::info;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier of one archived pipeline run.
pub type RunId = Uuid;

pub type RepoResult<T> = Result<T, RepoError>;

#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    NotFound(RunId),
    EmptyGrid,
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "run not found: {id}"),
            Self::EmptyGrid => write!(f, "cannot archive an empty grid"),
            Self::InvalidData(message) => write!(f, "invalid archived data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::NotFound(_) | Self::EmptyGrid | Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Archived run metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRecord {
    pub uuid: RunId,
    pub grid_start: NaiveDateTime,
    pub grid_end: NaiveDateTime,
    pub slot_count: usize,
    pub field_names: Vec<String>,
}

/// One archived cell of a single field.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredCell {
    pub slot_id: usize,
    pub timestamp: NaiveDateTime,
    pub value: FieldValue,
    pub provenance: Provenance,
}

/// Repository interface for the run archive.
pub trait GridRepository {
    fn save_run(&self, grid: &CompleteGrid) -> RepoResult<RunId>;
    fn get_run(&self, id: RunId) -> RepoResult<Option<RunRecord>>;
    /// Cells of `field` ordered by slot.
    fn load_field(&self, id: RunId, field: &str) -> RepoResult<Vec<StoredCell>>;
    fn provenance_counts(&self, id: RunId) -> RepoResult<FillSummary>;
}

/// SQLite-backed run archive.
pub struct SqliteGridRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteGridRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn ensure_run_exists(&self, id: RunId) -> RepoResult<()> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM imputation_runs WHERE uuid = ?1);",
            [id.to_string()],
            |row| row.get(0),
        )?;
        if exists == 0 {
            return Err(RepoError::NotFound(id));
        }
        Ok(())
    }
}

impl GridRepository for SqliteGridRepository<'_> {
    fn save_run(&self, grid: &CompleteGrid) -> RepoResult<RunId> {
        let (Some(start), Some(end)) = (grid.start(), grid.end()) else {
            return Err(RepoError::EmptyGrid);
        };

        let id = Uuid::new_v4();
        let field_names: Vec<&str> = grid.schema().names().collect();
        let field_names_json = serde_json::to_string(&field_names)
            .map_err(|err| RepoError::InvalidData(format!("field names: {err}")))?;

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO imputation_runs (uuid, grid_start, grid_end, slot_count, field_names)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                id.to_string(),
                format_timestamp(start),
                format_timestamp(end),
                i64::try_from(grid.len()).unwrap_or(i64::MAX),
                field_names_json,
            ],
        )?;

        {
            let mut insert = tx.prepare(
                "INSERT INTO grid_cells (
                    run_uuid,
                    slot_id,
                    date_time,
                    field,
                    numeric_value,
                    categorical_value,
                    provenance
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            )?;
            let run_uuid = id.to_string();
            for (slot_id, row) in grid.rows().iter().enumerate() {
                let date_time = format_timestamp(row.timestamp);
                for ((value, provenance), name) in row
                    .values
                    .iter()
                    .zip(&row.provenance)
                    .zip(&field_names)
                {
                    insert.execute(params![
                        run_uuid,
                        i64::try_from(slot_id).unwrap_or(i64::MAX),
                        date_time,
                        name,
                        value.as_numeric(),
                        value.as_categorical(),
                        provenance.as_str(),
                    ])?;
                }
            }
        }
        tx.commit()?;

        info!(
            "event=archive_run module=repo status=ok run_id={} slots={}",
            id,
            grid.len()
        );
        Ok(id)
    }

    fn get_run(&self, id: RunId) -> RepoResult<Option<RunRecord>> {
        let row = self
            .conn
            .query_row(
                "SELECT uuid, grid_start, grid_end, slot_count, field_names
                 FROM imputation_runs
                 WHERE uuid = ?1;",
                [id.to_string()],
                |row| {
                    Ok((
                        row.get::<_, String>("uuid")?,
                        row.get::<_, String>("grid_start")?,
                        row.get::<_, String>("grid_end")?,
                        row.get::<_, i64>("slot_count")?,
                        row.get::<_, String>("field_names")?,
                    ))
                },
            )
            .optional()?;

        let Some((uuid_text, start_text, end_text, slot_count, names_json)) = row else {
            return Ok(None);
        };

        let uuid = Uuid::parse_str(&uuid_text).map_err(|_| {
            RepoError::InvalidData(format!(
                "invalid uuid value `{uuid_text}` in imputation_runs.uuid"
            ))
        })?;
        let slot_count = usize::try_from(slot_count).map_err(|_| {
            RepoError::InvalidData(format!(
                "invalid slot_count `{slot_count}` in imputation_runs.slot_count"
            ))
        })?;
        let field_names: Vec<String> = serde_json::from_str(&names_json).map_err(|_| {
            RepoError::InvalidData(format!(
                "invalid field list `{names_json}` in imputation_runs.field_names"
            ))
        })?;

        Ok(Some(RunRecord {
            uuid,
            grid_start: parse_timestamp(&start_text, "imputation_runs.grid_start")?,
            grid_end: parse_timestamp(&end_text, "imputation_runs.grid_end")?,
            slot_count,
            field_names,
        }))
    }

    fn load_field(&self, id: RunId, field: &str) -> RepoResult<Vec<StoredCell>> {
        self.ensure_run_exists(id)?;

        let mut stmt = self.conn.prepare(
            "SELECT slot_id, date_time, numeric_value, categorical_value, provenance
             FROM grid_cells
             WHERE run_uuid = ?1 AND field = ?2
             ORDER BY slot_id ASC;",
        )?;
        let mut rows = stmt.query(params![id.to_string(), field])?;
        let mut cells = Vec::new();
        while let Some(row) = rows.next()? {
            cells.push(parse_cell_row(row)?);
        }

        Ok(cells)
    }

    fn provenance_counts(&self, id: RunId) -> RepoResult<FillSummary> {
        self.ensure_run_exists(id)?;

        let mut stmt = self.conn.prepare(
            "SELECT provenance, COUNT(*)
             FROM grid_cells
             WHERE run_uuid = ?1
             GROUP BY provenance;",
        )?;
        let mut rows = stmt.query([id.to_string()])?;
        let mut summary = FillSummary::default();
        while let Some(row) = rows.next()? {
            let name: String = row.get(0)?;
            let count: i64 = row.get(1)?;
            let count = usize::try_from(count).unwrap_or(0);
            match parse_provenance(&name)? {
                Provenance::Observed => summary.observed = count,
                Provenance::ShortHorizon => summary.short_horizon = count,
                Provenance::HistoricalYear => summary.historical_year = count,
                Provenance::LeapDayFallback => summary.leap_day_fallback = count,
            }
        }

        Ok(summary)
    }
}

fn parse_cell_row(row: &Row<'_>) -> RepoResult<StoredCell> {
    let slot_id: i64 = row.get("slot_id")?;
    let slot_id = usize::try_from(slot_id).map_err(|_| {
        RepoError::InvalidData(format!("invalid slot_id `{slot_id}` in grid_cells.slot_id"))
    })?;
    let date_time: String = row.get("date_time")?;

    let value = match (
        row.get::<_, Option<f64>>("numeric_value")?,
        row.get::<_, Option<String>>("categorical_value")?,
    ) {
        (Some(number), None) => FieldValue::Numeric(number),
        (None, Some(label)) => FieldValue::Categorical(label),
        _ => {
            return Err(RepoError::InvalidData(format!(
                "grid_cells slot {slot_id} must carry exactly one value"
            )));
        }
    };

    let provenance: String = row.get("provenance")?;
    Ok(StoredCell {
        slot_id,
        timestamp: parse_timestamp(&date_time, "grid_cells.date_time")?,
        value,
        provenance: parse_provenance(&provenance)?,
    })
}

fn parse_provenance(value: &str) -> RepoResult<Provenance> {
    Provenance::parse(value).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid provenance `{value}` in grid_cells.provenance"))
    })
}

fn format_timestamp(timestamp: NaiveDateTime) -> String {
    timestamp.format(OUTPUT_TIMESTAMP_FORMAT).to_string()
}

fn parse_timestamp(value: &str, column: &str) -> RepoResult<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, OUTPUT_TIMESTAMP_FORMAT).map_err(|_| {
        RepoError::InvalidData(format!("invalid timestamp `{value}` in {column}"))
    })
}
