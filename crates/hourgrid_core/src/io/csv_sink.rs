//! CSV writer for completed grids.

use crate::io::{IoError, IoResult, OUTPUT_TIMESTAMP_FORMAT};
use crate::model::observation::FieldValue;
use crate::model::schema::{ROW_ID_COLUMN, TIMESTAMP_COLUMN};
use crate::pipeline::CompleteGrid;
use csv::WriterBuilder;
use log::info;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Writes `grid` to `path`, replacing any existing file.
///
/// Rows go to a temporary file in the same directory that is renamed over
/// `path` only once complete; a failed write leaves `path` untouched.
pub fn write_grid_csv_file(grid: &CompleteGrid, path: impl AsRef<Path>) -> IoResult<()> {
    let path = path.as_ref();
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut staged = NamedTempFile::new_in(dir)?;
    write_grid_csv(grid, &mut staged)?;
    staged.as_file().sync_all()?;
    staged
        .persist(path)
        .map_err(|err| IoError::Io(err.error))?;
    info!(
        "event=write_output module=io status=ok format=csv path={} rows={}",
        path.display(),
        grid.len()
    );
    Ok(())
}

/// Writes one header row then one row per slot: `id,date_time,<fields>`.
pub fn write_grid_csv<W: Write>(grid: &CompleteGrid, writer: W) -> IoResult<()> {
    let mut writer = WriterBuilder::new().has_headers(false).from_writer(writer);

    let mut header = vec![ROW_ID_COLUMN.to_string(), TIMESTAMP_COLUMN.to_string()];
    header.extend(grid.schema().names().map(str::to_string));
    writer.write_record(&header)?;

    for (id, row) in grid.rows().iter().enumerate() {
        let mut record = Vec::with_capacity(row.values.len() + 2);
        record.push(id.to_string());
        record.push(row.timestamp.format(OUTPUT_TIMESTAMP_FORMAT).to_string());
        record.extend(row.values.iter().map(render_value));
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}

fn render_value(value: &FieldValue) -> String {
    match value {
        FieldValue::Numeric(number) => number.to_string(),
        FieldValue::Categorical(label) => label.clone(),
    }
}
