//! CSV persistence for trajectory tables.
//!
//! Headers are authoritative: columns are bound by name on read, whatever
//! their order on disk. Floats are written with Rust's shortest round-trip
//! formatting, so a write/read cycle reproduces every finite value exactly.

use std::path::Path;

use tracing::debug;

use jtrack_models::{Trajectory, FRAMES_COLUMN};

use super::table::{Column, ColumnData, Table};
use crate::error::{MediaError, MediaResult};
use crate::fs_utils::write_atomic;

/// Render a table as CSV bytes.
pub fn encode_table(table: &Table) -> MediaResult<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(table.column_names())?;

    let mut record: Vec<String> = Vec::with_capacity(table.columns().len());
    for row in 0..table.row_count() {
        record.clear();
        for column in table.columns() {
            record.push(match &column.data {
                ColumnData::Float(values) => format_value(values[row]),
                ColumnData::Index(values) => values[row].to_string(),
            });
        }
        writer.write_record(&record)?;
    }

    writer
        .into_inner()
        .map_err(|e| MediaError::Io(e.into_error()))
}

/// Parse CSV bytes into a table.
pub fn decode_table(bytes: &[u8]) -> MediaResult<Table> {
    let mut reader = csv::Reader::from_reader(bytes);
    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

    let mut data: Vec<ColumnData> = headers
        .iter()
        .map(|name| {
            if name == FRAMES_COLUMN {
                ColumnData::Index(Vec::new())
            } else {
                ColumnData::Float(Vec::new())
            }
        })
        .collect();

    for (line, record) in reader.records().enumerate() {
        let record = record?;
        for ((name, cell), column) in headers.iter().zip(record.iter()).zip(data.iter_mut()) {
            match column {
                ColumnData::Float(values) => values.push(parse_value(cell).ok_or_else(|| {
                    MediaError::schema(format!("row {}: '{}' is not a number in '{}'", line + 1, cell, name))
                })?),
                ColumnData::Index(values) => values.push(cell.trim().parse().map_err(|_| {
                    MediaError::schema(format!("row {}: '{}' is not a frame index", line + 1, cell))
                })?),
            }
        }
    }

    if headers.is_empty() {
        return Ok(Table::new());
    }

    Table::with_columns(
        headers
            .into_iter()
            .zip(data)
            .map(|(name, data)| Column { name, data })
            .collect(),
    )
}

fn format_value(value: f64) -> String {
    if value.is_nan() {
        String::new()
    } else {
        value.to_string()
    }
}

fn parse_value(cell: &str) -> Option<f64> {
    let cell = cell.trim();
    if cell.is_empty() {
        return Some(f64::NAN);
    }
    cell.parse().ok()
}

/// Write a table atomically to `path`.
pub async fn write_table(table: &Table, path: &Path) -> MediaResult<()> {
    let bytes = encode_table(table)?;
    write_atomic(path, &bytes).await?;
    debug!(
        path = %path.display(),
        rows = table.row_count(),
        columns = table.columns().len(),
        "Wrote table"
    );
    Ok(())
}

/// Read a table from `path`.
pub async fn read_table(path: &Path) -> MediaResult<Table> {
    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => MediaError::FileNotFound(path.to_path_buf()),
        _ => MediaError::Io(e),
    })?;
    decode_table(&bytes)
}

/// Serialize a raw trajectory: 99 columns, one row per record.
pub async fn serialize_trajectory(trajectory: &Trajectory, path: &Path) -> MediaResult<()> {
    write_table(&Table::from_trajectory(trajectory), path).await
}

/// Read a serialized table and check it carries the raw columns.
pub async fn deserialize_table(path: &Path) -> MediaResult<Table> {
    let table = read_table(path).await?;
    table.validate_raw()?;
    Ok(table)
}
