//! CSV reader for exported mashing sensor logs.
//!
//! Accepts either the plant historian column names (`batch_no`,
//! `greast_case_weight`, ...) or the short names used throughout this crate.
//! Unknown columns are ignored.

use crate::ingest::types::{Batch, SensorReading};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use thiserror::Error;

/// Errors raised while reading a sensor log.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to open sensor log: {0}")]
    Io(#[from] std::io::Error),
    #[error("sensor log has no `{0}` column")]
    MissingColumn(&'static str),
    #[error("malformed row at line {line}: {message}")]
    Row { line: u64, message: String },
    #[error("unrecognised timestamp {value:?} at line {line}")]
    Timestamp { line: u64, value: String },
}

/// Column layout of one CSV record.
#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(alias = "batch_no")]
    batch: String,
    timestamp: String,
    #[serde(alias = "greast_case_weight", default, deserialize_with = "csv::invalid_option")]
    vessel_weight: Option<f64>,
    #[serde(
        alias = "sparging_mashing_water_flow",
        default,
        deserialize_with = "csv::invalid_option"
    )]
    water_flow: Option<f64>,
    #[serde(alias = "mashing_temp", default, deserialize_with = "csv::invalid_option")]
    mash_temp: Option<f64>,
    #[serde(
        alias = "mashing_sparging_water_temp",
        default,
        deserialize_with = "csv::invalid_option"
    )]
    water_temp: Option<f64>,
    #[serde(alias = "wort_receiver_temp", default, deserialize_with = "csv::invalid_option")]
    wort_temp: Option<f64>,
}

const BATCH_COLUMNS: [&str; 2] = ["batch", "batch_no"];
const TIMESTAMP_COLUMNS: [&str; 1] = ["timestamp"];

/// Naive formats tried after RFC 3339; all are taken as UTC.
const NAIVE_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"];

/// Parse a timestamp as written by the historian export.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Read every row of a sensor log.
pub fn read_readings<R: Read>(input: R) -> Result<Vec<SensorReading>, IngestError> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(input);

    let headers = reader.headers().map_err(row_error)?.clone();
    let has_any = |names: &[&str]| headers.iter().any(|h| names.contains(&h));
    if !has_any(&BATCH_COLUMNS) {
        return Err(IngestError::MissingColumn("batch_no"));
    }
    if !has_any(&TIMESTAMP_COLUMNS) {
        return Err(IngestError::MissingColumn("timestamp"));
    }

    let mut readings = Vec::new();
    for record in reader.records() {
        let record = record.map_err(row_error)?;
        // Physical line where the record starts; quoted fields may span lines.
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let row: CsvRow = record
            .deserialize(Some(&headers))
            .map_err(|e| IngestError::Row {
                line,
                message: e.to_string(),
            })?;
        let timestamp = parse_timestamp(&row.timestamp).ok_or_else(|| IngestError::Timestamp {
            line,
            value: row.timestamp.clone(),
        })?;

        readings.push(
            SensorReading {
                batch_id: row.batch,
                timestamp,
                vessel_weight: row.vessel_weight,
                water_flow: row.water_flow,
                mash_temp: row.mash_temp,
                water_temp: row.water_temp,
                wort_temp: row.wort_temp,
            }
            .normalized(),
        );
    }

    Ok(readings)
}

/// Split readings into per-batch timelines, ordered by batch number then id.
pub fn group_batches(readings: Vec<SensorReading>) -> Vec<Batch> {
    let mut grouped: HashMap<String, Vec<SensorReading>> = HashMap::new();
    for reading in readings {
        grouped.entry(reading.batch_id.clone()).or_default().push(reading);
    }

    let mut batches: Vec<Batch> = grouped
        .into_iter()
        .map(|(id, readings)| Batch::from_readings(id, readings))
        .collect();
    batches.sort_by(|a, b| (a.number(), &a.id).cmp(&(b.number(), &b.id)));
    batches
}

/// Read and group a sensor log from any reader.
pub fn read_batches<R: Read>(input: R) -> Result<Vec<Batch>, IngestError> {
    Ok(group_batches(read_readings(input)?))
}

/// Read and group the sensor log at `path`.
pub fn read_batches_from_path(path: &Path) -> Result<Vec<Batch>, IngestError> {
    let file = File::open(path)?;
    let batches = read_batches(file)?;
    tracing::info!(path = %path.display(), batches = batches.len(), "loaded sensor log");
    Ok(batches)
}

fn row_error(err: csv::Error) -> IngestError {
    let line = err.position().map(|p| p.line()).unwrap_or(0);
    IngestError::Row {
        line,
        message: err.to_string(),
    }
}
