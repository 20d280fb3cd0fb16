// EnergyDash - Measurement ingestion and alert fan-out
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! CSV ingestion pipeline.
//!
//! Parses the periodic tab-delimited export (comma decimals, day-first
//! timestamps) into [`MeasurementRow`]s keyed by canonical field names, and
//! hands batches to a [`MeasurementSink`].

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDateTime;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::catalog::MetricCatalog;
use crate::classifier::device_id;
use crate::config::IngestConfig;
use crate::error::{IngestError, Result};

/// One sampling interval worth of values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRow {
    /// Sample time (local wall clock of the export)
    pub timestamp: NaiveDateTime,
    /// Field key -> value; `None` for empty or malformed cells
    pub values: BTreeMap<String, Option<f64>>,
}

impl MeasurementRow {
    /// Value of `field`, if present and valid
    pub fn value(&self, field: &str) -> Option<f64> {
        self.values.get(field).copied().flatten()
    }
}

/// A data column and the field key its values are stored under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnField {
    /// Header as it appears in the export
    pub column: String,
    /// Canonical field key
    pub field: String,
}

/// Parsed export: data columns in file order plus rows.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    /// Data columns (timestamp column excluded), in file order
    pub columns: Vec<ColumnField>,
    /// Rows in file order until [`Dataset::sort_by_timestamp`] is called
    pub rows: Vec<MeasurementRow>,
    /// Number of non-empty cells that failed numeric parsing
    pub malformed_cells: usize,
}

impl Dataset {
    /// Sort rows by timestamp; rows with equal timestamps keep file order.
    pub fn sort_by_timestamp(&mut self) {
        self.rows.sort_by_key(|row| row.timestamp);
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if there are no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Raw column names, in file order
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.column.as_str())
    }

    /// Valid values of `field` with their timestamps, in row order
    pub fn series<'a>(&'a self, field: &'a str) -> impl Iterator<Item = (NaiveDateTime, f64)> + 'a {
        self.rows
            .iter()
            .filter_map(move |row| row.value(field).map(|v| (row.timestamp, v)))
    }
}

/// Destination for parsed rows (the relational store in production).
pub trait MeasurementSink {
    /// Error raised by the sink
    type Error;

    /// Insert all rows as one batch, returning the number inserted.
    /// A failure must leave nothing of the batch behind.
    fn insert_batch(&self, rows: &[MeasurementRow]) -> std::result::Result<usize, Self::Error>;
}

/// Parses exports and loads them into a sink.
#[derive(Debug, Clone)]
pub struct IngestPipeline {
    config: IngestConfig,
    catalog: Arc<MetricCatalog>,
}

impl IngestPipeline {
    /// Create a pipeline
    pub fn new(config: IngestConfig, catalog: Arc<MetricCatalog>) -> Self {
        Self { config, catalog }
    }

    /// Pipeline configuration
    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Field key for a data column: rename table, then catalog id, then slug.
    pub fn field_for(&self, column: &str) -> String {
        if let Some(field) = self.config.rename.get(column) {
            return field.clone();
        }
        match self.catalog.lookup(column) {
            Some(descriptor) => descriptor.id.clone(),
            None => device_id(column),
        }
    }

    /// Parse an export file
    pub fn parse_path(&self, path: impl AsRef<Path>) -> Result<Dataset> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let dataset = self.parse(file)?;
        info!(
            "Parsed {}: {} columns, {} rows",
            path.display(),
            dataset.columns.len(),
            dataset.rows.len()
        );
        Ok(dataset)
    }

    /// Parse an export from any reader
    pub fn parse<R: Read>(&self, reader: R) -> Result<Dataset> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.config.delimiter_byte())
            .has_headers(true)
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);

        let headers = reader.headers()?.clone();

        let timestamp_index = headers
            .iter()
            .position(|h| self.config.is_timestamp_column(h))
            .ok_or_else(|| IngestError::MissingTimestampColumn {
                expected: self.config.timestamp_columns.join(", "),
            })?;

        let mut columns: Vec<(usize, ColumnField)> = Vec::new();
        for (index, header) in headers.iter().enumerate() {
            if index == timestamp_index || self.config.is_timestamp_column(header) {
                continue;
            }
            let field = unique_field(self.field_for(header), header, &columns);
            columns.push((
                index,
                ColumnField {
                    column: header.to_string(),
                    field,
                },
            ));
        }

        let mut rows = Vec::new();
        let mut malformed_cells = 0;
        for result in reader.records() {
            let record = result?;
            let line = record.position().map(|p| p.line()).unwrap_or_default();
            if record.len() > headers.len() {
                return Err(IngestError::TooManyCells {
                    line,
                    found: record.len(),
                    expected: headers.len(),
                });
            }

            let raw_timestamp = record.get(timestamp_index).unwrap_or_default();
            let timestamp = parse_timestamp(raw_timestamp, &self.config.timestamp_formats)
                .ok_or_else(|| IngestError::InvalidTimestamp {
                    value: raw_timestamp.to_string(),
                    line,
                })?;

            let mut values = BTreeMap::new();
            for (index, column) in &columns {
                let cell = record.get(*index).unwrap_or_default();
                let value = parse_decimal(cell);
                if value.is_none() && !is_blank(cell) {
                    debug!(
                        "Line {}: ignoring malformed value '{}' in '{}'",
                        line, cell, column.column
                    );
                    malformed_cells += 1;
                }
                values.insert(column.field.clone(), value);
            }

            rows.push(MeasurementRow { timestamp, values });
        }

        Ok(Dataset {
            columns: columns.into_iter().map(|(_, c)| c).collect(),
            rows,
            malformed_cells,
        })
    }

    /// Insert `rows` into `sink` as a single batch
    pub fn load<S: MeasurementSink>(
        &self,
        sink: &S,
        rows: &[MeasurementRow],
    ) -> std::result::Result<usize, S::Error> {
        let inserted = sink.insert_batch(rows)?;
        info!("Loaded {} measurement rows", inserted);
        Ok(inserted)
    }
}

/// `field` unless an earlier column already claimed it; then the embedded
/// unit is appended, and failing that a counter.
fn unique_field(field: String, header: &str, taken: &[(usize, ColumnField)]) -> String {
    let is_taken = |candidate: &str| taken.iter().any(|(_, c)| c.field == candidate);
    if !is_taken(&field) {
        return field;
    }

    let unit = header
        .split_once('(')
        .map(|(_, rest)| device_id(rest.trim_end_matches(')')))
        .filter(|unit| unit != "unknown_device");
    let candidate = unit
        .map(|unit| format!("{field}_{unit}"))
        .filter(|candidate| !is_taken(candidate))
        .or_else(|| (2..).map(|n| format!("{field}_{n}")).find(|c| !is_taken(c)))
        .unwrap_or_else(|| field.clone());
    warn!(
        "Column '{}' maps to '{}' which is already used, storing it as '{}'",
        header, field, candidate
    );
    candidate
}

fn is_blank(cell: &str) -> bool {
    let cell = cell.trim();
    cell.is_empty() || cell.eq_ignore_ascii_case("nan") || cell == "-"
}

/// Parse a comma-decimal number. Blank, malformed and non-finite cells are `None`.
pub fn parse_decimal(cell: &str) -> Option<f64> {
    if is_blank(cell) {
        return None;
    }
    cell.trim()
        .replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

/// Parse a timestamp trying each format in order.
pub fn parse_timestamp(raw: &str, formats: &[String]) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    formats
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
}
