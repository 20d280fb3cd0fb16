// EnergyDash Store - SQLite persistence adapter
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Measurement rows: batch insert, latest rows, daily averages

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Duration, NaiveDate, NaiveDateTime};
use energydash::{MeasurementRow, MeasurementSink};
use log::{debug, info};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter};
use serde::Serialize;

use crate::error::{Result, StoreError};
use crate::schema::{is_persisted_field, MEASUREMENT_FIELDS, TIMESTAMP_FORMAT};
use crate::{to_limit, SqliteStore};

/// A persisted measurement row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredMeasurement {
    pub id: i64,
    pub timestamp: NaiveDateTime,
    /// One entry per schema column, `None` for missing values
    #[serde(flatten)]
    pub values: BTreeMap<String, Option<f64>>,
}

/// Per-field averages of one calendar day
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyAverage {
    pub date: NaiveDate,
    #[serde(flatten)]
    pub averages: BTreeMap<String, Option<f64>>,
}

fn parse_timestamp(value: String) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(&value, TIMESTAMP_FORMAT).map_err(|_| {
        StoreError::InvalidTimestamp {
            column: "timestamp",
            value,
        }
    })
}

fn field_list() -> String {
    MEASUREMENT_FIELDS.join(", ")
}

impl SqliteStore {
    /// Insert all rows in one transaction, returning the number inserted.
    ///
    /// Only schema fields are stored. If any row fails the whole batch is
    /// rolled back and nothing is persisted.
    pub fn insert_measurements(&self, rows: &[MeasurementRow]) -> Result<usize> {
        let skipped: BTreeSet<&str> = rows
            .iter()
            .flat_map(|row| row.values.keys())
            .map(String::as_str)
            .filter(|field| !is_persisted_field(field))
            .collect();
        if !skipped.is_empty() {
            debug!("Fields without a table column: {:?}", skipped);
        }

        let placeholders: Vec<String> = (1..=MEASUREMENT_FIELDS.len() + 1)
            .map(|i| format!("?{i}"))
            .collect();
        let sql = format!(
            "INSERT INTO measurements (timestamp, {}) VALUES ({})",
            field_list(),
            placeholders.join(", ")
        );

        let mut conn = self.lock()?;
        // Dropping the transaction without commit rolls it back.
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(&sql)?;
            for row in rows {
                let mut values = Vec::with_capacity(MEASUREMENT_FIELDS.len() + 1);
                values.push(Value::Text(row.timestamp.format(TIMESTAMP_FORMAT).to_string()));
                for field in MEASUREMENT_FIELDS {
                    values.push(match row.value(field) {
                        Some(v) => Value::Real(v),
                        None => Value::Null,
                    });
                }
                stmt.execute(params_from_iter(values))?;
            }
        }
        tx.commit()?;

        info!("Inserted {} measurement rows", rows.len());
        Ok(rows.len())
    }

    /// Newest rows first
    pub fn latest_measurements(&self, limit: usize) -> Result<Vec<StoredMeasurement>> {
        let sql = format!(
            "SELECT id, timestamp, {} FROM measurements ORDER BY timestamp DESC, id DESC LIMIT ?1",
            field_list()
        );

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let raw = stmt
            .query_map(params![to_limit(limit)], |row| {
                let id: i64 = row.get(0)?;
                let timestamp: String = row.get(1)?;
                let mut values = BTreeMap::new();
                for (i, field) in MEASUREMENT_FIELDS.iter().enumerate() {
                    values.insert(field.to_string(), row.get::<_, Option<f64>>(i + 2)?);
                }
                Ok((id, timestamp, values))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        raw.into_iter()
            .map(|(id, timestamp, values)| -> Result<StoredMeasurement> {
                Ok(StoredMeasurement {
                    id,
                    timestamp: parse_timestamp(timestamp)?,
                    values,
                })
            })
            .collect()
    }

    /// Per-day averages for the `days` days before `today` and `today` itself,
    /// newest day first. Days without rows are absent.
    pub fn daily_averages(&self, days: u32, today: NaiveDate) -> Result<Vec<DailyAverage>> {
        let since = today
            .checked_sub_signed(Duration::days(i64::from(days)))
            .unwrap_or(NaiveDate::MIN);
        let averages: Vec<String> = MEASUREMENT_FIELDS
            .iter()
            .map(|field| format!("AVG({field})"))
            .collect();
        let sql = format!(
            "SELECT date(timestamp) AS day, {} FROM measurements \
             WHERE date(timestamp) >= ?1 \
             GROUP BY day ORDER BY day DESC",
            averages.join(", ")
        );

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let raw = stmt
            .query_map(params![since.format("%Y-%m-%d").to_string()], |row| {
                let day: String = row.get(0)?;
                let mut averages = BTreeMap::new();
                for (i, field) in MEASUREMENT_FIELDS.iter().enumerate() {
                    averages.insert(field.to_string(), row.get::<_, Option<f64>>(i + 1)?);
                }
                Ok((day, averages))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        raw.into_iter()
            .map(|(day, averages)| -> Result<DailyAverage> {
                let date = NaiveDate::parse_from_str(&day, "%Y-%m-%d").map_err(|_| {
                    StoreError::InvalidTimestamp {
                        column: "timestamp",
                        value: day,
                    }
                })?;
                Ok(DailyAverage { date, averages })
            })
            .collect()
    }

    /// Number of stored rows
    pub fn measurement_count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM measurements", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }
}

impl MeasurementSink for SqliteStore {
    type Error = StoreError;

    fn insert_batch(&self, rows: &[MeasurementRow]) -> Result<usize> {
        self.insert_measurements(rows)
    }
}
