// EnergyDash - Measurement ingestion and alert fan-out
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Usage summaries and current readings.
//!
//! Flow and power metrics are integrated over the sampling interval (volume,
//! energy); every other metric is averaged. Results are formatted the Dutch
//! way: `.` groups thousands, `,` separates decimals.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::catalog::{DeviceDescriptor, MetricKind};
use crate::classifier::DefaultResolver;
use crate::config::GENERIC_ICON;
use crate::ingest::Dataset;

/// Aggregated usage of one device over a whole dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageSummary {
    #[serde(flatten)]
    pub device: DeviceDescriptor,
    /// Formatted aggregate; `None` when a level metric has no values
    pub usage: Option<String>,
    /// Unit of `usage` (`kWh` for a `kW` device)
    pub usage_unit: String,
    /// Aggregation family
    pub kind: MetricKind,
}

/// Freshest valid value of one device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentReading {
    #[serde(flatten)]
    pub device: DeviceDescriptor,
    /// Raw value
    pub value: Option<f64>,
    /// Formatted value
    pub display: Option<String>,
    /// Row the value was taken from
    pub timestamp: Option<NaiveDateTime>,
}

/// Aggregate a series. Integrated kinds sum and scale by `interval_hours`;
/// level metrics average. Returns `None` only for a level metric without values.
pub fn aggregate<I>(values: I, kind: MetricKind, interval_hours: f64) -> Option<f64>
where
    I: IntoIterator<Item = f64>,
{
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));

    if kind.is_integrated() {
        Some(sum * interval_hours)
    } else if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

/// Format with two decimals, `.` thousands grouping and `,` decimal mark.
pub fn format_locale(value: f64) -> String {
    let rounded = format!("{:.2}", value.abs());
    let (integer, fraction) = rounded.split_once('.').unwrap_or((rounded.as_str(), "00"));

    let mut grouped = String::with_capacity(integer.len() + integer.len() / 3);
    for (i, digit) in integer.chars().enumerate() {
        if i > 0 && (integer.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(digit);
    }

    let is_zero = integer.chars().all(|c| c == '0') && fraction.chars().all(|c| c == '0');
    let sign = if value.is_sign_negative() && !is_zero { "-" } else { "" };
    format!("{sign}{grouped},{fraction}")
}

fn descriptor_for(
    descriptors: &HashMap<String, DeviceDescriptor>,
    column: &str,
    field: &str,
) -> DeviceDescriptor {
    let mut descriptor = descriptors
        .get(column)
        .cloned()
        .unwrap_or_else(|| DefaultResolver::new(GENERIC_ICON).descriptor_for(column));
    descriptor.id = field.to_string();
    descriptor
}

/// One summary per data column, in column order.
pub fn summarize_usage(
    dataset: &Dataset,
    descriptors: &HashMap<String, DeviceDescriptor>,
    interval_hours: f64,
) -> Vec<UsageSummary> {
    dataset
        .columns
        .iter()
        .map(|column| {
            let device = descriptor_for(descriptors, &column.column, &column.field);
            let kind = device.kind();
            let total = aggregate(
                dataset.series(&column.field).map(|(_, v)| v),
                kind,
                interval_hours,
            );
            UsageSummary {
                usage: total.map(format_locale),
                usage_unit: kind.aggregate_unit(&device.unit),
                kind,
                device,
            }
        })
        .collect()
}

/// Freshest valid value per field with its source timestamp.
///
/// Fields are independent: each may come from a different row. Among rows
/// with the same timestamp the later one in file order wins.
pub fn current_values(dataset: &Dataset) -> BTreeMap<String, (NaiveDateTime, f64)> {
    let mut current: BTreeMap<String, (NaiveDateTime, f64)> = BTreeMap::new();
    for row in &dataset.rows {
        for (field, value) in &row.values {
            let Some(value) = value else { continue };
            match current.get(field) {
                Some((seen, _)) if *seen > row.timestamp => {}
                _ => {
                    current.insert(field.clone(), (row.timestamp, *value));
                }
            }
        }
    }
    current
}

/// One reading per data column, in column order.
pub fn current_readings(
    dataset: &Dataset,
    descriptors: &HashMap<String, DeviceDescriptor>,
) -> Vec<CurrentReading> {
    let current = current_values(dataset);
    dataset
        .columns
        .iter()
        .map(|column| {
            let device = descriptor_for(descriptors, &column.column, &column.field);
            let latest = current.get(&column.field);
            CurrentReading {
                device,
                value: latest.map(|(_, v)| *v),
                display: latest.map(|(_, v)| format_locale(*v)),
                timestamp: latest.map(|(ts, _)| *ts),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_format_locale() {
        assert_eq!(format_locale(2.0), "2,00");
        assert_eq!(format_locale(0.0), "0,00");
        assert_eq!(format_locale(1234.5), "1.234,50");
        assert_eq!(format_locale(1234567.891), "1.234.567,89");
        assert_eq!(format_locale(999.999), "1.000,00");
        assert_eq!(format_locale(-1234.5), "-1.234,50");
        assert_eq!(format_locale(-0.001), "0,00");
        assert_eq!(format_locale(100.0), "100,00");
    }

    #[test]
    fn test_aggregate_flow() {
        let total = aggregate([2.0, 2.0, 2.0, 2.0], MetricKind::Flow, 0.25).unwrap();
        assert_relative_eq!(total, 2.0);
    }

    #[test]
    fn test_aggregate_power_matches_flow() {
        let values = [1.5, 3.0, 0.5];
        assert_eq!(
            aggregate(values, MetricKind::Power, 0.25),
            aggregate(values, MetricKind::Flow, 0.25)
        );
    }

    #[test]
    fn test_aggregate_level() {
        let mean = aggregate([20.0, 22.0, 24.0], MetricKind::Level, 0.25).unwrap();
        assert_relative_eq!(mean, 22.0);
    }

    #[test]
    fn test_aggregate_empty() {
        assert_eq!(aggregate([], MetricKind::Level, 0.25), None);
        assert_eq!(aggregate([], MetricKind::Flow, 0.25), Some(0.0));
    }
}
