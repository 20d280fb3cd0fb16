//! Integration tests for export ingestion and usage summaries

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use std::result::Result;

use approx::assert_relative_eq;
use chrono::{NaiveDate, NaiveDateTime};
use energydash::*;
use tempfile::NamedTempFile;

fn at(h: u32, m: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 1)
        .unwrap()
        .and_hms_opt(h, m, 0)
        .unwrap()
}

fn pipeline() -> IngestPipeline {
    IngestPipeline::new(IngestConfig::default(), Arc::new(MetricCatalog::builtin()))
}

async fn descriptors(dataset: &Dataset) -> HashMap<String, DeviceDescriptor> {
    ColumnClassifier::offline(&ClassifierConfig::default(), Arc::new(MetricCatalog::builtin()))
        .classify_all(dataset.column_names())
        .await
}

#[test]
fn test_current_value_skips_missing_cells() {
    let export = "Tijdstip\tAccuniveau (%)\n\
                  01-03-2024 10:00\t5\n\
                  01-03-2024 10:15\t\n\
                  01-03-2024 10:30\t7\n";
    let dataset = pipeline().parse(export.as_bytes()).unwrap();

    let current = current_values(&dataset);
    assert_eq!(current["battery_level"], (at(10, 30), 7.0));
}

#[test]
fn test_current_values_are_per_column() {
    let export = "Tijdstip\tAccuniveau (%)\tLuchtdruk (hPa)\n\
                  01-03-2024 10:00\t50\t1012\n\
                  01-03-2024 10:15\t51\t\n";
    let dataset = pipeline().parse(export.as_bytes()).unwrap();

    let current = current_values(&dataset);
    assert_eq!(current["battery_level"], (at(10, 15), 51.0));
    assert_eq!(current["air_pressure"], (at(10, 0), 1012.0));
}

#[test]
fn test_current_values_unsorted_input() {
    let export = "Tijdstip\tAccuniveau (%)\n\
                  01-03-2024 10:30\t7\n\
                  01-03-2024 10:00\t5\n\
                  01-03-2024 10:30\t8\n";
    let dataset = pipeline().parse(export.as_bytes()).unwrap();

    // Latest timestamp wins; file order breaks the tie.
    assert_eq!(current_values(&dataset)["battery_level"], (at(10, 30), 8.0));
}

#[tokio::test]
async fn test_flow_total() {
    let export = "Tijdstip\tWaterstofproductie (L/u)\n\
                  01-03-2024 10:00\t2\n\
                  01-03-2024 10:15\t2\n\
                  01-03-2024 10:30\t2\n\
                  01-03-2024 10:45\t2\n";
    let pipeline = pipeline();
    let dataset = pipeline.parse(export.as_bytes()).unwrap();

    let usage = summarize_usage(
        &dataset,
        &descriptors(&dataset).await,
        pipeline.config().interval_hours(),
    );
    assert_eq!(usage.len(), 1);
    assert_eq!(usage[0].device.id, "hydrogen_production");
    assert_eq!(usage[0].kind, MetricKind::Flow);
    assert_eq!(usage[0].usage.as_deref(), Some("2,00"));
    assert_eq!(usage[0].usage_unit, "L");
}

#[tokio::test]
async fn test_power_total_uses_same_scaling() {
    let export = "Tijdstip\tStroomverbruik woning (kW)\n\
                  01-03-2024 10:00\t4\n\
                  01-03-2024 10:15\t4\n\
                  01-03-2024 10:30\t2\n\
                  01-03-2024 10:45\t2\n";
    let pipeline = pipeline();
    let dataset = pipeline.parse(export.as_bytes()).unwrap();

    let usage = summarize_usage(
        &dataset,
        &descriptors(&dataset).await,
        pipeline.config().interval_hours(),
    );
    assert_eq!(usage[0].kind, MetricKind::Power);
    assert_eq!(usage[0].usage.as_deref(), Some("3,00"));
    assert_eq!(usage[0].usage_unit, "kWh");
}

#[tokio::test]
async fn test_malformed_cells_excluded_from_aggregates() {
    let export = "Tijdstip\tBinnentemperatuur (°C)\tWaterstofverbruik auto (L/u)\n\
                  01-03-2024 10:00\t20\t4\n\
                  01-03-2024 10:15\tfout\tx\n\
                  01-03-2024 10:30\t22\t4\n";
    let pipeline = pipeline();
    let dataset = pipeline.parse(export.as_bytes()).unwrap();
    assert_eq!(dataset.len(), 3);
    assert_eq!(dataset.malformed_cells, 2);

    let usage = summarize_usage(
        &dataset,
        &descriptors(&dataset).await,
        pipeline.config().interval_hours(),
    );
    assert_eq!(usage[0].usage.as_deref(), Some("21,00"));
    assert_eq!(usage[1].usage.as_deref(), Some("2,00"));
}

#[tokio::test]
async fn test_level_without_values_has_no_usage() {
    let export = "Tijdstip\tLuchtdruk (hPa)\tWaterstofproductie (L/u)\n\
                  01-03-2024 10:00\t\t\n";
    let pipeline = pipeline();
    let dataset = pipeline.parse(export.as_bytes()).unwrap();

    let usage = summarize_usage(
        &dataset,
        &descriptors(&dataset).await,
        pipeline.config().interval_hours(),
    );
    assert_eq!(usage[0].usage, None);
    assert_eq!(usage[1].usage.as_deref(), Some("0,00"));
}

#[tokio::test]
async fn test_unknown_column_passes_through() {
    let export = "Tijdstip\tWindsnelheid (m/s)\n\
                  01-03-2024 10:00\t3,5\n\
                  01-03-2024 10:15\t4,5\n";
    let dataset = pipeline().parse(export.as_bytes()).unwrap();
    let descriptors = descriptors(&dataset).await;

    let readings = current_readings(&dataset, &descriptors);
    assert_eq!(readings.len(), 1);
    assert_eq!(readings[0].device.id, "windsnelheid");
    assert_eq!(readings[0].device.icon, "FiCpu");
    assert_eq!(readings[0].display.as_deref(), Some("4,50"));
    assert_eq!(readings[0].timestamp, Some(at(10, 15)));
    assert_relative_eq!(dataset.series("windsnelheid").map(|(_, v)| v).sum::<f64>(), 8.0);
}

#[test]
fn test_parse_path() {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        "Tijdstip\tAccuniveau (%)\tCO2-concentratie binnen (ppm)\n\
         01-03-2024 10:00\t80,5\t1.100,0\n"
    )
    .unwrap();

    let dataset = pipeline().parse_path(file.path()).unwrap();
    assert_eq!(dataset.len(), 1);
    assert_eq!(dataset.rows[0].value("battery_level"), Some(80.5));
    // Thousands separators are not accepted in the export.
    assert_eq!(dataset.rows[0].value("co2_level"), None);
}

#[test]
fn test_parse_path_missing_file() {
    let err = pipeline().parse_path("/nonexistent/energy.csv").unwrap_err();
    assert!(matches!(err, IngestError::Io(_)));
}

#[test]
fn test_missing_timestamp_column_fails() {
    let export = "Datum\tAccuniveau (%)\n01-03-2024 10:00\t5\n";
    let err = pipeline().parse(export.as_bytes()).unwrap_err();
    assert!(matches!(err, IngestError::MissingTimestampColumn { .. }));
}

#[test]
fn test_header_only_export() {
    let dataset = pipeline()
        .parse("Tijdstip\tAccuniveau (%)\n".as_bytes())
        .unwrap();
    assert!(dataset.is_empty());
    assert!(current_values(&dataset).is_empty());
}

/// Sink that records batches, or rejects them
struct RecordingSink {
    fail: bool,
    batches: RefCell<Vec<usize>>,
}

impl MeasurementSink for RecordingSink {
    type Error = String;

    fn insert_batch(&self, rows: &[MeasurementRow]) -> Result<usize, Self::Error> {
        if self.fail {
            return Err("disk full".to_string());
        }
        self.batches.borrow_mut().push(rows.len());
        Ok(rows.len())
    }
}

#[test]
fn test_load_single_batch() {
    let export = "Tijdstip\tAccuniveau (%)\n\
                  01-03-2024 10:00\t5\n\
                  01-03-2024 10:15\t6\n";
    let pipeline = pipeline();
    let dataset = pipeline.parse(export.as_bytes()).unwrap();

    let sink = RecordingSink {
        fail: false,
        batches: RefCell::new(Vec::new()),
    };
    assert_eq!(pipeline.load(&sink, &dataset.rows), Ok(2));
    assert_eq!(*sink.batches.borrow(), vec![2]);

    let failing = RecordingSink {
        fail: true,
        batches: RefCell::new(Vec::new()),
    };
    assert_eq!(
        pipeline.load(&failing, &dataset.rows),
        Err("disk full".to_string())
    );
}

#[tokio::test]
async fn test_same_name_different_unit_are_separate_devices() {
    let export = "Tijdstip\tWind (m/s)\tWind (km/h)\n\
                  01-03-2024 10:00\t2\t7,2\n\
                  01-03-2024 10:15\t3\n";
    let dataset = pipeline().parse(export.as_bytes()).unwrap();
    let descriptors = descriptors(&dataset).await;

    let readings = current_readings(&dataset, &descriptors);
    assert_eq!(readings.len(), 2);
    assert_eq!(readings[0].device.id, "wind");
    assert_eq!(readings[0].display.as_deref(), Some("3,00"));
    assert_eq!(readings[1].device.id, "wind_km_h");
    assert_eq!(readings[1].display.as_deref(), Some("7,20"));
    assert_eq!(readings[1].timestamp, Some(at(10, 0)));
}
