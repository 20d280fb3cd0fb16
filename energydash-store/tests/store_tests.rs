//! Integration tests: parsed exports loaded into SQLite

use std::sync::Arc;

use approx::assert_relative_eq;
use chrono::NaiveDate;
use energydash::{IngestConfig, IngestPipeline, MetricCatalog};
use energydash_store::{SqliteStore, MEASUREMENT_FIELDS};
use tempfile::tempdir;

const EXPORT: &str = "Tijdstip\tAccuniveau (%)\tBinnentemperatuur (°C)\tWindsnelheid (m/s)\n\
                      28-02-2024 23:45\t40\t19,5\t2\n\
                      01-03-2024 10:00\t50\t20\t3\n\
                      01-03-2024 10:15\t\t22\t4\n\
                      01-03-2024 10:30\t70\tkapot\t5\n";

fn pipeline() -> IngestPipeline {
    IngestPipeline::new(IngestConfig::default(), Arc::new(MetricCatalog::builtin()))
}

fn loaded_store() -> SqliteStore {
    let pipeline = pipeline();
    let dataset = pipeline.parse(EXPORT.as_bytes()).unwrap();
    let store = SqliteStore::open_in_memory().unwrap();
    assert_eq!(pipeline.load(&store, &dataset.rows).unwrap(), 4);
    store
}

#[test]
fn test_pipeline_loads_into_store() {
    let store = loaded_store();
    assert_eq!(store.measurement_count().unwrap(), 4);

    let latest = store.latest_measurements(100).unwrap();
    assert_eq!(latest.len(), 4);
    assert_eq!(latest[0].values["battery_level"], Some(70.0));
    assert_eq!(latest[0].values["inside_temperature"], None);
    assert_eq!(latest[0].values.len(), MEASUREMENT_FIELDS.len());
}

#[test]
fn test_daily_averages() {
    let store = loaded_store();
    let today = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();

    let days = store.daily_averages(7, today).unwrap();
    assert_eq!(days.len(), 2);
    assert_eq!(days[0].date, today);
    assert_relative_eq!(days[0].averages["battery_level"].unwrap(), 60.0);
    assert_relative_eq!(days[0].averages["inside_temperature"].unwrap(), 21.0);
    assert_eq!(days[0].averages["co2_level"], None);
    assert_relative_eq!(days[1].averages["battery_level"].unwrap(), 40.0);

    let only_today = store.daily_averages(0, today).unwrap();
    assert_eq!(only_today.len(), 1);
}

#[test]
fn test_daily_averages_window_excludes_old_days() {
    let store = loaded_store();
    let later = NaiveDate::from_ymd_opt(2024, 4, 1).unwrap();
    assert!(store.daily_averages(7, later).unwrap().is_empty());
}

#[test]
fn test_file_store_round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("energy.db");
    {
        let store = SqliteStore::open(&path).unwrap();
        let dataset = pipeline().parse(EXPORT.as_bytes()).unwrap();
        store.insert_measurements(&dataset.rows).unwrap();
    }

    let store = SqliteStore::open(&path).unwrap();
    assert_eq!(store.measurement_count().unwrap(), 4);
}
