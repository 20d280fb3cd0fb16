// EnergyDash Store - SQLite persistence adapter
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Fixed table layout

use rusqlite::Connection;

use crate::error::Result;

/// Measurement columns, in table order. Fields outside this list are not persisted.
pub const MEASUREMENT_FIELDS: &[&str] = &[
    "solar_voltage",
    "solar_current",
    "hydrogen_production",
    "power_consumption",
    "hydrogen_consumption",
    "outside_temperature",
    "inside_temperature",
    "air_pressure",
    "humidity",
    "battery_level",
    "co2_level",
    "hydrogen_storage_house",
    "hydrogen_storage_car",
];

/// Storage format of measurement timestamps; sorts lexically and works with `date()`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS measurements (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    solar_voltage REAL,
    solar_current REAL,
    hydrogen_production REAL,
    power_consumption REAL,
    hydrogen_consumption REAL,
    outside_temperature REAL,
    inside_temperature REAL,
    air_pressure REAL,
    humidity REAL,
    battery_level REAL,
    co2_level REAL,
    hydrogen_storage_house REAL,
    hydrogen_storage_car REAL
);
CREATE INDEX IF NOT EXISTS idx_measurements_timestamp ON measurements (timestamp);

CREATE TABLE IF NOT EXISTS notifications (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    message TEXT NOT NULL,
    type TEXT NOT NULL CHECK (type IN ('info', 'warning', 'success')),
    is_read INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_notifications_created_at ON notifications (created_at);
";

/// Create both tables if they do not exist yet
pub fn ensure_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

/// Whether `field` has a column in the measurements table
pub fn is_persisted_field(field: &str) -> bool {
    MEASUREMENT_FIELDS.contains(&field)
}

#[cfg(test)]
mod tests {
    use super::*;
    use energydash::MetricCatalog;

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        ensure_schema(&conn).unwrap();
        ensure_schema(&conn).unwrap();
    }

    #[test]
    fn test_catalog_fields_are_persisted() {
        let catalog = MetricCatalog::builtin();
        assert_eq!(catalog.len(), MEASUREMENT_FIELDS.len());
        for (_, descriptor) in catalog.iter() {
            assert!(is_persisted_field(&descriptor.id), "{}", descriptor.id);
        }
        assert!(!is_persisted_field("windsnelheid"));
    }
}
