// EnergyDash - Measurement ingestion and alert fan-out
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Metric catalog
//!
//! Static mapping from the raw column names of the periodic export to the
//! devices they belong to. Lookup is exact and case-sensitive.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Display identity of a sensor or logical device.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    /// Stable slug, also the field key of the column's values
    pub id: String,
    /// Display label
    pub label: String,
    /// Unit of the raw values (may be empty)
    pub unit: String,
    /// Icon identifier understood by the dashboard
    pub icon: String,
}

impl DeviceDescriptor {
    /// Create a new descriptor
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        unit: impl Into<String>,
        icon: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            unit: unit.into(),
            icon: icon.into(),
        }
    }

    /// How values of this device aggregate over time
    pub fn kind(&self) -> MetricKind {
        MetricKind::from_unit(&self.unit)
    }
}

/// Aggregation family of a metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    /// Volume per hour; integrated to a volume
    Flow,
    /// Power; integrated to energy
    Power,
    /// Anything else; averaged
    Level,
}

impl MetricKind {
    /// Classify a unit string
    pub fn from_unit(unit: &str) -> Self {
        match unit.trim() {
            "L/u" | "L/h" | "l/u" | "l/h" | "m³/u" | "m³/h" | "m3/u" | "m3/h" => MetricKind::Flow,
            "kW" | "W" => MetricKind::Power,
            _ => MetricKind::Level,
        }
    }

    /// Whether values are summed over the sampling interval
    pub fn is_integrated(&self) -> bool {
        matches!(self, MetricKind::Flow | MetricKind::Power)
    }

    /// Unit of the aggregate for a device measured in `unit`
    pub fn aggregate_unit(&self, unit: &str) -> String {
        match self {
            MetricKind::Flow => unit
                .split('/')
                .next()
                .unwrap_or_default()
                .trim()
                .to_string(),
            MetricKind::Power => format!("{}h", unit.trim()),
            MetricKind::Level => unit.to_string(),
        }
    }
}

/// Registered sensors of the export: raw column name, id, label, unit, icon.
const BUILTIN: &[(&str, &str, &str, &str, &str)] = &[
    ("Zonnepaneelspanning (V)", "solar_voltage", "Zonnepaneelspanning", "V", "FiSun"),
    ("Zonnepaneelstroom (A)", "solar_current", "Zonnepaneelstroom", "A", "FiSun"),
    ("Waterstofproductie (L/u)", "hydrogen_production", "Waterstofproductie", "L/u", "FiDroplet"),
    ("Stroomverbruik woning (kW)", "power_consumption", "Stroomverbruik woning", "kW", "FiZap"),
    ("Waterstofverbruik auto (L/u)", "hydrogen_consumption", "Waterstofverbruik auto", "L/u", "FiTruck"),
    ("Buitentemperatuur (°C)", "outside_temperature", "Buitentemperatuur", "°C", "FiThermometer"),
    ("Binnentemperatuur (°C)", "inside_temperature", "Binnentemperatuur", "°C", "FiHome"),
    ("Luchtdruk (hPa)", "air_pressure", "Luchtdruk", "hPa", "FiWind"),
    ("Luchtvochtigheid (%)", "humidity", "Luchtvochtigheid", "%", "FiCloudDrizzle"),
    ("Accuniveau (%)", "battery_level", "Accuniveau", "%", "FiBattery"),
    ("CO2-concentratie binnen (ppm)", "co2_level", "CO2-concentratie binnen", "ppm", "FiActivity"),
    ("Waterstofopslag woning (%)", "hydrogen_storage_house", "Waterstofopslag woning", "%", "FiDatabase"),
    ("Waterstofopslag auto (%)", "hydrogen_storage_car", "Waterstofopslag auto", "%", "FiDatabase"),
];

/// Exact-name lookup table of known sensors
#[derive(Debug, Clone)]
pub struct MetricCatalog {
    by_column: HashMap<String, DeviceDescriptor>,
}

impl MetricCatalog {
    /// Catalog of the sensors present in the home export
    pub fn builtin() -> Self {
        Self::from_entries(BUILTIN.iter().map(|(column, id, label, unit, icon)| {
            (
                column.to_string(),
                DeviceDescriptor::new(*id, *label, *unit, *icon),
            )
        }))
    }

    /// Build a catalog from arbitrary entries
    pub fn from_entries(entries: impl IntoIterator<Item = (String, DeviceDescriptor)>) -> Self {
        Self {
            by_column: entries.into_iter().collect(),
        }
    }

    /// Descriptor registered for `column`, if any
    pub fn lookup(&self, column: &str) -> Option<&DeviceDescriptor> {
        self.by_column.get(column)
    }

    /// Descriptor with the given device id, if any
    pub fn by_id(&self, id: &str) -> Option<&DeviceDescriptor> {
        self.by_column.values().find(|d| d.id == id)
    }

    /// Iterate over (column, descriptor) pairs
    pub fn iter(&self) -> impl Iterator<Item = (&String, &DeviceDescriptor)> {
        self.by_column.iter()
    }

    /// Number of registered columns
    pub fn len(&self) -> usize {
        self.by_column.len()
    }

    /// Check if the catalog is empty
    pub fn is_empty(&self) -> bool {
        self.by_column.is_empty()
    }
}

impl Default for MetricCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_lookup() {
        let catalog = MetricCatalog::builtin();
        assert_eq!(catalog.len(), 13);

        let solar = catalog.lookup("Zonnepaneelspanning (V)").unwrap();
        assert_eq!(solar.id, "solar_voltage");
        assert_eq!(solar.unit, "V");
        assert_eq!(solar.icon, "FiSun");
    }

    #[test]
    fn test_lookup_is_exact() {
        let catalog = MetricCatalog::builtin();
        assert!(catalog.lookup("zonnepaneelspanning (V)").is_none());
        assert!(catalog.lookup("Zonnepaneelspanning (V) ").is_none());
        assert!(catalog.lookup("solar_voltage").is_none());
        assert!(catalog.lookup("").is_none());
    }

    #[test]
    fn test_by_id() {
        let catalog = MetricCatalog::builtin();
        assert_eq!(catalog.by_id("co2_level").unwrap().unit, "ppm");
        assert!(catalog.by_id("nonexistent").is_none());
    }

    #[test]
    fn test_metric_kind_from_unit() {
        assert_eq!(MetricKind::from_unit("L/u"), MetricKind::Flow);
        assert_eq!(MetricKind::from_unit("m³/h"), MetricKind::Flow);
        assert_eq!(MetricKind::from_unit("kW"), MetricKind::Power);
        assert_eq!(MetricKind::from_unit("W"), MetricKind::Power);
        assert_eq!(MetricKind::from_unit("%"), MetricKind::Level);
        assert_eq!(MetricKind::from_unit(""), MetricKind::Level);
    }

    #[test]
    fn test_aggregate_unit() {
        assert_eq!(MetricKind::Flow.aggregate_unit("L/u"), "L");
        assert_eq!(MetricKind::Power.aggregate_unit("kW"), "kWh");
        assert_eq!(MetricKind::Level.aggregate_unit("°C"), "°C");
    }

    #[test]
    fn test_builtin_kinds() {
        let catalog = MetricCatalog::builtin();
        let kind = |id: &str| catalog.by_id(id).unwrap().kind();
        assert_eq!(kind("hydrogen_production"), MetricKind::Flow);
        assert_eq!(kind("hydrogen_consumption"), MetricKind::Flow);
        assert_eq!(kind("power_consumption"), MetricKind::Power);
        assert_eq!(kind("humidity"), MetricKind::Level);
    }
}
