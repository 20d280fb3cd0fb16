// EnergyDash - Measurement ingestion and alert fan-out
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Process-wide configuration.
//!
//! [`Settings`] is loaded once at startup and handed to the classifier,
//! the ingestion pipeline and the alert evaluator. Nothing in the core reads
//! configuration from the environment at call time.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::alerts::{default_rules, AlertRule};
use crate::error::ConfigError;

/// Default chat-completions endpoint used when only a credential is given.
pub const DEFAULT_COMPLETION_ENDPOINT: &str = "https://api.mistral.ai/v1/chat/completions";

/// Default completion model.
pub const DEFAULT_COMPLETION_MODEL: &str = "mistral-tiny";

/// Icon reported for devices nothing else could identify.
pub const GENERIC_ICON: &str = "FiCpu";

/// Master configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// CSV export parsing.
    pub ingest: IngestConfig,

    /// Column classification vocabularies and external service.
    pub classifier: ClassifierConfig,

    /// Threshold rules evaluated after each import.
    pub alerts: Vec<AlertRule>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ingest: IngestConfig::default(),
            classifier: ClassifierConfig::default(),
            alerts: default_rules(),
        }
    }
}

impl Settings {
    /// Load settings from a JSON file. Missing keys keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Parse settings from a JSON document.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Replace the external completion service configuration.
    pub fn with_completion(mut self, completion: Option<CompletionConfig>) -> Self {
        self.classifier.completion = completion;
        self
    }
}

/// CSV export parsing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Field delimiter (tab in the periodic export).
    pub delimiter: char,

    /// Accepted names for the timestamp column, localized name first.
    pub timestamp_columns: Vec<String>,

    /// chrono formats tried in order; day-first formats come first.
    pub timestamp_formats: Vec<String>,

    /// Raw column name -> canonical field identifier.
    pub rename: BTreeMap<String, String>,

    /// Spacing between consecutive rows.
    pub sampling_interval_minutes: u32,
}

impl Default for IngestConfig {
    fn default() -> Self {
        let rename = [
            ("Zonnepaneelspanning (V)", "solar_voltage"),
            ("Zonnepaneelstroom (A)", "solar_current"),
            ("Waterstofproductie (L/u)", "hydrogen_production"),
            ("Stroomverbruik woning (kW)", "power_consumption"),
            ("Waterstofverbruik auto (L/u)", "hydrogen_consumption"),
            ("Buitentemperatuur (°C)", "outside_temperature"),
            ("Binnentemperatuur (°C)", "inside_temperature"),
            ("Luchtdruk (hPa)", "air_pressure"),
            ("Luchtvochtigheid (%)", "humidity"),
            ("Accuniveau (%)", "battery_level"),
            ("CO2-concentratie binnen (ppm)", "co2_level"),
            ("Waterstofopslag woning (%)", "hydrogen_storage_house"),
            ("Waterstofopslag auto (%)", "hydrogen_storage_car"),
        ];

        Self {
            delimiter: '\t',
            timestamp_columns: vec!["Tijdstip".to_string(), "timestamp".to_string()],
            timestamp_formats: [
                "%d-%m-%Y %H:%M",
                "%d-%m-%Y %H:%M:%S",
                "%d/%m/%Y %H:%M",
                "%d/%m/%Y %H:%M:%S",
                "%Y-%m-%d %H:%M:%S",
                "%Y-%m-%d %H:%M",
                "%Y-%m-%dT%H:%M:%S",
            ]
            .iter()
            .map(|f| f.to_string())
            .collect(),
            rename: owned_map(&rename),
            sampling_interval_minutes: 15,
        }
    }
}

impl IngestConfig {
    /// Sampling interval expressed in hours (0.25 for 15 minutes).
    pub fn interval_hours(&self) -> f64 {
        f64::from(self.sampling_interval_minutes) / 60.0
    }

    /// Delimiter as a single byte; non-ASCII delimiters fall back to tab.
    pub fn delimiter_byte(&self) -> u8 {
        u8::try_from(self.delimiter)
            .ok()
            .filter(u8::is_ascii)
            .unwrap_or(b'\t')
    }

    /// Whether `column` names the timestamp column.
    pub fn is_timestamp_column(&self, column: &str) -> bool {
        self.timestamp_columns.iter().any(|c| c == column)
    }
}

/// Column classifier configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Icon identifiers the dashboard can render.
    pub allowed_icons: BTreeSet<String>,

    /// Icon used when nothing better is known.
    pub generic_icon: String,

    /// Unit strings the dashboard accepts.
    pub allowed_units: BTreeSet<String>,

    /// Normalized label -> display label (English and Dutch synonyms).
    pub label_translations: BTreeMap<String, String>,

    /// Normalized column name -> unit, used when the service gives none.
    pub default_units: BTreeMap<String, String>,

    /// External heuristic classification. `None` disables the strategy.
    pub completion: Option<CompletionConfig>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        let icons = [
            "FiSun",
            "FiZap",
            "FiBattery",
            "FiDroplet",
            "FiThermometer",
            "FiWind",
            "FiCloud",
            "FiCloudDrizzle",
            "FiHome",
            "FiTruck",
            "FiActivity",
            "FiDatabase",
            "FiPower",
            "FiTrendingUp",
            GENERIC_ICON,
        ];
        let units = [
            "V", "A", "W", "kW", "kWh", "L/u", "L", "m³/u", "m³", "%", "°C", "hPa", "ppm", "m/s",
            "W/m²", "lux",
        ];
        let translations = [
            ("solarvoltage", "Zonnepaneelspanning"),
            ("solarpanelvoltage", "Zonnepaneelspanning"),
            ("solarcurrent", "Zonnepaneelstroom"),
            ("solarpanelcurrent", "Zonnepaneelstroom"),
            ("hydrogenproduction", "Waterstofproductie"),
            ("hydrogenconsumption", "Waterstofverbruik"),
            ("powerconsumption", "Stroomverbruik"),
            ("stroomverbruik", "Stroomverbruik"),
            ("outsidetemperature", "Buitentemperatuur"),
            ("outdoortemperature", "Buitentemperatuur"),
            ("insidetemperature", "Binnentemperatuur"),
            ("indoortemperature", "Binnentemperatuur"),
            ("temperature", "Temperatuur"),
            ("airpressure", "Luchtdruk"),
            ("humidity", "Luchtvochtigheid"),
            ("batterylevel", "Accuniveau"),
            ("co2level", "CO2-concentratie"),
            ("co2concentration", "CO2-concentratie"),
            ("windspeed", "Windsnelheid"),
            ("windsnelheid", "Windsnelheid"),
            ("solarirradiance", "Zoninstraling"),
            ("zoninstraling", "Zoninstraling"),
            ("gridfeedin", "Teruglevering net"),
            ("power", "Vermogen"),
            ("vermogen", "Vermogen"),
        ];
        let default_units = [
            ("windsnelheid", "m/s"),
            ("windspeed", "m/s"),
            ("zoninstraling", "W/m²"),
            ("solarirradiance", "W/m²"),
            ("vermogen", "kW"),
            ("power", "kW"),
            ("teruglevering", "kW"),
            ("temperatuur", "°C"),
            ("temperature", "°C"),
            ("luchtdruk", "hPa"),
            ("spanning", "V"),
            ("stroom", "A"),
        ];

        Self {
            allowed_icons: icons.iter().map(|s| s.to_string()).collect(),
            generic_icon: GENERIC_ICON.to_string(),
            allowed_units: units.iter().map(|s| s.to_string()).collect(),
            label_translations: owned_map(&translations),
            default_units: owned_map(&default_units),
            completion: None,
        }
    }
}

/// External text-completion service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    /// Chat-completions URL.
    pub endpoint: String,

    /// Bearer credential.
    pub api_key: String,

    /// Model name sent with each request.
    pub model: String,

    /// Upper bound for one classification call.
    pub timeout_ms: u64,

    /// Completion length cap.
    pub max_tokens: u32,

    /// Sampling temperature; 0 keeps answers stable.
    pub temperature: f32,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_COMPLETION_ENDPOINT.to_string(),
            api_key: String::new(),
            model: DEFAULT_COMPLETION_MODEL.to_string(),
            timeout_ms: 5_000,
            max_tokens: 40,
            temperature: 0.0,
        }
    }
}

impl CompletionConfig {
    /// Configuration for the default endpoint with the given credential.
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Default::default()
        }
    }

    /// Call timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// True when both an endpoint and a credential are present.
    pub fn is_usable(&self) -> bool {
        !self.endpoint.trim().is_empty() && !self.api_key.trim().is_empty()
    }
}

fn owned_map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ingest_config_default() {
        let config = IngestConfig::default();
        assert_eq!(config.delimiter, '\t');
        assert_eq!(config.delimiter_byte(), b'\t');
        assert_eq!(config.sampling_interval_minutes, 15);
        assert!((config.interval_hours() - 0.25).abs() < f64::EPSILON);
        assert!(config.is_timestamp_column("Tijdstip"));
        assert!(config.is_timestamp_column("timestamp"));
        assert!(!config.is_timestamp_column("Accuniveau (%)"));
        assert_eq!(config.rename.len(), 13);
    }

    #[test]
    fn test_classifier_config_default() {
        let config = ClassifierConfig::default();
        assert!(config.allowed_icons.contains(GENERIC_ICON));
        assert!(config.allowed_units.contains("kW"));
        assert!(config.completion.is_none());
    }

    #[test]
    fn test_completion_config_usable() {
        assert!(!CompletionConfig::default().is_usable());
        assert!(CompletionConfig::with_api_key("secret").is_usable());

        let config = CompletionConfig {
            endpoint: "  ".to_string(),
            ..CompletionConfig::with_api_key("secret")
        };
        assert!(!config.is_usable());
    }

    #[test]
    fn test_settings_partial_json() {
        let settings = Settings::from_json_str(
            r#"{ "ingest": { "sampling_interval_minutes": 5 }, "alerts": [] }"#,
        )
        .unwrap();
        assert_eq!(settings.ingest.sampling_interval_minutes, 5);
        assert_eq!(settings.ingest.timestamp_columns[0], "Tijdstip");
        assert!(settings.alerts.is_empty());
        assert!(!settings.classifier.allowed_icons.is_empty());
    }

    #[test]
    fn test_settings_invalid_json() {
        let result = Settings::from_json_str("{ not json");
        assert!(matches!(result, Err(ConfigError::Json(_))));
    }
}
