// EnergyDash - Measurement ingestion and alert fan-out
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Threshold alerts.
//!
//! After an import, each [`AlertRule`] is checked against the freshest value
//! of its field. Triggered rules become [`NewNotification`]s.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::notification::{NewNotification, NotificationCategory};
use crate::usage::format_locale;

/// A bound on one field. `{value}` in `message` is replaced with the
/// formatted value that triggered the rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRule {
    /// Field key the rule watches
    pub field: String,
    /// Trigger when the value is strictly below this
    #[serde(default)]
    pub below: Option<f64>,
    /// Trigger when the value is strictly above this
    #[serde(default)]
    pub above: Option<f64>,
    pub category: NotificationCategory,
    pub title: String,
    pub message: String,
}

impl AlertRule {
    /// Rule that fires below `threshold`
    pub fn below(
        field: impl Into<String>,
        threshold: f64,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            below: Some(threshold),
            above: None,
            category: NotificationCategory::Warning,
            title: title.into(),
            message: message.into(),
        }
    }

    /// Rule that fires above `threshold`
    pub fn above(
        field: impl Into<String>,
        threshold: f64,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            below: None,
            above: Some(threshold),
            category: NotificationCategory::Warning,
            title: title.into(),
            message: message.into(),
        }
    }

    /// Override the category
    pub fn with_category(mut self, category: NotificationCategory) -> Self {
        self.category = category;
        self
    }

    /// Whether `value` violates the rule
    pub fn is_triggered(&self, value: f64) -> bool {
        self.below.is_some_and(|min| value < min) || self.above.is_some_and(|max| value > max)
    }

    fn notification(&self, value: f64) -> NewNotification {
        NewNotification::new(
            self.title.clone(),
            self.message.replace("{value}", &format_locale(value)),
            self.category,
        )
    }
}

/// Rules shipped with the dashboard
pub fn default_rules() -> Vec<AlertRule> {
    vec![
        AlertRule::below(
            "battery_level",
            20.0,
            "Accu bijna leeg",
            "Het accuniveau is gedaald tot {value} %.",
        ),
        AlertRule::below(
            "hydrogen_storage_house",
            10.0,
            "Waterstofopslag woning laag",
            "De waterstofopslag van de woning staat op {value} %.",
        ),
        AlertRule::below(
            "hydrogen_storage_car",
            10.0,
            "Waterstofopslag auto laag",
            "De waterstoftank van de auto staat op {value} %.",
        ),
        AlertRule::above(
            "co2_level",
            1000.0,
            "Hoge CO2-concentratie",
            "De CO2-concentratie binnen is {value} ppm. Verlucht de woning.",
        ),
        AlertRule::above(
            "inside_temperature",
            28.0,
            "Hoge binnentemperatuur",
            "Het is binnen {value} °C.",
        )
        .with_category(NotificationCategory::Info),
    ]
}

/// Notifications for every rule whose field currently violates it.
pub fn evaluate(
    rules: &[AlertRule],
    current: &BTreeMap<String, (NaiveDateTime, f64)>,
) -> Vec<NewNotification> {
    rules
        .iter()
        .filter_map(|rule| {
            let (_, value) = current.get(&rule.field)?;
            rule.is_triggered(*value).then(|| rule.notification(*value))
        })
        .collect()
}
