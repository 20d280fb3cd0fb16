// EnergyDash - Measurement ingestion and alert fan-out
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Column classification
//!
//! Resolves an arbitrary export column to a [`DeviceDescriptor`] through an
//! ordered chain of strategies:
//!
//! 1. [`CatalogResolver`]: exact match against the [`MetricCatalog`]
//! 2. [`ExternalResolver`]: best-effort question to a completion service
//! 3. [`DefaultResolver`]: prettified column name, no unit, generic icon
//!
//! Each strategy either answers definitively or has no opinion. The chain
//! stops at the first answer, and the default strategy always answers, so
//! [`ColumnClassifier::classify`] never fails.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};

use crate::catalog::{DeviceDescriptor, MetricCatalog};
use crate::completion::{CompletionRequest, CompletionService, HttpCompletionService};
use crate::config::ClassifierConfig;

/// Outcome of one strategy
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Definitive descriptor; the chain stops here
    Resolved(DeviceDescriptor),
    /// Strategy cannot tell; ask the next one
    NoOpinion,
}

/// One link of the classification chain
#[async_trait]
pub trait ColumnResolver: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Try to resolve `column`
    async fn resolve(&self, column: &str) -> Resolution;
}

/// Looks columns up in the static catalog
#[derive(Debug, Clone)]
pub struct CatalogResolver {
    catalog: Arc<MetricCatalog>,
}

impl CatalogResolver {
    /// Create a resolver over `catalog`
    pub fn new(catalog: Arc<MetricCatalog>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl ColumnResolver for CatalogResolver {
    fn name(&self) -> &'static str {
        "catalog"
    }

    async fn resolve(&self, column: &str) -> Resolution {
        match self.catalog.lookup(column) {
            Some(descriptor) => Resolution::Resolved(descriptor.clone()),
            None => Resolution::NoOpinion,
        }
    }
}

const SYSTEM_INSTRUCTION: &str =
    "You classify sensor columns of a home energy dashboard. Answer with one line only.";

/// Asks a completion service for a `label | unit | icon` triple
pub struct ExternalResolver {
    service: Arc<dyn CompletionService>,
    config: Arc<ClassifierConfig>,
    timeout: Duration,
}

impl ExternalResolver {
    /// Create a resolver; every call is bounded by `timeout`
    pub fn new(
        service: Arc<dyn CompletionService>,
        config: Arc<ClassifierConfig>,
        timeout: Duration,
    ) -> Self {
        Self {
            service,
            config,
            timeout,
        }
    }

    fn request_for(&self, column: &str) -> CompletionRequest {
        let units: Vec<&str> = self.config.allowed_units.iter().map(String::as_str).collect();
        let icons: Vec<&str> = self.config.allowed_icons.iter().map(String::as_str).collect();
        let prompt = format!(
            "Column name: \"{column}\"\n\
             Describe the device measured by this column.\n\
             Return exactly: label | unit | icon\n\
             Allowed units: {}\n\
             Allowed icons: {}\n\
             Leave a field empty when unsure.",
            units.join(", "),
            icons.join(", "),
        );
        CompletionRequest::new(SYSTEM_INSTRUCTION, prompt)
    }

    /// Turn a raw reply into a descriptor, validating every field
    fn descriptor_from_reply(&self, column: &str, reply: &str) -> DeviceDescriptor {
        let fields = parse_reply(reply);
        let config = &self.config;

        let icon = if config.allowed_icons.contains(&fields.icon) {
            fields.icon
        } else {
            config.generic_icon.clone()
        };

        let label = config
            .label_translations
            .get(&normalize_key(&fields.label))
            .cloned()
            .unwrap_or_else(|| prettify(column));

        let unit = if config.allowed_units.contains(&fields.unit) {
            fields.unit
        } else {
            config
                .default_units
                .get(&normalize_key(column))
                .cloned()
                .unwrap_or_default()
        };

        DeviceDescriptor::new(device_id(column), label, unit, icon)
    }
}

#[async_trait]
impl ColumnResolver for ExternalResolver {
    fn name(&self) -> &'static str {
        "external"
    }

    async fn resolve(&self, column: &str) -> Resolution {
        let request = self.request_for(column);
        match tokio::time::timeout(self.timeout, self.service.complete(&request)).await {
            Ok(Ok(reply)) => {
                debug!("Completion for '{}': {}", column, reply.trim());
                Resolution::Resolved(self.descriptor_from_reply(column, &reply))
            }
            Ok(Err(e)) => {
                warn!("Classification service failed for '{}': {}", column, e);
                Resolution::NoOpinion
            }
            Err(_) => {
                warn!(
                    "Classification service timed out for '{}' after {:?}",
                    column, self.timeout
                );
                Resolution::NoOpinion
            }
        }
    }
}

/// Deterministic last resort
#[derive(Debug, Clone)]
pub struct DefaultResolver {
    generic_icon: String,
}

impl DefaultResolver {
    /// Create a resolver that reports `generic_icon`
    pub fn new(generic_icon: impl Into<String>) -> Self {
        Self {
            generic_icon: generic_icon.into(),
        }
    }

    /// The descriptor this resolver gives every column
    pub fn descriptor_for(&self, column: &str) -> DeviceDescriptor {
        DeviceDescriptor::new(
            device_id(column),
            prettify(column),
            "",
            self.generic_icon.clone(),
        )
    }
}

#[async_trait]
impl ColumnResolver for DefaultResolver {
    fn name(&self) -> &'static str {
        "default"
    }

    async fn resolve(&self, column: &str) -> Resolution {
        Resolution::Resolved(self.descriptor_for(column))
    }
}

/// Ordered chain of resolvers ending in [`DefaultResolver`]
pub struct ColumnClassifier {
    chain: Vec<Box<dyn ColumnResolver>>,
    fallback: DefaultResolver,
    catalog: Arc<MetricCatalog>,
}

impl ColumnClassifier {
    /// Build the production chain from configuration.
    ///
    /// The external strategy is only added when a usable completion
    /// configuration is present.
    pub fn from_config(config: &ClassifierConfig, catalog: Arc<MetricCatalog>) -> Self {
        let service = config.completion.as_ref().and_then(|completion| {
            match HttpCompletionService::new(completion.clone()) {
                Ok(service) => Some((Arc::new(service) as Arc<dyn CompletionService>, completion.timeout())),
                Err(e) => {
                    warn!("External classification disabled: {}", e);
                    None
                }
            }
        });

        match service {
            Some((service, timeout)) => Self::with_service(config, catalog, service, timeout),
            None => Self::offline(config, catalog),
        }
    }

    /// Catalog and default strategies only
    pub fn offline(config: &ClassifierConfig, catalog: Arc<MetricCatalog>) -> Self {
        Self {
            chain: vec![Box::new(CatalogResolver::new(Arc::clone(&catalog)))],
            fallback: DefaultResolver::new(config.generic_icon.clone()),
            catalog,
        }
    }

    /// Full chain with an explicit completion service
    pub fn with_service(
        config: &ClassifierConfig,
        catalog: Arc<MetricCatalog>,
        service: Arc<dyn CompletionService>,
        timeout: Duration,
    ) -> Self {
        let external = ExternalResolver::new(service, Arc::new(config.clone()), timeout);
        Self {
            chain: vec![
                Box::new(CatalogResolver::new(Arc::clone(&catalog))),
                Box::new(external),
            ],
            fallback: DefaultResolver::new(config.generic_icon.clone()),
            catalog,
        }
    }

    /// Names of the strategies in order, including the default
    pub fn strategies(&self) -> Vec<&'static str> {
        self.chain
            .iter()
            .map(|r| r.name())
            .chain(std::iter::once(self.fallback.name()))
            .collect()
    }

    /// Catalog consulted first
    pub fn catalog(&self) -> &MetricCatalog {
        &self.catalog
    }

    /// Resolve one column. Never fails.
    pub async fn classify(&self, column: &str) -> DeviceDescriptor {
        for resolver in &self.chain {
            if let Resolution::Resolved(descriptor) = resolver.resolve(column).await {
                debug!("Column '{}' resolved by {}", column, resolver.name());
                return descriptor;
            }
        }
        self.fallback.descriptor_for(column)
    }

    /// Resolve a set of columns, asking the chain once per distinct name
    pub async fn classify_all<I, S>(&self, columns: I) -> HashMap<String, DeviceDescriptor>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut resolved = HashMap::new();
        for column in columns {
            let column = column.as_ref();
            if resolved.contains_key(column) {
                continue;
            }
            let descriptor = self.classify(column).await;
            resolved.insert(column.to_string(), descriptor);
        }
        resolved
    }
}

/// Fields extracted from a completion reply
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplyFields {
    pub label: String,
    pub unit: String,
    pub icon: String,
}

/// Parse a completion reply.
///
/// Accepts `label | unit | icon` on any line, or a loose `Label: ...`,
/// `Unit: ...`, `Icon: ...` layout. Anything else yields empty fields.
pub fn parse_reply(reply: &str) -> ReplyFields {
    for line in reply.lines() {
        let parts: Vec<&str> = line.split('|').collect();
        if parts.len() >= 3 {
            return ReplyFields {
                label: clean_field(parts[0]),
                unit: clean_field(parts[1]),
                icon: clean_field(parts[2]),
            };
        }
    }

    let mut fields = ReplyFields::default();
    for line in reply.lines() {
        let Some((key, value)) = line.split_once(':').or_else(|| line.split_once('=')) else {
            continue;
        };
        let key = key
            .trim()
            .trim_start_matches(['-', '*', '#', ' '])
            .trim_end_matches('*')
            .to_lowercase();
        let value = clean_field(value);
        match key.as_str() {
            "label" | "name" | "naam" | "device" | "apparaat" => fields.label = value,
            "unit" | "eenheid" => fields.unit = value,
            "icon" | "icoon" => fields.icon = value,
            _ => {}
        }
    }
    fields
}

fn clean_field(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c| matches!(c, '"' | '\'' | '`' | '*' | '.'))
        .trim()
        .to_string()
}

/// Remove parenthesised segments such as an embedded unit
fn strip_parenthesised(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut depth = 0usize;
    for c in raw.chars() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }
    out
}

/// Lowercase, drop the embedded unit, keep only alphanumerics.
pub fn normalize_key(raw: &str) -> String {
    strip_parenthesised(raw)
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Stable slug for a column: lowercase words joined by `_`, unit removed.
pub fn device_id(column: &str) -> String {
    let mut slug = String::with_capacity(column.len());
    for c in strip_parenthesised(column).chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('_') {
            slug.push('_');
        }
    }
    let slug = slug.trim_end_matches('_');
    if slug.is_empty() {
        "unknown_device".to_string()
    } else {
        slug.to_string()
    }
}

/// Human-readable label from a raw column name.
pub fn prettify(column: &str) -> String {
    let spaced: String = column
        .chars()
        .map(|c| if c == '_' || c == '-' { ' ' } else { c })
        .collect();
    let words: Vec<&str> = spaced.split_whitespace().collect();
    let joined = words.join(" ");

    let mut chars = joined.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
