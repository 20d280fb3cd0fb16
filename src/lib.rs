//! # EnergyDash - Measurement ingestion and alert fan-out
//!
//! Core of a home energy monitoring backend (solar, hydrogen storage,
//! battery, indoor climate).
//!
//! ## Key Features
//!
//! - **Ingestion**: tab-delimited exports with comma decimals and day-first dates
//! - **Classification**: catalog, completion service, then a deterministic default
//! - **Usage summaries**: flow and power integrated over time, levels averaged
//! - **Live alerts**: threshold rules fanned out to every connected subscriber
//!
//! ## Quick Start
//!
//! ```rust
//! use std::collections::HashMap;
//! use std::sync::Arc;
//! use energydash::{current_values, summarize_usage, IngestPipeline, MetricCatalog, Settings};
//!
//! let settings = Settings::default();
//! let catalog = Arc::new(MetricCatalog::builtin());
//! let pipeline = IngestPipeline::new(settings.ingest.clone(), catalog.clone());
//!
//! let export = "Tijdstip\tWaterstofproductie (L/u)\n\
//!               01-03-2024 10:00\t2\n\
//!               01-03-2024 10:15\t2\n";
//! let dataset = pipeline.parse(export.as_bytes()).unwrap();
//!
//! let current = current_values(&dataset);
//! assert_eq!(current["hydrogen_production"].1, 2.0);
//!
//! let descriptors: HashMap<_, _> = dataset
//!     .column_names()
//!     .filter_map(|c| catalog.lookup(c).map(|d| (c.to_string(), d.clone())))
//!     .collect();
//! let usage = summarize_usage(&dataset, &descriptors, settings.ingest.interval_hours());
//! assert_eq!(usage[0].usage.as_deref(), Some("1,00"));
//! ```
//!
//! ## Modules
//!
//! - [`catalog`]: Known sensors and metric kinds
//! - [`classifier`]: Column classification chain
//! - [`completion`]: Text-completion service client
//! - [`ingest`]: Export parsing and loading
//! - [`usage`]: Aggregation and locale formatting
//! - [`alerts`]: Threshold rules
//! - [`hub`]: Subscriber fan-out

// Modules
pub mod alerts;
pub mod catalog;
pub mod classifier;
pub mod completion;
pub mod config;
pub mod error;
pub mod hub;
pub mod ingest;
pub mod notification;
pub mod usage;

// Re-exports for convenient access
pub use alerts::{default_rules, evaluate, AlertRule};
pub use catalog::{DeviceDescriptor, MetricCatalog, MetricKind};
pub use classifier::{
    CatalogResolver, ColumnClassifier, ColumnResolver, DefaultResolver, ExternalResolver,
    Resolution,
};
pub use completion::{CompletionRequest, CompletionService, HttpCompletionService};
pub use config::{ClassifierConfig, CompletionConfig, IngestConfig, Settings};
pub use error::{CompletionError, ConfigError, IngestError, Result};
pub use hub::{
    BroadcastHub, PublishReport, SubscriberId, Subscription, DEFAULT_QUEUE_CAPACITY,
};
pub use ingest::{ColumnField, Dataset, IngestPipeline, MeasurementRow, MeasurementSink};
pub use notification::{NewNotification, NotificationCategory, NotificationEvent};
pub use usage::{
    current_readings, current_values, format_locale, summarize_usage, CurrentReading,
    UsageSummary,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
