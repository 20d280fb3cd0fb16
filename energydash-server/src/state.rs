// EnergyDash Server - HTTP and WebSocket surface
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Shared application state

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use energydash::{
    evaluate, BroadcastHub, ColumnClassifier, Dataset, DeviceDescriptor, IngestPipeline,
    MetricCatalog, NotificationEvent, Settings,
};
use energydash_store::SqliteStore;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::error::ApiError;

/// Outcome of one import
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ImportSummary {
    pub message: String,
    pub rows: usize,
    pub malformed_cells: usize,
    pub alerts: usize,
    /// Alerts that triggered but could not be stored; the rows are kept
    pub alerts_failed: usize,
}

/// State shared by every handler
pub struct AppState {
    pub settings: Arc<Settings>,
    pub pipeline: IngestPipeline,
    pub classifier: ColumnClassifier,
    pub store: Arc<SqliteStore>,
    pub hub: Arc<BroadcastHub>,
    /// Export read by the device views and by import
    pub csv_path: PathBuf,
    import_lock: Mutex<()>,
}

impl AppState {
    /// Wire the components from one immutable settings value
    pub fn new(settings: Settings, store: SqliteStore, csv_path: impl Into<PathBuf>) -> Self {
        let catalog = Arc::new(MetricCatalog::builtin());
        let pipeline = IngestPipeline::new(settings.ingest.clone(), Arc::clone(&catalog));
        let classifier = ColumnClassifier::from_config(&settings.classifier, catalog);
        info!("Classifier strategies: {}", classifier.strategies().join(" -> "));

        Self {
            settings: Arc::new(settings),
            pipeline,
            classifier,
            store: Arc::new(store),
            hub: Arc::new(BroadcastHub::new()),
            csv_path: csv_path.into(),
            import_lock: Mutex::new(()),
        }
    }

    /// Replace the classifier, e.g. with one backed by a test service
    pub fn with_classifier(mut self, classifier: ColumnClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Parse the configured export off the async runtime
    pub async fn load_dataset(&self) -> Result<Dataset, ApiError> {
        let pipeline = self.pipeline.clone();
        let path = self.csv_path.clone();
        let dataset = tokio::task::spawn_blocking(move || pipeline.parse_path(path)).await??;
        Ok(dataset)
    }

    /// Descriptors for every data column of `dataset`
    pub async fn describe(&self, dataset: &Dataset) -> HashMap<String, DeviceDescriptor> {
        self.classifier.classify_all(dataset.column_names()).await
    }

    /// Parse the export, persist it as one batch, then raise threshold alerts.
    /// Imports never overlap. Once the batch is committed a failing alert is
    /// logged and counted rather than failing the import.
    pub async fn import(&self) -> Result<ImportSummary, ApiError> {
        let _guard = self.import_lock.lock().await;

        let dataset = self.load_dataset().await?;
        let malformed_cells = dataset.malformed_cells;

        let pipeline = self.pipeline.clone();
        let store = Arc::clone(&self.store);
        let (rows, dataset) = tokio::task::spawn_blocking(move || {
            pipeline
                .load(store.as_ref(), &dataset.rows)
                .map(|rows| (rows, dataset))
        })
        .await??;

        let current = energydash::current_values(&dataset);
        let triggered = evaluate(&self.settings.alerts, &current);
        let mut alerts = 0;
        let mut alerts_failed = 0;
        for new in triggered {
            let store = Arc::clone(&self.store);
            let title = new.title.clone();
            match tokio::task::spawn_blocking(move || store.insert_notification(&new)).await? {
                Ok(event) => {
                    self.broadcast(&event);
                    alerts += 1;
                }
                Err(err) => {
                    error!("Failed to store alert '{}': {}", title, err);
                    alerts_failed += 1;
                }
            }
        }

        if malformed_cells > 0 {
            warn!("Import skipped {} malformed cells", malformed_cells);
        }
        info!("Imported {} rows, raised {} alerts", rows, alerts);

        Ok(ImportSummary {
            message: "Data imported successfully".to_string(),
            rows,
            malformed_cells,
            alerts,
            alerts_failed,
        })
    }

    /// Push a stored notification to every live subscriber
    pub fn broadcast(&self, event: &NotificationEvent) {
        let report = self.hub.publish(event.to_payload());
        if report.dropped > 0 {
            warn!(
                "Notification {}: {} subscribers dropped",
                event.id, report.dropped
            );
        }
        tracing::debug!(
            "Notification {} delivered to {} subscribers",
            event.id,
            report.delivered
        );
    }
}
