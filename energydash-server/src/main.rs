// EnergyDash Server - HTTP and WebSocket surface
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! # EnergyDash Server
//!
//! REST API and live notification channel for the home energy dashboard.
//!
//! ## Usage
//!
//! ```bash
//! # Serve the default export and database
//! energydash-server --csv data/energy_consumption.csv --database data/energydash.db
//!
//! # Enable external column classification
//! ENERGYDASH_COMPLETION_KEY=... energydash-server --port 8000
//! ```

mod error;
mod routes;
mod state;
mod ws;

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use energydash::{CompletionConfig, Settings};
use energydash_store::SqliteStore;
use tokio::net::TcpListener;
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

use crate::state::AppState;

/// EnergyDash API server
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "ENERGYDASH_PORT", default_value = "8000")]
    port: u16,

    /// Address to bind
    #[arg(long, env = "ENERGYDASH_BIND", default_value = "0.0.0.0")]
    bind: IpAddr,

    /// Tab-delimited measurement export
    #[arg(short, long, env = "ENERGYDASH_CSV", default_value = "data/energy_consumption.csv")]
    csv: PathBuf,

    /// SQLite database file
    #[arg(short, long, env = "ENERGYDASH_DATABASE", default_value = "data/energydash.db")]
    database: PathBuf,

    /// JSON settings file (defaults are used when absent)
    #[arg(short, long, env = "ENERGYDASH_SETTINGS")]
    settings: Option<PathBuf>,

    /// Chat-completions endpoint for classifying unknown columns
    #[arg(long, env = "ENERGYDASH_COMPLETION_ENDPOINT")]
    completion_endpoint: Option<String>,

    /// Bearer credential for the completion endpoint; omit to disable
    #[arg(long, env = "ENERGYDASH_COMPLETION_KEY", hide_env_values = true)]
    completion_key: Option<String>,

    /// Completion model name
    #[arg(long, env = "ENERGYDASH_COMPLETION_MODEL")]
    completion_model: Option<String>,

    /// Timeout for one classification call, in milliseconds
    #[arg(long, env = "ENERGYDASH_COMPLETION_TIMEOUT_MS")]
    completion_timeout_ms: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    /// Overlay the completion flags that were given onto `base`.
    ///
    /// Without any flag `base` is returned as is; otherwise unset fields keep
    /// the value from `base`, or the built-in default when `base` is `None`.
    fn completion(&self, base: Option<CompletionConfig>) -> Option<CompletionConfig> {
        let overridden = self.completion_key.is_some()
            || self.completion_endpoint.is_some()
            || self.completion_model.is_some()
            || self.completion_timeout_ms.is_some();
        if !overridden {
            return base;
        }

        let mut config = base.unwrap_or_default();
        if let Some(api_key) = &self.completion_key {
            config.api_key = api_key.clone();
        }
        if let Some(endpoint) = &self.completion_endpoint {
            config.endpoint = endpoint.clone();
        }
        if let Some(model) = &self.completion_model {
            config.model = model.clone();
        }
        if let Some(timeout_ms) = self.completion_timeout_ms {
            config.timeout_ms = timeout_ms;
        }
        Some(config)
    }
}

fn load_settings(path: Option<&Path>) -> anyhow::Result<Settings> {
    match path {
        Some(path) if path.exists() => Settings::from_json_file(path)
            .with_context(|| format!("failed to load settings from {}", path.display())),
        Some(path) => {
            warn!("Settings file {} not found, using defaults", path.display());
            Ok(Settings::default())
        }
        None => Ok(Settings::default()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = match args.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        };
        EnvFilter::from_default_env().add_directive(level.into())
    });

    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("EnergyDash server v{}", env!("CARGO_PKG_VERSION"));

    let settings = load_settings(args.settings.as_deref())?;
    let completion = args.completion(settings.classifier.completion.clone());
    let settings = settings.with_completion(completion);

    let store = SqliteStore::open(&args.database)
        .with_context(|| format!("failed to open database {}", args.database.display()))?;

    let state = Arc::new(AppState::new(settings, store, args.csv.clone()));
    info!("Reading exports from {}", args.csv.display());

    let app = routes::router(state);

    let addr = SocketAddr::new(args.bind, args.port);
    info!("Starting server on http://{}", addr);
    info!("Notifications channel: ws://{}/ws/notifications", addr);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app).await?;
    Ok(())
}
