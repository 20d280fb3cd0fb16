// EnergyDash Server - HTTP and WebSocket surface
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! REST routes

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Local;
use energydash::{
    current_readings, summarize_usage, CurrentReading, NewNotification, NotificationEvent,
    UsageSummary,
};
use energydash_store::{DailyAverage, StoredMeasurement};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::error::ApiError;
use crate::state::{AppState, ImportSummary};
use crate::ws::notifications_socket;

type SharedState = Arc<AppState>;

const DEFAULT_MEASUREMENT_LIMIT: usize = 100;
const DEFAULT_NOTIFICATION_LIMIT: usize = 50;
const DEFAULT_DAYS: u32 = 7;

/// Build the application router
pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/api/devices/usage", get(devices_usage))
        .route("/api/devices/current", get(devices_current))
        .route("/api/measurements/latest", get(measurements_latest))
        .route("/api/measurements/daily", get(measurements_daily))
        .route("/api/measurements/import", get(measurements_import))
        .route(
            "/api/notifications",
            get(notifications_list).post(notifications_create),
        )
        .route("/api/notifications/read/:id", post(notifications_read))
        .route("/ws/notifications", get(notifications_socket))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct ServiceInfo {
    name: &'static str,
    version: &'static str,
    description: &'static str,
}

async fn root_handler() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        name: "EnergyDash API",
        version: env!("CARGO_PKG_VERSION"),
        description: "Energy consumption and production monitoring",
    })
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    subscribers: usize,
}

async fn health_handler(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        subscribers: state.hub.len(),
    })
}

async fn devices_usage(
    State(state): State<SharedState>,
) -> Result<Json<Vec<UsageSummary>>, ApiError> {
    let dataset = state.load_dataset().await?;
    let descriptors = state.describe(&dataset).await;
    Ok(Json(summarize_usage(
        &dataset,
        &descriptors,
        state.pipeline.config().interval_hours(),
    )))
}

async fn devices_current(
    State(state): State<SharedState>,
) -> Result<Json<Vec<CurrentReading>>, ApiError> {
    let dataset = state.load_dataset().await?;
    let descriptors = state.describe(&dataset).await;
    Ok(Json(current_readings(&dataset, &descriptors)))
}

#[derive(Debug, Deserialize)]
struct LimitQuery {
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct DaysQuery {
    days: Option<u32>,
}

async fn measurements_latest(
    State(state): State<SharedState>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<StoredMeasurement>>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_MEASUREMENT_LIMIT);
    let store = Arc::clone(&state.store);
    let rows = tokio::task::spawn_blocking(move || store.latest_measurements(limit)).await??;
    Ok(Json(rows))
}

async fn measurements_daily(
    State(state): State<SharedState>,
    Query(query): Query<DaysQuery>,
) -> Result<Json<Vec<DailyAverage>>, ApiError> {
    let days = query.days.unwrap_or(DEFAULT_DAYS);
    let today = Local::now().date_naive();
    let store = Arc::clone(&state.store);
    let rows = tokio::task::spawn_blocking(move || store.daily_averages(days, today)).await??;
    Ok(Json(rows))
}

async fn measurements_import(
    State(state): State<SharedState>,
) -> Result<Json<ImportSummary>, ApiError> {
    Ok(Json(state.import().await?))
}

async fn notifications_list(
    State(state): State<SharedState>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<NotificationEvent>>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_NOTIFICATION_LIMIT);
    let store = Arc::clone(&state.store);
    let events = tokio::task::spawn_blocking(move || store.notifications(limit)).await??;
    Ok(Json(events))
}

async fn notifications_create(
    State(state): State<SharedState>,
    body: Result<Json<NewNotification>, JsonRejection>,
) -> Result<(StatusCode, Json<NotificationEvent>), ApiError> {
    let Json(new) = body?;
    if new.title.trim().is_empty() {
        return Err(ApiError::BadRequest("title must not be empty".to_string()));
    }

    let store = Arc::clone(&state.store);
    let event = tokio::task::spawn_blocking(move || store.insert_notification(&new)).await??;
    state.broadcast(&event);
    Ok((StatusCode::CREATED, Json(event)))
}

async fn notifications_read(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<Json<NotificationEvent>, ApiError> {
    let store = Arc::clone(&state.store);
    let event = tokio::task::spawn_blocking(move || {
        if store.mark_notification_read(id)? {
            store.notification(id)
        } else {
            Ok(None)
        }
    })
    .await??;

    event
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Notification {id} not found")))
}
