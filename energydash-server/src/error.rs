// EnergyDash Server - HTTP and WebSocket surface
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! HTTP error mapping

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use energydash::IngestError;
use energydash_store::StoreError;
use serde_json::json;
use thiserror::Error;

/// Errors returned by request handlers
#[derive(Error, Debug)]
pub enum ApiError {
    /// The export could not be read
    #[error("Import failed: {0}")]
    Ingest(#[from] IngestError),

    /// The database rejected the operation
    #[error("Database error: {0}")]
    Store(#[from] StoreError),

    /// Unknown resource
    #[error("{0}")]
    NotFound(String),

    /// Malformed request body or query
    #[error("{0}")]
    BadRequest(String),

    /// A background task failed
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Ingest(_) | ApiError::Store(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{}", self);
        } else {
            tracing::debug!("{}", self);
        }
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let err = ApiError::from(IngestError::MissingTimestampColumn {
            expected: "Tijdstip".to_string(),
        });
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            ApiError::NotFound("Notification 3 not found".to_string()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::BadRequest("missing field".to_string()).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_response_body_has_detail() {
        let response = ApiError::NotFound("gone".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
