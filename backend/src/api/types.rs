//! HTTP response envelopes and request bodies.
//!
//! Successful bodies carry `"success": true` next to the payload's own
//! fields; failures are `{"success": false, "error": "..."}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::PathBuf;
use uuid::Uuid;

use crate::config::IngestOptions;
use crate::error::QueryError;
use crate::query::{DEFAULT_LIMIT, DEFAULT_PAGE};

/// Successful response: `success: true` plus the flattened payload.
#[derive(Debug, Clone, Serialize)]
pub struct Success<T> {
    pub success: bool,
    #[serde(flatten)]
    pub payload: T,
}

impl<T> Success<T> {
    pub fn new(payload: T) -> Self {
        Self {
            success: true,
            payload,
        }
    }
}

impl<T: Serialize> IntoResponse for Success<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// Error body.
pub fn error_body(error: &str) -> Value {
    json!({
        "success": false,
        "error": error,
    })
}

pub fn error_response(status: StatusCode, error: &str) -> Response {
    (status, Json(error_body(error))).into_response()
}

impl IntoResponse for QueryError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        error_response(status, &self.to_string())
    }
}

// =============================================================================
// Requests
// =============================================================================

/// Query string of `GET /api/data`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PageParams {
    pub page: usize,
    pub limit: usize,
}

impl Default for PageParams {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SearchParams {
    pub q: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FilterParams {
    pub field: String,
    pub value: String,
}

/// Body of `POST /api/ingest`.
#[derive(Debug, Clone, Deserialize)]
pub struct IngestRequest {
    pub path: PathBuf,
    #[serde(flatten)]
    pub options: IngestOptions,
}

/// Answer to `POST /api/ingest`.
#[derive(Debug, Clone, Serialize)]
pub struct IngestAccepted {
    pub job_id: Uuid,
    pub message: String,
}
