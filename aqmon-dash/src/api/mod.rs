//! HTTP API handlers

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

mod dashboard;
mod health;
mod prediction;
mod sse;

pub use dashboard::{get_config, get_distinct_values, get_readings, get_summary, update_config};
pub use health::health_check;
pub use prediction::{get_models, post_predict};
pub use sse::sse_events;

/// API errors mapped to HTTP responses
#[derive(Debug)]
pub enum ApiError {
    Database(String),
    InvalidInput(String),
    ModelsUnavailable(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Database(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Database error: {}", msg),
            ),
            ApiError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::ModelsUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Internal error: {}", msg),
            ),
        };

        let body = Json(json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}

impl From<aqmon_common::Error> for ApiError {
    fn from(e: aqmon_common::Error) -> Self {
        match e {
            aqmon_common::Error::InvalidInput(msg) => ApiError::InvalidInput(msg),
            other => ApiError::Database(other.to_string()),
        }
    }
}
