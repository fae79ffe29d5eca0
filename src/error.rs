use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::translation::{CacheError, WarmupError};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid or missing API key")]
    Unauthorized,

    #[error("Admin API is disabled: ADMIN_API_KEY is not configured")]
    AdminDisabled,

    #[error("A cache warm-up is already running")]
    WarmupRunning,

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<WarmupError> for AppError {
    fn from(err: WarmupError) -> Self {
        match err {
            WarmupError::AlreadyRunning => AppError::WarmupRunning,
            other => AppError::Internal(other.into()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::AdminDisabled => StatusCode::SERVICE_UNAVAILABLE,
            AppError::WarmupRunning => StatusCode::CONFLICT,
            AppError::Cache(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!("{}", self);
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
