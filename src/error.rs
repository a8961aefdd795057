use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::models::job::SourceType;

/// Why a single fetch attempt failed.
#[derive(Debug, thiserror::Error)]
pub enum FetchCause {
    #[error("HTTP {0}")]
    Status(reqwest::StatusCode),

    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),
}

impl FetchCause {
    /// Non-2xx responses and network-level failures are worth another try.
    /// A request that could not even be built (bad URL) is not.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchCause::Status(_) => true,
            FetchCause::Network(e) => !e.is_builder(),
        }
    }
}

/// A page could not be fetched within the retry budget.
#[derive(Debug, thiserror::Error)]
#[error("failed to fetch {url} after {attempts} attempt(s): {cause}")]
pub struct FetchError {
    pub url: String,
    pub attempts: u32,
    #[source]
    pub cause: FetchCause,
}

/// A source run was aborted. Raised by the orchestrator, caught by the
/// coordinator.
#[derive(Debug, thiserror::Error)]
pub enum ScrapeFailure {
    #[error("{source_type}: page {page} could not be fetched: {error}")]
    Fetch {
        source_type: SourceType,
        page: u32,
        #[source]
        error: FetchError,
    },

    #[error("{source_type}: persistence failed: {error}")]
    Persistence {
        source_type: SourceType,
        #[source]
        error: sqlx::Error,
    },
}

/// A selector in a profile does not parse.
#[derive(Debug, thiserror::Error)]
#[error("invalid selector for {field} ('{selector}'): {message}")]
pub struct ProfileError {
    pub field: &'static str,
    pub selector: String,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized")]
    Unauthorized,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
        };

        let body = axum::Json(json!({ "error": message }));
        (status, body).into_response()
    }
}
