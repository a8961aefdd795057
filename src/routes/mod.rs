pub mod scrape;

use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::middleware;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use sqlx::PgPool;
use tokio::sync::Mutex;

use crate::auth::require_api_token;
use crate::ingest::{JobStore, Pipeline};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub pipeline: Arc<Pipeline>,
    pub store: Arc<dyn JobStore>,
    /// Held for the duration of a background scrape run.
    pub run_lock: Arc<Mutex<()>>,
    pub api_token_hash: Arc<str>,
}

async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let result: Result<(i32,), _> = sqlx::query_as("SELECT 1").fetch_one(&state.pool).await;
    match result {
        Ok(_) => (StatusCode::OK, "ready"),
        Err(_) => (StatusCode::SERVICE_UNAVAILABLE, "not ready"),
    }
}

pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/scrape", post(scrape::trigger_all))
        .route("/scrape/runs", get(scrape::runs))
        .route("/scrape/{source}", post(scrape::trigger_source))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            require_api_token,
        ));

    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .nest("/api/v1", protected)
        .with_state(state)
}
