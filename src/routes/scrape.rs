use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::AppError;
use crate::models::job::SourceType;
use crate::models::scrape_run::ScrapeRun;
use crate::routes::AppState;

#[derive(Debug, Deserialize)]
pub struct RunsQuery {
    pub source: Option<SourceType>,
    pub limit: Option<i64>,
}

/// POST /api/v1/scrape
///
/// Start a background run over every source.
pub async fn trigger_all(State(state): State<AppState>) -> Result<(StatusCode, Json<Value>), AppError> {
    start_run(state, SourceType::ALL.to_vec())
}

/// POST /api/v1/scrape/{source}
pub async fn trigger_source(
    State(state): State<AppState>,
    Path(source): Path<String>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let source: SourceType = source
        .parse()
        .map_err(|e: crate::models::job::UnknownSource| AppError::BadRequest(e.to_string()))?;
    start_run(state, vec![source])
}

/// GET /api/v1/scrape/runs
pub async fn runs(
    State(state): State<AppState>,
    Query(query): Query<RunsQuery>,
) -> Result<Json<Vec<ScrapeRun>>, AppError> {
    let limit = query.limit.unwrap_or(20).clamp(1, 100);
    let runs = ScrapeRun::recent(&state.pool, query.source, limit).await?;
    Ok(Json(runs))
}

/// Only one run at a time: source runs must never overlap, since each one
/// owns its source's collection until it commits.
fn start_run(state: AppState, sources: Vec<SourceType>) -> Result<(StatusCode, Json<Value>), AppError> {
    let guard = Arc::clone(&state.run_lock)
        .try_lock_owned()
        .map_err(|_| AppError::Conflict("A scrape run is already in progress".to_string()))?;

    let names: Vec<&'static str> = sources.iter().map(|s| s.as_str()).collect();
    tracing::info!(sources = ?names, "Scrape run triggered");

    tokio::spawn(async move {
        let _guard = guard;
        state
            .pipeline
            .run_sources(state.store.as_ref(), &sources)
            .await;
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "status": "started", "sources": names })),
    ))
}
