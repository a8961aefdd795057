mod auth;
mod config;
mod db;
mod error;
mod ingest;
mod models;
mod routes;

use std::sync::Arc;

use clap::Parser;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::config::{Command, Config};
use crate::ingest::{Fetcher, PgJobStore, Pipeline};
use crate::routes::AppState;

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("talentd_ingest=info,tower_http=info"));
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    init_tracing(config.log_json);
    let command = config.resolved_command()?;

    tracing::info!("Connecting to database...");
    let pool = db::create_pool(&config.database_url).await?;

    if config.run_migrations {
        tracing::info!("Running database migrations...");
        db::run_migrations(&pool).await?;
        tracing::info!("Migrations complete");
    }

    let fetcher = Fetcher::new(config.scrape.fetch_settings())?;
    let pipeline = Pipeline::new(
        fetcher,
        config.scrape.site_base_url.clone(),
        config.scrape.pacing(),
    )?;
    let store = PgJobStore::new(pool.clone());

    match command {
        Command::Scrape { source } => {
            let summary = match source {
                Some(source) => pipeline.run_sources(&store, &[source]).await,
                None => pipeline.run_all_sources(&store).await,
            };
            for report in &summary.sources {
                tracing::info!(source = %report.source, outcome = ?report.outcome, "Source finished");
            }
        }
        Command::Serve {
            listen_addr,
            api_token,
        } => {
            let state = AppState {
                pool,
                pipeline: Arc::new(pipeline),
                store: Arc::new(store),
                run_lock: Arc::new(Mutex::new(())),
                api_token_hash: auth::hash_token(&api_token).into(),
            };
            let app = routes::router(state)
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive());

            let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
            tracing::info!("Listening on {listen_addr}");
            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}
