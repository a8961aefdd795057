use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgConnection, PgPool};

use crate::models::job::SourceType;

/// Audit row for one attempt at scraping a source.
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct ScrapeRun {
    pub id: i32,
    pub source_type: String,
    pub status: String,
    pub pages_processed: Option<i32>,
    pub saved_count: Option<i32>,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl ScrapeRun {
    /// Open a new run in the `running` state.
    pub async fn start(conn: &mut PgConnection, source: SourceType) -> Result<ScrapeRun, sqlx::Error> {
        sqlx::query_as::<_, ScrapeRun>(
            "INSERT INTO scrape_runs (source_type) VALUES ($1) RETURNING *",
        )
        .bind(source.as_str())
        .fetch_one(&mut *conn)
        .await
    }

    /// Take the per-source run lock, waiting for any other holder.
    ///
    /// The lock is session-level: it is held until the connection closes,
    /// so the caller must not hand the connection back to the pool.
    pub async fn lock_source(conn: &mut PgConnection, source: SourceType) -> Result<(), sqlx::Error> {
        let acquired: bool =
            sqlx::query_scalar("SELECT pg_try_advisory_lock(hashtext('scrape_runs:' || $1))")
                .bind(source.as_str())
                .fetch_one(&mut *conn)
                .await?;
        if !acquired {
            tracing::info!(%source, "Another run holds this source, waiting for it");
            sqlx::query("SELECT pg_advisory_lock(hashtext('scrape_runs:' || $1))")
                .bind(source.as_str())
                .execute(&mut *conn)
                .await?;
        }
        Ok(())
    }

    /// Runs left `running` by a crashed process are marked abandoned and
    /// their staged rows dropped. Returns how many runs were recovered.
    /// Only safe while holding [`ScrapeRun::lock_source`].
    pub async fn recover_stale(conn: &mut PgConnection, source: SourceType) -> Result<u64, sqlx::Error> {
        sqlx::query(
            "DELETE FROM staged_jobs WHERE run_id IN (
                 SELECT id FROM scrape_runs WHERE source_type = $1 AND status = 'running'
             )",
        )
        .bind(source.as_str())
        .execute(&mut *conn)
        .await?;

        let result = sqlx::query(
            "UPDATE scrape_runs SET status = 'abandoned', finished_at = NOW()
             WHERE source_type = $1 AND status = 'running'",
        )
        .bind(source.as_str())
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected())
    }

    /// Returns false when the run is no longer `running`.
    pub async fn mark_succeeded(
        conn: &mut PgConnection,
        id: i32,
        pages_processed: u32,
        saved_count: u64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE scrape_runs SET status = 'succeeded', pages_processed = $2, saved_count = $3, finished_at = NOW()
             WHERE id = $1 AND status = 'running'",
        )
        .bind(id)
        .bind(i32::try_from(pages_processed).unwrap_or(i32::MAX))
        .bind(i32::try_from(saved_count).unwrap_or(i32::MAX))
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn mark_failed(
        conn: &mut PgConnection,
        id: i32,
        pages_processed: u32,
        error: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE scrape_runs SET status = 'failed', pages_processed = $2, error = $3, finished_at = NOW()
             WHERE id = $1 AND status = 'running'",
        )
        .bind(id)
        .bind(i32::try_from(pages_processed).unwrap_or(i32::MAX))
        .bind(error)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Most recent runs first, optionally for one source.
    pub async fn recent(
        pool: &PgPool,
        source: Option<SourceType>,
        limit: i64,
    ) -> Result<Vec<ScrapeRun>, sqlx::Error> {
        sqlx::query_as::<_, ScrapeRun>(
            "SELECT * FROM scrape_runs WHERE ($1::text IS NULL OR source_type = $1) ORDER BY started_at DESC, id DESC LIMIT $2",
        )
        .bind(source.map(SourceType::as_str))
        .bind(limit)
        .fetch_all(pool)
        .await
    }
}
