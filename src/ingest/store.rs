use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::{Connection, PgPool, Postgres};

use crate::models::job::{JobRecord, SourceType};
use crate::models::scrape_run::ScrapeRun;

/// Persistence client handed to the pipeline.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Start a replace run for one source. Nothing visible changes until
    /// the returned session is committed.
    async fn open_session(&self, source: SourceType) -> Result<Box<dyn ReplaceSession>, sqlx::Error>;
}

/// One source's in-flight replacement. Owns its connection for the whole
/// run; the connection is released when the session is consumed or dropped.
#[async_trait]
pub trait ReplaceSession: Send {
    /// Durably stage one page of records. Returns how many were written.
    async fn stage(&mut self, page: u32, records: &[JobRecord]) -> Result<u64, sqlx::Error>;

    /// Swap the staged records in as the source's collection.
    async fn commit(self: Box<Self>, pages_processed: u32) -> Result<u64, sqlx::Error>;

    /// Drop staged records and record the failure. The live collection is
    /// left as it was.
    async fn abort(self: Box<Self>, pages_processed: u32, reason: &str) -> Result<(), sqlx::Error>;
}

#[derive(Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn open_session(&self, source: SourceType) -> Result<Box<dyn ReplaceSession>, sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        // The source lock lives as long as this connection.
        conn.close_on_drop();
        ScrapeRun::lock_source(&mut conn, source).await?;

        let stale = ScrapeRun::recover_stale(&mut conn, source).await?;
        if stale > 0 {
            tracing::warn!("Recovered {stale} stale '{source}' runs");
        }

        let run = ScrapeRun::start(&mut conn, source).await?;
        tracing::debug!(run_id = run.id, %source, "Opened replace session");

        Ok(Box::new(PgReplaceSession {
            conn,
            run_id: run.id,
            source,
        }))
    }
}

struct PgReplaceSession {
    conn: PoolConnection<Postgres>,
    run_id: i32,
    source: SourceType,
}

impl PgReplaceSession {
    async fn swap(&mut self, pages_processed: u32) -> Result<u64, sqlx::Error> {
        let mut tx = self.conn.begin().await?;
        let saved = JobRecord::swap_in_staged(&mut tx, self.source, self.run_id).await?;
        if !ScrapeRun::mark_succeeded(&mut tx, self.run_id, pages_processed, saved).await? {
            // Dropping `tx` rolls the swap back.
            return Err(sqlx::Error::RowNotFound);
        }
        tx.commit().await?;
        Ok(saved)
    }

    /// Staged rows are discarded even when the run was already closed.
    async fn fail(&mut self, pages_processed: u32, reason: &str) -> Result<(), sqlx::Error> {
        let mut tx = self.conn.begin().await?;
        JobRecord::discard_staged(&mut tx, self.run_id).await?;
        let marked = ScrapeRun::mark_failed(&mut tx, self.run_id, pages_processed, reason).await?;
        tx.commit().await?;
        if marked {
            Ok(())
        } else {
            Err(sqlx::Error::RowNotFound)
        }
    }
}

#[async_trait]
impl ReplaceSession for PgReplaceSession {
    async fn stage(&mut self, page: u32, records: &[JobRecord]) -> Result<u64, sqlx::Error> {
        let mut tx = self.conn.begin().await?;
        let written = JobRecord::stage_batch(&mut tx, self.run_id, page, records).await?;
        tx.commit().await?;
        Ok(written)
    }

    async fn commit(mut self: Box<Self>, pages_processed: u32) -> Result<u64, sqlx::Error> {
        match self.swap(pages_processed).await {
            Ok(saved) => Ok(saved),
            Err(e) => {
                let reason = format!("commit failed: {e}");
                if let Err(cleanup) = self.fail(pages_processed, &reason).await {
                    tracing::warn!(run_id = self.run_id, "Failed to record failed commit: {cleanup}");
                }
                Err(e)
            }
        }
    }

    async fn abort(mut self: Box<Self>, pages_processed: u32, reason: &str) -> Result<(), sqlx::Error> {
        self.fail(pages_processed, reason).await
    }
}
