use serde::Serialize;
use tracing::{error, info};

use crate::ingest::orchestrator::{Pipeline, RunResult};
use crate::ingest::store::JobStore;
use crate::models::job::SourceType;

#[derive(Debug, Serialize)]
pub struct SourceReport {
    pub source: SourceType,
    #[serde(flatten)]
    pub outcome: SourceOutcome,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum SourceOutcome {
    Succeeded(RunResult),
    Failed { error: String },
}

#[derive(Debug, Default, Serialize)]
pub struct RunSummary {
    pub sources: Vec<SourceReport>,
}

impl RunSummary {
    pub fn failed(&self) -> usize {
        self.sources
            .iter()
            .filter(|r| matches!(r.outcome, SourceOutcome::Failed { .. }))
            .count()
    }
}

impl Pipeline {
    /// Scrape every source in order. Never fails: each source's outcome is
    /// reported in the summary and a failing source does not stop the rest.
    pub async fn run_all_sources(&self, store: &dyn JobStore) -> RunSummary {
        self.run_sources(store, &SourceType::ALL).await
    }

    pub async fn run_sources(&self, store: &dyn JobStore, sources: &[SourceType]) -> RunSummary {
        let mut summary = RunSummary::default();

        for (i, &source) in sources.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.pacing().between_sources).await;
            }

            let outcome = match self.run_source(store, source).await {
                Ok(result) => SourceOutcome::Succeeded(result),
                Err(e) => {
                    error!(%source, "Scraper failed: {e}");
                    SourceOutcome::Failed {
                        error: e.to_string(),
                    }
                }
            };
            summary.sources.push(SourceReport { source, outcome });
        }

        info!(
            sources = summary.sources.len(),
            failed = summary.failed(),
            "Scrape run finished"
        );
        summary
    }
}
