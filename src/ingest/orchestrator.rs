use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{FetchError, ProfileError, ScrapeFailure};
use crate::ingest::extractor::extract_page;
use crate::ingest::fetcher::Fetcher;
use crate::ingest::pagination::discover_page_count;
use crate::ingest::profile::{CompiledProfile, SelectorProfile};
use crate::ingest::store::{JobStore, ReplaceSession};
use crate::models::job::{JobRecord, SourceType};

/// Fixed politeness delays.
#[derive(Debug, Clone, Copy)]
pub struct Pacing {
    pub between_pages: Duration,
    pub between_sources: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            between_pages: Duration::from_secs(2),
            between_sources: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunResult {
    pub saved_count: u64,
    pub pages_processed: u32,
    pub skipped_cards: usize,
}

/// Fetches, extracts and persists listings, one source at a time.
pub struct Pipeline {
    fetcher: Fetcher,
    site: Url,
    profiles: [(SourceType, CompiledProfile); 3],
    pacing: Pacing,
}

impl Pipeline {
    pub fn new(fetcher: Fetcher, site: Url, pacing: Pacing) -> Result<Self, ProfileError> {
        let [a, b, c] = SourceType::ALL;
        let profiles = [
            (a, SelectorProfile::for_source(a).compile()?),
            (b, SelectorProfile::for_source(b).compile()?),
            (c, SelectorProfile::for_source(c).compile()?),
        ];
        Ok(Self {
            fetcher,
            site,
            profiles,
            pacing,
        })
    }

    pub fn pacing(&self) -> Pacing {
        self.pacing
    }

    fn profile(&self, source: SourceType) -> &CompiledProfile {
        self.profiles
            .iter()
            .find(|(s, _)| *s == source)
            .map(|(_, p)| p)
            .unwrap_or(&self.profiles[0].1)
    }

    /// `{site}{listing path}?page=`; cards' relative links resolve against it.
    pub fn listing_base(&self, source: SourceType) -> Url {
        let mut url = self.site.clone();
        url.set_path(source.listing_path());
        url.set_query(Some("page="));
        url
    }

    pub fn page_url(&self, source: SourceType, page: u32) -> String {
        format!("{}{page}", self.listing_base(source))
    }

    /// Replace the stored collection for `source` with a fresh scrape.
    ///
    /// Pages are staged as they are processed; the collection is swapped only
    /// after the last page. Any fetch or persistence failure aborts the run
    /// and leaves the previous collection in place.
    pub async fn run_source(
        &self,
        store: &dyn JobStore,
        source: SourceType,
    ) -> Result<RunResult, ScrapeFailure> {
        let persistence = |error: sqlx::Error| ScrapeFailure::Persistence {
            source_type: source,
            error,
        };

        info!(%source, "Starting scrape");
        let mut session = store.open_session(source).await.map_err(persistence)?;

        let mut progress = Progress::default();
        match self.scrape_pages(session.as_mut(), source, &mut progress).await {
            Ok(()) => {
                let saved = session
                    .commit(progress.pages_processed)
                    .await
                    .map_err(persistence)?;
                info!(
                    %source,
                    saved,
                    pages = progress.pages_processed,
                    skipped = progress.skipped_cards,
                    "Scrape committed"
                );
                Ok(RunResult {
                    saved_count: saved,
                    pages_processed: progress.pages_processed,
                    skipped_cards: progress.skipped_cards,
                })
            }
            Err(failure) => {
                if let Err(e) = session
                    .abort(progress.pages_processed, &failure.to_string())
                    .await
                {
                    warn!(%source, "Failed to record aborted run: {e}");
                }
                Err(failure)
            }
        }
    }

    async fn scrape_pages(
        &self,
        session: &mut dyn ReplaceSession,
        source: SourceType,
        progress: &mut Progress,
    ) -> Result<(), ScrapeFailure> {
        let profile = self.profile(source);
        let base = self.listing_base(source);
        let fetch_failed = |page: u32| {
            move |error: FetchError| ScrapeFailure::Fetch {
                source_type: source,
                page,
                error,
            }
        };

        let first_page = self
            .fetcher
            .fetch(&self.page_url(source, 1))
            .await
            .map_err(fetch_failed(1))?;
        let last_page = discover_page_count(&first_page, &profile.pagination);
        info!(%source, last_page, "Detected page count");

        let mut pending = Some(first_page);
        for page in 1..=last_page {
            let html = match pending.take() {
                Some(html) => html,
                None => {
                    tokio::time::sleep(self.pacing.between_pages).await;
                    self.fetcher
                        .fetch(&self.page_url(source, page))
                        .await
                        .map_err(fetch_failed(page))?
                }
            };

            let extracted = extract_page(&html, &base, profile);
            let fetched_at = Utc::now();
            let records: Vec<JobRecord> = extracted
                .cards
                .into_iter()
                .map(|card| JobRecord::from_card(card, source, fetched_at))
                .collect();

            let staged = session
                .stage(page, &records)
                .await
                .map_err(|error| ScrapeFailure::Persistence {
                    source_type: source,
                    error,
                })?;

            progress.pages_processed = page;
            progress.skipped_cards += extracted.skipped;
            debug!(
                %source,
                page,
                staged,
                skipped = extracted.skipped,
                "Processed page"
            );
        }

        Ok(())
    }
}

#[derive(Debug, Default)]
struct Progress {
    pages_processed: u32,
    skipped_cards: usize,
}
