//! Listing ingestion: fetch listing pages, extract job cards and replace the
//! stored collection for each source.

pub mod extractor;
pub mod fetcher;
pub mod orchestrator;
pub mod pagination;
pub mod profile;
pub mod retry;
pub mod runner;
pub mod store;

pub use fetcher::{FetchSettings, Fetcher};
pub use orchestrator::{Pacing, Pipeline};
pub use store::{JobStore, PgJobStore};
