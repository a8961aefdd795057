use std::time::Duration;

use clap::Parser;
use url::Url;

use crate::ingest::{FetchSettings, Pacing};
use crate::models::job::SourceType;

#[derive(Parser, Debug, Clone)]
#[command(name = "talentd-ingest", about = "Job listing ingestion for talentd.in")]
pub struct Config {
    /// Database connection URL
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// Run database migrations on startup
    #[arg(long, env = "RUN_MIGRATIONS", default_value = "true")]
    pub run_migrations: bool,

    /// Emit logs as JSON lines
    #[arg(long, env = "LOG_JSON", default_value = "false")]
    pub log_json: bool,

    #[command(flatten)]
    pub scrape: ScrapeSettings,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(clap::Args, Debug, Clone)]
pub struct ScrapeSettings {
    /// Root of the listing site
    #[arg(long, env = "SITE_BASE_URL", default_value = "https://www.talentd.in")]
    pub site_base_url: Url,

    /// Connect and read timeout per request, in seconds
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value = "10")]
    pub request_timeout_secs: u64,

    /// Total attempts per page fetch, including the first
    #[arg(long, env = "FETCH_MAX_ATTEMPTS", default_value = "3")]
    pub fetch_max_attempts: u32,

    /// Upper bound on time spent retrying one fetch, in seconds
    #[arg(long, env = "FETCH_MAX_RETRY_SECS", default_value = "30")]
    pub fetch_max_retry_secs: u64,

    /// First backoff delay; doubles after each failed attempt
    #[arg(long, env = "FETCH_INITIAL_BACKOFF_MS", default_value = "1000")]
    pub fetch_initial_backoff_ms: u64,

    /// Pause between listing pages, in seconds
    #[arg(long, env = "PAGE_DELAY_SECS", default_value = "2")]
    pub page_delay_secs: u64,

    /// Pause between sources, in seconds
    #[arg(long, env = "SOURCE_DELAY_SECS", default_value = "2")]
    pub source_delay_secs: u64,
}

impl ScrapeSettings {
    pub fn fetch_settings(&self) -> FetchSettings {
        let mut settings = FetchSettings::default();
        settings.timeout = Duration::from_secs(self.request_timeout_secs);
        settings.retry.max_attempts = self.fetch_max_attempts.max(1);
        settings.retry.max_elapsed = Duration::from_secs(self.fetch_max_retry_secs);
        settings.retry.initial_delay = Duration::from_millis(self.fetch_initial_backoff_ms);
        settings
    }

    pub fn pacing(&self) -> Pacing {
        Pacing {
            between_pages: Duration::from_secs(self.page_delay_secs),
            between_sources: Duration::from_secs(self.source_delay_secs),
        }
    }
}

#[derive(clap::Subcommand, Debug, Clone)]
pub enum Command {
    /// Serve the trigger API (default when no subcommand given)
    Serve {
        /// Listen address
        #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8080")]
        listen_addr: String,

        /// Bearer token required on /api/v1 routes
        #[arg(long, env = "API_TOKEN", hide_env_values = true)]
        api_token: String,
    },
    /// Scrape once in the foreground and exit
    Scrape {
        /// Only scrape this source; all sources when omitted
        #[arg(long, value_enum)]
        source: Option<SourceType>,
    },
}

impl Config {
    /// Resolve the command, defaulting to Serve if none specified.
    pub fn resolved_command(&self) -> anyhow::Result<Command> {
        if let Some(command) = &self.command {
            return Ok(command.clone());
        }
        let api_token = std::env::var("API_TOKEN")
            .map_err(|_| anyhow::anyhow!("API_TOKEN must be set to serve the trigger API"))?;
        Ok(Command::Serve {
            listen_addr: std::env::var("LISTEN_ADDR")
                .unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            api_token,
        })
    }
}
