use std::time::Duration;

use reqwest::Client;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue};
use tracing::debug;

use crate::error::{FetchCause, FetchError};
use crate::ingest::retry::{RetryPolicy, with_retry};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

#[derive(Clone, Copy)]
pub struct FetchSettings {
    pub timeout: Duration,
    pub retry: RetryPolicy<FetchCause>,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            retry: RetryPolicy {
                max_attempts: 3,
                max_elapsed: Duration::from_secs(30),
                initial_delay: Duration::from_secs(1),
                max_delay: Duration::from_secs(10),
                retryable: FetchCause::is_transient,
            },
        }
    }
}

/// Fetches listing pages with a browser-like identity and bounded retry.
/// Holds no state between calls beyond the pooled HTTP client.
pub struct Fetcher {
    client: Client,
    retry: RetryPolicy<FetchCause>,
}

impl Fetcher {
    pub fn new(settings: FetchSettings) -> Result<Self, reqwest::Error> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .connect_timeout(settings.timeout)
            .timeout(settings.timeout)
            .build()?;

        Ok(Self {
            client,
            retry: settings.retry,
        })
    }

    /// GET `url` and return the body text.
    pub async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        with_retry(&self.retry, || self.fetch_once(url))
            .await
            .map_err(|exhausted| FetchError {
                url: url.to_string(),
                attempts: exhausted.attempts,
                cause: exhausted.last_error,
            })
    }

    async fn fetch_once(&self, url: &str) -> Result<String, FetchCause> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchCause::Status(status));
        }

        let body = response.text().await?;
        debug!(url, bytes = body.len(), "Fetched page");
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_settings(max_attempts: u32) -> FetchSettings {
        let mut settings = FetchSettings::default();
        settings.timeout = Duration::from_secs(2);
        settings.retry.max_attempts = max_attempts;
        settings.retry.initial_delay = Duration::from_millis(5);
        settings.retry.max_delay = Duration::from_millis(20);
        settings
    }

    #[test]
    fn test_default_settings_match_politeness_contract() {
        let settings = FetchSettings::default();
        assert_eq!(settings.timeout, Duration::from_secs(10));
        assert_eq!(settings.retry.max_attempts, 3);
        assert_eq!(settings.retry.max_elapsed, Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_fetch_returns_body_and_sends_user_agent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/jobs"))
            .and(header_exists("user-agent"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(fast_settings(3)).unwrap();
        let body = fetcher
            .fetch(&format!("{}/jobs", server.uri()))
            .await
            .unwrap();
        assert_eq!(body, "<html>ok</html>");
    }

    #[tokio::test]
    async fn test_fetch_retries_server_errors_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/jobs"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/jobs"))
            .respond_with(ResponseTemplate::new(200).set_body_string("recovered"))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(fast_settings(3)).unwrap();
        let body = fetcher
            .fetch(&format!("{}/jobs", server.uri()))
            .await
            .unwrap();
        assert_eq!(body, "recovered");
    }

    #[tokio::test]
    async fn test_fetch_gives_up_after_max_attempts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/jobs"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(fast_settings(3)).unwrap();
        let url = format!("{}/jobs", server.uri());
        let err = fetcher.fetch(&url).await.unwrap_err();

        assert_eq!(err.url, url);
        assert_eq!(err.attempts, 3);
        assert!(matches!(
            err.cause,
            FetchCause::Status(status) if status == reqwest::StatusCode::INTERNAL_SERVER_ERROR
        ));
    }

    #[tokio::test]
    async fn test_fetch_treats_client_errors_as_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .expect(2)
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(fast_settings(2)).unwrap();
        let err = fetcher
            .fetch(&format!("{}/missing", server.uri()))
            .await
            .unwrap_err();
        assert_eq!(err.attempts, 2);
    }

    #[tokio::test]
    async fn test_fetch_malformed_url_is_not_retried() {
        let fetcher = Fetcher::new(fast_settings(3)).unwrap();
        let err = fetcher.fetch("not a url").await.unwrap_err();
        assert_eq!(err.attempts, 1);
        assert!(!err.cause.is_transient());
    }

    #[tokio::test]
    async fn test_fetch_retries_refused_connections() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let fetcher = Fetcher::new(fast_settings(3)).unwrap();
        let err = fetcher
            .fetch(&format!("http://127.0.0.1:{port}/jobs"))
            .await
            .unwrap_err();

        assert_eq!(err.attempts, 3);
        assert!(matches!(&err.cause, FetchCause::Network(e) if e.is_connect()));
        assert!(err.cause.is_transient());
    }

    #[tokio::test]
    async fn test_fetch_retries_timeouts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("too late")
                    .set_delay(Duration::from_millis(500)),
            )
            .expect(2)
            .mount(&server)
            .await;

        let mut settings = fast_settings(2);
        settings.timeout = Duration::from_millis(100);
        let fetcher = Fetcher::new(settings).unwrap();
        let err = fetcher
            .fetch(&format!("{}/slow", server.uri()))
            .await
            .unwrap_err();

        assert_eq!(err.attempts, 2);
        assert!(matches!(&err.cause, FetchCause::Network(e) if e.is_timeout()));
        assert!(err.cause.is_transient());
    }
}
