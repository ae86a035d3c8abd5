use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tower::Service;
use tracing::info;

use crate::config::ScraperConfig;
use crate::driver::ChromeDriver;
use crate::error::ScraperError;
use crate::imdb::{EntryKind, Episode, ImdbEntry, ImdbScraper};
use crate::traits::Scraper;

/// Scrape request for one series query
#[derive(Debug, Clone)]
pub struct ScrapeRequest {
    pub query: String,
    /// Restrict the search to one title kind
    pub kind: Option<EntryKind>,
    pub headless: bool,
    pub timeout: Duration,
    pub max_retries: u32,
}

impl ScrapeRequest {
    pub fn new(query: impl Into<String>) -> Self {
        let defaults = ScraperConfig::default();
        Self {
            query: query.into(),
            kind: None,
            headless: defaults.headless,
            timeout: defaults.timeout,
            max_retries: defaults.max_retries,
        }
    }

    pub fn with_kind(mut self, kind: EntryKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

impl From<ScrapeRequest> for ScraperConfig {
    fn from(req: ScrapeRequest) -> Self {
        ScraperConfig::default()
            .with_headless(req.headless)
            .with_timeout(req.timeout)
            .with_max_retries(req.max_retries)
    }
}

/// Scrape result
#[derive(Debug, Clone, Serialize)]
pub struct ScrapeResult {
    pub entry: ImdbEntry,
    pub episodes: Vec<Episode>,
    pub scraped_at: DateTime<Utc>,
}

/// tower::Service wrapper that scrapes a series with a fresh browser per call
#[derive(Debug, Clone, Default)]
pub struct SeriesService {}

impl SeriesService {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Service<ScrapeRequest> for SeriesService {
    type Response = ScrapeResult;
    type Error = ScraperError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: ScrapeRequest) -> Self::Future {
        info!(
            "Scrape request received: query={}, kind={:?}",
            req.query, req.kind
        );

        Box::pin(async move {
            let query = req.query.clone();
            let kind = req.kind;
            let config: ScraperConfig = req.into();
            let mut scraper = ImdbScraper::new(config.clone(), ChromeDriver::new(config));

            let (entry, episodes) = scraper.execute(&query, kind).await?;

            info!(
                "Scrape finished: title={}, id={}, episodes={}",
                entry.title,
                entry.id,
                episodes.len()
            );

            Ok(ScrapeResult {
                entry,
                episodes,
                scraped_at: Utc::now(),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scrape_request_builder() {
        let req = ScrapeRequest::new("Breaking Bad")
            .with_kind(EntryKind::Series)
            .with_headless(false)
            .with_timeout(Duration::from_secs(30))
            .with_max_retries(5);

        assert_eq!(req.query, "Breaking Bad");
        assert_eq!(req.kind, Some(EntryKind::Series));
        assert!(!req.headless);
        assert_eq!(req.timeout, Duration::from_secs(30));
        assert_eq!(req.max_retries, 5);
    }

    #[test]
    fn test_scrape_request_to_config() {
        let req = ScrapeRequest::new("Dark").with_max_retries(2);
        let config: ScraperConfig = req.into();

        assert!(config.headless);
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.base_url, "https://www.imdb.com");
    }

    #[test]
    fn test_scrape_request_defaults_to_any_kind() {
        assert_eq!(ScrapeRequest::new("Dark").kind, None);
    }

    #[test]
    fn test_scrape_result_serializes_to_json() {
        let result = ScrapeResult {
            entry: ImdbEntry {
                id: "tt5753856".into(),
                title: "Dark".into(),
                year: 2017,
                kind: EntryKind::Series,
            },
            episodes: vec![Episode {
                season: 1,
                episode: 1,
                name: "Secrets".into(),
                rating: 8.5,
            }],
            scraped_at: "2024-03-01T12:00:00Z".parse().unwrap(),
        };

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["entry"]["kind"], "tv");
        assert_eq!(json["episodes"][0]["name"], "Secrets");
        assert_eq!(json["scraped_at"], "2024-03-01T12:00:00Z");
    }

    #[tokio::test]
    #[ignore] // live scrape: cargo test test_series_service_live -- --ignored --nocapture
    async fn test_series_service_live() {
        let mut service = SeriesService::new();
        let result = service
            .call(ScrapeRequest::new("Dark"))
            .await
            .expect("scrape failed");

        assert_eq!(result.entry.kind, EntryKind::Series);
        assert!(!result.episodes.is_empty());
    }
}
