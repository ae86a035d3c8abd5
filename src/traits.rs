use async_trait::async_trait;
use tracing::warn;

use crate::error::ScraperError;
use crate::imdb::{EntryKind, Episode, ImdbEntry};

#[async_trait]
pub trait Scraper: Send + Sync {
    /// Start the browser
    async fn initialize(&mut self) -> Result<(), ScraperError>;

    /// Title search, capped at `max_results`
    async fn search(
        &mut self,
        text: &str,
        kind: Option<EntryKind>,
        max_results: usize,
    ) -> Result<Vec<ImdbEntry>, ScraperError>;

    /// Every rated episode of every season
    async fn get_all_episodes(&mut self, series_id: &str) -> Result<Vec<Episode>, ScraperError>;

    /// Release the browser
    async fn close(&mut self) -> Result<(), ScraperError>;

    /// initialize → search → get_all_episodes of the top hit → close.
    ///
    /// The top hit must be a series. The browser is closed on failure too;
    /// a failing close is logged and does not mask the scrape outcome.
    async fn execute(
        &mut self,
        query: &str,
        kind: Option<EntryKind>,
    ) -> Result<(ImdbEntry, Vec<Episode>), ScraperError> {
        self.initialize().await?;
        let outcome = scrape_top_series(self, query, kind).await;
        if let Err(e) = self.close().await {
            warn!("Failed to close browser: {}", e);
        }
        outcome
    }
}

async fn scrape_top_series<S: Scraper + ?Sized>(
    scraper: &mut S,
    query: &str,
    kind: Option<EntryKind>,
) -> Result<(ImdbEntry, Vec<Episode>), ScraperError> {
    let entry = scraper
        .search(query, kind, 5)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| ScraperError::NoResults(query.to_string()))?;

    if entry.kind != EntryKind::Series {
        return Err(ScraperError::NotASeries {
            title: entry.title,
            kind: entry.kind.to_string(),
        });
    }

    let episodes = scraper.get_all_episodes(&entry.id).await?;
    Ok((entry, episodes))
}
