//! IMDb scraper implementation
//!
//! Every lookup reads the rendered page source and queries it with a
//! `Locator`. The first lookup after a navigation probes which of the two
//! layouts is being served; later lookups on the same page try that
//! layout's selector first and fall back to the other one.

use async_trait::async_trait;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::ScraperConfig;
use crate::driver::PageDriver;
use crate::error::ScraperError;
use crate::traits::Scraper;

use super::locator::{find_in_html, ElementSnapshot, Layout, Locator};
use super::types::{EntryKind, Episode, ImdbEntry};

const CURRENT_RESULTS: &str = "#__next > main > div:nth-of-type(2) > div:nth-of-type(3) > section > div > div:nth-of-type(1) > section:nth-of-type(2) > div:nth-of-type(2) > ul";
const LEGACY_RESULTS: &str = "#main > div > div:nth-of-type(2) > table > tbody";
const SEASON_DROPDOWN: &str = "#bySeason";
const EPISODE_LIST: &str = "#episodes_content > div:nth-of-type(2) > div:nth-of-type(2)";

fn result_list_locator() -> Locator {
    Locator::new(CURRENT_RESULTS).with_legacy(LEGACY_RESULTS)
}

fn entry_link_locator(index: usize) -> Locator {
    Locator::new(format!(
        "{CURRENT_RESULTS} > li:nth-of-type({index}) > div:nth-of-type(2) > div:nth-of-type(1) > a"
    ))
    .with_legacy(format!(
        "{LEGACY_RESULTS} > tr:nth-of-type({index}) > td:nth-of-type(2) > a"
    ))
}

fn entry_year_locator(index: usize) -> Locator {
    Locator::new(format!(
        "{CURRENT_RESULTS} > li:nth-of-type({index}) > div:nth-of-type(2) > div:nth-of-type(1) > ul:nth-of-type(1) > li:nth-of-type(1) > label"
    ))
    .with_legacy(format!(
        "{LEGACY_RESULTS} > tr:nth-of-type({index}) > td:nth-of-type(2)"
    ))
}

fn season_dropdown_locator() -> Locator {
    Locator::new(SEASON_DROPDOWN)
}

fn episode_rating_locator(episode: u32) -> Locator {
    Locator::new(format!(
        "{EPISODE_LIST} > div:nth-of-type({episode}) > div:nth-of-type(2) > div:nth-of-type(2) > div:nth-of-type(1) > span:nth-of-type(2)"
    ))
}

fn episode_name_locator(episode: u32) -> Locator {
    Locator::new(format!(
        "{EPISODE_LIST} > div:nth-of-type({episode}) > div:nth-of-type(2) > strong > a"
    ))
}

fn search_path(text: &str, kind: Option<EntryKind>) -> String {
    let type_query = kind
        .map(|k| format!("&s=tt&type={}", k.code()))
        .unwrap_or_default();
    format!("/find?q={}{}", urlencoding::encode(text.trim()), type_query)
}

fn episodes_path(series_id: &str, season: u32) -> String {
    format!("/title/{}/episodes?season={}", series_id, season)
}

/// `/title/tt0903747/?ref_=fn_al_tt_1` → `tt0903747`
fn title_id_from_href(href: &str) -> Option<String> {
    href.split('/')
        .nth(2)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

fn strip_whitespace(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

fn up_to_paren(part: &str) -> &str {
    part.split(')').next().unwrap_or_default()
}

/// Current layout: the year label reads `2008–2013`, `2017– ` or `2010`.
/// A range means a series.
fn classify_current(label: &str) -> (u32, EntryKind) {
    let compact = strip_whitespace(label);
    if compact.is_empty() {
        return (0, EntryKind::Unknown);
    }
    let parts: Vec<&str> = compact.split('–').collect();
    let year = parts[0].parse().unwrap_or(0);
    let kind = if parts.len() == 1 {
        EntryKind::Film
    } else {
        EntryKind::Series
    };
    (year, kind)
}

/// Legacy layout: the result cell's own text reads ` (2008) (TV Series) `
/// for series and ` (2010) ` for films.
fn classify_legacy(info: &str) -> (u32, EntryKind) {
    let compact = strip_whitespace(info);
    let parts: Vec<&str> = compact.split('(').collect();
    if parts.len() == 1 {
        return (0, EntryKind::Unknown);
    }
    let year = up_to_paren(parts[1]).parse().unwrap_or(0);
    let kind = match parts.get(2) {
        None => EntryKind::Film,
        Some(part) if up_to_paren(part) == "TVSeries" => EntryKind::Series,
        Some(_) => EntryKind::Film,
    };
    (year, kind)
}

/// Seasons are the dropdown positions whose value is their 1-based index;
/// entries like "Unknown" do not count.
fn count_seasons(option_values: &[String]) -> u32 {
    option_values
        .iter()
        .enumerate()
        .filter(|(i, value)| value.trim() == (i + 1).to_string())
        .count() as u32
}

fn parse_rating(text: &str) -> Option<f64> {
    text.trim()
        .replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|r| r.is_finite())
}

pub struct ImdbScraper<D: PageDriver> {
    config: ScraperConfig,
    driver: D,
    layout: Option<Layout>,
}

impl<D: PageDriver> ImdbScraper<D> {
    pub fn new(config: ScraperConfig, driver: D) -> Self {
        Self {
            config,
            driver,
            layout: None,
        }
    }

    /// Layout detected on the current page, if any lookup ran yet.
    pub fn layout(&self) -> Option<Layout> {
        self.layout
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    async fn load_url(&mut self, path: &str) -> Result<(), ScraperError> {
        self.layout = None;
        let url = self.config.url_for(path);
        info!("Fetching from {}", url);
        self.driver.goto(&url).await
    }

    /// Locate an element on the loaded page.
    ///
    /// The first call after `load_url` waits up to `timeout` for the
    /// current-layout selector to decide the layout. The layout whose
    /// selector matches becomes the detected layout.
    async fn load_element(
        &mut self,
        locator: &Locator,
    ) -> Result<Option<ElementSnapshot>, ScraperError> {
        let layout = match self.layout {
            Some(layout) => layout,
            None => {
                let detected = if self
                    .driver
                    .wait_for(&locator.current, self.config.timeout)
                    .await?
                {
                    Layout::Current
                } else {
                    locator.fallback_layout()
                };
                info!("Loaded {:?} layout", detected);
                self.layout = Some(detected);
                detected
            }
        };

        let html = self.driver.content().await?;
        match find_in_html(&html, locator, layout) {
            Some((matched, element)) => {
                self.layout = Some(matched);
                Ok(Some(element))
            }
            None => Ok(None),
        }
    }

    /// Load `path` and locate `locator`, restarting the browser between
    /// failed attempts.
    async fn find_element_initial(
        &mut self,
        path: &str,
        locator: &Locator,
    ) -> Result<ElementSnapshot, ScraperError> {
        let max_retries = self.config.max_retries;

        for attempt in 1..=max_retries {
            info!("find_element attempt ({}/{})", attempt, max_retries);

            let found = match self.load_url(path).await {
                Ok(()) => self.load_element(locator).await,
                Err(e) => Err(e),
            };

            match found {
                Ok(Some(element)) => return Ok(element),
                Ok(None) => debug!("No match for {}", locator),
                Err(e) if e.is_retryable() => warn!("Attempt {} failed: {}", attempt, e),
                Err(e) => return Err(e),
            }

            if attempt < max_retries {
                self.driver.restart().await?;
                sleep(self.config.retry_delay).await;
            }
        }

        warn!("Failed to find element: {}", locator);
        self.log_debug_screenshot().await;
        Err(ScraperError::ElementNotFound {
            locator: locator.to_string(),
            attempts: max_retries,
        })
    }

    async fn log_debug_screenshot(&mut self) {
        if !self.config.debug {
            return;
        }
        match self.driver.screenshot().await {
            Ok(png) => {
                use base64::Engine;
                let encoded = base64::engine::general_purpose::STANDARD.encode(&png);
                debug!("Screenshot: data:image/png;base64,{}", encoded);
            }
            Err(e) => debug!("Failed to take screenshot: {}", e),
        }
    }

    pub async fn search(
        &mut self,
        text: &str,
        kind: Option<EntryKind>,
        max_results: usize,
    ) -> Result<Vec<ImdbEntry>, ScraperError> {
        let list = self
            .find_element_initial(&search_path(text, kind), &result_list_locator())
            .await?;

        let count = list.child_count.min(max_results);
        debug!("{} results listed, reading {}", list.child_count, count);

        let mut results = Vec::with_capacity(count);
        for index in 1..=count {
            let link = self
                .load_element(&entry_link_locator(index))
                .await?
                .ok_or_else(|| {
                    ScraperError::Extraction(format!("result {} has no title link", index))
                })?;

            let title = link.text.trim().to_string();
            let id = link
                .attr("href")
                .and_then(title_id_from_href)
                .ok_or_else(|| {
                    ScraperError::Extraction(format!("result {} has no title id", index))
                })?;

            let year_element = self.load_element(&entry_year_locator(index)).await?;
            let (year, entry_kind) = match (year_element, self.layout) {
                (None, _) => (0, EntryKind::Unknown),
                (Some(el), Some(Layout::Legacy)) => classify_legacy(&el.own_text),
                (Some(el), _) => classify_current(&el.text),
            };

            if let Some(wanted) = kind {
                if wanted != entry_kind {
                    warn!(
                        "Found an entry of type {} but search query was for type {}",
                        entry_kind, wanted
                    );
                }
            }

            results.push(ImdbEntry {
                id,
                title,
                year,
                kind: entry_kind,
            });
        }

        Ok(results)
    }

    pub async fn get_all_episodes(&mut self, series_id: &str) -> Result<Vec<Episode>, ScraperError> {
        let dropdown = self
            .find_element_initial(&episodes_path(series_id, 1), &season_dropdown_locator())
            .await?;

        let num_seasons = count_seasons(&dropdown.option_values);
        info!("Found {} seasons", num_seasons);

        let mut episodes = Vec::new();
        for season in 1..=num_seasons {
            episodes.extend(self.get_episodes(series_id, season).await?);
        }
        Ok(episodes)
    }

    /// Rated episodes of one season. A season whose first rating never
    /// shows up is returned empty.
    pub async fn get_episodes(
        &mut self,
        series_id: &str,
        season: u32,
    ) -> Result<Vec<Episode>, ScraperError> {
        let path = episodes_path(series_id, season);
        match self.find_element_initial(&path, &episode_rating_locator(1)).await {
            Ok(_) => {}
            Err(e @ ScraperError::ElementNotFound { .. }) => {
                warn!("Season {} has no rated episodes: {}", season, e);
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        }

        let mut episodes = Vec::new();
        for episode in 1..=self.config.max_episodes {
            let Some(rating_element) = self.load_element(&episode_rating_locator(episode)).await?
            else {
                break;
            };

            let Some(rating) = parse_rating(&rating_element.text) else {
                warn!(
                    "S{} E{}: unreadable rating '{}', skipping",
                    season,
                    episode,
                    rating_element.text.trim()
                );
                continue;
            };

            let name = self
                .load_element(&episode_name_locator(episode))
                .await?
                .map(|el| el.text.trim().to_string())
                .unwrap_or_default();

            info!("S{} E{} rating={:.1} name=\"{}\"", season, episode, rating, name);
            episodes.push(Episode {
                season,
                episode,
                name,
                rating,
            });
        }

        info!("Found {} episodes in season {}", episodes.len(), season);
        Ok(episodes)
    }
}

#[async_trait]
impl<D: PageDriver> Scraper for ImdbScraper<D> {
    async fn initialize(&mut self) -> Result<(), ScraperError> {
        self.driver.launch().await
    }

    async fn search(
        &mut self,
        text: &str,
        kind: Option<EntryKind>,
        max_results: usize,
    ) -> Result<Vec<ImdbEntry>, ScraperError> {
        ImdbScraper::search(self, text, kind, max_results).await
    }

    async fn get_all_episodes(&mut self, series_id: &str) -> Result<Vec<Episode>, ScraperError> {
        ImdbScraper::get_all_episodes(self, series_id).await
    }

    async fn close(&mut self) -> Result<(), ScraperError> {
        self.layout = None;
        self.driver.close().await
    }
}
