//! Series rating heatmaps
//!
//! - Scrape per-episode ratings of a TV series from IMDb
//! - Cache them as CSV tables
//! - Render a season/episode rating heatmap
//!
//! # Scraping
//!
//! ```rust,ignore
//! use series_heatmap::{ScrapeRequest, SeriesService};
//! use tower::Service;
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut service = SeriesService::new();
//!     let result = service.call(ScrapeRequest::new("Breaking Bad")).await.unwrap();
//!     series_heatmap::serializer::save_csv("data/Breaking_Bad.csv".as_ref(), &result.episodes).unwrap();
//! }
//! ```
//!
//! # Plotting
//!
//! ```rust,ignore
//! use series_heatmap::heatmap::{render_png, HeatmapStyle, RatingsGrid};
//!
//! let episodes = series_heatmap::serializer::load_csv("data/Breaking_Bad.csv".as_ref()).unwrap();
//! let grid = RatingsGrid::from_episodes(&episodes);
//! render_png("Breaking_Bad", &grid, "img/Breaking_Bad.png".as_ref(), &HeatmapStyle::dark()).unwrap();
//! ```

pub mod config;
pub mod driver;
pub mod error;
pub mod heatmap;
pub mod imdb;
pub mod serializer;
pub mod service;
pub mod traits;

pub use config::ScraperConfig;
pub use driver::{ChromeDriver, PageDriver};
pub use error::ScraperError;
pub use imdb::{EntryKind, Episode, ImdbEntry, ImdbScraper};
pub use service::{ScrapeRequest, ScrapeResult, SeriesService};
pub use traits::Scraper;
