//! IMDb scraper module
//!
//! Searches titles and collects per-episode ratings, coping with the two
//! known page layouts.

pub mod locator;
mod scraper;
mod types;

pub use locator::{ElementSnapshot, Layout, Locator};
pub use self::scraper::ImdbScraper;
pub use types::{EntryKind, Episode, ImdbEntry};
