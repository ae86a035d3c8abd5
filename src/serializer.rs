//! Episode tables
//!
//! Episodes are cached as CSV with the header `season,episode,name,rating`.
//! Seasons and episodes stay 1-based on disk and in memory.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;

use tracing::info;

use crate::error::ScraperError;
use crate::imdb::Episode;

pub fn write_episodes<W: Write>(writer: W, episodes: &[Episode]) -> Result<(), ScraperError> {
    let mut wtr = csv::Writer::from_writer(writer);
    for episode in episodes {
        wtr.serialize(episode)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Columns are matched by header name.
pub fn read_episodes<R: Read>(reader: R) -> Result<Vec<Episode>, ScraperError> {
    let mut rdr = csv::Reader::from_reader(reader);
    let episodes = rdr.deserialize().collect::<Result<Vec<Episode>, _>>()?;
    Ok(episodes)
}

pub fn save_csv(path: &Path, episodes: &[Episode]) -> Result<(), ScraperError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    write_episodes(File::create(path)?, episodes)?;
    info!("Saved {} episodes to {:?}", episodes.len(), path);
    Ok(())
}

pub fn load_csv(path: &Path) -> Result<Vec<Episode>, ScraperError> {
    let episodes = read_episodes(File::open(path)?)?;
    info!("Loaded {} episodes from {:?}", episodes.len(), path);
    Ok(episodes)
}

/// "Breaking Bad" → "Breaking_Bad"
pub fn file_stem_for(title: &str) -> String {
    title.trim().replace(' ', "_")
}

/// "Breaking_Bad" → "Breaking Bad"
pub fn title_for(stem: &str) -> String {
    stem.replace('_', " ")
}
