//! IMDb record types

use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of a search result, also used as a search filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryKind {
    #[serde(rename = "tv")]
    Series,
    #[serde(rename = "ft")]
    Film,
    #[serde(rename = "na")]
    Unknown,
}

impl EntryKind {
    /// Short code used in search queries and output.
    pub fn code(self) -> &'static str {
        match self {
            EntryKind::Series => "tv",
            EntryKind::Film => "ft",
            EntryKind::Unknown => "na",
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// One search result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImdbEntry {
    /// Title id, e.g. `tt0903747`
    pub id: String,
    pub title: String,
    /// 0 when unknown
    pub year: u32,
    pub kind: EntryKind,
}

/// One rated episode. Seasons and episodes are 1-based.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    pub season: u32,
    pub episode: u32,
    pub name: String,
    pub rating: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_kind_codes() {
        assert_eq!(EntryKind::Series.to_string(), "tv");
        assert_eq!(EntryKind::Film.code(), "ft");
        assert_eq!(
            serde_json::to_string(&EntryKind::Unknown).unwrap(),
            "\"na\""
        );
    }

    #[test]
    fn test_entry_json_shape() {
        let entry = ImdbEntry {
            id: "tt5753856".into(),
            title: "Dark".into(),
            year: 2017,
            kind: EntryKind::Series,
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["id"], "tt5753856");
        assert_eq!(json["kind"], "tv");
        assert_eq!(json["year"], 2017);
    }
}
