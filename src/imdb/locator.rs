//! Layout-aware element location against a rendered page source.

use std::collections::HashMap;
use std::fmt;

use scraper::{ElementRef, Html, Selector};
use tracing::warn;

/// The two known markup variants of the site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    Current,
    Legacy,
}

/// CSS selector per layout. Without a legacy alternative the locator is
/// layout-independent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    pub current: String,
    pub legacy: Option<String>,
}

impl Locator {
    pub fn new(current: impl Into<String>) -> Self {
        Self {
            current: current.into(),
            legacy: None,
        }
    }

    pub fn with_legacy(mut self, legacy: impl Into<String>) -> Self {
        self.legacy = Some(legacy.into());
        self
    }

    /// Layout to assume when the current-layout probe did not show up.
    pub fn fallback_layout(&self) -> Layout {
        if self.legacy.is_some() {
            Layout::Legacy
        } else {
            Layout::Current
        }
    }

    /// Selectors to try, the one for `layout` first.
    pub fn prioritized(&self, layout: Layout) -> Vec<(Layout, &str)> {
        let current = (Layout::Current, self.current.as_str());
        match (&self.legacy, layout) {
            (Some(legacy), Layout::Legacy) => vec![(Layout::Legacy, legacy.as_str()), current],
            (Some(legacy), Layout::Current) => vec![current, (Layout::Legacy, legacy.as_str())],
            (None, _) => vec![current],
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.legacy {
            Some(legacy) => write!(f, "{} | {}", self.current, legacy),
            None => f.write_str(&self.current),
        }
    }
}

/// Owned copy of a matched element.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ElementSnapshot {
    pub tag: String,
    /// Concatenated direct text children only.
    pub own_text: String,
    /// All descendant text.
    pub text: String,
    pub attrs: HashMap<String, String>,
    /// Number of element children.
    pub child_count: usize,
    /// `value` attributes of descendant `<option>` elements, in order.
    pub option_values: Vec<String>,
}

impl ElementSnapshot {
    fn capture(element: ElementRef<'_>) -> Self {
        let own_text = element
            .children()
            .filter_map(|node| node.value().as_text().map(|t| &**t))
            .collect::<String>();

        let child_count = element
            .children()
            .filter(|node| node.value().is_element())
            .count();

        let option_values = match Selector::parse("option") {
            Ok(sel) => element
                .select(&sel)
                .filter_map(|o| o.value().attr("value").map(str::to_string))
                .collect(),
            Err(_) => Vec::new(),
        };

        Self {
            tag: element.value().name().to_string(),
            own_text,
            text: element.text().collect(),
            attrs: element
                .value()
                .attrs()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            child_count,
            option_values,
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }
}

/// Try the locator's selectors in priority order against `html` and return
/// the first match with the layout whose selector matched.
pub fn find_in_html(
    html: &str,
    locator: &Locator,
    layout: Layout,
) -> Option<(Layout, ElementSnapshot)> {
    let document = Html::parse_document(html);

    for (candidate, css) in locator.prioritized(layout) {
        let selector = match Selector::parse(css) {
            Ok(sel) => sel,
            Err(e) => {
                warn!("Invalid selector '{}': {:?}", css, e);
                continue;
            }
        };
        if let Some(element) = document.select(&selector).next() {
            return Some((candidate, ElementSnapshot::capture(element)));
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn locator() -> Locator {
        Locator::new("ul.results").with_legacy("table.findList tbody")
    }

    #[test]
    fn test_prioritized_puts_detected_layout_first() {
        let loc = locator();
        assert_eq!(
            loc.prioritized(Layout::Legacy),
            vec![
                (Layout::Legacy, "table.findList tbody"),
                (Layout::Current, "ul.results")
            ]
        );
        assert_eq!(loc.prioritized(Layout::Current)[0], (Layout::Current, "ul.results"));

        let single = Locator::new("#bySeason");
        assert_eq!(single.prioritized(Layout::Legacy), vec![(Layout::Current, "#bySeason")]);
    }

    #[test]
    fn test_fallback_layout() {
        assert_eq!(locator().fallback_layout(), Layout::Legacy);
        assert_eq!(Locator::new("#bySeason").fallback_layout(), Layout::Current);
    }

    #[test]
    fn test_find_switches_layout_when_preferred_misses() {
        let html = r#"<html><body><table class="findList"><tr><td>a</td></tr><tr><td>b</td></tr></table></body></html>"#;
        let (layout, snap) = find_in_html(html, &locator(), Layout::Current).unwrap();
        assert_eq!(layout, Layout::Legacy);
        assert_eq!(snap.tag, "tbody");
        assert_eq!(snap.child_count, 2);
    }

    #[test]
    fn test_find_returns_none_without_match() {
        assert!(find_in_html("<html><body></body></html>", &locator(), Layout::Legacy).is_none());
    }

    #[test]
    fn test_snapshot_captures_text_attrs_and_options() {
        let html = r#"<html><body>
            <table><tr><td id="cell"><a href="/title/tt0903747/?ref_=fn">Breaking Bad</a> (2008) (TV Series) </td></tr></table>
            <select id="bySeason"><option value="1">1</option><option value="2">2</option></select>
        </body></html>"#;

        let (_, link) = find_in_html(html, &Locator::new("#cell > a"), Layout::Current).unwrap();
        assert_eq!(link.text, "Breaking Bad");
        assert_eq!(link.attr("href"), Some("/title/tt0903747/?ref_=fn"));

        let (_, cell) = find_in_html(html, &Locator::new("#cell"), Layout::Current).unwrap();
        assert_eq!(cell.own_text, " (2008) (TV Series) ");
        assert_eq!(cell.child_count, 1);

        let (_, select) = find_in_html(html, &Locator::new("#bySeason"), Layout::Current).unwrap();
        assert_eq!(select.option_values, vec!["1", "2"]);
    }
}
