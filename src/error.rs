use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("browser initialization error: {0}")]
    BrowserInit(String),

    #[error("navigation error: {0}")]
    Navigation(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("element not found after {attempts} attempts: {locator}")]
    ElementNotFound { locator: String, attempts: u32 },

    #[error("extraction error: {0}")]
    Extraction(String),

    #[error("no search results for '{0}'")]
    NoResults(String),

    #[error("'{title}' is not a series (kind: {kind})")]
    NotASeries { title: String, kind: String },

    #[error("plot error: {0}")]
    Plot(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("file I/O error: {0}")]
    FileIO(#[from] std::io::Error),
}

impl ScraperError {
    /// Whether a fresh browser and another attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ScraperError::Navigation(_) | ScraperError::Timeout(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(ScraperError::Navigation("reset".into()).is_retryable());
        assert!(ScraperError::Timeout("slow".into()).is_retryable());
        assert!(!ScraperError::Extraction("bad".into()).is_retryable());
        assert!(!ScraperError::ElementNotFound {
            locator: "#bySeason".into(),
            attempts: 3
        }
        .is_retryable());
    }

    #[test]
    fn test_display_messages() {
        let err = ScraperError::NotASeries {
            title: "Inception".into(),
            kind: "ft".into(),
        };
        assert_eq!(err.to_string(), "'Inception' is not a series (kind: ft)");
    }
}
