use std::time::Duration;

pub const IMDB_BASE_URL: &str = "https://www.imdb.com";

#[derive(Debug, Clone)]
pub struct ScraperConfig {
    pub base_url: String,
    pub headless: bool,
    /// How long to wait for the layout-probe element on a fresh page.
    pub timeout: Duration,
    pub max_retries: u32,
    pub max_episodes: u32,
    /// Pause between a driver restart and the next attempt.
    pub retry_delay: Duration,
    pub window_size: (u32, u32),
    pub debug: bool,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            base_url: IMDB_BASE_URL.to_string(),
            headless: true,
            timeout: Duration::from_secs(10),
            max_retries: 20,
            max_episodes: 100,
            retry_delay: Duration::from_secs(1),
            window_size: (1920, 1080),
            debug: false,
        }
    }
}

impl ScraperConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
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

    pub fn with_max_episodes(mut self, max_episodes: u32) -> Self {
        self.max_episodes = max_episodes;
        self
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Joins a site-relative path onto the base URL.
    pub fn url_for(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}
