//! Browser seam used by the scraper.
//!
//! The scraper only needs to navigate, wait for an element, and read the
//! rendered HTML, so that is all the trait exposes. `ChromeDriver` backs it
//! with a Chromium instance driven over CDP.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::ClearBrowserCookiesParams;
use chromiumoxide::error::CdpError;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info};

use crate::config::ScraperConfig;
use crate::error::ScraperError;

/// Poll interval while waiting for an element to appear.
const WAIT_POLL_INTERVAL_MS: u64 = 250;

#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Start a browser session.
    async fn launch(&mut self) -> Result<(), ScraperError>;

    async fn goto(&mut self, url: &str) -> Result<(), ScraperError>;

    /// Poll until `selector` matches or `timeout` elapses.
    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<bool, ScraperError>;

    /// Current rendered HTML source.
    async fn content(&mut self) -> Result<String, ScraperError>;

    /// Drop cookies, close the browser and launch a fresh one.
    async fn restart(&mut self) -> Result<(), ScraperError>;

    async fn screenshot(&mut self) -> Result<Vec<u8>, ScraperError>;

    async fn close(&mut self) -> Result<(), ScraperError>;
}

pub struct ChromeDriver {
    config: ScraperConfig,
    browser: Option<Browser>,
    page: Option<Page>,
    handler: Option<JoinHandle<()>>,
}

impl ChromeDriver {
    pub fn new(config: ScraperConfig) -> Self {
        Self {
            config,
            browser: None,
            page: None,
            handler: None,
        }
    }

    fn get_page(&self) -> Result<&Page, ScraperError> {
        self.page
            .as_ref()
            .ok_or_else(|| ScraperError::BrowserInit("browser not initialized".into()))
    }

    fn browser_config(&self) -> Result<BrowserConfig, ScraperError> {
        let (width, height) = self.config.window_size;
        let mut builder = BrowserConfig::builder()
            .window_size(width, height)
            .request_timeout(Duration::from_secs(60));

        if let Ok(chrome_path) =
            std::env::var("CHROME_PATH").or_else(|_| std::env::var("CHROMIUM_PATH"))
        {
            builder = builder.chrome_executable(chrome_path);
        }

        if !self.config.headless {
            builder = builder.with_head();
        }

        builder = builder
            .no_sandbox()
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu");

        if self.config.debug {
            builder = builder.arg("--enable-logging=stderr").arg("--v=1");
        }

        builder.build().map_err(ScraperError::BrowserInit)
    }

    async fn shutdown(&mut self) {
        self.page = None;
        if let Some(mut browser) = self.browser.take() {
            if let Err(e) = browser.close().await {
                debug!("Failed to close browser: {}", e);
            }
            if let Err(e) = browser.wait().await {
                debug!("Failed to wait for browser exit: {}", e);
            }
        }
        if let Some(handler) = self.handler.take() {
            handler.abort();
        }
    }
}

#[async_trait]
impl PageDriver for ChromeDriver {
    async fn launch(&mut self) -> Result<(), ScraperError> {
        info!("Launching browser...");
        let config = self.browser_config()?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| ScraperError::BrowserInit(e.to_string()))?;

        self.handler = Some(tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                debug!("Browser event: {:?}", event);
            }
        }));

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| ScraperError::BrowserInit(e.to_string()))?;

        self.browser = Some(browser);
        self.page = Some(page);
        info!("Browser launched");
        Ok(())
    }

    async fn goto(&mut self, url: &str) -> Result<(), ScraperError> {
        let page = self.get_page()?;
        page.goto(url).await.map_err(|e| match e {
            CdpError::Timeout => ScraperError::Timeout(format!("loading {}", url)),
            other => ScraperError::Navigation(format!("{}: {}", url, other)),
        })?;
        Ok(())
    }

    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<bool, ScraperError> {
        let page = self.get_page()?;
        let start = Instant::now();

        loop {
            if page.find_element(selector).await.is_ok() {
                debug!("'{}' present after {:?}", selector, start.elapsed());
                return Ok(true);
            }
            if start.elapsed() >= timeout {
                debug!("'{}' not present after {:?}", selector, timeout);
                return Ok(false);
            }
            sleep(Duration::from_millis(WAIT_POLL_INTERVAL_MS)).await;
        }
    }

    async fn content(&mut self) -> Result<String, ScraperError> {
        self.get_page()?
            .content()
            .await
            .map_err(|e| ScraperError::Extraction(format!("page source: {}", e)))
    }

    async fn restart(&mut self) -> Result<(), ScraperError> {
        info!("Restarting browser...");
        if let Ok(page) = self.get_page() {
            if let Err(e) = page.execute(ClearBrowserCookiesParams::default()).await {
                debug!("Failed to clear cookies: {}", e);
            }
        }
        self.shutdown().await;
        self.launch().await
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>, ScraperError> {
        self.get_page()?
            .screenshot(ScreenshotParams::builder().full_page(true).build())
            .await
            .map_err(|e| ScraperError::Extraction(format!("screenshot: {}", e)))
    }

    async fn close(&mut self) -> Result<(), ScraperError> {
        info!("Closing browser...");
        self.shutdown().await;
        Ok(())
    }
}
