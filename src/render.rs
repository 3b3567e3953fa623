use async_trait::async_trait;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue, USER_AGENT};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use thirtyfour::{ChromiumLikeCapabilities, DesiredCapabilities, WebDriver};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::{CrawlerConfig, DelayWindow, HeaderProfile};
use crate::error::{CrawlError, Result};

/// Produces the final HTML of a page after scripts have run.
///
/// One renderer is acquired per crawl run and shared by every fetch in it;
/// `close` must be called exactly once when the run is over.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, url: &str, timeout: Duration) -> Result<String>;

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RendererKind {
    WebDriver,
    Http,
}

/// Acquires the renderer for one run. Failure here is the only error that
/// aborts a crawl.
pub async fn acquire(kind: RendererKind, config: &CrawlerConfig) -> Result<Box<dyn Renderer>> {
    match kind {
        RendererKind::WebDriver => {
            let renderer =
                WebDriverRenderer::connect(&config.webdriver_url, &config.headers, config.settle_delay)
                    .await?;
            Ok(Box::new(renderer))
        }
        RendererKind::Http => Ok(Box::new(HttpRenderer::new(&config.headers)?)),
    }
}

// --- WebDriver (headless Chrome) ---

pub struct WebDriverRenderer {
    driver: Mutex<Option<WebDriver>>,
    settle: DelayWindow,
}

impl WebDriverRenderer {
    pub async fn connect(server_url: &str, headers: &HeaderProfile, settle: DelayWindow) -> Result<Self> {
        let unavailable = |e: thirtyfour::error::WebDriverError| CrawlError::RendererUnavailable(e.to_string());

        let mut caps = DesiredCapabilities::chrome();
        caps.add_arg("--headless=new").map_err(unavailable)?;
        caps.add_arg("--no-sandbox").map_err(unavailable)?;
        caps.add_arg("--disable-dev-shm-usage").map_err(unavailable)?;
        caps.add_arg("--disable-gpu").map_err(unavailable)?;
        caps.add_arg("--disable-blink-features=AutomationControlled")
            .map_err(unavailable)?;
        caps.add_arg("--window-size=1366,768").map_err(unavailable)?;
        caps.add_arg(&format!("--user-agent={}", headers.user_agent))
            .map_err(unavailable)?;
        caps.add_arg(&format!("--lang={}", headers.language()))
            .map_err(unavailable)?;

        info!(server_url, "Starting WebDriver session");
        let driver = WebDriver::new(server_url, caps).await.map_err(unavailable)?;

        Ok(Self {
            driver: Mutex::new(Some(driver)),
            settle,
        })
    }
}

#[async_trait]
impl Renderer for WebDriverRenderer {
    async fn render(&self, url: &str, timeout: Duration) -> Result<String> {
        let guard = self.driver.lock().await;
        let driver = guard
            .as_ref()
            .ok_or_else(|| CrawlError::RendererUnavailable("session already closed".to_string()))?;

        driver
            .set_page_load_timeout(timeout)
            .await
            .map_err(|e| CrawlError::fetch(url, e))?;

        match tokio::time::timeout(timeout, driver.goto(url)).await {
            Err(_) => return Err(CrawlError::Timeout { url: url.to_string() }),
            Ok(Err(e)) => return Err(CrawlError::fetch(url, e)),
            Ok(Ok(())) => {}
        }

        // give client-side rendering a moment to fill the page
        self.settle.sleep().await;

        driver.source().await.map_err(|e| CrawlError::fetch(url, e))
    }

    async fn close(&self) -> Result<()> {
        if let Some(driver) = self.driver.lock().await.take() {
            debug!("Closing WebDriver session");
            driver
                .quit()
                .await
                .map_err(|e| CrawlError::RendererUnavailable(e.to_string()))?;
        }
        Ok(())
    }
}

// --- Plain HTTP (no script execution) ---

pub struct HttpRenderer {
    client: reqwest::Client,
}

impl HttpRenderer {
    pub fn new(headers: &HeaderProfile) -> Result<Self> {
        let invalid = |e: reqwest::header::InvalidHeaderValue| CrawlError::RendererUnavailable(e.to_string());

        let mut defaults = HeaderMap::new();
        defaults.insert(USER_AGENT, HeaderValue::from_str(&headers.user_agent).map_err(invalid)?);
        defaults.insert(ACCEPT, HeaderValue::from_str(&headers.accept).map_err(invalid)?);
        defaults.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_str(&headers.accept_language).map_err(invalid)?,
        );

        let client = reqwest::Client::builder()
            .default_headers(defaults)
            .build()
            .map_err(|e| CrawlError::RendererUnavailable(e.to_string()))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Renderer for HttpRenderer {
    async fn render(&self, url: &str, timeout: Duration) -> Result<String> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CrawlError::Timeout { url: url.to_string() }
                } else {
                    CrawlError::fetch(url, e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(CrawlError::fetch(url, format!("HTTP {}", status)));
        }

        response.text().await.map_err(|e| CrawlError::fetch(url, e))
    }
}

// --- Offline fixtures ---

/// Serves pages from memory. Listing pages are keyed `listing-<start>`,
/// detail pages by their job id.
#[derive(Default)]
pub struct FixtureRenderer {
    pages: HashMap<String, String>,
    renders: AtomicUsize,
    closed: Arc<AtomicBool>,
}

const BUNDLED_FIXTURES: &[(&str, &str)] = &[
    ("listing-0", include_str!("../fixtures/listing-0.html")),
    ("mock001", include_str!("../fixtures/mock001.html")),
    ("mock002", include_str!("../fixtures/mock002.html")),
];

impl FixtureRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// The two sample postings shipped with the binary.
    pub fn bundled() -> Self {
        BUNDLED_FIXTURES
            .iter()
            .fold(Self::new(), |renderer, (key, html)| renderer.with_page(key, html))
    }

    /// Loads every `*.html` file in `dir`, keyed by file stem.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let unreadable = |e: std::io::Error| {
            CrawlError::RendererUnavailable(format!("cannot read fixtures in {}: {}", dir.display(), e))
        };

        let mut renderer = Self::new();
        for entry in fs::read_dir(dir).map_err(unreadable)? {
            let path = entry.map_err(unreadable)?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("html") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                let html = fs::read_to_string(&path).map_err(unreadable)?;
                renderer.pages.insert(stem.to_string(), html);
            }
        }
        info!(pages = renderer.pages.len(), dir = %dir.display(), "Loaded fixtures");
        Ok(renderer)
    }

    pub fn with_page(mut self, key: &str, html: &str) -> Self {
        self.pages.insert(key.to_string(), html.to_string());
        self
    }

    #[cfg(test)]
    pub fn render_count(&self) -> usize {
        self.renders.load(Ordering::SeqCst)
    }

    /// Flag flipped by `close`, shareable after the renderer is boxed.
    #[cfg(test)]
    pub fn closed_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.closed)
    }
}

/// `listing-<start>` for search pages, the `jk` value for detail pages.
pub fn fixture_key(url: &str) -> Option<String> {
    let query = url.split_once('?')?.1;
    let param = |name: &str| {
        query
            .split('&')
            .find_map(|pair| pair.strip_prefix(name).and_then(|v| v.strip_prefix('=')))
            .map(|v| urlencoding::decode(v).map(|s| s.into_owned()).unwrap_or_else(|_| v.to_string()))
    };
    if let Some(jk) = param("jk") {
        return Some(jk);
    }
    param("start").map(|start| format!("listing-{}", start))
}

#[async_trait]
impl Renderer for FixtureRenderer {
    async fn render(&self, url: &str, _timeout: Duration) -> Result<String> {
        self.renders.fetch_add(1, Ordering::SeqCst);
        let key = fixture_key(url).ok_or_else(|| CrawlError::fetch(url, "no fixture key in URL"))?;
        match self.pages.get(&key) {
            Some(html) => Ok(html.clone()),
            None => {
                warn!(url, key = %key, "No fixture for page");
                Err(CrawlError::fetch(url, format!("no fixture '{}'", key)))
            }
        }
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_key() {
        assert_eq!(
            fixture_key("https://jp.indeed.com/viewjob?jk=abc123"),
            Some("abc123".to_string())
        );
        assert_eq!(
            fixture_key("https://jp.indeed.com/jobs?q=%E3%83%90&l=x&start=20"),
            Some("listing-20".to_string())
        );
        assert_eq!(fixture_key("https://jp.indeed.com/"), None);
        // "sjk" must not be read as "jk"
        assert_eq!(fixture_key("https://x/viewjob?sjk=1&start=0"), Some("listing-0".to_string()));
    }

    #[tokio::test]
    async fn test_fixture_renderer_serves_and_counts() {
        let renderer = FixtureRenderer::new().with_page("abc", "<html>ok</html>");
        let html = renderer
            .render("https://jp.indeed.com/viewjob?jk=abc", Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(html, "<html>ok</html>");

        let missing = renderer
            .render("https://jp.indeed.com/viewjob?jk=zzz", Duration::from_secs(1))
            .await;
        assert!(matches!(missing, Err(CrawlError::Fetch { .. })));
        assert_eq!(renderer.render_count(), 2);
    }

    #[tokio::test]
    async fn test_fixture_renderer_close_sets_flag() {
        let renderer = FixtureRenderer::bundled();
        let flag = renderer.closed_flag();
        assert!(!flag.load(Ordering::SeqCst));
        renderer.close().await.unwrap();
        assert!(flag.load(Ordering::SeqCst));
    }

    #[test]
    fn test_http_renderer_builds_with_default_profile() {
        assert!(HttpRenderer::new(&HeaderProfile::default()).is_ok());
    }

    #[test]
    fn test_http_renderer_rejects_invalid_header() {
        let headers = HeaderProfile {
            user_agent: "bad\nagent".to_string(),
            ..HeaderProfile::default()
        };
        assert!(matches!(
            HttpRenderer::new(&headers),
            Err(CrawlError::RendererUnavailable(_))
        ));
    }

    #[tokio::test]
    #[ignore] // needs chromedriver listening on localhost:9515
    async fn test_webdriver_renderer_fetches_page() {
        let config = CrawlerConfig::default();
        let renderer = acquire(RendererKind::WebDriver, &config).await.unwrap();
        let html = renderer
            .render("https://example.com/", Duration::from_secs(30))
            .await
            .unwrap();
        assert!(html.contains("Example Domain"));
        renderer.close().await.unwrap();
    }
}
