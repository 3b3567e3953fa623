use anyhow::{Context, Result, anyhow};
use rand::Rng;
use std::env;
use std::time::Duration;

/// Hard ceiling on listing pages per run, whatever the caller asks for.
pub const MAX_PAGES: usize = 10;

pub const DEFAULT_SEARCH: &str = "バックエンドエンジニア";
pub const DEFAULT_LOCATION: &str = "東京都";

/// Random wait drawn uniformly from `[min, max]` milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayWindow {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DelayWindow {
    pub const ZERO: DelayWindow = DelayWindow { min_ms: 0, max_ms: 0 };

    pub const fn millis(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    pub fn pick(&self) -> Duration {
        if self.max_ms <= self.min_ms {
            return Duration::from_millis(self.min_ms);
        }
        Duration::from_millis(rand::thread_rng().gen_range(self.min_ms..=self.max_ms))
    }

    pub async fn sleep(&self) {
        let delay = self.pick();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    /// Parses "5000-8000" or a single "3000".
    fn parse(raw: &str) -> Result<Self> {
        let (min, max) = match raw.split_once('-') {
            Some((min, max)) => (min.trim(), max.trim()),
            None => (raw.trim(), raw.trim()),
        };
        let min: u64 = min.parse().with_context(|| format!("Invalid delay window: {}", raw))?;
        let max: u64 = max.parse().with_context(|| format!("Invalid delay window: {}", raw))?;
        if max < min {
            return Err(anyhow!("Invalid delay window: {} (max below min)", raw));
        }
        Ok(Self::millis(min, max))
    }
}

/// Request headers presented to the listing site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderProfile {
    pub user_agent: String,
    pub accept: String,
    pub accept_language: String,
}

impl Default for HeaderProfile {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                .to_string(),
            accept: "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8"
                .to_string(),
            accept_language: "ja-JP,ja;q=0.9,en;q=0.8".to_string(),
        }
    }
}

impl HeaderProfile {
    /// Primary language tag, e.g. "ja-JP".
    pub fn language(&self) -> &str {
        self.accept_language
            .split([',', ';'])
            .next()
            .unwrap_or("ja-JP")
    }
}

#[derive(Debug, Clone)]
pub struct CrawlerConfig {
    pub base_url: String,
    pub results_per_page: usize,
    pub max_items: usize,
    pub listing_delay: DelayWindow,
    pub detail_delay: DelayWindow,
    pub settle_delay: DelayWindow,
    pub listing_timeout: Duration,
    pub detail_timeout: Duration,
    pub headers: HeaderProfile,
    pub webdriver_url: String,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            base_url: "https://jp.indeed.com".to_string(),
            results_per_page: 10,
            max_items: 10,
            listing_delay: DelayWindow::millis(5000, 8000),
            detail_delay: DelayWindow::millis(3000, 6000),
            settle_delay: DelayWindow::millis(2000, 4000),
            listing_timeout: Duration::from_secs(60),
            detail_timeout: Duration::from_secs(30),
            headers: HeaderProfile::default(),
            webdriver_url: "http://localhost:9515".to_string(),
        }
    }
}

impl CrawlerConfig {
    /// Defaults overlaid with `KYUJIN_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(url) = env::var("KYUJIN_BASE_URL") {
            config.base_url = url.trim_end_matches('/').to_string();
        }
        if let Ok(url) = env::var("KYUJIN_WEBDRIVER_URL") {
            config.webdriver_url = url;
        }
        if let Ok(ua) = env::var("KYUJIN_USER_AGENT") {
            config.headers.user_agent = ua;
        }
        if let Ok(lang) = env::var("KYUJIN_ACCEPT_LANGUAGE") {
            config.headers.accept_language = lang;
        }
        if let Ok(raw) = env::var("KYUJIN_MAX_ITEMS") {
            config.max_items = raw
                .parse()
                .with_context(|| format!("KYUJIN_MAX_ITEMS must be a number, got '{}'", raw))?;
        }
        if let Ok(raw) = env::var("KYUJIN_LISTING_DELAY_MS") {
            config.listing_delay = DelayWindow::parse(&raw)?;
        }
        if let Ok(raw) = env::var("KYUJIN_DETAIL_DELAY_MS") {
            config.detail_delay = DelayWindow::parse(&raw)?;
        }

        Ok(config)
    }

    /// Same configuration with every politeness delay removed. Only meant
    /// for offline replays against local fixtures.
    pub fn without_delays(mut self) -> Self {
        self.listing_delay = DelayWindow::ZERO;
        self.detail_delay = DelayWindow::ZERO;
        self.settle_delay = DelayWindow::ZERO;
        self
    }

    /// Requested page count clamped to `MAX_PAGES`.
    pub fn clamp_pages(&self, requested: usize) -> usize {
        requested.min(MAX_PAGES)
    }
}
