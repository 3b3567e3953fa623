use std::collections::HashSet;
use tracing::{info, warn};

use crate::config::CrawlerConfig;
use crate::crawler::StageOutcome;
use crate::extract::extract_job_ids;
use crate::render::Renderer;

/// Identifiers collected over all listing pages plus one outcome per page.
#[derive(Debug, Default)]
pub struct ListingResult {
    pub job_ids: Vec<String>,
    pub pages: Vec<StageOutcome>,
}

pub struct ListingWalker<'a> {
    renderer: &'a dyn Renderer,
    config: &'a CrawlerConfig,
}

impl<'a> ListingWalker<'a> {
    pub fn new(renderer: &'a dyn Renderer, config: &'a CrawlerConfig) -> Self {
        Self { renderer, config }
    }

    pub fn page_url(&self, query: &str, location: &str, page: usize) -> String {
        format!(
            "{}/jobs?q={}&l={}&start={}",
            self.config.base_url,
            urlencoding::encode(query),
            urlencoding::encode(location),
            page * self.config.results_per_page
        )
    }

    /// Walks listing pages `0..pages` one at a time. A failed page is
    /// recorded and skipped; it never stops the walk.
    pub async fn walk(&self, query: &str, location: &str, requested: usize) -> ListingResult {
        let pages = self.config.clamp_pages(requested);
        if pages < requested {
            warn!(requested, pages, "Page count clamped");
        }

        let mut result = ListingResult::default();
        let mut seen = HashSet::new();

        for page in 0..pages {
            let url = self.page_url(query, location, page);
            info!(page = page + 1, total = pages, url = %url, "Fetching listing page");

            match self.renderer.render(&url, self.config.listing_timeout).await {
                Ok(html) => {
                    let found = extract_job_ids(&html);
                    let found_count = found.len();
                    let new_ids: Vec<String> = found
                        .into_iter()
                        .filter(|id| seen.insert(id.clone()))
                        .collect();
                    info!(page = page + 1, found = found_count, new = new_ids.len(), "Listing page parsed");
                    result.pages.push(StageOutcome::Succeeded(new_ids.len()));
                    result.job_ids.extend(new_ids);
                }
                Err(e) => {
                    warn!(page = page + 1, error = %e, "Listing page failed, moving on");
                    result.pages.push(StageOutcome::Failed(e.to_string()));
                }
            }

            if page + 1 < pages {
                self.config.listing_delay.sleep().await;
            }
        }

        info!(ids = result.job_ids.len(), pages, "Listing walk finished");
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DelayWindow;
    use crate::render::FixtureRenderer;
    use std::time::Duration;
    use tokio::time::Instant;

    fn listing(ids: &[&str]) -> String {
        let items: String = ids
            .iter()
            .map(|id| format!(r#"<li><a class="jcs-JobTitle" data-jk="{}">job</a></li>"#, id))
            .collect();
        format!("<html><body><ul>{}</ul></body></html>", items)
    }

    fn config() -> CrawlerConfig {
        CrawlerConfig::default().without_delays()
    }

    #[test]
    fn test_page_url_offsets_by_ten() {
        let config = config();
        let renderer = FixtureRenderer::new();
        let walker = ListingWalker::new(&renderer, &config);
        assert_eq!(
            walker.page_url("Rust", "東京都", 2),
            "https://jp.indeed.com/jobs?q=Rust&l=%E6%9D%B1%E4%BA%AC%E9%83%BD&start=20"
        );
        assert!(walker.page_url("a b", "x", 0).contains("q=a%20b"));
    }

    #[tokio::test]
    async fn test_walk_dedups_across_pages() {
        let config = config();
        let renderer = FixtureRenderer::new()
            .with_page("listing-0", &listing(&["a", "b", "a"]))
            .with_page("listing-10", &listing(&["b", "c"]));
        let walker = ListingWalker::new(&renderer, &config);

        let result = walker.walk("q", "l", 2).await;
        assert_eq!(result.job_ids, vec!["a", "b", "c"]);
        assert_eq!(
            result.pages,
            vec![StageOutcome::Succeeded(2), StageOutcome::Succeeded(1)]
        );
    }

    #[tokio::test]
    async fn test_failed_page_does_not_stop_walk() {
        let config = config();
        let renderer = FixtureRenderer::new()
            .with_page("listing-0", &listing(&["a"]))
            .with_page("listing-20", &listing(&["z"]));
        let walker = ListingWalker::new(&renderer, &config);

        let result = walker.walk("q", "l", 3).await;
        assert_eq!(result.job_ids, vec!["a", "z"]);
        assert!(matches!(result.pages[1], StageOutcome::Failed(_)));
        assert_eq!(renderer.render_count(), 3);
    }

    #[tokio::test]
    async fn test_requested_pages_are_clamped() {
        let config = config();
        let renderer = FixtureRenderer::new();
        let walker = ListingWalker::new(&renderer, &config);

        let result = walker.walk("q", "l", 25).await;
        assert_eq!(result.pages.len(), crate::config::MAX_PAGES);
        assert_eq!(renderer.render_count(), crate::config::MAX_PAGES);
        assert!(result.job_ids.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_runs_between_pages_only() {
        let mut config = config();
        config.listing_delay = DelayWindow::millis(1000, 1500);
        let renderer = FixtureRenderer::new()
            .with_page("listing-0", &listing(&["a"]))
            .with_page("listing-10", &listing(&["b"]))
            .with_page("listing-20", &listing(&["c"]));
        let walker = ListingWalker::new(&renderer, &config);

        let start = Instant::now();
        let result = walker.walk("q", "l", 3).await;
        let elapsed = start.elapsed();

        assert_eq!(result.job_ids, vec!["a", "b", "c"]);
        // two gaps for three pages, none after the last
        assert!(elapsed >= Duration::from_millis(2000), "{:?}", elapsed);
        assert!(elapsed < Duration::from_millis(3000), "{:?}", elapsed);
    }

    #[tokio::test]
    async fn test_zero_pages_fetches_nothing() {
        let config = config();
        let renderer = FixtureRenderer::new();
        let walker = ListingWalker::new(&renderer, &config);

        let result = walker.walk("q", "l", 0).await;
        assert!(result.pages.is_empty());
        assert_eq!(renderer.render_count(), 0);
    }
}
