//! One crawl run: listing walk, then detail fetches, over a single renderer.

use serde::{Deserialize, Serialize};
use std::future::Future;
use tracing::{error, info, warn};

use crate::config::CrawlerConfig;
use crate::detail::DetailFetcher;
use crate::error::Result;
use crate::models::JobRecord;
use crate::render::Renderer;
use crate::walker::ListingWalker;

/// What happened to one listing page or one detail item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum StageOutcome {
    /// Number of new identifiers (pages) or records (items) produced.
    Succeeded(usize),
    Skipped(String),
    Failed(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlCounts {
    pub pages_attempted: usize,
    pub pages_succeeded: usize,
    pub pages_failed: usize,
    pub identifiers_found: usize,
    pub details_attempted: usize,
    pub details_succeeded: usize,
    pub details_skipped: usize,
    pub details_failed: usize,
}

impl CrawlCounts {
    pub fn from_outcomes(pages: &[StageOutcome], identifiers_found: usize, items: &[StageOutcome]) -> Self {
        let (pages_succeeded, _, pages_failed) = tally(pages);
        let (details_succeeded, details_skipped, details_failed) = tally(items);
        Self {
            pages_attempted: pages.len(),
            pages_succeeded,
            pages_failed,
            identifiers_found,
            details_attempted: items.len(),
            details_succeeded,
            details_skipped,
            details_failed,
        }
    }

    pub fn has_failures(&self) -> bool {
        self.pages_failed > 0 || self.details_skipped > 0 || self.details_failed > 0
    }
}

/// (succeeded, skipped, failed)
fn tally(outcomes: &[StageOutcome]) -> (usize, usize, usize) {
    outcomes.iter().fold((0, 0, 0), |(ok, skip, fail), outcome| match outcome {
        StageOutcome::Succeeded(_) => (ok + 1, skip, fail),
        StageOutcome::Skipped(_) => (ok, skip + 1, fail),
        StageOutcome::Failed(_) => (ok, skip, fail + 1),
    })
}

/// State of a single run. Nothing here outlives the run.
#[derive(Debug, Clone, Default)]
pub struct CrawlRun {
    pub query: String,
    pub location: String,
    pub requested_pages: usize,
    pub effective_pages: usize,
    pub job_ids: Vec<String>,
    pub records: Vec<JobRecord>,
    pub pages: Vec<StageOutcome>,
    pub items: Vec<StageOutcome>,
}

impl CrawlRun {
    fn new(query: &str, location: &str, requested_pages: usize, effective_pages: usize) -> Self {
        Self {
            query: query.to_string(),
            location: location.to_string(),
            requested_pages,
            effective_pages,
            ..Self::default()
        }
    }

    pub fn counts(&self) -> CrawlCounts {
        CrawlCounts::from_outcomes(&self.pages, self.job_ids.len(), &self.items)
    }
}

#[derive(Debug)]
pub struct CrawlOutcome {
    pub run: CrawlRun,
    /// Set only when the renderer could not be acquired.
    pub failure: Option<String>,
}

impl CrawlOutcome {
    pub fn records(&self) -> &[JobRecord] {
        &self.run.records
    }

    pub fn report(&self) -> CrawlReport {
        let counts = self.run.counts();
        let found = self.run.records.len();

        let message = if self.failure.is_some() {
            "Crawling failed, but you can use fallback fixture data (`kyujin seed`)".to_string()
        } else if found == 0 {
            "No jobs crawled; use fallback fixture data (`kyujin seed`) for testing".to_string()
        } else if counts.has_failures() {
            format!(
                "Partially crawled {} jobs ({} pages failed, {} items skipped, {} items failed)",
                found, counts.pages_failed, counts.details_skipped, counts.details_failed
            )
        } else {
            format!("Successfully crawled {} jobs", found)
        };

        CrawlReport {
            message,
            jobs_found: found,
            search_query: self.run.query.clone(),
            pages_scanned: self.run.effective_pages,
            counts,
            saved: None,
            error: self.failure.clone(),
        }
    }
}

/// Summary handed back to the caller of a crawl.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlReport {
    pub message: String,
    pub jobs_found: usize,
    pub search_query: String,
    pub pages_scanned: usize,
    pub counts: CrawlCounts,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct Crawler {
    config: CrawlerConfig,
}

impl Crawler {
    pub fn new(config: CrawlerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CrawlerConfig {
        &self.config
    }

    /// Acquires a renderer, runs the crawl on it and closes it again.
    ///
    /// Acquisition failure is the only thing that aborts a run; it comes
    /// back as an empty outcome with `failure` set.
    pub async fn run<F>(&self, acquire: F, query: &str, location: &str, pages: usize) -> CrawlOutcome
    where
        F: Future<Output = Result<Box<dyn Renderer>>>,
    {
        let renderer = match acquire.await {
            Ok(renderer) => renderer,
            Err(e) => {
                error!(error = %e, "Could not acquire renderer");
                let run = CrawlRun::new(query, location, pages, self.config.clamp_pages(pages));
                return CrawlOutcome {
                    run,
                    failure: Some(e.to_string()),
                };
            }
        };

        let run = self.run_with(renderer.as_ref(), query, location, pages).await;

        if let Err(e) = renderer.close().await {
            warn!(error = %e, "Failed to close renderer");
        }

        CrawlOutcome { run, failure: None }
    }

    /// Runs the crawl on a renderer owned by the caller, who also closes it.
    pub async fn run_with(&self, renderer: &dyn Renderer, query: &str, location: &str, pages: usize) -> CrawlRun {
        let mut run = CrawlRun::new(query, location, pages, self.config.clamp_pages(pages));
        info!(
            query = %run.query,
            location = %run.location,
            requested = run.requested_pages,
            pages = run.effective_pages,
            "Starting crawl"
        );

        let listing = ListingWalker::new(renderer, &self.config)
            .walk(query, location, pages)
            .await;
        run.job_ids = listing.job_ids;
        run.pages = listing.pages;

        let details = DetailFetcher::new(renderer, &self.config)
            .fetch_all(&run.job_ids)
            .await;
        run.records = details.records;
        run.items = details.items;

        let counts = run.counts();
        info!(
            pages_succeeded = counts.pages_succeeded,
            pages_failed = counts.pages_failed,
            identifiers = counts.identifiers_found,
            records = counts.details_succeeded,
            skipped = counts.details_skipped,
            failed = counts.details_failed,
            "Crawl finished"
        );
        run
    }
}
