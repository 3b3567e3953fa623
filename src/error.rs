use thiserror::Error;

/// Errors raised by the crawl pipeline.
///
/// Only `RendererUnavailable` ever aborts a run; everything else is recorded
/// against the page or item that produced it.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("renderer unavailable: {0}")]
    RendererUnavailable(String),

    #[error("failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("timed out fetching {url}")]
    Timeout { url: String },

    #[error("job {job_id} is missing required field '{field}'")]
    MissingField { job_id: String, field: &'static str },
}

impl CrawlError {
    pub fn fetch(url: &str, reason: impl ToString) -> Self {
        Self::Fetch {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T, E = CrawlError> = std::result::Result<T, E>;
