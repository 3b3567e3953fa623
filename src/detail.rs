use scraper::Html;
use tracing::{debug, info, warn};

use crate::classify;
use crate::config::CrawlerConfig;
use crate::crawler::StageOutcome;
use crate::error::{CrawlError, Result};
use crate::extract::{Field, extract, visible_text};
use crate::models::{Characteristics, CompanyProfile, JobRecord};
use crate::normalize::{fold, unique};
use crate::render::Renderer;
use crate::salary::parse_salary;
use crate::tags;

#[derive(Debug, Default)]
pub struct DetailResult {
    pub records: Vec<JobRecord>,
    pub items: Vec<StageOutcome>,
}

pub struct DetailFetcher<'a> {
    renderer: &'a dyn Renderer,
    config: &'a CrawlerConfig,
}

impl<'a> DetailFetcher<'a> {
    pub fn new(renderer: &'a dyn Renderer, config: &'a CrawlerConfig) -> Self {
        Self { renderer, config }
    }

    pub fn detail_url(&self, job_id: &str) -> String {
        format!("{}/viewjob?jk={}", self.config.base_url, urlencoding::encode(job_id))
    }

    /// Fetches and parses up to `max_items` detail pages in order. Each item
    /// gets its own outcome; one bad item never stops the rest.
    pub async fn fetch_all(&self, job_ids: &[String]) -> DetailResult {
        let batch = &job_ids[..job_ids.len().min(self.config.max_items)];
        if batch.len() < job_ids.len() {
            info!(found = job_ids.len(), fetching = batch.len(), "Limiting detail fetches");
        }

        let mut result = DetailResult::default();
        for (i, job_id) in batch.iter().enumerate() {
            let url = self.detail_url(job_id);
            debug!(job_id = %job_id, url = %url, "Fetching detail page");

            match self.fetch_one(job_id, &url).await {
                Ok(record) => {
                    info!(job_id = %job_id, title = %record.title, "Parsed job");
                    result.records.push(record);
                    result.items.push(StageOutcome::Succeeded(1));
                }
                Err(e @ CrawlError::MissingField { .. }) => {
                    warn!(job_id = %job_id, error = %e, "Skipping job");
                    result.items.push(StageOutcome::Skipped(e.to_string()));
                }
                Err(e) => {
                    warn!(job_id = %job_id, error = %e, "Failed to fetch job");
                    result.items.push(StageOutcome::Failed(e.to_string()));
                }
            }

            if i + 1 < batch.len() {
                self.config.detail_delay.sleep().await;
            }
        }
        result
    }

    async fn fetch_one(&self, job_id: &str, url: &str) -> Result<JobRecord> {
        let html = self.renderer.render(url, self.config.detail_timeout).await?;
        parse_detail(&html, job_id, url)
    }
}

/// Builds a `JobRecord` from a rendered detail page.
///
/// Pure: the same page always yields the same record. Fails only when the
/// identifier or the title is missing.
pub fn parse_detail(html: &str, job_id: &str, url: &str) -> Result<JobRecord> {
    let job_id = job_id.trim();
    if job_id.is_empty() {
        return Err(CrawlError::MissingField {
            job_id: String::new(),
            field: "job_id",
        });
    }

    let doc = Html::parse_document(html);
    let title = extract(&doc, Field::Title);
    if title.is_empty() {
        return Err(CrawlError::MissingField {
            job_id: job_id.to_string(),
            field: "title",
        });
    }

    let company_name = extract(&doc, Field::CompanyName);
    let location = extract(&doc, Field::Location);
    let description = extract(&doc, Field::Description);
    let salary_raw = extract(&doc, Field::Salary);
    let website = extract(&doc, Field::CompanyUrl);
    let body = visible_text(&doc);

    let text = fold(&description);
    let page = fold(&format!("{}\n{}", body, description));

    let metadata = tags::job_metadata(&page);
    let requirements = tags::requirements(&text);
    let mut benefits = tags::benefits(&text);
    benefits.tags = metadata.tags.clone();

    let salary = parse_salary(&salary_raw).map(|mut info| {
        info.employment_type = metadata.employment_type.clone();
        info
    });

    let technologies = classify::tech_stack(&text);
    let role_type = classify::role_type(&fold(&format!("{} {}", title, description)), &technologies);
    let industry = classify::industry(&text);

    let mut tech_stack = technologies.backend.clone();
    tech_stack.extend(technologies.frontend.iter().cloned());

    let company = CompanyProfile {
        name: company_name.clone(),
        industry: industry.main.to_string(),
        sub_industry: industry.sub.to_string(),
        company_type: classify::company_type(&text, &company_name),
        characteristics: Characteristics {
            size: classify::company_size(&page),
            culture: classify::culture(&text),
            tech_stack: unique(tech_stack),
            work_style: benefits.work_style.clone(),
        },
        technologies,
        location: location.clone(),
        website,
    };

    Ok(JobRecord {
        job_id: job_id.to_string(),
        title,
        description,
        location,
        original_url: url.to_string(),
        company_name,
        role_type,
        salary,
        requirements,
        benefits,
        metadata,
        company,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DelayWindow;
    use crate::models::{CompanyType, RoleType, SalaryPeriod};
    use crate::render::FixtureRenderer;
    use std::time::Duration;
    use tokio::time::Instant;

    const MOCK001: &str = include_str!("../fixtures/mock001.html");
    const MOCK002: &str = include_str!("../fixtures/mock002.html");
    const URL1: &str = "https://jp.indeed.com/viewjob?jk=mock001";

    #[test]
    fn test_parse_detail_from_json_description() {
        let job = parse_detail(MOCK001, "mock001", URL1).unwrap();
        assert_eq!(job.job_id, "mock001");
        assert_eq!(job.title, "バックエンドエンジニア（AI × 動作解析）");
        assert_eq!(job.company_name, "株式会社Sportip");
        assert_eq!(job.location, "東京都 渋谷区");
        assert_eq!(job.original_url, URL1);
        assert!(job.description.starts_with("【業務内容】\n・Webアプリケーションのサーバーサイド開発"));

        let salary = job.salary.as_ref().unwrap();
        assert_eq!(salary.min, Some(8_000_000));
        assert_eq!(salary.max, Some(12_000_000));
        assert_eq!(salary.period, Some(SalaryPeriod::Annual));
        assert_eq!(salary.employment_type, "正社員");

        assert_eq!(job.requirements.experience, "3年以上");
        assert_eq!(job.requirements.education, "大学");
        assert_eq!(job.requirements.languages, vec!["英語"]);

        assert_eq!(job.company.industry, "IT / AI");
        assert_eq!(job.company.company_type, CompanyType::Startup);
        assert_eq!(job.company.technologies.backend, vec!["Node.js", "Python", "PostgreSQL", "Redis"]);
        assert_eq!(job.company.technologies.infrastructure, vec!["AWS", "Docker"]);
        assert_eq!(job.company.characteristics.size, "~40名");
        assert_eq!(job.company.website, "https://sportip.co.jp");
        // AWS and Docker put an infrastructure signal on a backend posting
        assert_eq!(job.role_type, RoleType::InfrastructureDevOps);

        assert!(job.metadata.is_remote);
        assert!(job.metadata.responds_quickly);
        assert_eq!(job.metadata.work_schedule, "フレックスタイム");
        assert_eq!(job.benefits.tags, job.metadata.tags);
        assert_eq!(job.benefits.welfare, vec!["社会保険完備"]);
        assert_eq!(job.company.characteristics.work_style, job.benefits.work_style);
    }

    #[test]
    fn test_parse_detail_from_dom_description() {
        let job = parse_detail(MOCK002, "mock002", "https://jp.indeed.com/viewjob?jk=mock002").unwrap();
        assert_eq!(job.title, "フロントエンドエンジニア（React/Next.js）");
        assert_eq!(job.company_name, "株式会社TechInnovate");
        assert_eq!(job.location, "東京都 港区");
        assert!(job.description.contains("Webアプリケーションのフロントエンド開発"));

        let salary = job.salary.as_ref().unwrap();
        assert_eq!(salary.min, Some(6_000_000));
        assert_eq!(salary.max, Some(10_000_000));
        assert_eq!(salary.display, "600万円 〜 1,000万円");

        assert_eq!(job.role_type, RoleType::Frontend);
        assert_eq!(job.requirements.experience, "2年以上");
        assert_eq!(job.company.industry, "IT / インターネット");
        assert_eq!(job.company.sub_industry, "Webサービス開発");
        assert_eq!(job.company.company_type, CompanyType::Startup);
        assert_eq!(job.company.characteristics.tech_stack, vec!["React", "Next.js", "TypeScript"]);
        assert!(job.metadata.is_new_job);
        assert!(job.metadata.tags.contains(&"副業OK".to_string()));
    }

    #[test]
    fn test_parse_detail_is_deterministic() {
        let first = parse_detail(MOCK001, "mock001", URL1).unwrap();
        let second = parse_detail(MOCK001, "mock001", URL1).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_title_is_rejected() {
        let html = "<html><body><div id=\"jobDescriptionText\">説明だけのページ</div></body></html>";
        let err = parse_detail(html, "x1", "https://jp.indeed.com/viewjob?jk=x1").unwrap_err();
        assert!(matches!(err, CrawlError::MissingField { field: "title", .. }));

        let err = parse_detail(MOCK001, "  ", URL1).unwrap_err();
        assert!(matches!(err, CrawlError::MissingField { field: "job_id", .. }));
    }

    #[test]
    fn test_missing_optional_fields_stay_empty() {
        let html = "<html><body><h1 class=\"jobsearch-JobInfoHeader-title\">社内SE</h1></body></html>";
        let job = parse_detail(html, "x2", "https://jp.indeed.com/viewjob?jk=x2").unwrap();
        assert_eq!(job.company_name, "");
        assert_eq!(job.location, "");
        assert_eq!(job.description, "");
        assert!(job.salary.is_none());
        assert_eq!(job.role_type, RoleType::GeneralIt);
        assert_eq!(job.requirements.experience, "");
    }

    #[tokio::test]
    async fn test_fetch_all_isolates_failures() {
        let config = CrawlerConfig::default().without_delays();
        let renderer = FixtureRenderer::new()
            .with_page("mock001", MOCK001)
            .with_page("notitle", "<html><body><p>no title</p></body></html>");
        let fetcher = DetailFetcher::new(&renderer, &config);

        let ids: Vec<String> = ["mock001", "gone", "notitle"].iter().map(|s| s.to_string()).collect();
        let result = fetcher.fetch_all(&ids).await;

        assert_eq!(result.records.len(), 1);
        assert_eq!(result.items[0], StageOutcome::Succeeded(1));
        assert!(matches!(result.items[1], StageOutcome::Failed(_)));
        assert!(matches!(result.items[2], StageOutcome::Skipped(_)));
    }

    #[tokio::test]
    async fn test_fetch_all_is_bounded_by_max_items() {
        let mut config = CrawlerConfig::default().without_delays();
        config.max_items = 2;
        let renderer = FixtureRenderer::new();
        let fetcher = DetailFetcher::new(&renderer, &config);

        let ids: Vec<String> = (0..5).map(|i| format!("id{}", i)).collect();
        let result = fetcher.fetch_all(&ids).await;
        assert_eq!(result.items.len(), 2);
        assert_eq!(renderer.render_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_runs_between_items_only() {
        let mut config = CrawlerConfig::default().without_delays();
        config.detail_delay = DelayWindow::millis(1000, 1500);
        let renderer = FixtureRenderer::bundled();
        let fetcher = DetailFetcher::new(&renderer, &config);

        let ids: Vec<String> = ["mock001", "mock002", "gone"].iter().map(|s| s.to_string()).collect();
        let start = Instant::now();
        let result = fetcher.fetch_all(&ids).await;
        let elapsed = start.elapsed();

        assert_eq!(result.items.len(), 3);
        // failed items still wait before the next one; nothing after the last
        assert!(elapsed >= Duration::from_millis(2000), "{:?}", elapsed);
        assert!(elapsed < Duration::from_millis(3000), "{:?}", elapsed);
    }

    #[test]
    fn test_detail_url() {
        let config = CrawlerConfig::default();
        let renderer = FixtureRenderer::new();
        let fetcher = DetailFetcher::new(&renderer, &config);
        assert_eq!(fetcher.detail_url("abc123"), "https://jp.indeed.com/viewjob?jk=abc123");
    }
}
