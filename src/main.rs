mod classify;
mod config;
mod crawler;
mod db;
mod detail;
mod error;
mod extract;
mod models;
mod normalize;
mod render;
mod salary;
mod tags;
mod walker;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use config::{CrawlerConfig, DEFAULT_LOCATION, DEFAULT_SEARCH};
use crawler::Crawler;
use db::{Database, JobFilters};
use models::StoredJob;
use normalize::truncate_chars;
use render::{FixtureRenderer, Renderer, RendererKind};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(name = "kyujin")]
#[command(about = "Crawl job listings into a local store of classified postings")]
struct Cli {
    /// Database file (defaults to the platform data directory)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Crawl listing pages and their job details
    Crawl {
        /// Search keywords
        #[arg(short, long, default_value = DEFAULT_SEARCH)]
        search: String,

        /// Location filter
        #[arg(short, long, default_value = DEFAULT_LOCATION)]
        location: String,

        /// Listing pages to walk (at most 10)
        #[arg(short, long, default_value = "1")]
        pages: usize,

        /// How pages are rendered
        #[arg(long, value_enum, default_value = "webdriver")]
        renderer: RendererArg,

        /// Replay saved pages from this directory instead of the live site
        #[arg(long)]
        fixtures: Option<PathBuf>,

        /// Print the report without storing anything
        #[arg(long)]
        no_save: bool,
    },

    /// Store the bundled sample jobs (fallback when live crawling fails)
    Seed,

    /// List stored jobs
    List {
        /// Match title, description or company
        #[arg(short, long)]
        search: Option<String>,

        /// Filter by industry
        #[arg(short, long)]
        industry: Option<String>,

        /// Filter by location
        #[arg(short, long)]
        location: Option<String>,

        /// Filter by company type (Startup, Mid-size, Enterprise)
        #[arg(short = 't', long)]
        company_type: Option<String>,

        /// Page number, starting at 1
        #[arg(long, default_value = "1")]
        page: usize,

        /// Jobs per page
        #[arg(long, default_value = "20")]
        limit: usize,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show job details
    Show {
        /// Job ID
        id: i64,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// List stored companies
    Companies,
}

#[derive(Clone, Copy, ValueEnum)]
enum RendererArg {
    /// Headless Chrome through a WebDriver server
    Webdriver,
    /// Plain HTTP fetch, no script execution
    Http,
}

impl From<RendererArg> for RendererKind {
    fn from(arg: RendererArg) -> Self {
        match arg {
            RendererArg::Webdriver => RendererKind::WebDriver,
            RendererArg::Http => RendererKind::Http,
        }
    }
}

fn init_tracing() {
    // logs go to stderr so stdout stays parseable
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let db = match &cli.db {
        Some(path) => Database::open_at(path)?,
        None => Database::open()?,
    };

    match cli.command {
        Commands::Init => {
            db.init()?;
            println!("Database initialized at {}", db.path().display());
        }

        Commands::Crawl {
            search,
            location,
            pages,
            renderer,
            fixtures,
            no_save,
        } => {
            if !no_save {
                db.ensure_initialized()?;
            }

            let config = CrawlerConfig::from_env().context("Invalid crawler configuration")?;
            let outcome = match fixtures {
                Some(dir) => {
                    let crawler = Crawler::new(config.without_delays());
                    let acquire = async move {
                        FixtureRenderer::from_dir(&dir).map(|r| Box::new(r) as Box<dyn Renderer>)
                    };
                    crawler.run(acquire, &search, &location, pages).await
                }
                None => {
                    let crawler = Crawler::new(config);
                    let acquire = render::acquire(renderer.into(), crawler.config());
                    crawler.run(acquire, &search, &location, pages).await
                }
            };

            let mut report = outcome.report();
            if !no_save && !outcome.records().is_empty() {
                let stats = db.save_records(outcome.records());
                report.saved = Some(stats.saved);
                report.message.push_str(&format!(
                    "; {} saved, {} already stored, {} failed to save",
                    stats.saved, stats.duplicates, stats.errors
                ));
            }
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Commands::Seed => {
            db.ensure_initialized()?;
            let crawler = Crawler::new(CrawlerConfig::default().without_delays());
            let acquire = async { Ok(Box::new(FixtureRenderer::bundled()) as Box<dyn Renderer>) };
            let outcome = crawler.run(acquire, DEFAULT_SEARCH, DEFAULT_LOCATION, 1).await;

            let stats = db.save_records(outcome.records());
            println!("Seeded {} sample job(s)", stats.saved);
            if stats.duplicates > 0 {
                println!("  Already present: {}", stats.duplicates);
            }
            if stats.errors > 0 {
                println!("  Errors:          {}", stats.errors);
            }
        }

        Commands::List {
            search,
            industry,
            location,
            company_type,
            page,
            limit,
            json,
        } => {
            db.ensure_initialized()?;
            let filters = JobFilters {
                search,
                industry,
                location,
                company_type,
                page,
                limit,
            };
            let result = db.find(&filters)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else if result.data.is_empty() {
                println!("No jobs found.");
            } else {
                println!(
                    "{:<5} {:<12} {:<24} {:<20} {:<12} {:<18}",
                    "ID", "POSTED", "TITLE", "COMPANY", "LOCATION", "SALARY"
                );
                println!("{}", "-".repeat(96));
                for job in &result.data {
                    let record = &job.record;
                    println!(
                        "{:<5} {:<12} {:<24} {:<20} {:<12} {:<18}",
                        job.id,
                        posted_date(job),
                        truncate_chars(&record.title, 20),
                        truncate_chars(&record.company_name, 16),
                        truncate_chars(&record.location, 10),
                        record
                            .salary
                            .as_ref()
                            .map(|s| truncate_chars(&s.format(), 16))
                            .unwrap_or_else(|| "-".to_string()),
                    );
                }
                println!(
                    "\nPage {} of {} ({} jobs)",
                    result.page,
                    result.total_pages.max(1),
                    result.total
                );
            }
        }

        Commands::Show { id, json } => {
            db.ensure_initialized()?;
            match db.get_job(id)? {
                Some(job) if json => println!("{}", serde_json::to_string_pretty(&job)?),
                Some(job) => print_job(&job),
                None => println!("Job #{} not found.", id),
            }
        }

        Commands::Companies => {
            db.ensure_initialized()?;
            let companies = db.list_companies()?;
            if companies.is_empty() {
                println!("No companies found.");
            } else {
                println!(
                    "{:<5} {:<11} {:<22} {:<24} {:<30}",
                    "ID", "TYPE", "NAME", "INDUSTRY", "TECH"
                );
                println!("{}", "-".repeat(96));
                for company in companies {
                    let profile = &company.profile;
                    println!(
                        "{:<5} {:<11} {:<22} {:<24} {:<30}",
                        company.id,
                        profile.company_type,
                        truncate_chars(&profile.name, 18),
                        truncate_chars(&profile.industry, 20),
                        profile.technologies.display(4).join(", "),
                    );
                }
            }
        }
    }

    Ok(())
}

fn print_job(job: &StoredJob) {
    let record = &job.record;
    println!("Job #{} ({})", job.id, record.job_id);
    println!("Title: {}", record.title);
    if !record.company_name.is_empty() {
        println!("Company: {}", record.company_name);
    }
    if !record.location.is_empty() {
        println!("Location: {}", record.location);
    }
    println!("Role: {}", record.role_type);
    if let Some(salary) = &record.salary {
        println!("Salary: {}", salary.format());
    }
    if !record.metadata.employment_type.is_empty() {
        println!("Employment: {}", record.metadata.employment_type);
    }
    println!("URL: {}", record.original_url);
    println!("Posted: {}", posted_date(job));

    let company = &record.company;
    println!("\n--- Company ---");
    println!("Industry: {} / {}", company.industry, company.sub_industry);
    println!("Type: {}", company.company_type);
    if !company.characteristics.size.is_empty() {
        println!("Size: {}", company.characteristics.size);
    }
    if !company.website.is_empty() {
        println!("Website: {}", company.website);
    }
    print_list("Tech", &company.technologies.display(12));
    print_list("Culture", &company.characteristics.culture);

    let req = &record.requirements;
    println!("\n--- Requirements ---");
    if !req.experience.is_empty() {
        println!("Experience: {}", req.experience);
    }
    if !req.education.is_empty() {
        println!("Education: {}", req.education);
    }
    print_list("Skills", &req.skills);
    print_list("Languages", &req.languages);
    print_list("Certifications", &req.certifications);

    let benefits = &record.benefits;
    println!("\n--- Benefits ---");
    print_list("Work style", &benefits.work_style);
    print_list("Welfare", &benefits.welfare);
    print_list("Vacation", &benefits.vacation);
    print_list("Allowances", &benefits.allowances);
    print_list("Development", &benefits.development);
    print_list("Tags", &benefits.tags);

    if !record.description.is_empty() {
        println!("\n--- Description ---\n{}", record.description);
    }
}

fn print_list(label: &str, items: &[String]) {
    if !items.is_empty() {
        println!("{}: {}", label, items.join(", "));
    }
}

/// Calendar date of a stored job's `created_at`.
fn posted_date(job: &StoredJob) -> String {
    chrono::NaiveDateTime::parse_from_str(&job.created_at, "%Y-%m-%d %H:%M:%S")
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|_| job.created_at.clone())
}
