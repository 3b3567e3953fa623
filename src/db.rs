use anyhow::{anyhow, Context, Result};
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::models::{CompanyProfile, CompanyType, JobRecord, RoleType, StoredCompany, StoredJob};

pub const DEFAULT_PAGE_SIZE: usize = 20;

pub struct Database {
    conn: Connection,
    path: PathBuf,
}

/// Filters for `Database::find`. Text filters are case-insensitive
/// substring matches; `page` is 1-based.
#[derive(Debug, Clone)]
pub struct JobFilters {
    pub search: Option<String>,
    pub industry: Option<String>,
    pub location: Option<String>,
    pub company_type: Option<String>,
    pub page: usize,
    pub limit: usize,
}

impl Default for JobFilters {
    fn default() -> Self {
        Self {
            search: None,
            industry: None,
            location: None,
            company_type: None,
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobPage {
    pub data: Vec<StoredJob>,
    pub total: usize,
    pub page: usize,
    pub limit: usize,
    pub total_pages: usize,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SaveStats {
    pub saved: usize,
    pub duplicates: usize,
    pub errors: usize,
}

const JOB_COLUMNS: &str = "j.id, j.company_id, j.status, j.created_at, j.updated_at,
     j.job_id, j.title, j.description, j.location, j.original_url, j.company_name,
     j.role_type, j.salary_info, j.requirements, j.benefits, j.job_metadata,
     c.name, c.industry, c.sub_industry, c.company_type, c.technologies,
     c.characteristics, c.location, c.website";

const COMPANY_COLUMNS: &str = "id, name, industry, sub_industry, company_type, technologies,
     characteristics, location, website, created_at, updated_at";

impl Database {
    pub fn open() -> Result<Self> {
        Self::open_at(&Self::default_path()?)
    }

    pub fn open_at(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database at {}", path.display()))?;
        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn,
            path: PathBuf::from(":memory:"),
        })
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn default_path() -> Result<PathBuf> {
        // XDG data directory, or the working directory as a fallback
        if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "kyujin") {
            Ok(proj_dirs.data_dir().join("kyujin.db"))
        } else {
            Ok(PathBuf::from("kyujin.db"))
        }
    }

    pub fn init(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS companies (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                industry TEXT NOT NULL,
                sub_industry TEXT NOT NULL,
                company_type TEXT NOT NULL DEFAULT 'Mid-size' CHECK (company_type IN ('Startup', 'Mid-size', 'Enterprise')),
                technologies TEXT NOT NULL,
                characteristics TEXT NOT NULL,
                location TEXT NOT NULL DEFAULT '',
                website TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS jobs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                job_id TEXT NOT NULL,
                title TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                location TEXT NOT NULL DEFAULT '',
                original_url TEXT NOT NULL UNIQUE,
                company_id INTEGER REFERENCES companies(id),
                company_name TEXT NOT NULL DEFAULT '',
                role_type TEXT NOT NULL,
                salary_info TEXT,
                requirements TEXT NOT NULL,
                benefits TEXT NOT NULL,
                job_metadata TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'active' CHECK (status IN ('active', 'expired', 'deleted')),
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX IF NOT EXISTS idx_jobs_job_id ON jobs(job_id);
            CREATE INDEX IF NOT EXISTS idx_jobs_company ON jobs(company_id);
            CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status);
            "#,
        )?;
        Ok(())
    }

    pub fn ensure_initialized(&self) -> Result<()> {
        let tables: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='jobs'",
            [],
            |row| row.get(0),
        )?;
        if tables == 0 {
            return Err(anyhow!("Database not initialized. Run 'kyujin init' first."));
        }
        Ok(())
    }

    // --- Company operations ---

    /// Inserts the company, or overwrites every field of the stored row with
    /// the same name. Returns the row id.
    pub fn upsert_company(&self, company: &CompanyProfile) -> Result<i64> {
        if company.name.trim().is_empty() {
            return Err(anyhow!("Company name must not be empty"));
        }
        self.conn.execute(
            "INSERT INTO companies (name, industry, sub_industry, company_type, technologies,
                                    characteristics, location, website)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(name) DO UPDATE SET
                industry = excluded.industry,
                sub_industry = excluded.sub_industry,
                company_type = excluded.company_type,
                technologies = excluded.technologies,
                characteristics = excluded.characteristics,
                location = excluded.location,
                website = excluded.website,
                updated_at = datetime('now')",
            params![
                company.name,
                company.industry,
                company.sub_industry,
                company.company_type.as_str(),
                serde_json::to_string(&company.technologies)?,
                serde_json::to_string(&company.characteristics)?,
                company.location,
                company.website,
            ],
        )?;

        let id = self
            .company_id(&company.name)?
            .ok_or_else(|| anyhow!("Company '{}' missing after upsert", company.name))?;
        Ok(id)
    }

    fn company_id(&self, name: &str) -> Result<Option<i64>> {
        self.conn
            .query_row("SELECT id FROM companies WHERE name = ?1", [name], |row| row.get(0))
            .optional()
            .context("Failed to look up company")
    }

    pub fn list_companies(&self) -> Result<Vec<StoredCompany>> {
        let sql = format!("SELECT {} FROM companies ORDER BY name", COMPANY_COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], Self::row_to_company)?;

        rows.collect::<Result<Vec<_>, _>>()
            .context("Failed to list companies")
    }

    fn row_to_company(row: &rusqlite::Row) -> rusqlite::Result<StoredCompany> {
        let company_type: String = row.get(4)?;
        Ok(StoredCompany {
            id: row.get(0)?,
            profile: CompanyProfile {
                name: row.get(1)?,
                industry: row.get(2)?,
                sub_industry: row.get(3)?,
                company_type: CompanyType::parse(&company_type).unwrap_or(CompanyType::MidSize),
                technologies: json_column(row, 5)?,
                characteristics: json_column(row, 6)?,
                location: row.get(7)?,
                website: row.get(8)?,
            },
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }

    // --- Job operations ---

    /// Whether a job with this listing identifier is already stored.
    pub fn find_existing(&self, job_id: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM jobs WHERE job_id = ?1",
            [job_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn job_id_by_url(&self, url: &str) -> Result<Option<i64>> {
        self.conn
            .query_row("SELECT id FROM jobs WHERE original_url = ?1", [url], |row| row.get(0))
            .optional()
            .context("Failed to look up job")
    }

    /// Stores the job and links it to its company row when one exists.
    /// A job whose URL is already stored is left untouched and its existing
    /// id returned.
    pub fn save(&self, record: &JobRecord) -> Result<i64> {
        if let Some(id) = self.job_id_by_url(&record.original_url)? {
            debug!(job_id = %record.job_id, id, "Job already stored");
            return Ok(id);
        }

        let company_id = if record.company_name.is_empty() {
            None
        } else {
            self.company_id(&record.company_name)?
        };
        let salary_info = record.salary.as_ref().map(serde_json::to_string).transpose()?;

        self.conn.execute(
            "INSERT INTO jobs (job_id, title, description, location, original_url, company_id,
                               company_name, role_type, salary_info, requirements, benefits,
                               job_metadata)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                record.job_id,
                record.title,
                record.description,
                record.location,
                record.original_url,
                company_id,
                record.company_name,
                record.role_type.as_str(),
                salary_info,
                serde_json::to_string(&record.requirements)?,
                serde_json::to_string(&record.benefits)?,
                serde_json::to_string(&record.metadata)?,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Upserts each record's company, then stores the job. A failing record
    /// is logged and counted; the rest are still saved.
    pub fn save_records(&self, records: &[JobRecord]) -> SaveStats {
        let mut stats = SaveStats::default();
        for record in records {
            match self.save_one(record) {
                Ok(true) => stats.saved += 1,
                Ok(false) => stats.duplicates += 1,
                Err(e) => {
                    warn!(job_id = %record.job_id, error = %e, "Failed to save job");
                    stats.errors += 1;
                }
            }
        }
        stats
    }

    fn save_one(&self, record: &JobRecord) -> Result<bool> {
        if !record.company_name.is_empty() {
            self.upsert_company(&record.company)?;
        }
        // same listing identifier under another host still counts as stored
        if self.find_existing(&record.job_id)? || self.job_id_by_url(&record.original_url)?.is_some() {
            return Ok(false);
        }
        self.save(record)?;
        Ok(true)
    }

    /// Active jobs matching the filters, newest first, one page at a time.
    pub fn find(&self, filters: &JobFilters) -> Result<JobPage> {
        let mut clauses = vec!["j.status = 'active'".to_string()];
        let mut values: Vec<String> = Vec::new();

        if let Some(search) = non_empty(&filters.search) {
            values.push(like(search));
            let n = values.len();
            clauses.push(format!(
                "(j.title LIKE ?{n} OR j.description LIKE ?{n} OR j.company_name LIKE ?{n} OR j.job_id LIKE ?{n})"
            ));
        }
        if let Some(industry) = non_empty(&filters.industry) {
            values.push(like(industry));
            clauses.push(format!("c.industry LIKE ?{}", values.len()));
        }
        if let Some(location) = non_empty(&filters.location) {
            values.push(like(location));
            clauses.push(format!("j.location LIKE ?{}", values.len()));
        }
        if let Some(company_type) = non_empty(&filters.company_type) {
            values.push(like(company_type));
            clauses.push(format!("c.company_type LIKE ?{}", values.len()));
        }

        let from = format!(
            "FROM jobs j LEFT JOIN companies c ON j.company_id = c.id WHERE {}",
            clauses.join(" AND ")
        );

        let total: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) {}", from),
            params_from_iter(values.iter()),
            |row| row.get(0),
        )?;
        let total = total as usize;

        let page = filters.page.max(1);
        let limit = filters.limit.max(1);
        let sql = format!(
            "SELECT {} {} ORDER BY j.created_at DESC, j.id DESC LIMIT {} OFFSET {}",
            JOB_COLUMNS,
            from,
            limit,
            (page - 1) * limit
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let data = stmt
            .query_map(params_from_iter(values.iter()), Self::row_to_job)?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to list jobs")?;

        Ok(JobPage {
            data,
            total,
            page,
            limit,
            total_pages: total.div_ceil(limit),
        })
    }

    pub fn get_job(&self, id: i64) -> Result<Option<StoredJob>> {
        let sql = format!(
            "SELECT {} FROM jobs j LEFT JOIN companies c ON j.company_id = c.id WHERE j.id = ?1",
            JOB_COLUMNS
        );
        let result = self.conn.query_row(&sql, [id], Self::row_to_job);
        match result {
            Ok(job) => Ok(Some(job)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn row_to_job(row: &rusqlite::Row) -> rusqlite::Result<StoredJob> {
        let company_name: String = row.get(10)?;
        let role_type: String = row.get(11)?;
        let salary_info: Option<String> = row.get(12)?;

        let company_row: Option<String> = row.get(16)?;
        let company = match company_row {
            Some(name) => {
                let company_type: String = row.get(19)?;
                CompanyProfile {
                    name,
                    industry: row.get(17)?,
                    sub_industry: row.get(18)?,
                    company_type: CompanyType::parse(&company_type).unwrap_or(CompanyType::MidSize),
                    technologies: json_column(row, 20)?,
                    characteristics: json_column(row, 21)?,
                    location: row.get(22)?,
                    website: row.get(23)?,
                }
            }
            None => CompanyProfile::named(&company_name),
        };

        Ok(StoredJob {
            id: row.get(0)?,
            company_id: row.get(1)?,
            status: row.get(2)?,
            created_at: row.get(3)?,
            updated_at: row.get(4)?,
            record: JobRecord {
                job_id: row.get(5)?,
                title: row.get(6)?,
                description: row.get(7)?,
                location: row.get(8)?,
                original_url: row.get(9)?,
                company_name,
                role_type: RoleType::parse(&role_type).unwrap_or(RoleType::GeneralIt),
                salary: salary_info
                    .map(|raw| parse_json(&raw, 12))
                    .transpose()?,
                requirements: json_column(row, 13)?,
                benefits: json_column(row, 14)?,
                metadata: json_column(row, 15)?,
                company,
            },
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn like(value: &str) -> String {
    format!("%{}%", value)
}

fn json_column<T: DeserializeOwned>(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    parse_json(&raw, idx)
}

fn parse_json<T: DeserializeOwned>(raw: &str, idx: usize) -> rusqlite::Result<T> {
    serde_json::from_str(raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detail::parse_detail;

    fn db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.init().unwrap();
        db
    }

    fn fixture_records() -> Vec<JobRecord> {
        vec![
            parse_detail(
                include_str!("../fixtures/mock001.html"),
                "mock001",
                "https://jp.indeed.com/viewjob?jk=mock001",
            )
            .unwrap(),
            parse_detail(
                include_str!("../fixtures/mock002.html"),
                "mock002",
                "https://jp.indeed.com/viewjob?jk=mock002",
            )
            .unwrap(),
        ]
    }

    #[test]
    fn test_ensure_initialized() {
        let raw = Database::open_in_memory().unwrap();
        assert!(raw.ensure_initialized().is_err());
        raw.init().unwrap();
        assert!(raw.ensure_initialized().is_ok());
    }

    #[test]
    fn test_save_and_read_back() {
        let db = db();
        let records = fixture_records();
        let stats = db.save_records(&records);
        assert_eq!(stats, SaveStats { saved: 2, duplicates: 0, errors: 0 });

        assert!(db.find_existing("mock001").unwrap());
        assert!(!db.find_existing("nope").unwrap());

        let page = db.find(&JobFilters::default()).unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.total_pages, 1);

        let stored = page.data.iter().find(|j| j.record.job_id == "mock001").unwrap();
        assert_eq!(stored.record, records[0]);
        assert!(stored.company_id.is_some());
        assert_eq!(stored.status, "active");

        let by_id = db.get_job(stored.id).unwrap().unwrap();
        assert_eq!(by_id.record, records[0]);
        assert!(db.get_job(9999).unwrap().is_none());
    }

    #[test]
    fn test_duplicate_url_is_not_stored_twice() {
        let db = db();
        let records = fixture_records();
        let first = db.save(&records[0]).unwrap();
        let second = db.save(&records[0]).unwrap();
        assert_eq!(first, second);

        let stats = db.save_records(&records);
        assert_eq!(stats, SaveStats { saved: 1, duplicates: 1, errors: 0 });
        assert_eq!(db.find(&JobFilters::default()).unwrap().total, 2);
    }

    #[test]
    fn test_same_job_id_under_another_url_is_a_duplicate() {
        let db = db();
        let record = fixture_records().remove(0);
        let mut mirrored = record.clone();
        mirrored.original_url = "https://jp.indeed.example/viewjob?jk=mock001".to_string();

        let stats = db.save_records(&[record, mirrored]);
        assert_eq!(stats, SaveStats { saved: 1, duplicates: 1, errors: 0 });
        assert_eq!(db.find(&JobFilters::default()).unwrap().total, 1);
    }

    #[test]
    fn test_upsert_company_overwrites() {
        let db = db();
        let mut company = CompanyProfile::named("株式会社テスト");
        let id = db.upsert_company(&company).unwrap();

        company.company_type = CompanyType::Enterprise;
        company.website = "https://test.example".to_string();
        assert_eq!(db.upsert_company(&company).unwrap(), id);

        let companies = db.list_companies().unwrap();
        assert_eq!(companies.len(), 1);
        assert_eq!(companies[0].profile, company);

        assert!(db.upsert_company(&CompanyProfile::named("  ")).is_err());
    }

    #[test]
    fn test_job_without_company_row_reads_back_placeholder() {
        let db = db();
        let mut record = fixture_records().remove(0);
        record.company_name = String::new();
        record.company = CompanyProfile::named("");

        let id = db.save(&record).unwrap();
        let stored = db.get_job(id).unwrap().unwrap();
        assert!(stored.company_id.is_none());
        assert_eq!(stored.record.company, CompanyProfile::named(""));
    }

    #[test]
    fn test_find_filters() {
        let db = db();
        db.save_records(&fixture_records());

        let only = |filters: JobFilters| -> Vec<String> {
            db.find(&filters)
                .unwrap()
                .data
                .into_iter()
                .map(|j| j.record.job_id)
                .collect()
        };

        let search = JobFilters {
            search: Some("フロントエンド".to_string()),
            ..JobFilters::default()
        };
        assert_eq!(only(search), vec!["mock002"]);

        let industry = JobFilters {
            industry: Some("AI".to_string()),
            ..JobFilters::default()
        };
        assert_eq!(only(industry), vec!["mock001"]);

        let location = JobFilters {
            location: Some("港区".to_string()),
            ..JobFilters::default()
        };
        assert_eq!(only(location), vec!["mock002"]);

        let company_type = JobFilters {
            company_type: Some("startup".to_string()),
            ..JobFilters::default()
        };
        assert_eq!(only(company_type).len(), 2);

        let blank = JobFilters {
            search: Some("   ".to_string()),
            ..JobFilters::default()
        };
        assert_eq!(only(blank).len(), 2);
    }

    #[test]
    fn test_find_paginates() {
        let db = db();
        db.save_records(&fixture_records());

        let page = db
            .find(&JobFilters {
                limit: 1,
                page: 2,
                ..JobFilters::default()
            })
            .unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.data.len(), 1);
        // same created_at second, so ids break the tie: newest id first
        assert_eq!(page.data[0].record.job_id, "mock001");
    }
}
