use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SalaryPeriod {
    #[serde(rename = "月給")]
    Monthly,
    #[serde(rename = "時給")]
    Hourly,
    #[serde(rename = "年俸")]
    AnnualFixed,
    #[serde(rename = "年収")]
    Annual,
}

impl SalaryPeriod {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Monthly => "月給",
            Self::Hourly => "時給",
            Self::AnnualFixed => "年俸",
            Self::Annual => "年収",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalaryInfo {
    pub min: Option<i64>,
    pub max: Option<i64>,
    pub currency: String,
    pub period: Option<SalaryPeriod>, // None when no number could be parsed
    pub display: String,
    pub employment_type: String, // 正社員, 業務委託, ...
}

impl SalaryInfo {
    /// Human readable salary: the scraped display text when present,
    /// otherwise the range expressed in 万円.
    pub fn format(&self) -> String {
        if !self.display.is_empty() {
            return self.display.clone();
        }
        let period = self.period.unwrap_or(SalaryPeriod::Annual).label();
        match (self.min, self.max) {
            (Some(min), Some(max)) => format!("{}〜{}万円 ({})", min / 10_000, max / 10_000, period),
            (Some(min), None) => format!("{}万円〜 ({})", min / 10_000, period),
            _ => "応相談".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirements {
    pub experience: String,
    pub skills: Vec<String>,
    pub education: String,
    pub languages: Vec<String>,
    pub certifications: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Benefits {
    pub work_style: Vec<String>,
    pub welfare: Vec<String>,
    pub vacation: Vec<String>,
    pub allowances: Vec<String>,
    pub development: Vec<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobMetadata {
    pub employment_type: String,
    pub work_schedule: String,
    pub is_sponsored: bool,
    pub is_urgent: bool,
    pub responds_quickly: bool,
    pub is_new_job: bool,
    pub is_remote: bool,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompanyType {
    Startup,
    #[serde(rename = "Mid-size")]
    MidSize,
    Enterprise,
}

impl CompanyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Startup => "Startup",
            Self::MidSize => "Mid-size",
            Self::Enterprise => "Enterprise",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Startup" => Some(Self::Startup),
            "Mid-size" => Some(Self::MidSize),
            "Enterprise" => Some(Self::Enterprise),
            _ => None,
        }
    }
}

impl fmt::Display for CompanyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoleType {
    #[serde(rename = "Infrastructure/DevOps")]
    InfrastructureDevOps,
    #[serde(rename = "Full-stack")]
    FullStack,
    Backend,
    Frontend,
    #[serde(rename = "General IT")]
    GeneralIt,
}

impl RoleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InfrastructureDevOps => "Infrastructure/DevOps",
            Self::FullStack => "Full-stack",
            Self::Backend => "Backend",
            Self::Frontend => "Frontend",
            Self::GeneralIt => "General IT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Infrastructure/DevOps" => Some(Self::InfrastructureDevOps),
            "Full-stack" => Some(Self::FullStack),
            "Backend" => Some(Self::Backend),
            "Frontend" => Some(Self::Frontend),
            "General IT" => Some(Self::GeneralIt),
            _ => None,
        }
    }
}

impl fmt::Display for RoleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Technologies {
    pub backend: Vec<String>,
    pub frontend: Vec<String>,
    pub infrastructure: Vec<String>,
    pub other: Vec<String>,
}

impl Technologies {
    /// Flattened view used for display, capped at `limit` entries.
    pub fn display(&self, limit: usize) -> Vec<String> {
        self.backend
            .iter()
            .chain(&self.frontend)
            .chain(&self.infrastructure)
            .chain(&self.other)
            .take(limit)
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Characteristics {
    pub size: String,
    pub culture: Vec<String>,
    pub tech_stack: Vec<String>,
    pub work_style: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyProfile {
    pub name: String,
    pub industry: String,
    pub sub_industry: String,
    pub company_type: CompanyType,
    pub technologies: Technologies,
    pub characteristics: Characteristics,
    pub location: String,
    pub website: String,
}

impl CompanyProfile {
    /// Placeholder profile for a job whose company was never stored.
    pub fn named(name: &str) -> Self {
        let industry = crate::classify::default_industry();
        Self {
            name: name.to_string(),
            industry: industry.main.to_string(),
            sub_industry: industry.sub.to_string(),
            company_type: CompanyType::MidSize,
            technologies: Technologies::default(),
            characteristics: Characteristics::default(),
            location: String::new(),
            website: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: String,
    pub title: String,
    pub description: String,
    pub location: String,
    pub original_url: String,
    pub company_name: String,
    pub role_type: RoleType,
    pub salary: Option<SalaryInfo>,
    pub requirements: Requirements,
    pub benefits: Benefits,
    pub metadata: JobMetadata,
    pub company: CompanyProfile,
}

/// A job as read back from the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredJob {
    pub id: i64,
    pub company_id: Option<i64>,
    pub status: String, // "active", "expired", "deleted"
    pub created_at: String,
    pub updated_at: String,
    pub record: JobRecord,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredCompany {
    pub id: i64,
    pub profile: CompanyProfile,
    pub created_at: String,
    pub updated_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn salary(min: Option<i64>, max: Option<i64>, display: &str) -> SalaryInfo {
        SalaryInfo {
            min,
            max,
            currency: "JPY".to_string(),
            period: Some(SalaryPeriod::Annual),
            display: display.to_string(),
            employment_type: String::new(),
        }
    }

    #[test]
    fn test_salary_format_prefers_display_text() {
        let s = salary(Some(5_000_000), Some(8_000_000), "年収500万円〜800万円");
        assert_eq!(s.format(), "年収500万円〜800万円");
    }

    #[test]
    fn test_salary_format_range_in_man_yen() {
        let s = salary(Some(5_000_000), Some(8_000_000), "");
        assert_eq!(s.format(), "500〜800万円 (年収)");
        assert_eq!(salary(None, None, "").format(), "応相談");
    }

    #[test]
    fn test_enum_labels_roundtrip_through_serde() {
        let json = serde_json::to_string(&RoleType::InfrastructureDevOps).unwrap();
        assert_eq!(json, "\"Infrastructure/DevOps\"");
        let json = serde_json::to_string(&SalaryPeriod::Hourly).unwrap();
        assert_eq!(json, "\"時給\"");
        assert_eq!(CompanyType::parse("Mid-size"), Some(CompanyType::MidSize));
        assert_eq!(RoleType::parse("General IT"), Some(RoleType::GeneralIt));
    }

    #[test]
    fn test_technologies_display_is_capped() {
        let tech = Technologies {
            backend: vec!["Go".into(), "Python".into()],
            frontend: vec!["React".into()],
            infrastructure: vec!["AWS".into()],
            other: vec![],
        };
        assert_eq!(tech.display(3), vec!["Go", "Python", "React"]);
    }
}
