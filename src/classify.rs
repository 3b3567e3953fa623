//! Deterministic keyword classifiers.
//!
//! Every function here expects text already folded with
//! [`crate::normalize::fold`] and never consults anything but its arguments.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::{CompanyType, RoleType, Technologies};
use crate::normalize::{truncate_chars, unique};

static YEARS_MINIMUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)\s*年以上").unwrap());
static HEADCOUNT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:従業員数|社員数|従業員)[^\d]{0,6}([\d,]+)\s*(?:名|人)").unwrap());

/// Substring test that respects ASCII word boundaries for ASCII terms, so
/// "java" does not fire on "javascript" and "go" does not fire on "google".
/// Non-ASCII terms (Japanese) are plain substring tests.
pub fn has_term(text: &str, term: &str) -> bool {
    if !term.is_ascii() {
        return text.contains(term);
    }
    text.match_indices(term).any(|(idx, _)| {
        let before = text[..idx].chars().next_back();
        let after = text[idx + term.len()..].chars().next();
        !before.is_some_and(|c| c.is_ascii_alphanumeric())
            && !after.is_some_and(|c| c.is_ascii_alphanumeric())
    })
}

pub fn has_any(text: &str, terms: &[&str]) -> bool {
    terms.iter().any(|term| has_term(text, term))
}

// --- Industry ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Industry {
    pub main: &'static str,
    pub sub: &'static str,
}

const DEFAULT_INDUSTRY: Industry = Industry {
    main: "IT / インターネット",
    sub: "Webサービス開発",
};

/// Checked in order; the first rule with a hit wins.
const INDUSTRY_RULES: &[(&[&str], Industry)] = &[
    (
        &["ai", "ml", "機械学習", "人工知能", "深層学習", "ディープラーニング", "machine learning"],
        Industry {
            main: "IT / AI",
            sub: "AI・機械学習",
        },
    ),
    (
        &["saas", "クラウド"],
        Industry {
            main: "IT / インターネット",
            sub: "SaaS / クラウド",
        },
    ),
    (
        &["スポーツ", "ヘルスケア", "健康", "医療", "healthcare"],
        Industry {
            main: "IT / ヘルスケア",
            sub: "健康・スポーツ関連サービス",
        },
    ),
];

pub fn industry(text: &str) -> Industry {
    INDUSTRY_RULES
        .iter()
        .find(|(terms, _)| has_any(text, terms))
        .map(|(_, industry)| *industry)
        .unwrap_or(DEFAULT_INDUSTRY)
}

pub fn default_industry() -> Industry {
    DEFAULT_INDUSTRY
}

// --- Company type / size ---

const STARTUP_TERMS: [&str; 3] = ["startup", "スタートアップ", "ベンチャー"];
const LEGAL_ENTITY_MARKERS: [&str; 4] = ["株式会社", "合同会社", "(株)", "（株）"];
const NOVELTY_TERMS: [&str; 4] = ["新しい", "革新", "innovative", "新規事業"];
const ENTERPRISE_TERMS: [&str; 4] = ["大手", "enterprise", "東証プライム", "グローバル企業"];

pub fn company_type(text: &str, company_name: &str) -> CompanyType {
    let incorporated = LEGAL_ENTITY_MARKERS.iter().any(|m| company_name.contains(m));
    if has_any(text, &STARTUP_TERMS) || (incorporated && has_any(text, &NOVELTY_TERMS)) {
        CompanyType::Startup
    } else if has_any(text, &ENTERPRISE_TERMS) {
        CompanyType::Enterprise
    } else {
        CompanyType::MidSize
    }
}

/// Headcount label such as "~120名", or empty when the page states none.
pub fn company_size(text: &str) -> String {
    HEADCOUNT
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| format!("~{}名", m.as_str()))
        .unwrap_or_default()
}

// --- Tech stack ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bucket {
    Backend,
    Frontend,
    Infrastructure,
    Other,
}

/// Each label lives in exactly one bucket.
const TECH_VOCABULARY: &[(&str, &[&str], Bucket)] = &[
    ("Node.js", &["node.js", "nodejs"], Bucket::Backend),
    ("Python", &["python"], Bucket::Backend),
    ("Java", &["java"], Bucket::Backend),
    ("PHP", &["php"], Bucket::Backend),
    ("Ruby", &["ruby"], Bucket::Backend),
    ("Rails", &["rails"], Bucket::Backend),
    ("Go", &["golang", "go言語", "go"], Bucket::Backend),
    ("C#", &["c#", "csharp", ".net"], Bucket::Backend),
    ("Scala", &["scala"], Bucket::Backend),
    ("Rust", &["rust"], Bucket::Backend),
    ("Spring", &["spring"], Bucket::Backend),
    ("Django", &["django"], Bucket::Backend),
    ("Flask", &["flask"], Bucket::Backend),
    ("Express", &["express"], Bucket::Backend),
    ("Laravel", &["laravel"], Bucket::Backend),
    ("SQL", &["sql"], Bucket::Backend),
    ("MySQL", &["mysql"], Bucket::Backend),
    ("PostgreSQL", &["postgresql", "postgres"], Bucket::Backend),
    ("MongoDB", &["mongodb"], Bucket::Backend),
    ("Redis", &["redis"], Bucket::Backend),
    ("DynamoDB", &["dynamodb"], Bucket::Backend),
    ("React", &["react"], Bucket::Frontend),
    ("Vue.js", &["vue", "vue.js"], Bucket::Frontend),
    ("Angular", &["angular"], Bucket::Frontend),
    ("Next.js", &["next.js", "nextjs"], Bucket::Frontend),
    ("Nuxt.js", &["nuxt.js", "nuxt"], Bucket::Frontend),
    ("TypeScript", &["typescript"], Bucket::Frontend),
    ("JavaScript", &["javascript"], Bucket::Frontend),
    ("AWS", &["aws"], Bucket::Infrastructure),
    ("GCP", &["gcp", "google cloud"], Bucket::Infrastructure),
    ("Azure", &["azure"], Bucket::Infrastructure),
    ("Docker", &["docker"], Bucket::Infrastructure),
    ("Kubernetes", &["kubernetes", "k8s"], Bucket::Infrastructure),
    ("Terraform", &["terraform"], Bucket::Infrastructure),
    ("CI/CD", &["ci/cd"], Bucket::Infrastructure),
    ("Jenkins", &["jenkins"], Bucket::Infrastructure),
    ("GitHub Actions", &["github actions"], Bucket::Infrastructure),
    ("Linux", &["linux"], Bucket::Infrastructure),
    ("Git", &["git"], Bucket::Other),
    ("GitHub", &["github"], Bucket::Other),
    ("GitLab", &["gitlab"], Bucket::Other),
    ("Swift", &["swift"], Bucket::Other),
    ("Kotlin", &["kotlin"], Bucket::Other),
    ("Flutter", &["flutter"], Bucket::Other),
];

pub fn tech_stack(text: &str) -> Technologies {
    let mut tech = Technologies::default();
    for (label, terms, bucket) in TECH_VOCABULARY {
        if !has_any(text, terms) {
            continue;
        }
        let list = match bucket {
            Bucket::Backend => &mut tech.backend,
            Bucket::Frontend => &mut tech.frontend,
            Bucket::Infrastructure => &mut tech.infrastructure,
            Bucket::Other => &mut tech.other,
        };
        list.push(label.to_string());
    }
    tech
}

// --- Culture ---

const CULTURE_RULES: &[(&str, &[&str])] = &[
    ("リモートワーク", &["リモート", "remote", "在宅"]),
    ("フレックスタイム", &["フレックス", "flexible"]),
    ("自由な環境", &["自由", "自主性"]),
    ("スタートアップ文化", &["startup", "スタートアップ"]),
    ("学習支援", &["学習", "研修", "勉強会"]),
];

pub fn culture(text: &str) -> Vec<String> {
    let tags = CULTURE_RULES
        .iter()
        .filter(|(_, terms)| has_any(text, terms))
        .map(|(tag, _)| tag.to_string())
        .collect();
    unique(tags)
}

// --- Role type ---

const INFRA_ROLE_TERMS: [&str; 7] = [
    "インフラ",
    "infrastructure",
    "devops",
    "sre",
    "site reliability",
    "クラウドエンジニア",
    "ネットワークエンジニア",
];
const BACKEND_ROLE_TERMS: [&str; 6] = ["バックエンド", "backend", "back-end", "サーバーサイド", "server-side", "api"];
const FRONTEND_ROLE_TERMS: [&str; 5] = ["フロントエンド", "frontend", "front-end", "ui/ux", "マークアップ"];

/// Infrastructure dominates whenever any signal for it exists; otherwise
/// backend+frontend is full-stack, then backend, then frontend.
pub fn role_type(text: &str, tech: &Technologies) -> RoleType {
    if has_any(text, &INFRA_ROLE_TERMS) || !tech.infrastructure.is_empty() {
        return RoleType::InfrastructureDevOps;
    }
    let backend = has_any(text, &BACKEND_ROLE_TERMS) || !tech.backend.is_empty();
    let frontend = has_any(text, &FRONTEND_ROLE_TERMS) || !tech.frontend.is_empty();
    match (backend, frontend) {
        (true, true) => RoleType::FullStack,
        (true, false) => RoleType::Backend,
        (false, true) => RoleType::Frontend,
        (false, false) => RoleType::GeneralIt,
    }
}

// --- Experience ---

/// "N年以上" when stated, then the 未経験 / 経験者 markers, and otherwise the
/// first 20 characters of the text so the field is never silently empty.
pub fn experience(text: &str) -> String {
    if let Some(caps) = YEARS_MINIMUM.captures(text) {
        if let Some(years) = caps.get(1) {
            return format!("{}年以上", years.as_str());
        }
    }
    if text.contains("未経験") {
        return "未経験可".to_string();
    }
    if text.contains("経験者") {
        return "経験者".to_string();
    }
    truncate_chars(text.trim(), 20)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::fold;

    #[test]
    fn test_has_term_respects_ascii_boundaries() {
        assert!(has_term("java / spring", "java"));
        assert!(!has_term("javascript", "java"));
        assert!(!has_term("google", "go"));
        assert!(has_term("go言語での開発", "go"));
        assert!(has_term("aiを活用", "ai"));
        assert!(!has_term("email", "ai"));
        assert!(has_term("c#での開発", "c#"));
        assert!(has_term("クラウド", "クラウド"));
    }

    #[test]
    fn test_industry_first_match_wins() {
        assert_eq!(industry(&fold("AIとSaaSの会社")).sub, "AI・機械学習");
        assert_eq!(industry(&fold("BtoB SaaS を開発")).sub, "SaaS / クラウド");
        assert_eq!(industry(&fold("ヘルスケアアプリ")).main, "IT / ヘルスケア");
        assert_eq!(industry(&fold("ECサイトの開発")), default_industry());
    }

    #[test]
    fn test_company_type_rules() {
        assert_eq!(company_type(&fold("急成長中のスタートアップ"), "X"), CompanyType::Startup);
        assert_eq!(company_type(&fold("新しい価値を創る"), "株式会社テスト"), CompanyType::Startup);
        assert_eq!(company_type(&fold("新しい価値を創る"), "Test Ltd"), CompanyType::MidSize);
        assert_eq!(company_type(&fold("大手メーカー"), "株式会社テスト"), CompanyType::Enterprise);
        assert_eq!(company_type("", ""), CompanyType::MidSize);
    }

    #[test]
    fn test_company_size() {
        assert_eq!(company_size("従業員数：120名"), "~120名");
        assert_eq!(company_size("社員数 1,200人"), "~1,200名");
        assert_eq!(company_size("少数精鋭"), "");
    }

    #[test]
    fn test_tech_stack_buckets() {
        let tech = tech_stack(&fold("Go / TypeScript / React / AWS (ECS) / MySQL / GitHub"));
        assert_eq!(tech.backend, vec!["Go", "MySQL"]);
        assert_eq!(tech.frontend, vec!["React", "TypeScript"]);
        assert_eq!(tech.infrastructure, vec!["AWS"]);
        assert_eq!(tech.other, vec!["GitHub"]);
    }

    #[test]
    fn test_tech_stack_does_not_double_count_javascript_as_java() {
        let tech = tech_stack(&fold("JavaScript"));
        assert!(tech.backend.is_empty());
        assert_eq!(tech.frontend, vec!["JavaScript"]);
    }

    #[test]
    fn test_culture_union_and_dedup() {
        let text = fold("フルリモート、リモート勤務可、フレックス、社内勉強会と研修あり");
        assert_eq!(culture(&text), vec!["リモートワーク", "フレックスタイム", "学習支援"]);
        assert_eq!(culture(&text), culture(&text));
    }

    #[test]
    fn test_role_type_infra_dominates_backend() {
        let text = fold("バックエンドとインフラを担当");
        let tech = tech_stack(&text);
        assert_eq!(role_type(&text, &tech), RoleType::InfrastructureDevOps);

        let text = fold("API開発 Python / React");
        let tech = tech_stack(&text);
        assert_eq!(role_type(&text, &tech), RoleType::FullStack);

        let text = fold("サーバーサイド開発 (Java)");
        let tech = tech_stack(&text);
        assert_eq!(role_type(&text, &tech), RoleType::Backend);

        let text = fold("フロントエンドエンジニア Vue");
        let tech = tech_stack(&text);
        assert_eq!(role_type(&text, &tech), RoleType::Frontend);

        assert_eq!(role_type("社内SE", &Technologies::default()), RoleType::GeneralIt);
    }

    #[test]
    fn test_role_type_infra_from_tech_bucket_alone() {
        let tech = tech_stack(&fold("Docker"));
        assert_eq!(role_type("", &tech), RoleType::InfrastructureDevOps);
    }

    #[test]
    fn test_experience_buckets() {
        assert_eq!(experience("実務経験3年以上"), "3年以上");
        assert_eq!(experience("未経験者歓迎"), "未経験可");
        assert_eq!(experience("経験者優遇"), "経験者");
        assert_eq!(experience("チームでの開発に興味がある方を歓迎します。"), "チームでの開発に興味がある方を歓迎します...");
        assert_eq!(experience(""), "");
    }
}
