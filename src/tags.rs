//! Fixed-vocabulary taggers for requirements, benefits and listing metadata.

use crate::classify::{experience, has_any, has_term};
use crate::models::{Benefits, JobMetadata, Requirements};
use crate::normalize::unique;

const SKILLS: &[&str] = &[
    "Java", "Python", "JavaScript", "TypeScript", "Node.js", "React", "Vue.js", "Angular", "AWS",
    "GCP", "Azure", "Docker", "Kubernetes", "SQL", "MySQL", "PostgreSQL", "MongoDB", "Redis",
    "Git", "GitHub", "GitLab", "Jenkins", "CI/CD", "Linux", "Spring", "Django", "Flask",
    "Express", "Next.js", "Nuxt.js", "HTML", "CSS", "Scala", "Go", "Rust", "PHP", "Ruby", "C#",
    "C++", "C言語", "Swift", "Kotlin",
];

const LANGUAGES: &[(&str, &[&str])] = &[
    ("日本語", &["日本語", "japanese", "jlpt"]),
    ("英語", &["英語", "english", "toeic"]),
    ("中国語", &["中国語", "chinese"]),
    ("韓国語", &["韓国語", "korean"]),
];

/// Highest level first; "大学院" must be tested before "大学".
const EDUCATION: &[&str] = &["大学院", "大学", "高専", "専門学校"];

const CERTIFICATIONS: &[(&str, &str)] = &[
    ("AWS認定", "aws認定"),
    ("基本情報技術者", "基本情報技術者"),
    ("応用情報技術者", "応用情報技術者"),
    ("情報処理安全確保支援士", "情報処理安全確保支援士"),
    ("PMP", "pmp"),
    ("CCNA", "ccna"),
    ("CISSP", "cissp"),
    ("CISA", "cisa"),
    ("Oracle認定", "oracle認定"),
];

const WELFARE: &[&str] = &[
    "社会保険完備", "健康保険", "厚生年金", "雇用保険", "労災保険", "退職金制度", "企業年金",
    "財形貯蓄", "持株会", "団体保険",
];

const WORK_STYLE: &[&str] = &[
    "リモートワーク", "在宅勤務", "フレックスタイム", "時短勤務", "裁量労働制", "副業可", "服装自由",
    "フルリモート",
];

const VACATION: &[&str] = &[
    "完全週休2日制", "完全週休二日制", "土日祝休み", "年間休日120日以上", "有給休暇", "夏季休暇",
    "年末年始休暇", "慶弔休暇", "特別休暇", "育児休暇", "介護休暇",
];

const ALLOWANCES: &[&str] = &[
    "交通費支給", "住宅手当", "家族手当", "食事補助", "通勤手当", "資格手当", "役職手当", "地域手当",
    "残業手当",
];

const DEVELOPMENT: &[&str] = &[
    "研修制度", "資格取得支援", "書籍購入補助", "セミナー参加費補助", "勉強会参加費補助", "技術書購入",
    "外部研修", "社内研修", "教育制度",
];

/// First hit wins.
const EMPLOYMENT_TYPES: &[&str] = &["正社員", "業務委託", "契約社員", "アルバイト", "パート", "派遣"];

const COMMON_TAGS: &[&str] = &[
    "転勤なし", "副業OK", "副業・WワークOK", "服装自由", "資格取得支援", "健康保険あり", "厚生年金あり",
    "雇用保険あり", "労災保険あり", "完全週休二日制", "土日祝休み", "年間休日120日以上", "交通費支給",
    "賞与あり", "昇給あり", "急募",
];

const REMOTE_TERMS: &[&str] = &["リモート", "在宅", "フルリモート"];
const SPONSORED_TERMS: &[&str] = &["スポンサー", "sponsored", "職業紹介", "リクルートエージェント"];
const QUICK_RESPONSE_TERMS: &[&str] = &["返信が早い", "以内に返信", "すぐに返信"];
const NEW_JOB_TERMS: &[&str] = &["新着", "new"];

fn vocabulary_hits(text: &str, vocabulary: &[&str]) -> Vec<String> {
    let hits = vocabulary
        .iter()
        .filter(|item| has_term(text, &item.to_lowercase()))
        .map(|item| item.to_string())
        .collect();
    unique(hits)
}

/// Requirements tagged from the folded description. `experience` falls back
/// to the leading text, so it is filled whenever the description is.
pub fn requirements(text: &str) -> Requirements {
    let languages = LANGUAGES
        .iter()
        .filter(|(_, terms)| has_any(text, terms))
        .map(|(label, _)| label.to_string())
        .collect();

    let certifications = CERTIFICATIONS
        .iter()
        .filter(|(_, term)| has_term(text, term))
        .map(|(label, _)| label.to_string())
        .collect();

    Requirements {
        experience: experience(text),
        skills: vocabulary_hits(text, SKILLS),
        education: EDUCATION
            .iter()
            .find(|level| text.contains(*level))
            .map(|level| level.to_string())
            .unwrap_or_default(),
        languages: unique(languages),
        certifications: unique(certifications),
    }
}

/// Benefits tagged from the folded description. `tags` is left for the
/// caller, who fills it from the page metadata.
pub fn benefits(text: &str) -> Benefits {
    Benefits {
        work_style: vocabulary_hits(text, WORK_STYLE),
        welfare: vocabulary_hits(text, WELFARE),
        vacation: vocabulary_hits(text, VACATION),
        allowances: vocabulary_hits(text, ALLOWANCES),
        development: vocabulary_hits(text, DEVELOPMENT),
        tags: Vec::new(),
    }
}

/// Listing metadata read from the whole folded page text.
pub fn job_metadata(page_text: &str) -> JobMetadata {
    let mut tags = Vec::new();

    let is_remote = has_any(page_text, REMOTE_TERMS);
    if is_remote {
        tags.push("リモートワーク可".to_string());
    }

    let work_schedule = if page_text.contains("フレックス") {
        tags.push("フレックスタイム".to_string());
        "フレックスタイム".to_string()
    } else {
        String::new()
    };

    tags.extend(vocabulary_hits(page_text, COMMON_TAGS));
    let tags = unique(tags);

    JobMetadata {
        employment_type: EMPLOYMENT_TYPES
            .iter()
            .find(|t| page_text.contains(*t))
            .map(|t| t.to_string())
            .unwrap_or_default(),
        work_schedule,
        is_sponsored: has_any(page_text, SPONSORED_TERMS),
        is_urgent: tags.iter().any(|t| t == "急募"),
        responds_quickly: has_any(page_text, QUICK_RESPONSE_TERMS),
        is_new_job: has_any(page_text, NEW_JOB_TERMS),
        is_remote,
        tags,
    }
}
