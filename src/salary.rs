use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::{SalaryInfo, SalaryPeriod};
use crate::normalize::normalize;

/// Salary phrase anywhere in page text, e.g. "年収 500万円〜800万円".
/// Never crosses a line break; a range needs an explicit separator.
static SALARY_IN_TEXT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?:月給|月収|年収|年俸|時給)[ \t\u{3000}：:]*[\d,]+[ \t\u{3000}]*万?円?(?:[ \t\u{3000}]*[~〜～\-－](?:[ \t\u{3000}]*[\d,]+[ \t\u{3000}]*万?円?)?)?",
    )
    .unwrap()
});

/// min, min 万, min 円, max, max 万
static RANGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d+(?:,\d{3})*)\s*(万)?(円)?\s*(?:~|〜|～|－|-|以上)\s*(?:(\d+(?:,\d{3})*)\s*(万)?円?)?").unwrap()
});

static SINGLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+(?:,\d{3})*)\s*(万)?円?").unwrap());

const SALARY_KEYWORDS: [&str; 9] = ["月給", "月収", "年収", "年俸", "時給", "給与", "給料", "報酬", "円"];

/// First salary phrase found in free page text.
pub fn find_in_text(text: &str) -> Option<String> {
    SALARY_IN_TEXT
        .find(text)
        .map(|m| normalize(m.as_str()))
        .filter(|s| !s.is_empty())
}

/// Whether a piece of text is worth handing to `parse_salary` at all.
pub fn is_salary_like(text: &str) -> bool {
    text.contains('万') || SALARY_KEYWORDS.iter().any(|k| text.contains(k))
}

/// Parses a salary string such as "500〜800万円" or "時給1,200円".
///
/// Returns `None` only when the text does not look like salary text. When
/// it does but carries no usable number, the result still holds the display
/// text and currency.
pub fn parse_salary(text: &str) -> Option<SalaryInfo> {
    let clean = normalize(text);
    if clean.is_empty() {
        return None;
    }

    let mut info = SalaryInfo {
        min: None,
        max: None,
        currency: "JPY".to_string(),
        period: None,
        display: clean.clone(),
        employment_type: String::new(),
    };

    if let Some(caps) = RANGE.captures(&clean) {
        let max_man = caps.get(5).is_some();
        // "500〜800万円": a bare left number borrows the right-hand 万
        let min_man = caps.get(2).is_some() || (caps.get(3).is_none() && max_man);
        info.min = caps.get(1).and_then(|m| parse_amount(m.as_str(), man_multiplier(min_man)));
        info.max = caps.get(4).and_then(|m| parse_amount(m.as_str(), man_multiplier(max_man)));
        if info.min.is_some() {
            info.period = Some(detect_period(&clean));
            return Some(info);
        }
    }

    if let Some(caps) = SINGLE.captures(&clean) {
        let man = caps.get(2).is_some();
        info.min = caps.get(1).and_then(|m| parse_amount(m.as_str(), man_multiplier(man)));
        if info.min.is_some() {
            info.period = Some(detect_period(&clean));
            return Some(info);
        }
    }

    // no number, but still salary-ish text: keep the display string
    if is_salary_like(&clean) {
        return Some(info);
    }
    None
}

/// Period tag, checked in fixed priority: monthly, hourly, fixed annual,
/// then plain annual as the default.
pub fn detect_period(text: &str) -> SalaryPeriod {
    if text.contains("月給") || text.contains("月収") {
        SalaryPeriod::Monthly
    } else if text.contains("時給") {
        SalaryPeriod::Hourly
    } else if text.contains("年俸") {
        SalaryPeriod::AnnualFixed
    } else {
        SalaryPeriod::Annual
    }
}

fn man_multiplier(man: bool) -> i64 {
    if man { 10_000 } else { 1 }
}

fn parse_amount(raw: &str, multiplier: i64) -> Option<i64> {
    raw.replace(',', "")
        .parse::<i64>()
        .ok()
        .and_then(|n| n.checked_mul(multiplier))
}
