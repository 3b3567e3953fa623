//! Field extraction from rendered job pages.
//!
//! Each field has an ordered list of selector strategies. The first element
//! whose value passes the field's plausibility check wins; a field nobody
//! matches comes back as an empty string.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};

use crate::normalize::{
    decode_escapes, looks_like_markup, normalize, normalize_paragraphs, strip_markup_noise, unique,
};
use crate::salary;

/// Below this many characters the JSON description is considered missing
/// and the DOM strategies get a chance.
pub const MIN_DESCRIPTION_CHARS: usize = 50;

static DESCRIPTION_HTML: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""description"\s*:\s*\{[^}]*?"html"\s*:\s*"((?:[^"\\]|\\.)*)""#).unwrap()
});
static JOB_DESCRIPTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""jobDescription"\s*:\s*"((?:[^"\\]|\\.)*)""#).unwrap());
static HEADCOUNT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+\s*(?:名|人)").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Title,
    CompanyName,
    Location,
    Description,
    Salary,
    CompanyUrl,
}

#[derive(Debug, Clone, Copy)]
enum Source {
    Text,
    Attr(&'static str),
    /// Attribute when present and non-empty, element text otherwise.
    AttrOrText(&'static str),
}

#[derive(Debug, Clone, Copy)]
struct Strategy {
    selector: &'static str,
    source: Source,
    must_contain: &'static [&'static str],
}

impl Strategy {
    const fn text(selector: &'static str) -> Self {
        Self {
            selector,
            source: Source::Text,
            must_contain: &[],
        }
    }

    const fn attr(selector: &'static str, name: &'static str) -> Self {
        Self {
            selector,
            source: Source::Attr(name),
            must_contain: &[],
        }
    }

    const fn attr_or_text(selector: &'static str, name: &'static str) -> Self {
        Self {
            selector,
            source: Source::AttrOrText(name),
            must_contain: &[],
        }
    }

    const fn containing(mut self, terms: &'static [&'static str]) -> Self {
        self.must_contain = terms;
        self
    }

    fn read(&self, element: ElementRef) -> String {
        let raw = match self.source {
            Source::Text => element.text().collect::<String>(),
            Source::Attr(name) => element.value().attr(name).unwrap_or_default().to_string(),
            Source::AttrOrText(name) => match element.value().attr(name) {
                Some(value) if !value.trim().is_empty() => value.to_string(),
                _ => element.text().collect::<String>(),
            },
        };
        normalize(&raw)
    }
}

const TITLE_STRATEGIES: &[Strategy] = &[
    Strategy::attr_or_text(r#"h1[data-testid="jobsearch-JobInfoHeader-title"] span"#, "title"),
    Strategy::attr("h1 span[title]", "title"),
    Strategy::text(".jobsearch-JobInfoHeader-title span"),
    Strategy::text("h1.jobsearch-JobInfoHeader-title"),
    Strategy::text(r#"h1[data-testid="jobsearch-JobInfoHeader-title"]"#),
    Strategy::text("title"),
];

const COMPANY_STRATEGIES: &[Strategy] = &[
    Strategy::text(r#"[data-testid="inlineHeader-companyName"] a"#),
    Strategy::text(r#"[data-testid="inlineHeader-companyName"]"#),
    Strategy::text(".jobsearch-CompanyInfoContainer a"),
    Strategy::text(".jobsearch-InlineCompanyRating div"),
    Strategy::text(".jobsearch-CompanyInfoContainer span"),
];

const LOCATION_STRATEGIES: &[Strategy] = &[
    Strategy::text(r#"[data-testid="inlineHeader-companyLocation"]"#),
    Strategy::text(r#"[data-testid="job-location"]"#),
    Strategy::text(".jobsearch-JobInfoHeader-subtitle div"),
    Strategy::text(".jobsearch-CompanyInfoContainer div"),
];

const DESCRIPTION_SELECTORS: &[&str] = &[
    ".jobsearch-JobComponent-description .css-fdgeuo",
    ".css-fdgeuo",
    "#jobDescriptionText",
    ".jobsearch-jobDescriptionText",
    ".jobsearch-JobComponent-description",
];

const SALARY_STRATEGIES: &[Strategy] = &[
    Strategy::text(r#"[data-testid="job-compensation"]"#),
    Strategy::text(".salaryText"),
    Strategy::text(".salary"),
    Strategy::text(r#"[data-testid="salaries-section"]"#),
    Strategy::text(".jobsearch-JobMetadataHeader-item"),
    Strategy::text("div").containing(&["月給", "年収", "年俸", "時給"]),
];

const COMPANY_URL_STRATEGIES: &[Strategy] = &[
    Strategy::attr(r#"[data-testid="inlineHeader-companyName"] a"#, "href"),
    Strategy::attr(".jobsearch-CompanyInfoContainer a", "href"),
];

/// Reads one field from a rendered detail page. Empty when no strategy
/// produced a plausible value.
pub fn extract(doc: &Html, field: Field) -> String {
    match field {
        Field::Title => first_plausible(doc, TITLE_STRATEGIES, plausible_title),
        Field::CompanyName => first_plausible(doc, COMPANY_STRATEGIES, plausible_company),
        Field::Location => first_plausible(doc, LOCATION_STRATEGIES, plausible_location),
        Field::Description => description(doc),
        Field::Salary => salary_text(doc).unwrap_or_default(),
        Field::CompanyUrl => first_plausible(doc, COMPANY_URL_STRATEGIES, |v| v.starts_with("http")),
    }
}

fn first_plausible(doc: &Html, strategies: &[Strategy], plausible: impl Fn(&str) -> bool) -> String {
    for strategy in strategies {
        let Some(selector) = Selector::parse(strategy.selector).ok() else {
            continue;
        };
        for element in doc.select(&selector) {
            let value = strategy.read(element);
            if value.is_empty() || !plausible(&value) {
                continue;
            }
            if !strategy.must_contain.is_empty()
                && !strategy.must_contain.iter().any(|term| value.contains(term))
            {
                continue;
            }
            return value;
        }
    }
    String::new()
}

fn plausible_title(value: &str) -> bool {
    value.chars().count() <= 200 && !is_site_banner(value) && !looks_like_markup(value)
}

/// Page-title text naming the site itself, e.g. "求人 - Indeed.com".
fn is_site_banner(value: &str) -> bool {
    let lower = value.to_lowercase();
    let lower = lower
        .trim_end()
        .trim_end_matches("(インディード)")
        .trim_end()
        .trim_end_matches(".com")
        .trim_end();
    lower == "indeed" || lower.ends_with("- indeed") || lower.ends_with("| indeed")
}

fn plausible_company(value: &str) -> bool {
    value.chars().count() <= 100 && !looks_like_markup(value)
}

/// Location slots also carry salary and headcount lines on some layouts.
fn plausible_location(value: &str) -> bool {
    value.chars().count() <= 100
        && !looks_like_markup(value)
        && !value.contains('円')
        && !value.contains("社員")
        && !HEADCOUNT.is_match(value)
}

// --- Description ---

fn description(doc: &Html) -> String {
    let from_json = description_from_json(doc);
    if from_json.chars().count() >= MIN_DESCRIPTION_CHARS {
        return from_json;
    }
    let from_dom = description_from_dom(doc);
    if from_dom.chars().count() > from_json.chars().count() {
        from_dom
    } else {
        from_json
    }
}

/// Description embedded in the page's inline state script, either as a
/// `"description": {"html": "..."}` object or a plain `"jobDescription"`
/// string. Escapes are decoded and the HTML flattened to text with its
/// paragraph breaks kept.
pub fn description_from_json(doc: &Html) -> String {
    let Some(scripts) = Selector::parse("script").ok() else {
        return String::new();
    };

    for script in doc.select(&scripts) {
        let body: String = script.text().collect();
        if !body.contains("\"description\"") && !body.contains("\"jobDescription\"") {
            continue;
        }
        let payload = DESCRIPTION_HTML
            .captures(&body)
            .or_else(|| JOB_DESCRIPTION.captures(&body))
            .and_then(|caps| caps.get(1));
        if let Some(payload) = payload {
            let html = decode_escapes(payload.as_str());
            let fragment = Html::parse_fragment(&html);
            let text = strip_markup_noise(&block_text(fragment.root_element()));
            if !text.is_empty() {
                return text;
            }
        }
    }
    String::new()
}

fn description_from_dom(doc: &Html) -> String {
    for raw in DESCRIPTION_SELECTORS {
        let Some(selector) = Selector::parse(raw).ok() else {
            continue;
        };
        let blocks: Vec<String> = doc
            .select(&selector)
            .map(block_text)
            .filter(|text| text.chars().count() > 20 && !looks_like_markup(text))
            .collect();
        if !blocks.is_empty() {
            return unique(blocks).join("\n\n");
        }
    }
    String::new()
}

// --- Salary ---

/// Salary phrase for the page. The visible body text is searched first;
/// dedicated salary elements are only a fallback.
pub fn salary_text(doc: &Html) -> Option<String> {
    if let Some(found) = salary::find_in_text(&visible_text(doc)) {
        return Some(found);
    }
    let fallback = first_plausible(doc, SALARY_STRATEGIES, |v| {
        (v.contains('円') || v.contains('万')) && v.chars().count() < 100
    });
    (!fallback.is_empty()).then_some(fallback)
}

// --- Text helpers ---

const SKIPPED_ELEMENTS: [&str; 5] = ["head", "script", "style", "noscript", "template"];
const BLOCK_ELEMENTS: [&str; 17] = [
    "p", "div", "li", "ul", "ol", "h1", "h2", "h3", "h4", "h5", "h6", "section", "article", "tr",
    "table", "header", "footer",
];

fn collect_text(element: ElementRef, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) => {
                let name = el.name();
                if SKIPPED_ELEMENTS.contains(&name) {
                    continue;
                }
                if name == "br" {
                    out.push('\n');
                    continue;
                }
                let block = BLOCK_ELEMENTS.contains(&name);
                if block {
                    out.push('\n');
                }
                if let Some(child_el) = ElementRef::wrap(child) {
                    collect_text(child_el, out);
                }
                if block {
                    out.push('\n');
                }
            }
            _ => {}
        }
    }
}

/// Text of an element with line breaks at `<br>` and block boundaries.
pub fn block_text(element: ElementRef) -> String {
    let mut raw = String::new();
    collect_text(element, &mut raw);
    normalize_paragraphs(&raw)
}

/// Everything a reader would see on the page, scripts and styles excluded.
pub fn visible_text(doc: &Html) -> String {
    block_text(doc.root_element())
}

/// Job identifiers on a search results page, in page order, deduplicated.
pub fn extract_job_ids(html: &str) -> Vec<String> {
    let doc = Html::parse_document(html);
    let Some(selector) = Selector::parse("[data-jk]").ok() else {
        return Vec::new();
    };
    let ids = doc
        .select(&selector)
        .filter_map(|el| el.value().attr("data-jk"))
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .collect();
    unique(ids)
}
