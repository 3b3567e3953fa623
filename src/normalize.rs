use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

static TAG_FRAGMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"</?[a-zA-Z][^<>]*>").unwrap());
static STYLE_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"css-[a-z0-9]{4,}|\{[^{}]*:[^{}]*\}").unwrap());

const ZERO_WIDTH: [char; 4] = ['\u{200B}', '\u{200C}', '\u{200D}', '\u{FEFF}'];

/// Collapses every whitespace run (full-width space included) to a single
/// space, drops zero-width characters and trims the result.
pub fn normalize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_space = false;
    for c in raw.chars() {
        if ZERO_WIDTH.contains(&c) {
            continue;
        }
        if c.is_whitespace() {
            // char::is_whitespace covers U+3000
            pending_space = !out.is_empty();
            continue;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        out.push(c);
    }
    out
}

/// Lowercased `normalize`, the form every classifier matches against.
pub fn fold(raw: &str) -> String {
    normalize(raw).to_lowercase()
}

/// Like `normalize`, but keeps paragraph structure: each line is normalized
/// on its own and runs of blank lines become a single empty line.
pub fn normalize_paragraphs(raw: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut blank = false;
    for line in raw.lines() {
        let line = normalize(line);
        if line.is_empty() {
            blank = !lines.is_empty();
            continue;
        }
        if blank {
            lines.push(String::new());
            blank = false;
        }
        lines.push(line);
    }
    lines.join("\n")
}

/// Decodes the escape sequences found inside inline script payloads:
/// `\uXXXX` (surrogate pairs included), `\n`, `\t`, `\"`, `\/`, `\\`, then
/// numeric and named HTML entities.
pub fn decode_escapes(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut units: Vec<u16> = Vec::new();
    let chars: Vec<char> = raw.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c == '\\' && i + 1 < chars.len() {
            let next = chars[i + 1];
            if next == 'u' && i + 6 <= chars.len() {
                let hex: String = chars[i + 2..i + 6].iter().collect();
                let parsed = hex
                    .chars()
                    .all(|h| h.is_ascii_hexdigit())
                    .then(|| u16::from_str_radix(&hex, 16).ok())
                    .flatten();
                if let Some(unit) = parsed {
                    units.push(unit);
                    i += 6;
                    continue;
                }
            }
            let simple = match next {
                'n' => Some('\n'),
                't' => Some('\t'),
                'r' => Some('\r'),
                '"' => Some('"'),
                '/' => Some('/'),
                '\\' => Some('\\'),
                _ => None,
            };
            if let Some(decoded) = simple {
                flush_utf16(&mut units, &mut out);
                out.push(decoded);
                i += 2;
                continue;
            }
        }
        flush_utf16(&mut units, &mut out);
        out.push(c);
        i += 1;
    }
    flush_utf16(&mut units, &mut out);

    html_escape::decode_html_entities(&out).into_owned()
}

fn flush_utf16(units: &mut Vec<u16>, out: &mut String) {
    if units.is_empty() {
        return;
    }
    out.extend(
        char::decode_utf16(units.drain(..)).map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER)),
    );
}

/// True when a scraped string is markup or stylesheet noise rather than
/// page text (class-name tokens like `css-fdgeuo`, inline rule blocks).
pub fn looks_like_markup(text: &str) -> bool {
    STYLE_TOKEN.is_match(text) || TAG_FRAGMENT.is_match(text)
}

/// Removes tag fragments and drops lines carrying stylesheet tokens.
pub fn strip_markup_noise(text: &str) -> String {
    let without_tags = TAG_FRAGMENT.replace_all(text, " ");
    let kept: Vec<&str> = without_tags
        .lines()
        .filter(|line| !STYLE_TOKEN.is_match(line))
        .collect();
    normalize_paragraphs(&kept.join("\n"))
}

/// Order-preserving deduplication.
pub fn unique(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

/// Truncates to `max` characters (not bytes), appending "..." when cut.
pub fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_collapses_ascii_and_full_width_space() {
        assert_eq!(normalize("  バックエンド\u{3000}\u{3000}エンジニア \n\t 東京 "), "バックエンド エンジニア 東京");
        assert_eq!(normalize("a\u{200B}b"), "ab");
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   "), "");
    }

    #[test]
    fn test_fold_lowercases() {
        assert_eq!(fold("  AWS  と Docker "), "aws と docker");
    }

    #[test]
    fn test_normalize_paragraphs_keeps_breaks() {
        let raw = "【業務内容】\n  API 開発  \n\n\n\n【必須】\n Go ";
        assert_eq!(normalize_paragraphs(raw), "【業務内容】\nAPI 開発\n\n【必須】\nGo");
    }

    #[test]
    fn test_decode_escapes_unicode_and_entities() {
        assert_eq!(decode_escapes(r"\u003Cbr\/\u003E"), "<br/>");
        assert_eq!(decode_escapes(r"\u6771\u4eac"), "東京");
        assert_eq!(decode_escapes("&#26481;&#20140; &amp; more"), "東京 & more");
        assert_eq!(decode_escapes(r#"line\nnext \"q\""#), "line\nnext \"q\"");
        // surrogate pair for U+1F600
        assert_eq!(decode_escapes(r"\ud83d\ude00"), "\u{1F600}");
    }

    #[test]
    fn test_decode_escapes_leaves_invalid_sequences() {
        assert_eq!(decode_escapes(r"\uZZZZ"), r"\uZZZZ");
        assert_eq!(decode_escapes("trailing\\"), "trailing\\");
    }

    #[test]
    fn test_looks_like_markup() {
        assert!(looks_like_markup("css-1ih6vdn eu4oa1w0"));
        assert!(looks_like_markup(".x{color:red}"));
        assert!(looks_like_markup("<div class=\"a\">"));
        assert!(!looks_like_markup("東京都 渋谷区"));
    }

    #[test]
    fn test_strip_markup_noise() {
        let noisy = "<span>年収 500万円</span>\n.css-abcd1{display:none}\n賞与あり";
        assert_eq!(strip_markup_noise(noisy), "年収 500万円\n賞与あり");
    }

    #[test]
    fn test_unique_preserves_first_occurrence() {
        let items = vec!["Go".to_string(), "AWS".to_string(), "Go".to_string()];
        assert_eq!(unique(items), vec!["Go", "AWS"]);
    }

    #[test]
    fn test_truncate_chars_counts_characters() {
        assert_eq!(truncate_chars("経験", 20), "経験");
        assert_eq!(truncate_chars("あいうえおかきくけこ", 3), "あいう...");
    }
}
