//! Article extraction from fetched source documents.
//!
//! Two extractors share the [`CandidateArticle`] shape: a syndication-feed
//! parser and a heuristic HTML extractor.

pub mod feed;
pub mod html;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

pub const EXCERPT_MAX_CHARS: usize = 500;
pub const MAX_PAGE_ARTICLES: usize = 20;

/// An article lifted out of a source document, before tagging and ingestion.
#[derive(Debug, Clone)]
pub struct CandidateArticle {
    pub title: String,
    pub url: String,
    /// Taken from the document when present, never invented.
    pub published_at: Option<DateTime<Utc>>,
    pub excerpt: Option<String>,
}

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));

/// Remove markup tags and decode the handful of entities feeds actually use.
pub fn strip_markup(text: &str) -> String {
    let stripped = TAG_RE.replace_all(text, " ");
    stripped
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        text.chars().take(max).collect()
    }
}

/// Parse a date string in the formats monitored sources actually publish.
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(date) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(date.with_timezone(&Utc));
    }
    if let Ok(date) = DateTime::parse_from_rfc2822(trimmed) {
        return Some(date.with_timezone(&Utc));
    }

    for format in &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    for format in &["%Y-%m-%d", "%B %d, %Y", "%b %d, %Y", "%d %B %Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return date
                .and_hms_opt(0, 0, 0)
                .map(|naive| Utc.from_utc_datetime(&naive));
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    #[test]
    fn strips_markup_and_entities() {
        let text = strip_markup("<p>Hello &amp; <b>world</b></p>");
        assert_eq!(collapse_whitespace(&text), "Hello & world");
    }

    #[test]
    fn truncates_on_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 3), "hél");
        assert_eq!(truncate_chars("short", 500), "short");
    }

    #[test]
    fn parses_common_date_shapes() {
        for raw in [
            "2026-03-01T12:00:00Z",
            "Sun, 01 Mar 2026 12:00:00 GMT",
            "2026-03-01 12:00:00",
            "2026-03-01",
            "March 1, 2026",
        ] {
            let parsed = parse_date(raw).unwrap_or_else(|| panic!("failed to parse {raw}"));
            assert_eq!(parsed.year(), 2026);
            assert_eq!(parsed.month(), 3);
        }
        assert!(parse_date("yesterday-ish").is_none());
        assert!(parse_date("").is_none());
    }
}
