//! Syndication-feed (RSS/Atom) article extraction.

use feed_rs::parser;
use std::io::Cursor;
use tracing::debug;

use super::{collapse_whitespace, strip_markup, truncate_chars, CandidateArticle, EXCERPT_MAX_CHARS};
use crate::error::{IngestError, Result};
use crate::TARGET_WEB_REQUEST;

/// Parse a feed body into candidate articles.
///
/// Items missing a non-empty title or a link are dropped silently; this is a
/// filter, not a validation error. A feed with zero usable items yields an
/// empty list.
pub fn parse_feed(body: &str) -> Result<Vec<CandidateArticle>> {
    let feed = match parser::parse(Cursor::new(body.as_bytes())) {
        Ok(feed) => feed,
        Err(first_err) => {
            let cleaned = cleanup_xml(body);
            match parser::parse(Cursor::new(cleaned.as_bytes())) {
                Ok(feed) => {
                    debug!(target: TARGET_WEB_REQUEST, "feed parsed after XML cleanup");
                    feed
                }
                Err(_) => {
                    return Err(IngestError::ParseFailed(format!(
                        "not a parseable syndication feed: {first_err}"
                    )))
                }
            }
        }
    };

    let mut articles = Vec::new();
    for entry in feed.entries {
        let title = entry
            .title
            .as_ref()
            .map(|t| collapse_whitespace(&t.content))
            .filter(|t| !t.is_empty());
        let link = entry
            .links
            .first()
            .map(|link| link.href.trim().to_string())
            .filter(|href| !href.is_empty());
        let (Some(title), Some(link)) = (title, link) else {
            continue;
        };

        let excerpt = entry
            .content
            .as_ref()
            .and_then(|c| c.body.clone())
            .or_else(|| entry.summary.as_ref().map(|s| s.content.clone()))
            .map(|raw| truncate_chars(&collapse_whitespace(&strip_markup(&raw)), EXCERPT_MAX_CHARS))
            .filter(|e| !e.is_empty());

        // Publish date straight from the item; absent means null, never a guess.
        let published_at = entry.published.or(entry.updated);

        articles.push(CandidateArticle {
            title,
            url: link,
            published_at,
            excerpt,
        });
    }

    Ok(articles)
}

/// Light cleanup for feeds with leading junk or loose entities.
fn cleanup_xml(xml: &str) -> String {
    let mut cleaned = xml.trim_start_matches('\u{feff}').trim().to_string();

    for marker in ["<?xml", "<rss", "<feed"] {
        if let Some(start) = cleaned.find(marker) {
            cleaned = cleaned[start..].to_string();
            break;
        }
    }

    cleaned
        .replace("&nbsp;", "&#160;")
        .replace("&ndash;", "&#8211;")
        .replace("&mdash;", "&#8212;")
        .replace("&rsquo;", "&#8217;")
        .replace("&lsquo;", "&#8216;")
        .replace("&rdquo;", "&#8221;")
        .replace("&ldquo;", "&#8220;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    fn rss(items: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"><channel><title>Example</title><link>https://example.com</link>{items}</channel></rss>"#
        )
    }

    #[test]
    fn extracts_items_with_title_and_link() {
        let body = rss(
            r#"<item><title>New sea turtles nesting site</title><link>https://example.com/turtles</link>
               <description>&lt;p&gt;A   new &lt;b&gt;nesting&lt;/b&gt; site was found.&lt;/p&gt;</description>
               <pubDate>Sun, 01 Mar 2026 12:00:00 GMT</pubDate></item>"#,
        );
        let articles = parse_feed(&body).unwrap();
        assert_eq!(articles.len(), 1);
        let article = &articles[0];
        assert_eq!(article.title, "New sea turtles nesting site");
        assert_eq!(article.url, "https://example.com/turtles");
        assert_eq!(
            article.excerpt.as_deref(),
            Some("A new nesting site was found.")
        );
        assert_eq!(article.published_at.unwrap().year(), 2026);
    }

    #[test]
    fn drops_items_missing_title_or_link_silently() {
        let body = rss(
            r#"<item><title>No link here</title></item>
               <item><link>https://example.com/untitled</link></item>
               <item><title>Kept</title><link>https://example.com/kept</link></item>"#,
        );
        let articles = parse_feed(&body).unwrap();
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].title, "Kept");
    }

    #[test]
    fn zero_valid_items_is_empty_not_error() {
        let body = rss("<item><title>Lonely title</title></item>");
        let articles = parse_feed(&body).unwrap();
        assert!(articles.is_empty());
    }

    #[test]
    fn missing_publish_date_stays_null() {
        let body = rss(r#"<item><title>Undated story</title><link>https://example.com/undated</link></item>"#);
        let articles = parse_feed(&body).unwrap();
        assert!(articles[0].published_at.is_none());
    }

    #[test]
    fn excerpt_is_truncated() {
        let long = "word ".repeat(300);
        let body = rss(&format!(
            r#"<item><title>Very long body</title><link>https://example.com/long</link><description>{long}</description></item>"#
        ));
        let articles = parse_feed(&body).unwrap();
        assert_eq!(articles[0].excerpt.as_ref().unwrap().chars().count(), 500);
    }

    #[test]
    fn recovers_from_leading_junk() {
        let body = format!("garbage bytes{}", rss(r#"<item><title>Cleaned feed item</title><link>https://example.com/ok</link></item>"#));
        let articles = parse_feed(&body).unwrap();
        assert_eq!(articles.len(), 1);
    }

    #[test]
    fn rejects_non_feed_documents() {
        let err = parse_feed("<html><body>not a feed</body></html>").unwrap_err();
        assert!(matches!(err, IngestError::ParseFailed(_)));
    }
}
