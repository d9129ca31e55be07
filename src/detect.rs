//! Source-type detection for newly added URLs.
//!
//! A URL is classified as a syndication feed or a plain HTML page, with a
//! best-effort upgrade: pages that advertise a feed are reclassified to the
//! advertised feed URL when it verifies. Verification failures degrade back
//! to treating the URL as a page, never to an error.

use feed_rs::parser;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use std::io::Cursor;
use tracing::{debug, info};
use url::Url;

use crate::db::SourceKind;
use crate::error::Result;
use crate::fetch::{FetchedPage, SafeFetcher};
use crate::TARGET_WEB_REQUEST;

/// How many advertised feed candidates get a verification fetch.
const MAX_FEED_CANDIDATES: usize = 3;

static FEED_LINK_SEL: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"link[rel="alternate"]"#).expect("valid selector"));
static ANCHOR_SEL: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href]").expect("valid selector"));
static TITLE_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("title").expect("valid selector"));

/// The classified source: the URL to store (possibly a discovered feed URL
/// rather than the one the user gave) and a display name.
#[derive(Debug, Clone)]
pub struct Detection {
    pub kind: SourceKind,
    pub url: String,
    pub name: String,
}

/// Classify `url`. The initial fetch failing is a hard error; everything
/// after it degrades gracefully.
pub async fn detect_source(fetcher: &SafeFetcher, url: &str) -> Result<Detection> {
    let page = fetcher.fetch(url).await?;

    if looks_like_feed(&page) {
        let name = feed_title(&page.body).unwrap_or_else(|| host_name(&page.url));
        return Ok(Detection {
            kind: SourceKind::Feed,
            url: page.url.to_string(),
            name,
        });
    }

    // Page with an advertised feed: prefer monitoring the feed itself.
    for candidate in advertised_feeds(&page.body, &page.url) {
        match fetcher.fetch(candidate.as_str()).await {
            Ok(feed_page) if looks_like_feed(&feed_page) => {
                info!(
                    target: TARGET_WEB_REQUEST,
                    "Discovered feed {} advertised by {}", candidate, url
                );
                let name = feed_title(&feed_page.body)
                    .or_else(|| page_title(&page.body))
                    .unwrap_or_else(|| host_name(&page.url));
                return Ok(Detection {
                    kind: SourceKind::Feed,
                    url: feed_page.url.to_string(),
                    name,
                });
            }
            Ok(_) => {
                debug!(target: TARGET_WEB_REQUEST, "Advertised feed {} is not a feed", candidate);
            }
            Err(err) => {
                debug!(
                    target: TARGET_WEB_REQUEST,
                    "Advertised feed {} unreachable ({}), staying with the page", candidate, err
                );
            }
        }
    }

    let name = page_title(&page.body).unwrap_or_else(|| host_name(&page.url));
    Ok(Detection {
        kind: SourceKind::Page,
        url: page.url.to_string(),
        name,
    })
}

/// Feed iff the content type says so or the body carries feed markers.
fn looks_like_feed(page: &FetchedPage) -> bool {
    if let Some(content_type) = &page.content_type {
        let lowered = content_type.to_lowercase();
        if lowered.contains("rss") || lowered.contains("atom") || lowered.contains("xml") {
            return true;
        }
    }
    has_feed_markers(&page.body)
}

fn has_feed_markers(body: &str) -> bool {
    let trimmed = body.trim_start_matches('\u{feff}').trim_start();
    trimmed.starts_with("<?xml")
        || trimmed.contains("<rss")
        || trimmed.contains("<feed")
        || trimmed.contains("<channel>")
        || trimmed.contains("<entry>")
}

/// Feed URLs the page's markup advertises, most explicit first.
fn advertised_feeds(body: &str, base: &Url) -> Vec<Url> {
    let document = Html::parse_document(body);
    let mut candidates = Vec::new();

    for link in document.select(&FEED_LINK_SEL) {
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        let type_attr = link.value().attr("type").unwrap_or("").to_lowercase();
        if type_attr.contains("rss") || type_attr.contains("atom") || type_attr.contains("xml") {
            if let Ok(resolved) = base.join(href) {
                candidates.push(resolved);
            }
        }
    }

    for anchor in document.select(&ANCHOR_SEL) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let text = anchor.text().collect::<String>().to_lowercase();
        let href_lower = href.to_lowercase();
        let mentions_feed = ["rss", "feed", "atom"]
            .iter()
            .any(|needle| href_lower.contains(needle) || text.contains(needle));
        if mentions_feed {
            if let Ok(resolved) = base.join(href) {
                candidates.push(resolved);
            }
        }
    }

    candidates.dedup_by(|a, b| a.as_str() == b.as_str());
    candidates.truncate(MAX_FEED_CANDIDATES);
    candidates
}

fn feed_title(body: &str) -> Option<String> {
    let feed = parser::parse(Cursor::new(body.as_bytes())).ok()?;
    feed.title
        .map(|t| t.content.trim().to_string())
        .filter(|t| !t.is_empty())
}

fn page_title(body: &str) -> Option<String> {
    let document = Html::parse_document(body);
    document
        .select(&TITLE_SEL)
        .next()
        .map(|title| title.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Hostname with a leading `www.` stripped, the last-resort display name.
fn host_name(url: &Url) -> String {
    url.host_str()
        .map(|host| host.trim_start_matches("www.").to_string())
        .unwrap_or_else(|| url.to_string())
}
