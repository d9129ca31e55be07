//! Heuristic article extraction from arbitrary HTML pages.
//!
//! Best-effort by design: an ordered list of container strategies is scanned
//! and the first selector that matches anything on the page wins. Later
//! strategies are never merged in. Site-specific overrides can be layered
//! ahead of the defaults without touching the scan loop.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use url::Url;

use super::{
    collapse_whitespace, parse_date, truncate_chars, CandidateArticle, EXCERPT_MAX_CHARS,
    MAX_PAGE_ARTICLES,
};

/// Container strategies, most specific first: semantic article containers,
/// class-name heuristics, then generic listing classes.
const CONTAINER_STRATEGIES: &[&str] = &[
    "article",
    "[class*='post']",
    "[class*='article']",
    "[class*='news-item']",
    "[class*='story']",
    "[class*='card']",
    "[class*='entry']",
    "[class*='item']",
];

/// Link path segments that mark listing/taxonomy pages rather than articles.
const LISTING_SEGMENTS: &[&str] = &[
    "tag",
    "tags",
    "category",
    "categories",
    "author",
    "authors",
    "page",
    "pagination",
];

const ASSET_EXTENSIONS: &[&str] = &[
    ".jpg", ".jpeg", ".png", ".gif", ".webp", ".svg", ".ico", ".pdf", ".zip", ".doc", ".docx",
    ".xls", ".xlsx", ".mp3", ".mp4",
];

/// Elements whose text is navigation chrome, stripped before the scan.
static CHROME_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
    ["script", "style", "nav", "footer", "header", "aside"]
        .iter()
        .map(|tag| Regex::new(&format!(r"(?is)<{tag}\b[^>]*>.*?</{tag}\s*>")).expect("valid regex"))
        .collect()
});

static ANCHOR_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").expect("valid selector"));
static HEADING_SEL: Lazy<Selector> =
    Lazy::new(|| Selector::parse("h1, h2, h3, h4, h5, h6").expect("valid selector"));
static PARAGRAPH_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("p").expect("valid selector"));
static TIME_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("time").expect("valid selector"));

pub struct HtmlExtractor {
    selectors: Vec<Selector>,
}

impl Default for HtmlExtractor {
    fn default() -> Self {
        Self {
            selectors: CONTAINER_STRATEGIES
                .iter()
                .filter_map(|raw| Selector::parse(raw).ok())
                .collect(),
        }
    }
}

impl HtmlExtractor {
    /// Layer a site-specific container selector ahead of the default list.
    pub fn with_priority_selector(mut self, selector: &str) -> Self {
        if let Ok(parsed) = Selector::parse(selector) {
            self.selectors.insert(0, parsed);
        }
        self
    }

    /// Extract up to [`MAX_PAGE_ARTICLES`] candidate articles in document
    /// order, a proxy for recency rather than a guarantee of it.
    pub fn extract(&self, body: &str, page_url: &Url) -> Vec<CandidateArticle> {
        let cleaned = strip_chrome(body);
        let document = Html::parse_document(&cleaned);

        // First matching strategy wins; selectors are not merged.
        let containers: Vec<ElementRef> = self
            .selectors
            .iter()
            .find_map(|selector| {
                let matches: Vec<ElementRef> = document.select(selector).collect();
                if matches.is_empty() {
                    None
                } else {
                    Some(matches)
                }
            })
            .unwrap_or_default();

        let mut seen_urls: HashSet<String> = HashSet::new();
        let mut articles = Vec::new();

        for container in containers {
            if articles.len() >= MAX_PAGE_ARTICLES {
                break;
            }

            let Some(anchor) = container.select(&ANCHOR_SEL).next() else {
                continue;
            };
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            let Ok(mut resolved) = page_url.join(href) else {
                continue;
            };
            resolved.set_fragment(None);

            if !seen_urls.insert(resolved.to_string()) {
                continue;
            }
            if is_same_page(&resolved, page_url) {
                continue;
            }
            if is_asset_url(&resolved) {
                continue;
            }
            if has_listing_segment(&resolved) {
                continue;
            }

            let title = container
                .select(&HEADING_SEL)
                .next()
                .map(element_text)
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| element_text(anchor));
            // Short titles are navigation chrome, not headlines.
            if title.chars().count() < 10 {
                continue;
            }

            let excerpt = container
                .select(&PARAGRAPH_SEL)
                .next()
                .map(element_text)
                .filter(|p| !p.is_empty())
                .map(|p| truncate_chars(&p, EXCERPT_MAX_CHARS));

            let published_at = container.select(&TIME_SEL).next().and_then(|time| {
                time.value()
                    .attr("datetime")
                    .and_then(parse_date)
                    .or_else(|| parse_date(&element_text(time)))
            });

            articles.push(CandidateArticle {
                title,
                url: resolved.to_string(),
                published_at,
                excerpt,
            });
        }

        articles
    }
}

fn element_text(element: ElementRef) -> String {
    collapse_whitespace(&element.text().collect::<Vec<_>>().join(" "))
}

fn strip_chrome(body: &str) -> String {
    let mut cleaned = body.to_string();
    for re in CHROME_RES.iter() {
        cleaned = re.replace_all(&cleaned, " ").into_owned();
    }
    cleaned
}

fn is_same_page(candidate: &Url, page: &Url) -> bool {
    let mut page = page.clone();
    page.set_fragment(None);
    candidate.as_str().trim_end_matches('/') == page.as_str().trim_end_matches('/')
}

fn is_asset_url(url: &Url) -> bool {
    let path = url.path().to_lowercase();
    ASSET_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

fn has_listing_segment(url: &Url) -> bool {
    url.path()
        .split('/')
        .any(|segment| LISTING_SEGMENTS.contains(&segment.to_lowercase().as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    fn extract(body: &str) -> Vec<CandidateArticle> {
        let base = Url::parse("https://news.example.com/latest").unwrap();
        HtmlExtractor::default().extract(body, &base)
    }

    #[test]
    fn extracts_articles_from_semantic_containers() {
        let body = r#"<html><body>
            <article>
              <h2>City opens new wildlife refuge</h2>
              <a href="/stories/refuge">Read more</a>
              <p>The refuge protects  coastal   habitat.</p>
              <time datetime="2026-02-10T08:00:00Z">Feb 10</time>
            </article>
        </body></html>"#;

        let articles = extract(body);
        assert_eq!(articles.len(), 1);
        let article = &articles[0];
        assert_eq!(article.title, "City opens new wildlife refuge");
        assert_eq!(article.url, "https://news.example.com/stories/refuge");
        assert_eq!(
            article.excerpt.as_deref(),
            Some("The refuge protects coastal habitat.")
        );
        assert_eq!(article.published_at.unwrap().year(), 2026);
    }

    #[test]
    fn duplicate_resolved_urls_yield_one_article() {
        let body = r#"<html><body>
            <article><h2>Duplicate headline story</h2><a href="/stories/one">x</a></article>
            <article><h2>Duplicate headline story</h2><a href="/stories/one#comments">x</a></article>
        </body></html>"#;
        let articles = extract(body);
        assert_eq!(articles.len(), 1);
    }

    #[test]
    fn first_matching_strategy_wins() {
        // Both <article> elements and .post divs exist; only <article> is used.
        let body = r#"<html><body>
            <article><h2>Semantic container item</h2><a href="/stories/semantic">x</a></article>
            <div class="post"><h2>Class heuristic item here</h2><a href="/stories/class">x</a></div>
        </body></html>"#;
        let articles = extract(body);
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].url, "https://news.example.com/stories/semantic");
    }

    #[test]
    fn skips_chrome_listing_assets_and_self_links() {
        let body = r#"<html><body>
            <article><h2>Tag page link ignored</h2><a href="/tag/turtles">x</a></article>
            <article><h2>Category link ignored too</h2><a href="/category/news/item">x</a></article>
            <article><h2>Image link is ignored</h2><a href="/photos/shot.jpg">x</a></article>
            <article><h2>Self link is ignored</h2><a href="/latest">x</a></article>
            <article><h2>This one is kept fine</h2><a href="/stories/kept">x</a></article>
        </body></html>"#;
        let articles = extract(body);
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].url, "https://news.example.com/stories/kept");
    }

    #[test]
    fn short_titles_are_rejected() {
        let body = r#"<html><body>
            <article><h2>Next</h2><a href="/stories/nav-chrome">x</a></article>
        </body></html>"#;
        assert!(extract(body).is_empty());
    }

    #[test]
    fn title_falls_back_to_anchor_text() {
        let body = r#"<html><body>
            <article><a href="/stories/anchor-title">Anchor text becomes the title</a></article>
        </body></html>"#;
        let articles = extract(body);
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].title, "Anchor text becomes the title");
    }

    #[test]
    fn stripped_nav_cannot_produce_articles() {
        let body = r#"<html><body>
            <nav><article><h2>Navigation pseudo article</h2><a href="/stories/nav">x</a></article></nav>
            <article><h2>Real article body here</h2><a href="/stories/real">x</a></article>
        </body></html>"#;
        let articles = extract(body);
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].url, "https://news.example.com/stories/real");
    }

    #[test]
    fn caps_at_twenty_articles_in_document_order() {
        let mut items = String::new();
        for i in 0..30 {
            items.push_str(&format!(
                "<article><h2>Numbered headline number {i}</h2><a href=\"/stories/{i}\">x</a></article>"
            ));
        }
        let body = format!("<html><body>{items}</body></html>");
        let articles = extract(&body);
        assert_eq!(articles.len(), MAX_PAGE_ARTICLES);
        assert_eq!(articles[0].url, "https://news.example.com/stories/0");
        assert_eq!(articles[19].url, "https://news.example.com/stories/19");
    }

    #[test]
    fn visible_time_text_is_parsed_when_datetime_missing() {
        let body = r#"<html><body>
            <article><h2>Dated by visible text</h2><a href="/stories/dated">x</a>
            <time>March 1, 2026</time></article>
        </body></html>"#;
        let articles = extract(body);
        assert_eq!(articles[0].published_at.unwrap().month(), 3);
    }

    #[test]
    fn priority_selector_layers_ahead_of_defaults() {
        let body = r#"<html><body>
            <article><h2>Default container match</h2><a href="/stories/default">x</a></article>
            <div class="site-special"><h2>Override container match</h2><a href="/stories/override">x</a></div>
        </body></html>"#;
        let base = Url::parse("https://news.example.com/latest").unwrap();
        let articles = HtmlExtractor::default()
            .with_priority_selector(".site-special")
            .extract(body, &base);
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].url, "https://news.example.com/stories/override");
    }
}
