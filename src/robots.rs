//! Robots-exclusion compliance gate.
//!
//! Rules are fetched per origin, cached for an hour, and consulted before
//! every content fetch. An unreachable or failing robots.txt leaves the
//! origin fully permissive, the standard crawling convention. The cache is an
//! explicit object owned by whatever composes a sweep, never a hidden
//! singleton, so tests can construct short-TTL instances.

use dashmap::DashMap;
use std::time::{Duration, Instant};
use texting_robots::Robot;
use tracing::{debug, warn};
use url::Url;

use crate::error::{IngestError, Result};
use crate::fetch::SafeFetcher;
use crate::TARGET_WEB_REQUEST;

pub const ROBOTS_FETCH_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_ROBOTS_TTL: Duration = Duration::from_secs(3600);

/// Outcome of a robots check. When `allowed` is false the caller must skip
/// the fetch; when `crawl_delay` is present the caller must sleep that long
/// immediately before fetching.
#[derive(Debug, Clone)]
pub struct RobotsVerdict {
    pub allowed: bool,
    pub crawl_delay: Option<Duration>,
    pub reason: Option<String>,
}

impl RobotsVerdict {
    fn permissive() -> Self {
        Self {
            allowed: true,
            crawl_delay: None,
            reason: None,
        }
    }
}

struct CacheEntry {
    /// `None` marks a permissive origin (robots.txt unreachable or non-2xx).
    rules: Option<String>,
    fetched_at: Instant,
}

/// Process-wide cache of per-origin robots.txt rule sets.
///
/// Entries are idempotent to recompute, so population races between
/// concurrent sweeps are benign.
pub struct RobotsCache {
    ttl: Duration,
    entries: DashMap<String, CacheEntry>,
}

impl Default for RobotsCache {
    fn default() -> Self {
        Self::new()
    }
}

impl RobotsCache {
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_ROBOTS_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: DashMap::new(),
        }
    }

    /// Authorize a fetch of `url` on behalf of `agent`.
    pub async fn check(
        &self,
        fetcher: &SafeFetcher,
        url: &str,
        agent: &str,
    ) -> Result<RobotsVerdict> {
        let parsed = Url::parse(url)
            .map_err(|e| IngestError::InvalidInput(format!("malformed URL {url:?}: {e}")))?;
        let origin = origin_of(&parsed)?;

        let Some(rules) = self.rules_for(fetcher, &origin).await else {
            return Ok(RobotsVerdict::permissive());
        };

        let robot = match Robot::new(agent, rules.as_bytes()) {
            Ok(robot) => robot,
            Err(err) => {
                // Unparseable rules fall back to permissive, same as absent.
                warn!(target: TARGET_WEB_REQUEST, "unparseable robots.txt for {}: {}", origin, err);
                return Ok(RobotsVerdict::permissive());
            }
        };

        if robot.allowed(url) {
            // The delay comes off the wire as a raw float; out-of-range
            // values (overflow, NaN, negative) are dropped rather than
            // trusted.
            let crawl_delay = robot
                .delay
                .and_then(|secs| Duration::try_from_secs_f32(secs).ok());
            Ok(RobotsVerdict {
                allowed: true,
                crawl_delay,
                reason: None,
            })
        } else {
            Ok(RobotsVerdict {
                allowed: false,
                crawl_delay: None,
                reason: Some(format!(
                    "{origin}/robots.txt disallows this path for {agent}"
                )),
            })
        }
    }

    /// Cached rules for an origin, fetching on miss or expiry.
    async fn rules_for(&self, fetcher: &SafeFetcher, origin: &str) -> Option<String> {
        if let Some(entry) = self.entries.get(origin) {
            if entry.fetched_at.elapsed() < self.ttl {
                debug!(target: TARGET_WEB_REQUEST, "robots cache hit for {}", origin);
                return entry.rules.clone();
            }
        }

        let robots_url = format!("{origin}/robots.txt");
        let rules = match fetcher
            .fetch_with_timeout(&robots_url, ROBOTS_FETCH_TIMEOUT)
            .await
        {
            Ok(page) => Some(page.body),
            Err(err) => {
                debug!(
                    target: TARGET_WEB_REQUEST,
                    "robots.txt unavailable for {} ({}), treating origin as permissive", origin, err
                );
                None
            }
        };

        self.entries.insert(
            origin.to_string(),
            CacheEntry {
                rules: rules.clone(),
                fetched_at: Instant::now(),
            },
        );
        rules
    }
}

fn origin_of(url: &Url) -> Result<String> {
    let host = url
        .host_str()
        .ok_or_else(|| IngestError::InvalidInput(format!("URL {url} has no host")))?;
    match url.port() {
        Some(port) => Ok(format!("{}://{}:{}", url.scheme(), host, port)),
        None => Ok(format!("{}://{}", url.scheme(), host)),
    }
}
