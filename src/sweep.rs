//! Sweep orchestration: walk the due sources, fetch, parse, tag, ingest.
//!
//! Sources are processed strictly sequentially, one article at a time, so
//! crawl-delay directives stay meaningful. A failure in one source is
//! recorded in its outcome and never aborts the rest of the sweep.

use chrono::Utc;
use serde::Serialize;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::db::{Database, Source, SourceKind};
use crate::detect::detect_source;
use crate::error::{IngestError, Result};
use crate::fetch::SafeFetcher;
use crate::parse::{feed::parse_feed, html::HtmlExtractor, CandidateArticle};
use crate::relevance::{tag_relevance, KeywordProfile};
use crate::robots::RobotsCache;
use crate::scheduler::select_due;
use crate::TARGET_SWEEP;

/// Robots user-agent token the pipeline honors rules for.
pub const ROBOTS_AGENT: &str = "ScoutBot";

/// Upper bound on honoring a crawl-delay directive.
const MAX_CRAWL_DELAY: Duration = Duration::from_secs(60);

/// Widest accepted fetch interval, one year.
pub const MAX_FETCH_INTERVAL_HOURS: i64 = 24 * 365;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SweepTrigger {
    /// Only sources whose interval has elapsed.
    Scheduled,
    /// One specific source, bypassing the due filter.
    Manual { source_id: i64 },
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceOutcome {
    pub source_id: i64,
    pub source_name: String,
    pub new_articles: usize,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SweepResult {
    pub trigger: SweepTrigger,
    pub sources_processed: usize,
    pub total_new_articles: usize,
    pub total_errors: usize,
    pub per_source: Vec<SourceOutcome>,
}

/// Everything a sweep needs, wired together by the caller. No globals.
pub struct Sweeper {
    db: Database,
    fetcher: SafeFetcher,
    robots: RobotsCache,
    profile: KeywordProfile,
    extractor: HtmlExtractor,
}

impl Sweeper {
    pub fn new(
        db: Database,
        fetcher: SafeFetcher,
        robots: RobotsCache,
        profile: KeywordProfile,
    ) -> Self {
        Self {
            db,
            fetcher,
            robots,
            profile,
            extractor: HtmlExtractor::default(),
        }
    }

    /// Run one sweep. Always returns a result; per-source failures are
    /// captured in the outcomes rather than propagated.
    pub async fn run_sweep(&self, trigger: SweepTrigger) -> Result<SweepResult> {
        let sources: Vec<Source> = match trigger {
            SweepTrigger::Scheduled => {
                let all = self.db.list_sources().await?;
                let now = Utc::now();
                select_due(&all, now).into_iter().cloned().collect()
            }
            SweepTrigger::Manual { source_id } => {
                let source = self.db.get_source(source_id).await?.ok_or_else(|| {
                    IngestError::InvalidInput(format!("no source with id {source_id}"))
                })?;
                vec![source]
            }
        };

        info!(target: TARGET_SWEEP, "Sweep started: {} source(s) to process", sources.len());

        let mut per_source = Vec::with_capacity(sources.len());
        for source in &sources {
            let outcome = self.process_source(source).await;
            info!(
                target: TARGET_SWEEP,
                "Source {} ({}): {} new article(s), {} error(s)",
                source.id, source.name, outcome.new_articles, outcome.errors.len()
            );
            per_source.push(outcome);
        }

        let result = SweepResult {
            trigger,
            sources_processed: per_source.len(),
            total_new_articles: per_source.iter().map(|o| o.new_articles).sum(),
            total_errors: per_source.iter().map(|o| o.errors.len()).sum(),
            per_source,
        };
        info!(
            target: TARGET_SWEEP,
            "Sweep finished: {} source(s), {} new article(s), {} error(s)",
            result.sources_processed, result.total_new_articles, result.total_errors
        );
        Ok(result)
    }

    /// Process one source end to end. The poll timestamp is stamped to now
    /// whether the attempt succeeded or not, so a broken source cannot wedge
    /// the schedule into hot-looping on it.
    async fn process_source(&self, source: &Source) -> SourceOutcome {
        let mut outcome = SourceOutcome {
            source_id: source.id,
            source_name: source.name.clone(),
            new_articles: 0,
            errors: Vec::new(),
        };

        match self.gather(source).await {
            Ok(candidates) => {
                for candidate in candidates {
                    match self.ingest(source, &candidate).await {
                        Ok(was_new) => {
                            if was_new {
                                outcome.new_articles += 1;
                            }
                        }
                        Err(err) => {
                            error!(target: TARGET_SWEEP, "Failed to ingest {}: {}", candidate.url, err);
                            outcome.errors.push(format!("{}: {err}", candidate.url));
                        }
                    }
                }
            }
            Err(err) => {
                warn!(target: TARGET_SWEEP, "Source {} ({}) failed: {}", source.id, source.name, err);
                outcome.errors.push(err.to_string());
            }
        }

        if let Err(err) = self.db.update_last_fetched(source.id, Utc::now()).await {
            error!(target: TARGET_SWEEP, "Failed to stamp source {}: {}", source.id, err);
            outcome.errors.push(format!("poll stamp: {err}"));
        }

        outcome
    }

    /// Robots gate, optional crawl-delay, fetch, parse per stored kind.
    async fn gather(&self, source: &Source) -> Result<Vec<CandidateArticle>> {
        let verdict = self
            .robots
            .check(&self.fetcher, &source.url, ROBOTS_AGENT)
            .await?;
        if !verdict.allowed {
            return Err(IngestError::RobotsDisallowed(
                verdict
                    .reason
                    .unwrap_or_else(|| "disallowed by robots.txt".to_string()),
            ));
        }
        if let Some(delay) = verdict.crawl_delay {
            tokio::time::sleep(delay.min(MAX_CRAWL_DELAY)).await;
        }

        let page = self.fetcher.fetch(&source.url).await?;
        match source.kind {
            SourceKind::Feed => parse_feed(&page.body),
            SourceKind::Page => Ok(self.extractor.extract(&page.body, &page.url)),
        }
    }

    async fn ingest(&self, source: &Source, candidate: &CandidateArticle) -> Result<bool> {
        let tag = tag_relevance(
            &self.profile,
            &candidate.title,
            candidate.excerpt.as_deref().unwrap_or(""),
        );
        let (_, was_new) = self.db.add_article(source, candidate, &tag).await?;
        Ok(was_new)
    }

    /// Register a new monitored source: vet and classify the URL, then store
    /// the detected kind and display name.
    pub async fn create_source(&self, url: &str, fetch_interval_hours: i64) -> Result<Source> {
        if !(1..=MAX_FETCH_INTERVAL_HOURS).contains(&fetch_interval_hours) {
            return Err(IngestError::InvalidInput(format!(
                "fetch interval must be between 1 and {MAX_FETCH_INTERVAL_HOURS} hours"
            )));
        }

        let detection = detect_source(&self.fetcher, url).await?;
        let id = match self
            .db
            .insert_source(
                &detection.name,
                &detection.url,
                detection.kind,
                fetch_interval_hours,
            )
            .await
        {
            Ok(id) => id,
            Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
                return Err(IngestError::InvalidInput(format!(
                    "source {} is already monitored",
                    detection.url
                )));
            }
            Err(err) => return Err(err.into()),
        };

        let source = self.db.get_source(id).await?.ok_or_else(|| {
            IngestError::Database(sqlx::Error::Protocol(
                "freshly created source vanished".into(),
            ))
        })?;
        info!(
            target: TARGET_SWEEP,
            "Now monitoring {} ({}) as {} every {}h",
            source.name, source.url, source.kind, source.fetch_interval_hours
        );
        Ok(source)
    }
}
