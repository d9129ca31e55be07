use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info};
use url::Url;
use urlnorm::UrlNormalizer;

use super::core::{Database, DbLockErrorExt};
use super::source::Source;
use crate::parse::CandidateArticle;
use crate::relevance::RelevanceTag;
use crate::TARGET_DB;

/// An ingested article as stored.
#[derive(Debug, Clone, Serialize)]
pub struct Article {
    pub id: i64,
    pub source_id: i64,
    pub source_name: String,
    pub title: String,
    pub url: String,
    pub normalized_url: String,
    pub published_at: Option<DateTime<Utc>>,
    pub fetched_at: DateTime<Utc>,
    pub excerpt: Option<String>,
    pub matched_keywords: Vec<String>,
    pub relevance_score: i64,
    pub promoted: bool,
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, sqlx::Error> {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

fn article_from_row(row: &SqliteRow) -> Result<Article, sqlx::Error> {
    let published_at: Option<String> = row.get("published_at");
    let fetched_at: String = row.get("fetched_at");
    let matched_keywords: String = row.get("matched_keywords");

    Ok(Article {
        id: row.get("id"),
        source_id: row.get("source_id"),
        source_name: row.get("source_name"),
        title: row.get("title"),
        url: row.get("url"),
        normalized_url: row.get("normalized_url"),
        published_at: published_at.as_deref().map(parse_timestamp).transpose()?,
        fetched_at: parse_timestamp(&fetched_at)?,
        excerpt: row.get("excerpt"),
        matched_keywords: serde_json::from_str(&matched_keywords)
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
        relevance_score: row.get("relevance_score"),
        promoted: row.get("promoted"),
    })
}

fn normalize(url: &str) -> Result<String, sqlx::Error> {
    let parsed = Url::parse(url).map_err(|e| {
        error!(target: TARGET_DB, "Attempted to ingest an invalid URL ({}): {}", url, e);
        sqlx::Error::Protocol("Invalid URL provided".into())
    })?;
    Ok(UrlNormalizer::default().compute_normalization_string(&parsed))
}

impl Database {
    /// Ingest a candidate article, deduplicating by canonical URL.
    ///
    /// Returns the stored record and whether this call created it. An already
    /// seen URL comes back untouched: no field, including the relevance tag,
    /// is updated. The UNIQUE constraint on `normalized_url` is the
    /// authoritative backstop; a conflict on insert is treated the same as
    /// the fast-path existence hit.
    pub async fn add_article(
        &self,
        source: &Source,
        candidate: &CandidateArticle,
        tag: &RelevanceTag,
    ) -> Result<(Article, bool), sqlx::Error> {
        let normalized_url = normalize(&candidate.url)?;

        // Fast path: known URL, return as-is.
        if let Some(existing) = self.article_by_normalized(&normalized_url).await? {
            debug!(target: TARGET_DB, "Article already ingested: {}", candidate.url);
            return Ok((existing, false));
        }

        let matched_keywords =
            serde_json::to_string(&tag.matched).unwrap_or_else(|_| "[]".to_string());
        let fetched_at = Utc::now();

        let mut backoff = 100; // initial delay in milliseconds
        let max_retries = 5;

        for attempt in 1..=max_retries {
            let inserted = sqlx::query_as::<_, (i64,)>(
                r#"
                INSERT INTO articles (source_id, source_name, title, url, normalized_url,
                                      published_at, fetched_at, excerpt, matched_keywords,
                                      relevance_score, promoted)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, FALSE)
                ON CONFLICT(normalized_url) DO NOTHING
                RETURNING id
                "#,
            )
            .bind(source.id)
            .bind(&source.name)
            .bind(&candidate.title)
            .bind(&candidate.url)
            .bind(&normalized_url)
            .bind(candidate.published_at.map(|d| d.to_rfc3339()))
            .bind(fetched_at.to_rfc3339())
            .bind(&candidate.excerpt)
            .bind(&matched_keywords)
            .bind(tag.score)
            .fetch_optional(self.pool())
            .await;

            match inserted {
                Ok(Some((id,))) => {
                    info!(target: TARGET_DB, "Article ingested: {} with id {}", candidate.url, id);
                    return Ok((
                        Article {
                            id,
                            source_id: source.id,
                            source_name: source.name.clone(),
                            title: candidate.title.clone(),
                            url: candidate.url.clone(),
                            normalized_url,
                            published_at: candidate.published_at,
                            fetched_at,
                            excerpt: candidate.excerpt.clone(),
                            matched_keywords: tag.matched.clone(),
                            relevance_score: tag.score,
                            promoted: false,
                        },
                        true,
                    ));
                }
                // Conflict: someone else inserted it between our check and now.
                Ok(None) => {
                    let existing = self
                        .article_by_normalized(&normalized_url)
                        .await?
                        .ok_or_else(|| {
                            sqlx::Error::Protocol("Conflicting article row vanished".into())
                        })?;
                    return Ok((existing, false));
                }
                Err(err) => {
                    if err.is_database_lock_error() {
                        info!(target: TARGET_DB, "Database is locked, waiting {}ms before retrying attempt {}/{}: {}", backoff, attempt, max_retries, candidate.url);
                        sleep(Duration::from_millis(backoff)).await;
                        backoff = backoff.saturating_mul(2); // exponential backoff
                        if attempt == max_retries {
                            // Introduce some randomness to avoid the "thundering herd problem"
                            let random_jitter = rand::rng().random_range(0..200);
                            backoff += random_jitter;
                            sleep(Duration::from_millis(backoff)).await;
                        }
                    } else {
                        error!(target: TARGET_DB, "Failed to ingest article: {}", err);
                        return Err(err);
                    }
                }
            }
        }

        Err(sqlx::Error::Protocol(
            "Maximum retries exceeded for ingesting article".into(),
        ))
    }

    /// Look an article up by any URL that canonicalizes to it.
    pub async fn article_by_url(&self, url: &str) -> Result<Option<Article>, sqlx::Error> {
        let normalized_url = normalize(url)?;
        self.article_by_normalized(&normalized_url).await
    }

    async fn article_by_normalized(
        &self,
        normalized_url: &str,
    ) -> Result<Option<Article>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM articles WHERE normalized_url = ?1")
            .bind(normalized_url)
            .fetch_optional(self.pool())
            .await?;
        row.as_ref().map(article_from_row).transpose()
    }

    pub async fn mark_promoted(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE articles SET promoted = TRUE WHERE id = ?1")
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_articles_by_source(&self, source_id: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM articles WHERE source_id = ?1")
            .bind(source_id)
            .execute(self.pool())
            .await?;
        debug!(target: TARGET_DB, "Deleted {} articles for source {}", result.rows_affected(), source_id);
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::temp_database;
    use crate::db::SourceKind;

    async fn seeded_source(db: &Database) -> Source {
        let id = db
            .insert_source("Example News", "https://example.com/feed.xml", SourceKind::Feed, 24)
            .await
            .unwrap();
        db.get_source(id).await.unwrap().unwrap()
    }

    fn candidate(url: &str) -> CandidateArticle {
        CandidateArticle {
            title: "New sea turtles nesting site".to_string(),
            url: url.to_string(),
            published_at: None,
            excerpt: Some("A new nesting site was found.".to_string()),
        }
    }

    fn tag() -> RelevanceTag {
        RelevanceTag {
            matched: vec!["sea turtles".to_string()],
            score: 25,
        }
    }

    #[tokio::test]
    async fn ingestion_is_idempotent() {
        let db = temp_database().await;
        let source = seeded_source(&db).await;

        let (first, was_new) = db
            .add_article(&source, &candidate("https://example.com/turtles"), &tag())
            .await
            .unwrap();
        assert!(was_new);
        assert_eq!(first.relevance_score, 25);
        assert_eq!(first.matched_keywords, vec!["sea turtles"]);
        assert!(!first.promoted);

        let (second, was_new) = db
            .add_article(&source, &candidate("https://example.com/turtles"), &tag())
            .await
            .unwrap();
        assert!(!was_new);
        assert_eq!(second.id, first.id);
    }

    #[tokio::test]
    async fn reingestion_never_touches_existing_fields() {
        let db = temp_database().await;
        let source = seeded_source(&db).await;

        let (article, _) = db
            .add_article(&source, &candidate("https://example.com/turtles"), &tag())
            .await
            .unwrap();
        assert!(db.mark_promoted(article.id).await.unwrap());

        let richer_tag = RelevanceTag {
            matched: vec!["sea turtles".to_string(), "habitat".to_string()],
            score: 40,
        };
        let (unchanged, was_new) = db
            .add_article(&source, &candidate("https://example.com/turtles"), &richer_tag)
            .await
            .unwrap();
        assert!(!was_new);
        assert!(unchanged.promoted);
        assert_eq!(unchanged.relevance_score, 25);
    }

    #[tokio::test]
    async fn lookup_by_equivalent_url() {
        let db = temp_database().await;
        let source = seeded_source(&db).await;

        db.add_article(&source, &candidate("https://example.com/turtles"), &tag())
            .await
            .unwrap();

        // Tracking parameters normalize away.
        let found = db
            .article_by_url("https://example.com/turtles?utm_source=newsletter")
            .await
            .unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn delete_by_source_clears_articles() {
        let db = temp_database().await;
        let source = seeded_source(&db).await;

        db.add_article(&source, &candidate("https://example.com/a"), &tag())
            .await
            .unwrap();
        db.add_article(&source, &candidate("https://example.com/b"), &tag())
            .await
            .unwrap();

        assert_eq!(db.delete_articles_by_source(source.id).await.unwrap(), 2);
        assert!(db
            .article_by_url("https://example.com/a")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn invalid_url_is_rejected() {
        let db = temp_database().await;
        let source = seeded_source(&db).await;
        let err = db
            .add_article(&source, &candidate("not a url"), &tag())
            .await
            .unwrap_err();
        assert!(matches!(err, sqlx::Error::Protocol(_)));
    }
}
