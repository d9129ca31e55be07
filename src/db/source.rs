use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

use super::core::Database;
use crate::TARGET_DB;

/// How a monitored source is fetched and parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Feed,
    Page,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Feed => "feed",
            SourceKind::Page => "page",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "feed" => Ok(SourceKind::Feed),
            "page" => Ok(SourceKind::Page),
            other => Err(format!("unknown source kind {other:?}")),
        }
    }
}

/// A monitored source: one feed or listing page polled on an interval.
#[derive(Debug, Clone, Serialize)]
pub struct Source {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub kind: SourceKind,
    pub enabled: bool,
    pub last_fetched_at: Option<DateTime<Utc>>,
    pub fetch_interval_hours: i64,
    pub created_at: DateTime<Utc>,
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, sqlx::Error> {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

pub(super) fn source_from_row(row: &SqliteRow) -> Result<Source, sqlx::Error> {
    let kind: String = row.get("kind");
    let kind = kind
        .parse::<SourceKind>()
        .map_err(|e| sqlx::Error::Decode(e.into()))?;
    let last_fetched_at: Option<String> = row.get("last_fetched_at");
    let created_at: String = row.get("created_at");

    Ok(Source {
        id: row.get("id"),
        name: row.get("name"),
        url: row.get("url"),
        kind,
        enabled: row.get("enabled"),
        last_fetched_at: last_fetched_at.as_deref().map(parse_timestamp).transpose()?,
        fetch_interval_hours: row.get("fetch_interval_hours"),
        created_at: parse_timestamp(&created_at)?,
    })
}

impl Database {
    /// Insert a new monitored source. A duplicate URL surfaces as the UNIQUE
    /// constraint violation, which callers map to their own error.
    pub async fn insert_source(
        &self,
        name: &str,
        url: &str,
        kind: SourceKind,
        fetch_interval_hours: i64,
    ) -> Result<i64, sqlx::Error> {
        debug!(target: TARGET_DB, "Adding source: {} ({})", url, kind);

        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO sources (name, url, kind, enabled, fetch_interval_hours, created_at)
            VALUES (?1, ?2, ?3, TRUE, ?4, ?5)
            RETURNING id
            "#,
        )
        .bind(name)
        .bind(url)
        .bind(kind.as_str())
        .bind(fetch_interval_hours)
        .bind(Utc::now().to_rfc3339())
        .fetch_one(self.pool())
        .await?;

        info!(target: TARGET_DB, "Source added: {} with id {}", url, id);
        Ok(id)
    }

    pub async fn list_sources(&self) -> Result<Vec<Source>, sqlx::Error> {
        let rows = sqlx::query("SELECT * FROM sources ORDER BY id")
            .fetch_all(self.pool())
            .await?;
        rows.iter().map(source_from_row).collect()
    }

    pub async fn get_source(&self, id: i64) -> Result<Option<Source>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM sources WHERE id = ?1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        row.as_ref().map(source_from_row).transpose()
    }

    /// Stamp the poll timestamp. Called after every attempt, success or not.
    pub async fn update_last_fetched(
        &self,
        id: i64,
        at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE sources SET last_fetched_at = ?1 WHERE id = ?2")
            .bind(at.to_rfc3339())
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    pub async fn set_source_enabled(&self, id: i64, enabled: bool) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE sources SET enabled = ?1 WHERE id = ?2")
            .bind(enabled)
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Remove a source and everything ingested from it.
    pub async fn delete_source(&self, id: i64) -> Result<bool, sqlx::Error> {
        let removed = self.delete_articles_by_source(id).await?;
        let result = sqlx::query("DELETE FROM sources WHERE id = ?1")
            .bind(id)
            .execute(self.pool())
            .await?;
        info!(target: TARGET_DB, "Deleted source {} and {} of its articles", id, removed);
        Ok(result.rows_affected() > 0)
    }
}
