use tracing::info;

use super::core::Database;
use crate::TARGET_DB;

impl Database {
    pub(crate) async fn initialize_schema(&self) -> Result<(), sqlx::Error> {
        let mut conn = self.pool().acquire().await?;
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sources (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                url TEXT NOT NULL UNIQUE,
                kind TEXT NOT NULL CHECK (kind IN ('feed', 'page')),
                enabled BOOLEAN NOT NULL DEFAULT TRUE,
                last_fetched_at TEXT,
                fetch_interval_hours INTEGER NOT NULL DEFAULT 24 CHECK (fetch_interval_hours > 0),
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_sources_enabled ON sources (enabled);

            CREATE TABLE IF NOT EXISTS articles (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                source_id INTEGER NOT NULL,
                source_name TEXT NOT NULL,
                title TEXT NOT NULL,
                url TEXT NOT NULL,
                normalized_url TEXT NOT NULL UNIQUE,
                published_at TEXT,
                fetched_at TEXT NOT NULL,
                excerpt TEXT,
                matched_keywords TEXT NOT NULL DEFAULT '[]',
                relevance_score INTEGER NOT NULL DEFAULT 0,
                promoted BOOLEAN NOT NULL DEFAULT FALSE,
                FOREIGN KEY (source_id) REFERENCES sources (id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_articles_source_id ON articles (source_id);
            CREATE INDEX IF NOT EXISTS idx_articles_fetched_at ON articles (fetched_at);
            CREATE INDEX IF NOT EXISTS idx_articles_relevance_score ON articles (relevance_score);
            "#,
        )
        .execute(&mut *conn)
        .await?;

        info!(target: TARGET_DB, "Database schema initialized");
        Ok(())
    }
}
