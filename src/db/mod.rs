//! Search analytics persistence.
//!
//! SQLite holds one counter row per normalized search term.

mod repository;

pub use repository::*;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

use crate::errors::AppError;
use crate::models::{SearchSample, TrendingEntry};

/// Store of search popularity used by the trending panel.
#[async_trait]
pub trait SearchAnalytics: Send + Sync {
    /// Count one search of `term`, refreshing its display record from `sample`.
    async fn record_search(&self, term: &str, sample: &SearchSample) -> Result<(), AppError>;

    /// The `limit` most searched terms, most searched first.
    async fn list_top_trending(&self, limit: u32) -> Result<Vec<TrendingEntry>, AppError>;
}

/// Initialize the database connection pool and run migrations.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool, sqlx::Error> {
    // Ensure the parent directory exists
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }

    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .busy_timeout(std::time::Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

/// Run database migrations.
async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS search_counts (
            term TEXT PRIMARY KEY,
            hit_count INTEGER NOT NULL DEFAULT 0,
            movie_id INTEGER,
            title TEXT NOT NULL DEFAULT '',
            poster_url TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_search_counts_hits ON search_counts(hit_count DESC, updated_at DESC);
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
