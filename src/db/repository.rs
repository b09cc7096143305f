//! SQLite repository for search counters.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};

use super::SearchAnalytics;
use crate::errors::AppError;
use crate::models::{normalize_term, SearchSample, TrendingEntry};

/// Search analytics repository.
#[derive(Clone)]
pub struct AnalyticsRepository {
    pool: SqlitePool,
}

impl AnalyticsRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SearchAnalytics for AnalyticsRepository {
    async fn record_search(&self, term: &str, sample: &SearchSample) -> Result<(), AppError> {
        let key = normalize_term(term);
        if key.is_empty() {
            return Err(AppError::Validation(
                "Search term must not be blank".to_string(),
            ));
        }

        let now = Utc::now().to_rfc3339();
        let movie_id = i64::try_from(sample.movie_id)
            .map_err(|_| AppError::Validation(format!("Movie id {} out of range", sample.movie_id)))?;

        sqlx::query(
            r#"
            INSERT INTO search_counts (term, hit_count, movie_id, title, poster_url, created_at, updated_at)
            VALUES (?, 1, ?, ?, ?, ?, ?)
            ON CONFLICT (term) DO UPDATE SET
                hit_count = hit_count + 1,
                movie_id = excluded.movie_id,
                title = excluded.title,
                poster_url = excluded.poster_url,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&key)
        .bind(movie_id)
        .bind(&sample.title)
        .bind(&sample.poster_url)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        tracing::debug!("Recorded search for '{}'", key);
        Ok(())
    }

    async fn list_top_trending(&self, limit: u32) -> Result<Vec<TrendingEntry>, AppError> {
        let rows = sqlx::query(
            "SELECT term, hit_count, movie_id, title, poster_url, updated_at FROM search_counts ORDER BY hit_count DESC, updated_at DESC LIMIT ?",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .enumerate()
            .map(|(i, row)| trending_from_row(row, i as u32 + 1))
            .collect())
    }
}

fn trending_from_row(row: &sqlx::sqlite::SqliteRow, rank: u32) -> TrendingEntry {
    let movie_id: Option<i64> = row.get("movie_id");
    TrendingEntry {
        term: row.get("term"),
        hit_count: row.get("hit_count"),
        movie_id: movie_id.and_then(|id| u64::try_from(id).ok()),
        title: row.get("title"),
        poster_url: row.get("poster_url"),
        rank,
        updated_at: row.get("updated_at"),
    }
}
