//! Trending panel API endpoint.

use axum::extract::{Query, State};
use serde::Deserialize;

use super::{success, ApiResult};
use crate::errors::AppError;
use crate::models::TrendingEntry;
use crate::AppState;

/// Maximum number of trending entries allowed.
const MAX_TRENDING_LIMIT: u32 = 50;

/// Trending query parameters.
#[derive(Debug, Deserialize)]
pub struct TrendingQuery {
    /// Number of entries (default: configured trending limit).
    pub limit: Option<u32>,
}

/// GET /api/trending - Most searched terms.
pub async fn list_trending(
    State(state): State<AppState>,
    Query(params): Query<TrendingQuery>,
) -> ApiResult<Vec<TrendingEntry>> {
    let limit = params.limit.unwrap_or(state.config.trending_limit);
    if limit == 0 || limit > MAX_TRENDING_LIMIT {
        return Err(AppError::Validation(format!(
            "limit must be between 1 and {}",
            MAX_TRENDING_LIMIT
        )));
    }

    success(state.analytics.list_top_trending(limit).await?)
}
