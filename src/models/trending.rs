//! Trending panel models backed by the search analytics store.

use serde::{Deserialize, Serialize};

use super::Movie;

/// A search term ranked by how often it was searched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendingEntry {
    pub term: String,
    pub hit_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub movie_id: Option<u64>,
    pub title: String,
    pub poster_url: String,
    pub rank: u32,
    pub updated_at: String,
}

/// Display record stored alongside a search term's counter.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchSample {
    pub movie_id: u64,
    pub title: String,
    pub poster_url: String,
}

impl SearchSample {
    /// Build the display record for `movie`, resolving its poster against `image_base_url`.
    pub fn from_movie(movie: &Movie, image_base_url: &str) -> Self {
        let poster_url = movie
            .poster_path
            .as_deref()
            .map(|path| format!("{}{}", image_base_url, path))
            .unwrap_or_default();

        Self {
            movie_id: movie.id,
            title: movie.title.clone(),
            poster_url,
        }
    }
}

/// Normalize a search term into its analytics key.
///
/// Trims, collapses inner whitespace and lowercases, so "  The  Batman" and
/// "the batman" count as the same search.
pub fn normalize_term(term: &str) -> String {
    term.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
