//! Movie model matching the TMDB movie list payload.

use serde::{Deserialize, Serialize};

/// Genres a movie must belong to (at least one) to be shown.
///
/// Animation, Adventure, Comedy, Family, Fantasy, Action, Science Fiction,
/// Western, Music, Crime, War.
pub const ALLOWED_GENRES: [u32; 11] = [16, 12, 35, 10751, 14, 28, 878, 37, 10402, 80, 10752];

/// A movie as returned by the catalog.
///
/// Fields the backend does not interpret (popularity, vote average, release
/// date, ...) are kept in `extra` and serialized back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movie {
    pub id: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub genre_ids: Vec<u32>,
    #[serde(default)]
    pub adult: bool,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Movie {
    /// A movie is admissible when it is not adult and has an allowed genre.
    pub fn is_admissible(&self) -> bool {
        !self.adult && self.genre_ids.iter().any(|g| ALLOWED_GENRES.contains(g))
    }
}

/// Keep only admissible movies, preserving order.
pub fn admissible(movies: &[Movie]) -> Vec<Movie> {
    movies.iter().filter(|m| m.is_admissible()).cloned().collect()
}

/// One page of catalog results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultPage {
    pub results: Vec<Movie>,
    pub page: u32,
    pub total_pages: u32,
}

/// A catalog request: empty term means discover mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Query {
    pub term: String,
    pub page: u32,
}

impl Query {
    pub fn new(term: impl Into<String>, page: u32) -> Self {
        Self {
            term: term.into(),
            page,
        }
    }

    pub fn is_discover(&self) -> bool {
        self.term.is_empty()
    }
}

#[cfg(test)]
pub(crate) fn test_movie(id: u64, adult: bool, genre_ids: &[u32]) -> Movie {
    Movie {
        id,
        title: format!("Movie {}", id),
        poster_path: Some(format!("/poster-{}.jpg", id)),
        genre_ids: genre_ids.to_vec(),
        adult,
        extra: serde_json::Map::new(),
    }
}
