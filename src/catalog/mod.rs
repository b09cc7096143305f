//! TMDB movie catalog client.
//!
//! Read-only access to the discover and search listings. Transport-level
//! failures come back as `Err(AppError::Transport)`, while a well-formed body
//! carrying the catalog's failure sentinel comes back as
//! [`CatalogResponse::Failure`], so callers can tell the two apart.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::Client;
use serde::Deserialize;

use crate::config::Config;
use crate::errors::AppError;
use crate::models::{Movie, ResultPage};

/// Sort order used for discover mode.
const DISCOVER_SORT: &str = "popularity.desc";

/// Outcome of a catalog request that reached the server and was decoded.
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogResponse {
    Page(ResultPage),
    /// The payload carried the failure sentinel.
    Failure { message: Option<String> },
}

/// Source of movie listings.
#[async_trait]
pub trait MovieCatalog: Send + Sync {
    /// Popular movies, most popular first.
    async fn discover(&self, page: u32) -> Result<CatalogResponse, AppError>;

    /// Free-text title search.
    async fn search(&self, term: &str, page: u32) -> Result<CatalogResponse, AppError>;
}

/// Catalog backed by the TMDB v3 REST API.
#[derive(Clone)]
pub struct TmdbClient {
    http: Client,
    base_url: String,
}

impl TmdbClient {
    pub fn new(base_url: &str, api_key: Option<&str>) -> Result<Self, AppError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(key) = api_key {
            let mut bearer = HeaderValue::from_str(&format!("Bearer {}", key))
                .map_err(|_| AppError::Config("TMDB API key is not a valid header".to_string()))?;
            bearer.set_sensitive(true);
            headers.insert(AUTHORIZATION, bearer);
        }

        let http = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        Self::new(&config.tmdb_base_url, config.tmdb_api_key.as_deref())
    }

    async fn get(&self, path: &str, params: &[(&str, String)]) -> Result<CatalogResponse, AppError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.http.get(&url).query(params).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Transport(format!(
                "Catalog returned {} for {}",
                status, path
            )));
        }

        let payload: CatalogPayload = response.json().await?;
        Ok(payload.into_response())
    }
}

#[async_trait]
impl MovieCatalog for TmdbClient {
    async fn discover(&self, page: u32) -> Result<CatalogResponse, AppError> {
        self.get(
            "/discover/movie",
            &[
                ("sort_by", DISCOVER_SORT.to_string()),
                ("page", page.to_string()),
            ],
        )
        .await
    }

    async fn search(&self, term: &str, page: u32) -> Result<CatalogResponse, AppError> {
        self.get(
            "/search/movie",
            &[("query", term.to_string()), ("page", page.to_string())],
        )
        .await
    }
}

/// Raw catalog body: either a result page or a failure sentinel.
#[derive(Debug, Deserialize)]
struct CatalogPayload {
    #[serde(default, alias = "Response")]
    response: Option<String>,
    #[serde(default, alias = "Error")]
    error: Option<String>,
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    status_message: Option<String>,
    #[serde(default)]
    results: Vec<Movie>,
    #[serde(default)]
    page: Option<u32>,
    #[serde(default)]
    total_pages: Option<u32>,
}

impl CatalogPayload {
    fn into_response(self) -> CatalogResponse {
        let sentinel = self
            .response
            .as_deref()
            .is_some_and(|r| r.eq_ignore_ascii_case("false"));
        if sentinel {
            return CatalogResponse::Failure {
                message: self.error.filter(|m| !m.trim().is_empty()),
            };
        }
        if self.success == Some(false) {
            return CatalogResponse::Failure {
                message: self
                    .status_message
                    .or(self.error)
                    .filter(|m| !m.trim().is_empty()),
            };
        }

        CatalogResponse::Page(ResultPage {
            results: self.results,
            page: self.page.unwrap_or(1),
            total_pages: self.total_pages.unwrap_or(0),
        })
    }
}
