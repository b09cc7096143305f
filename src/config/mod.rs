//! Configuration module for the Cinescout backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::debounce::DEFAULT_WINDOW;
use crate::errors::AppError;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Pre-shared key for API authentication (required in production)
    pub api_psk: Option<String>,
    /// Bearer credential for the TMDB API
    pub tmdb_api_key: Option<String>,
    /// Base URL of the TMDB REST API
    pub tmdb_base_url: String,
    /// Prefix prepended to poster paths for trending thumbnails
    pub image_base_url: String,
    /// Path to SQLite analytics database file
    pub db_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Quiescence window before typed input becomes a search term
    pub debounce_window: Duration,
    /// Default number of entries in the trending panel
    pub trending_limit: u32,
    /// How long a session may go unused before it is evicted
    pub session_idle_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let api_psk = non_empty_var("CINESCOUT_API_PSK");
        let tmdb_api_key = non_empty_var("CINESCOUT_TMDB_API_KEY");

        let tmdb_base_url = env::var("CINESCOUT_TMDB_BASE_URL")
            .unwrap_or_else(|_| "https://api.themoviedb.org/3".to_string())
            .trim_end_matches('/')
            .to_string();

        let image_base_url = env::var("CINESCOUT_IMAGE_BASE_URL")
            .unwrap_or_else(|_| "https://image.tmdb.org/t/p/w500".to_string());

        let db_path = env::var("CINESCOUT_DB_PATH")
            .unwrap_or_else(|_| "./data/analytics.sqlite".to_string())
            .into();

        let bind_addr = env::var("CINESCOUT_BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
            .parse()
            .map_err(|_| AppError::Config("Invalid CINESCOUT_BIND_ADDR format".to_string()))?;

        let log_level = env::var("CINESCOUT_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let debounce_ms: u64 = parse_var(
            "CINESCOUT_DEBOUNCE_MS",
            DEFAULT_WINDOW.as_millis() as u64,
        )?;
        let trending_limit: u32 = parse_var("CINESCOUT_TRENDING_LIMIT", 5)?;
        if trending_limit == 0 {
            return Err(AppError::Config(
                "CINESCOUT_TRENDING_LIMIT must be at least 1".to_string(),
            ));
        }

        let session_idle_secs: u64 = parse_var("CINESCOUT_SESSION_IDLE_SECS", 1800)?;
        if session_idle_secs == 0 {
            return Err(AppError::Config(
                "CINESCOUT_SESSION_IDLE_SECS must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            api_psk,
            tmdb_api_key,
            tmdb_base_url,
            image_base_url,
            db_path,
            bind_addr,
            log_level,
            debounce_window: Duration::from_millis(debounce_ms),
            trending_limit,
            session_idle_timeout: Duration::from_secs(session_idle_secs),
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T: std::str::FromStr>(key: &str, default: T) -> Result<T, AppError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("Invalid {} value: {}", key, raw))),
        Err(_) => Ok(default),
    }
}
