//! Cinescout Backend
//!
//! Movie browsing sessions over the TMDB catalog, with SQLite-backed trending search analytics.

mod api;
mod auth;
mod catalog;
mod config;
mod controller;
mod db;
mod debounce;
mod errors;
mod models;
mod session;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use catalog::TmdbClient;
use config::Config;
use db::{AnalyticsRepository, SearchAnalytics};
use session::SessionRegistry;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionRegistry>,
    pub analytics: Arc<dyn SearchAnalytics>,
    pub config: Arc<Config>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Cinescout Backend");
    tracing::info!("Catalog base URL: {}", config.tmdb_base_url);
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Bind address: {}", config.bind_addr);
    tracing::info!("Debounce window: {:?}", config.debounce_window);
    tracing::info!("Session idle timeout: {:?}", config.session_idle_timeout);

    if config.tmdb_api_key.is_none() {
        tracing::warn!("No TMDB API key configured (CINESCOUT_TMDB_API_KEY). Catalog requests will be rejected!");
    }
    if config.api_psk.is_none() {
        tracing::warn!("No API PSK configured (CINESCOUT_API_PSK). Authentication is disabled!");
    }

    // Initialize analytics store
    let pool = db::init_database(&config.db_path).await?;
    let analytics: Arc<dyn SearchAnalytics> = Arc::new(AnalyticsRepository::new(pool));

    // Initialize catalog client
    let catalog = Arc::new(TmdbClient::from_config(&config)?);

    let sessions = Arc::new(SessionRegistry::new(
        catalog,
        Arc::clone(&analytics),
        config.image_base_url.clone(),
        config.debounce_window,
    ));
    sessions.spawn_reaper(config.session_idle_timeout);

    let state = AppState {
        sessions,
        analytics,
        config: Arc::new(config.clone()),
    };

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let psk = state.config.api_psk.clone();

    let api_routes = Router::new()
        // Sessions
        .route("/sessions", post(api::create_session))
        .route(
            "/sessions/{id}",
            get(api::get_session).delete(api::close_session),
        )
        .route("/sessions/{id}/query", put(api::submit_query))
        .route("/sessions/{id}/more", post(api::load_more))
        // Trending
        .route("/trending", get(api::list_trending))
        .layer(middleware::from_fn(move |req, next| {
            auth::psk_auth_layer(psk.clone(), req, next)
        }));

    // Health check (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}
