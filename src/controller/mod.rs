//! Paginated fetch controller.
//!
//! Owns the browsing state of one session: which term is settled, how many
//! pages are loaded, whether a request is in flight and the accumulated movie
//! list. All transitions go through the operations on [`FetchController`].
//!
//! Each issued request carries a generation token. A settled-term change bumps
//! the generation and supersedes whatever was in flight; a response whose
//! token no longer matches is discarded on arrival.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;

use crate::catalog::{CatalogResponse, MovieCatalog};
use crate::db::SearchAnalytics;
use crate::errors::{AppError, FETCH_FAILED_MESSAGE};
use crate::models::{admissible, Movie, Query, ResultPage, SearchSample};

/// Where the controller is in its request cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Idle,
    Loading,
    Error,
}

/// Why a load request was not issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SkipReason {
    /// Another request is outstanding.
    InFlight,
    /// The requested page is past the last known page.
    BeyondLastPage,
    /// Page numbers start at 1.
    InvalidPage,
    /// Only the settled term can be paged further.
    NotCurrentTerm,
}

/// Result of a load operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "camelCase")]
pub enum LoadOutcome {
    /// The response was applied to the state.
    Applied,
    /// The request failed; the error is recorded in the state.
    Failed,
    /// A newer request superseded this one before it completed.
    Stale,
    /// No request was issued.
    Skipped(SkipReason),
}

/// Browsing state of one session.
#[derive(Debug, Clone)]
pub struct ControllerState {
    /// Latest raw input, possibly still being typed.
    pub term: String,
    /// Term the list currently belongs to.
    pub debounced_term: String,
    /// Last successfully loaded page, 0 when nothing is loaded.
    pub page: u32,
    pub total_pages: u32,
    pub phase: Phase,
    pub error_message: Option<String>,
    pub movies: Vec<Movie>,
    generation: u64,
    in_flight: Option<Query>,
}

impl Default for ControllerState {
    fn default() -> Self {
        Self {
            term: String::new(),
            debounced_term: String::new(),
            page: 0,
            total_pages: 0,
            phase: Phase::Idle,
            error_message: None,
            movies: Vec::new(),
            generation: 0,
            in_flight: None,
        }
    }
}

impl ControllerState {
    pub fn is_loading(&self) -> bool {
        self.phase == Phase::Loading
    }

    fn reset_pagination(&mut self) {
        self.movies.clear();
        self.page = 0;
        self.total_pages = 0;
    }

    fn apply_page(&mut self, requested: u32, result: &ResultPage) {
        let shown = admissible(&result.results);
        if requested == 1 {
            self.movies = shown;
        } else {
            self.movies.extend(shown);
        }
        self.page = if result.page == 0 { requested } else { result.page };
        self.total_pages = result.total_pages;
    }
}

/// Serializable view of [`ControllerState`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerSnapshot {
    pub term: String,
    pub debounced_term: String,
    pub page: u32,
    pub total_pages: u32,
    pub phase: Phase,
    pub is_loading: bool,
    pub has_more: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_flight: Option<Query>,
    pub movies: Vec<Movie>,
}

impl From<&ControllerState> for ControllerSnapshot {
    fn from(state: &ControllerState) -> Self {
        Self {
            term: state.term.clone(),
            debounced_term: state.debounced_term.clone(),
            page: state.page,
            total_pages: state.total_pages,
            phase: state.phase,
            is_loading: state.is_loading(),
            has_more: state.page > 0 && state.page < state.total_pages,
            error_message: state.error_message.clone(),
            in_flight: state.in_flight.clone(),
            movies: state.movies.clone(),
        }
    }
}

/// Drives catalog requests for one browsing session.
pub struct FetchController {
    catalog: Arc<dyn MovieCatalog>,
    analytics: Arc<dyn SearchAnalytics>,
    image_base_url: String,
    state: Mutex<ControllerState>,
}

impl FetchController {
    pub fn new(
        catalog: Arc<dyn MovieCatalog>,
        analytics: Arc<dyn SearchAnalytics>,
        image_base_url: impl Into<String>,
    ) -> Self {
        Self {
            catalog,
            analytics,
            image_base_url: image_base_url.into(),
            state: Mutex::new(ControllerState::default()),
        }
    }

    /// Current state.
    pub async fn snapshot(&self) -> ControllerSnapshot {
        ControllerSnapshot::from(&*self.state.lock().await)
    }

    /// Store the latest raw input. Does not load anything.
    pub async fn record_input(&self, raw: &str) {
        self.state.lock().await.term = raw.to_string();
    }

    /// Load one page of `term`.
    ///
    /// Refused while a request is outstanding, and for pages past the last
    /// known page of the settled term. Page 1 replaces the list, later pages
    /// append to it.
    pub async fn load_page(&self, term: &str, page: u32) -> LoadOutcome {
        let query = Query::new(term, page);
        let ticket = {
            let mut state = self.state.lock().await;
            if let Err(reason) = check_load(&state, &query) {
                tracing::debug!("Skipping load of {:?}: {:?}", query, reason);
                return LoadOutcome::Skipped(reason);
            }
            begin(&mut state, &query)
        };
        self.execute(query, ticket).await
    }

    /// A new settled term arrived: reset to its first page.
    ///
    /// Takes priority over any outstanding request, whose response will be
    /// discarded.
    pub async fn on_settled_term(&self, term: &str) -> LoadOutcome {
        let query = Query::new(term, 1);
        let ticket = {
            let mut state = self.state.lock().await;
            if let Some(previous) = &state.in_flight {
                tracing::debug!("Superseding in-flight request {:?}", previous);
            }
            begin(&mut state, &query)
        };
        self.execute(query, ticket).await
    }

    /// The end of the list became visible: load the next page if there is one.
    pub async fn on_near_bottom(&self) -> LoadOutcome {
        let (term, next) = {
            let state = self.state.lock().await;
            if state.is_loading() {
                return LoadOutcome::Skipped(SkipReason::InFlight);
            }
            if state.page == 0 || state.page >= state.total_pages {
                return LoadOutcome::Skipped(SkipReason::BeyondLastPage);
            }
            (state.debounced_term.clone(), state.page + 1)
        };
        self.load_page(&term, next).await
    }

    async fn execute(&self, query: Query, ticket: u64) -> LoadOutcome {
        let result = if query.is_discover() {
            self.catalog.discover(query.page).await
        } else {
            self.catalog.search(&query.term, query.page).await
        };

        let mut state = self.state.lock().await;
        if state.generation != ticket {
            tracing::debug!("Discarding stale response for {:?}", query);
            return LoadOutcome::Stale;
        }
        state.in_flight = None;

        match result {
            Err(err) => {
                tracing::warn!("Fetching {:?} failed: {}", query, err);
                // Page 1 belongs to a new term; older results no longer apply.
                if query.page == 1 {
                    state.reset_pagination();
                }
                state.error_message = Some(FETCH_FAILED_MESSAGE.to_string());
                state.phase = Phase::Error;
                LoadOutcome::Failed
            }
            Ok(CatalogResponse::Failure { message }) => {
                let err = AppError::Application(
                    message.clone().unwrap_or_else(|| "no message".to_string()),
                );
                tracing::warn!("Fetching {:?} failed: {}", query, err);
                state.reset_pagination();
                state.error_message =
                    Some(message.unwrap_or_else(|| FETCH_FAILED_MESSAGE.to_string()));
                state.phase = Phase::Error;
                LoadOutcome::Failed
            }
            Ok(CatalogResponse::Page(result)) => {
                state.apply_page(query.page, &result);
                state.phase = Phase::Idle;
                drop(state);

                // Counted on the raw page, before the admissibility filter.
                if !query.term.is_empty() {
                    if let Some(sample) = result.results.first() {
                        self.dispatch_analytics(&query.term, sample);
                    }
                }
                LoadOutcome::Applied
            }
        }
    }

    fn dispatch_analytics(&self, term: &str, sample: &Movie) {
        let analytics = Arc::clone(&self.analytics);
        let term = term.to_string();
        let sample = SearchSample::from_movie(sample, &self.image_base_url);
        tokio::spawn(async move {
            if let Err(err) = analytics.record_search(&term, &sample).await {
                tracing::warn!("Failed to record search for '{}': {}", term, err);
            }
        });
    }
}

fn check_load(state: &ControllerState, query: &Query) -> Result<(), SkipReason> {
    if query.page == 0 {
        return Err(SkipReason::InvalidPage);
    }
    if state.is_loading() {
        return Err(SkipReason::InFlight);
    }
    if query.page > 1 {
        if query.term != state.debounced_term {
            return Err(SkipReason::NotCurrentTerm);
        }
        if query.page > state.total_pages {
            return Err(SkipReason::BeyondLastPage);
        }
    }
    Ok(())
}

/// Mark `query` as in flight and hand out its generation token.
///
/// A first page makes its term the settled one.
fn begin(state: &mut ControllerState, query: &Query) -> u64 {
    if query.page == 1 {
        state.debounced_term = query.term.clone();
    }
    state.generation += 1;
    state.phase = Phase::Loading;
    state.error_message = None;
    state.in_flight = Some(query.clone());
    state.generation
}

#[cfg(test)]
mod tests;
