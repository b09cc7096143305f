//! Browse session API endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use super::{success, ApiResponse, ApiResult};
use crate::controller::LoadOutcome;
use crate::errors::AppError;
use crate::session::{Session, SessionView};
use crate::AppState;

/// Maximum accepted length of raw search input, in characters.
const MAX_QUERY_CHARS: usize = 200;

/// Raw search-box input.
#[derive(Debug, Deserialize)]
pub struct QueryInput {
    pub term: String,
}

/// Result of a near-bottom signal.
#[derive(Debug, Serialize)]
pub struct LoadMoreResponse {
    pub outcome: LoadOutcome,
    pub session: SessionView,
}

async fn find_session(state: &AppState, id: &str) -> Result<Arc<Session>, AppError> {
    let uuid = Uuid::parse_str(id)
        .map_err(|_| AppError::BadRequest(format!("Invalid session id: {}", id)))?;
    state
        .sessions
        .get(uuid)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Session {} not found", id)))
}

/// POST /api/sessions - Open a session; the discover listing starts loading.
pub async fn create_session(State(state): State<AppState>) -> ApiResult<SessionView> {
    let session = state.sessions.open().await;
    Ok(ApiResponse::new(session.view().await).with_status(StatusCode::CREATED))
}

/// GET /api/sessions/:id - Current session state.
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<SessionView> {
    let session = find_session(&state, &id).await?;
    success(session.view().await)
}

/// PUT /api/sessions/:id/query - Feed raw search input.
pub async fn submit_query(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<QueryInput>,
) -> ApiResult<SessionView> {
    if input.term.chars().count() > MAX_QUERY_CHARS {
        return Err(AppError::Validation(format!(
            "Search term must be at most {} characters",
            MAX_QUERY_CHARS
        )));
    }

    let session = find_session(&state, &id).await?;
    session.submit_input(&input.term).await?;
    success(session.view().await)
}

/// POST /api/sessions/:id/more - The end of the list is visible.
pub async fn load_more(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<LoadMoreResponse> {
    let session = find_session(&state, &id).await?;
    let outcome = session.load_more().await?;
    success(LoadMoreResponse {
        outcome,
        session: session.view().await,
    })
}

/// DELETE /api/sessions/:id - Close a session.
pub async fn close_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    let session = find_session(&state, &id).await?;
    state.sessions.close(session.id).await;
    success(())
}
