//! Browse sessions.
//!
//! A session pairs one [`FetchController`] with one input debouncer. Raw
//! input goes into the debouncer; every settled term is forwarded to the
//! controller on its own task so a newer term can supersede a slower one.
//!
//! Sessions idle for longer than the configured timeout are evicted by
//! [`SessionRegistry::spawn_reaper`]; dropping a session stops its tasks.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::time::Instant;
use uuid::Uuid;

use crate::catalog::MovieCatalog;
use crate::controller::{ControllerSnapshot, FetchController, LoadOutcome};
use crate::db::SearchAnalytics;
use crate::debounce::{DebounceHandle, Debouncer};
use crate::errors::AppError;

/// One client's browsing session.
pub struct Session {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    controller: Arc<FetchController>,
    input: DebounceHandle,
    last_seen: Mutex<Instant>,
}

/// Session state as served to clients.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub id: Uuid,
    pub created_at: String,
    pub state: ControllerSnapshot,
}

impl Session {
    async fn touch(&self) {
        *self.last_seen.lock().await = Instant::now();
    }

    async fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(*self.last_seen.lock().await)
    }

    /// Feed raw search-box input.
    pub async fn submit_input(&self, raw: &str) -> Result<(), AppError> {
        self.controller.record_input(raw).await;
        if !self.input.push(raw) {
            return Err(AppError::Internal(format!(
                "Input debouncer for session {} has stopped",
                self.id
            )));
        }
        Ok(())
    }

    /// The end of the result list is visible.
    pub async fn load_more(&self) -> Result<LoadOutcome, AppError> {
        // Detached so an aborted caller cannot strand the controller in Loading.
        let controller = Arc::clone(&self.controller);
        tokio::spawn(async move { controller.on_near_bottom().await })
            .await
            .map_err(|e| AppError::Internal(format!("Load task failed: {}", e)))
    }

    pub async fn view(&self) -> SessionView {
        SessionView {
            id: self.id,
            created_at: self.created_at.to_rfc3339(),
            state: self.controller.snapshot().await,
        }
    }
}

/// All open sessions and the collaborators new sessions are built from.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, Arc<Session>>>,
    catalog: Arc<dyn MovieCatalog>,
    analytics: Arc<dyn SearchAnalytics>,
    image_base_url: String,
    debounce_window: Duration,
}

impl SessionRegistry {
    pub fn new(
        catalog: Arc<dyn MovieCatalog>,
        analytics: Arc<dyn SearchAnalytics>,
        image_base_url: impl Into<String>,
        debounce_window: Duration,
    ) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            catalog,
            analytics,
            image_base_url: image_base_url.into(),
            debounce_window,
        }
    }

    /// Open a session and start loading the discover listing.
    pub async fn open(&self) -> Arc<Session> {
        let controller = Arc::new(FetchController::new(
            Arc::clone(&self.catalog),
            Arc::clone(&self.analytics),
            self.image_base_url.clone(),
        ));
        let (input, settled) = Debouncer::spawn(self.debounce_window, "");

        let session = Arc::new(Session {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            controller: Arc::clone(&controller),
            input,
            last_seen: Mutex::new(Instant::now()),
        });

        tokio::spawn(forward_settled(Arc::clone(&controller), settled));
        tokio::spawn(async move { controller.on_settled_term("").await });

        self.sessions
            .write()
            .await
            .insert(session.id, Arc::clone(&session));
        tracing::info!("Opened session {}", session.id);
        session
    }

    /// Look up a session, marking it as active.
    pub async fn get(&self, id: Uuid) -> Option<Arc<Session>> {
        let session = self.sessions.read().await.get(&id).cloned()?;
        session.touch().await;
        Some(session)
    }

    /// Close a session. Returns false if it did not exist.
    pub async fn close(&self, id: Uuid) -> bool {
        let removed = self.sessions.write().await.remove(&id).is_some();
        if removed {
            tracing::info!("Closed session {}", id);
        }
        removed
    }

    /// Drop every session not looked up within `max_idle`. Returns how many went.
    pub async fn evict_idle(&self, max_idle: Duration) -> usize {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;

        let mut expired = Vec::new();
        for (id, session) in sessions.iter() {
            if session.idle_for(now).await > max_idle {
                expired.push(*id);
            }
        }
        for id in &expired {
            sessions.remove(id);
            tracing::info!("Expired idle session {}", id);
        }
        expired.len()
    }

    /// Periodically evict sessions idle for longer than `max_idle`.
    pub fn spawn_reaper(self: &Arc<Self>, max_idle: Duration) -> tokio::task::JoinHandle<()> {
        let registry = Arc::clone(self);
        let period = (max_idle / 2).max(Duration::from_secs(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                let evicted = registry.evict_idle(max_idle).await;
                if evicted > 0 {
                    tracing::debug!("Evicted {} idle sessions", evicted);
                }
            }
        })
    }
}

async fn forward_settled(
    controller: Arc<FetchController>,
    mut settled: mpsc::UnboundedReceiver<String>,
) {
    while let Some(term) = settled.recv().await {
        tracing::debug!("Settled term '{}'", term);
        let controller = Arc::clone(&controller);
        tokio::spawn(async move { controller.on_settled_term(&term).await });
    }
}
