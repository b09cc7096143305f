//! Fetch controller tests against scripted catalog and analytics fakes.

use std::collections::HashMap;
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Notify};

use super::*;
use crate::errors::AppError;
use crate::models::{test_movie, TrendingEntry};

const IMAGE_BASE: &str = "https://image.test/w500";

#[derive(Clone)]
enum Reply {
    Page(ResultPage),
    Failure(Option<String>),
    Transport,
}

#[derive(Default)]
struct FakeCatalog {
    replies: StdMutex<HashMap<(String, u32), Reply>>,
    gates: StdMutex<HashMap<(String, u32), Arc<Notify>>>,
    calls: StdMutex<Vec<(&'static str, Query)>>,
}

impl FakeCatalog {
    fn reply(&self, term: &str, page: u32, reply: Reply) {
        self.replies
            .lock()
            .unwrap()
            .insert((term.to_string(), page), reply);
    }

    fn page(&self, term: &str, page: u32, total_pages: u32, movies: Vec<Movie>) {
        self.reply(
            term,
            page,
            Reply::Page(ResultPage {
                results: movies,
                page,
                total_pages,
            }),
        );
    }

    /// Hold the response for (term, page) until the returned gate is notified.
    fn gate(&self, term: &str, page: u32) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates
            .lock()
            .unwrap()
            .insert((term.to_string(), page), Arc::clone(&gate));
        gate
    }

    fn calls(&self) -> Vec<(&'static str, Query)> {
        self.calls.lock().unwrap().clone()
    }

    async fn respond(&self, kind: &'static str, term: &str, page: u32) -> Result<CatalogResponse, AppError> {
        let key = (term.to_string(), page);
        self.calls
            .lock()
            .unwrap()
            .push((kind, Query::new(term, page)));

        let gate = self.gates.lock().unwrap().get(&key).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let reply = self.replies.lock().unwrap().get(&key).cloned();
        match reply {
            Some(Reply::Page(page)) => Ok(CatalogResponse::Page(page)),
            Some(Reply::Failure(message)) => Ok(CatalogResponse::Failure { message }),
            Some(Reply::Transport) | None => Err(AppError::Transport("connection reset".into())),
        }
    }
}

#[async_trait]
impl MovieCatalog for FakeCatalog {
    async fn discover(&self, page: u32) -> Result<CatalogResponse, AppError> {
        self.respond("discover", "", page).await
    }

    async fn search(&self, term: &str, page: u32) -> Result<CatalogResponse, AppError> {
        self.respond("search", term, page).await
    }
}

struct FakeAnalytics {
    recorded: mpsc::UnboundedSender<(String, SearchSample)>,
    fail: bool,
}

#[async_trait]
impl SearchAnalytics for FakeAnalytics {
    async fn record_search(&self, term: &str, sample: &SearchSample) -> Result<(), AppError> {
        self.recorded
            .send((term.to_string(), sample.clone()))
            .map_err(|_| AppError::Internal("receiver gone".into()))?;
        if self.fail {
            return Err(AppError::Database("database is locked".into()));
        }
        Ok(())
    }

    async fn list_top_trending(&self, _limit: u32) -> Result<Vec<TrendingEntry>, AppError> {
        Ok(Vec::new())
    }
}

struct Harness {
    catalog: Arc<FakeCatalog>,
    controller: Arc<FetchController>,
    recorded: mpsc::UnboundedReceiver<(String, SearchSample)>,
}

fn harness() -> Harness {
    harness_with(false)
}

fn harness_with(analytics_fails: bool) -> Harness {
    let catalog = Arc::new(FakeCatalog::default());
    let (tx, rx) = mpsc::unbounded_channel();
    let analytics = Arc::new(FakeAnalytics {
        recorded: tx,
        fail: analytics_fails,
    });
    let controller = Arc::new(FetchController::new(
        Arc::clone(&catalog) as Arc<dyn MovieCatalog>,
        analytics,
        IMAGE_BASE,
    ));
    Harness {
        catalog,
        controller,
        recorded: rx,
    }
}

fn ids(snapshot: &ControllerSnapshot) -> Vec<u64> {
    snapshot.movies.iter().map(|m| m.id).collect()
}

async fn next_recorded(h: &mut Harness) -> Option<(String, SearchSample)> {
    tokio::time::timeout(Duration::from_millis(200), h.recorded.recv())
        .await
        .ok()
        .flatten()
}

async fn wait_until_loading(controller: &FetchController) {
    for _ in 0..100 {
        if controller.snapshot().await.is_loading {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("controller never started loading");
}

#[tokio::test]
async fn test_empty_term_uses_discover() {
    let mut h = harness();
    h.catalog.page("", 1, 5, vec![test_movie(1, false, &[16])]);

    let outcome = h.controller.on_settled_term("").await;

    assert_eq!(outcome, LoadOutcome::Applied);
    assert_eq!(h.catalog.calls(), vec![("discover", Query::new("", 1))]);
    let snapshot = h.controller.snapshot().await;
    assert_eq!(ids(&snapshot), vec![1]);
    assert_eq!(snapshot.page, 1);
    assert_eq!(snapshot.total_pages, 5);
    assert_eq!(snapshot.phase, Phase::Idle);
    assert!(snapshot.has_more);
    assert!(next_recorded(&mut h).await.is_none());
}

#[tokio::test]
async fn test_search_records_analytics_once() {
    let mut h = harness();
    h.catalog.page("batman", 1, 2, vec![test_movie(2, false, &[28])]);

    let outcome = h.controller.on_settled_term("batman").await;

    assert_eq!(outcome, LoadOutcome::Applied);
    assert_eq!(h.catalog.calls(), vec![("search", Query::new("batman", 1))]);
    assert_eq!(ids(&h.controller.snapshot().await), vec![2]);

    let (term, sample) = next_recorded(&mut h).await.expect("search recorded");
    assert_eq!(term, "batman");
    assert_eq!(sample.movie_id, 2);
    assert_eq!(sample.poster_url, format!("{}/poster-2.jpg", IMAGE_BASE));
    assert!(next_recorded(&mut h).await.is_none());
}

#[tokio::test]
async fn test_inadmissible_movies_are_dropped() {
    let mut h = harness();
    h.catalog.page(
        "heat",
        1,
        1,
        vec![
            test_movie(1, true, &[80]),
            test_movie(2, false, &[18]),
            test_movie(3, false, &[80, 18]),
        ],
    );

    h.controller.on_settled_term("heat").await;

    assert_eq!(ids(&h.controller.snapshot().await), vec![3]);
    let (_, sample) = next_recorded(&mut h).await.expect("search recorded");
    assert_eq!(sample.movie_id, 1);
}

#[tokio::test]
async fn test_search_with_only_inadmissible_results_is_recorded() {
    let mut h = harness();
    h.catalog.page(
        "saw",
        1,
        1,
        vec![test_movie(7, false, &[27]), test_movie(8, true, &[28])],
    );

    assert_eq!(h.controller.on_settled_term("saw").await, LoadOutcome::Applied);

    let snapshot = h.controller.snapshot().await;
    assert!(snapshot.movies.is_empty());
    assert_eq!(snapshot.phase, Phase::Idle);
    let (term, sample) = next_recorded(&mut h).await.expect("search recorded");
    assert_eq!(term, "saw");
    assert_eq!(sample.movie_id, 7);
    assert!(next_recorded(&mut h).await.is_none());
}

#[tokio::test]
async fn test_no_results_records_nothing() {
    let mut h = harness();
    h.catalog.page("zzzz", 1, 0, Vec::new());

    assert_eq!(h.controller.on_settled_term("zzzz").await, LoadOutcome::Applied);

    let snapshot = h.controller.snapshot().await;
    assert!(snapshot.movies.is_empty());
    assert!(!snapshot.has_more);
    assert!(next_recorded(&mut h).await.is_none());
}

#[tokio::test]
async fn test_application_failure_clears_list() {
    let h = harness();
    h.catalog.page("", 1, 3, vec![test_movie(1, false, &[16])]);
    h.catalog.reply(
        "batman",
        1,
        Reply::Failure(Some("Invalid API key".to_string())),
    );

    h.controller.on_settled_term("").await;
    let outcome = h.controller.on_settled_term("batman").await;

    assert_eq!(outcome, LoadOutcome::Failed);
    let snapshot = h.controller.snapshot().await;
    assert_eq!(snapshot.error_message.as_deref(), Some("Invalid API key"));
    assert!(snapshot.movies.is_empty());
    assert_eq!(snapshot.phase, Phase::Error);
    assert!(!snapshot.is_loading);
    assert_eq!(
        h.controller.on_near_bottom().await,
        LoadOutcome::Skipped(SkipReason::BeyondLastPage)
    );
}

#[tokio::test]
async fn test_application_failure_without_message_uses_fallback() {
    let h = harness();
    h.catalog.reply("batman", 1, Reply::Failure(None));

    h.controller.on_settled_term("batman").await;

    let snapshot = h.controller.snapshot().await;
    assert_eq!(snapshot.error_message.as_deref(), Some(FETCH_FAILED_MESSAGE));
}

#[tokio::test]
async fn test_load_more_appends() {
    let mut h = harness();
    h.catalog.page("batman", 1, 2, vec![test_movie(1, false, &[28])]);
    h.catalog.page(
        "batman",
        2,
        2,
        vec![test_movie(2, false, &[28]), test_movie(3, true, &[28])],
    );

    h.controller.on_settled_term("batman").await;
    let outcome = h.controller.on_near_bottom().await;

    assert_eq!(outcome, LoadOutcome::Applied);
    assert_eq!(
        h.catalog.calls(),
        vec![
            ("search", Query::new("batman", 1)),
            ("search", Query::new("batman", 2)),
        ]
    );
    let snapshot = h.controller.snapshot().await;
    assert_eq!(ids(&snapshot), vec![1, 2]);
    assert_eq!(snapshot.page, 2);
    assert!(!snapshot.has_more);

    // One increment per successful search request.
    assert!(next_recorded(&mut h).await.is_some());
    assert!(next_recorded(&mut h).await.is_some());
}

#[tokio::test]
async fn test_page_one_replaces_previous_term() {
    let h = harness();
    h.catalog.page("alien", 1, 2, vec![test_movie(1, false, &[878])]);
    h.catalog.page("alien", 2, 2, vec![test_movie(2, false, &[878])]);
    h.catalog.page("up", 1, 1, vec![test_movie(9, false, &[16])]);

    h.controller.on_settled_term("alien").await;
    h.controller.on_near_bottom().await;
    assert_eq!(ids(&h.controller.snapshot().await), vec![1, 2]);

    h.controller.on_settled_term("up").await;
    let snapshot = h.controller.snapshot().await;
    assert_eq!(ids(&snapshot), vec![9]);
    assert_eq!(snapshot.debounced_term, "up");
    assert_eq!(snapshot.page, 1);

    // Reloading page 1 of the same term also replaces.
    assert_eq!(h.controller.load_page("up", 1).await, LoadOutcome::Applied);
    assert_eq!(ids(&h.controller.snapshot().await), vec![9]);
}

#[tokio::test]
async fn test_never_requests_past_last_page() {
    let h = harness();
    h.catalog.page("alien", 1, 2, vec![test_movie(1, false, &[878])]);
    h.catalog.page("alien", 2, 2, vec![test_movie(2, false, &[878])]);

    h.controller.on_settled_term("alien").await;
    h.controller.on_near_bottom().await;

    assert_eq!(
        h.controller.on_near_bottom().await,
        LoadOutcome::Skipped(SkipReason::BeyondLastPage)
    );
    assert_eq!(
        h.controller.load_page("alien", 3).await,
        LoadOutcome::Skipped(SkipReason::BeyondLastPage)
    );
    assert_eq!(h.catalog.calls().len(), 2);
}

#[tokio::test]
async fn test_load_page_guards() {
    let h = harness();
    h.catalog.page("alien", 1, 4, vec![test_movie(1, false, &[878])]);

    assert_eq!(
        h.controller.load_page("alien", 0).await,
        LoadOutcome::Skipped(SkipReason::InvalidPage)
    );
    assert_eq!(
        h.controller.on_near_bottom().await,
        LoadOutcome::Skipped(SkipReason::BeyondLastPage)
    );

    h.controller.load_page("alien", 1).await;
    assert_eq!(
        h.controller.load_page("predator", 2).await,
        LoadOutcome::Skipped(SkipReason::NotCurrentTerm)
    );
    assert_eq!(h.catalog.calls().len(), 1);
}

#[tokio::test]
async fn test_single_flight() {
    let h = harness();
    h.catalog.page("alien", 1, 3, vec![test_movie(1, false, &[878])]);
    h.catalog.page("alien", 2, 3, vec![test_movie(2, false, &[878])]);
    h.controller.on_settled_term("alien").await;

    let gate = h.catalog.gate("alien", 2);
    let controller = Arc::clone(&h.controller);
    let pending = tokio::spawn(async move { controller.on_near_bottom().await });
    wait_until_loading(&h.controller).await;

    assert_eq!(
        h.controller.on_near_bottom().await,
        LoadOutcome::Skipped(SkipReason::InFlight)
    );
    assert_eq!(
        h.controller.load_page("alien", 1).await,
        LoadOutcome::Skipped(SkipReason::InFlight)
    );

    gate.notify_one();
    assert_eq!(pending.await.unwrap(), LoadOutcome::Applied);
    assert_eq!(h.catalog.calls().len(), 2);
    assert!(!h.controller.snapshot().await.is_loading);
}

#[tokio::test]
async fn test_stale_response_is_discarded() {
    let h = harness();
    h.catalog.page("bat", 1, 1, vec![test_movie(1, false, &[28])]);
    h.catalog.page("batman", 1, 1, vec![test_movie(2, false, &[28])]);
    let gate = h.catalog.gate("bat", 1);

    let controller = Arc::clone(&h.controller);
    let slow = tokio::spawn(async move { controller.on_settled_term("bat").await });
    wait_until_loading(&h.controller).await;

    assert_eq!(
        h.controller.on_settled_term("batman").await,
        LoadOutcome::Applied
    );
    gate.notify_one();
    assert_eq!(slow.await.unwrap(), LoadOutcome::Stale);

    let snapshot = h.controller.snapshot().await;
    assert_eq!(ids(&snapshot), vec![2]);
    assert_eq!(snapshot.debounced_term, "batman");
    assert!(!snapshot.is_loading);
}

#[tokio::test]
async fn test_failed_load_more_keeps_list_and_retries_same_page() {
    let h = harness();
    h.catalog.page("alien", 1, 3, vec![test_movie(1, false, &[878])]);
    h.catalog.reply("alien", 2, Reply::Transport);

    h.controller.on_settled_term("alien").await;
    assert_eq!(h.controller.on_near_bottom().await, LoadOutcome::Failed);

    let snapshot = h.controller.snapshot().await;
    assert_eq!(ids(&snapshot), vec![1]);
    assert_eq!(snapshot.page, 1);
    assert_eq!(snapshot.phase, Phase::Error);
    assert_eq!(snapshot.error_message.as_deref(), Some(FETCH_FAILED_MESSAGE));

    h.catalog.page("alien", 2, 3, vec![test_movie(2, false, &[878])]);
    assert_eq!(h.controller.on_near_bottom().await, LoadOutcome::Applied);
    assert_eq!(
        h.catalog.calls()[1..],
        [
            ("search", Query::new("alien", 2)),
            ("search", Query::new("alien", 2)),
        ]
    );
    let snapshot = h.controller.snapshot().await;
    assert_eq!(ids(&snapshot), vec![1, 2]);
    assert_eq!(snapshot.phase, Phase::Idle);
    assert!(snapshot.error_message.is_none());
}

#[tokio::test]
async fn test_failed_first_page_clears_list() {
    let h = harness();
    h.catalog.page("", 1, 3, vec![test_movie(1, false, &[16])]);
    h.catalog.reply("batman", 1, Reply::Transport);

    h.controller.on_settled_term("").await;
    assert_eq!(h.controller.on_settled_term("batman").await, LoadOutcome::Failed);

    let snapshot = h.controller.snapshot().await;
    assert!(snapshot.movies.is_empty());
    assert_eq!(snapshot.page, 0);
    assert_eq!(snapshot.error_message.as_deref(), Some(FETCH_FAILED_MESSAGE));
}

#[tokio::test]
async fn test_analytics_failure_is_isolated() {
    let mut h = harness_with(true);
    h.catalog.page("batman", 1, 1, vec![test_movie(2, false, &[28])]);

    assert_eq!(
        h.controller.on_settled_term("batman").await,
        LoadOutcome::Applied
    );
    assert!(next_recorded(&mut h).await.is_some());

    let snapshot = h.controller.snapshot().await;
    assert_eq!(snapshot.phase, Phase::Idle);
    assert!(snapshot.error_message.is_none());
    assert_eq!(ids(&snapshot), vec![2]);
}

#[tokio::test]
async fn test_record_input_does_not_load() {
    let h = harness();

    h.controller.record_input("bat").await;

    let snapshot = h.controller.snapshot().await;
    assert_eq!(snapshot.term, "bat");
    assert_eq!(snapshot.debounced_term, "");
    assert!(h.catalog.calls().is_empty());
}
