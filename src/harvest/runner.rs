//! One harvest run, from browser launch to the final count
//!
//! The runner owns the DOM session for the length of the run and reports
//! outward only through [`HarvestObserver`]. The session is closed exactly
//! once on every exit path: completion, cancellation, or a fatal fault.

use std::time::Duration;

use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::extract::{RecordExtractor, discover_cards};
use super::pagination::{FeedController, FeedReport, PaginationOptions};
use super::session::{HarvestRequest, RunSession};
use crate::Config;
use crate::dom::{DomCapability, DomLauncher};
use crate::utils::constants::{CARD_SELECTORS, DEFAULT_SEARCH_BASE_URL};
use crate::utils::{HarvestError, HarvestResult, validate_navigation_timeout};

/// Progress sink for a run
///
/// Every method has a no-op default, so observers implement only what they
/// display. Calls arrive on the worker task, in order.
pub trait HarvestObserver: Send + Sync {
    fn on_status(&self, _message: &str) {}

    /// Records accumulated so far
    fn on_record_batch(&self, _count: usize) {}

    /// Called once when the run ends without a fatal fault, cancelled or not
    fn on_complete(&self, _count: usize) {}

    fn on_error(&self, _message: &str) {}
}

/// Observer that ignores everything
pub struct NullObserver;
impl HarvestObserver for NullObserver {}

/// Observer callbacks as channel messages
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HarvestEvent {
    Status(String),
    Progress(usize),
    Complete(usize),
    Error(String),
}

// A dropped receiver just means nobody is listening any more
impl HarvestObserver for UnboundedSender<HarvestEvent> {
    fn on_status(&self, message: &str) {
        let _ = self.send(HarvestEvent::Status(message.to_string()));
    }

    fn on_record_batch(&self, count: usize) {
        let _ = self.send(HarvestEvent::Progress(count));
    }

    fn on_complete(&self, count: usize) {
        let _ = self.send(HarvestEvent::Complete(count));
    }

    fn on_error(&self, message: &str) {
        let _ = self.send(HarvestEvent::Error(message.to_string()));
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    Cancelled,
    Failed(String),
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub status: RunStatus,
    /// Records in the session when the run ended
    pub count: usize,
    /// Present once pagination finished
    pub feed: Option<FeedReport>,
}

/// Everything a run needs besides the request itself
#[derive(Debug, Clone)]
pub struct HarvestOptions {
    pub base_url: String,
    /// Pause after navigation before looking for the feed
    pub navigation_settle: Duration,
    /// Pagination settings; the target is taken from each request
    pub pagination: PaginationOptions,
    pub card_selectors: Vec<&'static str>,
    pub extractor: RecordExtractor,
    pub dedup: bool,
}

impl Default for HarvestOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_SEARCH_BASE_URL.to_string(),
            navigation_settle: Duration::from_secs(3),
            pagination: PaginationOptions::new(0),
            card_selectors: CARD_SELECTORS.to_vec(),
            extractor: RecordExtractor::default(),
            dedup: false,
        }
    }
}

impl HarvestOptions {
    pub fn from_config(config: &Config) -> HarvestResult<Self> {
        Ok(Self {
            base_url: config.search.base_url.clone(),
            navigation_settle: validate_navigation_timeout(
                Some(config.harvest.navigation_settle_ms),
                3_000,
            )?,
            pagination: PaginationOptions::from_config(0, &config.harvest)?,
            dedup: config.harvest.dedup,
            ..Self::default()
        })
    }
}

/// Search surface URL for `query`
pub fn search_url(base_url: &str, query: &str) -> String {
    format!(
        "{}/search/{}",
        base_url.trim_end_matches('/'),
        urlencoding::encode(query)
    )
}

/// Execute one run against a freshly launched DOM session
///
/// `session` must already have been started with [`RunSession::begin`]
/// for `request`. Records are appended to it as they are extracted, so a
/// cancelled run leaves a valid partial set behind.
pub async fn run_harvest<L: DomLauncher>(
    launcher: &L,
    request: &HarvestRequest,
    session: &Mutex<RunSession>,
    options: &HarvestOptions,
    cancel: &CancellationToken,
    observer: &dyn HarvestObserver,
) -> RunOutcome {
    observer.on_status("Initializing browser...");

    let dom = match launcher.launch().await {
        Ok(dom) => dom,
        Err(e) => return fail(session, observer, e).await,
    };

    let result = drive(&dom, request, session, options, cancel, observer).await;

    if let Err(e) = dom.close().await {
        warn!("Error closing browser session: {}", e);
    }

    let feed = match result {
        Ok(feed) => feed,
        Err(e) => return fail(session, observer, e).await,
    };

    let guard = session.lock().await;
    let count = guard.count();
    let status = if cancel.is_cancelled() {
        observer.on_status("Extraction stopped by user");
        RunStatus::Cancelled
    } else {
        observer.on_status(&format!("Extraction complete! Found {} businesses", count));
        RunStatus::Completed
    };
    log_preview(&guard);
    drop(guard);

    observer.on_complete(count);
    RunOutcome {
        status,
        count,
        feed: Some(feed),
    }
}

async fn drive<D: DomCapability>(
    dom: &D,
    request: &HarvestRequest,
    session: &Mutex<RunSession>,
    options: &HarvestOptions,
    cancel: &CancellationToken,
    observer: &dyn HarvestObserver,
) -> HarvestResult<FeedReport> {
    let ctx = session
        .lock()
        .await
        .context()
        .ok_or_else(|| HarvestError::InvalidRequest("Run session was not started".into()))?;

    observer.on_status("Opening map search...");
    dom.navigate(&search_url(&options.base_url, &request.query()))
        .await?;
    tokio::select! {
        _ = tokio::time::sleep(options.navigation_settle) => {}
        _ = cancel.cancelled() => {}
    }

    observer.on_status("Loading more results...");
    let pagination = PaginationOptions {
        target_count: request.max_results,
        ..options.pagination.clone()
    };
    let feed = FeedController::new(dom, pagination, cancel.clone())
        .load_feed()
        .await?;
    info!(
        "Feed stopped after {} rounds with {} results ({:?})",
        feed.rounds, feed.loaded, feed.stop
    );

    observer.on_status("Extracting business data...");
    let cards = discover_cards(dom, &options.card_selectors)
        .await
        .unwrap_or_else(|e| {
            warn!("Could not locate result cards: {}", e);
            Vec::new()
        });
    info!("Found {} business cards", cards.len());

    let mut listings = std::pin::pin!(options.extractor.extract(dom, &cards, &ctx, cancel));
    while let Some(listing) = listings.next().await {
        let count = {
            let mut guard = session.lock().await;
            if guard.accumulator.append(listing).is_none() {
                continue;
            }
            guard.count()
        };
        observer.on_record_batch(count);
        if count >= request.max_results {
            break;
        }
    }

    Ok(feed)
}

async fn fail(
    session: &Mutex<RunSession>,
    observer: &dyn HarvestObserver,
    err: HarvestError,
) -> RunOutcome {
    error!("Harvest failed: {}", err);
    let message = err.to_string();
    observer.on_error(&message);
    RunOutcome {
        status: RunStatus::Failed(message),
        count: session.lock().await.count(),
        feed: None,
    }
}

fn log_preview(session: &RunSession) {
    if session.records().is_empty() {
        return;
    }
    info!("First {} results:", session.records().len().min(5));
    for record in session.records().iter().take(5) {
        let address: String = record
            .address
            .as_deref()
            .unwrap_or("N/A")
            .chars()
            .take(50)
            .collect();
        info!(
            "{}. {} - Rating: {} - {}",
            record.sequence,
            record.name,
            record.rating.as_deref().unwrap_or("N/A"),
            address
        );
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use super::*;
    use crate::testing::{FakeDom, FakeLauncher};

    /// Records every callback in order
    #[derive(Default)]
    struct Recorder {
        events: StdMutex<Vec<HarvestEvent>>,
    }

    impl Recorder {
        fn events(&self) -> Vec<HarvestEvent> {
            self.events.lock().unwrap().clone()
        }

        fn statuses(&self) -> Vec<String> {
            self.events()
                .into_iter()
                .filter_map(|e| match e {
                    HarvestEvent::Status(s) => Some(s),
                    _ => None,
                })
                .collect()
        }
    }

    impl HarvestObserver for Recorder {
        fn on_status(&self, message: &str) {
            self.events.lock().unwrap().push(HarvestEvent::Status(message.into()));
        }
        fn on_record_batch(&self, count: usize) {
            self.events.lock().unwrap().push(HarvestEvent::Progress(count));
        }
        fn on_complete(&self, count: usize) {
            self.events.lock().unwrap().push(HarvestEvent::Complete(count));
        }
        fn on_error(&self, message: &str) {
            self.events.lock().unwrap().push(HarvestEvent::Error(message.into()));
        }
    }

    fn started(request: &HarvestRequest) -> Mutex<RunSession> {
        let mut session = RunSession::new(false);
        session.begin(request.clone());
        Mutex::new(session)
    }

    #[test]
    fn search_url_encodes_query() {
        assert_eq!(
            search_url("https://www.google.com/maps/", "bakery in Springfield"),
            "https://www.google.com/maps/search/bakery%20in%20Springfield"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn completed_run_reports_progress_in_order() {
        let dom = FakeDom::results_page(&["Sunny Bakery", "Crust & Crumb", "Loaf Life"]);
        let launcher = FakeLauncher::new(dom.clone());
        let request = HarvestRequest::new("bakery", "Springfield", 50);
        let session = started(&request);
        let recorder = Recorder::default();

        let outcome = run_harvest(
            &launcher,
            &request,
            &session,
            &HarvestOptions::default(),
            &CancellationToken::new(),
            &recorder,
        )
        .await;

        assert_eq!(outcome.status, RunStatus::Completed);
        assert_eq!(outcome.count, 3);
        assert_eq!(
            recorder.statuses(),
            [
                "Initializing browser...",
                "Opening map search...",
                "Loading more results...",
                "Extracting business data...",
                "Extraction complete! Found 3 businesses",
            ]
        );
        let events = recorder.events();
        assert_eq!(events.last(), Some(&HarvestEvent::Complete(3)));
        assert!(events.contains(&HarvestEvent::Progress(2)));

        assert_eq!(dom.close_calls(), 1);
        assert_eq!(
            dom.navigations(),
            ["https://www.google.com/maps/search/bakery%20in%20Springfield"]
        );
        let records = session.lock().await.records().to_vec();
        assert_eq!(records[0].rating.as_deref(), Some("4.5"));
        assert_eq!(records[2].sequence, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn extraction_stops_at_max_results() {
        let dom = FakeDom::results_page(&["A", "B", "C", "D", "E"]);
        let request = HarvestRequest::new("bakery", "Springfield", 2);
        let session = started(&request);

        let outcome = run_harvest(
            &FakeLauncher::new(dom),
            &request,
            &session,
            &HarvestOptions::default(),
            &CancellationToken::new(),
            &NullObserver,
        )
        .await;

        assert_eq!(outcome.count, 2);
        assert_eq!(session.lock().await.count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_feed_fails_the_run_and_closes_session() {
        let dom = FakeDom::new();
        let request = HarvestRequest::new("bakery", "Springfield", 10);
        let session = started(&request);
        let recorder = Recorder::default();

        let outcome = run_harvest(
            &FakeLauncher::new(dom.clone()),
            &request,
            &session,
            &HarvestOptions::default(),
            &CancellationToken::new(),
            &recorder,
        )
        .await;

        assert!(matches!(outcome.status, RunStatus::Failed(ref m) if m.contains("feed")));
        assert_eq!(dom.close_calls(), 1);
        let events = recorder.events();
        assert!(matches!(events.last(), Some(HarvestEvent::Error(_))));
        assert!(!events.iter().any(|e| matches!(e, HarvestEvent::Complete(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn navigation_fault_is_fatal() {
        let dom = FakeDom::results_page(&["A"]);
        dom.fail_navigation();
        let request = HarvestRequest::new("bakery", "Springfield", 10);
        let session = started(&request);

        let outcome = run_harvest(
            &FakeLauncher::new(dom.clone()),
            &request,
            &session,
            &HarvestOptions::default(),
            &CancellationToken::new(),
            &NullObserver,
        )
        .await;

        assert!(matches!(outcome.status, RunStatus::Failed(_)));
        assert_eq!(outcome.count, 0);
        assert_eq!(dom.close_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn launch_failure_never_touches_a_session() {
        let dom = FakeDom::results_page(&["A"]);
        let launcher = FakeLauncher {
            dom: dom.clone(),
            fail: true,
        };
        let request = HarvestRequest::new("bakery", "Springfield", 10);
        let session = started(&request);
        let recorder = Recorder::default();

        let outcome = run_harvest(
            &launcher,
            &request,
            &session,
            &HarvestOptions::default(),
            &CancellationToken::new(),
            &recorder,
        )
        .await;

        assert!(matches!(outcome.status, RunStatus::Failed(_)));
        assert_eq!(dom.close_calls(), 0);
        assert_eq!(
            recorder.events(),
            [
                HarvestEvent::Status("Initializing browser...".into()),
                HarvestEvent::Error(
                    "Failed to launch browser: Chrome/Chromium executable not found".into()
                ),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_before_start_still_completes_with_zero() {
        let dom = FakeDom::results_page(&["A", "B"]);
        let request = HarvestRequest::new("bakery", "Springfield", 10);
        let session = started(&request);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let recorder = Recorder::default();

        let outcome = run_harvest(
            &FakeLauncher::new(dom.clone()),
            &request,
            &session,
            &HarvestOptions::default(),
            &cancel,
            &recorder,
        )
        .await;

        assert_eq!(outcome.status, RunStatus::Cancelled);
        assert_eq!(outcome.count, 0);
        assert_eq!(dom.scrolls(), 0);
        assert_eq!(dom.close_calls(), 1);
        assert!(recorder.statuses().contains(&"Extraction stopped by user".to_string()));
        assert_eq!(recorder.events().last(), Some(&HarvestEvent::Complete(0)));
    }

    #[tokio::test]
    async fn channel_observer_forwards_events() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        tx.on_status("Opening map search...");
        tx.on_record_batch(4);
        drop(tx);

        assert_eq!(
            rx.recv().await,
            Some(HarvestEvent::Status("Opening map search...".into()))
        );
        assert_eq!(rx.recv().await, Some(HarvestEvent::Progress(4)));
        assert_eq!(rx.recv().await, None);
    }
}
