//! Harvest orchestration for front ends
//!
//! Owns the [`RunSession`] and at most one background run at a time.
//!
//! # Async Lock Requirements
//!
//! The session sits behind `tokio::sync::Mutex`: the worker holds it
//! across `.await` points while appending, and exports read it from other
//! tasks. Whether a run is active is tracked separately with an atomic
//! flag so checks never wait on the worker.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Local;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

use crate::dom::DomLauncher;
use crate::export::{ExportReport, ReportContext, write_report, write_table};
use crate::harvest::{
    HarvestObserver, HarvestOptions, HarvestRequest, Record, RunOutcome, RunSession, RunStatus,
    run_harvest,
};
use crate::utils::{HarvestError, HarvestResult};

/// Identifies a started run and lets the caller stop it
#[derive(Debug, Clone)]
pub struct RunHandle {
    pub id: Uuid,
    cancel: CancellationToken,
}

impl RunHandle {
    /// Request cooperative cancellation; the run ends at its next check
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Clears the running flag however the worker task ends, panics included
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Starts runs on a launcher and exports what they accumulated
pub struct HarvestManager<L: DomLauncher> {
    launcher: Arc<L>,
    options: Arc<HarvestOptions>,
    session: Arc<Mutex<RunSession>>,
    running: Arc<AtomicBool>,
    task: Mutex<Option<JoinHandle<RunOutcome>>>,
}

impl<L: DomLauncher> HarvestManager<L> {
    pub fn new(launcher: L, options: HarvestOptions) -> Self {
        let session = RunSession::new(options.dedup);
        Self {
            launcher: Arc::new(launcher),
            options: Arc::new(options),
            session: Arc::new(Mutex::new(session)),
            running: Arc::new(AtomicBool::new(false)),
            task: Mutex::new(None),
        }
    }

    /// Start a run in the background
    ///
    /// The previous run's records are discarded before this returns. Fails
    /// with [`HarvestError::HarvestInProgress`] while another run is active.
    pub async fn start_harvest(
        &self,
        request: HarvestRequest,
        observer: Arc<dyn HarvestObserver>,
    ) -> HarvestResult<RunHandle> {
        let request = request.validated()?;

        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(HarvestError::HarvestInProgress);
        }
        let guard = RunningGuard(self.running.clone());

        self.session.lock().await.begin(request.clone());

        let handle = RunHandle {
            id: Uuid::new_v4(),
            cancel: CancellationToken::new(),
        };
        info!(
            "Starting harvest {} for '{}' (max {})",
            handle.id,
            request.query(),
            request.max_results
        );

        let launcher = self.launcher.clone();
        let options = self.options.clone();
        let session = self.session.clone();
        let cancel = handle.cancel.clone();

        let task = tokio::spawn(async move {
            let _guard = guard;
            run_harvest(
                launcher.as_ref(),
                &request,
                &session,
                &options,
                &cancel,
                observer.as_ref(),
            )
            .await
        });
        *self.task.lock().await = Some(task);

        Ok(handle)
    }

    pub fn cancel(&self, handle: &RunHandle) {
        info!("Cancelling harvest {}", handle.id);
        handle.cancel();
    }

    /// Wait for the current run to finish
    ///
    /// Returns `None` when no run was started since the last wait.
    pub async fn wait(&self) -> Option<RunOutcome> {
        let task = self.task.lock().await.take()?;
        match task.await {
            Ok(outcome) => Some(outcome),
            Err(e) => Some(RunOutcome {
                status: RunStatus::Failed(format!("Harvest task ended abnormally: {e}")),
                count: self.session.lock().await.count(),
                feed: None,
            }),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Records accumulated by the latest run
    pub async fn snapshot(&self) -> Vec<Record> {
        self.session.lock().await.accumulator.snapshot()
    }

    pub async fn last_request(&self) -> Option<HarvestRequest> {
        self.session.lock().await.request.clone()
    }

    /// Write the latest run's records as CSV
    pub async fn export_table(&self, path: impl AsRef<Path>) -> HarvestResult<ExportReport> {
        let records = self.finished_records().await?;
        let path = path.as_ref().to_path_buf();
        blocking(move || write_table(&records, &path)).await
    }

    /// Write the latest run's records as a PDF report
    pub async fn export_report(&self, path: impl AsRef<Path>) -> HarvestResult<ExportReport> {
        let records = self.finished_records().await?;
        let request = self.last_request().await;
        let context = ReportContext {
            keyword: request.as_ref().map(|r| r.keyword.clone()).unwrap_or_default(),
            location: request.map(|r| r.location).unwrap_or_default(),
            generated_at: Local::now().naive_local(),
        };
        let path: PathBuf = path.as_ref().to_path_buf();
        blocking(move || write_report(&records, &path, &context)).await
    }

    async fn finished_records(&self) -> HarvestResult<Vec<Record>> {
        if self.is_running() {
            return Err(HarvestError::HarvestInProgress);
        }
        Ok(self.snapshot().await)
    }
}

/// File writes stay off the async workers
async fn blocking<F>(f: F) -> HarvestResult<ExportReport>
where
    F: FnOnce() -> HarvestResult<ExportReport> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| HarvestError::Export(format!("Export task failed: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harvest::{HarvestEvent, NullObserver};
    use crate::testing::{FakeDom, FakeLauncher};

    /// Cancels the run once `after` records have been accumulated
    struct CancelAfter {
        after: usize,
        handle: std::sync::OnceLock<RunHandle>,
        completed: std::sync::Mutex<Option<usize>>,
    }

    impl HarvestObserver for CancelAfter {
        fn on_record_batch(&self, count: usize) {
            if count == self.after
                && let Some(handle) = self.handle.get()
            {
                handle.cancel();
            }
        }

        fn on_complete(&self, count: usize) {
            *self.completed.lock().unwrap() = Some(count);
        }
    }

    fn names(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("Bakery {i}")).collect()
    }

    fn manager_for(dom: &FakeDom) -> HarvestManager<FakeLauncher> {
        HarvestManager::new(FakeLauncher::new(dom.clone()), HarvestOptions::default())
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_mid_extraction_keeps_partial_set() {
        let names = names(50);
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        let dom = FakeDom::results_page(&names);
        let manager = manager_for(&dom);

        let observer = Arc::new(CancelAfter {
            after: 12,
            handle: std::sync::OnceLock::new(),
            completed: std::sync::Mutex::new(None),
        });
        let handle = manager
            .start_harvest(HarvestRequest::new("bakery", "Springfield", 50), observer.clone())
            .await
            .unwrap();
        // the worker is parked on its navigation pause until we await below
        observer.handle.set(handle.clone()).unwrap();

        let outcome = manager.wait().await.unwrap();

        assert!(handle.is_cancelled());
        assert_eq!(outcome.status, RunStatus::Cancelled);
        assert_eq!(outcome.count, 12);
        assert_eq!(*observer.completed.lock().unwrap(), Some(12));
        assert_eq!(dom.close_calls(), 1);

        let dir = crate::export::tests::tmp_dir("manager_partial");
        let report = manager.export_table(dir.join("partial.csv")).await.unwrap();
        assert_eq!(report.rows, 12);
        let snapshot = manager.snapshot().await;
        let seqs: Vec<usize> = snapshot.iter().map(|r| r.sequence).collect();
        assert_eq!(seqs, (1..=12).collect::<Vec<_>>());
    }

    #[tokio::test(start_paused = true)]
    async fn second_start_while_running_is_rejected() {
        let dom = FakeDom::results_page(&["A", "B"]);
        let manager = manager_for(&dom);

        manager
            .start_harvest(HarvestRequest::new("bakery", "Springfield", 5), Arc::new(NullObserver))
            .await
            .unwrap();
        let err = manager
            .start_harvest(HarvestRequest::new("cafe", "Springfield", 5), Arc::new(NullObserver))
            .await
            .unwrap_err();
        assert!(matches!(err, HarvestError::HarvestInProgress));

        let dir = crate::export::tests::tmp_dir("manager_busy");
        let err = manager.export_table(dir.join("busy.csv")).await.unwrap_err();
        assert!(matches!(err, HarvestError::HarvestInProgress));

        manager.wait().await.unwrap();
        assert!(!manager.is_running());
        assert_eq!(manager.snapshot().await.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn new_run_discards_previous_records() {
        let dom = FakeDom::results_page(&["A", "B", "C"]);
        let manager = manager_for(&dom);

        for _ in 0..2 {
            manager
                .start_harvest(HarvestRequest::new("bakery", "Springfield", 10), Arc::new(NullObserver))
                .await
                .unwrap();
            manager.wait().await.unwrap();
        }

        let snapshot = manager.snapshot().await;
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot[0].sequence, 1);
        assert_eq!(dom.close_calls(), 2);
    }

    #[tokio::test]
    async fn invalid_request_never_starts() {
        let manager = manager_for(&FakeDom::new());
        let err = manager
            .start_harvest(HarvestRequest::new("  ", "Springfield", 5), Arc::new(NullObserver))
            .await
            .unwrap_err();
        assert!(matches!(err, HarvestError::InvalidRequest(_)));
        assert!(!manager.is_running());
        assert!(manager.wait().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn missing_feed_is_reported_and_nothing_exports() {
        let dom = FakeDom::new();
        let manager = manager_for(&dom);
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        manager
            .start_harvest(HarvestRequest::new("bakery", "Springfield", 5), Arc::new(tx))
            .await
            .unwrap();
        let outcome = manager.wait().await.unwrap();
        assert!(matches!(outcome.status, RunStatus::Failed(_)));

        let mut errors = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let HarvestEvent::Error(message) = event {
                errors.push(message);
            }
        }
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("Results feed not found"));
        assert_eq!(dom.close_calls(), 1);

        let dir = crate::export::tests::tmp_dir("manager_empty");
        let err = manager.export_report(dir.join("none.pdf")).await.unwrap_err();
        assert!(matches!(err, HarvestError::EmptyResultSet));
    }

    #[tokio::test(start_paused = true)]
    async fn report_export_uses_run_terms() {
        let dom = FakeDom::results_page(&["Sunny Bakery"]);
        let manager = manager_for(&dom);
        manager
            .start_harvest(HarvestRequest::new("bakery", "Springfield", 5), Arc::new(NullObserver))
            .await
            .unwrap();
        manager.wait().await.unwrap();

        let dir = crate::export::tests::tmp_dir("manager_report");
        let report = manager.export_report(dir.join("run.pdf")).await.unwrap();
        assert_eq!(report.rows, 1);
        assert!(report.message.starts_with("PDF saved successfully"));
    }
}
