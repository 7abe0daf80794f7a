//! Background load workers.
//!
//! Every input file gets its own OS thread (no pool). A worker owns its path and the data it
//! produces until it hands a single [`LoadCompletion`] to the coordinator over an `mpsc`
//! channel. Cancellation is cooperative through a [`CancelToken`] checked by the loader.

mod metrics;

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::ingestion::{LoadOptions, load_file_with_cancel};
use crate::types::LoadedFile;

pub use metrics::{ExecutionMetrics, ExecutionMetricsSnapshot};

const STOP_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Shared flag used to ask a running load to stop.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a cooperative stop.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Result of one dispatched load, delivered exactly once per dispatch.
#[derive(Debug)]
pub struct LoadCompletion {
    /// Dispatch ticket; lets the coordinator reject completions from superseded loads.
    pub ticket: u64,
    /// Loaded sections; empty on failure.
    pub file: LoadedFile,
}

/// How a stop request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The worker exited within the wait budget and was joined.
    Joined,
    /// The worker was still running after the wait budget and was detached.
    ///
    /// Rust offers no safe forced termination; the thread keeps running until the loader next
    /// checks its token or finishes, and its completion is discarded by the coordinator.
    Detached,
}

/// Handle to one running load thread.
#[derive(Debug)]
pub struct LoadWorker {
    ticket: u64,
    cancel: CancelToken,
    handle: Option<JoinHandle<()>>,
}

impl LoadWorker {
    /// Spawn a thread that loads `path` and sends its [`LoadCompletion`] on `tx`.
    ///
    /// A panic inside the loader is caught and reported as a failed (empty) load, so the
    /// completion is always sent.
    pub fn spawn(
        ticket: u64,
        path: PathBuf,
        options: LoadOptions,
        tx: Sender<LoadCompletion>,
        metrics: Arc<ExecutionMetrics>,
    ) -> io::Result<Self> {
        let cancel = CancelToken::new();
        let worker_cancel = cancel.clone();
        let worker_metrics = Arc::clone(&metrics);
        metrics.on_load_start();

        let spawned = thread::Builder::new()
            .name(format!("load-{ticket}"))
            .spawn(move || {
                let started = Instant::now();
                let loaded = panic::catch_unwind(AssertUnwindSafe(|| {
                    load_file_with_cancel(&path, &options, &worker_cancel)
                }));
                let file = match loaded {
                    Ok(file) => file,
                    Err(_) => {
                        tracing::error!(path = %path.display(), "loader panicked; reporting failure");
                        LoadedFile::failed(path)
                    }
                };
                worker_metrics.on_load_end(started.elapsed(), worker_cancel.is_cancelled());
                // The receiver is gone only when the coordinator itself was dropped.
                let _ = tx.send(LoadCompletion { ticket, file });
            });

        match spawned {
            Ok(handle) => Ok(Self {
                ticket,
                cancel,
                handle: Some(handle),
            }),
            Err(e) => {
                metrics.on_load_end(Duration::ZERO, false);
                Err(e)
            }
        }
    }

    pub fn ticket(&self) -> u64 {
        self.ticket
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(|h| h.is_finished())
    }

    /// Join a worker that has already sent its completion.
    pub fn reap(mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    /// Signal the loader to stop without waiting.
    pub fn request_stop(&self) {
        self.cancel.cancel();
    }

    /// Request a cooperative stop, wait up to `wait` for the thread to exit, then detach it.
    pub fn stop(mut self, wait: Duration) -> StopOutcome {
        self.request_stop();
        let deadline = Instant::now() + wait;
        while !self.is_finished() && Instant::now() < deadline {
            thread::sleep(STOP_POLL_INTERVAL);
        }

        match self.handle.take() {
            Some(handle) if handle.is_finished() => {
                let _ = handle.join();
                StopOutcome::Joined
            }
            Some(_) => StopOutcome::Detached,
            None => StopOutcome::Joined,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn cancel_token_is_shared_between_clones() {
        let token = CancelToken::new();
        let other = token.clone();
        assert!(!other.is_cancelled());
        token.cancel();
        assert!(other.is_cancelled());
    }

    #[test]
    fn worker_delivers_failed_completion_for_missing_file() {
        let (tx, rx) = mpsc::channel();
        let metrics = Arc::new(ExecutionMetrics::new());
        let worker = LoadWorker::spawn(
            7,
            PathBuf::from("definitely/missing/file.csv"),
            LoadOptions::default(),
            tx,
            Arc::clone(&metrics),
        )
        .unwrap();

        let done = rx.recv_timeout(Duration::from_secs(10)).unwrap();
        assert_eq!(done.ticket, 7);
        assert!(done.file.is_empty());
        assert_eq!(worker.stop(Duration::from_secs(5)), StopOutcome::Joined);

        let snap = metrics.snapshot();
        assert_eq!(snap.loads_started, 1);
        assert_eq!(snap.loads_finished, 1);
        assert_eq!(snap.active_loads, 0);
    }
}
