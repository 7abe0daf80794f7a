//! Per-file load coordination.
//!
//! The [`Coordinator`] owns the mapping from input path to [`FileEntry`]. It is meant to be
//! driven from a single thread (the presentation thread): it spawns one [`LoadWorker`] per
//! added file and applies their completions when [`Coordinator::poll`] or
//! [`Coordinator::wait_idle`] drains the completion channel. Workers never touch coordinator
//! state; the only handoff is one [`LoadCompletion`] per dispatch.
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use sheet_merge::coordinator::{Coordinator, CoordinatorOptions};
//!
//! let mut coordinator = Coordinator::new(CoordinatorOptions::default());
//! coordinator.add_file("a.csv");
//! coordinator.add_file("b.xlsx");
//! coordinator.wait_idle(Duration::from_secs(30));
//! match coordinator.merge_input() {
//!     Ok(files) => println!("{} file(s) ready", files.len()),
//!     Err(gate) => println!("{gate}"),
//! }
//! ```

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::error::MergeResult;
use crate::execution::{ExecutionMetrics, LoadCompletion, LoadWorker, StopOutcome};
use crate::formats::{DEFAULT_OUTPUT_FILENAME, is_supported, scan_folder};
use crate::ingestion::LoadOptions;
use crate::types::LoadedFile;

/// Configuration for the [`Coordinator`].
#[derive(Debug, Clone)]
pub struct CoordinatorOptions {
    /// Options passed to every load.
    pub load: LoadOptions,
    /// How long [`Coordinator::remove_file`] waits for a cancelled worker before detaching it.
    pub cancel_wait: Duration,
    /// File name joined onto the default save directory.
    pub default_output_name: String,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self {
            load: LoadOptions::default(),
            cancel_wait: Duration::from_secs(3),
            default_output_name: DEFAULT_OUTPUT_FILENAME.to_string(),
        }
    }
}

/// Lifecycle of one tracked file.
#[derive(Debug, Clone)]
pub enum FileState {
    /// Tracked, load not yet dispatched.
    Pending,
    /// A worker is loading the file.
    Loading { ticket: u64 },
    /// Load finished with at least one section. Never mutated afterwards.
    Loaded(Arc<LoadedFile>),
    /// Load finished with nothing usable.
    Failed,
}

/// Data-free view of a [`FileState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
    Pending,
    Loading,
    Loaded,
    Failed,
}

/// Coordinator state for one input path.
#[derive(Debug, Clone)]
pub struct FileEntry {
    pub path: PathBuf,
    pub state: FileState,
}

impl FileEntry {
    pub fn status(&self) -> EntryStatus {
        match self.state {
            FileState::Pending => EntryStatus::Pending,
            FileState::Loading { .. } => EntryStatus::Loading,
            FileState::Loaded(_) => EntryStatus::Loaded,
            FileState::Failed => EntryStatus::Failed,
        }
    }

    /// Row count shown to the user: `-1` failed, `0` not loaded yet, else total rows.
    pub fn display_rows(&self) -> i64 {
        match &self.state {
            FileState::Failed => -1,
            FileState::Pending | FileState::Loading { .. } => 0,
            FileState::Loaded(file) => file.total_rows() as i64,
        }
    }
}

/// Read-only snapshot of one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntrySnapshot {
    pub path: PathBuf,
    pub status: EntryStatus,
    pub rows: i64,
}

impl EntrySnapshot {
    pub fn rows_display(&self) -> RowDisplay {
        RowDisplay(self.rows)
    }
}

/// Renders a display row count: `failed`, `-`, or the number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowDisplay(pub i64);

impl fmt::Display for RowDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            -1 => f.write_str("failed"),
            0 => f.write_str("-"),
            n => write!(f, "{n}"),
        }
    }
}

/// Result of [`Coordinator::add_file`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// Tracked and dispatched.
    Added,
    /// Already tracked; nothing changed.
    AlreadyTracked,
    /// Extension not recognized; not tracked.
    Unsupported,
}

/// Why a merge cannot start yet.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MergeGate {
    #[error("no files selected; add at least one file or folder")]
    NoFiles,
    #[error("{pending} file(s) are still loading; wait for them to finish before merging")]
    StillLoading { pending: usize },
    #[error("no valid data was loaded; check the files or select others")]
    NoValidData,
}

/// Owns every [`FileEntry`] and the workers loading them.
pub struct Coordinator {
    options: CoordinatorOptions,
    order: Vec<PathBuf>,
    entries: HashMap<PathBuf, FileEntry>,
    workers: HashMap<u64, LoadWorker>,
    exiting: Vec<LoadWorker>,
    next_ticket: u64,
    tx: Sender<LoadCompletion>,
    rx: Receiver<LoadCompletion>,
    metrics: Arc<ExecutionMetrics>,
    last_folder: Option<PathBuf>,
}

impl fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coordinator")
            .field("files", &self.order.len())
            .field("loading", &self.loading_count())
            .field("workers", &self.workers.len())
            .finish()
    }
}

impl Coordinator {
    pub fn new(options: CoordinatorOptions) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            options,
            order: Vec::new(),
            entries: HashMap::new(),
            workers: HashMap::new(),
            exiting: Vec::new(),
            next_ticket: 0,
            tx,
            rx,
            metrics: Arc::new(ExecutionMetrics::new()),
            last_folder: None,
        }
    }

    /// Handle to live worker metrics.
    pub fn metrics(&self) -> Arc<ExecutionMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Track `path` and start loading it in the background. Never blocks.
    pub fn add_file(&mut self, path: impl Into<PathBuf>) -> AddOutcome {
        let path = path.into();
        if !is_supported(&path) {
            tracing::warn!(path = %path.display(), "ignoring file with unsupported extension");
            return AddOutcome::Unsupported;
        }
        if self.entries.contains_key(&path) {
            return AddOutcome::AlreadyTracked;
        }

        self.order.push(path.clone());
        self.entries.insert(
            path.clone(),
            FileEntry {
                path: path.clone(),
                state: FileState::Pending,
            },
        );
        self.dispatch(path);
        AddOutcome::Added
    }

    /// Add every supported file directly inside `dir`; returns the paths newly added.
    pub fn add_folder(&mut self, dir: impl AsRef<Path>) -> MergeResult<Vec<PathBuf>> {
        let dir = dir.as_ref();
        let found = scan_folder(dir)?;
        self.last_folder = Some(dir.to_path_buf());

        let added: Vec<PathBuf> = found
            .into_iter()
            .filter(|p| self.add_file(p.clone()) == AddOutcome::Added)
            .collect();
        tracing::info!(dir = %dir.display(), added = added.len(), "added files from folder");
        Ok(added)
    }

    fn dispatch(&mut self, path: PathBuf) {
        let ticket = self.next_ticket;
        self.next_ticket += 1;

        let spawned = LoadWorker::spawn(
            ticket,
            path.clone(),
            self.options.load.clone(),
            self.tx.clone(),
            Arc::clone(&self.metrics),
        );
        let state = match spawned {
            Ok(worker) => {
                self.workers.insert(ticket, worker);
                tracing::debug!(path = %path.display(), ticket, "load dispatched");
                FileState::Loading { ticket }
            }
            Err(e) => {
                tracing::error!(path = %path.display(), err = %e, "could not start load thread");
                FileState::Failed
            }
        };
        if let Some(entry) = self.entries.get_mut(&path) {
            entry.state = state;
        }
    }

    /// Stop tracking `path`, cancelling its load if one is in flight.
    ///
    /// Waits up to `cancel_wait` for a running worker to exit; a worker still running after that
    /// is detached and its eventual completion ignored. Returns `false` if `path` was not tracked.
    pub fn remove_file(&mut self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        let Some(entry) = self.entries.remove(path) else {
            return false;
        };
        self.order.retain(|p| p != path);

        if let FileState::Loading { ticket } = entry.state {
            if let Some(worker) = self.workers.remove(&ticket) {
                self.stop_worker(worker, self.options.cancel_wait);
            }
        }
        tracing::info!(path = %path.display(), "file removed");
        true
    }

    fn stop_worker(&self, worker: LoadWorker, wait: Duration) {
        let ticket = worker.ticket();
        if worker.stop(wait) == StopOutcome::Detached {
            self.metrics.on_worker_detached();
            tracing::warn!(
                ticket,
                "load did not stop in time; detached worker, its result will be discarded"
            );
        }
    }

    /// Apply every completion already delivered, without blocking. Returns how many entries
    /// changed state.
    pub fn poll(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(done) = self.rx.try_recv() {
            if self.apply(done) {
                applied += 1;
            }
        }
        self.reap_exited();
        applied
    }

    /// Block until no entry is loading or `timeout` elapses. Returns `true` when idle.
    pub fn wait_idle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        self.poll();
        while self.loading_count() > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            match self.rx.recv_timeout(remaining) {
                Ok(done) => {
                    self.apply(done);
                }
                Err(RecvTimeoutError::Timeout) => return false,
                // Unreachable while `self.tx` is alive.
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        self.reap_exited();
        self.loading_count() == 0
    }

    fn apply(&mut self, done: LoadCompletion) -> bool {
        let LoadCompletion { ticket, file } = done;
        if let Some(worker) = self.workers.remove(&ticket) {
            self.exiting.push(worker);
        }

        let Some(entry) = self.entries.get_mut(&file.path) else {
            tracing::debug!(path = %file.path.display(), ticket, "completion for removed file ignored");
            return false;
        };
        if !matches!(entry.state, FileState::Loading { ticket: t } if t == ticket) {
            tracing::debug!(path = %file.path.display(), ticket, "stale completion ignored");
            return false;
        }

        if file.is_empty() {
            tracing::info!(path = %file.path.display(), "load failed");
            entry.state = FileState::Failed;
        } else {
            tracing::info!(
                path = %file.path.display(),
                sections = file.sections.len(),
                rows = file.total_rows(),
                "load finished"
            );
            entry.state = FileState::Loaded(Arc::new(file));
        }
        true
    }

    fn reap_exited(&mut self) {
        let (done, running): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.exiting).into_iter().partition(LoadWorker::is_finished);
        for worker in done {
            worker.reap();
        }
        self.exiting = running;
    }

    /// Number of entries still loading.
    pub fn loading_count(&self) -> usize {
        self.entries
            .values()
            .filter(|e| matches!(e.state, FileState::Loading { .. } | FileState::Pending))
            .count()
    }

    pub fn file_count(&self) -> usize {
        self.order.len()
    }

    pub fn is_tracked(&self, path: impl AsRef<Path>) -> bool {
        self.entries.contains_key(path.as_ref())
    }

    /// Borrow one entry.
    pub fn entry(&self, path: impl AsRef<Path>) -> Option<&FileEntry> {
        self.entries.get(path.as_ref())
    }

    /// Snapshot of every entry in the order files were added.
    pub fn entries(&self) -> Vec<EntrySnapshot> {
        self.order
            .iter()
            .filter_map(|p| self.entries.get(p))
            .map(|e| EntrySnapshot {
                path: e.path.clone(),
                status: e.status(),
                rows: e.display_rows(),
            })
            .collect()
    }

    /// Sum of rows over loaded entries.
    pub fn total_rows(&self) -> usize {
        self.entries
            .values()
            .map(FileEntry::display_rows)
            .filter(|r| *r > 0)
            .sum::<i64>() as usize
    }

    /// The loaded files in the order they were added, if a merge may start.
    ///
    /// Applies any delivered completions first.
    pub fn merge_input(&mut self) -> Result<Vec<Arc<LoadedFile>>, MergeGate> {
        self.poll();
        if self.order.is_empty() {
            return Err(MergeGate::NoFiles);
        }
        let pending = self.loading_count();
        if pending > 0 {
            return Err(MergeGate::StillLoading { pending });
        }

        let files: Vec<Arc<LoadedFile>> = self
            .order
            .iter()
            .filter_map(|p| match self.entries.get(p).map(|e| &e.state) {
                Some(FileState::Loaded(file)) => Some(Arc::clone(file)),
                _ => None,
            })
            .collect();
        if files.is_empty() {
            return Err(MergeGate::NoValidData);
        }
        Ok(files)
    }

    /// Where the save prompt should start: the last folder added, else the directory of the last
    /// file added, else the current directory, joined with the default output name.
    pub fn default_output_path(&self) -> PathBuf {
        let dir = self
            .last_folder
            .clone()
            .or_else(|| {
                self.order
                    .last()
                    .and_then(|p| p.parent())
                    .filter(|p| !p.as_os_str().is_empty())
                    .map(Path::to_path_buf)
            })
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));
        dir.join(&self.options.default_output_name)
    }

    /// Cancel every in-flight load and forget all entries.
    ///
    /// Stop requests go out to all workers first; the `cancel_wait` budget is then shared.
    pub fn shutdown(&mut self) {
        let workers: Vec<LoadWorker> = self.workers.drain().map(|(_, w)| w).collect();
        for worker in &workers {
            worker.request_stop();
        }
        let deadline = Instant::now() + self.options.cancel_wait;
        for worker in workers {
            let remaining = deadline.saturating_duration_since(Instant::now());
            self.stop_worker(worker, remaining);
        }
        for worker in std::mem::take(&mut self.exiting) {
            if worker.is_finished() {
                worker.reap();
            }
        }
        self.entries.clear();
        self.order.clear();
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        if !self.workers.is_empty() {
            self.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_display_sentinels() {
        assert_eq!(RowDisplay(-1).to_string(), "failed");
        assert_eq!(RowDisplay(0).to_string(), "-");
        assert_eq!(RowDisplay(12).to_string(), "12");
    }

    #[test]
    fn unsupported_and_duplicate_adds() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.csv");
        std::fs::write(&path, "Name\nAda\n").unwrap();

        let mut c = Coordinator::new(CoordinatorOptions::default());
        assert_eq!(c.add_file(dir.path().join("notes.txt")), AddOutcome::Unsupported);
        assert_eq!(c.add_file(&path), AddOutcome::Added);
        assert_eq!(c.add_file(&path), AddOutcome::AlreadyTracked);
        assert_eq!(c.file_count(), 1);
        assert!(c.wait_idle(Duration::from_secs(10)));
        assert_eq!(c.entries()[0].rows, 1);
    }

    #[test]
    fn gate_refuses_empty_and_all_failed() {
        let mut c = Coordinator::new(CoordinatorOptions::default());
        assert_eq!(c.merge_input().unwrap_err(), MergeGate::NoFiles);

        c.add_file("definitely/missing.csv");
        assert!(c.wait_idle(Duration::from_secs(10)));
        assert_eq!(c.merge_input().unwrap_err(), MergeGate::NoValidData);
        assert_eq!(c.entries()[0].status, EntryStatus::Failed);
        assert_eq!(c.entries()[0].rows, -1);
        assert_eq!(c.total_rows(), 0);
    }

    #[test]
    fn default_output_path_prefers_folder_then_last_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = Coordinator::new(CoordinatorOptions::default());
        c.add_file(dir.path().join("x.csv"));
        assert_eq!(
            c.default_output_path(),
            dir.path().join(DEFAULT_OUTPUT_FILENAME)
        );

        let other = tempfile::tempdir().unwrap();
        std::fs::write(other.path().join("y.csv"), "a\n1\n").unwrap();
        c.add_folder(other.path()).unwrap();
        assert_eq!(
            c.default_output_path(),
            other.path().join(DEFAULT_OUTPUT_FILENAME)
        );
        c.wait_idle(Duration::from_secs(10));
    }
}
