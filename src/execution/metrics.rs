use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

/// Live counters for background loads.
///
/// Workers update these while running; callers can snapshot them at any time. They are
/// informational only and never drive coordinator decisions.
pub struct ExecutionMetrics {
    loads_started: AtomicU64,
    loads_finished: AtomicU64,
    loads_cancelled: AtomicU64,
    workers_detached: AtomicU64,
    load_time_ns: AtomicU64,

    active_loads: AtomicUsize,
    max_active_loads: AtomicUsize,
}

impl ExecutionMetrics {
    pub fn new() -> Self {
        Self {
            loads_started: AtomicU64::new(0),
            loads_finished: AtomicU64::new(0),
            loads_cancelled: AtomicU64::new(0),
            workers_detached: AtomicU64::new(0),
            load_time_ns: AtomicU64::new(0),
            active_loads: AtomicUsize::new(0),
            max_active_loads: AtomicUsize::new(0),
        }
    }

    pub fn on_load_start(&self) {
        let _ = self.loads_started.fetch_add(1, Ordering::SeqCst);
        let now = self.active_loads.fetch_add(1, Ordering::SeqCst) + 1;
        update_max_usize(&self.max_active_loads, now);
    }

    pub fn on_load_end(&self, elapsed: Duration, cancelled: bool) {
        let _ = self.loads_finished.fetch_add(1, Ordering::SeqCst);
        if cancelled {
            let _ = self.loads_cancelled.fetch_add(1, Ordering::SeqCst);
        }
        let add = elapsed.as_nanos().min(u64::MAX as u128) as u64;
        let _ = self.load_time_ns.fetch_add(add, Ordering::SeqCst);
        let _ = self.active_loads.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn on_worker_detached(&self) {
        let _ = self.workers_detached.fetch_add(1, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> ExecutionMetricsSnapshot {
        ExecutionMetricsSnapshot {
            loads_started: self.loads_started.load(Ordering::SeqCst),
            loads_finished: self.loads_finished.load(Ordering::SeqCst),
            loads_cancelled: self.loads_cancelled.load(Ordering::SeqCst),
            workers_detached: self.workers_detached.load(Ordering::SeqCst),
            load_time: Duration::from_nanos(self.load_time_ns.load(Ordering::SeqCst)),
            active_loads: self.active_loads.load(Ordering::SeqCst),
            max_active_loads: self.max_active_loads.load(Ordering::SeqCst),
        }
    }
}

impl Default for ExecutionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ExecutionMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ExecutionMetrics").field(&self.snapshot()).finish()
    }
}

fn update_max_usize(dst: &AtomicUsize, now: usize) {
    loop {
        let cur = dst.load(Ordering::SeqCst);
        if now <= cur {
            break;
        }
        if dst
            .compare_exchange(cur, now, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            break;
        }
    }
}

/// Immutable snapshot of [`ExecutionMetrics`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionMetricsSnapshot {
    pub loads_started: u64,
    pub loads_finished: u64,
    pub loads_cancelled: u64,
    pub workers_detached: u64,
    /// Sum of wall-clock time spent in finished loads.
    pub load_time: Duration,
    pub active_loads: usize,
    pub max_active_loads: usize,
}

impl fmt::Display for ExecutionMetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "loads={}/{}, cancelled={}, detached={}, active={}, max_active={}, load_time={:?}",
            self.loads_finished,
            self.loads_started,
            self.loads_cancelled,
            self.workers_detached,
            self.active_loads,
            self.max_active_loads,
            self.load_time
        )
    }
}
