use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::MergeError;
use crate::formats::SourceFormat;

use super::encoding::TextEncoding;

/// Severity classification used for observer callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LoadSeverity {
    /// Informational event (e.g. a load cancelled on request).
    Info,
    /// Non-fatal: the file was readable but produced nothing usable.
    Warning,
    /// The file could not be parsed.
    Error,
    /// I/O or other infrastructure failures.
    Critical,
}

/// Context about one load attempt.
#[derive(Debug, Clone)]
pub struct LoadContext {
    /// The input path.
    pub path: PathBuf,
    /// Format chosen from the extension.
    pub format: SourceFormat,
}

/// Stats reported on a successful load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadStats {
    /// Number of usable sections.
    pub sections: usize,
    /// Total rows across those sections.
    pub rows: usize,
    /// Encoding used for CSV input.
    pub encoding: Option<TextEncoding>,
}

/// Why a single section was dropped while its siblings were kept.
#[derive(Debug)]
pub enum SkipReason {
    /// No non-empty row to use as a header.
    NoHeader,
    /// A header row but zero data rows.
    NoRows,
    /// The section could not be read.
    Unreadable(MergeError),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoHeader => f.write_str("no header row"),
            SkipReason::NoRows => f.write_str("no data rows"),
            SkipReason::Unreadable(e) => write!(f, "{e}"),
        }
    }
}

/// Observer interface for load outcomes.
///
/// Loads run on worker threads, so implementors must be `Send + Sync`.
pub trait LoadObserver: Send + Sync {
    /// Called when a file yields at least one usable section.
    fn on_loaded(&self, _ctx: &LoadContext, _stats: LoadStats) {}

    /// Called when one section of a file is skipped.
    fn on_section_skipped(&self, _ctx: &LoadContext, _section: &str, _reason: &SkipReason) {}

    /// Called when a whole file fails to load.
    fn on_failure(&self, _ctx: &LoadContext, _severity: LoadSeverity, _error: &MergeError) {}
}

/// An observer that fans out callbacks to a list of observers.
#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn LoadObserver>>,
}

impl CompositeObserver {
    pub fn new(observers: Vec<Arc<dyn LoadObserver>>) -> Self {
        Self { observers }
    }
}

impl fmt::Debug for CompositeObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeObserver")
            .field("observers_len", &self.observers.len())
            .finish()
    }
}

impl LoadObserver for CompositeObserver {
    fn on_loaded(&self, ctx: &LoadContext, stats: LoadStats) {
        for o in &self.observers {
            o.on_loaded(ctx, stats);
        }
    }

    fn on_section_skipped(&self, ctx: &LoadContext, section: &str, reason: &SkipReason) {
        for o in &self.observers {
            o.on_section_skipped(ctx, section, reason);
        }
    }

    fn on_failure(&self, ctx: &LoadContext, severity: LoadSeverity, error: &MergeError) {
        for o in &self.observers {
            o.on_failure(ctx, severity, error);
        }
    }
}

/// Forwards load events to `tracing`.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl LoadObserver for TracingObserver {
    fn on_loaded(&self, ctx: &LoadContext, stats: LoadStats) {
        tracing::info!(
            path = %ctx.path.display(),
            format = ?ctx.format,
            sections = stats.sections,
            rows = stats.rows,
            encoding = stats.encoding.map(TextEncoding::label),
            "file loaded"
        );
    }

    fn on_section_skipped(&self, ctx: &LoadContext, section: &str, reason: &SkipReason) {
        tracing::warn!(
            path = %ctx.path.display(),
            section,
            reason = %reason,
            "section skipped"
        );
    }

    fn on_failure(&self, ctx: &LoadContext, severity: LoadSeverity, error: &MergeError) {
        match severity {
            LoadSeverity::Info => {
                tracing::info!(path = %ctx.path.display(), err = %error, "load stopped")
            }
            LoadSeverity::Warning => {
                tracing::warn!(path = %ctx.path.display(), err = %error, "load produced no data")
            }
            LoadSeverity::Error | LoadSeverity::Critical => {
                tracing::error!(path = %ctx.path.display(), severity = ?severity, err = %error, "load failed")
            }
        }
    }
}
