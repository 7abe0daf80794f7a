//! The interactive merge flow as a resumable state machine.
//!
//! A [`MergePipeline`] starts from the coordinator's loaded files and stops at every point where
//! a person has to decide something: which header to use when sections disagree, whether to
//! drop duplicate rows, and where to save. Each pause is a [`PipelineStage`]; the matching
//! `resolve_*` method answers it and advances the machine. [`MergePipeline::run_with`] drives
//! the whole flow from a [`DecisionProvider`].

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::header::{HeaderCheck, HeaderDescriptor, check_consistency, extract_headers};
use crate::output::{SaveFailure, try_save};
use crate::processing::{MergeStat, drop_duplicates, duplicate_count, merge};
use crate::types::{DataSet, LoadedFile};

/// Where the pipeline is waiting, or how it ended.
#[derive(Debug, Clone)]
pub enum PipelineStage {
    /// Section headers differ; one of them must be chosen as the target.
    AwaitingHeaderChoice(Vec<HeaderDescriptor>),
    /// The merged table has `duplicates` excess duplicate rows out of `rows`.
    AwaitingDedupeChoice { duplicates: usize, rows: usize },
    /// Ready to save. `last_failure` is set after a failed attempt.
    AwaitingSavePath {
        default_path: PathBuf,
        last_failure: Option<SaveFailure>,
    },
    Finished(PipelineOutcome),
}

impl PipelineStage {
    fn name(&self) -> &'static str {
        match self {
            PipelineStage::AwaitingHeaderChoice(_) => "header choice",
            PipelineStage::AwaitingDedupeChoice { .. } => "dedupe choice",
            PipelineStage::AwaitingSavePath { .. } => "save path",
            PipelineStage::Finished(_) => "finished",
        }
    }
}

/// Why a run stopped without saving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CancelReason {
    NoHeaderChosen,
    NotSaved,
}

/// Terminal state of a pipeline run.
#[derive(Debug, Clone)]
pub enum PipelineOutcome {
    Saved { path: PathBuf, report: MergeReport },
    /// The merge produced no rows; nothing was saved.
    EmptyResult,
    Cancelled(CancelReason),
}

/// Summary of one merge run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    pub target_header: Vec<String>,
    pub statistics: Vec<MergeStat>,
    /// Rows after concatenation, before any duplicate removal.
    pub merged_rows: usize,
    pub duplicates: usize,
    pub removed: usize,
    pub final_rows: usize,
}

impl fmt::Display for MergeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "merge statistics:")?;
        for stat in &self.statistics {
            writeln!(f, "  {} - {}: {} rows", stat.file, stat.sheet, stat.rows)?;
        }
        writeln!(f, "merged total: {} rows", self.merged_rows)?;
        match (self.duplicates, self.removed) {
            (0, _) => write!(f, "final total: {} rows", self.final_rows),
            (_, 0) => write!(
                f,
                "final total: {} rows ({} duplicate rows kept)",
                self.final_rows, self.duplicates
            ),
            (_, removed) => write!(
                f,
                "after dedupe: {} rows ({removed} duplicate rows removed)",
                self.final_rows
            ),
        }
    }
}

/// A `resolve_*` call that does not match the current stage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("pipeline is waiting for {actual}, not {expected}")]
pub struct StageMismatch {
    pub expected: &'static str,
    pub actual: &'static str,
}

/// Answers the pipeline's questions.
pub trait DecisionProvider {
    /// Pick the target header among `descriptors`; `None` abandons the merge.
    fn choose_header(&mut self, descriptors: &[HeaderDescriptor]) -> Option<Vec<String>>;

    /// Whether to drop `duplicates` duplicate rows out of `rows`.
    fn confirm_dedupe(&mut self, duplicates: usize, rows: usize) -> bool;

    /// Where to save; `None` ends without saving. `last_failure` carries the previous failed
    /// attempt, if any.
    fn choose_save_path(
        &mut self,
        default_path: &Path,
        last_failure: Option<&SaveFailure>,
    ) -> Option<PathBuf>;
}

/// One merge run over a fixed set of loaded files.
#[derive(Debug)]
pub struct MergePipeline {
    files: Vec<Arc<LoadedFile>>,
    stage: PipelineStage,
    default_path: PathBuf,
    table: DataSet,
    report: MergeReport,
}

impl MergePipeline {
    /// Inspect headers and advance as far as possible without a decision.
    pub fn new(files: Vec<Arc<LoadedFile>>, default_path: impl Into<PathBuf>) -> Self {
        let descriptors = extract_headers(&files);
        tracing::info!(sections = descriptors.len(), "checking header consistency");

        let mut pipeline = Self {
            files,
            stage: PipelineStage::Finished(PipelineOutcome::EmptyResult),
            default_path: default_path.into(),
            table: DataSet::default(),
            report: MergeReport::default(),
        };
        match check_consistency(descriptors) {
            HeaderCheck::Consistent(header) => {
                tracing::info!("all headers match; merging directly");
                pipeline.merge_with(header.unwrap_or_default());
            }
            HeaderCheck::Inconsistent(descriptors) => {
                tracing::info!("headers differ; waiting for a target header");
                pipeline.stage = PipelineStage::AwaitingHeaderChoice(descriptors);
            }
        }
        pipeline
    }

    pub fn stage(&self) -> &PipelineStage {
        &self.stage
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.stage, PipelineStage::Finished(_))
    }

    /// The merged table as it currently stands (after dedupe, if applied).
    pub fn table(&self) -> &DataSet {
        &self.table
    }

    pub fn report(&self) -> &MergeReport {
        &self.report
    }

    /// Answer [`PipelineStage::AwaitingHeaderChoice`]. `None` or an empty header cancels.
    pub fn resolve_header(
        &mut self,
        choice: Option<Vec<String>>,
    ) -> Result<&PipelineStage, StageMismatch> {
        self.require_stage("header choice", |s| {
            matches!(s, PipelineStage::AwaitingHeaderChoice(_))
        })?;
        match choice.filter(|h| !h.is_empty()) {
            Some(header) => self.merge_with(header),
            None => {
                tracing::warn!("no header chosen; merge abandoned");
                self.stage = PipelineStage::Finished(PipelineOutcome::Cancelled(
                    CancelReason::NoHeaderChosen,
                ));
            }
        }
        Ok(&self.stage)
    }

    /// Answer [`PipelineStage::AwaitingDedupeChoice`].
    pub fn resolve_dedupe(&mut self, remove: bool) -> Result<&PipelineStage, StageMismatch> {
        self.require_stage("dedupe choice", |s| {
            matches!(s, PipelineStage::AwaitingDedupeChoice { .. })
        })?;
        if remove {
            let before = self.table.row_count();
            self.table = drop_duplicates(&self.table);
            self.report.removed = before - self.table.row_count();
            tracing::info!(
                removed = self.report.removed,
                remaining = self.table.row_count(),
                "duplicate rows removed"
            );
        } else {
            tracing::info!("keeping duplicate rows");
        }
        self.report.final_rows = self.table.row_count();
        self.await_save(None);
        Ok(&self.stage)
    }

    /// Answer [`PipelineStage::AwaitingSavePath`]. A failed save stays in this stage with the
    /// failed path as the next default.
    pub fn resolve_save(&mut self, path: Option<PathBuf>) -> Result<&PipelineStage, StageMismatch> {
        self.require_stage("save path", |s| {
            matches!(s, PipelineStage::AwaitingSavePath { .. })
        })?;
        let Some(path) = path else {
            tracing::info!("merged result not saved");
            self.stage = PipelineStage::Finished(PipelineOutcome::Cancelled(CancelReason::NotSaved));
            return Ok(&self.stage);
        };

        match try_save(&self.table, &path) {
            Ok(bytes) => {
                tracing::info!(path = %path.display(), bytes, rows = self.table.row_count(), "merged result saved");
                self.stage = PipelineStage::Finished(PipelineOutcome::Saved {
                    path,
                    report: self.report.clone(),
                });
            }
            Err(failure) => {
                self.default_path = path;
                self.await_save(Some(failure));
            }
        }
        Ok(&self.stage)
    }

    /// Drive the pipeline to a terminal state, asking `provider` at every pause.
    pub fn run_with<P: DecisionProvider + ?Sized>(mut self, provider: &mut P) -> PipelineOutcome {
        loop {
            // Every branch answers the stage it matched, so the results cannot be mismatches.
            let _ = match &self.stage {
                PipelineStage::Finished(outcome) => return outcome.clone(),
                PipelineStage::AwaitingHeaderChoice(descriptors) => {
                    let choice = provider.choose_header(descriptors);
                    self.resolve_header(choice)
                }
                PipelineStage::AwaitingDedupeChoice { duplicates, rows } => {
                    let remove = provider.confirm_dedupe(*duplicates, *rows);
                    self.resolve_dedupe(remove)
                }
                PipelineStage::AwaitingSavePath {
                    default_path,
                    last_failure,
                } => {
                    let path = provider.choose_save_path(default_path, last_failure.as_ref());
                    self.resolve_save(path)
                }
            };
        }
    }

    fn require_stage(
        &self,
        expected: &'static str,
        matches: impl FnOnce(&PipelineStage) -> bool,
    ) -> Result<(), StageMismatch> {
        if matches(&self.stage) {
            Ok(())
        } else {
            Err(StageMismatch {
                expected,
                actual: self.stage.name(),
            })
        }
    }

    fn merge_with(&mut self, target: Vec<String>) {
        let (table, statistics) = merge(&self.files, &target);
        tracing::info!(rows = table.row_count(), columns = target.len(), "sections merged");

        self.report = MergeReport {
            merged_rows: table.row_count(),
            final_rows: table.row_count(),
            target_header: target,
            statistics,
            ..MergeReport::default()
        };
        self.table = table;

        if self.table.is_empty() {
            tracing::warn!("merged result is empty");
            self.stage = PipelineStage::Finished(PipelineOutcome::EmptyResult);
            return;
        }

        let duplicates = duplicate_count(&self.table);
        self.report.duplicates = duplicates;
        if duplicates > 0 {
            tracing::info!(duplicates, "duplicate rows detected");
            self.stage = PipelineStage::AwaitingDedupeChoice {
                duplicates,
                rows: self.table.row_count(),
            };
        } else {
            self.await_save(None);
        }
    }

    fn await_save(&mut self, last_failure: Option<SaveFailure>) {
        self.stage = PipelineStage::AwaitingSavePath {
            default_path: self.default_path.clone(),
            last_failure,
        };
    }
}
