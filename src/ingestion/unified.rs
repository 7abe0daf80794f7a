//! Unified load entrypoint.
//!
//! Most callers should use [`load_file`], which reads every usable section of one input file.
//! It never returns an error: any failure yields a [`LoadedFile`] with no sections, and the
//! cause is reported to the configured [`LoadObserver`].

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::error::MergeError;
use crate::execution::CancelToken;
use crate::formats::SourceFormat;
use crate::types::LoadedFile;

use super::encoding::{CSV_ENCODINGS, TextEncoding};
use super::observability::{LoadContext, LoadObserver, LoadSeverity, LoadStats, SkipReason};
use super::{csv, excel};

/// Options controlling how files are loaded.
///
/// Use [`Default`] for common cases.
#[derive(Clone)]
pub struct LoadOptions {
    /// Candidate encodings for CSV files, tried in order.
    pub encodings: Vec<TextEncoding>,
    /// CSV field delimiter.
    pub delimiter: u8,
    /// Optional observer for load outcomes.
    pub observer: Option<Arc<dyn LoadObserver>>,
}

impl fmt::Debug for LoadOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadOptions")
            .field("encodings", &self.encodings)
            .field("delimiter", &(self.delimiter as char))
            .field("observer_set", &self.observer.is_some())
            .finish()
    }
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            encodings: CSV_ENCODINGS.to_vec(),
            delimiter: b',',
            observer: None,
        }
    }
}

impl LoadOptions {
    pub(crate) fn report_skip(&self, path: &Path, section: &str, reason: &SkipReason) {
        if let (Some(obs), Some(format)) = (self.observer.as_ref(), SourceFormat::from_path(path)) {
            let ctx = LoadContext {
                path: path.to_path_buf(),
                format,
            };
            obs.on_section_skipped(&ctx, section, reason);
        }
    }
}

/// Load all usable sections of `path`.
///
/// # Examples
///
/// ```no_run
/// use sheet_merge::ingestion::{load_file, LoadOptions};
///
/// let file = load_file("people.csv", &LoadOptions::default());
/// if file.is_empty() {
///     println!("load failed");
/// } else {
///     println!("rows={}", file.total_rows());
/// }
/// ```
pub fn load_file(path: impl AsRef<Path>, options: &LoadOptions) -> LoadedFile {
    load_file_with_cancel(path, options, &CancelToken::new())
}

/// Like [`load_file`], but stops early (returning an empty result) once `cancel` is set.
pub fn load_file_with_cancel(
    path: impl AsRef<Path>,
    options: &LoadOptions,
    cancel: &CancelToken,
) -> LoadedFile {
    let path = path.as_ref();
    let Some(format) = SourceFormat::from_path(path) else {
        tracing::warn!(path = %path.display(), "unsupported extension; not loading");
        return LoadedFile::failed(path);
    };

    let ctx = LoadContext {
        path: path.to_path_buf(),
        format,
    };

    let result = match format {
        SourceFormat::Csv => csv::read_csv_file(path, options, cancel),
        SourceFormat::Workbook(kind) => excel::read_workbook_file(path, kind, options, cancel),
    };

    let result = result.and_then(|file| {
        if file.is_empty() {
            Err(MergeError::NoUsableRows {
                path: path.to_path_buf(),
            })
        } else {
            Ok(file)
        }
    });

    match result {
        Ok(file) => {
            if let Some(obs) = options.observer.as_ref() {
                let stats = LoadStats {
                    sections: file.sections.len(),
                    rows: file.total_rows(),
                    encoding: file.encoding,
                };
                obs.on_loaded(&ctx, stats);
            }
            file
        }
        Err(e) => {
            if let Some(obs) = options.observer.as_ref() {
                obs.on_failure(&ctx, severity_for_error(&e), &e);
            }
            LoadedFile::failed(path)
        }
    }
}

fn severity_for_error(e: &MergeError) -> LoadSeverity {
    match e {
        MergeError::Io(_) => LoadSeverity::Critical,
        MergeError::Csv(err) => match err.kind() {
            ::csv::ErrorKind::Io(_) => LoadSeverity::Critical,
            _ => LoadSeverity::Error,
        },
        MergeError::Cancelled { .. } => LoadSeverity::Info,
        MergeError::NoUsableRows { .. } => LoadSeverity::Warning,
        _ => LoadSeverity::Error,
    }
}
