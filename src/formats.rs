//! Recognized input/output formats and folder scanning.

use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};

use crate::error::{MergeError, MergeResult};

/// File extensions accepted as merge inputs (lowercase, without the dot).
pub const SUPPORTED_EXTENSIONS: [&str; 4] = ["xlsx", "xls", "et", "csv"];

/// Name offered by default when saving the merged result.
pub const DEFAULT_OUTPUT_FILENAME: &str = "合并结果.xlsx";

/// How an input file is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    /// Delimited text, one implicit section.
    Csv,
    /// Workbook with one section per sheet.
    Workbook(WorkbookKind),
}

/// Workbook flavours, used to pick the first reader to try.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkbookKind {
    /// Office Open XML (`.xlsx`).
    Xlsx,
    /// Legacy BIFF (`.xls`).
    Xls,
    /// WPS spreadsheet (`.et`), usually OOXML inside.
    Et,
}

impl SourceFormat {
    /// Parse a source format from a file extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "csv" => Some(Self::Csv),
            "xlsx" => Some(Self::Workbook(WorkbookKind::Xlsx)),
            "xls" => Some(Self::Workbook(WorkbookKind::Xls)),
            "et" => Some(Self::Workbook(WorkbookKind::Et)),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|s| s.to_str())
            .and_then(Self::from_extension)
    }
}

/// Whether `path` carries one of the [`SUPPORTED_EXTENSIONS`].
pub fn is_supported(path: &Path) -> bool {
    SourceFormat::from_path(path).is_some()
}

/// Format of the merged output, chosen purely by the output path's extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// UTF-8 CSV with byte-order mark.
    Csv,
    /// Single-sheet XLSX workbook.
    Xlsx,
}

impl OutputFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|s| s.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => Self::Csv,
            _ => Self::Xlsx,
        }
    }
}

/// List the supported files directly inside `dir` (non-recursive).
///
/// Extensions are matched case-insensitively. The result is sorted and free of duplicates.
/// Returns [`MergeError::NoSupportedFiles`] if nothing matches.
pub fn scan_folder(dir: impl AsRef<Path>) -> MergeResult<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let options = MatchOptions {
        case_sensitive: false,
        require_literal_separator: true,
        require_literal_leading_dot: false,
    };
    let base = Pattern::escape(&dir.to_string_lossy());

    let mut found = Vec::new();
    for ext in SUPPORTED_EXTENSIONS {
        let pattern = format!("{base}/*.{ext}");
        for entry in glob::glob_with(&pattern, options)? {
            match entry {
                Ok(path) if path.is_file() => found.push(path),
                Ok(_) => {}
                Err(e) => tracing::debug!(error = %e, "skipping unreadable folder entry"),
            }
        }
    }
    found.sort();
    found.dedup();

    if found.is_empty() {
        return Err(MergeError::NoSupportedFiles {
            dir: dir.to_path_buf(),
        });
    }
    Ok(found)
}
