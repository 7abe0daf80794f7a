use std::path::PathBuf;

use thiserror::Error;

/// Convenience result type used across loading, merging and saving.
pub type MergeResult<T> = Result<T, MergeError>;

/// Error type shared by the loader, the merge engine and the result writer.
///
/// Most of these never cross the crate's public "status value" boundary: the loader turns them
/// into an empty section list and [`crate::output::save_result`] turns them into `false`. The
/// fallible variants (`write_result`, `scan_folder`, config loading) return them directly.
#[derive(Debug, Error)]
pub enum MergeError {
    /// Underlying I/O error (e.g. file not found, permission denied).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Workbook could not be opened or a sheet could not be read.
    #[error("excel error: {0}")]
    Excel(#[from] calamine::Error),

    /// CSV parse or write error.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// XLSX write error.
    #[error("xlsx write error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    /// Configuration file could not be parsed.
    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),

    /// Folder scan pattern was invalid (e.g. the folder name contains glob metacharacters).
    #[error("invalid folder pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    /// The path's extension is not one of the recognized formats.
    #[error("unsupported file extension for path ({})", .path.display())]
    UnsupportedExtension { path: PathBuf },

    /// None of the candidate encodings could decode the file.
    #[error("could not decode ({}) with any of: {tried}", .path.display())]
    Undecodable { path: PathBuf, tried: String },

    /// The file was opened but no section had a header and at least one data row.
    #[error("no usable rows in ({})", .path.display())]
    NoUsableRows { path: PathBuf },

    /// A folder contained no file with a recognized extension.
    #[error("no supported files found in folder ({})", .dir.display())]
    NoSupportedFiles { dir: PathBuf },

    /// The write call returned but the output file is missing or empty.
    #[error("output file is missing or empty after write ({})", .path.display())]
    EmptyOutput { path: PathBuf },

    /// The merged table does not fit in a single worksheet.
    #[error("table exceeds worksheet limits: {message}")]
    SheetLimit { message: String },

    /// A load was cancelled before it finished.
    #[error("load cancelled ({})", .path.display())]
    Cancelled { path: PathBuf },
}
