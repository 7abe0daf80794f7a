//! File loading entrypoints and implementations.
//!
//! Most callers should use [`load_file`] (from [`unified`]) which:
//!
//! - picks the reader from the file extension
//! - decodes CSV files with the first candidate [`TextEncoding`] that succeeds
//! - reads every sheet of a workbook, skipping sheets that fail or are empty
//! - reports outcomes to an optional [`LoadObserver`]
//!
//! Format-specific functions are also available under [`csv`] and [`excel`].

pub mod columns;
pub mod csv;
pub mod encoding;
pub mod excel;
pub mod observability;
pub mod unified;

/// Rows read between two checks of the cancellation token.
pub const CANCEL_CHECK_INTERVAL: usize = 1_024;

pub use encoding::{CSV_ENCODINGS, TextEncoding, decode_with_fallback};
pub use observability::{
    CompositeObserver, LoadContext, LoadObserver, LoadSeverity, LoadStats, SkipReason, TracingObserver,
};
pub use unified::{LoadOptions, load_file, load_file_with_cancel};
