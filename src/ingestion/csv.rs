//! CSV loading: encoding fallback, header normalization and cell type inference.

use std::path::{Path, PathBuf};

use crate::error::{MergeError, MergeResult};
use crate::execution::CancelToken;
use crate::types::{DataSet, LoadedFile, Section, Value};

use super::CANCEL_CHECK_INTERVAL;
use super::columns::normalize_header;
use super::encoding::decode_with_fallback;
use super::unified::LoadOptions;

/// Section name given to the single table of a CSV file.
pub const CSV_SECTION_NAME: &str = "Sheet1";

/// Cell texts read as missing values.
pub const NA_VALUES: [&str; 18] = [
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN", "<NA>",
    "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Load a CSV file into a [`LoadedFile`] with at most one section.
///
/// Rules:
///
/// - the file is decoded with the first of `options.encodings` that decodes cleanly
/// - the first record is the header row
/// - records shorter than the header are padded with nulls, longer ones are truncated
/// - blank records are skipped
/// - a file with a header but no data rows yields no sections
pub fn read_csv_file(
    path: impl AsRef<Path>,
    options: &LoadOptions,
    cancel: &CancelToken,
) -> MergeResult<LoadedFile> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;
    let (encoding, text) =
        decode_with_fallback(&bytes, &options.encodings).ok_or_else(|| MergeError::Undecodable {
            path: path.to_path_buf(),
            tried: options
                .encodings
                .iter()
                .map(|e| e.label())
                .collect::<Vec<_>>()
                .join(", "),
        })?;

    let data = parse_csv_inner(path, &text, options.delimiter, cancel)?;
    let sections = if data.is_empty() {
        options.report_skip(path, CSV_SECTION_NAME, &super::SkipReason::NoRows);
        Vec::new()
    } else {
        vec![Section::new(CSV_SECTION_NAME, data)]
    };

    Ok(LoadedFile {
        path: path.to_path_buf(),
        encoding: Some(encoding),
        sections,
    })
}

/// Parse already-decoded CSV text into a [`DataSet`].
pub fn parse_csv(text: &str, delimiter: u8) -> MergeResult<DataSet> {
    parse_csv_inner(Path::new(""), text, delimiter, &CancelToken::new())
}

fn parse_csv_inner(
    path: &Path,
    text: &str,
    delimiter: u8,
    cancel: &CancelToken,
) -> MergeResult<DataSet> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(text.as_bytes());

    let headers = rdr.headers()?.clone();
    if headers.is_empty() {
        return Ok(DataSet::default());
    }
    let columns = normalize_header(headers.iter());
    let width = columns.len();

    let mut rows: Vec<Vec<Value>> = Vec::new();
    for (idx, result) in rdr.records().enumerate() {
        if idx % CANCEL_CHECK_INTERVAL == 0 && cancel.is_cancelled() {
            return Err(cancelled(path));
        }
        let record = result?;
        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }

        let mut row: Vec<Value> = Vec::with_capacity(width);
        for i in 0..width {
            row.push(infer_value(record.get(i).unwrap_or("")));
        }
        rows.push(row);
    }

    Ok(DataSet::new(columns, rows))
}

fn cancelled(path: &Path) -> MergeError {
    MergeError::Cancelled {
        path: PathBuf::from(path),
    }
}

/// Infer a typed [`Value`] from one CSV cell.
///
/// Empty cells and [`NA_VALUES`] become `Null`; integers, floats and `true`/`false`
/// (case-insensitive) are parsed; anything else stays text.
pub fn infer_value(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed.is_empty() || NA_VALUES.contains(&trimmed) {
        return Value::Null;
    }

    // Only attempt numeric parsing on digit-bearing cells so words like "inf" stay text.
    if trimmed.bytes().any(|b| b.is_ascii_digit()) {
        if let Ok(v) = trimmed.parse::<i64>() {
            return Value::Int64(v);
        }
        if let Ok(v) = trimmed.parse::<f64>() {
            return Value::Float64(v);
        }
    }

    if trimmed.eq_ignore_ascii_case("true") {
        Value::Bool(true)
    } else if trimmed.eq_ignore_ascii_case("false") {
        Value::Bool(false)
    } else {
        Value::Utf8(raw.to_owned())
    }
}
