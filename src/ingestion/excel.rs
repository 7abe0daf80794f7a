use std::io::Cursor;
use std::path::Path;

use calamine::{Data, Reader, Sheets, Xls, Xlsx, open_workbook_auto_from_rs};

use crate::error::{MergeError, MergeResult};
use crate::execution::CancelToken;
use crate::formats::WorkbookKind;
use crate::types::{DataSet, LoadedFile, Section, Value};

use super::CANCEL_CHECK_INTERVAL;
use super::columns::normalize_header;
use super::observability::SkipReason;
use super::unified::LoadOptions;

type Workbook = Sheets<Cursor<Vec<u8>>>;

/// Load every sheet of a workbook (`.xlsx`, `.xls`, `.et`) into a [`LoadedFile`].
///
/// Behavior:
/// - `.xlsx`/`.et` are opened as OOXML and `.xls` as BIFF; if that fails the format is sniffed
///   from the file content
/// - sheets are read independently in workbook order; a sheet that errors, has no header row or
///   has no data rows is skipped and reported to the observer
/// - the first non-empty row of a sheet is its header row
/// - rows that are entirely empty are skipped
pub fn read_workbook_file(
    path: impl AsRef<Path>,
    kind: WorkbookKind,
    options: &LoadOptions,
    cancel: &CancelToken,
) -> MergeResult<LoadedFile> {
    let path = path.as_ref();
    let mut workbook = open_workbook(path, kind)?;

    let mut sections = Vec::new();
    for sheet in workbook.sheet_names() {
        if cancel.is_cancelled() {
            return Err(MergeError::Cancelled {
                path: path.to_path_buf(),
            });
        }

        let range = match workbook.worksheet_range(&sheet) {
            Ok(range) => range,
            Err(e) => {
                options.report_skip(path, &sheet, &SkipReason::Unreadable(e.into()));
                continue;
            }
        };

        match sheet_to_dataset(&range, cancel) {
            SheetRead::Data(data) if !data.is_empty() => sections.push(Section::new(sheet, data)),
            SheetRead::Data(_) => options.report_skip(path, &sheet, &SkipReason::NoRows),
            SheetRead::NoHeader => options.report_skip(path, &sheet, &SkipReason::NoHeader),
            SheetRead::Cancelled => {
                return Err(MergeError::Cancelled {
                    path: path.to_path_buf(),
                });
            }
        }
    }

    Ok(LoadedFile::new(path, sections))
}

fn open_workbook(path: &Path, kind: WorkbookKind) -> MergeResult<Workbook> {
    let bytes = std::fs::read(path)?;

    let preferred: Result<Workbook, calamine::Error> = match kind {
        WorkbookKind::Xlsx | WorkbookKind::Et => Xlsx::new(Cursor::new(bytes.clone()))
            .map(Sheets::Xlsx)
            .map_err(calamine::Error::from),
        WorkbookKind::Xls => Xls::new(Cursor::new(bytes.clone()))
            .map(Sheets::Xls)
            .map_err(calamine::Error::from),
    };

    match preferred {
        Ok(workbook) => Ok(workbook),
        Err(first) => {
            tracing::debug!(
                path = %path.display(),
                err = %first,
                "preferred workbook reader failed; sniffing content"
            );
            open_workbook_auto_from_rs(Cursor::new(bytes)).map_err(|_| MergeError::Excel(first))
        }
    }
}

enum SheetRead {
    Data(DataSet),
    NoHeader,
    Cancelled,
}

fn sheet_to_dataset(range: &calamine::Range<Data>, cancel: &CancelToken) -> SheetRead {
    let mut rows_iter = range.rows().skip_while(|row| row_is_empty(row));
    let Some(header_cells) = rows_iter.next() else {
        return SheetRead::NoHeader;
    };
    let columns = normalize_header(header_cells.iter().map(cell_to_header_string));
    let width = columns.len();

    let mut rows: Vec<Vec<Value>> = Vec::new();
    for (idx, row) in rows_iter.enumerate() {
        if idx % CANCEL_CHECK_INTERVAL == 0 && cancel.is_cancelled() {
            return SheetRead::Cancelled;
        }
        if row_is_empty(row) {
            continue;
        }
        let mut out_row: Vec<Value> = Vec::with_capacity(width);
        for i in 0..width {
            out_row.push(convert_cell(row.get(i).unwrap_or(&Data::Empty)));
        }
        rows.push(out_row);
    }

    SheetRead::Data(DataSet::new(columns, rows))
}

fn row_is_empty(row: &[Data]) -> bool {
    row.iter().all(|c| match c {
        Data::Empty => true,
        Data::String(s) => s.trim().is_empty(),
        _ => false,
    })
}

fn cell_to_header_string(c: &Data) -> String {
    match c {
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => {
            if f.fract() == 0.0 {
                (*f as i64).to_string()
            } else {
                f.to_string()
            }
        }
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => format_excel_datetime(dt),
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
        Data::Error(e) => format!("{e:?}"),
        Data::Empty => String::new(),
    }
}

/// Convert one workbook cell into a [`Value`].
///
/// Integral floats become `Int64` so that `1` from a workbook equals `1` from a CSV file when
/// rows are compared for duplicates.
fn convert_cell(c: &Data) -> Value {
    match c {
        Data::Empty | Data::Error(_) => Value::Null,
        Data::String(s) if s.is_empty() => Value::Null,
        Data::String(s) => Value::Utf8(s.clone()),
        Data::Int(i) => Value::Int64(*i),
        Data::Float(f) => float_value(*f),
        Data::Bool(b) => Value::Bool(*b),
        Data::DateTime(dt) => Value::Utf8(format_excel_datetime(dt)),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Value::Utf8(s.clone()),
    }
}

fn float_value(f: f64) -> Value {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 9.0e15 {
        Value::Int64(f as i64)
    } else {
        Value::Float64(f)
    }
}

/// Render a date cell as `YYYY-MM-DD HH:MM:SS`, dropping any fractional seconds.
fn format_excel_datetime(dt: &calamine::ExcelDateTime) -> String {
    match dt.as_datetime() {
        Some(naive) => {
            let mut text = naive.to_string();
            if let Some(dot) = text.rfind('.') {
                text.truncate(dot);
            }
            text
        }
        None => dt.as_f64().to_string(),
    }
}
