//! Writing the merged table to disk.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use rust_xlsxwriter::Workbook;

use crate::error::{MergeError, MergeResult};
use crate::formats::OutputFormat;
use crate::types::{DataSet, Value};

/// Name of the single worksheet written to XLSX output.
pub const OUTPUT_SHEET_NAME: &str = "Sheet1";

const XLSX_MAX_ROWS: usize = 1_048_576;
const XLSX_MAX_COLS: usize = 16_384;
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";
/// Largest magnitude an XLSX number cell (an IEEE double) holds exactly.
const XLSX_EXACT_INT: u64 = 1 << 53;

/// A save attempt that did not produce a usable file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveFailure {
    pub path: PathBuf,
    pub message: String,
}

/// Write `table` to `path` and report whether a non-empty file now exists there.
///
/// Every error is caught and logged; this never panics or propagates.
pub fn save_result(table: &DataSet, path: impl AsRef<Path>) -> bool {
    try_save(table, path.as_ref()).is_ok()
}

/// Like [`save_result`], returning the written size or a [`SaveFailure`].
pub fn try_save(table: &DataSet, path: &Path) -> Result<u64, SaveFailure> {
    write_result(table, path).map_err(|e| {
        tracing::error!(path = %path.display(), err = %e, "saving merged result failed");
        SaveFailure {
            path: path.to_path_buf(),
            message: e.to_string(),
        }
    })
}

/// Write `table` to `path` in the format selected by its extension.
///
/// - `.csv`: UTF-8 with byte-order mark, header row, no index column
/// - anything else: XLSX with one sheet, header row, no index column
///
/// Returns the size of the written file. A write that returns without error but leaves the
/// path missing or empty is reported as [`MergeError::EmptyOutput`]. Sheet limits are checked
/// before the path is touched, so a refused table leaves an existing file alone. A file this
/// call created or truncated is removed when the write then fails.
pub fn write_result(table: &DataSet, path: impl AsRef<Path>) -> MergeResult<u64> {
    let path = path.as_ref();
    let format = OutputFormat::from_path(path);
    if format == OutputFormat::Xlsx {
        check_sheet_limits(table)?;
    }

    let mut touched = false;
    let written = match format {
        OutputFormat::Csv => write_csv(table, path, &mut touched),
        OutputFormat::Xlsx => write_xlsx(table, path, &mut touched),
    };
    if let Err(e) = written {
        if touched && path.is_file() {
            let _ = std::fs::remove_file(path);
        }
        return Err(e);
    }

    match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() && meta.len() > 0 => Ok(meta.len()),
        _ => Err(MergeError::EmptyOutput {
            path: path.to_path_buf(),
        }),
    }
}

fn write_csv(table: &DataSet, path: &Path, touched: &mut bool) -> MergeResult<()> {
    let file = File::create(path)?;
    *touched = true;
    let mut file = BufWriter::new(file);
    file.write_all(UTF8_BOM)?;

    let mut wtr = csv::Writer::from_writer(file);
    wtr.write_record(&table.columns)?;
    for row in &table.rows {
        wtr.write_record(row.iter().map(Value::to_string))?;
    }
    wtr.flush()?;
    Ok(())
}

fn check_sheet_limits(table: &DataSet) -> MergeResult<()> {
    if table.row_count() + 1 > XLSX_MAX_ROWS {
        return Err(MergeError::SheetLimit {
            message: format!("{} rows (max {})", table.row_count(), XLSX_MAX_ROWS - 1),
        });
    }
    if table.column_count() > XLSX_MAX_COLS {
        return Err(MergeError::SheetLimit {
            message: format!("{} columns (max {XLSX_MAX_COLS})", table.column_count()),
        });
    }
    Ok(())
}

fn write_xlsx(table: &DataSet, path: &Path, touched: &mut bool) -> MergeResult<()> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(OUTPUT_SHEET_NAME)?;

    // Bounds were checked by `check_sheet_limits`, so the narrowing casts below cannot truncate.
    for (c, name) in table.columns.iter().enumerate() {
        sheet.write_string(0, c as u16, name)?;
    }
    for (r, row) in table.rows.iter().enumerate() {
        let r = (r + 1) as u32;
        for (c, value) in row.iter().enumerate() {
            let c = c as u16;
            match value {
                Value::Null => {}
                Value::Int64(v) if v.unsigned_abs() > XLSX_EXACT_INT => {
                    sheet.write_string(r, c, &v.to_string())?;
                }
                Value::Int64(v) => {
                    sheet.write_number(r, c, *v as f64)?;
                }
                Value::Float64(v) if v.is_finite() => {
                    sheet.write_number(r, c, *v)?;
                }
                Value::Float64(v) => {
                    sheet.write_string(r, c, &v.to_string())?;
                }
                Value::Bool(v) => {
                    sheet.write_boolean(r, c, *v)?;
                }
                Value::Utf8(v) => {
                    sheet.write_string(r, c, v)?;
                }
            }
        }
    }

    *touched = true;
    workbook.save(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DataSet {
        DataSet::new(
            vec!["Name".to_string(), "Age".to_string()],
            vec![
                vec![Value::Utf8("张三".to_string()), Value::Int64(30)],
                vec![Value::Utf8("Ada, L.".to_string()), Value::Null],
            ],
        )
    }

    #[test]
    fn csv_output_has_bom_header_and_no_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        assert!(save_result(&sample(), &path));

        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(UTF8_BOM));
        let text = std::str::from_utf8(&bytes[3..]).unwrap().replace("\r\n", "\n");
        assert_eq!(text, "Name,Age\n张三,30\n\"Ada, L.\",\n");
    }

    #[test]
    fn xlsx_output_is_written_for_other_extensions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.xlsx");
        let size = write_result(&sample(), &path).unwrap();
        assert!(size > 0);
    }

    #[test]
    fn oversized_table_leaves_existing_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.xlsx");
        std::fs::write(&path, b"precious user data").unwrap();

        let columns: Vec<String> = (0..=XLSX_MAX_COLS).map(|i| format!("c{i}")).collect();
        let wide = DataSet::new(columns, Vec::new());
        let err = write_result(&wide, &path).unwrap_err();
        assert!(matches!(err, MergeError::SheetLimit { .. }));
        assert_eq!(std::fs::read(&path).unwrap(), b"precious user data");
    }

    #[test]
    fn large_integers_keep_every_digit_in_xlsx() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ids.xlsx");
        let table = DataSet::new(
            vec!["id".to_string(), "n".to_string()],
            vec![vec![Value::Int64(110101199001011234), Value::Int64(4_503_599_627_370_496)]],
        );
        write_result(&table, &path).unwrap();

        let reloaded = crate::ingestion::load_file(&path, &crate::ingestion::LoadOptions::default());
        assert_eq!(
            reloaded.sections[0].data.rows[0],
            vec![
                Value::Utf8("110101199001011234".to_string()),
                Value::Int64(4_503_599_627_370_496),
            ]
        );
    }

    #[test]
    fn save_into_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no/such/dir/out.csv");
        assert!(!save_result(&sample(), &path));
        let failure = try_save(&sample(), &path).unwrap_err();
        assert_eq!(failure.path, path);
        assert!(failure.message.contains("io error"));
    }
}
