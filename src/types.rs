//! Core data model types for loading and merging.
//!
//! A loaded file is a [`LoadedFile`] holding one or more named [`Section`]s (one per worksheet,
//! or the single implicit sheet of a CSV file). Each section wraps an untyped-header
//! [`DataSet`]: an ordered list of column names plus row-major [`Value`] storage.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::ingestion::TextEncoding;

/// A single cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Missing/empty value.
    Null,
    /// 64-bit signed integer.
    Int64(i64),
    /// 64-bit float.
    Float64(f64),
    /// Boolean.
    Bool(bool),
    /// UTF-8 string.
    Utf8(String),
}

impl Value {
    /// Returns `true` for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl fmt::Display for Value {
    /// Renders the value the way it is written to CSV output; nulls render as an empty string.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Int64(v) => write!(f, "{v}"),
            Value::Float64(v) => write!(f, "{v}"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Utf8(v) => f.write_str(v),
        }
    }
}

/// In-memory tabular dataset.
///
/// Rows are stored as `Vec<Vec<Value>>` in the same order as `columns`. Every row has exactly
/// `columns.len()` values.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataSet {
    /// Ordered column names.
    pub columns: Vec<String>,
    /// Row-major value storage.
    pub rows: Vec<Vec<Value>>,
}

impl DataSet {
    /// Create a dataset from column names and rows.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    /// Number of rows in the dataset.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns in the dataset.
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// `true` if the dataset has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns the index of a column by name, if present.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Iterate the values of one column, top to bottom.
    pub fn column_values(&self, idx: usize) -> impl Iterator<Item = &Value> {
        self.rows.iter().map(move |row| row.get(idx).unwrap_or(&Value::Null))
    }

    /// Create a new dataset containing only rows that match `predicate`.
    ///
    /// The returned dataset preserves the original columns.
    pub fn filter_rows<F>(&self, mut predicate: F) -> Self
    where
        F: FnMut(&[Value]) -> bool,
    {
        let rows = self
            .rows
            .iter()
            .filter(|row| predicate(row.as_slice()))
            .cloned()
            .collect();
        Self {
            columns: self.columns.clone(),
            rows,
        }
    }
}

/// One named tabular block loaded from one file.
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    /// Sheet name (`Sheet1` for CSV files).
    pub name: String,
    /// Section data.
    pub data: DataSet,
}

impl Section {
    pub fn new(name: impl Into<String>, data: DataSet) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.data.columns
    }

    pub fn row_count(&self) -> usize {
        self.data.row_count()
    }
}

/// Everything the loader produced for one input file.
///
/// An empty `sections` list means the load failed.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedFile {
    /// Input path.
    pub path: PathBuf,
    /// Encoding used to decode a CSV file (`None` for workbooks and failed loads).
    pub encoding: Option<TextEncoding>,
    /// Sections in loader order.
    pub sections: Vec<Section>,
}

impl LoadedFile {
    pub fn new(path: impl Into<PathBuf>, sections: Vec<Section>) -> Self {
        Self {
            path: path.into(),
            encoding: None,
            sections,
        }
    }

    /// An empty result for `path`, signalling a failed load.
    pub fn failed(path: impl Into<PathBuf>) -> Self {
        Self::new(path, Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Sum of section row counts.
    pub fn total_rows(&self) -> usize {
        self.sections.iter().map(Section::row_count).sum()
    }

    /// File name component of the path, for display.
    pub fn file_name(&self) -> String {
        display_file_name(&self.path)
    }
}

pub(crate) fn display_file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DataSet {
        DataSet::new(
            vec!["id".to_string(), "name".to_string()],
            vec![
                vec![Value::Int64(1), Value::Utf8("a".to_string())],
                vec![Value::Int64(2), Value::Null],
            ],
        )
    }

    #[test]
    fn index_of_works() {
        let ds = sample();
        assert_eq!(ds.index_of("id"), Some(0));
        assert_eq!(ds.index_of("name"), Some(1));
        assert_eq!(ds.index_of("missing"), None);
    }

    #[test]
    fn display_renders_null_as_empty() {
        assert_eq!(Value::Null.to_string(), "");
        assert_eq!(Value::Float64(98.5).to_string(), "98.5");
        assert_eq!(Value::Bool(true).to_string(), "true");
    }

    #[test]
    fn column_values_walks_rows() {
        let ds = sample();
        let names: Vec<_> = ds.column_values(1).cloned().collect();
        assert_eq!(names, vec![Value::Utf8("a".to_string()), Value::Null]);
    }

    #[test]
    fn loaded_file_totals_and_name() {
        let f = LoadedFile::new(
            "/tmp/dir/a.csv",
            vec![Section::new("Sheet1", sample()), Section::new("Two", sample())],
        );
        assert_eq!(f.total_rows(), 4);
        assert_eq!(f.file_name(), "a.csv");
        assert!(LoadedFile::failed("x.csv").is_empty());
    }
}
