//! Column alignment and concatenation.

use std::borrow::Borrow;

use serde::Serialize;

use crate::types::{DataSet, LoadedFile, Section, Value};

/// Row count of one consumed section, recorded before alignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeStat {
    pub file: String,
    pub sheet: String,
    pub rows: usize,
}

/// Reindex a section's columns to `target`.
///
/// Columns in `target` but absent from the section become all-null; columns absent from
/// `target` are dropped; the output column order is `target`.
pub fn reindex(section: &DataSet, target: &[String]) -> DataSet {
    if section.columns == target {
        return section.clone();
    }

    let projection: Vec<Option<usize>> = target.iter().map(|name| section.index_of(name)).collect();
    let rows = section
        .rows
        .iter()
        .map(|row| {
            projection
                .iter()
                .map(|idx| match idx {
                    Some(i) => row.get(*i).cloned().unwrap_or(Value::Null),
                    None => Value::Null,
                })
                .collect()
        })
        .collect();

    DataSet::new(target.to_vec(), rows)
}

/// Align every section of `files` to `target` and concatenate them in encounter order.
///
/// Returns the merged table and one [`MergeStat`] per section. No sections yields an empty
/// table with `target` as its columns.
pub fn merge<F: Borrow<LoadedFile>>(files: &[F], target: &[String]) -> (DataSet, Vec<MergeStat>) {
    let total: usize = files
        .iter()
        .map(|f| Borrow::<LoadedFile>::borrow(f).total_rows())
        .sum();
    let mut rows: Vec<Vec<Value>> = Vec::with_capacity(total);
    let mut statistics = Vec::new();

    for file in files {
        let file: &LoadedFile = file.borrow();
        let file_name = file.file_name();
        for Section { name, data } in &file.sections {
            let aligned = reindex(data, target);
            rows.extend(aligned.rows);
            statistics.push(MergeStat {
                file: file_name.clone(),
                sheet: name.clone(),
                rows: data.row_count(),
            });
        }
    }

    (DataSet::new(target.to_vec(), rows), statistics)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn s(v: &str) -> Value {
        Value::Utf8(v.to_string())
    }

    #[test]
    fn reindex_is_identity_for_matching_columns() {
        let ds = DataSet::new(cols(&["a", "b"]), vec![vec![Value::Int64(1), s("x")]]);
        assert_eq!(reindex(&ds, &cols(&["a", "b"])), ds);
    }

    #[test]
    fn reindex_fills_missing_drops_extra_and_reorders() {
        let ds = DataSet::new(
            cols(&["Name", "City", "Age"]),
            vec![vec![s("Ada"), s("London"), Value::Int64(36)]],
        );
        let out = reindex(&ds, &cols(&["Age", "Name", "Email"]));
        assert_eq!(out.columns, cols(&["Age", "Name", "Email"]));
        assert_eq!(out.rows, vec![vec![Value::Int64(36), s("Ada"), Value::Null]]);
    }

    #[test]
    fn merge_of_nothing_is_empty() {
        let (table, stats) = merge::<LoadedFile>(&[], &cols(&["a"]));
        assert!(table.is_empty());
        assert_eq!(table.columns, cols(&["a"]));
        assert!(stats.is_empty());
    }

    #[test]
    fn merge_preserves_row_total_and_order() {
        let a = LoadedFile::new(
            "/in/a.csv",
            vec![Section::new(
                "Sheet1",
                DataSet::new(cols(&["Name", "Age"]), vec![vec![s("a1"), Value::Int64(1)]]),
            )],
        );
        let b = LoadedFile::new(
            "/in/b.xlsx",
            vec![
                Section::new(
                    "One",
                    DataSet::new(cols(&["Name", "City"]), vec![vec![s("b1"), s("Paris")]]),
                ),
                Section::new(
                    "Two",
                    DataSet::new(
                        cols(&["Name"]),
                        vec![vec![s("b2")], vec![s("b3")]],
                    ),
                ),
            ],
        );

        let (table, stats) = merge(&[a, b], &cols(&["Name", "Age"]));
        assert_eq!(table.row_count(), 4);
        let names: Vec<_> = table.column_values(0).cloned().collect();
        assert_eq!(names, vec![s("a1"), s("b1"), s("b2"), s("b3")]);
        assert_eq!(table.rows[1], vec![s("b1"), Value::Null]);
        assert_eq!(
            stats,
            vec![
                MergeStat { file: "a.csv".into(), sheet: "Sheet1".into(), rows: 1 },
                MergeStat { file: "b.xlsx".into(), sheet: "One".into(), rows: 1 },
                MergeStat { file: "b.xlsx".into(), sheet: "Two".into(), rows: 2 },
            ]
        );
    }
}
