//! Header extraction and consistency checking across loaded sections.

use std::borrow::Borrow;
use std::path::PathBuf;

use serde::Serialize;

use crate::types::LoadedFile;

/// Column-name sequence tagged with the file and section it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeaderDescriptor {
    /// File name (no directory), for display.
    pub file: String,
    /// Full input path.
    pub file_path: PathBuf,
    /// Section (sheet) name.
    pub sheet: String,
    /// Ordered column names.
    pub headers: Vec<String>,
}

impl HeaderDescriptor {
    /// One-line rendering: `file / sheet: a, b, c`.
    pub fn summary(&self) -> String {
        format!("{} / {}: {}", self.file, self.sheet, self.headers.join(", "))
    }
}

/// Outcome of [`check_consistency`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderCheck {
    /// Every section shares one header; `None` when there were no sections at all.
    Consistent(Option<Vec<String>>),
    /// At least one section differs; carries every descriptor in encounter order.
    Inconsistent(Vec<HeaderDescriptor>),
}

impl HeaderCheck {
    pub fn is_consistent(&self) -> bool {
        matches!(self, HeaderCheck::Consistent(_))
    }
}

/// One descriptor per (file, section), files first, then sections within a file.
pub fn extract_headers<F: Borrow<LoadedFile>>(files: &[F]) -> Vec<HeaderDescriptor> {
    files
        .iter()
        .flat_map(|file| {
            let file: &LoadedFile = file.borrow();
            let name = file.file_name();
            file.sections.iter().map(move |section| HeaderDescriptor {
                file: name.clone(),
                file_path: file.path.clone(),
                sheet: section.name.clone(),
                headers: section.columns().to_vec(),
            })
        })
        .collect()
}

/// Compare every descriptor's headers (exact, order-sensitive) against the first.
pub fn check_consistency(descriptors: Vec<HeaderDescriptor>) -> HeaderCheck {
    let Some(first) = descriptors.first() else {
        return HeaderCheck::Consistent(None);
    };
    if descriptors[1..].iter().all(|d| d.headers == first.headers) {
        HeaderCheck::Consistent(Some(first.headers.clone()))
    } else {
        HeaderCheck::Inconsistent(descriptors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DataSet, Section};

    fn file(path: &str, sheets: &[(&str, &[&str])]) -> LoadedFile {
        let sections = sheets
            .iter()
            .map(|(name, cols)| {
                let columns = cols.iter().map(|c| c.to_string()).collect();
                Section::new(*name, DataSet::new(columns, Vec::new()))
            })
            .collect();
        LoadedFile::new(path, sections)
    }

    #[test]
    fn extract_preserves_encounter_order() {
        let files = vec![
            file("/d/b.xlsx", &[("S1", &["x"]), ("S2", &["y"])]),
            file("/d/a.csv", &[("Sheet1", &["z"])]),
        ];
        let got: Vec<_> = extract_headers(&files)
            .into_iter()
            .map(|d| (d.file, d.sheet))
            .collect();
        assert_eq!(
            got,
            vec![
                ("b.xlsx".to_string(), "S1".to_string()),
                ("b.xlsx".to_string(), "S2".to_string()),
                ("a.csv".to_string(), "Sheet1".to_string()),
            ]
        );
    }

    #[test]
    fn empty_is_consistent_without_header() {
        assert_eq!(check_consistency(Vec::new()), HeaderCheck::Consistent(None));
    }

    #[test]
    fn identical_headers_are_consistent() {
        let files = vec![
            file("a.csv", &[("Sheet1", &["Name", "Age"])]),
            file("b.xlsx", &[("One", &["Name", "Age"]), ("Two", &["Name", "Age"])]),
        ];
        let check = check_consistency(extract_headers(&files));
        assert_eq!(
            check,
            HeaderCheck::Consistent(Some(vec!["Name".to_string(), "Age".to_string()]))
        );
    }

    #[test]
    fn order_matters_and_returns_full_list() {
        let files = vec![
            file("a.csv", &[("Sheet1", &["Name", "Age"])]),
            file("b.csv", &[("Sheet1", &["Age", "Name"])]),
        ];
        let descriptors = extract_headers(&files);
        match check_consistency(descriptors.clone()) {
            HeaderCheck::Inconsistent(list) => assert_eq!(list, descriptors),
            other => panic!("expected inconsistent, got {other:?}"),
        }
    }

    #[test]
    fn summary_lists_columns() {
        let d = &extract_headers(&[file("/x/a.csv", &[("Sheet1", &["Name", "City"])])])[0];
        assert_eq!(d.summary(), "a.csv / Sheet1: Name, City");
    }
}
