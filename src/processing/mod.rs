//! In-memory merge transformations.
//!
//! The processing layer operates on [`crate::types::LoadedFile`] and
//! [`crate::types::DataSet`] values produced by loading:
//!
//! - [`merge()`]: align every section to a target header and concatenate
//! - [`reindex()`]: align one section
//! - [`duplicate_count()`] / [`drop_duplicates()`]: exact duplicate-row handling
//!
//! ## Example: merge → dedupe
//!
//! ```rust
//! use sheet_merge::processing::{drop_duplicates, duplicate_count, merge};
//! use sheet_merge::types::{DataSet, LoadedFile, Section, Value};
//!
//! let cols = |names: &[&str]| names.iter().map(|s| s.to_string()).collect::<Vec<_>>();
//! let a = LoadedFile::new(
//!     "a.csv",
//!     vec![Section::new(
//!         "Sheet1",
//!         DataSet::new(cols(&["Name", "Age"]), vec![vec![Value::Utf8("Ada".into()), Value::Int64(36)]]),
//!     )],
//! );
//! let b = LoadedFile::new(
//!     "b.csv",
//!     vec![Section::new(
//!         "Sheet1",
//!         DataSet::new(cols(&["Name", "City"]), vec![vec![Value::Utf8("Ada".into()), Value::Utf8("London".into())]]),
//!     )],
//! );
//!
//! let (merged, stats) = merge(&[a, b], &cols(&["Name", "Age"]));
//! assert_eq!(merged.row_count(), 2);
//! assert_eq!(stats.len(), 2);
//! assert_eq!(merged.rows[1], vec![Value::Utf8("Ada".into()), Value::Null]);
//!
//! assert_eq!(duplicate_count(&merged), 0);
//! assert_eq!(drop_duplicates(&merged).row_count(), 2);
//! ```

pub mod dedupe;
pub mod merge;

pub use dedupe::{drop_duplicates, duplicate_count, duplicated_mask};
pub use merge::{MergeStat, merge, reindex};
