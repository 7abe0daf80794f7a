//! `sheet-merge` combines a set of spreadsheet and CSV files into one table.
//!
//! Each input file is loaded on its own worker thread into a [`types::LoadedFile`] made of named
//! [`types::Section`]s (one per worksheet, or the single `Sheet1` of a CSV file). Once every load
//! has finished, the section headers are compared; when they differ a target header is chosen,
//! every section is reindexed to it and the rows are concatenated. Exact duplicate rows can be
//! dropped, and the result is written to `.xlsx` or `.csv`.
//!
//! ## What you can load
//!
//! Extensions are matched case-insensitively:
//!
//! - **CSV**: `.csv`, decoded with the first of `utf-8-sig`, `utf-8`, `gbk`, `gb2312`, `latin1`
//!   that succeeds
//! - **Workbooks**: `.xlsx`, `.xls` and `.et` (opened as XLSX, with content sniffing as fallback)
//!
//! Loading never fails past [`ingestion::load_file`]: a file that cannot be read yields no
//! sections, and the reason goes to the configured [`ingestion::LoadObserver`].
//!
//! ## Quick example: headless merge
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use sheet_merge::coordinator::{Coordinator, CoordinatorOptions};
//! use sheet_merge::pipeline::{MergePipeline, PipelineStage};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut coordinator = Coordinator::new(CoordinatorOptions::default());
//! coordinator.add_folder("inputs")?;
//! coordinator.wait_idle(Duration::from_secs(60));
//!
//! let files = coordinator.merge_input()?;
//! let mut pipeline = MergePipeline::new(files, coordinator.default_output_path());
//! if let PipelineStage::AwaitingDedupeChoice { .. } = pipeline.stage() {
//!     pipeline.resolve_dedupe(true)?;
//! }
//! pipeline.resolve_save(Some("merged.csv".into()))?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`formats`]: recognized extensions, output format selection, folder scanning
//! - [`ingestion`]: CSV and workbook loaders, encodings, load observers
//! - [`execution`]: per-file worker threads, cancellation, worker metrics
//! - [`coordinator`]: per-file lifecycle state and the merge gate
//! - [`header`]: header extraction and consistency checking
//! - [`processing`]: column alignment, concatenation and duplicate handling
//! - [`output`]: writing the merged table
//! - [`pipeline`]: the decision-driven merge flow
//! - [`config`]: JSON overrides for the front end
//! - [`error`]: the crate error type

pub mod config;
pub mod coordinator;
pub mod error;
pub mod execution;
pub mod formats;
pub mod header;
pub mod ingestion;
pub mod output;
pub mod pipeline;
pub mod processing;
pub mod types;

pub use error::{MergeError, MergeResult};
