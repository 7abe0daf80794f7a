//! JSON configuration for the terminal front end.
//!
//! Every field is optional; anything left out keeps the library default.
//!
//! ```json
//! {
//!   "encodings": ["utf-8-sig", "gbk"],
//!   "delimiter": ";",
//!   "cancel_wait_ms": 1500,
//!   "default_output_name": "merged.xlsx"
//! }
//! ```

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::coordinator::CoordinatorOptions;
use crate::error::{MergeError, MergeResult};
use crate::ingestion::TextEncoding;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// CSV candidate encodings, in priority order.
    pub encodings: Option<Vec<TextEncoding>>,
    /// Single-byte CSV delimiter.
    pub delimiter: Option<char>,
    pub cancel_wait_ms: Option<u64>,
    pub default_output_name: Option<String>,
}

impl AppConfig {
    pub fn from_json_str(text: &str) -> MergeResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> MergeResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Apply the overrides on top of `base`.
    pub fn apply(&self, mut base: CoordinatorOptions) -> MergeResult<CoordinatorOptions> {
        if let Some(encodings) = self.encodings.as_ref().filter(|e| !e.is_empty()) {
            base.load.encodings = encodings.clone();
        }
        if let Some(delimiter) = self.delimiter {
            base.load.delimiter = u8::try_from(delimiter)
                .ok()
                .filter(u8::is_ascii)
                .ok_or_else(|| {
                    MergeError::Config(serde::de::Error::custom(format!(
                        "delimiter must be a single ASCII character, got {delimiter:?}"
                    )))
                })?;
        }
        if let Some(ms) = self.cancel_wait_ms {
            base.cancel_wait = Duration::from_millis(ms);
        }
        if let Some(name) = self.default_output_name.as_ref().filter(|n| !n.trim().is_empty()) {
            base.default_output_name = name.clone();
        }
        Ok(base)
    }

    pub fn coordinator_options(&self) -> MergeResult<CoordinatorOptions> {
        self.apply(CoordinatorOptions::default())
    }
}
