use std::path::PathBuf;

use grocer_core::Retailer;
use thiserror::Error;

use crate::navigator::ScriptId;

#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("failed to load {url}: {reason}")]
    Navigation { url: String, reason: String },

    #[error("page did not show `{selector}` within {timeout_ms}ms")]
    ReadyTimeout { selector: String, timeout_ms: u64 },

    #[error("extractor script `{script}` failed: {reason}")]
    Script { script: ScriptId, reason: String },

    #[error("no `{script}` script at {}", path.display())]
    MissingScript { script: ScriptId, path: PathBuf },

    #[error("unexpected extractor output for {context}: expected {expected}")]
    UnexpectedShape {
        context: String,
        expected: &'static str,
    },

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("no categories discovered for {retailer}")]
    NoCategories { retailer: Retailer },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("category `{category}` would overwrite {} already written for `{owner}`", path.display())]
    DatasetConflict {
        category: String,
        owner: String,
        path: PathBuf,
    },

    #[error("browser error: {0}")]
    Browser(String),

    #[error("HTTP {status} from {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl CrawlError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
