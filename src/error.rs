//! Load-time errors.
//!
//! Everything that can go wrong happens while the mock directory is read and
//! compiled. Request handling never fails: a request without a matching
//! definition is a miss, not an error.

use std::path::PathBuf;
use thiserror::Error;

/// Error raised while loading or compiling mock definitions.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read mock directory {path}: {source}")]
    ReadDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot read mock file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed JSON mock definition: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed YAML mock definition: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("unrecognized method `{0}`")]
    UnrecognizedMethod(String),

    #[error("invalid pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid status code: {0}")]
    InvalidStatus(u16),

    /// Wraps any of the above with the definition it came from.
    #[error("mock `{name}`: {source}")]
    Definition {
        name: String,
        #[source]
        source: Box<LoadError>,
    },
}

impl LoadError {
    pub(crate) fn in_definition(self, name: &str) -> Self {
        LoadError::Definition {
            name: name.to_string(),
            source: Box::new(self),
        }
    }
}
