//! Configuration for the mock server.
//!
//! Defines the on-disk format of mock definitions, the directory loader, and
//! the runtime settings of the HTTP listener.

use crate::definition::CompiledMock;
use crate::error::LoadError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One mock definition file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MockFile {
    /// Request shape to match
    pub request: RequestSpec,

    /// Response to return
    #[serde(default)]
    pub response: ResponseSpec,
}

impl MockFile {
    /// Parse a JSON definition.
    pub fn from_json(input: &str) -> Result<Self, LoadError> {
        Ok(serde_json::from_str(input)?)
    }

    /// Parse a YAML definition.
    pub fn from_yaml(input: &str) -> Result<Self, LoadError> {
        Ok(serde_yaml::from_str(input)?)
    }

    /// Read and parse a definition file. `.yaml` and `.yml` files are read as
    /// YAML, everything else as JSON.
    pub fn from_file(path: &Path) -> Result<Self, LoadError> {
        let content = std::fs::read_to_string(path).map_err(|source| LoadError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml(&content),
            _ => Self::from_json(&content),
        }
    }
}

/// Request matching configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RequestSpec {
    /// HTTP method (delete, get, head, options, patch, post, put)
    pub method: String,

    /// `/` separated path, each segment a literal or a regular expression
    #[serde(default)]
    pub path: String,

    /// Header label pattern to header value pattern
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Body pattern (string) or a JSON value matched literally
    #[serde(default)]
    pub body: Option<serde_json::Value>,
}

/// Response definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResponseSpec {
    /// HTTP status code
    #[serde(default = "default_status")]
    pub status: u16,

    /// Response header templates
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Response body template; strings are sent as-is, other values as JSON
    #[serde(default)]
    pub body: Option<serde_json::Value>,
}

impl Default for ResponseSpec {
    fn default() -> Self {
        Self {
            status: default_status(),
            headers: BTreeMap::new(),
            body: None,
        }
    }
}

fn default_status() -> u16 {
    200
}

/// Load and compile every definition file in `dir`.
///
/// Files are read in file-name order and sub-directories are skipped. Each
/// definition is named after its file. The first bad file aborts the load.
pub fn load_directory(dir: &Path) -> Result<Vec<CompiledMock>, LoadError> {
    let read_dir_error = |source| LoadError::ReadDirectory {
        path: dir.to_path_buf(),
        source,
    };

    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(read_dir_error)? {
        let entry = entry.map_err(read_dir_error)?;
        let file_type = entry.file_type().map_err(read_dir_error)?;
        if file_type.is_dir() {
            continue;
        }
        paths.push(entry.path());
    }
    paths.sort();

    paths
        .iter()
        .map(|path| {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            debug!(file = %path.display(), "Loading mock definition");
            let file = MockFile::from_file(path).map_err(|e| e.in_definition(&name))?;
            CompiledMock::compile(&name, &file)
        })
        .collect()
}

/// Runtime settings of the server.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Address to listen on
    pub listen: SocketAddr,

    /// Directory holding the mock definitions
    pub mock_dir: PathBuf,

    /// Log every matched request
    pub log_matches: bool,

    /// Log requests without a matching definition
    pub log_unmatched: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 80)),
            mock_dir: PathBuf::from("./scripts"),
            log_matches: true,
            log_unmatched: true,
        }
    }
}
