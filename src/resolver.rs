//! Request resolution.
//!
//! Finds the definition for a live request: path lookup in the match tree,
//! then header and body matching against the candidate. Captured variables
//! are merged in phase order (path, headers, body), later phases winning.

use crate::config::load_directory;
use crate::definition::{CompiledMock, MockDefinition};
use crate::error::LoadError;
use crate::pattern::CaptureSet;
use crate::tree::MatchTree;
use bytes::Bytes;
use std::path::Path;
use tracing::{debug, info, warn};

/// Transport-independent view of an HTTP request.
#[derive(Debug, Clone, Default)]
pub struct IncomingRequest {
    pub method: String,
    pub path: String,
    /// One entry per header name; repeated values already joined with `,`
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl IncomingRequest {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Lower-cased method token; a missing method is treated as `get`.
    fn method_segment(&self) -> String {
        if self.method.is_empty() {
            "get".to_string()
        } else {
            self.method.to_lowercase()
        }
    }
}

/// A matched definition and the variables captured on the way.
#[derive(Debug)]
pub struct Resolution<'a> {
    pub definition: &'a MockDefinition,
    pub captures: CaptureSet,
}

/// Owns the match tree built from all definitions.
///
/// Read-only once built, so a single instance can serve concurrent requests.
#[derive(Debug, Default)]
pub struct Resolver {
    tree: MatchTree,
    definitions: usize,
}

impl Resolver {
    /// Build the match tree. A definition placed on the same path as an
    /// earlier one replaces it.
    pub fn new(mocks: Vec<CompiledMock>) -> Self {
        let mut tree = MatchTree::new();
        let mut definitions = 0;

        for mock in mocks {
            let name = mock.definition.name.clone();
            let node = tree.insert(tree.root(), mock.path);
            match tree.attach(node, mock.definition) {
                Some(replaced) => warn!(
                    mock = %name,
                    replaced = %replaced.name,
                    "Mock definition replaces another with the same path"
                ),
                None => definitions += 1,
            }
        }

        info!(definitions, nodes = tree.len(), "Match tree built");
        Self { tree, definitions }
    }

    /// Load every definition in `dir` and build the resolver.
    pub fn load(dir: &Path) -> Result<Self, LoadError> {
        Ok(Self::new(load_directory(dir)?))
    }

    /// Number of distinct definitions reachable in the tree.
    pub fn definitions(&self) -> usize {
        self.definitions
    }

    pub fn tree(&self) -> &MatchTree {
        &self.tree
    }

    /// Resolve a request to a definition, or `None` when nothing matches.
    ///
    /// Header matchers only contribute captures; a request that satisfies
    /// none of them still matches. The body matcher, when declared, must
    /// match.
    pub fn resolve(&self, request: &IncomingRequest) -> Option<Resolution<'_>> {
        let method = request.method_segment();
        let segments = std::iter::once(method.as_str())
            .chain(request.path.split('/').filter(|s| !s.is_empty()));

        let Some((node, mut captures)) = self.tree.resolve(segments) else {
            debug!(method = %method, path = %request.path, "No path match");
            return None;
        };
        let Some(definition) = self.tree.definition(node) else {
            debug!(method = %method, path = %request.path, "Path match has no definition");
            return None;
        };

        // Sorted so that colliding capture names merge the same way every time.
        let mut headers: Vec<&(String, String)> = request.headers.iter().collect();
        headers.sort();
        for (name, value) in headers {
            if let Some(found) = definition.match_header(name, value) {
                captures.extend(found);
            }
        }

        let Some(found) = definition.match_body(&request.body) else {
            debug!(mock = %definition.name, "Body did not match");
            return None;
        };
        captures.extend(found);

        Some(Resolution {
            definition,
            captures,
        })
    }
}
