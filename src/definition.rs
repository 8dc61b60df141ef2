//! Compiled mock definitions.
//!
//! A [`MockFile`] is the raw structured form read from disk; compiling it
//! produces the sequence of path patterns used to place the definition in the
//! match tree plus the [`MockDefinition`] that is attached at the end of it.

use crate::config::MockFile;
use crate::error::LoadError;
use crate::pattern::{BodyPattern, CaptureSet, Pattern};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// HTTP verbs a definition may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Delete,
    Get,
    Head,
    Options,
    Patch,
    Post,
    Put,
}

impl Method {
    /// Lower-cased token used as the first segment of every tree path.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Delete => "delete",
            Method::Get => "get",
            Method::Head => "head",
            Method::Options => "options",
            Method::Patch => "patch",
            Method::Post => "post",
            Method::Put => "put",
        }
    }
}

impl FromStr for Method {
    type Err = LoadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "delete" => Ok(Method::Delete),
            "get" => Ok(Method::Get),
            "head" => Ok(Method::Head),
            "options" => Ok(Method::Options),
            "patch" => Ok(Method::Patch),
            "post" => Ok(Method::Post),
            "put" => Ok(Method::Put),
            _ => Err(LoadError::UnrecognizedMethod(s.to_string())),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Matches one request header by name and value. The label ignores case.
#[derive(Debug, Clone)]
pub struct HeaderMatcher {
    pub label: Pattern,
    pub value: Pattern,
}

impl HeaderMatcher {
    /// Captures of both patterns if the header satisfies them; value captures
    /// win over label captures of the same name.
    pub fn matches(&self, name: &str, value: &str) -> Option<CaptureSet> {
        let mut captures = self.label.captures(name)?;
        captures.extend(self.value.captures(value)?);
        Some(captures)
    }
}

/// The canned response of a definition, before variable substitution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseTemplate {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

/// Gate on the request body.
#[derive(Debug, Clone)]
pub enum BodyMatcher {
    /// Regular expression over the raw body bytes.
    Pattern(BodyPattern),
    /// Structured document. The body must parse as JSON and be equal to it,
    /// whatever its key order or whitespace.
    Json(Value),
}

impl BodyMatcher {
    pub fn captures(&self, body: &[u8]) -> Option<CaptureSet> {
        match self {
            BodyMatcher::Pattern(pattern) => pattern.captures(body),
            BodyMatcher::Json(expected) => {
                let actual: Value = serde_json::from_slice(body).ok()?;
                (actual == *expected).then(CaptureSet::new)
            }
        }
    }
}

/// A loaded mock definition: request matchers and the response to emit.
#[derive(Debug, Clone)]
pub struct MockDefinition {
    /// Where the definition came from, used in logs.
    pub name: String,
    pub header_matchers: Vec<HeaderMatcher>,
    pub body_matcher: Option<BodyMatcher>,
    pub response: ResponseTemplate,
}

impl MockDefinition {
    /// Captures of the first header matcher satisfied by this header.
    pub fn match_header(&self, name: &str, value: &str) -> Option<CaptureSet> {
        self.header_matchers
            .iter()
            .find_map(|matcher| matcher.matches(name, value))
    }

    /// Check the request body. Without a body matcher every body is accepted.
    pub fn match_body(&self, body: &[u8]) -> Option<CaptureSet> {
        match &self.body_matcher {
            Some(matcher) => matcher.captures(body),
            None => Some(CaptureSet::new()),
        }
    }
}

/// A definition together with the path it is placed under in the tree.
#[derive(Debug, Clone)]
pub struct CompiledMock {
    /// Method segment followed by one pattern per path segment.
    pub path: Vec<Pattern>,
    pub definition: MockDefinition,
}

impl CompiledMock {
    /// Compile a parsed mock file. Every pattern is compiled here so that no
    /// syntax error can surface while serving.
    pub fn compile(name: &str, file: &MockFile) -> Result<Self, LoadError> {
        Self::compile_inner(name, file).map_err(|e| e.in_definition(name))
    }

    fn compile_inner(name: &str, file: &MockFile) -> Result<Self, LoadError> {
        let request = &file.request;
        let response = &file.response;

        let method: Method = request.method.parse()?;
        let mut path = vec![Pattern::new(method.as_str())?];
        for segment in request.path.split('/').filter(|s| !s.is_empty()) {
            path.push(Pattern::new(segment)?);
        }

        let header_matchers = request
            .headers
            .iter()
            .map(|(label, value)| -> Result<HeaderMatcher, LoadError> {
                Ok(HeaderMatcher {
                    label: Pattern::case_insensitive(label.as_str())?,
                    value: Pattern::new(value.as_str())?,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let body_matcher = match &request.body {
            None | Some(Value::Null) => None,
            Some(Value::String(source)) => {
                Some(BodyMatcher::Pattern(BodyPattern::new(source.as_str())?))
            }
            Some(other) => Some(BodyMatcher::Json(other.clone())),
        };

        if !(100..=599).contains(&response.status) {
            return Err(LoadError::InvalidStatus(response.status));
        }

        let body = match &response.body {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::String(text)) => text.clone().into_bytes(),
            Some(other) => serde_json::to_vec(other)?,
        };

        Ok(Self {
            path,
            definition: MockDefinition {
                name: name.to_string(),
                header_matchers,
                body_matcher,
                response: ResponseTemplate {
                    status: response.status,
                    headers: response
                        .headers
                        .iter()
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect(),
                    body,
                },
            },
        })
    }
}
