//! Response templating.
//!
//! Substitutes `{{name}}` placeholders in response headers and bodies with
//! variables captured during resolution. Unknown names render as the empty
//! string and anything that is not a well-formed placeholder is left as is,
//! so rendering never fails.

use crate::definition::ResponseTemplate;
use crate::pattern::CaptureSet;
use regex::bytes::{Captures, Regex};
use std::sync::LazyLock;

/// `{{name}}` where name is one or more ASCII letters or digits.
static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{([[:alnum:]]+)\}\}").expect("placeholder regex is valid"));

/// A response ready to be written to the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl MockResponse {
    /// Empty 404, returned when no definition matches.
    pub fn not_found() -> Self {
        Self {
            status: 404,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }
}

/// Renders response templates.
pub struct TemplateEngine {
    placeholder: &'static Regex,
}

impl TemplateEngine {
    pub fn new() -> Self {
        Self {
            placeholder: &PLACEHOLDER,
        }
    }

    /// Replace every `{{name}}` in `template` with its variable.
    pub fn render(&self, template: &[u8], vars: &CaptureSet) -> Vec<u8> {
        self.placeholder
            .replace_all(template, |caps: &Captures<'_>| {
                let name = String::from_utf8_lossy(&caps[1]);
                vars.get(name.as_ref())
                    .map(|value| value.as_bytes().to_vec())
                    .unwrap_or_default()
            })
            .into_owned()
    }

    /// Render a header value.
    pub fn render_str(&self, template: &str, vars: &CaptureSet) -> String {
        String::from_utf8_lossy(&self.render(template.as_bytes(), vars)).into_owned()
    }

    /// Render a full response. The status code is never templated.
    pub fn render_response(&self, response: &ResponseTemplate, vars: &CaptureSet) -> MockResponse {
        MockResponse {
            status: response.status,
            headers: response
                .headers
                .iter()
                .map(|(name, value)| (name.clone(), self.render_str(value, vars)))
                .collect(),
            body: self.render(&response.body, vars),
        }
    }
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}
