//! Regular expression patterns with capture extraction.

use crate::error::LoadError;
use regex::{Regex, RegexBuilder};
use std::collections::HashMap;
use std::fmt;

/// Variables captured while matching a request, keyed by group name.
///
/// Merging two sets is `extend`: the later phase wins on a name collision.
pub type CaptureSet = HashMap<String, String>;

/// A compiled regular expression together with its source text.
///
/// Two patterns are identical when their sources are equal; no attempt is made
/// to detect semantically equivalent expressions.
#[derive(Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    /// Compile a pattern. Invalid syntax is a load error.
    pub fn new(source: impl Into<String>) -> Result<Self, LoadError> {
        let source = source.into();
        let regex = Regex::new(&source).map_err(|e| invalid(&source, e))?;
        Ok(Self { source, regex })
    }

    /// Compile a pattern that ignores letter case, used for header names.
    pub fn case_insensitive(source: impl Into<String>) -> Result<Self, LoadError> {
        let source = source.into();
        let regex = RegexBuilder::new(&source)
            .case_insensitive(true)
            .build()
            .map_err(|e| invalid(&source, e))?;
        Ok(Self { source, regex })
    }

    /// The source text this pattern was compiled from.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    /// Match `text` and collect the capture groups.
    ///
    /// Returns `None` when the pattern does not match. Named groups are keyed
    /// by name and unnamed groups by their position (`"1"`, `"2"`, ...). A group
    /// that did not take part in the match is recorded as an empty string.
    pub fn captures(&self, text: &str) -> Option<CaptureSet> {
        let caps = self.regex.captures(text)?;
        Some(
            capture_keys(self.regex.capture_names())
                .map(|(i, key)| {
                    let value = caps.get(i).map(|m| m.as_str()).unwrap_or_default();
                    (key, value.to_string())
                })
                .collect(),
        )
    }
}

/// A pattern run over raw bytes, used for request bodies.
///
/// Captured values that are not valid UTF-8 are converted lossily; matching
/// itself sees the bytes unchanged.
#[derive(Clone)]
pub struct BodyPattern {
    source: String,
    regex: regex::bytes::Regex,
}

impl BodyPattern {
    pub fn new(source: impl Into<String>) -> Result<Self, LoadError> {
        let source = source.into();
        let regex = regex::bytes::Regex::new(&source).map_err(|e| invalid(&source, e))?;
        Ok(Self { source, regex })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Same keying rules as [`Pattern::captures`].
    pub fn captures(&self, body: &[u8]) -> Option<CaptureSet> {
        let caps = self.regex.captures(body)?;
        Some(
            capture_keys(self.regex.capture_names())
                .map(|(i, key)| {
                    let value = caps.get(i).map(|m| m.as_bytes()).unwrap_or_default();
                    (key, String::from_utf8_lossy(value).into_owned())
                })
                .collect(),
        )
    }
}

impl fmt::Debug for BodyPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("BodyPattern").field(&self.source).finish()
    }
}

/// Group index and capture key for every group but the implicit whole match.
fn capture_keys<'r, I: Iterator<Item = Option<&'r str>> + 'r>(
    names: I,
) -> impl Iterator<Item = (usize, String)> + 'r {
    names.enumerate().skip(1).map(|(i, name)| match name {
        Some(name) => (i, name.to_string()),
        None => (i, i.to_string()),
    })
}

fn invalid(pattern: &str, source: regex::Error) -> LoadError {
    LoadError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for Pattern {}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Pattern").field(&self.source).finish()
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_without_groups() {
        let pattern = Pattern::new("test").unwrap();
        let captures = pattern.captures("this is a test").unwrap();
        assert!(captures.is_empty());
    }

    #[test]
    fn test_named_group() {
        let pattern = Pattern::new(r"(?P<test>\d+)").unwrap();
        let captures = pattern.captures("test 123 string").unwrap();
        assert_eq!(captures.len(), 1);
        assert_eq!(captures.get("test"), Some(&"123".to_string()));
    }

    #[test]
    fn test_unnamed_groups_use_position() {
        let pattern = Pattern::new(r"(\w+)-(?P<num>\d+)-(\w+)").unwrap();
        let captures = pattern.captures("abc-42-xyz").unwrap();
        assert_eq!(captures.get("1"), Some(&"abc".to_string()));
        assert_eq!(captures.get("num"), Some(&"42".to_string()));
        assert_eq!(captures.get("3"), Some(&"xyz".to_string()));
        assert!(!captures.contains_key("2"));
    }

    #[test]
    fn test_non_participating_group_is_empty() {
        let pattern = Pattern::new(r"a(?P<opt>b)?c").unwrap();
        let captures = pattern.captures("ac").unwrap();
        assert_eq!(captures.get("opt"), Some(&String::new()));
    }

    #[test]
    fn test_no_match() {
        let pattern = Pattern::new("nothing").unwrap();
        assert!(pattern.captures("test string").is_none());
    }

    #[test]
    fn test_invalid_pattern() {
        let err = Pattern::new("[").unwrap_err();
        assert!(matches!(err, LoadError::InvalidPattern { ref pattern, .. } if pattern == "["));
    }

    #[test]
    fn test_identity_is_source_equality() {
        assert_eq!(Pattern::new(r"\d+").unwrap(), Pattern::new(r"\d+").unwrap());
        assert_ne!(Pattern::new(r"\d+").unwrap(), Pattern::new(r"[0-9]+").unwrap());
    }

    #[test]
    fn test_case_insensitive() {
        let pattern = Pattern::case_insensitive("^Content-Type$").unwrap();
        assert!(pattern.is_match("content-type"));
        assert!(pattern.is_match("CONTENT-TYPE"));
        assert!(!Pattern::new("^Content-Type$").unwrap().is_match("content-type"));
        assert!(Pattern::case_insensitive("(").is_err());
    }

    #[test]
    fn test_body_pattern_matches_raw_bytes() {
        let pattern = BodyPattern::new(r"(?-u)^\xff(?P<rest>\x00+)$").unwrap();
        let captures = pattern.captures(&[0xff, 0x00, 0x00]).unwrap();
        assert_eq!(captures.get("rest"), Some(&"\0\0".to_string()));
        assert!(pattern.captures("\u{fffd}\0".as_bytes()).is_none());
    }

    #[test]
    fn test_body_pattern_positional_groups() {
        let pattern = BodyPattern::new(r"id=(\d+)&(?P<name>\w*)").unwrap();
        let captures = pattern.captures(b"id=7&").unwrap();
        assert_eq!(captures.get("1"), Some(&"7".to_string()));
        assert_eq!(captures.get("name"), Some(&String::new()));
    }
}
