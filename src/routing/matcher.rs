//! Route pattern compilation.
//!
//! # Responsibilities
//! - Split a pattern on `/` into literal and capture segments
//! - Substitute each capture with its match expression
//! - Record capture names by ordinal position
//! - Match a request path against the compiled expression
//!
//! # Design Decisions
//! - Literal segments are regex-escaped (`/a.b` never matches `/axb`)
//! - The expression is anchored on both ends: a match must span the whole path
//! - Each capture is wrapped in a synthetic named group (`p0`, `p1`, ...) so
//!   groups inside a custom sub-pattern never shift parameter positions

use regex::Regex;
use thiserror::Error;

/// Marker that starts a named capture segment.
pub const CAPTURE_MARKER: char = ':';

/// Expression used when a capture carries no sub-pattern override.
pub const DEFAULT_CAPTURE_EXPR: &str = "[^/]+";

/// Errors raised while registering a route. These are fatal at startup.
#[derive(Debug, Error)]
pub enum RegistrationError {
    /// The pattern was the empty string.
    #[error("route pattern can not be empty")]
    EmptyPattern,

    /// A capture segment had no name between the marker and the sub-pattern.
    #[error("capture segment {segment:?} in pattern {pattern:?} has no name")]
    UnnamedCapture { pattern: String, segment: String },

    /// The assembled expression did not compile.
    #[error("route pattern {pattern:?} failed to compile: {source}")]
    Compile {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// A compiled route pattern.
#[derive(Debug, Clone)]
pub struct RoutePattern {
    source: String,
    regex: Regex,
    /// Capture names, indexed by ordinal position.
    params: Vec<String>,
}

impl RoutePattern {
    /// Compile a pattern such as `/users/:id([0-9]+)/:name`.
    pub fn compile(pattern: &str) -> Result<Self, RegistrationError> {
        if pattern.is_empty() {
            return Err(RegistrationError::EmptyPattern);
        }

        let mut params = Vec::new();
        let mut parts = Vec::new();

        for segment in pattern.split('/') {
            let Some(capture) = segment.strip_prefix(CAPTURE_MARKER) else {
                parts.push(regex::escape(segment));
                continue;
            };

            let (name, expr) = match capture.find('(') {
                Some(index) => (&capture[..index], &capture[index..]),
                None => (capture, DEFAULT_CAPTURE_EXPR),
            };

            if name.is_empty() {
                return Err(RegistrationError::UnnamedCapture {
                    pattern: pattern.to_string(),
                    segment: segment.to_string(),
                });
            }

            parts.push(format!("(?P<p{}>{})", params.len(), expr));
            params.push(name.to_string());
        }

        let expression = format!("^(?:{})$", parts.join("/"));
        let regex = Regex::new(&expression).map_err(|source| RegistrationError::Compile {
            pattern: pattern.to_string(),
            source,
        })?;

        Ok(Self {
            source: pattern.to_string(),
            regex,
            params,
        })
    }

    /// The pattern as registered.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Capture names in ordinal order.
    pub fn param_names(&self) -> &[String] {
        &self.params
    }

    /// True when the pattern has no captures.
    pub fn is_literal(&self) -> bool {
        self.params.is_empty()
    }

    /// Match `path` in full and return the captured values in ordinal order.
    ///
    /// Returns `None` when the path does not match, or when the match does not
    /// cover the entire path.
    pub fn captures(&self, path: &str) -> Option<Vec<String>> {
        let caps = self.regex.captures(path)?;
        let whole = caps.get(0)?;
        if whole.start() != 0 || whole.end() != path.len() {
            return None;
        }

        (0..self.params.len())
            .map(|i| caps.name(&format!("p{i}")).map(|m| m.as_str().to_string()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_pattern() {
        let pattern = RoutePattern::compile("/about/team").unwrap();
        assert!(pattern.is_literal());
        assert_eq!(pattern.captures("/about/team"), Some(vec![]));
        assert!(pattern.captures("/about/team/").is_none());
        assert!(pattern.captures("/about").is_none());
        assert!(pattern.captures("/x/about/team").is_none());
    }

    #[test]
    fn test_literal_segments_are_escaped() {
        let pattern = RoutePattern::compile("/files/a.b").unwrap();
        assert!(pattern.captures("/files/a.b").is_some());
        assert!(pattern.captures("/files/axb").is_none());
    }

    #[test]
    fn test_default_capture() {
        let pattern = RoutePattern::compile("/users/:id").unwrap();
        assert_eq!(pattern.param_names(), ["id".to_string()]);
        assert_eq!(pattern.captures("/users/42"), Some(vec!["42".to_string()]));
        assert!(pattern.captures("/users/42/posts").is_none());
        assert!(pattern.captures("/users/").is_none());
    }

    #[test]
    fn test_custom_sub_pattern() {
        let pattern = RoutePattern::compile("/users/:id([0-9]+)/:slug(\\w+)").unwrap();
        assert_eq!(
            pattern.param_names(),
            ["id".to_string(), "slug".to_string()]
        );
        assert_eq!(
            pattern.captures("/users/7/hello"),
            Some(vec!["7".to_string(), "hello".to_string()])
        );
        assert!(pattern.captures("/users/abc/hello").is_none());
    }

    #[test]
    fn test_nested_groups_do_not_shift_positions() {
        let pattern = RoutePattern::compile("/v/:ver((v)([0-9]))/:item").unwrap();
        assert_eq!(
            pattern.captures("/v/v2/box"),
            Some(vec!["v2".to_string(), "box".to_string()])
        );
    }

    #[test]
    fn test_alternation_must_span_whole_path() {
        // Leftmost-first would pick "b"; the anchored form still finds "bc".
        let pattern = RoutePattern::compile("/a/:x(b|bc)").unwrap();
        assert_eq!(pattern.captures("/a/bc"), Some(vec!["bc".to_string()]));
        assert!(pattern.captures("/a/bcd").is_none());
    }

    #[test]
    fn test_registration_errors() {
        assert!(matches!(
            RoutePattern::compile(""),
            Err(RegistrationError::EmptyPattern)
        ));
        assert!(matches!(
            RoutePattern::compile("/users/:([0-9]+)"),
            Err(RegistrationError::UnnamedCapture { .. })
        ));
        assert!(matches!(
            RoutePattern::compile("/users/:id([0-9]+"),
            Err(RegistrationError::Compile { .. })
        ));
    }
}
