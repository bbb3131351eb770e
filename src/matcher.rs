//! Path pattern matching.
//!
//! Patterns are `/`-separated segments. A `:name` segment binds one path
//! segment, a final `*` binds whatever remains. Literal segments compare
//! case-insensitively and one trailing slash on the request is ignored.

use crate::error::RouteRegistrationError;
use std::collections::{HashMap, HashSet};

/// Name under which a trailing `*` segment is bound.
pub const WILDCARD_PARAM: &str = "*";

/// Context captured during matching (for template variables).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchContext {
    /// Path parameters bound by `:name` and `*` segments
    pub path_params: HashMap<String, String>,
    /// Query parameters
    pub query_params: HashMap<String, String>,
}

/// A compiled route path such as `/user/:id` or `/files/*`.
#[derive(Debug, Clone, PartialEq)]
pub struct PathPattern {
    source: String,
    segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    /// Stored lowercased.
    Literal(String),
    Param(String),
    Wildcard,
}

impl PathPattern {
    /// Compile a path pattern.
    pub fn compile(path: &str) -> Result<Self, RouteRegistrationError> {
        let invalid = |reason: &str| RouteRegistrationError::InvalidPath {
            path: path.to_string(),
            reason: reason.to_string(),
        };

        let Some(rest) = path.strip_prefix('/') else {
            return Err(invalid("must start with '/'"));
        };

        let mut segments = Vec::new();
        let mut names = HashSet::new();
        let raw = split_segments(rest.strip_suffix('/').unwrap_or(rest));

        for (i, part) in raw.iter().enumerate() {
            let segment = if *part == WILDCARD_PARAM {
                if i + 1 != raw.len() {
                    return Err(invalid("'*' is only allowed as the last segment"));
                }
                Segment::Wildcard
            } else if let Some(name) = part.strip_prefix(':') {
                if name.is_empty() {
                    return Err(invalid("empty parameter name"));
                }
                if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                    return Err(invalid(&format!("invalid parameter name {:?}", name)));
                }
                if !names.insert(name.to_string()) {
                    return Err(invalid(&format!("duplicate parameter {:?}", name)));
                }
                Segment::Param(name.to_string())
            } else {
                Segment::Literal(part.to_lowercase())
            };
            segments.push(segment);
        }

        Ok(Self {
            source: path.to_string(),
            segments,
        })
    }

    /// The pattern as written.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Match a request path (without query string), returning bound
    /// parameters on success.
    pub fn matches(&self, path: &str) -> Option<HashMap<String, String>> {
        let rest = path.strip_prefix('/')?;
        let rest = rest.strip_suffix('/').unwrap_or(rest);
        let parts = split_segments(rest);
        let mut params = HashMap::new();

        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Wildcard => {
                    let remaining = parts.get(i..).unwrap_or_default().join("/");
                    params.insert(WILDCARD_PARAM.to_string(), decode(&remaining));
                    return Some(params);
                }
                Segment::Literal(lit) => {
                    let part = parts.get(i)?;
                    if part.to_lowercase() != *lit {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    let part = parts.get(i).filter(|p| !p.is_empty())?;
                    params.insert(name.clone(), decode(part));
                }
            }
        }

        (parts.len() == self.segments.len()).then_some(params)
    }
}

/// `""` is the root and has no segments.
fn split_segments(rest: &str) -> Vec<&str> {
    if rest.is_empty() {
        Vec::new()
    } else {
        rest.split('/').collect()
    }
}

fn decode(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

/// Parse a query string into key-value pairs. Later duplicates win.
pub fn parse_query_string(query: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();

    for part in query.split('&') {
        if part.is_empty() {
            continue;
        }
        let (key, value) = part.split_once('=').unwrap_or((part, ""));
        params.insert(decode_form(key), decode_form(value));
    }

    params
}

fn decode_form(raw: &str) -> String {
    decode(&raw.replace('+', " "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_path_matching() {
        let pattern = PathPattern::compile("/api/users").unwrap();
        assert!(pattern.matches("/api/users").is_some());
        assert!(pattern.matches("/API/Users").is_some());
        assert!(pattern.matches("/api/users/").is_some());
        assert!(pattern.matches("/api/posts").is_none());
        assert!(pattern.matches("/api/users/1").is_none());
        assert!(pattern.matches("/api").is_none());
    }

    #[test]
    fn test_named_segment_matching() {
        let pattern = PathPattern::compile("/user/:id").unwrap();

        let params = pattern.matches("/user/42").unwrap();
        assert_eq!(params.get("id"), Some(&"42".to_string()));

        let params = pattern.matches("/user/john%20doe").unwrap();
        assert_eq!(params.get("id"), Some(&"john doe".to_string()));

        assert!(pattern.matches("/user/").is_none());
        assert!(pattern.matches("/user").is_none());
        assert!(pattern.matches("/user/42/posts").is_none());
    }

    #[test]
    fn test_multiple_params() {
        let pattern = PathPattern::compile("/orgs/:org/repos/:repo").unwrap();
        let params = pattern.matches("/orgs/acme/repos/widgets").unwrap();
        assert_eq!(params.get("org"), Some(&"acme".to_string()));
        assert_eq!(params.get("repo"), Some(&"widgets".to_string()));
    }

    #[test]
    fn test_wildcard_matching() {
        let pattern = PathPattern::compile("/files/*").unwrap();
        let params = pattern.matches("/files/a/b/c.txt").unwrap();
        assert_eq!(params.get(WILDCARD_PARAM), Some(&"a/b/c.txt".to_string()));

        let params = pattern.matches("/files").unwrap();
        assert_eq!(params.get(WILDCARD_PARAM), Some(&String::new()));

        assert!(pattern.matches("/other/a").is_none());
    }

    #[test]
    fn test_root_path() {
        let pattern = PathPattern::compile("/").unwrap();
        assert!(pattern.matches("/").is_some());
        assert!(pattern.matches("/a").is_none());
    }

    #[test]
    fn test_invalid_patterns() {
        for path in ["user/:id", "/user/:", "/a/:id/b/:id", "/a/*/b", "/a/:bad-name"] {
            let err = PathPattern::compile(path).unwrap_err();
            assert!(
                matches!(err, RouteRegistrationError::InvalidPath { .. }),
                "{} should be rejected",
                path
            );
        }
    }

    #[test]
    fn test_parse_query_string() {
        let params = parse_query_string("foo=bar&baz=qux&empty=&flag&name=John%20Doe&q=a+b");
        assert_eq!(params.get("foo"), Some(&"bar".to_string()));
        assert_eq!(params.get("baz"), Some(&"qux".to_string()));
        assert_eq!(params.get("empty"), Some(&"".to_string()));
        assert_eq!(params.get("flag"), Some(&"".to_string()));
        assert_eq!(params.get("name"), Some(&"John Doe".to_string()));
        assert_eq!(params.get("q"), Some(&"a b".to_string()));
    }
}
