//! Template parsing with regex-literal detection and repair.

use super::{Pattern, TemplateValue};
use crate::error::TemplateSyntaxError;
use regex::{Captures, Regex};
use serde_json::Value;
use std::borrow::Cow;
use std::sync::LazyLock;

/// A quoted regex literal inside raw template text.
static QUOTED_LITERAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""/([^"]*?)/([gimsuy]*)""#).expect("quoted literal regex is valid")
});

/// Parse a route's `template` field.
///
/// Null and empty text give an empty mapping, text is parsed as JSON (with
/// the repair pass), anything else is converted structurally.
pub fn parse(input: &Value) -> Result<TemplateValue, TemplateSyntaxError> {
    match input {
        Value::Null => Ok(TemplateValue::empty()),
        Value::String(text) => parse_str(text),
        other => Ok(from_structured(other.clone())),
    }
}

/// Parse template text.
///
/// Strict JSON is tried first. On failure, backslashes inside quoted
/// `"/body/flags"` literals are escaped and parsing is retried; if that also
/// fails the error from the strict attempt is returned.
pub fn parse_str(text: &str) -> Result<TemplateValue, TemplateSyntaxError> {
    if text.trim().is_empty() {
        return Ok(TemplateValue::empty());
    }

    let value = match serde_json::from_str::<Value>(text) {
        Ok(value) => value,
        Err(original) => match repair(text) {
            Cow::Owned(fixed) => serde_json::from_str::<Value>(&fixed)
                .map_err(|_| TemplateSyntaxError::from(original))?,
            Cow::Borrowed(_) => return Err(original.into()),
        },
    };

    Ok(from_structured(value))
}

/// Convert an already-structured value, promoting regex-literal strings to
/// patterns except under directive-bearing keys.
pub fn from_structured(value: Value) -> TemplateValue {
    convert(value, None)
}

/// Recognize a `/body/flags` string as a pattern.
///
/// The body runs from the first to the last `/`. Anything that does not
/// compile stays a plain string.
pub fn detect_pattern(text: &str) -> Option<Pattern> {
    let rest = text.strip_prefix('/')?;
    let last = rest.rfind('/')?;
    let (body, flags) = (&rest[..last], &rest[last + 1..]);
    if !flags.chars().all(|c| "gimsuy".contains(c)) {
        return None;
    }
    Pattern::new(body, flags).ok()
}

fn convert(value: Value, key: Option<&str>) -> TemplateValue {
    match value {
        Value::Null => TemplateValue::Null,
        Value::Bool(b) => TemplateValue::Bool(b),
        Value::Number(n) => TemplateValue::Number(n),
        Value::String(s) => {
            let guarded = key.is_some_and(|k| k.contains('|') || k.contains('@'));
            match (guarded, detect_pattern(&s)) {
                (false, Some(pattern)) => TemplateValue::Pattern(pattern),
                _ => TemplateValue::String(s),
            }
        }
        Value::Array(items) => {
            TemplateValue::Sequence(items.into_iter().map(|v| convert(v, None)).collect())
        }
        Value::Object(map) => TemplateValue::Mapping(
            map.into_iter()
                .map(|(k, v)| {
                    let converted = convert(v, Some(&k));
                    (k, converted)
                })
                .collect(),
        ),
    }
}

/// Escape backslashes in quoted regex literals so `"/\d+/"` becomes valid
/// JSON. Literals with repeated flags are left alone.
fn repair(text: &str) -> Cow<'_, str> {
    QUOTED_LITERAL.replace_all(text, |caps: &Captures| {
        let body = &caps[1];
        let flags = &caps[2];
        let unique = flags
            .chars()
            .enumerate()
            .all(|(i, c)| !flags[..i].contains(c));
        if unique {
            format!("\"/{}/{}\"", body.replace('\\', "\\\\"), flags)
        } else {
            caps[0].to_string()
        }
    })
}
