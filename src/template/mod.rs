//! Response templates.
//!
//! A template is JSON extended with one extra leaf kind: regular-expression
//! literals written as `"/source/flags"` strings. [`parse`] turns raw
//! template input into a [`TemplateValue`]; the [`crate::mock`] module
//! expands it into a concrete body.

mod parser;
mod pattern;

pub use parser::{detect_pattern, from_structured, parse, parse_str};
pub use pattern::{Pattern, PatternError, MAX_UNBOUNDED_REPEAT};

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

/// Canonical parsed form of a response template.
///
/// Mapping keys keep their directive suffixes (`list|1-10`, `id|+1`);
/// interpreting them is the expander's job.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    Pattern(Pattern),
    Sequence(Vec<TemplateValue>),
    Mapping(Vec<(String, TemplateValue)>),
}

impl TemplateValue {
    /// The empty mapping, used for missing templates.
    pub fn empty() -> Self {
        TemplateValue::Mapping(Vec::new())
    }

    /// Look up a mapping entry by its raw key.
    pub fn get(&self, key: &str) -> Option<&TemplateValue> {
        match self {
            TemplateValue::Mapping(entries) => {
                entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
            }
            _ => None,
        }
    }

    pub fn as_pattern(&self) -> Option<&Pattern> {
        match self {
            TemplateValue::Pattern(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            TemplateValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Serialize to template text. Patterns come out as `"/source/flags"`,
    /// which [`parse_str`] reads back as patterns.
    pub fn to_text(&self) -> String {
        // Serializing an in-memory tree of strings and numbers cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

impl Serialize for TemplateValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            TemplateValue::Null => serializer.serialize_unit(),
            TemplateValue::Bool(b) => serializer.serialize_bool(*b),
            TemplateValue::Number(n) => n.serialize(serializer),
            TemplateValue::String(s) => serializer.serialize_str(s),
            TemplateValue::Pattern(p) => serializer.serialize_str(&p.literal()),
            TemplateValue::Sequence(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            TemplateValue::Mapping(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
        }
    }
}
