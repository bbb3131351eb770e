//! Error types for template parsing, route registration and config storage.

use thiserror::Error;

/// Raw template text could not be parsed, even after the regex-literal
/// repair pass. Carries the diagnostic from the first (strict) attempt.
#[derive(Debug, Error)]
#[error("invalid template: {source}")]
pub struct TemplateSyntaxError {
    #[from]
    source: serde_json::Error,
}

impl TemplateSyntaxError {
    /// The underlying parser diagnostic.
    pub fn diagnostic(&self) -> String {
        self.source.to_string()
    }
}

/// Per-entry failure while building a route table. The entry is skipped,
/// the rest of the table is still built.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteRegistrationError {
    /// The configured verb is not one the dispatcher serves.
    #[error("unsupported HTTP method: {0}")]
    UnsupportedMethod(String),

    /// The path pattern is malformed.
    #[error("invalid path pattern {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },

    /// The status code is not a valid HTTP status.
    #[error("invalid status code: {0}")]
    InvalidStatus(u16),
}

/// Failure reading or writing the config store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failure of an admin operation on the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),
}
