//! Error types for the reconcile crate

use thiserror::Error;

/// Errors raised while decoding a provider's wire representation of attributes.
///
/// Malformed input is rejected here, at the boundary, and never coerced.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The wire payload was not shaped as expected (not a list, bad field types)
    #[error("malformed attribute list: {0}")]
    Malformed(String),

    /// The same key appeared more than once
    #[error("duplicate attribute key: {0}")]
    DuplicateKey(String),

    /// A value in a heterogeneous map was not a string
    #[error("attribute {key} is not a string (found {found})")]
    NotAString {
        /// Key whose value had the wrong shape
        key: String,
        /// JSON type name of the offending value
        found: &'static str,
    },
}

impl From<serde_json::Error> for DecodeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}

/// Opaque error returned by a provider's `create` or `delete` call.
///
/// Reconciliation propagates it unchanged.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct TransportError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl TransportError {
    /// Create a transport error from a message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Create a transport error wrapping an underlying cause
    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// The error message, without the source chain
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Result type for wire decoding
pub type Result<T> = std::result::Result<T, DecodeError>;
