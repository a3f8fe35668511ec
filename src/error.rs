//! Error types for cached call dispatch
//!
//! This module defines the error types for the ouroboros-memo library,
//! covering key derivation, gateway access, serialization and failures of the
//! wrapped call itself.

use thiserror::Error;

/// Failure while turning a call into a cache key
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyDerivationError {
    /// The selection policy names a parameter the signature does not declare
    #[error("unknown parameter '{name}' (declared: {declared})")]
    UnknownParameter { name: String, declared: String },

    /// More than one declared parameter matches the name when case is ignored
    #[error("parameter '{name}' is ambiguous (declared: {declared})")]
    AmbiguousParameter { name: String, declared: String },

    /// The parameter resolved to a position with no argument value
    #[error("no argument at position {index} ({available} supplied)")]
    MissingArgument { index: usize, available: usize },
}

/// Main error type for cached call dispatch
#[derive(Error, Debug)]
pub enum CacheError {
    /// Key derivation failed for a call
    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(#[from] KeyDerivationError),

    /// The wrapped call returned an error
    #[error("Operation {method} threw: {source}")]
    CallFailed {
        method: String,
        #[source]
        source: anyhow::Error,
    },

    /// Cache gateway read or write failed
    #[error("Gateway error: {0}")]
    GatewayError(String),

    /// Serialization/Deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The proceed action does not match the shape registered on the signature
    #[error("Return shape mismatch for {method}: registered {registered}, supplied {supplied}")]
    ShapeMismatch {
        method: String,
        registered: String,
        supplied: String,
    },

    /// Dispatch finished without producing a return value
    #[error("Return slot for {method} was empty after dispatch")]
    EmptyReturnSlot { method: String },

    /// Generic error with context
    #[error("Error: {0}")]
    Other(String),
}

/// Result type alias for cache operations
pub type Result<T> = std::result::Result<T, CacheError>;

impl CacheError {
    /// Wrap an error raised by the underlying call
    pub fn call_failed(method: impl Into<String>, source: anyhow::Error) -> Self {
        CacheError::CallFailed {
            method: method.into(),
            source,
        }
    }
}

impl From<String> for CacheError {
    fn from(s: String) -> Self {
        CacheError::Other(s)
    }
}

impl From<&str> for CacheError {
    fn from(s: &str) -> Self {
        CacheError::Other(s.to_string())
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(e: serde_json::Error) -> Self {
        CacheError::SerializationError(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = CacheError::GatewayError("redis down".to_string());
        assert_eq!(error.to_string(), "Gateway error: redis down");

        let error = CacheError::call_failed("Sum", anyhow::anyhow!("overflow"));
        assert_eq!(error.to_string(), "Operation Sum threw: overflow");

        let error: CacheError = KeyDerivationError::UnknownParameter {
            name: "id".to_string(),
            declared: "x, y".to_string(),
        }
        .into();
        assert!(error.to_string().contains("unknown parameter 'id'"));
        assert!(matches!(error, CacheError::KeyDerivationFailed(_)));
    }

    #[test]
    fn test_error_conversion() {
        let error: CacheError = "test error".into();
        assert!(matches!(error, CacheError::Other(_)));

        let error: CacheError = "test error".to_string().into();
        assert!(matches!(error, CacheError::Other(_)));

        let json_error = serde_json::from_str::<i32>("not json").unwrap_err();
        let error: CacheError = json_error.into();
        assert!(matches!(error, CacheError::SerializationError(_)));
    }

    #[test]
    fn test_call_failed_keeps_source() {
        use std::error::Error as _;

        let error = CacheError::call_failed("GetById", anyhow::anyhow!("not found"));
        let source = error.source().map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("not found"));
    }
}
