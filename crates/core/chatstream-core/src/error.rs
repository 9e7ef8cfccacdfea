//! Error types for ChatStream core

use thiserror::Error;

/// Main error type for ChatStream operations
#[derive(Debug, Error)]
pub enum ChatStreamError {
    /// Request validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Upstream automation engine error
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Session lifecycle error
    #[error("Session error: {0}")]
    Session(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Network/HTTP error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Timeout error
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

/// Convenient Result type using ChatStreamError
pub type Result<T> = std::result::Result<T, ChatStreamError>;

impl ChatStreamError {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        ChatStreamError::Validation(msg.into())
    }

    /// Create an upstream error
    pub fn upstream(msg: impl Into<String>) -> Self {
        ChatStreamError::Upstream(msg.into())
    }

    /// Create a session error
    pub fn session(msg: impl Into<String>) -> Self {
        ChatStreamError::Session(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        ChatStreamError::Config(msg.into())
    }

    /// Create a timeout error
    pub fn timeout(msg: impl Into<String>) -> Self {
        ChatStreamError::Timeout(msg.into())
    }

    /// Create a generic error
    pub fn other(msg: impl Into<String>) -> Self {
        ChatStreamError::Other(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = ChatStreamError::validation("missing question");
        assert_eq!(err.to_string(), "Validation error: missing question");

        let err = ChatStreamError::upstream("engine unreachable");
        assert_eq!(err.to_string(), "Upstream error: engine unreachable");
    }

    #[test]
    fn test_result_type() {
        fn returns_result() -> Result<i32> {
            Ok(42)
        }

        assert_eq!(returns_result().unwrap(), 42);
    }
}
