//! Error types for quell-querylog
//!
//! This module defines the error types used throughout the query log crate.

use thiserror::Error;

use crate::config::ConfigError;

/// Errors that can occur in query log operations
#[derive(Debug, Error)]
pub enum QueryLogError {
    /// I/O error while writing, rotating or reading segment files
    #[error("I/O error: {0}")]
    Io(String),

    /// A record could not be turned into its persisted form
    #[error("Encode error: {0}")]
    Encode(String),

    /// A persisted unit could not be turned back into a record
    #[error("Decode error: {0}")]
    Decode(String),

    /// Configuration was rejected
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The query log has been closed
    #[error("Query log is closed")]
    Closed,
}

impl From<std::io::Error> for QueryLogError {
    fn from(err: std::io::Error) -> Self {
        QueryLogError::Io(err.to_string())
    }
}

impl QueryLogError {
    /// Create a new I/O error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io(message.into())
    }

    /// Create a new Encode error
    pub fn encode(message: impl Into<String>) -> Self {
        Self::Encode(message.into())
    }

    /// Create a new Decode error
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }

    /// Whether a scan may skip the failing unit and continue
    pub fn is_recoverable(&self) -> bool {
        matches!(self, QueryLogError::Decode(_))
    }
}

/// Result type alias for query log operations
pub type QueryLogResult<T> = Result<T, QueryLogError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: QueryLogError = io_err.into();
        assert!(matches!(err, QueryLogError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_decode_is_recoverable() {
        assert!(QueryLogError::decode("bad line").is_recoverable());
        assert!(!QueryLogError::io("disk full").is_recoverable());
        assert!(!QueryLogError::Closed.is_recoverable());
    }

    #[test]
    fn test_config_error_conversion() {
        let err: QueryLogError = ConfigError::InvalidMemorySize.into();
        assert!(matches!(err, QueryLogError::Config(_)));
    }
}
