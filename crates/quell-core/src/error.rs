//! Error types for quell-core

use thiserror::Error;

/// Errors raised while parsing core types from their textual form
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// Unknown client protocol name
    #[error("unknown client protocol: {0:?}")]
    UnknownProto(String),

    /// Unknown filtering reason name
    #[error("unknown filtering reason: {0:?}")]
    UnknownReason(String),
}
