//! Unified error type definition

use serde::Serialize;
use thiserror::Error;

/// Core layer error type
#[derive(Error, Debug, Serialize)]
#[serde(tag = "code", content = "details")]
pub enum CoreError {
    /// Validation error (editor input)
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Server not present in the configuration
    #[error("Server not found: {0}")]
    ServerNotFound(String),

    /// Operation not allowed on the built-in server
    #[error("Server is reserved: {0}")]
    ReservedServer(String),

    /// Transport-level failure talking to the edge
    #[error("Channel error: {0}")]
    ChannelError(String),

    /// Channel was closed before a reply arrived
    #[error("Channel closed")]
    ChannelClosed,

    /// The edge answered but refused the update
    #[error("Remote rejected update: {0}")]
    RemoteRejected(String),

    /// serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Application configuration could not be loaded
    #[error("Config error: {0}")]
    ConfigError(String),

    /// `initialize()` was called on a running store
    #[error("Config store already initialized")]
    AlreadyInitialized,

    /// Store used before `initialize()`
    #[error("Config store not initialized")]
    NotInitialized,

    /// No reply within the request timeout
    #[error("Timed out after {0} ms")]
    Timeout(u64),
}

impl CoreError {
    /// Whether it is expected behavior (user input, missing server, etc.), used for log classification.
    ///
    /// Level `warn` should be used when returning `true` and level `error` when returning `false`.
    /// **Please update this method simultaneously when new variants are added. **
    #[must_use]
    pub fn is_expected(&self) -> bool {
        match self {
            Self::ValidationError(_)
            | Self::ServerNotFound(_)
            | Self::ReservedServer(_)
            | Self::RemoteRejected(_)
            | Self::AlreadyInitialized => true,
            Self::ChannelError(_)
            | Self::ChannelClosed
            | Self::SerializationError(_)
            | Self::ConfigError(_)
            | Self::NotInitialized
            | Self::Timeout(_) => false,
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::SerializationError(e.to_string())
    }
}

/// Core layer Result type alias
pub type CoreResult<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_code_and_details() {
        let json = serde_json::to_value(CoreError::ServerNotFound("gmail".to_string())).unwrap();
        assert_eq!(json["code"], "ServerNotFound");
        assert_eq!(json["details"], "gmail");
    }

    #[test]
    fn user_errors_are_expected() {
        assert!(CoreError::ValidationError("x".to_string()).is_expected());
        assert!(CoreError::ReservedServer("todoforai".to_string()).is_expected());
        assert!(!CoreError::ChannelClosed.is_expected());
        assert!(!CoreError::Timeout(10).is_expected());
    }
}
