//! Error types for groups-relay
//!
//! Display strings carry the protocol's machine-readable prefixes
//! (`restricted:`, `invalid:`, `blocked:`, `error:`) so the protocol layer
//! can hand them back to clients as-is.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelayError {
    /// Group id is not present in the registry
    #[error("blocked: group '{0}' not allowed")]
    NotAllowed(String),

    /// Unauthorized write to a closed or private group
    #[error("restricted: {0}")]
    Restricted(String),

    /// Missing or incorrect relay-url tag
    #[error("invalid: {0}")]
    InvalidTag(String),

    /// Read filter names no group
    #[error("blocked: must pick a group from where to read")]
    MustSpecifyGroup,

    #[error("error: {0} functionality not implemented")]
    Unimplemented(&'static str),

    /// Event failed id or signature verification
    #[error("invalid: {0}")]
    InvalidEvent(String),

    /// Event rejected by the acceptance filter
    #[error("blocked: {0}")]
    Rejected(String),

    #[error("error: request cancelled")]
    Cancelled,

    #[error("error: database error: {0}")]
    Database(#[from] sled::Error),

    #[error("error: JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("error: IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Boot-time configuration violation
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("error: internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, RelayError>;

impl RelayError {
    /// Whether the error was caused by the request rather than by the relay
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            RelayError::NotAllowed(_)
                | RelayError::Restricted(_)
                | RelayError::InvalidTag(_)
                | RelayError::MustSpecifyGroup
                | RelayError::InvalidEvent(_)
                | RelayError::Rejected(_)
        )
    }
}
