use thiserror::Error;

use super::ObjectKind;
use crate::identifier::Identifier;

/// Errors raised by a remote client.
///
/// SECURITY: Error messages must NEVER contain credentials or tokens.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Object does not exist (or is not visible to the current role)
    #[error("{object_type} {identifier} does not exist or not authorized")]
    NotFound {
        object_type: String,
        identifier: String,
    },

    /// Remote refused the operation; the message is the remote's own text
    #[error("{message}")]
    Conflict { message: String },

    /// Failure that is safe to retry for idempotent calls
    #[error("transient failure: {message}")]
    Transient { message: String },

    #[error("authentication failed: {message}")]
    Unauthorized { message: String },

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("{operation} timed out")]
    Timeout { operation: &'static str },

    #[error("call cancelled")]
    Cancelled,

    #[error("unexpected response: {message}")]
    Decode { message: String },
}

impl RemoteError {
    pub fn not_found(kind: ObjectKind, identifier: &Identifier) -> Self {
        RemoteError::NotFound {
            object_type: kind.to_string(),
            identifier: identifier.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, RemoteError::NotFound { .. })
    }

    pub fn is_transient(&self) -> bool {
        match self {
            RemoteError::Transient { .. } | RemoteError::Timeout { .. } => true,
            RemoteError::Network(e) => e.is_timeout() || e.is_connect(),
            RemoteError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}
