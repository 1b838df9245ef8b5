use thiserror::Error;

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::identifier::IdentifierError;
use crate::remote::RemoteError;

/// Coarse classification used by callers that react to failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Cancelled,
    Protocol,
    Internal,
    Remote,
    Config,
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("validation failed: {0}")]
    Validation(Diagnostics),

    #[error("{object_type} {identifier} not found")]
    NotFound {
        object_type: String,
        identifier: String,
    },

    #[error("remote refused the operation: {message}")]
    Conflict { message: String },

    #[error("operation cancelled")]
    Cancelled,

    #[error("protocol error: {0}")]
    Protocol(String),

    /// An invariant between descriptors, state and remote was violated.
    #[error("internal error [{invariant}]: {message}")]
    Internal {
        invariant: &'static str,
        message: String,
    },

    #[error(transparent)]
    Remote(RemoteError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid identifier: {0}")]
    Identifier(#[from] IdentifierError),
}

impl ProviderError {
    pub fn internal(invariant: &'static str, message: impl Into<String>) -> Self {
        ProviderError::Internal {
            invariant,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ProviderError::Validation(_) | ProviderError::Identifier(_) => ErrorKind::Validation,
            ProviderError::NotFound { .. } => ErrorKind::NotFound,
            ProviderError::Conflict { .. } => ErrorKind::Conflict,
            ProviderError::Cancelled => ErrorKind::Cancelled,
            ProviderError::Protocol(_) => ErrorKind::Protocol,
            ProviderError::Internal { .. } => ErrorKind::Internal,
            ProviderError::Remote(_) => ErrorKind::Remote,
            ProviderError::Config(_) => ErrorKind::Config,
        }
    }

    /// Diagnostics as surfaced to the host.
    pub fn into_diagnostics(self) -> Diagnostics {
        match self {
            ProviderError::Validation(diags) => diags,
            other => Diagnostics::from(Diagnostic::error(other.to_string())),
        }
    }
}

impl From<RemoteError> for ProviderError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::NotFound {
                object_type,
                identifier,
            } => ProviderError::NotFound {
                object_type,
                identifier,
            },
            RemoteError::Conflict { message } => ProviderError::Conflict { message },
            RemoteError::Cancelled => ProviderError::Cancelled,
            other => ProviderError::Remote(other),
        }
    }
}
