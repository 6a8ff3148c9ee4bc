//! Error taxonomy for session flows.
//!
//! Every variant is `Clone + PartialEq` so a failure can be carried inside
//! [`crate::session::Event`] and [`crate::session::SessionState`] and compared
//! in tests.

use crate::token::DecodeError;

/// Failure descriptor produced by the auth session flows.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// No response reached the client (connection refused, DNS, timeout).
    #[error("transport error: {0}")]
    Transport(String),

    /// The endpoint answered with a non-success status.
    #[error("server rejected request: status {status}: {message}")]
    Server { status: u16, message: String },

    /// The endpoint answered 2xx but the token payload could not be decoded.
    #[error("token decode failed: {0}")]
    Decode(#[from] DecodeError),

    /// The endpoint answered 2xx but the body was not a token pair.
    #[error("invalid token response: {0}")]
    InvalidResponse(String),

    /// A reload was requested with no persisted token pair.
    #[error("no stored session")]
    NoStoredSession,

    /// The persisted token pair could not be read.
    #[error("session storage failed: {0}")]
    Storage(String),

    /// A newer flow started before this one settled.
    #[error("superseded by a newer session flow")]
    Superseded,
}

impl AuthError {
    /// Stable machine-readable code for logs and UI branching.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Transport(_) => "E_TRANSPORT",
            Self::Server { .. } => "E_SERVER",
            Self::Decode(_) => "E_DECODE",
            Self::InvalidResponse(_) => "E_INVALID_RESPONSE",
            Self::NoStoredSession => "E_NO_STORED_SESSION",
            Self::Storage(_) => "E_STORAGE",
            Self::Superseded => "E_SUPERSEDED",
        }
    }

    /// HTTP status returned by the endpoint, if a response was received.
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// `true` when the endpoint was never reached ("offline" rather than "rejected").
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;
