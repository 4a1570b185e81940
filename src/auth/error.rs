//! Identity provider and profile store errors.

use thiserror::Error;

/// Errors that can occur while talking to the identity provider or
/// decoding a session.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Connection or protocol failure before a response arrived.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The call did not complete in time.
    #[error("Provider call timed out")]
    Timeout,

    /// The provider refused the credentials (bad, expired or revoked token).
    #[error("Rejected by provider ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// Any other non-success response.
    #[error("Provider error ({status}): {message}")]
    Provider { status: u16, message: String },

    /// A cookie or response body could not be decoded.
    #[error("Malformed session data: {0}")]
    Malformed(String),

    /// An operation needed a session but none was stored.
    #[error("No session")]
    MissingSession,
}

impl AuthError {
    /// True when the provider answered and said no. Such failures are final
    /// for the current credentials; everything else may succeed on retry.
    pub fn is_rejection(&self) -> bool {
        matches!(self, AuthError::Rejected { .. })
    }

    /// True for network failures and timeouts.
    pub fn is_transient(&self) -> bool {
        matches!(self, AuthError::Transport(_) | AuthError::Timeout)
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::Transport(_) => "transport",
            AuthError::Timeout => "timeout",
            AuthError::Rejected { .. } => "rejected",
            AuthError::Provider { .. } => "provider",
            AuthError::Malformed(_) => "malformed",
            AuthError::MissingSession => "missing_session",
        }
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            AuthError::Timeout
        } else if e.is_decode() {
            AuthError::Malformed(e.to_string())
        } else {
            AuthError::Transport(e.to_string())
        }
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(e: serde_json::Error) -> Self {
        AuthError::Malformed(e.to_string())
    }
}

/// Result type for identity operations.
pub type AuthResult<T> = Result<T, AuthError>;
