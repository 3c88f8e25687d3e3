//! Error types used throughout the credential lifecycle

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for Tether
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum TetherError {
    /// No network path to the provider (connect, DNS, timeout)
    #[error("Transport error: {0}")]
    Transport(String),

    /// The provider answered with an error status
    #[error("Provider error: {0}")]
    Provider(String),

    /// CSRF state on the callback did not match the pending login
    #[error("Authorization state mismatch")]
    StateMismatch,

    /// The pending login outlived its time-to-live
    #[error("Authorization request expired")]
    AuthorizationExpired,

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for Tether operations
pub type Result<T> = std::result::Result<T, TetherError>;

/// Failure of a single token endpoint call.
///
/// Kept separate from [`TetherError`] so the refresh scheduler can branch on
/// the transport/provider distinction without string matching.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExchangeError {
    /// Request never produced a response
    #[error("token endpoint unreachable: {0}")]
    Transport(String),

    /// Token endpoint returned a non-2xx status
    #[error("token endpoint returned {status}: {message}")]
    Provider { status: u16, message: String },

    /// 2xx response whose body could not be decoded
    #[error("malformed token response: {0}")]
    MalformedResponse(String),

    /// Refresh requested without a refresh token
    #[error("no refresh token available")]
    MissingRefreshToken,
}

impl ExchangeError {
    /// Whether the failure means "no connectivity" rather than a provider answer.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

impl From<ExchangeError> for TetherError {
    fn from(err: ExchangeError) -> Self {
        match err {
            ExchangeError::Transport(msg) => Self::Transport(msg),
            other => Self::Provider(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_classification() {
        assert!(ExchangeError::Transport("dns".into()).is_transport());
        assert!(!ExchangeError::Provider { status: 429, message: "slow down".into() }
            .is_transport());
        assert!(!ExchangeError::MalformedResponse("eof".into()).is_transport());
    }

    #[test]
    fn exchange_error_maps_into_domain_error() {
        let err: TetherError = ExchangeError::Transport("timed out".into()).into();
        assert_eq!(err, TetherError::Transport("timed out".into()));

        let err: TetherError =
            ExchangeError::Provider { status: 400, message: "invalid_grant".into() }.into();
        assert!(matches!(err, TetherError::Provider(msg) if msg.contains("invalid_grant")));
    }

    #[test]
    fn serializes_tagged() {
        let json = serde_json::to_string(&TetherError::Configuration("client id".into())).unwrap();
        assert_eq!(json, r#"{"type":"Configuration","message":"client id"}"#);

        let json = serde_json::to_string(&TetherError::StateMismatch).unwrap();
        assert_eq!(json, r#"{"type":"StateMismatch"}"#);
    }
}
