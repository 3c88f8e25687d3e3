//! Conversions from external infrastructure errors into domain errors.

use keyring::Error as KeyringError;
use reqwest::Error as HttpError;
use tether_domain::{ExchangeError, TetherError};

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub TetherError);

impl From<InfraError> for TetherError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<TetherError> for InfraError {
    fn from(value: TetherError) -> Self {
        InfraError(value)
    }
}

trait IntoTetherError {
    fn into_tether(self) -> TetherError;
}

/// Classify a failed token endpoint call for the refresh scheduler
pub trait IntoExchangeError {
    fn into_exchange(self) -> ExchangeError;
}

/* -------------------------------------------------------------------------- */
/* keyring::Error → TetherError */
/* -------------------------------------------------------------------------- */

impl IntoTetherError for KeyringError {
    fn into_tether(self) -> TetherError {
        use KeyringError::*;

        let description = self.to_string();

        match self {
            NoEntry => TetherError::Persistence("keychain entry not found".into()),
            BadEncoding(_) => {
                TetherError::Persistence("credential in keychain is not valid UTF-8".into())
            }
            TooLong(name, limit) => TetherError::Persistence(format!(
                "keychain attribute '{name}' exceeds platform limit ({limit})"
            )),
            PlatformFailure(err) => TetherError::Persistence(format!("keychain platform error: {err}")),
            NoStorageAccess(err) => {
                TetherError::Persistence(format!("unable to access secure storage: {err}"))
            }
            _ => TetherError::Persistence(description),
        }
    }
}

impl From<KeyringError> for InfraError {
    fn from(value: KeyringError) -> Self {
        InfraError(value.into_tether())
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → TetherError / ExchangeError */
/* -------------------------------------------------------------------------- */

impl IntoTetherError for HttpError {
    fn into_tether(self) -> TetherError {
        if self.is_builder() {
            return TetherError::Internal(format!("invalid HTTP request: {self}"));
        }

        match self.into_exchange() {
            ExchangeError::Transport(msg) => TetherError::Transport(msg),
            other => TetherError::Provider(other.to_string()),
        }
    }
}

impl IntoExchangeError for HttpError {
    fn into_exchange(self) -> ExchangeError {
        if self.is_timeout() {
            return ExchangeError::Transport("HTTP request timed out".into());
        }

        if self.is_connect() {
            return ExchangeError::Transport("HTTP connection failure".into());
        }

        if let Some(status) = self.status() {
            return ExchangeError::Provider {
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("unknown status").to_string(),
            };
        }

        if self.is_decode() {
            return ExchangeError::MalformedResponse(self.to_string());
        }

        ExchangeError::Transport(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_tether())
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
