//! Port interfaces for the credential lifecycle
//!
//! These traits abstract every external collaborator (token endpoint,
//! persistence, reachability endpoint, host navigation) so the lifecycle
//! logic can be driven by test doubles or by the HTTP adapters in
//! `tether-infra`.

use async_trait::async_trait;
use tether_domain::{Credential, ExchangeError, Result};

/// Token endpoint operations
///
/// Implementations must never panic on transport or HTTP failures; every
/// outcome is reported through [`ExchangeError`].
#[async_trait]
pub trait TokenExchange: Send + Sync {
    /// Exchange an authorization code for a credential
    ///
    /// # Errors
    /// `ExchangeError::Transport` when the endpoint is unreachable,
    /// `ExchangeError::Provider` on a non-2xx answer.
    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> std::result::Result<Credential, ExchangeError>;

    /// Mint a new access token from `current`'s refresh token
    ///
    /// A response without a refresh token keeps the one in `current`.
    ///
    /// # Errors
    /// Same classification as [`TokenExchange::exchange_code`].
    async fn refresh(&self, current: &Credential)
        -> std::result::Result<Credential, ExchangeError>;

    /// Invalidate the remote session, if the provider supports it
    ///
    /// # Errors
    /// Callers treat any error as best-effort and ignore it.
    async fn revoke(&self, _current: &Credential) -> std::result::Result<(), ExchangeError> {
        Ok(())
    }
}

/// Load/save collaborator for the persisted credential
#[async_trait]
pub trait CredentialPersistence: Send + Sync {
    /// Load the stored credential, `None` if nothing was saved yet
    ///
    /// # Errors
    /// Returns `TetherError::Persistence` when the backend fails.
    async fn load(&self) -> Result<Option<Credential>>;

    /// Persist `credential`, replacing any previous value
    ///
    /// # Errors
    /// Returns `TetherError::Persistence` when the backend fails.
    async fn save(&self, credential: &Credential) -> Result<()>;
}

/// Side-effect-free reachability check
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    /// `true` when the probe endpoint answered with a 2xx status.
    /// Failures of any kind report `false`.
    async fn probe(&self) -> bool;
}

/// Host hook that opens the authorization page
#[async_trait]
pub trait LoginNavigator: Send + Sync {
    /// Navigate to `url`
    ///
    /// # Errors
    /// Returns `TetherError::Internal` if the host cannot open the URL.
    async fn open(&self, url: &str) -> Result<()>;
}

/// Reads the signed-in user's profile
#[async_trait]
pub trait ProfileLookup: Send + Sync {
    /// Display name of the account behind `credential`
    ///
    /// # Errors
    /// Any failure; the coordinator treats the lookup as best-effort.
    async fn display_name(&self, credential: &Credential) -> Result<Option<String>>;
}

/// Receives connectivity transitions
///
/// Only called when the logical online state actually changes.
#[async_trait]
pub trait ConnectivityListener: Send + Sync {
    async fn on_connectivity_changed(&self, online: bool);
}
