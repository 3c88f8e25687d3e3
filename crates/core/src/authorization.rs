//! Authorization-code flow
//!
//! Builds the login URL with a one-shot CSRF state and completes the flow
//! when the host delivers the redirect callback.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rand::distributions::Alphanumeric;
use rand::Rng;
use tether_domain::constants::STATE_LENGTH;
use tether_domain::{ProviderConfig, Result, TetherError};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::ports::TokenExchange;
use crate::scheduler::RefreshScheduler;
use crate::store::CredentialStore;

/// Outstanding login attempt
#[derive(Debug, Clone)]
struct PendingAuthorization {
    state: String,
    created_at: Instant,
}

/// Login URL construction and callback handling
pub struct AuthorizationFlow {
    provider: ProviderConfig,
    state_ttl: Duration,
    exchange: Arc<dyn TokenExchange>,
    store: Arc<CredentialStore>,
    scheduler: RefreshScheduler,
    pending: Mutex<Option<PendingAuthorization>>,
}

impl AuthorizationFlow {
    pub fn new(
        provider: ProviderConfig,
        state_ttl: Duration,
        exchange: Arc<dyn TokenExchange>,
        store: Arc<CredentialStore>,
        scheduler: RefreshScheduler,
    ) -> Self {
        Self { provider, state_ttl, exchange, store, scheduler, pending: Mutex::new(None) }
    }

    /// Build the authorization URL and remember its state
    ///
    /// Starting a new login replaces any previous pending state.
    ///
    /// # Returns
    /// `(url, state)`
    pub fn build_login_url(&self, client_id: &str) -> (String, String) {
        let state = generate_state();
        let url = format!(
            "{}?response_type=code&client_id={}&state={}&scope={}&redirect_uri={}",
            self.provider.authorize_url(),
            urlencoding::encode(client_id),
            urlencoding::encode(&state),
            urlencoding::encode(&self.provider.scope_string()),
            urlencoding::encode(&self.provider.redirect_uri),
        );

        let replaced = self
            .pending
            .lock()
            .replace(PendingAuthorization { state: state.clone(), created_at: Instant::now() });
        if replaced.is_some() {
            debug!("Replaced previous pending authorization");
        }

        (url, state)
    }

    /// Complete the flow with the callback's `code` and `state`
    ///
    /// On success the credential is stored and the refresh schedule started.
    ///
    /// # Errors
    /// - `StateMismatch` if no login is pending or `state` differs; the
    ///   pending state survives so the genuine callback can still arrive
    /// - `AuthorizationExpired` if the pending state outlived its TTL
    /// - `Transport`/`Provider` if the code exchange fails
    pub async fn handle_callback(&self, code: &str, state: &str) -> Result<()> {
        self.consume_state(state)?;

        let credential = self
            .exchange
            .exchange_code(code, &self.provider.redirect_uri)
            .await
            .map_err(|e| {
                error!(error = %e, "Authorization code exchange failed");
                TetherError::from(e)
            })?;

        if let Err(e) = self.store.replace(credential).await {
            warn!(error = %e, "Credential kept in memory only");
        }
        info!("Authed successfully");

        self.scheduler.start().await;
        Ok(())
    }

    /// Forget any pending login
    pub fn cancel_pending(&self) {
        if self.pending.lock().take().is_some() {
            debug!("Pending authorization cancelled");
        }
    }

    /// Whether a login is awaiting its callback
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.pending.lock().is_some()
    }

    fn consume_state(&self, state: &str) -> Result<()> {
        let mut pending = self.pending.lock();

        let Some(expected) = pending.as_ref() else {
            warn!("Callback received with no login pending");
            return Err(TetherError::StateMismatch);
        };
        if expected.state != state {
            warn!("Callback state does not match pending login");
            return Err(TetherError::StateMismatch);
        }
        if expected.created_at.elapsed() > self.state_ttl {
            *pending = None;
            warn!(ttl_secs = self.state_ttl.as_secs(), "Pending login expired");
            return Err(TetherError::AuthorizationExpired);
        }

        *pending = None;
        Ok(())
    }
}

fn generate_state() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(STATE_LENGTH)
        .map(char::from)
        .collect()
}
