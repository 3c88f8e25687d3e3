//! Credential store
//!
//! Sole owner and writer of the current [`Credential`]. Reads are cheap
//! snapshots; writes are serialized and persisted through the
//! [`CredentialPersistence`] collaborator before `replace` returns.

use std::sync::Arc;

use tether_domain::{Credential, Result};
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use crate::ports::CredentialPersistence;

/// Holds the current credential and mirrors it to persistence
pub struct CredentialStore {
    persistence: Arc<dyn CredentialPersistence>,
    current: watch::Sender<Credential>,
    write_lock: Mutex<()>,
}

impl CredentialStore {
    /// Create an empty store backed by `persistence`
    #[must_use]
    pub fn new(persistence: Arc<dyn CredentialPersistence>) -> Self {
        let (current, _) = watch::channel(Credential::empty());
        Self { persistence, current, write_lock: Mutex::new(()) }
    }

    /// Load the persisted credential into memory
    ///
    /// A missing blob leaves the store logged out.
    ///
    /// # Errors
    /// Returns error if the persistence backend fails.
    pub async fn load(&self) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        match self.persistence.load().await? {
            Some(credential) => {
                let authenticated = credential.is_authenticated();
                self.current.send_replace(credential);
                info!(authenticated, "Loaded persisted credential");
                Ok(authenticated)
            }
            None => {
                debug!("No persisted credential found");
                self.current.send_replace(Credential::empty());
                Ok(false)
            }
        }
    }

    /// Snapshot of the current credential
    #[must_use]
    pub fn get(&self) -> Credential {
        self.current.borrow().clone()
    }

    /// Whether a refresh token is held
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.current.borrow().is_authenticated()
    }

    /// Swap in `credential` and persist it
    ///
    /// The in-memory value is replaced even when persistence fails, because
    /// a freshly issued credential may already have invalidated the old
    /// refresh token upstream.
    ///
    /// # Errors
    /// Returns error if the persistence backend fails.
    pub async fn replace(&self, credential: Credential) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.current.send_replace(credential.clone());

        if let Err(e) = self.persistence.save(&credential).await {
            warn!(error = %e, "Failed to persist credential");
            return Err(e);
        }

        debug!(authenticated = credential.is_authenticated(), "Credential replaced");
        Ok(())
    }

    /// Reset to the logged-out credential
    ///
    /// # Errors
    /// Returns error if the persistence backend fails.
    pub async fn clear(&self) -> Result<()> {
        self.replace(Credential::empty()).await
    }

    /// Receive every future credential change
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Credential> {
        self.current.subscribe()
    }
}
