//! Credential storage in the platform keychain
//!
//! The whole credential is kept as one JSON secret under
//! `(service, account)`. Keychain calls block, so they run on the blocking
//! pool.

use async_trait::async_trait;
use keyring::Entry;
use tether_core::CredentialPersistence;
use tether_domain::{Credential, Result, TetherError};
use tracing::debug;

use crate::errors::InfraError;

#[derive(Debug, Clone)]
pub struct KeyringCredentialPersistence {
    service: String,
    account: String,
}

impl KeyringCredentialPersistence {
    pub fn new(service: impl Into<String>, account: impl Into<String>) -> Self {
        Self { service: service.into(), account: account.into() }
    }

    fn entry(service: &str, account: &str) -> Result<Entry> {
        Entry::new(service, account).map_err(|e| TetherError::from(InfraError::from(e)))
    }
}

#[async_trait]
impl CredentialPersistence for KeyringCredentialPersistence {
    async fn load(&self) -> Result<Option<Credential>> {
        let service = self.service.clone();
        let account = self.account.clone();

        let secret = tokio::task::spawn_blocking(move || -> Result<Option<String>> {
            match Self::entry(&service, &account)?.get_password() {
                Ok(secret) => Ok(Some(secret)),
                Err(keyring::Error::NoEntry) => Ok(None),
                Err(e) => Err(InfraError::from(e).into()),
            }
        })
        .await
        .map_err(|e| TetherError::Internal(format!("keychain task failed: {e}")))??;

        let Some(secret) = secret else {
            debug!(service = %self.service, "No credential in keychain");
            return Ok(None);
        };

        serde_json::from_str(&secret)
            .map(Some)
            .map_err(|e| TetherError::Persistence(format!("Invalid keychain credential: {e}")))
    }

    async fn save(&self, credential: &Credential) -> Result<()> {
        let secret = serde_json::to_string(credential)
            .map_err(|e| TetherError::Persistence(format!("Failed to encode credential: {e}")))?;
        let service = self.service.clone();
        let account = self.account.clone();

        tokio::task::spawn_blocking(move || -> Result<()> {
            Self::entry(&service, &account)?
                .set_password(&secret)
                .map_err(|e| InfraError::from(e).into())
        })
        .await
        .map_err(|e| TetherError::Internal(format!("keychain task failed: {e}")))??;

        debug!(service = %self.service, "Credential saved to keychain");
        Ok(())
    }
}
