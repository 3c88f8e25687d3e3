use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use tether_core::ProfileLookup;
use tether_domain::{Credential, Result, TetherError};

use super::client::HttpClient;
use crate::errors::InfraError;

#[derive(Debug, Deserialize)]
struct ProfileBody {
    display_name: Option<String>,
}

/// Reads the signed-in user's display name from the Web API
#[derive(Clone, Debug)]
pub struct HttpProfileClient {
    http: HttpClient,
    url: String,
}

impl HttpProfileClient {
    pub fn new(http: HttpClient, url: impl Into<String>) -> Self {
        Self { http, url: url.into() }
    }
}

#[async_trait]
impl ProfileLookup for HttpProfileClient {
    async fn display_name(&self, credential: &Credential) -> Result<Option<String>> {
        if credential.access_token.is_empty() {
            return Ok(None);
        }

        let builder = self.http.request(Method::GET, &self.url).bearer_auth(&credential.access_token);
        let profile: ProfileBody = self
            .http
            .send(builder)
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| TetherError::from(InfraError::from(e)))?
            .json()
            .await
            .map_err(|e| TetherError::from(InfraError::from(e)))?;

        Ok(profile.display_name.filter(|name| !name.is_empty()))
    }
}
