//! Token endpoint client
//!
//! Both grants POST a form body to the provider's token endpoint with HTTP
//! Basic client authentication. Failures are classified so the refresh
//! scheduler can tell "offline" from "provider said no".

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::Method;
use tether_core::TokenExchange;
use tether_domain::{
    Credential, ExchangeError, OAuthErrorBody, ProviderConfig, Result, TokenResponse,
};
use tracing::{debug, warn};

use super::client::HttpClient;
use crate::errors::IntoExchangeError;

type ExchangeResult<T> = std::result::Result<T, ExchangeError>;

/// [`TokenExchange`] over HTTP
#[derive(Clone, Debug)]
pub struct HttpTokenClient {
    http: HttpClient,
    token_url: String,
    client_id: String,
    authorization: String,
}

impl HttpTokenClient {
    /// Create a client for `provider` with its own connection pool
    ///
    /// # Errors
    /// Returns `TetherError::Internal` if the HTTP client cannot be built.
    pub fn new(provider: &ProviderConfig, timeout: Duration) -> Result<Self> {
        let http = HttpClient::builder().timeout(timeout).build()?;
        Ok(Self::with_client(http, provider))
    }

    /// Create a client sharing an existing [`HttpClient`]
    pub fn with_client(http: HttpClient, provider: &ProviderConfig) -> Self {
        let credentials = format!("{}:{}", provider.client_id, provider.client_secret);
        Self {
            http,
            token_url: provider.token_url(),
            client_id: provider.client_id.clone(),
            authorization: format!("Basic {}", STANDARD.encode(credentials)),
        }
    }

    async fn post_form(
        &self,
        form: &[(&str, &str)],
        previous: Option<&Credential>,
    ) -> ExchangeResult<Credential> {
        let builder = self
            .http
            .request(Method::POST, &self.token_url)
            .header(AUTHORIZATION, &self.authorization)
            .header(ACCEPT, "application/json")
            .form(form);

        let response = self.http.send(builder).await.map_err(IntoExchangeError::into_exchange)?;
        let status = response.status();
        let body = response.text().await.map_err(IntoExchangeError::into_exchange)?;

        if !status.is_success() {
            let message = serde_json::from_str::<OAuthErrorBody>(&body)
                .map(|e| e.to_string())
                .unwrap_or_else(|_| {
                    status.canonical_reason().unwrap_or("unknown status").to_string()
                });
            warn!(status = status.as_u16(), %message, "Token endpoint rejected request");
            return Err(ExchangeError::Provider { status: status.as_u16(), message });
        }

        let parsed: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| ExchangeError::MalformedResponse(e.to_string()))?;
        Ok(parsed.into_credential(previous))
    }
}

#[async_trait]
impl TokenExchange for HttpTokenClient {
    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> ExchangeResult<Credential> {
        debug!("Exchanging authorization code");
        self.post_form(
            &[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", redirect_uri),
                ("client_id", self.client_id.as_str()),
            ],
            None,
        )
        .await
    }

    async fn refresh(&self, current: &Credential) -> ExchangeResult<Credential> {
        if current.refresh_token.is_empty() {
            return Err(ExchangeError::MissingRefreshToken);
        }

        debug!("Refreshing access token");
        self.post_form(
            &[
                ("grant_type", "refresh_token"),
                ("refresh_token", current.refresh_token.as_str()),
                ("client_id", self.client_id.as_str()),
            ],
            Some(current),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn provider(server: &MockServer) -> ProviderConfig {
        ProviderConfig {
            client_id: "abc".to_string(),
            client_secret: "shh".to_string(),
            accounts_domain: server.uri(),
            ..ProviderConfig::default()
        }
    }

    fn client(server: &MockServer) -> HttpTokenClient {
        HttpTokenClient::new(&provider(server), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn exchange_code_posts_form_with_basic_auth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/token"))
            .and(header("authorization", "Basic YWJjOnNoaA=="))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code=the-code"))
            .and(body_string_contains("redirect_uri=tether%3A%2F%2Foauth%2Fcallback"))
            .and(body_string_contains("client_id=abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "A1",
                "token_type": "Bearer",
                "expires_in": 3600,
                "refresh_token": "R1",
                "scope": "user-read-private"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let credential =
            client(&server).exchange_code("the-code", "tether://oauth/callback").await.unwrap();

        assert_eq!(credential.access_token, "A1");
        assert_eq!(credential.refresh_token, "R1");
        assert_eq!(credential.expires_in, 3600);
        assert_eq!(credential.scope.as_deref(), Some("user-read-private"));
        assert!(credential.obtained_at.is_some());
    }

    #[tokio::test]
    async fn refresh_keeps_refresh_token_when_omitted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=R0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "A2",
                "token_type": "Bearer",
                "expires_in": 3600
            })))
            .mount(&server)
            .await;

        let current = Credential::new("A0", "Bearer", 3600, "R0");
        let refreshed = client(&server).refresh(&current).await.unwrap();

        assert_eq!(refreshed.access_token, "A2");
        assert_eq!(refreshed.refresh_token, "R0");
    }

    #[tokio::test]
    async fn refresh_adopts_rotated_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "A2",
                "expires_in": 3600,
                "refresh_token": "R-rotated"
            })))
            .mount(&server)
            .await;

        let current = Credential::new("A0", "Bearer", 3600, "R0");
        let refreshed = client(&server).refresh(&current).await.unwrap();

        assert_eq!(refreshed.refresh_token, "R-rotated");
        assert_eq!(refreshed.token_type, "Bearer");
    }

    #[tokio::test]
    async fn provider_error_carries_oauth_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant",
                "error_description": "Refresh token revoked"
            })))
            .mount(&server)
            .await;

        let current = Credential::new("A0", "Bearer", 3600, "R0");
        let err = client(&server).refresh(&current).await.unwrap_err();

        assert_eq!(
            err,
            ExchangeError::Provider {
                status: 400,
                message: "invalid_grant: Refresh token revoked".to_string()
            }
        );
        assert!(!err.is_transport());
    }

    #[tokio::test]
    async fn server_error_without_body_is_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let current = Credential::new("A0", "Bearer", 3600, "R0");
        let err = client(&server).refresh(&current).await.unwrap_err();

        assert!(matches!(err, ExchangeError::Provider { status: 503, .. }));
    }

    #[tokio::test]
    async fn malformed_success_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let current = Credential::new("A0", "Bearer", 3600, "R0");
        let err = client(&server).refresh(&current).await.unwrap_err();

        assert!(matches!(err, ExchangeError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_transport() {
        let provider = ProviderConfig {
            client_id: "abc".to_string(),
            client_secret: "shh".to_string(),
            accounts_domain: "http://127.0.0.1:9".to_string(),
            ..ProviderConfig::default()
        };
        let client = HttpTokenClient::new(&provider, Duration::from_secs(2)).unwrap();

        let current = Credential::new("A0", "Bearer", 3600, "R0");
        let err = client.refresh(&current).await.unwrap_err();

        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn refresh_without_token_skips_network() {
        let server = MockServer::start().await;
        Mock::given(method("POST")).respond_with(ResponseTemplate::new(200)).expect(0).mount(&server).await;

        let err = client(&server).refresh(&Credential::empty()).await.unwrap_err();
        assert_eq!(err, ExchangeError::MissingRefreshToken);
    }
}
