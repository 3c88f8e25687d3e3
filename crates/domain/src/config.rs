//! Configuration structures
//!
//! Every section deserializes with defaults so a config file only needs the
//! provider credentials.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    AUTHORIZE_PATH, DEFAULT_ACCOUNTS_DOMAIN, DEFAULT_API_BASE, DEFAULT_MANIFEST_NAME,
    DEFAULT_POLL_INTERVAL_MS, DEFAULT_PROBE_TIMEOUT_MS, DEFAULT_PROBE_URL, DEFAULT_REDIRECT_URI,
    DEFAULT_REFRESH_PERIOD_MS, DEFAULT_REQUEST_TIMEOUT_MS, DEFAULT_SCOPES,
    DEFAULT_SETTLE_DELAY_MS, DEFAULT_STATE_TTL_SECS, PROFILE_PATH, TOKEN_PATH,
};
use crate::errors::{Result, TetherError};

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TetherConfig {
    /// Host extension name, attached to every log line
    pub manifest_name: String,
    pub provider: ProviderConfig,
    pub refresh: RefreshConfig,
    pub connectivity: ConnectivityConfig,
    pub login: LoginConfig,
}

impl TetherConfig {
    /// Check that the provider credentials needed for any token call exist.
    ///
    /// # Errors
    /// Returns `TetherError::Configuration` when the client id or secret is
    /// blank.
    pub fn validate(&self) -> Result<()> {
        if self.provider.client_id.trim().is_empty() {
            return Err(TetherError::Configuration("client id is not set".to_string()));
        }
        if self.provider.client_secret.trim().is_empty() {
            return Err(TetherError::Configuration("client secret is not set".to_string()));
        }
        Ok(())
    }

    /// Manifest name, falling back to the crate default when blank
    #[must_use]
    pub fn manifest_name(&self) -> &str {
        if self.manifest_name.is_empty() {
            DEFAULT_MANIFEST_NAME
        } else {
            &self.manifest_name
        }
    }
}

/// OAuth provider settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Accounts host, e.g. "accounts.spotify.com"
    pub accounts_domain: String,
    /// Web API base URL used for the profile lookup
    pub api_base: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            accounts_domain: DEFAULT_ACCOUNTS_DOMAIN.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            scopes: DEFAULT_SCOPES.iter().map(|s| (*s).to_string()).collect(),
        }
    }
}

impl ProviderConfig {
    /// Authorization endpoint
    ///
    /// A domain that already carries a scheme (as in tests pointing at a
    /// local mock server) is used verbatim.
    #[must_use]
    pub fn authorize_url(&self) -> String {
        format!("{}{AUTHORIZE_PATH}", self.accounts_base())
    }

    /// Token endpoint
    #[must_use]
    pub fn token_url(&self) -> String {
        format!("{}{TOKEN_PATH}", self.accounts_base())
    }

    /// Current-user profile endpoint
    #[must_use]
    pub fn profile_url(&self) -> String {
        format!("{}{PROFILE_PATH}", self.api_base.trim_end_matches('/'))
    }

    /// Scopes as a space-separated string
    #[must_use]
    pub fn scope_string(&self) -> String {
        self.scopes.join(" ")
    }

    fn accounts_base(&self) -> String {
        let domain = self.accounts_domain.trim_end_matches('/');
        if domain.starts_with("http://") || domain.starts_with("https://") {
            domain.to_string()
        } else {
            format!("https://{domain}")
        }
    }
}

/// Refresh scheduler timing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    /// Period between scheduled refreshes
    pub period_ms: u64,
    /// Delay after a reconnect before the catch-up refresh
    pub settle_delay_ms: u64,
    /// Timeout applied to each token endpoint request
    pub request_timeout_ms: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            period_ms: DEFAULT_REFRESH_PERIOD_MS,
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}

impl RefreshConfig {
    #[must_use]
    pub const fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }

    #[must_use]
    pub const fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// How online/offline transitions are detected
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectivityMode {
    /// Native events when the platform reports them reliably, polling otherwise
    #[default]
    Auto,
    /// Host-delivered events only
    Native,
    /// Probe a reachability endpoint on an interval
    Polling,
}

/// Connectivity detection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectivityConfig {
    pub mode: ConnectivityMode,
    pub poll_interval_ms: u64,
    pub probe_url: String,
    pub probe_timeout_ms: u64,
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            mode: ConnectivityMode::Auto,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            probe_url: DEFAULT_PROBE_URL.to_string(),
            probe_timeout_ms: DEFAULT_PROBE_TIMEOUT_MS,
        }
    }
}

impl ConnectivityConfig {
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    #[must_use]
    pub const fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

/// Login behaviour
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginConfig {
    /// Lifetime of a pending CSRF state
    pub state_ttl_secs: u64,
    /// Start a fresh authorization even when already authenticated
    pub force_reauth: bool,
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self { state_ttl_secs: DEFAULT_STATE_TTL_SECS, force_reauth: false }
    }
}

impl LoginConfig {
    #[must_use]
    pub const fn state_ttl(&self) -> Duration {
        Duration::from_secs(self.state_ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured() -> TetherConfig {
        let mut config = TetherConfig::default();
        config.provider.client_id = "abc".to_string();
        config.provider.client_secret = "shh".to_string();
        config
    }

    #[test]
    fn defaults_match_reference_timing() {
        let config = TetherConfig::default();
        assert_eq!(config.refresh.period(), Duration::from_secs(3600));
        assert_eq!(config.refresh.settle_delay(), Duration::from_secs(3));
        assert_eq!(config.login.state_ttl(), Duration::from_secs(600));
        assert_eq!(config.connectivity.mode, ConnectivityMode::Auto);
        assert_eq!(config.manifest_name(), DEFAULT_MANIFEST_NAME);
    }

    #[test]
    fn validate_requires_client_credentials() {
        let mut config = configured();
        assert!(config.validate().is_ok());

        config.provider.client_secret = "  ".to_string();
        assert!(matches!(config.validate(), Err(TetherError::Configuration(_))));

        config.provider.client_id.clear();
        assert!(matches!(config.validate(), Err(TetherError::Configuration(msg)) if msg.contains("client id")));
    }

    #[test]
    fn provider_urls() {
        let provider = ProviderConfig::default();
        assert_eq!(provider.authorize_url(), "https://accounts.spotify.com/authorize");
        assert_eq!(provider.token_url(), "https://accounts.spotify.com/api/token");
        assert_eq!(provider.profile_url(), "https://api.spotify.com/v1/me");
        assert!(provider.scope_string().starts_with("user-follow-modify user-follow-read"));
    }

    #[test]
    fn provider_urls_keep_explicit_scheme() {
        let provider = ProviderConfig {
            accounts_domain: "http://127.0.0.1:8080/".to_string(),
            ..ProviderConfig::default()
        };
        assert_eq!(provider.token_url(), "http://127.0.0.1:8080/api/token");
    }

    #[test]
    fn partial_json_uses_defaults() {
        let config: TetherConfig = serde_json::from_str(
            r#"{"provider":{"client_id":"abc","client_secret":"s"},"connectivity":{"mode":"polling"}}"#,
        )
        .unwrap();

        assert_eq!(config.provider.client_id, "abc");
        assert_eq!(config.provider.redirect_uri, DEFAULT_REDIRECT_URI);
        assert_eq!(config.connectivity.mode, ConnectivityMode::Polling);
        assert_eq!(config.connectivity.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
        assert_eq!(config.refresh.period_ms, DEFAULT_REFRESH_PERIOD_MS);
    }
}
