//! OAuth credential types
//!
//! [`Credential`] is the unit of persistence and the only value the refresh
//! machinery mutates. An all-empty credential is the logged-out state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Access/refresh token pair issued by the provider
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Credential {
    /// Bearer token for API calls
    pub access_token: String,

    /// Token type, normally "Bearer"
    pub token_type: String,

    /// Access token lifetime in seconds
    pub expires_in: i64,

    /// Long-lived token used to mint new access tokens.
    /// Non-empty means the user is authenticated.
    pub refresh_token: String,

    /// Granted scopes (space-separated)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// When this credential was issued
    #[serde(skip_serializing_if = "Option::is_none")]
    pub obtained_at: Option<DateTime<Utc>>,
}

impl Credential {
    /// Create a credential stamped with the current time
    #[must_use]
    pub fn new(
        access_token: impl Into<String>,
        token_type: impl Into<String>,
        expires_in: i64,
        refresh_token: impl Into<String>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: token_type.into(),
            expires_in,
            refresh_token: refresh_token.into(),
            scope: None,
            obtained_at: Some(Utc::now()),
        }
    }

    /// The logged-out credential
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// True when a refresh token is held
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        !self.refresh_token.is_empty()
    }

    /// Seconds until the access token expires, if issuance time is known.
    ///
    /// `None` as well when `expires_in` overflows the calendar.
    #[must_use]
    pub fn seconds_until_expiry(&self) -> Option<i64> {
        let lifetime = chrono::Duration::try_seconds(self.expires_in)?;
        let expires_at = self.obtained_at?.checked_add_signed(lifetime)?;
        Some((expires_at - Utc::now()).num_seconds())
    }
}

/// Token endpoint response (RFC 6749 §5.1)
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: i64,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl TokenResponse {
    /// Convert into a credential.
    ///
    /// Providers may omit `refresh_token` on refresh; absence (or an empty
    /// value) keeps the refresh token from `previous`.
    #[must_use]
    pub fn into_credential(self, previous: Option<&Credential>) -> Credential {
        let refresh_token = match self.refresh_token.filter(|t| !t.is_empty()) {
            Some(rotated) => rotated,
            None => previous.map(|p| p.refresh_token.clone()).unwrap_or_default(),
        };
        let scope = self.scope.or_else(|| previous.and_then(|p| p.scope.clone()));

        Credential {
            access_token: self.access_token,
            token_type: self.token_type,
            expires_in: self.expires_in,
            refresh_token,
            scope,
            obtained_at: Some(Utc::now()),
        }
    }
}

/// OAuth error body (RFC 6749 §5.2)
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthErrorBody {
    pub error: String,
    pub error_description: Option<String>,
}

impl std::fmt::Display for OAuthErrorBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.error_description {
            Some(desc) => write!(f, "{}: {}", self.error, desc),
            None => write!(f, "{}", self.error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(refresh_token: Option<&str>) -> TokenResponse {
        TokenResponse {
            access_token: "new-access".to_string(),
            token_type: "Bearer".to_string(),
            expires_in: 3600,
            refresh_token: refresh_token.map(str::to_string),
            scope: None,
        }
    }

    #[test]
    fn empty_credential_is_logged_out() {
        let credential = Credential::empty();
        assert!(!credential.is_authenticated());
        assert!(credential.access_token.is_empty());
        assert!(credential.seconds_until_expiry().is_none());
    }

    #[test]
    fn refresh_token_marks_authentication() {
        let credential = Credential::new("a", "Bearer", 3600, "r");
        assert!(credential.is_authenticated());

        let secs = credential.seconds_until_expiry().unwrap();
        assert!(secs > 3590 && secs <= 3600);
    }

    #[test]
    fn absurd_lifetime_has_no_expiry() {
        let credential = Credential::new("a", "Bearer", i64::MAX, "r");
        assert_eq!(credential.seconds_until_expiry(), None);
    }

    #[test]
    fn missing_refresh_token_keeps_previous() {
        let previous = Credential::new("old-access", "Bearer", 3600, "keep-me");
        let merged = response(None).into_credential(Some(&previous));

        assert_eq!(merged.access_token, "new-access");
        assert_eq!(merged.refresh_token, "keep-me");
    }

    #[test]
    fn empty_refresh_token_keeps_previous() {
        let previous = Credential::new("old-access", "Bearer", 3600, "keep-me");
        let merged = response(Some("")).into_credential(Some(&previous));
        assert_eq!(merged.refresh_token, "keep-me");
    }

    #[test]
    fn rotated_refresh_token_replaces_previous() {
        let previous = Credential::new("old-access", "Bearer", 3600, "old-refresh");
        let merged = response(Some("rotated")).into_credential(Some(&previous));
        assert_eq!(merged.refresh_token, "rotated");
    }

    #[test]
    fn response_defaults_token_type() {
        let parsed: TokenResponse =
            serde_json::from_str(r#"{"access_token":"A","expires_in":3600}"#).unwrap();
        assert_eq!(parsed.token_type, "Bearer");
        assert!(parsed.refresh_token.is_none());
    }

    #[test]
    fn credential_tolerates_partial_blob() {
        let parsed: Credential = serde_json::from_str(r#"{"refresh_token":"R"}"#).unwrap();
        assert!(parsed.is_authenticated());
        assert_eq!(parsed.expires_in, 0);

        let json = serde_json::to_string(&Credential::empty()).unwrap();
        assert!(!json.contains("scope"));
        assert!(!json.contains("obtained_at"));
    }

    #[test]
    fn oauth_error_display() {
        let body = OAuthErrorBody {
            error: "invalid_grant".to_string(),
            error_description: Some("Refresh token revoked".to_string()),
        };
        assert_eq!(body.to_string(), "invalid_grant: Refresh token revoked");
    }
}
