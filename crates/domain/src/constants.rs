//! Application constants
//!
//! Centralized location for the endpoint, scope, and timing defaults used
//! throughout the credential lifecycle.

// Provider endpoints
pub const DEFAULT_ACCOUNTS_DOMAIN: &str = "accounts.spotify.com";
pub const DEFAULT_API_BASE: &str = "https://api.spotify.com";
pub const AUTHORIZE_PATH: &str = "/authorize";
pub const TOKEN_PATH: &str = "/api/token";
pub const PROFILE_PATH: &str = "/v1/me";
pub const DEFAULT_REDIRECT_URI: &str = "tether://oauth/callback";

// Refresh scheduling
pub const DEFAULT_REFRESH_PERIOD_MS: u64 = 3_600_000;
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 3_000;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;
/// Ceiling for the backoff between refresh retries while reported online
pub const MAX_TRANSPORT_RETRY_DELAY_MS: u64 = 300_000;

// Connectivity detection
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1_500;
pub const DEFAULT_PROBE_URL: &str = "https://www.gstatic.com/generate_204";
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 5_000;

// Authorization
pub const DEFAULT_STATE_TTL_SECS: u64 = 600;
pub const STATE_LENGTH: usize = 48;
pub const DEFAULT_MANIFEST_NAME: &str = "tether";

/// Permission scopes requested at login.
///
/// Covers profile, library, follow, playlist, and playback access so the
/// host extension never needs to re-authorize for a narrower feature.
pub const DEFAULT_SCOPES: &[&str] = &[
    "user-follow-modify",
    "user-follow-read",
    "user-read-playback-position",
    "user-top-read",
    "user-read-recently-played",
    "user-library-modify",
    "user-library-read",
    "user-read-email",
    "user-read-private",
    "ugc-image-upload",
    "app-remote-control",
    "streaming",
    "playlist-read-private",
    "playlist-read-collaborative",
    "playlist-modify-private",
    "playlist-modify-public",
    "user-read-playback-state",
    "user-modify-playback-state",
    "user-read-currently-playing",
];
