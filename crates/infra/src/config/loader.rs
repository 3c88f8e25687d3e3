//! Configuration loader
//!
//! Loads the lifecycle configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If the client credentials are not in the environment, falls back to a
//!    config file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! - `TETHER_CLIENT_ID`: OAuth client id (required)
//! - `TETHER_CLIENT_SECRET`: OAuth client secret (required)
//! - `TETHER_MANIFEST_NAME`: Name attached to every log line
//! - `TETHER_ACCOUNTS_DOMAIN`: Accounts host for authorize/token endpoints
//! - `TETHER_API_BASE`: Web API base for the profile lookup
//! - `TETHER_REDIRECT_URI`: OAuth redirect URI
//! - `TETHER_SCOPES`: Space-separated scope list
//! - `TETHER_REFRESH_PERIOD_MS`: Periodic refresh interval
//! - `TETHER_SETTLE_DELAY_MS`: Delay before the catch-up refresh
//! - `TETHER_REQUEST_TIMEOUT_MS`: Token endpoint request timeout
//! - `TETHER_CONNECTIVITY_MODE`: `auto`, `native` or `polling`
//! - `TETHER_POLL_INTERVAL_MS`: Reachability poll interval
//! - `TETHER_PROBE_URL`: Reachability endpoint
//! - `TETHER_PROBE_TIMEOUT_MS`: Reachability probe timeout
//! - `TETHER_STATE_TTL_SECS`: Pending login lifetime
//! - `TETHER_FORCE_REAUTH`: Re-run login even when authenticated (true/false)
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./tether.toml` or `./tether.json` (current working directory)
//! 2. `../tether.toml` or `../tether.json` (parent directory)
//! 3. Relative to executable location

use std::path::{Path, PathBuf};
use std::str::FromStr;

use tether_domain::{ConnectivityMode, Result, TetherConfig, TetherError};

/// Load configuration with automatic fallback strategy
///
/// First attempts to load from environment variables. If the client
/// credentials are missing, falls back to loading from a config file.
///
/// # Errors
/// Returns `TetherError::Configuration` if:
/// - Configuration cannot be loaded from either source
/// - File format is invalid
/// - A variable has an invalid value
pub fn load() -> Result<TetherConfig> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// See module documentation for the complete list.
///
/// # Errors
/// Returns `TetherError::Configuration` if the client credentials are
/// missing or a variable has an invalid value.
pub fn load_from_env() -> Result<TetherConfig> {
    from_lookup(|key| std::env::var(key).ok())
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns `TetherError::Configuration` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
pub fn load_from_file(path: Option<PathBuf>) -> Result<TetherConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(TetherError::Configuration(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            TetherError::Configuration(
                "No config file found in any of the standard locations".to_string(),
            )
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| TetherError::Configuration(format!("Failed to read config file: {e}")))?;

    parse_config(&contents, &config_path)
}

/// Probe multiple paths for configuration files
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        candidates.extend(config_candidates(&cwd));
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.extend(config_candidates(exe_dir));
        }
    }

    candidates.into_iter().find(|path| path.exists())
}

fn config_candidates(dir: &Path) -> Vec<PathBuf> {
    vec![
        dir.join("tether.toml"),
        dir.join("tether.json"),
        dir.join("../tether.toml"),
        dir.join("../tether.json"),
    ]
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
fn parse_config(contents: &str, path: &Path) -> Result<TetherConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| TetherError::Configuration(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| TetherError::Configuration(format!("Invalid JSON format: {e}"))),
        _ => Err(TetherError::Configuration(format!("Unsupported config format: {extension}"))),
    }
}

/// Build a config from a variable lookup, starting from defaults
fn from_lookup<F>(lookup: F) -> Result<TetherConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let required = |key: &str| {
        lookup(key).filter(|v| !v.trim().is_empty()).ok_or_else(|| {
            TetherError::Configuration(format!("Missing required environment variable: {key}"))
        })
    };

    let mut config = TetherConfig::default();
    config.provider.client_id = required("TETHER_CLIENT_ID")?;
    config.provider.client_secret = required("TETHER_CLIENT_SECRET")?;

    if let Some(name) = lookup("TETHER_MANIFEST_NAME") {
        config.manifest_name = name;
    }
    if let Some(domain) = lookup("TETHER_ACCOUNTS_DOMAIN") {
        config.provider.accounts_domain = domain;
    }
    if let Some(base) = lookup("TETHER_API_BASE") {
        config.provider.api_base = base;
    }
    if let Some(uri) = lookup("TETHER_REDIRECT_URI") {
        config.provider.redirect_uri = uri;
    }
    if let Some(scopes) = lookup("TETHER_SCOPES") {
        config.provider.scopes = scopes.split_whitespace().map(str::to_string).collect();
    }

    if let Some(v) = parse_var(&lookup, "TETHER_REFRESH_PERIOD_MS")? {
        config.refresh.period_ms = v;
    }
    if let Some(v) = parse_var(&lookup, "TETHER_SETTLE_DELAY_MS")? {
        config.refresh.settle_delay_ms = v;
    }
    if let Some(v) = parse_var(&lookup, "TETHER_REQUEST_TIMEOUT_MS")? {
        config.refresh.request_timeout_ms = v;
    }

    if let Some(mode) = lookup("TETHER_CONNECTIVITY_MODE") {
        config.connectivity.mode = parse_mode(&mode)?;
    }
    if let Some(v) = parse_var(&lookup, "TETHER_POLL_INTERVAL_MS")? {
        config.connectivity.poll_interval_ms = v;
    }
    if let Some(url) = lookup("TETHER_PROBE_URL") {
        config.connectivity.probe_url = url;
    }
    if let Some(v) = parse_var(&lookup, "TETHER_PROBE_TIMEOUT_MS")? {
        config.connectivity.probe_timeout_ms = v;
    }

    if let Some(v) = parse_var(&lookup, "TETHER_STATE_TTL_SECS")? {
        config.login.state_ttl_secs = v;
    }
    config.login.force_reauth = env_bool(lookup("TETHER_FORCE_REAUTH"), false);

    Ok(config)
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| TetherError::Configuration(format!("Invalid {key}: {e}")))
        })
        .transpose()
}

fn parse_mode(raw: &str) -> Result<ConnectivityMode> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "auto" => Ok(ConnectivityMode::Auto),
        "native" => Ok(ConnectivityMode::Native),
        "polling" => Ok(ConnectivityMode::Polling),
        other => Err(TetherError::Configuration(format!("Invalid connectivity mode: {other}"))),
    }
}

/// Parse a boolean
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(value: Option<String>, default: bool) -> bool {
    value
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use tempfile::Builder;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> =
            pairs.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_env_bool_parsing() {
        for truthy in ["1", "true", "yes", "on", "TRUE"] {
            assert!(env_bool(Some(truthy.to_string()), false));
        }
        for falsy in ["0", "false", "no", "off"] {
            assert!(!env_bool(Some(falsy.to_string()), true));
        }
        assert!(env_bool(None, true));
        assert!(!env_bool(None, false));
    }

    #[test]
    fn test_lookup_with_credentials_only_uses_defaults() {
        let config =
            from_lookup(lookup_from(&[("TETHER_CLIENT_ID", "id"), ("TETHER_CLIENT_SECRET", "s")]))
                .unwrap();

        assert_eq!(config.provider.client_id, "id");
        assert_eq!(config.provider.client_secret, "s");
        assert_eq!(config.refresh, TetherConfig::default().refresh);
        assert_eq!(config.connectivity.mode, ConnectivityMode::Auto);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_lookup_overrides() {
        let config = from_lookup(lookup_from(&[
            ("TETHER_CLIENT_ID", "id"),
            ("TETHER_CLIENT_SECRET", "s"),
            ("TETHER_MANIFEST_NAME", "spotify"),
            ("TETHER_SCOPES", "user-read-private  streaming"),
            ("TETHER_REFRESH_PERIOD_MS", "60000"),
            ("TETHER_SETTLE_DELAY_MS", "500"),
            ("TETHER_CONNECTIVITY_MODE", "Polling"),
            ("TETHER_POLL_INTERVAL_MS", "2000"),
            ("TETHER_FORCE_REAUTH", "yes"),
        ]))
        .unwrap();

        assert_eq!(config.manifest_name(), "spotify");
        assert_eq!(config.provider.scopes, vec!["user-read-private", "streaming"]);
        assert_eq!(config.refresh.period_ms, 60_000);
        assert_eq!(config.refresh.settle_delay_ms, 500);
        assert_eq!(config.connectivity.mode, ConnectivityMode::Polling);
        assert_eq!(config.connectivity.poll_interval_ms, 2_000);
        assert!(config.login.force_reauth);
    }

    #[test]
    fn test_lookup_missing_credentials() {
        let result = from_lookup(lookup_from(&[("TETHER_CLIENT_ID", "id")]));
        assert!(
            matches!(result, Err(TetherError::Configuration(msg)) if msg.contains("TETHER_CLIENT_SECRET"))
        );
    }

    #[test]
    fn test_lookup_invalid_number() {
        let result = from_lookup(lookup_from(&[
            ("TETHER_CLIENT_ID", "id"),
            ("TETHER_CLIENT_SECRET", "s"),
            ("TETHER_SETTLE_DELAY_MS", "soon"),
        ]));
        assert!(matches!(result, Err(TetherError::Configuration(_))));
    }

    #[test]
    fn test_lookup_invalid_mode() {
        let result = from_lookup(lookup_from(&[
            ("TETHER_CLIENT_ID", "id"),
            ("TETHER_CLIENT_SECRET", "s"),
            ("TETHER_CONNECTIVITY_MODE", "carrier-pigeon"),
        ]));
        assert!(matches!(result, Err(TetherError::Configuration(_))));
    }

    #[test]
    fn test_load_from_file_toml() {
        let mut file = Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
manifest_name = "tether-test"

[provider]
client_id = "abc"
client_secret = "shh"

[refresh]
settle_delay_ms = 1000

[connectivity]
mode = "native"
"#
        )
        .unwrap();

        let config = load_from_file(Some(file.path().to_path_buf())).unwrap();

        assert_eq!(config.manifest_name(), "tether-test");
        assert_eq!(config.provider.client_id, "abc");
        assert_eq!(config.refresh.settle_delay_ms, 1_000);
        assert_eq!(config.refresh.period_ms, TetherConfig::default().refresh.period_ms);
        assert_eq!(config.connectivity.mode, ConnectivityMode::Native);
    }

    #[test]
    fn test_load_from_file_json() {
        let mut file = Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"provider":{{"client_id":"abc","client_secret":"shh"}}}}"#).unwrap();

        let config = load_from_file(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(config.provider.client_secret, "shh");
    }

    #[test]
    fn test_load_from_file_invalid_format() {
        let mut file = Builder::new().suffix(".toml").tempfile().unwrap();
        write!(file, "provider = [").unwrap();

        let result = load_from_file(Some(file.path().to_path_buf()));
        assert!(matches!(result, Err(TetherError::Configuration(msg)) if msg.contains("TOML")));
    }

    #[test]
    fn test_load_from_file_unsupported_extension() {
        let file = Builder::new().suffix(".yaml").tempfile().unwrap();
        let result = load_from_file(Some(file.path().to_path_buf()));
        assert!(matches!(result, Err(TetherError::Configuration(_))));
    }

    #[test]
    fn test_load_from_missing_file() {
        let result = load_from_file(Some(PathBuf::from("/nonexistent/tether.toml")));
        assert!(matches!(result, Err(TetherError::Configuration(msg)) if msg.contains("not found")));
    }
}
