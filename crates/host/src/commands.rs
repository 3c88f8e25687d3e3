//! Line commands understood by the host shell

use thiserror::Error;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Login,
    /// Redirect delivered by the browser
    Callback { code: String, state: String },
    Online,
    Offline,
    Status,
    Logout,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command: {0}")]
    Unknown(String),

    #[error("usage: callback <redirect-url>")]
    MissingCallbackUrl,

    #[error("invalid callback URL: {0}")]
    InvalidUrl(String),

    #[error("authorization denied: {0}")]
    Denied(String),

    #[error("callback URL has no `{0}` parameter")]
    MissingParameter(&'static str),
}

/// Parse one input line; blank lines yield `None`
pub fn parse(line: &str) -> Result<Option<Command>, CommandError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let (verb, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let command = match verb.to_ascii_lowercase().as_str() {
        "login" => Command::Login,
        "callback" => parse_callback(rest.trim())?,
        "online" => Command::Online,
        "offline" => Command::Offline,
        "status" => Command::Status,
        "logout" => Command::Logout,
        "quit" | "exit" => Command::Quit,
        other => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(Some(command))
}

fn parse_callback(raw: &str) -> Result<Command, CommandError> {
    if raw.is_empty() {
        return Err(CommandError::MissingCallbackUrl);
    }

    let url = Url::parse(raw).map_err(|e| CommandError::InvalidUrl(e.to_string()))?;
    let param = |name: &str| {
        url.query_pairs().find(|(key, _)| key == name).map(|(_, value)| value.into_owned())
    };

    if let Some(error) = param("error") {
        return Err(CommandError::Denied(error));
    }

    let code = param("code").ok_or(CommandError::MissingParameter("code"))?;
    let state = param("state").ok_or(CommandError::MissingParameter("state"))?;
    Ok(Command::Callback { code, state })
}
