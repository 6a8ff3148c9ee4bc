//! Client configuration parsed from environment variables.

use std::path::PathBuf;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:2337";
pub const DEFAULT_TOKENS_PATH: &str = "/api/v1/tokens";
pub const DEFAULT_LOGIN_PATH: &str = "/login";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
const SESSION_FILE_NAME: &str = "session.json";

/// Errors produced while reading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid {var}: {value:?} is not a boolean")]
    InvalidBool { var: &'static str, value: String },

    #[error("invalid {var}: {value:?} must start with http:// or https://")]
    InvalidUrl { var: &'static str, value: String },

    #[error("invalid {var}: {value:?} must start with '/'")]
    InvalidPath { var: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self { request_secs: DEFAULT_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthConfig {
    /// Base URL of the token-issuing server, without a trailing slash.
    pub base_url: String,
    pub tokens_path: String,
    /// Global guard switch; when false every route renders.
    pub auth_enabled: bool,
    /// Where guarded routes redirect unauthenticated navigation.
    pub login_path: String,
    /// Persisted token file; `None` keeps tokens in memory only.
    pub session_file: Option<PathBuf>,
    pub timeouts: Timeouts,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            tokens_path: DEFAULT_TOKENS_PATH.to_owned(),
            auth_enabled: true,
            login_path: DEFAULT_LOGIN_PATH.to_owned(),
            session_file: None,
            timeouts: Timeouts::default(),
        }
    }
}

impl AuthConfig {
    /// Build typed config from environment variables.
    ///
    /// Optional:
    /// - `AUTH_BASE_URL`: default `http://127.0.0.1:2337`
    /// - `AUTH_TOKENS_PATH`: default `/api/v1/tokens`
    /// - `AUTH_ENABLED`: `1/true/yes/on` or `0/false/no/off`, default true
    /// - `AUTH_LOGIN_PATH`: default `/login`
    /// - `AUTH_SESSION_FILE`: persisted token file, default none
    /// - `AUTH_REQUEST_TIMEOUT_SECS`: default 30
    /// - `AUTH_CONNECT_TIMEOUT_SECS`: default 10
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for malformed booleans, URLs or paths.
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url = std::env::var("AUTH_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_owned());
        let tokens_path = std::env::var("AUTH_TOKENS_PATH").unwrap_or_else(|_| DEFAULT_TOKENS_PATH.to_owned());
        let login_path = std::env::var("AUTH_LOGIN_PATH").unwrap_or_else(|_| DEFAULT_LOGIN_PATH.to_owned());
        let auth_enabled = match std::env::var("AUTH_ENABLED") {
            Ok(raw) => parse_bool(&raw).ok_or(ConfigError::InvalidBool { var: "AUTH_ENABLED", value: raw })?,
            Err(_) => true,
        };
        let session_file = std::env::var_os("AUTH_SESSION_FILE")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        let timeouts = Timeouts {
            request_secs: env_parse_u64("AUTH_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_secs: env_parse_u64("AUTH_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS),
        };

        Self { base_url, tokens_path, auth_enabled, login_path, session_file, timeouts }.validated()
    }

    /// Normalize and check a config built by hand or from flags.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when the base URL is not http(s) or a path
    /// does not start with `/`.
    pub fn validated(mut self) -> Result<Self, ConfigError> {
        self.base_url = self.base_url.trim_end_matches('/').to_owned();
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ConfigError::InvalidUrl { var: "AUTH_BASE_URL", value: self.base_url });
        }
        if !self.tokens_path.starts_with('/') {
            return Err(ConfigError::InvalidPath { var: "AUTH_TOKENS_PATH", value: self.tokens_path });
        }
        if !self.login_path.starts_with('/') {
            return Err(ConfigError::InvalidPath { var: "AUTH_LOGIN_PATH", value: self.login_path });
        }
        Ok(self)
    }

    /// Full URL of the tokens resource.
    #[must_use]
    pub fn tokens_url(&self) -> String {
        format!("{}{}", self.base_url, self.tokens_path)
    }
}

/// Per-user session file under the platform config dir, e.g.
/// `~/.config/tokengate/session.json` on Linux. `None` when the platform has
/// no config dir.
#[must_use]
pub fn default_session_file() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("tokengate").join(SESSION_FILE_NAME))
}

/// Parse the boolean spellings accepted in env vars and flags.
#[must_use]
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn env_parse_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
