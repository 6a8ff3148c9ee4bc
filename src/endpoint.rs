//! Token-issuing endpoint client.
//!
//! ARCHITECTURE
//! ============
//! `TokenEndpoint` is the seam the controller talks through, so flows can be
//! tested against in-memory fakes. `HttpTokenEndpoint` is the reqwest
//! implementation; all three calls share one tokens resource:
//!
//! - `POST   {tokens_url}` `{username, password}` → `{token, refresh}`
//! - `POST   {tokens_url}` `{refresh}`            → `{token, refresh}`
//! - `DELETE {tokens_url}` `{refresh}`            → body ignored
//!
//! ERROR HANDLING
//! ==============
//! "No response" becomes `AuthError::Transport`; any non-2xx becomes
//! `AuthError::Server` with the body's `message` when one is present. Response
//! parsing is split into pure functions for testability.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::AuthConfig;
use crate::error::AuthError;

// =============================================================================
// WIRE TYPES
// =============================================================================

/// Token pair returned by the issuing endpoint and persisted between runs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub token: String,
    pub refresh: String,
}

impl std::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPair")
            .field("token", &"<redacted>")
            .field("refresh", &"<redacted>")
            .finish()
    }
}

/// Username/password pair sent on login.
#[derive(Clone, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self { username: username.into(), password: password.into() }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh: &'a str,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

// =============================================================================
// TRAIT
// =============================================================================

/// Async seam over the token-issuing endpoint. Enables mocking in tests.
#[async_trait::async_trait]
pub trait TokenEndpoint: Send + Sync {
    /// Exchange credentials for a token pair.
    ///
    /// # Errors
    ///
    /// Returns `Transport` when no response arrives, `Server` on non-2xx, and
    /// `InvalidResponse` when a 2xx body is not a token pair.
    async fn issue(&self, credentials: &Credentials) -> Result<TokenPair, AuthError>;

    /// Exchange a refresh token for a fresh token pair.
    ///
    /// # Errors
    ///
    /// Same taxonomy as [`TokenEndpoint::issue`].
    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError>;

    /// Ask the endpoint to invalidate the session behind `refresh_token`.
    ///
    /// # Errors
    ///
    /// Returns `Transport` when no response arrives and `Server` on non-2xx.
    async fn revoke(&self, refresh_token: &str) -> Result<(), AuthError>;
}

// =============================================================================
// HTTP CLIENT
// =============================================================================

/// reqwest-backed [`TokenEndpoint`].
#[derive(Debug, Clone)]
pub struct HttpTokenEndpoint {
    http: reqwest::Client,
    tokens_url: String,
}

impl HttpTokenEndpoint {
    /// Build a client for `{base_url}{tokens_path}` with the configured timeouts.
    ///
    /// # Errors
    ///
    /// Returns the reqwest error if the HTTP client cannot be constructed.
    pub fn new(config: &AuthConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeouts.request_secs))
            .connect_timeout(Duration::from_secs(config.timeouts.connect_secs))
            .build()?;
        Ok(Self { http, tokens_url: config.tokens_url() })
    }

    #[must_use]
    pub fn tokens_url(&self) -> &str {
        &self.tokens_url
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<(u16, String), AuthError> {
        let response = request.send().await.map_err(transport_error)?;
        let status = response.status().as_u16();
        let text = response.text().await.map_err(transport_error)?;
        Ok((status, text))
    }
}

#[async_trait::async_trait]
impl TokenEndpoint for HttpTokenEndpoint {
    async fn issue(&self, credentials: &Credentials) -> Result<TokenPair, AuthError> {
        tracing::debug!(url = %self.tokens_url, username = %credentials.username, "requesting token");
        let (status, body) = self.send(self.http.post(&self.tokens_url).json(credentials)).await?;
        parse_token_response(status, &body)
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        tracing::debug!(url = %self.tokens_url, "refreshing token");
        let body = RefreshRequest { refresh: refresh_token };
        let (status, body) = self.send(self.http.post(&self.tokens_url).json(&body)).await?;
        parse_token_response(status, &body)
    }

    async fn revoke(&self, refresh_token: &str) -> Result<(), AuthError> {
        tracing::debug!(url = %self.tokens_url, "revoking token");
        let body = RefreshRequest { refresh: refresh_token };
        let (status, body) = self.send(self.http.delete(&self.tokens_url).json(&body)).await?;
        if is_success(status) { Ok(()) } else { Err(server_error(status, &body)) }
    }
}

// =============================================================================
// PARSING
// =============================================================================

fn transport_error(err: reqwest::Error) -> AuthError {
    AuthError::Transport(err.to_string())
}

fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

fn parse_token_response(status: u16, body: &str) -> Result<TokenPair, AuthError> {
    if !is_success(status) {
        return Err(server_error(status, body));
    }
    serde_json::from_str(body).map_err(|e| AuthError::InvalidResponse(e.to_string()))
}

fn server_error(status: u16, body: &str) -> AuthError {
    AuthError::Server { status, message: server_error_message(status, body) }
}

/// Human-readable message for a rejected request: the JSON body's `message`,
/// else the raw body, else the canonical reason phrase.
fn server_error_message(status: u16, body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        return parsed.message;
    }
    let trimmed = body.trim();
    if !trimmed.is_empty() {
        return trimmed.to_owned();
    }
    reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .map_or_else(|| format!("request failed with status {status}"), str::to_owned)
}

#[cfg(test)]
#[path = "endpoint_test.rs"]
mod tests;
