//! Session state and its transition table.
//!
//! DESIGN
//! ======
//! `SessionState` is a sum type, so "identity only when authenticated" and
//! "error only when failed" hold structurally. `Event` is closed: each
//! Begin/Success/Failure case carries exactly the fields valid for it, and
//! `transition` matches exhaustively. There is no unknown-event path.
//!
//! The transition table does not depend on the prior state; the prior state is
//! taken so the reducer reads like one and so transitions can be traced.

pub mod store;

pub use store::{Dispatch, FlowTicket, SessionStore};

use serde::Serialize;

use crate::error::AuthError;
use crate::token::Claims;

// =============================================================================
// STATE
// =============================================================================

/// Coarse authentication status, as read by guards and UI affordances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Anonymous,
    Pending,
    Authenticated,
    Failed,
}

/// Identity and tokens held while authenticated.
#[derive(Clone, PartialEq)]
pub struct Session {
    pub identity: Claims,
    pub raw_token: String,
    pub refresh_token: String,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("identity", &self.identity)
            .field("raw_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

/// Client-held authentication state.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    /// Not signed in. `logout_error` is kept only after a logout the endpoint
    /// failed to acknowledge; the session is cleared either way.
    Anonymous { logout_error: Option<AuthError> },
    /// A flow has begun and not yet settled.
    Pending,
    Authenticated(Session),
    Failed(AuthError),
}

impl SessionState {
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        match self {
            Self::Anonymous { .. } => SessionStatus::Anonymous,
            Self::Pending => SessionStatus::Pending,
            Self::Authenticated(_) => SessionStatus::Authenticated,
            Self::Failed(_) => SessionStatus::Failed,
        }
    }

    #[must_use]
    pub fn identity(&self) -> Option<&Claims> {
        match self {
            Self::Authenticated(session) => Some(&session.identity),
            _ => None,
        }
    }

    #[must_use]
    pub fn session(&self) -> Option<&Session> {
        match self {
            Self::Authenticated(session) => Some(session),
            _ => None,
        }
    }

    /// Error to show the user: the failure for `Failed`, or the retained
    /// logout error for `Anonymous`.
    #[must_use]
    pub fn error(&self) -> Option<&AuthError> {
        match self {
            Self::Failed(err) | Self::Anonymous { logout_error: Some(err) } => Some(err),
            _ => None,
        }
    }

    /// Apply `event`, returning the next state.
    #[must_use]
    pub fn apply(self, event: Event) -> Self {
        transition(self, event)
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::Anonymous { logout_error: None }
    }
}

// =============================================================================
// EVENTS
// =============================================================================

/// Which flow an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Flow {
    Login,
    Logout,
    Reload,
}

/// Position of an event within its flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Begin,
    Success,
    Failure,
}

/// Session transitions emitted by the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    LoginBegin,
    LoginSuccess { identity: Claims, raw_token: String, refresh_token: String },
    LoginFailure { error: AuthError },
    LogoutBegin,
    LogoutSuccess,
    LogoutFailure { error: AuthError },
    ReloadBegin,
    ReloadSuccess { identity: Claims, raw_token: String, refresh_token: String },
    ReloadFailure { error: AuthError },
}

impl Event {
    #[must_use]
    pub fn flow(&self) -> Flow {
        match self {
            Self::LoginBegin | Self::LoginSuccess { .. } | Self::LoginFailure { .. } => Flow::Login,
            Self::LogoutBegin | Self::LogoutSuccess | Self::LogoutFailure { .. } => Flow::Logout,
            Self::ReloadBegin | Self::ReloadSuccess { .. } | Self::ReloadFailure { .. } => Flow::Reload,
        }
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        match self {
            Self::LoginBegin | Self::LogoutBegin | Self::ReloadBegin => Phase::Begin,
            Self::LoginSuccess { .. } | Self::LogoutSuccess | Self::ReloadSuccess { .. } => Phase::Success,
            Self::LoginFailure { .. } | Self::LogoutFailure { .. } | Self::ReloadFailure { .. } => Phase::Failure,
        }
    }

    #[must_use]
    pub fn is_begin(&self) -> bool {
        self.phase() == Phase::Begin
    }

    /// Stable event name, e.g. `"login_success"`.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::LoginBegin => "login_begin",
            Self::LoginSuccess { .. } => "login_success",
            Self::LoginFailure { .. } => "login_failure",
            Self::LogoutBegin => "logout_begin",
            Self::LogoutSuccess => "logout_success",
            Self::LogoutFailure { .. } => "logout_failure",
            Self::ReloadBegin => "reload_begin",
            Self::ReloadSuccess { .. } => "reload_success",
            Self::ReloadFailure { .. } => "reload_failure",
        }
    }
}

// =============================================================================
// TRANSITION
// =============================================================================

/// Pure transition function over the session state.
///
/// - every `*Begin` moves to `Pending`
/// - `LoginSuccess`/`ReloadSuccess` move to `Authenticated`
/// - `LoginFailure`/`ReloadFailure` move to `Failed`
/// - `LogoutSuccess` moves to `Anonymous`
/// - `LogoutFailure` also moves to `Anonymous`, retaining the error
#[must_use]
pub fn transition(current: SessionState, event: Event) -> SessionState {
    let from = current.status();
    let event_name = event.name();
    let next = match event {
        Event::LoginBegin | Event::LogoutBegin | Event::ReloadBegin => SessionState::Pending,
        Event::LoginSuccess { identity, raw_token, refresh_token }
        | Event::ReloadSuccess { identity, raw_token, refresh_token } => {
            SessionState::Authenticated(Session { identity, raw_token, refresh_token })
        }
        Event::LoginFailure { error } | Event::ReloadFailure { error } => SessionState::Failed(error),
        Event::LogoutSuccess => SessionState::Anonymous { logout_error: None },
        Event::LogoutFailure { error } => SessionState::Anonymous { logout_error: Some(error) },
    };
    tracing::trace!(event = event_name, ?from, to = ?next.status(), "session transition");
    next
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
