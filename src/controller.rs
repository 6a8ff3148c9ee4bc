//! Auth session controller: login, reload and logout flows.
//!
//! ARCHITECTURE
//! ============
//! Each flow emits its `*Begin` event synchronously, before the first await,
//! then settles with exactly one terminal event once the endpoint call
//! resolves. Events flow through the injected [`SessionStore`].
//!
//! Token persistence runs after the store lock is released, on the blocking
//! pool, and only for a settle that was applied. A controller-wide
//! persistence lock spans settle plus write so disk writes land in the same
//! order as the transitions that caused them.
//!
//! TRADE-OFFS
//! ==========
//! Logout clears the local session even when the endpoint fails to
//! acknowledge it: a client cannot stay signed in against a server it could
//! not reach to sign out. The error is kept on the `Anonymous` state for
//! display.
//!
//! A flow superseded after the endpoint already issued it a token pair
//! revokes that pair on a best-effort basis, so the server does not keep a
//! session nobody holds.

use std::sync::Arc;

use crate::endpoint::{Credentials, TokenEndpoint, TokenPair};
use crate::error::AuthError;
use crate::session::{Event, FlowTicket, SessionStore};
use crate::storage::{StorageError, TokenStore};
use crate::token::{self, Claims};

/// What to do with the persisted pair once a terminal event is applied.
enum Persist {
    Keep,
    Save(TokenPair),
    Clear,
}

/// Drives session transitions against a token-issuing endpoint.
#[derive(Clone)]
pub struct AuthController {
    endpoint: Arc<dyn TokenEndpoint>,
    tokens: Arc<dyn TokenStore>,
    session: SessionStore,
    persist_lock: Arc<tokio::sync::Mutex<()>>,
}

impl AuthController {
    #[must_use]
    pub fn new(endpoint: Arc<dyn TokenEndpoint>, tokens: Arc<dyn TokenStore>, session: SessionStore) -> Self {
        Self { endpoint, tokens, session, persist_lock: Arc::new(tokio::sync::Mutex::new(())) }
    }

    /// The store this controller drives.
    #[must_use]
    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    // =========================================================================
    // LOGIN
    // =========================================================================

    /// Exchange credentials for a token and authenticate the session.
    ///
    /// # Errors
    ///
    /// Returns the same [`AuthError`] carried by the emitted `LoginFailure`,
    /// or [`AuthError::Superseded`] when a newer flow began before this one
    /// settled.
    pub async fn login(&self, username: &str, password: &str) -> Result<Claims, AuthError> {
        let ticket = self.session.begin(Event::LoginBegin);
        tracing::info!(%username, generation = ticket.generation(), "login started");

        let credentials = Credentials::new(username, password);
        let outcome = decode_issued(self.endpoint.issue(&credentials).await);

        match outcome {
            Ok((identity, pair)) => {
                let event = Event::LoginSuccess {
                    identity: identity.clone(),
                    raw_token: pair.token.clone(),
                    refresh_token: pair.refresh.clone(),
                };
                self.settle_authenticated(ticket, event, pair).await?;
                tracing::info!(%username, subject = identity.subject(), "login succeeded");
                Ok(identity)
            }
            Err(error) => {
                log_failure("login", &error);
                self.settle(ticket, Event::LoginFailure { error: error.clone() }, Persist::Keep).await?;
                Err(error)
            }
        }
    }

    // =========================================================================
    // RELOAD
    // =========================================================================

    /// Re-establish the session from the persisted token pair.
    ///
    /// Server rejection or an undecodable token discards the persisted pair;
    /// transport failures keep it so a later reload can retry.
    ///
    /// # Errors
    ///
    /// Returns the same [`AuthError`] carried by the emitted `ReloadFailure`
    /// ([`AuthError::NoStoredSession`] when nothing is persisted), or
    /// [`AuthError::Superseded`].
    pub async fn reload_session(&self) -> Result<Claims, AuthError> {
        let ticket = self.session.begin(Event::ReloadBegin);
        tracing::debug!(generation = ticket.generation(), "session reload started");

        let outcome = match self.stored_pair().await {
            Ok(pair) => decode_issued(self.endpoint.refresh(&pair.refresh).await),
            Err(error) => Err(error),
        };

        match outcome {
            Ok((identity, pair)) => {
                let event = Event::ReloadSuccess {
                    identity: identity.clone(),
                    raw_token: pair.token.clone(),
                    refresh_token: pair.refresh.clone(),
                };
                self.settle_authenticated(ticket, event, pair).await?;
                tracing::info!(subject = identity.subject(), "session reloaded");
                Ok(identity)
            }
            Err(error) => {
                log_failure("reload", &error);
                let persist = if discards_stored_session(&error) { Persist::Clear } else { Persist::Keep };
                self.settle(ticket, Event::ReloadFailure { error: error.clone() }, persist).await?;
                Err(error)
            }
        }
    }

    // =========================================================================
    // LOGOUT
    // =========================================================================

    /// Tell the endpoint to end the session, then clear it locally regardless
    /// of the answer. With nothing to revoke the endpoint is not contacted and
    /// the flow still completes `LogoutBegin`/`LogoutSuccess`.
    ///
    /// # Errors
    ///
    /// Returns the endpoint's error after the session has been cleared, or
    /// [`AuthError::Superseded`].
    pub async fn logout(&self) -> Result<(), AuthError> {
        let live_refresh = self.session.state().session().map(|s| s.refresh_token.clone());
        let ticket = self.session.begin(Event::LogoutBegin);
        tracing::info!(generation = ticket.generation(), "logout started");

        let refresh = match live_refresh {
            Some(refresh) => Some(refresh),
            None => self.persisted_refresh_token().await,
        };
        let result = match refresh {
            Some(refresh) => self.endpoint.revoke(&refresh).await,
            None => {
                tracing::debug!("no session to revoke");
                Ok(())
            }
        };

        match result {
            Ok(()) => {
                self.settle(ticket, Event::LogoutSuccess, Persist::Clear).await?;
                tracing::info!("logout complete");
                Ok(())
            }
            Err(error) => {
                tracing::warn!(code = error.error_code(), error = %error, "logout not acknowledged; session cleared locally");
                self.settle(ticket, Event::LogoutFailure { error: error.clone() }, Persist::Clear).await?;
                Err(error)
            }
        }
    }

    // =========================================================================
    // HELPERS
    // =========================================================================

    async fn settle_authenticated(&self, ticket: FlowTicket, event: Event, pair: TokenPair) -> Result<(), AuthError> {
        let refresh = pair.refresh.clone();
        let settled = self.settle(ticket, event, Persist::Save(pair)).await;
        if settled.is_err() {
            self.revoke_orphaned(&refresh).await;
        }
        settled
    }

    /// Settle through the store, then persist if the event was applied. A
    /// stale flow reports `Superseded` whatever its own outcome.
    async fn settle(&self, ticket: FlowTicket, event: Event, persist: Persist) -> Result<(), AuthError> {
        let _order = self.persist_lock.lock().await;
        if self.session.settle(ticket, event).is_none() {
            tracing::debug!(generation = ticket.generation(), "flow superseded");
            return Err(AuthError::Superseded);
        }
        match persist {
            Persist::Keep => {}
            Persist::Save(pair) => {
                if let Err(e) = self.with_tokens(move |tokens| tokens.save(&pair)).await {
                    tracing::warn!(error = %e, "failed to persist session tokens");
                }
            }
            Persist::Clear => {
                if let Err(e) = self.with_tokens(|tokens| tokens.clear()).await {
                    tracing::warn!(error = %e, "failed to clear persisted session tokens");
                }
            }
        }
        Ok(())
    }

    /// Revoke a pair issued to a flow that was superseded before it settled.
    async fn revoke_orphaned(&self, refresh: &str) {
        let held = self.session.state().session().is_some_and(|s| s.refresh_token == refresh);
        if held {
            return;
        }
        tracing::warn!("superseded flow was issued a session; revoking it");
        if let Err(e) = self.endpoint.revoke(refresh).await {
            tracing::warn!(code = e.error_code(), error = %e, "failed to revoke superseded session");
        }
    }

    /// Run a token store operation on the blocking pool.
    async fn with_tokens<T, F>(&self, op: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(&dyn TokenStore) -> Result<T, StorageError> + Send + 'static,
    {
        let tokens = Arc::clone(&self.tokens);
        tokio::task::spawn_blocking(move || op(tokens.as_ref()))
            .await
            .map_err(|e| StorageError::Io(std::io::Error::other(e)))?
    }

    async fn stored_pair(&self) -> Result<TokenPair, AuthError> {
        self.with_tokens(|tokens| tokens.load())
            .await
            .map_err(|e| AuthError::Storage(e.to_string()))?
            .ok_or(AuthError::NoStoredSession)
    }

    async fn persisted_refresh_token(&self) -> Option<String> {
        match self.with_tokens(|tokens| tokens.load()).await {
            Ok(pair) => pair.map(|p| p.refresh),
            Err(e) => {
                tracing::warn!(error = %e, "could not read persisted session for logout");
                None
            }
        }
    }
}

impl std::fmt::Debug for AuthController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthController").field("session", &self.session).finish_non_exhaustive()
    }
}

/// Decode the issued token; a malformed one becomes `AuthError::Decode`.
fn decode_issued(issued: Result<TokenPair, AuthError>) -> Result<(Claims, TokenPair), AuthError> {
    let pair = issued?;
    let identity = token::decode(&pair.token)?;
    Ok((identity, pair))
}

fn log_failure(flow: &'static str, error: &AuthError) {
    if error.is_transport() {
        tracing::warn!(flow, code = error.error_code(), error = %error, "endpoint unreachable");
    } else {
        tracing::warn!(flow, code = error.error_code(), status = error.status_code(), error = %error, "flow failed");
    }
}

/// Whether a failed reload means the persisted pair is dead.
fn discards_stored_session(error: &AuthError) -> bool {
    matches!(error, AuthError::Server { .. } | AuthError::Decode(_) | AuthError::InvalidResponse(_))
}

#[cfg(test)]
#[path = "controller_test.rs"]
mod tests;
