//! Route guard: decides whether a navigation renders or redirects to login.
//!
//! SYSTEM CONTEXT
//! ==============
//! Every guarded route applies the same rule, so the decision is a pure
//! function of the global flag, the session status and the route's
//! requirement. The guard only reads session state; it never dispatches.

use std::fmt;

use serde::Serialize;

use crate::config::AuthConfig;
use crate::session::{SessionStatus, SessionStore};

/// A navigation target: path plus optional query string (without `?`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Location {
    pub path: String,
    pub query: Option<String>,
}

impl Location {
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into(), query: None }
    }

    /// Split `raw` at the first `?`. An empty path becomes `/` and an empty
    /// query is dropped; any `#fragment` is discarded.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let raw = raw.split('#').next().unwrap_or_default();
        let (path, query) = match raw.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (raw, None),
        };
        let path = if path.is_empty() { "/" } else { path };
        Self {
            path: path.to_owned(),
            query: query.filter(|q| !q.is_empty()).map(str::to_owned),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.query {
            Some(query) => write!(f, "{}?{query}", self.path),
            None => f.write_str(&self.path),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RouteAuthRequirement {
    pub requires_auth: bool,
}

impl RouteAuthRequirement {
    pub const PUBLIC: Self = Self { requires_auth: false };
    pub const PROTECTED: Self = Self { requires_auth: true };
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardConfig {
    pub auth_enabled: bool,
    pub login_path: String,
}

impl From<&AuthConfig> for GuardConfig {
    fn from(config: &AuthConfig) -> Self {
        Self { auth_enabled: config.auth_enabled, login_path: config.login_path.clone() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum GuardDecision {
    Render,
    /// Navigate to `to`, carrying the requested location so login can return.
    Redirect { to: String, from: Location },
}

impl GuardDecision {
    #[must_use]
    pub fn is_render(&self) -> bool {
        matches!(self, Self::Render)
    }
}

/// Decide one navigation.
///
/// Renders when the guard is disabled, the route is public, or the session
/// is authenticated. `Pending`, `Failed` and `Anonymous` all redirect.
#[must_use]
pub fn evaluate(
    config: &GuardConfig,
    status: SessionStatus,
    route: RouteAuthRequirement,
    location: &Location,
) -> GuardDecision {
    if !config.auth_enabled || !route.requires_auth || status == SessionStatus::Authenticated {
        return GuardDecision::Render;
    }
    GuardDecision::Redirect { to: config.login_path.clone(), from: location.clone() }
}

// =============================================================================
// ROUTE TABLE
// =============================================================================

/// Path-prefix routing of auth requirements. The longest matching prefix
/// wins; a prefix matches only on whole path segments.
#[derive(Debug, Clone)]
pub struct RouteTable {
    config: GuardConfig,
    routes: Vec<(String, RouteAuthRequirement)>,
    fallback: RouteAuthRequirement,
}

impl RouteTable {
    /// Table where unmatched paths use `fallback`. The login path is always
    /// public so a redirect never loops.
    #[must_use]
    pub fn new(config: GuardConfig, fallback: RouteAuthRequirement) -> Self {
        let login = config.login_path.clone();
        Self { config, routes: Vec::new(), fallback }.route(login, RouteAuthRequirement::PUBLIC)
    }

    #[must_use]
    pub fn route(mut self, prefix: impl Into<String>, requirement: RouteAuthRequirement) -> Self {
        let prefix = normalize_prefix(prefix.into());
        self.routes.retain(|(existing, _)| *existing != prefix);
        self.routes.push((prefix, requirement));
        self
    }

    #[must_use]
    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    #[must_use]
    pub fn requirement_for(&self, path: &str) -> RouteAuthRequirement {
        self.routes
            .iter()
            .filter(|(prefix, _)| prefix_matches(prefix, path))
            .max_by_key(|(prefix, _)| prefix.len())
            .map_or(self.fallback, |(_, requirement)| *requirement)
    }

    /// Evaluate `location` against the store's current status.
    #[must_use]
    pub fn guard(&self, store: &SessionStore, location: &Location) -> GuardDecision {
        let status = store.status();
        let route = self.requirement_for(&location.path);
        let decision = evaluate(&self.config, status, route, location);
        tracing::debug!(
            path = %location.path,
            ?status,
            requires_auth = route.requires_auth,
            render = decision.is_render(),
            "route guard"
        );
        decision
    }
}

fn normalize_prefix(prefix: String) -> String {
    let trimmed = prefix.trim_end_matches('/');
    if trimmed.is_empty() { "/".to_owned() } else { trimmed.to_owned() }
}

fn prefix_matches(prefix: &str, path: &str) -> bool {
    if prefix == "/" {
        return true;
    }
    path.strip_prefix(prefix).is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

#[cfg(test)]
#[path = "guard_test.rs"]
mod tests;
