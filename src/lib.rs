//! # tokengate
//!
//! Client-side authentication session lifecycle: exchange credentials for a
//! bearer token, decode the identity claims it carries, keep the resulting
//! session in an injectable store, and gate protected routes on it.
//!
//! Tokens are decoded, never verified; the issuing endpoint is trusted.

pub mod config;
pub mod controller;
pub mod endpoint;
pub mod error;
pub mod guard;
pub mod session;
pub mod storage;
pub mod token;

pub use config::AuthConfig;
pub use controller::AuthController;
pub use endpoint::{Credentials, HttpTokenEndpoint, TokenEndpoint, TokenPair};
pub use error::AuthError;
pub use guard::{GuardConfig, GuardDecision, Location, RouteAuthRequirement, RouteTable, evaluate};
pub use session::{Event, SessionState, SessionStatus, SessionStore};
pub use storage::{FileTokenStore, MemoryTokenStore, TokenStore};
pub use token::{Claims, DecodeError};
