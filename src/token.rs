//! Token codec: display-layer decoding of compact signed tokens.
//!
//! DESIGN
//! ======
//! Only the middle (claims) segment is consumed. The signature is never
//! checked: the issuing endpoint is trusted, and a successful decode says
//! nothing about validity beyond "the server returned something token-shaped".

use base64::Engine;
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, URL_SAFE_NO_PAD};
use base64::engine::DecodePaddingMode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// URL-safe alphabet, accepting segments with or without `=` padding.
const SEGMENT_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

// =============================================================================
// ERROR
// =============================================================================

/// Error returned by [`decode`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The token has no second segment, or it is empty.
    #[error("token has no claims segment")]
    MissingPayload,

    /// The claims segment is not valid base64url.
    #[error("claims segment is not valid base64url: {0}")]
    Base64(String),

    /// The decoded bytes are not valid JSON.
    #[error("claims segment is not valid JSON: {0}")]
    Json(String),

    /// The decoded JSON is valid but not an object.
    #[error("claims segment is not a JSON object")]
    NotAnObject,
}

// =============================================================================
// CLAIMS
// =============================================================================

/// Identity claims carried in a token's middle segment.
///
/// No schema is enforced beyond "JSON object"; the accessors below are
/// conveniences for the registered claim names most UIs display.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Claims(Map<String, Value>);

impl Claims {
    #[must_use]
    pub fn new(map: Map<String, Value>) -> Self {
        Self(map)
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// The `sub` claim, when it is a string.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.0.get("sub").and_then(Value::as_str)
    }

    /// The `name` claim, when it is a string.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.0.get("name").and_then(Value::as_str)
    }

    /// The `iat` claim as unix seconds.
    #[must_use]
    pub fn issued_at(&self) -> Option<i64> {
        self.0.get("iat").and_then(Value::as_i64)
    }

    /// The `exp` claim as unix seconds.
    #[must_use]
    pub fn expires_at(&self) -> Option<i64> {
        self.0.get("exp").and_then(Value::as_i64)
    }

    /// `true` when an `exp` claim is present and not after `now_unix_secs`.
    /// Tokens without `exp` never report as expired.
    #[must_use]
    pub fn is_expired_at(&self, now_unix_secs: i64) -> bool {
        self.expires_at().is_some_and(|exp| exp <= now_unix_secs)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    #[must_use]
    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for Claims {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

// =============================================================================
// CODEC
// =============================================================================

/// Decode the claims segment of `token` without verifying its signature.
///
/// # Errors
///
/// Returns a [`DecodeError`] when the second segment is missing, is not
/// base64url, or does not hold a JSON object.
pub fn decode(token: &str) -> Result<Claims, DecodeError> {
    let segment = token
        .split('.')
        .nth(1)
        .filter(|s| !s.is_empty())
        .ok_or(DecodeError::MissingPayload)?;

    let bytes = SEGMENT_ENGINE
        .decode(segment)
        .map_err(|e| DecodeError::Base64(e.to_string()))?;

    let value: Value = serde_json::from_slice(&bytes).map_err(|e| DecodeError::Json(e.to_string()))?;
    match value {
        Value::Object(map) => Ok(Claims(map)),
        _ => Err(DecodeError::NotAnObject),
    }
}

/// Build an unsigned (`alg: none`) three-segment token carrying `claims`.
///
/// Useful for fakes of the issuing endpoint; never accept such tokens as
/// proof of anything.
#[must_use]
pub fn encode_unsigned(claims: &Claims) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(Value::Object(claims.0.clone()).to_string());
    format!("{header}.{payload}.")
}

#[cfg(test)]
#[path = "token_test.rs"]
mod tests;
