//! Bearer token with an embedded expiry.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::{Error, Result};

/// Longest token the credential file can hold (one-byte length prefix).
pub const MAX_TOKEN_LEN: usize = u8::MAX as usize;

/// Opaque bearer credential.
///
/// Structurally `header.payload.signature`; the base64 payload is a JSON
/// object whose `exp` field holds the expiry as unix seconds. Only ASCII
/// tokens of at most [`MAX_TOKEN_LEN`] bytes are representable.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Token(String);

impl Token {
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if value.is_empty() {
            return Err(Error::invalid_input("token is empty"));
        }
        if !value.is_ascii() {
            return Err(Error::invalid_input("token contains non-ASCII characters"));
        }
        if value.len() > MAX_TOKEN_LEN {
            return Err(Error::invalid_input(format!(
                "token is {} bytes, limit is {MAX_TOKEN_LEN}",
                value.len()
            )));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Decode the expiry embedded in the token payload.
    pub fn expires_at(&self) -> Result<DateTime<Utc>> {
        let payload = self
            .0
            .split('.')
            .nth(1)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| Error::InvalidToken("token has no payload segment".into()))?;

        let payload = payload.trim_end_matches('=');
        let bytes = URL_SAFE_NO_PAD
            .decode(payload)
            .or_else(|_| STANDARD_NO_PAD.decode(payload))
            .map_err(|e| Error::InvalidToken(format!("payload is not base64: {e}")))?;

        let claims: Value = serde_json::from_slice(&bytes)
            .map_err(|e| Error::InvalidToken(format!("payload is not JSON: {e}")))?;

        let exp = claims
            .get("exp")
            .and_then(|exp| exp.as_i64().or_else(|| exp.as_f64().map(|f| f as i64)))
            .ok_or_else(|| Error::InvalidToken("payload has no numeric `exp` field".into()))?;

        DateTime::from_timestamp(exp, 0)
            .ok_or_else(|| Error::InvalidToken(format!("expiry {exp} is out of range")))
    }

    /// `true` once `now` is strictly past the embedded expiry.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> Result<bool> {
        Ok(now > self.expires_at()?)
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix: String = self.0.chars().take(8).collect();
        write!(f, "Token({prefix}…)")
    }
}

#[cfg(test)]
pub(crate) fn token_with_expiry(exp: i64) -> Token {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"42","exp":{exp}}}"#));
    Token::new(format!("{header}.{payload}.c2lnbmF0dXJl")).unwrap()
}
