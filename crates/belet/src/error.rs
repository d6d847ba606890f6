//! Library-wide error types.

use std::path::PathBuf;

use reqwest::StatusCode;
use thiserror::Error;

/// Library-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Connection-level failure reported by the HTTP stack.
    #[error("HTTP request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// Non-2xx response that could not be recovered locally.
    #[error("request failed with HTTP {status} for {url}")]
    HttpStatus { status: StatusCode, url: String },

    /// The refresh endpoint itself answered 401.
    #[error("user isn't authorized, please login first{}", message.as_deref().map(|m| format!(": {m}")).unwrap_or_default())]
    Unauthorized { message: Option<String> },

    /// HTTP succeeded but the response envelope reports `"status": "error"`.
    #[error("API status error: {message}")]
    ApiStatus { message: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A token is held but its embedded expiry cannot be decoded.
    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("corrupt credential file {path}: {reason}")]
    CorruptCredentials { path: PathBuf, reason: String },

    #[error("playlist error: {0}")]
    Playlist(String),

    #[error("failed to spawn {program}: {source}")]
    ProcessSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("remux process exited unsuccessfully (code: {code:?})")]
    ProcessFailed { code: Option<i32> },

    #[error("operation cancelled")]
    Cancelled,

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn playlist(msg: impl Into<String>) -> Self {
        Self::Playlist(msg.into())
    }

    pub fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::CorruptCredentials {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Build an [`Error::Unauthorized`] from a raw response body.
    ///
    /// JSON bodies carrying a `msg` field contribute that field, any other
    /// non-empty body is used verbatim.
    pub fn unauthorized_from_body(body: &str) -> Self {
        let body = body.trim();
        let message = if body.is_empty() {
            None
        } else {
            match serde_json::from_str::<serde_json::Value>(body) {
                Ok(json) => json
                    .get("msg")
                    .and_then(|m| m.as_str())
                    .map(str::to_string)
                    .or_else(|| Some(body.to_string())),
                Err(_) => Some(body.to_string()),
            }
        };
        Self::Unauthorized { message }
    }

    /// HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            Self::Unauthorized { .. } => Some(StatusCode::UNAUTHORIZED),
            Self::Network(e) => e.status(),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED)
    }

    /// Check if this error can only be fixed by logging in again.
    pub fn requires_relogin(&self) -> bool {
        matches!(self, Self::Unauthorized { .. } | Self::InvalidToken(_))
    }
}
