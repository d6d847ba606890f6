//! Authenticated request builder.

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, Response, StatusCode};
use serde_json::Value;
use tracing::debug;

use super::Session;
use crate::credentials::Token;
use crate::{Error, Result};

/// A request that carries the session token and survives one token expiry.
///
/// The request is kept as plain data so it can be re-issued verbatim after
/// a refresh.
#[must_use = "requests do nothing until `send` is awaited"]
pub struct AuthRequest<'a> {
    session: &'a Session,
    method: Method,
    url: String,
    headers: HeaderMap,
    query: Vec<(String, String)>,
    body: Option<Value>,
    allow_refresh: bool,
}

impl<'a> AuthRequest<'a> {
    pub(super) fn new(session: &'a Session, method: Method, url: String) -> Self {
        Self {
            session,
            method,
            url,
            headers: HeaderMap::new(),
            query: Vec::new(),
            body: None,
            allow_refresh: true,
        }
    }

    /// Add a header. A caller-supplied `Authorization` header replaces the
    /// session token.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    pub fn queries<K, V, I>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: ToString,
    {
        self.query
            .extend(pairs.into_iter().map(|(k, v)| (k.into(), v.to_string())));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Surface a 401 as an error instead of refreshing.
    pub fn without_refresh(mut self) -> Self {
        self.allow_refresh = false;
        self
    }

    /// Send the request.
    ///
    /// Any status other than 401 is returned as-is. On 401 the token is
    /// refreshed once and the request re-issued once; a second 401 is
    /// returned as [`Error::HttpStatus`]. A 401 from the refresh call itself
    /// is [`Error::Unauthorized`].
    pub async fn send(self) -> Result<Response> {
        let mut allow_refresh = self.allow_refresh;
        loop {
            let token = self.session.token();
            let response = self.execute(token.as_ref()).await?;
            if response.status() != StatusCode::UNAUTHORIZED {
                return Ok(response);
            }

            if !allow_refresh {
                return Err(Error::HttpStatus {
                    status: StatusCode::UNAUTHORIZED,
                    url: response.url().to_string(),
                });
            }

            debug!(method = %self.method, url = %self.url, "Got 401, refreshing token before retry");
            self.session
                .refresh_after_unauthorized(token.as_ref())
                .await?;
            allow_refresh = false;
        }
    }

    async fn execute(&self, token: Option<&Token>) -> Result<Response> {
        let mut builder = self
            .session
            .http()
            .request(self.method.clone(), &self.url)
            .headers(self.headers.clone());

        if !self.headers.contains_key(AUTHORIZATION) {
            if let Some(token) = token {
                let value = HeaderValue::from_str(token.as_str())
                    .map_err(|e| Error::InvalidToken(e.to_string()))?;
                builder = builder.header(AUTHORIZATION, value);
            }
        }
        if !self.query.is_empty() {
            builder = builder.query(&self.query);
        }
        if let Some(body) = &self.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        debug!(method = %self.method, url = %self.url, status = %response.status(), "HTTP request");
        Ok(response)
    }
}
