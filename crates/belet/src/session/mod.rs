//! Authenticated session.
//!
//! All network I/O of the crate funnels through [`Session`]. It owns the
//! HTTP client, the bearer token and the cookie jar, and recovers from one
//! failure class on its own: an expired token. A request answered with 401
//! triggers a single refresh followed by a single retry.
//!
//! Refreshes are serialized. A caller that saw 401 with token `T` only
//! refreshes if the session still holds `T` once it owns the refresh lock;
//! otherwise another call already refreshed and the newer token is reused.

mod login;
mod request;

use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use reqwest::{Client, Method, StatusCode};
use serde::Deserialize;
use tracing::{debug, info};

use crate::api::{Endpoint, Endpoints};
use crate::config::ClientConfig;
use crate::credentials::{CookieJar, CredentialRecord, CredentialStore, Token};
use crate::{Error, Result};

pub use login::{FINGERPRINT_COOKIE, StaticCode, VerificationCodeProvider, generate_fingerprint};
pub use request::AuthRequest;

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    token: String,
}

pub struct Session {
    client: Client,
    cookies: Arc<CookieJar>,
    token: RwLock<Option<Token>>,
    refresh_lock: tokio::sync::Mutex<()>,
    store: CredentialStore,
    endpoints: Endpoints,
    inject_fingerprint: bool,
}

impl Session {
    /// Build an empty session. Nothing is read from disk.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        config.validate()?;
        let cookies = Arc::new(CookieJar::new());

        let mut builder = Client::builder()
            .cookie_provider(Arc::clone(&cookies))
            .user_agent(config.user_agent.as_str());
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            cookies,
            token: RwLock::new(None),
            refresh_lock: tokio::sync::Mutex::new(()),
            store: CredentialStore::new(&config.data_file),
            endpoints: Endpoints::new(config.api.clone()),
            inject_fingerprint: config.inject_fingerprint,
        })
    }

    /// Build a session hydrated from the credential file, if one exists.
    pub async fn open(config: &ClientConfig) -> Result<Self> {
        let session = Self::new(config)?;
        session.hydrate().await?;
        Ok(session)
    }

    /// Replace the in-memory state with the persisted one.
    ///
    /// Returns `false` when no credential file exists.
    pub async fn hydrate(&self) -> Result<bool> {
        let Some(record) = self.store.load().await? else {
            return Ok(false);
        };
        self.cookies
            .load_bytes(&record.cookie_blob)
            .map_err(|e| Error::corrupt(self.store.path(), format!("cookie blob: {e}")))?;
        *self.token.write() = record.token;
        debug!(cookies = self.cookies.len(), "Session hydrated from credential file");
        Ok(true)
    }

    pub fn token(&self) -> Option<Token> {
        self.token.read().clone()
    }

    pub fn set_token(&self, token: Option<Token>) {
        *self.token.write() = token;
    }

    pub fn cookies(&self) -> &CookieJar {
        &self.cookies
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    /// The bare HTTP client: no token, no retry.
    pub fn http(&self) -> &Client {
        &self.client
    }

    /// `true` when no token is held or the held token is past its expiry.
    ///
    /// A held token whose expiry cannot be decoded is an error.
    pub fn is_token_expired(&self) -> Result<bool> {
        match self.token() {
            None => Ok(true),
            Some(token) => token.is_expired_at(Utc::now()),
        }
    }

    /// Refresh pre-emptively; returns whether a refresh happened.
    pub async fn refresh_if_expired(&self) -> Result<bool> {
        if self.is_token_expired()? {
            self.refresh().await?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Exchange the cookie jar for a new token and persist the session.
    pub async fn refresh(&self) -> Result<Token> {
        let _guard = self.refresh_lock.lock().await;
        self.refresh_locked().await
    }

    /// Refresh after a 401 observed while `stale` was the held token.
    pub(crate) async fn refresh_after_unauthorized(&self, stale: Option<&Token>) -> Result<()> {
        let _guard = self.refresh_lock.lock().await;
        if self.token().as_ref() != stale {
            debug!("Token already refreshed by a concurrent call");
            return Ok(());
        }
        self.refresh_locked().await.map(|_| ())
    }

    async fn refresh_locked(&self) -> Result<Token> {
        let url = self.endpoints.url(Endpoint::Refresh);
        debug!(url = %url, "Refreshing token");

        // Only the ambient cookies authenticate this call.
        let response = self.client.post(&url).send().await?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::unauthorized_from_body(&body));
        }
        if !status.is_success() {
            return Err(Error::HttpStatus { status, url });
        }

        let body: RefreshResponse = response.json().await?;
        let token = Token::new(body.token)?;
        // The new token only becomes visible once it is on disk.
        self.save_with(Some(&token)).await?;
        self.set_token(Some(token.clone()));
        info!("Token refreshed");
        Ok(token)
    }

    /// Write the token and cookie jar to the credential file.
    pub async fn persist(&self) -> Result<()> {
        self.save_with(self.token().as_ref()).await
    }

    async fn save_with(&self, token: Option<&Token>) -> Result<()> {
        let record = CredentialRecord {
            token: token.cloned(),
            cookie_blob: self.cookies.to_bytes()?,
        };
        self.store.save(&record).await
    }

    /// Drop the credential file and reset the in-memory state.
    pub async fn clear(&self) -> Result<()> {
        self.store.clear().await?;
        self.set_token(None);
        self.cookies.clear();
        Ok(())
    }

    pub fn request(&self, method: Method, url: impl Into<String>) -> AuthRequest<'_> {
        AuthRequest::new(self, method, url.into())
    }

    /// Authenticated GET with the refresh-and-retry protocol.
    pub fn get(&self, url: impl Into<String>) -> AuthRequest<'_> {
        self.request(Method::GET, url)
    }

    /// Authenticated POST with the refresh-and-retry protocol.
    pub fn post(&self, url: impl Into<String>) -> AuthRequest<'_> {
        self.request(Method::POST, url)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("token", &self.token())
            .field("cookies", &self.cookies.len())
            .field("store", &self.store.path())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::token_with_expiry;
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> ClientConfig {
        ClientConfig {
            data_file: dir.path().join("creds.bin"),
            ..ClientConfig::default()
        }
    }

    #[tokio::test]
    async fn expiry_check_without_token() {
        let dir = TempDir::new().unwrap();
        let session = Session::new(&config(&dir)).unwrap();
        assert!(session.is_token_expired().unwrap());

        let future = Utc::now().timestamp() + 3600;
        session.set_token(Some(token_with_expiry(future)));
        assert!(!session.is_token_expired().unwrap());

        session.set_token(Some(token_with_expiry(1)));
        assert!(session.is_token_expired().unwrap());

        session.set_token(Some(Token::new("garbage").unwrap()));
        assert!(matches!(
            session.is_token_expired(),
            Err(Error::InvalidToken(_))
        ));
    }

    #[tokio::test]
    async fn persist_then_hydrate() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);

        let session = Session::new(&config).unwrap();
        let token = token_with_expiry(4_000_000_000);
        session.set_token(Some(token.clone()));
        session.cookies().store_set_cookie(
            "sid=abc; Path=/",
            &url::Url::parse("https://api.belet.tm/").unwrap(),
        );
        session.persist().await.unwrap();

        let restored = Session::open(&config).await.unwrap();
        assert_eq!(restored.token(), Some(token));
        assert_eq!(restored.cookies().snapshot(), session.cookies().snapshot());

        restored.clear().await.unwrap();
        assert!(restored.token().is_none());
        assert!(restored.cookies().is_empty());
        assert!(!config.data_file.exists());
        assert!(!Session::open(&config).await.unwrap().hydrate().await.unwrap());
    }
}
