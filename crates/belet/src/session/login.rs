//! Phone-number sign-in and log-out.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use super::Session;
use crate::api::Endpoint;
use crate::credentials::Cookie;
use crate::utils::{ensure_success, normalize_phone};
use crate::Result;

/// Name of the device fingerprint cookie set before signing in.
pub const FINGERPRINT_COOKIE: &str = "fingerprint";

const FINGERPRINT_TTL_DAYS: i64 = 60;

/// Supplies the verification code delivered out of band after sign-in.
#[async_trait]
pub trait VerificationCodeProvider: Send + Sync {
    /// `message` is the server's human-readable note about the delivery.
    async fn verification_code(&self, phone: u64, message: Option<&str>) -> Result<String>;
}

/// A code known in advance.
#[derive(Debug, Clone)]
pub struct StaticCode(pub String);

#[async_trait]
impl VerificationCodeProvider for StaticCode {
    async fn verification_code(&self, _phone: u64, _message: Option<&str>) -> Result<String> {
        Ok(self.0.clone())
    }
}

#[derive(Debug, Deserialize)]
struct SignInResponse {
    #[serde(default)]
    msg: Option<String>,
    token: String,
}

/// `web` followed by 9 random bytes in hex.
pub fn generate_fingerprint() -> String {
    let bytes: [u8; 9] = rand::random();
    format!("web{}", hex::encode(bytes))
}

impl Session {
    /// Sign in with a phone number.
    ///
    /// Requests a verification code, obtains it from `codes`, confirms it
    /// and finishes with a token refresh, which persists the session.
    /// Non-2xx answers fail immediately.
    pub async fn login(&self, phone: &str, codes: &dyn VerificationCodeProvider) -> Result<()> {
        let phone = normalize_phone(phone)?;

        if self.inject_fingerprint {
            self.inject_fingerprint_cookie();
        }

        let response = self
            .client
            .post(self.endpoints.url(Endpoint::SignIn))
            .query(&[("sign_in_type", "1")])
            .json(&json!({ "phone": phone }))
            .send()
            .await?;
        let sign_in: SignInResponse = ensure_success(response)?.json().await?;
        info!(phone, "Verification code requested");

        let code = codes
            .verification_code(phone, sign_in.msg.as_deref())
            .await?;

        let response = self
            .client
            .post(self.endpoints.url(Endpoint::CheckCode))
            .json(&json!({ "code": code.trim(), "token": sign_in.token }))
            .send()
            .await?;
        ensure_success(response)?;
        debug!(phone, "Verification code accepted");

        self.refresh().await?;
        info!(phone, "Logged in");
        Ok(())
    }

    /// Log out remotely and forget all credentials.
    ///
    /// Local state is cleared even when the server rejects the call; the
    /// server's error is still returned.
    pub async fn logout(&self) -> Result<()> {
        let remote = self
            .post(self.endpoints.url(Endpoint::LogOut))
            .send()
            .await
            .and_then(ensure_success);

        self.clear().await?;
        match remote {
            Ok(_) => {
                info!("Logged out");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Remote log-out failed, local credentials cleared");
                Err(e)
            }
        }
    }

    fn inject_fingerprint_cookie(&self) {
        let Some(host) = self.endpoints.auth_host() else {
            return;
        };
        let mut cookie = Cookie::new(FINGERPRINT_COOKIE, generate_fingerprint(), host, "/")
            .with_expires(Utc::now() + Duration::days(FINGERPRINT_TTL_DAYS));
        cookie.host_only = true;
        self.cookies.insert(cookie);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_shape() {
        let fp = generate_fingerprint();
        assert_eq!(fp.len(), 3 + 18);
        assert!(fp.starts_with("web"));
        assert!(fp[3..].chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(fp, generate_fingerprint());
    }
}
