//! Persistent cookie jar plugged into `reqwest` as its cookie provider.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use parking_lot::RwLock;
use reqwest::header::HeaderValue;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::Result;

/// A single stored cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    /// Lowercase domain without a leading dot.
    pub domain: String,
    /// Only sent to exactly `domain`, not its subdomains.
    #[serde(default)]
    pub host_only: bool,
    pub path: String,
    /// `None` for session cookies.
    #[serde(default)]
    pub expires: Option<DateTime<Utc>>,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub http_only: bool,
}

impl Cookie {
    pub fn new(
        name: impl Into<String>,
        value: impl Into<String>,
        domain: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: normalize_domain(&domain.into()),
            host_only: false,
            path: path.into(),
            expires: None,
            secure: false,
            http_only: false,
        }
    }

    pub fn with_expires(mut self, expires: DateTime<Utc>) -> Self {
        self.expires = Some(expires);
        self
    }

    pub fn key(&self) -> CookieKey {
        CookieKey {
            domain: self.domain.clone(),
            path: self.path.clone(),
            name: self.name.clone(),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires.is_some_and(|exp| exp <= now)
    }

    fn matches(&self, url: &Url, now: DateTime<Utc>) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        !self.is_expired(now)
            && domain_matches(&host.to_ascii_lowercase(), &self.domain, self.host_only)
            && path_matches(url.path(), &self.path)
            && (!self.secure || url.scheme() == "https")
    }
}

/// Identity of a cookie inside the jar.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CookieKey {
    pub domain: String,
    pub path: String,
    pub name: String,
}

/// Cookie jar keyed by `(domain, path, name)`.
///
/// Mutated by the HTTP stack on every response through the
/// [`reqwest::cookie::CookieStore`] impl, and explicitly on login.
#[derive(Debug, Default)]
pub struct CookieJar {
    cookies: RwLock<BTreeMap<CookieKey, Cookie>>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, cookie: Cookie) {
        self.cookies.write().insert(cookie.key(), cookie);
    }

    pub fn get(&self, domain: &str, path: &str, name: &str) -> Option<Cookie> {
        let key = CookieKey {
            domain: normalize_domain(domain),
            path: path.to_string(),
            name: name.to_string(),
        };
        self.cookies.read().get(&key).cloned()
    }

    pub fn len(&self) -> usize {
        self.cookies.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.read().is_empty()
    }

    pub fn clear(&self) {
        self.cookies.write().clear();
    }

    /// All stored cookies, ordered by key.
    pub fn snapshot(&self) -> Vec<Cookie> {
        self.cookies.read().values().cloned().collect()
    }

    /// Replace the whole content of the jar.
    pub fn replace(&self, cookies: impl IntoIterator<Item = Cookie>) {
        let map = cookies.into_iter().map(|c| (c.key(), c)).collect();
        *self.cookies.write() = map;
    }

    /// Value of the `Cookie` request header for `url`, if any cookie applies.
    pub fn header_for(&self, url: &Url) -> Option<String> {
        let now = Utc::now();
        let cookies = self.cookies.read();
        let mut matching: Vec<&Cookie> = cookies.values().filter(|c| c.matches(url, now)).collect();
        if matching.is_empty() {
            return None;
        }
        // Longer paths first.
        matching.sort_by(|a, b| b.path.len().cmp(&a.path.len()));
        Some(
            matching
                .iter()
                .map(|c| format!("{}={}", c.name, c.value))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    /// Apply one `Set-Cookie` header received from `url`.
    pub fn store_set_cookie(&self, header: &str, url: &Url) {
        let now = Utc::now();
        let Some(cookie) = parse_set_cookie(header, url, now) else {
            return;
        };
        let mut cookies = self.cookies.write();
        if cookie.is_expired(now) {
            cookies.remove(&cookie.key());
        } else {
            cookies.insert(cookie.key(), cookie);
        }
    }

    /// Serialize the jar into the opaque blob kept in the credential file.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.snapshot())?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let jar = Self::new();
        jar.load_bytes(bytes)?;
        Ok(jar)
    }

    /// Replace the jar content with a blob produced by [`CookieJar::to_bytes`].
    /// An empty blob yields an empty jar.
    pub fn load_bytes(&self, bytes: &[u8]) -> Result<()> {
        if bytes.is_empty() {
            self.clear();
            return Ok(());
        }
        let cookies: Vec<Cookie> = serde_json::from_slice(bytes)?;
        self.replace(cookies);
        Ok(())
    }
}

impl reqwest::cookie::CookieStore for CookieJar {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        for value in cookie_headers {
            if let Ok(header) = value.to_str() {
                self.store_set_cookie(header, url);
            }
        }
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        self.header_for(url)
            .and_then(|header| HeaderValue::from_str(&header).ok())
    }
}

/// Parse a `Set-Cookie` header value in the context of the request URL.
///
/// Returns `None` for malformed headers and for `Domain` attributes the
/// request host is not allowed to set.
pub fn parse_set_cookie(header: &str, url: &Url, now: DateTime<Utc>) -> Option<Cookie> {
    let host = url.host_str()?.to_ascii_lowercase();
    let mut parts = header.split(';');
    let (name, value) = parts.next()?.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    let mut cookie = Cookie {
        name: name.to_string(),
        value: value.trim().trim_matches('"').to_string(),
        domain: host.clone(),
        host_only: true,
        path: default_path(url.path()),
        expires: None,
        secure: false,
        http_only: false,
    };
    let mut max_age: Option<i64> = None;

    for attr in parts {
        let (key, val) = match attr.split_once('=') {
            Some((k, v)) => (k.trim(), v.trim()),
            None => (attr.trim(), ""),
        };
        match key.to_ascii_lowercase().as_str() {
            "domain" if !val.is_empty() => {
                let domain = normalize_domain(val);
                if !domain_matches(&host, &domain, false) {
                    return None;
                }
                cookie.domain = domain;
                cookie.host_only = false;
            }
            "path" if val.starts_with('/') => cookie.path = val.to_string(),
            "max-age" => max_age = val.parse().ok(),
            "expires" => {
                if let Some(exp) = parse_cookie_date(val) {
                    cookie.expires = Some(exp);
                }
            }
            "secure" => cookie.secure = true,
            "httponly" => cookie.http_only = true,
            _ => {}
        }
    }

    // Max-Age wins over Expires.
    if let Some(secs) = max_age {
        cookie.expires = Some(if secs <= 0 {
            DateTime::<Utc>::MIN_UTC
        } else {
            chrono::Duration::try_seconds(secs)
                .and_then(|age| now.checked_add_signed(age))
                .unwrap_or(DateTime::<Utc>::MAX_UTC)
        });
    }

    Some(cookie)
}

fn parse_cookie_date(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(date) = DateTime::parse_from_rfc2822(value) {
        return Some(date.with_timezone(&Utc));
    }
    ["%a, %d-%b-%Y %H:%M:%S GMT", "%a, %d %b %Y %H:%M:%S GMT"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|naive| naive.and_utc())
}

fn normalize_domain(domain: &str) -> String {
    domain.trim().trim_start_matches('.').to_ascii_lowercase()
}

fn domain_matches(host: &str, domain: &str, host_only: bool) -> bool {
    if host == domain {
        return true;
    }
    !host_only
        && host.len() > domain.len()
        && host.ends_with(domain)
        && host.as_bytes()[host.len() - domain.len() - 1] == b'.'
}

fn path_matches(request_path: &str, cookie_path: &str) -> bool {
    if request_path == cookie_path {
        return true;
    }
    request_path.starts_with(cookie_path)
        && (cookie_path.ends_with('/')
            || request_path.as_bytes().get(cookie_path.len()) == Some(&b'/'))
}

fn default_path(request_path: &str) -> String {
    match request_path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(idx) => request_path[..idx].to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::cookie::CookieStore;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn stores_and_returns_response_cookies() {
        let jar = CookieJar::new();
        let origin = url("https://api.belet.tm/api/v1/auth/check-code");
        let headers = [
            HeaderValue::from_static("refresh=abc; Path=/; HttpOnly; Secure"),
            HeaderValue::from_static("scoped=1"),
        ];
        jar.set_cookies(&mut headers.iter(), &origin);

        assert_eq!(jar.len(), 2);
        let refresh = jar.get("api.belet.tm", "/", "refresh").unwrap();
        assert!(refresh.http_only && refresh.secure && refresh.host_only);
        // default path is the request directory
        assert!(jar.get("api.belet.tm", "/api/v1/auth", "scoped").is_some());

        let header = jar
            .cookies(&url("https://api.belet.tm/api/v1/auth/refresh"))
            .unwrap();
        assert_eq!(header.to_str().unwrap(), "scoped=1; refresh=abc");

        // secure cookies are not sent over plain http, path-scoped ones stay home
        assert!(jar.cookies(&url("http://api.belet.tm/other")).is_none());
    }

    #[test]
    fn domain_attribute_covers_subdomains() {
        let jar = CookieJar::new();
        jar.store_set_cookie("sid=1; Domain=.belet.tm; Path=/", &url("https://api.belet.tm/"));
        assert_eq!(
            jar.header_for(&url("https://film.belet.tm/x")).as_deref(),
            Some("sid=1")
        );
        assert!(jar.header_for(&url("https://notbelet.tm/x")).is_none());

        // a host cannot set cookies for an unrelated domain
        jar.store_set_cookie("evil=1; Domain=example.com", &url("https://api.belet.tm/"));
        assert_eq!(jar.len(), 1);
    }

    #[test]
    fn expired_cookies_are_removed() {
        let jar = CookieJar::new();
        let origin = url("https://api.belet.tm/");
        jar.store_set_cookie("sid=1; Path=/", &origin);
        assert_eq!(jar.len(), 1);
        jar.store_set_cookie("sid=; Path=/; Max-Age=0", &origin);
        assert!(jar.is_empty());

        jar.store_set_cookie(
            "old=1; Path=/; Expires=Wed, 21 Oct 2015 07:28:00 GMT",
            &origin,
        );
        assert!(jar.is_empty());
    }

    #[test]
    fn parses_expires_formats() {
        let origin = url("https://api.belet.tm/");
        let now = Utc::now();
        let a = parse_set_cookie("a=1; Expires=Wed, 21 Oct 2099 07:28:00 GMT", &origin, now)
            .unwrap();
        let b = parse_set_cookie("b=1; expires=Wed, 21-Oct-2099 07:28:00 GMT", &origin, now)
            .unwrap();
        assert_eq!(a.expires, b.expires);
        assert!(a.expires.unwrap() > now);

        assert!(parse_set_cookie("novalue", &origin, now).is_none());
        assert!(parse_set_cookie("=1", &origin, now).is_none());
    }

    #[test]
    fn huge_max_age_saturates() {
        let jar = CookieJar::new();
        let origin = url("https://api.belet.tm/");
        let headers = [
            HeaderValue::from_static("far=1; Path=/; Max-Age=99999999999999"),
            HeaderValue::from_static("farthest=1; Path=/; Max-Age=9223372036854775807"),
        ];
        jar.set_cookies(&mut headers.iter(), &origin);

        assert_eq!(jar.len(), 2);
        for name in ["far", "farthest"] {
            let cookie = jar.get("api.belet.tm", "/", name).unwrap();
            assert_eq!(cookie.expires, Some(DateTime::<Utc>::MAX_UTC));
        }
        assert_eq!(
            jar.header_for(&url("https://api.belet.tm/")).as_deref(),
            Some("far=1; farthest=1")
        );
        let restored = CookieJar::from_bytes(&jar.to_bytes().unwrap()).unwrap();
        assert_eq!(restored.snapshot(), jar.snapshot());
    }

    #[test]
    fn blob_roundtrip() {
        let jar = CookieJar::new();
        jar.insert(
            Cookie::new("fp", "web00ff", ".api.belet.tm", "/")
                .with_expires(DateTime::from_timestamp(4_000_000_000, 0).unwrap()),
        );
        jar.store_set_cookie("sid=xyz; Path=/", &url("https://api.belet.tm/"));

        let bytes = jar.to_bytes().unwrap();
        let restored = CookieJar::from_bytes(&bytes).unwrap();
        assert_eq!(restored.snapshot(), jar.snapshot());
        assert!(CookieJar::from_bytes(&[]).unwrap().is_empty());
        assert!(CookieJar::from_bytes(b"\x00garbage").is_err());
    }
}
