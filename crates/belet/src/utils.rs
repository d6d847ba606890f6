use std::sync::LazyLock;

use regex::Regex;
use reqwest::Response;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{Error, Result};

/// Country calling code prefixed to every subscriber number.
pub const COUNTRY_CODE: &str = "993";

static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{8})$").expect("valid phone regex"));

static PLAYER_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/player/(\d)/(\d+)(?:\?season=(\d+)(?:&episode=(\d+))?)?")
        .expect("valid player url regex")
});

/// Normalize a phone number to the country code followed by the 8-digit
/// subscriber number.
///
/// Accepts `+993xxxxxxxx`, `993xxxxxxxx`, `8xxxxxxxx` and bare `xxxxxxxx`.
pub fn normalize_phone(phone: &str) -> Result<u64> {
    let digits = PHONE_RE
        .captures(phone.trim())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .ok_or_else(|| Error::invalid_input(format!("wrong phone number format -> {phone}")))?;
    format!("{COUNTRY_CODE}{digits}")
        .parse()
        .map_err(|_| Error::invalid_input(format!("wrong phone number format -> {phone}")))
}

/// Ids carried by a web player URL such as
/// `https://belet.tm/player/1/555?season=2&episode=9`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerUrl {
    pub type_id: u32,
    pub movie_id: u64,
    pub season_id: Option<u64>,
    pub episode_id: Option<u64>,
}

impl PlayerUrl {
    pub fn parse(url: &str) -> Result<Self> {
        let invalid = || Error::invalid_input(format!("invalid player url -> {url}"));
        let caps = PLAYER_URL_RE.captures(url).ok_or_else(invalid)?;
        let num = |idx: usize| caps.get(idx).and_then(|m| m.as_str().parse::<u64>().ok());

        Ok(Self {
            type_id: caps
                .get(1)
                .and_then(|m| m.as_str().parse().ok())
                .ok_or_else(invalid)?,
            movie_id: num(2).ok_or_else(invalid)?,
            season_id: num(3),
            episode_id: num(4),
        })
    }
}

/// Resolve a catalog identifier given as a number, a numeric string or a
/// player URL into the movie id.
pub fn parse_catalog_id(id: &str) -> Result<u64> {
    let id = id.trim();
    if id.starts_with("https://") || id.starts_with("http://") {
        return PlayerUrl::parse(id).map(|url| url.movie_id);
    }
    if !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()) {
        return id
            .parse()
            .map_err(|_| Error::invalid_input(format!("invalid movie id was passed -> {id}")));
    }
    Err(Error::invalid_input(format!(
        "invalid movie id was passed -> {id}"
    )))
}

/// Turn a non-2xx response into [`Error::HttpStatus`].
pub(crate) fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(Error::HttpStatus {
            status,
            url: response.url().to_string(),
        })
    }
}

/// Reject envelopes whose `status` field is `"error"`.
pub(crate) fn check_envelope(json: &Value) -> Result<()> {
    if json.get("status").and_then(Value::as_str) == Some("error") {
        let message = json
            .get("message")
            .or_else(|| json.get("msg"))
            .and_then(Value::as_str)
            .unwrap_or("unknown error")
            .to_string();
        return Err(Error::ApiStatus { message });
    }
    Ok(())
}

/// Read a successful JSON response, applying the envelope convention.
pub(crate) async fn read_envelope<T: DeserializeOwned>(response: Response) -> Result<T> {
    let response = ensure_success(response)?;
    let json: Value = response.json().await?;
    check_envelope(&json)?;
    Ok(serde_json::from_value(json)?)
}
