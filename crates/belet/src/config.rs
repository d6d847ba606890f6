//! Client configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::{Error, Result};

pub(crate) const DEFAULT_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";

/// Top-level configuration for [`crate::BeletClient`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Where the token and cookie jar are persisted.
    pub data_file: PathBuf,
    /// Per-request timeout in seconds. `0` disables the timeout.
    pub request_timeout_secs: u64,
    pub user_agent: String,
    /// Set the device fingerprint cookie before signing in.
    pub inject_fingerprint: bool,
    pub api: ApiConfig,
    pub ffmpeg: FfmpegConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            data_file: PathBuf::from("beletapidata.bin"),
            request_timeout_secs: 30,
            user_agent: DEFAULT_UA.to_string(),
            inject_fingerprint: true,
            api: ApiConfig::default(),
            ffmpeg: FfmpegConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }

    /// Check the configuration before any client is built from it.
    pub fn validate(&self) -> Result<()> {
        self.api.validate()?;
        if self.ffmpeg.binary_path.trim().is_empty() {
            return Err(Error::Configuration("ffmpeg.binary_path is empty".into()));
        }
        if self.ffmpeg.output_extension.trim().is_empty() {
            return Err(Error::Configuration("ffmpeg.output_extension is empty".into()));
        }
        Ok(())
    }
}

/// Base URL of every functional area of the remote API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub auth: String,
    pub homepage: String,
    pub film: String,
    pub search: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            auth: "https://api.belet.tm".to_string(),
            homepage: "https://homepage.belet.me".to_string(),
            film: "https://film.beletapis.com".to_string(),
            search: "https://search.belet.me".to_string(),
        }
    }
}

impl ApiConfig {
    /// Point every area at the same base URL.
    pub fn single_host(base: impl Into<String>) -> Self {
        let base = base.into();
        Self {
            auth: base.clone(),
            homepage: base.clone(),
            film: base.clone(),
            search: base,
        }
    }

    fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("auth", &self.auth),
            ("homepage", &self.homepage),
            ("film", &self.film),
            ("search", &self.search),
        ] {
            Url::parse(value)
                .map_err(|e| Error::Configuration(format!("api.{name} = {value:?}: {e}")))?;
        }
        Ok(())
    }
}

/// How a nonzero exit of the remux process is reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitCodePolicy {
    /// Nonzero exit is [`Error::ProcessFailed`].
    #[default]
    Strict,
    /// Nonzero exit is logged and the output path returned anyway.
    Lenient,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FfmpegConfig {
    pub binary_path: String,
    pub extra_input_args: Vec<String>,
    pub extra_output_args: Vec<String>,
    /// Container extension used when no output path is given.
    pub output_extension: String,
    pub exit_code_policy: ExitCodePolicy,
}

impl Default for FfmpegConfig {
    fn default() -> Self {
        Self {
            binary_path: "ffmpeg".to_string(),
            extra_input_args: Vec::new(),
            extra_output_args: Vec::new(),
            output_extension: "mp4".to_string(),
            exit_code_policy: ExitCodePolicy::default(),
        }
    }
}
