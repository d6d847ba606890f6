//! Download supervision.
//!
//! A [`Downloader`] turns a media source into a local file, reporting
//! [`DownloadProgress`] as it goes. The only implementation drives an
//! external FFmpeg process.

mod ffmpeg;
pub mod utils;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::{Error, Result};

pub use ffmpeg::FfmpegDownloader;

/// Progress snapshot passed to the caller's callback.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DownloadProgress {
    /// Reserved; always 0.
    pub bytes_downloaded: u64,
    /// Highest segment index seen so far.
    pub segment_index: u32,
    /// Segment count of the resolved variant.
    pub total_segments: u32,
}

impl DownloadProgress {
    /// Completed share in `0.0..=1.0`, if the total is known.
    pub fn fraction(&self) -> Option<f64> {
        (self.total_segments > 0)
            .then(|| (f64::from(self.segment_index) / f64::from(self.total_segments)).min(1.0))
    }
}

/// Callback invoked once per diagnostic line read.
pub type ProgressCallback<'a> = &'a mut (dyn FnMut(DownloadProgress) + Send);

/// What to download and where.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    /// URL of the adaptive manifest.
    pub source_url: String,
    /// Derived from the source URL when absent.
    pub output: Option<PathBuf>,
    pub cancellation: CancellationToken,
}

impl DownloadRequest {
    pub fn new(source_url: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            output: None,
            cancellation: CancellationToken::new(),
        }
    }

    pub fn output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = Some(output.into());
        self
    }

    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }
}

#[async_trait]
pub trait Downloader: Send + Sync {
    fn name(&self) -> &'static str;

    /// Download `request` and return the path actually written.
    async fn download(
        &self,
        request: DownloadRequest,
        on_progress: ProgressCallback<'_>,
    ) -> Result<PathBuf>;

    fn is_available(&self) -> bool;

    fn version(&self) -> Option<String>;
}

/// Final path segment of `source_url` with its extension replaced by `extension`.
pub fn default_output_path(source_url: &str, extension: &str) -> Result<PathBuf> {
    let url = Url::parse(source_url)
        .map_err(|e| Error::invalid_input(format!("invalid media url {source_url}: {e}")))?;
    let name = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|name| !name.is_empty())
        .ok_or_else(|| {
            Error::invalid_input(format!("cannot derive a file name from {source_url}"))
        })?;
    Ok(Path::new(name).with_extension(extension))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_output_name() {
        assert_eq!(
            default_output_path("https://cdn.belet.tm/films/555/index.m3u8?t=1", "mp4").unwrap(),
            PathBuf::from("index.mp4")
        );
        assert_eq!(
            default_output_path("https://cdn.belet.tm/films/master", "mkv").unwrap(),
            PathBuf::from("master.mkv")
        );
        assert!(default_output_path("https://cdn.belet.tm/films/", "mp4").is_err());
        assert!(default_output_path("not a url", "mp4").is_err());
    }

    #[test]
    fn progress_fraction() {
        let p = DownloadProgress {
            bytes_downloaded: 0,
            segment_index: 5,
            total_segments: 20,
        };
        assert_eq!(p.fraction(), Some(0.25));
        assert_eq!(DownloadProgress::default().fraction(), None);
    }
}
