//! FFmpeg-based download supervisor.

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::utils::{DiagnosticReader, ProgressTracker, remux_command};
use super::{DownloadRequest, Downloader, ProgressCallback, default_output_path};
use crate::config::{ExitCodePolicy, FfmpegConfig};
use crate::credentials::Token;
use crate::hls::ManifestResolver;
use crate::session::Session;
use crate::{Error, Result};

/// Remuxes the resolved HLS variant into a local container with FFmpeg.
pub struct FfmpegDownloader {
    config: FfmpegConfig,
    session: Arc<Session>,
    resolver: ManifestResolver,
    /// Cached version string.
    version: OnceLock<Option<String>>,
}

impl FfmpegDownloader {
    pub fn new(session: Arc<Session>, config: FfmpegConfig) -> Self {
        Self {
            resolver: ManifestResolver::new(Arc::clone(&session)),
            config,
            session,
            version: OnceLock::new(),
        }
    }

    pub fn config(&self) -> &FfmpegConfig {
        &self.config
    }

    fn detect_version(path: &str) -> Option<String> {
        std::process::Command::new(path)
            .arg("-version")
            .output()
            .ok()
            .and_then(|output| {
                String::from_utf8(output.stdout)
                    .ok()
                    .and_then(|s| s.lines().next().map(|l| l.to_string()))
            })
    }

    /// Build the FFmpeg argument vector.
    pub fn build_args(&self, input_url: &str, token: Option<&Token>, output: &Path) -> Vec<String> {
        let mut args = vec!["-y".to_string(), "-hide_banner".to_string()];

        args.extend(self.config.extra_input_args.iter().cloned());

        if let Some(token) = token {
            args.extend([
                "-headers".to_string(),
                format!("Authorization: {}\r\n", token.as_str()),
            ]);
        }

        args.extend(["-i".to_string(), input_url.to_string()]);

        // ADTS AAC cannot be muxed into MP4 as-is.
        args.extend(["-bsf:a".to_string(), "aac_adtstoasc".to_string()]);
        args.extend(["-c".to_string(), "copy".to_string()]);

        args.extend(self.config.extra_output_args.iter().cloned());

        args.push(output.to_string_lossy().to_string());
        args
    }
}

#[async_trait]
impl Downloader for FfmpegDownloader {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    async fn download(
        &self,
        request: DownloadRequest,
        on_progress: ProgressCallback<'_>,
    ) -> Result<PathBuf> {
        let cancellation = request.cancellation.clone();
        if cancellation.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let output = match request.output {
            Some(path) => path,
            None => default_output_path(&request.source_url, &self.config.output_extension)?,
        };

        let variant = tokio::select! {
            _ = cancellation.cancelled() => return Err(Error::Cancelled),
            variant = self.resolver.resolve(&request.source_url) => variant?,
        };
        let total_segments = u32::try_from(variant.segment_count()).unwrap_or(u32::MAX);

        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let token = self.session.token();
        let args = self.build_args(&variant.url, token.as_ref(), &output);
        info!(
            source = %request.source_url,
            variant = %variant.url,
            output = %output.display(),
            total_segments,
            "Starting ffmpeg download"
        );

        let mut child = remux_command(&self.config.binary_path)
            .args(&args)
            .spawn()
            .map_err(|source| Error::ProcessSpawn {
                program: self.config.binary_path.clone(),
                source,
            })?;

        let stderr = child.stderr.take().ok_or_else(|| {
            Error::Io(std::io::Error::other("failed to capture ffmpeg stderr"))
        })?;

        let mut reader = DiagnosticReader::new(stderr);
        let mut tracker = ProgressTracker::new(total_segments);

        loop {
            tokio::select! {
                _ = cancellation.cancelled() => {
                    debug!(output = %output.display(), "FFmpeg download cancelled");
                    let _ = child.kill().await;
                    return Err(Error::Cancelled);
                }
                record = reader.next_record() => {
                    match record {
                        Ok(Some(line)) => {
                            let before = tracker.current().segment_index;
                            let progress = tracker.observe(&line);
                            if progress.segment_index != before {
                                debug!(segment = progress.segment_index, total = total_segments, "Segment opened");
                            }
                            on_progress(progress);
                        }
                        Ok(None) => break,
                        Err(e) => {
                            let _ = child.kill().await;
                            return Err(e.into());
                        }
                    }
                }
            }
        }

        let status = tokio::select! {
            _ = cancellation.cancelled() => {
                let _ = child.kill().await;
                return Err(Error::Cancelled);
            }
            status = child.wait() => status?,
        };

        if !status.success() {
            match self.config.exit_code_policy {
                ExitCodePolicy::Strict => {
                    return Err(Error::ProcessFailed {
                        code: status.code(),
                    });
                }
                ExitCodePolicy::Lenient => {
                    warn!(status = %status, output = %output.display(), "FFmpeg exited with failure status");
                }
            }
        }

        info!(output = %output.display(), "FFmpeg download finished");
        Ok(output)
    }

    fn is_available(&self) -> bool {
        self.version().is_some()
    }

    fn version(&self) -> Option<String> {
        self.version
            .get_or_init(|| Self::detect_version(&self.config.binary_path))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::credentials::token_with_expiry;

    fn downloader(config: FfmpegConfig) -> FfmpegDownloader {
        let session = Arc::new(Session::new(&ClientConfig::default()).unwrap());
        FfmpegDownloader::new(session, config)
    }

    #[test]
    fn test_build_args_with_token() {
        let dl = downloader(FfmpegConfig::default());
        let token = token_with_expiry(4_000_000_000);
        let args = dl.build_args(
            "https://cdn/v/index_720.m3u8",
            Some(&token),
            Path::new("out/movie.mp4"),
        );

        assert_eq!(args[..2], ["-y", "-hide_banner"]);
        let headers = args.iter().position(|a| a == "-headers").unwrap();
        assert_eq!(args[headers + 1], format!("Authorization: {}\r\n", token.as_str()));
        let input = args.iter().position(|a| a == "-i").unwrap();
        assert!(headers < input, "headers must precede the input");
        assert_eq!(args[input + 1], "https://cdn/v/index_720.m3u8");
        assert!(args.windows(2).any(|w| w == ["-bsf:a", "aac_adtstoasc"]));
        assert!(args.windows(2).any(|w| w == ["-c", "copy"]));
        assert_eq!(args.last().unwrap(), "out/movie.mp4");
    }

    #[test]
    fn test_build_args_extra_args_and_no_token() {
        let dl = downloader(FfmpegConfig {
            extra_input_args: vec!["-rw_timeout".into(), "5000000".into()],
            extra_output_args: vec!["-movflags".into(), "+faststart".into()],
            ..FfmpegConfig::default()
        });
        let args = dl.build_args("https://cdn/a.m3u8", None, Path::new("a.mp4"));

        assert!(!args.contains(&"-headers".to_string()));
        assert_eq!(args[2..4], ["-rw_timeout", "5000000"]);
        let n = args.len();
        assert_eq!(args[n - 3..n - 1], ["-movflags", "+faststart"]);
    }

    #[test]
    fn test_missing_binary_is_unavailable() {
        let dl = downloader(FfmpegConfig {
            binary_path: "/nonexistent/ffmpeg-for-tests".into(),
            ..FfmpegConfig::default()
        });
        assert!(!dl.is_available());
        assert_eq!(dl.name(), "ffmpeg");
    }
}
