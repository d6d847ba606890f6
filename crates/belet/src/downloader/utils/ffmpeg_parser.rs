//! FFmpeg diagnostic output parsing.

use std::sync::LazyLock;

use regex::Regex;

use crate::downloader::DownloadProgress;

/// Matches the log line FFmpeg prints when it starts fetching a numbered
/// video segment, e.g.
/// `[https @ 0x55d4c] Opening 'https://cdn/x/video_720_12.ts' for reading`.
static SEGMENT_OPEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\[(?:https?|hls) @ (?:0x)?[0-9a-f]+\] Opening '[\w\-./:]+?video[\w\-./:]*?(\d{1,4})\.ts' for reading",
    )
    .expect("valid segment regex")
});

/// Index of the video segment announced by `line`, if it is a segment-open line.
pub fn parse_segment_index(line: &str) -> Option<u32> {
    SEGMENT_OPEN_RE
        .captures(line)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Folds diagnostic lines into the best-known download progress.
///
/// The segment index never decreases and the total stays fixed for the
/// lifetime of the tracker.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    current: DownloadProgress,
}

impl ProgressTracker {
    pub fn new(total_segments: u32) -> Self {
        Self {
            current: DownloadProgress {
                bytes_downloaded: 0,
                segment_index: 0,
                total_segments,
            },
        }
    }

    /// Account for one diagnostic line and return the updated progress.
    pub fn observe(&mut self, line: &str) -> DownloadProgress {
        if let Some(index) = parse_segment_index(line) {
            self.current.segment_index = self.current.segment_index.max(index);
        }
        self.current
    }

    pub fn current(&self) -> DownloadProgress {
        self.current
    }
}
