//! Client library for the Belet video catalog.
//!
//! [`BeletClient`] wraps an authenticated [`Session`] (bearer token with
//! transparent refresh, persisted together with the cookie jar) and exposes
//! catalog lookup, search and HLS downloads through FFmpeg.

pub mod api;
pub mod client;
pub mod config;
pub mod credentials;
pub mod downloader;
pub mod error;
pub mod hls;
pub mod models;
pub mod session;
pub mod utils;

pub use client::{BeletClient, HomepageQuery};
pub use config::{ApiConfig, ClientConfig, ExitCodePolicy, FfmpegConfig};
pub use downloader::{DownloadProgress, DownloadRequest, Downloader, FfmpegDownloader};
pub use error::{Error, Result};
pub use hls::{ManifestResolver, ResolvedVariant};
pub use session::{Session, StaticCode, VerificationCodeProvider};
