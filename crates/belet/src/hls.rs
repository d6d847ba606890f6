//! Adaptive manifest resolution.
//!
//! A media source points either at a finished media playlist or at a master
//! playlist. Master playlists resolve to their first listed rendition; no
//! bitrate or resolution policy is applied.

use std::sync::Arc;

use m3u8_rs::{MediaPlaylist, Playlist};
use tracing::debug;
use url::Url;

use crate::session::Session;
use crate::utils::ensure_success;
use crate::{Error, Result};

/// The concrete media playlist a download reads from.
#[derive(Debug, Clone)]
pub struct ResolvedVariant {
    /// URL the remux process is pointed at.
    pub url: String,
    /// Manifest the caller asked for.
    pub source_url: String,
    pub playlist: MediaPlaylist,
}

impl ResolvedVariant {
    pub fn segment_count(&self) -> usize {
        self.playlist.segments.len()
    }
}

#[derive(Debug, Clone)]
pub struct ManifestResolver {
    session: Arc<Session>,
}

impl ManifestResolver {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    pub async fn resolve(&self, source_url: &str) -> Result<ResolvedVariant> {
        let base = Url::parse(source_url)
            .map_err(|e| Error::invalid_input(format!("invalid media url {source_url}: {e}")))?;

        match self.fetch(source_url).await? {
            Playlist::MediaPlaylist(playlist) => {
                ensure_finished(&playlist, source_url)?;
                debug!(url = %source_url, segments = playlist.segments.len(), "Manifest is a finished playlist");
                Ok(ResolvedVariant {
                    url: source_url.to_string(),
                    source_url: source_url.to_string(),
                    playlist,
                })
            }
            Playlist::MasterPlaylist(master) => {
                let variant = master
                    .variants
                    .iter()
                    .find(|v| !v.is_i_frame)
                    .ok_or_else(|| {
                        Error::playlist(format!("master playlist {source_url} lists no renditions"))
                    })?;
                let variant_url = base
                    .join(&variant.uri)
                    .map_err(|e| {
                        Error::playlist(format!("bad rendition uri {:?}: {e}", variant.uri))
                    })?
                    .to_string();
                debug!(url = %variant_url, bandwidth = variant.bandwidth, "Selected first rendition");

                match self.fetch(&variant_url).await? {
                    Playlist::MediaPlaylist(playlist) => {
                        ensure_finished(&playlist, &variant_url)?;
                        Ok(ResolvedVariant {
                            url: variant_url,
                            source_url: source_url.to_string(),
                            playlist,
                        })
                    }
                    Playlist::MasterPlaylist(_) => Err(Error::playlist(format!(
                        "rendition {variant_url} is another master playlist"
                    ))),
                }
            }
        }
    }

    async fn fetch(&self, url: &str) -> Result<Playlist> {
        let response = ensure_success(self.session.get(url).send().await?)?;
        let bytes = response.bytes().await?;
        parse_playlist(&bytes, url)
    }
}

pub fn parse_playlist(bytes: &[u8], url: &str) -> Result<Playlist> {
    m3u8_rs::parse_playlist_res(bytes)
        .map_err(|e| Error::playlist(format!("failed to parse {url}: {e}")))
}

fn ensure_finished(playlist: &MediaPlaylist, url: &str) -> Result<()> {
    if playlist.end_list {
        Ok(())
    } else {
        Err(Error::playlist(format!(
            "media playlist {url} is not finished (no #EXT-X-ENDLIST)"
        )))
    }
}
