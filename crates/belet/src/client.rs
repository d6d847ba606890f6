//! High-level catalog client.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::api::Endpoint;
use crate::config::ClientConfig;
use crate::downloader::{DownloadProgress, DownloadRequest, Downloader, FfmpegDownloader};
use crate::models::{
    CatalogItem, Episode, HomepageSection, Loadable, MediaFile, Movie, SearchFilters, SearchQuery,
    SearchResult, Season,
};
use crate::session::{Session, VerificationCodeProvider};
use crate::utils::{parse_catalog_id, read_envelope};
use crate::Result;

#[derive(Debug, Deserialize)]
struct FilmResponse {
    film: Value,
}

#[derive(Debug, Deserialize)]
struct FilesResponse {
    #[serde(default)]
    sources: Vec<MediaFile>,
}

#[derive(Debug, Deserialize)]
struct EpisodesResponse {
    #[serde(default)]
    episodes: Vec<Episode>,
}

#[derive(Debug, Deserialize)]
struct HomepageResponse {
    #[serde(default)]
    result: Vec<HomepageSection>,
}

/// Paging of the homepage listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HomepageQuery {
    pub offset: u32,
    /// Number of sections.
    pub limit: u32,
    /// Number of items per section.
    pub home_limit: u32,
    pub type_id: u32,
}

impl Default for HomepageQuery {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 3,
            home_limit: 12,
            type_id: 0,
        }
    }
}

/// Entry point of the library: an authenticated session plus the catalog,
/// search and download operations built on it.
pub struct BeletClient {
    session: Arc<Session>,
    downloader: Box<dyn Downloader>,
    filter_options: Mutex<Option<Arc<SearchFilters>>>,
}

impl BeletClient {
    /// Open a client, restoring persisted credentials if there are any.
    pub async fn new(config: ClientConfig) -> Result<Self> {
        let session = Arc::new(Session::open(&config).await?);
        let downloader = Box::new(FfmpegDownloader::new(
            Arc::clone(&session),
            config.ffmpeg.clone(),
        ));
        Ok(Self::with_downloader(session, downloader))
    }

    pub fn with_downloader(session: Arc<Session>, downloader: Box<dyn Downloader>) -> Self {
        Self {
            session,
            downloader,
            filter_options: Mutex::new(None),
        }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn downloader(&self) -> &dyn Downloader {
        self.downloader.as_ref()
    }

    pub fn is_logged_in(&self) -> bool {
        self.session.token().is_some()
    }

    pub async fn login(&self, phone: &str, codes: &dyn VerificationCodeProvider) -> Result<()> {
        self.session.login(phone, codes).await
    }

    pub async fn logout(&self) -> Result<()> {
        self.invalidate_filter_options();
        self.session.logout().await
    }

    /// Fetch a movie or series by numeric id or player URL.
    pub async fn get_catalog_item(&self, id: &str) -> Result<CatalogItem> {
        let id = parse_catalog_id(id)?;
        self.get_catalog_item_by_id(id).await
    }

    pub async fn get_catalog_item_by_id(&self, id: u64) -> Result<CatalogItem> {
        let url = self.session.endpoints().url_for(Endpoint::Movie, id);
        let response = self.session.get(url).send().await?;
        let body: FilmResponse = read_envelope(response).await?;
        let item = CatalogItem::from_film(body.film)?;
        debug!(id, name = %item.name(), series = matches!(item, CatalogItem::Series(_)), "Fetched catalog item");
        Ok(item)
    }

    /// Load the playable files of a movie. Loaded files are returned as-is.
    pub async fn load_files<'m>(&self, movie: &'m mut Movie) -> Result<&'m [MediaFile]> {
        if !movie.files.is_loaded() {
            let url = self
                .session
                .endpoints()
                .url_for(Endpoint::Files, movie.info.id);
            let response = self.session.get(url).query("type", 1).send().await?;
            let body: FilesResponse = read_envelope(response).await?;
            debug!(id = movie.info.id, files = body.sources.len(), "Loaded movie files");
            movie.files = Loadable::Loaded(body.sources);
        }
        Ok(movie.files.get().map(Vec::as_slice).unwrap_or_default())
    }

    /// Load the episodes of a season. Loaded episodes are returned as-is.
    pub async fn load_episodes<'s>(&self, season: &'s mut Season) -> Result<&'s [Episode]> {
        if !season.episodes.is_loaded() {
            let url = self.session.endpoints().url(Endpoint::Episodes);
            let response = self
                .session
                .get(url)
                .query("seasonId", season.id)
                .send()
                .await?;
            let body: EpisodesResponse = read_envelope(response).await?;
            debug!(season = season.id, episodes = body.episodes.len(), "Loaded season episodes");
            season.episodes = Loadable::Loaded(body.episodes);
        }
        Ok(season.episodes.get().map(Vec::as_slice).unwrap_or_default())
    }

    pub async fn get_homepage_sections(&self, query: HomepageQuery) -> Result<Vec<HomepageSection>> {
        let url = self.session.endpoints().url(Endpoint::HomePage);
        let response = self
            .session
            .get(url)
            .query("offset", query.offset)
            .query("limit", query.limit)
            .query("h_limit", query.home_limit)
            .query("type_id", query.type_id)
            .send()
            .await?;
        let body: HomepageResponse = read_envelope(response).await?;
        Ok(body.result)
    }

    pub async fn search(&self, query: &SearchQuery) -> Result<SearchResult> {
        let url = self.session.endpoints().url(Endpoint::Search);
        let response = self
            .session
            .get(url)
            .queries(query.to_params())
            .send()
            .await?;
        let result: SearchResult = read_envelope(response).await?;
        debug!(text = %query.text, page = query.page, results = result.movies.len(), "Search finished");
        Ok(result)
    }

    /// Filter and sort options for [`search`](Self::search), fetched once per
    /// client.
    pub async fn get_filter_options(&self) -> Result<Arc<SearchFilters>> {
        let cached = self.filter_options.lock().clone();
        if let Some(cached) = cached {
            return Ok(cached);
        }

        let url = self.session.endpoints().url(Endpoint::SearchFilters);
        let response = self.session.get(url).send().await?;
        let filters: Arc<SearchFilters> = Arc::new(read_envelope(response).await?);

        let mut cache = self.filter_options.lock();
        Ok(Arc::clone(cache.get_or_insert(filters)))
    }

    pub fn invalidate_filter_options(&self) {
        self.filter_options.lock().take();
    }

    /// Record how far the user has watched an item.
    pub async fn set_watch_progress(
        &self,
        item_id: u64,
        season_id: Option<u64>,
        watch_seconds: u64,
    ) -> Result<()> {
        let url = self.session.endpoints().url(Endpoint::WatchProgress);
        let response = self
            .session
            .post(url)
            .json(json!({
                "film_id": item_id,
                "season_id": season_id,
                "watch_time": watch_seconds,
            }))
            .send()
            .await?;
        let _: Value = read_envelope(response).await?;
        debug!(item_id, ?season_id, watch_seconds, "Watch progress saved");
        Ok(())
    }

    /// Download a media source. `destination` defaults to the last segment
    /// of the source URL with the configured extension.
    pub async fn download(
        &self,
        source: &str,
        destination: Option<&Path>,
        on_progress: impl FnMut(DownloadProgress) + Send,
    ) -> Result<PathBuf> {
        self.download_with_cancellation(source, destination, on_progress, CancellationToken::new())
            .await
    }

    pub async fn download_with_cancellation(
        &self,
        source: &str,
        destination: Option<&Path>,
        mut on_progress: impl FnMut(DownloadProgress) + Send,
        cancellation: CancellationToken,
    ) -> Result<PathBuf> {
        let mut request = DownloadRequest::new(source).cancellation(cancellation);
        if let Some(destination) = destination {
            request = request.output(destination);
        }
        let path = self.downloader.download(request, &mut on_progress).await?;
        info!(source, path = %path.display(), downloader = self.downloader.name(), "Download complete");
        Ok(path)
    }
}

impl std::fmt::Debug for BeletClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BeletClient")
            .field("session", &self.session)
            .field("downloader", &self.downloader.name())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn homepage_defaults() {
        let query = HomepageQuery::default();
        assert_eq!(
            (query.offset, query.limit, query.home_limit, query.type_id),
            (0, 3, 12, 0)
        );
    }

    #[tokio::test]
    async fn invalid_id_fails_before_any_request() {
        let dir = tempfile::tempdir().unwrap();
        let config = ClientConfig {
            data_file: dir.path().join("creds.bin"),
            api: crate::config::ApiConfig::single_host("http://127.0.0.1:9"),
            ..ClientConfig::default()
        };
        let client = BeletClient::new(config).await.unwrap();
        assert!(!client.is_logged_in());

        let err = client.get_catalog_item("not-an-id").await.unwrap_err();
        assert!(matches!(err, crate::Error::InvalidInput(_)));
    }
}
