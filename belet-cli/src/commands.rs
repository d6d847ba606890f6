use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use belet_api::models::{CatalogItem, SearchQuery};
use belet_api::utils::{PlayerUrl, parse_catalog_id};
use belet_api::{BeletClient, HomepageQuery, StaticCode, VerificationCodeProvider};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::output::OutputManager;

/// Asks for the verification code on the terminal.
struct PromptCode;

#[async_trait]
impl VerificationCodeProvider for PromptCode {
    async fn verification_code(
        &self,
        phone: u64,
        message: Option<&str>,
    ) -> belet_api::Result<String> {
        if let Some(message) = message {
            println!("{}", message.cyan());
        }
        let prompt = format!("Enter the code sent to +{phone}:");
        tokio::task::spawn_blocking(move || inquire::Text::new(&prompt).prompt())
            .await
            .map_err(|e| belet_api::Error::Io(std::io::Error::other(e)))?
            .map_err(|e| match e {
                inquire::InquireError::OperationCanceled
                | inquire::InquireError::OperationInterrupted => belet_api::Error::Cancelled,
                other => belet_api::Error::invalid_input(format!("cannot read the code: {other}")),
            })
    }
}

pub struct CommandExecutor {
    client: BeletClient,
    output: OutputManager,
}

impl CommandExecutor {
    pub fn new(client: BeletClient, output: OutputManager) -> Self {
        Self { client, output }
    }

    pub async fn login(&self, phone: &str, code: Option<String>) -> Result<()> {
        match code {
            Some(code) => self.client.login(phone, &StaticCode(code)).await?,
            None => self.client.login(phone, &PromptCode).await?,
        }
        println!("{} Logged in", "✓".green());
        Ok(())
    }

    pub async fn logout(&self) -> Result<()> {
        if !self.client.is_logged_in() {
            println!("Not logged in");
            return Ok(());
        }
        self.client.logout().await?;
        println!("{} Logged out", "✓".green());
        Ok(())
    }

    pub async fn status(&self) -> Result<()> {
        let session = self.client.session();
        let expires = session.token().map(|token| token.expires_at());
        let downloader = self.client.downloader();
        let version = downloader.version();

        if self.output.format() == crate::cli::OutputFormat::Json {
            return self.output.print_json(&json!({
                "logged_in": self.client.is_logged_in(),
                "token_expires_at": expires.as_ref().and_then(|e| e.as_ref().ok()).map(|e| e.to_rfc3339()),
                "data_file": session.store().path(),
                "cookies": session.cookies().len(),
                "downloader": downloader.name(),
                "downloader_version": version,
            }));
        }

        match expires {
            None => println!("{} {}", "Session:".green(), "not logged in".yellow()),
            Some(Ok(at)) => println!(
                "{} logged in, token {} {}",
                "Session:".green(),
                if session.is_token_expired().unwrap_or(true) { "expired" } else { "valid until" },
                at.to_rfc3339()
            ),
            Some(Err(e)) => println!("{} {}", "Session:".green(), e.to_string().red()),
        }
        println!("{} {}", "Credentials:".green(), session.store().path().display());
        println!("{} {}", "Cookies:".green(), session.cookies().len());
        match version {
            Some(version) => println!("{} {}", "FFmpeg:".green(), version),
            None => println!("{} {}", "FFmpeg:".green(), "not found".red()),
        }
        Ok(())
    }

    pub async fn item(&self, id: &str, season: Option<u64>) -> Result<()> {
        let season = season.or_else(|| PlayerUrl::parse(id).ok().and_then(|u| u.season_id));
        let mut item = self.client.get_catalog_item(id).await?;

        match &mut item {
            CatalogItem::Movie(movie) => {
                self.client.load_files(movie).await?;
            }
            CatalogItem::Series(series) => {
                if let Some(season_id) = season {
                    let season = series
                        .season_mut(season_id)
                        .ok_or_else(|| anyhow!("season {season_id} not found"))?;
                    self.client.load_episodes(season).await?;
                }
            }
        }
        self.output.item(&item)
    }

    pub async fn home(&self, query: HomepageQuery) -> Result<()> {
        let sections = self.client.get_homepage_sections(query).await?;
        self.output.sections(&sections)
    }

    pub async fn search(
        &self,
        text: &str,
        page: u32,
        order: Option<String>,
        filters: &[String],
        sort: Option<&str>,
    ) -> Result<()> {
        let mut query = SearchQuery::new(text).page(page);
        if let Some(order) = order {
            query = query.order(order);
        }
        for filter in filters {
            let (name, id) = split_pair(filter)?;
            let id = id
                .parse()
                .with_context(|| format!("filter value must be a number: {filter}"))?;
            query = query.filter_param(name, id);
        }
        if let Some(sort) = sort {
            let (param, id) = split_pair(sort)?;
            query = query.sort_param(param, id);
        }

        let result = self.client.search(&query).await?;
        self.output.search(&result)
    }

    pub async fn filters(&self) -> Result<()> {
        let filters = self.client.get_filter_options().await?;
        self.output.filters(&filters)
    }

    pub async fn watch(&self, item: &str, seconds: u64, season: Option<u64>) -> Result<()> {
        let item_id = parse_catalog_id(item)?;
        let season = season.or_else(|| PlayerUrl::parse(item).ok().and_then(|u| u.season_id));
        self.client
            .set_watch_progress(item_id, season, seconds)
            .await?;
        println!("{} Progress saved", "✓".green());
        Ok(())
    }

    pub async fn download(&self, source: &str, output: Option<&Path>) -> Result<()> {
        let manifest = self.resolve_source(source).await?;
        debug!(source, manifest = %manifest, "Resolved download source");

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, stopping download");
                trigger.cancel();
            }
        });

        let pb = ProgressBar::new_spinner();
        pb.enable_steady_tick(Duration::from_millis(120));
        pb.set_style(
            ProgressStyle::with_template("{spinner:.blue} {msg}")?.tick_strings(&[
                "▹▹▹▹▹", "▸▹▹▹▹", "▹▸▹▹▹", "▹▹▸▹▹", "▹▹▹▸▹", "▹▹▹▹▸", "▪▪▪▪▪",
            ]),
        );
        pb.set_message("Resolving manifest...");

        let bar_style = ProgressStyle::with_template(
            "{spinner:.yellow} [{bar:30.yellow/white}] {pos}/{len} segments ({percent}%) {elapsed_precise}",
        )?
        .progress_chars("=> ");

        let progress_bar = pb.clone();
        let mut styled = false;
        let result = self
            .client
            .download_with_cancellation(
                &manifest,
                output,
                move |progress| {
                    if !styled && progress.total_segments > 0 {
                        progress_bar.set_style(bar_style.clone());
                        progress_bar.set_length(u64::from(progress.total_segments));
                        styled = true;
                    }
                    progress_bar.set_position(u64::from(progress.segment_index));
                },
                cancel,
            )
            .await;

        match result {
            Ok(path) => {
                pb.finish_and_clear();
                info!(path = %path.display(), "Saved");
                println!("{} Saved to {}", "✓".green(), path.display().to_string().cyan());
                Ok(())
            }
            Err(e) => {
                pb.abandon();
                Err(e.into())
            }
        }
    }

    /// Turn a catalog id or player URL into a manifest URL; anything else is
    /// taken as a manifest URL already.
    async fn resolve_source(&self, source: &str) -> Result<String> {
        let player = PlayerUrl::parse(source).ok();
        let is_catalog = player.is_some() || parse_catalog_id(source).is_ok();
        if !is_catalog {
            return Ok(source.to_string());
        }

        match self.client.get_catalog_item(source).await? {
            CatalogItem::Movie(mut movie) => {
                let files = self.client.load_files(&mut movie).await?;
                files
                    .first()
                    .map(|f| f.filename.clone())
                    .ok_or_else(|| anyhow!("{} has no playable files", movie.info.name))
            }
            CatalogItem::Series(mut series) => {
                let (Some(season_id), Some(episode_id)) = (
                    player.and_then(|p| p.season_id),
                    player.and_then(|p| p.episode_id),
                ) else {
                    bail!(
                        "{} is a series; pass a player URL with ?season=<id>&episode=<id>",
                        series.info.name
                    );
                };
                let season = series
                    .season_mut(season_id)
                    .ok_or_else(|| anyhow!("season {season_id} not found"))?;
                let episodes = self.client.load_episodes(season).await?;
                let episode = episodes
                    .iter()
                    .find(|e| e.id == episode_id)
                    .ok_or_else(|| anyhow!("episode {episode_id} not found"))?;
                episode
                    .files
                    .first()
                    .map(|f| f.filename.clone())
                    .ok_or_else(|| anyhow!("episode {episode_id} has no playable files"))
            }
        }
    }
}

fn split_pair(value: &str) -> Result<(&str, &str)> {
    value
        .split_once('=')
        .filter(|(k, v)| !k.is_empty() && !v.is_empty())
        .ok_or_else(|| anyhow!("expected NAME=VALUE, got {value:?}"))
}
