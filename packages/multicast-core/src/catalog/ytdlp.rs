//! yt-dlp backed catalog.
//!
//! Listing uses `--flat-playlist --dump-single-json` so only IDs and page
//! URLs are fetched; each entry's stream URL is then resolved separately
//! with `-g` and cached for `url_ttl_secs`.
//!
//! Every listed entry is resolved before `update` returns, so the first
//! round costs one yt-dlp process per entry (up to `max_entries`, spread
//! over `resolve_concurrency` workers) before any device plays. Later
//! rounds only run yt-dlp for entries that are new or whose cached URL
//! expired; entries that failed to resolve are retried on the next update.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use tokio::process::Command;

use super::url_cache::UrlCache;
use super::{Batch, CatalogError, CatalogProvider, CatalogResult, Item};
use crate::config::CatalogConfig;
use crate::error::ErrorCode;

/// yt-dlp's extractor key for channel tabs (Videos, Shorts, Live...).
const TAB_IE_KEY: &str = "YoutubeTab";

/// Runs an external command and returns its stdout.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, program: &str, args: &[String]) -> CatalogResult<String>;
}

/// [`CommandRunner`] spawning real processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, program: &str, args: &[String]) -> CatalogResult<String> {
        log::trace!("[Catalog] {} {}", program, args.join(" "));
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| CatalogError::Spawn {
                program: program.to_string(),
                source,
            })?;

        if !output.status.success() {
            return Err(CatalogError::CommandFailed {
                program: program.to_string(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[derive(Debug, Deserialize)]
struct FlatPlaylist {
    #[serde(default)]
    extractor: Option<String>,
    #[serde(default)]
    webpage_url: Option<String>,
    #[serde(default)]
    entries: Option<Vec<FlatEntry>>,
}

#[derive(Debug, Deserialize)]
struct FlatEntry {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default, rename = "_type")]
    kind: Option<String>,
    #[serde(default)]
    ie_key: Option<String>,
    #[serde(default)]
    entries: Option<Vec<FlatEntry>>,
}

impl FlatEntry {
    fn is_tab(&self) -> bool {
        self.kind.as_deref() == Some("playlist") || self.ie_key.as_deref() == Some(TAB_IE_KEY)
    }
}

/// A listed video before its stream URL is known.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Listed {
    id: String,
    target: String,
}

fn parse_listing(json: &str) -> CatalogResult<FlatPlaylist> {
    serde_json::from_str(json).map_err(|e| CatalogError::Parse(e.to_string()))
}

/// Flattens nested tab listings into videos, in source order.
fn collect_videos(entries: &[FlatEntry], out: &mut Vec<Listed>) {
    for entry in entries {
        if let Some(nested) = &entry.entries {
            collect_videos(nested, out);
            continue;
        }
        if entry.is_tab() {
            continue;
        }
        if let Some(id) = entry.id.as_deref().filter(|id| !id.is_empty()) {
            out.push(Listed {
                id: id.to_string(),
                target: entry.url.clone().unwrap_or_else(|| id.to_string()),
            });
        }
    }
}

/// Catalog of a YouTube channel or user page.
pub struct YtDlpCatalog {
    config: CatalogConfig,
    runner: Arc<dyn CommandRunner>,
    playlist_url: String,
    entry_count: usize,
    cache: UrlCache,
}

impl std::fmt::Debug for YtDlpCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YtDlpCatalog")
            .field("playlist_url", &self.playlist_url)
            .field("entry_count", &self.entry_count)
            .field("cached_urls", &self.cache.len())
            .finish()
    }
}

impl YtDlpCatalog {
    /// Checks that `source_url` is a channel/user page and remembers the
    /// playlist it lists.
    ///
    /// # Errors
    ///
    /// [`CatalogError::UnsupportedSource`] when yt-dlp rejects the URL or
    /// reports an extractor outside `accepted_extractors`.
    pub async fn resolve(
        source_url: &str,
        config: CatalogConfig,
        runner: Arc<dyn CommandRunner>,
    ) -> CatalogResult<Self> {
        let args = listing_args(1, source_url);
        let unsupported = || CatalogError::UnsupportedSource(source_url.to_string());

        let stdout = match runner.run(&config.program, &args).await {
            Ok(stdout) => stdout,
            Err(e @ CatalogError::Spawn { .. }) => return Err(e),
            Err(e) => {
                log::debug!("[Catalog] Listing {} failed: {}", source_url, e);
                return Err(unsupported());
            }
        };
        let listing = parse_listing(&stdout).map_err(|e| {
            log::debug!("[Catalog] {}", e);
            unsupported()
        })?;

        let extractor = listing.extractor.as_deref().unwrap_or_default();
        if !config.accepted_extractors.iter().any(|e| e == extractor) {
            log::debug!(
                "[Catalog] {} uses extractor {:?}, not a channel/user page",
                source_url,
                extractor
            );
            return Err(unsupported());
        }

        // A channel root lists its tabs; the first one is the uploads tab.
        let first_tab = listing
            .entries
            .as_deref()
            .and_then(|entries| entries.first())
            .filter(|entry| entry.is_tab() && entry.entries.is_none())
            .and_then(|entry| entry.url.clone());
        let playlist_url = first_tab
            .or(listing.webpage_url)
            .unwrap_or_else(|| source_url.to_string());

        log::info!("[Catalog] Using playlist {} ({})", playlist_url, extractor);
        let ttl = Duration::from_secs(config.url_ttl_secs);
        Ok(Self {
            config,
            runner,
            playlist_url,
            entry_count: 0,
            cache: UrlCache::new(ttl),
        })
    }

    pub fn playlist_url(&self) -> &str {
        &self.playlist_url
    }

    async fn list(&self) -> CatalogResult<Vec<Listed>> {
        let args = listing_args(self.config.max_entries, &self.playlist_url);
        let stdout = self.runner.run(&self.config.program, &args).await?;
        let listing = parse_listing(&stdout)?;
        let mut videos = Vec::new();
        collect_videos(listing.entries.as_deref().unwrap_or_default(), &mut videos);
        videos.truncate(self.config.max_entries);
        Ok(videos)
    }
}

fn listing_args(playlist_end: usize, url: &str) -> Vec<String> {
    vec![
        "--flat-playlist".to_string(),
        "--dump-single-json".to_string(),
        "--no-warnings".to_string(),
        "--playlist-end".to_string(),
        playlist_end.to_string(),
        url.to_string(),
    ]
}

async fn resolve_stream_url(
    runner: &dyn CommandRunner,
    program: &str,
    format: &str,
    target: &str,
) -> CatalogResult<String> {
    let args = vec![
        "-f".to_string(),
        format.to_string(),
        "-g".to_string(),
        "--no-playlist".to_string(),
        "--no-warnings".to_string(),
        target.to_string(),
    ];
    let stdout = runner.run(program, &args).await?;
    stdout
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(ToString::to_string)
        .ok_or_else(|| CatalogError::Parse(format!("no stream URL for {}", target)))
}

#[async_trait]
impl CatalogProvider for YtDlpCatalog {
    async fn update(&mut self) -> CatalogResult<Batch> {
        let listed = self.list().await?;
        self.entry_count = listed.len();
        self.cache.prune();

        let pending: Vec<(Listed, Option<String>)> = listed
            .into_iter()
            .map(|entry| {
                let cached = self.cache.get(&entry.id).map(ToString::to_string);
                (entry, cached)
            })
            .collect();

        let runner = Arc::clone(&self.runner);
        let program = self.config.program.clone();
        let format = self.config.format.clone();
        let resolved: Vec<(Listed, bool, CatalogResult<String>)> = stream::iter(pending)
            .map(|(entry, cached)| {
                let runner = Arc::clone(&runner);
                let program = program.clone();
                let format = format.clone();
                async move {
                    match cached {
                        Some(url) => (entry, true, Ok(url)),
                        None => {
                            let result =
                                resolve_stream_url(runner.as_ref(), &program, &format, &entry.target)
                                    .await;
                            (entry, false, result)
                        }
                    }
                }
            })
            .buffered(self.config.resolve_concurrency.max(1))
            .collect()
            .await;

        let mut items = Vec::with_capacity(resolved.len());
        for (entry, was_cached, result) in resolved {
            match result {
                Ok(url) => {
                    if !was_cached {
                        self.cache.insert(entry.id.clone(), url.clone());
                    }
                    items.push(Item::new(entry.id, url));
                }
                Err(e) => log::warn!("[Catalog] Skipping {} ({}): {}", entry.id, e.code(), e),
            }
        }

        log::debug!(
            "[Catalog] Update: {} listed, {} playable",
            self.entry_count,
            items.len()
        );
        Ok(Batch::new(items))
    }

    fn entry_count(&self) -> usize {
        self.entry_count
    }
}
