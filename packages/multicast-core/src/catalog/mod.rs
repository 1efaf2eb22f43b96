//! Playable item catalogs.
//!
//! A catalog turns a channel/user page into an ordered [`Batch`] of
//! [`Item`]s whose URLs can be handed straight to a Cast receiver.
//!
//! - `ytdlp` - yt-dlp backed [`CatalogProvider`] implementation
//! - `url_cache` - Per-item cache of resolved stream URLs

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

pub mod url_cache;
pub mod ytdlp;

pub use url_cache::UrlCache;
pub use ytdlp::{CommandRunner, ProcessRunner, YtDlpCatalog};

/// Errors raised while resolving or refreshing a catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The source URL is not a supported channel/user page.
    #[error("Invalid YouTube channel/user url: {0}")]
    UnsupportedSource(String),

    /// The extractor process could not be started.
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The extractor process exited unsuccessfully.
    #[error("{program} exited with {code:?}: {stderr}")]
    CommandFailed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    /// The extractor output could not be understood.
    #[error("unexpected extractor output: {0}")]
    Parse(String),
}

pub type CatalogResult<T> = Result<T, CatalogError>;

/// One playable item.
///
/// `id` identifies the content; `url` is a time-limited stream reference
/// and is never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Item {
    pub id: String,
    pub url: String,
}

impl Item {
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
        }
    }
}

/// Ordered items produced by one catalog update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    items: Vec<Item>,
}

impl Batch {
    pub fn new(items: Vec<Item>) -> Self {
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Item> {
        self.items.iter()
    }

    pub fn into_items(self) -> Vec<Item> {
        self.items
    }
}

impl From<Vec<Item>> for Batch {
    fn from(items: Vec<Item>) -> Self {
        Self::new(items)
    }
}

impl FromIterator<Item> for Batch {
    fn from_iter<I: IntoIterator<Item = Item>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Batch {
    type Item = &'a Item;
    type IntoIter = std::slice::Iter<'a, Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// Source of playable items.
#[async_trait]
pub trait CatalogProvider: Send + Sync {
    /// Re-reads the source and returns the current items in source order.
    async fn update(&mut self) -> CatalogResult<Batch>;

    /// Number of entries the source listed on the last update, resolved or not.
    fn entry_count(&self) -> usize;
}
