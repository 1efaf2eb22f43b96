//! Resolved stream URL cache.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

/// Maps item IDs to resolved stream URLs for a fixed time-to-live.
///
/// Stream URLs handed out by video sites expire, so entries are only
/// reused while younger than the TTL.
#[derive(Debug)]
pub struct UrlCache {
    ttl: Duration,
    entries: HashMap<String, (String, Instant)>,
}

impl UrlCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    /// Returns the cached URL for `id` if it has not expired.
    pub fn get(&self, id: &str) -> Option<&str> {
        self.entries
            .get(id)
            .filter(|(_, stored)| stored.elapsed() < self.ttl)
            .map(|(url, _)| url.as_str())
    }

    pub fn insert(&mut self, id: impl Into<String>, url: impl Into<String>) {
        self.entries.insert(id.into(), (url.into(), Instant::now()));
    }

    /// Drops expired entries.
    pub fn prune(&mut self) {
        let ttl = self.ttl;
        self.entries.retain(|_, (_, stored)| stored.elapsed() < ttl);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
