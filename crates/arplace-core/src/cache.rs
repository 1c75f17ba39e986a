//! Session-scoped asset cache keyed by source URL
//!
//! Fetched model bodies are wrapped in an [`AssetHandle`]: the bytes plus a
//! locally-resolvable `blob:` style URL the renderer can load from. Entries
//! live for the whole session and are only released by [`AssetCache::clear`]:
//! - At most one entry exists per source URL
//! - Releasing a handle invalidates every clone of it
//! - A cleared URL is fetched again on its next load

use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Scheme used for local handle URLs
pub const LOCAL_URL_SCHEME: &str = "blob:arplace";

/// A locally-dereferenceable handle to a fetched asset body
#[derive(Debug, Clone)]
pub struct AssetHandle {
    /// Original URL this was fetched from
    source_url: String,
    /// Local URL (e.g., "blob:arplace/5f0c...")
    local_url: String,
    body: Bytes,
    /// When this was fetched (ISO 8601)
    fetched_at: String,
    released: Arc<AtomicBool>,
}

impl AssetHandle {
    /// Wrap a fully materialized body
    pub fn new(source_url: &str, body: Bytes) -> Self {
        Self {
            source_url: source_url.to_string(),
            local_url: format!("{}/{}", LOCAL_URL_SCHEME, Uuid::new_v4()),
            body,
            fetched_at: chrono::Utc::now().to_rfc3339(),
            released: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    pub fn local_url(&self) -> &str {
        &self.local_url
    }

    pub fn fetched_at(&self) -> &str {
        &self.fetched_at
    }

    /// Body size in bytes
    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// The body, or None once the handle has been released
    pub fn bytes(&self) -> Option<Bytes> {
        if self.is_valid() {
            Some(self.body.clone())
        } else {
            None
        }
    }

    pub fn is_valid(&self) -> bool {
        !self.released.load(Ordering::Acquire)
    }

    /// Invalidate this handle and all of its clones
    pub fn release(&self) {
        self.released.store(true, Ordering::Release);
    }
}

/// Cache of fetched assets keyed by source URL
#[derive(Debug, Default)]
pub struct AssetCache {
    entries: HashMap<String, AssetHandle>,
}

impl AssetCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if a URL has a live cached entry
    pub fn contains(&self, url: &str) -> bool {
        self.entries.get(url).is_some_and(AssetHandle::is_valid)
    }

    /// Get the cached handle for a URL
    pub fn get(&self, url: &str) -> Option<AssetHandle> {
        self.entries.get(url).filter(|h| h.is_valid()).cloned()
    }

    /// Store a handle under its source URL, releasing any previous entry
    pub fn insert(&mut self, handle: AssetHandle) {
        let url = handle.source_url().to_string();
        if let Some(previous) = self.entries.insert(url.clone(), handle) {
            debug!(url = %url, "Replacing cached asset");
            previous.release();
        }
    }

    /// Release every handle and empty the cache
    pub fn clear(&mut self) -> usize {
        let count = self.entries.len();
        for (_, handle) in self.entries.drain() {
            handle.release();
        }
        count
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total cached bytes
    pub fn total_bytes(&self) -> usize {
        self.entries.values().map(AssetHandle::len).sum()
    }
}
