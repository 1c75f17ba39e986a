//! Model fetching with progress, cancellation, and caching
//!
//! This module handles:
//! 1. Serving already-fetched assets from the session cache without network activity
//! 2. Streaming model bodies and reporting integer percentage progress per chunk
//! 3. Aborting the current in-flight download on request
//! 4. Sharing one download between concurrent loads of the same URL

use arplace_core::{AssetCache, AssetHandle};
use bytes::BytesMut;
use futures_util::future::{abortable, AbortHandle, Aborted, BoxFuture, FutureExt, Shared};
use futures_util::StreamExt;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::transport::AssetTransport;

/// Upper bound on the up-front body allocation derived from Content-Length
const MAX_PREALLOCATION: u64 = 64 * 1024 * 1024;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error("failed to fetch {url}: {message}")]
    Network {
        url: String,
        status: Option<u16>,
        message: String,
    },
    #[error("load of {url} was cancelled")]
    Aborted { url: String },
}

impl LoadError {
    pub fn is_aborted(&self) -> bool {
        matches!(self, LoadError::Aborted { .. })
    }
}

type ProgressFn = Box<dyn FnMut(u8) + Send>;
type LoadFuture = Shared<BoxFuture<'static, Result<AssetHandle, LoadError>>>;

struct InFlight {
    id: u64,
    future: LoadFuture,
    /// Callers currently awaiting `future`
    waiters: usize,
}

struct CurrentLoad {
    id: u64,
    url: String,
    abort: AbortHandle,
}

/// Fetches model assets and caches them by source URL
pub struct ModelLoader {
    transport: Arc<dyn AssetTransport>,
    cache: Arc<Mutex<AssetCache>>,
    in_flight: Mutex<HashMap<String, InFlight>>,
    current: Mutex<Option<CurrentLoad>>,
    next_id: AtomicU64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Integer percentage of `received` over `total`, capped at 100
pub fn progress_percent(received: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    (received.saturating_mul(100) / total).min(100) as u8
}

impl ModelLoader {
    pub fn new(transport: Arc<dyn AssetTransport>) -> Self {
        Self {
            transport,
            cache: Arc::new(Mutex::new(AssetCache::new())),
            in_flight: Mutex::new(HashMap::new()),
            current: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    /// Load the asset at `url`, reporting download progress as 0-100
    ///
    /// Cached URLs resolve immediately. A load for a URL that is already
    /// downloading joins that download instead of issuing a second request;
    /// only the first caller's progress callback is invoked.
    pub async fn load<F>(&self, url: &str, on_progress: F) -> Result<AssetHandle, LoadError>
    where
        F: FnMut(u8) + Send + 'static,
    {
        if let Some(handle) = lock(&self.cache).get(url) {
            debug!(url = %url, fetched_at = %handle.fetched_at(), "Using cached model");
            return Ok(handle);
        }

        let (id, future) = {
            let mut in_flight = lock(&self.in_flight);
            match in_flight.get_mut(url) {
                Some(existing) => {
                    debug!(url = %url, "Joining in-flight model load");
                    existing.waiters += 1;
                    (existing.id, existing.future.clone())
                }
                None => {
                    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                    let (fetch, abort) = abortable(fetch_asset(
                        self.transport.clone(),
                        self.cache.clone(),
                        url.to_string(),
                        Box::new(on_progress),
                    ));
                    let aborted_url = url.to_string();
                    let future = fetch
                        .map(move |result| match result {
                            Ok(inner) => inner,
                            Err(Aborted) => Err(LoadError::Aborted { url: aborted_url }),
                        })
                        .boxed()
                        .shared();

                    in_flight.insert(
                        url.to_string(),
                        InFlight {
                            id,
                            future: future.clone(),
                            waiters: 1,
                        },
                    );
                    *lock(&self.current) = Some(CurrentLoad {
                        id,
                        url: url.to_string(),
                        abort,
                    });
                    (id, future)
                }
            }
        };

        // Released on completion and when the caller drops this future mid-download
        let _waiter = Waiter {
            loader: self,
            url,
            id,
        };
        future.await
    }

    /// One caller of load `id` stopped waiting; the last one clears the bookkeeping
    fn release(&self, url: &str, id: u64) {
        {
            let mut in_flight = lock(&self.in_flight);
            if let Some(entry) = in_flight.get_mut(url).filter(|f| f.id == id) {
                entry.waiters = entry.waiters.saturating_sub(1);
                if entry.waiters > 0 {
                    return;
                }
                in_flight.remove(url);
                debug!(url = %url, "Model load has no remaining waiters");
            }
        }
        let mut current = lock(&self.current);
        if current.as_ref().is_some_and(|c| c.id == id) {
            *current = None;
        }
    }

    /// Abort the in-flight download, if any; its callers receive `LoadError::Aborted`
    pub fn cancel_current_load(&self) -> bool {
        let Some(current) = lock(&self.current).take() else {
            return false;
        };

        info!(url = %current.url, "Cancelling model load");
        current.abort.abort();

        let mut in_flight = lock(&self.in_flight);
        if in_flight.get(&current.url).is_some_and(|f| f.id == current.id) {
            in_flight.remove(&current.url);
        }
        true
    }

    /// Release every cached handle; later loads fetch again
    pub fn clear_cache(&self) {
        let mut cache = lock(&self.cache);
        let bytes = cache.total_bytes();
        let released = cache.clear();
        info!(released, bytes, "Cleared model cache");
    }

    /// URL of the download currently in flight
    pub fn current_url(&self) -> Option<String> {
        lock(&self.current).as_ref().map(|c| c.url.clone())
    }

    pub fn is_loading(&self) -> bool {
        lock(&self.current).is_some()
    }

    pub fn is_cached(&self, url: &str) -> bool {
        lock(&self.cache).contains(url)
    }

    pub fn cached_count(&self) -> usize {
        lock(&self.cache).len()
    }

    /// Bytes held by live cache entries
    pub fn cached_bytes(&self) -> usize {
        lock(&self.cache).total_bytes()
    }
}

struct Waiter<'a> {
    loader: &'a ModelLoader,
    url: &'a str,
    id: u64,
}

impl Drop for Waiter<'_> {
    fn drop(&mut self) {
        self.loader.release(self.url, self.id);
    }
}

async fn fetch_asset(
    transport: Arc<dyn AssetTransport>,
    cache: Arc<Mutex<AssetCache>>,
    url: String,
    mut on_progress: ProgressFn,
) -> Result<AssetHandle, LoadError> {
    info!(url = %url, "Fetching model");

    let response = transport.get(&url).await.map_err(|e| {
        warn!(url = %url, error = %e, "Model fetch failed");
        LoadError::Network {
            url: url.clone(),
            status: None,
            message: e.to_string(),
        }
    })?;

    if !response.is_success() {
        warn!(url = %url, status = response.status, "Model fetch returned non-success status");
        return Err(LoadError::Network {
            url: url.clone(),
            status: Some(response.status),
            message: format!("HTTP status {}", response.status),
        });
    }

    let total = response.content_length.filter(|&t| t > 0);
    let mut body = BytesMut::with_capacity(total.unwrap_or(0).min(MAX_PREALLOCATION) as usize);
    let mut stream = response.body;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| {
            warn!(url = %url, error = %e, "Model body read failed");
            LoadError::Network {
                url: url.clone(),
                status: Some(response.status),
                message: e.to_string(),
            }
        })?;
        body.extend_from_slice(&chunk);

        if let Some(total) = total {
            on_progress(progress_percent(body.len() as u64, total));
        }
    }

    let handle = AssetHandle::new(&url, body.freeze());
    lock(&cache).insert(handle.clone());
    info!(url = %url, bytes = handle.len(), local = %handle.local_url(), "Cached model");

    Ok(handle)
}
