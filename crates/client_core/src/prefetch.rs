//! Best-effort read-ahead cache for sample images. Misses during
//! review cost a visible stall, so the session warms the next and
//! next-unrated samples' images after every move; failures here are
//! logged and otherwise ignored.

use std::{collections::HashMap, sync::Arc};

use tokio::sync::Mutex;
use tracing::debug;

use crate::transport::UpdateTransport;

const DEFAULT_CAPACITY: usize = 16;

pub struct ImagePrefetcher {
    transport: Arc<dyn UpdateTransport>,
    cache: Mutex<HashMap<String, Vec<u8>>>,
    capacity: usize,
}

impl ImagePrefetcher {
    pub fn new(transport: Arc<dyn UpdateTransport>) -> Self {
        Self::with_capacity(transport, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(transport: Arc<dyn UpdateTransport>, capacity: usize) -> Self {
        Self {
            transport,
            cache: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Fetches each basename not already cached. Individual failures
    /// are skipped; prefetch never surfaces an error.
    pub async fn warm(&self, basenames: &[String]) {
        for basename in basenames {
            if self.cache.lock().await.contains_key(basename) {
                continue;
            }
            match self.transport.fetch_image(basename).await {
                Ok(bytes) => {
                    let mut cache = self.cache.lock().await;
                    if cache.len() >= self.capacity {
                        // Eviction order is not significant for a
                        // read-ahead cache this small.
                        if let Some(victim) = cache.keys().next().cloned() {
                            cache.remove(&victim);
                        }
                    }
                    cache.insert(basename.clone(), bytes);
                }
                Err(err) => {
                    debug!(%basename, %err, "image prefetch failed; skipping");
                }
            }
        }
    }

    /// Cached bytes, or a direct fetch on miss.
    pub async fn get(&self, basename: &str) -> anyhow::Result<Vec<u8>> {
        if let Some(bytes) = self.cache.lock().await.get(basename).cloned() {
            return Ok(bytes);
        }
        self.transport.fetch_image(basename).await
    }

    pub async fn cached_len(&self) -> usize {
        self.cache.lock().await.len()
    }
}
