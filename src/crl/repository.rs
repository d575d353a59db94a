use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use url::Url;

use crate::cert::CertificateEntry;

use super::errors::{CrlError, CrlResult};
use super::fetcher::CrlFetcher;
use super::types::{CrlCacheKey, CrlEntry};

const DEFAULT_MAX_ENTRIES: usize = 64;

/// Source of parsed CRLs for the linker.
///
/// `Ok(None)` means "no usable CRL right now" and the linker abstains;
/// an error is reserved for malformed extension content, which is fatal.
#[async_trait]
pub trait CrlRepository: Send + Sync {
    async fn find(
        &self,
        uri: &Url,
        issuer: &CertificateEntry,
        at: OffsetDateTime,
    ) -> CrlResult<Option<Arc<CrlEntry>>>;
}

/// Caching repository in front of a fetcher.
///
/// Entries are keyed by (URI, issuer subject). Lookups are lock-free;
/// fetches are serialized per key so that a burst of identical validations
/// incurs a single network call. Entry replacement is atomic, and an entry
/// is only ever returned when it covers the queried validation time.
pub struct CachingCrlRepository {
    fetcher: Arc<dyn CrlFetcher>,
    cache: DashMap<CrlCacheKey, Arc<CrlEntry>>,
    inflight: DashMap<CrlCacheKey, Arc<Mutex<()>>>,
    max_entries: usize,
}

impl CachingCrlRepository {
    pub fn new(fetcher: Arc<dyn CrlFetcher>) -> Self {
        Self::with_capacity(fetcher, DEFAULT_MAX_ENTRIES)
    }

    pub fn with_capacity(fetcher: Arc<dyn CrlFetcher>, max_entries: usize) -> Self {
        Self {
            fetcher,
            cache: DashMap::new(),
            inflight: DashMap::new(),
            max_entries: max_entries.max(1),
        }
    }

    /// Number of cached CRLs.
    pub fn cache_size(&self) -> usize {
        self.cache.len()
    }

    /// Drop all cached CRLs.
    pub fn clear(&self) {
        self.cache.clear();
    }

    fn cached(&self, key: &CrlCacheKey, at: OffsetDateTime) -> Option<Arc<CrlEntry>> {
        self.cache
            .get(key)
            .map(|entry| entry.value().clone())
            .filter(|entry| entry.covers(at))
    }

    fn evict_for_insert(&self) {
        while self.cache.len() >= self.max_entries {
            let oldest = self
                .cache
                .iter()
                .min_by_key(|entry| entry.value().fetched_at)
                .map(|entry| entry.key().clone());
            let Some(oldest) = oldest else { break };
            self.cache.remove(&oldest);
        }
    }
}

#[async_trait]
impl CrlRepository for CachingCrlRepository {
    async fn find(
        &self,
        uri: &Url,
        issuer: &CertificateEntry,
        at: OffsetDateTime,
    ) -> CrlResult<Option<Arc<CrlEntry>>> {
        let key = CrlCacheKey::new(uri.as_str(), &issuer.subject);

        if let Some(entry) = self.cached(&key, at) {
            debug!("using cached CRL for {uri}");
            return Ok(Some(entry));
        }

        // Singleflight: one fetch per key, late arrivals re-check the cache.
        let gate = self
            .inflight
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = gate.lock().await;

        if let Some(entry) = self.cached(&key, at) {
            debug!("CRL for {uri} arrived while waiting");
            return Ok(Some(entry));
        }

        let bytes = match self.fetcher.fetch(uri).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("CRL fetch from {uri} failed: {e}");
                self.inflight.remove(&key);
                return Ok(None);
            }
        };

        let entry = match CrlEntry::from_der(bytes, uri.as_str()) {
            Ok(entry) => Arc::new(entry),
            Err(e @ CrlError::Extension { .. }) => {
                self.inflight.remove(&key);
                return Err(e);
            }
            Err(e) => {
                warn!("CRL from {uri} failed to parse: {e}");
                self.inflight.remove(&key);
                return Ok(None);
            }
        };

        self.evict_for_insert();
        self.cache.insert(key.clone(), entry.clone());
        self.inflight.remove(&key);

        if entry.covers(at) {
            Ok(Some(entry))
        } else {
            warn!("CRL from {uri} does not cover the validation time {at}");
            Ok(None)
        }
    }
}
