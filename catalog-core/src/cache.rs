use std::sync::Arc;
use std::time::{Duration, Instant};

use moka::Expiry;
use moka::sync::Cache;
use tokio::sync::Mutex;

use crate::catalog::CatalogSnapshot;
use crate::error::Error;
use crate::version::{VersionStore, VersionToken};

/// The single named slot the aggregated catalog lives in.
pub const CATALOG_CACHE_KEY: &str = "publicCatalogData";

#[derive(Clone, Debug)]
struct CacheEntry {
    snapshot: Arc<CatalogSnapshot>,
    ttl: Duration,
}

/// Expires each entry after the TTL it was `put` with.
struct EntryTtl;

impl Expiry<&'static str, CacheEntry> for EntryTtl {
    fn expire_after_create(
        &self,
        _key: &&'static str,
        value: &CacheEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &&'static str,
        value: &CacheEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// Process-wide cache for the aggregated catalog, together with its version token.
///
/// `put`, `evict` and `invalidate` are the only mutators. All callers share one slot.
pub struct CatalogCache {
    slot: Cache<&'static str, CacheEntry>,
    version_store: Arc<dyn VersionStore>,
    // Serializes token generation so concurrent invalidations still produce increasing tokens
    invalidation_lock: Mutex<()>,
}

impl CatalogCache {
    pub fn new(version_store: Arc<dyn VersionStore>) -> Self {
        Self {
            slot: Cache::builder().expire_after(EntryTtl).build(),
            version_store,
            invalidation_lock: Mutex::new(()),
        }
    }

    /// The cached snapshot, or `None` if the slot is empty or its TTL has elapsed.
    pub fn get(&self) -> Option<Arc<CatalogSnapshot>> {
        self.slot
            .get(&CATALOG_CACHE_KEY)
            .map(|entry| entry.snapshot)
    }

    /// Replaces whatever is in the slot.
    pub fn put(&self, snapshot: Arc<CatalogSnapshot>, ttl: Duration) {
        self.slot
            .insert(CATALOG_CACHE_KEY, CacheEntry { snapshot, ttl });
    }

    /// Empties the slot regardless of its remaining TTL.
    pub fn evict(&self) {
        self.slot.invalidate(&CATALOG_CACHE_KEY);
    }

    /// The current version token, or `VersionToken::INITIAL` if none was ever written.
    pub async fn version(&self) -> Result<VersionToken, Error> {
        Ok(self
            .version_store
            .load()
            .await?
            .unwrap_or(VersionToken::INITIAL))
    }

    /// The current version token, or `VersionToken::INITIAL` if the store cannot be read.
    pub async fn version_or_initial(&self) -> VersionToken {
        match self.version().await {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!(
                    "Using version {} since the stored version is unusable: {e}",
                    VersionToken::INITIAL
                );
                VersionToken::INITIAL
            }
        }
    }

    /// Evicts the slot, then bumps and persists the version token.
    ///
    /// An unreadable previous token counts as `VersionToken::INITIAL`, so a corrupt store is
    /// overwritten instead of blocking every later invalidation.
    pub async fn invalidate(&self) -> Result<VersionToken, Error> {
        let _guard = self.invalidation_lock.lock().await;
        self.evict();
        let previous = self.version_or_initial().await;
        let token = VersionToken::next_after(previous, VersionToken::now_ms());
        self.version_store.store(token).await?;
        metrics::counter!("catalog_invalidations_total").increment(1);
        tracing::info!("Catalog cache invalidated, new version: {token}");
        Ok(token)
    }
}
