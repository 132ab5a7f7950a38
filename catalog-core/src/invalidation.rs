//! Cross-process invalidation: telling other gateways to drop their catalog, and noticing
//! edits to the local directory store.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use url::Url;

use crate::cache::CatalogCache;
use crate::directory::CategoryDirectory;

pub const INVALIDATE_CACHE_ACTION: &str = "invalidateCache";

/// Best-effort invalidation messages to other catalog gateways.
///
/// Each `notify` sends at most one `GET <url>?action=invalidateCache` per target, in the
/// background. The caller never waits and never sees a failure.
#[derive(Clone, Debug)]
pub struct InvalidationNotifier {
    http_client: Client,
    targets: Arc<[Url]>,
    tasks: TaskTracker,
}

impl InvalidationNotifier {
    pub fn new(http_client: Client, targets: Vec<Url>) -> Self {
        Self {
            http_client,
            targets: targets.into(),
            tasks: TaskTracker::new(),
        }
    }

    pub fn targets(&self) -> &[Url] {
        &self.targets
    }

    pub fn notify(&self) {
        for target in self.targets.iter() {
            let mut url = target.clone();
            url.query_pairs_mut()
                .append_pair("action", INVALIDATE_CACHE_ACTION);
            let http_client = self.http_client.clone();
            self.tasks.spawn(async move {
                match http_client.get(url.clone()).send().await {
                    Ok(response) if response.status().is_success() => {
                        tracing::debug!("Sent cache invalidation to `{url}`");
                    }
                    Ok(response) => {
                        tracing::warn!(
                            "Cache invalidation to `{url}` returned HTTP {}",
                            response.status()
                        );
                    }
                    Err(e) => {
                        tracing::warn!("Failed to send cache invalidation to `{url}`: {e}");
                    }
                }
            });
        }
    }

    /// Waits for in-flight notifications. Only used at shutdown and in tests.
    pub async fn flush(&self) {
        self.tasks.close();
        self.tasks.wait().await;
        self.tasks.reopen();
    }
}

/// Polls the directory for edits and invalidates the catalog when its contents change.
pub struct DirectoryEditWatcher {
    directory: Arc<dyn CategoryDirectory>,
    cache: Arc<CatalogCache>,
    notifier: InvalidationNotifier,
    interval: Duration,
}

impl DirectoryEditWatcher {
    pub fn new(
        directory: Arc<dyn CategoryDirectory>,
        cache: Arc<CatalogCache>,
        notifier: InvalidationNotifier,
        interval: Duration,
    ) -> Self {
        Self {
            directory,
            cache,
            notifier,
            interval,
        }
    }

    async fn current_fingerprint(&self) -> Option<blake3::Hash> {
        // Unreadable stores are already logged by the directory, and do not count as an edit
        self.directory.fingerprint().await.ok().flatten()
    }

    /// Runs until `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) {
        let mut last_seen = self.current_fingerprint().await;
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;
        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }
            let Some(fingerprint) = self.current_fingerprint().await else {
                continue;
            };
            if last_seen == Some(fingerprint) {
                continue;
            }
            if last_seen.is_some() {
                tracing::info!(
                    "Detected an edit to category directory {}",
                    self.directory.describe()
                );
                // Errors are logged by `Error::new`; the next edit or request retries
                if self.cache.invalidate().await.is_ok() {
                    self.notifier.notify();
                }
            }
            last_seen = Some(fingerprint);
        }
    }

    pub fn spawn(self, shutdown: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}
