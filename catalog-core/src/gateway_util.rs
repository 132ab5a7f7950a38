use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::backend::CategoryBackendClient;
use crate::cache::CatalogCache;
use crate::catalog::CatalogAggregator;
use crate::config::{Config, DirectoryConfig};
use crate::directory::{CategoryDirectory, StaticDirectory, TabularFileDirectory};
use crate::error::{Error, ErrorDetails};
use crate::invalidation::{DirectoryEditWatcher, InvalidationNotifier};
use crate::version::{FileVersionStore, InMemoryVersionStore, VersionStore};

/// State for the API
#[derive(Clone)]
pub struct AppStateData {
    pub config: Arc<Config>,
    pub aggregator: Arc<CatalogAggregator>,
    pub notifier: InvalidationNotifier,
}
pub type AppState = axum::extract::State<AppStateData>;

impl AppStateData {
    pub fn new(config: Arc<Config>) -> Result<Self, Error> {
        let http_client = Client::builder()
            .timeout(config.backend.timeout())
            .build()
            .map_err(|e| {
                Error::new(ErrorDetails::Config {
                    message: format!("Failed to build HTTP client: {e}"),
                })
            })?;

        let directory: Arc<dyn CategoryDirectory> = match &config.directory {
            DirectoryConfig::File {
                path,
                placeholder_prefix,
                default_image_url,
                ..
            } => Arc::new(TabularFileDirectory::new(
                path.clone(),
                placeholder_prefix.clone(),
                default_image_url.clone(),
            )),
            DirectoryConfig::Static {
                categories,
                placeholder_prefix,
            } => Arc::new(StaticDirectory::new(categories.clone(), placeholder_prefix)),
        };

        let version_store: Arc<dyn VersionStore> = match &config.cache.version_path {
            Some(path) => Arc::new(FileVersionStore::new(path.clone())),
            None => Arc::new(InMemoryVersionStore::default()),
        };
        let cache = Arc::new(CatalogCache::new(version_store));

        let aggregator = Arc::new(CatalogAggregator::new(
            directory,
            CategoryBackendClient::new(http_client.clone()),
            cache,
            config.cache.ttl(),
        ));

        // URLs were checked by `Config::validate`
        let notify_targets = config
            .invalidation
            .notify_urls
            .iter()
            .map(|url| {
                Url::parse(url).map_err(|e| {
                    Error::new(ErrorDetails::Config {
                        message: format!("Invalid notify URL `{url}`: {e}"),
                    })
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let notifier = InvalidationNotifier::new(http_client, notify_targets);

        Ok(Self {
            config,
            aggregator,
            notifier,
        })
    }
}

/// Owns the application state together with its background tasks.
pub struct GatewayHandle {
    pub app_state: AppStateData,
    shutdown: CancellationToken,
    watcher: Option<tokio::task::JoinHandle<()>>,
}

impl GatewayHandle {
    pub fn new(config: Arc<Config>) -> Result<Self, Error> {
        let app_state = AppStateData::new(config)?;
        let shutdown = CancellationToken::new();

        let watcher = match &app_state.config.directory {
            DirectoryConfig::File {
                watch_interval_ms, ..
            } if *watch_interval_ms > 0 => Some(
                DirectoryEditWatcher::new(
                    app_state.aggregator.directory().clone(),
                    app_state.aggregator.cache().clone(),
                    app_state.notifier.clone(),
                    Duration::from_millis(*watch_interval_ms),
                )
                .spawn(shutdown.clone()),
            ),
            _ => None,
        };

        Ok(Self {
            app_state,
            shutdown,
            watcher,
        })
    }

    /// Stops the directory watcher and waits for pending invalidation notifications.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        if let Some(watcher) = self.watcher
            && let Err(e) = watcher.await
        {
            tracing::warn!("Directory watcher exited abnormally: {e}");
        }
        self.app_state.notifier.flush().await;
    }
}
