use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::backend::CategoryBackendClient;
use crate::cache::CatalogCache;
use crate::directory::{CategoryDirectory, CategoryRecord, active_categories};
use crate::error::Error;

/// A product as returned by a category backend. The schema belongs to the backend.
pub type Product = Map<String, Value>;

pub const CATEGORY_FIELD: &str = "category";
pub const CATEGORY_ID_FIELD: &str = "categoryId";

/// One complete aggregated view of the catalog.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct CatalogSnapshot {
    /// Every directory record, active or not, in directory order
    pub categories: Vec<CategoryRecord>,
    /// Products of all active categories, tagged with their category
    pub products: Vec<Product>,
}

/// Tags every product with the category it came from. Other fields are left untouched.
fn tag_products(category: &CategoryRecord, products: Vec<Product>) -> Vec<Product> {
    products
        .into_iter()
        .map(|mut product| {
            product.insert(
                CATEGORY_FIELD.to_string(),
                Value::String(category.name.clone()),
            );
            product.insert(
                CATEGORY_ID_FIELD.to_string(),
                Value::String(category.id.clone()),
            );
            product
        })
        .collect()
}

pub struct CatalogAggregator {
    directory: Arc<dyn CategoryDirectory>,
    backend_client: CategoryBackendClient,
    cache: Arc<CatalogCache>,
    ttl: Duration,
}

impl CatalogAggregator {
    pub fn new(
        directory: Arc<dyn CategoryDirectory>,
        backend_client: CategoryBackendClient,
        cache: Arc<CatalogCache>,
        ttl: Duration,
    ) -> Self {
        Self {
            directory,
            backend_client,
            cache,
            ttl,
        }
    }

    pub fn cache(&self) -> &Arc<CatalogCache> {
        &self.cache
    }

    pub fn directory(&self) -> &Arc<dyn CategoryDirectory> {
        &self.directory
    }

    /// Returns the cached snapshot, or aggregates a fresh one on a miss.
    ///
    /// A directory failure propagates and leaves the cache untouched. Backend failures only
    /// remove that category's products from the result.
    pub async fn get_public_catalog(&self) -> Result<Arc<CatalogSnapshot>, Error> {
        if let Some(snapshot) = self.cache.get() {
            metrics::counter!("catalog_cache_hits_total").increment(1);
            tracing::debug!("Serving catalog from cache");
            return Ok(snapshot);
        }
        metrics::counter!("catalog_cache_misses_total").increment(1);

        let categories = self.directory.read_all().await?;
        let active = active_categories(&categories);
        if active.is_empty() {
            tracing::info!("No active categories, serving an empty catalog");
            return Ok(Arc::new(CatalogSnapshot {
                categories,
                products: Vec::new(),
            }));
        }

        // `join_all` keeps the input order, so products end up in directory order
        let fetched = join_all(
            active
                .iter()
                .map(|category| self.backend_client.fetch_category_products(category)),
        )
        .await;
        let products: Vec<Product> = active
            .iter()
            .zip(fetched)
            .flat_map(|(category, products)| tag_products(category, products))
            .collect();

        let snapshot = Arc::new(CatalogSnapshot {
            categories,
            products,
        });
        self.cache.put(snapshot.clone(), self.ttl);
        tracing::info!(
            "Aggregated {} products from {} active categories",
            snapshot.products.len(),
            active.len()
        );
        Ok(snapshot)
    }
}
