use reqwest::Client;
use serde::Deserialize;
use url::Url;

use crate::catalog::Product;
use crate::directory::CategoryRecord;
use crate::error::{Error, ErrorDetails};

pub const GET_PRODUCTS_ACTION: &str = "getProducts";

/// The envelope every category backend answers `?action=getProducts` with.
#[derive(Debug, Deserialize)]
struct ProductsEnvelope {
    success: bool,
    #[serde(default)]
    data: Option<Vec<Product>>,
    #[serde(default)]
    error: Option<String>,
}

/// Fetches product lists from category backends.
///
/// Every failure is absorbed: an unhealthy backend contributes zero products and never aborts
/// the aggregation of the others. Failures are still logged and counted.
#[derive(Clone, Debug)]
pub struct CategoryBackendClient {
    http_client: Client,
}

impl CategoryBackendClient {
    pub fn new(http_client: Client) -> Self {
        Self { http_client }
    }

    /// Issues exactly one `GET <endpoint>?action=getProducts` for `category`.
    pub async fn fetch_category_products(&self, category: &CategoryRecord) -> Vec<Product> {
        match self.try_fetch_category_products(category).await {
            Ok(products) => {
                tracing::debug!(
                    category_id = %category.id,
                    "Fetched {} products",
                    products.len()
                );
                products
            }
            Err(_) => {
                // Already logged by `Error::new`
                metrics::counter!(
                    "catalog_backend_failures_total",
                    "category_id" => category.id.clone()
                )
                .increment(1);
                Vec::new()
            }
        }
    }

    async fn try_fetch_category_products(
        &self,
        category: &CategoryRecord,
    ) -> Result<Vec<Product>, Error> {
        let unreachable = |message: String| {
            Error::new(ErrorDetails::BackendUnreachable {
                category_id: category.id.clone(),
                endpoint: category.endpoint.clone(),
                message,
            })
        };
        let malformed = |message: String| {
            Error::new(ErrorDetails::BackendMalformed {
                category_id: category.id.clone(),
                endpoint: category.endpoint.clone(),
                message,
            })
        };

        let mut url = Url::parse(category.endpoint.trim())
            .map_err(|e| unreachable(format!("Invalid endpoint URL: {e}")))?;
        url.query_pairs_mut()
            .append_pair("action", GET_PRODUCTS_ACTION);

        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| unreachable(format!("Request failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(unreachable(format!("HTTP {status}")));
        }
        let body = response
            .text()
            .await
            .map_err(|e| unreachable(format!("Failed to read response body: {e}")))?;
        let envelope: ProductsEnvelope = serde_json::from_str(&body)
            .map_err(|e| malformed(format!("Failed to parse product envelope: {e}")))?;
        if !envelope.success {
            return Err(malformed(format!(
                "Backend reported failure: {}",
                envelope.error.as_deref().unwrap_or("no error message")
            )));
        }
        envelope
            .data
            .ok_or_else(|| malformed("Envelope has no `data` array".to_string()))
    }
}
