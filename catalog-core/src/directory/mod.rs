//! The category directory: the central registry mapping categories to their backend endpoints.
//!
//! Records are read-only to the gateway. An operator edits them in the backing store, and the
//! gateway only ever reads the full set in row order.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod tabular;

pub use tabular::TabularFileDirectory;

use crate::error::Error;

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CategoryRecord {
    pub id: String,
    pub name: String,
    #[serde(default, alias = "store_id")]
    pub store_id: String,
    #[serde(default, rename = "backendEndpoint", alias = "endpoint")]
    pub endpoint: String,
    #[serde(default, alias = "image_url")]
    pub image_url: String,
    #[serde(default, rename = "phoneNumber", alias = "phone")]
    pub phone: String,
    /// Derived from `endpoint` when the record is read; never taken from input.
    #[serde(default, skip_deserializing)]
    pub active: bool,
}

impl CategoryRecord {
    /// A record is active when its endpoint is configured, i.e. non-blank and not a placeholder.
    pub fn endpoint_is_configured(endpoint: &str, placeholder_prefix: &str) -> bool {
        let endpoint = endpoint.trim();
        !endpoint.is_empty() && !endpoint.starts_with(placeholder_prefix)
    }

    pub fn resolve_active(mut self, placeholder_prefix: &str) -> Self {
        self.active = Self::endpoint_is_configured(&self.endpoint, placeholder_prefix);
        self
    }
}

/// A source of category records.
#[async_trait]
pub trait CategoryDirectory: Send + Sync {
    /// Every record in the store, in row order, with `active` resolved.
    ///
    /// Fails with `StoreUnavailable` if the store cannot be read or its header cannot be parsed.
    async fn read_all(&self) -> Result<Vec<CategoryRecord>, Error>;

    /// A fingerprint of the store's current contents, used to detect edits.
    ///
    /// Returns `None` for stores that cannot change while the gateway is running.
    async fn fingerprint(&self) -> Result<Option<blake3::Hash>, Error> {
        Ok(None)
    }

    async fn list_active_categories(&self) -> Result<Vec<CategoryRecord>, Error> {
        Ok(active_categories(&self.read_all().await?))
    }

    /// Short description for startup logs
    fn describe(&self) -> String;
}

/// Restricts `records` to the active ones, preserving order.
pub fn active_categories(records: &[CategoryRecord]) -> Vec<CategoryRecord> {
    records.iter().filter(|c| c.active).cloned().collect()
}

/// Categories declared inline in the config file.
#[derive(Debug)]
pub struct StaticDirectory {
    records: Vec<CategoryRecord>,
}

impl StaticDirectory {
    pub fn new(records: Vec<CategoryRecord>, placeholder_prefix: &str) -> Self {
        Self {
            records: records
                .into_iter()
                .map(|record| record.resolve_active(placeholder_prefix))
                .collect(),
        }
    }
}

#[async_trait]
impl CategoryDirectory for StaticDirectory {
    async fn read_all(&self) -> Result<Vec<CategoryRecord>, Error> {
        Ok(self.records.clone())
    }

    fn describe(&self) -> String {
        format!("static ({} categories)", self.records.len())
    }
}
