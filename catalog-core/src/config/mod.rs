use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::directory::CategoryRecord;
use crate::error::{Error, ErrorDetails};

pub const DEFAULT_PLACEHOLDER_PREFIX: &str = "REMPLIR_";
pub const DEFAULT_IMAGE_URL: &str = "https://i.postimg.cc/pX3dYj8B/course-microservices.jpg";

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub directory: DirectoryConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub invalidation: InvalidationConfig,
}

impl Config {
    pub async fn load_from_path(path: &Path) -> Result<Self, Error> {
        let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
            Error::new(ErrorDetails::Config {
                message: format!("Failed to read config file `{}`: {e}", path.display()),
            })
        })?;
        Self::load_from_toml(&contents)
    }

    pub fn load_from_toml(contents: &str) -> Result<Self, Error> {
        let config: Config = toml::from_str(contents).map_err(|e| {
            Error::new(ErrorDetails::Config {
                message: format!("Failed to parse config: {e}"),
            })
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.cache.ttl_s == 0 {
            return Err(Error::new(ErrorDetails::Config {
                message: "`cache.ttl_s` must be greater than zero".to_string(),
            }));
        }
        if self.backend.timeout_ms == 0 {
            return Err(Error::new(ErrorDetails::Config {
                message: "`backend.timeout_ms` must be greater than zero".to_string(),
            }));
        }
        if self.directory.placeholder_prefix().is_empty() {
            return Err(Error::new(ErrorDetails::Config {
                message: "`directory.placeholder_prefix` must not be empty".to_string(),
            }));
        }
        for url in &self.invalidation.notify_urls {
            url::Url::parse(url).map_err(|e| {
                Error::new(ErrorDetails::Config {
                    message: format!("Invalid URL `{url}` in `invalidation.notify_urls`: {e}"),
                })
            })?;
        }
        for origin in &self.gateway.cors.allowed_origins {
            http::HeaderValue::from_str(origin).map_err(|e| {
                Error::new(ErrorDetails::Config {
                    message: format!(
                        "Invalid origin `{origin}` in `gateway.cors.allowed_origins`: {e}"
                    ),
                })
            })?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    #[serde(default)]
    pub bind_address: Option<SocketAddr>,
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub cors: CorsConfig,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CorsConfig {
    /// Origins answered by `OPTIONS` preflights. Empty disables the CORS layer.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum DirectoryConfig {
    /// A tab-separated file with a header row
    File {
        path: PathBuf,
        #[serde(default = "default_watch_interval_ms")]
        watch_interval_ms: u64,
        #[serde(default = "default_placeholder_prefix")]
        placeholder_prefix: String,
        #[serde(default = "default_image_url")]
        default_image_url: String,
    },
    /// Categories declared inline
    Static {
        #[serde(default)]
        categories: Vec<CategoryRecord>,
        #[serde(default = "default_placeholder_prefix")]
        placeholder_prefix: String,
    },
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        DirectoryConfig::Static {
            categories: Vec::new(),
            placeholder_prefix: default_placeholder_prefix(),
        }
    }
}

impl DirectoryConfig {
    pub fn placeholder_prefix(&self) -> &str {
        match self {
            DirectoryConfig::File {
                placeholder_prefix, ..
            }
            | DirectoryConfig::Static {
                placeholder_prefix, ..
            } => placeholder_prefix,
        }
    }
}

fn default_watch_interval_ms() -> u64 {
    5_000
}

fn default_placeholder_prefix() -> String {
    DEFAULT_PLACEHOLDER_PREFIX.to_string()
}

fn default_image_url() -> String {
    DEFAULT_IMAGE_URL.to_string()
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    #[serde(default = "default_cache_ttl_s")]
    pub ttl_s: u64,
    /// Where the cache version token is persisted. Unset keeps it in memory only.
    #[serde(default)]
    pub version_path: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_s: default_cache_ttl_s(),
            version_path: None,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_s)
    }
}

fn default_cache_ttl_s() -> u64 {
    900
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BackendConfig {
    #[serde(default = "default_backend_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_backend_timeout_ms(),
        }
    }
}

impl BackendConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_backend_timeout_ms() -> u64 {
    30_000
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct InvalidationConfig {
    /// Peers that receive `?action=invalidateCache` when a directory edit is detected locally
    #[serde(default)]
    pub notify_urls: Vec<String>,
}
