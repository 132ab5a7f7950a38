//! The cache version token and where it is persisted.
//!
//! Clients poll the token to learn that a newer catalog may be available. It is a hint only:
//! a cached snapshot can still be served within its TTL after the token moves.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Error, ErrorDetails};

/// Milliseconds since the Unix epoch at the time of an invalidation, serialized as a string.
#[derive(Clone, Copy, Debug, Default, Eq, Ord, PartialEq, PartialOrd)]
pub struct VersionToken(u64);

impl VersionToken {
    /// The token reported before any invalidation has ever happened
    pub const INITIAL: VersionToken = VersionToken(0);

    /// The token following `previous`: the current time, but never less than `previous + 1`,
    /// so tokens stay strictly increasing even within one millisecond or across clock steps.
    pub fn next_after(previous: VersionToken, now_ms: u64) -> VersionToken {
        VersionToken(now_ms.max(previous.0.saturating_add(1)))
    }

    pub fn now_ms() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or_default()
    }
}

impl std::fmt::Display for VersionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for VersionToken {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(VersionToken)
    }
}

impl Serialize for VersionToken {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for VersionToken {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Durable storage for the version token.
#[async_trait]
pub trait VersionStore: Send + Sync {
    async fn load(&self) -> Result<Option<VersionToken>, Error>;
    async fn store(&self, token: VersionToken) -> Result<(), Error>;
}

/// Keeps the token for the lifetime of the process only.
#[derive(Debug, Default)]
pub struct InMemoryVersionStore {
    token: Mutex<Option<VersionToken>>,
}

#[async_trait]
impl VersionStore for InMemoryVersionStore {
    async fn load(&self) -> Result<Option<VersionToken>, Error> {
        let token = self.token.lock().map_err(|e| {
            Error::new(ErrorDetails::VersionStore {
                message: format!("Version lock poisoned: {e}"),
            })
        })?;
        Ok(*token)
    }

    async fn store(&self, token: VersionToken) -> Result<(), Error> {
        let mut current = self.token.lock().map_err(|e| {
            Error::new(ErrorDetails::VersionStore {
                message: format!("Version lock poisoned: {e}"),
            })
        })?;
        *current = Some(token);
        Ok(())
    }
}

#[derive(Debug, Deserialize, Serialize)]
struct VersionDocument {
    cache_version: VersionToken,
}

/// Persists the token as a small JSON document so it survives restarts.
#[derive(Debug)]
pub struct FileVersionStore {
    path: PathBuf,
}

impl FileVersionStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl VersionStore for FileVersionStore {
    async fn load(&self) -> Result<Option<VersionToken>, Error> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(Error::new(ErrorDetails::VersionStore {
                    message: format!("Failed to read `{}`: {e}", self.path.display()),
                }));
            }
        };
        let document: VersionDocument = serde_json::from_str(&contents).map_err(|e| {
            Error::new(ErrorDetails::VersionStore {
                message: format!("Failed to parse `{}`: {e}", self.path.display()),
            })
        })?;
        Ok(Some(document.cache_version))
    }

    async fn store(&self, token: VersionToken) -> Result<(), Error> {
        let contents = serde_json::to_string(&VersionDocument {
            cache_version: token,
        })?;
        // Write to a sibling file and rename, so readers never see a partial document
        let mut tmp_path = self.path.clone().into_os_string();
        tmp_path.push(".tmp");
        tokio::fs::write(&tmp_path, contents).await.map_err(|e| {
            Error::new(ErrorDetails::VersionStore {
                message: format!("Failed to write `{}`: {e}", self.path.display()),
            })
        })?;
        tokio::fs::rename(&tmp_path, &self.path).await.map_err(|e| {
            Error::new(ErrorDetails::VersionStore {
                message: format!("Failed to replace `{}`: {e}", self.path.display()),
            })
        })
    }
}
