use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Connection settings for the etcd backend.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EtcdConfig {
    pub endpoints: Vec<String>,
    /// Prefix applied to every physical key. Empty for none.
    pub namespace: String,
    /// Lease TTL of the session that backs the transient save lock.
    pub session_ttl_secs: i64,
    pub lock_timeout_ms: u64,
    pub connect_timeout_ms: u64,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl EtcdConfig {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl Default for EtcdConfig {
    fn default() -> Self {
        Self {
            endpoints: vec!["127.0.0.1:2379".to_string()],
            namespace: String::new(),
            session_ttl_secs: 15,
            lock_timeout_ms: 5_000,
            connect_timeout_ms: 3_000,
            username: None,
            password: None,
        }
    }
}

/// Settings for the embedded redb backend.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddedConfig {
    pub path: PathBuf,
    /// Name of the table holding every record.
    pub namespace: String,
}

impl Default for EmbeddedConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("tskv.redb"),
            namespace: "tskv".to_string(),
        }
    }
}

/// Which backend to open, and how.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum BackendConfig {
    Etcd(EtcdConfig),
    Embedded(EmbeddedConfig),
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self::Etcd(EtcdConfig::default())
    }
}

impl BackendConfig {
    pub fn from_toml_str(raw: &str) -> StoreResult<Self> {
        toml::from_str(raw).map_err(|e| StoreError::Config(e.to_string()))
    }

    pub fn from_toml_file(path: &Path) -> StoreResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }
}
