use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use txcert_node::MAX_TCERT_BATCH;

use crate::error::{RootError, RootResult};

/// Identity the client registers and initializes with.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientConfig {
    /// Node-local id of the client.
    #[serde(default = "default_client_id")]
    pub id: String,

    /// Enrollment id known to the registrar.
    #[serde(default = "default_client_id")]
    pub enrollment_id: String,
}

fn default_client_id() -> String {
    "alice".to_string()
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            id: default_client_id(),
            enrollment_id: default_client_id(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PoolConfig {
    /// TCerts requested from the TCA per refill.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_tcert_validity")]
    pub tcert_validity_secs: u64,
}

fn default_batch_size() -> usize {
    16
}

fn default_tcert_validity() -> u64 {
    24 * 3600
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            tcert_validity_secs: default_tcert_validity(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    #[serde(default = "default_filter")]
    pub filter: String,
}

fn default_filter() -> String {
    "txcert=info,txcert_client=info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}

/// Top-level configuration, typically `~/.txcert/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RootConfig {
    #[serde(default)]
    pub client: ClientConfig,

    #[serde(default)]
    pub pool: PoolConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Returns `$HOME/<suffix>` if HOME is available, otherwise `./<suffix>`.
fn dirs_or_default(suffix: &str) -> PathBuf {
    std::env::var("HOME")
        .map(|h| PathBuf::from(h).join(suffix))
        .unwrap_or_else(|_| PathBuf::from(suffix))
}

impl RootConfig {
    /// Load configuration from a TOML file. A missing file yields defaults.
    pub fn load(path: &Path) -> RootResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        let config: RootConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> RootResult<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| RootError::Config(format!("TOML serialize error: {}", e)))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn validate(&self) -> RootResult<()> {
        if self.client.id.trim().is_empty() {
            return Err(RootError::Config("client.id must not be empty".into()));
        }
        if self.client.enrollment_id.trim().is_empty() {
            return Err(RootError::Config(
                "client.enrollment_id must not be empty".into(),
            ));
        }
        if self.pool.batch_size == 0 {
            return Err(RootError::Config("pool.batch_size must be > 0".into()));
        }
        if self.pool.batch_size > MAX_TCERT_BATCH {
            return Err(RootError::Config(format!(
                "pool.batch_size must be at most {}",
                MAX_TCERT_BATCH
            )));
        }
        if self.pool.tcert_validity_secs == 0 {
            return Err(RootError::Config(
                "pool.tcert_validity_secs must be > 0".into(),
            ));
        }
        Ok(())
    }

    pub fn default_config_path() -> PathBuf {
        dirs_or_default(".txcert/config.toml")
    }
}
