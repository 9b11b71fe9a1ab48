//! Configuration management

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ============================================================================
// Server Configuration Constants
// ============================================================================

/// Default server host binding. Workers reach the coordinator over the private network.
pub const DEFAULT_SERVER_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_SERVER_PORT: u16 = 8000;

/// Default shutdown timeout in seconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// Dataset and State Constants
// ============================================================================

/// Default newline-delimited JSON dataset.
pub const DEFAULT_DATASET_PATH: &str = "./arxiv-metadata-oai-snapshot.json";

/// Default number of lines per batch.
pub const DEFAULT_BATCH_SIZE: u64 = 32;

/// Default directory holding the persisted index, pool and cursor.
pub const DEFAULT_STATE_DIR: &str = ".";

pub const INDEX_FILE_NAME: &str = "line_index.txt";
pub const POOL_FILE_NAME: &str = "batch_pool.txt";
pub const CURSOR_FILE_NAME: &str = "progress.txt";
pub const SKIP_LEDGER_FILE_NAME: &str = "skipped_batches.log";
pub const MANIFEST_FILE_NAME: &str = "state_manifest.json";

/// Coordinator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub dataset: DatasetConfig,
    pub state: StateConfig,
}

/// Server-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub shutdown_timeout_secs: u64,
}

/// Dataset configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    pub path: PathBuf,
    /// Lines per batch. Changing it between runs rebuilds the batch pool.
    pub batch_size: u64,
}

/// Location of the persisted coordinator state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateConfig {
    pub dir: PathBuf,
}

impl StateConfig {
    pub fn index_path(&self) -> PathBuf {
        self.dir.join(INDEX_FILE_NAME)
    }

    pub fn pool_path(&self) -> PathBuf {
        self.dir.join(POOL_FILE_NAME)
    }

    pub fn cursor_path(&self) -> PathBuf {
        self.dir.join(CURSOR_FILE_NAME)
    }

    pub fn skip_ledger_path(&self) -> PathBuf {
        self.dir.join(SKIP_LEDGER_FILE_NAME)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.dir.join(MANIFEST_FILE_NAME)
    }
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Config {
            server: ServerConfig {
                host: std::env::var("LINEBATCH_HOST")
                    .unwrap_or_else(|_| DEFAULT_SERVER_HOST.to_string()),
                port: env_parse("LINEBATCH_PORT")?.unwrap_or(DEFAULT_SERVER_PORT),
                shutdown_timeout_secs: env_parse("LINEBATCH_SHUTDOWN_TIMEOUT")?
                    .unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT_SECS),
            },
            dataset: DatasetConfig {
                path: std::env::var("LINEBATCH_DATASET")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from(DEFAULT_DATASET_PATH)),
                batch_size: env_parse("LINEBATCH_BATCH_SIZE")?.unwrap_or(DEFAULT_BATCH_SIZE),
            },
            state: StateConfig {
                dir: std::env::var("LINEBATCH_STATE_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from(DEFAULT_STATE_DIR)),
            },
        };

        config.validate()?;

        Ok(config)
    }

    /// Configuration for a dataset and state directory with default server settings
    pub fn for_dataset(dataset: impl AsRef<Path>, state_dir: impl AsRef<Path>, batch_size: u64) -> Self {
        let mut config = Self::default();
        config.dataset.path = dataset.as_ref().to_path_buf();
        config.dataset.batch_size = batch_size;
        config.state.dir = state_dir.as_ref().to_path_buf();
        config
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("Server port must be greater than 0");
        }

        if self.dataset.batch_size == 0 {
            anyhow::bail!("Batch size must be greater than 0");
        }

        if self.dataset.path.as_os_str().is_empty() {
            anyhow::bail!("Dataset path cannot be empty");
        }

        if self.state.dir.is_file() {
            anyhow::bail!(
                "State directory {} is a regular file",
                self.state.dir.display()
            );
        }

        Ok(())
    }
}

/// `None` when `key` is unset; a value that does not parse is an error
fn env_parse<T: std::str::FromStr>(key: &str) -> anyhow::Result<Option<T>> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| anyhow::anyhow!("{} has an invalid value: '{}'", key, raw)),
        Err(_) => Ok(None),
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: DEFAULT_SERVER_HOST.to_string(),
                port: DEFAULT_SERVER_PORT,
                shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
            },
            dataset: DatasetConfig {
                path: PathBuf::from(DEFAULT_DATASET_PATH),
                batch_size: DEFAULT_BATCH_SIZE,
            },
            state: StateConfig {
                dir: PathBuf::from(DEFAULT_STATE_DIR),
            },
        }
    }
}
