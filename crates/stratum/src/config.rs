//! Configuration file handling.
//!
//! Stratum reads an optional `stratum.yaml`. Every section and key is
//! optional; anything missing falls back to its default.
//!
//! ```yaml
//! records:
//!   data-dir: records
//! build:
//!   read-concurrency: 4
//! graph-store:
//!   path: .stratum/graph.db
//!   timeout-ms: 5000
//!   max-concurrency: 8
//! query:
//!   max-depth: 10
//!   max-hops: 10
//!   max-paths: 10
//!   max-cycle-length: 10
//!   entry-point-prefixes: [API, Main, On, Handle, Event, Test]
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::error::{Error, Result};
use crate::graph::DEFAULT_READ_CONCURRENCY;
use crate::query::{DEFAULT_ENTRY_POINT_PREFIXES, QueryConfig};
use crate::sync::{DEFAULT_MAX_CONCURRENCY, DEFAULT_TIMEOUT, SyncConfig};

/// Name of the configuration file looked up in the working directory
pub const CONFIG_FILE_NAME: &str = "stratum.yaml";

/// Default directory holding `<project>.jsonl` record files
pub const DEFAULT_DATA_DIR: &str = "records";

/// Default location of the graph-store database
pub const DEFAULT_STORE_PATH: &str = ".stratum/graph.db";

/// What [`init`] created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitResult {
    /// The written configuration file.
    pub config_path: PathBuf,
    /// The (possibly pre-existing) record directory.
    pub data_dir: PathBuf,
}

/// Write a default `stratum.yaml` into `base_dir` and create its record
/// directory.
///
/// # Errors
///
/// Returns `Error::Config` if `base_dir` already holds a `stratum.yaml`, or an
/// I/O error if a file system operation fails.
pub async fn init(base_dir: &Path) -> Result<InitResult> {
    let config_path = base_dir.join(CONFIG_FILE_NAME);
    if fs::try_exists(&config_path).await? {
        return Err(Error::Config(format!(
            "Stratum is already initialized in this directory. Found existing '{CONFIG_FILE_NAME}'"
        )));
    }

    let config = StratumConfig::default();
    let data_dir = base_dir.join(&config.records.data_dir);
    fs::create_dir_all(&data_dir).await?;
    config.save(&config_path).await?;

    tracing::info!(path = %config_path.display(), "Initialized stratum");
    Ok(InitResult {
        config_path,
        data_dir,
    })
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "kebab-case")]
pub struct StratumConfig {
    /// Record store settings
    pub records: RecordsConfig,
    /// Graph build settings
    pub build: BuildConfig,
    /// Graph-store settings
    pub graph_store: GraphStoreConfig,
    /// Query limits
    pub query: QuerySection,
}

/// `records` section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "kebab-case")]
pub struct RecordsConfig {
    /// Directory of JSONL record files
    pub data_dir: PathBuf,
}

impl Default for RecordsConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
        }
    }
}

/// `build` section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "kebab-case")]
pub struct BuildConfig {
    /// Record kinds read at once
    pub read_concurrency: usize,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            read_concurrency: DEFAULT_READ_CONCURRENCY,
        }
    }
}

/// `graph-store` section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "kebab-case")]
pub struct GraphStoreConfig {
    /// SQLite database file
    pub path: PathBuf,
    /// Per-call deadline in milliseconds
    pub timeout_ms: u64,
    /// Concurrent writes during sync
    pub max_concurrency: usize,
}

impl Default for GraphStoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_STORE_PATH),
            timeout_ms: u64::try_from(DEFAULT_TIMEOUT.as_millis()).unwrap_or(u64::MAX),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }
}

/// `query` section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "kebab-case")]
pub struct QuerySection {
    /// Upper bound for impact depth
    pub max_depth: u32,
    /// Upper bound for path length
    pub max_hops: u32,
    /// Shortest paths returned per query
    pub max_paths: usize,
    /// Upper bound for live cycle length
    pub max_cycle_length: usize,
    /// Name prefixes never reported as dead code
    pub entry_point_prefixes: Vec<String>,
}

impl Default for QuerySection {
    fn default() -> Self {
        let defaults = QueryConfig::default();
        Self {
            max_depth: defaults.max_depth,
            max_hops: defaults.max_hops,
            max_paths: defaults.max_paths,
            max_cycle_length: defaults.max_cycle_length,
            entry_point_prefixes: DEFAULT_ENTRY_POINT_PREFIXES
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}

impl StratumConfig {
    /// Load configuration from a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid YAML, or
    /// fails [`validate`](Self::validate).
    pub async fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).await?;
        let config: Self =
            serde_yaml::from_str(&content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration, using defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Same as [`load`](Self::load), except that a missing file is not an
    /// error.
    pub async fn load_or_default(path: &Path) -> Result<Self> {
        match fs::try_exists(path).await {
            Ok(true) => Self::load(path).await,
            Ok(false) => {
                tracing::debug!(path = %path.display(), "No config file, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Save configuration to a file.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub async fn save(&self, path: &Path) -> Result<()> {
        let content =
            serde_yaml::to_string(self).map_err(|e| Error::Config(format!("YAML error: {e}")))?;
        fs::write(path, content).await?;
        Ok(())
    }

    /// Reject limits that would make every operation a no-op.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` naming the first offending key.
    pub fn validate(&self) -> Result<()> {
        let checks = [
            ("build.read-concurrency", self.build.read_concurrency == 0),
            ("graph-store.timeout-ms", self.graph_store.timeout_ms == 0),
            (
                "graph-store.max-concurrency",
                self.graph_store.max_concurrency == 0,
            ),
            ("query.max-depth", self.query.max_depth == 0),
            ("query.max-hops", self.query.max_hops == 0),
            ("query.max-paths", self.query.max_paths == 0),
            ("query.max-cycle-length", self.query.max_cycle_length == 0),
        ];

        if let Some((key, _)) = checks.iter().find(|(_, is_zero)| *is_zero) {
            return Err(Error::Config(format!("{key} must be greater than 0")));
        }
        if self.records.data_dir.as_os_str().is_empty() {
            return Err(Error::Config("records.data-dir must not be empty".to_string()));
        }
        if self.graph_store.path.as_os_str().is_empty() {
            return Err(Error::Config("graph-store.path must not be empty".to_string()));
        }
        Ok(())
    }

    /// Per-call store deadline.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.graph_store.timeout_ms)
    }

    /// Limits for the query engine.
    #[must_use]
    pub fn to_query_config(&self) -> QueryConfig {
        QueryConfig {
            timeout: self.timeout(),
            max_depth: self.query.max_depth,
            max_hops: self.query.max_hops,
            max_paths: self.query.max_paths,
            max_cycle_length: self.query.max_cycle_length,
            entry_point_prefixes: self.query.entry_point_prefixes.clone(),
        }
    }

    /// Settings for the synchronizer.
    #[must_use]
    pub fn to_sync_config(&self) -> SyncConfig {
        SyncConfig {
            max_concurrency: self.graph_store.max_concurrency,
            timeout: self.timeout(),
            prune_stale: true,
        }
    }
}
