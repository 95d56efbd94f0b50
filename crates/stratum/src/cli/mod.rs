//! CLI command implementations.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use stratum::config::CONFIG_FILE_NAME;
use stratum::{GraphQueryEngine, JsonlRecordStore, SqliteGraphStore, StratumConfig};

mod display;

pub mod build;
pub mod cycles;
pub mod dead_code;
pub mod export;
pub mod hubs;
pub mod impact;
pub mod init;
pub mod path;

/// Shared context for every command: the loaded configuration and the
/// output mode.
#[derive(Debug)]
pub struct App {
    config: StratumConfig,
    json: bool,
}

impl App {
    /// Load configuration from `config_path`, or from `./stratum.yaml` when
    /// it exists.
    pub async fn load(config_path: Option<&Path>, json: bool) -> Result<Self> {
        let config = match config_path {
            Some(path) => StratumConfig::load(path)
                .await
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => StratumConfig::load_or_default(Path::new(CONFIG_FILE_NAME))
                .await
                .context("failed to load stratum.yaml")?,
        };
        tracing::debug!(?config, "Loaded configuration");
        Ok(Self { config, json })
    }

    /// The loaded configuration.
    pub fn config(&self) -> &StratumConfig {
        &self.config
    }

    /// Whether output should be JSON.
    pub fn json(&self) -> bool {
        self.json
    }

    /// The JSONL record store under `records.data-dir`.
    pub fn records(&self) -> Arc<JsonlRecordStore> {
        Arc::new(JsonlRecordStore::new(&self.config.records.data_dir))
    }

    /// The SQLite graph store at `graph-store.path`.
    pub fn graph_store(&self) -> Arc<SqliteGraphStore> {
        Arc::new(SqliteGraphStore::new(&self.config.graph_store.path))
    }

    /// A query engine over the graph store.
    pub fn query_engine(&self) -> GraphQueryEngine {
        GraphQueryEngine::new(self.graph_store(), self.config.to_query_config())
    }
}
