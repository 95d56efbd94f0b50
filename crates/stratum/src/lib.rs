//! # Stratum: layered dependency graph engine
//!
//! Stratum ingests entity records (tables, classes, procedures, pages) that
//! an extractor has already produced for one project, builds a typed
//! dependency graph from them, and uses it to:
//!
//! - compute a safe migration order, layer by layer
//! - detect and report circular dependencies
//! - answer impact, path, hub and dead-code questions against a mirrored
//!   graph store
//!
//! ## Design Philosophy
//!
//! - **Owned graph per run** - every build constructs its own [`graph::Graph`];
//!   there is no global state
//! - **Best effort** - unresolved names, residual cycles and failed writes are
//!   reported as warnings, never as aborts
//! - **Degrade, don't crash** - an unreachable graph store turns query results
//!   into [`QueryOutcome::Unavailable`] instead of an error
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use stratum::{JsonlRecordStore, Pipeline};
//!
//! # async fn run() -> stratum::Result<()> {
//! let records = Arc::new(JsonlRecordStore::new("records"));
//! let report = Pipeline::new(records).build_and_persist("billing", false).await?;
//! println!("{} nodes, {} cycles", report.nodes, report.cycles.len());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod export;
pub mod graph;
pub mod persist;
pub mod pipeline;
pub mod query;
pub mod records;
pub mod store;
pub mod sync;

pub use config::StratumConfig;
pub use error::{BuildWarning, Error, Result};
pub use graph::{EdgeKind, Graph, Layer, Node, NodeKey, NodeType};
pub use pipeline::{BuildReport, Pipeline};
pub use query::{GraphQueryEngine, QueryConfig, QueryOutcome, UnavailableReason};
pub use records::{EntityKind, EntityRecord, InMemoryRecordStore, JsonlRecordStore, RecordStore};
pub use store::{GraphStore, SqliteGraphStore, StoreError};
pub use sync::{GraphSynchronizer, SyncConfig, SyncReport};
