//! Graph-native mirror store.
//!
//! The synchronizer projects each build's graph into a [`GraphStore`]; the
//! query engine reads from it independently of the build pipeline. The store
//! is the only part of Stratum that may be unreachable, so every method
//! returns a [`StoreResult`] whose error the caller turns into a degraded
//! result instead of propagating it.
//!
//! # Implementations
//!
//! - [`SqliteGraphStore`]: `rusqlite` database with recursive CTEs for
//!   traversals

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::graph::{EdgeKind, Node, NodeKey, NodeType};

mod schema;
mod sqlite;

pub use sqlite::SqliteGraphStore;

/// Result type for graph-store calls.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Failures talking to the graph store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be opened or reached.
    #[error("graph store unreachable: {0}")]
    Unreachable(String),

    /// The call did not finish within its deadline.
    #[error("graph store call timed out after {0:?}")]
    Timeout(Duration),

    /// The database rejected a statement.
    #[error("graph store database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Invariant violation inside the store adapter.
    #[error("graph store internal error: {0}")]
    Internal(String),
}

/// A typed edge as mirrored into the store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct StoredEdge {
    /// The dependent.
    pub source: NodeKey,
    /// The dependency.
    pub target: NodeKey,
    /// Relationship type.
    pub kind: EdgeKind,
}

/// Degree counts of one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DegreeCount {
    /// The node.
    pub key: NodeKey,
    /// Number of incoming edges.
    pub incoming: usize,
    /// Number of outgoing edges.
    pub outgoing: usize,
}

/// Rows removed by [`GraphStore::prune_except`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PruneStats {
    /// Nodes deleted.
    pub nodes: usize,
    /// Edges deleted.
    pub edges: usize,
}

/// A store holding the mirrored graph.
///
/// Implementations must be `Send + Sync`: the synchronizer issues writes
/// from concurrent tasks and queries run alongside it. None of these methods
/// applies a timeout itself; callers wrap them with [`with_timeout`].
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Check that the store is reachable.
    async fn ping(&self) -> StoreResult<()>;

    /// Create or update a node, matched on its key.
    async fn upsert_node(&self, node: &Node, run_id: &str) -> StoreResult<()>;

    /// Create or update an edge, matched on `(source, target, kind)`.
    async fn upsert_edge(&self, edge: &StoredEdge, run_id: &str) -> StoreResult<()>;

    /// Delete every node and edge not written by `run_id`.
    async fn prune_except(&self, run_id: &str) -> StoreResult<PruneStats>;

    /// Whether a node with this key exists.
    async fn contains_node(&self, key: &NodeKey) -> StoreResult<bool>;

    /// Transitive dependents of `key` with their minimum depth, up to
    /// `max_depth` hops. The node itself is excluded.
    async fn dependents_within(
        &self,
        key: &NodeKey,
        max_depth: u32,
    ) -> StoreResult<Vec<(NodeKey, u32)>>;

    /// All shortest paths between two nodes ignoring edge direction, at most
    /// `max_hops` long and at most `limit` of them. Empty when none exists.
    async fn shortest_paths(
        &self,
        source: &NodeKey,
        target: &NodeKey,
        max_hops: u32,
        limit: usize,
    ) -> StoreResult<Vec<Vec<NodeKey>>>;

    /// Nodes whose incoming plus outgoing edge count is at least `min_total`.
    async fn degree_counts(&self, min_total: usize) -> StoreResult<Vec<DegreeCount>>;

    /// Nodes of the given types that no edge points at.
    async fn nodes_without_incoming(&self, types: &[NodeType]) -> StoreResult<Vec<NodeKey>>;

    /// Distinct `(source, target)` pairs whose endpoints are both of `node_type`.
    async fn typed_edges(&self, node_type: NodeType) -> StoreResult<Vec<(NodeKey, NodeKey)>>;
}

/// Run a store call under a deadline.
///
/// # Errors
///
/// Returns `StoreError::Timeout` when the deadline passes, otherwise the
/// call's own result.
pub async fn with_timeout<T>(
    timeout: Duration,
    call: impl Future<Output = StoreResult<T>>,
) -> StoreResult<T> {
    tokio::time::timeout(timeout, call)
        .await
        .map_err(|_| StoreError::Timeout(timeout))?
}
