//! Mirroring the in-memory graph into the graph store.
//!
//! A sync pings the store, upserts every node, then every edge. Writes run
//! concurrently up to a semaphore limit, each under its own timeout. Failed
//! writes are collected rather than aborting the run, and the report lists
//! exactly which nodes and edges did not land.
//!
//! Every row written carries the run id. When a sync finishes with no
//! failures, rows left over from older runs are pruned so the mirror matches
//! the latest build.

use std::sync::Arc;
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::graph::Graph;
use crate::store::{GraphStore, StoreError, StoredEdge, with_timeout};

/// Default number of concurrent store writes.
pub const DEFAULT_MAX_CONCURRENCY: usize = 8;

/// Default per-call timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Tuning for a sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncConfig {
    /// Maximum writes in flight.
    pub max_concurrency: usize,
    /// Deadline for each store call.
    pub timeout: Duration,
    /// Delete rows from older runs after a complete sync.
    pub prune_stale: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            timeout: DEFAULT_TIMEOUT,
            prune_stale: true,
        }
    }
}

/// One node or edge that could not be written.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct SyncFailure {
    /// `Type:Name` for nodes, `source -[KIND]-> target` for edges.
    pub item: String,
    /// The store's error message.
    pub reason: String,
}

/// Outcome of one sync run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    /// Identifier stamped on every written row.
    pub run_id: String,
    /// Set when the store could not be reached; nothing was written.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unavailable: Option<String>,
    /// Nodes written.
    pub nodes_synced: usize,
    /// Edges written.
    pub edges_synced: usize,
    /// Nodes that failed, sorted.
    pub failed_nodes: Vec<SyncFailure>,
    /// Edges that failed, sorted.
    pub failed_edges: Vec<SyncFailure>,
    /// Stale nodes removed.
    pub pruned_nodes: usize,
    /// Stale edges removed.
    pub pruned_edges: usize,
}

impl SyncReport {
    /// True when the store was reached and every write landed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.unavailable.is_none() && self.failed_nodes.is_empty() && self.failed_edges.is_empty()
    }
}

/// Mirrors graphs into a [`GraphStore`].
#[derive(Clone)]
pub struct GraphSynchronizer {
    store: Arc<dyn GraphStore>,
    config: SyncConfig,
}

impl GraphSynchronizer {
    /// Create a synchronizer. A concurrency of 0 is treated as 1.
    #[must_use]
    pub fn new(store: Arc<dyn GraphStore>, config: SyncConfig) -> Self {
        Self {
            store,
            config: SyncConfig {
                max_concurrency: config.max_concurrency.max(1),
                ..config
            },
        }
    }

    /// Mirror every node and edge of `graph`.
    ///
    /// Never fails: an unreachable store and individual write failures are
    /// both reported in the returned [`SyncReport`].
    pub async fn sync(&self, graph: &Graph) -> SyncReport {
        let run_id = Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true);
        let mut report = SyncReport {
            run_id: run_id.clone(),
            ..SyncReport::default()
        };

        if let Err(e) = with_timeout(self.config.timeout, self.store.ping()).await {
            tracing::warn!(error = %e, "Graph store unavailable, skipping sync");
            report.unavailable = Some(e.to_string());
            return report;
        }

        let run_id: Arc<str> = Arc::from(run_id);
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency));

        // Nodes first so edge endpoints exist when edges land
        let mut tasks = JoinSet::new();
        for node in graph.nodes() {
            let node = node.clone();
            let item = node.key.to_string();
            let store = Arc::clone(&self.store);
            let run_id = Arc::clone(&run_id);
            let semaphore = Arc::clone(&semaphore);
            let timeout = self.config.timeout;
            tasks.spawn(async move {
                let result = match semaphore.acquire_owned().await {
                    Ok(_permit) => with_timeout(timeout, store.upsert_node(&node, &run_id)).await,
                    Err(e) => Err(StoreError::Internal(format!("semaphore closed: {e}"))),
                };
                (item, result)
            });
        }
        let (synced, failed) = collect(&mut tasks).await;
        report.nodes_synced = synced;
        report.failed_nodes = failed;

        let mut tasks = JoinSet::new();
        for (source, target, kind) in graph.edges() {
            let edge = StoredEdge {
                source: source.clone(),
                target: target.clone(),
                kind,
            };
            let item = format!("{source} -[{kind}]-> {target}");
            let store = Arc::clone(&self.store);
            let run_id = Arc::clone(&run_id);
            let semaphore = Arc::clone(&semaphore);
            let timeout = self.config.timeout;
            tasks.spawn(async move {
                let result = match semaphore.acquire_owned().await {
                    Ok(_permit) => with_timeout(timeout, store.upsert_edge(&edge, &run_id)).await,
                    Err(e) => Err(StoreError::Internal(format!("semaphore closed: {e}"))),
                };
                (item, result)
            });
        }
        let (synced, failed) = collect(&mut tasks).await;
        report.edges_synced = synced;
        report.failed_edges = failed;

        if self.config.prune_stale && report.is_complete() {
            match with_timeout(self.config.timeout, self.store.prune_except(&run_id)).await {
                Ok(stats) => {
                    report.pruned_nodes = stats.nodes;
                    report.pruned_edges = stats.edges;
                }
                Err(e) => tracing::warn!(error = %e, "Failed to prune stale graph rows"),
            }
        }

        tracing::info!(
            run_id = %run_id,
            nodes = report.nodes_synced,
            edges = report.edges_synced,
            failed_nodes = report.failed_nodes.len(),
            failed_edges = report.failed_edges.len(),
            pruned_nodes = report.pruned_nodes,
            pruned_edges = report.pruned_edges,
            "Graph store sync finished"
        );

        report
    }
}

/// Drain a batch of write tasks into a success count and sorted failures.
async fn collect(
    tasks: &mut JoinSet<(String, Result<(), StoreError>)>,
) -> (usize, Vec<SyncFailure>) {
    let mut synced = 0;
    let mut failed = Vec::new();

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((_, Ok(()))) => synced += 1,
            Ok((item, Err(e))) => {
                tracing::warn!(item = %item, error = %e, "Graph store write failed");
                failed.push(SyncFailure {
                    item,
                    reason: e.to_string(),
                });
            }
            Err(e) => {
                tracing::warn!(error = %e, "Graph store write task panicked");
                failed.push(SyncFailure {
                    item: "<unknown>".to_string(),
                    reason: e.to_string(),
                });
            }
        }
    }

    failed.sort();
    (synced, failed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GraphBuilder, Node, NodeKey, NodeType};
    use crate::records::{EntityKind, EntityRecord};
    use crate::store::{DegreeCount, PruneStats, SqliteGraphStore, StoreResult};
    use async_trait::async_trait;
    use tempfile::TempDir;

    /// Delegates to SQLite but rejects writes touching one node name.
    struct FlakyStore {
        inner: SqliteGraphStore,
        reject: &'static str,
    }

    impl FlakyStore {
        fn rejected(&self) -> StoreResult<()> {
            Err(StoreError::Internal(format!("rejected {}", self.reject)))
        }
    }

    #[async_trait]
    impl GraphStore for FlakyStore {
        async fn ping(&self) -> StoreResult<()> {
            self.inner.ping().await
        }

        async fn upsert_node(&self, node: &Node, run_id: &str) -> StoreResult<()> {
            if node.key.name == self.reject {
                return self.rejected();
            }
            self.inner.upsert_node(node, run_id).await
        }

        async fn upsert_edge(&self, edge: &StoredEdge, run_id: &str) -> StoreResult<()> {
            if edge.source.name == self.reject || edge.target.name == self.reject {
                return self.rejected();
            }
            self.inner.upsert_edge(edge, run_id).await
        }

        async fn prune_except(&self, run_id: &str) -> StoreResult<PruneStats> {
            self.inner.prune_except(run_id).await
        }

        async fn contains_node(&self, key: &NodeKey) -> StoreResult<bool> {
            self.inner.contains_node(key).await
        }

        async fn dependents_within(
            &self,
            key: &NodeKey,
            max_depth: u32,
        ) -> StoreResult<Vec<(NodeKey, u32)>> {
            self.inner.dependents_within(key, max_depth).await
        }

        async fn shortest_paths(
            &self,
            source: &NodeKey,
            target: &NodeKey,
            max_hops: u32,
            limit: usize,
        ) -> StoreResult<Vec<Vec<NodeKey>>> {
            self.inner
                .shortest_paths(source, target, max_hops, limit)
                .await
        }

        async fn degree_counts(&self, min_total: usize) -> StoreResult<Vec<DegreeCount>> {
            self.inner.degree_counts(min_total).await
        }

        async fn nodes_without_incoming(&self, types: &[NodeType]) -> StoreResult<Vec<NodeKey>> {
            self.inner.nodes_without_incoming(types).await
        }

        async fn typed_edges(&self, node_type: NodeType) -> StoreResult<Vec<(NodeKey, NodeKey)>> {
            self.inner.typed_edges(node_type).await
        }
    }

    fn graph() -> Graph {
        GraphBuilder::default()
            .build(vec![
                EntityRecord::new(EntityKind::Table, "USUARIO"),
                EntityRecord::new(EntityKind::Procedure, "DoWork")
                    .uses_table("USUARIO")
                    .calls("Unknown_Helper"),
            ])
            .graph
    }

    fn synchronizer(store: SqliteGraphStore) -> GraphSynchronizer {
        GraphSynchronizer::new(Arc::new(store), SyncConfig::default())
    }

    #[tokio::test]
    async fn sync_writes_every_node_and_edge() {
        let dir = TempDir::new().unwrap();
        let store = SqliteGraphStore::new(dir.path().join("graph.db"));

        let report = synchronizer(store.clone()).sync(&graph()).await;

        assert!(report.is_complete());
        assert_eq!(report.nodes_synced, 3);
        assert_eq!(report.edges_synced, 2);
        assert!(
            store
                .contains_node(&NodeKey::new(NodeType::External, "Unknown_Helper"))
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn repeated_sync_does_not_duplicate() {
        let dir = TempDir::new().unwrap();
        let store = SqliteGraphStore::new(dir.path().join("graph.db"));
        let sync = synchronizer(store.clone());

        sync.sync(&graph()).await;
        let second = sync.sync(&graph()).await;

        assert!(second.is_complete());
        assert_eq!(second.pruned_nodes, 0);
        assert_eq!(second.pruned_edges, 0);
        assert_eq!(store.degree_counts(0).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn sync_prunes_rows_missing_from_new_graph() {
        let dir = TempDir::new().unwrap();
        let store = SqliteGraphStore::new(dir.path().join("graph.db"));
        let sync = synchronizer(store.clone());
        sync.sync(&graph()).await;

        let smaller = GraphBuilder::default()
            .build(vec![EntityRecord::new(EntityKind::Table, "USUARIO")])
            .graph;
        let report = sync.sync(&smaller).await;

        assert_eq!(report.pruned_nodes, 2);
        assert_eq!(report.pruned_edges, 2);
    }

    #[tokio::test]
    async fn unreachable_store_is_reported_not_raised() {
        let dir = TempDir::new().unwrap();
        let store = SqliteGraphStore::new(dir.path().join("missing").join("graph.db"));

        let report = synchronizer(store).sync(&graph()).await;

        assert!(report.unavailable.is_some());
        assert!(!report.is_complete());
        assert_eq!(report.nodes_synced, 0);
    }

    #[tokio::test]
    async fn failed_writes_are_listed_and_block_pruning() {
        let dir = TempDir::new().unwrap();
        let sqlite = SqliteGraphStore::new(dir.path().join("graph.db"));
        synchronizer(sqlite.clone()).sync(&graph()).await;

        let flaky = FlakyStore {
            inner: sqlite.clone(),
            reject: "Unknown_Helper",
        };
        let smaller = GraphBuilder::default()
            .build(vec![
                EntityRecord::new(EntityKind::Procedure, "DoWork").calls("Unknown_Helper"),
            ])
            .graph;
        let report = GraphSynchronizer::new(Arc::new(flaky), SyncConfig::default())
            .sync(&smaller)
            .await;

        assert!(!report.is_complete());
        assert_eq!(report.nodes_synced, 1);
        assert_eq!(
            report.failed_nodes,
            vec![SyncFailure {
                item: "External:Unknown_Helper".to_string(),
                reason: "graph store internal error: rejected Unknown_Helper".to_string(),
            }]
        );
        assert_eq!(report.failed_edges.len(), 1);
        assert_eq!(report.pruned_nodes, 0);
        // USUARIO from the first run survives because nothing was pruned
        assert!(
            sqlite
                .contains_node(&NodeKey::new(NodeType::Table, "USUARIO"))
                .await
                .unwrap()
        );
    }
}
