//! The end-to-end build: records in, ordered records (and a mirrored graph)
//! out.
//!
//! ```text
//! RecordStore -> GraphBuilder -> detect_cycles -> topological_order
//!             -> OrderPersister -> GraphSynchronizer (optional)
//! ```
//!
//! One graph is owned by the run and passed by value between stages. Nothing
//! about a run outlives its [`BuildReport`].

use std::sync::Arc;

use serde::Serialize;

use crate::error::{BuildWarning, Result};
use crate::graph::{CycleInfo, Graph, GraphBuilder, detect_cycles, topological_order};
use crate::persist::{OrderAssignment, OrderPersister};
use crate::records::RecordStore;
use crate::sync::{GraphSynchronizer, SyncReport};

/// Summary of one build run.
#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    /// The project built.
    pub project: String,
    /// Node count, externals included.
    pub nodes: usize,
    /// Edge count.
    pub edges: usize,
    /// True when the detector found at least one cycle.
    pub has_cycles: bool,
    /// Every detected cycle.
    pub cycles: Vec<CycleInfo>,
    /// Build and ordering warnings, in run order.
    pub warnings: Vec<BuildWarning>,
    /// The computed order for every record.
    pub assignments: Vec<OrderAssignment>,
    /// Records updated.
    pub written: usize,
    /// Record writes that failed.
    pub skipped: Vec<BuildWarning>,
    /// True when nothing was written.
    pub dry_run: bool,
    /// Fingerprint of the ordered graph.
    pub fingerprint: String,
    /// Set when the record store failed to flush.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub save_error: Option<String>,
    /// Mirror outcome, when a synchronizer is configured and the run is not
    /// a dry run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync: Option<SyncReport>,
}

/// An ordered graph plus everything learned while producing it.
#[derive(Debug, Clone)]
pub struct OrderedGraph {
    /// The graph with orders applied.
    pub graph: Graph,
    /// Cycles found before ordering.
    pub cycles: Vec<CycleInfo>,
    /// Builder and orderer warnings.
    pub warnings: Vec<BuildWarning>,
}

/// Runs builds against one record store.
#[derive(Clone)]
pub struct Pipeline {
    records: Arc<dyn RecordStore>,
    builder: GraphBuilder,
    synchronizer: Option<GraphSynchronizer>,
}

impl Pipeline {
    /// Create a pipeline with default read concurrency and no mirror.
    #[must_use]
    pub fn new(records: Arc<dyn RecordStore>) -> Self {
        Self {
            records,
            builder: GraphBuilder::default(),
            synchronizer: None,
        }
    }

    /// Read at most `read_concurrency` record kinds at once.
    #[must_use]
    pub fn with_read_concurrency(mut self, read_concurrency: usize) -> Self {
        self.builder = GraphBuilder::new(read_concurrency);
        self
    }

    /// Mirror every non-dry-run build through `synchronizer`.
    #[must_use]
    pub fn with_synchronizer(mut self, synchronizer: GraphSynchronizer) -> Self {
        self.synchronizer = Some(synchronizer);
        self
    }

    /// Build, check and order the graph of `project` without writing anything.
    ///
    /// # Errors
    ///
    /// Returns an error if the project's records cannot be read.
    pub async fn build_graph(&self, project: &str) -> Result<OrderedGraph> {
        let output = self
            .builder
            .build_from_store(self.records.as_ref(), project)
            .await?;
        let mut warnings = output.warnings;

        let report = detect_cycles(&output.graph);
        if report.has_cycles {
            tracing::warn!(
                project,
                cycles = report.cycles.len(),
                "Dependency cycles detected, order will be approximate"
            );
        }

        let order = topological_order(&output.graph);
        let graph = order.apply(&output.graph);
        warnings.extend(order.warnings);

        Ok(OrderedGraph {
            graph,
            cycles: report.cycles,
            warnings,
        })
    }

    /// Run the full build for `project`.
    ///
    /// With `dry_run` the report carries the same assignments, but neither
    /// the record store nor the graph store is written.
    ///
    /// # Errors
    ///
    /// Returns an error if the project's records cannot be read. Write and
    /// mirror failures are reported in the [`BuildReport`] instead.
    pub async fn build_and_persist(&self, project: &str, dry_run: bool) -> Result<BuildReport> {
        tracing::info!(project, dry_run, "Starting build");

        let ordered = self.build_graph(project).await?;
        let persisted = OrderPersister::new(self.records.as_ref())
            .persist(project, &ordered.graph, dry_run)
            .await;

        let sync = match &self.synchronizer {
            Some(synchronizer) if !dry_run => Some(synchronizer.sync(&ordered.graph).await),
            _ => None,
        };

        let report = BuildReport {
            project: project.to_string(),
            nodes: ordered.graph.node_count(),
            edges: ordered.graph.edge_count(),
            has_cycles: !ordered.cycles.is_empty(),
            cycles: ordered.cycles,
            warnings: ordered.warnings,
            assignments: persisted.assignments,
            written: persisted.written,
            skipped: persisted.skipped,
            dry_run,
            fingerprint: ordered.graph.fingerprint(),
            save_error: persisted.save_error,
            sync,
        };

        tracing::info!(
            project,
            nodes = report.nodes,
            edges = report.edges,
            written = report.written,
            warnings = report.warnings.len(),
            "Build finished"
        );
        Ok(report)
    }
}
