//! Writing computed orders back onto entity records.
//!
//! Only resolved nodes are written; external nodes have no originating
//! record. A failed write is logged, recorded as a
//! [`BuildWarning::PersistenceWriteFailure`] and skipped so the rest of the
//! batch still lands.

use serde::Serialize;

use crate::error::BuildWarning;
use crate::graph::{Graph, Layer, NodeKey};
use crate::records::{EntityKind, RecordStore};

/// The order and layer computed for one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderAssignment {
    /// The node the record backs.
    pub key: NodeKey,
    /// Position in the migration order.
    pub topological_order: i64,
    /// Layer of the node.
    pub layer: Option<Layer>,
}

/// Outcome of one persistence pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PersistReport {
    /// Every assignment, in order. Identical for dry and real runs.
    pub assignments: Vec<OrderAssignment>,
    /// Number of records actually updated.
    pub written: usize,
    /// Failed writes.
    pub skipped: Vec<BuildWarning>,
    /// True when no writes were issued.
    pub dry_run: bool,
    /// Set when the final flush failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub save_error: Option<String>,
}

/// Writes an ordered graph back to a record store.
pub struct OrderPersister<'a> {
    store: &'a dyn RecordStore,
}

impl<'a> OrderPersister<'a> {
    /// Create a persister over `store`.
    #[must_use]
    pub fn new(store: &'a dyn RecordStore) -> Self {
        Self { store }
    }

    /// The assignments for every ordered, non-external node, sorted by order.
    #[must_use]
    pub fn plan(graph: &Graph) -> Vec<OrderAssignment> {
        let mut assignments: Vec<OrderAssignment> = graph
            .nodes()
            .filter(|node| !node.is_external && node.is_ordered())
            .map(|node| OrderAssignment {
                key: node.key.clone(),
                topological_order: node.topological_order,
                layer: node.layer,
            })
            .collect();
        assignments.sort_by(|a, b| {
            a.topological_order
                .cmp(&b.topological_order)
                .then_with(|| a.key.cmp(&b.key))
        });
        assignments
    }

    /// Persist the orders of `graph` for `project`.
    ///
    /// In dry-run mode the same assignments are computed and returned but no
    /// store method is called.
    pub async fn persist(&self, project: &str, graph: &Graph, dry_run: bool) -> PersistReport {
        let assignments = Self::plan(graph);

        if dry_run {
            tracing::debug!(
                project,
                assignments = assignments.len(),
                "Dry run: skipping record writes"
            );
            return PersistReport {
                assignments,
                dry_run: true,
                ..PersistReport::default()
            };
        }

        let mut written = 0;
        let mut skipped = Vec::new();

        for assignment in &assignments {
            let Some(kind) = EntityKind::from_node_type(assignment.key.node_type) else {
                continue;
            };

            match self
                .store
                .write_order(
                    project,
                    kind,
                    &assignment.key.name,
                    assignment.topological_order,
                    assignment.layer,
                )
                .await
            {
                Ok(()) => written += 1,
                Err(e) => {
                    tracing::warn!(
                        project,
                        node = %assignment.key,
                        error = %e,
                        "Failed to persist order, skipping"
                    );
                    skipped.push(BuildWarning::PersistenceWriteFailure {
                        key: assignment.key.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        let save_error = match self.store.save().await {
            Ok(()) => None,
            Err(e) => {
                tracing::warn!(project, error = %e, "Failed to save record store");
                Some(e.to_string())
            }
        };

        tracing::debug!(
            project,
            written,
            skipped = skipped.len(),
            "Persisted topological order"
        );

        PersistReport {
            assignments,
            written,
            skipped,
            dry_run: false,
            save_error,
        }
    }
}
