//! Graph construction from entity records.
//!
//! Building happens in two steps:
//!
//! 1. [`GraphBuilder::load`] reads the four record kinds concurrently
//! 2. [`GraphBuilder::build`] turns the records into a [`Graph`] on a single
//!    owner
//!
//! `build` is pure: the records are sorted by key first, so the same records
//! always produce the same graph regardless of read order.
//!
//! # Resolution
//!
//! A relation's target is resolved by exact name equality against nodes of
//! the type the relation expects (`parent_class` and `uses_classes` against
//! classes, `uses_tables` against tables, `calls_procedures` against
//! procedures). Unresolved names become `External` nodes so that no edge ever
//! dangles.

use std::collections::BTreeMap;

use futures::stream::{self, StreamExt, TryStreamExt};

use super::model::{EdgeInsert, Graph};
use super::types::{NodeKey, NodeType};
use crate::error::{BuildWarning, Result};
use crate::records::{EntityKind, EntityRecord, RecordStore};

/// Default number of record kinds read at once.
pub const DEFAULT_READ_CONCURRENCY: usize = 4;

/// A built graph plus the problems found while building it.
#[derive(Debug, Clone, Default)]
pub struct BuildOutput {
    /// The populated graph. Nodes are unordered.
    pub graph: Graph,
    /// Unresolved references and merged duplicates, in build order.
    pub warnings: Vec<BuildWarning>,
}

/// Builds graphs from entity records.
#[derive(Debug, Clone, Copy)]
pub struct GraphBuilder {
    read_concurrency: usize,
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_READ_CONCURRENCY)
    }
}

impl GraphBuilder {
    /// Create a builder reading at most `read_concurrency` kinds at once.
    ///
    /// A concurrency of 0 is treated as 1.
    #[must_use]
    pub fn new(read_concurrency: usize) -> Self {
        Self {
            read_concurrency: read_concurrency.max(1),
        }
    }

    /// Read every record of a project.
    ///
    /// # Errors
    ///
    /// Returns the first error reported by the store.
    pub async fn load(&self, store: &dyn RecordStore, project: &str) -> Result<Vec<EntityRecord>> {
        let batches: Vec<Vec<EntityRecord>> = stream::iter(EntityKind::ALL)
            .map(|kind| async move {
                let records = store.list_records(project, kind).await?;
                tracing::debug!(project, %kind, count = records.len(), "Read records");
                Ok::<_, crate::error::Error>(records)
            })
            .buffer_unordered(self.read_concurrency)
            .try_collect()
            .await?;

        Ok(batches.into_iter().flatten().collect())
    }

    /// Read a project's records and build its graph.
    ///
    /// Entries the store skipped while reading lead the returned warnings.
    ///
    /// # Errors
    ///
    /// Returns an error only if the records cannot be read.
    pub async fn build_from_store(
        &self,
        store: &dyn RecordStore,
        project: &str,
    ) -> Result<BuildOutput> {
        let records = self.load(store, project).await?;
        let skipped = store.load_warnings(project).await;

        let mut output = self.build(records);
        output
            .warnings
            .splice(0..0, skipped.into_iter().map(BuildWarning::from));
        Ok(output)
    }

    /// Build a graph from records.
    #[must_use]
    pub fn build(&self, records: Vec<EntityRecord>) -> BuildOutput {
        let mut warnings = Vec::new();
        let records = merge_duplicates(records, &mut warnings);

        let mut graph = Graph::new();
        for key in records.keys() {
            graph.add_node(key.clone());
        }

        for (key, record) in &records {
            for (kind, raw_target) in record.relations() {
                let target_name = raw_target.trim();
                if target_name.is_empty() {
                    tracing::debug!(from = %key, relation = %kind, "Skipping empty relation target");
                    continue;
                }

                let local = NodeKey::new(kind.target_type(), target_name);
                if local == *key {
                    tracing::debug!(node = %key, relation = %kind, "Dropping self-reference");
                    continue;
                }

                if graph.contains(&local) {
                    graph.add_edge(key, &local, kind);
                    continue;
                }

                let external = NodeKey::new(NodeType::External, target_name);
                graph.add_node(external.clone());
                if graph.add_edge(key, &external, kind) == EdgeInsert::Added {
                    tracing::warn!(
                        from = %key,
                        target = target_name,
                        relation = %kind,
                        "Unresolved reference, treating as external"
                    );
                    warnings.push(BuildWarning::UnresolvedReference {
                        from: key.clone(),
                        target: target_name.to_string(),
                        relation: kind,
                    });
                }
            }
        }

        tracing::debug!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            warnings = warnings.len(),
            "Built dependency graph"
        );

        BuildOutput { graph, warnings }
    }
}

/// Key records by trimmed name and fold same-key duplicates together.
fn merge_duplicates(
    records: Vec<EntityRecord>,
    warnings: &mut Vec<BuildWarning>,
) -> BTreeMap<NodeKey, EntityRecord> {
    let mut merged: BTreeMap<NodeKey, EntityRecord> = BTreeMap::new();
    let mut duplicates: BTreeMap<NodeKey, usize> = BTreeMap::new();

    for mut record in records {
        let name = record.name.trim();
        if name.is_empty() {
            tracing::warn!(kind = %record.kind, "Ignoring record with an empty name");
            warnings.push(BuildWarning::UnnamedRecord {
                record_kind: record.kind,
            });
            continue;
        }
        if name.len() != record.name.len() {
            record.name = name.to_string();
        }

        let key = record.key();
        match merged.get_mut(&key) {
            None => {
                merged.insert(key, record);
            }
            Some(existing) => {
                // Smallest parent name wins when both declare one
                existing.parent_class = match (existing.parent_class.take(), record.parent_class) {
                    (Some(a), Some(b)) => Some(a.min(b)),
                    (a, b) => a.or(b),
                };
                existing.uses_tables.extend(record.uses_tables);
                existing.calls_procedures.extend(record.calls_procedures);
                existing.uses_classes.extend(record.uses_classes);
                *duplicates.entry(key).or_default() += 1;
            }
        }
    }

    for (key, count) in duplicates {
        tracing::warn!(node = %key, extra = count, "Duplicate record, relations merged");
        warnings.push(BuildWarning::DuplicateRecord { key });
    }

    merged
}
