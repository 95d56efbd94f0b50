//! Ephemeral record store held entirely in memory.
//!
//! Counts every write and save so callers can assert on side effects, and
//! can be told to fail writes for specific records.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{EntityKind, EntityRecord, RecordStore};
use crate::error::{Error, Result};
use crate::graph::Layer;

#[derive(Debug, Default)]
struct Inner {
    projects: HashMap<String, Vec<EntityRecord>>,
    failing_writes: HashSet<(EntityKind, String)>,
    write_count: usize,
    save_count: usize,
}

/// Thread-safe in-memory record store.
///
/// Cloning is cheap and clones share state.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRecordStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryRecordStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding one project.
    #[must_use]
    pub fn with_project(project: impl Into<String>, records: Vec<EntityRecord>) -> Self {
        let mut inner = Inner::default();
        inner.projects.insert(project.into(), records);
        Self {
            inner: Arc::new(RwLock::new(inner)),
        }
    }

    /// Add or replace a project's records.
    pub async fn insert_project(&self, project: impl Into<String>, records: Vec<EntityRecord>) {
        self.inner
            .write()
            .await
            .projects
            .insert(project.into(), records);
    }

    /// Make every write to the named record fail.
    pub async fn fail_writes_for(&self, kind: EntityKind, name: impl Into<String>) {
        self.inner
            .write()
            .await
            .failing_writes
            .insert((kind, name.into()));
    }

    /// Number of successful `write_order` calls so far.
    pub async fn write_count(&self) -> usize {
        self.inner.read().await.write_count
    }

    /// Number of `save` calls so far.
    pub async fn save_count(&self) -> usize {
        self.inner.read().await.save_count
    }

    /// Snapshot of a project's records.
    pub async fn records(&self, project: &str) -> Option<Vec<EntityRecord>> {
        self.inner.read().await.projects.get(project).cloned()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn list_records(&self, project: &str, kind: EntityKind) -> Result<Vec<EntityRecord>> {
        let inner = self.inner.read().await;
        let records = inner
            .projects
            .get(project)
            .ok_or_else(|| Error::ProjectNotFound(project.to_string()))?;
        Ok(records.iter().filter(|r| r.kind == kind).cloned().collect())
    }

    async fn write_order(
        &self,
        project: &str,
        kind: EntityKind,
        name: &str,
        topological_order: i64,
        layer: Option<Layer>,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;

        if inner.failing_writes.contains(&(kind, name.to_string())) {
            return Err(Error::RecordStore(format!(
                "write rejected for {kind}:{name}"
            )));
        }

        let records = inner
            .projects
            .get_mut(project)
            .ok_or_else(|| Error::ProjectNotFound(project.to_string()))?;

        let mut found = false;
        for record in records
            .iter_mut()
            .filter(|r| r.kind == kind && r.name.trim() == name)
        {
            record.topological_order = Some(topological_order);
            record.layer = layer;
            found = true;
        }

        if !found {
            return Err(Error::RecordStore(format!("no record {kind}:{name}")));
        }

        inner.write_count += 1;
        Ok(())
    }

    async fn save(&self) -> Result<()> {
        self.inner.write().await.save_count += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> InMemoryRecordStore {
        InMemoryRecordStore::with_project(
            "demo",
            vec![
                EntityRecord::new(EntityKind::Table, "USUARIO"),
                EntityRecord::new(EntityKind::Procedure, "DoWork").uses_table("USUARIO"),
            ],
        )
    }

    #[tokio::test]
    async fn list_records_filters_by_kind() {
        let store = store();

        let tables = store
            .list_records("demo", EntityKind::Table)
            .await
            .unwrap();
        let pages = store.list_records("demo", EntityKind::Page).await.unwrap();

        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].name, "USUARIO");
        assert!(pages.is_empty());
    }

    #[tokio::test]
    async fn unknown_project_is_an_error() {
        let result = store().list_records("other", EntityKind::Table).await;
        assert!(matches!(result, Err(Error::ProjectNotFound(p)) if p == "other"));
    }

    #[tokio::test]
    async fn write_order_updates_record_and_counts() {
        let store = store();

        store
            .write_order("demo", EntityKind::Table, "USUARIO", 0, Some(Layer::Schema))
            .await
            .unwrap();

        let records = store.records("demo").await.unwrap();
        let table = records.iter().find(|r| r.name == "USUARIO").unwrap();
        assert_eq!(table.topological_order, Some(0));
        assert_eq!(table.layer, Some(Layer::Schema));
        assert_eq!(store.write_count().await, 1);
    }

    #[tokio::test]
    async fn writes_to_missing_or_failing_records_are_errors() {
        let store = store();
        store.fail_writes_for(EntityKind::Procedure, "DoWork").await;

        let missing = store
            .write_order("demo", EntityKind::Class, "Nope", 0, None)
            .await;
        let failing = store
            .write_order("demo", EntityKind::Procedure, "DoWork", 1, None)
            .await;

        assert!(matches!(missing, Err(Error::RecordStore(_))));
        assert!(matches!(failing, Err(Error::RecordStore(_))));
        assert_eq!(store.write_count().await, 0);
    }
}
