//! Entity record access.
//!
//! Entity records are the already-extracted tables, classes, procedures and
//! pages of a project. Stratum reads their declared relations to build the
//! graph and writes the computed order and layer back onto them.
//!
//! Two backends are provided:
//!
//! - **In-memory**: ephemeral, used by tests and embedding callers
//! - **JSONL**: one `<project>.jsonl` file per project in a data directory
//!
//! # Architecture
//!
//! The [`RecordStore`] trait is async and object-safe so the pipeline can hold
//! an `Arc<dyn RecordStore>` regardless of backend. All methods take `&self`;
//! backends synchronize internally.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::graph::{EdgeKind, Layer, NodeKey, NodeType};

mod in_memory;
mod jsonl;

pub use in_memory::InMemoryRecordStore;
pub use jsonl::{JsonlRecordStore, LoadWarning};

/// The four kinds of entity record a project holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Database table.
    Table,
    /// Class or type definition.
    Class,
    /// Stored procedure or function.
    Procedure,
    /// UI page or form.
    Page,
}

impl EntityKind {
    /// All record kinds.
    pub const ALL: [Self; 4] = [Self::Table, Self::Class, Self::Procedure, Self::Page];

    /// The graph node type for records of this kind.
    #[must_use]
    pub fn node_type(self) -> NodeType {
        match self {
            Self::Table => NodeType::Table,
            Self::Class => NodeType::Class,
            Self::Procedure => NodeType::Procedure,
            Self::Page => NodeType::Page,
        }
    }

    /// The record kind backing a node type, `None` for external nodes.
    #[must_use]
    pub fn from_node_type(node_type: NodeType) -> Option<Self> {
        match node_type {
            NodeType::Table => Some(Self::Table),
            NodeType::Class => Some(Self::Class),
            NodeType::Procedure => Some(Self::Procedure),
            NodeType::Page => Some(Self::Page),
            NodeType::External => None,
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.node_type().as_str())
    }
}

/// One extracted entity and its declared relations.
///
/// Relation targets are plain names, resolved by name equality within the
/// project when the graph is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRecord {
    /// Record kind.
    pub kind: EntityKind,

    /// Name, unique within the kind.
    pub name: String,

    /// Base class name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_class: Option<String>,

    /// Referenced table names.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub uses_tables: Vec<String>,

    /// Called procedure names.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub calls_procedures: Vec<String>,

    /// Composed class names.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub uses_classes: Vec<String>,

    /// Migration order written back by the persister.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topological_order: Option<i64>,

    /// Layer written back by the persister.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layer: Option<Layer>,
}

impl EntityRecord {
    /// A record with no relations.
    #[must_use]
    pub fn new(kind: EntityKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            parent_class: None,
            uses_tables: Vec::new(),
            calls_procedures: Vec::new(),
            uses_classes: Vec::new(),
            topological_order: None,
            layer: None,
        }
    }

    /// Set the base class.
    #[must_use]
    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent_class = Some(parent.into());
        self
    }

    /// Add a referenced table.
    #[must_use]
    pub fn uses_table(mut self, table: impl Into<String>) -> Self {
        self.uses_tables.push(table.into());
        self
    }

    /// Add a called procedure.
    #[must_use]
    pub fn calls(mut self, procedure: impl Into<String>) -> Self {
        self.calls_procedures.push(procedure.into());
        self
    }

    /// Add a composed class.
    #[must_use]
    pub fn uses_class(mut self, class: impl Into<String>) -> Self {
        self.uses_classes.push(class.into());
        self
    }

    /// The graph key for this record.
    #[must_use]
    pub fn key(&self) -> NodeKey {
        NodeKey::new(self.kind.node_type(), self.name.clone())
    }

    /// Every declared relation as `(edge kind, target name)`, in declaration
    /// order: parent first, then tables, procedures and classes.
    pub fn relations(&self) -> impl Iterator<Item = (EdgeKind, &str)> {
        let parent = self
            .parent_class
            .iter()
            .map(|name| (EdgeKind::Inherits, name.as_str()));
        let tables = self
            .uses_tables
            .iter()
            .map(|name| (EdgeKind::UsesTable, name.as_str()));
        let procedures = self
            .calls_procedures
            .iter()
            .map(|name| (EdgeKind::CallsProcedure, name.as_str()));
        let classes = self
            .uses_classes
            .iter()
            .map(|name| (EdgeKind::UsesClass, name.as_str()));
        parent.chain(tables).chain(procedures).chain(classes)
    }
}

/// Access to a project's entity records.
///
/// Implementations must be `Send + Sync`; the builder reads the four kinds
/// concurrently.
///
/// # Errors
///
/// All methods return `Result<T>`:
/// - `ProjectNotFound`: the project has no records at all
/// - `RecordStore`: the record to update does not exist, or the backend failed
/// - `Io` / `Json`: file-backed stores could not read or write their files
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// All records of one kind for a project.
    async fn list_records(&self, project: &str, kind: EntityKind) -> Result<Vec<EntityRecord>>;

    /// Write the computed order and layer onto one record.
    async fn write_order(
        &self,
        project: &str,
        kind: EntityKind,
        name: &str,
        topological_order: i64,
        layer: Option<Layer>,
    ) -> Result<()>;

    /// Flush pending writes to durable storage.
    ///
    /// No-op for ephemeral backends.
    async fn save(&self) -> Result<()>;

    /// Entries of a project the backend could not read and skipped.
    ///
    /// Backends that never skip input return nothing.
    async fn load_warnings(&self, _project: &str) -> Vec<LoadWarning> {
        Vec::new()
    }
}
