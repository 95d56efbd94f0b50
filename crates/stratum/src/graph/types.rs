//! Node and edge value types for the dependency graph.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Sentinel order for nodes that have not been ordered yet.
pub const UNORDERED: i64 = -1;

/// The kind of entity a node stands for.
///
/// `External` marks names that could not be resolved inside the project,
/// such as framework base classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeType {
    /// A database table.
    Table,
    /// A class or other type definition.
    Class,
    /// A stored procedure or free function.
    Procedure,
    /// A UI page or form.
    Page,
    /// An unresolved reference target.
    External,
}

impl NodeType {
    /// All node types in key order.
    pub const ALL: [Self; 5] = [
        Self::Table,
        Self::Class,
        Self::Procedure,
        Self::Page,
        Self::External,
    ];

    /// The type's name as used in node keys (`Table`, `Class`, ...).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Table => "Table",
            Self::Class => "Class",
            Self::Procedure => "Procedure",
            Self::Page => "Page",
            Self::External => "External",
        }
    }

    /// The architectural layer nodes of this type belong to.
    ///
    /// External nodes are unassigned.
    #[must_use]
    pub fn layer(self) -> Option<Layer> {
        match self {
            Self::Table => Some(Layer::Schema),
            Self::Class => Some(Layer::Domain),
            Self::Procedure => Some(Layer::Business),
            Self::Page => Some(Layer::Ui),
            Self::External => None,
        }
    }

    /// Parse a type name, ignoring ASCII case.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| Error::InvalidNodeKey {
            input: s.to_string(),
            reason: "unknown node type (expected Table, Class, Procedure, Page or External)",
        })
    }
}

/// Coarse architectural tier, the primary sort key for migration order.
///
/// Declaration order is precedence order: `Schema < Domain < Business < Ui`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Layer {
    /// Tables.
    Schema,
    /// Classes.
    Domain,
    /// Procedures.
    Business,
    /// Pages.
    Ui,
}

impl Layer {
    /// Layers in precedence order.
    pub const ORDERED: [Self; 4] = [Self::Schema, Self::Domain, Self::Business, Self::Ui];

    /// Upper-case layer name as stored on records.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Schema => "SCHEMA",
            Self::Domain => "DOMAIN",
            Self::Business => "BUSINESS",
            Self::Ui => "UI",
        }
    }

    /// Parse a layer name, ignoring ASCII case.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Self::ORDERED
            .into_iter()
            .find(|l| l.as_str().eq_ignore_ascii_case(s.trim()))
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed, directed relationship. The source depends on the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeKind {
    /// Class extends class.
    Inherits,
    /// Procedure or class reads/writes a table.
    UsesTable,
    /// Procedure calls procedure.
    CallsProcedure,
    /// Class composes class.
    UsesClass,
}

impl EdgeKind {
    /// All edge kinds.
    pub const ALL: [Self; 4] = [
        Self::Inherits,
        Self::UsesTable,
        Self::CallsProcedure,
        Self::UsesClass,
    ];

    /// Relationship name as stored in the graph store.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Inherits => "INHERITS",
            Self::UsesTable => "USES_TABLE",
            Self::CallsProcedure => "CALLS_PROCEDURE",
            Self::UsesClass => "USES_CLASS",
        }
    }

    /// Parse a relationship name, ignoring ASCII case.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s.trim()))
    }

    /// The node type a relation of this kind is expected to point at.
    #[must_use]
    pub fn target_type(self) -> NodeType {
        match self {
            Self::Inherits | Self::UsesClass => NodeType::Class,
            Self::UsesTable => NodeType::Table,
            Self::CallsProcedure => NodeType::Procedure,
        }
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Composite node identity: `(type, name)`.
///
/// The textual form is `Type:Name`, e.g. `Table:USUARIO`. Keys order by type
/// first, then name; every deterministic tie-break in the engine uses this
/// ordering.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct NodeKey {
    /// The entity kind.
    pub node_type: NodeType,
    /// The entity name, unique within its type.
    pub name: String,
}

impl NodeKey {
    /// Create a key from its parts.
    #[must_use]
    pub fn new(node_type: NodeType, name: impl Into<String>) -> Self {
        Self {
            node_type,
            name: name.into(),
        }
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.node_type, self.name)
    }
}

impl FromStr for NodeKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((type_part, name)) = s.split_once(':') else {
            return Err(Error::InvalidNodeKey {
                input: s.to_string(),
                reason: "expected Type:Name",
            });
        };

        let node_type = NodeType::parse(type_part).ok_or_else(|| Error::InvalidNodeKey {
            input: s.to_string(),
            reason: "unknown node type (expected Table, Class, Procedure, Page or External)",
        })?;

        if name.trim().is_empty() {
            return Err(Error::InvalidNodeKey {
                input: s.to_string(),
                reason: "name must not be empty",
            });
        }

        Ok(Self::new(node_type, name))
    }
}

impl From<NodeKey> for String {
    fn from(key: NodeKey) -> Self {
        key.to_string()
    }
}

impl TryFrom<String> for NodeKey {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A graph node.
///
/// Nodes are values: ordering a graph produces new nodes rather than
/// updating these in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Node {
    /// Composite identity.
    pub key: NodeKey,
    /// Layer derived from the node type.
    pub layer: Option<Layer>,
    /// Position in the migration order, [`UNORDERED`] until computed.
    pub topological_order: i64,
    /// True when the entity could not be resolved locally.
    pub is_external: bool,
}

impl Node {
    /// Create an unordered node whose layer follows from its type.
    #[must_use]
    pub fn new(key: NodeKey) -> Self {
        Self {
            layer: key.node_type.layer(),
            is_external: key.node_type == NodeType::External,
            topological_order: UNORDERED,
            key,
        }
    }

    /// A copy of this node carrying the given order.
    #[must_use]
    pub fn with_order(&self, topological_order: i64) -> Self {
        Self {
            topological_order,
            ..self.clone()
        }
    }

    /// Whether an order has been assigned.
    #[must_use]
    pub fn is_ordered(&self) -> bool {
        self.topological_order != UNORDERED
    }
}
