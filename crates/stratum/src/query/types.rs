//! Result types for graph queries.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::graph::{NodeKey, NodeType};

/// Prefixes excluded from dead-code results unless overridden.
pub const DEFAULT_ENTRY_POINT_PREFIXES: [&str; 6] = ["API", "Main", "On", "Handle", "Event", "Test"];

/// Why the graph store could not answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnavailableReason {
    /// Connection or database failure.
    Unreachable(String),
    /// The call exceeded its deadline.
    Timeout(Duration),
}

impl std::fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unreachable(reason) => write!(f, "graph store unreachable: {reason}"),
            Self::Timeout(after) => write!(f, "graph store timed out after {after:?}"),
        }
    }
}

/// Result of a graph query.
///
/// Store failures are a variant, not an error, so every caller handles them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryOutcome<T> {
    /// The store answered.
    Available(T),
    /// Both endpoints exist (or not) but no path connects them. Only
    /// returned by path queries.
    NoPath,
    /// The store could not be reached or timed out.
    Unavailable(UnavailableReason),
}

impl<T> QueryOutcome<T> {
    /// The answer, if the store gave one.
    pub fn available(self) -> Option<T> {
        match self {
            Self::Available(value) => Some(value),
            Self::NoPath | Self::Unavailable(_) => None,
        }
    }

    /// True when the store could not answer.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }

    /// True for a path query that found nothing.
    pub fn is_no_path(&self) -> bool {
        matches!(self, Self::NoPath)
    }

    /// Transform the answer, keeping other variants.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> QueryOutcome<U> {
        match self {
            Self::Available(value) => QueryOutcome::Available(f(value)),
            Self::NoPath => QueryOutcome::NoPath,
            Self::Unavailable(reason) => QueryOutcome::Unavailable(reason),
        }
    }
}

/// `Available(v)` serializes as `v`; the other variants as flag objects:
/// `{"no_path": true}` and `{"unavailable": true, "reason": "..."}`.
impl<T: Serialize> Serialize for QueryOutcome<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Available(value) => value.serialize(serializer),
            Self::NoPath => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("no_path", &true)?;
                map.end()
            }
            Self::Unavailable(reason) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("unavailable", &true)?;
                map.serialize_entry("reason", &reason.to_string())?;
                map.end()
            }
        }
    }
}

/// Blast radius of a change to one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImpactResult {
    /// The node analysed.
    pub target: NodeKey,
    /// False when the graph store has no such node.
    pub known: bool,
    /// The depth bound actually applied.
    pub max_depth: u32,
    /// Dependents keyed by their minimum distance.
    pub affected_by_depth: BTreeMap<u32, Vec<NodeKey>>,
    /// Dependents keyed by node type.
    pub affected_by_type: BTreeMap<NodeType, Vec<NodeKey>>,
    /// Number of distinct dependents.
    pub total_affected: usize,
}

/// Shortest connections between two nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathResult {
    /// Start node.
    pub source: NodeKey,
    /// End node.
    pub target: NodeKey,
    /// Edges per path.
    pub hops: usize,
    /// Every shortest path found, sorted, up to the configured cap.
    pub paths: Vec<Vec<NodeKey>>,
}

/// A highly connected node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HubInfo {
    /// The node.
    pub key: NodeKey,
    /// Incoming edge count.
    pub incoming: usize,
    /// Outgoing edge count.
    pub outgoing: usize,
    /// `incoming + outgoing`.
    pub total: usize,
}

/// Procedures and classes nothing depends on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeadCodeResult {
    /// Unreferenced procedures.
    pub procedures: Vec<NodeKey>,
    /// Unreferenced classes.
    pub classes: Vec<NodeKey>,
    /// The entry-point prefixes that were excluded.
    pub excluded_prefixes: Vec<String>,
}

/// Limits applied by the query engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryConfig {
    /// Deadline for each store call.
    pub timeout: Duration,
    /// Upper bound for impact depth.
    pub max_depth: u32,
    /// Upper bound for path length.
    pub max_hops: u32,
    /// Maximum number of shortest paths returned.
    pub max_paths: usize,
    /// Upper bound for live cycle length.
    pub max_cycle_length: usize,
    /// Default dead-code exclusions.
    pub entry_point_prefixes: Vec<String>,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            max_depth: 10,
            max_hops: 10,
            max_paths: 10,
            max_cycle_length: 10,
            entry_point_prefixes: DEFAULT_ENTRY_POINT_PREFIXES
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn available_serializes_as_inner_value() {
        let outcome = QueryOutcome::Available(vec![1, 2]);
        assert_eq!(serde_json::to_value(&outcome).unwrap(), json!([1, 2]));
    }

    #[test]
    fn no_path_and_unavailable_serialize_as_flags() {
        let no_path: QueryOutcome<()> = QueryOutcome::NoPath;
        let unavailable: QueryOutcome<()> =
            QueryOutcome::Unavailable(UnavailableReason::Unreachable("down".into()));

        assert_eq!(serde_json::to_value(&no_path).unwrap(), json!({"no_path": true}));
        let value = serde_json::to_value(&unavailable).unwrap();
        assert_eq!(value["unavailable"], json!(true));
        assert!(value["reason"].as_str().unwrap().contains("down"));
    }

    #[test]
    fn map_keeps_degraded_variants() {
        let unavailable: QueryOutcome<u32> =
            QueryOutcome::Unavailable(UnavailableReason::Timeout(Duration::from_secs(1)));
        assert!(unavailable.map(|v| v + 1).is_unavailable());

        let no_path: QueryOutcome<u32> = QueryOutcome::NoPath;
        assert!(no_path.map(|v| v + 1).is_no_path());

        assert_eq!(QueryOutcome::Available(1).map(|v| v + 1).available(), Some(2));
    }
}
