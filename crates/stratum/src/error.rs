//! Error types for Stratum operations.
//!
//! Errors are split into two groups:
//!
//! - **`Error`**: infrastructure failures that stop an operation (the record
//!   store cannot be read, the configuration is invalid, ...)
//! - **`BuildWarning`**: per-item problems that are collected and reported
//!   alongside the primary result but never abort a run
//!
//! ## Error Philosophy
//!
//! The build pipeline is "best effort":
//! - An unresolved reference becomes an external placeholder node
//! - A residual cycle degrades the order to an approximate one
//! - A failed record write is skipped, the rest of the batch continues
//!
//! Graph-store failures never surface here at all; the query engine turns
//! them into [`QueryOutcome::Unavailable`](crate::query::QueryOutcome).

use serde::Serialize;
use thiserror::Error;

use crate::graph::{EdgeKind, Layer, NodeKey};
use crate::records::{EntityKind, LoadWarning};

/// Result type for Stratum operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for Stratum operations.
#[derive(Debug, Error)]
pub enum Error {
    /// File system operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Record (de)serialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid configuration or arguments
    #[error("configuration error: {0}")]
    Config(String),

    /// The entity record store rejected an operation
    #[error("record store error: {0}")]
    RecordStore(String),

    /// The requested project has no records
    #[error("project not found: {0}")]
    ProjectNotFound(String),

    /// Project names become file names, so they are restricted
    #[error("invalid project name '{0}': use letters, digits, '-', '_' or '.'")]
    InvalidProjectName(String),

    /// A node key could not be parsed from text
    #[error("invalid node key '{input}': {reason}")]
    InvalidNodeKey {
        /// The text that failed to parse.
        input: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// Invariant violation inside Stratum
    #[error("internal error: {0}")]
    Internal(String),
}

/// A non-fatal problem encountered while building, ordering or persisting.
///
/// Warnings are collected in run order and returned with the build report
/// so callers can decide whether to proceed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BuildWarning {
    /// An entry in the record store could not be read and was skipped.
    ///
    /// Relations naming the skipped record resolve to external nodes.
    MalformedRecord {
        /// Project whose records contained the entry.
        project: String,
        /// 1-based line number in the project file.
        line_number: usize,
        /// Parser message.
        error: String,
    },

    /// A record with a blank name was ignored.
    UnnamedRecord {
        /// Kind of the ignored record.
        record_kind: EntityKind,
    },

    /// A relation named an entity that does not exist in the project.
    ///
    /// The target was turned into an external placeholder node.
    UnresolvedReference {
        /// The node declaring the relation.
        from: NodeKey,
        /// The name that could not be resolved.
        target: String,
        /// The relation the name appeared in.
        relation: EdgeKind,
    },

    /// Two records of the same kind share a name; their relations were merged.
    DuplicateRecord {
        /// The merged node.
        key: NodeKey,
    },

    /// A cycle inside one layer bucket forced a dependency to be ignored.
    ///
    /// The order among the cycle's members is approximate.
    ResidualCycle {
        /// The bucket the cycle was found in (`None` for external nodes).
        layer: Option<Layer>,
        /// The node whose dependency was dropped.
        dropped_from: NodeKey,
        /// The dependency that was ignored.
        dropped_to: NodeKey,
    },

    /// Writing order/layer back onto a record failed.
    PersistenceWriteFailure {
        /// The node whose record could not be updated.
        key: NodeKey,
        /// The store's error message.
        reason: String,
    },
}

impl std::fmt::Display for BuildWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedRecord {
                project,
                line_number,
                error,
            } => write!(f, "skipped malformed record at {project}.jsonl:{line_number}: {error}"),
            Self::UnnamedRecord { record_kind } => {
                write!(f, "ignored {record_kind} record with an empty name")
            }
            Self::UnresolvedReference {
                from,
                target,
                relation,
            } => write!(
                f,
                "unresolved reference: {from} {relation} '{target}' (treated as external)"
            ),
            Self::DuplicateRecord { key } => {
                write!(f, "duplicate record {key}: relations merged")
            }
            Self::ResidualCycle {
                layer,
                dropped_from,
                dropped_to,
            } => {
                let layer = layer.map_or("UNASSIGNED", Layer::as_str);
                write!(
                    f,
                    "residual cycle in {layer}: ignored dependency {dropped_from} -> {dropped_to}; order within cycle is approximate"
                )
            }
            Self::PersistenceWriteFailure { key, reason } => {
                write!(f, "failed to persist order for {key}: {reason}")
            }
        }
    }
}

impl BuildWarning {
    /// Short machine-friendly name of the warning category.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MalformedRecord { .. } => "malformed_record",
            Self::UnnamedRecord { .. } => "unnamed_record",
            Self::UnresolvedReference { .. } => "unresolved_reference",
            Self::DuplicateRecord { .. } => "duplicate_record",
            Self::ResidualCycle { .. } => "residual_cycle",
            Self::PersistenceWriteFailure { .. } => "persistence_write_failure",
        }
    }
}

impl From<LoadWarning> for BuildWarning {
    fn from(warning: LoadWarning) -> Self {
        match warning {
            LoadWarning::MalformedJson {
                project,
                line_number,
                error,
            } => Self::MalformedRecord {
                project,
                line_number,
                error,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodeType;

    #[test]
    fn unresolved_reference_display_names_both_ends() {
        let warning = BuildWarning::UnresolvedReference {
            from: NodeKey::new(NodeType::Procedure, "DoWork"),
            target: "Unknown_Helper".to_string(),
            relation: EdgeKind::CallsProcedure,
        };

        let display = warning.to_string();
        assert!(display.contains("Procedure:DoWork"));
        assert!(display.contains("Unknown_Helper"));
        assert!(display.contains("CALLS_PROCEDURE"));
        assert_eq!(warning.kind(), "unresolved_reference");
    }

    #[test]
    fn residual_cycle_display_mentions_approximate_order() {
        let warning = BuildWarning::ResidualCycle {
            layer: Some(Layer::Business),
            dropped_from: NodeKey::new(NodeType::Procedure, "X"),
            dropped_to: NodeKey::new(NodeType::Procedure, "Y"),
        };

        let display = warning.to_string();
        assert!(display.contains("BUSINESS"));
        assert!(display.contains("approximate"));
    }

    #[test]
    fn load_warning_converts_to_malformed_record() {
        let warning = BuildWarning::from(LoadWarning::MalformedJson {
            project: "billing".to_string(),
            line_number: 7,
            error: "expected value".to_string(),
        });

        assert_eq!(warning.kind(), "malformed_record");
        assert!(warning.to_string().contains("billing.jsonl:7"));
    }

    #[test]
    fn warnings_serialize_with_kind_tag() {
        let warning = BuildWarning::DuplicateRecord {
            key: NodeKey::new(NodeType::Table, "USUARIO"),
        };

        let json = serde_json::to_value(&warning).expect("serializable");
        assert_eq!(json["kind"], "duplicate_record");
        assert_eq!(json["key"], "Table:USUARIO");
    }
}
