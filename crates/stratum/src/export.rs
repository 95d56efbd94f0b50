//! Graph export for inspection with external tools.
//!
//! Two formats: Graphviz DOT for rendering, and a JSON description for
//! scripting. Both list nodes and edges in key order, so exporting the same
//! graph twice yields identical text.

use std::fmt::Write as _;

use serde::Serialize;

use crate::graph::{EdgeKind, Graph, Layer, Node, NodeKey, NodeType};

/// Render `graph` as a Graphviz `digraph`.
///
/// Node labels carry the key, layer and order; edge labels carry the kind.
#[must_use]
pub fn to_dot(graph: &Graph) -> String {
    let mut out = String::from("digraph stratum {\n");
    out.push_str("  rankdir=BT;\n");
    out.push_str("  node [fontname=\"Helvetica\", fontsize=10];\n");
    out.push_str("  edge [fontname=\"Helvetica\", fontsize=8];\n\n");

    for key in graph.sorted_keys() {
        let Some(node) = graph.node(key) else {
            continue;
        };
        let _ = writeln!(
            out,
            "  \"{}\" [label=\"{}\", shape={}{}];",
            escape(&key.to_string()),
            node_label(node),
            shape(key.node_type),
            if node.is_external { ", style=dashed" } else { "" },
        );
    }

    let edges = graph.edges();
    if !edges.is_empty() {
        out.push('\n');
    }
    for (source, target, kind) in edges {
        let _ = writeln!(
            out,
            "  \"{}\" -> \"{}\" [label=\"{kind}\"];",
            escape(&source.to_string()),
            escape(&target.to_string()),
        );
    }

    out.push_str("}\n");
    out
}

/// Escaped label text; `\n` is a DOT line break.
fn node_label(node: &Node) -> String {
    let key = escape(&node.key.to_string());
    let layer = node.layer.map_or("EXTERNAL", Layer::as_str);
    if node.is_ordered() {
        format!("{key}\\n{layer} #{}", node.topological_order)
    } else {
        format!("{key}\\n{layer}")
    }
}

fn shape(node_type: NodeType) -> &'static str {
    match node_type {
        NodeType::Table => "cylinder",
        NodeType::Class => "box",
        NodeType::Procedure => "ellipse",
        NodeType::Page => "note",
        NodeType::External => "plaintext",
    }
}

/// Escape a quoted DOT ID. Backslashes go first so escaped quotes stay intact.
fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Serializable snapshot of a graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphDescription {
    /// Nodes in key order.
    pub nodes: Vec<Node>,
    /// Edges in `(source, target, kind)` order.
    pub edges: Vec<EdgeDescription>,
}

/// One edge of a [`GraphDescription`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EdgeDescription {
    /// The dependent.
    pub source: NodeKey,
    /// The dependency.
    pub target: NodeKey,
    /// Relationship type.
    pub kind: EdgeKind,
}

impl GraphDescription {
    /// Snapshot `graph`.
    #[must_use]
    pub fn of(graph: &Graph) -> Self {
        let nodes = graph
            .sorted_keys()
            .into_iter()
            .filter_map(|key| graph.node(key).cloned())
            .collect();
        let edges = graph
            .edges()
            .into_iter()
            .map(|(source, target, kind)| EdgeDescription {
                source: source.clone(),
                target: target.clone(),
                kind,
            })
            .collect();
        Self { nodes, edges }
    }
}

/// Render `graph` as pretty-printed JSON.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn to_json(graph: &Graph) -> crate::Result<String> {
    Ok(serde_json::to_string_pretty(&GraphDescription::of(graph))?)
}
