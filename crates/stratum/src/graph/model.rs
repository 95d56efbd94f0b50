//! In-memory directed multigraph of typed nodes and edges.
//!
//! # Edge Direction
//!
//! Edges point from **dependent -> dependency**: `Procedure:DoWork ->
//! Table:USUARIO` means `DoWork` uses the table, so the table must be migrated
//! first. Incoming edges therefore answer "who depends on me?".

use std::collections::{BTreeSet, HashMap};

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use sha2::{Digest, Sha256};

use super::types::{EdgeKind, Layer, Node, NodeKey};

/// Outcome of [`Graph::add_edge`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeInsert {
    /// A new edge was created.
    Added,
    /// An edge of the same kind already connects the pair.
    Duplicate,
    /// Source and target are the same node; self-edges are never stored.
    SelfLoop,
    /// One of the endpoints is not a node of this graph.
    MissingEndpoint,
}

/// The dependency graph for one build.
///
/// Built once per run by the [`GraphBuilder`](super::GraphBuilder) and passed
/// by value through cycle detection, ordering and persistence.
///
/// Invariants:
/// - every edge endpoint is a node
/// - no self-edges
/// - at most one edge per `(source, target, kind)`
#[derive(Debug, Clone, Default)]
pub struct Graph {
    /// Nodes carry [`Node`] values, edges carry their [`EdgeKind`].
    graph: DiGraph<Node, EdgeKind>,

    /// Composite key to petgraph index. Every node has an entry.
    node_map: HashMap<NodeKey, NodeIndex>,
}

impl Graph {
    /// Create an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node for `key`, returning whether it was new.
    ///
    /// Adding an existing key is a no-op.
    pub fn add_node(&mut self, key: NodeKey) -> bool {
        if self.node_map.contains_key(&key) {
            return false;
        }
        let index = self.graph.add_node(Node::new(key.clone()));
        self.node_map.insert(key, index);
        true
    }

    /// Add a typed edge `from -> to` (from depends on to).
    pub fn add_edge(&mut self, from: &NodeKey, to: &NodeKey, kind: EdgeKind) -> EdgeInsert {
        let (Some(&source), Some(&target)) = (self.node_map.get(from), self.node_map.get(to))
        else {
            return EdgeInsert::MissingEndpoint;
        };

        if source == target {
            return EdgeInsert::SelfLoop;
        }

        if self
            .graph
            .edges_connecting(source, target)
            .any(|edge| *edge.weight() == kind)
        {
            return EdgeInsert::Duplicate;
        }

        self.graph.add_edge(source, target, kind);
        EdgeInsert::Added
    }

    /// Number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of edges (parallel edges of different kinds count separately).
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Whether a node with this key exists.
    #[must_use]
    pub fn contains(&self, key: &NodeKey) -> bool {
        self.node_map.contains_key(key)
    }

    /// Look up a node.
    #[must_use]
    pub fn node(&self, key: &NodeKey) -> Option<&Node> {
        self.node_map.get(key).map(|&index| &self.graph[index])
    }

    /// All nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.graph.node_weights()
    }

    /// All node keys, sorted.
    #[must_use]
    pub fn sorted_keys(&self) -> Vec<&NodeKey> {
        let mut keys: Vec<&NodeKey> = self.node_map.keys().collect();
        keys.sort();
        keys
    }

    /// All edges as `(source, target, kind)`, sorted.
    #[must_use]
    pub fn edges(&self) -> Vec<(&NodeKey, &NodeKey, EdgeKind)> {
        let mut edges: Vec<_> = self
            .graph
            .edge_references()
            .map(|edge| {
                (
                    &self.graph[edge.source()].key,
                    &self.graph[edge.target()].key,
                    *edge.weight(),
                )
            })
            .collect();
        edges.sort();
        edges
    }

    /// Distinct dependencies of `key` (outgoing neighbors), sorted.
    #[must_use]
    pub fn successors(&self, key: &NodeKey) -> Vec<&NodeKey> {
        self.neighbors(key, Direction::Outgoing)
    }

    /// Distinct dependents of `key` (incoming neighbors), sorted.
    #[must_use]
    pub fn predecessors(&self, key: &NodeKey) -> Vec<&NodeKey> {
        self.neighbors(key, Direction::Incoming)
    }

    fn neighbors(&self, key: &NodeKey, direction: Direction) -> Vec<&NodeKey> {
        let Some(&index) = self.node_map.get(key) else {
            return Vec::new();
        };
        let distinct: BTreeSet<&NodeKey> = self
            .graph
            .neighbors_directed(index, direction)
            .map(|neighbor| &self.graph[neighbor].key)
            .collect();
        distinct.into_iter().collect()
    }

    /// Number of incoming edges over the whole graph, all kinds counted.
    #[must_use]
    pub fn in_degree(&self, key: &NodeKey) -> usize {
        self.degree(key, Direction::Incoming)
    }

    /// Number of outgoing edges, all kinds counted.
    #[must_use]
    pub fn out_degree(&self, key: &NodeKey) -> usize {
        self.degree(key, Direction::Outgoing)
    }

    fn degree(&self, key: &NodeKey, direction: Direction) -> usize {
        self.node_map.get(key).map_or(0, |&index| {
            self.graph.edges_directed(index, direction).count()
        })
    }

    /// Kinds of the edges running `from -> to`, sorted.
    #[must_use]
    pub fn edge_kinds_between(&self, from: &NodeKey, to: &NodeKey) -> Vec<EdgeKind> {
        let (Some(&source), Some(&target)) = (self.node_map.get(from), self.node_map.get(to))
        else {
            return Vec::new();
        };
        let mut kinds: Vec<EdgeKind> = self
            .graph
            .edges_connecting(source, target)
            .map(|edge| *edge.weight())
            .collect();
        kinds.sort();
        kinds
    }

    /// A new graph whose nodes carry the given orders.
    ///
    /// Nodes without an entry keep their current order. Edges and indices are
    /// preserved; `self` is left untouched.
    #[must_use]
    pub fn with_orders(&self, orders: &HashMap<NodeKey, i64>) -> Self {
        let graph = self.graph.map(
            |_, node| {
                orders
                    .get(&node.key)
                    .map_or_else(|| node.clone(), |&order| node.with_order(order))
            },
            |_, kind| *kind,
        );
        Self {
            graph,
            node_map: self.node_map.clone(),
        }
    }

    /// SHA-256 over nodes (key, layer, order) and edges, hex encoded.
    ///
    /// Independent of insertion order, so two builds of the same records
    /// produce the same fingerprint.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut nodes: Vec<&Node> = self.graph.node_weights().collect();
        nodes.sort_by(|a, b| a.key.cmp(&b.key));

        let mut hasher = Sha256::new();
        for node in nodes {
            let layer = node.layer.map_or("-", Layer::as_str);
            hasher.update(format!("N|{}|{layer}|{}\n", node.key, node.topological_order));
        }
        for (source, target, kind) in self.edges() {
            hasher.update(format!("E|{source}|{target}|{kind}\n"));
        }
        format!("{:x}", hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::types::{NodeType, UNORDERED};

    fn key(node_type: NodeType, name: &str) -> NodeKey {
        NodeKey::new(node_type, name)
    }

    #[test]
    fn add_node_is_idempotent() {
        let mut graph = Graph::new();
        assert!(graph.add_node(key(NodeType::Table, "T")));
        assert!(!graph.add_node(key(NodeType::Table, "T")));
        assert_eq!(graph.node_count(), 1);
    }

    #[test]
    fn same_name_different_type_are_distinct_nodes() {
        let mut graph = Graph::new();
        graph.add_node(key(NodeType::Table, "Customer"));
        graph.add_node(key(NodeType::Class, "Customer"));
        assert_eq!(graph.node_count(), 2);
    }

    #[test]
    fn self_edges_are_rejected() {
        let mut graph = Graph::new();
        let p = key(NodeType::Procedure, "Recurse");
        graph.add_node(p.clone());

        assert_eq!(
            graph.add_edge(&p, &p, EdgeKind::CallsProcedure),
            EdgeInsert::SelfLoop
        );
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn duplicate_edges_of_same_kind_are_deduplicated() {
        let mut graph = Graph::new();
        let a = key(NodeType::Class, "A");
        let b = key(NodeType::Class, "B");
        graph.add_node(a.clone());
        graph.add_node(b.clone());

        assert_eq!(graph.add_edge(&a, &b, EdgeKind::Inherits), EdgeInsert::Added);
        assert_eq!(
            graph.add_edge(&a, &b, EdgeKind::Inherits),
            EdgeInsert::Duplicate
        );
        assert_eq!(graph.add_edge(&a, &b, EdgeKind::UsesClass), EdgeInsert::Added);

        assert_eq!(graph.edge_count(), 2);
        assert_eq!(
            graph.edge_kinds_between(&a, &b),
            vec![EdgeKind::Inherits, EdgeKind::UsesClass]
        );
        // Parallel edges collapse in neighbor lists but count in degrees
        assert_eq!(graph.successors(&a), vec![&b]);
        assert_eq!(graph.in_degree(&b), 2);
    }

    #[test]
    fn edges_to_unknown_nodes_are_refused() {
        let mut graph = Graph::new();
        let a = key(NodeType::Procedure, "A");
        graph.add_node(a.clone());

        let result = graph.add_edge(&a, &key(NodeType::Table, "Missing"), EdgeKind::UsesTable);
        assert_eq!(result, EdgeInsert::MissingEndpoint);
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn predecessors_and_successors_follow_edge_direction() {
        let mut graph = Graph::new();
        let proc_key = key(NodeType::Procedure, "DoWork");
        let table = key(NodeType::Table, "USUARIO");
        graph.add_node(proc_key.clone());
        graph.add_node(table.clone());
        graph.add_edge(&proc_key, &table, EdgeKind::UsesTable);

        assert_eq!(graph.successors(&proc_key), vec![&table]);
        assert_eq!(graph.predecessors(&table), vec![&proc_key]);
        assert_eq!(graph.out_degree(&proc_key), 1);
        assert_eq!(graph.in_degree(&proc_key), 0);
    }

    #[test]
    fn with_orders_returns_new_graph_and_leaves_original() {
        let mut graph = Graph::new();
        let a = key(NodeType::Class, "A");
        graph.add_node(a.clone());

        let orders = HashMap::from([(a.clone(), 0)]);
        let ordered = graph.with_orders(&orders);

        assert_eq!(ordered.node(&a).map(|n| n.topological_order), Some(0));
        assert_eq!(graph.node(&a).map(|n| n.topological_order), Some(UNORDERED));
    }

    #[test]
    fn fingerprint_ignores_insertion_order() {
        let a = key(NodeType::Class, "A");
        let b = key(NodeType::Class, "B");

        let mut first = Graph::new();
        first.add_node(a.clone());
        first.add_node(b.clone());
        first.add_edge(&a, &b, EdgeKind::Inherits);

        let mut second = Graph::new();
        second.add_node(b.clone());
        second.add_node(a.clone());
        second.add_edge(&a, &b, EdgeKind::Inherits);

        assert_eq!(first.fingerprint(), second.fingerprint());

        second.add_edge(&a, &b, EdgeKind::UsesClass);
        assert_ne!(first.fingerprint(), second.fingerprint());
    }
}
