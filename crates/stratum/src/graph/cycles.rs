//! Cycle detection using three-color depth-first search.
//!
//! # Algorithm
//!
//! Every node starts unvisited (white). Entering a node marks it in-progress
//! (gray) and pushes it on the recursion stack; leaving it marks it done
//! (black). An edge into a gray node is a back edge, and the stack slice from
//! that node to the current one is an elementary cycle.
//!
//! Roots and successors are visited in node-key order, so the same graph
//! always yields the same cycles in the same order.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use super::model::Graph;
use super::types::NodeKey;

/// One elementary cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleInfo {
    /// Cycle members in edge order; the last node depends on the first.
    pub nodes: Vec<NodeKey>,
    /// Member with the smallest in-degree over the whole graph (ties by key).
    pub suggested_break: NodeKey,
}

impl CycleInfo {
    /// Build a cycle record, choosing the break point from `graph` in-degrees.
    ///
    /// Returns `None` for an empty node list.
    #[must_use]
    pub fn new(graph: &Graph, nodes: Vec<NodeKey>) -> Option<Self> {
        let suggested_break = nodes
            .iter()
            .min_by(|a, b| {
                graph
                    .in_degree(a)
                    .cmp(&graph.in_degree(b))
                    .then_with(|| a.cmp(b))
            })?
            .clone();
        Some(Self {
            nodes,
            suggested_break,
        })
    }

    /// Number of nodes in the cycle.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the cycle has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The member that follows `key` in the cycle, wrapping around.
    #[must_use]
    pub fn successor_of(&self, key: &NodeKey) -> Option<&NodeKey> {
        let position = self.nodes.iter().position(|n| n == key)?;
        self.nodes.get((position + 1) % self.nodes.len())
    }
}

/// Result of running the detector over a whole graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    /// True when at least one cycle was found.
    pub has_cycles: bool,
    /// The cycles in discovery order.
    pub cycles: Vec<CycleInfo>,
}

/// Find the elementary cycles reachable by DFS over the whole graph.
#[must_use]
pub fn detect_cycles(graph: &Graph) -> CycleReport {
    let roots = graph.sorted_keys();
    let cycles: Vec<CycleInfo> = find_cycles_with(&roots, |key| graph.successors(key))
        .into_iter()
        .filter_map(|nodes| CycleInfo::new(graph, nodes))
        .collect();

    if !cycles.is_empty() {
        tracing::debug!(count = cycles.len(), "Detected dependency cycles");
    }

    CycleReport {
        has_cycles: !cycles.is_empty(),
        cycles,
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    InProgress,
    Done,
}

struct Frame<'a> {
    node: &'a NodeKey,
    successors: Vec<&'a NodeKey>,
    next: usize,
}

/// Three-color DFS over an arbitrary successor function.
///
/// `roots` are tried in the given order; `successors` must return keys in a
/// deterministic order. Each cycle is returned once, rotated so its smallest
/// key comes first.
pub(crate) fn find_cycles_with<'a, F>(roots: &[&'a NodeKey], successors: F) -> Vec<Vec<NodeKey>>
where
    F: Fn(&NodeKey) -> Vec<&'a NodeKey>,
{
    let mut colors: HashMap<&'a NodeKey, Color> = HashMap::new();
    let mut seen: HashSet<Vec<NodeKey>> = HashSet::new();
    let mut cycles = Vec::new();

    for &root in roots {
        if colors.contains_key(root) {
            continue;
        }

        let mut stack: Vec<&'a NodeKey> = vec![root];
        let mut frames = vec![Frame {
            node: root,
            successors: successors(root),
            next: 0,
        }];
        colors.insert(root, Color::InProgress);

        loop {
            let Some(frame) = frames.last_mut() else {
                break;
            };

            let Some(&next) = frame.successors.get(frame.next) else {
                colors.insert(frame.node, Color::Done);
                frames.pop();
                stack.pop();
                continue;
            };
            frame.next += 1;

            match colors.get(next) {
                None => {
                    colors.insert(next, Color::InProgress);
                    stack.push(next);
                    frames.push(Frame {
                        node: next,
                        successors: successors(next),
                        next: 0,
                    });
                }
                Some(Color::InProgress) => {
                    if let Some(start) = stack.iter().position(|&n| n == next) {
                        let cycle = canonical_rotation(&stack[start..]);
                        if seen.insert(cycle.clone()) {
                            cycles.push(cycle);
                        }
                    }
                }
                Some(Color::Done) => {}
            }
        }
    }

    cycles
}

/// Rotate a cycle so its smallest key is first, preserving edge order.
fn canonical_rotation(cycle: &[&NodeKey]) -> Vec<NodeKey> {
    let start = cycle
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| a.cmp(b))
        .map_or(0, |(index, _)| index);

    cycle[start..]
        .iter()
        .chain(&cycle[..start])
        .map(|&key| key.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::types::{EdgeKind, NodeType};

    fn proc_key(name: &str) -> NodeKey {
        NodeKey::new(NodeType::Procedure, name)
    }

    fn graph_with_calls(calls: &[(&str, &str)]) -> Graph {
        let mut graph = Graph::new();
        for (from, to) in calls {
            graph.add_node(proc_key(from));
            graph.add_node(proc_key(to));
            graph.add_edge(&proc_key(from), &proc_key(to), EdgeKind::CallsProcedure);
        }
        graph
    }

    #[test]
    fn acyclic_graph_has_no_cycles() {
        let graph = graph_with_calls(&[("A", "B"), ("B", "C"), ("A", "C")]);

        let report = detect_cycles(&graph);

        assert!(!report.has_cycles);
        assert!(report.cycles.is_empty());
    }

    #[test]
    fn empty_graph_has_no_cycles() {
        let report = detect_cycles(&Graph::new());
        assert_eq!(report, CycleReport::default());
    }

    #[test]
    fn three_node_cycle_is_reported_once() {
        let graph = graph_with_calls(&[("X", "Y"), ("Y", "Z"), ("Z", "X")]);

        let report = detect_cycles(&graph);

        assert!(report.has_cycles);
        assert_eq!(report.cycles.len(), 1);
        let cycle = &report.cycles[0];
        assert_eq!(cycle.nodes, vec![proc_key("X"), proc_key("Y"), proc_key("Z")]);
        // All in-degrees are 1, so the smallest key wins
        assert_eq!(cycle.suggested_break, proc_key("X"));
    }

    #[test]
    fn suggested_break_prefers_lowest_global_in_degree() {
        // X and Y get extra incoming edges from outside the cycle
        let graph = graph_with_calls(&[
            ("X", "Y"),
            ("Y", "Z"),
            ("Z", "X"),
            ("Outer1", "X"),
            ("Outer2", "X"),
            ("Outer1", "Y"),
        ]);

        let report = detect_cycles(&graph);

        assert_eq!(report.cycles.len(), 1);
        assert_eq!(report.cycles[0].suggested_break, proc_key("Z"));
    }

    #[test]
    fn disjoint_cycles_are_all_found() {
        let graph = graph_with_calls(&[("A", "B"), ("B", "A"), ("C", "D"), ("D", "C")]);

        let report = detect_cycles(&graph);

        assert_eq!(report.cycles.len(), 2);
        assert_eq!(report.cycles[0].nodes, vec![proc_key("A"), proc_key("B")]);
        assert_eq!(report.cycles[1].nodes, vec![proc_key("C"), proc_key("D")]);
    }

    #[test]
    fn successor_of_wraps_around() {
        let graph = graph_with_calls(&[("X", "Y"), ("Y", "Z"), ("Z", "X")]);
        let cycle = &detect_cycles(&graph).cycles[0];

        assert_eq!(cycle.successor_of(&proc_key("X")), Some(&proc_key("Y")));
        assert_eq!(cycle.successor_of(&proc_key("Z")), Some(&proc_key("X")));
        assert_eq!(cycle.successor_of(&proc_key("Q")), None);
    }

    #[test]
    fn canonical_rotation_starts_at_smallest_key() {
        let (a, b, c) = (proc_key("A"), proc_key("B"), proc_key("C"));
        let rotated = canonical_rotation(&[&b, &c, &a]);
        assert_eq!(rotated, vec![a.clone(), b.clone(), c.clone()]);
    }
}
