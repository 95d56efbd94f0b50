//! Layered topological ordering.
//!
//! Nodes are partitioned into buckets in fixed order: unassigned (external)
//! nodes first, then `SCHEMA`, `DOMAIN`, `BUSINESS` and `UI`. Each bucket is
//! ordered with Kahn's algorithm over intra-bucket edges only, taking ready
//! nodes in key order. Bucket orders are concatenated into one contiguous
//! sequence starting at 0.
//!
//! # Residual Cycles
//!
//! When a bucket stalls (every remaining node still waits on another), the
//! cycle detector runs on the remaining nodes, the first cycle's suggested
//! break node has its edge to the next cycle member ignored, and a
//! [`BuildWarning::ResidualCycle`] is recorded. Ordering then continues, so
//! this never fails.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::cycles::{CycleInfo, find_cycles_with};
use super::model::Graph;
use super::types::{Layer, NodeKey};
use crate::error::BuildWarning;

/// The computed order for one graph.
#[derive(Debug, Clone, Default)]
pub struct TopologicalOrder {
    /// Node keys in order; `sequence[i]` has order `i`.
    pub sequence: Vec<NodeKey>,
    /// Order per node key.
    pub positions: HashMap<NodeKey, i64>,
    /// One warning per ignored dependency.
    pub warnings: Vec<BuildWarning>,
}

impl TopologicalOrder {
    /// Order of a node, if it is part of the graph.
    #[must_use]
    pub fn position(&self, key: &NodeKey) -> Option<i64> {
        self.positions.get(key).copied()
    }

    /// Whether any residual cycle forced an approximate order.
    #[must_use]
    pub fn is_approximate(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// A copy of `graph` whose nodes carry this order.
    #[must_use]
    pub fn apply(&self, graph: &Graph) -> Graph {
        graph.with_orders(&self.positions)
    }
}

/// Compute the layered order of every node in `graph`.
#[must_use]
pub fn topological_order(graph: &Graph) -> TopologicalOrder {
    let mut buckets: BTreeMap<Option<Layer>, Vec<&NodeKey>> = BTreeMap::new();
    for key in graph.sorted_keys() {
        let layer = graph.node(key).and_then(|node| node.layer);
        buckets.entry(layer).or_default().push(key);
    }

    // `None < Some(_)` puts the unassigned bucket first
    let mut result = TopologicalOrder::default();
    for (layer, members) in buckets {
        let local = order_bucket(graph, layer, &members, &mut result.warnings);
        for key in local {
            let position = i64::try_from(result.sequence.len()).unwrap_or(i64::MAX);
            result.positions.insert(key.clone(), position);
            result.sequence.push(key.clone());
        }
    }

    tracing::debug!(
        nodes = result.sequence.len(),
        approximate = result.is_approximate(),
        "Computed topological order"
    );

    result
}

/// Kahn's algorithm within one bucket.
fn order_bucket<'a>(
    graph: &'a Graph,
    layer: Option<Layer>,
    members: &[&'a NodeKey],
    warnings: &mut Vec<BuildWarning>,
) -> Vec<&'a NodeKey> {
    let in_bucket: BTreeSet<&NodeKey> = members.iter().copied().collect();

    // deps[n]: intra-bucket nodes n still waits on
    let mut deps: BTreeMap<&'a NodeKey, BTreeSet<&'a NodeKey>> = BTreeMap::new();
    let mut dependents: BTreeMap<&'a NodeKey, BTreeSet<&'a NodeKey>> = BTreeMap::new();
    for &member in members {
        let local: BTreeSet<&NodeKey> = graph
            .successors(member)
            .into_iter()
            .filter(|dep| in_bucket.contains(dep))
            .collect();
        for &dep in &local {
            dependents.entry(dep).or_default().insert(member);
        }
        deps.insert(member, local);
    }

    let mut ready: BTreeSet<&NodeKey> = deps
        .iter()
        .filter(|(_, waiting_on)| waiting_on.is_empty())
        .map(|(&key, _)| key)
        .collect();
    let mut emitted: BTreeSet<&NodeKey> = BTreeSet::new();
    let mut local_order = Vec::with_capacity(members.len());

    while local_order.len() < members.len() {
        let Some(next) = ready.pop_first() else {
            break_residual_cycle(graph, layer, &mut deps, &emitted, &mut ready, warnings);
            continue;
        };

        if !emitted.insert(next) {
            continue;
        }
        local_order.push(next);

        for &dependent in dependents.get(next).into_iter().flatten() {
            if emitted.contains(dependent) {
                continue;
            }
            if let Some(waiting_on) = deps.get_mut(dependent) {
                waiting_on.remove(next);
                if waiting_on.is_empty() {
                    ready.insert(dependent);
                }
            }
        }
    }

    local_order
}

/// Ignore one dependency inside the stalled remainder of a bucket.
fn break_residual_cycle<'a>(
    graph: &'a Graph,
    layer: Option<Layer>,
    deps: &mut BTreeMap<&'a NodeKey, BTreeSet<&'a NodeKey>>,
    emitted: &BTreeSet<&'a NodeKey>,
    ready: &mut BTreeSet<&'a NodeKey>,
    warnings: &mut Vec<BuildWarning>,
) {
    let remaining: Vec<&NodeKey> = deps
        .keys()
        .copied()
        .filter(|key| !emitted.contains(key))
        .collect();

    let cycle = {
        let residual = &*deps;
        find_cycles_with(&remaining, |key| {
            residual
                .get(key)
                .map(|waiting_on| waiting_on.iter().copied().collect())
                .unwrap_or_default()
        })
        .into_iter()
        .next()
        .and_then(|nodes| CycleInfo::new(graph, nodes))
    };

    let (from, to) = match &cycle {
        Some(cycle) => {
            let from = cycle.suggested_break.clone();
            let to = cycle.successor_of(&from).cloned();
            (Some(from), to)
        }
        None => {
            // Unreachable while every remaining node waits on another;
            // release the smallest key
            let from = remaining.first().map(|&key| key.clone());
            let to = from
                .as_ref()
                .and_then(|key| deps.get(key))
                .and_then(|waiting_on| waiting_on.first())
                .map(|&key| key.clone());
            (from, to)
        }
    };

    let (Some(from), Some(to)) = (from, to) else {
        // Nothing left to release; mark everything ready to guarantee progress
        ready.extend(remaining);
        return;
    };

    if let Some(&from_ref) = remaining.iter().find(|key| ***key == from)
        && let Some(waiting_on) = deps.get_mut(from_ref)
    {
        waiting_on.remove(&to);
        if waiting_on.is_empty() {
            ready.insert(from_ref);
        }
    }

    tracing::warn!(
        layer = layer.map_or("UNASSIGNED", Layer::as_str),
        from = %from,
        to = %to,
        "Residual cycle: ignoring dependency, order within cycle is approximate"
    );
    warnings.push(BuildWarning::ResidualCycle {
        layer,
        dropped_from: from,
        dropped_to: to,
    });
}
