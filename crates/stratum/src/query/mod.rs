//! Analytical queries against the graph store.
//!
//! Every operation pings the store first and runs each store call under the
//! configured timeout. Failures never escape as errors: an unreachable store
//! or an expired deadline becomes [`QueryOutcome::Unavailable`], so callers
//! degrade instead of crashing.
//!
//! All traversal bounds are mandatory and clamped to the configured limits;
//! no query can walk the whole graph from a hub.

mod types;

use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::sync::Arc;

use crate::graph::{NodeKey, NodeType};
use crate::store::{GraphStore, StoreError, StoreResult, with_timeout};

pub use types::{
    DEFAULT_ENTRY_POINT_PREFIXES, DeadCodeResult, HubInfo, ImpactResult, PathResult, QueryConfig,
    QueryOutcome, UnavailableReason,
};

/// Upper bound on cycles returned by one live cycle search.
const MAX_LIVE_CYCLES: usize = 1000;

/// Read-only query interface over a [`GraphStore`].
///
/// Cheap to clone; queries are safe to run concurrently with each other and
/// with a sync.
#[derive(Clone)]
pub struct GraphQueryEngine {
    store: Arc<dyn GraphStore>,
    config: QueryConfig,
}

impl GraphQueryEngine {
    /// Create an engine over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn GraphStore>, config: QueryConfig) -> Self {
        Self { store, config }
    }

    /// The limits in effect.
    #[must_use]
    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    /// Ping, then run `call`, both under the timeout.
    async fn call<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = StoreResult<T>>,
    ) -> Result<T, UnavailableReason> {
        let timeout = self.config.timeout;
        let result = match with_timeout(timeout, self.store.ping()).await {
            Ok(()) => with_timeout(timeout, call).await,
            Err(e) => Err(e),
        };

        result.map_err(|e| {
            tracing::warn!(operation, error = %e, "Graph store unavailable");
            match e {
                StoreError::Timeout(after) => UnavailableReason::Timeout(after),
                other => UnavailableReason::Unreachable(other.to_string()),
            }
        })
    }

    /// Everything that depends on `node`, transitively, up to `max_depth` hops.
    ///
    /// `max_depth` is clamped to `1..=query.max_depth`. An unknown node has
    /// no dependents; [`ImpactResult::known`] tells it apart from a node
    /// nothing depends on.
    pub async fn get_impact(&self, node: &NodeKey, max_depth: u32) -> QueryOutcome<ImpactResult> {
        let depth = max_depth.clamp(1, self.config.max_depth.max(1));

        let rows = match self
            .call("get_impact", self.store.dependents_within(node, depth))
            .await
        {
            Ok(rows) => rows,
            Err(reason) => return QueryOutcome::Unavailable(reason),
        };

        let known = if rows.is_empty() {
            match self
                .call("get_impact", self.store.contains_node(node))
                .await
            {
                Ok(known) => known,
                Err(reason) => return QueryOutcome::Unavailable(reason),
            }
        } else {
            true
        };

        let mut affected_by_depth: BTreeMap<u32, Vec<NodeKey>> = BTreeMap::new();
        let mut affected_by_type: BTreeMap<NodeType, Vec<NodeKey>> = BTreeMap::new();
        let mut distinct = BTreeSet::new();
        for (key, hops) in rows {
            if !distinct.insert(key.clone()) {
                continue;
            }
            affected_by_depth.entry(hops).or_default().push(key.clone());
            affected_by_type.entry(key.node_type).or_default().push(key);
        }
        for keys in affected_by_depth
            .values_mut()
            .chain(affected_by_type.values_mut())
        {
            keys.sort();
        }

        tracing::debug!(node = %node, depth, affected = distinct.len(), "Computed impact");

        QueryOutcome::Available(ImpactResult {
            target: node.clone(),
            known,
            max_depth: depth,
            affected_by_depth,
            affected_by_type,
            total_affected: distinct.len(),
        })
    }

    /// All shortest paths between two nodes, following edges either way.
    ///
    /// Returns [`QueryOutcome::NoPath`] when the nodes are not connected
    /// within `max_hops` (clamped to `1..=query.max_hops`) or either node is
    /// unknown.
    pub async fn get_path(
        &self,
        source: &NodeKey,
        target: &NodeKey,
        max_hops: u32,
    ) -> QueryOutcome<PathResult> {
        let hops = max_hops.clamp(1, self.config.max_hops.max(1));
        let limit = self.config.max_paths.max(1);

        let mut paths = match self
            .call(
                "get_path",
                self.store.shortest_paths(source, target, hops, limit),
            )
            .await
        {
            Ok(paths) => paths,
            Err(reason) => return QueryOutcome::Unavailable(reason),
        };

        let Some(first) = paths.first() else {
            return QueryOutcome::NoPath;
        };
        let hop_count = first.len().saturating_sub(1);
        paths.sort();
        paths.truncate(limit);

        QueryOutcome::Available(PathResult {
            source: source.clone(),
            target: target.clone(),
            hops: hop_count,
            paths,
        })
    }

    /// Nodes with at least `min_connections` edges, busiest first.
    pub async fn find_hubs(&self, min_connections: usize) -> QueryOutcome<Vec<HubInfo>> {
        let counts = match self
            .call("find_hubs", self.store.degree_counts(min_connections))
            .await
        {
            Ok(counts) => counts,
            Err(reason) => return QueryOutcome::Unavailable(reason),
        };

        let mut hubs: Vec<HubInfo> = counts
            .into_iter()
            .map(|count| HubInfo {
                total: count.incoming + count.outgoing,
                key: count.key,
                incoming: count.incoming,
                outgoing: count.outgoing,
            })
            .filter(|hub| hub.total >= min_connections)
            .collect();
        hubs.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.key.cmp(&b.key)));

        QueryOutcome::Available(hubs)
    }

    /// Procedures and classes with no incoming edges.
    ///
    /// Names starting with any of `prefixes` are treated as entry points and
    /// excluded. `None` uses the configured prefixes.
    pub async fn find_dead_code(&self, prefixes: Option<&[String]>) -> QueryOutcome<DeadCodeResult> {
        let prefixes: Vec<String> = prefixes
            .unwrap_or(self.config.entry_point_prefixes.as_slice())
            .iter()
            .filter(|prefix| !prefix.is_empty())
            .cloned()
            .collect();

        let keys = match self
            .call(
                "find_dead_code",
                self.store
                    .nodes_without_incoming(&[NodeType::Procedure, NodeType::Class]),
            )
            .await
        {
            Ok(keys) => keys,
            Err(reason) => return QueryOutcome::Unavailable(reason),
        };

        let mut result = DeadCodeResult {
            excluded_prefixes: prefixes.clone(),
            ..DeadCodeResult::default()
        };
        for key in keys {
            if prefixes.iter().any(|prefix| key.name.starts_with(prefix.as_str())) {
                continue;
            }
            match key.node_type {
                NodeType::Procedure => result.procedures.push(key),
                NodeType::Class => result.classes.push(key),
                _ => {}
            }
        }
        result.procedures.sort();
        result.classes.sort();

        QueryOutcome::Available(result)
    }

    /// Elementary cycles among nodes of one type, as currently stored.
    ///
    /// Cycles longer than `max_length` (clamped to `query.max_cycle_length`)
    /// are not reported. Each cycle starts at its smallest key and appears
    /// once.
    pub async fn find_cycles(
        &self,
        node_type: NodeType,
        max_length: usize,
    ) -> QueryOutcome<Vec<Vec<NodeKey>>> {
        let bound = max_length.min(self.config.max_cycle_length);

        let edges = match self
            .call("find_cycles", self.store.typed_edges(node_type))
            .await
        {
            Ok(edges) => edges,
            Err(reason) => return QueryOutcome::Unavailable(reason),
        };

        let cycles = bounded_cycles(&edges, bound);
        tracing::debug!(%node_type, bound, cycles = cycles.len(), "Searched live cycles");
        QueryOutcome::Available(cycles)
    }
}

/// Enumerate elementary cycles of at most `bound` nodes.
///
/// Each search starts from a node and only visits larger keys, so every
/// cycle is found exactly once, already rotated to its smallest key.
fn bounded_cycles(edges: &[(NodeKey, NodeKey)], bound: usize) -> Vec<Vec<NodeKey>> {
    let mut adjacency: BTreeMap<&NodeKey, BTreeSet<&NodeKey>> = BTreeMap::new();
    for (source, target) in edges {
        if source != target {
            adjacency.entry(source).or_default().insert(target);
        }
    }

    let mut cycles = Vec::new();
    if bound < 2 {
        return cycles;
    }

    let starts: Vec<&NodeKey> = adjacency.keys().copied().collect();
    for start in starts {
        let mut path = vec![start];
        extend_cycles(&adjacency, start, &mut path, bound, &mut cycles);
        if cycles.len() >= MAX_LIVE_CYCLES {
            tracing::warn!(limit = MAX_LIVE_CYCLES, "Live cycle search truncated");
            cycles.truncate(MAX_LIVE_CYCLES);
            break;
        }
    }
    cycles
}

fn extend_cycles<'a>(
    adjacency: &BTreeMap<&'a NodeKey, BTreeSet<&'a NodeKey>>,
    start: &'a NodeKey,
    path: &mut Vec<&'a NodeKey>,
    bound: usize,
    cycles: &mut Vec<Vec<NodeKey>>,
) {
    let Some(&current) = path.last() else {
        return;
    };
    let Some(next_nodes) = adjacency.get(current) else {
        return;
    };

    for &next in next_nodes {
        if cycles.len() >= MAX_LIVE_CYCLES {
            return;
        }
        if next == start {
            cycles.push(path.iter().map(|&key| key.clone()).collect());
        } else if next > start && path.len() < bound && !path.contains(&next) {
            path.push(next);
            extend_cycles(adjacency, start, path, bound, cycles);
            path.pop();
        }
    }
}
