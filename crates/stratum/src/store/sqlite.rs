//! SQLite implementation of the graph store.
//!
//! Uses recursive CTEs for reverse traversal, keeping the data in `SQLite`.
//! The connection is opened lazily on the first call; a database that cannot
//! be opened (missing directory, unreadable file, bad schema) is reported as
//! [`StoreError::Unreachable`]. All statements run on the blocking thread
//! pool.

// SQLite stores integers as i64. Depths and counts are small and non-negative.
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_wrap)]

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension};

use super::schema::SCHEMA;
use super::{DegreeCount, GraphStore, PruneStats, StoreError, StoreResult, StoredEdge};
use crate::graph::{Layer, Node, NodeKey, NodeType};

/// How long a statement waits on a locked database before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Graph store backed by a single SQLite file.
///
/// Cloning is cheap; clones share the connection.
#[derive(Debug, Clone)]
pub struct SqliteGraphStore {
    db_path: PathBuf,
    conn: Arc<Mutex<Option<Connection>>>,
}

impl SqliteGraphStore {
    /// Create a store for `db_path`. The file is opened on first use.
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            conn: Arc::new(Mutex::new(None)),
        }
    }

    /// Location of the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Run `f` against the connection on the blocking pool, opening it first
    /// if needed.
    async fn with_conn<T, F>(&self, f: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> StoreResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let path = self.db_path.clone();

        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|e| StoreError::Internal(format!("mutex poisoned: {e}")))?;
            if guard.is_none() {
                *guard = Some(open(&path)?);
            }
            let Some(conn) = guard.as_ref() else {
                return Err(StoreError::Internal("connection missing after open".into()));
            };
            f(conn)
        })
        .await
        .map_err(|e| StoreError::Internal(format!("blocking task failed: {e}")))?
    }
}

fn open(path: &Path) -> StoreResult<Connection> {
    let unreachable = |e: rusqlite::Error| StoreError::Unreachable(format!("{}: {e}", path.display()));

    let conn = Connection::open(path).map_err(unreachable)?;
    conn.busy_timeout(BUSY_TIMEOUT).map_err(unreachable)?;
    conn.pragma_update(None, "journal_mode", "WAL")
        .map_err(unreachable)?;
    conn.execute_batch(SCHEMA).map_err(unreachable)?;

    tracing::debug!(path = %path.display(), "Opened graph store");
    Ok(conn)
}

/// Parse a stored key, skipping rows that do not parse.
fn parse_key(raw: &str) -> Option<NodeKey> {
    match raw.parse() {
        Ok(key) => Some(key),
        Err(e) => {
            tracing::warn!(
                raw_key = %raw,
                error = %e,
                "Failed to parse node key, possible database corruption"
            );
            None
        }
    }
}

/// Distinct neighbors of `key` in either direction, sorted.
fn neighbors(conn: &Connection, key: &str) -> StoreResult<Vec<String>> {
    let mut stmt = conn.prepare_cached(
        "SELECT target FROM edges WHERE source = ?1
         UNION
         SELECT source FROM edges WHERE target = ?1
         ORDER BY 1",
    )?;
    let rows = stmt
        .query_map([key], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn node_exists(conn: &Connection, key: &str) -> StoreResult<bool> {
    let found = conn
        .query_row("SELECT 1 FROM nodes WHERE key = ?1", [key], |_| Ok(()))
        .optional()?;
    Ok(found.is_some())
}

/// Breadth-first search over undirected edges, recording every parent at the
/// previous level so all shortest paths can be enumerated.
fn shortest_paths_blocking(
    conn: &Connection,
    source: &str,
    target: &str,
    max_hops: u32,
    limit: usize,
) -> StoreResult<Vec<Vec<String>>> {
    if !node_exists(conn, source)? || !node_exists(conn, target)? {
        return Ok(Vec::new());
    }
    if source == target {
        return Ok(vec![vec![source.to_string()]]);
    }

    let mut parents: HashMap<String, Vec<String>> = HashMap::new();
    let mut visited: HashSet<String> = HashSet::from([source.to_string()]);
    let mut frontier = vec![source.to_string()];
    let mut found = false;

    for _ in 0..max_hops {
        let mut next: BTreeSet<String> = BTreeSet::new();
        for node in &frontier {
            for neighbor in neighbors(conn, node)? {
                if visited.contains(&neighbor) {
                    continue;
                }
                parents
                    .entry(neighbor.clone())
                    .or_default()
                    .push(node.clone());
                next.insert(neighbor);
            }
        }

        if next.is_empty() {
            break;
        }
        if next.contains(target) {
            found = true;
            break;
        }
        visited.extend(next.iter().cloned());
        frontier = next.into_iter().collect();
    }

    if !found {
        return Ok(Vec::new());
    }

    // Walk parents back from the target, depth first, in sorted order
    let mut paths = Vec::new();
    let mut stack: Vec<Vec<String>> = vec![vec![target.to_string()]];
    while let Some(partial) = stack.pop() {
        if paths.len() >= limit {
            break;
        }
        let Some(head) = partial.last() else {
            continue;
        };
        if head == source {
            let mut path = partial;
            path.reverse();
            paths.push(path);
            continue;
        }
        let mut heads = parents.get(head).cloned().unwrap_or_default();
        heads.sort();
        heads.dedup();
        for parent in heads.into_iter().rev() {
            let mut extended = partial.clone();
            extended.push(parent);
            stack.push(extended);
        }
    }

    Ok(paths)
}

#[async_trait]
impl GraphStore for SqliteGraphStore {
    async fn ping(&self) -> StoreResult<()> {
        self.with_conn(|conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
            Ok(())
        })
        .await
    }

    async fn upsert_node(&self, node: &Node, run_id: &str) -> StoreResult<()> {
        let node = node.clone();
        let run_id = run_id.to_string();

        self.with_conn(move |conn| {
            let mut stmt = conn.prepare_cached(
                "INSERT INTO nodes (key, node_type, name, layer, topological_order, is_external, sync_run)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(key) DO UPDATE SET
                    node_type = excluded.node_type,
                    name = excluded.name,
                    layer = excluded.layer,
                    topological_order = excluded.topological_order,
                    is_external = excluded.is_external,
                    sync_run = excluded.sync_run",
            )?;
            stmt.execute(rusqlite::params![
                node.key.to_string(),
                node.key.node_type.as_str(),
                node.key.name,
                node.layer.map(Layer::as_str),
                node.topological_order,
                node.is_external,
                run_id,
            ])?;
            Ok(())
        })
        .await
    }

    async fn upsert_edge(&self, edge: &StoredEdge, run_id: &str) -> StoreResult<()> {
        let source = edge.source.to_string();
        let target = edge.target.to_string();
        let kind = edge.kind.as_str();
        let run_id = run_id.to_string();

        self.with_conn(move |conn| {
            let mut stmt = conn.prepare_cached(
                "INSERT INTO edges (source, target, kind, sync_run)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(source, target, kind) DO UPDATE SET
                    sync_run = excluded.sync_run",
            )?;
            stmt.execute(rusqlite::params![source, target, kind, run_id])?;
            Ok(())
        })
        .await
    }

    async fn prune_except(&self, run_id: &str) -> StoreResult<PruneStats> {
        let run_id = run_id.to_string();

        self.with_conn(move |conn| {
            let tx = conn.unchecked_transaction()?;
            let edges = tx.execute("DELETE FROM edges WHERE sync_run != ?1", [&run_id])?;
            let nodes = tx.execute("DELETE FROM nodes WHERE sync_run != ?1", [&run_id])?;
            tx.commit()?;
            Ok(PruneStats { nodes, edges })
        })
        .await
    }

    async fn contains_node(&self, key: &NodeKey) -> StoreResult<bool> {
        let key = key.to_string();
        self.with_conn(move |conn| node_exists(conn, &key)).await
    }

    async fn dependents_within(
        &self,
        key: &NodeKey,
        max_depth: u32,
    ) -> StoreResult<Vec<(NodeKey, u32)>> {
        let key = key.to_string();

        self.with_conn(move |conn| {
            // edges(source, target): source depends on target, so dependents
            // of X are the sources of edges pointing at X
            let mut stmt = conn.prepare(
                "WITH RECURSIVE dependent_tree(node_key, depth) AS (
                    -- Base case: direct dependents
                    SELECT e.source, 1
                    FROM edges e
                    WHERE e.target = ?1

                    UNION

                    -- Recursive case: dependents of dependents
                    SELECT e.source, dt.depth + 1
                    FROM edges e
                    JOIN dependent_tree dt ON e.target = dt.node_key
                    WHERE dt.depth < ?2
                )
                SELECT node_key, MIN(depth) AS min_depth
                FROM dependent_tree
                WHERE node_key != ?1
                GROUP BY node_key
                ORDER BY min_depth, node_key",
            )?;

            let rows = stmt
                .query_map(rusqlite::params![key, max_depth], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u32))
                })?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(rows
                .into_iter()
                .filter_map(|(raw, depth)| parse_key(&raw).map(|key| (key, depth)))
                .collect())
        })
        .await
    }

    async fn shortest_paths(
        &self,
        source: &NodeKey,
        target: &NodeKey,
        max_hops: u32,
        limit: usize,
    ) -> StoreResult<Vec<Vec<NodeKey>>> {
        let source = source.to_string();
        let target = target.to_string();

        self.with_conn(move |conn| {
            let raw = shortest_paths_blocking(conn, &source, &target, max_hops, limit)?;
            Ok(raw
                .into_iter()
                .filter_map(|path| path.iter().map(|k| parse_key(k)).collect())
                .collect())
        })
        .await
    }

    async fn degree_counts(&self, min_total: usize) -> StoreResult<Vec<DegreeCount>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT key, incoming, outgoing FROM (
                    SELECT n.key,
                           (SELECT COUNT(*) FROM edges e WHERE e.target = n.key) AS incoming,
                           (SELECT COUNT(*) FROM edges e WHERE e.source = n.key) AS outgoing
                    FROM nodes n
                 )
                 WHERE incoming + outgoing >= ?1
                 ORDER BY incoming + outgoing DESC, key",
            )?;

            let rows = stmt
                .query_map([min_total as i64], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)? as usize,
                        row.get::<_, i64>(2)? as usize,
                    ))
                })?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(rows
                .into_iter()
                .filter_map(|(raw, incoming, outgoing)| {
                    parse_key(&raw).map(|key| DegreeCount {
                        key,
                        incoming,
                        outgoing,
                    })
                })
                .collect())
        })
        .await
    }

    async fn nodes_without_incoming(&self, types: &[NodeType]) -> StoreResult<Vec<NodeKey>> {
        let types = types.to_vec();

        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT n.key FROM nodes n
                 WHERE n.node_type = ?1
                   AND NOT EXISTS (SELECT 1 FROM edges e WHERE e.target = n.key)
                 ORDER BY n.key",
            )?;

            let mut keys = Vec::new();
            for node_type in types {
                let rows = stmt
                    .query_map([node_type.as_str()], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                keys.extend(rows.iter().filter_map(|raw| parse_key(raw)));
            }
            Ok(keys)
        })
        .await
    }

    async fn typed_edges(&self, node_type: NodeType) -> StoreResult<Vec<(NodeKey, NodeKey)>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT DISTINCT e.source, e.target
                 FROM edges e
                 JOIN nodes s ON s.key = e.source
                 JOIN nodes t ON t.key = e.target
                 WHERE s.node_type = ?1 AND t.node_type = ?1
                 ORDER BY e.source, e.target",
            )?;

            let rows = stmt
                .query_map([node_type.as_str()], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(rows
                .into_iter()
                .filter_map(|(source, target)| Some((parse_key(&source)?, parse_key(&target)?)))
                .collect())
        })
        .await
    }
}
