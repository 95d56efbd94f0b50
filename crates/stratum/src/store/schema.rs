//! Schema of the SQLite graph store.

/// Database schema definition.
pub(crate) const SCHEMA: &str = r"
-- Graph nodes, keyed by 'Type:Name'
CREATE TABLE IF NOT EXISTS nodes (
    key TEXT PRIMARY KEY,
    node_type TEXT NOT NULL,
    name TEXT NOT NULL,
    layer TEXT,
    topological_order INTEGER NOT NULL DEFAULT -1,
    is_external INTEGER NOT NULL DEFAULT 0,
    sync_run TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_nodes_type ON nodes(node_type);
CREATE INDEX IF NOT EXISTS idx_nodes_sync_run ON nodes(sync_run);

-- Typed relationships; source depends on target
-- No foreign keys: queries may run while a sync is half done
CREATE TABLE IF NOT EXISTS edges (
    source TEXT NOT NULL,
    target TEXT NOT NULL,
    kind TEXT NOT NULL,
    sync_run TEXT NOT NULL,
    PRIMARY KEY (source, target, kind)
);

CREATE INDEX IF NOT EXISTS idx_edges_target ON edges(target);
CREATE INDEX IF NOT EXISTS idx_edges_sync_run ON edges(sync_run);
";
