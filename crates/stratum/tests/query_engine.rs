//! Integration tests for graph queries against a synced SQLite store.
//!
//! Each test builds a project, mirrors it into a fresh database and queries
//! it through the public engine, covering both answered and degraded
//! outcomes.

use std::sync::Arc;

use stratum::{
    EntityRecord, GraphQueryEngine, GraphSynchronizer, InMemoryRecordStore, NodeType, Pipeline,
    QueryConfig, QueryOutcome, SqliteGraphStore, SyncConfig, UnavailableReason,
};
use tempfile::TempDir;

mod common;
use common::{key, login_feature, procedure};

/// Build and sync `records`, returning an engine over the synced store.
async fn synced_engine(records: Vec<EntityRecord>) -> (TempDir, GraphQueryEngine) {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let graph_store = Arc::new(SqliteGraphStore::new(dir.path().join("graph.db")));
    let store = InMemoryRecordStore::with_project("demo", records);
    let pipeline = Pipeline::new(Arc::new(store)).with_synchronizer(GraphSynchronizer::new(
        graph_store.clone(),
        SyncConfig::default(),
    ));

    let report = pipeline.build_and_persist("demo", false).await.unwrap();
    assert!(report.sync.as_ref().is_some_and(|s| s.is_complete()));

    (dir, GraphQueryEngine::new(graph_store, QueryConfig::default()))
}

fn unreachable_engine(dir: &TempDir) -> GraphQueryEngine {
    let store = SqliteGraphStore::new(dir.path().join("no-such-dir").join("graph.db"));
    GraphQueryEngine::new(Arc::new(store), QueryConfig::default())
}

#[tokio::test]
async fn impact_with_store_down_is_unavailable_not_an_error() {
    let dir = TempDir::new().unwrap();
    let engine = unreachable_engine(&dir);

    let outcome = engine.get_impact(&key(NodeType::Table, "USUARIO"), 2).await;

    assert!(matches!(
        outcome,
        QueryOutcome::Unavailable(UnavailableReason::Unreachable(_))
    ));
}

#[tokio::test]
async fn impact_groups_dependents_by_distance() {
    let (_dir, engine) = synced_engine(login_feature()).await;

    let impact = engine
        .get_impact(&key(NodeType::Table, "USUARIO"), 2)
        .await
        .available()
        .unwrap();

    assert_eq!(
        impact.affected_by_depth[&1],
        vec![
            key(NodeType::Class, "Usuario"),
            key(NodeType::Procedure, "ValidateUser"),
        ]
    );
    assert_eq!(
        impact.affected_by_depth[&2],
        vec![key(NodeType::Procedure, "API_Login")]
    );
    assert_eq!(impact.total_affected, 3);
    assert!(!impact.affected_by_type.contains_key(&NodeType::Page));
}

#[tokio::test]
async fn api_entry_points_are_not_dead_code() {
    let mut records = login_feature();
    records.push(procedure("LegacyCleanup"));
    let (_dir, engine) = synced_engine(records).await;

    let dead = engine.find_dead_code(None).await.available().unwrap();

    assert!(!dead.procedures.contains(&key(NodeType::Procedure, "API_Login")));
    assert_eq!(dead.procedures, vec![key(NodeType::Procedure, "LegacyCleanup")]);
    assert!(dead.classes.is_empty());
}

#[tokio::test]
async fn path_follows_edges_in_either_direction() {
    let (_dir, engine) = synced_engine(login_feature()).await;

    let path = engine
        .get_path(
            &key(NodeType::Table, "USUARIO"),
            &key(NodeType::Page, "frmLogin"),
            5,
        )
        .await
        .available()
        .unwrap();

    assert_eq!(path.hops, 3);
    assert_eq!(path.paths.len(), 2);
    assert!(path.paths.iter().all(|p| p.len() == 4));
}

#[tokio::test]
async fn unconnected_nodes_are_no_path_and_down_store_is_unavailable() {
    let mut records = login_feature();
    records.push(procedure("Island"));
    let (_dir, engine) = synced_engine(records).await;
    let down_dir = TempDir::new().unwrap();
    let down = unreachable_engine(&down_dir);
    let from = key(NodeType::Procedure, "Island");
    let to = key(NodeType::Table, "USUARIO");

    let no_path = engine.get_path(&from, &to, 5).await;
    let unavailable = down.get_path(&from, &to, 5).await;

    assert!(no_path.is_no_path());
    assert!(unavailable.is_unavailable());
}

#[tokio::test]
async fn hubs_rank_the_shared_table_first() {
    let (_dir, engine) = synced_engine(login_feature()).await;

    let hubs = engine.find_hubs(3).await.available().unwrap();

    let keys: Vec<String> = hubs.iter().map(|h| h.key.to_string()).collect();
    assert_eq!(keys, vec!["Class:Usuario", "Procedure:API_Login"]);
    assert_eq!(hubs[0].total, 3);
}

#[tokio::test]
async fn live_cycles_match_build_time_cycles() {
    let (_dir, engine) = synced_engine(vec![
        procedure("X").calls("Y"),
        procedure("Y").calls("Z"),
        procedure("Z").calls("X"),
    ])
    .await;

    let cycles = engine
        .find_cycles(NodeType::Procedure, 5)
        .await
        .available()
        .unwrap();
    let too_short = engine
        .find_cycles(NodeType::Procedure, 2)
        .await
        .available()
        .unwrap();

    assert_eq!(
        cycles,
        vec![vec![
            key(NodeType::Procedure, "X"),
            key(NodeType::Procedure, "Y"),
            key(NodeType::Procedure, "Z"),
        ]]
    );
    assert!(too_short.is_empty());
}
