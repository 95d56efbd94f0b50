//! Common test utilities shared across integration tests.

#![allow(dead_code)]

use std::path::Path;

use stratum::{EntityKind, EntityRecord, NodeKey, NodeType};

pub fn table(name: &str) -> EntityRecord {
    EntityRecord::new(EntityKind::Table, name)
}

pub fn class(name: &str) -> EntityRecord {
    EntityRecord::new(EntityKind::Class, name)
}

pub fn procedure(name: &str) -> EntityRecord {
    EntityRecord::new(EntityKind::Procedure, name)
}

pub fn page(name: &str) -> EntityRecord {
    EntityRecord::new(EntityKind::Page, name)
}

pub fn key(node_type: NodeType, name: &str) -> NodeKey {
    NodeKey::new(node_type, name)
}

/// A small login feature touching every layer.
///
/// ```text
/// Page:frmLogin -> Procedure:API_Login -> Procedure:ValidateUser -> Table:USUARIO
///                                      \-> Class:Usuario ---------/
/// Class:Usuario -INHERITS-> Class:EntidadBase
/// ```
pub fn login_feature() -> Vec<EntityRecord> {
    vec![
        table("USUARIO"),
        class("EntidadBase"),
        class("Usuario")
            .with_parent("EntidadBase")
            .uses_table("USUARIO"),
        procedure("ValidateUser").uses_table("USUARIO"),
        procedure("API_Login")
            .calls("ValidateUser")
            .uses_class("Usuario"),
        page("frmLogin").calls("API_Login"),
    ]
}

/// Write records as `<dir>/<project>.jsonl`.
pub fn write_project(dir: &Path, project: &str, records: &[EntityRecord]) {
    let content: String = records
        .iter()
        .map(|record| serde_json::to_string(record).unwrap() + "\n")
        .collect();
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(dir.join(format!("{project}.jsonl")), content).unwrap();
}
