//! JSONL-backed record store.
//!
//! Each project lives in `<data_dir>/<project>.jsonl`, one [`EntityRecord`]
//! per line. Files are loaded lazily on first access and cached; writes
//! update the cache and mark the project dirty until [`RecordStore::save`].
//!
//! # Loading
//!
//! Loading is resilient: blank lines are ignored, and lines that fail to parse
//! are skipped and reported as [`LoadWarning`]s instead of failing the load.
//!
//! # Atomicity
//!
//! `save` writes each dirty project to a `.jsonl.tmp` sibling, flushes it and
//! renames it over the original. A crash mid-write leaves the old file intact.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::RwLock;

use super::{EntityKind, EntityRecord, RecordStore};
use crate::error::{Error, Result};
use crate::graph::Layer;

/// A non-fatal problem found while reading a project file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadWarning {
    /// A line that is not a valid record. It was skipped.
    MalformedJson {
        /// Project whose file contained the line.
        project: String,
        /// 1-based line number.
        line_number: usize,
        /// Parser message.
        error: String,
    },
}

impl LoadWarning {
    /// The project whose file produced the warning.
    #[must_use]
    pub fn project(&self) -> &str {
        match self {
            Self::MalformedJson { project, .. } => project,
        }
    }
}

impl std::fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedJson {
                project,
                line_number,
                error,
            } => write!(f, "{project}.jsonl:{line_number}: skipped malformed record: {error}"),
        }
    }
}

#[derive(Debug, Default)]
struct ProjectFile {
    records: Vec<EntityRecord>,
    dirty: bool,
}

/// Record store reading and writing `<project>.jsonl` files.
#[derive(Debug)]
pub struct JsonlRecordStore {
    data_dir: PathBuf,
    cache: RwLock<HashMap<String, ProjectFile>>,
    warnings: RwLock<Vec<LoadWarning>>,
}

impl JsonlRecordStore {
    /// Create a store rooted at `data_dir`. Nothing is read until first use.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            cache: RwLock::new(HashMap::new()),
            warnings: RwLock::new(Vec::new()),
        }
    }

    /// The directory holding the project files.
    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Path of a project's file.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidProjectName` for names that are not safe file
    /// names.
    pub fn project_path(&self, project: &str) -> Result<PathBuf> {
        validate_project_name(project)?;
        Ok(self.data_dir.join(format!("{project}.jsonl")))
    }

    /// Make sure a project is cached, loading it from disk if needed.
    async fn ensure_loaded(&self, project: &str) -> Result<()> {
        if self.cache.read().await.contains_key(project) {
            return Ok(());
        }

        let path = self.project_path(project)?;
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::ProjectNotFound(project.to_string()));
            }
            Err(e) => return Err(Error::Io(e)),
        };

        let (records, warnings) = parse_records(project, &content);
        for warning in &warnings {
            tracing::warn!(%warning, "Skipping malformed record line");
        }
        tracing::debug!(
            project,
            records = records.len(),
            skipped = warnings.len(),
            "Loaded project records"
        );

        self.warnings.write().await.extend(warnings);
        self.cache
            .write()
            .await
            .entry(project.to_string())
            .or_insert(ProjectFile {
                records,
                dirty: false,
            });
        Ok(())
    }
}

/// Restrict project names to characters that are safe in a file name.
fn validate_project_name(project: &str) -> Result<()> {
    let valid = !project.is_empty()
        && !project.starts_with('.')
        && project
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidProjectName(project.to_string()))
    }
}

fn parse_records(project: &str, content: &str) -> (Vec<EntityRecord>, Vec<LoadWarning>) {
    let mut records = Vec::new();
    let mut warnings = Vec::new();

    for (index, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<EntityRecord>(line) {
            Ok(record) => records.push(record),
            Err(e) => warnings.push(LoadWarning::MalformedJson {
                project: project.to_string(),
                line_number: index + 1,
                error: e.to_string(),
            }),
        }
    }

    (records, warnings)
}

async fn write_atomic(path: &Path, records: &[EntityRecord]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let temp_path = path.with_extension("jsonl.tmp");
    let file = tokio::fs::File::create(&temp_path).await?;
    let mut writer = BufWriter::new(file);

    for record in records {
        let json = serde_json::to_string(record)?;
        writer.write_all(json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
    }
    writer.flush().await?;
    drop(writer);

    tokio::fs::rename(&temp_path, path).await?;
    Ok(())
}

#[async_trait]
impl RecordStore for JsonlRecordStore {
    async fn list_records(&self, project: &str, kind: EntityKind) -> Result<Vec<EntityRecord>> {
        self.ensure_loaded(project).await?;

        let cache = self.cache.read().await;
        let file = cache
            .get(project)
            .ok_or_else(|| Error::Internal(format!("project {project} missing from cache")))?;
        Ok(file
            .records
            .iter()
            .filter(|r| r.kind == kind)
            .cloned()
            .collect())
    }

    async fn write_order(
        &self,
        project: &str,
        kind: EntityKind,
        name: &str,
        topological_order: i64,
        layer: Option<Layer>,
    ) -> Result<()> {
        self.ensure_loaded(project).await?;

        let mut cache = self.cache.write().await;
        let file = cache
            .get_mut(project)
            .ok_or_else(|| Error::Internal(format!("project {project} missing from cache")))?;

        let mut found = false;
        for record in file
            .records
            .iter_mut()
            .filter(|r| r.kind == kind && r.name.trim() == name)
        {
            record.topological_order = Some(topological_order);
            record.layer = layer;
            found = true;
        }
        if !found {
            return Err(Error::RecordStore(format!("no record {kind}:{name}")));
        }

        file.dirty = true;
        Ok(())
    }

    async fn save(&self) -> Result<()> {
        let mut cache = self.cache.write().await;

        let mut projects: Vec<&String> = cache
            .iter()
            .filter(|(_, file)| file.dirty)
            .map(|(name, _)| name)
            .collect();
        projects.sort();
        let projects: Vec<String> = projects.into_iter().cloned().collect();

        for project in projects {
            let path = self.project_path(&project)?;
            if let Some(file) = cache.get_mut(&project) {
                write_atomic(&path, &file.records).await?;
                file.dirty = false;
                tracing::debug!(project, path = %path.display(), "Saved project records");
            }
        }
        Ok(())
    }

    async fn load_warnings(&self, project: &str) -> Vec<LoadWarning> {
        self.warnings
            .read()
            .await
            .iter()
            .filter(|warning| warning.project() == project)
            .cloned()
            .collect()
    }
}
