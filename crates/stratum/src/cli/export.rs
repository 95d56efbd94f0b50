//! `stratum export` command implementation.

use anyhow::{Context, Result};
use stratum::Pipeline;
use stratum::export::{to_dot, to_json};

use super::App;

/// Output formats for the export command.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum Format {
    /// Graphviz DOT
    Dot,
    /// JSON description
    Json,
}

/// Run the export command. Nothing is written back to the records.
pub async fn run(app: &App, project: &str, format: Format) -> Result<()> {
    let pipeline = Pipeline::new(app.records())
        .with_read_concurrency(app.config().build.read_concurrency);
    let ordered = pipeline
        .build_graph(project)
        .await
        .with_context(|| format!("failed to build project '{project}'"))?;

    for warning in &ordered.warnings {
        tracing::warn!(%warning, "Build warning");
    }

    let output = match format {
        Format::Dot => to_dot(&ordered.graph),
        Format::Json => to_json(&ordered.graph)?,
    };
    print!("{output}");
    Ok(())
}
