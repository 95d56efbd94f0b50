//! `stratum init` command implementation.

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use stratum::config;

/// Run the init command in `base_dir`.
pub async fn run(base_dir: &Path) -> Result<()> {
    let result = config::init(base_dir)
        .await
        .context("failed to initialize stratum")?;

    println!(
        "{} {}",
        "Created".green(),
        result.config_path.display().to_string().cyan()
    );
    println!(
        "Put one <project>.jsonl per project in {}",
        result.data_dir.display().to_string().bold()
    );
    Ok(())
}
