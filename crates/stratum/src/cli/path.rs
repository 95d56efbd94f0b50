//! `stratum path` command implementation.

use anyhow::Result;
use colored::Colorize;
use stratum::{NodeKey, QueryOutcome};

use super::App;
use super::display::{join_keys, print_json, print_unavailable};

/// Run the path command.
pub async fn run(app: &App, from: &str, to: &str, max_hops: u32) -> Result<()> {
    let source: NodeKey = from.parse()?;
    let target: NodeKey = to.parse()?;
    let outcome = app
        .query_engine()
        .get_path(&source, &target, max_hops)
        .await;

    if app.json() {
        return print_json(&outcome);
    }

    match outcome {
        QueryOutcome::Available(result) => {
            println!(
                "Shortest connections from {} to {} ({} hops):",
                source.to_string().cyan().bold(),
                target.to_string().cyan().bold(),
                result.hops
            );
            for path in &result.paths {
                println!("    {}", join_keys(path));
            }
        }
        QueryOutcome::NoPath => {
            println!(
                "{}",
                format!("No path between {source} and {target} within {max_hops} hops.").yellow()
            );
        }
        QueryOutcome::Unavailable(reason) => print_unavailable(&reason),
    }
    Ok(())
}
