//! `stratum impact` command implementation.

use anyhow::Result;
use colored::Colorize;
use stratum::query::ImpactResult;
use stratum::{NodeKey, QueryOutcome};

use super::App;
use super::display::{print_json, print_keys, print_unavailable};

/// Run the impact command.
pub async fn run(app: &App, key: &str, depth: u32) -> Result<()> {
    let key: NodeKey = key.parse()?;
    let outcome = app.query_engine().get_impact(&key, depth).await;

    if app.json() {
        return print_json(&outcome);
    }

    match outcome {
        QueryOutcome::Available(impact) => print_impact(&impact),
        QueryOutcome::Unavailable(reason) => print_unavailable(&reason),
        QueryOutcome::NoPath => {}
    }
    Ok(())
}

fn print_impact(impact: &ImpactResult) {
    println!(
        "Impact analysis for {} (depth {}):",
        impact.target.to_string().cyan().bold(),
        impact.max_depth
    );
    println!();

    if !impact.known {
        println!("  {}", "Node not found in the graph store.".yellow());
        return;
    }
    if impact.total_affected == 0 {
        println!("  {}", "Nothing depends on this node.".green());
        return;
    }

    for (depth, keys) in &impact.affected_by_depth {
        let label = if *depth == 1 {
            "Direct dependents".to_string()
        } else {
            format!("Depth {depth}")
        };
        println!(
            "  {} ({}):",
            label.white().bold(),
            keys.len().to_string().yellow()
        );
        print_keys(keys, "(none)");
    }

    println!();
    let by_type = impact
        .affected_by_type
        .iter()
        .map(|(node_type, keys)| format!("{} {node_type}", keys.len()))
        .collect::<Vec<_>>()
        .join(", ");
    println!(
        "  {} affected: {by_type}",
        impact.total_affected.to_string().red().bold()
    );
}
