//! `stratum cycles` command implementation.

use anyhow::Result;
use colored::Colorize;
use stratum::{NodeType, QueryOutcome};

use super::App;
use super::display::{join_keys, print_json, print_unavailable};

/// Run the cycles command.
pub async fn run(app: &App, node_type: &str, max_length: usize) -> Result<()> {
    let node_type: NodeType = node_type.parse()?;
    let outcome = app.query_engine().find_cycles(node_type, max_length).await;

    if app.json() {
        return print_json(&outcome);
    }

    match outcome {
        QueryOutcome::Available(cycles) if cycles.is_empty() => {
            println!("{}", "No circular dependencies detected.".green());
        }
        QueryOutcome::Available(cycles) => {
            println!(
                "Found {} circular dependencies:",
                cycles.len().to_string().red().bold()
            );
            println!();

            for (i, cycle) in cycles.iter().enumerate() {
                println!("  {} {}:", "Cycle".yellow().bold(), i + 1);

                // Display cycle as: a → b → c → a
                let mut chain = join_keys(cycle);
                if let Some(first) = cycle.first() {
                    chain.push_str(" → ");
                    chain.push_str(&first.to_string());
                }
                println!("    {}", chain.dimmed());
            }
        }
        QueryOutcome::Unavailable(reason) => print_unavailable(&reason),
        QueryOutcome::NoPath => {}
    }
    Ok(())
}
