//! `stratum dead-code` command implementation.

use anyhow::Result;
use colored::Colorize;
use stratum::QueryOutcome;

use super::App;
use super::display::{print_json, print_keys, print_unavailable};

/// Run the dead-code command. An empty `prefixes` uses the configured list.
pub async fn run(app: &App, prefixes: &[String]) -> Result<()> {
    let prefixes = (!prefixes.is_empty()).then_some(prefixes);
    let outcome = app.query_engine().find_dead_code(prefixes).await;

    if app.json() {
        return print_json(&outcome);
    }

    match outcome {
        QueryOutcome::Available(dead) => {
            println!(
                "Unreferenced code (excluding prefixes: {}):",
                dead.excluded_prefixes.join(", ").dimmed()
            );
            println!();
            println!(
                "  {} ({}):",
                "Procedures".white().bold(),
                dead.procedures.len().to_string().yellow()
            );
            print_keys(&dead.procedures, "(none)");
            println!();
            println!(
                "  {} ({}):",
                "Classes".white().bold(),
                dead.classes.len().to_string().yellow()
            );
            print_keys(&dead.classes, "(none)");
        }
        QueryOutcome::Unavailable(reason) => print_unavailable(&reason),
        QueryOutcome::NoPath => {}
    }
    Ok(())
}
