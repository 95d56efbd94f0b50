//! `stratum hubs` command implementation.

use anyhow::Result;
use colored::Colorize;
use stratum::QueryOutcome;

use super::App;
use super::display::{print_json, print_unavailable};

/// Run the hubs command.
pub async fn run(app: &App, min: usize) -> Result<()> {
    let outcome = app.query_engine().find_hubs(min).await;

    if app.json() {
        return print_json(&outcome);
    }

    match outcome {
        QueryOutcome::Available(hubs) if hubs.is_empty() => {
            println!("{}", format!("No nodes with {min} or more connections.").green());
        }
        QueryOutcome::Available(hubs) => {
            println!(
                "Found {} hubs with at least {min} connections:",
                hubs.len().to_string().yellow().bold()
            );
            println!();
            println!("  {:>5} {:>5} {:>5}  NODE", "TOTAL", "IN", "OUT");
            for hub in &hubs {
                println!(
                    "  {:>5} {:>5} {:>5}  {}",
                    hub.total.to_string().bold(),
                    hub.incoming,
                    hub.outgoing,
                    hub.key
                );
            }
        }
        QueryOutcome::Unavailable(reason) => print_unavailable(&reason),
        QueryOutcome::NoPath => {}
    }
    Ok(())
}
