//! `stratum build` command implementation.

use anyhow::{Context, Result};
use colored::Colorize;
use stratum::{BuildReport, GraphSynchronizer, Pipeline, SyncReport};

use super::App;
use super::display::print_json;

/// Run the build command.
pub async fn run(app: &App, project: &str, dry_run: bool, sync: bool) -> Result<()> {
    let config = app.config();
    let mut pipeline =
        Pipeline::new(app.records()).with_read_concurrency(config.build.read_concurrency);

    if sync && !dry_run {
        if let Some(parent) = config.graph_store.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await.with_context(|| {
                format!("failed to create graph store directory {}", parent.display())
            })?;
        }
        pipeline = pipeline.with_synchronizer(GraphSynchronizer::new(
            app.graph_store(),
            config.to_sync_config(),
        ));
    }

    let report = pipeline
        .build_and_persist(project, dry_run)
        .await
        .with_context(|| format!("failed to build project '{project}'"))?;

    if app.json() {
        return print_json(&report);
    }

    print_report(&report);
    Ok(())
}

fn print_report(report: &BuildReport) {
    let verb = if report.dry_run { "Planned" } else { "Built" };
    println!(
        "{verb} {}: {} nodes, {} edges",
        report.project.cyan().bold(),
        report.nodes,
        report.edges
    );
    println!();

    for assignment in &report.assignments {
        let layer = assignment.layer.map_or("-", stratum::Layer::as_str);
        println!(
            "  {:>5}  {:<8}  {}",
            assignment.topological_order.to_string().dimmed(),
            layer,
            assignment.key
        );
    }

    if report.has_cycles {
        println!();
        println!(
            "Found {} circular dependencies:",
            report.cycles.len().to_string().red().bold()
        );
        for cycle in &report.cycles {
            let mut chain = super::display::join_keys(&cycle.nodes);
            if let Some(first) = cycle.nodes.first() {
                chain.push_str(&format!(" → {first}"));
            }
            println!("    {}", chain.dimmed());
            println!("      suggested break: {}", cycle.suggested_break);
        }
    }

    if !report.warnings.is_empty() || !report.skipped.is_empty() {
        println!();
        for warning in report.warnings.iter().chain(&report.skipped) {
            println!("{}: {warning}", "warning".yellow());
        }
    }

    println!();
    if report.dry_run {
        println!("{}", "Dry run: no records were written.".dimmed());
    } else {
        println!(
            "Wrote order to {} of {} records.",
            report.written.to_string().green(),
            report.assignments.len()
        );
    }
    if let Some(error) = &report.save_error {
        println!("{}: failed to save records: {error}", "error".red().bold());
    }
    if let Some(sync) = &report.sync {
        print_sync(sync);
    }
    println!("Fingerprint: {}", report.fingerprint.dimmed());
}

fn print_sync(sync: &SyncReport) {
    if let Some(reason) = &sync.unavailable {
        println!("{}: graph store not synced: {reason}", "warning".yellow());
        return;
    }

    println!(
        "Synced {} nodes and {} edges (run {}).",
        sync.nodes_synced, sync.edges_synced, sync.run_id
    );
    for failure in sync.failed_nodes.iter().chain(&sync.failed_edges) {
        println!(
            "  {} {}: {}",
            "failed".red(),
            failure.item,
            failure.reason.dimmed()
        );
    }
    if sync.pruned_nodes + sync.pruned_edges > 0 {
        println!(
            "Pruned {} stale nodes and {} stale edges.",
            sync.pruned_nodes, sync.pruned_edges
        );
    }
}
