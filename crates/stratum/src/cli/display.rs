//! Common display utilities for CLI commands.

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;
use stratum::{NodeKey, UnavailableReason};

const MAX_DISPLAY_ITEMS: usize = 20;

/// Print a value as pretty JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Explain that the graph store could not answer.
pub fn print_unavailable(reason: &UnavailableReason) {
    println!("{}: {reason}", "unavailable".yellow().bold());
    println!(
        "  {}",
        "Run `stratum build <project> --sync` to populate the graph store.".dimmed()
    );
}

/// Display node keys with optional truncation.
///
/// Shows up to `MAX_DISPLAY_ITEMS` keys with bullet points. If there are
/// more, shows "... and N more". If empty, shows the provided
/// `empty_message`.
pub fn print_keys(keys: &[NodeKey], empty_message: &str) {
    if keys.is_empty() {
        println!("    {}", empty_message.dimmed());
        return;
    }

    for key in keys.iter().take(MAX_DISPLAY_ITEMS) {
        println!("    {} {key}", "•".dimmed());
    }

    if keys.len() > MAX_DISPLAY_ITEMS {
        println!(
            "    {} ... and {} more",
            "•".dimmed(),
            keys.len() - MAX_DISPLAY_ITEMS
        );
    }
}

/// Render a chain of keys as `a → b → c`.
pub fn join_keys(keys: &[NodeKey]) -> String {
    keys.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" → ")
}
