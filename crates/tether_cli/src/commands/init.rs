//! Initialize a new tether workspace.

use anyhow::{Context, Result};
use console::style;
use tether_core::Workspace;

/// Initialize a tether workspace in the current directory.
pub fn run() -> Result<()> {
    let ws = Workspace::init(".").context("Failed to initialize tether workspace")?;

    println!("Initialized tether workspace in .tether/");
    println!();
    println!("Directory structure:");
    println!("  .tether/sessions/     - One record per session");
    println!("  .tether/transcripts/  - One append-only transcript per session");
    println!();
    println!("Configuration written to .tether/config.toml");

    if !ws.sessions().graph().is_available() {
        println!();
        println!(
            "{} `{}` could not be run. Install jj or set graph.jj_binary in the config.",
            style("warning:").yellow().bold(),
            ws.config().graph.jj_binary
        );
    }

    Ok(())
}
