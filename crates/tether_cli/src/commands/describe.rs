//! Describe command - sync a summary into a node description.

use super::open_workspace;
use anyhow::{Context, Result};
use console::style;
use tether_core::NodeId;

/// Replace the summary of a node (the active one by default), keeping its
/// session link.
pub fn run(summary: &str, node: Option<&str>) -> Result<()> {
    let ws = open_workspace()?;
    let node_id = match node {
        Some(id) => {
            let id = NodeId::new(id);
            ws.sessions()
                .sync_description(&id, summary)
                .with_context(|| format!("Failed to describe {}", id))?;
            id
        }
        None => ws.describe(summary).context("Failed to describe active node")?,
    };

    println!("{} Updated description of {}", style("✓").green(), node_id);
    Ok(())
}
