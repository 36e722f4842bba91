//! Session lifecycle commands.

use super::{format_time, open_workspace};
use anyhow::{Context, Result};
use console::style;
use tether_core::{NodeId, SessionId};

pub fn start(task: &str) -> Result<()> {
    let ws = open_workspace()?;
    let active = ws.start(task).context("Failed to start session")?;

    println!("Started session {}", style(&active.session_id).cyan());
    println!("  Node: {}", active.node_id);
    println!("  Task: {}", task.trim());
    Ok(())
}

pub fn resume(node: &str) -> Result<()> {
    let ws = open_workspace()?;
    let node_id = NodeId::new(node);
    let active = ws
        .resume(&node_id)
        .with_context(|| format!("Failed to resume session from {}", node_id))?;
    let turns = ws.sessions().transcripts().len(&active.session_id)?;

    println!("Resumed session {}", style(&active.session_id).cyan());
    println!("  Node: {}", active.node_id);
    println!("  Turns so far: {}", turns);
    Ok(())
}

/// Checkpoint the active session onto a new child node.
pub fn continue_session(summary: Option<&str>) -> Result<()> {
    let ws = open_workspace()?;
    let previous = ws.require_active()?;
    let active = ws
        .continue_session(summary)
        .context("Failed to checkpoint session")?;

    println!(
        "{} Checkpointed {} -> {}",
        style("✓").green(),
        previous.node_id,
        style(&active.node_id).cyan()
    );
    println!("  Session: {}", active.session_id);
    Ok(())
}

pub fn status() -> Result<()> {
    let ws = open_workspace()?;
    let status = ws.status()?;

    match &status.active {
        Some(active) => {
            println!("Active session: {}", style(&active.session_id).cyan());
            println!("  Node: {}", active.node_id);
        }
        None => println!("No active session"),
    }

    if status.sessions.is_empty() {
        return Ok(());
    }

    println!();
    println!("{}", style("Sessions:").bold());
    for record in &status.sessions {
        let turns = ws.sessions().transcripts().len(&record.session_id)?;
        let state = if record.resumable {
            style("resumable").green()
        } else {
            style("retired").red()
        };
        println!("  {} [{}]", record.session_id, state);
        println!("    Task: {}", record.task);
        println!("    Root: {}", record.root_node_id);
        println!("    Created: {}", format_time(record.created_at));
        println!(
            "    Nodes: {}  Turns: {}",
            record.checkpoints.len(),
            turns
        );
    }
    Ok(())
}

/// Retire a session. Its transcript is kept.
pub fn retire(session: &str) -> Result<()> {
    let session_id = SessionId::parse(session)
        .with_context(|| format!("{:?} is not a session id", session))?;
    let ws = open_workspace()?;
    ws.retire(&session_id)
        .with_context(|| format!("Failed to retire session {}", session_id))?;

    println!("{} Session {} marked non-resumable", style("✓").green(), session_id);
    Ok(())
}
