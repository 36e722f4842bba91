//! CLI commands.

pub mod ancestor;
pub mod describe;
pub mod init;
pub mod session;
pub mod transcript;

use anyhow::{Context, Result};
use chrono::DateTime;
use tether_core::Workspace;
use tracing::debug;

/// Opens the workspace in the current directory.
pub fn open_workspace() -> Result<Workspace> {
    let ws = Workspace::open(".").context("Failed to open tether workspace")?;
    debug!(root = %ws.root().display(), backend = ?ws.config().graph.backend, "opened workspace");
    Ok(ws)
}

/// Formats a Unix timestamp for display.
pub fn format_time(unix: i64) -> String {
    DateTime::from_timestamp(unix, 0)
        .unwrap_or_default()
        .format("%Y-%m-%d %H:%M:%S UTC")
        .to_string()
}
