//! Transcript commands: record, read and search turns.

use super::{format_time, open_workspace};
use anyhow::{Context, Result};
use console::style;
use std::io::Read;
use tether_core::{Role, SessionId, TranscriptEntry, TranscriptFilter, Workspace};

/// Append a turn to the active session. A content of `-` reads stdin.
pub fn turn(role: &str, content: &str) -> Result<()> {
    let role = parse_role(role)?;
    let content = if content == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read turn content from stdin")?;
        buf
    } else {
        content.to_string()
    };

    let ws = open_workspace()?;
    let entry = ws.record_turn(role, &content).context("Failed to append turn")?;
    println!("Recorded turn {} ({})", entry.turn_index, entry.role);
    Ok(())
}

/// Print turns `from..to` of a session (the active one by default).
pub fn log(session: Option<&str>, from: Option<u64>, to: Option<u64>) -> Result<()> {
    let ws = open_workspace()?;
    let session_id = resolve_session(&ws, session)?;

    let range = match (from, to) {
        (None, None) => None,
        (from, to) => Some(from.unwrap_or(0)..to.unwrap_or(u64::MAX)),
    };
    let entries = ws.sessions().transcripts().read(&session_id, range)?;

    let mut shown = 0usize;
    for entry in &entries {
        print_entry(&entry?);
        shown += 1;
    }
    if shown == 0 {
        println!("No turns");
    }
    Ok(())
}

pub fn search(query: &str, role: Option<&str>, session: Option<&str>) -> Result<()> {
    let ws = open_workspace()?;
    let session_id = resolve_session(&ws, session)?;
    let filter = TranscriptFilter {
        text: Some(query.to_string()),
        role: role.map(parse_role).transpose()?,
        last: None,
    };

    let matches = ws
        .sessions()
        .transcripts()
        .filtered(&session_id, None, filter)?
        .to_vec()?;
    if matches.is_empty() {
        println!("No turns match {:?}", query);
    }
    for entry in &matches {
        print_entry(entry);
    }
    Ok(())
}

pub fn parse_role(role: &str) -> Result<Role> {
    Role::parse(role).with_context(|| {
        format!(
            "Unknown role {:?}. Use user, assistant, system or tool.",
            role
        )
    })
}

pub fn print_entry(entry: &TranscriptEntry) {
    println!(
        "{} {} {}",
        style(format!("[{}]", entry.turn_index)).dim(),
        style(entry.role).bold(),
        style(format_time(entry.timestamp)).dim()
    );
    for line in entry.content.lines() {
        println!("    {}", line);
    }
}

fn resolve_session(ws: &Workspace, session: Option<&str>) -> Result<SessionId> {
    match session {
        Some(s) => SessionId::parse(s).with_context(|| format!("{:?} is not a session id", s)),
        None => Ok(ws.require_active()?.session_id),
    }
}
