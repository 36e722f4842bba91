//! Session link codec.
//!
//! A node's description carries two things in one text field: a
//! human-readable summary and, optionally, a session link. The link is a
//! single trailer line in the description's final paragraph:
//!
//! ```text
//! Add rate limiting to the API gateway
//!
//! Tether-Session: 6f1c2a9e-8d4b-4a53-9f0e-2b7c1d3e4f50
//! ```
//!
//! [`parse_description`] and [`compose_description`] are a strict pair:
//! composing a summary with a link and parsing the result gives back the
//! same summary (trailing whitespace trimmed) and the same session id.

use crate::error::{Result, TetherError};
use crate::types::SessionId;

/// Trailer key used for the session link.
pub const LINK_KEY: &str = "Tether-Session:";

/// The structured binding from a change node to a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionLink {
    /// Linked session.
    pub session_id: SessionId,
}

impl SessionLink {
    /// Creates a link to `session_id`.
    pub fn new(session_id: SessionId) -> Self {
        Self { session_id }
    }

    /// Renders the trailer line (without newline).
    pub fn render(&self) -> String {
        format!("{} {}", LINK_KEY, self.session_id)
    }
}

/// A description split into its human-readable and structured parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDescription {
    /// Summary text with the link trailer removed.
    pub summary: String,
    /// Session link, if the description carries one.
    pub link: Option<SessionLink>,
}

/// Splits a description into summary and session link.
///
/// Only the final paragraph is searched for the trailer, so a summary that
/// merely mentions the key in running text is left alone.
///
/// # Errors
///
/// Returns `InvalidSessionLink` if the trailer value is not a canonical
/// session id, or if the final paragraph carries more than one link.
pub fn parse_description(description: &str) -> Result<ParsedDescription> {
    let mut lines: Vec<&str> = description.lines().collect();
    while lines.last().is_some_and(|l| l.trim().is_empty()) {
        lines.pop();
    }

    let paragraph_start = lines
        .iter()
        .rposition(|l| l.trim().is_empty())
        .map(|i| i + 1)
        .unwrap_or(0);

    let mut link = None;
    let mut kept_tail = Vec::new();
    for line in &lines[paragraph_start..] {
        match line.strip_prefix(LINK_KEY) {
            Some(value) => {
                let value = value.trim();
                let session_id = SessionId::parse(value).ok_or_else(|| {
                    TetherError::InvalidSessionLink(format!("not a session id: {:?}", value))
                })?;
                if link.is_some() {
                    return Err(TetherError::InvalidSessionLink(
                        "description carries more than one session link".to_string(),
                    ));
                }
                link = Some(SessionLink::new(session_id));
            }
            None => kept_tail.push(*line),
        }
    }

    let mut summary_lines: Vec<&str> = lines[..paragraph_start].to_vec();
    if kept_tail.is_empty() {
        while summary_lines.last().is_some_and(|l| l.trim().is_empty()) {
            summary_lines.pop();
        }
    } else {
        summary_lines.extend(kept_tail);
    }

    Ok(ParsedDescription {
        summary: summary_lines.join("\n").trim_end().to_string(),
        link,
    })
}

/// Builds a description from a summary and an optional link.
///
/// Lines in `summary` that start with [`LINK_KEY`] are dropped so summary
/// text can never forge or shadow the real link.
pub fn compose_description(summary: &str, link: Option<&SessionLink>) -> String {
    let cleaned = summary
        .lines()
        .filter(|l| !l.starts_with(LINK_KEY))
        .collect::<Vec<_>>()
        .join("\n");
    let cleaned = cleaned.trim_end();

    match link {
        Some(link) if cleaned.is_empty() => format!("{}\n", link.render()),
        Some(link) => format!("{}\n\n{}\n", cleaned, link.render()),
        None => cleaned.to_string(),
    }
}

/// Reads only the session link from a description.
pub fn read_link(description: &str) -> Result<Option<SessionId>> {
    Ok(parse_description(description)?.link.map(|l| l.session_id))
}
