//! Core data types for tether.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier of a node in the external change graph.
///
/// For the jj backend this is a change id, which survives rebase and amend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Wraps a backend-assigned id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identifier of a conversational lineage.
///
/// Generated once per session and never derived from a [`NodeId`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Generates a fresh random session id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Parses a session id, accepting only canonical hyphenated UUIDs.
    pub fn parse(s: &str) -> Option<Self> {
        let uuid = uuid::Uuid::parse_str(s).ok()?;
        let canonical = uuid.hyphenated().to_string();
        (canonical == s).then_some(Self(canonical))
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether a change node is still part of the visible graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExistenceState {
    /// Node is visible.
    Present,
    /// Node was abandoned (hidden) but is still known to the backend.
    Abandoned,
    /// Backend could not tell.
    Unknown,
}

/// Snapshot of a node read from the change graph.
///
/// Never cached: every read goes back to the adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeNode {
    /// Stable node id.
    pub node_id: NodeId,
    /// Full description text, including any session link.
    pub description: String,
    /// Parent ids, first parent first.
    pub parents: Vec<NodeId>,
    /// Visibility of the node.
    pub state: ExistenceState,
}

impl ChangeNode {
    /// Returns the first parent, if any.
    pub fn parent(&self) -> Option<&NodeId> {
        self.parents.first()
    }
}

/// Author of a transcript turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Human operator.
    User,
    /// The agent.
    Assistant,
    /// System or harness message.
    System,
    /// Tool call or tool output.
    Tool,
}

impl Role {
    /// Parses a role name as used on the command line.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "user" => Some(Self::User),
            "assistant" | "agent" => Some(Self::Assistant),
            "system" => Some(Self::System),
            "tool" => Some(Self::Tool),
            _ => None,
        }
    }

    /// Lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
            Self::Tool => "tool",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One turn of a session transcript, stored as a single JSON line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    /// Position in the session; strictly increasing and never reused.
    pub turn_index: u64,
    /// Who produced the turn.
    pub role: Role,
    /// Turn text.
    pub content: String,
    /// Unix timestamp (seconds).
    pub timestamp: i64,
}

/// Marks the first transcript turn that belongs to a linked node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointMark {
    /// Node created by start or checkpoint.
    pub node_id: NodeId,
    /// Transcript length when the node was created.
    pub first_turn: u64,
    /// Unix timestamp (seconds).
    pub created_at: i64,
}

/// Persisted record of a session lineage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Lineage id.
    pub session_id: SessionId,
    /// Node the session began at.
    pub root_node_id: NodeId,
    /// Cleared when the lineage is retired; never set again.
    pub resumable: bool,
    /// Unix timestamp (seconds).
    pub created_at: i64,
    /// Initial task description.
    pub task: String,
    /// Root mark followed by one mark per checkpoint, oldest first.
    #[serde(default)]
    pub checkpoints: Vec<CheckpointMark>,
}

impl SessionRecord {
    /// Returns the transcript span `[start, end)` owned by `node_id`.
    ///
    /// `end` is `None` for the latest node of the lineage.
    pub fn span_of(&self, node_id: &NodeId) -> Option<(u64, Option<u64>)> {
        let pos = self.checkpoints.iter().position(|m| &m.node_id == node_id)?;
        let start = self.checkpoints[pos].first_turn;
        let end = self.checkpoints.get(pos + 1).map(|m| m.first_turn);
        Some((start, end))
    }

    /// Whether `node_id` was produced by this lineage.
    pub fn contains_node(&self, node_id: &NodeId) -> bool {
        self.checkpoints.iter().any(|m| &m.node_id == node_id)
    }
}

/// The node/session pair the CLI is currently working on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveBinding {
    /// Current node.
    pub node_id: NodeId,
    /// Session linked to it.
    pub session_id: SessionId,
}
