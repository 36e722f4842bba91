//! Error types for tether_core operations.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for tether_core operations.
///
/// Ancestor discontinuities are deliberately absent: they are a normal
/// outcome of [`crate::AncestorResolver::query_ancestor`], not a failure.
#[derive(Error, Debug)]
pub enum TetherError {
    /// The version-control system could not be reached or failed transiently.
    #[error("change graph unavailable: {0}")]
    AdapterUnavailable(String),

    /// The change graph has no node with the given id.
    #[error("change node not found: {0}")]
    NodeNotFound(String),

    /// The node exists but its description carries no session link.
    #[error("change node {0} has no session link")]
    NoSessionLink(String),

    /// The session has been retired and can no longer be resumed or extended.
    #[error("session {0} is not resumable")]
    SessionNotResumable(String),

    /// A transcript append did not continue the session's turn sequence.
    #[error("out-of-order append to session {session_id}: expected turn {expected}, got {got}")]
    OutOfOrderAppend {
        /// Session the append targeted
        session_id: String,
        /// Turn index the transcript would accept next
        expected: u64,
        /// Turn index the caller supplied
        got: u64,
    },

    /// No session record exists for the id.
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// A description contains a malformed or ambiguous session link.
    #[error("invalid session link: {0}")]
    InvalidSessionLink(String),

    /// A transcript already exists for a freshly generated session.
    #[error("transcript already exists for session {0}")]
    TranscriptAlreadyExists(String),

    /// A transcript line could not be decoded.
    #[error("corrupted transcript at {}:{}: {}", path.display(), line, reason)]
    CorruptedTranscript {
        /// Path to the transcript file
        path: PathBuf,
        /// 1-based line number
        line: usize,
        /// Description of the corruption
        reason: String,
    },

    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error while persisting records.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error while loading records.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Configuration error (loading, parsing, invalid values).
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// The directory has no `.tether` workspace.
    #[error("not a tether workspace: {}", .0.display())]
    NotInitialized(PathBuf),

    /// `init` was called on a directory that already has a workspace.
    #[error("tether workspace already exists at {}", .0.display())]
    AlreadyInitialized(PathBuf),

    /// No active node/session binding has been recorded.
    #[error("no active session binding")]
    NoActiveBinding,
}

impl TetherError {
    /// Returns true when retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::AdapterUnavailable(_))
    }

    /// Returns a user-friendly recovery suggestion for the error, if available.
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            Self::AdapterUnavailable(_) => {
                Some("Check that `jj` is installed and the workspace is a jj repository, then retry.")
            }
            Self::NodeNotFound(_) => {
                Some("The change may have been abandoned or squashed. Inspect it with 'jj log'.")
            }
            Self::NoSessionLink(_) => {
                Some("This change was never linked to a session. Start a fresh one with 'tether start <task>'.")
            }
            Self::SessionNotResumable(_) => {
                Some("The lineage is retired. Its transcript is kept for audit; start a new session instead.")
            }
            Self::OutOfOrderAppend { .. } => {
                Some("Another writer appended to this session. Re-read the transcript before appending.")
            }
            Self::CorruptedTranscript { .. } => {
                Some("The transcript file was edited outside tether. Restore it from backup.")
            }
            Self::NotInitialized(_) => Some("Run 'tether init' in the repository root."),
            Self::NoActiveBinding => {
                Some("Start a session with 'tether start <task>' or resume one with 'tether resume <node>'.")
            }
            _ => None,
        }
    }
}

/// Convenience Result type for tether_core operations.
pub type Result<T> = std::result::Result<T, TetherError>;
