use anyhow::Result;
use tether_core::{DiscontinuityReason, MemoryGraph, TetherError, Workspace};

use super::runner::Labels;

/// Declarative assertions on tether state
pub enum Assertion {
    // Active binding
    ActiveSession(String),
    ActiveNode(String),
    NoActiveBinding,

    // Sessions
    SessionCount(usize),
    SessionResumable(String),
    SessionRetired(String),

    // Links
    NodeLinkedTo {
        node: String,
        session: String,
    },
    NodeUnlinked(String),
    SummaryIs {
        node: String,
        text: String,
    },

    // Transcripts
    TranscriptContents {
        session: String,
        contents: Vec<String>,
    },
    TranscriptContiguous(String),
    SearchCount {
        session: String,
        query: String,
        count: usize,
    },

    // Retrieval
    SliceNodes {
        query: String,
        nodes: Vec<String>,
    },
    SliceDescription {
        query: String,
        node: String,
        text: String,
    },
    SliceTranscript {
        query: String,
        node: String,
        contents: Vec<String>,
    },
    SliceDiff {
        query: String,
        node: String,
        diff: String,
    },
    Skipped {
        query: String,
        nodes: Vec<String>,
    },
    Discontinuity {
        query: String,
        hop: usize,
        reason: ReasonMatch,
        session_retired: bool,
    },

    // Custom
    Custom(Box<dyn Fn(&Workspace<MemoryGraph>, &Labels) -> Result<()> + Send + Sync>),
}

impl std::fmt::Debug for Assertion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ActiveSession(s) => write!(f, "ActiveSession({:?})", s),
            Self::ActiveNode(n) => write!(f, "ActiveNode({:?})", n),
            Self::NoActiveBinding => write!(f, "NoActiveBinding"),
            Self::SessionCount(n) => write!(f, "SessionCount({})", n),
            Self::SessionResumable(s) => write!(f, "SessionResumable({:?})", s),
            Self::SessionRetired(s) => write!(f, "SessionRetired({:?})", s),
            Self::NodeLinkedTo { node, session } => {
                write!(f, "NodeLinkedTo {{ node: {:?}, session: {:?} }}", node, session)
            }
            Self::NodeUnlinked(n) => write!(f, "NodeUnlinked({:?})", n),
            Self::SummaryIs { node, text } => {
                write!(f, "SummaryIs {{ node: {:?}, text: {:?} }}", node, text)
            }
            Self::TranscriptContents { session, contents } => write!(
                f,
                "TranscriptContents {{ session: {:?}, contents: {:?} }}",
                session, contents
            ),
            Self::TranscriptContiguous(s) => write!(f, "TranscriptContiguous({:?})", s),
            Self::SearchCount {
                session,
                query,
                count,
            } => write!(
                f,
                "SearchCount {{ session: {:?}, query: {:?}, count: {} }}",
                session, query, count
            ),
            Self::SliceNodes { query, nodes } => {
                write!(f, "SliceNodes {{ query: {:?}, nodes: {:?} }}", query, nodes)
            }
            Self::SliceDescription { query, node, text } => write!(
                f,
                "SliceDescription {{ query: {:?}, node: {:?}, text: {:?} }}",
                query, node, text
            ),
            Self::SliceTranscript {
                query,
                node,
                contents,
            } => write!(
                f,
                "SliceTranscript {{ query: {:?}, node: {:?}, contents: {:?} }}",
                query, node, contents
            ),
            Self::SliceDiff { query, node, diff } => write!(
                f,
                "SliceDiff {{ query: {:?}, node: {:?}, diff: {:?} }}",
                query, node, diff
            ),
            Self::Skipped { query, nodes } => {
                write!(f, "Skipped {{ query: {:?}, nodes: {:?} }}", query, nodes)
            }
            Self::Discontinuity {
                query,
                hop,
                reason,
                session_retired,
            } => write!(
                f,
                "Discontinuity {{ query: {:?}, hop: {}, reason: {:?}, session_retired: {} }}",
                query, hop, reason, session_retired
            ),
            Self::Custom(_) => write!(f, "Custom(<fn>)"),
        }
    }
}

/// Match against discontinuity reasons
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReasonMatch {
    Missing,
    Abandoned,
    Diverged,
    ParentChanged,
    Rebased,
    UnknownSession,
}

impl ReasonMatch {
    pub fn matches(self, reason: &DiscontinuityReason) -> bool {
        matches!(
            (self, reason),
            (Self::Missing, DiscontinuityReason::Missing)
                | (Self::Abandoned, DiscontinuityReason::Abandoned)
                | (Self::Diverged, DiscontinuityReason::Diverged)
                | (Self::ParentChanged, DiscontinuityReason::ParentChanged { .. })
                | (Self::Rebased, DiscontinuityReason::Rebased { .. })
                | (Self::UnknownSession, DiscontinuityReason::UnknownSession { .. })
        )
    }
}

/// Match against error kinds
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorMatch {
    AdapterUnavailable,
    NodeNotFound,
    NoSessionLink,
    SessionNotResumable,
    OutOfOrderAppend,
    NoActiveBinding,
}

impl ErrorMatch {
    pub fn matches(self, err: &TetherError) -> bool {
        matches!(
            (self, err),
            (Self::AdapterUnavailable, TetherError::AdapterUnavailable(_))
                | (Self::NodeNotFound, TetherError::NodeNotFound(_))
                | (Self::NoSessionLink, TetherError::NoSessionLink(_))
                | (Self::SessionNotResumable, TetherError::SessionNotResumable(_))
                | (Self::OutOfOrderAppend, TetherError::OutOfOrderAppend { .. })
                | (Self::NoActiveBinding, TetherError::NoActiveBinding)
        )
    }
}
