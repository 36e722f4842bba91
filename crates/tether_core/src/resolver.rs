//! Ancestor context resolution.
//!
//! Walks first-parent ancestors of a node and collects, for every linked
//! ancestor, the requested slices: summary, diff and the node's share of its
//! session transcript. Nodes without a link are graph-only checkpoints and
//! are skipped.
//!
//! Nothing about the graph is trusted from earlier calls. Each hop is read
//! again and checked; a missing, abandoned or re-parented node, or a chain
//! that leaves a lineage before reaching its root, ends the walk with a
//! [`DiscontinuityReport`] instead of a partial answer.

use crate::config::{RebasePolicy, ResolverConfig};
use crate::error::{Result, TetherError};
use crate::graph::ChangeGraph;
use crate::link::parse_description;
use crate::session::SessionManager;
use crate::transcript::TranscriptFilter;
use crate::types::{ChangeNode, ExistenceState, NodeId, SessionId, SessionRecord, TranscriptEntry};
use serde::Serialize;
use std::fmt;
use tracing::{debug, warn};

/// Which slices to fetch for each linked ancestor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Include {
    /// Human-readable summary from the node description.
    pub description: bool,
    /// Diff from the change graph.
    pub diff: bool,
    /// The node's span of its session transcript.
    pub transcript: bool,
}

impl Include {
    /// Only the description.
    pub fn description() -> Self {
        Self {
            description: true,
            ..Default::default()
        }
    }

    /// Every slice.
    pub fn all() -> Self {
        Self {
            description: true,
            diff: true,
            transcript: true,
        }
    }

    /// Parses a comma-separated list such as `description,transcript`.
    pub fn parse(list: &str) -> Option<Self> {
        let mut include = Self::default();
        for part in list.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            match part {
                "description" => include.description = true,
                "diff" => include.diff = true,
                "transcript" => include.transcript = true,
                "all" => include = Self::all(),
                _ => return None,
            }
        }
        Some(include)
    }
}

/// An ancestor context request.
#[derive(Debug, Clone, Default)]
pub struct AncestorQuery {
    /// Hops to walk; `None` uses the configured default.
    pub depth: Option<usize>,
    /// Slices to fetch.
    pub include: Include,
    /// Narrows transcript slices.
    pub transcript_filter: Option<TranscriptFilter>,
}

/// Context gathered from one linked ancestor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AncestorSlice {
    /// Distance from the queried node (1 = parent).
    pub hop: usize,
    /// The ancestor.
    pub node_id: NodeId,
    /// Session it is linked to.
    pub session_id: SessionId,
    /// Summary text, if requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Diff, if requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<String>,
    /// Transcript span, if requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript: Option<Vec<TranscriptEntry>>,
}

/// A fully resolved ancestor walk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AncestorContext {
    /// Node the walk started from.
    pub from: NodeId,
    /// Depth actually used.
    pub depth: usize,
    /// One slice per linked ancestor, closest first.
    pub slices: Vec<AncestorSlice>,
    /// Unlinked ancestors walked past.
    pub skipped: Vec<NodeId>,
    /// True if the walk stopped at the graph root before `depth` hops.
    pub reached_graph_root: bool,
}

/// Why a walk could not be trusted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiscontinuityReason {
    /// The node no longer exists.
    Missing,
    /// The node was abandoned.
    Abandoned,
    /// The backend could not determine a single state (e.g. divergent change).
    Diverged,
    /// The node's parent is not the ancestor listed for the next hop.
    ParentChanged {
        /// Ancestor listed by the graph.
        expected: NodeId,
        /// Parent actually recorded on the child.
        actual: Option<NodeId>,
    },
    /// A lineage was left before its root was reached.
    Rebased {
        /// Lineage being walked.
        lineage: SessionId,
        /// Its root node, never reached.
        root: NodeId,
        /// Session of the node found instead; `None` if the graph ended.
        found: Option<SessionId>,
    },
    /// The node links to a session with no record.
    UnknownSession {
        /// Session named by the link.
        session_id: SessionId,
    },
}

impl fmt::Display for DiscontinuityReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => write!(f, "node no longer exists"),
            Self::Abandoned => write!(f, "node was abandoned"),
            Self::Diverged => write!(f, "node state is ambiguous (divergent change?)"),
            Self::ParentChanged { expected, actual } => match actual {
                Some(actual) => write!(f, "parent changed: expected {}, found {}", expected, actual),
                None => write!(f, "parent changed: expected {}, found none", expected),
            },
            Self::Rebased { lineage, root, found: Some(found) } => write!(
                f,
                "lineage {} left before its root {}: reached session {}",
                lineage, root, found
            ),
            Self::Rebased { lineage, root, found: None } => write!(
                f,
                "lineage {} left before its root {}: reached the graph root",
                lineage, root
            ),
            Self::UnknownSession { session_id } => {
                write!(f, "linked session {} has no record", session_id)
            }
        }
    }
}

/// A walk that stopped because the chain could not be trusted.
///
/// This is a normal result, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscontinuityReport {
    /// Node the walk started from.
    pub from: NodeId,
    /// Hop where the walk stopped (0 = the queried node itself).
    pub hop: usize,
    /// Node at that hop.
    pub node_id: NodeId,
    /// What was wrong.
    pub reason: DiscontinuityReason,
    /// True if the rebase policy retired the affected session.
    pub session_retired: bool,
}

/// Outcome of [`AncestorResolver::query_ancestor`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Resolution {
    /// Every hop checked out.
    Context(AncestorContext),
    /// The walk stopped early.
    Discontinuity(DiscontinuityReport),
}

impl Resolution {
    /// Returns the context, if resolution succeeded.
    pub fn context(&self) -> Option<&AncestorContext> {
        match self {
            Self::Context(ctx) => Some(ctx),
            Self::Discontinuity(_) => None,
        }
    }

    /// Returns the discontinuity report, if any.
    pub fn discontinuity(&self) -> Option<&DiscontinuityReport> {
        match self {
            Self::Context(_) => None,
            Self::Discontinuity(report) => Some(report),
        }
    }
}

/// Serves cross-session context queries.
pub struct AncestorResolver<'a, G> {
    sessions: &'a SessionManager<G>,
    config: ResolverConfig,
}

/// Result of checking one hop: a usable node or a reason to stop.
type Checked<T> = std::result::Result<T, DiscontinuityReason>;

impl<'a, G: ChangeGraph> AncestorResolver<'a, G> {
    /// Creates a resolver over a session manager.
    pub fn new(sessions: &'a SessionManager<G>, config: ResolverConfig) -> Self {
        Self { sessions, config }
    }

    /// Walks up from `from` and gathers context.
    ///
    /// # Errors
    ///
    /// Only adapter availability, local I/O and malformed-link errors are
    /// returned as errors. Every problem with the graph's shape is reported
    /// as [`Resolution::Discontinuity`].
    pub fn query_ancestor(&self, from: &NodeId, query: &AncestorQuery) -> Result<Resolution> {
        let depth = query
            .depth
            .unwrap_or(self.config.default_depth)
            .clamp(1, self.config.max_depth.max(1));
        debug!(from = %from, depth, "resolving ancestor context");

        let start = match self.check_node(from)? {
            Ok(node) => node,
            Err(reason) => return self.stop(from, 0, from, reason, None),
        };

        // Lineage whose root has not been reached yet.
        let mut pending: Option<SessionRecord> = match self.linked_record(&start)? {
            Ok(Some(record)) if &record.root_node_id != from => Some(record),
            Ok(_) => None,
            Err(reason) => return self.stop(from, 0, from, reason, None),
        };

        let ancestors = match self.sessions.graph().list_ancestors(from, depth) {
            Ok(ids) => ids,
            Err(TetherError::NodeNotFound(_)) => {
                return self.stop(from, 0, from, DiscontinuityReason::Missing, None)
            }
            Err(e) => return Err(e),
        };

        let mut slices = Vec::new();
        let mut skipped = Vec::new();
        let mut child = start;

        for (i, node_id) in ancestors.iter().enumerate() {
            let hop = i + 1;

            if child.parent() != Some(node_id) {
                let reason = DiscontinuityReason::ParentChanged {
                    expected: node_id.clone(),
                    actual: child.parent().cloned(),
                };
                return self.stop(from, i, &child.node_id, reason, None);
            }

            let node = match self.check_node(node_id)? {
                Ok(node) => node,
                Err(reason) => return self.stop(from, hop, node_id, reason, None),
            };

            match self.linked_record(&node)? {
                Err(reason) => return self.stop(from, hop, node_id, reason, None),
                Ok(None) => {
                    debug!(hop, node_id = %node_id, "skipping unlinked ancestor");
                    skipped.push(node_id.clone());
                }
                Ok(Some(record)) => {
                    if let Some(lineage) = pending.as_ref() {
                        if lineage.session_id != record.session_id {
                            let reason = DiscontinuityReason::Rebased {
                                lineage: lineage.session_id.clone(),
                                root: lineage.root_node_id.clone(),
                                found: Some(record.session_id.clone()),
                            };
                            let affected = lineage.session_id.clone();
                            return self.stop(from, hop, node_id, reason, Some(&affected));
                        }
                    }

                    match self.slice(hop, &node, &record, query)? {
                        Ok(slice) => slices.push(slice),
                        Err(reason) => return self.stop(from, hop, node_id, reason, None),
                    }
                    pending = (&record.root_node_id != node_id).then_some(record);
                }
            }

            child = node;
        }

        let reached_graph_root = child.parent().is_none();
        if reached_graph_root {
            if let Some(lineage) = pending {
                let reason = DiscontinuityReason::Rebased {
                    lineage: lineage.session_id.clone(),
                    root: lineage.root_node_id.clone(),
                    found: None,
                };
                let last = child.node_id.clone();
                return self.stop(from, ancestors.len(), &last, reason, Some(&lineage.session_id));
            }
        }

        Ok(Resolution::Context(AncestorContext {
            from: from.clone(),
            depth,
            slices,
            skipped,
            reached_graph_root,
        }))
    }

    /// Reads a node and checks that it is usable.
    fn check_node(&self, node_id: &NodeId) -> Result<Checked<ChangeNode>> {
        match self.sessions.graph().read_node(node_id) {
            Ok(node) => Ok(match node.state {
                ExistenceState::Present => Ok(node),
                ExistenceState::Abandoned => Err(DiscontinuityReason::Abandoned),
                ExistenceState::Unknown => Err(DiscontinuityReason::Diverged),
            }),
            Err(TetherError::NodeNotFound(_)) => Ok(Err(DiscontinuityReason::Missing)),
            Err(e) => Err(e),
        }
    }

    /// Loads the record of the session a node links to, if any.
    fn linked_record(&self, node: &ChangeNode) -> Result<Checked<Option<SessionRecord>>> {
        let Some(session_id) = parse_description(&node.description)?.link.map(|l| l.session_id)
        else {
            return Ok(Ok(None));
        };
        match self.sessions.session(&session_id) {
            Ok(record) => Ok(Ok(Some(record))),
            Err(TetherError::SessionNotFound(_)) => {
                Ok(Err(DiscontinuityReason::UnknownSession { session_id }))
            }
            Err(e) => Err(e),
        }
    }

    fn slice(
        &self,
        hop: usize,
        node: &ChangeNode,
        record: &SessionRecord,
        query: &AncestorQuery,
    ) -> Result<Checked<AncestorSlice>> {
        let description = if query.include.description {
            Some(parse_description(&node.description)?.summary)
        } else {
            None
        };

        let diff = if query.include.diff {
            match self.sessions.graph().diff(&node.node_id) {
                Ok(diff) => Some(diff),
                Err(TetherError::NodeNotFound(_)) => return Ok(Err(DiscontinuityReason::Missing)),
                Err(e) => return Err(e),
            }
        } else {
            None
        };

        let transcript = if query.include.transcript {
            // A node missing from the record (e.g. a split change that kept
            // the link) sees the whole session.
            let (start, end) = record.span_of(&node.node_id).unwrap_or((0, None));
            let filter = query.transcript_filter.clone().unwrap_or_default();
            let entries = self
                .sessions
                .transcripts()
                .filtered(&record.session_id, Some(start..end.unwrap_or(u64::MAX)), filter)?
                .to_vec()?;
            Some(entries)
        } else {
            None
        };

        Ok(Ok(AncestorSlice {
            hop,
            node_id: node.node_id.clone(),
            session_id: record.session_id.clone(),
            description,
            diff,
            transcript,
        }))
    }

    /// Builds a discontinuity result, applying the rebase policy when a
    /// lineage was left early.
    fn stop(
        &self,
        from: &NodeId,
        hop: usize,
        node_id: &NodeId,
        reason: DiscontinuityReason,
        rebased_lineage: Option<&SessionId>,
    ) -> Result<Resolution> {
        let mut session_retired = false;
        if let Some(session_id) = rebased_lineage {
            if self.config.on_unrelated_rebase == RebasePolicy::MarkNonResumable {
                self.sessions.mark_non_resumable(session_id)?;
                session_retired = true;
            }
        }

        warn!(
            from = %from,
            hop,
            node_id = %node_id,
            reason = %reason,
            session_retired,
            "ancestor chain discontinuity"
        );
        Ok(Resolution::Discontinuity(DiscontinuityReport {
            from: from.clone(),
            hop,
            node_id: node_id.clone(),
            reason,
            session_retired,
        }))
    }
}
