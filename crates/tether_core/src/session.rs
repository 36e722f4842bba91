//! Session lifecycle: start, resume, checkpoint, retire.
//!
//! A session is keyed by its [`SessionId`], never by a node. Nodes point at
//! sessions through the link trailer in their description, and the
//! transcript lives in the [`TranscriptStore`] under the session id. A
//! checkpoint is therefore a pure graph operation: it creates a node, links
//! it, and records where in the transcript the new node's turns begin.

use crate::error::{Result, TetherError};
use crate::graph::ChangeGraph;
use crate::link::{compose_description, parse_description, read_link, SessionLink};
use crate::registry::SessionRegistry;
use crate::transcript::TranscriptStore;
use crate::types::{
    CheckpointMark, ExistenceState, NodeId, Role, SessionId, SessionRecord, TranscriptEntry,
};
use crate::TimeProvider;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// Turns a transcript into a human-readable summary.
///
/// The summarization algorithm itself (usually an LLM call) lives outside
/// this crate. Any `Fn(&[TranscriptEntry]) -> String` works.
pub trait Summarize {
    /// Produces a summary of `transcript`.
    fn summarize(&self, transcript: &[TranscriptEntry]) -> String;
}

impl<F> Summarize for F
where
    F: Fn(&[TranscriptEntry]) -> String,
{
    fn summarize(&self, transcript: &[TranscriptEntry]) -> String {
        self(transcript)
    }
}

/// Owns the node ↔ session mapping.
pub struct SessionManager<G> {
    graph: G,
    transcripts: TranscriptStore,
    registry: SessionRegistry,
    /// Time provider for testing (None = use system time).
    time_provider: Option<Arc<dyn TimeProvider>>,
}

impl<G: ChangeGraph> SessionManager<G> {
    /// Creates a manager over a graph, a transcript store and a registry.
    pub fn new(graph: G, transcripts: TranscriptStore, registry: SessionRegistry) -> Self {
        Self {
            graph,
            transcripts,
            registry,
            time_provider: None,
        }
    }

    /// Sets a custom time provider for testing.
    pub fn with_time_provider(mut self, provider: impl TimeProvider + 'static) -> Self {
        self.time_provider = Some(Arc::new(provider));
        self
    }

    /// Returns the change graph adapter.
    pub fn graph(&self) -> &G {
        &self.graph
    }

    /// Returns the transcript store.
    pub fn transcripts(&self) -> &TranscriptStore {
        &self.transcripts
    }

    /// Returns the session registry.
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Starts a session on top of the graph's current node.
    ///
    /// See [`SessionManager::start_session_on`].
    pub fn start_session(&self, initial_description: &str) -> Result<(NodeId, SessionId)> {
        self.start_session_on(None, initial_description)
    }

    /// Creates a node, links a fresh session to it and creates an empty
    /// transcript.
    ///
    /// The transcript and session record are written before the link, so a
    /// link never names a session without a record. No retry is attempted.
    /// If any step after node creation fails, the node is left unlinked and
    /// the fresh record and transcript are removed.
    pub fn start_session_on(
        &self,
        parent: Option<&NodeId>,
        initial_description: &str,
    ) -> Result<(NodeId, SessionId)> {
        let node_id = self
            .graph
            .create_node(parent, &compose_description(initial_description, None))?;
        let session_id = SessionId::generate();

        let now = self.now();
        let record = SessionRecord {
            session_id: session_id.clone(),
            root_node_id: node_id.clone(),
            resumable: true,
            created_at: now,
            task: initial_description.trim().to_string(),
            checkpoints: vec![CheckpointMark {
                node_id: node_id.clone(),
                first_turn: 0,
                created_at: now,
            }],
        };

        self.transcripts.create(&session_id)?;
        let linked = self
            .registry
            .save(&record)
            .and_then(|()| self.write_link(&node_id, initial_description, &session_id));
        if let Err(e) = linked {
            self.discard_session(&node_id, &session_id);
            return Err(e);
        }

        info!(session_id = %session_id, node_id = %node_id, "started session");
        Ok((node_id, session_id))
    }

    fn discard_session(&self, node_id: &NodeId, session_id: &SessionId) {
        warn!(
            node_id = %node_id,
            session_id = %session_id,
            "session start failed; node left unlinked"
        );
        if let Err(e) = self.registry.remove(session_id) {
            warn!(session_id = %session_id, error = %e, "failed to remove session record");
        }
        if let Err(e) = self.transcripts.discard_empty(session_id) {
            warn!(session_id = %session_id, error = %e, "failed to remove empty transcript");
        }
    }

    /// Resolves the session linked from `node_id`.
    ///
    /// Read-only unless the session's root node turns out to be gone, in
    /// which case the session is retired and `SessionNotResumable` returned.
    ///
    /// # Errors
    ///
    /// - `NodeNotFound` if the node does not exist or was abandoned
    /// - `NoSessionLink` if its description carries no link
    /// - `SessionNotFound` if the link names an unknown session
    /// - `SessionNotResumable` if the session was retired
    pub fn resume_session(&self, node_id: &NodeId) -> Result<SessionId> {
        let node = self.graph.read_node(node_id)?;
        if node.state == ExistenceState::Abandoned {
            return Err(TetherError::NodeNotFound(format!("{} (abandoned)", node_id)));
        }

        let session_id = read_link(&node.description)?
            .ok_or_else(|| TetherError::NoSessionLink(node_id.to_string()))?;
        let record = self.registry.load(&session_id)?;
        if !record.resumable {
            return Err(TetherError::SessionNotResumable(session_id.to_string()));
        }

        if &record.root_node_id != node_id && !self.root_is_alive(&record)? {
            warn!(
                session_id = %session_id,
                root = %record.root_node_id,
                "session root node is gone, retiring session"
            );
            self.mark_non_resumable(&session_id)?;
            return Err(TetherError::SessionNotResumable(session_id.to_string()));
        }

        debug!(session_id = %session_id, node_id = %node_id, "resolved session");
        Ok(session_id)
    }

    fn root_is_alive(&self, record: &SessionRecord) -> Result<bool> {
        match self.graph.read_node(&record.root_node_id) {
            Ok(root) => Ok(root.state != ExistenceState::Abandoned),
            Err(TetherError::NodeNotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Creates a child of `current` linked to the same session.
    ///
    /// The transcript is untouched: later turns keep appending to the same
    /// log, and the new node owns the turns from the current transcript
    /// length onwards.
    ///
    /// # Errors
    ///
    /// Returns `SessionNotResumable` for a retired session. Adapter errors
    /// are returned as-is; if the node was created but the link write
    /// failed, the node stays unlinked and the session record is unchanged.
    pub fn checkpoint(
        &self,
        session_id: &SessionId,
        current: &NodeId,
        new_description: &str,
    ) -> Result<NodeId> {
        let record = self.registry.load(session_id)?;
        if !record.resumable {
            return Err(TetherError::SessionNotResumable(session_id.to_string()));
        }
        let first_turn = self.transcripts.next_index(session_id)?;

        let node_id = self
            .graph
            .create_node(Some(current), &compose_description(new_description, None))?;
        let mut updated = record.clone();
        updated.checkpoints.push(CheckpointMark {
            node_id: node_id.clone(),
            first_turn,
            created_at: self.now(),
        });
        // The mark is saved first so a written link always has one.
        self.registry.save(&updated)?;
        if let Err(e) = self.write_link(&node_id, new_description, session_id) {
            if let Err(restore) = self.registry.save(&record) {
                warn!(
                    session_id = %session_id,
                    error = %restore,
                    "failed to drop checkpoint mark"
                );
            }
            return Err(e);
        }

        info!(
            session_id = %session_id,
            parent = %current,
            node_id = %node_id,
            first_turn,
            "checkpointed session"
        );
        Ok(node_id)
    }

    /// Retires a session. Idempotent; the transcript is kept.
    pub fn mark_non_resumable(&self, session_id: &SessionId) -> Result<()> {
        let mut record = self.registry.load(session_id)?;
        if record.resumable {
            record.resumable = false;
            self.registry.save(&record)?;
            info!(session_id = %session_id, "session marked non-resumable");
        }
        Ok(())
    }

    /// Loads a session record.
    pub fn session(&self, session_id: &SessionId) -> Result<SessionRecord> {
        self.registry.load(session_id)
    }

    /// Reads the session linked from a node, if any.
    pub fn link_of(&self, node_id: &NodeId) -> Result<Option<SessionId>> {
        let node = self.graph.read_node(node_id)?;
        read_link(&node.description)
    }

    /// Appends a turn at the next free index, stamped with the current time.
    ///
    /// # Errors
    ///
    /// Returns `SessionNotResumable` for a retired session.
    pub fn append_turn(
        &self,
        session_id: &SessionId,
        role: Role,
        content: &str,
    ) -> Result<TranscriptEntry> {
        let record = self.registry.load(session_id)?;
        if !record.resumable {
            return Err(TetherError::SessionNotResumable(session_id.to_string()));
        }

        self.transcripts
            .append_next(session_id, role, content, self.now())
    }

    /// Replaces the human-readable part of a node's description.
    ///
    /// Whatever link the node carries is written back unchanged.
    pub fn sync_description(&self, node_id: &NodeId, summary: &str) -> Result<()> {
        let node = self.graph.read_node(node_id)?;
        let parsed = parse_description(&node.description)?;
        self.graph
            .write_description(node_id, &compose_description(summary, parsed.link.as_ref()))?;
        debug!(node_id = %node_id, "synced description");
        Ok(())
    }

    /// Summarizes the session's transcript and syncs it into `node_id`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSessionLink` if the node is linked to another session.
    pub fn sync_from_transcript(
        &self,
        node_id: &NodeId,
        session_id: &SessionId,
        summarizer: &impl Summarize,
    ) -> Result<String> {
        if let Some(linked) = self.link_of(node_id)? {
            if &linked != session_id {
                return Err(TetherError::InvalidSessionLink(format!(
                    "node {} is linked to session {}, not {}",
                    node_id, linked, session_id
                )));
            }
        }

        let entries = self.transcripts.read(session_id, None)?.to_vec()?;
        let summary = summarizer.summarize(&entries);
        self.sync_description(node_id, &summary)?;
        Ok(summary)
    }

    fn write_link(&self, node_id: &NodeId, summary: &str, session_id: &SessionId) -> Result<()> {
        let link = SessionLink::new(session_id.clone());
        self.graph
            .write_description(node_id, &compose_description(summary, Some(&link)))
            .map_err(|e| {
                warn!(
                    node_id = %node_id,
                    session_id = %session_id,
                    error = %e,
                    "node created but session link not written; node left unlinked"
                );
                e
            })
    }

    fn now(&self) -> i64 {
        match &self.time_provider {
            Some(provider) => provider.now(),
            None => current_timestamp(),
        }
    }
}

/// Returns the current Unix timestamp in seconds.
fn current_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

// Manual Debug implementation to skip time_provider field
impl<G: std::fmt::Debug> std::fmt::Debug for SessionManager<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("graph", &self.graph)
            .field("transcripts", &self.transcripts)
            .field("registry", &self.registry)
            .finish()
    }
}
