//! Workspace handle providing the main tether API.
//!
//! A workspace is a directory holding a `.tether/` folder next to (or
//! inside) a change-graph repository:
//!
//! ```text
//! .tether/
//!   config.toml
//!   ACTIVE                 current { node_id, session_id }
//!   sessions/<id>.json     one record per session
//!   transcripts/<id>.jsonl one transcript per session
//! ```

use crate::config::{Config, GraphBackend};
use crate::error::{Result, TetherError};
use crate::graph::{ChangeGraph, JjGraph};
use crate::registry::SessionRegistry;
use crate::resolver::{AncestorQuery, AncestorResolver, Resolution};
use crate::session::SessionManager;
use crate::transcript::TranscriptStore;
use crate::types::{ActiveBinding, NodeId, Role, SessionId, SessionRecord, TranscriptEntry};
use crate::TimeProvider;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

const TETHER_DIR: &str = ".tether";

const GITIGNORE: &str = r#"# tether scratch files
ACTIVE
*.tmp
"#;

/// tether workspace handle.
#[derive(Debug)]
pub struct Workspace<G = JjGraph> {
    /// Directory containing `.tether`.
    root: PathBuf,
    config: Config,
    sessions: SessionManager<G>,
}

/// Snapshot of a workspace for `status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceStatus {
    /// Node and session currently being worked on.
    pub active: Option<ActiveBinding>,
    /// Every known session, oldest first.
    pub sessions: Vec<SessionRecord>,
}

impl Workspace<JjGraph> {
    /// Initializes a workspace at `path` using the configured jj binary.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyInitialized` if `.tether` exists.
    pub fn init(path: impl AsRef<Path>) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        create_layout(&root)?;
        Self::open(root)
    }

    /// Opens an existing workspace, building the graph adapter from config.
    ///
    /// # Errors
    ///
    /// Returns `NotInitialized` if there is no `.tether` directory.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        let config = load_config(&root)?;
        let graph = match config.graph.backend {
            GraphBackend::Jj => JjGraph::new(
                config.graph.jj_binary.clone(),
                config.graph.repo_path.clone().unwrap_or_else(|| root.clone()),
            ),
        };
        Ok(Self::assemble(root, config, graph))
    }
}

impl<G: ChangeGraph> Workspace<G> {
    /// Initializes a workspace over an explicit graph.
    pub fn init_with_graph(path: impl AsRef<Path>, graph: G) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        create_layout(&root)?;
        Self::open_with_graph(root, graph)
    }

    /// Opens a workspace over an explicit graph, ignoring `[graph]` config.
    pub fn open_with_graph(path: impl AsRef<Path>, graph: G) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        let config = load_config(&root)?;
        Ok(Self::assemble(root, config, graph))
    }

    fn assemble(root: PathBuf, config: Config, graph: G) -> Self {
        let tether_dir = root.join(TETHER_DIR);
        let transcripts = TranscriptStore::new(tether_dir.join("transcripts"))
            .with_case_sensitive(config.transcript.case_sensitive_search);
        let registry = SessionRegistry::new(&tether_dir);
        Self {
            root,
            config,
            sessions: SessionManager::new(graph, transcripts, registry),
        }
    }

    /// Sets a custom time provider for testing.
    pub fn with_time_provider(mut self, provider: impl TimeProvider + 'static) -> Self {
        self.sessions = self.sessions.with_time_provider(provider);
        self
    }

    /// Returns the workspace root (parent of `.tether`).
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the `.tether` directory path.
    pub fn tether_dir(&self) -> PathBuf {
        self.root.join(TETHER_DIR)
    }

    /// Returns the loaded configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the session manager.
    pub fn sessions(&self) -> &SessionManager<G> {
        &self.sessions
    }

    /// Returns a resolver using the workspace's resolver config.
    pub fn resolver(&self) -> AncestorResolver<'_, G> {
        AncestorResolver::new(&self.sessions, self.config.resolver.clone())
    }

    /// Returns the active binding, if any.
    pub fn active(&self) -> Result<Option<ActiveBinding>> {
        self.sessions.registry().read_active()
    }

    /// Returns the active binding or `NoActiveBinding`.
    pub fn require_active(&self) -> Result<ActiveBinding> {
        self.active()?.ok_or(TetherError::NoActiveBinding)
    }

    /// Starts a session on the graph's current node and makes it active.
    pub fn start(&self, task: &str) -> Result<ActiveBinding> {
        let (node_id, session_id) = self.sessions.start_session(task)?;
        self.activate(node_id, session_id)
    }

    /// Resumes the session linked from `node_id` and makes it active.
    pub fn resume(&self, node_id: &NodeId) -> Result<ActiveBinding> {
        let session_id = self.sessions.resume_session(node_id)?;
        self.activate(node_id.clone(), session_id)
    }

    /// Checkpoints the active session onto a new child node.
    ///
    /// The new node is described with `summary`, or the session's task.
    pub fn continue_session(&self, summary: Option<&str>) -> Result<ActiveBinding> {
        let active = self.require_active()?;
        let description = match summary {
            Some(s) => s.to_string(),
            None => self.sessions.session(&active.session_id)?.task,
        };
        let node_id = self
            .sessions
            .checkpoint(&active.session_id, &active.node_id, &description)?;
        self.activate(node_id, active.session_id)
    }

    /// Appends a turn to the active session.
    pub fn record_turn(&self, role: Role, content: &str) -> Result<TranscriptEntry> {
        let active = self.require_active()?;
        self.sessions.append_turn(&active.session_id, role, content)
    }

    /// Rewrites the active node's summary, keeping its link.
    pub fn describe(&self, summary: &str) -> Result<NodeId> {
        let active = self.require_active()?;
        self.sessions.sync_description(&active.node_id, summary)?;
        Ok(active.node_id)
    }

    /// Resolves ancestor context for `node_id`, or the active node.
    pub fn query_ancestor(
        &self,
        node_id: Option<&NodeId>,
        query: &AncestorQuery,
    ) -> Result<Resolution> {
        let from = match node_id {
            Some(id) => id.clone(),
            None => self.require_active()?.node_id,
        };
        self.resolver().query_ancestor(&from, query)
    }

    /// Retires a session, clearing the active binding if it pointed there.
    pub fn retire(&self, session_id: &SessionId) -> Result<()> {
        self.sessions.mark_non_resumable(session_id)?;
        if let Some(active) = self.active()? {
            if &active.session_id == session_id {
                self.sessions.registry().clear_active()?;
            }
        }
        Ok(())
    }

    /// Returns the active binding and every session record.
    pub fn status(&self) -> Result<WorkspaceStatus> {
        Ok(WorkspaceStatus {
            active: self.active()?,
            sessions: self.sessions.registry().list()?,
        })
    }

    fn activate(&self, node_id: NodeId, session_id: SessionId) -> Result<ActiveBinding> {
        let binding = ActiveBinding {
            node_id,
            session_id,
        };
        self.sessions.registry().write_active(&binding)?;
        Ok(binding)
    }
}

fn create_layout(root: &Path) -> Result<()> {
    let tether_dir = root.join(TETHER_DIR);
    if tether_dir.exists() {
        return Err(TetherError::AlreadyInitialized(tether_dir));
    }

    fs::create_dir_all(tether_dir.join("sessions"))?;
    fs::create_dir_all(tether_dir.join("transcripts"))?;
    Config::default().save(&tether_dir)?;
    fs::write(tether_dir.join(".gitignore"), GITIGNORE)?;

    info!(path = %tether_dir.display(), "initialized tether workspace");
    Ok(())
}

fn load_config(root: &Path) -> Result<Config> {
    let tether_dir = root.join(TETHER_DIR);
    if !tether_dir.is_dir() {
        return Err(TetherError::NotInitialized(root.to_path_buf()));
    }
    Config::load(&tether_dir)
}
