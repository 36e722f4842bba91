//! tether core library
//!
//! Links agent coding sessions to nodes of a version-control change graph:
//! - Sessions keyed by their own id, referenced from node descriptions
//! - Append-only transcripts, one per session
//! - Ancestor context queries that detect rebases and abandoned nodes
//!
//! # Quick Start
//!
//! ```
//! use tether_core::{MemoryGraph, Role, Workspace};
//! use tempfile::TempDir;
//!
//! let tmp = TempDir::new().unwrap();
//! let ws = Workspace::init_with_graph(tmp.path(), MemoryGraph::new()).unwrap();
//!
//! let active = ws.start("Add rate limiting").unwrap();
//! ws.record_turn(Role::User, "use a token bucket").unwrap();
//!
//! // The node's description now carries the session link.
//! let session = ws.sessions().resume_session(&active.node_id).unwrap();
//! assert_eq!(session, active.session_id);
//! ```
//!
//! # Ancestor context
//!
//! ```
//! use tether_core::{AncestorQuery, Include, MemoryGraph, Role, Workspace};
//! use tempfile::TempDir;
//!
//! let tmp = TempDir::new().unwrap();
//! let ws = Workspace::init_with_graph(tmp.path(), MemoryGraph::new()).unwrap();
//! ws.start("Design the limiter").unwrap();
//! ws.record_turn(Role::Assistant, "token bucket, 10 req/s").unwrap();
//! ws.continue_session(Some("Implement the limiter")).unwrap();
//!
//! let query = AncestorQuery { include: Include::all(), ..Default::default() };
//! let resolution = ws.query_ancestor(None, &query).unwrap();
//! let parent = &resolution.context().unwrap().slices[0];
//! assert_eq!(parent.description.as_deref(), Some("Design the limiter"));
//! ```

mod config;
mod error;
mod graph;
mod link;
mod registry;
mod resolver;
mod session;
mod transcript;
mod types;
mod workspace;

pub use config::{
    Config, GraphBackend, GraphConfig, RebasePolicy, ResolverConfig, TranscriptConfig,
};
pub use error::{Result, TetherError};
pub use graph::{ChangeGraph, JjGraph, MemoryGraph};
pub use link::{
    compose_description, parse_description, read_link, ParsedDescription, SessionLink, LINK_KEY,
};
pub use registry::SessionRegistry;
pub use resolver::{
    AncestorContext, AncestorQuery, AncestorResolver, AncestorSlice, DiscontinuityReason,
    DiscontinuityReport, Include, Resolution,
};
pub use session::{SessionManager, Summarize};
pub use transcript::{Entries, EntryIter, TranscriptFilter, TranscriptStore};
pub use types::*;
pub use workspace::{Workspace, WorkspaceStatus};

/// Time provider trait for testing.
///
/// Allows injecting controlled time into session records and transcript
/// entries. Only used when explicitly set via `with_time_provider()`.
pub trait TimeProvider: Send + Sync {
    /// Returns the current Unix timestamp in seconds.
    fn now(&self) -> i64;
}

impl<F> TimeProvider for F
where
    F: Fn() -> i64 + Send + Sync,
{
    fn now(&self) -> i64 {
        self()
    }
}
