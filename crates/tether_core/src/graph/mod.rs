//! Change graph adapter.
//!
//! The change graph belongs to an external version-control system. This
//! module only defines the narrow surface tether needs from it and two
//! implementations: [`JjGraph`], which shells out to `jj`, and
//! [`MemoryGraph`], an in-process graph for tests and embedders.
//!
//! Every call is a potential suspension point (process I/O for jj), so
//! callers must not hold their own locks across adapter calls.

mod jj;
mod memory;

pub use jj::JjGraph;
pub use memory::MemoryGraph;

use crate::error::Result;
use crate::types::{ChangeNode, NodeId};

/// Query/mutation surface over an external change graph.
///
/// Errors are limited to `AdapterUnavailable` (transient) and
/// `NodeNotFound` (permanent for that id), plus `Io` for local failures.
pub trait ChangeGraph {
    /// Creates a node on top of `parent` (or the backend's current node when
    /// `None`) and returns its id.
    fn create_node(&self, parent: Option<&NodeId>, description: &str) -> Result<NodeId>;

    /// Reads the current state of a node.
    fn read_node(&self, node_id: &NodeId) -> Result<ChangeNode>;

    /// Replaces a node's description.
    fn write_description(&self, node_id: &NodeId, description: &str) -> Result<()>;

    /// Lists up to `max_depth` first-parent ancestors, closest first.
    ///
    /// Fewer than `max_depth` ids means the walk reached the graph root.
    fn list_ancestors(&self, node_id: &NodeId, max_depth: usize) -> Result<Vec<NodeId>>;

    /// Returns the node's diff against its parent, in the backend's format.
    fn diff(&self, node_id: &NodeId) -> Result<String>;
}

impl<G: ChangeGraph + ?Sized> ChangeGraph for &G {
    fn create_node(&self, parent: Option<&NodeId>, description: &str) -> Result<NodeId> {
        (**self).create_node(parent, description)
    }

    fn read_node(&self, node_id: &NodeId) -> Result<ChangeNode> {
        (**self).read_node(node_id)
    }

    fn write_description(&self, node_id: &NodeId, description: &str) -> Result<()> {
        (**self).write_description(node_id, description)
    }

    fn list_ancestors(&self, node_id: &NodeId, max_depth: usize) -> Result<Vec<NodeId>> {
        (**self).list_ancestors(node_id, max_depth)
    }

    fn diff(&self, node_id: &NodeId) -> Result<String> {
        (**self).diff(node_id)
    }
}
