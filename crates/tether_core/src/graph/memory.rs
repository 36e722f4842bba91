//! In-process change graph.

use super::ChangeGraph;
use crate::error::{Result, TetherError};
use crate::types::{ChangeNode, ExistenceState, NodeId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone)]
struct MemNode {
    description: String,
    parent: Option<NodeId>,
    state: ExistenceState,
    diff: String,
}

#[derive(Debug, Default)]
struct Inner {
    nodes: HashMap<NodeId, MemNode>,
    next_id: u64,
    head: Option<NodeId>,
    unavailable: bool,
    failing_writes: u32,
    rebase_after_listing: Vec<(NodeId, Option<NodeId>)>,
}

/// A change graph held in memory.
///
/// Behaves like a jj repository that keeps abandoned changes around: an
/// abandoned node stays readable (with [`ExistenceState::Abandoned`]) and
/// its children keep pointing at it until they are rebased. Clones share
/// the same graph, so a test can keep a handle for mutating the graph
/// underneath a [`crate::SessionManager`].
#[derive(Debug, Clone, Default)]
pub struct MemoryGraph {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panic while holding the lock cannot leave the map half-updated.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Marks a node abandoned. Its children are left in place.
    pub fn abandon(&self, node_id: &NodeId) -> Result<()> {
        let mut inner = self.lock();
        let node = inner
            .nodes
            .get_mut(node_id)
            .ok_or_else(|| TetherError::NodeNotFound(node_id.to_string()))?;
        node.state = ExistenceState::Abandoned;
        Ok(())
    }

    /// Removes a node entirely, as if it had been garbage collected.
    pub fn forget(&self, node_id: &NodeId) -> Result<()> {
        let mut inner = self.lock();
        inner
            .nodes
            .remove(node_id)
            .map(|_| ())
            .ok_or_else(|| TetherError::NodeNotFound(node_id.to_string()))
    }

    /// Moves a node onto a new parent.
    pub fn rebase(&self, node_id: &NodeId, new_parent: Option<&NodeId>) -> Result<()> {
        let mut inner = self.lock();
        if let Some(parent) = new_parent {
            if !inner.nodes.contains_key(parent) {
                return Err(TetherError::NodeNotFound(parent.to_string()));
            }
        }
        let node = inner
            .nodes
            .get_mut(node_id)
            .ok_or_else(|| TetherError::NodeNotFound(node_id.to_string()))?;
        node.parent = new_parent.cloned();
        Ok(())
    }

    /// Queues a rebase that lands right after the next `list_ancestors`
    /// call, as if another process moved the node mid-walk.
    pub fn rebase_after_listing(&self, node_id: &NodeId, new_parent: Option<&NodeId>) {
        self.lock()
            .rebase_after_listing
            .push((node_id.clone(), new_parent.cloned()));
    }

    /// Reports a node as divergent: it stays readable with
    /// [`ExistenceState::Unknown`].
    pub fn diverge(&self, node_id: &NodeId) -> Result<()> {
        let mut inner = self.lock();
        let node = inner
            .nodes
            .get_mut(node_id)
            .ok_or_else(|| TetherError::NodeNotFound(node_id.to_string()))?;
        node.state = ExistenceState::Unknown;
        Ok(())
    }

    /// Sets the diff reported for a node.
    pub fn set_diff(&self, node_id: &NodeId, diff: &str) -> Result<()> {
        let mut inner = self.lock();
        let node = inner
            .nodes
            .get_mut(node_id)
            .ok_or_else(|| TetherError::NodeNotFound(node_id.to_string()))?;
        node.diff = diff.to_string();
        Ok(())
    }

    /// Makes every subsequent call fail with `AdapterUnavailable` until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock().unavailable = unavailable;
    }

    /// Makes the next `count` description writes fail with `AdapterUnavailable`.
    pub fn fail_next_writes(&self, count: u32) {
        self.lock().failing_writes = count;
    }

    /// Returns the most recently created node.
    pub fn head(&self) -> Option<NodeId> {
        self.lock().head.clone()
    }

    /// Number of nodes still known to the graph, abandoned ones included.
    pub fn node_count(&self) -> usize {
        self.lock().nodes.len()
    }

    fn check_available(inner: &Inner) -> Result<()> {
        if inner.unavailable {
            return Err(TetherError::AdapterUnavailable(
                "memory graph marked unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

impl ChangeGraph for MemoryGraph {
    fn create_node(&self, parent: Option<&NodeId>, description: &str) -> Result<NodeId> {
        let mut inner = self.lock();
        Self::check_available(&inner)?;

        let parent = match parent {
            Some(p) if !inner.nodes.contains_key(p) => {
                return Err(TetherError::NodeNotFound(p.to_string()))
            }
            Some(p) => Some(p.clone()),
            None => inner.head.clone(),
        };

        inner.next_id += 1;
        let node_id = NodeId::new(format!("mem{:04}", inner.next_id));
        inner.nodes.insert(
            node_id.clone(),
            MemNode {
                description: description.to_string(),
                parent,
                state: ExistenceState::Present,
                diff: String::new(),
            },
        );
        inner.head = Some(node_id.clone());
        Ok(node_id)
    }

    fn read_node(&self, node_id: &NodeId) -> Result<ChangeNode> {
        let inner = self.lock();
        Self::check_available(&inner)?;

        let node = inner
            .nodes
            .get(node_id)
            .ok_or_else(|| TetherError::NodeNotFound(node_id.to_string()))?;
        Ok(ChangeNode {
            node_id: node_id.clone(),
            description: node.description.clone(),
            parents: node.parent.iter().cloned().collect(),
            state: node.state,
        })
    }

    fn write_description(&self, node_id: &NodeId, description: &str) -> Result<()> {
        let mut inner = self.lock();
        Self::check_available(&inner)?;
        if inner.failing_writes > 0 {
            inner.failing_writes -= 1;
            return Err(TetherError::AdapterUnavailable(
                "injected description write failure".to_string(),
            ));
        }

        let node = inner
            .nodes
            .get_mut(node_id)
            .ok_or_else(|| TetherError::NodeNotFound(node_id.to_string()))?;
        node.description = description.to_string();
        Ok(())
    }

    fn list_ancestors(&self, node_id: &NodeId, max_depth: usize) -> Result<Vec<NodeId>> {
        let mut inner = self.lock();
        Self::check_available(&inner)?;

        let mut ancestors = Vec::new();
        let mut current = inner
            .nodes
            .get(node_id)
            .ok_or_else(|| TetherError::NodeNotFound(node_id.to_string()))?;
        while ancestors.len() < max_depth {
            let Some(parent_id) = current.parent.as_ref() else {
                break;
            };
            ancestors.push(parent_id.clone());
            match inner.nodes.get(parent_id) {
                Some(parent) => current = parent,
                // Dangling parent: report it and let the caller discover it is gone.
                None => break,
            }
        }

        for (moved, new_parent) in std::mem::take(&mut inner.rebase_after_listing) {
            if let Some(node) = inner.nodes.get_mut(&moved) {
                node.parent = new_parent;
            }
        }
        Ok(ancestors)
    }

    fn diff(&self, node_id: &NodeId) -> Result<String> {
        let inner = self.lock();
        Self::check_available(&inner)?;

        inner
            .nodes
            .get(node_id)
            .map(|n| n.diff.clone())
            .ok_or_else(|| TetherError::NodeNotFound(node_id.to_string()))
    }
}
