//! Change graph backed by the `jj` command-line tool.
//!
//! jj change ids are stable across rebase, amend and squash-into, which is
//! exactly the identity tether needs for [`NodeId`].

use super::ChangeGraph;
use crate::error::{Result, TetherError};
use crate::types::{ChangeNode, ExistenceState, NodeId};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

const RECORD_END: &str = "\n--tether-end--\n";

const NODE_TEMPLATE: &str = concat!(
    r#""node " ++ change_id ++ "\n""#,
    r#" ++ "parents " ++ parents.map(|c| c.change_id()).join(" ") ++ "\n""#,
    r#" ++ description"#,
    r#" ++ "\n--tether-end--\n""#,
);

/// Shells out to `jj` in a repository directory.
#[derive(Debug, Clone)]
pub struct JjGraph {
    binary: String,
    repo: PathBuf,
}

impl JjGraph {
    /// Creates an adapter running `binary` inside `repo`.
    pub fn new(binary: impl Into<String>, repo: impl AsRef<Path>) -> Self {
        Self {
            binary: binary.into(),
            repo: repo.as_ref().to_path_buf(),
        }
    }

    /// Returns true if the jj binary can be executed.
    pub fn is_available(&self) -> bool {
        Command::new(&self.binary)
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    /// Runs jj with `args`, returning stdout.
    ///
    /// `subject` names the node the command is about, for error mapping.
    fn run(&self, args: &[&str], subject: Option<&NodeId>) -> Result<String> {
        debug!(binary = %self.binary, ?args, "running jj");

        let output = Command::new(&self.binary)
            .args(args)
            .arg("--color=never")
            .current_dir(&self.repo)
            .output()
            .map_err(|e| TetherError::AdapterUnavailable(format!("failed to run jj: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_failure(&stderr, subject));
        }

        String::from_utf8(output.stdout)
            .map_err(|e| TetherError::AdapterUnavailable(format!("jj printed invalid UTF-8: {}", e)))
    }
}

impl ChangeGraph for JjGraph {
    fn create_node(&self, parent: Option<&NodeId>, description: &str) -> Result<NodeId> {
        let parent_rev = match parent {
            Some(p) => checked_rev(p)?,
            None => "@",
        };
        self.run(&["new", parent_rev, "-m", description], parent)?;

        let out = self.run(&["log", "-r", "@", "--no-graph", "-T", "change_id"], None)?;
        let id = out.trim();
        if id.is_empty() {
            return Err(TetherError::AdapterUnavailable(
                "jj did not report the new change id".to_string(),
            ));
        }
        Ok(NodeId::new(id))
    }

    fn read_node(&self, node_id: &NodeId) -> Result<ChangeNode> {
        let rev = checked_rev(node_id)?;
        match self.run(&["log", "-r", rev, "--no-graph", "-T", NODE_TEMPLATE], Some(node_id)) {
            Ok(out) => parse_node_output(node_id, &out),
            Err(TetherError::NodeNotFound(msg)) if msg.contains("hidden") => Ok(ChangeNode {
                node_id: node_id.clone(),
                description: String::new(),
                parents: Vec::new(),
                state: ExistenceState::Abandoned,
            }),
            Err(e) => Err(e),
        }
    }

    fn write_description(&self, node_id: &NodeId, description: &str) -> Result<()> {
        let rev = checked_rev(node_id)?;
        self.run(&["describe", rev, "-m", description], Some(node_id))?;
        Ok(())
    }

    fn list_ancestors(&self, node_id: &NodeId, max_depth: usize) -> Result<Vec<NodeId>> {
        let start = self.read_node(node_id)?;
        first_parent_chain(&start, max_depth, |id| self.read_node(id))
    }

    fn diff(&self, node_id: &NodeId) -> Result<String> {
        let rev = checked_rev(node_id)?;
        self.run(&["diff", "-r", rev, "--git"], Some(node_id))
    }
}

/// Follows first parents from `start` for up to `max_depth` hops.
///
/// Merges contribute only their first parent. A parent that cannot be read
/// is still listed and ends the chain; the caller finds out it is gone.
fn first_parent_chain(
    start: &ChangeNode,
    max_depth: usize,
    mut read: impl FnMut(&NodeId) -> Result<ChangeNode>,
) -> Result<Vec<NodeId>> {
    let mut ancestors = Vec::new();
    let mut next = start.parents.first().cloned();
    while ancestors.len() < max_depth {
        let Some(id) = next.take() else {
            break;
        };
        ancestors.push(id.clone());
        if ancestors.len() < max_depth {
            next = match read(&id) {
                Ok(node) => node.parents.first().cloned(),
                Err(TetherError::NodeNotFound(_)) => None,
                Err(e) => return Err(e),
            };
        }
    }
    Ok(ancestors)
}

/// The root commit's change id is all `z`; tether never treats it as a node.
fn is_root_change(id: &str) -> bool {
    !id.is_empty() && id.bytes().all(|b| b == b'z')
}

/// Rejects ids that could be interpreted as a larger revset expression.
fn checked_rev(node_id: &NodeId) -> Result<&str> {
    let s = node_id.as_str();
    if s.is_empty() || !s.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(TetherError::NodeNotFound(format!("{:?} is not a change id", s)));
    }
    Ok(s)
}

/// Maps a failed jj invocation onto the adapter error taxonomy.
fn classify_failure(stderr: &str, subject: Option<&NodeId>) -> TetherError {
    let lower = stderr.to_ascii_lowercase();
    let missing = lower.contains("doesn't exist")
        || lower.contains("does not exist")
        || lower.contains("no such revision");

    match subject {
        Some(node) if missing && lower.contains("hidden") => {
            TetherError::NodeNotFound(format!("{} (hidden)", node))
        }
        Some(node) if missing => TetherError::NodeNotFound(node.to_string()),
        _ => TetherError::AdapterUnavailable(stderr.trim().to_string()),
    }
}

/// Parses the output of `jj log` with [`NODE_TEMPLATE`].
///
/// A divergent change prints several records; the first is used and the
/// state is reported as unknown.
fn parse_node_output(node_id: &NodeId, out: &str) -> Result<ChangeNode> {
    let records: Vec<&str> = out
        .split(RECORD_END)
        .filter(|r| !r.trim().is_empty())
        .collect();
    let first = records.first().ok_or_else(|| TetherError::NodeNotFound(node_id.to_string()))?;

    let mut parts = first.splitn(3, '\n');
    let id_line = parts.next().unwrap_or_default();
    let parents_line = parts.next().unwrap_or_default();
    let description = parts.next().unwrap_or_default();

    let change_id = id_line.strip_prefix("node ").ok_or_else(|| {
        TetherError::AdapterUnavailable(format!("unexpected jj output: {:?}", id_line))
    })?;
    let parents = parents_line
        .strip_prefix("parents")
        .unwrap_or_default()
        .split_whitespace()
        .filter(|id| !is_root_change(id))
        .map(NodeId::new)
        .collect();

    Ok(ChangeNode {
        node_id: NodeId::new(change_id.trim()),
        description: description.to_string(),
        parents,
        state: if records.len() > 1 {
            ExistenceState::Unknown
        } else {
            ExistenceState::Present
        },
    })
}
