use super::clock::MockClock;
use anyhow::{Context, Result};
use std::path::Path;
use tempfile::TempDir;
use tether_core::{Config, MemoryGraph, Workspace};

/// Isolated on-disk state plus the in-memory change graph it is linked to.
///
/// The graph outlives any single [`Workspace`], so a restart reopens the
/// same sessions against the same nodes.
pub struct TestWorkspace {
    dir: TempDir,
    graph: MemoryGraph,
}

impl TestWorkspace {
    /// Create an empty workspace
    pub fn empty() -> Result<Self> {
        let dir = TempDir::new().context("Failed to create temp directory")?;
        Ok(Self {
            dir,
            graph: MemoryGraph::new(),
        })
    }

    /// Get workspace path
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Handle on the shared graph, for mutating it behind tether's back.
    pub fn graph(&self) -> &MemoryGraph {
        &self.graph
    }

    /// Initialize `.tether`, optionally replacing the default config.
    pub fn init(
        &self,
        config: Option<&Config>,
        clock: &MockClock,
    ) -> Result<Workspace<MemoryGraph>> {
        let ws = Workspace::init_with_graph(self.path(), self.graph.clone())?;
        match config {
            Some(config) => {
                config.save(&ws.tether_dir())?;
                self.open(clock)
            }
            None => Ok(ws.with_time_provider(clock.as_provider())),
        }
    }

    /// Open the existing workspace from disk
    pub fn open(&self, clock: &MockClock) -> Result<Workspace<MemoryGraph>> {
        Ok(Workspace::open_with_graph(self.path(), self.graph.clone())?
            .with_time_provider(clock.as_provider()))
    }
}
