use std::time::Duration;

use super::assertions::{Assertion, ErrorMatch};
use tether_core::{Include, Role, TranscriptFilter};

/// All possible actions in a test scenario.
///
/// Nodes and sessions are referred to by scenario labels; the runner maps
/// them to the ids tether generates.
#[derive(Debug)]
pub enum ScenarioStep {
    // Session lifecycle
    StartSession {
        label: String,
        parent: Option<String>,
        task: String,
    },
    Turn {
        role: Role,
        content: String,
    },
    Checkpoint {
        label: String,
        summary: Option<String>,
    },
    CheckpointOnto {
        label: String,
        parent: String,
        summary: String,
    },
    Resume {
        node: String,
        session: Option<String>,
    },
    Describe {
        summary: String,
    },
    Retire {
        session: String,
    },

    // Graph edits made outside tether
    GraphOnlyNode {
        label: String,
        parent: String,
        description: String,
    },
    LabelHead {
        label: String,
    },
    Abandon {
        node: String,
    },
    Forget {
        node: String,
    },
    Rebase {
        node: String,
        onto: Option<String>,
    },
    SetDiff {
        node: String,
        diff: String,
    },
    Diverge {
        node: String,
    },
    RebaseAfterListing {
        node: String,
        onto: Option<String>,
    },

    // Failure simulation
    GraphUnavailable(bool),
    FailNextWrites(u32),
    Restart,

    // Time control
    Wait {
        duration: Duration,
    },

    // Retrieval
    Query {
        label: String,
        from: String,
        depth: Option<usize>,
        include: Include,
        filter: Option<TranscriptFilter>,
    },

    /// Runs the wrapped step and requires it to fail.
    Expect {
        step: Box<ScenarioStep>,
        error: ErrorMatch,
    },

    // Assertions (can be interspersed)
    Assert {
        assertion: Assertion,
    },
}
