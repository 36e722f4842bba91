use super::assertions::{Assertion, ErrorMatch, ReasonMatch};
use super::runner::{Labels, ScenarioRunner};
use super::steps::ScenarioStep;
use anyhow::Result;
use std::time::Duration;
use tether_core::{Config, Include, MemoryGraph, RebasePolicy, Role, TranscriptFilter, Workspace};

/// Fluent DSL for building test scenarios
pub struct Scenario {
    name: String,
    config: Option<Config>,
    steps: Vec<ScenarioStep>,
}

impl Scenario {
    /// Create a new scenario with the given name
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            config: None,
            steps: Vec::new(),
        }
    }

    // ===== Initial setup =====

    /// Use a custom workspace config
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Set what happens to sessions rebased onto unrelated parents
    pub fn with_rebase_policy(mut self, policy: RebasePolicy) -> Self {
        let mut config = self.config.take().unwrap_or_default();
        config.resolver.on_unrelated_rebase = policy;
        self.config = Some(config);
        self
    }

    // ===== Session lifecycle =====

    /// Start a session on the graph head. `label` names both node and session.
    pub fn start_session(mut self, label: &str, task: &str) -> Self {
        self.steps.push(ScenarioStep::StartSession {
            label: label.to_string(),
            parent: None,
            task: task.to_string(),
        });
        self
    }

    /// Start a session on top of a labelled node
    pub fn start_session_on(mut self, label: &str, parent: &str, task: &str) -> Self {
        self.steps.push(ScenarioStep::StartSession {
            label: label.to_string(),
            parent: Some(parent.to_string()),
            task: task.to_string(),
        });
        self
    }

    /// Append a turn to the active session
    pub fn turn(mut self, role: Role, content: &str) -> Self {
        self.steps.push(ScenarioStep::Turn {
            role,
            content: content.to_string(),
        });
        self
    }

    pub fn user_says(self, content: &str) -> Self {
        self.turn(Role::User, content)
    }

    pub fn assistant_says(self, content: &str) -> Self {
        self.turn(Role::Assistant, content)
    }

    /// Append `count` numbered turns, alternating user and assistant
    pub fn turns(mut self, count: usize) -> Self {
        for i in 0..count {
            let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
            self = self.turn(role, &format!("turn {}", i));
        }
        self
    }

    /// Checkpoint the active session onto a new child of the active node
    pub fn checkpoint(mut self, label: &str, summary: &str) -> Self {
        self.steps.push(ScenarioStep::Checkpoint {
            label: label.to_string(),
            summary: Some(summary.to_string()),
        });
        self
    }

    /// Checkpoint described with the session's task
    pub fn checkpoint_with_task(mut self, label: &str) -> Self {
        self.steps.push(ScenarioStep::Checkpoint {
            label: label.to_string(),
            summary: None,
        });
        self
    }

    /// Checkpoint the active session onto a new child of `parent`
    pub fn checkpoint_onto(mut self, label: &str, parent: &str, summary: &str) -> Self {
        self.steps.push(ScenarioStep::CheckpointOnto {
            label: label.to_string(),
            parent: parent.to_string(),
            summary: summary.to_string(),
        });
        self
    }

    /// Resume from `node`, requiring the session labelled `session`
    pub fn resume(mut self, node: &str, session: &str) -> Self {
        self.steps.push(ScenarioStep::Resume {
            node: node.to_string(),
            session: Some(session.to_string()),
        });
        self
    }

    /// Resume from `node` without checking which session comes back
    pub fn resume_any(mut self, node: &str) -> Self {
        self.steps.push(ScenarioStep::Resume {
            node: node.to_string(),
            session: None,
        });
        self
    }

    /// Rewrite the active node's summary
    pub fn describe(mut self, summary: &str) -> Self {
        self.steps.push(ScenarioStep::Describe {
            summary: summary.to_string(),
        });
        self
    }

    pub fn retire(mut self, session: &str) -> Self {
        self.steps.push(ScenarioStep::Retire {
            session: session.to_string(),
        });
        self
    }

    /// Require the previous step to fail with `error`
    pub fn fails_with(mut self, error: ErrorMatch) -> Self {
        if let Some(step) = self.steps.pop() {
            self.steps.push(ScenarioStep::Expect {
                step: Box::new(step),
                error,
            });
        }
        self
    }

    // ===== Graph edits =====

    /// Create a node tether knows nothing about
    pub fn graph_only_node(mut self, label: &str, parent: &str) -> Self {
        self.steps.push(ScenarioStep::GraphOnlyNode {
            label: label.to_string(),
            parent: parent.to_string(),
            description: format!("manual change {}", label),
        });
        self
    }

    /// Label the most recently created node
    pub fn label_head(mut self, label: &str) -> Self {
        self.steps.push(ScenarioStep::LabelHead {
            label: label.to_string(),
        });
        self
    }

    pub fn abandon(mut self, node: &str) -> Self {
        self.steps.push(ScenarioStep::Abandon {
            node: node.to_string(),
        });
        self
    }

    /// Remove a node as if garbage collected
    pub fn forget(mut self, node: &str) -> Self {
        self.steps.push(ScenarioStep::Forget {
            node: node.to_string(),
        });
        self
    }

    pub fn rebase(mut self, node: &str, onto: &str) -> Self {
        self.steps.push(ScenarioStep::Rebase {
            node: node.to_string(),
            onto: Some(onto.to_string()),
        });
        self
    }

    pub fn rebase_to_root(mut self, node: &str) -> Self {
        self.steps.push(ScenarioStep::Rebase {
            node: node.to_string(),
            onto: None,
        });
        self
    }

    /// Make a node report an ambiguous state, as a divergent change does
    pub fn diverge(mut self, node: &str) -> Self {
        self.steps.push(ScenarioStep::Diverge {
            node: node.to_string(),
        });
        self
    }

    /// Move `node` onto `onto` right after the next ancestor listing
    pub fn rebase_mid_walk(mut self, node: &str, onto: Option<&str>) -> Self {
        self.steps.push(ScenarioStep::RebaseAfterListing {
            node: node.to_string(),
            onto: onto.map(str::to_string),
        });
        self
    }

    pub fn set_diff(mut self, node: &str, diff: &str) -> Self {
        self.steps.push(ScenarioStep::SetDiff {
            node: node.to_string(),
            diff: diff.to_string(),
        });
        self
    }

    // ===== Failure simulation =====

    pub fn graph_unavailable(mut self) -> Self {
        self.steps.push(ScenarioStep::GraphUnavailable(true));
        self
    }

    pub fn graph_available(mut self) -> Self {
        self.steps.push(ScenarioStep::GraphUnavailable(false));
        self
    }

    /// Make the next `count` description writes fail
    pub fn fail_next_writes(mut self, count: u32) -> Self {
        self.steps.push(ScenarioStep::FailNextWrites(count));
        self
    }

    /// Drop the workspace handle and reopen it from disk
    pub fn restart(mut self) -> Self {
        self.steps.push(ScenarioStep::Restart);
        self
    }

    // ===== Time control =====

    pub fn wait(mut self, duration: Duration) -> Self {
        self.steps.push(ScenarioStep::Wait { duration });
        self
    }

    pub fn wait_minutes(self, minutes: u64) -> Self {
        self.wait(Duration::from_secs(minutes * 60))
    }

    // ===== Retrieval =====

    /// Resolve ancestor context and store it under `label`
    pub fn query(mut self, label: &str, from: &str, depth: usize, include: Include) -> Self {
        self.steps.push(ScenarioStep::Query {
            label: label.to_string(),
            from: from.to_string(),
            depth: Some(depth),
            include,
            filter: None,
        });
        self
    }

    /// Like [`Scenario::query`], narrowing transcript slices with `filter`
    pub fn query_filtered(
        mut self,
        label: &str,
        from: &str,
        depth: usize,
        filter: TranscriptFilter,
    ) -> Self {
        self.steps.push(ScenarioStep::Query {
            label: label.to_string(),
            from: from.to_string(),
            depth: Some(depth),
            include: Include {
                transcript: true,
                ..Default::default()
            },
            filter: Some(filter),
        });
        self
    }

    // ===== Assertions =====

    /// Add a general assertion
    pub fn assert(mut self, assertion: Assertion) -> Self {
        self.steps.push(ScenarioStep::Assert { assertion });
        self
    }

    /// Run an arbitrary check against the workspace
    pub fn check(
        self,
        check: impl Fn(&Workspace<MemoryGraph>, &Labels) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.assert(Assertion::Custom(Box::new(check)))
    }

    pub fn assert_active(self, node: &str, session: &str) -> Self {
        self.assert(Assertion::ActiveNode(node.to_string()))
            .assert(Assertion::ActiveSession(session.to_string()))
    }

    pub fn assert_linked(self, node: &str, session: &str) -> Self {
        self.assert(Assertion::NodeLinkedTo {
            node: node.to_string(),
            session: session.to_string(),
        })
    }

    pub fn assert_unlinked(self, node: &str) -> Self {
        self.assert(Assertion::NodeUnlinked(node.to_string()))
    }

    pub fn assert_resumable(self, session: &str) -> Self {
        self.assert(Assertion::SessionResumable(session.to_string()))
    }

    pub fn assert_retired(self, session: &str) -> Self {
        self.assert(Assertion::SessionRetired(session.to_string()))
    }

    /// Assert the full transcript, in order
    pub fn assert_transcript(self, session: &str, contents: &[&str]) -> Self {
        self.assert(Assertion::TranscriptContents {
            session: session.to_string(),
            contents: contents.iter().map(|s| s.to_string()).collect(),
        })
        .assert(Assertion::TranscriptContiguous(session.to_string()))
    }

    /// Assert which linked nodes a query returned, closest first
    pub fn assert_slices(self, query: &str, nodes: &[&str]) -> Self {
        self.assert(Assertion::SliceNodes {
            query: query.to_string(),
            nodes: nodes.iter().map(|s| s.to_string()).collect(),
        })
    }

    pub fn assert_slice_description(self, query: &str, node: &str, text: &str) -> Self {
        self.assert(Assertion::SliceDescription {
            query: query.to_string(),
            node: node.to_string(),
            text: text.to_string(),
        })
    }

    pub fn assert_slice_transcript(self, query: &str, node: &str, contents: &[&str]) -> Self {
        self.assert(Assertion::SliceTranscript {
            query: query.to_string(),
            node: node.to_string(),
            contents: contents.iter().map(|s| s.to_string()).collect(),
        })
    }

    pub fn assert_discontinuity(self, query: &str, hop: usize, reason: ReasonMatch) -> Self {
        self.assert(Assertion::Discontinuity {
            query: query.to_string(),
            hop,
            reason,
            session_retired: false,
        })
    }

    // ===== Execution =====

    /// Execute the scenario and return results
    pub fn run(self) -> ScenarioResult {
        let mut runner = match ScenarioRunner::new(self.config.clone()) {
            Ok(r) => r,
            Err(e) => {
                return ScenarioResult {
                    name: self.name.clone(),
                    success: false,
                    steps_executed: 0,
                    failure_step: Some(0),
                    error: Some(format!("Failed to create runner: {}", e)),
                }
            }
        };

        match runner.execute(&self.steps) {
            Ok(()) => ScenarioResult {
                name: self.name,
                success: true,
                steps_executed: self.steps.len(),
                failure_step: None,
                error: None,
            },
            Err(e) => {
                let failure_step = runner.current_step();
                ScenarioResult {
                    name: self.name,
                    success: false,
                    steps_executed: failure_step,
                    failure_step: Some(failure_step),
                    error: Some(format!("{:?}", e)),
                }
            }
        }
    }
}

/// Result of running a scenario
#[derive(Debug)]
pub struct ScenarioResult {
    pub name: String,
    pub success: bool,
    pub steps_executed: usize,
    pub failure_step: Option<usize>,
    pub error: Option<String>,
}

impl ScenarioResult {
    /// Unwrap the result, panicking if it failed
    pub fn unwrap(self) {
        if !self.success {
            panic!(
                "Scenario '{}' failed at step {}: {}",
                self.name,
                self.failure_step.unwrap_or(0),
                self.error.unwrap_or_else(|| "unknown error".to_string())
            );
        }
    }

    /// Expect the result to be successful
    pub fn expect(self, msg: &str) {
        if !self.success {
            panic!(
                "{}: Scenario '{}' failed at step {}: {}",
                msg,
                self.name,
                self.failure_step.unwrap_or(0),
                self.error.unwrap_or_else(|| "unknown error".to_string())
            );
        }
    }
}
