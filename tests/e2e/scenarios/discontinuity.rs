use crate::harness::{Assertion, ErrorMatch, ReasonMatch, Scenario};
use tether_core::Include;

#[test]
fn test_abandoned_node_is_reported_not_resolved() {
    Scenario::new("abandoned_target")
        .start_session("root", "Add rate limiting")
        .checkpoint("next", "Token bucket in place")
        .abandon("next")
        .query("q", "next", 1, Include::description())
        .assert_discontinuity("q", 0, ReasonMatch::Abandoned)
        .resume_any("next")
        .fails_with(ErrorMatch::NodeNotFound)
        .run()
        .unwrap();
}

#[test]
fn test_abandoned_ancestor_breaks_the_chain() {
    Scenario::new("abandoned_ancestor")
        .start_session("root", "Design")
        .checkpoint("mid", "Implement")
        .checkpoint("tip", "Test")
        .abandon("mid")
        .query("q", "tip", 2, Include::description())
        .assert_discontinuity("q", 1, ReasonMatch::Abandoned)
        .run()
        .unwrap();
}

#[test]
fn test_forgotten_root_is_missing_and_retires_the_session() {
    Scenario::new("forgotten_root")
        .start_session("root", "Add rate limiting")
        .turns(3)
        .checkpoint("next", "Token bucket in place")
        .forget("root")
        .query("q", "next", 1, Include::description())
        .assert_discontinuity("q", 1, ReasonMatch::Missing)
        .resume_any("next")
        .fails_with(ErrorMatch::SessionNotResumable)
        .assert_retired("root")
        // The transcript is kept for audit.
        .assert_transcript("root", &["turn 0", "turn 1", "turn 2"])
        .run()
        .unwrap();
}

#[test]
fn test_abandoned_root_retires_the_session() {
    Scenario::new("abandoned_root")
        .start_session("root", "Add rate limiting")
        .checkpoint("next", "Token bucket in place")
        .abandon("root")
        .resume_any("next")
        .fails_with(ErrorMatch::SessionNotResumable)
        .assert_retired("root")
        .checkpoint("later", "More work")
        .fails_with(ErrorMatch::SessionNotResumable)
        .run()
        .unwrap();
}

#[test]
fn test_unavailable_graph_is_an_error_not_a_discontinuity() {
    Scenario::new("unavailable_graph")
        .start_session("root", "Add rate limiting")
        .checkpoint("next", "Token bucket in place")
        .graph_unavailable()
        .query("q", "next", 1, Include::description())
        .fails_with(ErrorMatch::AdapterUnavailable)
        .resume_any("next")
        .fails_with(ErrorMatch::AdapterUnavailable)
        .graph_available()
        .assert_resumable("root")
        .query("q", "next", 1, Include::description())
        .assert_slices("q", &["root"])
        .run()
        .unwrap();
}

#[test]
fn test_retired_session_cannot_be_resumed() {
    Scenario::new("retired_session")
        .start_session("root", "Add rate limiting")
        .user_says("limit per key")
        .retire("root")
        .assert(Assertion::NoActiveBinding)
        .resume_any("root")
        .fails_with(ErrorMatch::SessionNotResumable)
        .user_says("no binding anymore")
        .fails_with(ErrorMatch::NoActiveBinding)
        .assert_transcript("root", &["limit per key"])
        .run()
        .unwrap();
}

#[test]
fn test_divergent_ancestor_is_reported() {
    Scenario::new("divergent_ancestor")
        .start_session("root", "Design")
        .checkpoint("next", "Implement")
        .diverge("root")
        .query("q", "next", 1, Include::description())
        .assert_discontinuity("q", 1, ReasonMatch::Diverged)
        .run()
        .unwrap();
}

#[test]
fn test_parent_moved_during_walk_is_reported() {
    Scenario::new("parent_moved_during_walk")
        .start_session("root", "Design")
        .checkpoint("mid", "Implement")
        .checkpoint("tip", "Test")
        .graph_only_node("elsewhere", "root")
        .rebase_mid_walk("mid", Some("elsewhere"))
        .query("q", "tip", 2, Include::description())
        .assert_discontinuity("q", 1, ReasonMatch::ParentChanged)
        // Once the graph settles the chain is simply rebased elsewhere.
        .query("settled", "tip", 2, Include::description())
        .assert_slices("settled", &["mid"])
        .assert(Assertion::Skipped {
            query: "settled".into(),
            nodes: vec!["elsewhere".into()],
        })
        .run()
        .unwrap();
}
