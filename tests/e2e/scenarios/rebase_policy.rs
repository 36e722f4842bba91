use crate::harness::{Assertion, ErrorMatch, ReasonMatch, Scenario};
use tether_core::{Include, RebasePolicy};

/// Two lineages, then `mine2` is rebased onto the other lineage's tip.
fn rebased_onto_other_lineage(name: &str) -> Scenario {
    Scenario::new(name)
        .start_session("other", "Other work")
        .checkpoint("other2", "Other step")
        .start_session_on("mine", "other", "My work")
        .user_says("my first turn")
        .checkpoint("mine2", "My step")
        .rebase("mine2", "other2")
        .query("q", "mine2", 2, Include::description())
}

#[test]
fn test_unrelated_rebase_warns_by_default() {
    rebased_onto_other_lineage("unrelated_rebase_warns")
        .assert_discontinuity("q", 1, ReasonMatch::Rebased)
        .assert_resumable("mine")
        .assert_resumable("other")
        .resume("mine2", "mine")
        .run()
        .unwrap();
}

#[test]
fn test_unrelated_rebase_can_retire_the_session() {
    rebased_onto_other_lineage("unrelated_rebase_retires")
        .with_rebase_policy(RebasePolicy::MarkNonResumable)
        .assert(Assertion::Discontinuity {
            query: "q".into(),
            hop: 1,
            reason: ReasonMatch::Rebased,
            session_retired: true,
        })
        .assert_retired("mine")
        .assert_resumable("other")
        .resume_any("mine2")
        .fails_with(ErrorMatch::SessionNotResumable)
        .assert_transcript("mine", &["my first turn"])
        .run()
        .unwrap();
}

#[test]
fn test_rebase_within_a_lineage_resolves() {
    Scenario::new("rebase_within_lineage")
        .with_rebase_policy(RebasePolicy::MarkNonResumable)
        .start_session("root", "Design")
        .checkpoint("mid", "Implement")
        .checkpoint("tip", "Test")
        // As if `mid` had been squashed away.
        .rebase("tip", "root")
        .query("q", "tip", 1, Include::description())
        .assert_slices("q", &["root"])
        .assert_slice_description("q", "root", "Design")
        .assert_resumable("root")
        .run()
        .unwrap();
}

#[test]
fn test_rebase_off_the_lineage_root_is_detected() {
    Scenario::new("rebase_to_graph_root")
        .start_session("root", "Design")
        .checkpoint("next", "Implement")
        .rebase_to_root("next")
        .query("q", "next", 4, Include::description())
        .assert_discontinuity("q", 0, ReasonMatch::Rebased)
        .run()
        .unwrap();
}

#[test]
fn test_rebase_onto_parentless_node_is_detected_at_depth_one() {
    Scenario::new("rebase_onto_parentless_node")
        .start_session("root", "Design")
        .checkpoint("next", "Implement")
        .graph_only_node("scratch", "root")
        .rebase_to_root("scratch")
        .rebase("next", "scratch")
        .query("q", "next", 1, Include::description())
        .assert_discontinuity("q", 1, ReasonMatch::Rebased)
        .run()
        .unwrap();
}
