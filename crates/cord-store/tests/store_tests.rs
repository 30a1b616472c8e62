//! Tests for cord-store: tree invariants, CAS transitions, ready set,
//! serial ordering, cascade cancel, and the synthesis guard.

use cord_core::{AskTarget, Error, Kind, NodeId, Returns, Status};
use cord_store::Store;

fn store() -> Store {
    Store::open_in_memory().unwrap()
}

fn seed_root(store: &Store) -> NodeId {
    store
        .create_root("root goal", "root prompt", Returns::Text)
        .unwrap()
}

fn task(store: &Store, parent: NodeId, goal: &str, needs: &[NodeId]) -> NodeId {
    store
        .create_child(parent, Kind::Task, goal, goal, Returns::Text, needs)
        .unwrap()
}

fn activate(store: &Store, id: NodeId) {
    store
        .transition(id, Status::Pending, Status::Active, None)
        .unwrap();
}

fn complete(store: &Store, id: NodeId, result: &str) {
    store
        .transition(id, Status::Active, Status::Complete, Some(result))
        .unwrap();
}

// ===========================================================================
// Root creation
// ===========================================================================

#[test]
fn root_is_a_singleton() {
    let s = store();
    let root = seed_root(&s);
    assert_eq!(root, NodeId(1));

    let err = s.create_root("again", "p", Returns::Text).unwrap_err();
    assert!(matches!(err, Error::AlreadyExists(_)));
}

#[test]
fn root_starts_pending_with_no_parent() {
    let s = store();
    let root = seed_root(&s);
    let node = s.node(root).unwrap();
    assert_eq!(node.kind, Kind::Goal);
    assert_eq!(node.status, Status::Pending);
    assert!(node.parent_id.is_none());
    assert!(node.result.is_none());
    assert!(!node.synthesized);
}

// ===========================================================================
// Child creation and the needs rule
// ===========================================================================

#[test]
fn children_get_dense_ids_and_ordinals() {
    let s = store();
    let root = seed_root(&s);
    let a = task(&s, root, "a", &[]);
    let b = task(&s, root, "b", &[]);
    assert_eq!(a, NodeId(2));
    assert_eq!(b, NodeId(3));
    assert_eq!(s.node(a).unwrap().ordinal, 0);
    assert_eq!(s.node(b).unwrap().ordinal, 1);
}

#[test]
fn needs_may_reference_prior_siblings() {
    let s = store();
    let root = seed_root(&s);
    let a = task(&s, root, "a", &[]);
    let b = task(&s, root, "b", &[a]);
    assert_eq!(s.node(b).unwrap().needs, vec![a]);
}

#[test]
fn needs_may_reference_deeper_descendants() {
    let s = store();
    let root = seed_root(&s);
    let mid = task(&s, root, "mid", &[]);
    let leaf = task(&s, mid, "leaf", &[]);
    // A later child of root may need root's grandchild.
    let late = task(&s, root, "late", &[leaf]);
    assert_eq!(s.node(late).unwrap().needs, vec![leaf]);
}

#[test]
fn needs_outside_the_subtree_are_rejected() {
    let s = store();
    let root = seed_root(&s);
    let a = task(&s, root, "a", &[]);
    let b = task(&s, root, "b", &[]);
    // A child of `a` cannot need `b` (b is a's sibling, not a descendant).
    let err = s
        .create_child(a, Kind::Task, "x", "x", Returns::Text, &[b])
        .unwrap_err();
    assert!(matches!(
        err,
        Error::InvalidNeeds { reference, .. } if reference == b
    ));
}

#[test]
fn needs_may_not_reference_the_parent_itself() {
    let s = store();
    let root = seed_root(&s);
    let a = task(&s, root, "a", &[]);
    let err = s
        .create_child(a, Kind::Task, "x", "x", Returns::Text, &[a])
        .unwrap_err();
    assert!(matches!(err, Error::InvalidNeeds { .. }));
}

#[test]
fn needs_must_exist() {
    let s = store();
    let root = seed_root(&s);
    let err = s
        .create_child(root, Kind::Task, "x", "x", Returns::Text, &[NodeId(99)])
        .unwrap_err();
    assert!(matches!(err, Error::InvalidNeeds { .. }));
}

#[test]
fn missing_parent_is_not_found() {
    let s = store();
    seed_root(&s);
    let err = s
        .create_child(NodeId(42), Kind::Task, "x", "x", Returns::Text, &[])
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(NodeId(42))));
}

// ===========================================================================
// Serial ordering via implicit edges
// ===========================================================================

#[test]
fn serial_children_chain_implicitly() {
    let s = store();
    let root = seed_root(&s);
    let serial = s
        .create_child(root, Kind::Serial, "steps", "steps", Returns::Text, &[])
        .unwrap();
    let s1 = task(&s, serial, "one", &[]);
    let s2 = task(&s, serial, "two", &[]);
    let s3 = task(&s, serial, "three", &[]);

    assert!(s.node(s1).unwrap().needs.is_empty());
    assert_eq!(s.node(s2).unwrap().needs, vec![s1]);
    assert_eq!(s.node(s3).unwrap().needs, vec![s2]);
}

#[test]
fn serial_implicit_edge_stacks_with_explicit_needs() {
    let s = store();
    let root = seed_root(&s);
    let helper = task(&s, root, "helper", &[]);
    let serial = s
        .create_child(root, Kind::Serial, "steps", "steps", Returns::Text, &[])
        .unwrap();
    let s1 = task(&s, serial, "one", &[]);
    let with_both = s
        .create_child(serial, Kind::Task, "two", "two", Returns::Text, &[helper])
        .unwrap();
    let needs = s.node(with_both).unwrap().needs;
    assert!(needs.contains(&helper));
    assert!(needs.contains(&s1));
    assert_eq!(needs.len(), 2);
}

#[test]
fn serial_children_run_one_at_a_time() {
    let s = store();
    let root = seed_root(&s);
    let serial = s
        .create_child(root, Kind::Serial, "steps", "steps", Returns::Text, &[])
        .unwrap();
    activate(&s, serial);
    let s1 = task(&s, serial, "one", &[]);
    let s2 = task(&s, serial, "two", &[]);

    assert_eq!(s.ready_set().unwrap(), vec![s1]);

    activate(&s, s1);
    assert_eq!(s.ready_set().unwrap(), Vec::<NodeId>::new());

    complete(&s, s1, "done");
    assert_eq!(s.ready_set().unwrap(), vec![s2]);
}

// ===========================================================================
// Ready set
// ===========================================================================

#[test]
fn pending_root_is_ready() {
    let s = store();
    let root = seed_root(&s);
    assert_eq!(s.ready_set().unwrap(), vec![root]);
}

#[test]
fn children_of_the_goal_root_are_ready_regardless_of_root_status() {
    let s = store();
    let root = seed_root(&s);
    activate(&s, root);
    let a = task(&s, root, "a", &[]);
    complete(&s, root, "phase one");
    // Parent is the goal root: the gate does not require it active.
    assert_eq!(s.ready_set().unwrap(), vec![a]);
}

#[test]
fn children_of_task_parents_wait_for_an_active_parent() {
    let s = store();
    let root = seed_root(&s);
    activate(&s, root);
    let mid = task(&s, root, "mid", &[]);
    let leaf = task(&s, mid, "leaf", &[]);

    // mid pending: leaf is gated out.
    assert_eq!(s.ready_set().unwrap(), vec![mid]);

    activate(&s, mid);
    assert_eq!(s.ready_set().unwrap(), vec![leaf]);
}

#[test]
fn needs_gate_readiness_until_complete() {
    let s = store();
    let root = seed_root(&s);
    activate(&s, root);
    let a = task(&s, root, "a", &[]);
    let b = task(&s, root, "b", &[]);
    let c = task(&s, root, "c", &[a, b]);
    let d = task(&s, root, "d", &[c]);

    assert_eq!(s.ready_set().unwrap(), vec![a, b]);

    activate(&s, a);
    complete(&s, a, "A");
    assert_eq!(s.ready_set().unwrap(), vec![b]);

    activate(&s, b);
    complete(&s, b, "B");
    assert_eq!(s.ready_set().unwrap(), vec![c]);

    activate(&s, c);
    complete(&s, c, "C");
    assert_eq!(s.ready_set().unwrap(), vec![d]);
}

#[test]
fn a_cancelled_need_never_satisfies() {
    let s = store();
    let root = seed_root(&s);
    activate(&s, root);
    let a = task(&s, root, "a", &[]);
    let b = task(&s, root, "b", &[a]);
    s.cancel_subtree(a).unwrap();
    assert!(!s.ready_set().unwrap().contains(&b));
}

// ===========================================================================
// Transitions
// ===========================================================================

#[test]
fn cas_transition_conflicts_on_stale_from() {
    let s = store();
    let root = seed_root(&s);
    activate(&s, root);
    let err = s
        .transition(root, Status::Pending, Status::Active, None)
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));
}

#[test]
fn result_is_written_only_on_completion() {
    let s = store();
    let root = seed_root(&s);
    let err = s
        .transition(root, Status::Pending, Status::Active, Some("early"))
        .unwrap_err();
    assert!(matches!(err, Error::Storage(_)));
}

#[test]
fn result_is_immutable_after_completion() {
    let s = store();
    let root = seed_root(&s);
    activate(&s, root);
    complete(&s, root, "first");

    // No edge leaves `complete` through transition().
    let err = s
        .transition(root, Status::Complete, Status::Active, None)
        .unwrap_err();
    assert!(matches!(err, Error::InvalidStatus { .. }));
    assert_eq!(s.node(root).unwrap().result.as_deref(), Some("first"));
}

#[test]
fn terminal_statuses_reject_all_edges() {
    let s = store();
    let root = seed_root(&s);
    activate(&s, root);
    s.transition(root, Status::Active, Status::Failed, None)
        .unwrap();
    for to in [Status::Pending, Status::Active, Status::Complete] {
        let err = s.transition(root, Status::Failed, to, None).unwrap_err();
        assert!(matches!(err, Error::InvalidStatus { .. }));
    }
}

#[test]
fn updated_at_is_monotonic() {
    let s = store();
    let root = seed_root(&s);
    let before = s.node(root).unwrap().updated_at;
    activate(&s, root);
    let after = s.node(root).unwrap().updated_at;
    assert!(after > before);
}

// ===========================================================================
// Modify
// ===========================================================================

#[test]
fn modify_allowed_in_pending_and_paused() {
    let s = store();
    let root = seed_root(&s);
    activate(&s, root);
    let a = task(&s, root, "a", &[]);

    s.modify(a, Some("renamed"), Some("new prompt")).unwrap();
    let node = s.node(a).unwrap();
    assert_eq!(node.goal, "renamed");
    assert_eq!(node.prompt, "new prompt");

    activate(&s, a);
    s.transition(a, Status::Active, Status::Paused, None).unwrap();
    s.modify(a, None, Some("paused rewrite")).unwrap();
    assert_eq!(s.node(a).unwrap().prompt, "paused rewrite");
}

#[test]
fn modify_rejected_outside_pending_and_paused() {
    let s = store();
    let root = seed_root(&s);
    activate(&s, root);
    let err = s.modify(root, Some("nope"), None).unwrap_err();
    assert!(matches!(
        err,
        Error::InvalidStatus {
            status: Status::Active,
            ..
        }
    ));
}

// ===========================================================================
// Pause / resume round trip
// ===========================================================================

#[test]
fn pause_resume_preserves_goal_and_prompt() {
    let s = store();
    let root = seed_root(&s);
    activate(&s, root);
    let a = task(&s, root, "a", &[]);
    activate(&s, a);

    s.transition(a, Status::Active, Status::Paused, None).unwrap();
    s.transition(a, Status::Paused, Status::Pending, None).unwrap();

    let node = s.node(a).unwrap();
    assert_eq!(node.status, Status::Pending);
    assert_eq!(node.goal, "a");
    assert_eq!(node.prompt, "a");
    // Back in the ready set: needs re-evaluated from scratch.
    assert!(s.ready_set().unwrap().contains(&a));
}

// ===========================================================================
// Cascade cancel
// ===========================================================================

#[test]
fn cancel_cascades_to_non_terminal_descendants() {
    let s = store();
    let root = seed_root(&s);
    activate(&s, root);
    let mid = task(&s, root, "mid", &[]);
    activate(&s, mid);
    let leaf_active = task(&s, mid, "leaf a", &[]);
    activate(&s, leaf_active);
    let leaf_pending = task(&s, mid, "leaf b", &[]);
    let leaf_done = task(&s, mid, "leaf c", &[]);
    activate(&s, leaf_done);
    complete(&s, leaf_done, "done");

    let live = s.cancel_subtree(mid).unwrap();
    assert_eq!(live, vec![mid, leaf_active]);

    assert_eq!(s.node(mid).unwrap().status, Status::Cancelled);
    assert_eq!(s.node(leaf_active).unwrap().status, Status::Cancelled);
    assert_eq!(s.node(leaf_pending).unwrap().status, Status::Cancelled);
    // Terminal descendants keep their status.
    assert_eq!(s.node(leaf_done).unwrap().status, Status::Complete);
    // Root untouched.
    assert_eq!(s.node(root).unwrap().status, Status::Active);
}

#[test]
fn cancel_on_terminal_target_is_a_noop() {
    let s = store();
    let root = seed_root(&s);
    activate(&s, root);
    let a = task(&s, root, "a", &[]);
    activate(&s, a);
    complete(&s, a, "done");

    assert!(s.cancel_subtree(a).unwrap().is_empty());
    assert_eq!(s.node(a).unwrap().status, Status::Complete);
}

#[test]
fn cancelling_the_root_reaches_every_non_terminal_node() {
    let s = store();
    let root = seed_root(&s);
    activate(&s, root);
    let a = task(&s, root, "a", &[]);
    let b = task(&s, a, "b", &[]);

    s.cancel_subtree(root).unwrap();
    for id in [root, a, b] {
        assert_eq!(s.node(id).unwrap().status, Status::Cancelled);
    }
    assert!(s.is_finished().unwrap());
}

// ===========================================================================
// Synthesis
// ===========================================================================

fn fan_out(s: &Store) -> (NodeId, NodeId, NodeId) {
    let root = seed_root(s);
    activate(s, root);
    let a = task(s, root, "a", &[]);
    let b = task(s, root, "b", &[]);
    complete(s, root, "phase one");
    (root, a, b)
}

#[test]
fn synthesis_waits_for_all_children_to_terminate() {
    let s = store();
    let (_root, a, b) = fan_out(&s);
    assert!(s.synthesis_candidates().unwrap().is_empty());

    activate(&s, a);
    complete(&s, a, "A");
    assert!(s.synthesis_candidates().unwrap().is_empty());

    activate(&s, b);
    complete(&s, b, "B");
    assert_eq!(s.synthesis_candidates().unwrap().len(), 1);
}

#[test]
fn begin_synthesis_relaunches_through_pending_exactly_once() {
    let s = store();
    let (root, a, b) = fan_out(&s);
    for id in [a, b] {
        activate(&s, id);
        complete(&s, id, "r");
    }

    s.begin_synthesis(root).unwrap();
    let node = s.node(root).unwrap();
    assert_eq!(node.status, Status::Pending);
    assert!(node.synthesized);
    assert!(s.ready_set().unwrap().contains(&root));

    // Synthesized flag guards re-entry even after the second completion.
    activate(&s, root);
    complete(&s, root, "A + B");
    assert!(s.synthesis_candidates().unwrap().is_empty());
    let err = s.begin_synthesis(root).unwrap_err();
    assert!(matches!(err, Error::InvalidStatus { .. }));
}

#[test]
fn childless_parents_never_synthesize() {
    let s = store();
    let root = seed_root(&s);
    activate(&s, root);
    complete(&s, root, "done");
    assert!(s.synthesis_candidates().unwrap().is_empty());
    assert!(s.is_finished().unwrap());
}

#[test]
fn run_is_not_finished_while_synthesis_is_owed() {
    let s = store();
    let (_root, a, b) = fan_out(&s);
    for id in [a, b] {
        activate(&s, id);
        complete(&s, id, "r");
    }
    // Every node is terminal, but the root still owes its synthesis.
    assert!(!s.is_finished().unwrap());
}

// ===========================================================================
// Subtree / ancestry
// ===========================================================================

#[test]
fn subtree_includes_self_and_descendants() {
    let s = store();
    let root = seed_root(&s);
    let a = task(&s, root, "a", &[]);
    let b = task(&s, a, "b", &[]);
    let c = task(&s, root, "c", &[]);

    assert_eq!(s.subtree(a).unwrap(), vec![a, b]);
    assert_eq!(s.subtree(root).unwrap(), vec![root, a, b, c]);
    assert!(matches!(
        s.subtree(NodeId(99)).unwrap_err(),
        Error::NotFound(_)
    ));
}

#[test]
fn is_ancestor_is_strict() {
    let s = store();
    let root = seed_root(&s);
    let a = task(&s, root, "a", &[]);
    let b = task(&s, a, "b", &[]);

    assert!(s.is_ancestor(root, b).unwrap());
    assert!(s.is_ancestor(a, b).unwrap());
    assert!(!s.is_ancestor(b, a).unwrap());
    assert!(!s.is_ancestor(a, a).unwrap());
}

#[test]
fn ancestors_run_root_first() {
    let s = store();
    let root = seed_root(&s);
    let a = task(&s, root, "a", &[]);
    let b = task(&s, a, "b", &[]);
    let chain: Vec<NodeId> = s.ancestors(b).unwrap().iter().map(|n| n.id).collect();
    assert_eq!(chain, vec![root, a]);
}

// ===========================================================================
// Asks
// ===========================================================================

#[test]
fn asks_store_target_default_and_timeout() {
    let s = store();
    let root = seed_root(&s);
    activate(&s, root);
    let ask = s
        .create_ask(root, "Proceed?", "Proceed?\nDefault: yes", AskTarget::Human, Some("yes"), Some(30_000))
        .unwrap();
    let node = s.node(ask).unwrap();
    assert_eq!(node.kind, Kind::Ask);
    assert_eq!(node.ask_target, Some(AskTarget::Human));
    assert_eq!(node.ask_default.as_deref(), Some("yes"));
    assert_eq!(node.ask_timeout_ms, Some(30_000));
    assert_eq!(node.returns, Returns::Text);
}

// ===========================================================================
// Persistence across reopen
// ===========================================================================

#[test]
fn reopen_preserves_tree_and_tick_monotonicity() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cord.db");

    let (root, a, last_tick) = {
        let s = Store::open(&path).unwrap();
        let root = seed_root(&s);
        activate(&s, root);
        let a = task(&s, root, "a", &[]);
        (root, a, s.node(a).unwrap().updated_at)
    };

    let s = Store::open(&path).unwrap();
    assert_eq!(s.node(root).unwrap().status, Status::Active);
    assert_eq!(s.node(a).unwrap().goal, "a");

    activate(&s, a);
    assert!(s.node(a).unwrap().updated_at > last_tick);
}

#[test]
fn snapshot_is_ordered_and_complete() {
    let s = store();
    let root = seed_root(&s);
    let a = task(&s, root, "a", &[]);
    let b = task(&s, root, "b", &[a]);

    let snapshot = s.snapshot().unwrap();
    let ids: Vec<NodeId> = snapshot.nodes.iter().map(|n| n.id).collect();
    assert_eq!(ids, vec![root, a, b]);
    assert_eq!(snapshot.get(b).unwrap().needs, vec![a]);
}
