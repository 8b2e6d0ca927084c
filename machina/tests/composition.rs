//! End-to-end composition tests over `machina::prelude`, covering the
//! require-chain, mutual-remove, and pipe-cascade scenarios using only
//! the public facade a downstream crate would import.

use machina::prelude::*;
use std::time::Duration;

fn require_chain_schema() -> Schema {
    Schema::build([
        ("A", State::new()),
        ("B", State::new().require(["A"])),
        ("C", State::new().require(["B"])),
    ])
    .unwrap()
}

#[tokio::test]
async fn require_chain_commits_every_ancestor_atomically() {
    let actor = Actor::new("a1", require_chain_schema(), ActorConfig::default());
    let (result, transition) = actor.handle().submit(Mutation::add(["C"])).await;
    assert_eq!(result, MutationResult::Executed);
    let active = actor.snapshot().await;
    assert!(active.contains("A"));
    assert!(active.contains("B"));
    assert!(active.contains("C"));
    assert!(transition.accepted);
}

#[tokio::test]
async fn mutual_remove_settles_on_the_latest_winner() {
    let schema = Schema::build([
        ("X", State::new().remove(["Y"])),
        ("Y", State::new().remove(["X"])),
    ])
    .unwrap();
    let actor = Actor::new("a1", schema, ActorConfig::default());
    actor.handle().submit(Mutation::add(["X"])).await;
    actor.handle().submit(Mutation::add(["Y"])).await;

    let active = actor.snapshot().await;
    assert!(active.contains("Y"));
    assert!(!active.contains("X"));

    // Adding an already-active non-multi state is a no-op.
    let tick_before = actor.tick_vector().await;
    actor.handle().submit(Mutation::add(["Y"])).await;
    let tick_after = actor.tick_vector().await;
    assert_eq!(tick_before.get("Y"), tick_after.get("Y"));
}

#[tokio::test]
async fn pipe_cascades_ready_from_parent_into_child_start() {
    let parent_schema = Schema::build([("Start", State::new()), ("Ready", State::new().require(["Start"]))]).unwrap();
    let child_schema = Schema::build([("Start", State::new())]).unwrap();

    let parent = Actor::new("parent", parent_schema, ActorConfig::default());
    let child = Actor::new("child", child_schema, ActorConfig::default());
    parent.bind_ready(child.handle()).await;

    parent.handle().submit(Mutation::add(["Start"])).await;
    parent.handle().submit(Mutation::add(["Ready"])).await;

    assert!(child.snapshot().await.contains("Start"));
}

#[tokio::test]
async fn cancellation_is_monotonic_after_dispose() {
    let actor = Actor::new("a1", require_chain_schema(), ActorConfig::default());
    actor.start().await.unwrap();
    actor.ready().await.unwrap();
    actor.dispose().await.unwrap();

    let (result, _) = actor.handle().submit(Mutation::add(["A"])).await;
    assert_eq!(result, MutationResult::Cancelled(CancelReason::ContextCancelled));
}

#[tokio::test]
async fn history_backed_actor_records_committed_transitions_only() {
    let history = std::sync::Arc::new(InMemoryHistory::new(16));
    let config = ActorConfig {
        history: Some(history.clone() as std::sync::Arc<dyn History>),
        ..Default::default()
    };
    let actor = Actor::new("a1", require_chain_schema(), config);

    // A cancelled mutation (conflicting add/remove) must not be recorded.
    let conflicting = Schema::build([("A", State::new()), ("B", State::new().remove(["A"]))]).unwrap();
    let other = Actor::new(
        "a2",
        conflicting,
        ActorConfig {
            history: Some(history.clone() as std::sync::Arc<dyn History>),
            ..Default::default()
        },
    );
    other.handle().submit(Mutation::add(["A"])).await;
    other.handle().submit(Mutation::add(["A", "B"])).await;

    actor.handle().submit(Mutation::add(["C"])).await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    let recorded = history.latest(&ActorId::new("a1"), 10).await.unwrap();
    assert_eq!(recorded.len(), 1);
    assert!(recorded[0].transition.accepted);
}
