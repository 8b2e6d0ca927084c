//! # machina-actor — the actor facade
//!
//! [`Actor`] composes a [`machina_scheduler::Scheduler`] bound to a
//! [`machina_dispatch::HandlerRegistry`] with the vocabulary a caller
//! actually wants: a lifecycle [`ActorStatus`] independent of the domain
//! schema's active set, piping to other actors, parent-link exception
//! fan-out, and an observer surface ([`Actor::snapshot`],
//! [`Actor::subscribe_for_state`]) that doesn't require polling.
//!
//! [`ActorHandle`] is the cheap-clone, cross-actor-safe half of an
//! [`Actor`] — what you hand to a sibling actor to pipe into, or stash in
//! a parent's child table. It can submit mutations and read state, but
//! cannot register handlers or change lifecycle status.

#![deny(missing_docs)]

mod fixtures;
mod status;
mod subscribe;

pub use fixtures::tool_contract_schema;
pub use status::{ActorStatus, StatusError};
pub use subscribe::{await_or_cancel, SnapshotPredicate, SubscriptionRegistry};

use machina_core::{ArgBag, Event, Mutation, Schema, Snapshot, EXCEPTION};
use machina_dispatch::{HandlerFn, HandlerRegistry};
use machina_history::{History, HistoryRecord};
use machina_scheduler::Scheduler;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::{oneshot, watch, Mutex as TokioMutex};
use tokio_util::sync::CancellationToken;

pub use machina_core::{ActorId, Condition, Group, HandlerPhase, MutationResult, Transition};

/// The cheap-clone half of an actor: submit mutations, read state, wait
/// for it to change. Safe to hand to another actor for piping, or to a
/// parent for cancellation fan-out.
#[derive(Clone)]
pub struct ActorHandle {
    id: ActorId,
    scheduler: Arc<TokioMutex<Scheduler<HandlerRegistry>>>,
    watch_rx: watch::Receiver<Snapshot>,
}

impl ActorHandle {
    /// This actor's id.
    pub fn id(&self) -> &ActorId {
        &self.id
    }

    /// Submit a mutation and wait for it to commit or cancel.
    pub async fn submit(&self, mutation: Mutation) -> (MutationResult, Transition) {
        let mut scheduler = self.scheduler.lock().await;
        scheduler.submit(self.id.clone(), mutation).await
    }

    /// The currently active state names.
    pub async fn active_set(&self) -> BTreeSet<String> {
        self.scheduler.lock().await.active_set()
    }

    /// A point-in-time tick vector over every touched state.
    pub async fn tick_snapshot(&self) -> Snapshot {
        self.scheduler.lock().await.clock().snapshot(None)
    }

    /// Every name in the driving schema, in declaration order.
    pub async fn schema_names(&self) -> Vec<String> {
        self.scheduler
            .lock()
            .await
            .schema()
            .names()
            .map(String::from)
            .collect()
    }

    /// The cancellation token this actor's scheduler watches. Cancelling
    /// it causes every subsequently submitted mutation to cancel.
    pub async fn cancellation_token(&self) -> CancellationToken {
        self.scheduler.lock().await.cancellation_token()
    }

    /// A receiver that observes the tick vector after every committed
    /// transition, independent of the predicate-based subscriptions
    /// `Actor` itself exposes. Used by out-of-process observers (the
    /// REPL) that only hold a handle, never the owning `Actor`.
    pub fn watch(&self) -> watch::Receiver<Snapshot> {
        self.watch_rx.clone()
    }
}

/// Construction-time wiring for an [`Actor`]: a parent to notify on
/// exception, an interruptable group to suspend on `interrupt()`, and a
/// history backend to record committed transitions into.
#[derive(Clone, Default)]
pub struct ActorConfig {
    /// Notified (via `Mutation::add([EXCEPTION])`) whenever this actor's
    /// own `Exception` state ticks into the active parity.
    pub parent: Option<ActorHandle>,
    /// The group `interrupt()` looks up the currently active member of,
    /// to remove it and put the actor into `Suspended`.
    pub interruptable_group: Option<Group>,
    /// Where committed transitions are recorded. `None` disables history.
    pub history: Option<Arc<dyn History>>,
}

/// An owning actor facade: lifecycle status, piping, parent link, and the
/// observer surface, over one [`machina_scheduler::Scheduler`].
pub struct Actor {
    id: ActorId,
    handle: ActorHandle,
    status: Arc<TokioMutex<ActorStatus>>,
    history: Option<Arc<dyn History>>,
    interruptable_group: Option<Group>,
    subscriptions: SubscriptionRegistry,
}

impl Actor {
    /// Build a new actor over `schema`, starting `Created` with every
    /// state inactive. `config` wires up history recording, subscription
    /// notification, and parent exception fan-out before the scheduler is
    /// ever driven, so no committed transition is missed.
    pub fn new(id: impl Into<ActorId>, schema: Schema, config: ActorConfig) -> Self {
        let id = id.into();
        let mut scheduler = Scheduler::new(schema, HandlerRegistry::new());
        let subscriptions = SubscriptionRegistry::new();
        let (watch_tx, watch_rx) = watch::channel(Snapshot::default());

        {
            let subscriptions = subscriptions.clone();
            scheduler.on_change(Arc::new(move |_before, after, _transition| {
                subscriptions.notify(after);
            }));
        }

        scheduler.on_change(Arc::new(move |_before, after, _transition| {
            let _ = watch_tx.send(after.clone());
        }));

        if let Some(history) = config.history.clone() {
            let actor_id = id.clone();
            scheduler.on_change(Arc::new(move |_before, _after, transition| {
                let history = history.clone();
                let actor_id = actor_id.clone();
                let transition = transition.clone();
                tokio::spawn(async move {
                    if let Err(err) = history.record(&actor_id, transition).await {
                        tracing::error!(%err, "failed to record transition to history");
                    }
                });
            }));
        }

        if let Some(parent) = config.parent.clone() {
            scheduler.on_change(Arc::new(move |before: &Snapshot, after: &Snapshot, _transition| {
                let became_active =
                    after.get(EXCEPTION) != before.get(EXCEPTION) && after.get(EXCEPTION) % 2 == 1;
                if !became_active {
                    return;
                }
                let parent = parent.clone();
                tokio::spawn(async move {
                    parent.submit(Mutation::add([EXCEPTION])).await;
                });
            }));
        }

        let handle = ActorHandle {
            id: id.clone(),
            scheduler: Arc::new(TokioMutex::new(scheduler)),
            watch_rx,
        };

        Self {
            id,
            handle,
            status: Arc::new(TokioMutex::new(ActorStatus::Created)),
            history: config.history,
            interruptable_group: config.interruptable_group,
            subscriptions,
        }
    }

    /// This actor's id.
    pub fn id(&self) -> &ActorId {
        &self.id
    }

    /// A cheap-clone handle to this actor, safe to hand to a sibling for
    /// piping or to a parent for cancellation fan-out.
    pub fn handle(&self) -> ActorHandle {
        self.handle.clone()
    }

    /// The actor's current lifecycle status.
    pub async fn status(&self) -> ActorStatus {
        *self.status.lock().await
    }

    /// Bind a handler to `(state, phase)` on this actor's dispatcher.
    pub async fn on(&self, state: impl Into<String>, phase: HandlerPhase, handler: HandlerFn) {
        self.handle
            .scheduler
            .lock()
            .await
            .dispatcher_mut()
            .on(state, phase, handler);
    }

    /// Pipe `source_state`'s `State` effect into a mutation submitted on
    /// `destination`. Failures in the destination's own handler chain
    /// surface as an `Exception` there, never here — piping is just a
    /// `State`-phase handler calling `destination.submit`.
    pub async fn pipe<F>(&self, source_state: impl Into<String>, destination: ActorHandle, build: F)
    where
        F: Fn(&Event) -> Mutation + Send + Sync + 'static,
    {
        let build = Arc::new(build);
        self.on(
            source_state,
            HandlerPhase::State,
            machina_dispatch::handler_fn(move |event| {
                let destination = destination.clone();
                let build = build.clone();
                async move {
                    destination.submit(build(&event)).await;
                    Ok(true)
                }
            }),
        )
        .await;
    }

    /// Pipe this actor's `Start` into `destination`'s `Start`.
    pub async fn bind_start(&self, destination: ActorHandle) {
        self.pipe("Start", destination, |_event| Mutation::add(["Start"]))
            .await;
    }

    /// Pipe this actor's `Ready` into `destination`'s `Ready`.
    pub async fn bind_ready(&self, destination: ActorHandle) {
        self.pipe("Ready", destination, |_event| Mutation::add(["Ready"]))
            .await;
    }

    async fn advance_status(&self, action: &'static str) -> Result<(), StatusError> {
        let mut status = self.status.lock().await;
        *status = status.advance(action)?;
        Ok(())
    }

    /// Arms an autonomous deadline on `state`: races `deadline` against
    /// `state` deactivating, and if the timer wins, self-triggers
    /// [`Actor::interrupt`] without any further caller-submitted mutation —
    /// a loop state's own timeout racing its own completion, not a
    /// reactive check the caller has to remember to perform. Disposing the
    /// actor (or `state` deactivating first) drops the race harmlessly.
    pub fn arm_deadline(&self, state: impl Into<String>, deadline: std::time::Duration) {
        let state = state.into();
        let deactivated = self.subscribe_for_state(state.clone(), false);
        let status = self.status.clone();
        let handle = self.handle.clone();
        let interruptable_group = self.interruptable_group.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = deactivated => {}
                _ = tokio::time::sleep(deadline) => {
                    tracing::info!(state = %state, "deadline elapsed without deactivation, self-interrupting");
                    if let Err(err) = interrupt_with(&status, &handle, &interruptable_group).await {
                        tracing::debug!(%err, "autonomous interrupt no-op, actor already left Live");
                    }
                }
            }
        });
    }

    /// `Created -> Booting`, then submit `Mutation::add(["Start"])`.
    pub async fn start(&self) -> Result<(MutationResult, Transition), StatusError> {
        self.advance_status("start").await?;
        Ok(self.handle.submit(Mutation::add(["Start"])).await)
    }

    /// `Booting -> Live`, then submit `Mutation::add(["Ready"])`.
    pub async fn ready(&self) -> Result<(MutationResult, Transition), StatusError> {
        self.advance_status("ready").await?;
        Ok(self.handle.submit(Mutation::add(["Ready"])).await)
    }

    /// `Live -> Suspended`. If an interruptable group was configured,
    /// also removes its currently active member.
    pub async fn interrupt(&self) -> Result<(), StatusError> {
        interrupt_with(&self.status, &self.handle, &self.interruptable_group).await
    }

    /// `Suspended -> Live`. Does not re-activate the interrupted group
    /// member — the caller decides what (if anything) resumes.
    pub async fn resume(&self) -> Result<(), StatusError> {
        self.advance_status("resume").await
    }

    /// `Live | Suspended -> Disposed`. Cancels the scheduler's
    /// cancellation token (so any in-flight queue drains cancel), drops
    /// every pending subscription unfired, and is idempotent.
    pub async fn dispose(&self) -> Result<(), StatusError> {
        {
            let status = self.status.lock().await;
            if *status == ActorStatus::Disposed {
                return Ok(());
            }
        }
        self.advance_status("dispose").await?;
        self.handle
            .scheduler
            .lock()
            .await
            .cancellation_token()
            .cancel();
        self.subscriptions.clear();
        Ok(())
    }

    /// The currently active state names.
    pub async fn snapshot(&self) -> BTreeSet<String> {
        self.handle.active_set().await
    }

    /// A point-in-time tick vector over every touched state.
    pub async fn tick_vector(&self) -> Snapshot {
        self.handle.tick_snapshot().await
    }

    /// The `n` most recent history records for this actor, or an empty
    /// vec if no history backend was configured.
    pub async fn last_n(&self, n: usize) -> Vec<HistoryRecord> {
        let Some(history) = &self.history else {
            return Vec::new();
        };
        history.latest(&self.id, n).await.unwrap_or_default()
    }

    /// A one-shot receiver resolving the first time `state`'s activity
    /// (active iff `active`) matches, as of a committed transition.
    pub fn subscribe_for_state(&self, state: impl Into<String>, active: bool) -> oneshot::Receiver<Snapshot> {
        let state = state.into();
        self.subscriptions
            .register(Arc::new(move |snapshot: &Snapshot| (snapshot.get(&state) % 2 == 1) == active))
    }

    /// A one-shot receiver resolving the first time `state`'s tick
    /// reaches at least `count`.
    pub fn subscribe_for_tick_count(&self, state: impl Into<String>, count: u64) -> oneshot::Receiver<Snapshot> {
        let state = state.into();
        self.subscriptions
            .register(Arc::new(move |snapshot: &Snapshot| snapshot.get(&state) >= count))
    }
}

/// `Live -> Suspended`, removing `interruptable_group`'s active member if
/// one is configured. Free function (rather than an `Actor` method) so
/// [`Actor::arm_deadline`]'s spawned task can drive the same logic over
/// cloned handles without holding a borrow of the actor itself.
async fn interrupt_with(
    status: &Arc<TokioMutex<ActorStatus>>,
    handle: &ActorHandle,
    interruptable_group: &Option<Group>,
) -> Result<(), StatusError> {
    {
        let mut status = status.lock().await;
        *status = status.advance("interrupt")?;
    }
    if let Some(group) = interruptable_group {
        let active = handle.active_set().await;
        if let Some(current) = group.switch(&active) {
            handle.submit(Mutation::remove([current.to_string()])).await;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use machina_core::State;
    use machina_history::InMemoryHistory;
    use std::time::Duration;

    fn chain_schema() -> Schema {
        Schema::build([("Start", State::new()), ("Ready", State::new().require(["Start"]))]).unwrap()
    }

    #[tokio::test]
    async fn lifecycle_happy_path_reaches_live() {
        let actor = Actor::new("a1", chain_schema(), ActorConfig::default());
        assert_eq!(actor.status().await, ActorStatus::Created);
        actor.start().await.unwrap();
        assert_eq!(actor.status().await, ActorStatus::Booting);
        actor.ready().await.unwrap();
        assert_eq!(actor.status().await, ActorStatus::Live);
        assert!(actor.snapshot().await.contains("Ready"));
    }

    #[tokio::test]
    async fn interrupt_suspends_and_removes_active_group_member() {
        let schema = Schema::build([
            ("Fast", State::new()),
            ("Slow", State::new().remove(["Fast"])),
        ])
        .unwrap();
        let config = ActorConfig {
            interruptable_group: Some(Group::new("speed", ["Fast", "Slow"])),
            ..Default::default()
        };
        let actor = Actor::new("a1", schema, config);
        actor.start().await.unwrap();
        actor.ready().await.unwrap();
        actor.handle().submit(Mutation::add(["Fast"])).await;
        actor.interrupt().await.unwrap();
        assert_eq!(actor.status().await, ActorStatus::Suspended);
        assert!(!actor.snapshot().await.contains("Fast"));
    }

    #[tokio::test]
    async fn pipe_cascades_start_into_destination() {
        let source = Actor::new("source", chain_schema(), ActorConfig::default());
        let destination = Actor::new("destination", chain_schema(), ActorConfig::default());
        source.bind_start(destination.handle()).await;

        source.handle().submit(Mutation::add(["Start"])).await;
        assert!(destination.snapshot().await.contains("Start"));
    }

    #[tokio::test]
    async fn parent_is_notified_when_child_exception_activates() {
        let parent = Actor::new("parent", chain_schema(), ActorConfig::default());
        let config = ActorConfig {
            parent: Some(parent.handle()),
            ..Default::default()
        };
        let child = Actor::new("child", chain_schema(), config);

        let wait = parent.subscribe_for_state(EXCEPTION, true);
        child.handle().submit(Mutation::add([EXCEPTION])).await;

        let result = tokio::time::timeout(Duration::from_secs(1), wait).await;
        assert!(result.is_ok(), "parent should observe the exception fan-out");
        assert!(parent.snapshot().await.contains(EXCEPTION));
    }

    #[tokio::test]
    async fn history_records_committed_transitions() {
        let history: Arc<dyn History> = Arc::new(InMemoryHistory::new(10));
        let config = ActorConfig {
            history: Some(history.clone()),
            ..Default::default()
        };
        let actor = Actor::new("a1", chain_schema(), config);
        actor.handle().submit(Mutation::add(["Start"])).await;

        // on_change spawns the record; give the scheduler a tick to run it.
        tokio::time::sleep(Duration::from_millis(20)).await;
        let records = actor.last_n(10).await;
        assert_eq!(records.len(), 1);
    }

    #[tokio::test]
    async fn missed_deadline_on_resume_leaves_interrupt_to_the_caller() {
        let schema = Schema::build([
            ("Loop", State::new()),
            ("Resume", State::new().remove(["Loop"])),
        ])
        .unwrap();
        let config = ActorConfig {
            interruptable_group: Some(Group::new("running", ["Loop"])),
            ..Default::default()
        };
        let actor = Actor::new("a1", schema, config);
        actor.start().await.unwrap();
        actor.ready().await.unwrap();
        actor.handle().submit(Mutation::add(["Loop"])).await;
        assert!(actor.snapshot().await.contains("Loop"));

        // A Resume that cannot be drained before its deadline times out;
        // the loop state is left active and the mutation leaves no trace.
        // Enqueue directly and let the deadline elapse before draining,
        // since `ActorHandle::submit` enqueues and drains in one call.
        let late_resume = Mutation::add(["Resume"])
            .with_deadline(machina_core::DurationMs::from_millis(1));
        let handle = actor.handle();
        {
            let mut scheduler = handle.scheduler.lock().await;
            scheduler.enqueue(ActorId::new("a1"), late_resume);
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        let (result, _) = {
            let mut scheduler = handle.scheduler.lock().await;
            scheduler.drain_one().await.expect("just enqueued one mutation")
        };
        assert_eq!(result, MutationResult::Cancelled(machina_core::CancelReason::Timeout));
        assert!(actor.snapshot().await.contains("Loop"));

        // The caller reacts to the missed deadline by interrupting: the
        // loop state is forced out of the active set and the actor
        // becomes Suspended, matching the public status machine.
        actor.interrupt().await.unwrap();
        assert_eq!(actor.status().await, ActorStatus::Suspended);
        assert!(!actor.snapshot().await.contains("Loop"));
    }

    #[tokio::test]
    async fn armed_deadline_self_interrupts_without_a_caller_submitted_mutation() {
        let schema = Schema::build([
            ("Loop", State::new()),
            ("Resume", State::new().remove(["Loop"])),
        ])
        .unwrap();
        let config = ActorConfig {
            interruptable_group: Some(Group::new("running", ["Loop"])),
            ..Default::default()
        };
        let actor = Actor::new("a1", schema, config);
        actor.start().await.unwrap();
        actor.ready().await.unwrap();
        actor.handle().submit(Mutation::add(["Loop"])).await;
        assert!(actor.snapshot().await.contains("Loop"));

        // No Resume is ever submitted; the armed deadline alone must evict
        // Loop and suspend the actor once it elapses.
        actor.arm_deadline("Loop", Duration::from_millis(20));

        let result = tokio::time::timeout(Duration::from_secs(1), async {
            loop {
                if actor.status().await == ActorStatus::Suspended {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
        assert!(result.is_ok(), "armed deadline should self-interrupt without caller intervention");
        assert!(!actor.snapshot().await.contains("Loop"));
    }

    #[tokio::test]
    async fn armed_deadline_is_a_no_op_once_the_state_deactivates_in_time() {
        let schema = Schema::build([
            ("Loop", State::new()),
            ("Resume", State::new().remove(["Loop"])),
        ])
        .unwrap();
        let config = ActorConfig {
            interruptable_group: Some(Group::new("running", ["Loop"])),
            ..Default::default()
        };
        let actor = Actor::new("a1", schema, config);
        actor.start().await.unwrap();
        actor.ready().await.unwrap();
        actor.handle().submit(Mutation::add(["Loop"])).await;

        actor.arm_deadline("Loop", Duration::from_millis(200));
        actor.handle().submit(Mutation::add(["Resume"])).await;
        assert!(!actor.snapshot().await.contains("Loop"));

        // Give the armed task a chance to observe the deactivation instead
        // of racing past it; the actor must remain Live, never Suspended.
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(actor.status().await, ActorStatus::Live);
    }

    #[tokio::test]
    async fn dispose_is_idempotent_and_cancels_subsequent_submissions() {
        let actor = Actor::new("a1", chain_schema(), ActorConfig::default());
        actor.start().await.unwrap();
        actor.ready().await.unwrap();
        actor.dispose().await.unwrap();
        actor.dispose().await.unwrap();

        let (result, _) = actor.handle().submit(Mutation::add(["Start"])).await;
        assert_eq!(
            result,
            MutationResult::Cancelled(machina_core::CancelReason::ContextCancelled)
        );
    }
}
