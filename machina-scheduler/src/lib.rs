//! # machina-scheduler — the accept/cancel transaction engine
//!
//! [`Scheduler`] owns one actor's [`machina_core::Clock`] and drives
//! [`machina_core::Mutation`]s submitted against a [`machina_core::Schema`]
//! into committed-or-cancelled [`machina_core::Transition`]s. It never
//! decides handler logic itself — that is delegated to a
//! [`machina_core::Dispatcher`], so this crate stays a pure scheduling
//! engine and `machina-dispatch` stays a pure handler registry.
//!
//! Mutations are processed strictly FIFO per actor (see [`MutationQueue`]):
//! submit as many as you like, [`Scheduler::drain`] commits or cancels them
//! one at a time, in submission order, each atomically.

#![deny(missing_docs)]

mod candidate;
mod queue;

pub use candidate::resolve_candidate;
pub use queue::{MutationQueue, QueuedMutation};

use machina_core::{
    ActorId, CancelReason, Clock, Dispatcher, Event, HandlerCall, HandlerPhase, Mutation,
    MutationKind, MutationResult, Resolver, Schema, Snapshot, Transition,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// A callback invoked synchronously, during the commit phase, after every
/// accepted transition. Must not mutate the actor that emits it — it runs
/// while the scheduler still holds the commit in progress.
pub type ChangeCallback = Arc<dyn Fn(&Snapshot, &Snapshot, &Transition) + Send + Sync>;

/// Drives mutations against a schema into transitions, using a
/// [`Dispatcher`] for negotiation and effect handlers.
pub struct Scheduler<D: Dispatcher> {
    schema: Schema,
    clock: Clock,
    dispatcher: D,
    queue: MutationQueue,
    started_at: Instant,
    cancellation: CancellationToken,
    on_change: Vec<ChangeCallback>,
}

impl<D: Dispatcher> Scheduler<D> {
    /// Build a scheduler over `schema`, starting with every state
    /// inactive, driven by `dispatcher`.
    pub fn new(schema: Schema, dispatcher: D) -> Self {
        Self {
            schema,
            clock: Clock::new(),
            dispatcher,
            queue: MutationQueue::new(),
            started_at: Instant::now(),
            cancellation: CancellationToken::new(),
            on_change: Vec::new(),
        }
    }

    /// Register a callback invoked synchronously after every accepted
    /// transition, with the tick snapshots before and after.
    pub fn on_change(&mut self, callback: ChangeCallback) {
        self.on_change.push(callback);
    }

    /// The schema this scheduler is driving.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Mutable access to the dispatcher, for registering handlers after
    /// construction (e.g. an actor binding a pipe once it has a handle to
    /// its destination).
    pub fn dispatcher_mut(&mut self) -> &mut D {
        &mut self.dispatcher
    }

    /// The current tick for every touched state, as a pointwise snapshot.
    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    /// A token that, once cancelled, causes every subsequently drained
    /// mutation to cancel immediately with [`CancelReason::ContextCancelled`].
    /// Shared with a parent actor's cancellation fan-out.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// The set of state names currently active, per the clock's parity.
    pub fn active_set(&self) -> BTreeSet<String> {
        self.schema
            .names()
            .filter(|n| self.clock.is_active(n))
            .map(String::from)
            .collect()
    }

    /// Enqueue a mutation without processing it. Use [`Scheduler::drain`]
    /// to process the queue FIFO, or [`Scheduler::submit`] for the common
    /// case of enqueue-then-drain-one.
    pub fn enqueue(&mut self, actor: ActorId, mutation: Mutation) {
        self.queue.push(actor, mutation);
    }

    /// Enqueue and immediately process one mutation, returning its outcome.
    pub async fn submit(&mut self, actor: ActorId, mutation: Mutation) -> (MutationResult, Transition) {
        self.enqueue(actor, mutation);
        self.drain_one()
            .await
            .expect("just enqueued one mutation")
    }

    /// Pop and process the oldest queued mutation, if any.
    pub async fn drain_one(&mut self) -> Option<(MutationResult, Transition)> {
        let queued = self.queue.pop()?;
        Some(self.process(queued).await)
    }

    /// Process every currently queued mutation, FIFO, returning one result
    /// per mutation in submission order. Mutations enqueued by a handler
    /// mid-drain (if any) are processed before this call returns.
    pub async fn drain(&mut self) -> Vec<(MutationResult, Transition)> {
        let mut results = Vec::with_capacity(self.queue.len());
        while let Some(result) = self.drain_one().await {
            results.push(result);
        }
        results
    }

    async fn process(&mut self, queued: QueuedMutation) -> (MutationResult, Transition) {
        let QueuedMutation {
            actor,
            mutation,
            enqueued_at,
        } = queued;

        let timestamp = self.timestamp();
        let active = self.active_set();
        let tick_before = self.clock.snapshot(None);

        if self.cancellation.is_cancelled() {
            let reason = CancelReason::ContextCancelled;
            let transition =
                Transition::cancelled(&mutation, active, reason.clone(), timestamp, tick_before);
            return (MutationResult::Cancelled(reason), transition);
        }

        if let Some(deadline) = mutation.deadline {
            if enqueued_at.elapsed() > deadline.to_std() {
                let reason = CancelReason::Timeout;
                let transition =
                    Transition::cancelled(&mutation, active, reason.clone(), timestamp, tick_before);
                return (MutationResult::Cancelled(reason), transition);
            }
        }

        let resolver = Resolver::new(&self.schema);
        let candidate = match candidate::resolve_candidate(&self.schema, &active, &mutation) {
            Ok(c) => c,
            Err(reason) => {
                let transition = Transition::cancelled(
                    &mutation,
                    active,
                    reason.clone(),
                    timestamp,
                    tick_before,
                );
                return (MutationResult::Cancelled(reason), transition);
            }
        };

        let to_deactivate = resolver.topo_order(
            &active.difference(&candidate).cloned().collect::<Vec<_>>(),
        );
        let to_activate = resolver.topo_order(
            &candidate.difference(&active).cloned().collect::<Vec<_>>(),
        );
        let reentries: Vec<String> = mutation
            .targets
            .iter()
            .filter(|_| matches!(mutation.kind, MutationKind::Add | MutationKind::Set))
            .filter(|t| active.contains(*t) && candidate.contains(*t))
            .filter(|t| self.schema.get(t).is_some_and(|s| s.multi))
            .cloned()
            .collect();

        let event = Event::new(mutation.clone(), candidate.clone(), actor);
        let mut handlers_called = Vec::new();

        // Negotiation: Exit before Enter, each in dependency order. Any veto
        // or handler failure cancels before anything is committed.
        for state in to_deactivate.iter().rev() {
            handlers_called.push(HandlerCall {
                state: state.clone(),
                phase: HandlerPhase::Exit,
            });
            match self.dispatcher.invoke(state, HandlerPhase::Exit, &event).await {
                Ok(true) => {}
                Ok(false) => {
                    return Self::cancel(
                        &mutation,
                        active,
                        CancelReason::Negotiation {
                            state: state.clone(),
                        },
                        timestamp,
                        tick_before,
                    );
                }
                Err(err) => {
                    tracing::error!(state = %state, phase = "Exit", %err, "handler failed");
                    return Self::escalate_negotiation_failure(
                        &mut self.clock,
                        &mutation,
                        active,
                        state,
                        &err,
                        handlers_called,
                        timestamp,
                        tick_before,
                    );
                }
            }
        }
        for state in &to_activate {
            handlers_called.push(HandlerCall {
                state: state.clone(),
                phase: HandlerPhase::Enter,
            });
            match self.dispatcher.invoke(state, HandlerPhase::Enter, &event).await {
                Ok(true) => {}
                Ok(false) => {
                    return Self::cancel(
                        &mutation,
                        active,
                        CancelReason::Negotiation {
                            state: state.clone(),
                        },
                        timestamp,
                        tick_before,
                    );
                }
                Err(err) => {
                    tracing::error!(state = %state, phase = "Enter", %err, "handler failed");
                    return Self::escalate_negotiation_failure(
                        &mut self.clock,
                        &mutation,
                        active,
                        state,
                        &err,
                        handlers_called,
                        timestamp,
                        tick_before,
                    );
                }
            }
        }

        // Commit: advance the clock. Re-entries of a `multi` state tick
        // twice (through inactive and back) without running Enter/Exit.
        for state in &to_deactivate {
            self.clock.advance(state);
        }
        for state in &to_activate {
            self.clock.advance(state);
        }
        for state in &reentries {
            self.clock.advance(state);
            self.clock.advance(state);
        }

        // Effects: End, State, then Any over every touched state. Handler
        // failures here can't cancel an already-committed transition — they
        // escalate to a forced Exception activation instead.
        for state in &to_deactivate {
            handlers_called.push(HandlerCall {
                state: state.clone(),
                phase: HandlerPhase::End,
            });
            if let Err(err) = self.dispatcher.invoke(state, HandlerPhase::End, &event).await {
                Self::force_exception(&mut self.clock, state, &err, &mut handlers_called);
            }
        }
        for state in to_activate.iter().chain(reentries.iter()) {
            handlers_called.push(HandlerCall {
                state: state.clone(),
                phase: HandlerPhase::State,
            });
            if let Err(err) = self.dispatcher.invoke(state, HandlerPhase::State, &event).await {
                Self::force_exception(&mut self.clock, state, &err, &mut handlers_called);
            }
        }
        let touched: Vec<String> = resolver.topo_order(
            &to_deactivate
                .iter()
                .chain(to_activate.iter())
                .chain(reentries.iter())
                .cloned()
                .collect::<Vec<_>>(),
        );
        for state in &touched {
            handlers_called.push(HandlerCall {
                state: state.clone(),
                phase: HandlerPhase::Any,
            });
            if let Err(err) = self.dispatcher.invoke(state, HandlerPhase::Any, &event).await {
                Self::force_exception(&mut self.clock, state, &err, &mut handlers_called);
            }
        }

        let tick_after = self.clock.snapshot(None);
        let transition = Transition::committed(
            &mutation,
            active,
            candidate,
            handlers_called,
            timestamp,
            tick_before.clone(),
            tick_after.clone(),
        );
        for callback in &self.on_change {
            callback(&tick_before, &tick_after, &transition);
        }
        (MutationResult::Executed, transition)
    }

    fn cancel(
        mutation: &Mutation,
        active: BTreeSet<String>,
        reason: CancelReason,
        timestamp: machina_core::DurationMs,
        tick: machina_core::Snapshot,
    ) -> (MutationResult, Transition) {
        let transition = Transition::cancelled(mutation, active, reason.clone(), timestamp, tick);
        (MutationResult::Cancelled(reason), transition)
    }

    fn force_exception(
        clock: &mut Clock,
        state: &str,
        err: &machina_core::DispatchError,
        handlers_called: &mut Vec<HandlerCall>,
    ) {
        tracing::error!(state, %err, "handler failed, forcing Exception activation");
        clock.advance(machina_core::EXCEPTION);
        handlers_called.push(HandlerCall {
            state: machina_core::EXCEPTION.to_string(),
            phase: HandlerPhase::State,
        });
    }

    /// A negotiation (`Exit`/`Enter`) handler failing outright is not an
    /// ordinary veto (§7): the requested mutation still cancels — its
    /// candidate states never committed — but the failure itself escalates
    /// into a real `Exception` activation on the actor's clock, the same
    /// way an effect-phase failure does, rather than leaving no trace.
    #[allow(clippy::too_many_arguments)]
    fn escalate_negotiation_failure(
        clock: &mut Clock,
        mutation: &Mutation,
        active: BTreeSet<String>,
        state: &str,
        err: &machina_core::DispatchError,
        mut handlers_called: Vec<HandlerCall>,
        timestamp: machina_core::DurationMs,
        tick_before: Snapshot,
    ) -> (MutationResult, Transition) {
        Self::force_exception(clock, state, err, &mut handlers_called);
        let tick_after = clock.snapshot(None);
        let reason = CancelReason::Negotiation {
            state: state.to_string(),
        };
        let transition = Transition {
            mutation_kind: mutation.kind,
            targets: mutation.targets.clone(),
            states_before: active.clone(),
            states_after: active,
            handlers_called,
            accepted: false,
            cancel_reason: Some(reason.clone()),
            timestamp,
            tick_before,
            tick_after,
        };
        (MutationResult::Cancelled(reason), transition)
    }

    fn timestamp(&self) -> machina_core::DurationMs {
        machina_core::DurationMs::from_millis(self.started_at.elapsed().as_millis() as u64)
    }
}
