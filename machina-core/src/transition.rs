//! Transitions — the scheduler's commit record for one mutation.

use crate::clock::Snapshot;
use crate::duration::DurationMs;
use crate::mutation::Mutation;
use crate::phase::HandlerPhase;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Why a mutation was cancelled instead of committed. Per §7, cancellation
/// is a valid negotiation outcome, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum CancelReason {
    /// A negotiation handler (`Enter`/`Exit`) returned `false`.
    Negotiation {
        /// The state whose handler vetoed the transition.
        state: String,
    },
    /// A required state was absent and no chain could supply it, or two
    /// mutually-removing states both appeared in the candidate set.
    Unsatisfiable {
        /// Human-readable detail (which requirement, which conflict).
        detail: String,
    },
    /// A target was both activated and deactivated in the same mutation.
    ConfigError {
        /// The offending state name.
        state: String,
    },
    /// The mutation's deadline elapsed before the queue could drain it.
    Timeout,
    /// The actor's context was already cancelled (disposed or parent
    /// cancellation propagated) when this mutation was dequeued.
    ContextCancelled,
}

impl std::fmt::Display for CancelReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CancelReason::Negotiation { state } => write!(f, "negotiation veto by {state:?}"),
            CancelReason::Unsatisfiable { detail } => write!(f, "unsatisfiable: {detail}"),
            CancelReason::ConfigError { state } => {
                write!(f, "{state:?} both activated and deactivated")
            }
            CancelReason::Timeout => write!(f, "timeout"),
            CancelReason::ContextCancelled => write!(f, "context cancelled"),
        }
    }
}

/// The outcome of submitting a mutation to a scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MutationResult {
    /// The mutation was dequeued and committed.
    Executed,
    /// The mutation was accepted into the queue but has not yet run
    /// (returned to callers using fire-and-forget submission).
    Queued,
    /// The mutation was cancelled; no handlers ran and the clock did not advance.
    Cancelled(CancelReason),
}

/// A record of a handler invocation during a transition, for history/debugging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerCall {
    /// The state the handler was bound to.
    pub state: String,
    /// The phase invoked.
    pub phase: HandlerPhase,
}

/// The scheduler's commit record for one mutation — fully committed or
/// fully cancelled, never partial.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transition {
    /// The mutation this transition processed.
    pub mutation_kind: crate::mutation::MutationKind,
    /// Targets named by the mutation.
    pub targets: Vec<String>,
    /// Active set before this transition.
    pub states_before: BTreeSet<String>,
    /// Active set after this transition (equal to `states_before` if cancelled).
    pub states_after: BTreeSet<String>,
    /// Handlers invoked, in invocation order.
    pub handlers_called: Vec<HandlerCall>,
    /// Whether the transition committed.
    pub accepted: bool,
    /// Present iff `accepted` is `false`.
    pub cancel_reason: Option<CancelReason>,
    /// Wall-clock-independent timestamp (milliseconds since actor start).
    pub timestamp: DurationMs,
    /// Tick snapshot before the transition.
    pub tick_before: Snapshot,
    /// Tick snapshot after the transition (equal to `tick_before` if cancelled).
    pub tick_after: Snapshot,
}

impl Transition {
    /// Build a committed transition record.
    #[allow(clippy::too_many_arguments)]
    pub fn committed(
        mutation: &Mutation,
        states_before: BTreeSet<String>,
        states_after: BTreeSet<String>,
        handlers_called: Vec<HandlerCall>,
        timestamp: DurationMs,
        tick_before: Snapshot,
        tick_after: Snapshot,
    ) -> Self {
        Self {
            mutation_kind: mutation.kind,
            targets: mutation.targets.clone(),
            states_before,
            states_after,
            handlers_called,
            accepted: true,
            cancel_reason: None,
            timestamp,
            tick_before,
            tick_after,
        }
    }

    /// Build a cancelled transition record. Per the atomicity invariant,
    /// `states_after == states_before` and `tick_after == tick_before`.
    pub fn cancelled(
        mutation: &Mutation,
        states: BTreeSet<String>,
        reason: CancelReason,
        timestamp: DurationMs,
        tick: Snapshot,
    ) -> Self {
        Self {
            mutation_kind: mutation.kind,
            targets: mutation.targets.clone(),
            states_before: states.clone(),
            states_after: states,
            handlers_called: Vec::new(),
            accepted: false,
            cancel_reason: Some(reason),
            timestamp,
            tick_before: tick.clone(),
            tick_after: tick,
        }
    }
}
