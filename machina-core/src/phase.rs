//! The handler-phase vocabulary dispatched by `machina-dispatch`.

use crate::args::ArgBag;
use crate::id::ActorId;
use crate::mutation::Mutation;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One of the five points at which a handler may be invoked for a state
/// during a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlerPhase {
    /// Negotiation before activation. Returning `false` cancels the transition.
    Enter,
    /// Negotiation before deactivation. Returning `false` cancels the transition.
    Exit,
    /// Effect after a successful activation.
    State,
    /// Effect after a successful deactivation.
    End,
    /// Effect after every accepted transition, regardless of target.
    Any,
}

impl HandlerPhase {
    /// Whether this phase can cancel the transition by returning `false`.
    pub fn is_negotiation(self) -> bool {
        matches!(self, HandlerPhase::Enter | HandlerPhase::Exit)
    }
}

/// What a handler receives: the mutation, the candidate set it would
/// produce, the emitting actor's id, and the typed argument bag.
#[derive(Debug, Clone)]
pub struct Event {
    /// The mutation under negotiation or already committed.
    pub mutation: Mutation,
    /// The active set this transition would produce (or has produced).
    pub candidate: BTreeSet<String>,
    /// The actor emitting this event.
    pub actor: ActorId,
    /// Arguments travelling with the mutation.
    pub args: ArgBag,
}

impl Event {
    /// Construct an event for a given mutation/candidate/actor.
    pub fn new(mutation: Mutation, candidate: BTreeSet<String>, actor: ActorId) -> Self {
        let args = mutation.args.clone();
        Self {
            mutation,
            candidate,
            actor,
            args,
        }
    }
}
