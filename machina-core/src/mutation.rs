//! Mutations — the atomic unit of input to a scheduler.

use crate::args::ArgBag;
use crate::duration::DurationMs;
use serde::{Deserialize, Serialize};

/// What kind of change a mutation requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    /// Activate (or re-activate, for `multi` states) the targets.
    Add,
    /// Deactivate the targets.
    Remove,
    /// Replace the whole active set atomically: equivalent to
    /// `Remove(active \ targets)` followed by `Add(targets \ active)`,
    /// but as a single transition.
    Set,
}

/// A request to add/remove/set a set of states, with arguments. The
/// scheduler's unit of input — it either fully commits as a [`crate::transition::Transition`]
/// or fully cancels.
#[derive(Debug, Clone)]
pub struct Mutation {
    /// The kind of change requested.
    pub kind: MutationKind,
    /// The state names targeted by this mutation.
    pub targets: Vec<String>,
    /// Keyed, namespaced arguments travelling with this mutation.
    pub args: ArgBag,
    /// If the queue cannot drain this mutation before the deadline
    /// elapses, it is cancelled with `CancelReason::Timeout`.
    pub deadline: Option<DurationMs>,
}

impl Mutation {
    /// Construct an `Add` mutation for the given targets.
    pub fn add(targets: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self::new(MutationKind::Add, targets)
    }

    /// Construct a `Remove` mutation for the given targets.
    pub fn remove(targets: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self::new(MutationKind::Remove, targets)
    }

    /// Construct a `Set` mutation for the given targets.
    pub fn set(targets: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self::new(MutationKind::Set, targets)
    }

    fn new(kind: MutationKind, targets: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            kind,
            targets: targets.into_iter().map(Into::into).collect(),
            args: ArgBag::new(),
            deadline: None,
        }
    }

    /// Builder: attach arguments.
    pub fn with_args(mut self, args: ArgBag) -> Self {
        self.args = args;
        self
    }

    /// Builder: attach a deadline.
    pub fn with_deadline(mut self, deadline: DurationMs) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// Wire-safe projection of a [`Mutation`] — what crosses the REPL or a
/// process boundary. Arguments are stripped of transport-local fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutationWire {
    /// The kind of change requested.
    pub kind: MutationKind,
    /// The state names targeted.
    pub targets: Vec<String>,
    /// Transport-safe arguments.
    pub args: crate::args::TransportArgs,
    /// Deadline in milliseconds, if any.
    pub deadline_ms: Option<u64>,
}

impl From<&Mutation> for MutationWire {
    fn from(m: &Mutation) -> Self {
        Self {
            kind: m.kind,
            targets: m.targets.clone(),
            args: m.args.to_transportable(),
            deadline_ms: m.deadline.map(|d| d.as_millis()),
        }
    }
}
