//! The per-actor FIFO mutation queue.

use machina_core::{ActorId, Mutation};
use std::collections::VecDeque;
use std::time::Instant;

/// A mutation waiting to be processed, stamped with its enqueue time so a
/// deadline can be checked against wall-clock elapsed rather than queue
/// position.
pub struct QueuedMutation {
    /// The actor the mutation targets.
    pub actor: ActorId,
    /// The mutation itself.
    pub mutation: Mutation,
    /// When this mutation was enqueued.
    pub enqueued_at: Instant,
}

/// FIFO queue of mutations awaiting a scheduler's attention. Mutations are
/// always drained in submission order — this is the source of the
/// scheduler's ordering guarantee across an actor's lifetime.
#[derive(Default)]
pub struct MutationQueue {
    inner: VecDeque<QueuedMutation>,
}

impl MutationQueue {
    /// An empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a mutation to the back of the queue.
    pub fn push(&mut self, actor: ActorId, mutation: Mutation) {
        self.inner.push_back(QueuedMutation {
            actor,
            mutation,
            enqueued_at: Instant::now(),
        });
    }

    /// Remove and return the oldest queued mutation.
    pub fn pop(&mut self) -> Option<QueuedMutation> {
        self.inner.pop_front()
    }

    /// Number of mutations waiting.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether the queue has nothing waiting.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
