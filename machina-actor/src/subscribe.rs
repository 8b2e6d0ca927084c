//! Single-use, predicate-based subscriptions over an actor's tick vector.
//!
//! Realised as a list of pending predicates checked synchronously during
//! the commit phase of every transition (see `Scheduler::on_change`).
//! A matching transition closes the subscriber's channel; cancelling the
//! caller's own context releases it independently, via `tokio::select!`.

use machina_core::Snapshot;
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex as TokioMutex};
use tokio_util::sync::CancellationToken;

/// A predicate over a tick snapshot.
pub type SnapshotPredicate = Arc<dyn Fn(&Snapshot) -> bool + Send + Sync>;

struct Pending {
    predicate: SnapshotPredicate,
    sender: Option<oneshot::Sender<Snapshot>>,
}

/// The shared registry of pending subscriptions an actor checks on every commit.
#[derive(Clone, Default)]
pub struct SubscriptionRegistry {
    pending: Arc<TokioMutex<Vec<Pending>>>,
}

impl SubscriptionRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `predicate`, returning a receiver that resolves with the
    /// first tick snapshot to satisfy it.
    pub fn register(&self, predicate: SnapshotPredicate) -> oneshot::Receiver<Snapshot> {
        let (tx, rx) = oneshot::channel();
        if let Ok(mut pending) = self.pending.try_lock() {
            pending.push(Pending {
                predicate,
                sender: Some(tx),
            });
        }
        rx
    }

    /// Check every pending subscription against `after`, firing and
    /// removing the ones that match. Called synchronously from the
    /// scheduler's commit path — must not block.
    pub fn notify(&self, after: &Snapshot) {
        let Ok(mut pending) = self.pending.try_lock() else {
            tracing::warn!("subscription registry contended during commit, skipping this round");
            return;
        };
        pending.retain_mut(|p| {
            if (p.predicate)(after) {
                if let Some(sender) = p.sender.take() {
                    let _ = sender.send(after.clone());
                }
                false
            } else {
                true
            }
        });
    }

    /// Drop every pending subscription without firing it — used on dispose.
    pub fn clear(&self) {
        if let Ok(mut pending) = self.pending.try_lock() {
            pending.clear();
        }
    }
}

/// Wait for `receiver` to resolve, or for `cancel` to fire first. Returns
/// `None` if the caller's context was cancelled before the predicate matched.
pub async fn await_or_cancel(
    receiver: oneshot::Receiver<Snapshot>,
    cancel: CancellationToken,
) -> Option<Snapshot> {
    tokio::select! {
        result = receiver => result.ok(),
        _ = cancel.cancelled() => None,
    }
}
