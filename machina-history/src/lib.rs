//! # machina-history — pluggable transition history
//!
//! [`History`] is an append-only, last-*N* ring of committed
//! [`machina_core::Transition`] records, keyed by actor. Backend choice
//! (this crate's in-memory ring, `machina-history-sqlite`,
//! `machina-history-sled`) never affects scheduler semantics — all three
//! share this same trait and the same record shape.
//!
//! The in-memory backend here mirrors a `RwLock<HashMap<..>>`-backed store:
//! no durability, cheap, adequate for development and single-process
//! deployments.

#![deny(missing_docs)]

use async_trait::async_trait;
use machina_core::{ActorId, Transition};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use thiserror::Error;
use tokio::sync::RwLock;

/// A single recorded transition, keyed by the actor it belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRecord {
    /// The actor this transition occurred on.
    pub actor: ActorId,
    /// The transition itself.
    pub transition: Transition,
}

/// Errors a history backend can raise. Kept deliberately small — most
/// backends (in-memory, sled) cannot fail on read/write at all; this
/// exists for backends that can (sqlite).
#[derive(Debug, Error)]
pub enum HistoryError {
    /// The backend's underlying storage failed.
    #[error("history backend error: {0}")]
    Backend(String),
}

/// An append-only, last-*N* transition log, pluggable across backends.
#[async_trait]
pub trait History: Send + Sync {
    /// Append a transition for `actor`. Implementations drop the oldest
    /// record for that actor once their capacity is exceeded.
    async fn record(&self, actor: &ActorId, transition: Transition) -> Result<(), HistoryError>;

    /// The `k` most recent records for `actor`, newest first.
    async fn latest(&self, actor: &ActorId, k: usize) -> Result<Vec<HistoryRecord>, HistoryError>;

    /// All records for `actor` matching `predicate`, oldest first.
    async fn query(
        &self,
        actor: &ActorId,
        predicate: &(dyn Fn(&HistoryRecord) -> bool + Send + Sync),
    ) -> Result<Vec<HistoryRecord>, HistoryError>;
}

/// In-memory, per-actor ring buffer. The default backend — no setup, no
/// durability across restarts.
pub struct InMemoryHistory {
    capacity: usize,
    records: RwLock<HashMap<ActorId, VecDeque<HistoryRecord>>>,
}

impl InMemoryHistory {
    /// A new ring buffer retaining at most `capacity` records per actor.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            records: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl History for InMemoryHistory {
    async fn record(&self, actor: &ActorId, transition: Transition) -> Result<(), HistoryError> {
        let mut records = self.records.write().await;
        let ring = records.entry(actor.clone()).or_default();
        ring.push_back(HistoryRecord {
            actor: actor.clone(),
            transition,
        });
        while ring.len() > self.capacity {
            ring.pop_front();
        }
        Ok(())
    }

    async fn latest(&self, actor: &ActorId, k: usize) -> Result<Vec<HistoryRecord>, HistoryError> {
        let records = self.records.read().await;
        let Some(ring) = records.get(actor) else {
            return Ok(Vec::new());
        };
        Ok(ring.iter().rev().take(k).cloned().collect())
    }

    async fn query(
        &self,
        actor: &ActorId,
        predicate: &(dyn Fn(&HistoryRecord) -> bool + Send + Sync),
    ) -> Result<Vec<HistoryRecord>, HistoryError> {
        let records = self.records.read().await;
        let Some(ring) = records.get(actor) else {
            return Ok(Vec::new());
        };
        Ok(ring.iter().filter(|r| predicate(r)).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use machina_core::{DurationMs, Mutation, Snapshot};
    use std::collections::BTreeSet;

    fn transition(tick: u64) -> Transition {
        Transition::committed(
            &Mutation::add(["A"]),
            BTreeSet::new(),
            BTreeSet::from(["A".to_string()]),
            Vec::new(),
            DurationMs::from_millis(tick),
            Snapshot::default(),
            Snapshot::default(),
        )
    }

    #[tokio::test]
    async fn ring_buffer_drops_oldest_past_capacity() {
        let history = InMemoryHistory::new(2);
        let actor = ActorId::new("a1");
        for tick in 0..5 {
            history.record(&actor, transition(tick)).await.unwrap();
        }
        let latest = history.latest(&actor, 10).await.unwrap();
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].transition.timestamp, DurationMs::from_millis(4));
        assert_eq!(latest[1].transition.timestamp, DurationMs::from_millis(3));
    }

    #[tokio::test]
    async fn query_filters_by_predicate() {
        let history = InMemoryHistory::new(10);
        let actor = ActorId::new("a1");
        for tick in 0..4 {
            history.record(&actor, transition(tick)).await.unwrap();
        }
        let even: Vec<_> = history
            .query(&actor, &|r: &HistoryRecord| r.transition.timestamp.as_millis() % 2 == 0)
            .await
            .unwrap();
        assert_eq!(even.len(), 2);
    }

    #[tokio::test]
    async fn unknown_actor_returns_empty() {
        let history = InMemoryHistory::new(10);
        let latest = history.latest(&ActorId::new("ghost"), 5).await.unwrap();
        assert!(latest.is_empty());
    }
}
