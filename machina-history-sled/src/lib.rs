//! # machina-history-sled — embedded KV history backend
//!
//! One sled tree per actor, keyed by sled's monotonic id generator
//! (`generate_id`) so iteration order is insertion order without needing
//! a separate sequence column. Values are JSON-encoded transitions.

#![deny(missing_docs)]

use async_trait::async_trait;
use machina_core::{ActorId, Transition};
use machina_history::{History, HistoryError, HistoryRecord};

/// A sled-backed [`History`] implementation.
pub struct SledHistory {
    capacity: usize,
    db: sled::Db,
}

impl SledHistory {
    /// Open (creating if absent) a sled database at `path`.
    pub fn open(path: impl AsRef<std::path::Path>, capacity: usize) -> Result<Self, HistoryError> {
        let db = sled::open(path).map_err(|e| HistoryError::Backend(e.to_string()))?;
        Ok(Self {
            capacity: capacity.max(1),
            db,
        })
    }

    /// An in-process, non-persistent instance, useful for tests.
    pub fn open_temporary(capacity: usize) -> Result<Self, HistoryError> {
        let config = sled::Config::new().temporary(true);
        let db = config.open().map_err(|e| HistoryError::Backend(e.to_string()))?;
        Ok(Self {
            capacity: capacity.max(1),
            db,
        })
    }

    fn tree(&self, actor: &ActorId) -> Result<sled::Tree, HistoryError> {
        self.db
            .open_tree(actor.as_str())
            .map_err(|e| HistoryError::Backend(e.to_string()))
    }
}

#[async_trait]
impl History for SledHistory {
    async fn record(&self, actor: &ActorId, transition: Transition) -> Result<(), HistoryError> {
        let tree = self.tree(actor)?;
        let payload = serde_json::to_vec(&transition).map_err(|e| HistoryError::Backend(e.to_string()))?;
        let id = tree.generate_id().map_err(|e| HistoryError::Backend(e.to_string()))?;
        tree.insert(id.to_be_bytes(), payload)
            .map_err(|e| HistoryError::Backend(e.to_string()))?;

        while tree.len() > self.capacity {
            if let Some((key, _)) = tree.iter().next().transpose().map_err(|e| HistoryError::Backend(e.to_string()))? {
                tree.remove(key).map_err(|e| HistoryError::Backend(e.to_string()))?;
            } else {
                break;
            }
        }
        Ok(())
    }

    async fn latest(&self, actor: &ActorId, k: usize) -> Result<Vec<HistoryRecord>, HistoryError> {
        let tree = self.tree(actor)?;
        let mut out = Vec::new();
        for entry in tree.iter().rev().take(k) {
            let (_, value) = entry.map_err(|e| HistoryError::Backend(e.to_string()))?;
            let transition: Transition =
                serde_json::from_slice(&value).map_err(|e| HistoryError::Backend(e.to_string()))?;
            out.push(HistoryRecord {
                actor: actor.clone(),
                transition,
            });
        }
        Ok(out)
    }

    async fn query(
        &self,
        actor: &ActorId,
        predicate: &(dyn Fn(&HistoryRecord) -> bool + Send + Sync),
    ) -> Result<Vec<HistoryRecord>, HistoryError> {
        let tree = self.tree(actor)?;
        let mut out = Vec::new();
        for entry in tree.iter() {
            let (_, value) = entry.map_err(|e| HistoryError::Backend(e.to_string()))?;
            let transition: Transition =
                serde_json::from_slice(&value).map_err(|e| HistoryError::Backend(e.to_string()))?;
            let record = HistoryRecord {
                actor: actor.clone(),
                transition,
            };
            if predicate(&record) {
                out.push(record);
            }
        }
        Ok(out)
    }
}
