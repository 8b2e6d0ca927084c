//! # machina-history-sqlite — embedded SQL history backend
//!
//! Stores transitions in a single `transitions` table, one row per
//! record, JSON-encoded. No migration framework: [`SqliteHistory::open`]
//! issues a single `CREATE TABLE IF NOT EXISTS` and nothing else. Capacity
//! is enforced with a `DELETE ... LIMIT`-style trim after every insert.

#![deny(missing_docs)]

use async_trait::async_trait;
use machina_core::{ActorId, Transition};
use machina_history::{History, HistoryError, HistoryRecord};
use rusqlite::{params, Connection};
use tokio::sync::Mutex;

/// A rusqlite-backed [`History`] implementation.
pub struct SqliteHistory {
    capacity: usize,
    conn: Mutex<Connection>,
}

impl SqliteHistory {
    /// Open (creating if absent) a sqlite database at `path` and ensure
    /// its schema exists.
    pub fn open(path: impl AsRef<std::path::Path>, capacity: usize) -> Result<Self, HistoryError> {
        let conn = Connection::open(path).map_err(|e| HistoryError::Backend(e.to_string()))?;
        Self::from_connection(conn, capacity)
    }

    /// An in-process, non-persistent instance, useful for tests.
    pub fn open_in_memory(capacity: usize) -> Result<Self, HistoryError> {
        let conn = Connection::open_in_memory().map_err(|e| HistoryError::Backend(e.to_string()))?;
        Self::from_connection(conn, capacity)
    }

    fn from_connection(conn: Connection, capacity: usize) -> Result<Self, HistoryError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS transitions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                actor TEXT NOT NULL,
                recorded_at_ms INTEGER NOT NULL,
                payload TEXT NOT NULL
            )",
            [],
        )
        .map_err(|e| HistoryError::Backend(e.to_string()))?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_transitions_actor ON transitions (actor, id)",
            [],
        )
        .map_err(|e| HistoryError::Backend(e.to_string()))?;
        Ok(Self {
            capacity: capacity.max(1),
            conn: Mutex::new(conn),
        })
    }
}

#[async_trait]
impl History for SqliteHistory {
    async fn record(&self, actor: &ActorId, transition: Transition) -> Result<(), HistoryError> {
        let payload = serde_json::to_string(&transition).map_err(|e| HistoryError::Backend(e.to_string()))?;
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO transitions (actor, recorded_at_ms, payload) VALUES (?1, ?2, ?3)",
            params![actor.as_str(), transition.timestamp.as_millis() as i64, payload],
        )
        .map_err(|e| HistoryError::Backend(e.to_string()))?;
        conn.execute(
            "DELETE FROM transitions WHERE actor = ?1 AND id NOT IN (
                SELECT id FROM transitions WHERE actor = ?1 ORDER BY id DESC LIMIT ?2
            )",
            params![actor.as_str(), self.capacity as i64],
        )
        .map_err(|e| HistoryError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn latest(&self, actor: &ActorId, k: usize) -> Result<Vec<HistoryRecord>, HistoryError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare("SELECT payload FROM transitions WHERE actor = ?1 ORDER BY id DESC LIMIT ?2")
            .map_err(|e| HistoryError::Backend(e.to_string()))?;
        let rows = stmt
            .query_map(params![actor.as_str(), k as i64], |row| row.get::<_, String>(0))
            .map_err(|e| HistoryError::Backend(e.to_string()))?;
        let mut out = Vec::new();
        for row in rows {
            let payload = row.map_err(|e| HistoryError::Backend(e.to_string()))?;
            let transition: Transition =
                serde_json::from_str(&payload).map_err(|e| HistoryError::Backend(e.to_string()))?;
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
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare("SELECT payload FROM transitions WHERE actor = ?1 ORDER BY id ASC")
            .map_err(|e| HistoryError::Backend(e.to_string()))?;
        let rows = stmt
            .query_map(params![actor.as_str()], |row| row.get::<_, String>(0))
            .map_err(|e| HistoryError::Backend(e.to_string()))?;
        let mut out = Vec::new();
        for row in rows {
            let payload = row.map_err(|e| HistoryError::Backend(e.to_string()))?;
            let transition: Transition =
                serde_json::from_str(&payload).map_err(|e| HistoryError::Backend(e.to_string()))?;
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
    async fn round_trips_and_trims_to_capacity() {
        let history = SqliteHistory::open_in_memory(2).unwrap();
        let actor = ActorId::new("a1");
        for tick in 0..5 {
            history.record(&actor, transition(tick)).await.unwrap();
        }
        let latest = history.latest(&actor, 10).await.unwrap();
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].transition.timestamp, DurationMs::from_millis(4));
    }

    #[tokio::test]
    async fn query_filters_rows() {
        let history = SqliteHistory::open_in_memory(10).unwrap();
        let actor = ActorId::new("a1");
        for tick in 0..4 {
            history.record(&actor, transition(tick)).await.unwrap();
        }
        let matches = history
            .query(&actor, &|r: &HistoryRecord| r.transition.timestamp.as_millis() >= 2)
            .await
            .unwrap();
        assert_eq!(matches.len(), 2);
    }
}
