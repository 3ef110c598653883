//! libSQL session/history store.
//!
//! One durable record per run: the ordered conversation/tool-call transcript,
//! keyed by session id and append-only per session. Handles are passed into
//! the Builder explicitly — concurrent runs use distinct session ids.

mod migrations;

use std::path::Path;

use chrono::Utc;
use libsql::{Connection, Database, params};
use uuid::Uuid;

use conceptscribe_shared::{Result, ScribeError};

/// One transcript turn.
#[derive(Debug, Clone)]
pub struct Turn {
    pub seq: i64,
    pub role: String,
    pub content: String,
    pub created_at: String,
}

/// Session store handle wrapping a libSQL database.
pub struct SessionStore {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
}

impl SessionStore {
    /// Open or create a session database at `path`.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ScribeError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| ScribeError::Session(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| ScribeError::Session(e.to_string()))?;

        let store = Self { db, conn };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Generate a new time-sortable session identifier.
    pub fn new_session_id() -> String {
        Uuid::now_v7().to_string()
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    ScribeError::Session(format!("migration v{} failed: {e}", migration.version))
                })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Append a turn to a session's transcript. Returns the assigned
    /// sequence number.
    pub async fn append_turn(&self, session_id: &str, role: &str, content: &str) -> Result<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO agent_sessions (session_id, seq, role, content, created_at)
                 SELECT ?1,
                        COALESCE(MAX(seq), 0) + 1,
                        ?2, ?3, ?4
                 FROM agent_sessions WHERE session_id = ?1",
                params![session_id, role, content, now.as_str()],
            )
            .await
            .map_err(|e| ScribeError::Session(e.to_string()))?;

        let mut rows = self
            .conn
            .query(
                "SELECT MAX(seq) FROM agent_sessions WHERE session_id = ?1",
                params![session_id],
            )
            .await
            .map_err(|e| ScribeError::Session(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => row
                .get::<i64>(0)
                .map_err(|e| ScribeError::Session(e.to_string())),
            Ok(None) => Err(ScribeError::Session("append produced no row".into())),
            Err(e) => Err(ScribeError::Session(e.to_string())),
        }
    }

    /// The most recent `limit` turns of a session, in chronological order.
    pub async fn recent_turns(&self, session_id: &str, limit: usize) -> Result<Vec<Turn>> {
        let mut rows = self
            .conn
            .query(
                "SELECT seq, role, content, created_at FROM agent_sessions
                 WHERE session_id = ?1 ORDER BY seq DESC LIMIT ?2",
                params![session_id, limit as i64],
            )
            .await
            .map_err(|e| ScribeError::Session(e.to_string()))?;

        let mut turns = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            turns.push(Turn {
                seq: row
                    .get::<i64>(0)
                    .map_err(|e| ScribeError::Session(e.to_string()))?,
                role: row
                    .get::<String>(1)
                    .map_err(|e| ScribeError::Session(e.to_string()))?,
                content: row
                    .get::<String>(2)
                    .map_err(|e| ScribeError::Session(e.to_string()))?,
                created_at: row
                    .get::<String>(3)
                    .map_err(|e| ScribeError::Session(e.to_string()))?,
            });
        }

        turns.reverse();
        Ok(turns)
    }

    /// Number of turns recorded for a session.
    pub async fn turn_count(&self, session_id: &str) -> Result<usize> {
        let mut rows = self
            .conn
            .query(
                "SELECT COUNT(*) FROM agent_sessions WHERE session_id = ?1",
                params![session_id],
            )
            .await
            .map_err(|e| ScribeError::Session(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let count = row
                    .get::<i64>(0)
                    .map_err(|e| ScribeError::Session(e.to_string()))?;
                Ok(count as usize)
            }
            Ok(None) => Ok(0),
            Err(e) => Err(ScribeError::Session(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn open_temp() -> (tempfile::TempDir, SessionStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::open(&dir.path().join("sessions.db"))
            .await
            .unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn append_assigns_increasing_seq() {
        let (_dir, store) = open_temp().await;
        let sid = SessionStore::new_session_id();

        assert_eq!(store.append_turn(&sid, "user", "hello").await.unwrap(), 1);
        assert_eq!(store.append_turn(&sid, "assistant", "hi").await.unwrap(), 2);
        assert_eq!(store.turn_count(&sid).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn sessions_are_isolated_by_id() {
        let (_dir, store) = open_temp().await;
        let a = SessionStore::new_session_id();
        let b = SessionStore::new_session_id();

        store.append_turn(&a, "user", "in a").await.unwrap();
        store.append_turn(&b, "user", "in b").await.unwrap();
        store.append_turn(&b, "assistant", "reply b").await.unwrap();

        assert_eq!(store.turn_count(&a).await.unwrap(), 1);
        assert_eq!(store.turn_count(&b).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn recent_turns_returns_window_in_order() {
        let (_dir, store) = open_temp().await;
        let sid = SessionStore::new_session_id();

        for i in 1..=5 {
            store
                .append_turn(&sid, "user", &format!("turn {i}"))
                .await
                .unwrap();
        }

        let recent = store.recent_turns(&sid, 3).await.unwrap();
        assert_eq!(recent.len(), 3);
        // Chronological order within the window
        assert_eq!(recent[0].content, "turn 3");
        assert_eq!(recent[2].content, "turn 5");
        assert!(recent[0].seq < recent[2].seq);
    }

    #[tokio::test]
    async fn reopen_preserves_transcript() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.db");
        let sid = SessionStore::new_session_id();

        {
            let store = SessionStore::open(&path).await.unwrap();
            store.append_turn(&sid, "user", "persisted").await.unwrap();
        }

        let store = SessionStore::open(&path).await.unwrap();
        let turns = store.recent_turns(&sid, 10).await.unwrap();
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].content, "persisted");
    }
}
