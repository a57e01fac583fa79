//! Persistent state store (§6, A.5): SQLite-backed `app_state`/
//! `sessions` tables, WAL mode, busy-retry, session heartbeat/cleanup.

use std::collections::HashMap;
use std::path::Path as StdPath;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rusqlite::{params, Connection, OptionalExtension};
use serde::{de::DeserializeOwned, Serialize};
use tracing::warn;

use crate::error::{TfmError, TfmResult};

/// Stale-session cutoff (§3 "Session row": "age > 5 min are cleanable").
pub const STALE_SESSION_AGE: Duration = Duration::from_secs(5 * 60);

const BUSY_RETRY_ATTEMPTS: u32 = 5;
const BUSY_RETRY_BASE_DELAY: Duration = Duration::from_millis(20);

pub struct StateStore {
    conn: Connection,
    instance_id: String,
}

impl StateStore {
    /// Opens (creating if absent) the state DB at `path`, applies WAL +
    /// busy-timeout pragmas, creates tables if missing, and cleans up
    /// stale session rows (A.5: "runs once at startup").
    pub fn open(path: &StdPath, instance_id: String) -> TfmResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.busy_timeout(Duration::from_secs(30))?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS app_state (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at REAL NOT NULL,
                instance_id TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS sessions (
                instance_id TEXT PRIMARY KEY,
                pid INTEGER NOT NULL,
                started_at REAL NOT NULL,
                last_seen REAL NOT NULL,
                hostname TEXT NOT NULL
            );",
        )?;
        let store = StateStore { conn, instance_id };
        store.clean_stale_sessions()?;
        Ok(store)
    }

    fn now_secs() -> f64 {
        SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs_f64()
    }

    fn with_retry<T>(&self, mut op: impl FnMut(&Connection) -> rusqlite::Result<T>) -> TfmResult<T> {
        let mut delay = BUSY_RETRY_BASE_DELAY;
        for attempt in 0..BUSY_RETRY_ATTEMPTS {
            match op(&self.conn) {
                Ok(value) => return Ok(value),
                Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == rusqlite::ErrorCode::DatabaseBusy => {
                    if attempt + 1 == BUSY_RETRY_ATTEMPTS {
                        return Err(TfmError::IoFailure(std::io::Error::other("state store busy, retries exhausted")));
                    }
                    std::thread::sleep(delay);
                    delay *= 2;
                }
                Err(e) => return Err(e.into()),
            }
        }
        unreachable!("loop always returns before exhausting its range")
    }

    pub fn register_session(&self, pid: u32, hostname: &str) -> TfmResult<()> {
        let now = Self::now_secs();
        self.with_retry(|conn| {
            conn.execute(
                "INSERT INTO sessions (instance_id, pid, started_at, last_seen, hostname)
                 VALUES (?1, ?2, ?3, ?3, ?4)
                 ON CONFLICT(instance_id) DO UPDATE SET last_seen = excluded.last_seen",
                params![self.instance_id, pid, now, hostname],
            )
        })?;
        Ok(())
    }

    pub fn heartbeat(&self) -> TfmResult<()> {
        let now = Self::now_secs();
        self.with_retry(|conn| {
            conn.execute("UPDATE sessions SET last_seen = ?1 WHERE instance_id = ?2", params![now, self.instance_id])
        })?;
        Ok(())
    }

    fn clean_stale_sessions(&self) -> TfmResult<()> {
        let cutoff = Self::now_secs() - STALE_SESSION_AGE.as_secs_f64();
        let removed = self.with_retry(|conn| conn.execute("DELETE FROM sessions WHERE last_seen < ?1", params![cutoff]))?;
        if removed > 0 {
            warn!(removed, "cleaned stale tfm sessions");
        }
        Ok(())
    }

    /// Stores `value` JSON-serialized under `key`, stamped with this
    /// instance's id and the current time.
    pub fn save<T: Serialize>(&self, key: &str, value: &T) -> TfmResult<()> {
        let json = serde_json::to_string(value).map_err(|e| TfmError::DecodingFailure(e.to_string()))?;
        let now = Self::now_secs();
        self.with_retry(|conn| {
            conn.execute(
                "INSERT INTO app_state (key, value, updated_at, instance_id) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at, instance_id = excluded.instance_id",
                params![key, json, now, self.instance_id],
            )
        })?;
        Ok(())
    }

    pub fn load<T: DeserializeOwned>(&self, key: &str) -> TfmResult<Option<T>> {
        let json: Option<String> = self.with_retry(|conn| {
            conn.query_row("SELECT value FROM app_state WHERE key = ?1", params![key], |row| row.get(0)).optional()
        })?;
        match json {
            Some(text) => serde_json::from_str(&text).map(Some).map_err(|e| TfmError::DecodingFailure(e.to_string())),
            None => Ok(None),
        }
    }

    /// Convenience for the cursor-history table (§3): loads the whole
    /// `path-URI → filename` map in one call.
    pub fn load_cursor_history(&self) -> TfmResult<HashMap<String, String>> {
        Ok(self.load("cursor_history")?.unwrap_or_default())
    }

    pub fn save_cursor_history(&self, history: &HashMap<String, String>) -> TfmResult<()> {
        self.save("cursor_history", history)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn save_then_load_round_trips_through_json() {
        let dir = tempdir().unwrap();
        let store = StateStore::open(&dir.path().join("state.db"), "instance-a".to_string()).unwrap();
        let mut history = HashMap::new();
        history.insert("file:///home".to_string(), "docs".to_string());
        store.save_cursor_history(&history).unwrap();
        let loaded = store.load_cursor_history().unwrap();
        assert_eq!(loaded.get("file:///home"), Some(&"docs".to_string()));
    }

    #[test]
    fn missing_key_loads_as_none() {
        let dir = tempdir().unwrap();
        let store = StateStore::open(&dir.path().join("state.db"), "instance-b".to_string()).unwrap();
        let loaded: Option<Vec<String>> = store.load("recent_dirs").unwrap();
        assert_eq!(loaded, None);
    }

    #[test]
    fn stale_sessions_are_removed_on_open() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("state.db");
        {
            let store = StateStore::open(&db_path, "old-session".to_string()).unwrap();
            store.register_session(1234, "host-a").unwrap();
            let stale_time = StateStore::now_secs() - STALE_SESSION_AGE.as_secs_f64() - 10.0;
            store
                .conn
                .execute("UPDATE sessions SET last_seen = ?1 WHERE instance_id = 'old-session'", params![stale_time])
                .unwrap();
        }
        let store = StateStore::open(&db_path, "new-session".to_string()).unwrap();
        let count: i64 = store.conn.query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0)).unwrap();
        assert_eq!(count, 0);
    }
}
