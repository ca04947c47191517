use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{de::DeserializeOwned, Serialize};
use std::path::Path;
use std::rc::Rc;

use crate::error::Result;

pub mod keys {
    pub const COMPLETED_TASKS: &str = "completed_tasks";
    pub const COMPLETED_CATEGORIES: &str = "completed_categories";
    pub const NOTIFICATIONS: &str = "notifications";
    pub const NOTIFICATION_SETTINGS: &str = "notification_settings";
}

/// Durable string-to-string storage shared by the progress tracker and the
/// notification center.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

pub type SharedStore = Rc<dyn KeyValueStore>;

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        Ok(Self { conn })
    }

    pub fn in_memory() -> Result<Self> {
        let store = Self {
            conn: Connection::open_in_memory()?,
        };
        store.init()?;
        Ok(store)
    }

    pub fn init(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv_store (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            );
            "#,
        )?;
        Ok(())
    }

    pub fn keys(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT key FROM kv_store ORDER BY key")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        Ok(rows.collect::<rusqlite::Result<Vec<String>>>()?)
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
            params![key, value, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM kv_store WHERE key = ?1", params![key])?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.conn.execute("DELETE FROM kv_store", [])?;
        Ok(())
    }
}

/// Reads a JSON value, falling back to `default` when the key is absent or the
/// stored text cannot be read or decoded.
pub fn load_or_default<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str, default: T) -> T {
    let raw = match store.get(key) {
        Ok(Some(raw)) if !raw.is_empty() => raw,
        Ok(_) => return default,
        Err(e) => {
            tracing::warn!(key, error = %e, "failed to read stored value");
            return default;
        }
    };

    match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(key, error = %e, "discarding unreadable stored value");
            default
        }
    }
}

/// Writes `value` as JSON. Failures are logged and reported as `false`; the
/// caller's in-memory state stays authoritative.
pub fn save_json<T: Serialize + ?Sized>(store: &dyn KeyValueStore, key: &str, value: &T) -> bool {
    let encoded = match serde_json::to_string(value) {
        Ok(encoded) => encoded,
        Err(e) => {
            tracing::warn!(key, error = %e, "failed to encode value for storage");
            return false;
        }
    };

    match store.set(key, &encoded) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(key, error = %e, "failed to persist value");
            false
        }
    }
}
