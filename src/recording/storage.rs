// src/recording/storage.rs
//! Key-value persistence for recorded sessions
//!
//! Sessions are stored as JSON arrays under fixed string keys. The store is
//! synchronous and assumed to be always available; two monitors sharing a
//! store share the keys.

use crate::capture::event::RecordedEvent;
use crate::utils::errors::{MonitorError, Result};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, info};

/// Key holding the raw recorder buffer
pub const RECORDER_EVENTS_KEY: &str = "userEvents";

/// Key holding the monitor-level saved session
pub const SESSION_EVENTS_KEY: &str = "userBehaviorEvents";

/// Synchronous string key-value store
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    fn remove(&self, key: &str) -> Result<()>;
}

/// Storage backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    Memory,
    Sqlite,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,

    /// SQLite database file (sqlite backend only)
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            path: PathBuf::from("frontend-monitor.db"),
        }
    }
}

/// Serialize `events` under `key`
pub fn save_events(store: &dyn KeyValueStore, key: &str, events: &[RecordedEvent]) -> Result<()> {
    let json = serde_json::to_string(events)?;
    store.set(key, &json)?;
    debug!("Saved {} events under {}", events.len(), key);
    Ok(())
}

/// Read the events stored under `key`, if any
pub fn load_events(store: &dyn KeyValueStore, key: &str) -> Result<Option<Vec<RecordedEvent>>> {
    match store.get(key)? {
        Some(json) => {
            let events: Vec<RecordedEvent> = serde_json::from_str(&json)?;
            debug!("Loaded {} events from {}", events.len(), key);
            Ok(Some(events))
        }
        None => Ok(None),
    }
}

/// In-process store
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// SQLite-backed store
pub struct SqliteStore {
    db: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database at `path`
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    MonitorError::StorageFailed(format!("Failed to create directory: {}", e))
                })?;
            }
        }

        let conn = Connection::open(&path)
            .map_err(|e| MonitorError::StorageFailed(format!("Failed to open database: {}", e)))?;

        let store = Self::with_connection(conn)?;
        info!("Key-value store opened at {:?}", path);
        Ok(store)
    }

    /// Non-persistent database, mostly for tests
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| MonitorError::StorageFailed(format!("Failed to open database: {}", e)))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS kv_store (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#,
            [],
        )
        .map_err(|e| MonitorError::StorageFailed(format!("Schema creation failed: {}", e)))?;

        Ok(Self {
            db: Mutex::new(conn),
        })
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let db = self.db.lock();
        let value = db
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let db = self.db.lock();
        db.execute(
            r#"
            INSERT INTO kv_store (key, value, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
            params![key, value, chrono::Utc::now().timestamp_millis()],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let db = self.db.lock();
        db.execute("DELETE FROM kv_store WHERE key = ?1", params![key])?;
        Ok(())
    }
}

/// Build the store selected by the configuration
pub fn open_store(config: &StorageConfig) -> Result<Box<dyn KeyValueStore>> {
    match config.backend {
        StorageBackend::Memory => Ok(Box::new(MemoryStore::new())),
        StorageBackend::Sqlite => Ok(Box::new(SqliteStore::open(config.path.clone())?)),
    }
}
