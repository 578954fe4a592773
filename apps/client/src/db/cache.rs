//! Namespaced key/value cache backed by SQLite.
//!
//! Every value is stored as JSON under `<namespace><key>`. A value that no
//! longer decodes is treated as absent, so readers always get either the
//! cached value or the default they supplied.

use std::path::Path;

use chrono::Utc;
use quiz_core::snapshot::CacheSnapshot;
use quiz_core::types::{DeviceId, ExamHistoryEntry};
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::db::error::DbError;
use crate::db::schema::{SCHEMA, SCHEMA_VERSION};

type Result<T> = std::result::Result<T, DbError>;

/// Cache keys, relative to the namespace.
pub mod keys {
    pub const PRACTICED_PREFIX: &str = "practiced_";
    pub const WRONG: &str = "wrong";
    pub const FAVORITES: &str = "favorites";
    pub const MASTERED: &str = "mastered";
    pub const EXAM_HISTORY: &str = "exam_history";
    pub const ADMIN_AUTH: &str = "admin_auth";

    /// Key of the practiced list for one chapter.
    pub fn practiced(chapter_id: &str) -> String {
        format!("{PRACTICED_PREFIX}{chapter_id}")
    }
}

/// Local cache of progress state.
pub struct LocalCache {
    conn: Connection,
    namespace: String,
}

impl LocalCache {
    /// Open the cache at path, creating it if necessary.
    pub fn open<P: AsRef<Path>>(path: P, namespace: impl Into<String>) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn, namespace.into())
    }

    /// Open an in-memory cache (for testing).
    pub fn open_in_memory(namespace: impl Into<String>) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn, namespace.into())
    }

    fn with_connection(conn: Connection, namespace: String) -> Result<Self> {
        if namespace.is_empty() {
            return Err(DbError::InvalidData("cache namespace must not be empty".into()));
        }
        conn.execute_batch(SCHEMA)?;
        conn.execute(
            "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
            params![SCHEMA_VERSION],
        )?;
        Ok(Self { conn, namespace })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.namespace, key)
    }

    /// Raw JSON text stored under `key`.
    pub fn get_raw(&self, key: &str) -> Result<Option<String>> {
        self.conn
            .query_row(
                "SELECT value FROM cache_entries WHERE key = ?1",
                params![self.full_key(key)],
                |row| row.get(0),
            )
            .optional()
            .map_err(Into::into)
    }

    /// Decode the value under `key`, falling back to `default` when it is
    /// missing, unreadable or malformed.
    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        match self.get_raw(key) {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => value,
                Err(e) => {
                    tracing::warn!(key, error = %e, "discarding malformed cache value");
                    default
                }
            },
            Ok(None) => default,
            Err(e) => {
                tracing::warn!(key, error = %e, "cache read failed");
                default
            }
        }
    }

    /// Encode and store `value` under `key`.
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        put(&self.conn, &self.full_key(key), &raw)
    }

    pub fn remove(&self, key: &str) -> Result<bool> {
        let removed = self.conn.execute(
            "DELETE FROM cache_entries WHERE key = ?1",
            params![self.full_key(key)],
        )?;
        Ok(removed > 0)
    }

    /// Keys (relative to the namespace) starting with `prefix`, sorted.
    pub fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let full_prefix = self.full_key(prefix);
        let mut stmt = self.conn.prepare(
            "SELECT key FROM cache_entries WHERE substr(key, 1, length(?1)) = ?1 ORDER BY key",
        )?;

        let keys = stmt
            .query_map(params![full_prefix], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(keys
            .into_iter()
            .filter_map(|k| k.strip_prefix(&self.namespace).map(str::to_string))
            .collect())
    }

    /// Delete every entry of this namespace. The device identity is kept.
    pub fn clear_namespace(&self) -> Result<usize> {
        let removed = self.conn.execute(
            "DELETE FROM cache_entries WHERE substr(key, 1, length(?1)) = ?1",
            params![self.namespace],
        )?;
        Ok(removed)
    }

    /// Replace the cached progress projection in one transaction.
    ///
    /// Practiced lists of chapters absent from `snapshot` are removed.
    pub fn replace_snapshot(&self, snapshot: &CacheSnapshot) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;

        tx.execute(
            "DELETE FROM cache_entries WHERE substr(key, 1, length(?1)) = ?1",
            params![self.full_key(keys::PRACTICED_PREFIX)],
        )?;

        for (chapter_id, questions) in &snapshot.practiced {
            let raw = serde_json::to_string(questions)?;
            put(&tx, &self.full_key(&keys::practiced(chapter_id)), &raw)?;
        }
        put(
            &tx,
            &self.full_key(keys::WRONG),
            &serde_json::to_string(&snapshot.wrong)?,
        )?;
        put(
            &tx,
            &self.full_key(keys::FAVORITES),
            &serde_json::to_string(&snapshot.favorites)?,
        )?;
        put(
            &tx,
            &self.full_key(keys::MASTERED),
            &serde_json::to_string(&snapshot.mastered)?,
        )?;
        put(
            &tx,
            &self.full_key(keys::EXAM_HISTORY),
            &serde_json::to_string(&snapshot.exam_history)?,
        )?;

        tx.commit()?;
        Ok(())
    }

    /// Read the whole cached projection.
    pub fn snapshot(&self) -> Result<CacheSnapshot> {
        let mut snapshot = CacheSnapshot::default();
        for key in self.keys_with_prefix(keys::PRACTICED_PREFIX)? {
            let list: Vec<String> = self.get_or(&key, Vec::new());
            if let Some(chapter_id) = key.strip_prefix(keys::PRACTICED_PREFIX) {
                snapshot.practiced.insert(chapter_id.to_string(), list);
            }
        }
        snapshot.wrong = self.get_or(keys::WRONG, Vec::new());
        snapshot.favorites = self.get_or(keys::FAVORITES, Vec::new());
        snapshot.mastered = self.get_or(keys::MASTERED, Vec::new());
        snapshot.exam_history = self.get_or::<Vec<ExamHistoryEntry>>(keys::EXAM_HISTORY, Vec::new());
        Ok(snapshot)
    }

    // === Device identity ===

    /// Stored device id, if this installation already has one.
    pub fn device_id(&self) -> Result<Option<DeviceId>> {
        let raw: Option<String> = self
            .conn
            .query_row("SELECT device_id FROM local_device WHERE id = 1", [], |row| {
                row.get(0)
            })
            .optional()?;

        raw.map(|id| DeviceId::parse(&id).map_err(|e| DbError::InvalidData(e.to_string())))
            .transpose()
    }

    /// Return the stored device id, generating and persisting one on first use.
    pub fn load_or_create_device_id(&self) -> Result<DeviceId> {
        if let Some(id) = self.device_id()? {
            return Ok(id);
        }

        let id = DeviceId::generate();
        self.conn.execute(
            "INSERT INTO local_device (id, device_id, created_at) VALUES (1, ?1, ?2)",
            params![id.as_str(), Utc::now().to_rfc3339()],
        )?;
        tracing::info!(device_id = %id, "created device identity");
        Ok(id)
    }
}

fn put(conn: &Connection, full_key: &str, raw: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO cache_entries (key, value, updated_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        params![full_key, raw, Utc::now().to_rfc3339()],
    )?;
    Ok(())
}
