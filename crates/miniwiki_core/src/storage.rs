//! Synchronous key-value storage behind the page store.
//!
//! The store never touches a backend directly; it goes through [`Storage`]
//! so durable sessions use SQLite while tests and non-interactive contexts
//! substitute the in-memory implementation.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, params};

/// Key holding the live page collection as a JSON object.
pub const PAGES_KEY: &str = "wiki-pages";

/// Key holding the backup log as a JSON array, oldest entry first.
pub const BACKUPS_KEY: &str = "wiki-pages-backups";

pub trait Storage {
    fn get_item(&self, key: &str) -> Result<Option<String>>;
    fn set_item(&mut self, key: &str, value: &str) -> Result<()>;
    fn remove_item(&mut self, key: &str) -> Result<()>;
}

const KV_SCHEMA_SQL: &str = "CREATE TABLE IF NOT EXISTS kv_store (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at_unix INTEGER NOT NULL
);";

/// Durable storage over a single-table SQLite database.
pub struct SqliteStorage {
    connection: Connection,
}

impl SqliteStorage {
    /// Open (or create) the database at `db_path`, creating parent
    /// directories as needed.
    pub fn open(db_path: &Path) -> Result<Self> {
        ensure_db_parent(db_path)?;
        let connection = Connection::open(db_path)
            .with_context(|| format!("failed to open {}", db_path.display()))?;
        connection
            .pragma_update(None, "foreign_keys", "ON")
            .context("failed to enable foreign_keys pragma")?;
        connection
            .pragma_update(None, "journal_mode", "WAL")
            .context("failed to enable WAL journal mode")?;
        connection
            .execute_batch(KV_SCHEMA_SQL)
            .context("failed to create kv_store table")?;
        Ok(Self { connection })
    }
}

impl Storage for SqliteStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        self.connection
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .with_context(|| format!("failed to read storage key {key}"))
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<()> {
        self.connection
            .execute(
                "INSERT INTO kv_store (key, value, updated_at_unix) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET
                     value = excluded.value,
                     updated_at_unix = excluded.updated_at_unix",
                params![key, value, now_unix()?],
            )
            .with_context(|| format!("failed to write storage key {key}"))?;
        Ok(())
    }

    fn remove_item(&mut self, key: &str) -> Result<()> {
        self.connection
            .execute("DELETE FROM kv_store WHERE key = ?1", params![key])
            .with_context(|| format!("failed to remove storage key {key}"))?;
        Ok(())
    }
}

/// Volatile storage for tests and contexts without a durable backend.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    items: BTreeMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.items.get(key).cloned())
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<()> {
        self.items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&mut self, key: &str) -> Result<()> {
        self.items.remove(key);
        Ok(())
    }
}

fn now_unix() -> Result<i64> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("system clock error")?
        .as_secs();
    i64::try_from(now).context("timestamp does not fit into i64")
}

fn ensure_db_parent(db_path: &Path) -> Result<()> {
    let parent = db_path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("db path has no parent: {}", db_path.display()))?;
    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create database parent directory {}",
            parent.display()
        )
    })
}
