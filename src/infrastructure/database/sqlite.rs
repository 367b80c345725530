//! SQLite backend - the local, always-available state store

use async_trait::async_trait;
use rusqlite::{Connection, Row};
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::application::errors::{StorageError, StorageResult};
use crate::domain::entities::StateRecord;
use crate::domain::traits::StateBackend;

/// Local state backend on a single shared SQLite connection
pub struct SqliteBackend {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteBackend {
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    pub fn in_memory() -> StorageResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> StorageResult<Self> {
        Self::init_tables(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn init_tables(conn: &Connection) -> rusqlite::Result<()> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS state (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            [],
        )?;
        Ok(())
    }

    /// Run a blocking closure against the connection off the async workers
    async fn with_conn<T, F>(&self, f: F) -> StorageResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> StorageResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| StorageError::Join("sqlite connection lock poisoned".to_string()))?;
            f(&guard)
        })
        .await
        .map_err(|e| StorageError::Join(e.to_string()))?
    }
}

fn record_from_row(row: &Row<'_>) -> StorageResult<StateRecord> {
    let key: String = row.get(0)?;
    let value: String = row.get(1)?;
    let updated_at: i64 = row.get(2)?;
    Ok(StateRecord::new(key, serde_json::from_str(&value)?, updated_at))
}

#[async_trait]
impl StateBackend for SqliteBackend {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn get(&self, key: &str) -> StorageResult<Option<StateRecord>> {
        let key = key.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare("SELECT key, value, updated_at FROM state WHERE key = ?1")?;
            let mut rows = stmt.query([&key])?;
            match rows.next()? {
                Some(row) => Ok(Some(record_from_row(row)?)),
                None => Ok(None),
            }
        })
        .await
    }

    async fn put(&self, record: &StateRecord) -> StorageResult<()> {
        let key = record.key.clone();
        let value = serde_json::to_string(&record.value)?;
        let updated_at = record.updated_at;
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO state (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                rusqlite::params![key, value, updated_at],
            )?;
            Ok(())
        })
        .await
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let key = key.to_string();
        self.with_conn(move |conn| {
            conn.execute("DELETE FROM state WHERE key = ?1", [&key])?;
            Ok(())
        })
        .await
    }

    async fn records(&self) -> StorageResult<Vec<StateRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT key, value, updated_at FROM state ORDER BY key")?;
            let mut rows = stmt.query([])?;
            let mut records = Vec::new();
            while let Some(row) = rows.next()? {
                records.push(record_from_row(row)?);
            }
            Ok(records)
        })
        .await
    }

    async fn count(&self) -> StorageResult<usize> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM state", [], |row| row.get(0))?;
            Ok(count as usize)
        })
        .await
    }
}
