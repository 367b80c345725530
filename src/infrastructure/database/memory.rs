//! In-memory backend, used for tests and as a stand-in remote

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;

use crate::application::errors::{StorageError, StorageResult};
use crate::domain::entities::StateRecord;
use crate::domain::traits::StateBackend;

/// HashMap-backed state store
pub struct MemoryBackend {
    label: String,
    records: RwLock<HashMap<String, StateRecord>>,
    offline: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryBackend {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            records: RwLock::new(HashMap::new()),
            offline: AtomicBool::new(false),
            writes: AtomicUsize::new(0),
        }
    }

    pub fn with_records(self, records: impl IntoIterator<Item = StateRecord>) -> Self {
        let map = records.into_iter().map(|r| (r.key.clone(), r)).collect();
        Self {
            records: RwLock::new(map),
            ..self
        }
    }

    /// Make every operation fail as if the store were unreachable
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of successful puts and deletes so far
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn ensure_online(&self) -> StorageResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StorageError::Remote(format!("{} is unreachable", self.label)));
        }
        Ok(())
    }
}

#[async_trait]
impl StateBackend for MemoryBackend {
    fn name(&self) -> &str {
        &self.label
    }

    async fn get(&self, key: &str) -> StorageResult<Option<StateRecord>> {
        self.ensure_online()?;
        let records = self.records.read().await;
        Ok(records.get(key).cloned())
    }

    async fn put(&self, record: &StateRecord) -> StorageResult<()> {
        self.ensure_online()?;
        let mut records = self.records.write().await;
        records.insert(record.key.clone(), record.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.ensure_online()?;
        let mut records = self.records.write().await;
        if records.remove(key).is_some() {
            self.writes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn records(&self) -> StorageResult<Vec<StateRecord>> {
        self.ensure_online()?;
        let records = self.records.read().await;
        let mut all: Vec<StateRecord> = records.values().cloned().collect();
        all.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(all)
    }
}
