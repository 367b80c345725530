//! Durable state store - one local backend, optionally mirrored to a remote one
//!
//! Every operation runs against the local backend. When a remote is configured the
//! write is mirrored there on a best-effort basis: remote failures are logged and
//! never reach the caller.

pub mod memory;
pub mod remote;
pub mod sqlite;
pub mod sync;

use serde_json::Value;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;

use crate::application::errors::{StorageError, StorageResult};
use crate::domain::entities::StateRecord;
use crate::domain::traits::StateBackend;
use crate::infrastructure::config::DatabaseConfig;

pub use memory::MemoryBackend;
pub use remote::HttpDocumentBackend;
pub use sqlite::SqliteBackend;
pub use sync::{SyncReport, Synchronizer};

/// Default bound on a single remote operation
pub const DEFAULT_REMOTE_TIMEOUT: Duration = Duration::from_secs(10);

pub struct StateStore {
    local: Arc<dyn StateBackend>,
    remote: Option<Arc<dyn StateBackend>>,
    remote_timeout: Duration,
    legacy_path: Option<PathBuf>,
    reconciled: OnceCell<SyncReport>,
}

impl StateStore {
    pub fn new(local: Arc<dyn StateBackend>) -> Self {
        Self {
            local,
            remote: None,
            remote_timeout: DEFAULT_REMOTE_TIMEOUT,
            legacy_path: None,
            reconciled: OnceCell::new(),
        }
    }

    pub fn with_remote(mut self, remote: Arc<dyn StateBackend>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn with_remote_timeout(mut self, timeout: Duration) -> Self {
        self.remote_timeout = timeout;
        self
    }

    /// Flat JSON file imported into an empty local store when no remote exists
    pub fn with_legacy_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.legacy_path = Some(path.into());
        self
    }

    /// Open the backends described by the database configuration
    pub fn open(config: &DatabaseConfig) -> StorageResult<Self> {
        let local = SqliteBackend::open(&config.sqlite_path)?;
        tracing::info!("Local state store opened at {}", config.sqlite_path.display());

        let timeout = Duration::from_secs(config.remote_timeout_secs);
        let mut store = Self::new(Arc::new(local))
            .with_remote_timeout(timeout)
            .with_legacy_path(config.legacy_path());

        if let Some(url) = &config.remote_url {
            match HttpDocumentBackend::new(url, config.remote_token.clone(), timeout) {
                Ok(remote) => {
                    tracing::info!("Remote state store configured");
                    store = store.with_remote(Arc::new(remote));
                }
                Err(e) => tracing::warn!("Remote state store disabled: {}", e),
            }
        }

        Ok(store)
    }

    pub fn local(&self) -> &Arc<dyn StateBackend> {
        &self.local
    }

    pub fn remote(&self) -> Option<&Arc<dyn StateBackend>> {
        self.remote.as_ref()
    }

    pub fn remote_timeout(&self) -> Duration {
        self.remote_timeout
    }

    pub fn legacy_path(&self) -> Option<&PathBuf> {
        self.legacy_path.as_ref()
    }

    /// Reconcile local and remote once; later calls return the first report
    pub async fn reconcile(&self) -> StorageResult<&SyncReport> {
        self.reconciled
            .get_or_try_init(|| Synchronizer::new(self).run())
            .await
    }

    pub async fn get(&self, key: &str) -> StorageResult<Option<Value>> {
        Ok(self.local.get(key).await?.map(|r| r.value))
    }

    /// Write `value` stamped with the current time
    pub async fn set(&self, key: &str, value: Value) -> StorageResult<()> {
        self.put_record(&StateRecord::now(key, value)).await
    }

    /// Write a record keeping its own `updated_at`
    pub async fn put_record(&self, record: &StateRecord) -> StorageResult<()> {
        self.put_local(record).await?;
        self.mirror_put(record).await;
        Ok(())
    }

    pub async fn delete(&self, key: &str) -> StorageResult<()> {
        self.delete_local(key).await?;
        self.mirror_delete(key).await;
        Ok(())
    }

    pub async fn put_local(&self, record: &StateRecord) -> StorageResult<()> {
        self.local.put(record).await
    }

    pub async fn delete_local(&self, key: &str) -> StorageResult<()> {
        self.local.delete(key).await
    }

    /// Best-effort remote write; no-op in local-only mode
    pub async fn mirror_put(&self, record: &StateRecord) {
        if let Some(remote) = &self.remote {
            self.mirror(&record.key, "set", remote.put(record)).await;
        }
    }

    /// Best-effort remote delete; no-op in local-only mode
    pub async fn mirror_delete(&self, key: &str) {
        if let Some(remote) = &self.remote {
            self.mirror(key, "delete", remote.delete(key)).await;
        }
    }

    async fn mirror<F>(&self, key: &str, op: &str, fut: F)
    where
        F: Future<Output = StorageResult<()>>,
    {
        if let Err(e) = self.within_timeout(fut).await {
            tracing::warn!("Remote {} of '{}' failed: {}", op, key, e);
        }
    }

    /// Bound a remote operation by the configured timeout
    pub(crate) async fn within_timeout<T, F>(&self, fut: F) -> StorageResult<T>
    where
        F: Future<Output = StorageResult<T>>,
    {
        tokio::time::timeout(self.remote_timeout, fut)
            .await
            .map_err(|_| StorageError::Timeout(self.remote_timeout.as_secs()))?
    }
}
