//! Startup reconciliation between the local and remote state stores

use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;

use super::StateStore;
use crate::application::errors::StorageResult;
use crate::domain::entities::{unix_now, StateRecord};
use crate::domain::traits::StateBackend;

/// Outcome of one reconciliation run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Records written to the remote store
    pub pushed: usize,
    /// Records written to the local store
    pub pulled: usize,
    /// Keys already in agreement
    pub unchanged: usize,
    /// Keys imported from the legacy state file
    pub migrated: usize,
    /// Remote writes that failed
    pub failed: usize,
    /// Remote unreachable, local kept as authoritative
    pub degraded: bool,
}

impl SyncReport {
    /// Number of writes the run performed
    pub fn mutations(&self) -> usize {
        self.pushed + self.pulled + self.migrated
    }
}

/// Last-write-wins reconciliation, re-runnable and idempotent
pub struct Synchronizer<'a> {
    store: &'a StateStore,
}

impl<'a> Synchronizer<'a> {
    pub fn new(store: &'a StateStore) -> Self {
        Self { store }
    }

    pub async fn run(self) -> StorageResult<SyncReport> {
        match self.store.remote() {
            Some(remote) => self.reconcile(Arc::clone(remote)).await,
            None => {
                let mut report = SyncReport::default();
                if let Some(path) = self.store.legacy_path() {
                    report.migrated = self.migrate_legacy(path).await?;
                }
                Ok(report)
            }
        }
    }

    async fn reconcile(&self, remote: Arc<dyn StateBackend>) -> StorageResult<SyncReport> {
        let local = self.store.local();
        let mut report = SyncReport::default();
        tracing::info!("Starting state synchronization...");

        let local_records = index(local.records().await?);
        let remote_records = match self.store.within_timeout(remote.records()).await {
            Ok(records) => index(records),
            Err(e) => {
                tracing::warn!("Remote state store unreachable, keeping local state: {}", e);
                report.degraded = true;
                return Ok(report);
            }
        };

        let keys: BTreeSet<&String> = local_records.keys().chain(remote_records.keys()).collect();

        for key in keys {
            match (local_records.get(key), remote_records.get(key)) {
                (Some(l), None) => self.push(&remote, l, &mut report).await,
                (None, Some(r)) => {
                    local.put(r).await?;
                    report.pulled += 1;
                }
                (Some(l), Some(r)) if r.updated_at > l.updated_at => {
                    local.put(r).await?;
                    report.pulled += 1;
                }
                (Some(l), Some(r)) if l.updated_at > r.updated_at => {
                    self.push(&remote, l, &mut report).await
                }
                _ => report.unchanged += 1,
            }
        }

        tracing::info!(
            "State synchronization complete: {} pushed, {} pulled, {} unchanged",
            report.pushed,
            report.pulled,
            report.unchanged
        );
        Ok(report)
    }

    async fn push(&self, remote: &Arc<dyn StateBackend>, record: &StateRecord, report: &mut SyncReport) {
        match self.store.within_timeout(remote.put(record)).await {
            Ok(()) => report.pushed += 1,
            Err(e) => {
                tracing::warn!("Failed to push '{}' to remote: {}", record.key, e);
                report.failed += 1;
            }
        }
    }

    /// Import a flat JSON object into an empty local store
    async fn migrate_legacy(&self, path: &Path) -> StorageResult<usize> {
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Ok(0);
        }

        let local = self.store.local();
        if local.count().await? > 0 {
            return Ok(0);
        }

        tracing::info!("Migrating legacy state from {}...", path.display());
        let content = tokio::fs::read_to_string(path).await?;
        let data = match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(map)) => map,
            Ok(_) => {
                tracing::warn!("Legacy state file is not a JSON object, skipping migration");
                return Ok(0);
            }
            Err(e) => {
                tracing::error!("Migration failed: {}", e);
                return Ok(0);
            }
        };

        let now = unix_now();
        let mut migrated = 0;
        for (key, value) in data {
            local.put(&StateRecord::new(key, value, now)).await?;
            migrated += 1;
        }
        tracing::info!("Migrated {} keys from legacy state file", migrated);
        Ok(migrated)
    }
}

fn index(records: Vec<StateRecord>) -> HashMap<String, StateRecord> {
    records.into_iter().map(|r| (r.key.clone(), r)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::database::MemoryBackend;
    use serde_json::json;

    #[tokio::test]
    async fn ties_leave_both_sides_untouched() {
        let local = Arc::new(MemoryBackend::new("local").with_records([StateRecord::new("k", json!(1), 5)]));
        let remote = Arc::new(MemoryBackend::new("remote").with_records([StateRecord::new("k", json!(2), 5)]));
        let store = StateStore::new(local.clone()).with_remote(remote.clone());

        let report = Synchronizer::new(&store).run().await.unwrap();
        assert_eq!(report.unchanged, 1);
        assert_eq!(report.mutations(), 0);
        assert_eq!(local.get("k").await.unwrap().unwrap().value, json!(1));
        assert_eq!(remote.get("k").await.unwrap().unwrap().value, json!(2));
    }

    #[tokio::test]
    async fn newer_local_overwrites_remote() {
        let local = Arc::new(MemoryBackend::new("local").with_records([StateRecord::new("k", json!("new"), 30)]));
        let remote = Arc::new(MemoryBackend::new("remote").with_records([StateRecord::new("k", json!("old"), 3)]));
        let store = StateStore::new(local).with_remote(remote.clone());

        let report = Synchronizer::new(&store).run().await.unwrap();
        assert_eq!(report.pushed, 1);
        let record = remote.get("k").await.unwrap().unwrap();
        assert_eq!(record.value, json!("new"));
        assert_eq!(record.updated_at, 30);
    }

    #[tokio::test]
    async fn unreachable_remote_degrades() {
        let local = Arc::new(MemoryBackend::new("local").with_records([StateRecord::new("k", json!(1), 1)]));
        let remote = Arc::new(MemoryBackend::new("remote"));
        remote.set_offline(true);
        let store = StateStore::new(local.clone()).with_remote(remote);

        let report = Synchronizer::new(&store).run().await.unwrap();
        assert!(report.degraded);
        assert_eq!(report.mutations(), 0);
        assert_eq!(local.get("k").await.unwrap().unwrap().value, json!(1));
    }

    #[tokio::test]
    async fn migration_only_runs_into_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bot_state.json");
        std::fs::write(&path, r#"{"prefix": "!", "sudo_users": ["1@x"]}"#).unwrap();

        let local = Arc::new(MemoryBackend::new("local").with_records([StateRecord::new("prefix", json!("."), 1)]));
        let store = StateStore::new(local.clone()).with_legacy_path(&path);
        let report = Synchronizer::new(&store).run().await.unwrap();
        assert_eq!(report.migrated, 0);
        assert_eq!(local.get("prefix").await.unwrap().unwrap().value, json!("."));

        let empty = Arc::new(MemoryBackend::new("local"));
        let store = StateStore::new(empty.clone()).with_legacy_path(&path);
        let report = Synchronizer::new(&store).run().await.unwrap();
        assert_eq!(report.migrated, 2);
        assert_eq!(empty.get("sudo_users").await.unwrap().unwrap().value, json!(["1@x"]));
    }

    #[tokio::test]
    async fn malformed_legacy_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bot_state.json");
        std::fs::write(&path, "[1, 2, 3]").unwrap();

        let local = Arc::new(MemoryBackend::new("local"));
        let store = StateStore::new(local.clone()).with_legacy_path(&path);
        let report = Synchronizer::new(&store).run().await.unwrap();
        assert_eq!(report.migrated, 0);
        assert_eq!(local.count().await.unwrap(), 0);
    }
}
