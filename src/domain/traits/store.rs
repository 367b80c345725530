use async_trait::async_trait;
use crate::application::errors::StorageResult;
use crate::domain::entities::StateRecord;

/// StateBackend trait - abstraction over one physical state store
#[async_trait]
pub trait StateBackend: Send + Sync {
    /// Short name used in log lines
    fn name(&self) -> &str;

    async fn get(&self, key: &str) -> StorageResult<Option<StateRecord>>;
    async fn put(&self, record: &StateRecord) -> StorageResult<()>;
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Every record held by the backend
    async fn records(&self) -> StorageResult<Vec<StateRecord>>;

    async fn count(&self) -> StorageResult<usize> {
        Ok(self.records().await?.len())
    }
}
