use std::collections::HashMap;

use async_trait::async_trait;
use pkarr::PublicKey;
use tokio::sync::RwLock;

use super::{RecordStore, StoreError};
use crate::record::PkarrRecord;

/// In-memory record store. Useful for tests and ephemeral deployments where
/// durability across restarts does not matter.
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    records: RwLock<HashMap<PublicKey, PkarrRecord>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn write_record(&self, record: PkarrRecord) -> Result<(), StoreError> {
        let public_key = record
            .public_key()
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        self.records.write().await.insert(public_key, record);
        Ok(())
    }

    async fn read_record(
        &self,
        public_key: &PublicKey,
    ) -> Result<Option<PkarrRecord>, StoreError> {
        Ok(self.records.read().await.get(public_key).cloned())
    }

    async fn list_records(&self) -> Result<Vec<PkarrRecord>, StoreError> {
        Ok(self.records.read().await.values().cloned().collect())
    }

    async fn list_due_for_republish(
        &self,
        older_than: u64,
    ) -> Result<Vec<PkarrRecord>, StoreError> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .filter(|record| record.last_published_at < older_than)
            .cloned()
            .collect())
    }

    async fn mark_republished(&self, public_key: &PublicKey, at: u64) -> Result<(), StoreError> {
        if let Some(record) = self.records.write().await.get_mut(public_key) {
            record.last_published_at = at;
        }
        Ok(())
    }
}
