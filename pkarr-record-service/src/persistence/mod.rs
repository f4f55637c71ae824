//!
//! Durable record storage. The store exclusively owns the canonical record;
//! the cache and the DHT only ever hold derived, disposable copies.
//!

mod lmdb;
mod memory;

pub use lmdb::LmdbRecordStore;
pub use memory::InMemoryRecordStore;

use crate::record::PkarrRecord;
use async_trait::async_trait;
use pkarr::PublicKey;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Database(#[from] heed::Error),
    #[error("stored record is corrupt: {0}")]
    Corrupt(String),
}

/// The seam between the engines and whatever persists records.
///
/// Implementations must tolerate concurrent calls from request handlers and
/// the republisher without external locking.
#[async_trait]
pub trait RecordStore: std::fmt::Debug + Send + Sync {
    /// Durable upsert keyed by the record's public key.
    async fn write_record(&self, record: PkarrRecord) -> Result<(), StoreError>;

    /// Returns `None` if no record exists for the key.
    async fn read_record(&self, public_key: &PublicKey)
        -> Result<Option<PkarrRecord>, StoreError>;

    /// Full snapshot of every stored record.
    async fn list_records(&self) -> Result<Vec<PkarrRecord>, StoreError>;

    /// Records whose last DHT announcement is older than `older_than`
    /// (microseconds), i.e. the ones due for a republish.
    async fn list_due_for_republish(&self, older_than: u64)
        -> Result<Vec<PkarrRecord>, StoreError>;

    /// Record a successful re-announcement. Touches only the republish
    /// timestamp; the record itself is never altered by the scheduler.
    async fn mark_republished(&self, public_key: &PublicKey, at: u64)
        -> Result<(), StoreError>;
}
