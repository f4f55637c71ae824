//!
//! The publication and resolution engines.
//!
//! Publishing gates on validation and durability, then distributes to the
//! DHT in the background. Resolution walks cache, DHT and durable storage in
//! order, short-circuiting on the first source that answers.
//!

use std::sync::Arc;

use pkarr::PublicKey;
use pubky_timestamp::Timestamp;

use crate::cache::RecordCache;
use crate::dht::{DhtClient, DhtRecord};
use crate::persistence::{RecordStore, StoreError};
use crate::record::{PublishRecordRequest, ResolvedRecord, ValidationError};

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("sequence number {incoming} is older than the stored sequence number {stored}")]
    StaleSequence { incoming: i64, stored: i64 },
    #[error(transparent)]
    Persistence(#[from] StoreError),
}

impl PublishError {
    pub fn is_invalid_request(&self) -> bool {
        matches!(
            self,
            PublishError::Validation(ValidationError::InvalidRequest(_))
        )
    }

    pub fn is_invalid_signature(&self) -> bool {
        matches!(
            self,
            PublishError::Validation(ValidationError::InvalidSignature)
        )
    }

    pub fn is_stale_sequence(&self) -> bool {
        matches!(self, PublishError::StaleSequence { .. })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("record not found")]
    NotFound,
    #[error(transparent)]
    Persistence(#[from] StoreError),
}

/// Publishes and resolves pkarr records across the durable store, the
/// bounded cache and the DHT.
#[derive(Debug, Clone)]
pub struct RecordService {
    store: Arc<dyn RecordStore>,
    dht: Arc<dyn DhtClient>,
    cache: RecordCache,
}

impl RecordService {
    pub fn new(store: Arc<dyn RecordStore>, dht: Arc<dyn DhtClient>, cache: RecordCache) -> Self {
        Self { store, dht, cache }
    }

    /// Validate, persist, cache and (asynchronously) announce a record.
    ///
    /// Durability strictly precedes visibility: the record is written to the
    /// store before the cache is touched, and the DHT announcement is
    /// dispatched last, on a task whose lifetime is independent of the
    /// caller. The announcement's outcome is logged only; a failed announce
    /// is retried no earlier than the next republish tick.
    pub async fn publish(&self, request: PublishRecordRequest) -> Result<(), PublishError> {
        request.validate()?;

        // A validly signed but older sequence number must not regress the
        // stored record. Equal sequence numbers overwrite, so re-publishing
        // the identical request stays idempotent.
        if let Some(existing) = self.store.read_record(&request.public_key).await? {
            if request.seq < existing.seq {
                return Err(PublishError::StaleSequence {
                    incoming: request.seq,
                    stored: existing.seq,
                });
            }
        }

        let now = Timestamp::now().as_u64();
        self.store.write_record(request.to_record(now)).await?;
        self.cache_resolved(&request.public_key, &request.to_resolved());

        let dht = self.dht.clone();
        let announcement = DhtRecord::from(&request);
        let public_key = request.public_key.clone();
        tokio::spawn(async move {
            if let Err(e) = dht.put(announcement).await {
                tracing::warn!("failed to announce record {public_key} to the dht: {e}");
            }
        });

        Ok(())
    }

    /// Resolve a record by its public key: cache, then DHT, then durable
    /// storage.
    ///
    /// A DHT failure is never surfaced; the store is the fallback of last
    /// resort and its answer, possibly stale, wins over an unavailable
    /// overlay. Both the DHT and the store path write the answer through to
    /// the cache.
    pub async fn resolve(&self, public_key: &PublicKey) -> Result<ResolvedRecord, ResolveError> {
        if let Some(bytes) = self.cache.get(public_key) {
            // Cache contents were validated before they were cached, so no
            // signature re-verification happens here.
            match ResolvedRecord::from_cache_bytes(&bytes) {
                Ok(resolved) => {
                    tracing::debug!("resolved record {public_key} from cache");
                    return Ok(resolved);
                }
                Err(e) => {
                    tracing::warn!("ignoring undecodable cache entry for {public_key}: {e}")
                }
            }
        }

        match self.dht.get_full(public_key).await {
            Ok(item) => {
                let resolved = item.to_resolved();
                self.cache_resolved(public_key, &resolved);
                tracing::debug!("resolved record {public_key} from the dht");
                return Ok(resolved);
            }
            Err(e) => {
                tracing::warn!(
                    "failed to resolve record {public_key} from the dht, trying storage: {e}"
                );
            }
        }

        let record = self
            .store
            .read_record(public_key)
            .await?
            .ok_or(ResolveError::NotFound)?;
        let resolved = record
            .to_resolved()
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        self.cache_resolved(public_key, &resolved);
        tracing::debug!("resolved record {public_key} from storage");
        Ok(resolved)
    }

    // Cache population is an optimization, never a gate: failures are logged
    // and the operation carries on.
    fn cache_resolved(&self, public_key: &PublicKey, resolved: &ResolvedRecord) {
        match resolved.to_cache_bytes() {
            Ok(bytes) => {
                if let Err(e) = self.cache.set(public_key, bytes) {
                    tracing::warn!("failed to cache record {public_key}: {e}");
                }
            }
            Err(e) => {
                tracing::warn!("failed to serialize record {public_key} for the cache: {e}")
            }
        }
    }
}
