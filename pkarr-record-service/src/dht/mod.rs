//!
//! The boundary to the overlay network. Announcements are best-effort and
//! their failures never reach a caller; lookups fail over to durable storage.
//!

mod mainline_dht;

pub use mainline_dht::MainlineDht;

use async_trait::async_trait;
use pkarr::PublicKey;

use crate::record::{PkarrRecord, PublishRecordRequest, RecordDecodeError, ResolvedRecord};

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum DhtError {
    #[error("no node holds the record")]
    NotFound,
    #[error("dht lookup failed: {0}")]
    LookupFailed(String),
    #[error("dht put failed: {0}")]
    PutFailed(String),
}

/// A BEP44 mutable item as announced to and fetched from the DHT.
///
/// The signature is always the one captured at publish time; nothing in this
/// service ever re-signs a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DhtRecord {
    pub public_key: PublicKey,
    pub payload: Vec<u8>,
    pub signature: [u8; 64],
    pub seq: i64,
}

impl DhtRecord {
    pub fn to_resolved(&self) -> ResolvedRecord {
        ResolvedRecord {
            payload: self.payload.clone(),
            seq: self.seq,
            signature: self.signature,
        }
    }
}

impl From<&PublishRecordRequest> for DhtRecord {
    fn from(request: &PublishRecordRequest) -> Self {
        Self {
            public_key: request.public_key.clone(),
            payload: request.payload.clone(),
            signature: request.signature,
            seq: request.seq,
        }
    }
}

impl TryFrom<&PkarrRecord> for DhtRecord {
    type Error = RecordDecodeError;

    fn try_from(record: &PkarrRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            public_key: record.public_key()?,
            payload: record.payload()?,
            signature: record.signature()?,
            seq: record.seq,
        })
    }
}

/// The two operations the engines consume from the overlay network.
#[async_trait]
pub trait DhtClient: std::fmt::Debug + Send + Sync {
    /// Best-effort announce. The write token the network hands back is of no
    /// use to the engines and is only logged by implementations.
    async fn put(&self, record: DhtRecord) -> Result<(), DhtError>;

    /// Authoritative lookup of the most recent item published under the key.
    async fn get_full(&self, public_key: &PublicKey) -> Result<DhtRecord, DhtError>;
}
