//! Publishes and resolves signed pkarr records over the Mainline DHT,
//! backed by a durable local store and a bounded in-memory cache.

mod cache;
pub mod config_toml;
mod dht;
mod http;
mod persistence;
mod record;
mod republisher;
mod server;
mod service;

pub use cache::{CacheError, RecordCache, MAX_ENTRY_SIZE};
pub use config_toml::ConfigToml;
pub use dht::{DhtClient, DhtError, DhtRecord, MainlineDht};
pub use http::create_app;
pub use persistence::{InMemoryRecordStore, LmdbRecordStore, RecordStore, StoreError};
pub use record::{
    signable, PkarrRecord, PublishRecordRequest, RecordJson, ResolvedRecord, ValidationError,
    MAX_PAYLOAD_SIZE,
};
pub use republisher::{RecordsRepublisher, RepublishSummary};
pub use server::{RecordServer, ServerBuildError};
pub use service::{PublishError, RecordService, ResolveError};
