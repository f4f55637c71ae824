//!
//! Bounded, TTL-limited cache of resolved records.
//!
//! Purely a read accelerator: entries are serialized [crate::record::ResolvedRecord]
//! bytes keyed by public key, and absence implies nothing about a record's
//! existence. Never authoritative.
//!

use lru::LruCache;
use pkarr::PublicKey;
use std::num::NonZeroUsize;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

/// Per-entry byte limit. Large enough for the JSON envelope of a payload at
/// the record size limit, small enough to keep the cache's footprint bounded
/// by `capacity * MAX_ENTRY_SIZE`.
pub const MAX_ENTRY_SIZE: usize = 2048;

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("entry of {0} bytes exceeds the per-entry cache limit")]
    EntryTooLarge(usize),
}

#[derive(Debug, Clone)]
struct CacheEntry {
    bytes: Vec<u8>,
    inserted_at: Instant,
}

/// Thread-safe `public key -> serialized record` store with LRU eviction
/// and per-entry TTL expiry.
#[derive(Debug, Clone)]
pub struct RecordCache {
    entries: Arc<RwLock<LruCache<PublicKey, CacheEntry>>>,
    ttl: Duration,
}

impl RecordCache {
    /// Create a cache holding at most `capacity` entries, each alive for `ttl`.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).expect("capacity is at least 1");
        Self {
            entries: Arc::new(RwLock::new(LruCache::new(capacity))),
            ttl,
        }
    }

    /// Look up an entry. Expired entries are dropped and reported as a miss.
    pub fn get(&self, public_key: &PublicKey) -> Option<Vec<u8>> {
        let mut entries = match self.entries.write() {
            Ok(guard) => guard,
            Err(e) => {
                tracing::error!("record cache lock poisoned: {e}");
                return None;
            }
        };
        match entries.get(public_key) {
            Some(entry) if entry.inserted_at.elapsed() < self.ttl => Some(entry.bytes.clone()),
            Some(_) => {
                entries.pop(public_key);
                None
            }
            None => None,
        }
    }

    /// Insert or replace an entry, evicting the least recently used one when
    /// the cache is full.
    pub fn set(&self, public_key: &PublicKey, bytes: Vec<u8>) -> Result<(), CacheError> {
        if bytes.len() > MAX_ENTRY_SIZE {
            return Err(CacheError::EntryTooLarge(bytes.len()));
        }
        let mut entries = match self.entries.write() {
            Ok(guard) => guard,
            Err(e) => {
                tracing::error!("record cache lock poisoned: {e}");
                return Ok(());
            }
        };
        entries.put(
            public_key.clone(),
            CacheEntry {
                bytes,
                inserted_at: Instant::now(),
            },
        );
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkarr::Keypair;

    fn random_key() -> PublicKey {
        Keypair::random().public_key()
    }

    #[test]
    fn set_and_get() {
        let cache = RecordCache::new(16, Duration::from_secs(60));
        let key = random_key();
        cache.set(&key, b"hello".to_vec()).unwrap();
        assert_eq!(cache.get(&key), Some(b"hello".to_vec()));
        assert_eq!(cache.get(&random_key()), None);
    }

    #[test]
    fn entries_expire_after_ttl() {
        let cache = RecordCache::new(16, Duration::from_millis(20));
        let key = random_key();
        cache.set(&key, b"hello".to_vec()).unwrap();
        assert!(cache.get(&key).is_some());

        std::thread::sleep(Duration::from_millis(40));
        assert_eq!(cache.get(&key), None);
        // The expired entry is dropped, not just hidden.
        assert!(cache.is_empty());
    }

    #[test]
    fn oversized_entries_are_rejected() {
        let cache = RecordCache::new(16, Duration::from_secs(60));
        let key = random_key();
        let result = cache.set(&key, vec![0u8; MAX_ENTRY_SIZE + 1]);
        assert_eq!(result, Err(CacheError::EntryTooLarge(MAX_ENTRY_SIZE + 1)));
        assert_eq!(cache.get(&key), None);
    }

    #[test]
    fn lru_eviction_keeps_the_cache_bounded() {
        let cache = RecordCache::new(4, Duration::from_secs(60));
        let keys: Vec<PublicKey> = (0..5).map(|_| random_key()).collect();
        for key in &keys {
            cache.set(key, b"x".to_vec()).unwrap();
        }
        assert_eq!(cache.len(), 4);
        // The first inserted key was the least recently used one.
        assert_eq!(cache.get(&keys[0]), None);
        assert!(cache.get(&keys[4]).is_some());
    }

    #[test]
    fn set_overwrites_existing_entries() {
        let cache = RecordCache::new(4, Duration::from_secs(60));
        let key = random_key();
        cache.set(&key, b"old".to_vec()).unwrap();
        cache.set(&key, b"new".to_vec()).unwrap();
        assert_eq!(cache.get(&key), Some(b"new".to_vec()));
        assert_eq!(cache.len(), 1);
    }
}
