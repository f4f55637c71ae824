use std::borrow::Cow;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use heed::{BoxedError, BytesDecode, BytesEncode, Database, Env, EnvOpenOptions};
use pkarr::PublicKey;
use postcard::{from_bytes, to_allocvec};

use super::{RecordStore, StoreError};
use crate::record::PkarrRecord;

/// Virtual map size. LMDB reserves address space, not disk.
const DEFAULT_MAP_SIZE: usize = 10995116277760; // 10TB

/// PublicKey => PkarrRecord.
type RecordsTable = Database<PublicKeyCodec, PkarrRecord>;

const RECORDS_TABLE: &str = "records";
const TABLES_COUNT: u32 = 1;

pub struct PublicKeyCodec {}

impl BytesEncode<'_> for PublicKeyCodec {
    type EItem = PublicKey;

    fn bytes_encode(pubkey: &Self::EItem) -> Result<Cow<[u8]>, BoxedError> {
        Ok(Cow::Borrowed(pubkey.as_bytes()))
    }
}

impl<'a> BytesDecode<'a> for PublicKeyCodec {
    type DItem = PublicKey;

    fn bytes_decode(bytes: &'a [u8]) -> Result<Self::DItem, BoxedError> {
        Ok(PublicKey::try_from(bytes)?)
    }
}

impl BytesEncode<'_> for PkarrRecord {
    type EItem = Self;

    fn bytes_encode(record: &Self::EItem) -> Result<Cow<[u8]>, BoxedError> {
        Ok(Cow::Owned(to_allocvec(record)?))
    }
}

impl<'a> BytesDecode<'a> for PkarrRecord {
    type DItem = Self;

    fn bytes_decode(bytes: &'a [u8]) -> Result<Self::DItem, BoxedError> {
        Ok(from_bytes(bytes)?)
    }
}

/// LMDB-backed record store.
#[derive(Debug, Clone)]
pub struct LmdbRecordStore {
    env: Env,
    records: RecordsTable,
    // Only used for testing purposes to keep the testdir alive.
    #[allow(dead_code)]
    test_dir: Option<Arc<tempfile::TempDir>>,
}

impl LmdbRecordStore {
    /// # Safety
    /// Uses LMDB, [opening][heed::EnvOpenOptions::open] which is marked unsafe
    /// because of the possible Undefined Behavior (UB) if the lock file is broken.
    pub unsafe fn open(main_dir: PathBuf) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&main_dir)?;

        let env = unsafe {
            EnvOpenOptions::new()
                .max_dbs(TABLES_COUNT)
                .map_size(DEFAULT_MAP_SIZE)
                .open(&main_dir)
        }?;

        let mut wtxn = env.write_txn()?;
        let records: RecordsTable = env.create_database(&mut wtxn, Some(RECORDS_TABLE))?;
        wtxn.commit()?;

        Ok(Self {
            env,
            records,
            test_dir: None,
        })
    }

    // Create an ephemeral store for testing purposes.
    #[cfg(test)]
    pub fn test() -> Self {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut store = unsafe { Self::open(PathBuf::from(temp_dir.path())).unwrap() };
        // Keep the directory alive for the duration of the test. As soon as
        // all store instances are dropped, the directory is deleted.
        store.test_dir = Some(Arc::new(temp_dir));

        store
    }

    fn key_of(record: &PkarrRecord) -> Result<PublicKey, StoreError> {
        record
            .public_key()
            .map_err(|e| StoreError::Corrupt(e.to_string()))
    }
}

#[async_trait]
impl RecordStore for LmdbRecordStore {
    async fn write_record(&self, record: PkarrRecord) -> Result<(), StoreError> {
        let public_key = Self::key_of(&record)?;
        let mut wtxn = self.env.write_txn()?;
        self.records.put(&mut wtxn, &public_key, &record)?;
        wtxn.commit()?;
        Ok(())
    }

    async fn read_record(
        &self,
        public_key: &PublicKey,
    ) -> Result<Option<PkarrRecord>, StoreError> {
        let rtxn = self.env.read_txn()?;
        Ok(self.records.get(&rtxn, public_key)?)
    }

    async fn list_records(&self) -> Result<Vec<PkarrRecord>, StoreError> {
        let rtxn = self.env.read_txn()?;
        let mut records = Vec::new();
        for entry in self.records.iter(&rtxn)? {
            let (_, record) = entry?;
            records.push(record);
        }
        Ok(records)
    }

    async fn list_due_for_republish(
        &self,
        older_than: u64,
    ) -> Result<Vec<PkarrRecord>, StoreError> {
        let records = self.list_records().await?;
        Ok(records
            .into_iter()
            .filter(|record| record.last_published_at < older_than)
            .collect())
    }

    async fn mark_republished(&self, public_key: &PublicKey, at: u64) -> Result<(), StoreError> {
        let mut wtxn = self.env.write_txn()?;
        if let Some(mut record) = self.records.get(&wtxn, public_key)? {
            record.last_published_at = at;
            self.records.put(&mut wtxn, public_key, &record)?;
        }
        wtxn.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::testing::signed_request;

    #[tokio::test]
    async fn write_read_round_trip() {
        let store = LmdbRecordStore::test();
        let request = signed_request(b"hello world", 1);
        let record = request.to_record(7);

        store.write_record(record.clone()).await.unwrap();
        let read = store.read_record(&request.public_key).await.unwrap();
        assert_eq!(read, Some(record));

        let absent = signed_request(b"other", 1);
        assert_eq!(store.read_record(&absent.public_key).await.unwrap(), None);
    }

    #[tokio::test]
    async fn write_overwrites_existing_record() {
        let store = LmdbRecordStore::test();
        let request = signed_request(b"version one", 1);
        store.write_record(request.to_record(0)).await.unwrap();

        let mut newer = request.clone();
        newer.payload = b"version two".to_vec();
        store.write_record(newer.to_record(0)).await.unwrap();

        let read = store
            .read_record(&request.public_key)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(read.payload().unwrap(), b"version two");
        assert_eq!(store.list_records().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn list_returns_every_record() {
        let store = LmdbRecordStore::test();
        for i in 0..5 {
            let request = signed_request(format!("record {i}").as_bytes(), 1);
            store.write_record(request.to_record(0)).await.unwrap();
        }
        assert_eq!(store.list_records().await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn due_filtering_and_mark_republished() {
        let store = LmdbRecordStore::test();
        let stale = signed_request(b"stale", 1);
        let fresh = signed_request(b"fresh", 1);
        store.write_record(stale.to_record(100)).await.unwrap();
        store.write_record(fresh.to_record(10_000)).await.unwrap();

        let due = store.list_due_for_republish(1_000).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].public_key().unwrap(), stale.public_key);

        store
            .mark_republished(&stale.public_key, 20_000)
            .await
            .unwrap();
        assert!(store.list_due_for_republish(1_000).await.unwrap().is_empty());

        // Only the timestamp moved.
        let read = store.read_record(&stale.public_key).await.unwrap().unwrap();
        assert_eq!(read.last_published_at, 20_000);
        assert_eq!(read.payload().unwrap(), b"stale");
    }
}
