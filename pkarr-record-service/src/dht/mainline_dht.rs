use async_trait::async_trait;
use mainline::{async_dht::AsyncDht, Dht, MutableItem};
use pkarr::PublicKey;

use super::{DhtClient, DhtError, DhtRecord};

/// Production [DhtClient] backed by the Mainline DHT.
#[derive(Debug, Clone)]
pub struct MainlineDht {
    dht: AsyncDht,
}

impl MainlineDht {
    /// Connect to the Mainline DHT, optionally overriding the bootstrap
    /// nodes (used by testnets).
    pub fn new(bootstrap: Option<&[String]>) -> anyhow::Result<Self> {
        let mut builder = Dht::builder();
        if let Some(nodes) = bootstrap {
            builder.bootstrap(nodes);
        }
        Ok(Self {
            dht: builder.build()?.as_async(),
        })
    }
}

#[async_trait]
impl DhtClient for MainlineDht {
    async fn put(&self, record: DhtRecord) -> Result<(), DhtError> {
        // The signature travels verbatim; the DHT nodes verify it themselves.
        let item = MutableItem::new_signed_unchecked(
            *record.public_key.as_bytes(),
            record.signature,
            &record.payload,
            record.seq,
            None,
        );
        let target = self
            .dht
            .put_mutable(item, None)
            .await
            .map_err(|e| DhtError::PutFailed(e.to_string()))?;
        tracing::debug!("announced {} as mutable item {target}", record.public_key);
        Ok(())
    }

    async fn get_full(&self, public_key: &PublicKey) -> Result<DhtRecord, DhtError> {
        let item = self
            .dht
            .get_mutable_most_recent(public_key.as_bytes(), None)
            .await
            .ok_or(DhtError::NotFound)?;
        Ok(DhtRecord {
            public_key: public_key.clone(),
            payload: item.value().to_vec(),
            signature: *item.signature(),
            seq: item.seq(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::testing::signed_request;

    fn testnet_client(testnet: &mainline::Testnet) -> MainlineDht {
        MainlineDht::new(Some(testnet.bootstrap.as_slice())).unwrap()
    }

    #[tokio::test]
    async fn put_and_get_full_round_trip() {
        let testnet = tokio::task::spawn_blocking(|| mainline::Testnet::new(3))
            .await
            .expect("spawn_blocking panicked")
            .unwrap();
        let client = testnet_client(&testnet);

        let request = signed_request(b"hello mainline", 1);
        let announced = DhtRecord::from(&request);
        client.put(announced.clone()).await.unwrap();

        let resolved = client.get_full(&request.public_key).await.unwrap();
        assert_eq!(resolved, announced);
    }

    #[tokio::test]
    async fn get_full_misses_for_unknown_keys() {
        let testnet = tokio::task::spawn_blocking(|| mainline::Testnet::new(3))
            .await
            .expect("spawn_blocking panicked")
            .unwrap();
        let client = testnet_client(&testnet);

        let unknown = signed_request(b"never published", 1);
        let result = client.get_full(&unknown.public_key).await;
        assert_eq!(result, Err(DhtError::NotFound));
    }
}
