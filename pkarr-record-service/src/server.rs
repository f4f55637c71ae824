use std::net::{SocketAddr, TcpListener};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum_server::Handle;

use crate::cache::RecordCache;
use crate::config_toml::ConfigToml;
use crate::dht::{DhtClient, MainlineDht};
use crate::http::create_app;
use crate::persistence::{LmdbRecordStore, RecordStore};
use crate::republisher::RecordsRepublisher;
use crate::service::RecordService;

/// Errors that can occur when building a [RecordServer].
#[derive(Debug, thiserror::Error)]
pub enum ServerBuildError {
    /// Failed to open the durable record store.
    #[error("record store error: {0}")]
    Store(anyhow::Error),
    /// Failed to build the DHT client.
    #[error("dht client error: {0}")]
    Dht(anyhow::Error),
    /// Failed to bind or start the HTTP listener.
    #[error("http server error: {0}")]
    HttpServer(#[from] std::io::Error),
}

/// The assembled service: store, DHT client, cache, engines, republisher
/// and the HTTP listener. Everything it owns stops when it is dropped.
pub struct RecordServer {
    service: RecordService,
    // Keep this alive. Republishing stops when the republisher is dropped.
    #[allow(dead_code)]
    republisher: RecordsRepublisher,
    http_handle: Handle,
    http_socket: SocketAddr,
}

impl RecordServer {
    /// Start with the production adapters: LMDB storage under the
    /// configured data directory and the Mainline DHT.
    pub async fn start(config: ConfigToml) -> Result<Self, ServerBuildError> {
        let store = unsafe { LmdbRecordStore::open(PathBuf::from(&config.storage.data_dir)) }
            .map_err(ServerBuildError::Store)?;
        let dht =
            MainlineDht::new(config.dht.bootstrap_nodes.as_deref()).map_err(ServerBuildError::Dht)?;
        Self::start_with(config, Arc::new(store), Arc::new(dht)).await
    }

    /// Start with explicit store and DHT implementations.
    pub async fn start_with(
        config: ConfigToml,
        store: Arc<dyn RecordStore>,
        dht: Arc<dyn DhtClient>,
    ) -> Result<Self, ServerBuildError> {
        let cache = RecordCache::new(config.general.cache_capacity, config.cache_ttl());
        let service = RecordService::new(store.clone(), dht.clone(), cache);
        let republisher = RecordsRepublisher::start(store, dht, config.republish_interval());

        let (http_handle, http_socket) =
            Self::start_http_server(&config, create_app(service.clone()))?;

        Ok(Self {
            service,
            republisher,
            http_handle,
            http_socket,
        })
    }

    fn start_http_server(
        config: &ConfigToml,
        router: Router,
    ) -> Result<(Handle, SocketAddr), std::io::Error> {
        let listener = TcpListener::bind(config.http.listen_socket)?;
        let socket = listener.local_addr()?;
        let handle = Handle::new();
        let server = axum_server::from_tcp(listener)
            .handle(handle.clone())
            .serve(router.into_make_service());
        tokio::spawn(async move {
            if let Err(error) = server.await {
                tracing::error!(?error, "record service http server error");
            }
        });

        Ok((handle, socket))
    }

    pub fn service(&self) -> &RecordService {
        &self.service
    }

    pub fn http_socket(&self) -> SocketAddr {
        self.http_socket
    }

    pub fn http_url(&self) -> String {
        format!("http://{}", self.http_socket)
    }

    /// Run until interrupted, then shut down gracefully.
    pub async fn run_until_done(&self) {
        let _ = tokio::signal::ctrl_c().await;
        self.shutdown();
    }

    pub fn shutdown(&self) {
        self.http_handle
            .graceful_shutdown(Some(Duration::from_secs(5)));
    }
}

impl Drop for RecordServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dht::testing::MockDht;
    use crate::persistence::InMemoryRecordStore;
    use crate::record::testing::signed_request;

    #[tokio::test]
    async fn starts_and_serves_on_an_ephemeral_port() {
        let server = RecordServer::start_with(
            ConfigToml::test(),
            Arc::new(InMemoryRecordStore::new()),
            Arc::new(MockDht::new()),
        )
        .await
        .unwrap();

        assert_ne!(server.http_socket().port(), 0);
        // The listener accepts connections.
        tokio::net::TcpStream::connect(server.http_socket())
            .await
            .unwrap();

        // The wired service is functional end to end.
        let request = signed_request(b"wired up", 1);
        server.service().publish(request.clone()).await.unwrap();
        let resolved = server.service().resolve(&request.public_key).await.unwrap();
        assert_eq!(resolved, request.to_resolved());
    }
}
