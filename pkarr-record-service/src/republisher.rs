//!
//! Periodic re-announcement of stored records to the DHT.
//!
//! Mainline nodes drop mutable items that are not refreshed, so every
//! record whose last announcement is older than the republish interval is
//! put again, reusing its captured signature verbatim. The service has no
//! access to any signing key and never re-signs.
//!

use std::sync::Arc;
use std::time::Duration;

use pubky_timestamp::Timestamp;
use tokio::task::JoinHandle;
use tokio::time::interval;

use crate::dht::{DhtClient, DhtRecord};
use crate::persistence::{RecordStore, StoreError};

/// Outcome of a single republish tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepublishSummary {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Re-announces due records on a fixed interval until dropped.
#[derive(Debug)]
pub struct RecordsRepublisher {
    handle: Option<JoinHandle<()>>,
}

impl RecordsRepublisher {
    /// Start the republish loop. An interval of zero disables it.
    pub fn start(
        store: Arc<dyn RecordStore>,
        dht: Arc<dyn DhtClient>,
        republish_interval: Duration,
    ) -> Self {
        if republish_interval.is_zero() {
            tracing::info!("record republishing is disabled");
            return Self { handle: None };
        }
        tracing::info!(
            "starting record republisher with interval {}s",
            republish_interval.as_secs()
        );
        let handle = tokio::spawn(async move {
            Self::run_loop(store, dht, republish_interval).await;
        });
        Self {
            handle: Some(handle),
        }
    }

    // One task owns the loop and awaits each tick's work, so two ticks can
    // never run concurrently; an overrunning tick delays the next one.
    async fn run_loop(
        store: Arc<dyn RecordStore>,
        dht: Arc<dyn DhtClient>,
        period: Duration,
    ) {
        let mut interval_timer = interval(period);
        interval_timer.tick().await; // The first tick is instant, skip it.

        loop {
            interval_timer.tick().await;
            let older_than = Timestamp::now()
                .as_u64()
                .saturating_sub(period.as_micros() as u64);
            match Self::republish_once(store.as_ref(), dht.as_ref(), older_than).await {
                Ok(summary) if summary.attempted == 0 => {
                    tracing::info!("no records due for republishing");
                }
                Ok(summary) => {
                    tracing::info!(
                        "republishing complete, {}/{} record(s) succeeded, {} failed",
                        summary.succeeded,
                        summary.attempted,
                        summary.failed
                    );
                }
                Err(e) => {
                    tracing::error!("failed to list records for republishing: {e}");
                }
            }
        }
    }

    /// Re-announce every record whose last announcement is older than
    /// `older_than` (microseconds).
    ///
    /// Individual failures are counted and logged, never fatal to the tick;
    /// a failed record is retried no earlier than the next tick.
    pub async fn republish_once(
        store: &dyn RecordStore,
        dht: &dyn DhtClient,
        older_than: u64,
    ) -> Result<RepublishSummary, StoreError> {
        let due = store.list_due_for_republish(older_than).await?;
        let mut summary = RepublishSummary::default();

        for record in due {
            summary.attempted += 1;
            let announcement = match DhtRecord::try_from(&record) {
                Ok(announcement) => announcement,
                Err(e) => {
                    tracing::error!("failed to decode stored record for republishing: {e}");
                    summary.failed += 1;
                    continue;
                }
            };
            let public_key = announcement.public_key.clone();
            match dht.put(announcement).await {
                Ok(()) => {
                    summary.succeeded += 1;
                    if let Err(e) = store
                        .mark_republished(&public_key, Timestamp::now().as_u64())
                        .await
                    {
                        tracing::warn!("failed to mark record {public_key} as republished: {e}");
                    }
                }
                Err(e) => {
                    tracing::warn!("failed to republish record {public_key}: {e}");
                    summary.failed += 1;
                }
            }
        }

        Ok(summary)
    }
}

impl Drop for RecordsRepublisher {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
